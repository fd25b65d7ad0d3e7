//! Shared helpers for integration tests
//!
//! `MemoryRepository` implements `TrackingRepository` without a database. It
//! stages writes like the PostgreSQL repository and applies them on `commit`;
//! the committed state lives behind an `Arc<Mutex<_>>` so a test can keep a
//! handle on it while a worker owns the repository.
//!
//! `TestDatabase` (in `database`) provides an isolated PostgreSQL database
//! for the tests that exercise the diesel repositories.
#![allow(dead_code)]

pub mod database;

pub use database::TestDatabase;

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sbs1_web::flight_positions::{FlightPosition, NewPosition};
use sbs1_web::{Aircraft, Flight, IcaoAddress, TrackingRepository};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct MemoryStore {
    pub aircraft: Vec<Aircraft>,
    pub flights: Vec<Flight>,
    pub positions: Vec<FlightPosition>,
    pub commits: usize,
    pub rollbacks: usize,
    /// Fail the next commit that has writes to apply
    pub fail_next_commit: bool,
}

impl MemoryStore {
    pub fn flights_of(&self, address: IcaoAddress) -> Vec<Flight> {
        let Some(aircraft) = self.aircraft.iter().find(|a| a.icao == address) else {
            return Vec::new();
        };
        self.flights
            .iter()
            .filter(|f| f.aircraft_id == aircraft.id)
            .cloned()
            .collect()
    }

    pub fn positions_of(&self, flight: &Flight) -> Vec<FlightPosition> {
        self.positions
            .iter()
            .filter(|p| p.flight_id == flight.id)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone)]
enum Staged {
    Aircraft(Aircraft),
    Flight(Flight),
    Name(uuid::Uuid, String),
    Seen(uuid::Uuid, DateTime<Utc>),
    Position(FlightPosition),
}

#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    store: Arc<Mutex<MemoryStore>>,
    staged: Vec<Staged>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle on the committed state
    pub fn handle(&self) -> Arc<Mutex<MemoryStore>> {
        self.store.clone()
    }

    pub fn store(&self) -> MutexGuard<'_, MemoryStore> {
        self.store.lock().unwrap()
    }

    pub fn staged_writes(&self) -> usize {
        self.staged.len()
    }
}

#[async_trait]
impl TrackingRepository for MemoryRepository {
    async fn find_aircraft_by_address(&self, address: IcaoAddress) -> Result<Option<Aircraft>> {
        Ok(self
            .store()
            .aircraft
            .iter()
            .find(|a| a.icao == address)
            .cloned())
    }

    async fn create_aircraft(
        &mut self,
        address: IcaoAddress,
        now: DateTime<Utc>,
    ) -> Result<Aircraft> {
        let aircraft = Aircraft::new(address, now);
        self.staged.push(Staged::Aircraft(aircraft.clone()));
        Ok(aircraft)
    }

    async fn find_latest_flight(&self, address: IcaoAddress) -> Result<Option<Flight>> {
        Ok(self
            .store()
            .flights_of(address)
            .into_iter()
            .max_by_key(|f| f.seen))
    }

    async fn create_flight(&mut self, aircraft: &Aircraft, now: DateTime<Utc>) -> Result<Flight> {
        let flight = Flight::new(aircraft.id, now);
        self.staged.push(Staged::Flight(flight.clone()));
        Ok(flight)
    }

    async fn update_flight_name(&mut self, flight: &Flight, name: &str) -> Result<()> {
        self.staged.push(Staged::Name(flight.id, name.to_string()));
        Ok(())
    }

    async fn update_flight_seen(&mut self, flight: &Flight, seen: DateTime<Utc>) -> Result<()> {
        self.staged.push(Staged::Seen(flight.id, seen));
        Ok(())
    }

    async fn create_position(
        &mut self,
        flight: &Flight,
        position: NewPosition,
        timestamp: DateTime<Utc>,
    ) -> Result<FlightPosition> {
        let position = FlightPosition::new(flight.id, position, timestamp);
        self.staged.push(Staged::Position(position.clone()));
        Ok(position)
    }

    async fn commit(&mut self) -> Result<()> {
        let writes = std::mem::take(&mut self.staged);
        if writes.is_empty() {
            return Ok(());
        }

        let mut store = self.store.lock().unwrap();
        if store.fail_next_commit {
            store.fail_next_commit = false;
            bail!("simulated commit failure");
        }

        for write in writes {
            match write {
                Staged::Aircraft(aircraft) => {
                    if store.aircraft.iter().any(|a| a.icao == aircraft.icao) {
                        bail!("duplicate aircraft {}", aircraft.icao);
                    }
                    store.aircraft.push(aircraft);
                }
                Staged::Flight(flight) => store.flights.push(flight),
                Staged::Name(id, name) => {
                    if let Some(flight) = store.flights.iter_mut().find(|f| f.id == id) {
                        flight.name = Some(name);
                    }
                }
                Staged::Seen(id, seen) => {
                    if let Some(flight) = store.flights.iter_mut().find(|f| f.id == id) {
                        flight.seen = flight.seen.max(seen);
                    }
                }
                Staged::Position(position) => store.positions.push(position),
            }
        }
        store.commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) {
        self.staged.clear();
        self.store().rollbacks += 1;
    }
}

pub fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, hour, minute, second).unwrap()
}

pub fn address(hex: &str) -> IcaoAddress {
    hex.parse().unwrap()
}

/// A 22-field BaseStation line with the given zero-based fields filled in
pub fn sbs_line(message_type: u8, address: &str, fields: &[(usize, &str)]) -> String {
    let message_type = message_type.to_string();
    let mut line: Vec<&str> = vec![""; 22];
    line[0] = "MSG";
    line[1] = &message_type;
    line[2] = "1";
    line[3] = "1";
    line[4] = address;
    line[5] = "1";
    line[6] = "2026/10/16";
    line[7] = "12:00:00.000";
    line[8] = "2026/10/16";
    line[9] = "12:00:00.000";
    for (index, value) in fields {
        line[*index] = *value;
    }
    line.join(",")
}

pub fn identification(address: &str, callsign: &str) -> String {
    sbs_line(1, address, &[(10, callsign)])
}

pub fn position(address: &str, altitude: &str, latitude: &str, longitude: &str) -> String {
    sbs_line(3, address, &[(11, altitude), (14, latitude), (15, longitude)])
}

pub fn velocity(address: &str, speed: &str, track: &str, vertical_rate: &str) -> String {
    sbs_line(4, address, &[(12, speed), (13, track), (16, vertical_rate)])
}
