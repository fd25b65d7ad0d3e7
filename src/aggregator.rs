//! Per-aircraft telemetry aggregation
//!
//! SBS feeds spread one aircraft's state over several message types:
//! - Identification (MSG,1): callsign
//! - Airborne position (MSG,3): altitude, latitude, longitude
//! - Airborne velocity (MSG,4): ground speed, track, vertical rate
//!
//! The aggregator keeps whatever has been seen so far for each address and,
//! once all six telemetry values are known, records one position against the
//! aircraft's current flight. A flight continues while the aircraft keeps
//! being seen; after a silence longer than the flight gap a new one is opened.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::aircraft::IcaoAddress;
use crate::flight_positions::{FlightPosition, NewPosition};
use crate::flights::Flight;
use crate::repository::TrackingRepository;
use crate::sbs::{TelemetryAttribute, TelemetryUpdate};

/// Default silence after which a flight is considered over
pub const DEFAULT_FLIGHT_GAP_HOURS: i64 = 2;

/// Telemetry collected for an aircraft since its last recorded position
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingTelemetry {
    pub callsign: Option<String>,
    pub altitude: Option<i32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed: Option<i32>,
    pub track: Option<i32>,
    pub vertical_rate: Option<i32>,
}

impl PendingTelemetry {
    /// Merge one attribute, replacing any earlier value
    pub fn apply(&mut self, attribute: TelemetryAttribute) {
        match attribute {
            TelemetryAttribute::Callsign(callsign) => self.callsign = Some(callsign),
            TelemetryAttribute::Altitude(altitude) => self.altitude = Some(altitude),
            TelemetryAttribute::Latitude(latitude) => self.latitude = Some(latitude),
            TelemetryAttribute::Longitude(longitude) => self.longitude = Some(longitude),
            TelemetryAttribute::Speed(speed) => self.speed = Some(speed),
            TelemetryAttribute::Track(track) => self.track = Some(track),
            TelemetryAttribute::VerticalRate(rate) => self.vertical_rate = Some(rate),
        }
    }

    /// The complete position, once every telemetry value is known
    ///
    /// The callsign is not part of a position and is never required.
    pub fn position(&self) -> Option<NewPosition> {
        Some(NewPosition {
            altitude: self.altitude?,
            latitude: self.latitude?,
            longitude: self.longitude?,
            speed: self.speed?,
            track: self.track?,
            vertical_rate: self.vertical_rate?,
        })
    }

    pub fn is_ready(&self) -> bool {
        self.position().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// Longest silence that still continues the same flight
    pub flight_gap: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            flight_gap: Duration::hours(DEFAULT_FLIGHT_GAP_HOURS),
        }
    }
}

/// What a successful flush recorded
#[derive(Debug, Clone, PartialEq)]
pub struct FlushOutcome {
    /// The flight the position was attributed to, as it stands after the flush
    pub flight: Flight,
    pub position: FlightPosition,
    pub aircraft_created: bool,
    pub flight_created: bool,
}

/// Owns the pending telemetry of every aircraft currently being assembled
#[derive(Debug, Default)]
pub struct FlightAggregator {
    config: AggregatorConfig,
    pending: HashMap<IcaoAddress, PendingTelemetry>,
}

impl FlightAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            pending: HashMap::new(),
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Merge one attribute into the pending record for `address`
    pub fn apply_update(&mut self, address: IcaoAddress, attribute: TelemetryAttribute) {
        self.pending.entry(address).or_default().apply(attribute);
    }

    pub fn pending(&self, address: IcaoAddress) -> Option<&PendingTelemetry> {
        self.pending.get(&address)
    }

    /// Number of aircraft with telemetry waiting for a complete position
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Apply every attribute of a decoded line, then attempt a single flush
    pub async fn process_update<R: TrackingRepository + ?Sized>(
        &mut self,
        update: TelemetryUpdate,
        repo: &mut R,
        now: DateTime<Utc>,
    ) -> Result<Option<FlushOutcome>> {
        let address = update.address;
        for attribute in update.attributes {
            self.apply_update(address, attribute);
        }
        self.try_flush(address, repo, now).await
    }

    /// Record a position for `address` if its pending telemetry is complete
    ///
    /// Returns `Ok(None)` without touching the repository while telemetry is
    /// still missing. Once complete, the pending record is cleared whether or
    /// not persisting succeeds; on failure the repository is rolled back.
    pub async fn try_flush<R: TrackingRepository + ?Sized>(
        &mut self,
        address: IcaoAddress,
        repo: &mut R,
        now: DateTime<Utc>,
    ) -> Result<Option<FlushOutcome>> {
        let Some(position) = self.pending.get(&address).and_then(PendingTelemetry::position)
        else {
            return Ok(None);
        };

        let callsign = self
            .pending
            .remove(&address)
            .and_then(|pending| pending.callsign);
        metrics::gauge!("aggregator.pending_aircraft").set(self.pending.len() as f64);

        match self
            .record_position(address, callsign, position, repo, now)
            .await
        {
            Ok(outcome) => {
                metrics::counter!("aggregator.flush.success_total").increment(1);
                Ok(Some(outcome))
            }
            Err(e) => {
                repo.rollback().await;
                metrics::counter!("aggregator.flush.failed_total").increment(1);
                Err(e.context(format!("Failed to record position for {}", address)))
            }
        }
    }

    async fn record_position<R: TrackingRepository + ?Sized>(
        &self,
        address: IcaoAddress,
        callsign: Option<String>,
        position: NewPosition,
        repo: &mut R,
        now: DateTime<Utc>,
    ) -> Result<FlushOutcome> {
        let (aircraft, aircraft_created) = match repo.find_aircraft_by_address(address).await? {
            Some(aircraft) => (aircraft, false),
            None => {
                let aircraft = repo.create_aircraft(address, now).await?;
                info!("New aircraft {}", address);
                (aircraft, true)
            }
        };

        let latest = repo
            .find_latest_flight(address)
            .await?
            .filter(|flight| !flight.is_expired(now, self.config.flight_gap));

        let (mut flight, flight_created) = match latest {
            Some(flight) => (flight, false),
            None => {
                let flight = repo.create_flight(&aircraft, now).await?;
                debug!("Opened flight {} for aircraft {}", flight.id, address);
                (flight, true)
            }
        };

        if let Some(callsign) = callsign {
            repo.update_flight_name(&flight, &callsign).await?;
            flight.name = Some(callsign);
        }

        let stored = repo.create_position(&flight, position, now).await?;

        if now > flight.seen {
            repo.update_flight_seen(&flight, now).await?;
            flight.seen = now;
        }

        repo.commit().await?;

        if aircraft_created {
            metrics::counter!("aggregator.aircraft.created_total").increment(1);
        }
        if flight_created {
            metrics::counter!("aggregator.flights.created_total").increment(1);
            info!(
                "New flight {} for {} ({})",
                flight.id,
                address,
                flight.name.as_deref().unwrap_or("no callsign")
            );
        }

        Ok(FlushOutcome {
            flight,
            position: stored,
            aircraft_created,
            flight_created,
        })
    }
}
