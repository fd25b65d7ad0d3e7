//! Persistence seam between the aggregator and storage
//!
//! Reads go straight to storage. Writes are staged and only become visible
//! once `commit` applies all of them as a single transaction; `rollback`
//! throws the staged writes away.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};

use crate::aircraft::{Aircraft, IcaoAddress};
use crate::flight_positions::{FlightPosition, NewPosition};
use crate::flights::Flight;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;
pub type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

/// Operations the aircraft state aggregator needs from storage
#[async_trait]
pub trait TrackingRepository: Send + Sync {
    async fn find_aircraft_by_address(&self, address: IcaoAddress) -> Result<Option<Aircraft>>;

    async fn create_aircraft(&mut self, address: IcaoAddress, now: DateTime<Utc>)
    -> Result<Aircraft>;

    /// Most recent flight (by last seen) of the aircraft with this address
    async fn find_latest_flight(&self, address: IcaoAddress) -> Result<Option<Flight>>;

    async fn create_flight(&mut self, aircraft: &Aircraft, now: DateTime<Utc>) -> Result<Flight>;

    async fn update_flight_name(&mut self, flight: &Flight, name: &str) -> Result<()>;

    async fn update_flight_seen(&mut self, flight: &Flight, seen: DateTime<Utc>) -> Result<()>;

    async fn create_position(
        &mut self,
        flight: &Flight,
        position: NewPosition,
        timestamp: DateTime<Utc>,
    ) -> Result<FlightPosition>;

    /// Apply every write staged since the last commit atomically
    async fn commit(&mut self) -> Result<()>;

    /// Discard every write staged since the last commit
    async fn rollback(&mut self);
}
