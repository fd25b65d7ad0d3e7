use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use tracing::debug;
use uuid::Uuid;

use crate::aircraft::{Aircraft, AircraftModel, IcaoAddress};
use crate::flight_positions::{FlightPosition, FlightPositionModel, NewPosition};
use crate::flights::{Flight, FlightModel};
use crate::repository::{PgPool, TrackingRepository};
use crate::schema::{aircraft, flight_positions, flights};

/// A write waiting for the next commit
#[derive(Debug, Clone)]
enum StagedWrite {
    InsertAircraft(AircraftModel),
    InsertFlight(FlightModel),
    UpdateFlightName { flight_id: Uuid, name: String },
    UpdateFlightSeen { flight_id: Uuid, seen: DateTime<Utc> },
    InsertPosition(FlightPositionModel),
}

/// PostgreSQL-backed tracking repository
///
/// Entity ids are generated client-side (UUIDv7), so `create_*` can hand back
/// complete entities immediately while the inserts wait for `commit`.
pub struct PgTrackingRepository {
    pool: PgPool,
    staged: Vec<StagedWrite>,
}

impl PgTrackingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            staged: Vec::new(),
        }
    }

    /// Number of writes waiting for the next commit
    pub fn staged_writes(&self) -> usize {
        self.staged.len()
    }
}

#[async_trait]
impl TrackingRepository for PgTrackingRepository {
    async fn find_aircraft_by_address(&self, address: IcaoAddress) -> Result<Option<Aircraft>> {
        let pool = self.pool.clone();

        let model = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let model: Option<AircraftModel> = aircraft::table
                .filter(aircraft::icao.eq(address.as_db()))
                .select(AircraftModel::as_select())
                .first(&mut conn)
                .optional()?;

            Ok::<Option<AircraftModel>, anyhow::Error>(model)
        })
        .await??;

        model.map(Aircraft::try_from).transpose()
    }

    async fn create_aircraft(
        &mut self,
        address: IcaoAddress,
        now: DateTime<Utc>,
    ) -> Result<Aircraft> {
        let new_aircraft = Aircraft::new(address, now);
        self.staged
            .push(StagedWrite::InsertAircraft(AircraftModel::from(&new_aircraft)));
        Ok(new_aircraft)
    }

    async fn find_latest_flight(&self, address: IcaoAddress) -> Result<Option<Flight>> {
        let pool = self.pool.clone();

        let model = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let model: Option<FlightModel> = flights::table
                .inner_join(aircraft::table)
                .filter(aircraft::icao.eq(address.as_db()))
                .order(flights::seen.desc())
                .select(FlightModel::as_select())
                .first(&mut conn)
                .optional()?;

            Ok::<Option<FlightModel>, anyhow::Error>(model)
        })
        .await??;

        Ok(model.map(Flight::from))
    }

    async fn create_flight(&mut self, aircraft: &Aircraft, now: DateTime<Utc>) -> Result<Flight> {
        let flight = Flight::new(aircraft.id, now);
        self.staged
            .push(StagedWrite::InsertFlight(FlightModel::from(&flight)));
        Ok(flight)
    }

    async fn update_flight_name(&mut self, flight: &Flight, name: &str) -> Result<()> {
        self.staged.push(StagedWrite::UpdateFlightName {
            flight_id: flight.id,
            name: name.to_string(),
        });
        Ok(())
    }

    async fn update_flight_seen(&mut self, flight: &Flight, seen: DateTime<Utc>) -> Result<()> {
        self.staged.push(StagedWrite::UpdateFlightSeen {
            flight_id: flight.id,
            seen,
        });
        Ok(())
    }

    async fn create_position(
        &mut self,
        flight: &Flight,
        position: NewPosition,
        timestamp: DateTime<Utc>,
    ) -> Result<FlightPosition> {
        let position = FlightPosition::new(flight.id, position, timestamp);
        self.staged
            .push(StagedWrite::InsertPosition(FlightPositionModel::from(&position)));
        Ok(position)
    }

    async fn commit(&mut self) -> Result<()> {
        let writes = std::mem::take(&mut self.staged);
        if writes.is_empty() {
            return Ok(());
        }

        let pool = self.pool.clone();
        let write_count = writes.len();

        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            conn.transaction::<_, anyhow::Error, _>(|conn| {
                for write in &writes {
                    apply_write(conn, write)?;
                }
                Ok(())
            })
        })
        .await?
        .context("Failed to commit tracking writes")?;

        debug!("Committed {} tracking writes", write_count);
        Ok(())
    }

    async fn rollback(&mut self) {
        if !self.staged.is_empty() {
            debug!("Discarding {} staged tracking writes", self.staged.len());
            self.staged.clear();
        }
    }
}

fn apply_write(conn: &mut PgConnection, write: &StagedWrite) -> Result<()> {
    match write {
        StagedWrite::InsertAircraft(model) => {
            diesel::insert_into(aircraft::table)
                .values(model)
                .execute(conn)
                .with_context(|| format!("inserting aircraft {:06x}", model.icao))?;
        }
        StagedWrite::InsertFlight(model) => {
            diesel::insert_into(flights::table)
                .values(model)
                .execute(conn)
                .context("inserting flight")?;
        }
        StagedWrite::UpdateFlightName { flight_id, name } => {
            diesel::update(flights::table.filter(flights::id.eq(*flight_id)))
                .set(flights::name.eq(Some(name.clone())))
                .execute(conn)
                .context("updating flight name")?;
        }
        StagedWrite::UpdateFlightSeen { flight_id, seen } => {
            // Only ever move last-seen forward
            diesel::update(
                flights::table
                    .filter(flights::id.eq(*flight_id))
                    .filter(flights::seen.lt(*seen)),
            )
            .set(flights::seen.eq(*seen))
            .execute(conn)
            .context("updating flight last seen")?;
        }
        StagedWrite::InsertPosition(model) => {
            diesel::insert_into(flight_positions::table)
                .values(model)
                .execute(conn)
                .context("inserting flight position")?;
        }
    }
    Ok(())
}
