use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use tracing::debug;

use crate::aircraft::IcaoAddress;
use crate::flight_positions::{ActivePosition, FlightPosition, FlightPositionModel};
use crate::repository::PgPool;
use crate::schema::{aircraft, flight_positions, flights};

#[derive(Clone)]
pub struct FlightPositionsRepository {
    pool: PgPool,
}

impl FlightPositionsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Latest position of every flight that reported within `window` of `now`
    ///
    /// At most one entry per flight, ordered by flight id.
    pub async fn active_positions(
        &self,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<ActivePosition>> {
        let pool = self.pool.clone();
        let cutoff = now
            .checked_sub_signed(window)
            .context("Recency window is out of range")?;

        let rows = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let rows: Vec<(FlightPositionModel, Option<String>, i32)> = flight_positions::table
                .inner_join(flights::table.inner_join(aircraft::table))
                .filter(flight_positions::time.ge(cutoff))
                .distinct_on(flight_positions::flight_id)
                .order((flight_positions::flight_id, flight_positions::time.desc()))
                .select((
                    FlightPositionModel::as_select(),
                    flights::name,
                    aircraft::icao,
                ))
                .load(&mut conn)?;

            Ok::<Vec<(FlightPositionModel, Option<String>, i32)>, anyhow::Error>(rows)
        })
        .await??;

        debug!("Found {} active flights since {}", rows.len(), cutoff);

        rows.into_iter()
            .map(|(model, name, icao)| {
                let position = FlightPosition::from(model);
                Ok(ActivePosition::new(
                    IcaoAddress::from_db(icao)?,
                    name,
                    &position,
                ))
            })
            .collect()
    }
}
