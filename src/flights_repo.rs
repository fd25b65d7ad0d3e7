use anyhow::{Context, Result};
use chrono::Duration;
use diesel::prelude::*;
use tracing::{info, warn};
use uuid::Uuid;

use crate::flights::{Flight, FlightModel, MergeAction, plan_flight_merges};
use crate::repository::PgPool;
use crate::schema::{flight_positions, flights};

/// Statistics from a flight merge run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    /// Aircraft that had more than one flight
    pub aircraft_examined: usize,
    /// Aircraft whose flights were (or, in a dry run, would be) merged
    pub aircraft_merged: usize,
    pub flights_kept: usize,
    pub flights_merged: usize,
    pub positions_moved: usize,
    /// Aircraft whose merge transaction failed and was rolled back
    pub errors: usize,
}

#[derive(Clone)]
pub struct FlightsRepository {
    pool: PgPool,
}

impl FlightsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Ids of every aircraft with more than one flight
    pub async fn aircraft_with_multiple_flights(&self) -> Result<Vec<Uuid>> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let ids: Vec<Uuid> = flights::table
                .group_by(flights::aircraft_id)
                .having(diesel::dsl::count_star().gt(1_i64))
                .select(flights::aircraft_id)
                .order(flights::aircraft_id)
                .load(&mut conn)?;

            Ok::<Vec<Uuid>, anyhow::Error>(ids)
        })
        .await?
    }

    /// All flights of one aircraft, oldest first
    pub async fn flights_for_aircraft(&self, aircraft_id: Uuid) -> Result<Vec<Flight>> {
        let pool = self.pool.clone();

        let models = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let models: Vec<FlightModel> = flights::table
                .filter(flights::aircraft_id.eq(aircraft_id))
                .order((flights::first_seen.asc(), flights::id.asc()))
                .select(FlightModel::as_select())
                .load(&mut conn)?;

            Ok::<Vec<FlightModel>, anyhow::Error>(models)
        })
        .await??;

        Ok(models.into_iter().map(Flight::from).collect())
    }

    /// Apply a merge plan for one aircraft in a single transaction
    ///
    /// Positions of merged flights are moved before those flights are deleted,
    /// so nothing is lost to the cascade. Returns the number of positions moved.
    pub async fn apply_merge_plan(&self, plan: Vec<MergeAction>) -> Result<usize> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            conn.transaction::<usize, anyhow::Error, _>(|conn| {
                let mut moved = 0;

                for action in &plan {
                    if let MergeAction::MergeInto { flight_id, into } = action {
                        moved += diesel::update(
                            flight_positions::table
                                .filter(flight_positions::flight_id.eq(*flight_id)),
                        )
                        .set(flight_positions::flight_id.eq(*into))
                        .execute(conn)
                        .context("reassigning flight positions")?;

                        let deleted =
                            diesel::delete(flights::table.filter(flights::id.eq(*flight_id)))
                                .execute(conn)
                                .context("deleting merged flight")?;
                        anyhow::ensure!(
                            deleted == 1,
                            "expected to delete 1 merged flight row, but deleted {}",
                            deleted
                        );
                    }
                }

                for action in &plan {
                    if let MergeAction::Keep {
                        flight_id,
                        name,
                        seen,
                    } = action
                    {
                        diesel::update(flights::table.filter(flights::id.eq(*flight_id)))
                            .set((flights::name.eq(name.clone()), flights::seen.eq(*seen)))
                            .execute(conn)
                            .context("updating kept flight")?;
                    }
                }

                Ok(moved)
            })
        })
        .await?
    }

    /// Collapse flights that were split although they lie within `gap` of each other
    ///
    /// Each aircraft is merged in its own transaction, so a failure on one
    /// aircraft is logged and counted without affecting the others. With
    /// `dry_run` nothing is written and the stats describe what would change.
    pub async fn merge_split_flights(&self, gap: Duration, dry_run: bool) -> Result<MergeStats> {
        let aircraft_ids = self.aircraft_with_multiple_flights().await?;
        let mut stats = MergeStats {
            aircraft_examined: aircraft_ids.len(),
            ..MergeStats::default()
        };

        info!(
            "Found {} aircraft with more than one flight",
            stats.aircraft_examined
        );

        for aircraft_id in aircraft_ids {
            let flights = self.flights_for_aircraft(aircraft_id).await?;
            let plan = plan_flight_merges(&flights, gap);

            let merged = plan
                .iter()
                .filter(|action| matches!(action, MergeAction::MergeInto { .. }))
                .count();
            let kept = plan.len() - merged;

            if merged == 0 {
                stats.flights_kept += kept;
                continue;
            }

            if dry_run {
                info!(
                    "Would merge {} of {} flights for aircraft {}",
                    merged,
                    flights.len(),
                    aircraft_id
                );
                stats.aircraft_merged += 1;
                stats.flights_kept += kept;
                stats.flights_merged += merged;
                continue;
            }

            match self.apply_merge_plan(plan).await {
                Ok(moved) => {
                    info!(
                        "Merged {} flights into {} for aircraft {} ({} positions moved)",
                        merged, kept, aircraft_id, moved
                    );
                    stats.aircraft_merged += 1;
                    stats.flights_kept += kept;
                    stats.flights_merged += merged;
                    stats.positions_moved += moved;
                }
                Err(e) => {
                    warn!("Failed to merge flights for aircraft {}: {:#}", aircraft_id, e);
                    stats.errors += 1;
                }
            }
        }

        Ok(stats)
    }
}
