use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, trace, warn};

use crate::aggregator::FlightAggregator;
use crate::repository::TrackingRepository;
use crate::sbs::{SbsConnection, decode_sbs_line};

/// What the worker does when recording a position fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushErrorPolicy {
    /// Log a warning and keep ingesting
    #[default]
    Log,
    /// Stop the worker with the error
    Propagate,
}

impl fmt::Display for FlushErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushErrorPolicy::Log => write!(f, "log"),
            FlushErrorPolicy::Propagate => write!(f, "propagate"),
        }
    }
}

/// Running totals for one ingestion worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub lines: u64,
    pub updates: u64,
    pub ignored: u64,
    pub decode_errors: u64,
    pub positions: u64,
    pub flush_errors: u64,
}

/// The sequential read, decode, aggregate and persist loop for one feed
pub struct IngestWorker<R> {
    aggregator: FlightAggregator,
    repo: R,
    policy: FlushErrorPolicy,
    stats: IngestStats,
}

impl<R: TrackingRepository> IngestWorker<R> {
    pub fn new(aggregator: FlightAggregator, repo: R, policy: FlushErrorPolicy) -> Self {
        Self {
            aggregator,
            repo,
            policy,
            stats: IngestStats::default(),
        }
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    pub fn aggregator(&self) -> &FlightAggregator {
        &self.aggregator
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Consume lines until the connection's shutdown token is cancelled
    ///
    /// Each batch of lines returned by the reader is processed completely
    /// before the next read, so a shutdown never interrupts a batch.
    pub async fn run(&mut self, mut connection: SbsConnection) -> Result<()> {
        info!("Ingestion worker started (flush errors: {})", self.policy);

        while let Some(lines) = connection.next_lines().await {
            let now = Utc::now();
            for line in &lines {
                self.process_line(line, now).await?;
            }
        }

        info!(
            "Ingestion worker stopped: {} lines, {} positions, {} decode errors, {} flush errors, {} reconnects",
            self.stats.lines,
            self.stats.positions,
            self.stats.decode_errors,
            self.stats.flush_errors,
            connection.reconnect_count()
        );
        Ok(())
    }

    /// Decode one line and feed it to the aggregator
    ///
    /// Decode failures only drop the line. Flush failures are handled per the
    /// configured policy; only `Propagate` makes this return an error.
    pub async fn process_line(&mut self, line: &str, now: DateTime<Utc>) -> Result<()> {
        self.stats.lines += 1;

        let update = match decode_sbs_line(line) {
            Ok(Some(update)) => update,
            Ok(None) => {
                self.stats.ignored += 1;
                metrics::counter!("sbs.decode.ignored_total").increment(1);
                return Ok(());
            }
            Err(e) => {
                self.stats.decode_errors += 1;
                metrics::counter!("sbs.decode.failed_total").increment(1);
                debug!("Dropping undecodable SBS line '{}': {:#}", line, e);
                return Ok(());
            }
        };

        self.stats.updates += 1;
        metrics::counter!("sbs.decode.success_total").increment(1);
        let address = update.address;

        match self
            .aggregator
            .process_update(update, &mut self.repo, now)
            .await
        {
            Ok(Some(outcome)) => {
                self.stats.positions += 1;
                trace!(
                    "Recorded position {} for {} on flight {}",
                    outcome.position.id, address, outcome.flight.id
                );
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                self.stats.flush_errors += 1;
                match self.policy {
                    FlushErrorPolicy::Log => {
                        warn!("{:#}", e);
                        Ok(())
                    }
                    FlushErrorPolicy::Propagate => Err(e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct PolicyHolder {
        policy: FlushErrorPolicy,
    }

    #[test]
    fn test_policy_parses_lowercase() {
        let holder: PolicyHolder = toml::from_str("policy = \"propagate\"").unwrap();
        assert_eq!(holder.policy, FlushErrorPolicy::Propagate);

        let holder: PolicyHolder = toml::from_str("policy = \"log\"").unwrap();
        assert_eq!(holder.policy, FlushErrorPolicy::Log);

        assert!(toml::from_str::<PolicyHolder>("policy = \"ignore\"").is_err());
    }

    #[test]
    fn test_policy_defaults_to_log() {
        assert_eq!(FlushErrorPolicy::default(), FlushErrorPolicy::Log);
        assert_eq!(FlushErrorPolicy::Log.to_string(), "log");
    }
}
