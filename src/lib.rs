//! SBS1-WEB: records aircraft seen on an SBS-1 (BaseStation) feed as flights
//!
//! The ingestion worker reads the feed's text lines, assembles each
//! aircraft's telemetry from the identification, position and velocity
//! messages, and stores a position whenever it is complete. Positions are
//! grouped into flights, one per continuous observation of an aircraft. The
//! web server shows the positions currently being received on a map.

pub mod aggregator;
pub mod aircraft;
pub mod config;
pub mod db;
pub mod flight_positions;
pub mod flight_positions_repo;
pub mod flights;
pub mod flights_repo;
pub mod ingest;
pub mod metrics;
pub mod repository;
pub mod sbs;
pub mod schema;
pub mod tracking_repo;
pub mod web;

pub use aggregator::{AggregatorConfig, FlightAggregator, FlushOutcome, PendingTelemetry};
pub use aircraft::{Aircraft, IcaoAddress};
pub use config::Settings;
pub use flight_positions::{ActivePosition, FlightPosition, NewPosition};
pub use flights::Flight;
pub use ingest::{FlushErrorPolicy, IngestStats, IngestWorker};
pub use repository::TrackingRepository;
