//! SBS-1 BaseStation feed handling: the TCP line reader and the line decoder

pub mod client;
pub mod decoder;

pub use client::{SbsClientConfig, SbsConnection};
pub use decoder::{SbsMessageType, TelemetryAttribute, TelemetryUpdate, decode_sbs_line};
