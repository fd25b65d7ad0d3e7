use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aircraft::IcaoAddress;

/// The six telemetry values that make up a complete position record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewPosition {
    /// Barometric altitude in feet
    pub altitude: i32,
    pub latitude: f64,
    pub longitude: f64,
    /// Ground speed in knots
    pub speed: i32,
    /// Track angle in degrees
    pub track: i32,
    /// Vertical rate in feet/minute
    pub vertical_rate: i32,
}

/// One telemetry snapshot attributed to a flight; never mutated once stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightPosition {
    pub id: Uuid,
    pub flight_id: Uuid,
    pub altitude: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: i32,
    pub track: i32,
    pub vertical_rate: i32,
    pub time: DateTime<Utc>,
}

impl FlightPosition {
    pub fn new(flight_id: Uuid, position: NewPosition, time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            flight_id,
            altitude: position.altitude,
            latitude: position.latitude,
            longitude: position.longitude,
            speed: position.speed,
            track: position.track,
            vertical_rate: position.vertical_rate,
            time,
        }
    }
}

/// Diesel model for the flight_positions table
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::flight_positions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FlightPositionModel {
    pub id: Uuid,
    pub flight_id: Uuid,
    pub altitude: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: i32,
    pub track: i32,
    pub vertical_rate: i32,
    pub time: DateTime<Utc>,
}

impl From<FlightPositionModel> for FlightPosition {
    fn from(model: FlightPositionModel) -> Self {
        Self {
            id: model.id,
            flight_id: model.flight_id,
            altitude: model.altitude,
            latitude: model.latitude,
            longitude: model.longitude,
            speed: model.speed,
            track: model.track,
            vertical_rate: model.vertical_rate,
            time: model.time,
        }
    }
}

impl From<&FlightPosition> for FlightPositionModel {
    fn from(position: &FlightPosition) -> Self {
        Self {
            id: position.id,
            flight_id: position.flight_id,
            altitude: position.altitude,
            latitude: position.latitude,
            longitude: position.longitude,
            speed: position.speed,
            track: position.track,
            vertical_rate: position.vertical_rate,
            time: position.time,
        }
    }
}

/// Latest position of a currently visible flight, as served by `/data.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivePosition {
    pub icao: IcaoAddress,
    pub flight: Option<String>,
    pub altitude: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: i32,
    pub track: i32,
    pub vertical_rate: i32,
}

impl ActivePosition {
    pub fn new(icao: IcaoAddress, flight: Option<String>, position: &FlightPosition) -> Self {
        Self {
            icao,
            flight,
            altitude: position.altitude,
            latitude: position.latitude,
            longitude: position.longitude,
            speed: position.speed,
            track: position.track,
            vertical_rate: position.vertical_rate,
        }
    }
}
