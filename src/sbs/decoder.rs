use anyhow::{Context, Result};

use crate::aircraft::IcaoAddress;
use crate::flights::MAX_FLIGHT_NAME_LEN;

/// Number of comma-separated fields in a BaseStation MSG line
pub const SBS_FIELD_COUNT: usize = 22;

// Zero-based field positions
const FIELD_MARKER: usize = 0;
const FIELD_MESSAGE_TYPE: usize = 1;
const FIELD_AIRCRAFT_ID: usize = 4;
const FIELD_CALLSIGN: usize = 10;
const FIELD_ALTITUDE: usize = 11;
const FIELD_GROUND_SPEED: usize = 12;
const FIELD_TRACK: usize = 13;
const FIELD_LATITUDE: usize = 14;
const FIELD_LONGITUDE: usize = 15;
const FIELD_VERTICAL_RATE: usize = 16;

/// SBS message types (MSG,1 through MSG,8)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SbsMessageType {
    /// MSG,1: ES Identification and Category (callsign)
    EsIdentification = 1,
    /// MSG,2: ES Surface Position Message
    EsSurfacePosition = 2,
    /// MSG,3: ES Airborne Position Message (altitude, lat/lon)
    EsAirbornePosition = 3,
    /// MSG,4: ES Airborne Velocity Message (speed, track, vertical rate)
    EsAirborneVelocity = 4,
    /// MSG,5: Surveillance Alt Message
    SurveillanceAlt = 5,
    /// MSG,6: Surveillance ID Message (squawk)
    SurveillanceId = 6,
    /// MSG,7: Air To Air Message
    AirToAir = 7,
    /// MSG,8: All Call Reply
    AllCallReply = 8,
}

impl SbsMessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::EsIdentification),
            2 => Some(Self::EsSurfacePosition),
            3 => Some(Self::EsAirbornePosition),
            4 => Some(Self::EsAirborneVelocity),
            5 => Some(Self::SurveillanceAlt),
            6 => Some(Self::SurveillanceId),
            7 => Some(Self::AirToAir),
            8 => Some(Self::AllCallReply),
            _ => None,
        }
    }

    /// Whether telemetry is extracted from this message type
    pub fn is_supported(self) -> bool {
        matches!(
            self,
            Self::EsIdentification | Self::EsAirbornePosition | Self::EsAirborneVelocity
        )
    }
}

/// One attribute value carried by a message
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryAttribute {
    Callsign(String),
    Altitude(i32),
    Latitude(f64),
    Longitude(f64),
    Speed(i32),
    Track(i32),
    VerticalRate(i32),
}

/// Partial telemetry extracted from one SBS line
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryUpdate {
    pub address: IcaoAddress,
    pub message_type: SbsMessageType,
    pub attributes: Vec<TelemetryAttribute>,
}

/// Decode one BaseStation line into a telemetry update
///
/// Returns `Ok(None)` for lines that are not 22-field `MSG` lines, for message
/// types other than 1, 3 and 4 (including numbers outside any known subtype),
/// and for identification messages with a blank callsign. A blank callsign
/// therefore never clears or blanks a flight name that is already known.
/// Returns `Err` when a field that must be numeric (or the aircraft address)
/// does not parse; callers drop such lines.
///
/// Field extraction:
/// - MSG,1: callsign (trimmed, at most 8 characters)
/// - MSG,3: altitude; latitude and longitude only when present
/// - MSG,4: ground speed, track, vertical rate (empty fields read as 0)
///
/// Example: `MSG,3,1,1,4840D6,1,2026/10/16,12:00:00.000,2026/10/16,12:00:00.000,,8000,,,52.1,4.8,,,0,0,0,0`
pub fn decode_sbs_line(line: &str) -> Result<Option<TelemetryUpdate>> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != SBS_FIELD_COUNT || fields[FIELD_MARKER] != "MSG" {
        return Ok(None);
    }

    // Parsed wide so out-of-range subtypes are ignored rather than rejected
    let type_num: i64 = fields[FIELD_MESSAGE_TYPE]
        .trim()
        .parse()
        .with_context(|| format!("Invalid message type: '{}'", fields[FIELD_MESSAGE_TYPE]))?;

    let message_type = match u8::try_from(type_num).ok().and_then(SbsMessageType::from_u8) {
        Some(message_type) if message_type.is_supported() => message_type,
        _ => return Ok(None),
    };

    let address: IcaoAddress = fields[FIELD_AIRCRAFT_ID].parse()?;

    let mut attributes = Vec::with_capacity(3);
    match message_type {
        SbsMessageType::EsIdentification => {
            let callsign: String = fields[FIELD_CALLSIGN]
                .trim()
                .chars()
                .take(MAX_FLIGHT_NAME_LEN)
                .collect();
            if callsign.is_empty() {
                return Ok(None);
            }
            attributes.push(TelemetryAttribute::Callsign(callsign));
        }
        SbsMessageType::EsAirbornePosition => {
            attributes.push(TelemetryAttribute::Altitude(parse_field(
                &fields,
                FIELD_ALTITUDE,
                "altitude",
            )?));
            if let Some(latitude) = parse_optional_field(&fields, FIELD_LATITUDE, "latitude")? {
                attributes.push(TelemetryAttribute::Latitude(latitude));
            }
            if let Some(longitude) = parse_optional_field(&fields, FIELD_LONGITUDE, "longitude")? {
                attributes.push(TelemetryAttribute::Longitude(longitude));
            }
        }
        SbsMessageType::EsAirborneVelocity => {
            attributes.push(TelemetryAttribute::Speed(parse_or_zero(
                &fields,
                FIELD_GROUND_SPEED,
                "ground speed",
            )?));
            attributes.push(TelemetryAttribute::Track(parse_or_zero(
                &fields,
                FIELD_TRACK,
                "track",
            )?));
            attributes.push(TelemetryAttribute::VerticalRate(parse_or_zero(
                &fields,
                FIELD_VERTICAL_RATE,
                "vertical rate",
            )?));
        }
        _ => return Ok(None),
    }

    Ok(Some(TelemetryUpdate {
        address,
        message_type,
        attributes,
    }))
}

fn parse_field<T>(fields: &[&str], index: usize, name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    fields[index]
        .trim()
        .parse()
        .with_context(|| format!("Failed to parse {}: '{}'", name, fields[index]))
}

fn parse_optional_field<T>(fields: &[&str], index: usize, name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if fields[index].is_empty() {
        return Ok(None);
    }
    parse_field(fields, index, name).map(Some)
}

fn parse_or_zero(fields: &[&str], index: usize, name: &str) -> Result<i32> {
    Ok(parse_optional_field(fields, index, name)?.unwrap_or(0))
}
