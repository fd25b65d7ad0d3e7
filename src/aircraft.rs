use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 24-bit ICAO transponder address
///
/// Parsed from the 6 hex digits carried in SBS messages (either case) and
/// rendered back as lowercase, zero-padded hex, e.g. `4840d6`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct IcaoAddress(u32);

impl IcaoAddress {
    pub const MAX: u32 = 0x00FF_FFFF;

    /// Build an address from its numeric value, rejecting anything wider than 24 bits
    pub fn new(value: u32) -> Result<Self> {
        if value > Self::MAX {
            anyhow::bail!("ICAO address {:#x} exceeds 24 bits", value);
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Database representation (the column is a signed 32-bit integer)
    pub fn as_db(self) -> i32 {
        self.0 as i32
    }

    pub fn from_db(value: i32) -> Result<Self> {
        let value = u32::try_from(value)
            .with_context(|| format!("negative ICAO address in database: {}", value))?;
        Self::new(value)
    }
}

impl FromStr for IcaoAddress {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            anyhow::bail!("ICAO address must be 6 hex digits, got '{}'", s);
        }
        let value = u32::from_str_radix(s, 16)
            .with_context(|| format!("Invalid ICAO address: '{}'", s))?;
        Self::new(value)
    }
}

impl fmt::Display for IcaoAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06x}", self.0)
    }
}

impl From<IcaoAddress> for String {
    fn from(address: IcaoAddress) -> Self {
        address.to_string()
    }
}

impl TryFrom<String> for IcaoAddress {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// One physical transponder, created the first time a complete position is seen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aircraft {
    pub id: Uuid,
    pub icao: IcaoAddress,
    pub created_at: DateTime<Utc>,
}

impl Aircraft {
    pub fn new(icao: IcaoAddress, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            icao,
            created_at,
        }
    }
}

impl fmt::Display for Aircraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.icao)
    }
}

// Diesel database model for the aircraft table
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::aircraft)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AircraftModel {
    pub id: Uuid,
    pub icao: i32,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AircraftModel> for Aircraft {
    type Error = anyhow::Error;

    fn try_from(model: AircraftModel) -> Result<Self> {
        Ok(Self {
            id: model.id,
            icao: IcaoAddress::from_db(model.icao)?,
            created_at: model.created_at,
        })
    }
}

impl From<&Aircraft> for AircraftModel {
    fn from(aircraft: &Aircraft) -> Self {
        Self {
            id: aircraft.id,
            icao: aircraft.icao.as_db(),
            created_at: aircraft.created_at,
        }
    }
}
