use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest callsign a flight name may carry
pub const MAX_FLIGHT_NAME_LEN: usize = 8;

/// A continuous observation session of one aircraft
///
/// `seen` is the last time a position was attributed to the flight; it only
/// ever moves forward. `first_seen` is when the flight was opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    pub id: Uuid,
    pub aircraft_id: Uuid,
    pub name: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub seen: DateTime<Utc>,
}

impl Flight {
    /// Open a new flight for an aircraft at `now`
    pub fn new(aircraft_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            aircraft_id,
            name: None,
            first_seen: now,
            seen: now,
        }
    }

    /// A flight silent for longer than `gap` is considered over; the boundary itself still counts as continuous
    ///
    /// A gap reaching back before the earliest representable time never expires a flight.
    pub fn is_expired(&self, now: DateTime<Utc>, gap: Duration) -> bool {
        now.checked_sub_signed(gap)
            .is_some_and(|cutoff| self.seen < cutoff)
    }
}

/// Diesel model for the flights table
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::flights)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FlightModel {
    pub id: Uuid,
    pub aircraft_id: Uuid,
    pub name: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub seen: DateTime<Utc>,
}

impl From<FlightModel> for Flight {
    fn from(model: FlightModel) -> Self {
        Self {
            id: model.id,
            aircraft_id: model.aircraft_id,
            name: model.name,
            first_seen: model.first_seen,
            seen: model.seen,
        }
    }
}

impl From<&Flight> for FlightModel {
    fn from(flight: &Flight) -> Self {
        Self {
            id: flight.id,
            aircraft_id: flight.aircraft_id,
            name: flight.name.clone(),
            first_seen: flight.first_seen,
            seen: flight.seen,
        }
    }
}

/// What the flight merge utility should do with one flight
#[derive(Debug, Clone, PartialEq)]
pub enum MergeAction {
    /// Flight starts a new session; `name` and `seen` are its final values
    Keep {
        flight_id: Uuid,
        name: Option<String>,
        seen: DateTime<Utc>,
    },
    /// Flight continues `into`: move its positions there and delete it
    MergeInto { flight_id: Uuid, into: Uuid },
}

/// Plan how to collapse one aircraft's flights that were split despite lying within `gap` of each other
///
/// `flights` may be in any order; they are scanned by `first_seen`. A flight
/// is kept when it starts more than `gap` after the last sighting of the
/// previous kept flight; otherwise it is folded into that flight, extending
/// its `seen` and handing over a non-null name.
pub fn plan_flight_merges(flights: &[Flight], gap: Duration) -> Vec<MergeAction> {
    let mut ordered: Vec<&Flight> = flights.iter().collect();
    ordered.sort_by_key(|f| (f.first_seen, f.id));

    let mut kept: Vec<(Uuid, Option<String>, DateTime<Utc>)> = Vec::new();
    let mut merges = Vec::new();

    for flight in ordered {
        match kept.last_mut() {
            Some((kept_id, kept_name, kept_seen))
                if kept_seen
                    .checked_add_signed(gap)
                    .is_none_or(|end| flight.first_seen <= end) =>
            {
                merges.push(MergeAction::MergeInto {
                    flight_id: flight.id,
                    into: *kept_id,
                });
                if flight.seen > *kept_seen {
                    *kept_seen = flight.seen;
                }
                if flight.name.is_some() {
                    *kept_name = flight.name.clone();
                }
            }
            _ => kept.push((flight.id, flight.name.clone(), flight.seen)),
        }
    }

    kept.into_iter()
        .map(|(flight_id, name, seen)| MergeAction::Keep {
            flight_id,
            name,
            seen,
        })
        .chain(merges)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, hour, minute, 0).unwrap()
    }

    fn flight(first_seen: DateTime<Utc>, seen: DateTime<Utc>, name: Option<&str>) -> Flight {
        Flight {
            id: Uuid::now_v7(),
            aircraft_id: Uuid::nil(),
            name: name.map(str::to_string),
            first_seen,
            seen,
        }
    }

    #[test]
    fn test_expiry_boundary() {
        let now = at(12, 0);
        let gap = Duration::hours(2);
        let epsilon = Duration::seconds(1);

        let mut f = Flight::new(Uuid::nil(), now);
        f.seen = now - gap - epsilon;
        assert!(f.is_expired(now, gap));

        f.seen = now - gap + epsilon;
        assert!(!f.is_expired(now, gap));

        f.seen = now - gap;
        assert!(!f.is_expired(now, gap));
    }

    #[test]
    fn test_huge_gap_never_expires() {
        let now = at(12, 0);
        let gap = Duration::hours(2_500_000_000);

        let mut f = Flight::new(Uuid::nil(), now);
        f.seen = DateTime::<Utc>::MIN_UTC;
        assert!(!f.is_expired(now, gap));
        assert!(!f.is_expired(now, Duration::MAX));
    }

    #[test]
    fn test_plan_huge_gap_merges_everything() {
        let first = flight(at(1, 0), at(2, 0), None);
        let second = flight(at(9, 0), at(10, 0), None);

        let plan = plan_flight_merges(&[first.clone(), second.clone()], Duration::MAX);
        assert!(plan.contains(&MergeAction::MergeInto {
            flight_id: second.id,
            into: first.id,
        }));
    }

    #[test]
    fn test_plan_merges_split_session() {
        let gap = Duration::hours(2);
        let first = flight(at(8, 0), at(9, 0), None);
        let second = flight(at(9, 30), at(10, 15), Some("KL1023"));
        let third = flight(at(13, 0), at(14, 0), None);

        let plan = plan_flight_merges(&[third.clone(), second.clone(), first.clone()], gap);

        assert_eq!(
            plan,
            vec![
                MergeAction::Keep {
                    flight_id: first.id,
                    name: Some("KL1023".to_string()),
                    seen: at(10, 15),
                },
                MergeAction::Keep {
                    flight_id: third.id,
                    name: None,
                    seen: at(14, 0),
                },
                MergeAction::MergeInto {
                    flight_id: second.id,
                    into: first.id,
                },
            ]
        );
    }

    #[test]
    fn test_plan_keeps_name_when_merged_flight_has_none() {
        let gap = Duration::hours(2);
        let first = flight(at(8, 0), at(9, 0), Some("EZY12"));
        let second = flight(at(9, 10), at(9, 50), None);

        let plan = plan_flight_merges(&[first.clone(), second.clone()], gap);

        assert!(plan.contains(&MergeAction::Keep {
            flight_id: first.id,
            name: Some("EZY12".to_string()),
            seen: at(9, 50),
        }));
    }

    #[test]
    fn test_plan_all_separate_flights_kept() {
        let gap = Duration::hours(2);
        let flights = vec![
            flight(at(1, 0), at(2, 0), None),
            flight(at(5, 0), at(6, 0), None),
            flight(at(9, 0), at(10, 0), None),
        ];

        let plan = plan_flight_merges(&flights, gap);
        assert_eq!(plan.len(), 3);
        assert!(
            plan.iter()
                .all(|action| matches!(action, MergeAction::Keep { .. }))
        );
    }
}
