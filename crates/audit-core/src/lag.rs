//! Replication lag estimate from last-modified timestamps.

use crate::error::AuditError;
use crate::fetch::{RowFetcher, TableRef};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::fmt;

/// Default last-modified column, as written by Django and Rails.
pub const DEFAULT_TIMESTAMP_COLUMN: &str = "updated_at";

/// Difference between the newest modification on each side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Lag {
    /// `max(primary) - max(downstream)`. Negative when downstream is ahead.
    Known {
        #[serde(serialize_with = "serialize_millis", rename = "millis")]
        delta: TimeDelta,
    },
    /// At least one side has no rows, so no lag can be computed.
    Unknown {
        primary: Option<DateTime<Utc>>,
        downstream: Option<DateTime<Utc>>,
    },
}

impl Lag {
    pub fn from_maxima(primary: Option<DateTime<Utc>>, downstream: Option<DateTime<Utc>>) -> Self {
        match (primary, downstream) {
            (Some(p), Some(d)) => Lag::Known { delta: p - d },
            (primary, downstream) => Lag::Unknown {
                primary,
                downstream,
            },
        }
    }

    pub fn delta(&self) -> Option<TimeDelta> {
        match self {
            Lag::Known { delta } => Some(*delta),
            Lag::Unknown { .. } => None,
        }
    }
}

fn serialize_millis<S: serde::Serializer>(delta: &TimeDelta, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_i64(delta.num_milliseconds())
}

impl fmt::Display for Lag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let delta = match self {
            Lag::Known { delta } => *delta,
            Lag::Unknown { .. } => return write!(f, "unknown"),
        };
        let sign = if delta < TimeDelta::zero() { "-" } else { "" };
        let delta = delta.abs();
        let hours = delta.num_hours();
        let minutes = delta.num_minutes() % 60;
        let seconds = delta.num_seconds() % 60;
        let millis = delta.num_milliseconds() % 1000;
        write!(f, "{sign}")?;
        if hours > 0 {
            write!(f, "{hours}h ")?;
        }
        if hours > 0 || minutes > 0 {
            write!(f, "{minutes}m ")?;
        }
        if millis > 0 {
            write!(f, "{seconds}.{millis:03}s")
        } else {
            write!(f, "{seconds}s")
        }
    }
}

/// Compare `MAX(column)` on both sides.
pub async fn estimate_lag<P, D>(
    primary: &P,
    downstream: &D,
    table: &TableRef,
    column: &str,
) -> Result<Lag, AuditError>
where
    P: RowFetcher + ?Sized,
    D: RowFetcher + ?Sized,
{
    let primary_max = primary
        .fetch_max_timestamp(table, column)
        .await
        .map_err(AuditError::fetch(primary.side()))?;
    let downstream_max = downstream
        .fetch_max_timestamp(table, column)
        .await
        .map_err(AuditError::fetch(downstream.side()))?;
    Ok(Lag::from_maxima(primary_max, downstream_max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_known_lag() {
        let lag = Lag::from_maxima(Some(at(300)), Some(at(0)));
        assert_eq!(lag.delta(), Some(TimeDelta::minutes(5)));
        assert_eq!(lag.to_string(), "5m 0s");
    }

    #[test]
    fn test_negative_lag_is_not_clamped() {
        let lag = Lag::from_maxima(Some(at(0)), Some(at(1)));
        assert_eq!(lag.delta(), Some(TimeDelta::seconds(-1)));
        assert_eq!(lag.to_string(), "-1s");
    }

    #[test]
    fn test_unknown_when_either_side_empty() {
        for lag in [
            Lag::from_maxima(None, Some(at(0))),
            Lag::from_maxima(Some(at(0)), None),
            Lag::from_maxima(None, None),
        ] {
            assert_eq!(lag.delta(), None);
            assert_eq!(lag.to_string(), "unknown");
        }
    }

    #[test]
    fn test_display_formats() {
        let lag = Lag::Known {
            delta: TimeDelta::hours(2) + TimeDelta::seconds(7) + TimeDelta::milliseconds(250),
        };
        assert_eq!(lag.to_string(), "2h 0m 7.250s");
        assert_eq!(
            Lag::Known {
                delta: TimeDelta::zero()
            }
            .to_string(),
            "0s"
        );
    }

    #[test]
    fn test_serialize() {
        let json = serde_json::to_value(Lag::Known {
            delta: TimeDelta::seconds(2),
        })
        .unwrap();
        assert_eq!(json["status"], "known");
        assert_eq!(json["millis"], 2000);
    }
}
