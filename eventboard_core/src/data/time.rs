use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Represents the moment an event starts or ends. The remote API stores
/// whatever the client sent, so this can be either a precise instant or a
/// wall-clock date-time with no offset attached (as produced by a
/// `datetime-local` form field).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Moment {
    DateTime(DateTime<Utc>),
    Local(NaiveDateTime),
}

/// Offset-less formats accepted for [`Moment::Local`], most specific first.
const LOCAL_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("not a recognized timestamp: {0:?}")]
pub struct MomentParseError(String);

impl Moment {
    // Forces the `Moment` to be a specific point in time. A local date-time is
    // interpreted as if it were UTC.
    pub fn to_specific_time(&self) -> DateTime<Utc> {
        match self {
            Moment::DateTime(dt) => *dt,
            Moment::Local(naive) => naive.and_utc(),
        }
    }
}

impl FromStr for Moment {
    type Err = MomentParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Ok(Moment::DateTime(dt.with_timezone(&Utc)));
        }
        LOCAL_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
            .map(Moment::Local)
            .ok_or_else(|| MomentParseError(value.to_string()))
    }
}

impl fmt::Display for Moment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Moment::DateTime(dt) => f.write_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Moment::Local(naive) => write!(f, "{}", naive.format("%Y-%m-%dT%H:%M")),
        }
    }
}

impl Serialize for Moment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Moment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl From<DateTime<Utc>> for Moment {
    fn from(dt: DateTime<Utc>) -> Self {
        Moment::DateTime(dt)
    }
}
