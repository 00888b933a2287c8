//! Fixed-format timestamps used across all ontology entities.
//!
//! Sandbox parsers hand in `%Y-%m-%d %H:%M:%S` strings with an optional
//! fractional-second suffix. The MIN/MAX sentinels stand in for "unknown
//! start" and "still running" and are clamped against the enclosing sandbox
//! analysis window during preprocessing.

use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{OntologyError, Result};

const LOCAL_FMT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A timestamp in the fixed local wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OntTime(NaiveDateTime);

impl OntTime {
    /// Sentinel for "unknown start": the epoch.
    pub fn min_sentinel() -> OntTime {
        OntTime(epoch())
    }

    /// Sentinel for "never terminated": 9999-12-31 23:59:59.
    pub fn max_sentinel() -> OntTime {
        let date = NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or_default();
        OntTime(date.and_hms_opt(23, 59, 59).unwrap_or_default())
    }

    pub fn parse(value: &str) -> Result<OntTime> {
        NaiveDateTime::parse_from_str(value, LOCAL_FMT)
            .map(OntTime)
            .map_err(|_| OntologyError::InvalidTimestamp(value.to_string()))
    }

    pub fn is_min(&self) -> bool {
        *self == OntTime::min_sentinel()
    }

    pub fn is_max(&self) -> bool {
        *self == OntTime::max_sentinel()
    }

    pub fn inner(&self) -> NaiveDateTime {
        self.0
    }

    /// Offset helper used to synthesize strictly-ordered event times.
    pub fn plus_seconds(&self, seconds: i64) -> OntTime {
        OntTime(self.0 + Duration::seconds(seconds))
    }
}

impl From<NaiveDateTime> for OntTime {
    fn from(value: NaiveDateTime) -> Self {
        OntTime(value)
    }
}

impl fmt::Display for OntTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(LOCAL_FMT))
    }
}

impl Serialize for OntTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OntTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        OntTime::parse(&raw).map_err(serde::de::Error::custom)
    }
}

fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .unwrap_or_default()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_default()
}
