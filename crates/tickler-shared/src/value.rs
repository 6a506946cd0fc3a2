//! Validated wrappers for constrained primitives.
//!
//! Every entity field that carries a semantic constraint is one of these
//! types.  Construction is the only way in and it rejects out-of-domain input
//! with [`InvalidData`], so a value that exists is a value that is valid.
//! Deserialization goes through the same constructors.
//!
//! Values are immutable unless the type explicitly offers a `set` method
//! (currently only [`TaskCategory`]), which re-validates.

use std::fmt;

use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{
    CATEGORY_MAX_LEN, CATEGORY_MIN_LEN, DESCRIPTION_MAX_LEN, DESCRIPTION_MIN_LEN,
    RECURRENCE_MAX_LEN, RECURRENCE_MIN_LEN, SNOWFLAKE_MIN, TIMESTAMP_MAX_SECS, TITLE_MAX_LEN,
    TITLE_MIN_LEN, UTC_OFFSET_BOUND_HOURS,
};
use crate::error::InvalidData;

fn check_len(entity: &'static str, value: &str, min: usize, max: usize) -> Result<(), InvalidData> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(InvalidData::new(
            entity,
            format!("length should be from {min} to {max} only."),
        ));
    }
    Ok(())
}

macro_rules! bounded_string {
    ($(#[$meta:meta])* $name:ident, $min:expr, $max:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub const MIN_LEN: usize = $min;
            pub const MAX_LEN: usize = $max;

            /// Trim and validate `value`.
            pub fn new(value: impl AsRef<str>) -> Result<Self, InvalidData> {
                let value = value.as_ref().trim();
                check_len(stringify!($name), value, $min, $max)?;
                Ok(Self(value.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = InvalidData;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

bounded_string!(
    /// Task title, 1 to 200 characters.
    TaskTitle,
    TITLE_MIN_LEN,
    TITLE_MAX_LEN
);

bounded_string!(
    /// Task category, up to 50 characters.  Mutable (category rename).
    TaskCategory,
    CATEGORY_MIN_LEN,
    CATEGORY_MAX_LEN
);

bounded_string!(
    /// Free-form task description, up to 4000 characters.
    TaskDescription,
    DESCRIPTION_MIN_LEN,
    DESCRIPTION_MAX_LEN
);

bounded_string!(
    /// Serialized recurrence descriptor text.
    RecurrenceText,
    RECURRENCE_MIN_LEN,
    RECURRENCE_MAX_LEN
);

impl TaskCategory {
    /// Replace the category name, re-validating the new value.
    ///
    /// On error the current value is left untouched.
    pub fn set(&mut self, value: impl AsRef<str>) -> Result<(), InvalidData> {
        *self = Self::new(value)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// 32-character lowercase hex identifier (a UUID in simple form).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityUuid(String);

impl EntityUuid {
    pub fn new(value: impl AsRef<str>) -> Result<Self, InvalidData> {
        let value = value.as_ref().trim();
        check_len("EntityUuid", value, 32, 32)?;
        if !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(InvalidData::new("EntityUuid", "should only contain hex digits."));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EntityUuid {
    type Error = InvalidData;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntityUuid> for String {
    fn from(value: EntityUuid) -> Self {
        value.0
    }
}

impl fmt::Display for EntityUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Chat-platform numeric id (user or channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct SnowflakeId(u64);

impl SnowflakeId {
    pub fn new(value: u64) -> Result<Self, InvalidData> {
        if value < SNOWFLAKE_MIN {
            return Err(InvalidData::new(
                "SnowflakeId",
                format!("value should be from {SNOWFLAKE_MIN} to {} only.", u64::MAX),
            ));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for SnowflakeId {
    type Error = InvalidData;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SnowflakeId> for u64 {
    fn from(value: SnowflakeId) -> Self {
        value.0
    }
}

impl fmt::Display for SnowflakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// An absolute instant between the unix epoch and 9 999 999 999 seconds,
/// held at whole-second precision.
///
/// Persisted as RFC 3339 text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn new<Tz: TimeZone>(value: DateTime<Tz>) -> Result<Self, InvalidData> {
        let secs = value.timestamp();
        if !(0..=TIMESTAMP_MAX_SECS).contains(&secs) {
            return Err(InvalidData::new(
                "Timestamp",
                format!("value should be from 0 to {TIMESTAMP_MAX_SECS} only."),
            ));
        }
        DateTime::from_timestamp(secs, 0)
            .map(Self)
            .ok_or_else(|| InvalidData::new("Timestamp", "is not a representable instant."))
    }

    pub fn from_unix_secs(secs: i64) -> Result<Self, InvalidData> {
        let value = DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| InvalidData::new("Timestamp", "is not a representable instant."))?;
        Self::new(value)
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// The same instant seen from `offset`.
    pub fn local(&self, offset: &UtcOffset) -> DateTime<FixedOffset> {
        self.0.with_timezone(&offset.fixed())
    }
}

impl TryFrom<String> for Timestamp {
    type Error = InvalidData;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let parsed = DateTime::parse_from_rfc3339(&value)
            .map_err(|e| InvalidData::new("Timestamp", format!("is not RFC 3339: {e}")))?;
        Self::new(parsed)
    }
}

impl From<Timestamp> for String {
    fn from(value: Timestamp) -> Self {
        value.0.to_rfc3339()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339())
    }
}

/// Offset from UTC in hours, strictly between -24 and 24.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct UtcOffset(f64);

impl UtcOffset {
    pub const UTC: UtcOffset = UtcOffset(0.0);

    pub fn new(hours: f64) -> Result<Self, InvalidData> {
        // Written so that NaN is rejected too.
        if !(hours > -UTC_OFFSET_BOUND_HOURS && hours < UTC_OFFSET_BOUND_HOURS) {
            return Err(InvalidData::new(
                "UtcOffset",
                format!(
                    "value should be between -{UTC_OFFSET_BOUND_HOURS} and {UTC_OFFSET_BOUND_HOURS} only."
                ),
            ));
        }
        Ok(Self(hours))
    }

    pub fn hours(self) -> f64 {
        self.0
    }

    /// The equivalent chrono offset, rounded to the second.
    pub fn fixed(&self) -> FixedOffset {
        let secs = (self.0 * 3600.0).round() as i32;
        // |secs| < 86 400 by construction, which is exactly chrono's range.
        FixedOffset::east_opt(secs).unwrap_or_else(|| Utc.fix())
    }
}

impl TryFrom<f64> for UtcOffset {
    type Error = InvalidData;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UtcOffset> for f64 {
    fn from(value: UtcOffset) -> Self {
        value.0
    }
}

impl fmt::Display for UtcOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UTC{:+}", self.0)
    }
}

/// Whether a task is flagged as important.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Importance(bool);

impl Importance {
    pub const NORMAL: Importance = Importance(false);
    pub const IMPORTANT: Importance = Importance(true);

    pub fn new(is_important: bool) -> Self {
        Self(is_important)
    }

    pub fn is_important(self) -> bool {
        self.0
    }
}
