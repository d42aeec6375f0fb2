//! Identity and time types shared by every part of the user core.
//!
//! Identities are smart-constructed so that a `UserId` in hand is always a
//! well-formed, store-assignable identity.

use chrono::{DateTime, Duration, Utc};
use nutype::nutype;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a stored user.
///
/// `UserId` values are guaranteed to be UUIDv7, which gives:
/// - Time-ordered generation with a random tail, so concurrent callers do
///   not collide the way a millisecond clock plus a small random offset does
/// - A total order usable as a deterministic tie-breaker in queries
#[nutype(
    validate(predicate = |id: &Uuid| id.get_version() == Some(uuid::Version::SortRand)),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct UserId(Uuid);

impl UserId {
    /// Generates a fresh identity.
    pub fn new() -> Self {
        // Uuid::now_v7() always yields a v7 UUID
        Self::try_new(Uuid::now_v7()).expect("Uuid::now_v7() should always return a valid v7 UUID")
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

/// A point in time, always UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a new timestamp from a UTC `DateTime`.
    pub const fn new(datetime: DateTime<Utc>) -> Self {
        Self(datetime)
    }

    /// Creates a timestamp representing the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the underlying `DateTime`.
    pub const fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Returns this timestamp shifted by `delta`, saturating at the
    /// representable range.
    #[must_use]
    pub fn offset_by(self, delta: Duration) -> Self {
        Self(self.0.checked_add_signed(delta).unwrap_or(self.0))
    }

    /// True when this timestamp lies within the last `days` days of `now`.
    pub fn is_within_last_days(self, days: u32, now: Self) -> bool {
        now.0
            .checked_sub_signed(Duration::days(i64::from(days)))
            .is_none_or(|cutoff| self.0 > cutoff)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(datetime: DateTime<Utc>) -> Self {
        Self::new(datetime)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(timestamp: Timestamp) -> Self {
        timestamp.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.to_rfc3339().fmt(f)
    }
}

impl std::str::FromStr for Timestamp {
    type Err = chrono::ParseError;

    /// Parses an RFC 3339 timestamp, normalizing any offset to UTC.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DateTime::parse_from_rfc3339(s).map(|parsed| Self(parsed.with_timezone(&Utc)))
    }
}
