//! Row expiry: TTL specifications and the client-side expiry check.
//!
//! The store deletes expired rows only eventually, so point reads and
//! multi-gets check the `ttl` column themselves. Range queries do not; see
//! [`crate::iterator`].

use chrono::{DateTime, Duration, Utc};
use raziel_model::{AttributeValue, Item};

use crate::error::{Error, Result};
use crate::key::TTL;

/// When a row expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ttl {
    /// Absolute epoch seconds; `0` means the row never expires.
    At(i64),
    /// `now`, a signed offset like `+4s` or `-1h`, an RFC 3339 timestamp, or
    /// bare epoch seconds.
    Spec(String),
}

impl Ttl {
    /// Normalize to epoch seconds relative to the current time.
    pub fn to_epoch_seconds(&self) -> Result<i64> {
        self.resolve(Utc::now())
    }

    /// Normalize to epoch seconds relative to `now`.
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<i64> {
        match self {
            Self::At(secs) => Ok(*secs),
            Self::Spec(spec) => parse_spec(spec, now),
        }
    }

    /// The `ttl` column value for this expiry. Zero means no expiry, so no
    /// column is written.
    pub fn to_attribute(&self) -> Result<Option<AttributeValue>> {
        let secs = self.to_epoch_seconds()?;
        Ok((secs != 0).then(|| AttributeValue::n(secs)))
    }
}

impl From<i64> for Ttl {
    fn from(secs: i64) -> Self {
        Self::At(secs)
    }
}

impl From<&str> for Ttl {
    fn from(spec: &str) -> Self {
        Self::Spec(spec.to_owned())
    }
}

impl From<String> for Ttl {
    fn from(spec: String) -> Self {
        Self::Spec(spec)
    }
}

impl From<DateTime<Utc>> for Ttl {
    fn from(at: DateTime<Utc>) -> Self {
        Self::At(at.timestamp())
    }
}

fn parse_spec(spec: &str, now: DateTime<Utc>) -> Result<i64> {
    let trimmed = spec.trim();
    let invalid = || Error::InvalidTtl(spec.to_owned());

    if trimmed.eq_ignore_ascii_case("now") {
        return Ok(now.timestamp());
    }
    // Bare epoch seconds carry no sign; `+5` without a unit is rejected below.
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return trimmed.parse::<i64>().map_err(|_| invalid());
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(at.timestamp());
    }

    let (sign, body) = match trimmed.as_bytes().first() {
        Some(b'+') => (1, &trimmed[1..]),
        Some(b'-') => (-1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    let offset = parse_offset(body).ok_or_else(invalid)?;
    let at = now
        .checked_add_signed(offset * sign)
        .ok_or_else(invalid)?;
    Ok(at.timestamp_millis().div_euclid(1000))
}

/// `<n><unit>` with units `ms`, `s`, `m`, `h`, `d`, `w`.
fn parse_offset(body: &str) -> Option<Duration> {
    let body = body.trim().to_ascii_lowercase();
    let (num, unit): (&str, fn(i64) -> Option<Duration>) =
        if let Some(n) = body.strip_suffix("ms") {
            (n, |v| Some(Duration::milliseconds(v)))
        } else if let Some(n) = body.strip_suffix('s') {
            (n, Duration::try_seconds)
        } else if let Some(n) = body.strip_suffix('m') {
            (n, Duration::try_minutes)
        } else if let Some(n) = body.strip_suffix('h') {
            (n, Duration::try_hours)
        } else if let Some(n) = body.strip_suffix('d') {
            (n, Duration::try_days)
        } else if let Some(n) = body.strip_suffix('w') {
            (n, Duration::try_weeks)
        } else {
            return None;
        };
    let value: i64 = num.trim().parse().ok()?;
    if value < 0 {
        return None;
    }
    unit(value)
}

/// The `ttl` column of a raw row, in epoch seconds.
#[must_use]
pub fn expiry(item: &Item) -> Option<f64> {
    item.get(TTL).and_then(AttributeValue::as_f64)
}

/// Whether `item` carries a ttl at or before `now`.
#[must_use]
pub fn is_expired_at(item: &Item, now: DateTime<Utc>) -> bool {
    #[allow(clippy::cast_precision_loss)]
    let now_ms = now.timestamp_millis() as f64;
    expiry(item).is_some_and(|ttl| ttl * 1000.0 <= now_ms)
}

/// Whether `item` carries a ttl at or before the current time.
#[must_use]
pub fn is_expired(item: &Item) -> bool {
    is_expired_at(item, Utc::now())
}
