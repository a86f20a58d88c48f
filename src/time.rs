//! Virtual time for the simulation kernel.
//!
//! A [`Time`] is a signed count of nanosecond ticks. It has no dependency on
//! the wall clock: it advances only when the kernel dispatches an event.

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

// ── Unit ──────────────────────────────────────────────────────────────

/// A unit that a [`Time`] can be built from or converted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Hours,
    Minutes,
    Seconds,
    Millis,
    Micros,
    Nanos,
}

impl Unit {
    /// Number of ticks in one of this unit.
    #[inline]
    pub const fn ticks(self) -> i64 {
        match self {
            Unit::Hours => 3_600_000_000_000,
            Unit::Minutes => 60_000_000_000,
            Unit::Seconds => 1_000_000_000,
            Unit::Millis => 1_000_000,
            Unit::Micros => 1_000,
            Unit::Nanos => 1,
        }
    }

    /// Suffix used when parsing time strings (`"10ms"`).
    pub const fn suffix(self) -> &'static str {
        match self {
            Unit::Hours => "h",
            Unit::Minutes => "min",
            Unit::Seconds => "s",
            Unit::Millis => "ms",
            Unit::Micros => "us",
            Unit::Nanos => "ns",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Unit> {
        match suffix {
            "h" => Some(Unit::Hours),
            "min" => Some(Unit::Minutes),
            "" | "s" => Some(Unit::Seconds),
            "ms" => Some(Unit::Millis),
            "us" => Some(Unit::Micros),
            "ns" => Some(Unit::Nanos),
            _ => None,
        }
    }
}

// ── Time ──────────────────────────────────────────────────────────────

/// A point in (or a span of) virtual time, in nanosecond ticks.
///
/// Ordering is the ordering of the tick count. Arithmetic through the
/// operators panics on overflow; use [`Time::checked_add`] and
/// [`Time::checked_sub`] to handle it instead.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Time(i64);

impl Time {
    /// The zero-point of simulation time.
    pub const ZERO: Time = Time(0);

    /// The largest representable time.
    pub const MAX: Time = Time(i64::MAX);

    /// The smallest representable time.
    pub const MIN: Time = Time(i64::MIN);

    /// Create a `Time` from a raw tick count.
    #[inline]
    pub const fn from_ticks(ticks: i64) -> Self {
        Time(ticks)
    }

    /// Return the raw tick count.
    #[inline]
    pub const fn ticks(self) -> i64 {
        self.0
    }

    /// Build a time from an integer count of `unit`.
    ///
    /// # Panics
    /// Panics if the result does not fit in the tick range.
    pub fn from_unit(value: i64, unit: Unit) -> Self {
        match Self::try_from_unit(value, unit) {
            Ok(t) => t,
            Err(e) => panic!("{e}"),
        }
    }

    /// Fallible form of [`Time::from_unit`].
    pub fn try_from_unit(value: i64, unit: Unit) -> SimResult<Self> {
        value
            .checked_mul(unit.ticks())
            .map(Time)
            .ok_or(SimError::TimeOverflow { op: "from_unit" })
    }

    /// Build a time from a fractional count of `unit`, rounded to the
    /// nearest tick.
    ///
    /// # Panics
    /// Panics if `value` is not finite or falls outside the tick range.
    pub fn from_f64(value: f64, unit: Unit) -> Self {
        match Self::try_from_f64(value, unit) {
            Ok(t) => t,
            Err(e) => panic!("{e}"),
        }
    }

    /// Fallible form of [`Time::from_f64`].
    pub fn try_from_f64(value: f64, unit: Unit) -> SimResult<Self> {
        let ticks = (value * unit.ticks() as f64).round();
        // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
        if !ticks.is_finite() || ticks >= i64::MAX as f64 || ticks < i64::MIN as f64 {
            return Err(SimError::TimeOverflow { op: "from_f64" });
        }
        Ok(Time(ticks as i64))
    }

    pub fn from_secs(secs: i64) -> Self {
        Self::from_unit(secs, Unit::Seconds)
    }

    pub fn from_millis(millis: i64) -> Self {
        Self::from_unit(millis, Unit::Millis)
    }

    pub fn from_micros(micros: i64) -> Self {
        Self::from_unit(micros, Unit::Micros)
    }

    #[inline]
    pub const fn from_nanos(nanos: i64) -> Self {
        Time(nanos)
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        Self::from_f64(secs, Unit::Seconds)
    }

    pub fn from_millis_f64(millis: f64) -> Self {
        Self::from_f64(millis, Unit::Millis)
    }

    pub fn from_micros_f64(micros: f64) -> Self {
        Self::from_f64(micros, Unit::Micros)
    }

    /// Whole number of `unit` in this time, truncated toward zero.
    #[inline]
    pub const fn as_unit(self, unit: Unit) -> i64 {
        self.0 / unit.ticks()
    }

    /// This time expressed as a fractional count of `unit`.
    #[inline]
    pub fn as_f64(self, unit: Unit) -> f64 {
        self.0 as f64 / unit.ticks() as f64
    }

    pub const fn as_secs(self) -> i64 {
        self.as_unit(Unit::Seconds)
    }

    pub const fn as_millis(self) -> i64 {
        self.as_unit(Unit::Millis)
    }

    pub const fn as_micros(self) -> i64 {
        self.as_unit(Unit::Micros)
    }

    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.as_f64(Unit::Seconds)
    }

    pub fn as_millis_f64(self) -> f64 {
        self.as_f64(Unit::Millis)
    }

    pub fn as_micros_f64(self) -> f64 {
        self.as_f64(Unit::Micros)
    }

    #[inline]
    pub fn checked_add(self, rhs: Time) -> Option<Time> {
        self.0.checked_add(rhs.0).map(Time)
    }

    #[inline]
    pub fn checked_sub(self, rhs: Time) -> Option<Time> {
        self.0.checked_sub(rhs.0).map(Time)
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Convert to a `Duration`. Returns `None` for negative times.
    pub fn to_duration(self) -> Option<Duration> {
        u64::try_from(self.0).ok().map(Duration::from_nanos)
    }
}

impl TryFrom<Duration> for Time {
    type Error = SimError;

    fn try_from(d: Duration) -> Result<Self, Self::Error> {
        i64::try_from(d.as_nanos())
            .map(Time)
            .map_err(|_| SimError::TimeOverflow { op: "from_duration" })
    }
}

impl Add for Time {
    type Output = Time;

    fn add(self, rhs: Time) -> Time {
        match self.checked_add(rhs) {
            Some(t) => t,
            None => panic!("{}", SimError::TimeOverflow { op: "add" }),
        }
    }
}

impl AddAssign for Time {
    fn add_assign(&mut self, rhs: Time) {
        *self = *self + rhs;
    }
}

impl Sub for Time {
    type Output = Time;

    fn sub(self, rhs: Time) -> Time {
        match self.checked_sub(rhs) {
            Some(t) => t,
            None => panic!("{}", SimError::TimeOverflow { op: "sub" }),
        }
    }
}

impl SubAssign for Time {
    fn sub_assign(&mut self, rhs: Time) {
        *self = *self - rhs;
    }
}

impl Mul<i64> for Time {
    type Output = Time;

    fn mul(self, rhs: i64) -> Time {
        match self.0.checked_mul(rhs) {
            Some(t) => Time(t),
            None => panic!("{}", SimError::TimeOverflow { op: "mul" }),
        }
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

/// Parses `<number><unit>`, e.g. `"10ms"`, `"1.5s"`, `"250us"`.
/// A bare number is read as seconds.
impl FromStr for Time {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_ascii_alphabetic())
            .unwrap_or(s.len());
        let (number, suffix) = s.split_at(split);
        let number = number.trim();
        let unit = Unit::from_suffix(suffix.trim())
            .ok_or_else(|| SimError::InvalidTime(s.to_string()))?;
        if number.is_empty() {
            return Err(SimError::InvalidTime(s.to_string()));
        }

        if let Ok(whole) = number.parse::<i64>() {
            return Time::try_from_unit(whole, unit);
        }
        let value: f64 = number
            .parse()
            .map_err(|_| SimError::InvalidTime(s.to_string()))?;
        Time::try_from_f64(value, unit)
    }
}
