//! Value types carried by the wire protocol's specialized columns.
//!
//! Dates are stored in their on-wire representation (days or seconds since
//! the Unix epoch, or sub-second ticks for [`DateTime64`]) and convert to
//! and from [`chrono`] values at the edges.

use std::fmt;

use chrono::{TimeDelta, Utc};
use primitive_types::U256;

/// 256-bit unsigned integer column value.
pub type UInt256 = U256;

/// 256-bit signed integer, stored as two's-complement bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Int256(pub U256);

impl Int256 {
    pub fn from_i64(value: i64) -> Self {
        if value < 0 {
            Int256((!U256::from(value.unsigned_abs())).overflowing_add(U256::one()).0)
        } else {
            Int256(U256::from(value as u64))
        }
    }
}

impl From<i64> for Int256 {
    fn from(value: i64) -> Self {
        Int256::from_i64(value)
    }
}

/// Fixed-point decimal with a 32-bit mantissa.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Decimal32(pub i32);

/// Fixed-point decimal with a 64-bit mantissa.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Decimal64(pub i64);

/// Fixed-point decimal with a 128-bit mantissa.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Decimal128(pub i128);

/// Fixed-point decimal with a 256-bit mantissa.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Decimal256(pub Int256);

/// Unit of an [`Interval`] value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum IntervalScale {
    Nanosecond,
    Microsecond,
    Millisecond,
    #[default]
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

/// Interval column value: a count of [`IntervalScale`] units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Interval {
    pub scale: IntervalScale,
    pub value: i64,
}

/// Geographic point column value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Placeholder value for the server's `Nothing` column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Nothing;

/// Days since the Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Date(pub u16);

impl Date {
    pub fn from_time(time: chrono::DateTime<Utc>) -> Self {
        Date((time - chrono::DateTime::<Utc>::UNIX_EPOCH).num_days() as u16)
    }

    pub fn to_time(self) -> chrono::DateTime<Utc> {
        chrono::DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(i64::from(self.0))
    }
}

/// Days since the Unix epoch, signed for the extended range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Date32(pub i32);

impl Date32 {
    pub fn from_time(time: chrono::DateTime<Utc>) -> Self {
        Date32((time - chrono::DateTime::<Utc>::UNIX_EPOCH).num_days() as i32)
    }

    pub fn to_time(self) -> chrono::DateTime<Utc> {
        chrono::DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(i64::from(self.0))
    }
}

/// Seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateTime(pub u32);

impl DateTime {
    pub fn from_time(time: chrono::DateTime<Utc>) -> Self {
        DateTime(time.timestamp() as u32)
    }

    pub fn to_time(self) -> chrono::DateTime<Utc> {
        chrono::DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(i64::from(self.0))
    }
}

/// Sub-second precision of a [`DateTime64`] column, in decimal digits (0..=9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Precision(u8);

impl Precision {
    pub const MILLI: Precision = Precision(3);
    pub const MICRO: Precision = Precision(6);
    pub const NANO: Precision = Precision(9);
    /// Finest precision a datetime64 column supports.
    pub const MAX: Precision = Precision(9);

    pub fn new(digits: u8) -> Option<Self> {
        (digits <= 9).then_some(Precision(digits))
    }

    pub fn digits(self) -> u8 {
        self.0
    }

    fn ticks_per_second(self) -> i64 {
        10i64.pow(u32::from(self.0))
    }

    fn nanos_per_tick(self) -> i64 {
        10i64.pow(9 - u32::from(self.0))
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ticks since the Unix epoch; the tick length is the column's [`Precision`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateTime64(pub i64);

impl DateTime64 {
    pub fn from_time(time: chrono::DateTime<Utc>, precision: Precision) -> Self {
        let ticks = time.timestamp() * precision.ticks_per_second()
            + i64::from(time.timestamp_subsec_nanos()) / precision.nanos_per_tick();
        DateTime64(ticks)
    }

    pub fn to_time(self, precision: Precision) -> chrono::DateTime<Utc> {
        let per_second = precision.ticks_per_second();
        chrono::DateTime::<Utc>::UNIX_EPOCH
            + TimeDelta::seconds(self.0.div_euclid(per_second))
            + TimeDelta::nanoseconds(self.0.rem_euclid(per_second) * precision.nanos_per_tick())
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
