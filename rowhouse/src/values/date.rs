use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Wrapper for the wire `Date` type: days since 1970-01-01, UTC.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd, Debug, Default)]
pub struct Date(pub u16);

impl Date {
    pub fn from_days(days: u16) -> Self {
        Date(days)
    }

    pub fn to_naive(self) -> NaiveDate {
        NaiveDate::from_num_days_from_ce_opt(Self::epoch().num_days_from_ce() + self.0 as i32)
            .expect("date in range")
    }

    fn epoch() -> NaiveDate {
        NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
    }
}

impl From<NaiveDate> for Date {
    fn from(other: NaiveDate) -> Self {
        let days = other.signed_duration_since(Self::epoch()).num_days();
        Date(days.clamp(0, u16::MAX as i64) as u16)
    }
}

/// Wrapper for the wire `DateTime` type: seconds since the unix epoch, with a
/// presentation-only timezone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DateTime(pub Tz, pub i32);

impl Default for DateTime {
    fn default() -> Self {
        Self(chrono_tz::UTC, 0)
    }
}

impl DateTime {
    pub fn timestamp(&self) -> i32 {
        self.1
    }

    pub fn to_chrono(&self) -> chrono::DateTime<Tz> {
        Utc.timestamp_opt(self.1 as i64, 0)
            .single()
            .expect("timestamp in range")
            .with_timezone(&self.0)
    }
}

impl From<chrono::DateTime<Tz>> for DateTime {
    fn from(other: chrono::DateTime<Tz>) -> Self {
        Self(other.timezone(), other.timestamp() as i32)
    }
}

impl From<chrono::DateTime<Utc>> for DateTime {
    fn from(other: chrono::DateTime<Utc>) -> Self {
        Self(chrono_tz::UTC, other.timestamp() as i32)
    }
}
