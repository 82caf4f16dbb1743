use chrono::{DateTime, Utc};

/// Source of the current time.
///
/// The build reads the clock once; the time only ends up in a few explicitly time-stamped names.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// `20210101010101`
pub fn compact_timestamp(time: DateTime<Utc>) -> String {
    time.format("%Y%m%d%H%M%S").to_string()
}

/// `202101010101`
pub fn minute_timestamp(time: DateTime<Utc>) -> String {
    time.format("%Y%m%d%H%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps() {
        let time = Utc.with_ymd_and_hms(2021, 1, 1, 1, 1, 1).unwrap();
        assert_eq!(compact_timestamp(time), "20210101010101");
        assert_eq!(minute_timestamp(time), "202101010101");
        assert_eq!(FixedClock(time).now(), time);
    }
}
