//! Fence timestamps.
//!
//! `last_polled` travels through task parameters as text, so it is kept at
//! whole-second precision everywhere; comparing a stored value against a
//! parsed task parameter must never differ by sub-second noise.

use chrono::{DateTime, NaiveDateTime, SubsecRound, TimeZone, Utc};

/// Format used for `last_polled` in task parameters.
pub const POLL_TASK_DATETIME_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// The fence value of a source that has never been polled.
pub fn never_polled() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// Truncate a timestamp to fence precision.
pub fn to_fence(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(0)
}

pub fn format_fence(at: DateTime<Utc>) -> String {
    at.format(POLL_TASK_DATETIME_FORMAT).to_string()
}

pub fn parse_fence(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let naive = NaiveDateTime::parse_from_str(value, POLL_TASK_DATETIME_FORMAT)?;
    Ok(Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_formats_like_a_task_param() {
        assert_eq!(format_fence(never_polled()), "1970-01-01-00-00-00");
        assert_eq!(parse_fence("1970-01-01-00-00-00").unwrap(), never_polled());
    }

    #[test]
    fn test_fence_survives_the_task_param_trip() {
        let now = to_fence(Utc::now());
        assert_eq!(parse_fence(&format_fence(now)).unwrap(), now);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_fence("yesterday").is_err());
    }
}
