//! Cron synthesis
//!
//! Turns a recurring trigger schedule into the six-field cron expression
//! (seconds first) understood by the recurring engine.

use keel_core::domain::trigger::{Frequency, Schedule};

use crate::error::RegistrationError;

/// Build the cron expression of a recurring schedule
///
/// # Arguments
/// * `id` - Trigger ID, reported in errors
/// * `schedule` - Any schedule except `unix_stamp`
pub fn cron_expression(id: &str, schedule: &Schedule) -> Result<String, RegistrationError> {
    match schedule {
        Schedule::Crontab { cron } => {
            let fields = cron.split_whitespace().count();
            if fields != 5 {
                return Err(RegistrationError::invalid(
                    id,
                    format!("cron '{}' has {} field(s), expected 5", cron, fields),
                ));
            }
            Ok(format!("0 {}", cron.trim()))
        }
        Schedule::Timing { time, frequency } => {
            let (hour, minute) = parse_clock(time).ok_or_else(|| {
                RegistrationError::invalid(id, format!("malformed time '{}'", time))
            })?;
            let weekday = day_of_week(*frequency).ok_or_else(|| {
                RegistrationError::invalid(
                    id,
                    format!("frequency {:?} does not fit a timing schedule", frequency),
                )
            })?;
            Ok(format!("0 {} {} * * {}", minute, hour, weekday))
        }
        Schedule::Gap { frequency, number } => {
            if *number == 0 {
                return Err(RegistrationError::invalid(id, "gap must be at least 1"));
            }
            match frequency {
                Frequency::Minutes => Ok(format!("0 0/{} * * * *", number)),
                Frequency::Hours => Ok(format!("0 0 0/{} * * *", number)),
                other => Err(RegistrationError::invalid(
                    id,
                    format!("frequency {:?} does not fit a gap schedule", other),
                )),
            }
        }
        Schedule::UnixStamp { .. } => Err(RegistrationError::invalid(
            id,
            "one-shot schedule has no cron form",
        )),
    }
}

/// Parse `HH:MM`
fn parse_clock(time: &str) -> Option<(u32, u32)> {
    let (hour, minute) = time.trim().split_once(':')?;
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    (hour < 24 && minute < 60).then_some((hour, minute))
}

fn day_of_week(frequency: Frequency) -> Option<&'static str> {
    let day = match frequency {
        Frequency::Day => "*",
        Frequency::Monday => "MON",
        Frequency::Tuesday => "TUE",
        Frequency::Wednesday => "WED",
        Frequency::Thursday => "THU",
        Frequency::Friday => "FRI",
        Frequency::Saturday => "SAT",
        Frequency::Sunday => "SUN",
        Frequency::Minutes | Frequency::Hours => return None,
    };
    Some(day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing(time: &str, frequency: Frequency) -> Schedule {
        Schedule::Timing {
            time: time.to_string(),
            frequency,
        }
    }

    #[test]
    fn test_crontab_gets_seconds_field() {
        let schedule = Schedule::Crontab {
            cron: "*/5 * * * *".to_string(),
        };
        assert_eq!(cron_expression("t1", &schedule).unwrap(), "0 */5 * * * *");
    }

    #[test]
    fn test_crontab_with_wrong_field_count_is_rejected() {
        let schedule = Schedule::Crontab {
            cron: "0 */5 * * * *".to_string(),
        };
        assert!(matches!(
            cron_expression("t1", &schedule),
            Err(RegistrationError::InvalidSchedule { .. })
        ));
    }

    #[test]
    fn test_timing_daily_and_weekly() {
        assert_eq!(
            cron_expression("t1", &timing("02:30", Frequency::Day)).unwrap(),
            "0 30 2 * * *"
        );
        assert_eq!(
            cron_expression("t1", &timing("18:05", Frequency::Friday)).unwrap(),
            "0 5 18 * * FRI"
        );
        assert_eq!(
            cron_expression("t1", &timing("00:00", Frequency::Sunday)).unwrap(),
            "0 0 0 * * SUN"
        );
    }

    #[test]
    fn test_timing_rejects_bad_input() {
        for time in ["2:3:0", "24:00", "12:60", "noon", ""] {
            assert!(
                cron_expression("t1", &timing(time, Frequency::Day)).is_err(),
                "accepted {:?}",
                time
            );
        }
        assert!(cron_expression("t1", &timing("02:30", Frequency::Hours)).is_err());
    }

    #[test]
    fn test_gap_schedules() {
        let every = |frequency, number| Schedule::Gap { frequency, number };

        assert_eq!(
            cron_expression("t1", &every(Frequency::Minutes, 15)).unwrap(),
            "0 0/15 * * * *"
        );
        assert_eq!(
            cron_expression("t1", &every(Frequency::Hours, 2)).unwrap(),
            "0 0 0/2 * * *"
        );
        assert!(cron_expression("t1", &every(Frequency::Hours, 0)).is_err());
        assert!(cron_expression("t1", &every(Frequency::Monday, 1)).is_err());
    }

    #[test]
    fn test_unix_stamp_has_no_cron() {
        let schedule = Schedule::UnixStamp { unix_stamp: 0 };
        assert!(cron_expression("t1", &schedule).is_err());
    }
}
