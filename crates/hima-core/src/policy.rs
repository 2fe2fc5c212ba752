//! Expiration arithmetic for free statuses
//!
//! Everything here is a pure function of its inputs. Callers pass `now`
//! explicitly; the all-day rule and the plan rollover are evaluated in the
//! time zone `now` carries.

use chrono::{DateTime, LocalResult, NaiveDate, Offset, TimeDelta, TimeZone, Timelike, Utc};
use hima_config::Locale;
use std::fmt;

use crate::{ExpirationRule, StatusOption};

/// Local hour at which all-day statuses end and yesterday's plans go stale
pub const ROLLOVER_HOUR: u32 = 3;

/// When a status picked at `now` should end. `None` for a status without
/// an end time.
pub fn compute_expiration<Tz: TimeZone>(
    option: &StatusOption,
    now: &DateTime<Tz>,
) -> Option<DateTime<Tz>> {
    match option.rule {
        ExpirationRule::Hours(hours) => {
            now.clone()
                .checked_add_signed(TimeDelta::hours(i64::from(hours)))
        }
        ExpirationRule::AllDay => next_rollover(now),
        ExpirationRule::None => None,
    }
}

/// `ROLLOVER_HOUR`:00 on the calendar day after `now`, in `now`'s zone
fn next_rollover<Tz: TimeZone>(now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    rollover_on(now.date_naive().succ_opt()?, now)
}

/// `ROLLOVER_HOUR`:00 on `day`, in `now`'s zone.
///
/// If that wall-clock time falls in a DST gap, the instant with the same UTC
/// offset as `now` is used. If it is ambiguous, the earlier instant wins.
fn rollover_on<Tz: TimeZone>(day: NaiveDate, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let tz = now.timezone();
    let rollover = day.and_hms_opt(ROLLOVER_HOUR, 0, 0)?;

    match tz.from_local_datetime(&rollover) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => {
            let offset = TimeDelta::seconds(i64::from(now.offset().fix().local_minus_utc()));
            let utc = rollover.checked_sub_signed(offset)?;
            Some(Utc.from_utc_datetime(&utc).with_timezone(&tz))
        }
    }
}

/// Whether a status ending at `expires_at` is over. A status with no end
/// never expires; the end instant itself still counts as active.
pub fn is_expired(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires_at.is_some_and(|expires_at| now > expires_at)
}

/// Time left on a status, split for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRemaining {
    Expired,
    Left { hours: i64, minutes: i64 },
}

impl TimeRemaining {
    /// `None` when there is no end time
    pub fn until(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<Self> {
        let millis = (expires_at? - now).num_milliseconds();
        if millis <= 0 {
            return Some(TimeRemaining::Expired);
        }

        Some(TimeRemaining::Left {
            hours: millis / 3_600_000,
            minutes: (millis % 3_600_000) / 60_000,
        })
    }

    pub fn render(&self, locale: Locale) -> String {
        match (self, locale) {
            (TimeRemaining::Expired, Locale::Ja) => "期限切れ".to_string(),
            (TimeRemaining::Expired, Locale::En) => "expired".to_string(),
            (TimeRemaining::Left { hours, minutes }, Locale::Ja) => {
                if *hours == 0 {
                    format!("あと{}分", minutes)
                } else if *minutes == 0 {
                    format!("あと{}時間", hours)
                } else {
                    format!("あと{}時間{}分", hours, minutes)
                }
            }
            (TimeRemaining::Left { hours, minutes }, Locale::En) => {
                if *hours == 0 {
                    format!("{} left", plural(*minutes, "minute"))
                } else if *minutes == 0 {
                    format!("{} left", plural(*hours, "hour"))
                } else {
                    format!("{} {} left", plural(*hours, "hour"), plural(*minutes, "minute"))
                }
            }
        }
    }
}

impl fmt::Display for TimeRemaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(Locale::default()))
    }
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", count, unit)
    }
}

/// Human-readable time left. Empty when there is no end time.
pub fn format_time_remaining(
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    locale: Locale,
) -> String {
    TimeRemaining::until(expires_at, now)
        .map(|remaining| remaining.render(locale))
        .unwrap_or_default()
}

/// Whether yesterday's tomorrow-plans are stale, i.e. `now` is at or past
/// today's rollover hour
pub fn should_clear_tomorrow_plans<Tz: TimeZone>(now: &DateTime<Tz>) -> bool {
    now.hour() >= ROLLOVER_HOUR
}

/// The latest rollover at or before `now`
pub fn previous_rollover<Tz: TimeZone>(now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let today = now.date_naive();
    let day = if should_clear_tomorrow_plans(now) {
        today
    } else {
        today.pred_opt()?
    };
    rollover_on(day, now)
}

/// Whether plans last written at `updated_at` predate the latest rollover,
/// so the "tomorrow" they describe has already begun. An unknown write time
/// counts as current.
pub fn plans_are_stale<Tz: TimeZone>(updated_at: Option<DateTime<Utc>>, now: &DateTime<Tz>) -> bool {
    match (updated_at, previous_rollover(now)) {
        (Some(updated_at), Some(rollover)) => updated_at < rollover.with_timezone(&Utc),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{status_option, STATUS_OPTIONS};
    use chrono::FixedOffset;

    fn utc(s: &str) -> DateTime<Utc> {
        hima_util::parse_instant(s).unwrap()
    }

    fn jst(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn all_day() -> &'static StatusOption {
        status_option("free_today").unwrap()
    }

    #[test]
    fn test_hours_rule_adds_exact_hours() {
        let now = utc("2024-01-01T08:15:42.123Z");
        for option in STATUS_OPTIONS {
            if let ExpirationRule::Hours(h) = option.rule {
                let expires = compute_expiration(option, &now).unwrap();
                assert_eq!(expires - now, TimeDelta::hours(i64::from(h)), "{}", option.id);
            }
        }
    }

    #[test]
    fn test_all_day_lands_on_next_day_rollover() {
        let times = [
            "2024-03-10T00:00:00+09:00",
            "2024-03-10T02:59:59+09:00",
            "2024-03-10T03:00:00+09:00",
            "2024-03-10T12:34:56+09:00",
            "2024-03-10T23:59:59+09:00",
        ];
        for t in times {
            let now = jst(t);
            let expires = compute_expiration(all_day(), &now).unwrap();
            assert_eq!(expires, jst("2024-03-11T03:00:00+09:00"), "from {}", t);
            assert!(expires > now);
        }
    }

    #[test]
    fn test_all_day_late_evening_scenario() {
        let now = jst("2024-03-10T23:30:00+09:00");
        let expires = compute_expiration(all_day(), &now).unwrap();
        assert_eq!(expires.to_rfc3339(), "2024-03-11T03:00:00+09:00");
    }

    #[test]
    fn test_all_day_in_utc() {
        let now = utc("2024-12-31T18:00:00Z");
        let expires = compute_expiration(all_day(), &now).unwrap();
        assert_eq!(expires, utc("2025-01-01T03:00:00Z"));
    }

    #[test]
    fn test_option_without_rule_never_expires() {
        let option = StatusOption {
            id: "free_open",
            label: "暇",
            rule: ExpirationRule::None,
        };
        assert_eq!(compute_expiration(&option, &utc("2024-01-01T00:00:00Z")), None);
    }

    #[test]
    fn test_compute_does_not_touch_now() {
        let now = utc("2024-01-01T00:00:00Z");
        let copy = now;
        let _ = compute_expiration(status_option("free_2h").unwrap(), &now);
        assert_eq!(now, copy);
    }

    #[test]
    fn test_is_expired() {
        let expires = utc("2024-01-01T10:00:00Z");
        let far_future = utc("9999-12-31T23:59:59Z");

        assert!(!is_expired(None, utc("2024-01-01T10:00:00Z")));
        assert!(!is_expired(None, far_future));
        assert!(!is_expired(Some(expires), expires));
        assert!(!is_expired(Some(expires), utc("2024-01-01T09:59:59Z")));
        assert!(is_expired(Some(expires), utc("2024-01-01T10:00:00.001Z")));
    }

    #[test]
    fn test_format_empty_without_expiration() {
        let now = utc("2024-01-01T00:00:00Z");
        assert_eq!(format_time_remaining(None, now, Locale::Ja), "");
        assert_eq!(format_time_remaining(None, now, Locale::En), "");
    }

    #[test]
    fn test_format_expired_marker() {
        let expires = utc("2024-01-01T10:00:00Z");
        for now in ["2024-01-01T10:00:00Z", "2024-01-01T10:00:01Z", "2024-01-02T00:00:00Z"] {
            assert_eq!(format_time_remaining(Some(expires), utc(now), Locale::Ja), "期限切れ");
            assert_eq!(format_time_remaining(Some(expires), utc(now), Locale::En), "expired");
        }
    }

    #[test]
    fn test_format_floors_minutes() {
        let now = utc("2024-01-01T10:00:00Z");
        let expires = now + TimeDelta::minutes(119) + TimeDelta::seconds(59);

        assert_eq!(format_time_remaining(Some(expires), now, Locale::Ja), "あと1時間59分");
        assert_eq!(
            format_time_remaining(Some(expires), now, Locale::En),
            "1 hour 59 minutes left"
        );
    }

    #[test]
    fn test_format_drops_zero_parts() {
        let now = utc("2024-01-01T10:00:00Z");

        let two_hours = now + TimeDelta::hours(2);
        assert_eq!(format_time_remaining(Some(two_hours), now, Locale::Ja), "あと2時間");
        assert_eq!(format_time_remaining(Some(two_hours), now, Locale::En), "2 hours left");

        let minutes = now + TimeDelta::minutes(59);
        assert_eq!(format_time_remaining(Some(minutes), now, Locale::Ja), "あと59分");
        assert_eq!(format_time_remaining(Some(minutes), now, Locale::En), "59 minutes left");

        let seconds = now + TimeDelta::seconds(30);
        assert_eq!(format_time_remaining(Some(seconds), now, Locale::Ja), "あと0分");
    }

    #[test]
    fn test_remaining_shrinks_as_time_passes() {
        let expires = utc("2024-01-01T12:00:00Z");
        let mut previous = i64::MAX;
        for offset in (0..=245).step_by(7) {
            let now = utc("2024-01-01T08:00:00Z") + TimeDelta::minutes(offset);
            let total = match TimeRemaining::until(Some(expires), now).unwrap() {
                TimeRemaining::Left { hours, minutes } => hours * 60 + minutes,
                TimeRemaining::Expired => -1,
            };
            assert!(total <= previous);
            previous = total;
        }
        assert_eq!(previous, -1);
    }

    #[test]
    fn test_should_clear_tomorrow_plans() {
        assert!(!should_clear_tomorrow_plans(&jst("2024-03-10T02:59:59+09:00")));
        assert!(should_clear_tomorrow_plans(&jst("2024-03-10T03:00:00+09:00")));
        assert!(should_clear_tomorrow_plans(&jst("2024-03-10T23:00:00+09:00")));
    }

    #[test]
    fn test_previous_rollover() {
        assert_eq!(
            previous_rollover(&jst("2024-03-10T02:59:59+09:00")),
            Some(jst("2024-03-09T03:00:00+09:00"))
        );
        assert_eq!(
            previous_rollover(&jst("2024-03-10T03:00:00+09:00")),
            Some(jst("2024-03-10T03:00:00+09:00"))
        );
        assert_eq!(
            previous_rollover(&jst("2024-03-10T23:30:00+09:00")),
            Some(jst("2024-03-10T03:00:00+09:00"))
        );
    }

    #[test]
    fn test_plans_are_stale() {
        let now = jst("2024-03-10T09:00:00+09:00");

        // Saved last night, before this morning's rollover
        assert!(plans_are_stale(Some(utc("2024-03-09T13:00:00Z")), &now));
        // Saved after the rollover
        assert!(!plans_are_stale(Some(utc("2024-03-09T18:00:00Z")), &now));
        assert!(!plans_are_stale(None, &now));

        // Before 03:00 yesterday evening's plans are still for "tomorrow"
        let early = jst("2024-03-10T01:00:00+09:00");
        assert!(!plans_are_stale(Some(utc("2024-03-09T13:00:00Z")), &early));
    }

    #[test]
    fn test_all_day_rollover_in_spring_gap_keeps_current_offset() {
        use chrono_tz::Europe::Helsinki;

        // On 2024-03-31 Helsinki clocks jump from 03:00 to 04:00
        let now = Helsinki.with_ymd_and_hms(2024, 3, 30, 20, 0, 0).unwrap();
        assert!(matches!(
            Helsinki.with_ymd_and_hms(2024, 3, 31, ROLLOVER_HOUR, 0, 0),
            LocalResult::None
        ));

        let expires = compute_expiration(all_day(), &now).unwrap();
        // 03:00 at the +02:00 offset `now` carries
        assert_eq!(expires.with_timezone(&Utc), utc("2024-03-31T01:00:00Z"));
        assert!(expires > now);
    }

    #[test]
    fn test_all_day_rollover_in_autumn_fold_takes_earlier_instant() {
        use chrono_tz::Europe::Helsinki;

        // On 2024-10-27 Helsinki clocks fall back from 04:00 to 03:00
        let now = Helsinki.with_ymd_and_hms(2024, 10, 26, 20, 0, 0).unwrap();
        assert!(matches!(
            Helsinki.with_ymd_and_hms(2024, 10, 27, ROLLOVER_HOUR, 0, 0),
            LocalResult::Ambiguous(_, _)
        ));

        let expires = compute_expiration(all_day(), &now).unwrap();
        // 03:00 summer time (+03:00), not 03:00 winter time (+02:00)
        assert_eq!(expires.with_timezone(&Utc), utc("2024-10-27T00:00:00Z"));
    }

    #[test]
    fn test_all_day_rollover_on_ordinary_zone_day() {
        use chrono_tz::Asia::Tokyo;

        let now = Tokyo.with_ymd_and_hms(2024, 3, 10, 23, 30, 0).unwrap();
        let expires = compute_expiration(all_day(), &now).unwrap();
        assert_eq!(expires.with_timezone(&Utc), utc("2024-03-10T18:00:00Z"));
    }

    #[test]
    fn test_display_uses_default_locale() {
        let remaining = TimeRemaining::Left {
            hours: 1,
            minutes: 5,
        };
        assert_eq!(remaining.to_string(), "あと1時間5分");
    }
}
