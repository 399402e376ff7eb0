//! Recurrence cadences, calendar stepping, and the per-cadence policy table.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// How often an entry repeats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Recurrence {
    #[default]
    OneTime,
    Daily,
    Weekly,
    BiWeekly,
    Monthly,
    Quarterly,
    Annual,
}

impl Recurrence {
    pub const ALL: [Recurrence; 7] = [
        Recurrence::OneTime,
        Recurrence::Daily,
        Recurrence::Weekly,
        Recurrence::BiWeekly,
        Recurrence::Monthly,
        Recurrence::Quarterly,
        Recurrence::Annual,
    ];

    pub fn is_recurring(self) -> bool {
        !matches!(self, Recurrence::OneTime)
    }

    /// Returns the date of the occurrence following `from`, keeping the time of day.
    ///
    /// Calendar-month steps clamp the day to the end of the target month, so
    /// `Jan 31 + 1 month` lands on the last day of February. Returns `None` for
    /// one-time entries and when the result falls outside the representable range.
    pub fn next_date(self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Recurrence::OneTime => None,
            Recurrence::Daily => from.checked_add_signed(Duration::days(1)),
            Recurrence::Weekly => from.checked_add_signed(Duration::weeks(1)),
            Recurrence::BiWeekly => from.checked_add_signed(Duration::weeks(2)),
            Recurrence::Monthly => shift_months(from, 1),
            Recurrence::Quarterly => shift_months(from, 3),
            Recurrence::Annual => shift_months(from, 12),
        }
    }

    /// Looks up the visibility window and notification lead for this cadence.
    pub fn policy(self) -> RecurrencePolicy {
        match self {
            Recurrence::OneTime => RecurrencePolicy::new(Duration::days(365), Duration::zero()),
            Recurrence::Daily => RecurrencePolicy::new(Duration::days(7), Duration::zero()),
            Recurrence::Weekly => RecurrencePolicy::new(Duration::days(28), Duration::days(1)),
            Recurrence::BiWeekly => RecurrencePolicy::new(Duration::days(56), Duration::days(2)),
            Recurrence::Monthly => RecurrencePolicy::new(Duration::days(90), Duration::days(3)),
            Recurrence::Quarterly => RecurrencePolicy::new(Duration::days(365), Duration::days(7)),
            Recurrence::Annual => RecurrencePolicy::new(Duration::days(730), Duration::days(14)),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Recurrence::OneTime => "One-time",
            Recurrence::Daily => "Daily",
            Recurrence::Weekly => "Weekly",
            Recurrence::BiWeekly => "Bi-weekly",
            Recurrence::Monthly => "Monthly",
            Recurrence::Quarterly => "Quarterly",
            Recurrence::Annual => "Annual",
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Immutable scheduling policy attached to a cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurrencePolicy {
    /// How far past "now" pending occurrences are materialized.
    pub visibility_window: Duration,
    /// How long before an occurrence a reminder would fire. Delivery is external.
    pub pre_notification_lead: Duration,
}

impl RecurrencePolicy {
    fn new(visibility_window: Duration, pre_notification_lead: Duration) -> Self {
        Self {
            visibility_window,
            pre_notification_lead,
        }
    }

    /// Last instant (inclusive) that generation may reach when run at `now`.
    pub fn horizon(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.visibility_window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// When a reminder for an occurrence dated `date` becomes due.
    pub fn notify_at(&self, date: DateTime<Utc>) -> DateTime<Utc> {
        date.checked_sub_signed(self.pre_notification_lead)
            .unwrap_or(date)
    }
}

fn shift_months(from: DateTime<Utc>, months: i32) -> Option<DateTime<Utc>> {
    let date = shift_month(from.date_naive(), months)?;
    Some(date.and_time(from.time()).and_utc())
}

fn shift_month(date: NaiveDate, months: i32) -> Option<NaiveDate> {
    let index = date.year() * 12 + date.month0() as i32 + months;
    let year = index.div_euclid(12);
    let month = index.rem_euclid(12) as u32 + 1;
    let day = date.day().min(days_in_month(year, month)?);
    NaiveDate::from_ymd_opt(year, month, day)
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 30, 0).unwrap()
    }

    #[test]
    fn fixed_cadences_step_by_days() {
        let start = at(2025, 1, 1);
        assert_eq!(Recurrence::Daily.next_date(start), Some(at(2025, 1, 2)));
        assert_eq!(Recurrence::Weekly.next_date(start), Some(at(2025, 1, 8)));
        assert_eq!(Recurrence::BiWeekly.next_date(start), Some(at(2025, 1, 15)));
        assert_eq!(Recurrence::OneTime.next_date(start), None);
    }

    #[test]
    fn calendar_cadences_clamp_to_month_end() {
        assert_eq!(
            Recurrence::Monthly.next_date(at(2025, 1, 31)),
            Some(at(2025, 2, 28))
        );
        assert_eq!(
            Recurrence::Quarterly.next_date(at(2024, 11, 30)),
            Some(at(2025, 2, 28))
        );
        assert_eq!(
            Recurrence::Annual.next_date(at(2024, 2, 29)),
            Some(at(2025, 2, 28))
        );
        assert_eq!(
            Recurrence::Monthly.next_date(at(2025, 12, 15)),
            Some(at(2026, 1, 15))
        );
    }

    #[test]
    fn one_time_policy_has_one_year_window_and_no_lead() {
        let policy = Recurrence::OneTime.policy();
        assert_eq!(policy.visibility_window, Duration::days(365));
        assert_eq!(policy.pre_notification_lead, Duration::zero());
    }

    #[test]
    fn policy_windows_cover_at_least_one_step() {
        let now = at(2025, 3, 1);
        for recurrence in Recurrence::ALL.into_iter().filter(|r| r.is_recurring()) {
            let next = recurrence.next_date(now).unwrap();
            assert!(
                next <= recurrence.policy().horizon(now),
                "{recurrence} window shorter than a single step"
            );
        }
    }

    #[test]
    fn notify_at_subtracts_lead() {
        let policy = Recurrence::Monthly.policy();
        assert_eq!(policy.notify_at(at(2025, 3, 10)), at(2025, 3, 7));
    }
}
