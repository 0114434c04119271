use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};

use crate::models::{AttendanceAggregate, AttendanceEvent, AttendanceStatus};

/// Date range the attendance history is cut to before aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceWindow {
    /// From the first day of `start_month` of the current school year.
    SchoolYear { start_month: u32 },
    /// The last `days` calendar days, today included.
    Rolling { days: i64 },
}

impl Default for AttendanceWindow {
    fn default() -> Self {
        Self::SchoolYear { start_month: 2 }
    }
}

impl AttendanceWindow {
    /// First day included in the window, relative to `today`.
    pub fn start(&self, today: NaiveDate) -> NaiveDate {
        match *self {
            Self::SchoolYear { start_month } => {
                let month = start_month.clamp(1, 12);
                let year = if today.month() >= month {
                    today.year()
                } else {
                    today.year() - 1
                };
                NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(today)
            }
            Self::Rolling { days } => today
                .checked_sub_signed(Duration::days(days.max(1) - 1))
                .unwrap_or(NaiveDate::MIN),
        }
    }

    pub fn contains(&self, today: NaiveDate, date: NaiveDate) -> bool {
        date >= self.start(today) && date <= today
    }
}

/// Folds one student's attendance history into counters and the longest
/// absence streak. Later events for the same date replace earlier ones.
pub fn aggregate(events: &[AttendanceEvent]) -> AttendanceAggregate {
    let mut by_date: BTreeMap<NaiveDate, &AttendanceStatus> = BTreeMap::new();
    for event in events {
        if let AttendanceStatus::Unrecognized(raw) = &event.status {
            tracing::warn!(
                student_id = event.student_id,
                date = %event.date,
                status = %raw,
                "unrecognized attendance status dropped"
            );
            continue;
        }
        by_date.insert(event.date, &event.status);
    }

    let mut aggregate = AttendanceAggregate::default();
    let mut streak = 0u32;

    for status in by_date.values() {
        aggregate.total_records += 1;
        match status {
            AttendanceStatus::Present => {
                aggregate.present_count += 1;
                streak = 0;
            }
            AttendanceStatus::Justified => {
                aggregate.justified_count += 1;
                streak = 0;
            }
            AttendanceStatus::Absent | AttendanceStatus::ControlledAbsence => {
                aggregate.absent_count += 1;
                if matches!(status, AttendanceStatus::ControlledAbsence) {
                    aggregate.controlled_count += 1;
                }
                streak += 1;
                aggregate.max_consecutive_absences =
                    aggregate.max_consecutive_absences.max(streak);
            }
            AttendanceStatus::Unrecognized(_) => {}
        }
    }

    aggregate
}

pub fn aggregate_in_window(
    events: &[AttendanceEvent],
    window: AttendanceWindow,
    today: NaiveDate,
) -> AttendanceAggregate {
    let scoped: Vec<AttendanceEvent> = events
        .iter()
        .filter(|event| window.contains(today, event.date))
        .cloned()
        .collect();
    aggregate(&scoped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap() + Duration::days(offset)
    }

    fn mark(offset: i64, status: AttendanceStatus) -> AttendanceEvent {
        AttendanceEvent {
            student_id: 7,
            date: day(offset),
            status,
        }
    }

    fn from_codes(codes: &str) -> Vec<AttendanceEvent> {
        codes
            .chars()
            .enumerate()
            .map(|(i, c)| {
                let status = match c {
                    'P' => AttendanceStatus::Present,
                    'J' => AttendanceStatus::Justified,
                    'A' => AttendanceStatus::Absent,
                    'C' => AttendanceStatus::ControlledAbsence,
                    _ => AttendanceStatus::Unrecognized(c.to_string()),
                };
                mark(i as i64, status)
            })
            .collect()
    }

    #[test]
    fn empty_history_defaults_to_full_presence() {
        let aggregate = aggregate(&[]);
        assert_eq!(aggregate.total_records, 0);
        assert_eq!(aggregate.operational_presence_percent(), 100.0);
        assert_eq!(aggregate.max_consecutive_absences, 0);
    }

    #[test]
    fn counts_partition_total_records() {
        let aggregate = aggregate(&from_codes("PPJACAPCJP"));
        assert_eq!(aggregate.total_records, 10);
        assert_eq!(aggregate.present_count, 4);
        assert_eq!(aggregate.justified_count, 2);
        assert_eq!(aggregate.absent_count, 4);
        assert_eq!(aggregate.controlled_count, 2);
        assert_eq!(aggregate.ordinary_absences(), 2);
        assert_eq!(
            aggregate.present_count + aggregate.justified_count + aggregate.absent_count,
            aggregate.total_records
        );
        assert!((aggregate.operational_presence_percent() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn streak_resets_on_presence_and_justification() {
        let aggregate = aggregate(&from_codes("AAPCAAAJAA"));
        assert_eq!(aggregate.max_consecutive_absences, 4);
    }

    #[test]
    fn unrecognized_marks_are_dropped_without_breaking_streak() {
        let aggregate = aggregate(&from_codes("AA?AP"));
        assert_eq!(aggregate.total_records, 4);
        assert_eq!(aggregate.max_consecutive_absences, 3);
    }

    #[test]
    fn unordered_input_is_scanned_by_date() {
        let mut events = from_codes("AAAPP");
        events.reverse();
        assert_eq!(aggregate(&events).max_consecutive_absences, 3);
    }

    #[test]
    fn resubmitted_day_overwrites_previous_mark() {
        let events = vec![
            mark(0, AttendanceStatus::Absent),
            mark(0, AttendanceStatus::Justified),
            mark(1, AttendanceStatus::Present),
        ];
        let aggregate = aggregate(&events);
        assert_eq!(aggregate.total_records, 2);
        assert_eq!(aggregate.absent_count, 0);
        assert_eq!(aggregate.justified_count, 1);
    }

    #[test]
    fn eighteen_present_two_absent_is_ninety_percent() {
        let codes = format!("{}AA", "P".repeat(18));
        let aggregate = aggregate(&from_codes(&codes));
        assert_eq!(aggregate.operational_presence_percent(), 90.0);
    }

    #[test]
    fn school_year_starts_in_february() {
        let window = AttendanceWindow::SchoolYear { start_month: 2 };
        let march = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let january = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        assert_eq!(window.start(march), NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
        assert_eq!(window.start(january), NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
    }

    #[test]
    fn rolling_window_spans_exactly_its_length() {
        let today = day(100);
        let window = AttendanceWindow::Rolling { days: 90 };
        assert_eq!(window.start(today), day(11));
        assert!(window.contains(today, day(11)));
        assert!(!window.contains(today, day(10)));
        assert!(window.contains(today, today));
        assert!(!window.contains(today, day(101)));
    }

    #[test]
    fn huge_rolling_window_saturates_instead_of_overflowing() {
        let today = day(0);
        let window = AttendanceWindow::Rolling { days: 100_000_000 };
        assert_eq!(window.start(today), NaiveDate::MIN);
        let events = vec![mark(0, AttendanceStatus::Present)];
        assert_eq!(aggregate_in_window(&events, window, today).total_records, 1);
    }

    #[test]
    fn rolling_window_filters_old_marks() {
        let today = day(100);
        let events = vec![mark(0, AttendanceStatus::Absent), mark(95, AttendanceStatus::Present)];
        let aggregate =
            aggregate_in_window(&events, AttendanceWindow::Rolling { days: 90 }, today);
        assert_eq!(aggregate.total_records, 1);
        assert_eq!(aggregate.absent_count, 0);
    }
}
