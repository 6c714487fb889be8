//! # Recurrence Engine
//!
//! Computes the next due date of a recurring task and owns the completion
//! transition of a scheduled occurrence.
//!
//! ## Completion
//!
//! ```text
//! PENDING ──apply_status(Completed)──▶ COMPLETED (+ successor, if recurring)
//!    ▲                                      │
//!    └──────── apply_status(Pending) ───────┘  rejected: ScheduleError::Reopen
//! ```
//!
//! Completing stamps `completion_date` with the clock's current date and,
//! unless the task is one-time, builds exactly one pending successor due one
//! period after the completed occurrence's due date. An occurrence that
//! already carries a completion date is never completed again, so repeated
//! saves of a completed record cannot spawn a second successor.
//!
//! ## Month-end policy
//!
//! Monthly and yearly steps clamp to the last day of the target month:
//! Jan 31 + 1 month is Feb 29 in a leap year and Feb 28 otherwise, and
//! Feb 29 + 1 year is Feb 28.

use chrono::{Days, Months, NaiveDate};
use thiserror::Error;

use cmms_core::{Clock, Frequency, Schedule, ScheduleId, ScheduleStatus};

/// Errors raised by the completion transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// A completed occurrence was asked to go back to pending.
    #[error("schedule {id} was completed on {completed_on} and cannot be reopened")]
    Reopen {
        /// The occurrence.
        id: ScheduleId,
        /// Its completion date.
        completed_on: NaiveDate,
    },
}

/// Result of a completion transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// The date stamped on the completed occurrence.
    pub completion_date: NaiveDate,
    /// The next occurrence, `None` for one-time tasks.
    pub successor: Option<Schedule>,
}

/// What [`apply_status`] did to a schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    /// Nothing to persist beyond the caller's own field edits.
    Unchanged,
    /// The occurrence was completed by this call.
    Completed(Completion),
}

impl StatusChange {
    /// The spawned successor, if this change created one.
    pub fn successor(&self) -> Option<&Schedule> {
        match self {
            Self::Unchanged => None,
            Self::Completed(c) => c.successor.as_ref(),
        }
    }
}

/// The due date one `frequency` period after `reference`.
///
/// Returns `None` for a one-time task (`frequency == None`) and when the
/// result would fall outside the representable calendar.
pub fn next_due_date(frequency: Option<Frequency>, reference: NaiveDate) -> Option<NaiveDate> {
    match frequency? {
        Frequency::Daily => reference.checked_add_days(Days::new(1)),
        Frequency::Weekly => reference.checked_add_days(Days::new(7)),
        Frequency::Monthly => reference.checked_add_months(Months::new(1)),
        Frequency::Yearly => reference.checked_add_months(Months::new(12)),
    }
}

/// Complete `schedule` and build its successor.
///
/// No-op returning `None` when `schedule.completion_date` is already set.
/// Otherwise marks the schedule completed, stamps today's date from `clock`
/// and returns the [`Completion`]. The successor is built, not stored:
/// the caller persists the mutated schedule and the successor together.
pub fn complete(
    schedule: &mut Schedule,
    frequency: Option<Frequency>,
    clock: &dyn Clock,
) -> Option<Completion> {
    if schedule.completion_date.is_some() {
        return None;
    }

    let completion_date = clock.today();
    schedule.status = ScheduleStatus::Completed;
    schedule.completion_date = Some(completion_date);

    let successor = next_due_date(frequency, schedule.due_date)
        .map(|due_date| Schedule::pending(schedule.task, due_date));

    Some(Completion {
        completion_date,
        successor,
    })
}

/// Move `schedule` to the `requested` status.
///
/// This is the single entry point for status changes from every write
/// path. Completing runs [`complete`]; asking for the status a schedule
/// already has is [`StatusChange::Unchanged`]; reopening a completed
/// occurrence fails with [`ScheduleError::Reopen`].
pub fn apply_status(
    schedule: &mut Schedule,
    requested: ScheduleStatus,
    frequency: Option<Frequency>,
    clock: &dyn Clock,
) -> Result<StatusChange, ScheduleError> {
    match requested {
        ScheduleStatus::Completed => Ok(match complete(schedule, frequency, clock) {
            Some(completion) => StatusChange::Completed(completion),
            None => StatusChange::Unchanged,
        }),
        ScheduleStatus::Pending => match schedule.completion_date {
            Some(completed_on) => Err(ScheduleError::Reopen {
                id: schedule.id,
                completed_on,
            }),
            None => {
                schedule.status = ScheduleStatus::Pending;
                Ok(StatusChange::Unchanged)
            }
        },
    }
}

/// Whether `schedule` is pending and its due date is strictly before `today`.
pub fn is_overdue(schedule: &Schedule, today: NaiveDate) -> bool {
    schedule.status == ScheduleStatus::Pending && schedule.due_date < today
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use cmms_core::{FixedClock, TaskId};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn clock() -> FixedClock {
        FixedClock::on(date(2025, 1, 20))
    }

    // -- next_due_date ---------------------------------------------------

    #[test]
    fn one_time_task_has_no_next_date() {
        assert_eq!(next_due_date(None, date(2024, 1, 31)), None);
    }

    #[test]
    fn daily_crosses_month_boundary() {
        assert_eq!(
            next_due_date(Some(Frequency::Daily), date(2024, 1, 31)),
            Some(date(2024, 2, 1))
        );
    }

    #[test]
    fn weekly_adds_seven_days() {
        assert_eq!(
            next_due_date(Some(Frequency::Weekly), date(2024, 12, 28)),
            Some(date(2025, 1, 4))
        );
    }

    #[test]
    fn monthly_clamps_to_leap_february() {
        assert_eq!(
            next_due_date(Some(Frequency::Monthly), date(2024, 1, 31)),
            Some(date(2024, 2, 29))
        );
    }

    #[test]
    fn monthly_clamps_to_common_february() {
        assert_eq!(
            next_due_date(Some(Frequency::Monthly), date(2023, 1, 31)),
            Some(date(2023, 2, 28))
        );
    }

    #[test]
    fn monthly_keeps_day_when_it_exists() {
        assert_eq!(
            next_due_date(Some(Frequency::Monthly), date(2025, 1, 15)),
            Some(date(2025, 2, 15))
        );
        assert_eq!(
            next_due_date(Some(Frequency::Monthly), date(2025, 12, 31)),
            Some(date(2026, 1, 31))
        );
    }

    #[test]
    fn yearly_from_leap_day_lands_on_february_28() {
        assert_eq!(
            next_due_date(Some(Frequency::Yearly), date(2024, 2, 29)),
            Some(date(2025, 2, 28))
        );
    }

    #[test]
    fn out_of_range_result_is_none() {
        assert_eq!(next_due_date(Some(Frequency::Daily), NaiveDate::MAX), None);
    }

    // -- complete ----------------------------------------------------------

    #[test]
    fn completing_monthly_schedule_spawns_one_successor() {
        let mut s = Schedule::pending(TaskId::new(), date(2025, 1, 15));
        let completion = complete(&mut s, Some(Frequency::Monthly), &clock()).unwrap();

        assert_eq!(s.status, ScheduleStatus::Completed);
        assert_eq!(s.completion_date, Some(date(2025, 1, 20)));
        assert_eq!(completion.completion_date, date(2025, 1, 20));

        let next = completion.successor.unwrap();
        assert_eq!(next.due_date, date(2025, 2, 15));
        assert_eq!(next.status, ScheduleStatus::Pending);
        assert_eq!(next.completion_date, None);
        assert_eq!(next.task, s.task);
        assert!(next.history_log.is_empty());
        assert_ne!(next.id, s.id);
    }

    #[test]
    fn completing_one_time_schedule_spawns_nothing() {
        let mut s = Schedule::pending(TaskId::new(), date(2025, 1, 15));
        let completion = complete(&mut s, None, &clock()).unwrap();
        assert!(completion.successor.is_none());
        assert_eq!(s.status, ScheduleStatus::Completed);
        assert!(s.completion_date.is_some());
    }

    #[test]
    fn second_completion_is_a_no_op() {
        let mut s = Schedule::pending(TaskId::new(), date(2025, 1, 15));
        complete(&mut s, Some(Frequency::Daily), &clock()).unwrap();
        let stamped = s.completion_date;

        let later = FixedClock::on(date(2025, 3, 1));
        assert!(complete(&mut s, Some(Frequency::Daily), &later).is_none());
        assert_eq!(s.completion_date, stamped);
    }

    #[test]
    fn successor_is_based_on_due_date_not_completion_date() {
        let mut s = Schedule::pending(TaskId::new(), date(2024, 6, 1));
        let late = FixedClock::on(date(2024, 9, 15));
        let completion = complete(&mut s, Some(Frequency::Weekly), &late).unwrap();
        assert_eq!(completion.successor.unwrap().due_date, date(2024, 6, 8));
    }

    // -- apply_status ------------------------------------------------------

    #[test]
    fn apply_completed_on_pending_completes() {
        let mut s = Schedule::pending(TaskId::new(), date(2025, 1, 15));
        let change =
            apply_status(&mut s, ScheduleStatus::Completed, Some(Frequency::Yearly), &clock())
                .unwrap();
        assert_eq!(change.successor().unwrap().due_date, date(2026, 1, 15));
    }

    #[test]
    fn apply_completed_twice_is_unchanged() {
        let mut s = Schedule::pending(TaskId::new(), date(2025, 1, 15));
        apply_status(&mut s, ScheduleStatus::Completed, Some(Frequency::Daily), &clock()).unwrap();
        let again =
            apply_status(&mut s, ScheduleStatus::Completed, Some(Frequency::Daily), &clock())
                .unwrap();
        assert_eq!(again, StatusChange::Unchanged);
        assert!(again.successor().is_none());
    }

    #[test]
    fn apply_pending_on_pending_is_unchanged() {
        let mut s = Schedule::pending(TaskId::new(), date(2025, 1, 15));
        let change =
            apply_status(&mut s, ScheduleStatus::Pending, Some(Frequency::Daily), &clock())
                .unwrap();
        assert_eq!(change, StatusChange::Unchanged);
        assert_eq!(s.status, ScheduleStatus::Pending);
    }

    #[test]
    fn reopening_completed_schedule_is_rejected() {
        let mut s = Schedule::pending(TaskId::new(), date(2025, 1, 15));
        apply_status(&mut s, ScheduleStatus::Completed, None, &clock()).unwrap();
        let before = s.clone();

        let err = apply_status(&mut s, ScheduleStatus::Pending, None, &clock()).unwrap_err();
        assert!(matches!(err, ScheduleError::Reopen { .. }));
        assert!(err.to_string().contains("cannot be reopened"));
        assert_eq!(s, before);
    }

    #[test]
    fn unstamped_completed_record_gets_stamped() {
        // A record imported with status=completed but no completion date.
        let mut s = Schedule::pending(TaskId::new(), date(2025, 1, 15));
        s.status = ScheduleStatus::Completed;
        let change =
            apply_status(&mut s, ScheduleStatus::Completed, Some(Frequency::Monthly), &clock())
                .unwrap();
        assert!(matches!(change, StatusChange::Completed(_)));
        assert_eq!(s.completion_date, Some(date(2025, 1, 20)));
    }

    // -- is_overdue --------------------------------------------------------

    #[test]
    fn pending_past_due_is_overdue() {
        let s = Schedule::pending(TaskId::new(), date(2025, 1, 19));
        assert!(is_overdue(&s, date(2025, 1, 20)));
    }

    #[test]
    fn due_today_is_not_overdue() {
        let s = Schedule::pending(TaskId::new(), date(2025, 1, 20));
        assert!(!is_overdue(&s, date(2025, 1, 20)));
    }

    #[test]
    fn completed_is_never_overdue() {
        let mut s = Schedule::pending(TaskId::new(), date(2020, 1, 1));
        assert!(is_overdue(&s, date(2025, 1, 20)));
        complete(&mut s, None, &clock());
        assert!(!is_overdue(&s, date(2025, 1, 20)));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn any_date() -> impl Strategy<Value = NaiveDate> {
            (1900i32..2200, 1u32..=12, 1u32..=31).prop_map(|(y, m, d)| {
                (0..4)
                    .find_map(|back| NaiveDate::from_ymd_opt(y, m, d.saturating_sub(back)))
                    .unwrap()
            })
        }

        proptest! {
            #[test]
            fn no_frequency_never_recurs(d in any_date()) {
                prop_assert_eq!(next_due_date(None, d), None);
            }

            #[test]
            fn monthly_advances_exactly_one_month(d in any_date()) {
                let next = next_due_date(Some(Frequency::Monthly), d).unwrap();
                let months = |x: NaiveDate| x.year() * 12 + x.month0() as i32;
                prop_assert_eq!(months(next), months(d) + 1);
                prop_assert!(next.day() <= d.day());
                if next.day() < d.day() {
                    // Clamped: the result is the last day of its month.
                    prop_assert_eq!(next.succ_opt().unwrap().day(), 1);
                }
            }

            #[test]
            fn every_frequency_moves_forward(d in any_date()) {
                for freq in Frequency::ALL {
                    let next = next_due_date(Some(freq), d).unwrap();
                    prop_assert!(next > d);
                }
            }

            #[test]
            fn completion_happens_at_most_once(d in any_date(), f in 0usize..5) {
                let freq = Frequency::ALL.get(f).copied();
                let mut s = Schedule::pending(TaskId::new(), d);
                let first = complete(&mut s, freq, &clock());
                prop_assert!(first.is_some());
                prop_assert_eq!(first.unwrap().successor.is_some(), freq.is_some());
                prop_assert!(complete(&mut s, freq, &clock()).is_none());
            }
        }
    }
}
