//! # Next-Due Subcommand
//!
//! Prints the due dates a recurring task would produce if each occurrence
//! were completed in turn, starting from a given due date. Uses the same
//! recurrence arithmetic as the schedule completion transition, so month
//! ends clamp the same way.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;

use cmms_core::temporal::parse_date;
use cmms_core::Frequency;
use cmms_state::next_due_date;

/// Arguments for the `cmms next-due` subcommand.
#[derive(Args, Debug)]
pub struct NextDueArgs {
    /// Recurrence period: daily, weekly, monthly or yearly.
    #[arg(long, short)]
    pub frequency: String,

    /// Due date of the current occurrence (YYYY-MM-DD).
    #[arg(long)]
    pub from: String,

    /// How many successive due dates to print.
    #[arg(long, short = 'n', default_value_t = 1)]
    pub count: usize,
}

/// Execute the next-due subcommand.
pub fn run_next_due(args: &NextDueArgs) -> Result<u8> {
    let frequency: Frequency = match args.frequency.parse() {
        Ok(f) => f,
        Err(e) => {
            eprintln!("{e}");
            return Ok(1);
        }
    };
    let from = parse_date(&args.from).context("invalid --from date")?;

    for date in due_dates(frequency, from, args.count) {
        println!("{date}");
    }
    Ok(0)
}

/// The `count` due dates following `from`, each one period after the last.
///
/// Stops early when the next date falls outside the representable calendar.
pub fn due_dates(frequency: Frequency, from: NaiveDate, count: usize) -> Vec<NaiveDate> {
    std::iter::successors(next_due_date(Some(frequency), from), |d| {
        next_due_date(Some(frequency), *d)
    })
    .take(count)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn monthly_chain_clamps_then_keeps_clamped_day() {
        let dates = due_dates(Frequency::Monthly, date(2025, 1, 31), 3);
        assert_eq!(
            dates,
            vec![date(2025, 2, 28), date(2025, 3, 28), date(2025, 4, 28)]
        );
    }

    #[test]
    fn weekly_chain_steps_seven_days() {
        let dates = due_dates(Frequency::Weekly, date(2024, 12, 30), 2);
        assert_eq!(dates, vec![date(2025, 1, 6), date(2025, 1, 13)]);
    }

    #[test]
    fn zero_count_prints_nothing() {
        assert!(due_dates(Frequency::Daily, date(2025, 1, 1), 0).is_empty());
    }

    #[test]
    fn unbounded_count_stops_at_calendar_end() {
        let dates = due_dates(Frequency::Yearly, date(2024, 1, 31), usize::MAX);
        assert!(!dates.is_empty());
        assert_eq!(dates[0], date(2025, 1, 31));
        let last = *dates.last().unwrap();
        assert!(next_due_date(Some(Frequency::Yearly), last).is_none());
    }

    #[test]
    fn unknown_frequency_is_rejected_with_exit_code_one() {
        let args = NextDueArgs {
            frequency: "fortnightly".to_string(),
            from: "2025-01-01".to_string(),
            count: 1,
        };
        assert_eq!(run_next_due(&args).unwrap(), 1);
    }

    #[test]
    fn malformed_date_is_an_error() {
        let args = NextDueArgs {
            frequency: "daily".to_string(),
            from: "01/02/2025".to_string(),
            count: 1,
        };
        assert!(run_next_due(&args).is_err());
    }
}
