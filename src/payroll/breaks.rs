//! Placement of unpaid breaks within a working period.
//!
//! The timesheet records only a break length. Breaks are rounded to the
//! quarter hour and placed at fixed times of day: a short break at 13:00,
//! a long break split between 10:00 and 13:00.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Longest break taken as a single slot.
const SINGLE_BREAK_MAX: i64 = 30;

/// One break row for `time_period_breaks`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakSlot {
    pub start: NaiveDateTime,
    pub finish: NaiveDateTime,
    pub display_order: u32,
}

/// Round to the nearest 15 minutes; exact halves go to the even quarter.
pub fn round_to_quarter(minutes: i64) -> i64 {
    ((minutes as f64) / 15.0).round_ties_even() as i64 * 15
}

fn at(date: NaiveDate, hour: u32) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN))
}

/// Break slots for a period on `date`.
///
/// A single break starts at 13:00 unless 13:00 falls outside the period, in
/// which case it ends at the period's finish floored to the quarter hour.
/// Two breaks put the smaller one at 10:00 and the larger at 13:00.
pub fn plan_breaks(
    date: NaiveDate,
    break_minutes: i64,
    start: Option<NaiveTime>,
    finish: Option<NaiveTime>,
) -> Vec<BreakSlot> {
    let rounded = round_to_quarter(break_minutes);
    if rounded <= 0 {
        return Vec::new();
    }

    if rounded <= SINGLE_BREAK_MAX {
        let length = Duration::minutes(rounded);
        let mut slot_start = at(date, 13);
        let mut slot_finish = slot_start + length;

        if let (Some(start), Some(finish)) = (start, finish) {
            let period_start = date.and_time(start);
            let period_end = date.and_time(finish);
            if slot_start < period_start || slot_start > period_end {
                let floored = period_end.minute() / 15 * 15;
                slot_finish = period_end
                    .with_minute(floored)
                    .and_then(|t| t.with_second(0))
                    .unwrap_or(period_end);
                slot_start = slot_finish - length;
            }
        }

        return vec![BreakSlot {
            start: slot_start,
            finish: slot_finish,
            display_order: 0,
        }];
    }

    let mut larger = (rounded + 1) / 2;
    let mut smaller = rounded - larger;
    if larger < smaller {
        std::mem::swap(&mut larger, &mut smaller);
    }

    [(10, smaller), (13, larger)]
        .into_iter()
        .zip(0..)
        .map(|((hour, minutes), order)| {
            let start = at(date, hour);
            BreakSlot {
                start,
                finish: start + Duration::minutes(minutes),
                display_order: order,
            }
        })
        .collect()
}
