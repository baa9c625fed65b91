//! Read-only statistics over archived days and today's running totals.
//!
//! "Today" here is the store's active day (`last_updated_date`), which equals
//! the calendar date once the store has checked for rollover.

use crate::{DayRecord, WaterState};
use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Milliliters of intake per experience point
pub const ML_PER_XP: u64 = 20;

/// Experience points needed to advance one level
pub const XP_PER_LEVEL: u64 = 500;

/// Totals across every tracked day including today
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HistorySummary {
    pub total_consumed: u64,
    pub days_tracked: usize,
    pub average_per_day: u32,
    pub success_days: usize,
    /// Share of tracked days on target, as a rounded percentage
    pub success_rate: u32,
    pub average_logs_per_day: f64,
    pub current_streak: usize,
}

/// One day in a chart series
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DayPoint {
    pub date: NaiveDate,
    pub amount: u32,
    pub target: u32,
    pub is_today: bool,
}

impl DayPoint {
    pub fn met_target(&self) -> bool {
        self.amount >= self.target
    }
}

/// Sum of intake for one calendar month
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MonthTotal {
    /// "YYYY-MM"
    pub month: String,
    pub amount: u64,
}

/// Title earned by reaching a level threshold
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Rank {
    WaterRookie,
    HydroHomie,
    OceanMaster,
    Poseidon,
}

impl Rank {
    pub fn for_level(level: u64) -> Self {
        if level >= 50 {
            Rank::Poseidon
        } else if level >= 20 {
            Rank::OceanMaster
        } else if level >= 10 {
            Rank::HydroHomie
        } else {
            Rank::WaterRookie
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Rank::WaterRookie => "Water Rookie",
            Rank::HydroHomie => "Hydro Homie",
            Rank::OceanMaster => "Ocean Master",
            Rank::Poseidon => "Poseidon",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Experience earned from all-time intake
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LevelProgress {
    pub total_xp: u64,
    /// Starts at 1
    pub level: u64,
    /// XP earned inside the current level, below [`XP_PER_LEVEL`]
    pub level_xp: u64,
    pub rank: Rank,
}

impl LevelProgress {
    pub fn from_total_ml(total_ml: u64) -> Self {
        let total_xp = total_ml / ML_PER_XP;
        let level = total_xp / XP_PER_LEVEL + 1;
        Self {
            total_xp,
            level,
            level_xp: total_xp % XP_PER_LEVEL,
            rank: Rank::for_level(level),
        }
    }

    /// Fraction of the way to the next level, in `0.0..1.0`
    pub fn fraction(&self) -> f64 {
        self.level_xp as f64 / XP_PER_LEVEL as f64
    }
}

fn records_by_date(history: &[DayRecord]) -> HashMap<NaiveDate, &DayRecord> {
    history.iter().map(|r| (r.date, r)).collect()
}

fn total_consumed(state: &WaterState) -> u64 {
    state.history.iter().map(|r| r.amount as u64).sum::<u64>() + state.today_amount as u64
}

pub fn summarize(state: &WaterState) -> HistorySummary {
    let total_consumed = total_consumed(state);
    let days_tracked = state.history.len() + 1;
    let average_per_day = (total_consumed as f64 / days_tracked as f64).round() as u32;

    let today_met = state.today_amount >= state.daily_target;
    let success_days =
        state.history.iter().filter(|r| r.met_target()).count() + usize::from(today_met);
    let success_rate = (success_days as f64 / days_tracked as f64 * 100.0).round() as u32;

    let total_logs: usize =
        state.history.iter().map(|r| r.logs_count).sum::<usize>() + state.today_logs.len();
    let average_logs_per_day = total_logs as f64 / days_tracked as f64;

    HistorySummary {
        total_consumed,
        days_tracked,
        average_per_day,
        success_days,
        success_rate,
        average_logs_per_day,
        current_streak: current_streak(state),
    }
}

/// Level and rank earned from everything logged so far
pub fn level_progress(state: &WaterState) -> LevelProgress {
    LevelProgress::from_total_ml(total_consumed(state))
}

/// Consecutive days on target, ending today
///
/// An unfinished today doesn't break the streak; counting then starts from
/// yesterday. A day missing from history counts as missed.
pub fn current_streak(state: &WaterState) -> usize {
    let records = records_by_date(&state.history);
    let today = state.last_updated_date;

    let mut streak = 0;
    let mut day = today;
    if state.today_amount >= state.daily_target {
        streak += 1;
    }
    while let Some(prev) = day.pred_opt() {
        day = prev;
        match records.get(&day) {
            Some(record) if record.met_target() => streak += 1,
            _ => break,
        }
    }
    streak
}

/// The last `days` days, oldest first, ending with today
///
/// Days without a record show zero intake against the current target. The
/// series is cut short if it would run past the earliest representable date.
pub fn recent_days(state: &WaterState, days: usize) -> Vec<DayPoint> {
    let records = records_by_date(&state.history);
    let today = state.last_updated_date;

    let mut points: Vec<DayPoint> = (0..days)
        .map_while(|offset| {
            let date = today.checked_sub_signed(Duration::days(i64::try_from(offset).ok()?))?;
            if offset == 0 {
                return Some(DayPoint {
                    date,
                    amount: state.today_amount,
                    target: state.daily_target,
                    is_today: true,
                });
            }
            Some(match records.get(&date) {
                Some(record) => DayPoint {
                    date,
                    amount: record.amount,
                    target: record.target,
                    is_today: false,
                },
                None => DayPoint {
                    date,
                    amount: 0,
                    target: state.daily_target,
                    is_today: false,
                },
            })
        })
        .collect();
    points.reverse();
    points
}

/// Intake per calendar month for the last `months` months, oldest first
pub fn monthly_totals(state: &WaterState, months: u32) -> Vec<MonthTotal> {
    let today = state.last_updated_date;
    let this_month = today.with_day(1).unwrap_or(today);

    (0..months)
        .rev()
        .filter_map(|back| this_month.checked_sub_months(Months::new(back)))
        .map(|start| {
            let mut amount: u64 = state
                .history
                .iter()
                .filter(|r| r.date.year() == start.year() && r.date.month() == start.month())
                .map(|r| r.amount as u64)
                .sum();
            if start == this_month {
                amount += state.today_amount as u64;
            }
            MonthTotal {
                month: start.format("%Y-%m").to_string(),
                amount,
            }
        })
        .collect()
}
