//! Daily target and reminder-schedule calculations.
//!
//! These are pure functions: the store calls [`compute_daily_target`] when the
//! profile changes, and [`compute_reminder_schedule`] is offered as a helper
//! for suggesting reminder times. Neither touches persisted state.

use crate::clock::format_hhmm;
use crate::Sex;
use chrono::{NaiveTime, Timelike};

/// Lowest daily target ever recommended, in ml
pub const MIN_DAILY_TARGET: u32 = 1500;

/// Highest daily target ever recommended, in ml
pub const MAX_DAILY_TARGET: u32 = 10000;

const ML_PER_KG: f64 = 35.0;
const MALE_MULTIPLIER: f64 = 1.1;
const MINUTES_PER_DAY: u32 = 24 * 60;

/// Recommended daily intake in ml
///
/// `weight_kg * 35`, times 1.1 for males, clamped to
/// [`MIN_DAILY_TARGET`]..=[`MAX_DAILY_TARGET`] and rounded.
pub fn compute_daily_target(weight_kg: f64, sex: Sex) -> u32 {
    let mut target = weight_kg * ML_PER_KG;
    if sex == Sex::Male {
        target *= MALE_MULTIPLIER;
    }

    // f64::max/min discard NaN, so a bogus weight lands on the floor
    let clamped = target
        .max(MIN_DAILY_TARGET as f64)
        .min(MAX_DAILY_TARGET as f64);
    clamped.round() as u32
}

/// Clamp an arbitrary target into the allowed range
pub fn clamp_daily_target(amount: u32) -> u32 {
    amount.clamp(MIN_DAILY_TARGET, MAX_DAILY_TARGET)
}

/// Evenly spaced reminder times across the waking day
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReminderSchedule {
    pub times: Vec<NaiveTime>,
    pub ml_per_reminder: u32,
}

impl ReminderSchedule {
    /// Times as "HH:MM" strings
    pub fn formatted(&self) -> Vec<String> {
        self.times.iter().copied().map(format_hhmm).collect()
    }
}

fn minutes_since_midnight(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Spread `count` reminders between waking and sleeping
///
/// The first reminder comes one interval after `wake`, the last lands on
/// `sleep`. A sleep time earlier than the wake time is taken to be on the
/// next day, and times past midnight wrap back into 00:00..=23:59.
pub fn compute_reminder_schedule(
    wake: NaiveTime,
    sleep: NaiveTime,
    target_ml: u32,
    count: u32,
) -> ReminderSchedule {
    if count == 0 {
        return ReminderSchedule {
            times: Vec::new(),
            ml_per_reminder: 0,
        };
    }

    let wake_minutes = minutes_since_midnight(wake);
    let mut sleep_minutes = minutes_since_midnight(sleep);
    if sleep_minutes < wake_minutes {
        sleep_minutes += MINUTES_PER_DAY;
    }

    let awake_minutes = (sleep_minutes - wake_minutes) as f64;
    let interval = awake_minutes / count as f64;

    let times = (0..count)
        .map(|i| {
            let offset = ((i + 1) as f64 * interval).floor() as u32;
            let minutes = (wake_minutes + offset) % MINUTES_PER_DAY;
            NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0).unwrap_or_default()
        })
        .collect();

    let ml_per_reminder = (target_ml as f64 / count as f64).round() as u32;

    tracing::debug!(
        "Reminder schedule: {} reminders every {:.1} min, {} ml each",
        count,
        interval,
        ml_per_reminder
    );

    ReminderSchedule {
        times,
        ml_per_reminder,
    }
}
