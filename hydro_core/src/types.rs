//! Core domain types for the hydration tracker.
//!
//! This module defines the fundamental types used throughout the system:
//! - User profile and its update payload
//! - Water logs for the current day and archived day records
//! - Reminders and settings
//! - The complete persisted store shape

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Current layout version of the persisted state document.
pub const SCHEMA_VERSION: u32 = 1;

/// Daily target used on first run and after a reset.
pub const DEFAULT_DAILY_TARGET: u32 = 2000;

// ============================================================================
// Profile Types
// ============================================================================

/// Biological sex, used only for the daily target multiplier
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl std::str::FromStr for Sex {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Ok(Sex::Male),
            "female" | "f" => Ok(Sex::Female),
            other => Err(crate::Error::Config(format!("Unknown sex: {}", other))),
        }
    }
}

/// The user's body data and daily rhythm
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub sex: Sex,
    pub weight_kg: f64,
    #[serde(with = "crate::clock::hhmm")]
    pub wake_time: NaiveTime,
    #[serde(with = "crate::clock::hhmm")]
    pub sleep_time: NaiveTime,
    pub has_onboarded: bool,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            sex: Sex::Male,
            weight_kg: 60.0,
            wake_time: NaiveTime::from_hms_opt(7, 0, 0).unwrap_or_default(),
            sleep_time: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or_default(),
            has_onboarded: false,
        }
    }
}

/// Fields a user supplies when setting up or editing their profile
#[derive(Clone, Debug, PartialEq)]
pub struct ProfileUpdate {
    pub sex: Sex,
    pub weight_kg: f64,
    pub wake_time: NaiveTime,
    pub sleep_time: NaiveTime,
}

// ============================================================================
// Intake Types
// ============================================================================

/// One hydration event on the current day
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WaterLog {
    pub id: String,
    /// Display time, e.g. "02:30 PM"
    pub time: String,
    pub amount: u32,
}

/// Archived summary of one past day
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DayRecord {
    pub date: NaiveDate,
    pub amount: u32,
    pub target: u32,
    #[serde(default)]
    pub logs_count: usize,
}

impl DayRecord {
    pub fn met_target(&self) -> bool {
        self.amount >= self.target
    }
}

// ============================================================================
// Reminder and Settings Types
// ============================================================================

/// A user-configured time of day for a hydration notification
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    #[serde(with = "crate::clock::hhmm")]
    pub time: NaiveTime,
    pub enabled: bool,
}

/// Application preferences
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub cup_size: u32,
    pub sound_enabled: bool,
    pub reminder_interval: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cup_size: 250,
            sound_enabled: true,
            reminder_interval: 8,
        }
    }
}

// ============================================================================
// Persisted Store Shape
// ============================================================================

fn default_version() -> u32 {
    SCHEMA_VERSION
}

/// Everything the store owns. This is the persisted document.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WaterState {
    #[serde(default = "default_version")]
    pub version: u32,
    pub user_data: UserProfile,
    pub daily_target: u32,
    pub today_amount: u32,
    pub today_logs: Vec<WaterLog>,
    pub last_updated_date: NaiveDate,
    pub history: Vec<DayRecord>,
    pub reminders: Vec<Reminder>,
    #[serde(default)]
    pub settings: Settings,
}

impl WaterState {
    /// Factory-default state for a store first opened on `today`
    pub fn new(today: NaiveDate) -> Self {
        Self {
            version: SCHEMA_VERSION,
            user_data: UserProfile::default(),
            daily_target: DEFAULT_DAILY_TARGET,
            today_amount: 0,
            today_logs: Vec::new(),
            last_updated_date: today,
            history: Vec::new(),
            reminders: Vec::new(),
            settings: Settings::default(),
        }
    }

    /// Fraction of today's target reached, capped at 1.0
    pub fn progress(&self) -> f64 {
        if self.daily_target == 0 {
            return 0.0;
        }
        (self.today_amount as f64 / self.daily_target as f64).min(1.0)
    }

    pub fn remaining(&self) -> u32 {
        self.daily_target.saturating_sub(self.today_amount)
    }
}
