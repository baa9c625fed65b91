#![forbid(unsafe_code)]

//! Core domain model and business logic for the Hydro water tracker.
//!
//! This crate provides:
//! - Domain types (profile, water logs, day records, reminders, settings)
//! - Daily target and reminder schedule calculations
//! - The water store and its persistence
//! - History statistics and CSV export
//! - Reminder polling

pub mod types;
pub mod error;
pub mod clock;
pub mod calc;
pub mod config;
pub mod logging;
pub mod state;
pub mod store;
pub mod history;
pub mod export;
pub mod reminder;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use clock::{Clock, ManualClock, SystemClock};
pub use calc::{compute_daily_target, compute_reminder_schedule, ReminderSchedule};
pub use config::Config;
pub use state::{JsonFileStorage, MemoryStorage, StateStorage};
pub use store::WaterStore;
pub use history::{level_progress, summarize, HistorySummary, LevelProgress, Rank};
pub use export::export_history_csv;
pub use reminder::{Notification, Notifier, Permission, ReminderPoller};
