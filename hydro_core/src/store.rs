//! The water store: single owner of all tracker state.
//!
//! Every public mutation is one complete state transition followed by a save
//! of the full document. A failed save never rolls back the in-memory change;
//! it is logged and queued so the caller can show it via
//! [`WaterStore::take_warnings`].

use crate::calc::{
    clamp_daily_target, compute_daily_target, compute_reminder_schedule, ReminderSchedule,
};
use crate::clock::{format_display, parse_time_of_day, truncate_to_minute, Clock, SystemClock};
use crate::state::{JsonFileStorage, StateStorage};
use crate::{
    DayRecord, Error, ProfileUpdate, Reminder, Settings, UserProfile, WaterLog, WaterState,
    DEFAULT_DAILY_TARGET,
};
use chrono::NaiveDate;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub struct WaterStore {
    state: WaterState,
    storage: Box<dyn StateStorage>,
    clock: Arc<dyn Clock>,
    warnings: Vec<Error>,
}

impl WaterStore {
    /// Open a store backed by `storage`
    ///
    /// Missing state starts from factory defaults; unreadable state does too,
    /// with a queued warning. Any days that passed since the last save are
    /// archived immediately.
    pub fn open(storage: impl StateStorage + 'static, clock: Arc<dyn Clock>) -> Self {
        let today = clock.today();
        let mut warnings = Vec::new();

        let state = match storage.load() {
            Ok(Some(state)) => state,
            Ok(None) => WaterState::new(today),
            Err(e) => {
                tracing::warn!("Starting from default state: {}", e);
                warnings.push(e);
                WaterState::new(today)
            }
        };

        let mut store = Self {
            state,
            storage: Box::new(storage),
            clock,
            warnings,
        };
        store.check_day_rollover();
        store
    }

    /// Open the JSON state file in `data_dir` using the system clock
    pub fn open_in_dir(data_dir: &Path) -> Self {
        Self::open(JsonFileStorage::in_dir(data_dir), Arc::new(SystemClock))
    }

    pub fn state(&self) -> &WaterState {
        &self.state
    }

    pub fn profile(&self) -> &UserProfile {
        &self.state.user_data
    }

    pub fn daily_target(&self) -> u32 {
        self.state.daily_target
    }

    pub fn today_amount(&self) -> u32 {
        self.state.today_amount
    }

    pub fn today_logs(&self) -> &[WaterLog] {
        &self.state.today_logs
    }

    pub fn history(&self) -> &[DayRecord] {
        &self.state.history
    }

    pub fn reminders(&self) -> &[Reminder] {
        &self.state.reminders
    }

    pub fn settings(&self) -> &Settings {
        &self.state.settings
    }

    pub fn last_updated_date(&self) -> NaiveDate {
        self.state.last_updated_date
    }

    /// Drain persistence warnings raised since the last call
    pub fn take_warnings(&mut self) -> Vec<Error> {
        std::mem::take(&mut self.warnings)
    }

    fn persist(&mut self) {
        if let Err(e) = self.storage.save(&self.state) {
            tracing::warn!("State not saved, changes will be lost on restart: {}", e);
            self.warnings.push(e);
        }
    }

    /// Replace the profile and recompute the daily target from it
    ///
    /// Reminders and history are left alone. Returns the new target.
    pub fn set_user_profile(&mut self, update: ProfileUpdate) -> u32 {
        let target = compute_daily_target(update.weight_kg, update.sex);

        self.state.user_data = UserProfile {
            sex: update.sex,
            weight_kg: update.weight_kg,
            wake_time: update.wake_time,
            sleep_time: update.sleep_time,
            has_onboarded: true,
        };
        self.state.daily_target = target;

        tracing::info!("Profile updated, daily target is now {} ml", target);
        self.persist();
        target
    }

    /// Record a drink for today
    ///
    /// `time` is an optional "HH:MM"; anything unparsable falls back to the
    /// current time. A zero amount is rejected and changes nothing.
    pub fn add_water(&mut self, amount: u32, time: Option<&str>) -> Option<WaterLog> {
        if amount == 0 {
            tracing::warn!("Ignoring drink with zero amount");
            return None;
        }

        self.roll_over_if_needed();

        let now = self.clock.now();
        let log_time = match time.map(parse_time_of_day) {
            Some(Ok(parsed)) => parsed,
            Some(Err(e)) => {
                tracing::debug!("{}; using current time", e);
                now.time()
            }
            None => now.time(),
        };

        let log = WaterLog {
            id: new_id(),
            time: format_display(log_time),
            amount,
        };

        self.state.today_logs.insert(0, log.clone());
        self.state.today_amount = self.state.today_amount.saturating_add(amount);

        tracing::debug!("Added {} ml, today at {} ml", amount, self.state.today_amount);
        self.persist();
        Some(log)
    }

    /// Remove one of today's drinks. Unknown ids are ignored.
    pub fn remove_water(&mut self, id: &str) -> Option<WaterLog> {
        let index = self.state.today_logs.iter().position(|l| l.id == id)?;
        let log = self.state.today_logs.remove(index);
        self.state.today_amount = self.state.today_amount.saturating_sub(log.amount);

        tracing::debug!("Removed {} ml, today at {} ml", log.amount, self.state.today_amount);
        self.persist();
        Some(log)
    }

    /// Archive the last active day if the calendar date has moved on
    ///
    /// Returns the archived record. Calling it again on the same date does
    /// nothing.
    pub fn check_day_rollover(&mut self) -> Option<DayRecord> {
        let record = self.roll_over_if_needed()?;
        self.persist();
        Some(record)
    }

    fn roll_over_if_needed(&mut self) -> Option<DayRecord> {
        let today = self.clock.today();
        let last = self.state.last_updated_date;

        if today == last {
            return None;
        }
        if today < last {
            tracing::warn!(
                "Clock is behind last active day ({} < {}), not rolling over",
                today,
                last
            );
            return None;
        }

        let record = DayRecord {
            date: last,
            amount: self.state.today_amount,
            target: self.state.daily_target,
            logs_count: self.state.today_logs.len(),
        };
        self.state.history.push(record.clone());
        self.state.today_amount = 0;
        self.state.today_logs.clear();
        self.state.last_updated_date = today;

        tracing::info!(
            "Archived {}: {} / {} ml over {} drinks",
            record.date,
            record.amount,
            record.target,
            record.logs_count
        );
        Some(record)
    }

    /// Override the daily target, clamped to the allowed range
    pub fn set_daily_target(&mut self, amount: u32) -> u32 {
        let target = clamp_daily_target(amount);
        if target != amount {
            tracing::info!("Daily target {} ml clamped to {} ml", amount, target);
        }
        self.state.daily_target = target;
        self.persist();
        target
    }

    /// Add an enabled reminder, keeping the list sorted by time
    ///
    /// An unparsable time falls back to the current minute.
    pub fn add_reminder(&mut self, time: &str) -> Reminder {
        let time = match parse_time_of_day(time) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("{}; using current time", e);
                truncate_to_minute(self.clock.now().time())
            }
        };

        let reminder = Reminder {
            id: new_id(),
            time,
            enabled: true,
        };
        self.state.reminders.push(reminder.clone());
        self.state.reminders.sort_by_key(|r| r.time);

        self.persist();
        reminder
    }

    /// Flip a reminder on or off. Returns the new enabled flag.
    pub fn toggle_reminder(&mut self, id: &str) -> Option<bool> {
        let reminder = self.state.reminders.iter_mut().find(|r| r.id == id)?;
        reminder.enabled = !reminder.enabled;
        let enabled = reminder.enabled;

        self.persist();
        Some(enabled)
    }

    pub fn delete_reminder(&mut self, id: &str) -> bool {
        let before = self.state.reminders.len();
        self.state.reminders.retain(|r| r.id != id);
        if self.state.reminders.len() == before {
            return false;
        }

        self.persist();
        true
    }

    /// Restore profile, target, today's progress, history and reminders
    /// to factory defaults. Settings are kept.
    pub fn reset_all_data(&mut self) {
        self.state.user_data = UserProfile::default();
        self.state.daily_target = DEFAULT_DAILY_TARGET;
        self.state.today_amount = 0;
        self.state.today_logs.clear();
        self.state.history.clear();
        self.state.reminders.clear();
        self.state.last_updated_date = self.clock.today();

        tracing::info!("All tracking data reset");
        self.persist();
    }

    pub fn set_cup_size(&mut self, size: u32) {
        self.state.settings.cup_size = size;
        self.persist();
    }

    /// Reminder times spread over the profile's waking hours
    ///
    /// Only a suggestion: the reminder list is not touched.
    pub fn suggested_schedule(&self, count: u32) -> ReminderSchedule {
        let profile = &self.state.user_data;
        compute_reminder_schedule(
            profile.wake_time,
            profile.sleep_time,
            self.state.daily_target,
            count,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::state::MemoryStorage;
    use crate::Sex;
    use chrono::{Duration, NaiveDateTime, NaiveTime};

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 14)
            .unwrap()
            .and_hms_opt(10, 15, 0)
            .unwrap()
    }

    fn setup() -> (WaterStore, MemoryStorage, ManualClock) {
        let storage = MemoryStorage::new();
        let clock = ManualClock::new(start());
        let store = WaterStore::open(storage.clone(), Arc::new(clock.clone()));
        (store, storage, clock)
    }

    fn assert_amount_matches_logs(store: &WaterStore) {
        let sum: u32 = store.today_logs().iter().map(|l| l.amount).sum();
        assert_eq!(store.today_amount(), sum);
    }

    #[test]
    fn test_fresh_store_has_factory_defaults() {
        let (store, storage, _) = setup();

        assert_eq!(store.state(), &WaterState::new(start().date()));
        assert!(!store.profile().has_onboarded);
        // Nothing to save until something changes
        assert_eq!(storage.save_count(), 0);
    }

    #[test]
    fn test_set_user_profile_recomputes_target() {
        let (mut store, _, clock) = setup();
        store.add_reminder("08:00");
        store.add_water(1200, None);
        clock.advance(Duration::days(1));
        store.check_day_rollover();
        let history = store.history().to_vec();
        assert_eq!(history.len(), 1);

        let target = store.set_user_profile(ProfileUpdate {
            sex: Sex::Male,
            weight_kg: 70.0,
            wake_time: NaiveTime::from_hms_opt(6, 30, 0).unwrap(),
            sleep_time: NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
        });

        assert_eq!(target, 2695);
        assert_eq!(store.daily_target(), 2695);
        assert!(store.profile().has_onboarded);
        assert_eq!(store.reminders().len(), 1);
        assert_eq!(store.history(), history.as_slice());
    }

    #[test]
    fn test_add_water_prepends_log() {
        let (mut store, _, _) = setup();

        let first = store.add_water(250, None).unwrap();
        let second = store.add_water(300, Some("14:05")).unwrap();

        assert_eq!(first.time, "10:15 AM");
        assert_eq!(second.time, "02:05 PM");
        assert_eq!(store.today_logs()[0].id, second.id);
        assert_eq!(store.today_logs()[1].id, first.id);
        assert_eq!(store.today_amount(), 550);
    }

    #[test]
    fn test_add_water_with_bad_time_uses_clock() {
        let (mut store, _, _) = setup();

        let log = store.add_water(200, Some("after lunch")).unwrap();
        assert_eq!(log.time, "10:15 AM");
    }

    #[test]
    fn test_add_water_rejects_zero() {
        let (mut store, storage, _) = setup();

        assert!(store.add_water(0, None).is_none());
        assert!(store.today_logs().is_empty());
        assert_eq!(storage.save_count(), 0);
    }

    #[test]
    fn test_amount_tracks_logs_through_adds_and_removes() {
        let (mut store, _, _) = setup();

        let mut ids = Vec::new();
        for amount in [250, 100, 330, 500, 75] {
            ids.push(store.add_water(amount, None).unwrap().id);
            assert_amount_matches_logs(&store);
        }

        store.remove_water(&ids[1]);
        assert_amount_matches_logs(&store);
        store.add_water(180, None);
        assert_amount_matches_logs(&store);
        store.remove_water(&ids[1]);
        assert_amount_matches_logs(&store);
        store.remove_water(&ids[4]);
        assert_amount_matches_logs(&store);

        assert_eq!(store.today_amount(), 250 + 330 + 500 + 180);
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let (mut store, storage, _) = setup();
        store.add_water(250, None);
        let before = store.state().clone();
        let saves = storage.save_count();

        assert!(store.remove_water("missing").is_none());
        assert_eq!(store.state(), &before);
        assert_eq!(storage.save_count(), saves);
    }

    #[test]
    fn test_remove_floors_amount_at_zero() {
        let (mut store, _, _) = setup();
        let log = store.add_water(400, None).unwrap();
        store.state.today_amount = 100;

        let removed = store.remove_water(&log.id).unwrap();
        assert_eq!(removed.amount, 400);
        assert_eq!(store.today_amount(), 0);
        assert!(store.today_logs().is_empty());
    }

    #[test]
    fn test_rollover_archives_previous_day() {
        let (mut store, _, clock) = setup();
        store.set_daily_target(2000);
        store.add_water(600, None);
        store.add_water(600, None);
        store.add_water(600, None);

        clock.advance(Duration::days(1));
        let record = store.check_day_rollover().unwrap();

        assert_eq!(
            record,
            DayRecord {
                date: start().date(),
                amount: 1800,
                target: 2000,
                logs_count: 3,
            }
        );
        assert_eq!(store.history(), &[record]);
        assert_eq!(store.today_amount(), 0);
        assert!(store.today_logs().is_empty());
        assert_eq!(store.last_updated_date(), start().date() + Duration::days(1));
    }

    #[test]
    fn test_rollover_is_idempotent() {
        let (mut store, _, clock) = setup();
        store.add_water(500, None);
        clock.advance(Duration::days(1));

        assert!(store.check_day_rollover().is_some());
        store.add_water(200, None);
        let before = store.state().clone();

        assert!(store.check_day_rollover().is_none());
        assert_eq!(store.state(), &before);
        assert_eq!(store.history().len(), 1);
    }

    #[test]
    fn test_add_water_rolls_over_first() {
        let (mut store, _, clock) = setup();
        store.add_water(700, None);

        clock.advance(Duration::hours(16));
        store.add_water(300, None);

        assert_eq!(store.history().len(), 1);
        assert_eq!(store.history()[0].amount, 700);
        assert_eq!(store.today_amount(), 300);
        assert_eq!(store.today_logs().len(), 1);
    }

    #[test]
    fn test_reopen_after_idle_days_archives_once() {
        let storage = MemoryStorage::new();
        let clock = ManualClock::new(start());
        {
            let mut store = WaterStore::open(storage.clone(), Arc::new(clock.clone()));
            store.add_water(1200, None);
        }

        clock.advance(Duration::days(4));
        let store = WaterStore::open(storage.clone(), Arc::new(clock.clone()));

        assert_eq!(store.history().len(), 1);
        assert_eq!(store.history()[0].date, start().date());
        assert_eq!(store.history()[0].amount, 1200);
        assert_eq!(store.today_amount(), 0);

        // The archive was persisted on open
        let reloaded = storage.load().unwrap().unwrap();
        assert_eq!(reloaded.history.len(), 1);
    }

    #[test]
    fn test_history_dates_are_unique() {
        let (mut store, _, clock) = setup();
        for _ in 0..5 {
            store.add_water(250, None);
            store.check_day_rollover();
            store.check_day_rollover();
            clock.advance(Duration::hours(13));
        }

        let mut dates: Vec<_> = store.history().iter().map(|r| r.date).collect();
        let count = dates.len();
        dates.dedup();
        assert_eq!(dates.len(), count);
        assert!(store.history().windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn test_clock_going_backwards_does_not_archive() {
        let (mut store, _, clock) = setup();
        store.add_water(250, None);

        clock.advance(Duration::days(-1));
        assert!(store.check_day_rollover().is_none());
        assert!(store.history().is_empty());
    }

    #[test]
    fn test_set_daily_target_clamps() {
        let (mut store, _, _) = setup();

        assert_eq!(store.set_daily_target(900), 1500);
        assert_eq!(store.set_daily_target(3200), 3200);
        assert_eq!(store.set_daily_target(12_000), 10_000);
        assert_eq!(store.daily_target(), 10_000);
    }

    #[test]
    fn test_set_daily_target_survives_until_profile_change() {
        let (mut store, _, _) = setup();
        store.set_daily_target(3000);
        assert_eq!(store.daily_target(), 3000);

        store.set_user_profile(ProfileUpdate {
            sex: Sex::Female,
            weight_kg: 40.0,
            wake_time: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            sleep_time: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
        });
        assert_eq!(store.daily_target(), 1500);
    }

    #[test]
    fn test_reminders_stay_sorted() {
        let (mut store, _, _) = setup();

        store.add_reminder("14:05");
        store.add_reminder("09:00");
        store.add_reminder("22:10");

        let times: Vec<_> = store
            .reminders()
            .iter()
            .map(|r| crate::clock::format_hhmm(r.time))
            .collect();
        assert_eq!(times, vec!["09:00", "14:05", "22:10"]);
        assert!(store.reminders().iter().all(|r| r.enabled));
    }

    #[test]
    fn test_add_reminder_with_bad_time_uses_current_minute() {
        let (mut store, _, clock) = setup();
        clock.advance(Duration::seconds(42));

        let reminder = store.add_reminder("noon-ish");
        assert_eq!(reminder.time, NaiveTime::from_hms_opt(10, 15, 0).unwrap());
    }

    #[test]
    fn test_toggle_and_delete_reminder() {
        let (mut store, _, _) = setup();
        let reminder = store.add_reminder("09:00");

        assert_eq!(store.toggle_reminder(&reminder.id), Some(false));
        assert_eq!(store.toggle_reminder(&reminder.id), Some(true));
        assert_eq!(store.toggle_reminder("missing"), None);

        assert!(!store.delete_reminder("missing"));
        assert!(store.delete_reminder(&reminder.id));
        assert!(store.reminders().is_empty());
    }

    #[test]
    fn test_reset_restores_defaults_but_keeps_settings() {
        let (mut store, _, clock) = setup();
        store.set_user_profile(ProfileUpdate {
            sex: Sex::Female,
            weight_kg: 80.0,
            wake_time: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            sleep_time: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
        });
        store.add_water(500, None);
        store.add_reminder("10:00");
        store.set_cup_size(330);
        clock.advance(Duration::days(1));
        store.check_day_rollover();

        store.reset_all_data();

        let mut expected = WaterState::new(clock.today());
        expected.settings.cup_size = 330;
        assert_eq!(store.state(), &expected);
        assert!(!store.profile().has_onboarded);
    }

    #[test]
    fn test_every_mutation_is_persisted() {
        let (mut store, storage, _) = setup();

        store.add_water(250, None);
        store.add_reminder("09:00");
        store.set_cup_size(500);

        let saved = storage.load().unwrap().unwrap();
        assert_eq!(&saved, store.state());
        assert_eq!(storage.save_count(), 3);
    }

    #[test]
    fn test_restart_reconstructs_identical_state() {
        let storage = MemoryStorage::new();
        let clock = Arc::new(ManualClock::new(start()));

        let mut store = WaterStore::open(storage.clone(), clock.clone());
        store.add_water(250, Some("08:00"));
        store.add_reminder("12:00");
        store.set_daily_target(2600);
        let snapshot = store.state().clone();
        drop(store);

        let reopened = WaterStore::open(storage, clock);
        assert_eq!(reopened.state(), &snapshot);
    }

    #[test]
    fn test_failed_save_keeps_memory_state_and_warns() {
        let (mut store, storage, _) = setup();
        storage.set_fail_writes(true);

        let log = store.add_water(250, None).unwrap();

        assert_eq!(store.today_amount(), 250);
        assert_eq!(store.today_logs()[0], log);
        let warnings = store.take_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], Error::Io(_)));
        assert!(store.take_warnings().is_empty());
    }

    #[test]
    fn test_corrupted_storage_opens_with_defaults_and_warning() {
        let storage = MemoryStorage::with_document("not json");
        let clock = ManualClock::new(start());

        let mut store = WaterStore::open(storage, Arc::new(clock));

        assert_eq!(store.state(), &WaterState::new(start().date()));
        assert_eq!(store.take_warnings().len(), 1);
    }

    #[test]
    fn test_suggested_schedule_does_not_touch_reminders() {
        let (mut store, _, _) = setup();
        store.set_daily_target(2400);

        let schedule = store.suggested_schedule(5);

        // Default profile is awake 07:00-22:00
        assert_eq!(schedule.formatted(), vec!["10:00", "13:00", "16:00", "19:00", "22:00"]);
        assert_eq!(schedule.ml_per_reminder, 480);
        assert!(store.reminders().is_empty());
    }
}
