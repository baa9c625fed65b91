//! Reminder polling and notification delivery.
//!
//! The poller only reads reminders; it never changes store state. Each poll
//! compares the current wall-clock minute with every enabled reminder and
//! fires at most once per minute.

use crate::clock::{truncate_to_minute, Clock};
use crate::Reminder;
use chrono::NaiveDateTime;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

pub const DEFAULT_TITLE: &str = "Time to drink water! 💧";
pub const DEFAULT_BODY: &str = "It's time for a drink to reach your daily target.";

/// What the user sees when a reminder fires
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

impl Default for Notification {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.into(),
            body: DEFAULT_BODY.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

/// Desktop notification and in-app message collaborator
pub trait Notifier: Send {
    /// Ask for permission to notify. Safe to call repeatedly.
    fn request_permission(&mut self) -> Permission;

    fn show_notification(&mut self, notification: &Notification);

    /// Short-lived in-app message shown alongside the notification
    fn show_message(&mut self, message: &str);
}

/// Decides whether a reminder is due, remembering the last minute it fired
#[derive(Debug, Default)]
pub struct ReminderCheck {
    last_fired: Option<NaiveDateTime>,
}

impl ReminderCheck {
    pub fn new() -> Self {
        Self::default()
    }

    /// The enabled reminder matching `now`'s minute, unless this minute
    /// already fired
    pub fn due<'a>(&mut self, now: NaiveDateTime, reminders: &'a [Reminder]) -> Option<&'a Reminder> {
        let minute = now.date().and_time(truncate_to_minute(now.time()));
        if self.last_fired == Some(minute) {
            return None;
        }

        let reminder = reminders
            .iter()
            .find(|r| r.enabled && r.time == minute.time())?;
        self.last_fired = Some(minute);
        Some(reminder)
    }
}

/// Run one poll: fire the notification if a reminder is due and permitted
///
/// Returns true if something fired.
pub fn poll_once(
    check: &mut ReminderCheck,
    now: NaiveDateTime,
    reminders: &[Reminder],
    notifier: &mut dyn Notifier,
    notification: &Notification,
) -> bool {
    if notifier.request_permission() != Permission::Granted {
        return false;
    }

    let Some(reminder) = check.due(now, reminders) else {
        return false;
    };

    tracing::info!("Reminder {} fired at {}", reminder.id, now.format("%H:%M"));
    notifier.show_notification(notification);
    notifier.show_message(&notification.title);
    true
}

/// Background thread polling reminders on a fixed interval
///
/// Dropping the poller stops the thread and waits for it to exit.
pub struct ReminderPoller {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ReminderPoller {
    /// Start polling
    ///
    /// `source` is called on every poll for the current reminder list.
    pub fn spawn<S, N>(
        source: S,
        mut notifier: N,
        clock: Arc<dyn Clock>,
        notification: Notification,
        interval: Duration,
    ) -> std::io::Result<Self>
    where
        S: Fn() -> Vec<Reminder> + Send + 'static,
        N: Notifier + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = std::thread::Builder::new()
            .name("reminder-poller".into())
            .spawn(move || {
                let mut check = ReminderCheck::new();
                tracing::debug!("Reminder poller started, every {:?}", interval);
                loop {
                    let reminders = source();
                    poll_once(&mut check, clock.now(), &reminders, &mut notifier, &notification);

                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::debug!("Reminder poller stopped");
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop polling and wait for the thread to finish
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Reminder poller thread panicked");
            }
        }
    }
}

impl Drop for ReminderPoller {
    fn drop(&mut self) {
        self.shutdown();
    }
}
