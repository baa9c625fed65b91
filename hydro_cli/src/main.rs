use chrono::NaiveTime;
use clap::{Parser, Subcommand};
use hydro_core::clock::{format_hhmm, parse_time_of_day};
use hydro_core::history::{level_progress, monthly_totals, recent_days, XP_PER_LEVEL};
use hydro_core::*;
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "hydro")]
#[command(about = "Water intake tracker with daily targets and reminders", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use a specific config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show today's progress (default)
    Status,

    /// Log a drink
    Drink {
        /// Amount in ml (defaults to your cup size)
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        amount: Option<u32>,

        /// Time of the drink as HH:MM (defaults to now)
        #[arg(long)]
        at: Option<String>,
    },

    /// Remove a logged drink from today
    Undo {
        /// Drink id as shown by `status`
        id: String,
    },

    /// Set your profile and recompute the daily target
    Profile {
        #[arg(long, value_parser = parse_sex)]
        sex: Sex,

        /// Body weight in kg
        #[arg(long, value_parser = parse_weight)]
        weight: f64,

        /// Wake time as HH:MM
        #[arg(long, value_parser = parse_hhmm)]
        wake: NaiveTime,

        /// Sleep time as HH:MM
        #[arg(long, value_parser = parse_hhmm)]
        sleep: NaiveTime,
    },

    /// Override the daily target in ml
    Target { ml: u32 },

    /// Set the default cup size in ml
    Cup {
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        ml: u32,
    },

    /// Manage reminders
    Reminders {
        #[command(subcommand)]
        action: Option<ReminderAction>,
    },

    /// Show intake for recent days
    History {
        /// Number of days to show, up to ten years
        #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(u16).range(1..=3660))]
        days: u16,
    },

    /// Show overall statistics
    Report,

    /// Export history to CSV
    Export {
        path: PathBuf,

        /// Add a row for today's running total
        #[arg(long)]
        include_today: bool,
    },

    /// Erase profile, history, reminders and today's progress
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },

    /// Watch reminders and notify when one is due
    Watch {
        /// Stop after this many seconds instead of running until killed
        #[arg(long)]
        duration: Option<u64>,
    },
}

#[derive(Subcommand)]
enum ReminderAction {
    /// List reminders (default)
    List,

    /// Add a reminder at HH:MM
    Add { time: String },

    /// Enable or disable a reminder
    Toggle { id: String },

    /// Delete a reminder
    Delete { id: String },

    /// Suggest reminder times spread over your waking hours
    Suggest {
        /// Number of reminders
        #[arg(long)]
        count: Option<u32>,

        /// Add the suggested times as reminders
        #[arg(long)]
        apply: bool,
    },
}

fn parse_sex(s: &str) -> std::result::Result<Sex, String> {
    s.parse::<Sex>().map_err(|e| e.to_string())
}

fn parse_weight(s: &str) -> std::result::Result<f64, String> {
    match s.parse::<f64>() {
        Ok(w) if w.is_finite() && w > 0.0 => Ok(w),
        _ => Err(format!("weight must be a positive number, got {:?}", s)),
    }
}

fn parse_hhmm(s: &str) -> std::result::Result<NaiveTime, String> {
    parse_time_of_day(s).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    hydro_core::logging::init_with_level(hydro_core::logging::cli_level(cli.verbose));

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());

    let mut store = WaterStore::open_in_dir(&data_dir);
    report_warnings(&mut store);

    match cli.command.unwrap_or(Commands::Status) {
        Commands::Status => cmd_status(&store),
        Commands::Drink { amount, at } => cmd_drink(&mut store, amount, at.as_deref()),
        Commands::Undo { id } => cmd_undo(&mut store, &id),
        Commands::Profile {
            sex,
            weight,
            wake,
            sleep,
        } => cmd_profile(
            &mut store,
            ProfileUpdate {
                sex,
                weight_kg: weight,
                wake_time: wake,
                sleep_time: sleep,
            },
        ),
        Commands::Target { ml } => {
            let target = store.set_daily_target(ml);
            println!("✓ Daily target set to {} ml", target);
        }
        Commands::Cup { ml } => {
            store.set_cup_size(ml);
            println!("✓ Cup size set to {} ml", ml);
        }
        Commands::Reminders { action } => {
            cmd_reminders(&mut store, action.unwrap_or(ReminderAction::List), &config)
        }
        Commands::History { days } => cmd_history(&store, days.into()),
        Commands::Report => cmd_report(&store),
        Commands::Export {
            path,
            include_today,
        } => cmd_export(&store, &path, include_today)?,
        Commands::Reset { yes } => {
            if !yes {
                eprintln!("This erases your profile, history and reminders.");
                eprintln!("Run again with --yes to confirm.");
                return Err(Error::State("reset not confirmed".into()));
            }
            store.reset_all_data();
            println!("✓ All data reset");
        }
        Commands::Watch { duration } => cmd_watch(&store, &data_dir, &config, duration)?,
    }

    report_warnings(&mut store);
    Ok(())
}

fn report_warnings(store: &mut WaterStore) {
    for warning in store.take_warnings() {
        eprintln!("warning: {}", warning);
    }
}

fn cmd_status(store: &WaterStore) {
    let state = store.state();

    println!(
        "Today ({}): {} / {} ml ({:.0}%)",
        state.last_updated_date,
        state.today_amount,
        state.daily_target,
        state.progress() * 100.0
    );
    if state.remaining() == 0 {
        println!("  🎉 Daily target reached!");
    } else {
        println!("  {} ml to go", state.remaining());
    }

    if !state.user_data.has_onboarded {
        println!();
        println!("  ℹ Run `hydro profile` to personalise your daily target.");
    }

    println!();
    if state.today_logs.is_empty() {
        println!("No drinks logged yet today.");
    } else {
        println!("Drinks:");
        for log in &state.today_logs {
            println!("  {}  {:>5} ml  {}", log.time, log.amount, log.id);
        }
    }

    let enabled: Vec<_> = state.reminders.iter().filter(|r| r.enabled).collect();
    if !enabled.is_empty() {
        println!();
        let times: Vec<_> = enabled.iter().map(|r| format_hhmm(r.time)).collect();
        println!("Reminders: {}", times.join(", "));
    }
}

fn cmd_drink(store: &mut WaterStore, amount: Option<u32>, at: Option<&str>) {
    let amount = amount.unwrap_or(store.settings().cup_size);

    match store.add_water(amount, at) {
        Some(log) => {
            println!("✓ Logged {} ml at {}", log.amount, log.time);
            println!(
                "  Today: {} / {} ml",
                store.today_amount(),
                store.daily_target()
            );
        }
        None => println!("Nothing logged: amount must be positive."),
    }
}

fn cmd_undo(store: &mut WaterStore, id: &str) {
    match store.remove_water(id) {
        Some(log) => {
            println!("✓ Removed {} ml logged at {}", log.amount, log.time);
            println!(
                "  Today: {} / {} ml",
                store.today_amount(),
                store.daily_target()
            );
        }
        None => println!("No drink with id {} today.", id),
    }
}

fn cmd_profile(store: &mut WaterStore, update: ProfileUpdate) {
    let target = store.set_user_profile(update);
    println!("✓ Profile saved");
    println!("  Daily target: {} ml", target);
}

fn cmd_reminders(store: &mut WaterStore, action: ReminderAction, config: &Config) {
    match action {
        ReminderAction::List => {
            if store.reminders().is_empty() {
                println!("No reminders set.");
            }
            for reminder in store.reminders() {
                let flag = if reminder.enabled { "on " } else { "off" };
                println!("  {}  {}  {}", format_hhmm(reminder.time), flag, reminder.id);
            }
        }
        ReminderAction::Add { time } => {
            let reminder = store.add_reminder(&time);
            println!(
                "✓ Reminder added at {} ({})",
                format_hhmm(reminder.time),
                reminder.id
            );
        }
        ReminderAction::Toggle { id } => match store.toggle_reminder(&id) {
            Some(true) => println!("✓ Reminder enabled"),
            Some(false) => println!("✓ Reminder disabled"),
            None => println!("No reminder with id {}.", id),
        },
        ReminderAction::Delete { id } => {
            if store.delete_reminder(&id) {
                println!("✓ Reminder deleted");
            } else {
                println!("No reminder with id {}.", id);
            }
        }
        ReminderAction::Suggest { count, apply } => {
            let count = count.unwrap_or(config.reminders.schedule_count);
            let schedule = store.suggested_schedule(count);

            println!(
                "Suggested: {} reminders, about {} ml each",
                schedule.times.len(),
                schedule.ml_per_reminder
            );
            for time in schedule.formatted() {
                println!("  {}", time);
            }

            if apply {
                for time in schedule.formatted() {
                    store.add_reminder(&time);
                }
                println!("✓ Added {} reminders", schedule.times.len());
            }
        }
    }
}

fn cmd_history(store: &WaterStore, days: usize) {
    for point in recent_days(store.state(), days) {
        let mark = if point.met_target() { "✓" } else { " " };
        let label = if point.is_today { " (today)" } else { "" };
        println!(
            "  {} {}  {:>5} / {} ml{}",
            mark, point.date, point.amount, point.target, label
        );
    }
}

fn cmd_report(store: &WaterStore) {
    let summary = summarize(store.state());

    println!("Total consumed:   {} ml", summary.total_consumed);
    println!("Days tracked:     {}", summary.days_tracked);
    println!("Daily average:    {} ml", summary.average_per_day);
    println!(
        "Days on target:   {} of {}",
        summary.success_days, summary.days_tracked
    );
    println!("Success rate:     {}%", summary.success_rate);
    println!("Drinks per day:   {:.1}", summary.average_logs_per_day);
    println!("Current streak:   {} days", summary.current_streak);

    let progress = level_progress(store.state());
    println!();
    println!("Level {}: {}", progress.level, progress.rank);
    println!(
        "  {} / {} XP to level {}",
        progress.level_xp,
        XP_PER_LEVEL,
        progress.level + 1
    );

    println!();
    println!("By month:");
    for month in monthly_totals(store.state(), 6) {
        println!("  {}  {:>7} ml", month.month, month.amount);
    }

    println!();
    if summary.average_per_day < store.daily_target() {
        println!(
            "You are averaging {} ml, below your target of {} ml. Try one more glass in the afternoon.",
            summary.average_per_day,
            store.daily_target()
        );
    } else {
        println!("You are meeting your target on average. Keep it up!");
    }
}

fn cmd_export(store: &WaterStore, path: &Path, include_today: bool) -> Result<()> {
    let rows = export_history_csv(store.state(), path, include_today)?;
    println!("✓ Exported {} days", rows);
    println!("  CSV: {}", path.display());
    Ok(())
}

/// Prints reminders to the terminal
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn request_permission(&mut self) -> Permission {
        Permission::Granted
    }

    fn show_notification(&mut self, notification: &Notification) {
        println!();
        println!("🔔 {}", notification.title);
        println!("   {}", notification.body);
    }

    fn show_message(&mut self, message: &str) {
        println!("   » {}", message);
    }
}

fn cmd_watch(
    store: &WaterStore,
    data_dir: &Path,
    config: &Config,
    duration: Option<u64>,
) -> Result<()> {
    let enabled = store.reminders().iter().filter(|r| r.enabled).count();
    println!(
        "Watching {} enabled reminders (checking every {}s)",
        enabled,
        config.reminders.poll_interval().as_secs()
    );

    // Re-read on every poll so reminders edited by other invocations are seen.
    // A bad file was already backed up on open; warn once until it is readable.
    let storage = JsonFileStorage::in_dir(data_dir);
    let fallback = store.reminders().to_vec();
    let warned = Cell::new(false);
    let source = move || match storage.peek() {
        Ok(state) => {
            warned.set(false);
            state.map_or_else(|| fallback.clone(), |s| s.reminders)
        }
        Err(e) => {
            if !warned.replace(true) {
                tracing::warn!("Could not read reminders, using the last known list: {}", e);
            }
            fallback.clone()
        }
    };

    let poller = ReminderPoller::spawn(
        source,
        ConsoleNotifier,
        Arc::new(SystemClock),
        config.notification.to_notification(),
        config.reminders.poll_interval(),
    )?;

    match duration {
        Some(secs) => {
            std::thread::sleep(Duration::from_secs(secs));
            poller.stop();
        }
        None => loop {
            std::thread::park();
        },
    }

    Ok(())
}
