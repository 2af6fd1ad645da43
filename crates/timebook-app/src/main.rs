//! Timebook: book hours on your Jira issues, one week at a time.
//!
//! ```bash
//! timebook login --url https://jira.example.org
//! timebook                 # this week
//! timebook --week-offset -1
//! timebook --demo          # no server needed
//! ```

mod console;
mod login;
mod render;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use timebook_core::Config;
use timebook_sync::{Timesheet, TimesheetSettings};
use timebook_tracker::{InMemoryTracker, IssueTracker};

#[derive(Parser)]
#[command(name = "timebook")]
#[command(about = "Book hours on your Jira issues, one week at a time", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Week to open, relative to the current one
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    week_offset: i64,

    /// Show issues assigned to this user instead of yourself
    #[arg(long, value_name = "USER")]
    user: Option<String>,

    /// Use built-in sample data instead of a server
    #[arg(long)]
    demo: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Save credentials for the tracker
    Login {
        /// Tracker base URL (saved to the config file)
        #[arg(long, value_name = "URL")]
        url: Option<String>,

        #[arg(long, value_name = "USERNAME")]
        username: Option<String>,
    },

    /// Remove saved credentials
    Logout,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, validation) = Config::load_validated()?;
    timebook_core::init(&config.logging.level)?;
    for warning in &validation.warnings {
        tracing::warn!("Config warning: {}", warning);
    }

    match cli.command {
        Some(Commands::Login { url, username }) => login::login(&mut config, url, username),
        Some(Commands::Logout) => login::logout(&config),
        None if cli.demo => run_demo(&config, cli.week_offset),
        None => run(&config, cli.week_offset, cli.user.as_deref()),
    }
}

fn run(config: &Config, week_offset: i64, user: Option<&str>) -> Result<()> {
    let credentials = login::saved_credentials(config)?;
    let me = login::verify(config, credentials.clone())?;
    tracing::info!(
        "Signed in as {}",
        me.display_name.as_deref().unwrap_or(&credentials.username)
    );

    let settings = TimesheetSettings::from_config(&config.tracker, &credentials.username, user);
    let client = login::client_for(config, credentials)?;
    open(Arc::new(client), settings, week_offset)
}

fn run_demo(config: &Config, week_offset: i64) -> Result<()> {
    let today = Local::now().date_naive();
    let tracker = InMemoryTracker::demo("demo", today);
    let settings = TimesheetSettings::from_config(&config.tracker, "demo", None);

    println!("Demo mode: bookings go to an in-memory tracker and are lost on exit.");
    open(Arc::new(tracker), settings, week_offset)
}

fn open<T: IssueTracker>(tracker: Arc<T>, settings: TimesheetSettings, week_offset: i64) -> Result<()> {
    let today = Local::now().date_naive();
    let mut sheet = Timesheet::start(tracker, settings, today)?;
    sheet
        .refresh()
        .map_err(|e| anyhow::anyhow!(e.user_message()))
        .context("Failed to load issues")?;
    sheet.navigate(week_offset);

    println!("{}", console::HELP);
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let report = console::run(sheet, stdin.lock(), &mut stdout)?;

    tracing::info!(
        "Session finished: {} bookings, {} failed",
        report.processed,
        report.failed
    );
    Ok(())
}
