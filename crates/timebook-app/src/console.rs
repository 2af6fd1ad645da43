//! Line-oriented console: the UI thread of the application.

use std::io::{BufRead, Write};
use std::str::FromStr;

use anyhow::{Context, Result};
use thiserror::Error;
use timebook_sync::{
    BookingOutcome, CellEdit, ShutdownReport, SyncError, Timesheet, WorkerEvent,
};
use timebook_tracker::{ErrorKind, IssueTracker};

use crate::render::render_week;

pub const HELP: &str = "\
Commands:
  show                      print the week
  next | prev | today       change week
  set <row> <day> <hours>   book hours (day: 1-7 or mon..sun)
  refresh                   reload issues and work logs
  quit                      finish pending bookings and exit
Hours marked * are still being sent; ! means not saved, set them again.";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Show,
    Next,
    Prev,
    Today,
    /// Row and day are zero-based here
    Set { row: usize, day: usize, hours: String },
    Refresh,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseCommandError {
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),

    #[error("usage: set <row> <day> <hours>")]
    SetUsage,

    #[error("'{0}' is not a row number")]
    BadRow(String),

    #[error("'{0}' is not a day (1-7 or mon..sun)")]
    BadDay(String),
}

fn parse_day(text: &str) -> Result<usize, ParseCommandError> {
    const NAMES: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

    let lower = text.to_ascii_lowercase();
    if let Some(index) = NAMES.iter().position(|name| lower.starts_with(name)) {
        return Ok(index);
    }
    match text.parse::<usize>() {
        Ok(n) if (1..=7).contains(&n) => Ok(n - 1),
        _ => Err(ParseCommandError::BadDay(text.to_string())),
    }
}

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(Command::Show);
        };

        match verb.to_ascii_lowercase().as_str() {
            "show" | "s" => Ok(Command::Show),
            "next" | "n" => Ok(Command::Next),
            "prev" | "p" => Ok(Command::Prev),
            "today" | "t" => Ok(Command::Today),
            "refresh" | "r" => Ok(Command::Refresh),
            "help" | "h" | "?" => Ok(Command::Help),
            "quit" | "q" | "exit" => Ok(Command::Quit),
            "set" => {
                let (Some(row), Some(day), Some(hours), None) =
                    (words.next(), words.next(), words.next(), words.next())
                else {
                    return Err(ParseCommandError::SetUsage);
                };
                let row = match row.parse::<usize>() {
                    Ok(n) if n >= 1 => n - 1,
                    _ => return Err(ParseCommandError::BadRow(row.to_string())),
                };
                Ok(Command::Set {
                    row,
                    day: parse_day(day)?,
                    hours: hours.to_string(),
                })
            }
            other => Err(ParseCommandError::Unknown(other.to_string())),
        }
    }
}

fn describe(event: &WorkerEvent) -> Option<String> {
    match event {
        WorkerEvent::Booked { request, outcome } => {
            let what = match outcome {
                BookingOutcome::Created(_) => "booked",
                BookingOutcome::Updated(_) => "updated",
                BookingOutcome::Deleted(_) => "removed",
                BookingOutcome::Skipped => return None,
            };
            Some(format!(
                "{} {} {}h on {}",
                request.issue.key, what, request.hours, request.date
            ))
        }
        WorkerEvent::Failed { request, error } => {
            let hint = match error.kind {
                ErrorKind::Authentication => " Run 'timebook login' and restart.",
                ErrorKind::Transport => "",
            };
            Some(format!(
                "! {} on {} was not saved: {}{}",
                request.issue.key, request.date, error.message, hint
            ))
        }
        WorkerEvent::Stopped { .. } => None,
    }
}

fn report_events<W: Write>(out: &mut W, events: &[WorkerEvent]) -> Result<()> {
    for line in events.iter().filter_map(describe) {
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

fn report_error<W: Write>(out: &mut W, err: &SyncError) -> Result<()> {
    writeln!(out, "! {}", err.user_message())?;
    if err.should_reauthenticate() {
        writeln!(out, "  Run 'timebook login' and restart.")?;
    }
    Ok(())
}

fn show<T: IssueTracker, W: Write>(out: &mut W, sheet: &Timesheet<T>) -> Result<()> {
    let text = render_week(
        sheet.week(),
        sheet.issues(),
        &sheet.ledger(),
        sheet.settings().hours_per_story_point,
    );
    writeln!(out, "{}", text)?;
    Ok(())
}

/// Run commands from `input` until `quit` or end of input, then shut the
/// timesheet down.
pub fn run<T, R, W>(mut sheet: Timesheet<T>, input: R, out: &mut W) -> Result<ShutdownReport>
where
    T: IssueTracker,
    R: BufRead,
    W: Write,
{
    show(out, &sheet)?;
    let mut lines = input.lines();

    loop {
        let events = sheet.poll_events();
        report_events(out, &events)?;

        write!(out, "> ")?;
        out.flush()?;

        let Some(line) = lines.next() else {
            writeln!(out)?;
            break;
        };
        let line = line.context("Failed to read command")?;

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                writeln!(out, "! {}", e)?;
                continue;
            }
        };

        match command {
            Command::Show => show(out, &sheet)?,
            Command::Next => {
                sheet.navigate(1);
                show(out, &sheet)?;
            }
            Command::Prev => {
                sheet.navigate(-1);
                show(out, &sheet)?;
            }
            Command::Today => {
                sheet.today_week();
                show(out, &sheet)?;
            }
            Command::Refresh => match sheet.refresh() {
                Ok(()) => show(out, &sheet)?,
                Err(e) => report_error(out, &e)?,
            },
            Command::Set { row, day, hours } => match sheet.edit_cell(row, day, &hours) {
                Ok(CellEdit::Queued(request)) => {
                    writeln!(out, "queued {}h for {} on {}", request.hours, request.issue.key, request.date)?
                }
                Ok(CellEdit::Unchanged) => writeln!(out, "unchanged")?,
                Err(e) => report_error(out, &e)?,
            },
            Command::Help => writeln!(out, "{}", HELP)?,
            Command::Quit => break,
        }
    }

    writeln!(out, "Finishing pending bookings...")?;
    let report = sheet.shutdown()?;
    report_events(out, &report.events)?;
    writeln!(
        out,
        "{} bookings sent this session, {} failed.",
        report.processed, report.failed
    )?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use timebook_sync::TimesheetSettings;
    use timebook_tracker::{InMemoryTracker, Issue, IssueStatus};

    #[test]
    fn test_parse_commands() {
        assert_eq!("".parse::<Command>(), Ok(Command::Show));
        assert_eq!("NEXT".parse::<Command>(), Ok(Command::Next));
        assert_eq!("q".parse::<Command>(), Ok(Command::Quit));
        assert_eq!(
            "set 2 wed 4.5".parse::<Command>(),
            Ok(Command::Set {
                row: 1,
                day: 2,
                hours: "4.5".into()
            })
        );
        assert_eq!(
            "set 1 7 .5".parse::<Command>(),
            Ok(Command::Set {
                row: 0,
                day: 6,
                hours: ".5".into()
            })
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("set 1 2".parse::<Command>(), Err(ParseCommandError::SetUsage));
        assert_eq!(
            "set 0 2 4".parse::<Command>(),
            Err(ParseCommandError::BadRow("0".into()))
        );
        assert_eq!(
            "set 1 8 4".parse::<Command>(),
            Err(ParseCommandError::BadDay("8".into()))
        );
        assert!(matches!(
            "book 1 2 3".parse::<Command>(),
            Err(ParseCommandError::Unknown(_))
        ));
    }

    #[test]
    fn test_session_books_and_reports() {
        let tracker = InMemoryTracker::new("alice");
        tracker.add_issue(
            "alice",
            Issue {
                id: "10001".into(),
                key: "ABC-1".into(),
                summary: "Thing".into(),
                status: IssueStatus::Open,
                story_points: None,
            },
        );
        let tracker = Arc::new(tracker);
        let wed = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let mut sheet =
            Timesheet::start(Arc::clone(&tracker), TimesheetSettings::new("alice"), wed).unwrap();
        sheet.refresh().unwrap();

        let input = "set 1 wed 4\nset 1 wed abc\nbogus\nquit\n".as_bytes();
        let mut out = Vec::new();
        let report = run(sheet, input, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(report.processed, 1);
        assert!(text.contains("queued 4h for ABC-1 on 2024-01-03"));
        assert!(text.contains("Enter hours as a number"));
        assert!(text.contains("unknown command 'bogus'"));
        assert!((tracker.hours_on("10001", wed) - 4.0).abs() < f64::EPSILON);
    }
}
