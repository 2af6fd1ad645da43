//! Text rendering of the week grid.

use timebook_sync::{CalendarWeek, WorklogLedger};
use timebook_tracker::Issue;

const SUMMARY_WIDTH: usize = 28;

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
        out.push('~');
        out
    }
}

fn cell(ledger: &WorklogLedger, key: &str, date: chrono::NaiveDate) -> String {
    match ledger.entry(key, date) {
        Some(entry) if entry.failed => format!("{:.1}!", entry.hours),
        Some(entry) if entry.pending > 0 => format!("{:.1}*", entry.hours),
        Some(entry) => format!("{:.1}", entry.hours),
        None => "-".to_string(),
    }
}

/// One line per issue, rows numbered from 1, plus a line of day totals.
pub fn render_week(
    week: &CalendarWeek,
    issues: &[Issue],
    ledger: &WorklogLedger,
    hours_per_point: f64,
) -> String {
    let mut lines = Vec::with_capacity(issues.len() + 3);

    lines.push(format!("Week {} (offset {:+})", week, week.offset()));

    let mut header = format!(
        "{:>3}  {:<14} {:<width$} {:>5}",
        "#",
        "Issue",
        "Summary",
        "Est",
        width = SUMMARY_WIDTH
    );
    for label in week.labels() {
        header.push_str(&format!(" {:>6}", label));
    }
    header.push_str(&format!(" {:>6} {:>6}", "Week", "Total"));
    lines.push(header);

    if issues.is_empty() {
        lines.push("     (no active issues assigned)".to_string());
    }

    for (row, issue) in issues.iter().enumerate() {
        let estimate = issue
            .estimated_hours(hours_per_point)
            .map(|h| format!("{}h", h))
            .unwrap_or_else(|| "-".to_string());
        let mut line = format!(
            "{:>3}  {:<14} {:<width$} {:>5}",
            row + 1,
            issue.key,
            truncate(&issue.summary, SUMMARY_WIDTH),
            estimate,
            width = SUMMARY_WIDTH
        );
        for date in week.days() {
            line.push_str(&format!(" {:>6}", cell(ledger, &issue.key, *date)));
        }
        line.push_str(&format!(
            " {:>6.1} {:>6.1}",
            ledger.total_for_week(&issue.key, week),
            ledger.total_for(&issue.key)
        ));
        lines.push(line);
    }

    let mut totals = format!(
        "{:>3}  {:<14} {:<width$} {:>5}",
        "",
        "Day total",
        "",
        "",
        width = SUMMARY_WIDTH
    );
    let mut week_total = 0.0;
    for date in week.days() {
        let total = ledger.total_for_date(*date);
        week_total += total;
        totals.push_str(&format!(" {:>6.1}", total));
    }
    totals.push_str(&format!(" {:>6.1}", week_total));
    lines.push(totals);

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use chrono::NaiveDate;
    use timebook_sync::{BookingFailure, BookingRequest, WorkerEvent};
    use timebook_tracker::{ErrorKind, IssueRef, IssueStatus};

    fn issue(key: &str, summary: &str, points: Option<f64>) -> Issue {
        Issue {
            id: "1".into(),
            key: key.into(),
            summary: summary.into(),
            status: IssueStatus::Open,
            story_points: points,
        }
    }

    #[test]
    fn test_render_shows_hours_estimate_and_totals() {
        let wed = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let week = CalendarWeek::containing(wed);
        let mut ledger = WorklogLedger::new();
        ledger.set("ABC-1", wed, 4.0, None).unwrap();
        ledger.set("ABC-1", wed.succ_opt().unwrap(), 0.0, None).unwrap();

        let text = render_week(&week, &[issue("ABC-1", "Thing", Some(2.0))], &ledger, 8.0);
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].contains("2024-01-01 .. 2024-01-07"));
        assert!(lines[1].contains("Wed 3"));
        assert!(lines[2].contains("ABC-1"));
        assert!(lines[2].contains("16h"));
        assert!(lines[2].contains("4.0"));
        assert!(lines[2].contains("0.0"));
        assert!(lines[3].starts_with("     "));
        assert!(lines[3].contains("Day total"));
    }

    #[test]
    fn test_unsaved_cells_are_marked() {
        let wed = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let thu = wed.succ_opt().unwrap();
        let mut ledger = WorklogLedger::new();
        ledger.begin_booking("ABC-1", wed, 4.0).unwrap();
        ledger.begin_booking("ABC-1", thu, 2.0).unwrap();
        ledger.apply(&WorkerEvent::Failed {
            request: BookingRequest {
                issue: IssueRef {
                    id: "1".into(),
                    key: "ABC-1".into(),
                },
                date: thu,
                hours: 2.0,
                existing_handle: None,
            },
            error: BookingFailure {
                kind: ErrorKind::Transport,
                message: "offline".into(),
            },
        });

        assert_eq!(cell(&ledger, "ABC-1", wed), "4.0*");
        assert_eq!(cell(&ledger, "ABC-1", thu), "2.0!");
        assert_eq!(cell(&ledger, "ABC-1", wed.pred_opt().unwrap()), "-");
    }

    #[test]
    fn test_render_empty() {
        let week = CalendarWeek::containing(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        let text = render_week(&week, &[], &WorklogLedger::new(), 8.0);
        assert!(text.contains("no active issues"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a long summary", 6), "a lon~");
    }
}
