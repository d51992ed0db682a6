//! Terminal and JSON rendering of command results.

use anyhow::Result;
use chrono::{DateTime, Utc};
use comfy_table::{Cell, Table};
use serde::Serialize;

use proctor_core::model::{GeneratedQuestions, SessionSnapshot};

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Human-readable "1h 05m 09s".
pub fn format_seconds(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, secs % 3600 / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else if m > 0 {
        format!("{m}m {s:02}s")
    } else {
        format!("{s}s")
    }
}

/// Key/value view of one session.
pub fn print_snapshot(snapshot: &SessionSnapshot) {
    let session = &snapshot.session;
    let integrity = &session.integrity;

    let mut table = Table::new();
    table.set_header(vec!["Field", "Value"]);
    let rows = [
        ("Session", session.id.to_string()),
        ("Candidate", session.candidate_id.to_string()),
        ("Status", session.status.to_string()),
        ("Duration", format!("{}h", session.duration_hours)),
        ("Started", timestamp(session.start_time)),
        ("Ended", timestamp(session.end_time())),
        ("Remaining", format_seconds(snapshot.remaining_seconds)),
        (
            "Breaks",
            format!(
                "{} taken, {} used of {}",
                session.break_count,
                format_seconds(session.used_break_seconds),
                format_seconds(session.allowed_break_seconds)
            ),
        ),
        (
            "Break remaining",
            format_seconds(snapshot.remaining_break_seconds),
        ),
        ("Violation score", format!("{:.1}", integrity.violation_score)),
        ("Warnings", integrity.warning_count.to_string()),
    ];
    for (field, value) in rows {
        table.add_row(vec![Cell::new(field), Cell::new(value)]);
    }
    if let Some(dq) = &integrity.disqualification {
        table.add_row(vec![
            Cell::new("Disqualified"),
            Cell::new(format!("{} ({})", dq.reason, timestamp(Some(dq.at)))),
        ]);
    }
    for (kind, count) in &integrity.counters {
        table.add_row(vec![Cell::new(format!("  {kind}")), Cell::new(count)]);
    }

    println!("{table}");
}

/// Questions by section, in presentation order.
pub fn print_questions(questions: &GeneratedQuestions) {
    for (section, specs) in &questions.sections {
        println!("\n== {section} ==");
        for (n, spec) in specs.iter().enumerate() {
            println!("{}. {}", n + 1, spec.question_text);
            if let Some(code) = &spec.question_code {
                for line in code.lines() {
                    println!("    {line}");
                }
            }
            if !spec.hints.is_empty() {
                println!("   Hints: {}", spec.hints.join("; "));
            }
        }
    }
}

/// One row per session.
pub fn print_session_table(snapshots: &[SessionSnapshot]) {
    let mut table = Table::new();
    table.set_header(vec![
        "ID",
        "Candidate",
        "Status",
        "Remaining",
        "Break left",
        "Score",
        "Warnings",
        "Created",
    ]);

    for snapshot in snapshots {
        let session = &snapshot.session;
        let status = if snapshot.is_disqualified {
            format!("{} (disqualified)", session.status)
        } else {
            session.status.to_string()
        };
        table.add_row(vec![
            Cell::new(session.id),
            Cell::new(session.candidate_id),
            Cell::new(status),
            Cell::new(format_seconds(snapshot.remaining_seconds)),
            Cell::new(format_seconds(snapshot.remaining_break_seconds)),
            Cell::new(format!("{:.1}", session.integrity.violation_score)),
            Cell::new(session.integrity.warning_count),
            Cell::new(timestamp(Some(session.created_at))),
        ]);
    }

    println!("{table}");
}
