//! Candidate-facing commands, addressed by access token.

use anyhow::Result;

use proctor_core::ledger::{BreakEnded, BreakStarted};

use crate::context::GlobalOpts;
use crate::output::{format_seconds, print_json, print_questions, print_snapshot};

pub async fn show(opts: &GlobalOpts, token: &str) -> Result<()> {
    let snapshot = opts.service()?.get_session(token).await?;
    if opts.json {
        return print_json(&snapshot);
    }
    print_snapshot(&snapshot);
    print_questions(&snapshot.session.questions);
    Ok(())
}

pub async fn start(opts: &GlobalOpts, token: &str) -> Result<()> {
    let snapshot = opts.service()?.start_session(token).await?;
    if opts.json {
        return print_json(&snapshot);
    }
    println!(
        "Session {} is {}, {} remaining",
        snapshot.session.id,
        snapshot.session.status,
        format_seconds(snapshot.remaining_seconds)
    );
    Ok(())
}

pub async fn complete(opts: &GlobalOpts, token: &str) -> Result<()> {
    let snapshot = opts.service()?.complete_session(token).await?;
    if opts.json {
        return print_json(&snapshot);
    }
    println!(
        "Session {} is {}",
        snapshot.session.id, snapshot.session.status
    );
    Ok(())
}

pub async fn break_start(opts: &GlobalOpts, token: &str) -> Result<()> {
    let started = opts.service()?.start_break(token).await?;
    if opts.json {
        return print_json(&started);
    }
    print_break_started(&started);
    Ok(())
}

pub async fn break_end(opts: &GlobalOpts, token: &str) -> Result<()> {
    let ended = opts.service()?.end_break(token).await?;
    if opts.json {
        return print_json(&ended);
    }
    print_break_ended(&ended);
    Ok(())
}

fn print_break_started(started: &BreakStarted) {
    println!(
        "Break started at {}",
        started.started_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!(
        "  {} of break time left, single break limit {}",
        format_seconds(started.remaining_break_seconds),
        format_seconds(started.max_single_break_seconds)
    );
}

fn print_break_ended(ended: &BreakEnded) {
    println!(
        "Break ended after {}, {} credited",
        format_seconds(ended.elapsed_seconds),
        format_seconds(ended.break_duration_seconds)
    );
    println!(
        "  {} used, {} left",
        format_seconds(ended.total_used_break_seconds),
        format_seconds(ended.remaining_break_seconds)
    );
    if ended.exceeded_budget {
        println!("  WARNING: break ran past the remaining budget");
    } else if ended.exceeded_single_break {
        println!("  WARNING: break ran past the single break limit");
    }
}
