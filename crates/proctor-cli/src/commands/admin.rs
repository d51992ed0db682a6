//! The `proctor admin` commands, addressed by session id.

use anyhow::Result;

use crate::context::GlobalOpts;
use crate::output::{print_json, print_snapshot};

pub async fn show(opts: &GlobalOpts, id: u64) -> Result<()> {
    let snapshot = opts.service()?.get_session_by_id(id).await?;
    if opts.json {
        return print_json(&snapshot);
    }
    print_snapshot(&snapshot);
    Ok(())
}

pub async fn reinstate(opts: &GlobalOpts, id: u64) -> Result<()> {
    let snapshot = opts.service()?.reinstate(id).await?;
    if opts.json {
        return print_json(&snapshot);
    }
    println!(
        "Session {} reinstated, now {}",
        snapshot.session.id, snapshot.session.status
    );
    Ok(())
}

pub async fn reset_counter(opts: &GlobalOpts, id: u64, kind: &str) -> Result<()> {
    let reset = opts.service()?.reset_counter(id, kind).await?;
    if opts.json {
        return print_json(&reset);
    }
    println!(
        "Reset {} on session {id}: {} event(s) cleared, score {:.1}, warnings {}",
        reset.kind, reset.cleared_events, reset.violation_score, reset.warning_count
    );
    Ok(())
}

pub async fn mark_completed(opts: &GlobalOpts, id: u64) -> Result<()> {
    let snapshot = opts.service()?.mark_completed(id).await?;
    if opts.json {
        return print_json(&snapshot);
    }
    println!(
        "Session {} is {}",
        snapshot.session.id, snapshot.session.status
    );
    Ok(())
}
