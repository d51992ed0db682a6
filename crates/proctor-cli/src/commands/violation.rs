//! The `proctor violation` command.

use anyhow::Result;

use proctor_core::integrity::ViolationOutcome;
use proctor_core::model::ViolationMetadata;

use crate::context::GlobalOpts;
use crate::output::print_json;

pub async fn execute(
    opts: &GlobalOpts,
    token: &str,
    kind: &str,
    client_timestamp: Option<String>,
    chars: Option<u32>,
    lines: Option<u32>,
) -> Result<()> {
    let metadata = (chars.is_some() || lines.is_some()).then_some(ViolationMetadata {
        char_count: chars,
        line_count: lines,
    });

    let outcome = opts
        .service()?
        .record_violation(token, kind, client_timestamp, metadata)
        .await?;

    if opts.json {
        return print_json(&outcome);
    }
    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &ViolationOutcome) {
    println!(
        "Recorded {} (count {}), score {:.1}, warnings {}",
        outcome.kind,
        outcome.counters.get(&outcome.kind).copied().unwrap_or(0),
        outcome.violation_score,
        outcome.warning_count
    );
    if outcome.newly_disqualified {
        println!("Session disqualified");
    } else if outcome.is_disqualified {
        println!("Session remains disqualified");
    } else if outcome.warning_issued {
        println!("Warning issued");
    }
}
