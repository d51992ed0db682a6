//! The `proctor list` command.

use anyhow::Result;

use crate::context::GlobalOpts;
use crate::output::{print_json, print_session_table};

pub async fn execute(opts: &GlobalOpts, status: Option<&str>) -> Result<()> {
    let sessions = opts.service()?.list_sessions(status).await?;

    if opts.json {
        return print_json(&sessions);
    }
    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }
    print_session_table(&sessions);
    println!("{} session(s)", sessions.len());
    Ok(())
}
