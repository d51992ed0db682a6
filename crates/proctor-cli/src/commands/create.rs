//! The `proctor create` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use proctor_core::model::SessionSnapshot;
use proctor_core::service::CreateSessionRequest;

use crate::context::GlobalOpts;
use crate::output::{format_seconds, print_json};

pub struct CreateArgs {
    pub candidate: u64,
    pub hours: u32,
    pub categories: Vec<String>,
    pub difficulty: String,
    pub skills: Vec<String>,
    pub context: Option<PathBuf>,
}

pub async fn execute(opts: &GlobalOpts, args: CreateArgs) -> Result<()> {
    let context = match &args.context {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read context file: {}", path.display()))?,
        ),
        None => None,
    };

    let (service, _claim) = opts.generating_service(args.candidate)?;
    let request = CreateSessionRequest {
        candidate_id: args.candidate,
        duration_hours: args.hours,
        categories: args.categories,
        difficulty: args.difficulty,
        skills: args.skills,
        context,
    };

    let created = service.create_session(request).await;
    service.shutdown();
    let created = created?;

    if opts.json {
        print_json(&created)
    } else {
        print_created(&created);
        Ok(())
    }
}

fn print_created(created: &SessionSnapshot) {
    let session = &created.session;
    println!(
        "Created session {} for candidate {} ({}h, {} break allowance)",
        session.id,
        session.candidate_id,
        session.duration_hours,
        format_seconds(session.allowed_break_seconds)
    );
    println!("Access token: {}", session.access_token);

    let mut table = Table::new();
    table.set_header(vec!["Section", "Questions"]);
    for (section, questions) in &session.questions.sections {
        table.add_row(vec![Cell::new(section), Cell::new(questions.len())]);
    }
    println!("\n{table}");
    println!("Total: {} questions", session.questions.total());
}
