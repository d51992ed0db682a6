//! proctor CLI: drive assessment sessions from the command line.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;
mod context;
mod output;

#[derive(Parser)]
#[command(name = "proctor", version, about = "Timed assessment sessions with integrity scoring")]
struct Cli {
    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Session store file (overrides store_path from the config)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a sample proctor.toml
    Init,

    /// Generate questions and create a pending session for a candidate
    Create {
        /// Candidate identifier
        #[arg(long)]
        candidate: u64,

        /// Assessment length in hours
        #[arg(long)]
        hours: u32,

        /// Candidate categories (comma-separated, e.g. "backend,signal_processing")
        #[arg(long, value_delimiter = ',')]
        category: Vec<String>,

        /// Difficulty level
        #[arg(long, default_value = "mid")]
        difficulty: String,

        /// Candidate skills (comma-separated)
        #[arg(long, value_delimiter = ',')]
        skill: Vec<String>,

        /// File with resume or background text
        #[arg(long)]
        context: Option<PathBuf>,
    },

    /// Show a session by access token
    Show {
        /// Candidate access token
        token: String,
    },

    /// Start the session clock
    Start { token: String },

    /// Finish the session
    Complete { token: String },

    /// Pause the session clock
    BreakStart { token: String },

    /// Resume after a break
    BreakEnd { token: String },

    /// Report an anti-cheat signal
    Violation {
        token: String,

        /// Violation type (e.g. "tab_switch", "dev_tools_open")
        kind: String,

        /// Timestamp claimed by the client, stored for audit
        #[arg(long)]
        client_timestamp: Option<String>,

        /// Characters involved in a copy/paste
        #[arg(long)]
        chars: Option<u32>,

        /// Lines involved in a copy/paste
        #[arg(long)]
        lines: Option<u32>,
    },

    /// List sessions, newest first
    List {
        /// Only sessions with this status
        #[arg(long)]
        status: Option<String>,
    },

    /// Administrative operations by session id
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Show a session by id
    Show { id: u64 },

    /// Clear a disqualification and resume the session
    Reinstate { id: u64 },

    /// Zero one violation counter
    ResetCounter {
        id: u64,

        /// Violation type to reset
        kind: String,
    },

    /// Complete a session on the candidate's behalf
    MarkCompleted { id: u64 },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("proctor=info")),
        )
        .init();

    let cli = Cli::parse();
    let opts = context::GlobalOpts {
        config: cli.config,
        store: cli.store,
        json: cli.json,
    };

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Create {
            candidate,
            hours,
            category,
            difficulty,
            skill,
            context,
        } => {
            commands::create::execute(
                &opts,
                commands::create::CreateArgs {
                    candidate,
                    hours,
                    categories: category,
                    difficulty,
                    skills: skill,
                    context,
                },
            )
            .await
        }
        Commands::Show { token } => commands::session::show(&opts, &token).await,
        Commands::Start { token } => commands::session::start(&opts, &token).await,
        Commands::Complete { token } => commands::session::complete(&opts, &token).await,
        Commands::BreakStart { token } => commands::session::break_start(&opts, &token).await,
        Commands::BreakEnd { token } => commands::session::break_end(&opts, &token).await,
        Commands::Violation {
            token,
            kind,
            client_timestamp,
            chars,
            lines,
        } => {
            commands::violation::execute(&opts, &token, &kind, client_timestamp, chars, lines)
                .await
        }
        Commands::List { status } => commands::list::execute(&opts, status.as_deref()).await,
        Commands::Admin { command } => match command {
            AdminCommands::Show { id } => commands::admin::show(&opts, id).await,
            AdminCommands::Reinstate { id } => commands::admin::reinstate(&opts, id).await,
            AdminCommands::ResetCounter { id, kind } => {
                commands::admin::reset_counter(&opts, id, &kind).await
            }
            AdminCommands::MarkCompleted { id } => {
                commands::admin::mark_completed(&opts, id).await
            }
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
