//! The `proctor init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("proctor.toml").exists() {
        println!("proctor.toml already exists, skipping.");
    } else {
        std::fs::write("proctor.toml", SAMPLE_CONFIG)?;
        println!("Created proctor.toml");
    }

    println!("\nNext steps:");
    println!("  1. Edit proctor.toml with your API key (or switch the generator to \"mock\")");
    println!("  2. Run: proctor create --candidate 1 --hours 4 --category backend");
    println!("  3. Run: proctor start <access token>");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# proctor configuration

model = "claude-sonnet-4-20250514"
store_path = "./proctor-sessions.json"
generation_timeout_secs = 300
max_retries = 3
retry_delay_ms = 1000

[generator]
type = "anthropic"
api_key = "${ANTHROPIC_API_KEY}"

# Offline questions for local runs:
# [generator]
# type = "mock"
# questions_per_category = 2

[integrity]
disqualification_threshold = 5.0
warning_threshold = 3.0
"#;
