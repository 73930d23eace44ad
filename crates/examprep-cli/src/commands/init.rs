//! The `examprep init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    write_if_missing(Path::new("examprep.toml"), SAMPLE_CONFIG)?;

    std::fs::create_dir_all("banks")?;
    write_if_missing(Path::new("banks/sample.toml"), SAMPLE_BANK)?;

    println!("\nNext steps:");
    println!("  1. Edit examprep.toml with your API URL and token (optional)");
    println!("  2. Run: examprep validate --bank banks/sample.toml");
    println!("  3. Run: examprep practice --bank banks/sample.toml --store attempts.json");

    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# examprep configuration

categories = [
    "Verbal Ability",
    "Numerical Ability",
    "Analytical Ability",
    "General Information",
    "Clerical Ability",
    "Philippine Constitution",
]

# [api]
# base_url = "https://your-examprep-server.example.com"
# token = "${EXAMPREP_TOKEN}"
# timeout_secs = 30

[exam]
pass_threshold = 70
strength_threshold = 75
weakness_threshold = 60
time_warning_fraction = 0.33
lock_fade_ms = 1200
next_question_delay_ms = 1500
max_generation_requests = 200
"#;

const SAMPLE_BANK: &str = r#"[bank]
id = "sample"
name = "Sample Practice Set"
description = "A short mixed set to get started"
time_limit_minutes = 10

[[questions]]
id = "sample-verbal-1"
text = "Choose the word closest in meaning to METICULOUS."
options = ["Careless", "Thorough", "Hasty", "Generous"]
answer = "B"
category = "Verbal Ability"
difficulty = "easy"
explanation = "Meticulous means showing great attention to detail."

[[questions]]
id = "sample-numerical-1"
text = "What is 15% of 240?"
options = ["24", "30", "36", "40"]
answer = 2
category = "Numerical Ability"
difficulty = "easy"
explanation = "0.15 x 240 = 36."

[[questions]]
id = "sample-analytical-1"
text = "What comes next: 3, 6, 12, 24, ...?"
options = ["36", "48", "30", "42"]
answer = "B"
category = "Analytical Ability"
explanation = "Each term doubles the previous one."

[[questions]]
id = "sample-constitution-1"
text = "Which branch of government interprets the laws?"
options = ["Executive", "Legislative", "Judiciary", "Commission on Audit"]
answer = "C"
category = "Philippine Constitution"
explanation = "Judicial power is vested in the Supreme Court and lower courts."
"#;
