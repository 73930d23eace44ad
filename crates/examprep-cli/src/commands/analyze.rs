//! The `examprep analyze` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use comfy_table::{Cell, Table};

use examprep_core::analytics::{compute_analytics, Analytics, PerformanceKind};
use examprep_providers::config::load_config_from;

use super::{format_duration, require_backends};

pub async fn execute(
    store: Option<PathBuf>,
    today: Option<String>,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let today = match today {
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .with_context(|| format!("invalid --today date: {s}"))?,
        None => Utc::now().date_naive(),
    };
    anyhow::ensure!(
        format == "text" || format == "json",
        "unknown format: {format} (expected text or json)"
    );

    let config = load_config_from(config_path.as_deref())?;
    let backends = require_backends(store.as_deref(), &config)?;

    let attempts = backends.store.all_attempts().await?;
    let answered_dates = match backends.mastery.answered_dates().await {
        Ok(dates) => dates,
        Err(e) => {
            tracing::warn!("answered dates unavailable, streak uses attempts only: {e:#}");
            Vec::new()
        }
    };

    let analytics = compute_analytics(&attempts, &answered_dates, today, &config.exam);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&analytics)?);
    } else {
        print_text(&analytics);
    }
    Ok(())
}

fn print_text(analytics: &Analytics) {
    let o = &analytics.overview;
    if o.total_attempts == 0 {
        println!("No attempts yet.");
    }

    println!(
        "Attempts: {} ({} passed, {} failed)",
        o.total_attempts, o.passed, o.failed
    );
    println!(
        "Average: {:.1}%  Best: {}%  Accuracy: {}%  Time: {}",
        o.average_score,
        o.best_score,
        o.accuracy,
        format_duration(o.total_time_secs)
    );
    println!(
        "Streak: {} day(s)  Readiness: {}  Pass probability: {}%",
        analytics.streak, analytics.readiness.score, analytics.readiness.pass_probability
    );
    println!(
        "Pace: {:.0}s/question  Speed: {}  Consistency: {}",
        analytics.time.avg_secs_per_question, analytics.time.speed_score, analytics.time.consistency
    );

    let mut sections = Table::new();
    sections.set_header(vec!["Section", "Average", "Attempts", ""]);
    for s in &analytics.sections {
        let label = match s.kind {
            PerformanceKind::Strength => "strength",
            PerformanceKind::Weakness => "weakness",
            PerformanceKind::Neutral => "",
        };
        sections.add_row(vec![
            Cell::new(s.section),
            Cell::new(format!("{}%", s.average)),
            Cell::new(s.attempts),
            Cell::new(label),
        ]);
    }
    println!("\n{sections}");

    if !analytics.trend.is_empty() {
        let mut trend = Table::new();
        trend.set_header(vec!["Completed", "Test", "Score"]);
        for point in &analytics.trend {
            trend.add_row(vec![
                Cell::new(point.completed_at.format("%Y-%m-%d %H:%M")),
                Cell::new(&point.test_name),
                Cell::new(format!("{}%", point.score)),
            ]);
        }
        println!("\n{trend}");
    }

    let recs = &analytics.recommendations;
    if !recs.focus.is_empty() {
        let focus: Vec<_> = recs.focus.iter().map(|s| s.label()).collect();
        println!("\nFocus on: {}", focus.join(", "));
    }
    if !recs.strengths.is_empty() {
        let strengths: Vec<_> = recs.strengths.iter().map(|s| s.label()).collect();
        println!("Strengths: {}", strengths.join(", "));
    }
    for line in &recs.guidance {
        println!("- {line}");
    }
}
