//! The `examprep history`, `delete`, and `restore` commands.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use comfy_table::{Cell, Table};

use examprep_core::history::{deleted_attempts, ListQuery, SortField, SortOrder};
use examprep_core::model::{AttemptResult, TestAttempt};
use examprep_providers::config::load_config_from;

use super::{format_duration, require_backends};

pub struct ListArgs {
    pub store: Option<PathBuf>,
    pub page: u32,
    pub limit: u32,
    pub sort: String,
    pub order: String,
    pub result: Option<String>,
    pub deleted: bool,
    pub config: Option<PathBuf>,
}

pub async fn list(args: ListArgs) -> Result<()> {
    anyhow::ensure!(args.page >= 1, "--page must be at least 1");
    anyhow::ensure!(args.limit >= 1, "--limit must be at least 1");

    let query = ListQuery {
        page: args.page,
        limit: args.limit,
        sort_field: args.sort.parse::<SortField>().map_err(|e| anyhow!(e))?,
        sort_order: args.order.parse::<SortOrder>().map_err(|e| anyhow!(e))?,
        result: args
            .result
            .as_deref()
            .map(str::parse::<AttemptResult>)
            .transpose()
            .map_err(|e| anyhow!(e))?,
    };

    let config = load_config_from(args.config.as_deref())?;
    let backends = require_backends(args.store.as_deref(), &config)?;

    if args.deleted {
        let all = backends.store.all_attempts().await?;
        let trash = deleted_attempts(&all);
        if trash.is_empty() {
            println!("Trash is empty.");
        } else {
            print_table(trash.into_iter(), true);
        }
        return Ok(());
    }

    let page = backends.store.list_attempts(&query).await?;
    if page.attempts.is_empty() {
        println!("No attempts found.");
    } else {
        print_table(page.attempts.iter(), false);
    }
    println!(
        "Page {} of {} ({} attempt(s))",
        page.pagination.page,
        page.pagination.total_pages.max(1),
        page.pagination.total
    );
    Ok(())
}

fn print_table<'a>(attempts: impl Iterator<Item = &'a TestAttempt>, deleted: bool) {
    let mut table = Table::new();
    let mut header = vec!["ID", "Test", "Score", "Result", "Time", "Completed"];
    if deleted {
        header.push("Deleted");
    }
    table.set_header(header);

    for a in attempts {
        let mut row = vec![
            Cell::new(&a.id),
            Cell::new(&a.record.test_name),
            Cell::new(format!("{}%", a.record.score)),
            Cell::new(a.record.result),
            Cell::new(format_duration(a.record.time_spent_secs as u64)),
            Cell::new(a.record.completed_at.format("%Y-%m-%d %H:%M")),
        ];
        if deleted {
            let at = a
                .deleted_at
                .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            row.push(Cell::new(at));
        }
        table.add_row(row);
    }
    println!("{table}");
}

pub async fn delete(
    id: String,
    store: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let backends = require_backends(store.as_deref(), &config)?;
    backends.store.delete_attempt(&id).await?;
    println!("Moved attempt {id} to the trash. Restore it with `examprep restore {id}`.");
    Ok(())
}

pub async fn restore(
    id: String,
    store: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let backends = require_backends(store.as_deref(), &config)?;
    backends.store.restore_attempt(&id).await?;
    println!("Restored attempt {id}.");
    Ok(())
}
