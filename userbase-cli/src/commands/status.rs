//! Status command - storage backend, data directory and user count

use anyhow::Result;
use colored::Colorize;

use super::get_context;
use crate::output;
use userbase_core::EntryPoint;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context(EntryPoint::Cli)?;
    let users = ctx.user_service.count()?;
    let events = match &ctx.logging_service {
        Some(logger) => Some(logger.count()?),
        None => None,
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "data_dir": ctx.data_dir.to_string_lossy(),
                "storage": ctx.config.storage.as_str(),
                "users": users,
                "log_entries": events,
                "listen": ctx.config.server.addr(),
            }))?
        );
        return Ok(());
    }

    println!("{}", "Userbase Status".bold());
    println!();

    let mut table = output::create_table();
    table.add_row(vec!["Data directory", &ctx.data_dir.display().to_string()]);
    table.add_row(vec!["Storage", ctx.config.storage.as_str()]);
    table.add_row(vec!["Users", &users.to_string()]);
    table.add_row(vec![
        "Log entries",
        &events.map_or_else(|| "unavailable".to_string(), |n| n.to_string()),
    ]);
    table.add_row(vec!["Listen address", &ctx.config.server.addr()]);
    println!("{}", table);

    let db_path = ctx.data_dir.join("users.duckdb");
    if let Ok(meta) = std::fs::metadata(&db_path) {
        println!("{}", format!("Database size: {}", output::format_size(meta.len())).dimmed());
    }

    Ok(())
}
