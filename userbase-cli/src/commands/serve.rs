//! Serve command - run the HTTP API until Ctrl-C

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::info;

use super::{get_context, runtime};
use userbase_core::server::start_server;
use userbase_core::services::LogEvent;
use userbase_core::EntryPoint;

pub fn run(host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut ctx = get_context(EntryPoint::Server)?;
    if let Some(host) = host {
        ctx.config.server.host = host;
    }
    if let Some(port) = port {
        ctx.config.server.port = port;
    }

    let rt = runtime()?;
    rt.block_on(async {
        let handle = start_server(&ctx.config.server, ctx.router())
            .await
            .context("Failed to start server")?;

        if let Some(logger) = &ctx.logging_service {
            let _ = logger.log(LogEvent::new("server_started"));
        }
        println!(
            "{} Listening on {} ({} storage)",
            "✓".green(),
            handle.addr().to_string().bold(),
            ctx.config.storage.as_str()
        );
        println!("{}", "Press Ctrl-C to stop".dimmed());

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;

        info!("Interrupt received");
        handle.shutdown().await;
        if let Some(logger) = &ctx.logging_service {
            let _ = logger.log(LogEvent::new("server_stopped"));
        }
        Ok(())
    })
}
