//! Fetch command - GET a URL through the fetch helper

use std::io::Write;
use std::time::Duration;

use anyhow::Result;

use super::{get_logger, log_event, runtime};
use userbase_core::services::LogEvent;
use userbase_core::Fetcher;

pub fn run(url: &str, timeout_secs: u64) -> Result<()> {
    let logger = get_logger();
    let fetcher = Fetcher::new(Duration::from_secs(timeout_secs))?;

    match runtime()?.block_on(fetcher.fetch(url)) {
        Ok(body) => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&body)?;
            if !body.ends_with(b"\n") {
                writeln!(stdout)?;
            }
            Ok(())
        }
        Err(e) => {
            log_event(
                logger.as_ref(),
                LogEvent::new("fetch_failed")
                    .with_command("fetch")
                    .with_error(e.to_string())
                    .with_error_details(url),
            );
            Err(e.into())
        }
    }
}
