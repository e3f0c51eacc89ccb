//! Work command - run values through the worker pool

use std::time::{Duration, Instant};

use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use super::{get_data_dir, runtime};
use userbase_core::config::Config;

pub fn run(
    values: Vec<i64>,
    workers: Option<usize>,
    delay_ms: Option<u64>,
    json: bool,
) -> Result<()> {
    let mut config = Config::load(&get_data_dir()?)?;
    if let Some(workers) = workers {
        config.worker_count = workers;
    }
    if let Some(delay_ms) = delay_ms {
        config.work_delay = Duration::from_millis(delay_ms);
    }
    let pool = config.worker_pool();

    let progress = if json {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(values.len() as u64);
        bar.set_style(ProgressStyle::with_template(
            "{spinner} [{elapsed_precise}] {bar:30} {pos}/{len} {msg}",
        )?);
        bar.set_message(format!("{} worker(s)", pool.size()));
        bar
    };

    let inputs = values.clone();
    let started = Instant::now();
    let results = runtime()?.block_on(pool.run_with_progress(inputs, |_| progress.inc(1)));
    let elapsed = started.elapsed();
    progress.finish_and_clear();

    if json {
        println!(
            "{}",
            serde_json::json!({
                "inputs": values,
                "results": results,
                "workers": pool.size(),
                "elapsed_ms": elapsed.as_millis() as u64,
            })
        );
        return Ok(());
    }

    let rendered: Vec<String> = results.iter().map(|v| v.to_string()).collect();
    println!("{}", rendered.join(" "));
    println!(
        "{}",
        format!(
            "{} job(s) on {} worker(s) in {:.2}s",
            results.len(),
            pool.size(),
            elapsed.as_secs_f64()
        )
        .dimmed()
    );

    Ok(())
}
