use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use regen_core::reconstruct::config::BatchConfig;
use regen_core::reconstruct::run_batch;

use crate::interrupt::ctrl_c_token;
use crate::progress::IndicatifReporter;
use crate::summary::print_batch_report;

#[derive(Args)]
pub struct BatchArgs {
    /// Batch config file (TOML)
    pub config: PathBuf,

    /// Only run the named jobs (repeatable)
    #[arg(long = "job")]
    pub jobs: Vec<String>,
}

pub fn run(args: &BatchArgs) -> Result<()> {
    let contents = std::fs::read_to_string(&args.config)
        .with_context(|| format!("Failed to read config {}", args.config.display()))?;
    let mut config: BatchConfig = toml::from_str(&contents).context("Invalid batch config")?;

    if !args.jobs.is_empty() {
        if let Some(unknown) = args
            .jobs
            .iter()
            .find(|name| !config.jobs.iter().any(|j| &j.name == *name))
        {
            bail!("No job named {unknown:?} in {}", args.config.display());
        }
        config.jobs.retain(|j| args.jobs.contains(&j.name));
    }

    println!(
        "Running {} job(s) at {}x{}",
        config.jobs.len(),
        config.geometry.width,
        config.geometry.height
    );

    let reporter = Arc::new(IndicatifReporter::new());
    let cancel = ctrl_c_token().context("Failed to install Ctrl-C handler")?;
    let report = run_batch(&config, reporter, &cancel);
    print_batch_report(&report);

    if !report.is_success() {
        bail!(
            "{} job(s) failed, {} cancelled",
            report.failed(),
            report.cancelled()
        );
    }
    Ok(())
}
