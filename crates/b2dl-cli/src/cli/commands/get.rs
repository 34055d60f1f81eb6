//! Get command: download a batch of names from one bucket.

use anyhow::{Context, Result};
use b2dl_core::b2::B2Client;
use b2dl_core::config;
use b2dl_core::progress::{BarDisplay, HiddenDisplay, ProgressDisplay};
use b2dl_core::scheduler::download_batch;
use std::path::PathBuf;
use std::sync::Arc;

/// Command-line settings that override the config file.
#[derive(Debug)]
pub struct GetOptions {
    pub bucket: Option<String>,
    pub threads: Option<usize>,
    pub quiet: bool,
    pub dest_root: PathBuf,
}

pub async fn run_get(opts: GetOptions, names: &[String]) -> Result<()> {
    let mut cfg = config::load_or_init()?;
    cfg.apply_env();
    tracing::debug!(api_url = %cfg.api_url, threads = cfg.threads, "loaded config");

    let bucket = cfg.bucket(opts.bucket.as_deref())?.to_string();
    let credentials = cfg.credentials()?;
    let threads = cfg.effective_threads(opts.threads);

    let client = {
        let api_url = cfg.api_url.clone();
        let timeout = cfg.connect_timeout();
        tokio::task::spawn_blocking(move || B2Client::authorize(&api_url, &credentials, timeout))
            .await?
            .context("authorize B2 account")?
    };

    println!("Making a pool for {} downloads", threads);
    tracing::info!(bucket = %bucket, count = names.len(), threads, "starting batch");

    let display: Arc<dyn ProgressDisplay> = if opts.quiet {
        Arc::new(HiddenDisplay)
    } else {
        Arc::new(BarDisplay::new())
    };

    let report = download_batch(
        Arc::new(client),
        &bucket,
        names,
        threads,
        opts.dest_root,
        display,
    )
    .await;

    tracing::info!(
        completed = report.completed.len(),
        failed = report.failed.len(),
        not_attempted = report.not_attempted.len(),
        "batch finished"
    );
    report.into_result()?;
    Ok(())
}
