use anyhow::Result;

use crate::commands::{CommandReport, artifact_store, record_run, slack_client};
use crate::digest::config::load_config;
use crate::digest::lock::RunLock;
use crate::digest::pacing::FixedPacer;
use crate::digest::paths::resolve_paths;
use crate::digest::pipeline::{Pipeline, RunClock};

/// First half of a split run: fetch and persist, no model or report page.
pub fn run() -> Result<CommandReport> {
    let cfg = load_config()?;
    let paths = resolve_paths()?;
    let lock = RunLock::acquire(&paths.lock_file)?;
    tracing::debug!(lock = %lock.path().display(), "run lock acquired");

    let chat = slack_client(&cfg)?;
    let artifacts = artifact_store(&paths);
    let pacer = FixedPacer::from_config(&cfg.pacing);
    let clock = RunClock::now(cfg.timezone);

    let mut report = CommandReport::new("collect");
    report.detail(format!("run_date={}", clock.run_date));
    report.detail(format!("work_dir={}", paths.work_dir.display()));
    let outcome = Pipeline::new(&cfg, &artifacts, &pacer, clock).collect(&chat);
    record_run(&mut report, &outcome);
    Ok(report)
}
