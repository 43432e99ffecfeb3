use anyhow::Result;

use crate::commands::{CommandReport, artifact_store, record_run};
use crate::digest::config::load_config;
use crate::digest::lock::RunLock;
use crate::digest::pacing::FixedPacer;
use crate::digest::paths::resolve_paths;
use crate::digest::pipeline::{Pipeline, RunClock};
use crate::llm::provider::{build_model, resolve_model_config};
use crate::notion::client::NotionClient;

pub fn run() -> Result<CommandReport> {
    let cfg = load_config()?;
    let paths = resolve_paths()?;
    let lock = RunLock::acquire(&paths.lock_file)?;
    tracing::debug!(lock = %lock.path().display(), "run lock acquired");

    let store = NotionClient::new(&cfg.notion_api_base, cfg.notion_token()?)?;
    let parent_id = cfg.database_id()?;
    let model_cfg = resolve_model_config()?;
    let model = build_model(&model_cfg);
    let artifacts = artifact_store(&paths);
    let pacer = FixedPacer::from_config(&cfg.pacing);
    let clock = RunClock::now(cfg.timezone);

    let mut report = CommandReport::new("summarize");
    report.detail(format!("run_date={}", clock.run_date));
    report.detail(format!("model={}:{}", model_cfg.provider.label(), model_cfg.model));
    let outcome = Pipeline::new(&cfg, &artifacts, &pacer, clock).summarize_artifacts(
        model.as_ref(),
        &store,
        parent_id,
    )?;
    record_run(&mut report, &outcome);
    Ok(report)
}
