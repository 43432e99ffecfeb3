use anyhow::Result;
use std::fs;

use crate::commands::CommandReport;
use crate::digest::config::{load_diagnostic_config, resolve_config_path};
use crate::digest::lock::RunLock;
use crate::digest::paths::resolve_paths;
use crate::llm::provider::resolve_model_config;

include!(concat!(env!("OUT_DIR"), "/digest_env_allowlist.rs"));

/// `DIGEST_*` names that nothing in the binary reads, usually typos.
fn unknown_digest_vars(vars: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut unknown: Vec<String> = vars
        .into_iter()
        .filter(|key| key.starts_with("DIGEST_"))
        .filter(|key| !GENERATED_DIGEST_ENV_ALLOWLIST.contains(&key.as_str()))
        .collect();
    unknown.sort();
    unknown
}

fn pending_artifacts(dir: &std::path::Path) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.starts_with("history_") && name.ends_with(".json")
        })
        .count()
}

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("status");

    report.detail(format!("build_uuid={}", env!("BUILD_UUID")));
    report.detail(format!("digest_home={}", paths.digest_home.display()));
    report.detail(format!("work_dir={}", paths.work_dir.display()));
    report.detail(format!("dump_dir={}", paths.dump_dir.display()));
    report.detail(format!(
        "pending_artifacts={}",
        pending_artifacts(&paths.work_dir)
    ));
    match resolve_config_path() {
        Some(path) if path.exists() => report.detail(format!("config_file={}", path.display())),
        Some(path) => report.detail(format!("config_file={} (absent, defaults)", path.display())),
        None => report.detail("config_file=none"),
    }

    match RunLock::holder(&paths.lock_file) {
        Ok(Some(pid)) => report.detail(format!("run_lock=held pid={pid}")),
        Ok(None) => report.detail("run_lock=free"),
        Err(err) => report.issue(format!("run_lock=unreadable ({err:#})")),
    }

    match load_diagnostic_config() {
        Ok(cfg) => {
            report.detail(format!("channels={}", cfg.channels.len()));
            if cfg.channels.is_empty() {
                report.issue("no channels configured: set CHANNEL_NAMES");
            }
            for channel in &cfg.channels {
                report.detail(format!("channel {} -> {}", channel.id, channel.name));
            }
            report.detail(format!("lookback_days={}", cfg.collect.lookback_days));
            report.detail(format!(
                "timezone={}",
                cfg.timezone.map(|tz| tz.name().to_string()).unwrap_or_else(|| "local".to_string())
            ));
            for (var, missing) in [
                ("SLACK_TOKEN", cfg.credentials.slack_token.is_none()),
                ("NOTION_TOKEN", cfg.credentials.notion_token.is_none()),
                ("DATABASE_ID", cfg.credentials.database_id.is_none()),
            ] {
                if missing {
                    report.issue(format!("{var} is not set"));
                }
            }
        }
        Err(err) => report.issue(format!("config invalid: {err:#}")),
    }

    match resolve_model_config() {
        Ok(model) => report.detail(format!(
            "model={}:{} base_url={}",
            model.provider.label(),
            model.model,
            model.base_url
        )),
        Err(err) => report.issue(format!("model config invalid: {err:#}")),
    }

    for key in unknown_digest_vars(std::env::vars().map(|(key, _)| key)) {
        report.issue(format!("unknown environment variable {key}"));
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::{pending_artifacts, unknown_digest_vars};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn flags_only_unrecognized_digest_vars() {
        // Built at runtime so the typo never lands in the generated allowlist.
        let typo = format!("{}_LOOKBAK_DAYS", "DIGEST");
        let vars = vec![
            "DIGEST_HOME".to_string(),
            "DIGEST_LOOKBACK_DAYS".to_string(),
            typo.clone(),
            "SLACK_TOKEN".to_string(),
            "PATH".to_string(),
        ];
        assert_eq!(unknown_digest_vars(vars), vec![typo]);
    }

    #[test]
    fn counts_history_artifacts_only() {
        let tmp = tempdir().expect("tempdir");
        fs::write(tmp.path().join("history_general_0310.json"), "[]").expect("write");
        fs::write(tmp.path().join("notes.txt"), "x").expect("write");
        assert_eq!(pending_artifacts(tmp.path()), 1);
        assert_eq!(pending_artifacts(&tmp.path().join("missing")), 0);
    }
}
