use crate::digest::artifact::artifact_stem;
use crate::digest::model::ChannelDescriptor;
use crate::error::DigestError;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectConfig {
    pub lookback_days: u64,
    pub user_page_limit: u32,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            user_page_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    pub run_max_messages: usize,
    pub summarize_max_messages: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            run_max_messages: 100,
            summarize_max_messages: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    pub thread_reply_ms: u64,
    pub channel_ms: u64,
    pub append_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            thread_reply_ms: 100,
            channel_ms: 5_000,
            append_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub title_property: String,
    #[serde(default = "default_archive_after_run")]
    pub archive_after_run: bool,
}

fn default_archive_after_run() -> bool {
    true
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title_property: "이름".to_string(),
            archive_after_run: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub slack_token: Option<String>,
    pub notion_token: Option<String>,
    pub database_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DigestConfig {
    pub channels: Vec<ChannelDescriptor>,
    pub collect: CollectConfig,
    pub summary: SummaryConfig,
    pub pacing: PacingConfig,
    pub report: ReportConfig,
    pub credentials: Credentials,
    pub slack_api_base: String,
    pub notion_api_base: String,
    pub timezone: Option<chrono_tz::Tz>,
}

impl DigestConfig {
    pub fn slack_token(&self) -> Result<&str> {
        required(self.credentials.slack_token.as_deref(), "SLACK_TOKEN")
    }

    pub fn notion_token(&self) -> Result<&str> {
        required(self.credentials.notion_token.as_deref(), "NOTION_TOKEN")
    }

    pub fn database_id(&self) -> Result<&str> {
        required(self.credentials.database_id.as_deref(), "DATABASE_ID")
    }

    #[cfg(test)]
    pub fn for_channels(channels: Vec<ChannelDescriptor>) -> Self {
        Self {
            channels,
            collect: CollectConfig::default(),
            summary: SummaryConfig::default(),
            pacing: PacingConfig::default(),
            report: ReportConfig::default(),
            credentials: Credentials::default(),
            slack_api_base: DEFAULT_SLACK_API_BASE.to_string(),
            notion_api_base: DEFAULT_NOTION_API_BASE.to_string(),
            timezone: None,
        }
    }
}

fn required<'a>(value: Option<&'a str>, var: &str) -> Result<&'a str> {
    value.ok_or_else(|| DigestError::InvalidConfig(format!("{var} is not set")).into())
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialDigestConfig {
    collect: Option<CollectConfig>,
    summary: Option<SummaryConfig>,
    pacing: Option<PacingConfig>,
    report: Option<ReportConfig>,
}

const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";
const DEFAULT_NOTION_API_BASE: &str = "https://api.notion.com";

fn env_non_empty(var: &str) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_usize(var: &str, fallback: usize) -> usize {
    match env::var(var) {
        Ok(v) => v.trim().parse::<usize>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => match v.trim() {
            "1" | "true" | "TRUE" | "yes" | "on" => true,
            "0" | "false" | "FALSE" | "no" | "off" => false,
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    env_non_empty(var).unwrap_or_else(|| fallback.to_string())
}

/// Build the ordered channel list from a JSON `{id: name}` object and an
/// optional CSV of ids. The CSV fixes both order and subset; ids missing from
/// the name map keep their id as the display name.
pub fn parse_channels(names_json: Option<&str>, ids_csv: Option<&str>) -> Result<Vec<ChannelDescriptor>> {
    let names: serde_json::Map<String, serde_json::Value> = match names_json {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw)
            .map_err(|err| anyhow!("CHANNEL_NAMES must be a JSON object of id to name: {err}"))?,
        _ => serde_json::Map::new(),
    };
    let name_for = |id: &str| -> String {
        names
            .get(id)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(id)
            .to_string()
    };

    let ids: Vec<String> = match ids_csv {
        Some(raw) if !raw.trim().is_empty() => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
            .collect(),
        _ => names.keys().map(|id| id.trim().to_string()).collect(),
    };

    let mut out: Vec<ChannelDescriptor> = Vec::with_capacity(ids.len());
    for id in ids {
        if out.iter().any(|existing| existing.id == id) {
            continue;
        }
        let name = name_for(&id);
        out.push(ChannelDescriptor::new(id, name));
    }
    Ok(out)
}

fn parse_timezone(raw: Option<String>) -> Result<Option<chrono_tz::Tz>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    raw.parse::<chrono_tz::Tz>()
        .map(Some)
        .map_err(|err| anyhow!("invalid DIGEST_TIMEZONE `{raw}`: {err}"))
}

fn validate(cfg: &DigestConfig) -> Result<()> {
    if cfg.channels.is_empty() {
        return Err(DigestError::InvalidConfig(
            "no channels configured: set CHANNEL_NAMES (and optionally CHANNEL_IDS)".to_string(),
        )
        .into());
    }
    let mut stems: HashMap<String, &ChannelDescriptor> = HashMap::new();
    for channel in &cfg.channels {
        if let Some(first) = stems.insert(artifact_stem(&channel.name), channel) {
            return Err(DigestError::InvalidConfig(format!(
                "channels {} (`{}`) and {} (`{}`) map to the same artifact name; rename one in CHANNEL_NAMES",
                first.id, first.name, channel.id, channel.name
            ))
            .into());
        }
    }
    validate_settings(cfg)
}

fn validate_settings(cfg: &DigestConfig) -> Result<()> {
    if cfg.collect.lookback_days == 0 {
        return Err(anyhow!("invalid lookback days: must be >= 1"));
    }
    if cfg.collect.user_page_limit == 0 {
        return Err(anyhow!("invalid user page limit: must be >= 1"));
    }
    if cfg.summary.run_max_messages == 0 || cfg.summary.summarize_max_messages == 0 {
        return Err(anyhow!("invalid summary message cap: must be >= 1"));
    }
    if cfg.report.title_property.trim().is_empty() {
        return Err(anyhow!("invalid report title property: cannot be empty"));
    }
    Ok(())
}

pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(custom) = env_non_empty("DIGEST_CONFIG_PATH") {
        return Some(PathBuf::from(custom));
    }

    let home = dirs::home_dir()?;
    Some(home.join(".chat-digest").join("digest.toml"))
}

fn merge_file_config(cfg: &mut DigestConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    let parsed: PartialDigestConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse digest config {}: {err}", path.display()))?;
    if let Some(collect) = parsed.collect {
        cfg.collect = collect;
    }
    if let Some(summary) = parsed.summary {
        cfg.summary = summary;
    }
    if let Some(pacing) = parsed.pacing {
        cfg.pacing = pacing;
    }
    if let Some(report) = parsed.report {
        cfg.report = report;
    }
    Ok(())
}

/// Defaults, then the optional TOML file, then environment overrides.
pub fn load_config() -> Result<DigestConfig> {
    let cfg = build_config()?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Same layering for diagnostic commands, which run without a channel list.
pub fn load_diagnostic_config() -> Result<DigestConfig> {
    let cfg = build_config()?;
    validate_settings(&cfg)?;
    Ok(cfg)
}

fn build_config() -> Result<DigestConfig> {
    let channels = parse_channels(
        env_non_empty("CHANNEL_NAMES").as_deref(),
        env_non_empty("CHANNEL_IDS").as_deref(),
    )?;

    let mut cfg = DigestConfig {
        channels,
        collect: CollectConfig::default(),
        summary: SummaryConfig::default(),
        pacing: PacingConfig::default(),
        report: ReportConfig::default(),
        credentials: Credentials {
            slack_token: env_non_empty("SLACK_TOKEN"),
            notion_token: env_non_empty("NOTION_TOKEN"),
            database_id: env_non_empty("DATABASE_ID"),
        },
        slack_api_base: env_or_string("DIGEST_SLACK_API_BASE", DEFAULT_SLACK_API_BASE),
        notion_api_base: env_or_string("DIGEST_NOTION_API_BASE", DEFAULT_NOTION_API_BASE),
        timezone: parse_timezone(env_non_empty("DIGEST_TIMEZONE"))?,
    };
    merge_file_config(&mut cfg)?;

    cfg.collect.lookback_days = env_or_u64("DIGEST_LOOKBACK_DAYS", cfg.collect.lookback_days);
    cfg.collect.user_page_limit = env_or_u64(
        "DIGEST_USER_PAGE_LIMIT",
        u64::from(cfg.collect.user_page_limit),
    )
    .min(u64::from(u32::MAX)) as u32;
    cfg.summary.run_max_messages =
        env_or_usize("DIGEST_RUN_MAX_MESSAGES", cfg.summary.run_max_messages);
    cfg.summary.summarize_max_messages = env_or_usize(
        "DIGEST_SUMMARIZE_MAX_MESSAGES",
        cfg.summary.summarize_max_messages,
    );
    cfg.pacing.thread_reply_ms =
        env_or_u64("DIGEST_PACE_THREAD_REPLY_MS", cfg.pacing.thread_reply_ms);
    cfg.pacing.channel_ms = env_or_u64("DIGEST_PACE_CHANNEL_MS", cfg.pacing.channel_ms);
    cfg.pacing.append_ms = env_or_u64("DIGEST_PACE_APPEND_MS", cfg.pacing.append_ms);
    cfg.report.title_property =
        env_or_string("DIGEST_TITLE_PROPERTY", &cfg.report.title_property);
    cfg.report.archive_after_run =
        env_or_bool("DIGEST_ARCHIVE_AFTER_RUN", cfg.report.archive_after_run);
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::{DigestConfig, parse_channels, validate, validate_settings};
    use crate::digest::model::ChannelDescriptor;
    use crate::error::DigestError;

    #[test]
    fn empty_channel_list_is_invalid_config() {
        let cfg = DigestConfig::for_channels(Vec::new());
        let err = validate(&cfg).expect_err("should fail");
        assert!(matches!(
            err.downcast_ref::<DigestError>(),
            Some(DigestError::InvalidConfig(_))
        ));
        assert!(validate_settings(&cfg).is_ok());
    }

    #[test]
    fn channels_sharing_an_artifact_name_are_rejected() {
        for (first, second) in [("ops/infra", "ops-infra"), ("general", "general")] {
            let cfg = DigestConfig::for_channels(vec![
                ChannelDescriptor::new("C1", first),
                ChannelDescriptor::new("C2", second),
            ]);
            let err = validate(&cfg).expect_err("should fail");
            assert!(matches!(
                err.downcast_ref::<DigestError>(),
                Some(DigestError::InvalidConfig(_))
            ));
            assert!(err.to_string().contains("C1"));
        }

        let cfg = DigestConfig::for_channels(vec![
            ChannelDescriptor::new("C1", "ops"),
            ChannelDescriptor::new("C2", "ops-infra"),
        ]);
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn zero_limits_are_rejected() {
        let mut cfg = DigestConfig::for_channels(vec![ChannelDescriptor::new("C1", "general")]);
        assert!(validate(&cfg).is_ok());
        cfg.collect.lookback_days = 0;
        assert!(validate(&cfg).is_err());
        cfg.collect.lookback_days = 7;
        cfg.summary.summarize_max_messages = 0;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn channels_follow_name_map_insertion_order() {
        let got = parse_channels(Some(r#"{"C2":"random","C1":"general"}"#), None)
            .expect("parse");
        let ids: Vec<&str> = got.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["C2", "C1"]);
        assert_eq!(got[1].name, "general");
    }

    #[test]
    fn channel_ids_csv_fixes_order_and_subset() {
        let got = parse_channels(
            Some(r#"{"C1":"general","C2":"random","C3":"ops"}"#),
            Some(" C3, C1 ,,C3"),
        )
        .expect("parse");
        let pairs: Vec<(&str, &str)> = got
            .iter()
            .map(|c| (c.id.as_str(), c.name.as_str()))
            .collect();
        assert_eq!(pairs, vec![("C3", "ops"), ("C1", "general")]);
    }

    #[test]
    fn unnamed_channel_uses_its_id() {
        let got = parse_channels(None, Some("C9")).expect("parse");
        assert_eq!(got[0].name, "C9");
    }

    #[test]
    fn malformed_name_map_is_rejected() {
        let err = parse_channels(Some("[\"C1\"]"), None).expect_err("should fail");
        assert!(err.to_string().contains("CHANNEL_NAMES"));
    }
}
