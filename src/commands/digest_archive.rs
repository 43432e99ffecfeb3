use anyhow::Result;

use crate::commands::CommandReport;
use crate::digest::artifact;
use crate::digest::lock::RunLock;
use crate::digest::paths::resolve_paths;
use crate::error::DigestError;

#[derive(Debug, Clone, Default)]
pub struct DigestArchiveOptions {
    /// `MMDD` suffix of the artifacts to move.
    pub date: String,
}

fn parse_suffix(raw: &str) -> Result<String> {
    let suffix = raw.trim();
    let valid = suffix.len() == 4
        && suffix.bytes().all(|b| b.is_ascii_digit())
        && matches!(suffix[..2].parse::<u32>(), Ok(1..=12))
        && matches!(suffix[2..].parse::<u32>(), Ok(1..=31));
    if !valid {
        return Err(DigestError::InvalidConfig(format!(
            "archive date must be MMDD, got `{raw}`"
        ))
        .into());
    }
    Ok(suffix.to_string())
}

pub fn run(opts: &DigestArchiveOptions) -> Result<CommandReport> {
    let suffix = parse_suffix(&opts.date)?;
    let paths = resolve_paths()?;
    let lock = RunLock::acquire(&paths.lock_file)?;
    tracing::debug!(lock = %lock.path().display(), "run lock acquired");

    let mut report = CommandReport::new("archive");
    report.detail(format!("work_dir={}", paths.work_dir.display()));
    report.detail(format!("dump_dir={}", paths.dump_dir.display()));

    let outcome = artifact::archive(&paths.work_dir, &paths.dump_dir, &suffix)?;
    if outcome.moved.is_empty() && outcome.failed.is_empty() {
        report.detail(format!("no artifacts matching history_*_{suffix}.json"));
    }
    for moved in &outcome.moved {
        report.detail(format!("archived {}", moved.display()));
    }
    for (path, err) in &outcome.failed {
        report.issue(format!("failed to archive {}: {err}", path.display()));
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::parse_suffix;

    #[test]
    fn suffix_must_be_a_month_and_day() {
        assert_eq!(parse_suffix(" 0310 ").expect("valid"), "0310");
        for bad in ["310", "1310", "0300", "03-1", "abcd", ""] {
            assert!(parse_suffix(bad).is_err(), "{bad} should be rejected");
        }
    }
}
