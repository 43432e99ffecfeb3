use crate::digest::model::{ChannelDescriptor, Transcript};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const ARTIFACT_PREFIX: &str = "history_";
const ARTIFACT_EXT: &str = ".json";

/// Handoff point between the collect and summarize phases.
pub trait ArtifactStore {
    fn put(&self, channel: &ChannelDescriptor, run_date: NaiveDate, transcript: &Transcript) -> Result<PathBuf>;
    /// `Ok(None)` when no artifact exists for the pair.
    fn get(&self, channel: &ChannelDescriptor, run_date: NaiveDate) -> Result<Option<Transcript>>;
    fn location(&self, channel: &ChannelDescriptor, run_date: NaiveDate) -> PathBuf;
    /// Relocate the run date's consumed artifacts out of the working area.
    fn archive(&self, run_date: NaiveDate) -> Result<ArchiveOutcome>;
}

pub fn date_suffix(run_date: NaiveDate) -> String {
    run_date.format("%m%d").to_string()
}

/// File-safe form of a channel name; two channels must never share one.
pub fn artifact_stem(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | '\0' => '-',
            ch if ch.is_control() => '-',
            ch => ch,
        })
        .collect();
    if cleaned.is_empty() {
        "channel".to_string()
    } else {
        cleaned
    }
}

pub fn artifact_file_name(channel_name: &str, run_date: NaiveDate) -> String {
    format!(
        "{ARTIFACT_PREFIX}{}_{}{ARTIFACT_EXT}",
        artifact_stem(channel_name),
        date_suffix(run_date)
    )
}

fn is_run_artifact(file_name: &str, suffix: &str) -> bool {
    file_name.starts_with(ARTIFACT_PREFIX) && file_name.ends_with(&format!("_{suffix}{ARTIFACT_EXT}"))
}

#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    work_dir: PathBuf,
    dump_dir: PathBuf,
}

impl FsArtifactStore {
    pub fn new(work_dir: impl Into<PathBuf>, dump_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            dump_dir: dump_dir.into(),
        }
    }
}

impl ArtifactStore for FsArtifactStore {
    fn put(&self, channel: &ChannelDescriptor, run_date: NaiveDate, transcript: &Transcript) -> Result<PathBuf> {
        fs::create_dir_all(&self.work_dir)
            .with_context(|| format!("failed to create {}", self.work_dir.display()))?;
        let path = self.location(channel, run_date);
        let data = serde_json::to_string_pretty(transcript)?;
        fs::write(&path, format!("{data}\n"))
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    fn get(&self, channel: &ChannelDescriptor, run_date: NaiveDate) -> Result<Option<Transcript>> {
        let path = self.location(channel, run_date);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        let transcript: Transcript = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Some(transcript))
    }

    fn location(&self, channel: &ChannelDescriptor, run_date: NaiveDate) -> PathBuf {
        self.work_dir.join(artifact_file_name(&channel.name, run_date))
    }

    fn archive(&self, run_date: NaiveDate) -> Result<ArchiveOutcome> {
        archive(&self.work_dir, &self.dump_dir, &date_suffix(run_date))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArchiveOutcome {
    pub moved: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    if from == to {
        return Ok(());
    }
    match fs::rename(from, to) {
        Ok(_) => Ok(()),
        Err(rename_err) => {
            if matches!(
                rename_err.kind(),
                ErrorKind::CrossesDevices | ErrorKind::PermissionDenied
            ) {
                fs::copy(from, to).with_context(|| {
                    format!("failed to copy {} to {}", from.display(), to.display())
                })?;
                fs::remove_file(from)
                    .with_context(|| format!("failed to remove {}", from.display()))?;
                Ok(())
            } else {
                Err(rename_err).with_context(|| {
                    format!("failed to move {} to {}", from.display(), to.display())
                })
            }
        }
    }
}

/// Move every `history_*_{MMDD}.json` in `work_dir` into `dump_dir`,
/// overwriting older copies. Each file is attempted independently.
pub fn archive(work_dir: &Path, dump_dir: &Path, date_suffix: &str) -> Result<ArchiveOutcome> {
    let mut outcome = ArchiveOutcome::default();
    let entries = match fs::read_dir(work_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(outcome),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", work_dir.display()));
        }
    };

    let mut candidates = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if is_run_artifact(name, date_suffix) {
            candidates.push(path);
        }
    }
    candidates.sort();
    if candidates.is_empty() {
        return Ok(outcome);
    }

    fs::create_dir_all(dump_dir)
        .with_context(|| format!("failed to create {}", dump_dir.display()))?;
    for source in candidates {
        let Some(name) = source.file_name() else {
            continue;
        };
        let destination = dump_dir.join(name);
        match move_file(&source, &destination) {
            Ok(()) => {
                tracing::info!(from = %source.display(), to = %destination.display(), "artifact archived");
                outcome.moved.push(destination);
            }
            Err(err) => {
                let err_text = format!("{err:#}");
                tracing::warn!(path = %source.display(), error = %err_text, "artifact archive failed");
                outcome.failed.push((source, err_text));
            }
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::{ArtifactStore, FsArtifactStore, archive, artifact_file_name, is_run_artifact};
    use crate::digest::model::ChannelDescriptor;
    use crate::digest::testing::{msg, root};
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::tempdir;

    fn march_10() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    #[test]
    fn file_name_is_keyed_by_channel_and_date() {
        assert_eq!(artifact_file_name("general", march_10()), "history_general_0310.json");
        assert_eq!(artifact_file_name("ops/infra", march_10()), "history_ops-infra_0310.json");
        assert_ne!(
            artifact_file_name("general", march_10()),
            artifact_file_name("general", NaiveDate::from_ymd_opt(2025, 3, 17).unwrap())
        );
    }

    #[test]
    fn run_artifact_match_requires_prefix_and_suffix() {
        assert!(is_run_artifact("history_general_0310.json", "0310"));
        assert!(!is_run_artifact("history_general_0311.json", "0310"));
        assert!(!is_run_artifact("notes_0310.json", "0310"));
        assert!(!is_run_artifact("history_general_10310.json", "0310"));
    }

    #[test]
    fn put_then_get_preserves_order_and_overwrites() {
        let tmp = tempdir().expect("tempdir");
        let store = FsArtifactStore::new(tmp.path().join("history"), tmp.path().join("dump"));
        let channel = ChannelDescriptor::new("C1", "general");

        store
            .put(&channel, march_10(), &vec![msg("Kim", "old", "1.0")])
            .expect("first put");
        let transcript = vec![root("Kim", "한글 본문", "2.0", 1), msg("Lee", "b", "1.0")];
        let path = store.put(&channel, march_10(), &transcript).expect("put");

        let raw = fs::read_to_string(&path).expect("read");
        assert!(raw.contains("한글 본문"));
        assert!(raw.ends_with("]\n"));
        let loaded = store.get(&channel, march_10()).expect("get").expect("present");
        assert_eq!(loaded, transcript);
    }

    #[test]
    fn get_missing_artifact_is_none() {
        let tmp = tempdir().expect("tempdir");
        let store = FsArtifactStore::new(tmp.path(), tmp.path().join("dump"));
        let got = store
            .get(&ChannelDescriptor::new("C1", "general"), march_10())
            .expect("get");
        assert!(got.is_none());
    }

    #[test]
    fn archive_moves_only_matching_artifacts() {
        let tmp = tempdir().expect("tempdir");
        let work = tmp.path().join("work");
        let dump = work.join("dump");
        fs::create_dir_all(&work).expect("mkdir");
        fs::write(work.join("history_general_0310.json"), "[]\n").expect("write");
        fs::write(work.join("history_random_0310.json"), "[]\n").expect("write");
        fs::write(work.join("history_general_0303.json"), "[]\n").expect("write");

        let store = FsArtifactStore::new(&work, &dump);
        let outcome = store.archive(march_10()).expect("archive");

        assert_eq!(outcome.moved.len(), 2);
        assert!(outcome.failed.is_empty());
        assert!(dump.join("history_general_0310.json").exists());
        assert!(dump.join("history_random_0310.json").exists());
        assert!(work.join("history_general_0303.json").exists());
        assert!(!work.join("history_general_0310.json").exists());
    }

    #[test]
    fn archive_of_missing_work_dir_moves_nothing() {
        let tmp = tempdir().expect("tempdir");
        let outcome = archive(&tmp.path().join("absent"), &tmp.path().join("dump"), "0310")
            .expect("archive");
        assert!(outcome.moved.is_empty());
        assert!(!tmp.path().join("dump").exists());
    }
}
