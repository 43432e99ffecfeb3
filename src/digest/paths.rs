use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct DigestPaths {
    pub digest_home: PathBuf,
    pub work_dir: PathBuf,
    pub dump_dir: PathBuf,
    pub lock_file: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<DigestPaths> {
    let digest_home = match env::var("DIGEST_HOME") {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => required_home_dir()?.join("chat-digest"),
    };

    let work_dir = env_or_default_path("DIGEST_WORK_DIR", digest_home.join("history"));
    let dump_dir = env_or_default_path("DIGEST_DUMP_DIR", work_dir.join("dump"));
    let lock_file = digest_home.join("digest.lock");

    Ok(DigestPaths {
        digest_home,
        work_dir,
        dump_dir,
        lock_file,
    })
}
