use crate::config::Config;
use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Start the periodic outputs sweep. Returns `None` when retention is disabled.
pub fn spawn(cfg: &Config) -> Option<JoinHandle<()>> {
    if cfg.retention.max_age_s == 0 {
        return None;
    }
    let dir = cfg.paths.outputs_dir.clone();
    let max_age = Duration::from_secs(cfg.retention.max_age_s);
    let every = Duration::from_secs(cfg.retention.sweep_interval_s);
    Some(tokio::spawn(run(dir, max_age, every)))
}

async fn run(dir: PathBuf, max_age: Duration, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        let d = dir.clone();
        match tokio::task::spawn_blocking(move || sweep_once(&d, max_age)).await {
            Ok(Ok(0)) => debug!(dir = %dir.display(), "janitor sweep: nothing to remove"),
            Ok(Ok(n)) => info!(dir = %dir.display(), removed = n, "janitor sweep"),
            Ok(Err(e)) => warn!(dir = %dir.display(), error = %e, "janitor sweep failed"),
            Err(e) => warn!(error = %e, "janitor task panicked"),
        }
    }
}

/// Delete regular files in `dir` last modified more than `max_age` ago.
pub fn sweep_once(dir: &Path, max_age: Duration) -> std::io::Result<usize> {
    let now = SystemTime::now();
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "unreadable outputs entry");
                continue;
            }
        };
        let meta = match entry.metadata() {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };
        let age = meta.modified().ok().and_then(|m| now.duration_since(m).ok());
        if age.map(|a| a > max_age).unwrap_or(false) {
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %entry.path().display(), error = %e, "could not remove artifact"),
            }
        }
    }
    Ok(removed)
}
