use crate::errors::{AppError, AppResult};
use std::{
    ffi::OsString,
    path::Path,
    process::{ExitStatus, Stdio},
    time::Instant,
};
use tokio::{
    process::Command,
    time::{timeout, Duration},
};

/// Captured result of one tool invocation.
#[derive(Debug)]
pub struct ToolRun {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Run `program args..` in `cwd`, waiting at most `timeout_s` seconds.
///
/// The child is killed if the wait is abandoned, whether by timeout or by the
/// caller dropping the future.
pub async fn run(program: &Path, args: &[OsString], cwd: &Path, timeout_s: u64) -> AppResult<ToolRun> {
    let mut command = Command::new(program);
    command.args(args);
    command.current_dir(cwd);
    command.stdin(Stdio::null());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    command.kill_on_drop(true);

    let start = Instant::now();
    let child = command
        .spawn()
        .map_err(|e| AppError::Internal(format!("failed to spawn {}: {e}", program.display())))?;

    let output = match timeout(Duration::from_secs(timeout_s), child.wait_with_output()).await {
        Ok(Ok(out)) => out,
        Ok(Err(e)) => return Err(AppError::Internal(format!("waiting for tool: {e}"))),
        Err(_) => return Err(AppError::ExecTimeout(timeout_s)),
    };

    Ok(ToolRun {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        elapsed: start.elapsed(),
    })
}

/// Last `max_chars` characters of `s`.
pub fn tail(s: &str, max_chars: usize) -> &str {
    let count = s.chars().count();
    if count <= max_chars {
        return s;
    }
    let skip = count - max_chars;
    let idx = s.char_indices().nth(skip).map(|(i, _)| i).unwrap_or(s.len());
    &s[idx..]
}
