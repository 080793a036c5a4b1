//! Executor: writes generated scripts to disk, marks them
//! executable, and invokes them — the driver script detached for the
//! multi-session backend, the script itself in the foreground for serial
//! and cluster.
//!
//! Grounded on `cmd_queue/base_queue.py::Queue.run` (write-then-invoke
//! sequencing, `block` parameter) and `serial_queue.py::SerialQueue.run`
//! (plain foreground `bash <script>`); multi-session dispatch reuses
//! `infrastructure::sessions::SessionManager` rather than re-shelling out to
//! the driver script's own `tmux` lines, since the driver text is meant to
//! be a human-readable artifact on disk, not the only way to launch it.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::{Command, ExitStatus};

use anyhow::{Context, Result};
use tracing::info;

use crate::application::services::planner::Plan;
use crate::infrastructure::sessions::SessionManager;

/// Mode 0775: owner/group read-write-execute, world read-execute. Matches
/// the permission the original sets on every emitted `.sh` file.
const EXECUTABLE_MODE: u32 = 0o775;

/// Writes `contents` to `path` (creating parent directories) and marks it
/// executable.
pub fn write_executable(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))?;
    fs::set_permissions(path, fs::Permissions::from_mode(EXECUTABLE_MODE))
        .with_context(|| format!("failed to chmod {}", path.display()))?;
    Ok(())
}

/// Invokes `bash <path>` in the foreground, optionally blocking for the
/// exit status.
pub fn invoke_foreground(path: &Path, block: bool) -> Result<Option<ExitStatus>> {
    info!(script = %path.display(), "invoking script in the foreground");
    let mut cmd = Command::new("bash");
    cmd.arg(path);
    if block {
        let status = cmd.status().with_context(|| format!("failed to run {}", path.display()))?;
        Ok(Some(status))
    } else {
        cmd.spawn().with_context(|| format!("failed to spawn {}", path.display()))?;
        Ok(None)
    }
}

/// Writes every worker script plus the driver script for a multi-session
/// [`Plan`], then launches each worker in its own detached terminal session
/// via the supplied [`SessionManager`]. The
/// driver script text itself (see
/// [`crate::application::services::planner::finalize_driver_text`]) is
/// still written to disk as a human-readable record of what was launched,
/// but launching goes through `sessions` directly so the executor can be
/// exercised against a mock in tests without a real `tmux`.
pub fn run_multi_session(
    plan: &Plan,
    worker_scripts: &[(std::path::PathBuf, String)],
    driver_path: &Path,
    driver_text: &str,
    sessions: &dyn SessionManager,
) -> Result<()> {
    for (path, contents) in worker_scripts {
        write_executable(path, contents)?;
    }
    write_executable(driver_path, driver_text)?;

    for worker in &plan.workers {
        sessions
            .new_session(&worker.session_id)
            .with_context(|| format!("failed to create session {}", worker.session_id))?;
        let command = format!("bash {}", worker.script_path.display());
        sessions
            .send_keys(&worker.session_id, &command)
            .with_context(|| format!("failed to start worker script in session {}", worker.session_id))?;
        info!(session = %worker.session_id, script = %worker.script_path.display(), "launched worker session");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt as _;

    #[test]
    fn write_executable_sets_mode_0775() {
        let dir = std::env::temp_dir().join("jobweaver-executor-test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("script.sh");
        write_executable(&path, "#!/bin/bash\necho hi\n").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o775);
    }

    #[test]
    fn invoke_foreground_blocking_returns_exit_status() {
        let dir = std::env::temp_dir().join("jobweaver-executor-test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("pass.sh");
        write_executable(&path, "#!/bin/bash\nexit 0\n").unwrap();
        let status = invoke_foreground(&path, true).unwrap().unwrap();
        assert!(status.success());
    }
}
