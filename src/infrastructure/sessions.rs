//! Terminal-session interface.
//!
//! Grounded on `cmd_queue/util/util_tmux.py::tmux` (list/new/send/capture/
//! kill) and `cmd_queue/tmux_queue.py::kill_other_queues` /
//! `handle_other_sessions` for the conflicting-session policy.

use std::collections::HashMap;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::infrastructure::process;

/// One row of `tmux list-sessions` output: `<id>: <rest>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: String,
    pub rest: String,
}

/// Minimal terminal-session control surface: list, create
/// detached, send a command + Enter, capture the visible pane, kill by id.
pub trait SessionManager {
    fn list_sessions(&self) -> Result<Vec<SessionInfo>>;
    fn new_session(&self, id: &str) -> Result<()>;
    fn send_keys(&self, id: &str, command: &str) -> Result<()>;
    fn capture_pane(&self, id: &str) -> Result<String>;
    fn kill_session(&self, id: &str) -> Result<()>;

    /// `tmux` on PATH.
    fn is_available(&self) -> bool;
}

pub struct TmuxSessionManager;

impl TmuxSessionManager {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TmuxSessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager for TmuxSessionManager {
    fn list_sessions(&self) -> Result<Vec<SessionInfo>> {
        let output = process::run("tmux", &["list-sessions"], &HashMap::new())
            .context("failed to invoke `tmux list-sessions`")?;
        if !output.status.success() {
            // No sessions at all exits non-zero with a "no server running"
            // message; treat that as an empty list rather than an error.
            return Ok(Vec::new());
        }
        let text = String::from_utf8_lossy(&output.stdout);
        let mut sessions = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some((id, rest)) = line.split_once(':') {
                sessions.push(SessionInfo {
                    id: id.to_string(),
                    rest: rest.trim().to_string(),
                });
            }
        }
        Ok(sessions)
    }

    fn new_session(&self, id: &str) -> Result<()> {
        debug!(session = id, "creating detached tmux session");
        process::run_checked("tmux", &["new-session", "-d", "-s", id, "bash"], &HashMap::new())
            .with_context(|| format!("failed to create tmux session `{id}`"))?;
        Ok(())
    }

    fn send_keys(&self, id: &str, command: &str) -> Result<()> {
        process::run_checked("tmux", &["send-keys", "-t", id, command, "Enter"], &HashMap::new())
            .with_context(|| format!("failed to send keys to tmux session `{id}`"))?;
        Ok(())
    }

    fn capture_pane(&self, id: &str) -> Result<String> {
        let target = format!("{id}:0.0");
        let output = process::run_checked("tmux", &["capture-pane", "-p", "-t", &target], &HashMap::new())
            .with_context(|| format!("failed to capture pane for tmux session `{id}`"))?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn kill_session(&self, id: &str) -> Result<()> {
        info!(session = id, "killing tmux session");
        process::run_checked("tmux", &["kill-session", "-t", id], &HashMap::new())
            .with_context(|| format!("failed to kill tmux session `{id}`"))?;
        Ok(())
    }

    fn is_available(&self) -> bool {
        which("tmux")
    }
}

fn which(program: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| {
                let candidate = dir.join(program);
                candidate.is_file()
            })
        })
        .unwrap_or(false)
}

/// Policy for leftover sessions from a previous run of the same queue name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    Ask,
    Kill,
    Ignore,
    /// `ask` if stdin is a terminal, else `kill` (headless default).
    Auto,
}

/// Sessions whose id matches `"<prefix><name>_" + *` are leftover runs of
/// this queue.
pub fn find_conflicting_sessions(
    sessions: &[SessionInfo],
    prefix: &str,
    name: &str,
) -> Vec<String> {
    let needle = format!("{prefix}{name}_");
    sessions
        .iter()
        .filter(|s| s.id.starts_with(&needle))
        .map(|s| s.id.clone())
        .collect()
}

/// Every session whose id begins with `prefix`, regardless of queue name.
pub fn sessions_with_prefix(sessions: &[SessionInfo], prefix: &str) -> Vec<String> {
    sessions
        .iter()
        .filter(|s| s.id.starts_with(prefix))
        .map(|s| s.id.clone())
        .collect()
}

/// Resolves [`ConflictPolicy::Auto`] against whether stdin looks like a
/// terminal, then kills conflicting sessions per the resolved policy.
/// `ask` is only ever resolved by the caller (CLI layer); here it is treated
/// as "do nothing" since a trait object has no prompt surface — CLI code
/// that wants a prompt should call [`find_conflicting_sessions`] directly.
pub fn handle_other_sessions(
    manager: &dyn SessionManager,
    policy: ConflictPolicy,
    prefix: &str,
    name: &str,
    stdin_is_terminal: bool,
    confirmed: bool,
) -> Result<()> {
    let resolved = match policy {
        ConflictPolicy::Auto => {
            if stdin_is_terminal {
                ConflictPolicy::Ask
            } else {
                ConflictPolicy::Kill
            }
        }
        other => other,
    };

    match resolved {
        ConflictPolicy::Ignore => Ok(()),
        ConflictPolicy::Kill => {
            let sessions = manager.list_sessions()?;
            for id in find_conflicting_sessions(&sessions, prefix, name) {
                manager.kill_session(&id)?;
            }
            Ok(())
        }
        ConflictPolicy::Ask => {
            if !confirmed {
                return Ok(());
            }
            let sessions = manager.list_sessions()?;
            for id in find_conflicting_sessions(&sessions, prefix, name) {
                manager.kill_session(&id)?;
            }
            Ok(())
        }
        ConflictPolicy::Auto => unreachable!("resolved above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_conflicting_sessions_matches_prefix_and_name() {
        let sessions = vec![
            SessionInfo { id: "cmdq_build_20240101".to_string(), rest: "1 windows".to_string() },
            SessionInfo { id: "cmdq_other_20240101".to_string(), rest: "1 windows".to_string() },
            SessionInfo { id: "unrelated".to_string(), rest: "1 windows".to_string() },
        ];
        let found = find_conflicting_sessions(&sessions, "cmdq_", "build");
        assert_eq!(found, vec!["cmdq_build_20240101".to_string()]);
    }

    #[test]
    fn sessions_with_prefix_ignores_queue_name() {
        let sessions = vec![
            SessionInfo { id: "cmdq_build_20240101".to_string(), rest: String::new() },
            SessionInfo { id: "cmdq_other_20240202".to_string(), rest: String::new() },
            SessionInfo { id: "unrelated".to_string(), rest: String::new() },
        ];
        let mut found = sessions_with_prefix(&sessions, "cmdq_");
        found.sort();
        assert_eq!(found, vec!["cmdq_build_20240101".to_string(), "cmdq_other_20240202".to_string()]);
    }

    #[test]
    fn auto_policy_resolves_to_kill_when_headless() {
        use mockall::predicate::*;

        let mut mock = MockSessionManager::new();
        mock.expect_list_sessions().returning(|| {
            Ok(vec![SessionInfo { id: "cmdq_q_root".to_string(), rest: String::new() }])
        });
        mock.expect_kill_session()
            .with(eq("cmdq_q_root"))
            .returning(|_| Ok(()));

        handle_other_sessions(&mock, ConflictPolicy::Auto, "cmdq_", "q", false, false).unwrap();
    }

    mockall::mock! {
        SessionManager {}
        impl SessionManager for SessionManager {
            fn list_sessions(&self) -> Result<Vec<SessionInfo>>;
            fn new_session(&self, id: &str) -> Result<()>;
            fn send_keys(&self, id: &str, command: &str) -> Result<()>;
            fn capture_pane(&self, id: &str) -> Result<String>;
            fn kill_session(&self, id: &str) -> Result<()>;
            fn is_available(&self) -> bool;
        }
    }
}
