//! JSON shapes written atomically to status files.

use serde::{Deserialize, Serialize};

/// Per-job status file contents (`<stat_fpath>`).
///
/// `ret` is `None` before the job's command has finished (the pre-command
/// write), and `Some(code)` afterwards, where `code` is 0 on pass, the
/// command's exit code on fail, or 126 on skip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub ret: Option<i32>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
}

/// Per-worker queue-state file contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueState {
    pub status: QueuePhase,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub total: u32,
    pub name: String,
    pub rootid: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuePhase {
    Init,
    SetEnviron,
    Run,
    Done,
    /// Synthetic phase for a worker that has not yet written its first
    /// state dump; never written to disk by a generated script, only
    /// returned by a reader that finds no file at all.
    Unknown,
}

impl QueuePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueuePhase::Init => "init",
            QueuePhase::SetEnviron => "set_environ",
            QueuePhase::Run => "run",
            QueuePhase::Done => "done",
            QueuePhase::Unknown => "unknown",
        }
    }
}

impl QueueState {
    pub fn is_done(&self) -> bool {
        matches!(self.status, QueuePhase::Done)
    }

    /// Placeholder state for a worker whose state file does not exist yet
    /// (not started, or not yet past its first write). Not a parse
    /// failure, so a reader should not count it against the bounded retry
    /// budget — see `infrastructure::status_io::read_queue_state`.
    pub fn unknown(name: impl Into<String>) -> Self {
        Self {
            status: QueuePhase::Unknown,
            passed: 0,
            failed: 0,
            skipped: 0,
            total: 0,
            name: name.into(),
            rootid: String::new(),
        }
    }
}
