//! Status file I/O
//!
//! Two halves of the same JSON contract: a bash-snippet
//! generator used by every emitter to write the `<stat_fpath>`/queue-state
//! files atomically from within generated shell scripts, and a bounded-retry
//! native reader used by the monitor and by dependency gates when a future
//! native (non-bash) worker wants to inspect them directly. Grounded on
//! `cmd_queue/util/util_bash.py::bash_json_dump`.

use std::fs;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use crate::domain::errors::{QueueError, QueueResult};
use crate::domain::value_objects::{JobStatus, QueueState};

/// One `(json_key, printf_format, bash_expression)` triple, exactly as the
/// original's `bash_json_dump` takes them.
pub struct JsonFmtPart {
    pub key: &'static str,
    pub format: &'static str,
    pub expr: String,
}

impl JsonFmtPart {
    pub fn new(key: &'static str, format: &'static str, expr: impl Into<String>) -> Self {
        Self { key, format, expr: expr.into() }
    }
}

/// Builds a `printf '{...}\n' \` `"arg" "arg" \` `> fpath` bash snippet that
/// atomically dumps a JSON object. The `printf` redirection is the only
/// write; there is no separate open/write/close sequence for a reader to
/// observe half-written.
pub fn bash_json_dump(parts: &[JsonFmtPart], fpath: &Path) -> String {
    let body: Vec<String> = parts.iter().map(|p| format!("\"{}\": {}", p.key, p.format)).collect();
    let args: Vec<String> = parts.iter().map(|p| format!("\"{}\"", p.expr)).collect();

    let printf_body = format!("'{{{}}}\\n'", body.join(", "));
    let printf_part = format!("printf {printf_body} \\\n    {}", args.join(" "));
    format!("{printf_part} \\\n    > {}", fpath.display())
}

/// Reads and parses a per-job status file, retrying while the JSON is
/// incomplete (the writer uses a single atomic `printf`, so partial reads
/// only happen if the file is observed mid-write by a slow filesystem).
/// Bounded retries: `attempts` tries at `interval` apart, default
/// 100 × 10ms.
pub fn read_job_status(
    path: &Path,
    attempts: u32,
    interval: Duration,
) -> QueueResult<JobStatus> {
    for _ in 0..attempts {
        if let Ok(contents) = fs::read_to_string(path) {
            match serde_json::from_str(&contents) {
                Ok(status) => return Ok(status),
                Err(e) => tracing::debug!(path = %path.display(), error = %e, "partial status json, retrying"),
            }
        }
        sleep(interval);
    }
    Err(QueueError::MonitorError {
        path: path.display().to_string(),
        attempts,
    })
}

/// Reads a per-worker queue-state file. A missing file (the worker has not
/// written its first state dump yet) is not a parse failure: it is returned
/// immediately as `QueueState::unknown(fallback_name)` without consuming any
/// of the bounded retry budget, which is reserved for partial/incomplete
/// JSON observed mid-write. Mirrors
/// `cmd_queue/serial_queue.py`'s `FileNotFoundError` handling, which returns
/// a synthetic `'unknown'` state and keeps polling rather than erroring.
pub fn read_queue_state(
    path: &Path,
    fallback_name: &str,
    attempts: u32,
    interval: Duration,
) -> QueueResult<QueueState> {
    for _ in 0..attempts {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(state) => return Ok(state),
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "partial queue state json, retrying");
                    sleep(interval);
                }
            },
            Err(_) => return Ok(QueueState::unknown(fallback_name)),
        }
    }
    Err(QueueError::MonitorError {
        path: path.display().to_string(),
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn bash_json_dump_matches_expected_shape() {
        let parts = vec![
            JsonFmtPart::new("ret", "%s", "null"),
            JsonFmtPart::new("name", "\"%s\"", "myjob"),
        ];
        let snippet = bash_json_dump(&parts, &PathBuf::from("out.json"));
        assert!(snippet.starts_with("printf '{\"ret\": %s, \"name\": \"%s\"}\\n' \\\n"));
        assert!(snippet.contains("\"null\" \"myjob\""));
        assert!(snippet.ends_with("> out.json"));
    }

    #[test]
    fn read_job_status_retries_until_attempts_exhausted() {
        let missing = PathBuf::from("/tmp/jobweaver-test/does-not-exist.stat");
        let err = read_job_status(&missing, 2, Duration::from_millis(1)).unwrap_err();
        assert!(matches!(err, QueueError::MonitorError { attempts: 2, .. }));
    }

    #[test]
    fn read_job_status_parses_a_written_file() {
        let dir = std::env::temp_dir().join("jobweaver-status-io-test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("a.stat");
        fs::write(&path, r#"{"ret": 0, "name": "a"}"#).unwrap();
        let status = read_job_status(&path, 1, Duration::from_millis(1)).unwrap();
        assert_eq!(status.name, "a");
        assert_eq!(status.ret, Some(0));
    }

    #[test]
    fn read_queue_state_returns_unknown_for_missing_file_without_erroring() {
        let missing = PathBuf::from("/tmp/jobweaver-test/does-not-exist.stat");
        let state = read_queue_state(&missing, "worker-0", 1, Duration::from_millis(1)).unwrap();
        assert_eq!(state.status, crate::domain::value_objects::QueuePhase::Unknown);
        assert_eq!(state.name, "worker-0");
        assert!(!state.is_done());
    }

    #[test]
    fn read_queue_state_does_not_spend_retry_budget_on_a_missing_file() {
        let missing = PathBuf::from("/tmp/jobweaver-test/does-not-exist-either.stat");
        // a single attempt is enough: a missing file returns immediately
        // rather than looping until attempts are exhausted.
        let state = read_queue_state(&missing, "w", 1, Duration::from_secs(5)).unwrap();
        assert_eq!(state.status, crate::domain::value_objects::QueuePhase::Unknown);
    }

    #[test]
    fn read_queue_state_still_bounds_retries_on_partial_json() {
        let dir = std::env::temp_dir().join("jobweaver-status-io-test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("partial.stat");
        fs::write(&path, r#"{"status": "run", "passed": 1"#).unwrap();
        let err = read_queue_state(&path, "w", 2, Duration::from_millis(1)).unwrap_err();
        assert!(matches!(err, QueueError::MonitorError { attempts: 2, .. }));
    }

    #[test]
    fn read_queue_state_parses_a_written_file() {
        let dir = std::env::temp_dir().join("jobweaver-status-io-test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("state.stat");
        fs::write(
            &path,
            r#"{"status": "done", "passed": 1, "failed": 0, "skipped": 0, "total": 1, "name": "q", "rootid": "r"}"#,
        )
        .unwrap();
        let state = read_queue_state(&path, "q", 1, Duration::from_millis(1)).unwrap();
        assert!(state.is_done());
        assert_eq!(state.passed, 1);
    }
}
