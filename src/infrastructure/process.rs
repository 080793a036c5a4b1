//! Thin process-spawning wrapper shared by the session manager, the
//! scheduler client, and the `bash -n` syntax checker.
//!
//! Grounded on the `anyhow`+`tracing` process-spawn idiom used throughout
//! the pack's process-execution tooling, adapted to this crate's
//! `QueueError` taxonomy at the boundary that needs it.

use std::collections::HashMap;
use std::process::{Command, Output};

use anyhow::{Context, Result};
use tracing::debug;

/// Runs `program args...`, returning the raw [`Output`] regardless of exit
/// status. Extra environment variables are merged on top of the inherited
/// environment.
pub fn run(program: &str, args: &[&str], extra_env: &HashMap<String, String>) -> Result<Output> {
    debug!(program, ?args, "spawning process");
    let mut cmd = Command::new(program);
    cmd.args(args);
    for (k, v) in extra_env {
        cmd.env(k, v);
    }
    cmd.output().with_context(|| format!("failed to spawn `{program}`"))
}

/// Like [`run`], but fails if the process exits non-zero.
pub fn run_checked(program: &str, args: &[&str], extra_env: &HashMap<String, String>) -> Result<Output> {
    let output = run(program, args, extra_env)?;
    if !output.status.success() {
        anyhow::bail!(
            "`{program} {}` exited with {}: {}",
            args.join(" "),
            output.status,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(output)
}

/// Runs a process and returns its stdout as a trimmed UTF-8 string.
pub fn capture_stdout(program: &str, args: &[&str]) -> Result<String> {
    let output = run_checked(program, args, &HashMap::new())?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Checks a generated bash script for syntax errors via `bash -n`, without
/// executing any of its commands. Grounded on
/// `serial_queue.py::_check_bash_text_for_syntax_errors`.
pub fn check_bash_syntax(script: &str) -> Result<()> {
    let path = std::env::temp_dir().join(format!("jobweaver-syntax-{}.sh", uuid::Uuid::new_v4()));
    std::fs::write(&path, script).context("failed to write temp file for bash syntax check")?;
    let result = run("bash", &["-n", &path.to_string_lossy()], &HashMap::new());
    let _ = std::fs::remove_file(&path);
    let output = result?;
    if !output.status.success() {
        anyhow::bail!(
            "generated bash has a syntax error: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_stdout_trims_trailing_newline() {
        let out = capture_stdout("echo", &["hello"]).unwrap();
        assert_eq!(out, "hello");
    }

    #[test]
    fn run_checked_fails_on_nonzero_exit() {
        let err = run_checked("false", &[], &HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("exited with"));
    }
}
