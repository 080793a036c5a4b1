//! Slurm scheduler client.
//!
//! Grounded on `cmd_queue/slurm_queue.py`: `SlurmJob.submit` (sbatch +
//! `--parsable` job-id capture), `SlurmQueue.is_available` (squeue on PATH
//! plus a working `squeue`/`sinfo` round trip), `SlurmQueue._read_job_status`
//! and the `scontrol show job` output parser, and
//! `HACK_KILL_BROKEN_JOBS`-style garbage collection of jobs stuck on a
//! `DependencyNeverSatisfied` scheduler state.

use std::collections::HashMap;

use anyhow::Result;
use tracing::warn;

use crate::infrastructure::process;

/// Scheduler states that mean a job will never run because one of its
/// `afterok:` dependencies already failed. Mirrors the set `slurm_queue.py`
/// treats as terminal-but-unkillable-by-waiting.
pub const DEAD_DEPENDENCY_STATES: &[&str] = &["DependencyNeverSatisfied"];

/// Scheduler submission/inspection surface. Kept narrow and trait-based so
/// the planner and monitor can be tested against a fake without invoking a
/// real `sbatch`/`squeue`/`scontrol`.
pub trait SchedulerClient {
    /// Submits one job via `sbatch`, returning the captured job id.
    fn submit(&self, sbatch_args: &[String]) -> Result<String>;

    /// Looks up a job's current `JobState` via `scontrol show job`, `None`
    /// if the id is unknown to the scheduler (already purged).
    fn job_state(&self, job_id: &str) -> Result<Option<String>>;

    /// Full key/value dump of `scontrol show job <id>`.
    fn show_job(&self, job_id: &str) -> Result<HashMap<String, String>>;

    /// Resolves a job name back to an id via `squeue -n <name>`, used when a
    /// dependency's job id was not captured (e.g. after a `cleanup`).
    fn job_id_by_name(&self, name: &str) -> Result<Option<String>>;

    fn cancel(&self, job_id: &str) -> Result<()>;

    /// `squeue`/`sinfo` on PATH and answering.
    fn is_available(&self) -> bool;
}

pub struct SlurmClient {
    pub positional_keys: Vec<String>,
}

impl SlurmClient {
    pub fn new(positional_keys: Vec<String>) -> Self {
        Self { positional_keys }
    }
}

impl SchedulerClient for SlurmClient {
    fn submit(&self, sbatch_args: &[String]) -> Result<String> {
        let mut args: Vec<&str> = vec!["--parsable"];
        args.extend(sbatch_args.iter().map(String::as_str));
        let stdout = process::capture_stdout("sbatch", &args)?;
        // `--parsable` prints "<jobid>;<cluster>" or plain "<jobid>".
        let job_id = stdout.split(';').next().unwrap_or(&stdout).trim().to_string();
        Ok(job_id)
    }

    fn job_state(&self, job_id: &str) -> Result<Option<String>> {
        let fields = self.show_job(job_id)?;
        Ok(fields.get("JobState").cloned())
    }

    fn show_job(&self, job_id: &str) -> Result<HashMap<String, String>> {
        let output = process::run("scontrol", &["show", "job", job_id], &HashMap::new())?;
        if !output.status.success() {
            return Ok(HashMap::new());
        }
        let text = String::from_utf8_lossy(&output.stdout);
        let mut blocks = parse_scontrol_output(&text, &self.positional_keys);
        Ok(blocks.pop().unwrap_or_default())
    }

    fn job_id_by_name(&self, name: &str) -> Result<Option<String>> {
        let stdout = process::capture_stdout("squeue", &["--noheader", "--format=%i", "--name", name])?;
        Ok(stdout.lines().next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
    }

    fn cancel(&self, job_id: &str) -> Result<()> {
        process::run_checked("scancel", &[job_id], &HashMap::new())?;
        Ok(())
    }

    fn is_available(&self) -> bool {
        process::capture_stdout("sinfo", &["--noheader"]).is_ok()
    }
}

/// Parses the `key=value` blocks emitted by `scontrol show job [<id>]`.
///
/// Each job occupies a run of lines with no blank line between them; jobs
/// are separated by one or more blank lines. Within a block, tokens are
/// whitespace-separated `key=value` pairs, except that a value may itself
/// contain whitespace (e.g. `Command=/bin/bash -c "a b"`) — any token that
/// does not itself look like `key=value` is treated as a continuation of
/// the previous value. `positional_keys` is consulted only as a hint for
/// which keys are expected to do this; the scanner behaves the same either
/// way, since the shape of the text already disambiguates it.
pub fn parse_scontrol_output(text: &str, positional_keys: &[String]) -> Vec<HashMap<String, String>> {
    let _ = positional_keys; // kept for signature parity with Config's allow-list knob
    let mut blocks = Vec::new();
    let mut current: HashMap<String, String> = HashMap::new();
    let mut last_key: Option<String> = None;

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
                last_key = None;
            }
            continue;
        }
        for token in line.split_whitespace() {
            if let Some((key, value)) = split_key_value(token) {
                current.insert(key.to_string(), value.to_string());
                last_key = Some(key.to_string());
            } else if let Some(ref key) = last_key {
                let entry = current.entry(key.clone()).or_default();
                entry.push(' ');
                entry.push_str(token);
            }
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

fn split_key_value(token: &str) -> Option<(&str, &str)> {
    let eq = token.find('=')?;
    let (key, rest) = token.split_at(eq);
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':') {
        return None;
    }
    Some((key, &rest[1..]))
}

/// Jobs stuck on a dead-dependency state will never run; the monitor should
/// cancel and mark them failed rather than waiting out the full retry
/// budget. Mirrors `slurm_queue.py`'s `HACK_KILL_BROKEN_JOBS` pass.
pub fn is_dead_dependency_state(state: &str) -> bool {
    DEAD_DEPENDENCY_STATES.contains(&state)
}

/// Cancels any job in `job_ids` whose scheduler state is dead-dependency,
/// logging each one it kills. Returns the ids it canceled.
pub fn garbage_collect_broken_jobs(client: &dyn SchedulerClient, job_ids: &[String]) -> Result<Vec<String>> {
    let mut killed = Vec::new();
    for job_id in job_ids {
        if let Some(state) = client.job_state(job_id)? {
            if is_dead_dependency_state(&state) {
                warn!(job_id, state, "canceling job stuck on unsatisfiable dependency");
                client.cancel(job_id)?;
                killed.push(job_id.clone());
            }
        }
    }
    Ok(killed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "JobId=123 JobName=build_step UserId=alice(1000) GroupId=alice(1000)\n   \
        Priority=100 Nice=0 Account=default QOS=normal\n   \
        JobState=RUNNING Reason=None Dependency=(null)\n   \
        WorkDir=/home/alice/project StdOut=/home/alice/project/out.log\n\n\
        JobId=124 JobName=next_step UserId=alice(1000) GroupId=alice(1000)\n   \
        JobState=PENDING Reason=Dependency\n";

    #[test]
    fn parses_multiple_job_blocks() {
        let blocks = parse_scontrol_output(SAMPLE, &[]);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].get("JobId").map(String::as_str), Some("123"));
        assert_eq!(blocks[0].get("JobState").map(String::as_str), Some("RUNNING"));
        assert_eq!(blocks[1].get("JobId").map(String::as_str), Some("124"));
    }

    #[test]
    fn keeps_values_with_embedded_parens_intact() {
        let blocks = parse_scontrol_output(SAMPLE, &[]);
        assert_eq!(blocks[0].get("UserId").map(String::as_str), Some("alice(1000)"));
    }

    #[test]
    fn dead_dependency_state_is_detected() {
        assert!(is_dead_dependency_state("DependencyNeverSatisfied"));
        assert!(!is_dead_dependency_state("RUNNING"));
    }

    #[test]
    fn split_key_value_rejects_non_key_tokens() {
        assert_eq!(split_key_value("JobState=RUNNING"), Some(("JobState", "RUNNING")));
        assert_eq!(split_key_value("not-a-kv-pair"), None);
    }
}
