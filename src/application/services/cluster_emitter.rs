//! Cluster (Slurm) submission emitter.
//!
//! Grounded on `cmd_queue/slurm_queue.py::SlurmJob._build_sbatch_args`
//! (token ordering, `afterok:` dependency clause, `--wrap`) and
//! `SlurmQueue.finalize_text` (per-job capture line plus the trailing
//! job-id dump).

use std::collections::HashMap;
use std::path::PathBuf;

use crate::application::services::graph_builder::JobGraph;
use crate::domain::entities::{BackendOptions, Job, Queue};
use crate::domain::errors::QueueResult;
use crate::domain::value_objects::{BeginTime, Gpus};

/// One job's captured shell variable name, e.g. `JOB_000`.
fn capture_var(index: usize) -> String {
    format!("JOB_{index:03}")
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Builds the `sbatch` token list for one job.
/// `dep_vars` maps a dependency job name to its already-captured shell
/// variable name, used to build the `afterok:` clause; a dependency not yet
/// captured (ran in an earlier invocation, e.g. after `cleanup`) falls back
/// to a `$(squeue ...)` name lookup the shell performs at submit time.
fn build_sbatch_args(job: &Job, log_dir: &std::path::Path, dep_vars: &HashMap<String, String>) -> Vec<String> {
    let mut args = vec![format!("--job-name={}", job.name)];

    if let Some(cpus) = job.resources.cpus {
        args.push(format!("--cpus-per-task={cpus}"));
    }
    if let Some(mem) = job.resources.mem_megabytes {
        args.push(format!("--mem={mem}"));
    }
    if let Some(gpus) = &job.resources.gpus {
        match gpus {
            Gpus::Count(n) => args.push(format!("--gpus={n}")),
            Gpus::Gres(spec) => args.push(format!("--gres={spec}")),
        }
    }
    if let Some(begin) = &job.resources.begin {
        match begin {
            BeginTime::OffsetSeconds(secs) => args.push(format!("--begin=now+{secs}")),
            BeginTime::Literal(lit) => args.push(format!("--begin={lit}")),
        }
    }
    if let Some(partition) = &job.resources.partition {
        args.push(format!("--partition={partition}"));
    }
    args.push(format!("--output={}", log_dir.join(format!("{}.log", job.path_id)).display()));

    if let BackendOptions::Cluster { sbatch_opts, flags } = &job.options {
        let mut opts: Vec<_> = sbatch_opts.iter().collect();
        opts.sort_by_key(|(k, _)| k.clone());
        for (k, v) in opts {
            args.push(format!("--{}={}", k.replace('_', "-"), v));
        }
        for flag in flags {
            args.push(format!("--{}", flag.replace('_', "-")));
        }
    }

    if !job.depends.is_empty() {
        let clause_parts: Vec<String> = job
            .depends
            .iter()
            .map(|dep| {
                dep_vars
                    .get(dep)
                    .map(|var| format!("${{{var}}}"))
                    .unwrap_or_else(|| format!("$(squeue --noheader --format=%i --name {})", shell_quote(dep)))
            })
            .collect();
        args.push(format!("--dependency=afterok:{}", clause_parts.join(",")));
    }

    args.push(format!("--wrap={}", shell_quote(&job.command)));
    args
}

/// Assembles the full cluster submission script: `mkdir -p <log dir>`, one capture line per job in topological
/// order, then a trailing JSON dump of every captured job id for the
/// monitor.
pub fn finalize_text(queue: &Queue, with_status: bool) -> QueueResult<String> {
    let graph = JobGraph::build(queue)?;
    let order: Vec<usize> = graph.topological_order().iter().map(|name| queue.named_jobs[*name]).collect();

    let log_dir = queue.log_dpath();
    let mut script = vec!["#!/bin/bash".to_string(), "# Written by jobweaver 0.1.0".to_string()];
    script.push(format!("mkdir -p \"{}\"", log_dir.display()));

    let mut dep_vars: HashMap<String, String> = HashMap::new();
    for (capture_index, &idx) in order.iter().enumerate() {
        let job = &queue.jobs[idx];
        let var = capture_var(capture_index);
        let tokens = build_sbatch_args(job, &log_dir, &dep_vars);
        let quoted: Vec<String> = tokens.iter().map(|t| shell_quote(t)).collect();
        script.push(format!("{var}=$(sbatch --parsable {})", quoted.join(" ")));
        dep_vars.insert(job.name.clone(), var.clone());
    }

    if with_status {
        let parts: Vec<OwnedJsonFmtPart> = order
            .iter()
            .enumerate()
            .map(|(capture_index, &idx)| {
                let job = &queue.jobs[idx];
                OwnedJsonFmtPart::new(job.name.clone(), "\"%s\"", format!("${}", capture_var(capture_index)))
            })
            .collect();
        let id_dump_path = job_ids_fpath(queue);
        script.push(bash_json_dump_owned(&parts, &id_dump_path));
    }

    Ok(script.join("\n"))
}

/// `<root>/<pathid>/job_ids_<rootid>.json`, the capture dump the monitor
/// reads back.
pub fn job_ids_fpath(queue: &Queue) -> PathBuf {
    queue.dpath.join(&queue.path_id).join(format!("job_ids_{}.json", queue.root_id))
}

/// Classification of a cluster job's scheduler state into the backend-
/// agnostic vocabulary the monitor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterJobState {
    Pending,
    Running,
    Passed,
    Failed,
    Skipped,
    Unknown,
}

pub fn classify_scheduler_state(state: &str) -> ClusterJobState {
    match state {
        "PENDING" | "CONFIGURING" => ClusterJobState::Pending,
        "RUNNING" | "COMPLETING" => ClusterJobState::Running,
        "COMPLETED" => ClusterJobState::Passed,
        "FAILED" | "TIMEOUT" | "OUT_OF_MEMORY" | "NODE_FAIL" | "BOOT_FAIL" => ClusterJobState::Failed,
        "CANCELLED" | "DEADLINE" | "DependencyNeverSatisfied" => ClusterJobState::Skipped,
        _ => ClusterJobState::Unknown,
    }
}

// `JsonFmtPart`/`bash_json_dump` take `&'static str` keys; the cluster
// emitter's job-id dump needs per-job (owned) keys, so this small
// owned-key variant lives here rather than forcing a signature change on
// every other call site that only ever needs literals.
pub struct OwnedJsonFmtPart {
    pub key: String,
    pub format: &'static str,
    pub expr: String,
}

impl OwnedJsonFmtPart {
    pub fn new(key: impl Into<String>, format: &'static str, expr: impl Into<String>) -> Self {
        Self { key: key.into(), format, expr: expr.into() }
    }
}

fn bash_json_dump_owned(parts: &[OwnedJsonFmtPart], fpath: &std::path::Path) -> String {
    let body: Vec<String> = parts.iter().map(|p| format!("\"{}\": {}", p.key, p.format)).collect();
    let args: Vec<String> = parts.iter().map(|p| format!("\"{}\"", p.expr)).collect();
    let printf_body = format!("'{{{}}}\\n'", body.join(", "));
    let printf_part = format!("printf {printf_body} \\\n    {}", args.join(" "));
    format!("{printf_part} \\\n    > {}", fpath.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn queue_with_mem_and_dep() -> Queue {
        let mut queue = Queue::new("q", "/tmp/jobweaver-test");
        let mut a = Job::new("a", "echo a", Path::new("/tmp/jobweaver-test"));
        a.resources.mem_megabytes = Some(10240);
        a.resources.cpus = Some(4);
        queue.submit(a).unwrap();
        let mut b = Job::new("b", "echo b", Path::new("/tmp/jobweaver-test"));
        b.depends = vec!["a".to_string()];
        queue.submit(b).unwrap();
        queue
    }

    #[test]
    fn mem_and_cpus_become_sbatch_tokens() {
        let job = &queue_with_mem_and_dep().jobs[0];
        let args = build_sbatch_args(job, Path::new("/tmp/jobweaver-test/logs"), &HashMap::new());
        assert!(args.contains(&"--mem=10240".to_string()));
        assert!(args.contains(&"--cpus-per-task=4".to_string()));
    }

    #[test]
    fn dependency_references_captured_shell_variable() {
        let queue = queue_with_mem_and_dep();
        let mut dep_vars = HashMap::new();
        dep_vars.insert("a".to_string(), "JOB_000".to_string());
        let b = queue.job_by_name("b").unwrap();
        let args = build_sbatch_args(b, Path::new("/tmp/jobweaver-test/logs"), &dep_vars);
        assert!(args.iter().any(|a| a == "--dependency=afterok:${JOB_000}"));
    }

    #[test]
    fn finalize_text_captures_every_job_in_topological_order() {
        let queue = queue_with_mem_and_dep();
        let text = finalize_text(&queue, true).unwrap();
        assert!(text.contains("JOB_000=$(sbatch --parsable"));
        assert!(text.contains("JOB_001=$(sbatch --parsable"));
        assert!(text.contains("mkdir -p"));
    }

    #[test]
    fn unknown_cluster_options_never_leaked_into_sbatch_args() {
        let mut queue = Queue::new("q", "/tmp/jobweaver-test");
        let mut job = Job::new("a", "echo a", Path::new("/tmp/jobweaver-test"));
        job.options = BackendOptions::cluster(
            [("bogus".to_string(), "x".to_string())],
            ["nonsense".to_string()],
        );
        queue.submit(job).unwrap();
        let args = build_sbatch_args(&queue.jobs[0], Path::new("/tmp"), &HashMap::new());
        assert!(!args.iter().any(|a| a.contains("bogus") || a.contains("nonsense")));
    }

    #[test]
    fn scheduler_states_classify_into_backend_agnostic_vocabulary() {
        assert_eq!(classify_scheduler_state("COMPLETED"), ClusterJobState::Passed);
        assert_eq!(classify_scheduler_state("FAILED"), ClusterJobState::Failed);
        assert_eq!(classify_scheduler_state("DependencyNeverSatisfied"), ClusterJobState::Skipped);
        assert_eq!(classify_scheduler_state("RUNNING"), ClusterJobState::Running);
        assert_eq!(classify_scheduler_state("WEIRD_STATE"), ClusterJobState::Unknown);
    }
}
