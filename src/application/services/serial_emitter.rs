//! Whole-script assembly for the serial backend.
//!
//! Grounded on `cmd_queue/serial_queue.py::SerialQueue.finalize_text` and
//! `order_jobs`.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::application::services::bash_emitter::{emit_job_fragment, JobHooks};
use crate::application::services::graph_builder::JobGraph;
use crate::domain::entities::Queue;
use crate::domain::errors::QueueResult;
use crate::domain::value_objects::Tags;

/// Emits the ordering a serial worker should run its jobs in: submission
/// order if it is already topological, otherwise a minimal reordering
/// (generation-by-generation, submission order preserved within a
/// generation).
pub fn order_jobs(queue: &Queue) -> QueueResult<Vec<usize>> {
    let graph = JobGraph::build(queue)?;
    let ordered_names = graph.topological_order();
    Ok(ordered_names.iter().map(|name| queue.named_jobs[*name]).collect())
}

pub(crate) const PASS_HOOK: &str = "(( _CMD_QUEUE_NUM_PASSED=_CMD_QUEUE_NUM_PASSED+1 )) || true";
pub(crate) const FAIL_HOOK: &str = "(( _CMD_QUEUE_NUM_FAILED=_CMD_QUEUE_NUM_FAILED+1 )) || true";
pub(crate) const SKIP_HOOK: &str = "(( _CMD_QUEUE_NUM_SKIPPED=_CMD_QUEUE_NUM_SKIPPED+1 )) || true";

/// Assembles the full serial-backend bash script.
pub fn finalize_text(
    queue: &Queue,
    with_status: bool,
    with_guards: bool,
    exclude_tags: &Tags,
) -> QueueResult<String> {
    let order = order_jobs(queue)?;
    let total = queue.num_real_jobs;

    let mut script = vec!["#!/bin/bash".to_string(), "# Written by jobweaver 0.1.0".to_string()];

    if with_guards {
        script.push("set -e".to_string());
    }

    if with_status {
        script.push("# Init state to keep track of job progress".to_string());
        script.push("(( _CMD_QUEUE_NUM_FAILED=0 )) || true".to_string());
        script.push("(( _CMD_QUEUE_NUM_PASSED=0 )) || true".to_string());
        script.push("(( _CMD_QUEUE_NUM_SKIPPED=0 )) || true".to_string());
        script.push(format!("_CMD_QUEUE_TOTAL={total}"));
        script.push("_CMD_QUEUE_STATUS=\"\"".to_string());
    }

    let mut old_status: Option<&str> = None;
    let mark_status = |status: &'static str, script: &mut Vec<String>, old: &mut Option<&'static str>| {
        if !with_status {
            return;
        }
        if *old != Some(status) {
            script.push(format!("_CMD_QUEUE_STATUS=\"{status}\""));
        }
        *old = Some(status);
        let dump = crate::infrastructure::status_io::bash_json_dump(
            &[
                crate::infrastructure::status_io::JsonFmtPart::new("status", "\"%s\"", "$_CMD_QUEUE_STATUS"),
                crate::infrastructure::status_io::JsonFmtPart::new("passed", "%d", "$_CMD_QUEUE_NUM_PASSED"),
                crate::infrastructure::status_io::JsonFmtPart::new("failed", "%d", "$_CMD_QUEUE_NUM_FAILED"),
                crate::infrastructure::status_io::JsonFmtPart::new("skipped", "%d", "$_CMD_QUEUE_NUM_SKIPPED"),
                crate::infrastructure::status_io::JsonFmtPart::new("total", "%d", "$_CMD_QUEUE_TOTAL"),
                crate::infrastructure::status_io::JsonFmtPart::new("name", "\"%s\"", queue.name.clone()),
                crate::infrastructure::status_io::JsonFmtPart::new("rootid", "\"%s\"", queue.root_id.clone()),
            ],
            &queue.state_fpath(),
        );
        script.push("# Update queue status".to_string());
        script.push(dump);
    };

    mark_status("init", &mut script, &mut old_status);

    if !queue.environ.is_empty() {
        script.push("#".to_string());
        script.push("# Environment".to_string());
        mark_status("set_environ", &mut script, &mut old_status);
        if with_guards {
            script.push("set -x".to_string());
        }
        let mut exports: Vec<_> = queue.environ.iter().collect();
        exports.sort_by(|a, b| a.0.cmp(b.0));
        for (k, v) in exports {
            script.push(format!("export {k}=\"{v}\""));
        }
        if with_guards {
            script.push("{ set +x; } 2>/dev/null".to_string());
        }
    }

    if let Some(cwd) = &queue.cwd {
        script.push("#".to_string());
        script.push("# Working Directory".to_string());
        script.push(format!("cd {cwd}"));
    }

    if !queue.header_commands.is_empty() {
        script.push("#".to_string());
        script.push("# Header commands".to_string());
        for command in &queue.header_commands {
            if with_guards {
                script.push("set -x".to_string());
            }
            script.push(command.clone());
            if with_guards {
                script.push("{ set +x; } 2>/dev/null".to_string());
            }
        }
    }

    if !queue.jobs.is_empty() {
        script.push(String::new());
        script.push("# ----".to_string());
        script.push("# Jobs".to_string());
        script.push("# ----".to_string());
        script.push(String::new());

        let dep_paths: HashMap<usize, Vec<PathBuf>> = order
            .iter()
            .map(|&idx| {
                let job = &queue.jobs[idx];
                let paths = job
                    .depends
                    .iter()
                    .map(|dep| queue.jobs[queue.named_jobs[dep]].pass_fpath())
                    .collect();
                (idx, paths)
            })
            .collect();

        let mut num = 0usize;
        for &idx in &order {
            let job = &queue.jobs[idx];
            if !exclude_tags.is_empty() && exclude_tags.intersects(&job.tags) {
                continue;
            }

            if job.bookkeeper {
                script.push(emit_job_fragment(job, &dep_paths[&idx], with_status, with_guards, &JobHooks::default()));
                continue;
            }

            if with_status {
                script.push(String::new());
                script.push("#".to_string());
                script.push("# <job>".to_string());
            }

            mark_status("run", &mut script, &mut old_status);
            script.push(format!("#\n### Command {} / {} - {}", num + 1, total, job.name));

            let hooks = JobHooks {
                on_pass: vec![PASS_HOOK.to_string()],
                on_fail: vec![FAIL_HOOK.to_string()],
                on_skip: vec![SKIP_HOOK.to_string()],
            };
            script.push(emit_job_fragment(job, &dep_paths[&idx], with_status, with_guards, &hooks));

            if with_status {
                script.push("# </job>".to_string());
                script.push("#".to_string());
                script.push(String::new());
            }
            num += 1;
        }
    }

    mark_status("done", &mut script, &mut old_status);

    if with_status {
        script.push("# Display final status of this serial queue".to_string());
        script.push("echo \"Command Queue Final Status:\"".to_string());
        script.push(format!("cat \"{}\"", queue.state_fpath().display()));
    }

    if with_guards {
        script.push("set +e".to_string());
    }

    Ok(script.join("\n"))
}
