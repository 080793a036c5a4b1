//! Multi-session planner.
//!
//! Splits one queue's DAG across `N` linear worker sub-queues plus
//! wait/signal semaphore bookkeeping so that running all sub-queues
//! concurrently still respects every original dependency edge. Grounded on
//! `cmd_queue/tmux_queue.py::TMUXMultiQueue.finalize_text` (rank layering,
//! `balanced_number_partitioning` bin-packing, semaphore insertion, GPU
//! round-robin via `CUDA_VISIBLE_DEVICES`) and
//! `cmd_queue/util/util_tmux.py::tmux_new_session`/`tmux_send`
//! (session-driver emission).
//!
//! **Rank formula.** Rather than a transitive-reduction / cut-node /
//! condensation construction, this planner assigns `rank(v) = 1 +
//! max(rank(u) for u in depends(v))` (longest-path layering over the full
//! graph, falling back to `0` for a root). Longest-path layering keeps the
//! correctness property that matters directly: every edge `u -> v` has
//! `rank(u) < rank(v)` by construction, so a dependency is always in a
//! strictly earlier rank than its dependent, and chains that this formula
//! doesn't keep in one bin simply pay for an extra semaphore hop rather
//! than becoming incorrect.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::application::services::bash_emitter::{emit_job_fragment, JobHooks};
use crate::application::services::partition::balanced_number_partitioning;
use crate::application::services::serial_emitter::{FAIL_HOOK, PASS_HOOK, SKIP_HOOK};
use crate::domain::entities::{Job, Queue};
use crate::domain::errors::QueueResult;
use crate::infrastructure::status_io::{bash_json_dump, JsonFmtPart};

/// One worker's linear sub-queue plus the terminal-session id it will run
/// under.
pub struct WorkerQueue {
    pub index: usize,
    pub session_id: String,
    pub script_path: PathBuf,
    pub queue: Queue,
}

/// The full output of planning one source queue across `N` workers.
pub struct Plan {
    pub workers: Vec<WorkerQueue>,
    pub driver_path: PathBuf,
    pub num_ranks: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PlannerOptions {
    pub num_workers: usize,
    /// GPU indices distributed round-robin across workers via
    /// `CUDA_VISIBLE_DEVICES`.
    pub gpu_ids: Vec<u32>,
    pub with_status: bool,
    pub with_guards: bool,
}

fn worker_dir(queue: &Queue) -> PathBuf {
    queue.dpath.join(&queue.path_id)
}

fn worker_script_path(queue: &Queue, idx: usize) -> PathBuf {
    worker_dir(queue).join(format!("queue_{}_{}_{}.sh", queue.name, idx, queue.root_id))
}

/// `<root>/<queue pathid>/run_queues_<name>.sh`.
pub fn driver_script_path(queue: &Queue) -> PathBuf {
    worker_dir(queue).join(format!("run_queues_{}.sh", queue.name))
}

fn session_id(queue: &Queue, prefix: &str, idx: usize) -> String {
    format!("{prefix}{}_{}_{}", queue.name, idx, queue.root_id)
}

fn signal_fpath(queue: &Queue, rank: usize, worker: usize) -> PathBuf {
    worker_dir(queue).join("semaphores").join(format!("rank{rank}_worker{worker}.signal"))
}

/// Longest-path rank of every real job in `queue`, keyed by job index.
/// Assumes `queue.jobs` is already acyclic (callers build a [`JobGraph`]
/// first to confirm this, as `Queue::submit`'s own forward-reference check
/// already guarantees for anything built through the public API).
fn compute_ranks(queue: &Queue) -> Vec<usize> {
    let mut rank = vec![0usize; queue.jobs.len()];
    for (idx, job) in queue.jobs.iter().enumerate() {
        let r = job
            .depends
            .iter()
            .filter_map(|d| queue.named_jobs.get(d))
            .map(|&dep_idx| rank[dep_idx] + 1)
            .max()
            .unwrap_or(0);
        rank[idx] = r;
    }
    rank
}

/// Groups job indices by rank, each group sorted ascending by submission
/// index (job indices already are submission indices).
fn group_by_rank(ranks: &[usize]) -> Vec<Vec<usize>> {
    let max_rank = ranks.iter().copied().max().unwrap_or(0);
    let mut groups = vec![Vec::new(); max_rank + 1];
    for (idx, &r) in ranks.iter().enumerate() {
        groups[r].push(idx);
    }
    groups
}

/// Produces the full multi-session plan for `queue`.
pub fn plan(queue: &Queue, options: &PlannerOptions, session_prefix: &str) -> QueueResult<Plan> {
    let num_workers = options.num_workers.max(1);

    let ranks = compute_ranks(queue);
    let rank_groups = group_by_rank(&ranks);

    let mut worker_queues: Vec<Queue> = (0..num_workers)
        .map(|w| {
            let mut wq = Queue::new(format!("{}_{}", queue.name, w), queue.dpath.clone());
            wq.root_id = queue.root_id.clone();
            wq.path_id = queue.path_id.clone();
            wq.environ = queue.environ.clone();
            wq.cwd = queue.cwd.clone();
            wq.header_commands = queue.header_commands.clone();
            if !options.gpu_ids.is_empty() {
                let gpu = options.gpu_ids[w % options.gpu_ids.len()];
                wq.environ.insert("CUDA_VISIBLE_DEVICES".to_string(), gpu.to_string());
            }
            wq
        })
        .collect();

    let mut bookkeeper_seq = 0usize;

    if num_workers == 1 {
        for group in &rank_groups {
            for &idx in group {
                worker_queues[0].push_raw(queue.jobs[idx].clone());
            }
        }
    } else {
        for (rank, group) in rank_groups.iter().enumerate() {
            let weights: Vec<f64> = group.iter().map(|_| 1.0).collect();
            let mut bins = balanced_number_partitioning(&weights, num_workers);
            for bin in &mut bins {
                bin.sort_by_key(|&pos| group[pos]);
            }

            if rank > 0 {
                for (w, wq) in worker_queues.iter_mut().enumerate() {
                    let wait_cmd = wait_semaphore_command(queue, rank - 1, num_workers);
                    wq.push_raw(Job::bookkeeping(wait_cmd, &queue.job_info_root(), bookkeeper_seq));
                    bookkeeper_seq += 1;
                    let _ = w;
                }
            }

            for (w, wq) in worker_queues.iter_mut().enumerate() {
                for &pos in &bins[w] {
                    let job_idx = group[pos];
                    wq.push_raw(queue.jobs[job_idx].clone());
                }
            }

            for (w, wq) in worker_queues.iter_mut().enumerate() {
                let signal_path = signal_fpath(queue, rank, w);
                let signal_cmd = format!(
                    "mkdir -p {} && touch {}",
                    signal_path.parent().map(|p| p.display().to_string()).unwrap_or_else(|| ".".to_string()),
                    signal_path.display(),
                );
                wq.push_raw(Job::bookkeeping(signal_cmd, &queue.job_info_root(), bookkeeper_seq));
                bookkeeper_seq += 1;
            }
        }
    }

    let workers: Vec<WorkerQueue> = worker_queues
        .into_iter()
        .enumerate()
        .map(|(idx, wq)| WorkerQueue {
            index: idx,
            session_id: session_id(queue, session_prefix, idx),
            script_path: worker_script_path(queue, idx),
            queue: wq,
        })
        .collect();

    Ok(Plan {
        driver_path: driver_script_path(queue),
        num_ranks: rank_groups.len(),
        workers,
    })
}

fn wait_semaphore_command(queue: &Queue, prev_rank: usize, num_workers: usize) -> String {
    let checks: Vec<String> = (0..num_workers)
        .map(|w| format!("[ ! -f {} ]", signal_fpath(queue, prev_rank, w).display()))
        .collect();
    format!("while {}; do sleep 1; done", checks.join(" || "))
}

/// Assembles one worker's full bash script.
pub fn finalize_worker_text(worker_queue: &Queue, global_jobs: &HashMap<String, Job>, with_status: bool, with_guards: bool) -> String {
    let total = worker_queue.num_real_jobs;
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
        let dump = bash_json_dump(
            &[
                JsonFmtPart::new("status", "\"%s\"", "$_CMD_QUEUE_STATUS"),
                JsonFmtPart::new("passed", "%d", "$_CMD_QUEUE_NUM_PASSED"),
                JsonFmtPart::new("failed", "%d", "$_CMD_QUEUE_NUM_FAILED"),
                JsonFmtPart::new("skipped", "%d", "$_CMD_QUEUE_NUM_SKIPPED"),
                JsonFmtPart::new("total", "%d", "$_CMD_QUEUE_TOTAL"),
                JsonFmtPart::new("name", "\"%s\"", worker_queue.name.clone()),
                JsonFmtPart::new("rootid", "\"%s\"", worker_queue.root_id.clone()),
            ],
            &worker_queue.state_fpath(),
        );
        script.push("# Update queue status".to_string());
        script.push(dump);
    };

    mark_status("init", &mut script, &mut old_status);

    if !worker_queue.environ.is_empty() {
        script.push("#".to_string());
        script.push("# Environment".to_string());
        mark_status("set_environ", &mut script, &mut old_status);
        if with_guards {
            script.push("set -x".to_string());
        }
        let mut exports: Vec<_> = worker_queue.environ.iter().collect();
        exports.sort_by(|a, b| a.0.cmp(b.0));
        for (k, v) in exports {
            script.push(format!("export {k}=\"{v}\""));
        }
        if with_guards {
            script.push("{ set +x; } 2>/dev/null".to_string());
        }
    }

    if let Some(cwd) = &worker_queue.cwd {
        script.push("#".to_string());
        script.push("# Working Directory".to_string());
        script.push(format!("cd {cwd}"));
    }

    if !worker_queue.header_commands.is_empty() {
        script.push("#".to_string());
        script.push("# Header commands".to_string());
        for command in &worker_queue.header_commands {
            if with_guards {
                script.push("set -x".to_string());
            }
            script.push(command.clone());
            if with_guards {
                script.push("{ set +x; } 2>/dev/null".to_string());
            }
        }
    }

    if !worker_queue.jobs.is_empty() {
        script.push(String::new());
        script.push("# ----".to_string());
        script.push("# Jobs".to_string());
        script.push("# ----".to_string());
        script.push(String::new());

        let mut num = 0usize;
        for job in &worker_queue.jobs {
            let dep_paths: Vec<PathBuf> = job
                .depends
                .iter()
                .filter_map(|dep| global_jobs.get(dep).or_else(|| worker_queue.job_by_name(dep)))
                .map(|j| j.pass_fpath())
                .collect();

            if job.bookkeeper {
                script.push(emit_job_fragment(job, &dep_paths, with_status, with_guards, &JobHooks::default()));
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
            script.push(emit_job_fragment(job, &dep_paths, with_status, with_guards, &hooks));

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
        script.push("# Display final status of this worker queue".to_string());
        script.push("echo \"Command Queue Final Status:\"".to_string());
        script.push(format!("cat \"{}\"", worker_queue.state_fpath().display()));
    }

    if with_guards {
        script.push("set +e".to_string());
    }

    script.join("\n")
}

/// Emits the top-level driver script: one detached session + `send_keys`
/// per worker.
pub fn finalize_driver_text(plan: &Plan) -> String {
    let mut script = vec!["#!/bin/bash".to_string(), "# Written by jobweaver 0.1.0".to_string()];
    script.push("# Launches one detached terminal session per worker sub-queue.".to_string());
    for worker in &plan.workers {
        script.push(format!("tmux new-session -d -s {} bash", worker.session_id));
        script.push(format!(
            "tmux send-keys -t {} \"bash {}\" Enter",
            worker.session_id,
            worker.script_path.display(),
        ));
    }
    script.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn diamond_queue() -> Queue {
        let mut queue = Queue::new("q", "/tmp/jobweaver-test");
        queue.submit(Job::new("a", "true", Path::new("/tmp/jobweaver-test"))).unwrap();
        let mut b = Job::new("b", "true", Path::new("/tmp/jobweaver-test"));
        b.depends = vec!["a".to_string()];
        queue.submit(b).unwrap();
        let mut c = Job::new("c", "true", Path::new("/tmp/jobweaver-test"));
        c.depends = vec!["a".to_string()];
        queue.submit(c).unwrap();
        let mut d = Job::new("d", "true", Path::new("/tmp/jobweaver-test"));
        d.depends = vec!["b".to_string(), "c".to_string()];
        queue.submit(d).unwrap();
        queue
    }

    #[test]
    fn single_worker_flattens_to_one_queue_with_no_semaphores() {
        let queue = diamond_queue();
        let options = PlannerOptions { num_workers: 1, ..Default::default() };
        let plan = plan(&queue, &options, "cmdq_").unwrap();
        assert_eq!(plan.workers.len(), 1);
        assert_eq!(plan.workers[0].queue.num_real_jobs, 4);
        assert!(plan.workers[0].queue.jobs.iter().all(|j| !j.bookkeeper));
    }

    #[test]
    fn two_workers_span_three_ranks_for_diamond() {
        let queue = diamond_queue();
        let options = PlannerOptions { num_workers: 2, ..Default::default() };
        let plan = plan(&queue, &options, "cmdq_").unwrap();
        assert_eq!(plan.num_ranks, 3);
        assert_eq!(plan.workers.len(), 2);

        let total_real: usize = plan.workers.iter().map(|w| w.queue.num_real_jobs).sum();
        assert_eq!(total_real, 4);
    }

    #[test]
    fn binary_fan_in_produces_three_ranks() {
        let mut queue = Queue::new("q", "/tmp/jobweaver-test");
        for leaf in ["l1", "l2", "l3", "l4"] {
            queue.submit(Job::new(leaf, "true", Path::new("/tmp/jobweaver-test"))).unwrap();
        }
        let mut m1 = Job::new("m1", "true", Path::new("/tmp/jobweaver-test"));
        m1.depends = vec!["l1".to_string(), "l2".to_string()];
        queue.submit(m1).unwrap();
        let mut m2 = Job::new("m2", "true", Path::new("/tmp/jobweaver-test"));
        m2.depends = vec!["l3".to_string(), "l4".to_string()];
        queue.submit(m2).unwrap();
        let mut root = Job::new("root", "true", Path::new("/tmp/jobweaver-test"));
        root.depends = vec!["m1".to_string(), "m2".to_string()];
        queue.submit(root).unwrap();

        let options = PlannerOptions { num_workers: 2, ..Default::default() };
        let plan = plan(&queue, &options, "cmdq_").unwrap();
        assert_eq!(plan.num_ranks, 3);
    }

    #[test]
    fn gpu_ids_are_assigned_round_robin() {
        let queue = diamond_queue();
        let options = PlannerOptions {
            num_workers: 2,
            gpu_ids: vec![0, 1, 2],
            ..Default::default()
        };
        let plan = plan(&queue, &options, "cmdq_").unwrap();
        assert_eq!(plan.workers[0].queue.environ.get("CUDA_VISIBLE_DEVICES"), Some(&"0".to_string()));
        assert_eq!(plan.workers[1].queue.environ.get("CUDA_VISIBLE_DEVICES"), Some(&"1".to_string()));
    }

    #[test]
    fn bookkeeper_jobs_do_not_count_toward_num_real_jobs() {
        let queue = diamond_queue();
        let options = PlannerOptions { num_workers: 2, ..Default::default() };
        let plan = plan(&queue, &options, "cmdq_").unwrap();
        for worker in &plan.workers {
            let bookkeeper_count = worker.queue.jobs.iter().filter(|j| j.bookkeeper).count();
            let real_count = worker.queue.jobs.iter().filter(|j| !j.bookkeeper).count();
            assert_eq!(worker.queue.num_real_jobs, real_count);
            let _ = bookkeeper_count;
        }
    }

    #[test]
    fn worker_session_ids_share_fixed_prefix() {
        let queue = diamond_queue();
        let options = PlannerOptions { num_workers: 2, ..Default::default() };
        let plan = plan(&queue, &options, "cmdq_").unwrap();
        for worker in &plan.workers {
            assert!(worker.session_id.starts_with("cmdq_q_"));
        }
    }

    #[test]
    fn finalize_worker_text_contains_the_shebang() {
        let queue = diamond_queue();
        let options = PlannerOptions { num_workers: 1, ..Default::default() };
        let plan = plan(&queue, &options, "cmdq_").unwrap();
        let global_jobs: HashMap<String, Job> =
            queue.jobs.iter().map(|j| (j.name.clone(), j.clone())).collect();
        let text = finalize_worker_text(&plan.workers[0].queue, &global_jobs, true, true);
        assert!(text.starts_with("#!/bin/bash"));
        assert!(text.contains("_CMD_QUEUE_TOTAL=4"));
    }

    #[test]
    fn driver_text_sends_keys_to_every_worker() {
        let queue = diamond_queue();
        let options = PlannerOptions { num_workers: 2, ..Default::default() };
        let plan = plan(&queue, &options, "cmdq_").unwrap();
        let driver = finalize_driver_text(&plan);
        assert_eq!(driver.matches("tmux new-session").count(), 2);
        assert_eq!(driver.matches("tmux send-keys").count(), 2);
    }
}
