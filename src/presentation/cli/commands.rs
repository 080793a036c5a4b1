//! CLI command implementations.
//!
//! Each command is a thin wrapper: parse/persist rows, build a
//! [`crate::domain::entities::Queue`], then delegate to the library for
//! everything else (graph validation, emission, execution, monitoring).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::application::services::{availability, cluster_emitter, monitor, planner, serial_emitter};
use crate::config::Config;
use crate::domain::entities::Job;
use crate::domain::value_objects::{BackendKind, Tags};
use crate::infrastructure::cluster::{self, SchedulerClient, SlurmClient};
use crate::infrastructure::executor;
use crate::infrastructure::sessions::{self, SessionManager, TmuxSessionManager};
use crate::presentation::cli::builder::build_queue;
use crate::presentation::cli::rowstore::{self, Row};

/// `jobweaver new <name>`: creates an empty row store.
pub struct NewCommand;

impl NewCommand {
    pub fn execute(store_dir: &Path, name: &str) -> Result<()> {
        let path = rowstore::create(store_dir, name)?;
        info!(queue = name, path = %path.display(), "created queue");
        println!("created queue {name:?} at {}", path.display());
        Ok(())
    }
}

/// `jobweaver submit <name> (--header <line> | --command <cmd> [--name
/// <job-name>] [--depends a,b,c])`: appends one row to an existing store.
pub struct SubmitCommand;

impl SubmitCommand {
    pub fn execute(
        store_dir: &Path,
        name: &str,
        header: Option<String>,
        command: Option<String>,
        job_name: Option<String>,
        depends: Vec<String>,
    ) -> Result<()> {
        let path = rowstore::rows_path(store_dir, name);
        let row = match (header, command) {
            (Some(header), None) => Row::Header { header },
            (None, Some(command)) => Row::Command {
                command,
                name: job_name,
                depends: if depends.is_empty() { None } else { Some(depends) },
            },
            (Some(_), Some(_)) => anyhow::bail!("pass exactly one of --header or --command, not both"),
            (None, None) => anyhow::bail!("pass one of --header or --command"),
        };
        rowstore::append(&path, row)?;
        info!(queue = name, "submitted row");
        println!("submitted row to queue {name:?}");
        Ok(())
    }
}

/// `jobweaver show <name>`: renders the dependency forest and job list
/// without running anything.
pub struct ShowCommand;

impl ShowCommand {
    pub fn execute(store_dir: &Path, run_dir: &Path, name: &str) -> Result<()> {
        let path = rowstore::rows_path(store_dir, name);
        let rows = rowstore::load(&path)?;
        let queue = build_queue(name, run_dir, &rows)?;
        let graph = crate::application::services::JobGraph::build(&queue)
            .context("queue's dependency graph is invalid")?;
        println!("queue {:?} ({} jobs)", queue.name, queue.num_real_jobs);
        println!("{}", graph.print_network_text());
        Ok(())
    }
}

/// `jobweaver run <name> --backend <serial|session|cluster> [...]`.
pub struct RunCommand;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub backend: BackendKind,
    pub num_workers: usize,
    pub gpu_ids: Vec<u32>,
    pub exclude_tags: Tags,
    pub block: bool,
    pub monitor: bool,
}

impl RunCommand {
    pub fn execute(store_dir: &Path, run_dir: &Path, name: &str, options: &RunOptions, config: &Config) -> Result<()> {
        let path = rowstore::rows_path(store_dir, name);
        let rows = rowstore::load(&path)?;
        let queue = build_queue(name, run_dir, &rows)?;

        let sessions_mgr = TmuxSessionManager::new();
        let scheduler = SlurmClient::new(config.scontrol_positional_keys.clone());
        availability::check_availability(options.backend, &sessions_mgr, &scheduler)?;

        match options.backend {
            BackendKind::Serial => Self::run_serial(&queue, options, config),
            BackendKind::Session => Self::run_session(&queue, options, config, &sessions_mgr),
            BackendKind::Cluster => Self::run_cluster(&queue, options, config, &scheduler),
        }
    }

    fn run_serial(queue: &crate::domain::entities::Queue, options: &RunOptions, config: &Config) -> Result<()> {
        let text = serial_emitter::finalize_text(queue, true, true, &options.exclude_tags)?;
        let script_path = queue.fpath();
        executor::write_executable(&script_path, &text)?;
        info!(script = %script_path.display(), "emitted serial script");

        if options.monitor {
            let workers = vec![monitor::WorkerHandle { label: queue.name.clone(), state_fpath: queue.state_fpath() }];
            executor::invoke_foreground(&script_path, false)?;
            Self::run_monitor_loop(&workers, config)?;
        } else {
            let status = executor::invoke_foreground(&script_path, options.block)?;
            if let Some(status) = status {
                if !status.success() {
                    println!("serial queue {:?} finished with a failure; see {}", queue.name, queue.state_fpath().display());
                }
            }
        }
        Ok(())
    }

    fn run_session(
        queue: &crate::domain::entities::Queue,
        options: &RunOptions,
        config: &Config,
        sessions_mgr: &dyn SessionManager,
    ) -> Result<()> {
        let num_workers = if options.num_workers == 0 { 1 } else { options.num_workers };
        let planner_options = planner::PlannerOptions {
            num_workers,
            gpu_ids: options.gpu_ids.clone(),
            with_status: true,
            with_guards: true,
        };
        let plan = planner::plan(queue, &planner_options, &config.session_prefix)?;

        let conflicting = sessions_mgr.list_sessions()?;
        let leftover = sessions::find_conflicting_sessions(&conflicting, &config.session_prefix, &queue.name);
        if !leftover.is_empty() {
            for id in &leftover {
                sessions_mgr.kill_session(id)?;
            }
            info!(count = leftover.len(), "killed leftover sessions from a previous run");
        }

        let global_jobs: HashMap<String, Job> = queue.jobs.iter().map(|j| (j.name.clone(), j.clone())).collect();
        let worker_scripts: Vec<(PathBuf, String)> = plan
            .workers
            .iter()
            .map(|w| (w.script_path.clone(), planner::finalize_worker_text(&w.queue, &global_jobs, true, true)))
            .collect();
        let driver_text = planner::finalize_driver_text(&plan);

        executor::run_multi_session(&plan, &worker_scripts, &plan.driver_path, &driver_text, sessions_mgr)?;
        info!(workers = plan.workers.len(), ranks = plan.num_ranks, "launched multi-session queue");

        if options.monitor {
            let workers: Vec<monitor::WorkerHandle> = plan
                .workers
                .iter()
                .map(|w| monitor::WorkerHandle { label: w.queue.name.clone(), state_fpath: w.queue.state_fpath() })
                .collect();
            Self::run_monitor_loop(&workers, config)?;
        }
        Ok(())
    }

    fn run_cluster(
        queue: &crate::domain::entities::Queue,
        options: &RunOptions,
        config: &Config,
        scheduler: &dyn SchedulerClient,
    ) -> Result<()> {
        let text = cluster_emitter::finalize_text(queue, true)?;
        let script_path = queue.fpath();
        executor::write_executable(&script_path, &text)?;
        executor::invoke_foreground(&script_path, true)?;
        info!(script = %script_path.display(), "submitted cluster jobs");

        if options.monitor {
            let id_path = cluster_emitter::job_ids_fpath(queue);
            Self::run_cluster_monitor(&id_path, config, scheduler)?;
        }
        Ok(())
    }

    fn run_monitor_loop(workers: &[monitor::WorkerHandle], config: &Config) -> Result<()> {
        let result = monitor::run(
            workers,
            config.status_read_attempts,
            config.status_read_interval,
            config.monitor_refresh_interval,
            monitor::CancelAction::KillSessions,
            &|| false,
        )?;
        if result.is_some() {
            println!("monitoring cancelled");
        }
        Ok(())
    }

    /// Cluster-backend monitoring: polls `scontrol show
    /// job` for every captured job id, classifies states into the
    /// backend-agnostic vocabulary, garbage-collects jobs stuck on an
    /// unsatisfiable dependency, and prints a table until every job
    /// reaches a terminal state.
    fn run_cluster_monitor(id_path: &Path, config: &Config, scheduler: &dyn SchedulerClient) -> Result<()> {
        let text = std::fs::read_to_string(id_path)
            .with_context(|| format!("failed to read job-id capture file {}", id_path.display()))?;
        let job_ids: HashMap<String, String> = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse job-id capture file {}", id_path.display()))?;

        loop {
            let mut passed = 0u32;
            let mut failed = 0u32;
            let mut skipped = 0u32;
            let mut running = 0u32;
            let mut pending = 0u32;
            let mut unknown = 0u32;

            let mut dead = Vec::new();
            for id in job_ids.values() {
                let state = scheduler.job_state(id)?.unwrap_or_default();
                if cluster::is_dead_dependency_state(&state) {
                    dead.push(id.clone());
                }
                match cluster_emitter::classify_scheduler_state(&state) {
                    cluster_emitter::ClusterJobState::Passed => passed += 1,
                    cluster_emitter::ClusterJobState::Failed => failed += 1,
                    cluster_emitter::ClusterJobState::Skipped => skipped += 1,
                    cluster_emitter::ClusterJobState::Running => running += 1,
                    cluster_emitter::ClusterJobState::Pending => pending += 1,
                    cluster_emitter::ClusterJobState::Unknown => unknown += 1,
                }
            }

            if !dead.is_empty() {
                cluster::garbage_collect_broken_jobs(scheduler, &dead)?;
            }

            println!(
                "passed={passed} failed={failed} skipped={skipped} running={running} pending={pending} unknown={unknown}"
            );

            if running == 0 && pending == 0 {
                break;
            }
            std::thread::sleep(config.monitor_refresh_interval);
        }
        Ok(())
    }
}

/// `jobweaver list`: names every queue with a row store under `store_dir`.
pub struct ListCommand;

impl ListCommand {
    pub fn execute(store_dir: &Path) -> Result<()> {
        let names = rowstore::list_queues(store_dir)?;
        if names.is_empty() {
            println!("no queues in {}", store_dir.display());
        } else {
            for name in names {
                println!("{name}");
            }
        }
        Ok(())
    }
}

/// `jobweaver cleanup`: kills every terminal session whose id begins with
/// the configured prefix.
pub struct CleanupCommand;

impl CleanupCommand {
    pub fn execute(config: &Config) -> Result<()> {
        let sessions_mgr = TmuxSessionManager::new();
        let sessions = sessions_mgr.list_sessions()?;
        let targets = sessions::sessions_with_prefix(&sessions, &config.session_prefix);
        for id in &targets {
            sessions_mgr.kill_session(id)?;
        }
        println!("killed {} session(s) with prefix {:?}", targets.len(), config.session_prefix);
        Ok(())
    }
}
