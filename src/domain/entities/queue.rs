//! Queue entity module
//!
//! The `Queue` aggregate owns a backend-agnostic, insertion-ordered set of
//! [`Job`]s plus the environment/cwd/header-command context shared by every
//! worker a backend eventually emits. Mirrors `cmd_queue.base_queue.Queue`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::domain::entities::job::Job;
use crate::domain::errors::{QueueError, QueueResult};
use crate::domain::value_objects::path_id;

#[derive(Debug, Clone)]
pub struct Queue {
    pub name: String,
    pub root_id: String,
    pub path_id: String,
    pub jobs: Vec<Job>,
    pub named_jobs: HashMap<String, usize>,
    pub num_real_jobs: usize,
    /// Sink jobs set by `sync()`: subsequently submitted jobs implicitly
    /// depend on all of these.
    pub all_depends: Option<Vec<String>>,
    pub header_commands: Vec<String>,
    pub environ: HashMap<String, String>,
    pub cwd: Option<String>,
    pub dpath: PathBuf,
}

impl Queue {
    pub fn new(name: impl Into<String>, dpath: impl Into<PathBuf>) -> Self {
        let name = name.into();
        let root_id = path_id::root_id(Utc::now());
        let path_id = path_id::join(&name, &root_id);
        Self {
            name,
            root_id,
            path_id,
            jobs: Vec::new(),
            named_jobs: HashMap::new(),
            num_real_jobs: 0,
            all_depends: None,
            header_commands: Vec::new(),
            environ: HashMap::new(),
            cwd: None,
            dpath: dpath.into(),
        }
    }

    pub fn fpath(&self) -> PathBuf {
        self.dpath.join(format!("{}.sh", self.path_id))
    }

    pub fn state_fpath(&self) -> PathBuf {
        self.dpath.join(format!("serial_queue_{}.txt", self.path_id))
    }

    pub fn log_dpath(&self) -> PathBuf {
        self.dpath.join("job_info")
    }

    pub fn job_info_root(&self) -> PathBuf {
        self.log_dpath()
    }

    pub fn len(&self) -> usize {
        self.num_real_jobs
    }

    pub fn is_empty(&self) -> bool {
        self.num_real_jobs == 0
    }

    /// Appends a job to the queue, resolving `depends` against
    /// `all_depends` first. Fails with
    /// [`QueueError::DuplicateJob`] on a repeated name and with
    /// [`QueueError::UnknownDependency`] on a forward/unresolved reference.
    pub fn submit(&mut self, mut job: Job) -> QueueResult<usize> {
        if self.named_jobs.contains_key(&job.name) {
            return Err(QueueError::DuplicateJob { name: job.name });
        }

        if let Some(all_depends) = &self.all_depends {
            let mut merged = all_depends.clone();
            merged.extend(job.depends.drain(..));
            job.depends = merged;
        }

        for dep in &job.depends {
            if !self.named_jobs.contains_key(dep) {
                return Err(QueueError::UnknownDependency {
                    job: job.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }

        let is_bookkeeper = job.bookkeeper;
        let idx = self.jobs.len();
        self.named_jobs.insert(job.name.clone(), idx);
        self.jobs.push(job);
        if !is_bookkeeper {
            self.num_real_jobs += 1;
        }
        Ok(idx)
    }

    /// Marks that all future jobs implicitly depend on every current sink
    /// job (nodes with no dependents yet). Equivalent to
    /// `base_queue.Queue.sync`.
    pub fn sync(&mut self) {
        let mut has_dependents = vec![false; self.jobs.len()];
        for job in &self.jobs {
            for dep in &job.depends {
                if let Some(&idx) = self.named_jobs.get(dep) {
                    has_dependents[idx] = true;
                }
            }
        }
        let sinks = self
            .jobs
            .iter()
            .enumerate()
            .filter(|(idx, _)| !has_dependents[*idx])
            .map(|(_, job)| job.name.clone())
            .collect();
        self.all_depends = Some(sinks);
    }

    pub fn add_header_command(&mut self, command: impl Into<String>) {
        self.header_commands.push(command.into());
    }

    /// Appends a job without re-validating its `depends` against this
    /// queue's own `named_jobs`. Used only by the multi-session planner,
    /// which splits one source queue's jobs across several worker
    /// sub-queues: a job's dependency may legitimately live in a sibling
    /// worker, coordinated via the rank semaphore rather than by this
    /// queue's own name table.
    pub(crate) fn push_raw(&mut self, job: Job) -> usize {
        let is_bookkeeper = job.bookkeeper;
        let idx = self.jobs.len();
        self.named_jobs.insert(job.name.clone(), idx);
        self.jobs.push(job);
        if !is_bookkeeper {
            self.num_real_jobs += 1;
        }
        idx
    }

    pub fn job_by_name(&self, name: &str) -> Option<&Job> {
        self.named_jobs.get(name).map(|&idx| &self.jobs[idx])
    }

    pub fn info_root(&self) -> &Path {
        &self.dpath
    }
}
