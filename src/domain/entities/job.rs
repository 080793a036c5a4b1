//! Job entity module
//!
//! This module defines the core Job value object: a shell command, a name,
//! resolved dependency references, and the derived on-disk paths that the
//! bash emitter and the monitor use to track its outcome.

use std::path::{Path, PathBuf};

use crate::domain::entities::backend_options::BackendOptions;
use crate::domain::value_objects::path_id;
use crate::domain::value_objects::{ResourceHints, Tags};

/// A single unit of work submitted to a [`crate::domain::entities::Queue`].
///
/// Mirrors `cmd_queue.base_queue.Job` / `cmd_queue.serial_queue.BashJob`, with
/// the original's open-ended `**kwargs` bag replaced by [`BackendOptions`]
/// and dependency references resolved to `Job`
/// pointers at submission time rather than carried as name-or-object unions.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Unique name within the owning queue.
    pub name: String,
    /// `name + "_" + short_hash`, used to disambiguate on-disk artifacts
    /// across repeated runs of a queue with the same job names.
    pub path_id: String,
    /// Opaque shell command text.
    pub command: String,
    /// Names of jobs this job depends on, resolved against the owning
    /// queue's `named_jobs` at submission time (forward references are
    /// rejected there, not here).
    pub depends: Vec<String>,
    /// Internally generated bookkeeping fragment (semaphore wait/signal);
    /// excluded from user-visible pass/fail/skip counters.
    pub bookkeeper: bool,
    /// When true, the command's stdout+stderr is teed to `log_fpath` and
    /// the emitted command becomes `(cmd) 2>&1 | tee <log>`.
    pub log: bool,
    /// Tags used to filter jobs out of emission.
    pub tags: Tags,
    /// Backend-specific options.
    pub options: BackendOptions,
    /// cpus, gpus, memory, begin-time, partition.
    pub resources: ResourceHints,
    /// Directory under which `passed/`, `failed/`, and `status/` live.
    pub info_dpath: PathBuf,
}

impl Job {
    /// Builds a new job. `depends` must already be resolved to names that
    /// exist in the owning queue; the queue's `submit` enforces that.
    pub fn new(name: impl Into<String>, command: impl Into<String>, info_root: &Path) -> Self {
        let name = name.into();
        let path_id = path_id::join(&name, &path_id::short_hash());
        let info_dpath = info_root.join(&path_id);
        Self {
            name,
            path_id,
            command: command.into(),
            depends: Vec::new(),
            bookkeeper: false,
            log: false,
            tags: Tags::default(),
            options: BackendOptions::default(),
            resources: ResourceHints::default(),
            info_dpath,
        }
    }

    /// `<info>/passed/<path_id>.pass`
    pub fn pass_fpath(&self) -> PathBuf {
        self.info_dpath.join("passed").join(format!("{}.pass", self.path_id))
    }

    /// `<info>/failed/<path_id>.fail`
    pub fn fail_fpath(&self) -> PathBuf {
        self.info_dpath.join("failed").join(format!("{}.fail", self.path_id))
    }

    /// `<info>/status/<path_id>.stat`
    pub fn stat_fpath(&self) -> PathBuf {
        self.info_dpath.join("status").join(format!("{}.stat", self.path_id))
    }

    /// `<info>/status/<path_id>.logs`
    pub fn log_fpath(&self) -> PathBuf {
        self.info_dpath.join("status").join(format!("{}.logs", self.path_id))
    }

    pub fn has_dependencies(&self) -> bool {
        !self.depends.is_empty()
    }

    /// A bookkeeper job constructed for semaphore wait/signal fragments;
    /// never counted in a worker's pass/fail/skip totals.
    pub fn bookkeeping(command: impl Into<String>, info_root: &Path, seq: usize) -> Self {
        let mut job = Self::new(format!("__bookkeeper_{seq}"), command, info_root);
        job.bookkeeper = true;
        job
    }
}
