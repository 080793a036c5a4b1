//! Error taxonomy for the DAG compiler and runner.
//!
//! Fatal, public-boundary errors are modeled as variants of [`QueueError`].
//! Internal helpers return `anyhow::Result` and attach context; callers at
//! the module boundary convert those into the appropriate variant here.

use thiserror::Error;

/// The kinds of failure a caller of `submit`/`create`/`run`/the monitor may
/// observe.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("job name {name:?} was already submitted to this queue")]
    DuplicateJob { name: String },

    #[error("unknown backend {name:?}; available backends: {available:?}")]
    UnknownBackend {
        name: String,
        available: Vec<&'static str>,
    },

    #[error("dependency graph contains a cycle: {cycle}")]
    CyclicGraph { cycle: String },

    #[error("backend {backend:?} is not available on this host: {reason}")]
    BackendUnavailable { backend: &'static str, reason: String },

    #[error("emitted script failed `bash -n` syntax check: {detail}")]
    BashSyntaxFailure { detail: String },

    #[error("status file never became readable after {attempts} attempts: {path}")]
    MonitorError { path: String, attempts: u32 },

    #[error("monitoring was cancelled by the user")]
    UserCancel,

    #[error("dependency {dependency:?} of job {job:?} was not found in this queue")]
    UnknownDependency { job: String, dependency: String },

    #[error("could not interpret {value:?} as a memory quantity")]
    InvalidMemorySpec { value: String },
}

pub type QueueResult<T> = std::result::Result<T, QueueError>;
