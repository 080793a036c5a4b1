//! Minimal, contract-level CLI front-end.
//!
//! Exposes the six verbs `new`, `submit`, `show`, `run`, `list`, `cleanup`
//! as `clap`-derive subcommands. This crate's CLI owns no business logic
//! beyond row (de)serialization and argument parsing — everything else is
//! delegated to the library through [`commands`].

pub mod builder;
pub mod commands;
pub mod rowstore;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::domain::value_objects::BackendKind;

#[derive(Parser, Debug)]
#[command(name = "jobweaver")]
#[command(author = "JobWeaver Team")]
#[command(version = "0.1.0")]
#[command(about = "Backend-agnostic shell-command DAG compiler and runner", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Widen logging to debug level")]
    pub verbose: bool,

    /// Directory holding each queue's JSON row store. Defaults to `./.jobweaver`.
    #[arg(long, global = true, value_name = "DIR", default_value = ".jobweaver")]
    pub store_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Create a new, empty queue")]
    New {
        /// Queue name.
        name: String,
    },

    #[command(about = "Append a header line or a command job to a queue")]
    Submit {
        /// Queue name.
        name: String,

        /// A raw shell line sourced before any job runs.
        #[arg(long, conflicts_with_all = ["command", "job_name", "depends"])]
        header: Option<String>,

        /// The shell command to run for this job.
        #[arg(long)]
        command: Option<String>,

        /// Name for this job (auto-generated if omitted); only meaningful
        /// with `--command`.
        #[arg(long, value_name = "NAME")]
        job_name: Option<String>,

        /// Comma-separated names of jobs this one depends on.
        #[arg(long, value_delimiter = ',')]
        depends: Vec<String>,
    },

    #[command(about = "Print a queue's job list and dependency forest")]
    Show {
        /// Queue name.
        name: String,
    },

    #[command(about = "Emit and execute a queue against a backend")]
    Run {
        /// Queue name.
        name: String,

        #[arg(long, value_enum, default_value = "serial")]
        backend: BackendArg,

        /// Worker count for the `session` backend.
        #[arg(long, default_value_t = 1)]
        workers: usize,

        /// GPU indices to distribute round-robin across session workers.
        #[arg(long, value_delimiter = ',')]
        gpus: Vec<u32>,

        /// Tags to exclude from emission.
        #[arg(long, value_delimiter = ',')]
        exclude_tags: Vec<String>,

        /// Block until the backend finishes (serial/cluster only; ignored
        /// when `--monitor` is set, which always blocks).
        #[arg(long)]
        block: bool,

        /// Poll and render progress until every worker/job reaches a
        /// terminal state.
        #[arg(long)]
        monitor: bool,
    },

    #[command(about = "List every queue with a row store on disk")]
    List,

    #[command(about = "Kill every leftover terminal session from prior runs")]
    Cleanup,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BackendArg {
    Serial,
    Session,
    Cluster,
}

impl From<BackendArg> for BackendKind {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::Serial => BackendKind::Serial,
            BackendArg::Session => BackendKind::Session,
            BackendArg::Cluster => BackendKind::Cluster,
        }
    }
}
