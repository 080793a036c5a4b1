//! Builds a [`crate::domain::entities::Queue`] from a CLI row list.
//! Owns no business logic beyond row
//! interpretation — everything else (graph validation, emission,
//! execution) is delegated to the library.

use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::entities::{Job, Queue};
use crate::presentation::cli::rowstore::Row;

/// Builds a queue named `name` rooted at `dpath` from `rows`, in the order
/// they were submitted. Header rows become `queue.header_commands`;
/// command rows become jobs, auto-named `cmd0`, `cmd1`, ... when the row
/// carries no explicit `name` (still resolved, in submission order, before
/// any `depends` reference needs them — forward references stay rejected
/// by `Queue::submit` exactly as for any other caller).
pub fn build_queue(name: &str, dpath: &Path, rows: &[Row]) -> Result<Queue> {
    let mut queue = Queue::new(name, dpath);
    let info_root = queue.job_info_root();
    let mut auto_index = 0usize;

    for row in rows {
        match row {
            Row::Header { header } => {
                queue.add_header_command(header.clone());
            }
            Row::Command { command, name, depends } => {
                let job_name = name.clone().unwrap_or_else(|| {
                    let generated = format!("cmd{auto_index}");
                    auto_index += 1;
                    generated
                });
                let mut job = Job::new(job_name.clone(), command.clone(), &info_root);
                job.depends = depends.clone().unwrap_or_default();
                queue
                    .submit(job)
                    .with_context(|| format!("failed to submit job {job_name:?}"))?;
            }
        }
    }

    Ok(queue)
}
