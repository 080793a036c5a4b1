//! Live monitor.
//!
//! Polls each worker's queue-state JSON file, aggregates pass/fail/skip
//! counts, and renders a table. Grounded on
//! `cmd_queue/base_queue.Queue.monitor`/`rprint_multi_queue_monitor_text`
//! (poll-sleep-render loop, terminal-state detection) and the teacher's
//! `indicatif::{ProgressBar, ProgressStyle}` spinner-with-message idiom
//! (`src/presentation/cli/commands.rs`) for the live-updating region.

use std::path::PathBuf;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::domain::errors::QueueResult;
use crate::domain::value_objects::QueueState;
use crate::infrastructure::status_io::read_queue_state;

/// One worker's state-file location, labeled for table rendering.
pub struct WorkerHandle {
    pub label: String,
    pub state_fpath: PathBuf,
}

/// What the monitor does when the user interrupts it. The monitor itself never calls into tmux/Slurm
/// directly — it reports the decision back to the caller, which already
/// holds the concrete `SessionManager`/`SchedulerClient`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelAction {
    KillSessions,
    CancelClusterJobs,
}

/// Polls every worker once, retrying transient parse failures per the
/// bounded budget.
pub fn poll_once(workers: &[WorkerHandle], attempts: u32, interval: Duration) -> QueueResult<Vec<QueueState>> {
    workers
        .iter()
        .map(|w| read_queue_state(&w.state_fpath, &w.label, attempts, interval))
        .collect()
}

/// Renders the columns `(name, status, passed, failed, skipped, total)`,
/// appending an aggregate row when more than one worker exists.
pub fn render_table(states: &[QueueState]) -> String {
    let header = format!(
        "{:<24} {:<12} {:>6} {:>6} {:>7} {:>6}",
        "NAME", "STATUS", "PASS", "FAIL", "SKIP", "TOTAL"
    );
    let mut lines = vec![header];
    for state in states {
        lines.push(format!(
            "{:<24} {:<12} {:>6} {:>6} {:>7} {:>6}",
            state.name,
            state.status.as_str(),
            state.passed,
            state.failed,
            state.skipped,
            state.total,
        ));
    }
    if states.len() > 1 {
        let passed: u32 = states.iter().map(|s| s.passed).sum();
        let failed: u32 = states.iter().map(|s| s.failed).sum();
        let skipped: u32 = states.iter().map(|s| s.skipped).sum();
        let total: u32 = states.iter().map(|s| s.total).sum();
        lines.push(format!(
            "{:<24} {:<12} {:>6} {:>6} {:>7} {:>6}",
            "TOTAL", "-", passed, failed, skipped, total
        ));
    }
    lines.join("\n")
}

pub fn all_done(states: &[QueueState]) -> bool {
    states.iter().all(|s| s.is_done())
}

/// Runs the poll/render loop until every worker reports `"done"`, or
/// `should_cancel` returns true (the CLI layer's Ctrl-C handling point).
/// Returns `Ok(None)` on normal completion, `Ok(Some(action))` if
/// cancelled, so the caller can apply the right cancellation path for its
/// backend (kill sessions vs. `scancel --name`).
pub fn run(
    workers: &[WorkerHandle],
    attempts: u32,
    read_interval: Duration,
    refresh_interval: Duration,
    cancel_action: CancelAction,
    should_cancel: &dyn Fn() -> bool,
) -> QueueResult<Option<CancelAction>> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );

    loop {
        if should_cancel() {
            pb.finish_and_clear();
            return Ok(Some(cancel_action));
        }

        let states = poll_once(workers, attempts, read_interval)?;
        pb.set_message(render_table(&states));
        pb.tick();

        if all_done(&states) {
            pb.finish_with_message(render_table(&states));
            return Ok(None);
        }

        std::thread::sleep(refresh_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::QueuePhase;

    fn state(name: &str, status: QueuePhase, passed: u32, total: u32) -> QueueState {
        QueueState {
            status,
            passed,
            failed: 0,
            skipped: 0,
            total,
            name: name.to_string(),
            rootid: "root".to_string(),
        }
    }

    #[test]
    fn all_done_requires_every_worker_done() {
        let states = vec![state("w0", QueuePhase::Done, 1, 1), state("w1", QueuePhase::Run, 0, 1)];
        assert!(!all_done(&states));
        let states = vec![state("w0", QueuePhase::Done, 1, 1), state("w1", QueuePhase::Done, 1, 1)];
        assert!(all_done(&states));
    }

    #[test]
    fn render_table_adds_aggregate_row_for_multiple_workers() {
        let states = vec![state("w0", QueuePhase::Done, 2, 2), state("w1", QueuePhase::Done, 3, 3)];
        let table = render_table(&states);
        assert!(table.contains("TOTAL"));
        assert!(table.contains("5"));
    }

    #[test]
    fn render_table_has_no_aggregate_row_for_single_worker() {
        let states = vec![state("w0", QueuePhase::Done, 2, 2)];
        let table = render_table(&states);
        assert!(!table.contains("TOTAL"));
    }

    #[test]
    fn cancellation_check_short_circuits_the_loop() {
        let workers: Vec<WorkerHandle> = Vec::new();
        let result = run(
            &workers,
            1,
            Duration::from_millis(1),
            Duration::from_millis(1),
            CancelAction::KillSessions,
            &|| true,
        )
        .unwrap();
        assert_eq!(result, Some(CancelAction::KillSessions));
    }
}
