//! Backend availability probes and the backend factory.
//!
//! Grounded on `SerialQueue.is_available` (always `True`),
//! `TMUXMultiQueue.is_available` (tmux on PATH) and
//! `SlurmQueue.is_available` (squeue/sinfo reachable) from the original
//! source — each collapsed here to a trait probe so the CLI can report why
//! a requested backend is unusable instead of failing opaquely.

use crate::domain::errors::QueueError;
use crate::domain::value_objects::BackendKind;
use crate::infrastructure::cluster::SchedulerClient;
use crate::infrastructure::sessions::SessionManager;

/// Checks whether `backend` can actually run on this host, returning the
/// reason it can't as a [`QueueError::BackendUnavailable`].
pub fn check_availability(
    backend: BackendKind,
    sessions: &dyn SessionManager,
    scheduler: &dyn SchedulerClient,
) -> Result<(), QueueError> {
    match backend {
        BackendKind::Serial => Ok(()),
        BackendKind::Session => {
            if sessions.is_available() {
                Ok(())
            } else {
                Err(QueueError::BackendUnavailable {
                    backend: "session",
                    reason: "tmux was not found on PATH".to_string(),
                })
            }
        }
        BackendKind::Cluster => {
            if scheduler.is_available() {
                Ok(())
            } else {
                Err(QueueError::BackendUnavailable {
                    backend: "cluster",
                    reason: "squeue/sinfo did not respond; is this host a Slurm login node?".to_string(),
                })
            }
        }
    }
}

/// Lists every backend available on this host, in declaration order.
pub fn available_backends(sessions: &dyn SessionManager, scheduler: &dyn SchedulerClient) -> Vec<BackendKind> {
    BackendKind::ALL
        .into_iter()
        .filter(|b| check_availability(*b, sessions, scheduler).is_ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct AlwaysOnSessions;
    impl SessionManager for AlwaysOnSessions {
        fn list_sessions(&self) -> anyhow::Result<Vec<crate::infrastructure::sessions::SessionInfo>> {
            Ok(Vec::new())
        }
        fn new_session(&self, _id: &str) -> anyhow::Result<()> {
            Ok(())
        }
        fn send_keys(&self, _id: &str, _command: &str) -> anyhow::Result<()> {
            Ok(())
        }
        fn capture_pane(&self, _id: &str) -> anyhow::Result<String> {
            Ok(String::new())
        }
        fn kill_session(&self, _id: &str) -> anyhow::Result<()> {
            Ok(())
        }
        fn is_available(&self) -> bool {
            true
        }
    }

    struct AlwaysOffScheduler;
    impl SchedulerClient for AlwaysOffScheduler {
        fn submit(&self, _sbatch_args: &[String]) -> anyhow::Result<String> {
            unreachable!()
        }
        fn job_state(&self, _job_id: &str) -> anyhow::Result<Option<String>> {
            unreachable!()
        }
        fn show_job(&self, _job_id: &str) -> anyhow::Result<HashMap<String, String>> {
            unreachable!()
        }
        fn job_id_by_name(&self, _name: &str) -> anyhow::Result<Option<String>> {
            unreachable!()
        }
        fn cancel(&self, _job_id: &str) -> anyhow::Result<()> {
            unreachable!()
        }
        fn is_available(&self) -> bool {
            false
        }
    }

    #[test]
    fn serial_is_always_available() {
        let sessions = AlwaysOnSessions;
        let scheduler = AlwaysOffScheduler;
        assert!(check_availability(BackendKind::Serial, &sessions, &scheduler).is_ok());
    }

    #[test]
    fn cluster_unavailable_reports_reason() {
        let sessions = AlwaysOnSessions;
        let scheduler = AlwaysOffScheduler;
        let err = check_availability(BackendKind::Cluster, &sessions, &scheduler).unwrap_err();
        assert!(matches!(err, QueueError::BackendUnavailable { backend: "cluster", .. }));
    }

    #[test]
    fn available_backends_filters_to_working_ones() {
        let sessions = AlwaysOnSessions;
        let scheduler = AlwaysOffScheduler;
        let backends = available_backends(&sessions, &scheduler);
        assert!(backends.contains(&BackendKind::Serial));
        assert!(backends.contains(&BackendKind::Session));
        assert!(!backends.contains(&BackendKind::Cluster));
    }
}
