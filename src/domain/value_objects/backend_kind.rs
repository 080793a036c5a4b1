//! Backend selector. Kept separate from
//! [`crate::domain::entities::BackendOptions`], which carries per-job
//! options once a backend is already chosen.

use std::fmt;
use std::str::FromStr;

use crate::domain::errors::QueueError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Serial,
    Session,
    Cluster,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [BackendKind::Serial, BackendKind::Session, BackendKind::Cluster];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Serial => "serial",
            BackendKind::Session => "session",
            BackendKind::Cluster => "cluster",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "serial" => Ok(BackendKind::Serial),
            "session" | "tmux" | "multi-session" => Ok(BackendKind::Session),
            "cluster" | "slurm" => Ok(BackendKind::Cluster),
            other => Err(QueueError::UnknownBackend {
                name: other.to_string(),
                available: BackendKind::ALL.iter().map(|b| b.as_str()).collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_aliases() {
        assert_eq!("tmux".parse::<BackendKind>().unwrap(), BackendKind::Session);
        assert_eq!("slurm".parse::<BackendKind>().unwrap(), BackendKind::Cluster);
    }

    #[test]
    fn unknown_backend_lists_available() {
        let err = "airflow".parse::<BackendKind>().unwrap_err();
        assert!(matches!(err, QueueError::UnknownBackend { .. }));
    }
}
