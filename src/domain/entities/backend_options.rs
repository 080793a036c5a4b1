//! Tagged variant replacing the inherited source's open-ended keyword-
//! argument option bags.

use std::collections::{BTreeSet, HashMap};

/// Closed set of `sbatch` key/value options recognized by the cluster
/// backend.
pub const SLURM_SBATCH_KVARGS: &[&str] = &[
    "array", "account", "bb", "bbf", "comment", "cpu_freq", "cpus_per_task",
    "deadline", "delay_boot", "chdir", "error", "export_file", "gid", "gres",
    "gres_flags", "input", "licenses", "clusters", "distribution",
    "mail_type", "mail_user", "mcs_label", "ntasks", "ntasks_per_node",
    "nodes", "partition", "power", "priority", "profile", "qos",
    "core_spec", "signal", "switches", "thread_spec", "time", "time_min",
    "uid", "wckey", "cluster_constraint", "constraint", "nodefile", "mem",
    "mincpus", "reservation", "tmp", "nodelist", "exclude", "mem_per_cpu",
    "sockets_per_node", "cores_per_socket", "threads_per_core",
    "extra_node_info", "ntasks_per_core", "ntasks_per_socket", "hint",
    "mem_bind", "cpus_per_gpu", "gpus", "gpu_bind", "gpu_freq",
    "gpus_per_node", "gpus_per_socket", "gpus_per_task", "mem_per_gpu",
];

/// Closed set of `sbatch` boolean flags recognized by the cluster backend.
pub const SLURM_SBATCH_FLAGS: &[&str] = &[
    "get_user_env", "hold", "ignore_pbs", "no_kill", "container",
    "no_requeue", "overcommit", "parsable", "quiet", "reboot", "requeue",
    "oversubscribe", "spread_job", "use_min_nodes", "verbose", "wait",
    "contiguous", "mem_per_cpu",
];

/// Backend-specific job options, replacing the original's `**kwargs` bags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BackendOptions {
    /// No extra options; the serial backend needs none.
    #[default]
    Serial,
    /// Multi-session backend: optionally pin a GPU index via
    /// `CUDA_VISIBLE_DEVICES`.
    Session { gpu_index: Option<u32> },
    /// Cluster backend: a validated bag of `sbatch` key/value options and
    /// boolean flags, restricted to [`SLURM_SBATCH_KVARGS`] /
    /// [`SLURM_SBATCH_FLAGS`].
    Cluster {
        sbatch_opts: HashMap<String, String>,
        flags: BTreeSet<String>,
    },
}

impl BackendOptions {
    /// Builds cluster options, silently dropping keys outside the closed
    /// sets (mirrors the original's `ub.udict(kwargs) & SLURM_SBATCH_KVARGS`
    /// intersection semantics).
    pub fn cluster(
        opts: impl IntoIterator<Item = (String, String)>,
        flags: impl IntoIterator<Item = String>,
    ) -> Self {
        let sbatch_opts = opts
            .into_iter()
            .filter(|(k, _)| SLURM_SBATCH_KVARGS.contains(&k.as_str()))
            .collect();
        let flags = flags
            .into_iter()
            .filter(|k| SLURM_SBATCH_FLAGS.contains(&k.as_str()))
            .collect();
        BackendOptions::Cluster { sbatch_opts, flags }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_options_drop_unknown_keys() {
        let opts = BackendOptions::cluster(
            [("mem".to_string(), "10GB".to_string()), ("bogus".to_string(), "x".to_string())],
            ["parsable".to_string(), "nonsense".to_string()],
        );
        match opts {
            BackendOptions::Cluster { sbatch_opts, flags } => {
                assert_eq!(sbatch_opts.len(), 1);
                assert!(sbatch_opts.contains_key("mem"));
                assert_eq!(flags.len(), 1);
                assert!(flags.contains("parsable"));
            }
            _ => panic!("expected Cluster variant"),
        }
    }
}
