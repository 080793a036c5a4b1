//! Resource hints attached to a [`crate::domain::entities::Job`]: cpus,
//! gpus, memory, begin-time and partition, plus
//! the memory-coercion helper used by the cluster emitter.

use crate::domain::errors::{QueueError, QueueResult};

/// GPU allocation hint. The original's `gres` auto-synthesis from an int
/// count is deliberately not reproduced — `Gres` is only ever set when the caller passes one
/// explicitly via `sbatch_opts["gres"]`, never derived from `Count`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gpus {
    Count(u32),
    Gres(String),
}

/// When to start a cluster job: either an offset in seconds from now, or a
/// scheduler-native literal (e.g. `"2024-01-01T00:00:00"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginTime {
    OffsetSeconds(u64),
    Literal(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceHints {
    pub cpus: Option<u32>,
    pub gpus: Option<Gpus>,
    /// Already coerced to whole megabytes at construction time.
    pub mem_megabytes: Option<u64>,
    pub begin: Option<BeginTime>,
    pub partition: Option<String>,
}

impl ResourceHints {
    pub fn with_mem(mem: &str) -> QueueResult<Self> {
        Ok(Self {
            mem_megabytes: Some(parse_mem_megabytes(mem)?),
            ..Self::default()
        })
    }
}

/// Coerces an integer-megabytes value or a human string like `"32GB"` into
/// whole megabytes.
///
/// Units are binary (1024-based, matching the literal `mem="10GB"` ⇒
/// `--mem=10240` conformance requirement): `b`/`byte`/`bytes`,
/// `kb`/`kib`, `mb`/`mib`, `gb`/`gib`, `tb`/`tib`, case-insensitive. A bare
/// integer string is treated as already being in megabytes. Byte-valued
/// input rounds down; finer-than-megabyte units otherwise round up.
pub fn parse_mem_megabytes(mem: &str) -> QueueResult<u64> {
    let trimmed = mem.trim();
    if let Ok(n) = trimmed.parse::<u64>() {
        return Ok(n);
    }

    let lower = trimmed.to_ascii_lowercase();
    let split_at = lower.find(|c: char| !c.is_ascii_digit() && c != '.');
    let Some(split_at) = split_at else {
        return Err(QueueError::InvalidMemorySpec { value: mem.to_string() });
    };
    let (num_part, unit_part) = lower.split_at(split_at);
    let unit_part = unit_part.trim();
    let quantity: f64 = num_part
        .parse()
        .map_err(|_| QueueError::InvalidMemorySpec { value: mem.to_string() })?;

    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    const TB: f64 = GB * 1024.0;

    let megabytes = match unit_part {
        "b" | "byte" | "bytes" => return Ok((quantity / MB).floor() as u64),
        "kb" | "kib" | "k" => (quantity * KB / MB).ceil(),
        "mb" | "mib" | "m" => quantity,
        "gb" | "gib" | "g" => quantity * GB / MB,
        "tb" | "tib" | "t" => quantity * TB / MB,
        _ => return Err(QueueError::InvalidMemorySpec { value: mem.to_string() }),
    };

    Ok(megabytes.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_integer_is_already_megabytes() {
        assert_eq!(parse_mem_megabytes("30602").unwrap(), 30602);
    }

    #[test]
    fn gb_suffix_converts_to_megabytes_binary() {
        assert_eq!(parse_mem_megabytes("10GB").unwrap(), 10240);
        assert_eq!(parse_mem_megabytes("4GB").unwrap(), 4096);
    }

    #[test]
    fn bytes_suffix_rounds_down() {
        assert_eq!(parse_mem_megabytes("300000000 bytes").unwrap(), 286);
    }

    #[test]
    fn unparseable_string_is_invalid_memory_spec() {
        let err = parse_mem_megabytes("a lot").unwrap_err();
        assert!(matches!(err, QueueError::InvalidMemorySpec { .. }));
    }
}
