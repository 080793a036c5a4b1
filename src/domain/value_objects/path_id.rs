//! Path-safe identifiers used throughout on-disk artifacts to disambiguate
//! runs: `<name>_<root_id>`.

use uuid::Uuid;

/// Returns 8 lowercase hex characters of a fresh random UUID, used as the
/// short-hash suffix of a [`crate::domain::entities::Job::path_id`].
pub fn short_hash() -> String {
    let id = Uuid::new_v4();
    id.simple().to_string()[..8].to_string()
}

/// Builds a `root_id` of the form `<YYYYMMDDTHHMMSS>_<8 hex chars>`, matching
/// `SlurmQueue.queue_id`'s `name + '-' + stamp + '-' + hash` convention but
/// kept backend-agnostic (no name component; callers prepend the queue name
/// themselves when building `path_id`).
pub fn root_id(now: chrono::DateTime<chrono::Utc>) -> String {
    format!("{}_{}", now.format("%Y%m%dT%H%M%S"), short_hash())
}

/// `name + "_" + short_hash` — used for `Job::path_id` and `Queue::path_id`.
pub fn join(name: &str, suffix: &str) -> String {
    format!("{name}_{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hash_is_eight_hex_chars() {
        let h = short_hash();
        assert_eq!(h.len(), 8);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn two_hashes_differ() {
        assert_ne!(short_hash(), short_hash());
    }
}
