//! Key layout for topics and states.
//!
//! Every key a run touches lives under `__sync/{run_id}/`, so concurrent
//! runs on one backend never share state:
//!
//! ```text
//! __sync/{run_id}/topic/{name}/entry/{seq:020}   one published value
//! __sync/{run_id}/topic/{name}/head              advisory last claimed seq
//! __sync/{run_id}/state/{name}                   barrier state (JSON)
//! ```
//!
//! Sequence numbers are zero-padded so entries of one topic sort in
//! publication order under a prefix scan.

/// Prefix shared by every key the sync layer writes.
pub const SYNC_KEY_PREFIX: &str = "__sync";

/// Width of the zero-padded sequence number in entry keys.
const SEQ_WIDTH: usize = 20;

/// Prefix of every key belonging to one run.
pub fn run_prefix(run_id: &str) -> String {
    format!("{SYNC_KEY_PREFIX}/{run_id}/")
}

/// Prefix of every entry key of a topic.
pub fn topic_entry_prefix(run_id: &str, topic: &str) -> String {
    format!("{SYNC_KEY_PREFIX}/{run_id}/topic/{topic}/entry/")
}

/// Key of the entry at `seq` in a topic log.
pub fn topic_entry_key(run_id: &str, topic: &str, seq: u64) -> String {
    format!("{}{seq:0width$}", topic_entry_prefix(run_id, topic), width = SEQ_WIDTH)
}

/// Key of the advisory head hint of a topic.
pub fn topic_head_key(run_id: &str, topic: &str) -> String {
    format!("{SYNC_KEY_PREFIX}/{run_id}/topic/{topic}/head")
}

/// Key holding a state's barrier record.
pub fn state_key(run_id: &str, state: &str) -> String {
    format!("{SYNC_KEY_PREFIX}/{run_id}/state/{state}")
}

/// Extract the sequence number from an entry key.
///
/// Returns `None` if the key is not an entry key of the given topic.
pub fn parse_entry_seq(run_id: &str, topic: &str, key: &str) -> Option<u64> {
    let prefix = topic_entry_prefix(run_id, topic);
    let suffix = key.strip_prefix(prefix.as_str())?;
    if suffix.len() != SEQ_WIDTH {
        return None;
    }
    suffix.parse().ok()
}
