//! Identifier generation (`wt-`/`ag-` ids, session ids).
//!
//! Ids are hex-encoded bytes of a `uuid::Uuid::new_v4()` truncated to the required length.
//! `Uuid::new_v4` is backed by a CSPRNG, which satisfies the "cryptographically strong RNG"
//! requirement without adding a `rand` dependency the teacher crate does not carry.

use uuid::Uuid;

/// Length in hex characters of the random suffix on a worktree id.
const WORKTREE_SUFFIX_LEN: usize = 6;
/// Length in hex characters of the random suffix on an agent id.
const AGENT_SUFFIX_LEN: usize = 8;

fn hex_suffix(len: usize) -> String {
    let bytes = Uuid::new_v4().into_bytes();
    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex.truncate(len);
    hex
}

/// Generate a new worktree id of the form `wt-<6 lowercase alphanumerics>`.
#[must_use]
pub fn worktree_id() -> String {
    format!("wt-{}", hex_suffix(WORKTREE_SUFFIX_LEN))
}

/// Generate a new agent id of the form `ag-<8 lowercase alphanumerics>`.
#[must_use]
pub fn agent_id() -> String {
    format!("ag-{}", hex_suffix(AGENT_SUFFIX_LEN))
}

/// Generate a new opaque session id used to correlate a resumed interactive agent session.
#[must_use]
pub fn session_id() -> Uuid {
    Uuid::new_v4()
}

/// Validate that a string looks like a worktree id (`wt-` followed by 6 lowercase
/// hex-alphanumerics). Used to reject hostile `--worktree` CLI input early.
#[must_use]
pub fn is_valid_worktree_id(value: &str) -> bool {
    is_valid_id(value, "wt-", WORKTREE_SUFFIX_LEN)
}

/// Validate that a string looks like an agent id (`ag-` followed by 8 lowercase
/// hex-alphanumerics).
#[must_use]
pub fn is_valid_agent_id(value: &str) -> bool {
    is_valid_id(value, "ag-", AGENT_SUFFIX_LEN)
}

fn is_valid_id(value: &str, prefix: &str, suffix_len: usize) -> bool {
    value
        .strip_prefix(prefix)
        .is_some_and(|suffix| suffix.len() == suffix_len && suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()))
}
