//! Stable error taxonomy for the orchestration kernel (spec §7).
//!
//! Every external caller (CLI, a future HTTPS transport, the scheduler) needs a short stable
//! code that survives across releases, distinct from the human-readable `anyhow` context chain
//! used internally. `KernelError` carries that code; `anyhow::Result` with `.context(...)` is
//! still used for the bulk of plumbing, matching the teacher's `app/handlers` style, and is
//! downcast to `KernelError` only at the CLI/JSON boundary in `main.rs`.

use thiserror::Error;

/// A stable, typed kernel error. `code()` returns the short string from spec §7; `exit_code()`
/// returns the process exit code `main.rs` should use when this error reaches the top level.
#[derive(Debug, Error)]
pub enum KernelError {
    /// `projectRoot` is not inside a git repository.
    #[error("not a git repository: {0}")]
    NotGitRepo(String),
    /// `.ppg/manifest.json` is absent.
    #[error(".ppg is not initialized in {0}; run `ppg init` first")]
    NotInitialized(String),
    /// The multiplexer binary is not installed or not reachable.
    #[error("tmux not found: {0}")]
    TmuxNotFound(String),
    /// The manifest lock could not be acquired within the retry budget.
    #[error("could not acquire manifest lock: {0}")]
    ManifestLock(String),
    /// A worktree id did not resolve to a manifest entry.
    #[error("worktree not found: {0}")]
    WorktreeNotFound(String),
    /// An agent id did not resolve to a manifest entry.
    #[error("agent not found: {0}")]
    AgentNotFound(String),
    /// Caller-supplied arguments were invalid or mutually exclusive.
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    /// A merge was requested while agents are still running and `force` was not set.
    #[error("agents still running: {0}")]
    AgentsRunning(String),
    /// `git merge`/`git merge --squash` failed.
    #[error("merge failed: {0}")]
    MergeFailed(String),
    /// `performReset` found at-risk worktrees and `force` was not set.
    #[error("unmerged work would be lost: {0}")]
    UnmergedWork(String),
    /// A multiplexer target (window/pane) no longer exists.
    #[error("pane not found: {0}")]
    PaneNotFound(String),
    /// `restart` was requested but no archived prompt exists for the agent.
    #[error("no archived prompt for agent: {0}")]
    PromptNotFound(String),
    /// The `gh` CLI is not installed.
    #[error("gh CLI not found: {0}")]
    GhNotFound(String),
    /// `wait` exceeded its deadline.
    #[error("wait timed out after {0}s")]
    WaitTimeout(u64),
    /// Any other I/O or internal failure, wrapped from `anyhow`.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl KernelError {
    /// The short stable string code from spec §7, used as the `code` field of `--json` output
    /// and as the basis for a future HTTPS transport's status-code mapping.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotGitRepo(_) => "NOT_GIT_REPO",
            Self::NotInitialized(_) => "NOT_INITIALIZED",
            Self::TmuxNotFound(_) => "TMUX_NOT_FOUND",
            Self::ManifestLock(_) => "MANIFEST_LOCK",
            Self::WorktreeNotFound(_) => "WORKTREE_NOT_FOUND",
            Self::AgentNotFound(_) => "AGENT_NOT_FOUND",
            Self::InvalidArgs(_) => "INVALID_ARGS",
            Self::AgentsRunning(_) => "AGENTS_RUNNING",
            Self::MergeFailed(_) => "MERGE_FAILED",
            Self::UnmergedWork(_) => "UNMERGED_WORK",
            Self::PaneNotFound(_) => "PANE_NOT_FOUND",
            Self::PromptNotFound(_) => "PROMPT_NOT_FOUND",
            Self::GhNotFound(_) => "GH_NOT_FOUND",
            Self::WaitTimeout(_) => "WAIT_TIMEOUT",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Process exit code `main.rs` uses when this error propagates to the top level.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::WaitTimeout(_) => 2,
            _ => 1,
        }
    }
}

/// Result alias used throughout the kernel's operation layer.
pub type Result<T> = std::result::Result<T, KernelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable_strings() {
        assert_eq!(KernelError::NotGitRepo("x".into()).code(), "NOT_GIT_REPO");
        assert_eq!(
            KernelError::NotInitialized("x".into()).code(),
            "NOT_INITIALIZED"
        );
        assert_eq!(KernelError::WaitTimeout(5).code(), "WAIT_TIMEOUT");
    }

    #[test]
    fn test_wait_timeout_exit_code_is_2() {
        assert_eq!(KernelError::WaitTimeout(5).exit_code(), 2);
    }

    #[test]
    fn test_other_errors_exit_code_is_1() {
        assert_eq!(KernelError::InvalidArgs("x".into()).exit_code(), 1);
        assert_eq!(KernelError::AgentsRunning("x".into()).exit_code(), 1);
    }

    #[test]
    fn test_internal_wraps_anyhow() {
        let err: KernelError = anyhow::anyhow!("boom").into();
        assert_eq!(err.code(), "INTERNAL");
    }
}
