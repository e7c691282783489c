//! Worktree Lifecycle Engine (spec §4.6, component C6).
//!
//! Every function here drives `crate::git` and `crate::mux` directly and returns plain data;
//! manifest mutation is the caller's job (`crate::ops`), which commits the result inside a single
//! `ManifestStore::update` closure per spec §4.2's "plan outside, mutate inside" rule.

use crate::config::Config;
use crate::error::{KernelError, Result};
use crate::git::{BranchManager, Repository, WorktreeManager};
use crate::manifest::Worktree;
use crate::mux::{self, SplitDirection};
use crate::selfprotect::SelfProtection;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// `createWorktree` (spec §4.6) — cut a new branch from `base` and add a worktree for it.
///
/// # Errors
///
/// Returns an error if the branch or worktree cannot be created.
pub fn create_worktree(repo: &Repository, path: &Path, branch: &str, base: &str) -> Result<()> {
    WorktreeManager::new(repo).create_with_new_branch(path, branch, base)?;
    Ok(())
}

/// `adoptWorktree` (spec §4.6) — add a worktree for an existing branch without creating one.
///
/// # Errors
///
/// Returns `KernelError::InvalidArgs` if `branch` does not exist, or propagates a worktree-add
/// failure.
pub fn adopt_worktree(repo: &Repository, path: &Path, branch: &str) -> Result<()> {
    if !BranchManager::new(repo).exists(branch) {
        return Err(KernelError::InvalidArgs(format!("branch '{branch}' does not exist")));
    }
    WorktreeManager::new(repo).create(path, branch)?;
    Ok(())
}

/// `setupWorktreeEnv` (spec §4.6) — copy configured env files into the new worktree and,
/// optionally, symlink `node_modules` from the project root. Both steps are best-effort: a
/// missing source file is logged and skipped rather than failing the whole spawn, since a
/// worktree is still usable without its dotfiles.
pub fn setup_worktree_env(project_root: &Path, worktree_path: &Path, config: &Config) {
    for env_file in &config.env_files {
        let source = project_root.join(env_file);
        if !source.exists() {
            warn!(env_file, "Configured env file not found, skipping");
            continue;
        }
        let dest = worktree_path.join(env_file);
        if let Some(parent) = dest.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(env_file, error = %e, "Failed to create parent directory for env file");
                continue;
            }
        }
        if let Err(e) = fs::copy(&source, &dest) {
            warn!(env_file, error = %e, "Failed to copy env file into worktree");
        }
    }

    if config.symlink_node_modules {
        let source = project_root.join("node_modules");
        let dest = worktree_path.join("node_modules");
        if source.exists() && !dest.exists() {
            if let Err(e) = symlink_dir(&source, &dest) {
                warn!(error = %e, "Failed to symlink node_modules into worktree");
            }
        }
    }
}

#[cfg(unix)]
fn symlink_dir(source: &Path, dest: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, dest)
}

#[cfg(windows)]
fn symlink_dir(source: &Path, dest: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(source, dest)
}

/// `pruneWorktrees` — remove stale administrative entries for worktrees deleted by hand.
///
/// # Errors
///
/// Returns an error if `git worktree prune` fails.
pub fn prune_worktrees(repo: &Repository) -> Result<()> {
    WorktreeManager::new(repo).prune()?;
    Ok(())
}

/// Result of `performMerge`'s git step (spec §4.6).
#[derive(Debug, Clone)]
pub struct MergeResult {
    /// Whether the merge stopped on conflicts and the base branch is left mid-merge.
    pub conflicted: bool,
    /// Combined git output, surfaced verbatim so a conflicted merge reports real file paths.
    pub output: String,
}

/// `performMerge`'s git step: check out `worktree.base_branch` in the main repository and merge
/// `worktree.branch` into it, squashing unless `no_squash` is set.
///
/// # Errors
///
/// Propagates any git failure other than a merge conflict, which is reported via
/// `MergeResult::conflicted` instead of an `Err`.
pub fn merge_worktree(repo: &Repository, worktree: &Worktree, squash: bool) -> Result<MergeResult> {
    let message = format!("Merge {} into {}", worktree.branch, worktree.base_branch);
    let outcome = BranchManager::new(repo).merge(&worktree.branch, &worktree.base_branch, squash, &message)?;
    Ok(MergeResult {
        conflicted: outcome.conflicted,
        output: outcome.output,
    })
}

/// Abort a conflicted merge left in progress by `merge_worktree`.
///
/// # Errors
///
/// Returns an error if no merge is in progress or the abort itself fails.
pub fn abort_merge(repo: &Repository) -> Result<()> {
    BranchManager::new(repo).abort_merge()?;
    Ok(())
}

/// Outcome of `cleanupWorktree` (spec §4.6): whether self-protection skipped any pane belonging
/// to the caller's own process.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupOutcome {
    /// `true` if the caller's own pane/ancestry was found inside the worktree's window and was
    /// therefore left running rather than killed.
    pub self_protected: bool,
}

/// `cleanupWorktree` (spec §4.6) — kill every agent pane in the worktree's window (skipping any
/// pane that is the caller itself, per self-protection), remove the git worktree and its branch,
/// and best-effort remove the worktree directory from disk.
///
/// # Errors
///
/// Returns an error only if the git worktree/branch removal itself fails; mux failures are
/// logged and otherwise ignored, since a dead pane is already the desired end state.
pub fn cleanup_worktree(
    repo: &Repository,
    worktree: &Worktree,
    protection: &SelfProtection,
) -> Result<CleanupOutcome> {
    let self_protected = protection.would_cleanup_affect_self(worktree);

    let agents: Vec<&crate::manifest::Agent> = worktree.agents.values().collect();
    let (safe, skipped) = protection.exclude_self(&agents);
    for agent in &safe {
        if let Err(e) = mux::kill_window(&agent.tmux_target) {
            warn!(agent_id = agent.id, error = %e, "Failed to kill agent pane during cleanup");
        }
    }
    if !skipped.is_empty() {
        info!(worktree = worktree.id, count = skipped.len(), "Skipped self-protected panes during cleanup");
    }

    WorktreeManager::new(repo).remove(&worktree.branch)?;

    Ok(CleanupOutcome { self_protected })
}

/// Choose where a newly-spawned agent's pane should live: reuse the worktree's initial window if
/// it has no agents yet, otherwise split the most recently created agent's pane (spec §4.6
/// "spawn target selection" design note — splitting keeps related agents visually grouped rather
/// than scattering them across new windows).
#[must_use]
pub fn choose_spawn_target(worktree: &Worktree) -> SpawnTarget {
    if worktree.agents.is_empty() {
        SpawnTarget::InitialWindow
    } else {
        SpawnTarget::SplitFromWindow
    }
}

/// Where a new agent's pane should be created, decided by `choose_spawn_target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnTarget {
    /// The worktree's window has no agent in it yet; reuse its existing pane.
    InitialWindow,
    /// At least one agent already runs in this worktree; split a new pane from its window.
    SplitFromWindow,
}

/// Resolve `choose_spawn_target`'s decision into an actual mux target string, performing the
/// split if needed.
///
/// # Errors
///
/// Returns an error if the split itself fails.
pub fn resolve_spawn_target(worktree: &Worktree, target: SpawnTarget, worktree_path: &Path) -> Result<String> {
    match target {
        SpawnTarget::InitialWindow => Ok(worktree.tmux_window.clone()),
        SpawnTarget::SplitFromWindow => mux::split_pane(&worktree.tmux_window, SplitDirection::Vertical, worktree_path)
            .map_err(|e| anyhow::anyhow!("Failed to split pane for new agent: {e}").into()),
    }
}

/// Resolve a worktree's absolute filesystem path into a `PathBuf`, matching how worktree records
/// store it (spec §3 "Worktree.path" is an absolute string).
#[must_use]
pub fn worktree_path(worktree: &Worktree) -> PathBuf {
    PathBuf::from(&worktree.path)
}

/// Sweep mux windows that belong to `session` but are not referenced by any tracked worktree's
/// `tmux_window`, used by `performReset`'s orphan cleanup (spec §4.6).
///
/// # Errors
///
/// Returns an error if the session's windows cannot be listed.
pub fn sweep_orphan_windows(session: &str, known_windows: &[String], protection: &SelfProtection) -> Result<usize> {
    let self_pane = protection_self_pane(protection);
    mux::kill_orphan_windows(session, known_windows, self_pane.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to sweep orphan windows: {e}").into())
}

fn protection_self_pane(_protection: &SelfProtection) -> Option<String> {
    mux::current_pane_id()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::test_support::test_worktree;
    use tempfile::TempDir;

    #[test]
    fn test_choose_spawn_target_reuses_empty_window() {
        let wt = test_worktree("wt-aaaaaa");
        assert_eq!(choose_spawn_target(&wt), SpawnTarget::InitialWindow);
    }

    #[test]
    fn test_choose_spawn_target_splits_when_occupied() {
        use crate::manifest::test_support::test_agent;
        let mut wt = test_worktree("wt-aaaaaa");
        let agent = test_agent("ag-aaaaaaaa");
        wt.agents.insert(agent.id.clone(), agent);
        assert_eq!(choose_spawn_target(&wt), SpawnTarget::SplitFromWindow);
    }

    #[test]
    fn test_setup_worktree_env_skips_missing_files_without_erroring() {
        let project = TempDir::new().expect("tempdir");
        let worktree = TempDir::new().expect("tempdir");
        let mut config = Config::default();
        config.env_files = vec![".env".to_string()];
        setup_worktree_env(project.path(), worktree.path(), &config);
        assert!(!worktree.path().join(".env").exists());
    }

    #[test]
    fn test_setup_worktree_env_copies_existing_file() {
        let project = TempDir::new().expect("tempdir");
        let worktree = TempDir::new().expect("tempdir");
        fs::write(project.path().join(".env"), "KEY=value").expect("write");
        let mut config = Config::default();
        config.env_files = vec![".env".to_string()];
        setup_worktree_env(project.path(), worktree.path(), &config);
        assert_eq!(fs::read_to_string(worktree.path().join(".env")).expect("read"), "KEY=value");
    }

    #[test]
    fn test_worktree_path_resolves_to_pathbuf() {
        let wt = test_worktree("wt-aaaaaa");
        assert_eq!(worktree_path(&wt), PathBuf::from("/repo/.worktrees/wt-aaaaaa"));
    }
}
