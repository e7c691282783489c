//! Git branch management (subprocess-based).

use anyhow::{bail, Context, Result};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::{git_command, git_output, git_output_lossy, git_run, Repository};

/// Outcome of a `merge`/`mergeSquash` attempt (spec §4.6 `performMerge`).
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Whether the merge stopped on conflicts, leaving the working tree in a conflicted state.
    pub conflicted: bool,
    /// Combined stdout+stderr from the `git merge` invocation, surfaced to the caller so a
    /// conflicted merge can be reported with the actual conflicting paths.
    pub output: String,
}

/// Information about a git branch for selection/listing UIs driven off this crate.
#[derive(Debug, Clone)]
pub struct BranchInfo {
    /// Branch name (without remote prefix for remote branches)
    pub name: String,
    /// Full reference name (e.g., "refs/remotes/origin/main")
    pub full_name: String,
    /// Whether this is a remote branch
    pub is_remote: bool,
    /// Remote name (e.g., "origin") for remote branches
    pub remote: Option<String>,
    /// Last commit time (for sorting)
    pub last_commit_time: Option<SystemTime>,
}

/// Manager for git branch operations.
pub struct Manager<'a> {
    /// Repository handle.
    pub repo: &'a Repository,
}

impl std::fmt::Debug for Manager<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager").finish_non_exhaustive()
    }
}

impl<'a> Manager<'a> {
    /// Create a new branch manager for the given repository.
    #[must_use]
    pub const fn new(repo: &'a Repository) -> Self {
        Self { repo }
    }

    /// Create a new branch from HEAD.
    ///
    /// # Errors
    ///
    /// Returns an error if the branch cannot be created.
    pub fn create(&self, name: &str) -> Result<()> {
        git_run(&self.repo.root, &["branch", name])
            .with_context(|| format!("Failed to create branch '{name}'"))
    }

    /// Create a new branch from a specific commit or ref.
    ///
    /// # Errors
    ///
    /// Returns an error if the branch cannot be created.
    pub fn create_from_commit(&self, name: &str, commit_id: &str) -> Result<()> {
        git_run(&self.repo.root, &["branch", name, commit_id])
            .with_context(|| format!("Failed to create branch '{name}' at {commit_id}"))
    }

    /// Delete a local branch.
    ///
    /// # Errors
    ///
    /// Returns an error if the branch cannot be deleted.
    pub fn delete(&self, name: &str) -> Result<()> {
        git_run(&self.repo.root, &["branch", "-D", name])
            .with_context(|| format!("Failed to delete branch '{name}'"))
    }

    /// Check if a branch exists.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        let status = git_command()
            .args([
                "show-ref",
                "--verify",
                "--quiet",
                &format!("refs/heads/{name}"),
            ])
            .current_dir(&self.repo.root)
            .status();

        status.map(|s| s.success()).unwrap_or(false)
    }

    /// Get the current branch name.
    ///
    /// # Errors
    ///
    /// Returns an error if HEAD is not a branch (detached).
    pub fn current(&self) -> Result<String> {
        let name = git_output(&self.repo.root, &["rev-parse", "--abbrev-ref", "HEAD"])
            .context("Failed to get HEAD")?;
        if name == "HEAD" {
            bail!("HEAD is not a branch (detached HEAD state)");
        }
        Ok(name)
    }

    /// List all local branches.
    ///
    /// # Errors
    ///
    /// Returns an error if branches cannot be listed.
    pub fn list(&self) -> Result<Vec<String>> {
        let output = git_output(
            &self.repo.root,
            &["for-each-ref", "--format=%(refname:short)", "refs/heads"],
        )
        .context("Failed to list branches")?;

        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    /// Checkout a branch.
    ///
    /// # Errors
    ///
    /// Returns an error if the branch cannot be checked out.
    pub fn checkout(&self, name: &str) -> Result<()> {
        git_run(&self.repo.root, &["checkout", name])
            .with_context(|| format!("Failed to checkout branch '{name}'"))
    }

    /// Get the commit count reachable from a branch.
    ///
    /// # Errors
    ///
    /// Returns an error if the branch or commits cannot be read.
    pub fn commit_count(&self, name: &str) -> Result<usize> {
        let output = git_output(&self.repo.root, &["rev-list", "--count", name])
            .with_context(|| format!("Failed to read commit count for '{name}'"))?;
        let count = output
            .parse::<usize>()
            .with_context(|| format!("Invalid commit count '{output}'"))?;
        Ok(count)
    }

    /// Determine the best-guess base branch for a worktree's branch.
    ///
    /// Tries, in order: the reflog message left by `git worktree add -b`
    /// ("Created from <ref>"), the remote `HEAD` symbolic ref, then a fixed
    /// candidate list (`main`, `master`, `develop`) checked locally and on `origin`.
    ///
    /// # Errors
    ///
    /// Returns an error only if git itself cannot be invoked at all.
    pub fn detect_base_branch(&self, branch: &str) -> Result<Option<String>> {
        if let Ok(reflog) = git_output(
            &self.repo.root,
            &["reflog", "show", "--format=%gs", branch],
        ) {
            for line in reflog.lines().rev() {
                if let Some(rest) = line.strip_prefix("branch: Created from ") {
                    let candidate = rest.trim();
                    if !candidate.is_empty() && candidate != branch {
                        return Ok(Some(candidate.to_string()));
                    }
                }
            }
        }

        if let Ok(symbolic) = git_output(
            &self.repo.root,
            &[
                "symbolic-ref",
                "--quiet",
                "--short",
                "refs/remotes/origin/HEAD",
            ],
        ) {
            if let Some(name) = symbolic.strip_prefix("origin/") {
                if !name.is_empty() {
                    return Ok(Some(name.to_string()));
                }
            }
        }

        for candidate in ["main", "master", "develop"] {
            if candidate == branch {
                continue;
            }
            let local_exists = git_command()
                .args([
                    "show-ref",
                    "--verify",
                    "--quiet",
                    &format!("refs/heads/{candidate}"),
                ])
                .current_dir(&self.repo.root)
                .status()
                .map(|s| s.success())
                .unwrap_or(false);
            if local_exists {
                return Ok(Some(candidate.to_string()));
            }

            let remote_exists = git_command()
                .args([
                    "show-ref",
                    "--verify",
                    "--quiet",
                    &format!("refs/remotes/origin/{candidate}"),
                ])
                .current_dir(&self.repo.root)
                .status()
                .map(|s| s.success())
                .unwrap_or(false);
            if remote_exists {
                return Ok(Some(candidate.to_string()));
            }
        }

        Ok(None)
    }

    /// List all branches for a selector UI.
    ///
    /// Returns branches sorted with `main`/`master` first, local branches before remote,
    /// and within each group by most recent commit.
    ///
    /// # Errors
    ///
    /// Returns an error if branches cannot be listed.
    pub fn list_for_selector(&self) -> Result<Vec<BranchInfo>> {
        let output = git_output(
            &self.repo.root,
            &[
                "for-each-ref",
                "--format=%(refname)\t%(refname:short)\t%(committerdate:unix)",
                "refs/heads",
                "refs/remotes",
            ],
        )
        .context("Failed to list branches")?;

        let mut local_branches = Vec::new();
        let mut remote_branches = Vec::new();

        for line in output.lines() {
            let mut parts = line.splitn(3, '\t');
            let Some(ref_name) = parts.next() else {
                continue;
            };
            let Some(short_name) = parts.next() else {
                continue;
            };
            let commit_time = parts
                .next()
                .and_then(|t| t.parse::<u64>().ok())
                .and_then(|secs| UNIX_EPOCH.checked_add(Duration::from_secs(secs)));

            if ref_name.starts_with("refs/remotes/") {
                if short_name.ends_with("/HEAD") {
                    continue;
                }

                let mut short_parts = short_name.splitn(2, '/');
                let remote_name = short_parts.next().map(str::to_string);
                let branch_name = short_parts
                    .next()
                    .map_or_else(|| short_name.to_string(), str::to_string);

                remote_branches.push(BranchInfo {
                    name: branch_name,
                    full_name: ref_name.to_string(),
                    is_remote: true,
                    remote: remote_name,
                    last_commit_time: commit_time,
                });
            } else if ref_name.starts_with("refs/heads/") {
                local_branches.push(BranchInfo {
                    name: short_name.to_string(),
                    full_name: ref_name.to_string(),
                    is_remote: false,
                    remote: None,
                    last_commit_time: commit_time,
                });
            }
        }

        local_branches.sort_by(|a, b| {
            let a_priority = Self::branch_priority(&a.name);
            let b_priority = Self::branch_priority(&b.name);
            match b_priority.cmp(&a_priority) {
                std::cmp::Ordering::Equal => b.last_commit_time.cmp(&a.last_commit_time),
                other => other,
            }
        });

        remote_branches.sort_by(|a, b| {
            let a_priority = Self::branch_priority(&a.name);
            let b_priority = Self::branch_priority(&b.name);
            match b_priority.cmp(&a_priority) {
                std::cmp::Ordering::Equal => b.last_commit_time.cmp(&a.last_commit_time),
                other => other,
            }
        });

        let mut result = local_branches;
        result.extend(remote_branches);
        Ok(result)
    }

    fn branch_priority(name: &str) -> u8 {
        match name {
            "main" => 2,
            "master" => 1,
            _ => 0,
        }
    }

    /// `performMerge`'s git step: check out `base` in the main repository, then merge `branch`
    /// into it, either as a single squash commit (`squash = true`, committed with `message`) or
    /// a merge commit (`--no-ff`, also committed with `message`).
    ///
    /// Distinguishes a merge conflict (returned as `Ok` with `conflicted = true`, leaving the
    /// working tree mid-merge for the caller to report or abort) from any other git failure
    /// (returned as `Err`), using the combined stdout+stderr text `git_output_lossy` captures.
    ///
    /// # Errors
    ///
    /// Returns an error if `base` cannot be checked out, or if `git merge` fails for a reason
    /// other than a conflict.
    pub fn merge(&self, branch: &str, base: &str, squash: bool, message: &str) -> Result<MergeOutcome> {
        git_run(&self.repo.root, &["checkout", base])
            .with_context(|| format!("Failed to checkout base branch '{base}'"))?;

        let (ok, output) = if squash {
            git_output_lossy(&self.repo.root, &["merge", "--squash", branch])?
        } else {
            git_output_lossy(&self.repo.root, &["merge", "--no-ff", branch, "-m", message])?
        };

        if !ok {
            if output.contains("CONFLICT") || output.contains("Automatic merge failed") {
                return Ok(MergeOutcome {
                    conflicted: true,
                    output,
                });
            }
            bail!("git merge failed: {output}");
        }

        if squash {
            git_run(&self.repo.root, &["commit", "-m", message])
                .context("Failed to commit squashed merge")?;
        }

        Ok(MergeOutcome {
            conflicted: false,
            output,
        })
    }

    /// Abort an in-progress conflicted merge, restoring the base branch to its pre-merge state.
    ///
    /// # Errors
    ///
    /// Returns an error if no merge is in progress or the abort fails.
    pub fn abort_merge(&self) -> Result<()> {
        git_run(&self.repo.root, &["merge", "--abort"]).context("Failed to abort merge")
    }

    /// Push `branch` to `origin`, creating the upstream tracking ref (`performPr`'s git step,
    /// spec §4.9).
    ///
    /// # Errors
    ///
    /// Returns an error if the push fails (no `origin` remote, rejected push, network failure).
    pub fn push(&self, branch: &str) -> Result<()> {
        git_run(&self.repo.root, &["push", "-u", "origin", branch])
            .with_context(|| format!("Failed to push branch '{branch}' to origin"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn init_test_repo_with_commit() -> Result<(TempDir, Repository), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        git_command()
            .args(["init"])
            .current_dir(temp_dir.path())
            .status()?;
        git_command()
            .args(["config", "user.email", "test@test.com"])
            .current_dir(temp_dir.path())
            .status()?;
        git_command()
            .args(["config", "user.name", "Test"])
            .current_dir(temp_dir.path())
            .status()?;

        fs::write(temp_dir.path().join("README.md"), "# Test")?;
        git_command()
            .args(["add", "README.md"])
            .current_dir(temp_dir.path())
            .status()?;
        git_command()
            .args(["commit", "-m", "Initial commit"])
            .current_dir(temp_dir.path())
            .status()?;

        let repo = Repository {
            root: temp_dir.path().canonicalize()?,
        };
        Ok((temp_dir, repo))
    }

    #[test]
    fn test_create_branch() -> Result<(), Box<dyn std::error::Error>> {
        let (_temp_dir, repo) = init_test_repo_with_commit()?;
        let manager = Manager::new(&repo);

        manager.create("feature/test")?;
        assert!(manager.exists("feature/test"));
        Ok(())
    }

    #[test]
    fn test_create_duplicate_branch() -> Result<(), Box<dyn std::error::Error>> {
        let (_temp_dir, repo) = init_test_repo_with_commit()?;
        let manager = Manager::new(&repo);

        manager.create("feature/test")?;
        let result = manager.create("feature/test");
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn test_delete_branch() -> Result<(), Box<dyn std::error::Error>> {
        let (_temp_dir, repo) = init_test_repo_with_commit()?;
        let manager = Manager::new(&repo);

        manager.create("feature/test")?;
        assert!(manager.exists("feature/test"));

        manager.delete("feature/test")?;
        assert!(!manager.exists("feature/test"));
        Ok(())
    }

    #[test]
    fn test_delete_nonexistent_branch() -> Result<(), Box<dyn std::error::Error>> {
        let (_temp_dir, repo) = init_test_repo_with_commit()?;
        let manager = Manager::new(&repo);

        let result = manager.delete("nonexistent");
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn test_current_branch() -> Result<(), Box<dyn std::error::Error>> {
        let (_temp_dir, repo) = init_test_repo_with_commit()?;
        let manager = Manager::new(&repo);

        let current = manager.current()?;
        assert!(!current.is_empty());
        Ok(())
    }

    #[test]
    fn test_list_branches() -> Result<(), Box<dyn std::error::Error>> {
        let (_temp_dir, repo) = init_test_repo_with_commit()?;
        let manager = Manager::new(&repo);

        manager.create("feature/a")?;
        manager.create("feature/b")?;

        let branches = manager.list()?;
        assert!(branches.len() >= 3);
        assert!(branches.iter().any(|b| b == "feature/a"));
        assert!(branches.iter().any(|b| b == "feature/b"));
        Ok(())
    }

    #[test]
    fn test_checkout() -> Result<(), Box<dyn std::error::Error>> {
        let (_temp_dir, repo) = init_test_repo_with_commit()?;
        let manager = Manager::new(&repo);

        manager.create("feature/test")?;
        manager.checkout("feature/test")?;

        assert_eq!(manager.current()?, "feature/test");
        Ok(())
    }

    #[test]
    fn test_detect_base_branch_falls_back_to_main() -> Result<(), Box<dyn std::error::Error>> {
        let (_temp_dir, repo) = init_test_repo_with_commit()?;
        let manager = Manager::new(&repo);

        manager.checkout("feature/test")?;
        let current = manager.current()?;
        manager.create_from_commit("main", &current)?;

        let base = manager.detect_base_branch("feature/test")?;
        assert_eq!(base.as_deref(), Some("main"));
        Ok(())
    }

    #[test]
    fn test_merge_squash_commits_onto_base() -> Result<(), Box<dyn std::error::Error>> {
        let (temp_dir, repo) = init_test_repo_with_commit()?;
        let manager = Manager::new(&repo);

        manager.create("feature/squash")?;
        manager.checkout("feature/squash")?;
        fs::write(temp_dir.path().join("feature.txt"), "feature work")?;
        git_command().args(["add", "feature.txt"]).current_dir(temp_dir.path()).status()?;
        git_command().args(["commit", "-m", "feature work"]).current_dir(temp_dir.path()).status()?;
        manager.checkout("main")?;

        let outcome = manager.merge("feature/squash", "main", true, "Squash merge feature/squash")?;
        assert!(!outcome.conflicted);
        assert!(temp_dir.path().join("feature.txt").exists());
        Ok(())
    }

    #[test]
    fn test_merge_reports_conflict_without_erroring() -> Result<(), Box<dyn std::error::Error>> {
        let (temp_dir, repo) = init_test_repo_with_commit()?;
        let manager = Manager::new(&repo);

        manager.create("feature/conflict")?;
        manager.checkout("feature/conflict")?;
        fs::write(temp_dir.path().join("README.md"), "feature version")?;
        git_command().args(["add", "README.md"]).current_dir(temp_dir.path()).status()?;
        git_command().args(["commit", "-m", "feature edit"]).current_dir(temp_dir.path()).status()?;

        manager.checkout("main")?;
        fs::write(temp_dir.path().join("README.md"), "main version")?;
        git_command().args(["add", "README.md"]).current_dir(temp_dir.path()).status()?;
        git_command().args(["commit", "-m", "main edit"]).current_dir(temp_dir.path()).status()?;

        let outcome = manager.merge("feature/conflict", "main", false, "Merge feature/conflict")?;
        assert!(outcome.conflicted);
        manager.abort_merge()?;
        Ok(())
    }
}
