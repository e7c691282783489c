//! Git subprocess interface.
//!
//! The kernel never links against `git2`; every git operation is a `git` subprocess call,
//! matching the way the kernel treats the multiplexer and `gh` as external CLI collaborators.

mod branch;
mod diff;
mod worktree;

pub use branch::{BranchInfo, Manager as BranchManager, MergeOutcome};
pub use diff::{FileChange, Generator as DiffGenerator, LineChange, Summary as DiffSummary};
pub use worktree::{Info as WorktreeInfo, Manager as WorktreeManager};

use anyhow::{bail, Context, Result};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Repository root, resolved via `git rev-parse --show-toplevel`.
#[derive(Debug, Clone)]
pub struct Repository {
    /// Absolute working directory root of the repository.
    pub root: PathBuf,
}

/// Create a `git` command for the kernel.
///
/// Git hooks can set variables like `GIT_DIR` which override repository discovery and ignore
/// `current_dir`. Clearing these for every child process ensures the kernel operates on the
/// intended worktree, never on whichever repository the caller's shell happened to export.
#[must_use]
pub(crate) fn git_command() -> Command {
    let mut cmd = Command::new("git");
    for var in [
        "GIT_DIR",
        "GIT_WORK_TREE",
        "GIT_INDEX_FILE",
        "GIT_OBJECT_DIRECTORY",
        "GIT_ALTERNATE_OBJECT_DIRECTORIES",
        "GIT_COMMON_DIR",
        "GIT_NAMESPACE",
        "GIT_PREFIX",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

/// Run a git command in `repo_root` and return trimmed stdout.
///
/// # Errors
///
/// Returns an error if the process fails to spawn or exits non-zero.
pub(crate) fn git_output(repo_root: &Path, args: &[&str]) -> Result<String> {
    let output = git_command()
        .args(args)
        .current_dir(repo_root)
        .output()
        .with_context(|| format!("Failed to execute git {}", args.join(" ")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.is_empty() {
            bail!(
                "git {} failed with status {}",
                args.join(" "),
                output.status
            );
        }
        bail!("git {} failed: {stderr}", args.join(" "));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run a git command in `repo_root`, discarding stdout.
///
/// # Errors
///
/// Returns an error if the process fails to spawn or exits non-zero.
pub(crate) fn git_run(repo_root: &Path, args: &[&str]) -> Result<()> {
    git_output(repo_root, args)?;
    Ok(())
}

/// Run a git command capturing combined stdout+stderr regardless of exit status.
///
/// Used where the kernel needs to distinguish *why* git failed (e.g. merge conflict text)
/// rather than only whether it failed.
pub(crate) fn git_output_lossy(repo_root: &Path, args: &[&str]) -> Result<(bool, String)> {
    let output = git_command()
        .args(args)
        .current_dir(repo_root)
        .output()
        .with_context(|| format!("Failed to execute git {}", args.join(" ")))?;
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok((output.status.success(), combined))
}

/// Open a git repository at the given path.
///
/// # Errors
///
/// Returns an error if the path is not inside a git repository.
pub fn open_repository(path: &Path) -> Result<Repository> {
    let root = git_output(path, &["rev-parse", "--show-toplevel"])
        .with_context(|| format!("Failed to open git repository at {}", path.display()))?;
    let root_path = PathBuf::from(root);
    let root = if root_path.is_absolute() {
        root_path
    } else {
        path.join(root_path)
    };
    Ok(Repository { root })
}

/// Check whether a path is inside a git repository's working tree.
#[must_use]
pub fn is_git_repository(path: &Path) -> bool {
    git_command()
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(path)
        .output()
        .map(|o| o.status.success() && String::from_utf8_lossy(&o.stdout).trim() == "true")
        .unwrap_or(false)
}

/// Get the root of the git repository containing the given path.
///
/// # Errors
///
/// Returns an error if the path is not inside a git repository.
pub fn repository_root(path: &Path) -> Result<PathBuf> {
    let repo = open_repository(path)?;
    Ok(repo.root)
}

fn git_path(repo_root: &Path, rel: &str) -> Result<PathBuf> {
    let path = git_output(repo_root, &["rev-parse", "--git-path", rel])?;
    let path_buf = PathBuf::from(path);
    if path_buf.is_absolute() {
        Ok(path_buf)
    } else {
        Ok(repo_root.join(path_buf))
    }
}

/// Ensure `.ppg/` is listed in `.git/info/exclude` for the project root.
///
/// This keeps manifest/log/result state out of version control without requiring the user to
/// edit `.gitignore`. Idempotent; creates `info/` if missing.
///
/// # Errors
///
/// Returns an error if the exclude file cannot be read or written.
pub fn ensure_ppg_excluded(repo_path: &Path) -> Result<()> {
    const EXCLUDE_ENTRY: &str = ".ppg/";

    let exclude_path = git_path(repo_path, "info/exclude")?;

    if let Some(parent) = exclude_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    if exclude_path.exists() {
        let file = fs::File::open(&exclude_path)
            .with_context(|| format!("Failed to open {}", exclude_path.display()))?;
        let reader = BufReader::new(file);
        for line in reader.lines() {
            let line = line.context("Failed to read exclude file")?;
            if line.trim() == EXCLUDE_ENTRY {
                return Ok(());
            }
        }
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&exclude_path)
        .with_context(|| format!("Failed to open {} for writing", exclude_path.display()))?;

    writeln!(file, "{EXCLUDE_ENTRY}")
        .with_context(|| format!("Failed to write to {}", exclude_path.display()))?;

    Ok(())
}
