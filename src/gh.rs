//! GitHub CLI subprocess interface (spec §1 "the GitHub CLI (`gh pr create`, `gh pr view`)").
//!
//! Grounded in `crate::git`'s subprocess style: never linked against a GitHub API client, every
//! call shells out to the real `gh` binary, matching the kernel's general stance that git/gh/mux
//! are external collaborators driven only through their CLIs.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::Command;

/// Whether the `gh` binary is installed and runnable.
#[must_use]
pub fn is_available() -> bool {
    Command::new("gh")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// State of a pull request as reported by `gh pr view --json state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrState {
    /// Open and unmerged.
    Open,
    /// Merged.
    Merged,
    /// Closed without merging.
    Closed,
}

/// `gh pr create --head <branch> --base <baseBranch> --title <title> --body <body> [--draft]`
/// (spec §4.6 `performPr`). Returns the created PR's URL.
///
/// # Errors
///
/// Returns an error if `gh` is not installed or the command fails (e.g. no remote configured).
pub fn create_pr(
    repo_dir: &Path,
    branch: &str,
    base_branch: &str,
    title: &str,
    body: &str,
    draft: bool,
) -> Result<String> {
    let mut cmd = Command::new("gh");
    cmd.args([
        "pr",
        "create",
        "--head",
        branch,
        "--base",
        base_branch,
        "--title",
        title,
        "--body",
        body,
    ]);
    if draft {
        cmd.arg("--draft");
    }
    let output = cmd
        .current_dir(repo_dir)
        .output()
        .context("Failed to execute gh pr create")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("gh pr create failed: {}", stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// `gh pr view <branch> --json state` (spec §4.6 `performReset`'s open-PR guard).
///
/// # Errors
///
/// Returns an error if `gh` is not installed. Returns `Ok(None)` if no PR exists for the branch.
pub fn pr_state(repo_dir: &Path, branch: &str) -> Result<Option<PrState>> {
    let output = Command::new("gh")
        .args(["pr", "view", branch, "--json", "state"])
        .current_dir(repo_dir)
        .output()
        .context("Failed to execute gh pr view")?;

    if !output.status.success() {
        return Ok(None);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value =
        serde_json::from_str(&stdout).context("Failed to parse gh pr view output")?;
    let state = parsed.get("state").and_then(|v| v.as_str()).unwrap_or("");
    Ok(match state {
        "OPEN" => Some(PrState::Open),
        "MERGED" => Some(PrState::Merged),
        "CLOSED" => Some(PrState::Closed),
        _ => None,
    })
}

/// Assemble a PR body from each worktree agent's result file, joined by `\n\n---\n\n`, truncated
/// to 60,000 characters with a truncation marker appended (spec §4.6 `performPr`).
#[must_use]
pub fn assemble_pr_body(result_contents: &[String]) -> String {
    const MAX_LEN: usize = 60_000;
    const MARKER: &str = "\n\n[truncated]";

    let joined = result_contents.join("\n\n---\n\n");
    if joined.len() <= MAX_LEN {
        return joined;
    }

    let mut truncated = joined;
    let keep = MAX_LEN.saturating_sub(MARKER.len());
    let boundary = (0..=keep).rev().find(|&i| truncated.is_char_boundary(i)).unwrap_or(0);
    truncated.truncate(boundary);
    truncated.push_str(MARKER);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_pr_body_joins_with_separator() {
        let body = assemble_pr_body(&["first".to_string(), "second".to_string()]);
        assert_eq!(body, "first\n\n---\n\nsecond");
    }

    #[test]
    fn test_assemble_pr_body_truncates_long_input() {
        let long = "x".repeat(70_000);
        let body = assemble_pr_body(&[long]);
        assert!(body.len() <= 60_000);
        assert!(body.ends_with("[truncated]"));
    }

    #[test]
    fn test_assemble_pr_body_empty_input() {
        assert_eq!(assemble_pr_body(&[]), "");
    }
}
