//! Shared scaffolding for the scenario-level integration tests, in the style of the teacher
//! crate's `tests/common/fixture.rs` (a throwaway git repo per test, a unique session-name
//! prefix, best-effort mux cleanup).

use std::process::Command;
use tempfile::TempDir;

/// A throwaway git repository wired up with a `ppg` session name unique to the test.
pub struct Fixture {
    /// Keeps the temp directory alive for the fixture's lifetime.
    pub dir: TempDir,
    /// Session name used for this fixture's tmux session (unique per test to avoid collisions
    /// when tests run in parallel).
    pub session_name: String,
}

impl Fixture {
    /// Initialize a fresh git repository with one commit on `main`, in a temp directory.
    #[must_use]
    pub fn new(label: &str) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();

        run_git(root, &["init", "-b", "main"]);
        run_git(root, &["config", "user.email", "test@example.com"]);
        run_git(root, &["config", "user.name", "Test"]);
        std::fs::write(root.join("README.md"), "hello\n").expect("write README");
        run_git(root, &["add", "."]);
        run_git(root, &["commit", "-m", "initial"]);

        let session_name = format!("ppgtest-{label}-{}", std::process::id());
        Self { dir, session_name }
    }

    /// Project root this fixture's repository lives at.
    #[must_use]
    pub fn root(&self) -> &std::path::Path {
        self.dir.path()
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = Command::new("tmux").args(["kill-session", "-t", &self.session_name]).output();
    }
}

fn run_git(root: &std::path::Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(root)
        .status()
        .unwrap_or_else(|e| panic!("failed to run git {args:?}: {e}"));
    assert!(status.success(), "git {args:?} failed");
}

/// Whether a usable `tmux` binary is on `PATH`. Tests that spawn real agents into panes skip
/// themselves when this is false, matching the teacher's `skip_if_no_tmux` pattern — this kernel
/// has no bundled mux implementation to fall back to.
#[must_use]
pub fn skip_if_no_tmux() -> bool {
    !ppg::mux::is_available()
}
