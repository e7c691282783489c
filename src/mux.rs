//! Mux Adapter (spec §4.3, component C3) — the full interface the kernel drives the terminal
//! multiplexer through, grounded in `crate::tmux` (which already shells out to real tmux, as
//! distinct from the teacher's separate from-scratch pty-based `mux/` daemon, which this crate
//! does not carry forward). String-typed targets are `"session:window"` or
//! `"session:window.pane"`, exactly as spec'd.

use crate::tmux::{self, OutputCapture, SessionManager};
use std::path::Path;
use std::process::Command;

/// Direction to split a pane in (`splitPane`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitDirection {
    /// Split so the new pane sits below the existing one.
    Vertical,
    /// Split so the new pane sits to the side of the existing one.
    Horizontal,
}

/// Structured mux error distinguishing transport faults from stale references (spec §4.3).
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    /// `tmux` is not installed or not reachable.
    #[error("tmux is not installed or not on PATH")]
    NotInstalled,
    /// The target (session/window/pane) does not exist.
    #[error("mux target not found: {0}")]
    TargetNotFound(String),
    /// Any other failure; the `tmux` stderr is preserved for diagnostics.
    #[error("tmux command failed: {0}")]
    Other(String),
}

/// Result alias for mux operations.
pub type Result<T> = std::result::Result<T, MuxError>;

/// Information about a single pane, as returned by `listSessionPanes`/`paneInfo`.
#[derive(Debug, Clone)]
pub struct PaneInfo {
    /// Index of the window this pane belongs to.
    pub window_index: u32,
    /// Opaque pane id (e.g. `%12`), stable across window/session renames.
    pub pane_id: String,
    /// Program currently running in the pane (e.g. `claude`, `bash`).
    pub command: String,
    /// OS process id of the pane's foreground process.
    pub pid: u32,
    /// Whether the pane's process has exited (`tmux` marks dead panes this way when
    /// `remain-on-exit` is set; absent otherwise, in which case the pane simply disappears).
    pub is_dead: bool,
}

fn run(args: &[&str]) -> Result<std::process::Output> {
    tmux::tmux_command()
        .args(args)
        .output()
        .map_err(|_| MuxError::NotInstalled)
}

fn classify_failure(stderr: &str) -> MuxError {
    if stderr.contains("can't find") || stderr.contains("unknown") || stderr.contains("no such") {
        MuxError::TargetNotFound(stderr.trim().to_string())
    } else {
        MuxError::Other(stderr.trim().to_string())
    }
}

/// Whether the `tmux` binary is installed and runnable.
#[must_use]
pub fn is_available() -> bool {
    tmux::is_available()
}

/// Ensure a session named `name` exists, creating it (detached, rooted at `cwd`) if absent.
///
/// # Errors
///
/// Returns `MuxError::NotInstalled` if tmux cannot be run, or `MuxError::Other` if session
/// creation fails for a reason other than "already exists".
pub fn ensure_session(name: &str, cwd: &Path) -> Result<()> {
    let manager = SessionManager::new();
    if manager.exists(name) {
        return Ok(());
    }
    manager
        .create(name, cwd, None)
        .map_err(|e| classify_failure(&e.to_string()))
}

/// List all multiplexer sessions.
///
/// # Errors
///
/// Returns `MuxError::NotInstalled` if tmux cannot be run.
pub fn list_sessions() -> Result<Vec<String>> {
    let manager = SessionManager::new();
    manager
        .list()
        .map(|sessions| sessions.into_iter().map(|s| s.name).collect())
        .map_err(|_| MuxError::NotInstalled)
}

/// Create a new window in `session` named `name`, rooted at `cwd`. Returns the window target
/// (`session:index`).
///
/// # Errors
///
/// Returns an error if the window cannot be created.
pub fn create_window(session: &str, name: &str, cwd: &Path) -> Result<String> {
    let manager = SessionManager::new();
    let index = manager
        .create_window(session, name, cwd, None)
        .map_err(|e| classify_failure(&e.to_string()))?;
    Ok(SessionManager::window_target(session, index))
}

/// Kill a window by target (`session:index`).
///
/// Tolerates an already-dead target (best-effort per spec §4.5 `killAgent`/cleanup semantics).
///
/// # Errors
///
/// Returns `MuxError::NotInstalled` if tmux cannot be run at all.
pub fn kill_window(target: &str) -> Result<()> {
    let output = run(&["kill-window", "-t", target])?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("can't find") {
            return Ok(());
        }
    }
    Ok(())
}

/// List the windows of `session` as `(index, name)` pairs.
///
/// # Errors
///
/// Returns an error if the session cannot be queried.
pub fn list_session_windows(session: &str) -> Result<Vec<(u32, String)>> {
    let output = run(&[
        "list-windows",
        "-t",
        session,
        "-F",
        "#{window_index}:#{window_name}",
    ])?;
    if !output.status.success() {
        return Err(classify_failure(&String::from_utf8_lossy(&output.stderr)));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout
        .lines()
        .filter_map(|line| {
            let (idx, name) = line.split_once(':')?;
            Some((idx.parse().ok()?, name.to_string()))
        })
        .collect())
}

/// Kill every window in `session` that is not referenced by any known worktree/master agent
/// target, except (optionally) the caller's own pane's window. Returns the number killed.
///
/// This is the one caller allowed to touch mux windows outside the manifest's bookkeeping
/// (spec §5 "Shared-resource policy").
///
/// # Errors
///
/// Returns an error if the session's windows cannot be listed.
pub fn kill_orphan_windows(
    session: &str,
    known_targets: &[String],
    except_pane: Option<&str>,
) -> Result<usize> {
    let windows = list_session_windows(session)?;
    let mut killed = 0;
    for (index, _name) in windows {
        let target = SessionManager::window_target(session, index);
        if known_targets.iter().any(|t| t.starts_with(&target)) {
            continue;
        }
        if let Some(pane) = except_pane {
            if let Ok(info) = pane_info(&target) {
                if info.pane_id == pane {
                    continue;
                }
            }
        }
        kill_window(&target)?;
        killed += 1;
    }
    Ok(killed)
}

/// Split the pane at `window_target` in `direction`, rooted at `cwd`. Returns the new pane
/// target (`session:window.pane_id`).
///
/// # Errors
///
/// Returns an error if the split fails.
pub fn split_pane(window_target: &str, direction: SplitDirection, cwd: &Path) -> Result<String> {
    let flag = match direction {
        SplitDirection::Horizontal => "-h",
        SplitDirection::Vertical => "-v",
    };
    let output = tmux::tmux_command()
        .args(["split-window", "-t", window_target, flag, "-c"])
        .arg(cwd)
        .args(["-P", "-F", "#{pane_id}"])
        .output()
        .map_err(|_| MuxError::NotInstalled)?;
    if !output.status.success() {
        return Err(classify_failure(&String::from_utf8_lossy(&output.stderr)));
    }
    let pane_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let session = window_target
        .split(':')
        .next()
        .unwrap_or_default()
        .to_string();
    Ok(format!("{session}:{pane_id}"))
}

/// Select (focus) a window.
///
/// # Errors
///
/// Returns an error if the window does not exist.
pub fn select_window(target: &str) -> Result<()> {
    let output = run(&["select-window", "-t", target])?;
    if !output.status.success() {
        return Err(classify_failure(&String::from_utf8_lossy(&output.stderr)));
    }
    Ok(())
}

/// Select (focus) a pane.
///
/// # Errors
///
/// Returns an error if the pane does not exist.
pub fn select_pane(target: &str) -> Result<()> {
    let output = run(&["select-pane", "-t", target])?;
    if !output.status.success() {
        return Err(classify_failure(&String::from_utf8_lossy(&output.stderr)));
    }
    Ok(())
}

/// Whether the current process is itself running inside a multiplexer pane.
#[must_use]
pub fn is_inside() -> bool {
    std::env::var_os("TMUX").is_some()
}

/// The opaque pane id (`%N`) of the pane the current process is running in, if any.
#[must_use]
pub fn current_pane_id() -> Option<String> {
    std::env::var("TMUX_PANE").ok().filter(|s| !s.is_empty())
}

/// Send `text` to `target` followed by Enter (`sendKeys`).
///
/// # Errors
///
/// Returns an error if the target does not exist.
pub fn send_keys(target: &str, text: &str) -> Result<()> {
    let output = run(&["send-keys", "-t", target, text, "Enter"])?;
    if !output.status.success() {
        return Err(classify_failure(&String::from_utf8_lossy(&output.stderr)));
    }
    Ok(())
}

/// Send `text` to `target` without a trailing Enter (`sendLiteral`).
///
/// # Errors
///
/// Returns an error if the target does not exist.
pub fn send_literal(target: &str, text: &str) -> Result<()> {
    let output = run(&["send-keys", "-l", "-t", target, text])?;
    if !output.status.success() {
        return Err(classify_failure(&String::from_utf8_lossy(&output.stderr)));
    }
    Ok(())
}

/// Send a named key (e.g. `C-c`, `Enter`) to `target` (`sendRawKeys`).
///
/// # Errors
///
/// Returns an error if the target does not exist.
pub fn send_raw_keys(target: &str, key_name: &str) -> Result<()> {
    let output = run(&["send-keys", "-t", target, key_name])?;
    if !output.status.success() {
        return Err(classify_failure(&String::from_utf8_lossy(&output.stderr)));
    }
    Ok(())
}

/// Capture the visible (or last `last_n` lines of) pane content.
///
/// # Errors
///
/// Returns an error if the target does not exist.
pub fn capture_pane(target: &str, last_n: Option<u32>) -> Result<String> {
    let capture = OutputCapture::new();
    match last_n {
        Some(n) => capture
            .capture_pane_with_history(target, n)
            .map_err(|e| classify_failure(&e.to_string())),
        None => capture
            .capture_pane(target)
            .map_err(|e| classify_failure(&e.to_string())),
    }
}

/// List every pane in `session`, keyed by pane id.
///
/// Batched into a single `tmux list-panes` call so the status reconciler (C7) can refresh every
/// agent's status with O(1) subprocess invocations per session rather than O(agents).
///
/// # Errors
///
/// Returns an error if the session cannot be queried.
pub fn list_session_panes(session: &str) -> Result<std::collections::BTreeMap<String, PaneInfo>> {
    let output = run(&[
        "list-panes",
        "-t",
        session,
        "-a",
        "-F",
        "#{window_index}:#{pane_id}:#{pane_current_command}:#{pane_pid}:#{pane_dead}",
    ])?;
    if !output.status.success() {
        return Err(classify_failure(&String::from_utf8_lossy(&output.stderr)));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut panes = std::collections::BTreeMap::new();
    for line in stdout.lines() {
        let parts: Vec<&str> = line.splitn(5, ':').collect();
        let [window_index, pane_id, command, pid, is_dead] = parts.as_slice() else {
            continue;
        };
        let Ok(window_index) = window_index.parse() else {
            continue;
        };
        let Ok(pid) = pid.parse() else { continue };
        panes.insert(
            (*pane_id).to_string(),
            PaneInfo {
                window_index,
                pane_id: (*pane_id).to_string(),
                command: (*command).to_string(),
                pid,
                is_dead: *is_dead == "1",
            },
        );
    }
    Ok(panes)
}

/// Look up info for a single pane target (`session:window` or `session:window.pane`).
///
/// # Errors
///
/// Returns `MuxError::TargetNotFound` if the target does not exist.
pub fn pane_info(target: &str) -> Result<PaneInfo> {
    let output = run(&[
        "display-message",
        "-t",
        target,
        "-p",
        "#{window_index}:#{pane_id}:#{pane_current_command}:#{pane_pid}:#{pane_dead}",
    ])?;
    if !output.status.success() {
        return Err(classify_failure(&String::from_utf8_lossy(&output.stderr)));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let parts: Vec<&str> = stdout.trim().splitn(5, ':').collect();
    let [window_index, pane_id, command, pid, is_dead] = parts.as_slice() else {
        return Err(MuxError::Other(format!("unexpected display-message output: {stdout}")));
    };
    Ok(PaneInfo {
        window_index: window_index
            .parse()
            .map_err(|_| MuxError::Other("bad window index".to_string()))?,
        pane_id: (*pane_id).to_string(),
        command: (*command).to_string(),
        pid: pid.parse().unwrap_or(0),
        is_dead: *is_dead == "1",
    })
}

/// Open a desktop terminal emulator attached to `target`, best-effort. Failures are swallowed:
/// this is a convenience side-effect of `performSpawn`, never load-bearing (spec §4.6 step 8).
pub fn open_desktop_terminal(session: &str) {
    let attach_cmd = SessionManager::attach_command(session);
    let candidates: [(&str, &[&str]); 2] = [
        ("x-terminal-emulator", &["-e"]),
        ("open", &["-a", "Terminal"]),
    ];
    for (program, prefix_args) in candidates {
        let mut cmd = Command::new(program);
        cmd.args(prefix_args).arg(&attach_cmd);
        if cmd.spawn().is_ok() {
            return;
        }
    }
}
