//! Process Identity & Self-Protection (spec §4.4, component C4).
//!
//! Built once per destructive operation from `mux::current_pane_id()` plus a
//! `mux::list_session_panes()` snapshot, then passed by value to every helper the operation
//! calls (spec §9 design note: "express it as a dedicated type built once per operation and
//! passed by value rather than reconstructed by each helper").
//!
//! Pane ancestry: the caller's OS pid is rarely the pane's own `pane_pid` (the pane runs a shell
//! that then runs this CLI), so ancestry is established by walking `/proc/<pid>/stat` parent
//! links on Linux. macOS/Windows lack `/proc`, so there we fall back to pane-id equality only
//! (`$TMUX_PANE` match, no ancestry walk) — a narrower guarantee, documented rather than silently
//! assumed away.

use crate::manifest::{Agent, Worktree};
use crate::mux::PaneInfo;
use std::collections::BTreeMap;

/// Self-protection context for a single destructive operation.
#[derive(Debug, Clone)]
pub struct SelfProtection {
    /// The caller's own pane id, if the caller is itself running inside the mux.
    self_pane_id: Option<String>,
    /// Every ancestor pid of the calling process, including the process's own pid, used to
    /// recognize a pane whose foreground process is an ancestor of the caller (e.g. the shell
    /// that launched this CLI).
    ancestor_pids: Vec<u32>,
    /// Snapshot of every pane in the session at the moment this context was built.
    panes: BTreeMap<String, PaneInfo>,
}

impl SelfProtection {
    /// Build a self-protection context for `session`, capturing the caller's own pane id (if
    /// any) and a snapshot of every pane currently in the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session's panes cannot be listed.
    pub fn capture(session: &str) -> crate::mux::Result<Self> {
        let self_pane_id = crate::mux::current_pane_id();
        let panes = crate::mux::list_session_panes(session)?;
        let ancestor_pids = ancestor_pids(std::process::id());
        Ok(Self {
            self_pane_id,
            ancestor_pids,
            panes,
        })
    }

    /// Build a context with no self-pane known (the caller is not inside the mux, or the
    /// session does not exist yet). Used by operations that run before any window exists.
    #[must_use]
    pub fn none() -> Self {
        Self {
            self_pane_id: None,
            ancestor_pids: Vec::new(),
            panes: BTreeMap::new(),
        }
    }

    /// Whether `pane_id` equals the caller's own pane, or the pane's foreground process is an
    /// ancestor of the caller's process.
    #[must_use]
    pub fn is_self_or_ancestor(&self, pane_id: &str) -> bool {
        if self.self_pane_id.as_deref() == Some(pane_id) {
            return true;
        }
        self.panes
            .get(pane_id)
            .is_some_and(|info| self.ancestor_pids.contains(&info.pid))
    }

    /// `wouldCleanupAffectSelf(worktree)` (spec §4.4) — true if any pane belonging to the
    /// worktree's window contains the caller's pane or the caller's process ancestry.
    #[must_use]
    pub fn would_cleanup_affect_self(&self, worktree: &Worktree) -> bool {
        let Some((_, window_index_str)) = worktree.tmux_window.split_once(':') else {
            return false;
        };
        let Ok(window_index) = window_index_str.parse::<u32>() else {
            return false;
        };
        self.panes
            .values()
            .filter(|info| info.window_index == window_index)
            .any(|info| self.is_self_or_ancestor(&info.pane_id))
    }

    /// `excludeSelf(agents)` (spec §4.4) — partition `agents` into `(safe, skipped)`, where
    /// `skipped` lists agents whose pane equals or is an ancestor of the caller's pane.
    #[must_use]
    pub fn exclude_self<'a>(&self, agents: &[&'a Agent]) -> (Vec<&'a Agent>, Vec<&'a Agent>) {
        let mut safe = Vec::new();
        let mut skipped = Vec::new();
        for agent in agents {
            let pane_id = agent
                .tmux_target
                .split_once('.')
                .map_or(agent.tmux_target.as_str(), |(_, pane)| pane);
            if self.is_self_or_ancestor(pane_id) {
                skipped.push(*agent);
            } else {
                safe.push(*agent);
            }
        }
        (safe, skipped)
    }
}

#[cfg(target_os = "linux")]
fn ancestor_pids(pid: u32) -> Vec<u32> {
    let mut pids = Vec::new();
    let mut current = Some(pid);
    while let Some(p) = current {
        if pids.contains(&p) {
            break;
        }
        pids.push(p);
        current = parent_pid(p);
    }
    pids
}

#[cfg(target_os = "linux")]
fn parent_pid(pid: u32) -> Option<u32> {
    let contents = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    // Format: "pid (comm) state ppid ...". `comm` may itself contain spaces or parens, so split
    // on the last ')' rather than whitespace.
    let after_comm = contents.rsplit_once(')')?.1;
    let ppid = after_comm.split_whitespace().nth(1)?;
    ppid.parse().ok().filter(|&p: &u32| p != 0)
}

#[cfg(not(target_os = "linux"))]
#[expect(clippy::missing_const_for_fn, reason = "platform-specific stub, kept non-const for symmetry with the linux impl")]
fn ancestor_pids(pid: u32) -> Vec<u32> {
    vec![pid]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::test_support::{test_agent, test_worktree};
    use crate::mux::PaneInfo;

    fn pane(window_index: u32, pane_id: &str, pid: u32) -> PaneInfo {
        PaneInfo {
            window_index,
            pane_id: pane_id.to_string(),
            command: "claude".to_string(),
            pid,
            is_dead: false,
        }
    }

    #[test]
    fn test_none_context_protects_nothing() {
        let ctx = SelfProtection::none();
        let wt = test_worktree("wt-aaaaaa");
        assert!(!ctx.would_cleanup_affect_self(&wt));
    }

    #[test]
    fn test_exclude_self_partitions_by_pane_id() {
        let mut ctx = SelfProtection::none();
        ctx.self_pane_id = Some("%7".to_string());

        let mut a1 = test_agent("ag-aaaaaaaa");
        a1.tmux_target = "ppg-demo:0.%7".to_string();
        let mut a2 = test_agent("ag-bbbbbbbb");
        a2.tmux_target = "ppg-demo:1.%9".to_string();

        let (safe, skipped) = ctx.exclude_self(&[&a1, &a2]);
        assert_eq!(safe.len(), 1);
        assert_eq!(safe[0].id, "ag-bbbbbbbb");
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].id, "ag-aaaaaaaa");
    }

    #[test]
    fn test_would_cleanup_affect_self_matches_window_pane() {
        let mut ctx = SelfProtection::none();
        ctx.self_pane_id = Some("%42".to_string());
        ctx.panes.insert("%42".to_string(), pane(0, "%42", 1234));
        ctx.panes.insert("%43".to_string(), pane(1, "%43", 5678));

        let mut wt = test_worktree("wt-aaaaaa");
        wt.tmux_window = "ppg-demo:0".to_string();
        assert!(ctx.would_cleanup_affect_self(&wt));

        wt.tmux_window = "ppg-demo:1".to_string();
        assert!(!ctx.would_cleanup_affect_self(&wt));
    }

    #[test]
    fn test_is_self_or_ancestor_matches_process_ancestry() {
        let mut ctx = SelfProtection::none();
        ctx.ancestor_pids = vec![100, 200, 300];
        ctx.panes.insert("%1".to_string(), pane(0, "%1", 200));
        ctx.panes.insert("%2".to_string(), pane(0, "%2", 999));

        assert!(ctx.is_self_or_ancestor("%1"));
        assert!(!ctx.is_self_or_ancestor("%2"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_ancestor_pids_includes_self_and_terminates() {
        let pids = ancestor_pids(std::process::id());
        assert!(pids.contains(&std::process::id()));
        assert!(pids.len() < 10_000, "ancestor walk must terminate");
    }
}
