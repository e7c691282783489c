//! Status Reconciler & Lifecycle (spec §4.7, component C7).
//!
//! `derive_lifecycle` is a pure function over a worktree's already-refreshed agent statuses —
//! it never touches the mux or the manifest lock itself, so the first-match-wins rule table can
//! be unit-tested as a table without any fixture beyond plain structs. The live-status refresh
//! half of this component (`refresh_agent_statuses`) is the one place the quiescence heuristic
//! lives, matching the teacher's framing of idle-detection as "soft behavior" rather than a
//! contract (spec §9).

use crate::manifest::{Agent, AgentStatus, Worktree, WorktreeStatus};
use crate::mux::PaneInfo;
use std::collections::BTreeMap;
use std::time::Duration;

/// The derived, user-facing lifecycle of a worktree (spec §4.7, GLOSSARY "Lifecycle").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// Mirrors `WorktreeStatus::Merged`.
    Merged,
    /// Mirrors `WorktreeStatus::Cleaned`.
    Cleaned,
    /// A merge is in progress.
    Merging,
    /// At least one agent is `running`, `spawning`, or `waiting`.
    Busy,
    /// Every agent is terminal, at least one is `idle`/`exited`/`completed`, none `failed`/`lost`.
    Ready,
    /// At least one agent is `failed` or `lost`, and none is live.
    Attention,
    /// No agents at all.
    Empty,
    /// Every agent terminal but none fall into the `ready` bucket (e.g. all `killed`).
    Idle,
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Merged => "merged",
            Self::Cleaned => "cleaned",
            Self::Merging => "merging",
            Self::Busy => "busy",
            Self::Ready => "ready",
            Self::Attention => "attention",
            Self::Empty => "empty",
            Self::Idle => "idle",
        };
        write!(f, "{s}")
    }
}

/// Derive a worktree's lifecycle from its status and its agents' statuses (spec §4.7 table,
/// first rule that matches wins).
#[must_use]
pub fn derive_lifecycle(worktree: &Worktree) -> Lifecycle {
    match worktree.status {
        WorktreeStatus::Merged => return Lifecycle::Merged,
        WorktreeStatus::Cleaned => return Lifecycle::Cleaned,
        WorktreeStatus::Merging => return Lifecycle::Merging,
        WorktreeStatus::Active | WorktreeStatus::Failed => {}
    }

    let statuses: Vec<AgentStatus> = worktree.agents.values().map(|a| a.status).collect();
    if statuses.is_empty() {
        return Lifecycle::Empty;
    }

    let any_live = statuses
        .iter()
        .any(|s| matches!(s, AgentStatus::Running | AgentStatus::Spawning | AgentStatus::Waiting));
    if any_live {
        return Lifecycle::Busy;
    }

    let all_terminal = statuses.iter().all(|s| s.is_terminal());
    let any_failed_or_lost = statuses
        .iter()
        .any(|s| matches!(s, AgentStatus::Failed | AgentStatus::Lost));
    let any_good_terminal = statuses
        .iter()
        .any(|s| matches!(s, AgentStatus::Idle | AgentStatus::Exited | AgentStatus::Completed));

    if all_terminal && any_good_terminal && !any_failed_or_lost {
        return Lifecycle::Ready;
    }
    if any_failed_or_lost {
        return Lifecycle::Attention;
    }
    Lifecycle::Idle
}

/// Classify a single agent's live status from a pane snapshot (`checkAgentStatus`, spec §4.5).
///
/// `last_output`/`last_change` track the quiescence heuristic: if the pane's content hash is
/// unchanged from the previous observation for at least `quiescence` seconds, the agent is
/// reported `idle` rather than `running`. Deterministic given those two inputs, per spec §4.5's
/// requirement that the heuristic not depend on hidden state.
#[must_use]
pub fn classify_agent(
    pane: Option<&PaneInfo>,
    output_unchanged_for: Option<Duration>,
    quiescence: Duration,
) -> AgentStatus {
    let Some(pane) = pane else {
        return AgentStatus::Gone;
    };
    if pane.is_dead {
        return AgentStatus::Gone;
    }
    match output_unchanged_for {
        Some(unchanged) if unchanged >= quiescence => AgentStatus::Idle,
        _ => AgentStatus::Running,
    }
}

/// `refreshAllAgentStatuses` (spec §4.5) — a pure function over a worktree's agent map and a
/// session pane snapshot, applying the monotonicity rule: once terminal, an agent's stored
/// status is never overwritten by a live probe result (spec invariant A3 / testable property
/// "Agent monotonicity").
///
/// `quiescence` and `unchanged_durations` (keyed by agent id) are supplied by the caller, which
/// tracks captured-output hashes across calls; this function itself performs no I/O.
pub fn refresh_agent_statuses(
    agents: &mut BTreeMap<String, Agent>,
    panes: &BTreeMap<String, PaneInfo>,
    unchanged_durations: &BTreeMap<String, Duration>,
    quiescence: Duration,
) {
    for agent in agents.values_mut() {
        if agent.status.is_terminal() {
            continue;
        }
        let pane_id = agent
            .tmux_target
            .split_once('.')
            .map_or(agent.tmux_target.as_str(), |(_, pane)| pane);
        let probed = classify_agent(
            panes.get(pane_id),
            unchanged_durations.get(&agent.id).copied(),
            quiescence,
        );
        if probed == AgentStatus::Gone && agent.status.is_terminal() {
            continue;
        }
        agent.status = probed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::test_support::{test_agent, test_worktree};

    fn with_agent_status(status: AgentStatus) -> Worktree {
        let mut wt = test_worktree("wt-aaaaaa");
        let mut agent = test_agent("ag-aaaaaaaa");
        agent.status = status;
        wt.agents.insert(agent.id.clone(), agent);
        wt
    }

    #[test]
    fn test_merged_and_cleaned_short_circuit() {
        let mut wt = with_agent_status(AgentStatus::Running);
        wt.status = WorktreeStatus::Merged;
        assert_eq!(derive_lifecycle(&wt), Lifecycle::Merged);

        wt.status = WorktreeStatus::Cleaned;
        assert_eq!(derive_lifecycle(&wt), Lifecycle::Cleaned);
    }

    #[test]
    fn test_merging_overrides_agent_state() {
        let mut wt = with_agent_status(AgentStatus::Failed);
        wt.status = WorktreeStatus::Merging;
        assert_eq!(derive_lifecycle(&wt), Lifecycle::Merging);
    }

    #[test]
    fn test_empty_worktree_has_empty_lifecycle() {
        let wt = test_worktree("wt-aaaaaa");
        assert_eq!(derive_lifecycle(&wt), Lifecycle::Empty);
    }

    #[test]
    fn test_any_live_agent_is_busy() {
        for status in [AgentStatus::Running, AgentStatus::Spawning, AgentStatus::Waiting] {
            let wt = with_agent_status(status);
            assert_eq!(derive_lifecycle(&wt), Lifecycle::Busy, "{status:?} should be busy");
        }
    }

    #[test]
    fn test_all_terminal_good_is_ready() {
        for status in [AgentStatus::Idle, AgentStatus::Exited, AgentStatus::Completed] {
            let wt = with_agent_status(status);
            assert_eq!(derive_lifecycle(&wt), Lifecycle::Ready, "{status:?} should be ready");
        }
    }

    #[test]
    fn test_failed_or_lost_is_attention() {
        for status in [AgentStatus::Failed, AgentStatus::Lost] {
            let wt = with_agent_status(status);
            assert_eq!(derive_lifecycle(&wt), Lifecycle::Attention, "{status:?} should be attention");
        }
    }

    #[test]
    fn test_killed_only_is_idle() {
        let wt = with_agent_status(AgentStatus::Killed);
        assert_eq!(derive_lifecycle(&wt), Lifecycle::Idle);
    }

    #[test]
    fn test_mixed_failed_and_idle_prefers_attention() {
        let mut wt = test_worktree("wt-aaaaaa");
        let mut a1 = test_agent("ag-aaaaaaaa");
        a1.status = AgentStatus::Idle;
        let mut a2 = test_agent("ag-bbbbbbbb");
        a2.status = AgentStatus::Failed;
        wt.agents.insert(a1.id.clone(), a1);
        wt.agents.insert(a2.id.clone(), a2);
        assert_eq!(derive_lifecycle(&wt), Lifecycle::Attention);
    }

    #[test]
    fn test_classify_agent_missing_pane_is_gone() {
        assert_eq!(classify_agent(None, None, Duration::from_secs(30)), AgentStatus::Gone);
    }

    #[test]
    fn test_classify_agent_dead_pane_is_gone() {
        let pane = PaneInfo {
            window_index: 0,
            pane_id: "%1".to_string(),
            command: "claude".to_string(),
            pid: 100,
            is_dead: true,
        };
        assert_eq!(classify_agent(Some(&pane), None, Duration::from_secs(30)), AgentStatus::Gone);
    }

    #[test]
    fn test_classify_agent_quiescent_is_idle() {
        let pane = PaneInfo {
            window_index: 0,
            pane_id: "%1".to_string(),
            command: "claude".to_string(),
            pid: 100,
            is_dead: false,
        };
        let status = classify_agent(Some(&pane), Some(Duration::from_secs(45)), Duration::from_secs(30));
        assert_eq!(status, AgentStatus::Idle);
    }

    #[test]
    fn test_classify_agent_fresh_output_is_running() {
        let pane = PaneInfo {
            window_index: 0,
            pane_id: "%1".to_string(),
            command: "claude".to_string(),
            pid: 100,
            is_dead: false,
        };
        let status = classify_agent(Some(&pane), Some(Duration::from_secs(2)), Duration::from_secs(30));
        assert_eq!(status, AgentStatus::Running);
    }

    #[test]
    fn test_refresh_never_regresses_terminal_status() {
        let mut agents = BTreeMap::new();
        let mut agent = test_agent("ag-aaaaaaaa");
        agent.status = AgentStatus::Killed;
        agent.tmux_target = "ppg-demo:0.%1".to_string();
        agents.insert(agent.id.clone(), agent);

        let mut panes = BTreeMap::new();
        panes.insert(
            "%1".to_string(),
            PaneInfo {
                window_index: 0,
                pane_id: "%1".to_string(),
                command: "claude".to_string(),
                pid: 100,
                is_dead: false,
            },
        );

        refresh_agent_statuses(&mut agents, &panes, &BTreeMap::new(), Duration::from_secs(30));
        assert_eq!(agents["ag-aaaaaaaa"].status, AgentStatus::Killed);
    }

    #[test]
    fn test_refresh_adopts_probe_result_for_live_agent() {
        let mut agents = BTreeMap::new();
        let mut agent = test_agent("ag-aaaaaaaa");
        agent.status = AgentStatus::Running;
        agent.tmux_target = "ppg-demo:0.%1".to_string();
        agents.insert(agent.id.clone(), agent);

        let panes = BTreeMap::new();
        refresh_agent_statuses(&mut agents, &panes, &BTreeMap::new(), Duration::from_secs(30));
        assert_eq!(agents["ag-aaaaaaaa"].status, AgentStatus::Gone);
    }
}
