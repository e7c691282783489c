//! Manifest Store (spec §4.2, component C2) — the durable data model (spec §3) plus the
//! lock-serialized atomic mutation primitive.
//!
//! The dynamic object model of the original implementation is replaced here with explicit
//! tagged structs (`Manifest`, `Worktree`, `Agent`) and a single `Status` sum type, per spec §9's
//! re-architecture note. Lifecycle derivation over these types lives in `crate::reconcile`, kept
//! a pure function rather than a method, so it can be unit-tested as a table without a manifest
//! in scope.

mod store;

pub use store::ManifestStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical agent status set (spec §3 "Canonical status set", SPEC_FULL.md §3 resolution):
/// the newer `{idle, exited, gone}` set plus `completed` retained as its own terminal variant.
///
/// `Running`/`Waiting`/`Idle`/`Gone` are the only statuses a live multiplexer probe may assign
/// (spec §4.5 `checkAgentStatus`/`refreshAllAgentStatuses`); `Completed`/`Failed`/`Killed`/`Lost`
/// are assigned only by the lifecycle engine or an explicit `lost` sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Process start has been requested but not yet confirmed running.
    Spawning,
    /// Pane exists and is producing fresh output.
    Running,
    /// Pane exists; agent is waiting on something (reserved for future probe refinement, never
    /// assigned by the current heuristic, kept so the canonical set matches spec §3 exactly).
    Waiting,
    /// Pane exists but has produced no new output within the quiescence window.
    Idle,
    /// The agent process exited (pane command is dead) without a recorded result file.
    Exited,
    /// The multiplexer target no longer exists at all.
    Gone,
    /// The agent voluntarily wrote a result file and exited successfully.
    Completed,
    /// The agent exited non-zero, or its launch failed.
    Failed,
    /// The agent was killed by an explicit operation.
    Killed,
    /// The agent's owning worktree is gone but the agent record survived (C7 `lost` sweep).
    Lost,
}

impl AgentStatus {
    /// Terminal statuses are monotone (spec invariant A3 / testable property "Agent
    /// monotonicity"): once reached, a live probe may never regress them back to a live status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Exited | Self::Gone | Self::Completed | Self::Failed | Self::Killed | Self::Lost
        )
    }

    /// Statuses a live multiplexer probe (`checkAgentStatus`) is permitted to assign.
    #[must_use]
    pub const fn is_live_probe_result(self) -> bool {
        matches!(self, Self::Running | Self::Waiting | Self::Idle | Self::Gone)
    }
}

/// Lifecycle status of a worktree (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorktreeStatus {
    /// The worktree is in normal use.
    Active,
    /// A merge operation is in progress.
    Merging,
    /// The worktree's branch has been merged into its base.
    Merged,
    /// A merge attempt failed.
    Failed,
    /// The worktree's filesystem and multiplexer resources have been released.
    Cleaned,
}

/// A single tracked agent (spec §3 "Agent").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Globally unique id, `ag-<8 lowercase alphanumerics>`.
    pub id: String,
    /// Human-readable name (defaults to the agent type or an ordinal).
    pub name: String,
    /// Which configured agent program this is (key into `Config::agents`).
    pub agent_type: String,
    /// Live lifecycle status.
    pub status: AgentStatus,
    /// Multiplexer target (`session:window` or `session:window.pane`) this agent's pane runs in.
    pub tmux_target: String,
    /// Truncated snapshot of the rendered prompt (the full text lives in the prompt archive).
    pub prompt: String,
    /// Absolute path to the agent's result file, once `resultInstructions` asked it to write one.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub result_file: Option<String>,
    /// When the agent was started.
    pub started_at: DateTime<Utc>,
    /// When the agent reached a terminal status.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Process exit code, if the agent is a non-interactive one-shot command.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub exit_code: Option<i32>,
    /// Human-readable error, set when `status = failed`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    /// Opaque session id correlating a resumed interactive agent session.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub session_id: Option<String>,
}

/// A single tracked worktree (spec §3 "Worktree").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worktree {
    /// Unique id, `wt-<6 lowercase alphanumerics>`.
    pub id: String,
    /// Filesystem- and branch-safe slug.
    pub name: String,
    /// Absolute path to the worktree's filesystem location.
    pub path: String,
    /// Branch checked out in this worktree.
    pub branch: String,
    /// Branch this worktree's branch was cut from (or merges back into).
    pub base_branch: String,
    /// Lifecycle status.
    pub status: WorktreeStatus,
    /// Multiplexer target of the worktree's initial window (empty until attached).
    #[serde(default)]
    pub tmux_window: String,
    /// Agents running (or that have run) in this worktree, keyed by id.
    #[serde(default)]
    pub agents: BTreeMap<String, Agent>,
    /// When the worktree was created.
    pub created_at: DateTime<Utc>,
    /// When the worktree was merged, if it has been.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub merged_at: Option<DateTime<Utc>>,
    /// URL of the pull request opened for this worktree's branch, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pr_url: Option<String>,
}

/// The singleton manifest for a project (spec §3 "Manifest").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Schema version; bumped when the on-disk shape changes.
    pub version: u32,
    /// Absolute path to the project root this manifest describes.
    pub project_root: String,
    /// Sanitized multiplexer session name.
    pub session_name: String,
    /// Tracked worktrees, keyed by id.
    #[serde(default)]
    pub worktrees: BTreeMap<String, Worktree>,
    /// Master agents: agents not tied to any worktree, owned directly by the manifest.
    #[serde(default)]
    pub master_agents: BTreeMap<String, Agent>,
    /// When the manifest was first created.
    pub created_at: DateTime<Utc>,
    /// When the manifest was last mutated. Stamped automatically by `ManifestStore`; callers
    /// must not edit it directly (spec §4.2).
    pub updated_at: DateTime<Utc>,
}

/// Current schema version written by this crate.
pub const CURRENT_VERSION: u32 = 1;

impl Manifest {
    /// Construct a fresh manifest for a newly-initialized project.
    #[must_use]
    pub fn new(project_root: impl Into<String>, session_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            version: CURRENT_VERSION,
            project_root: project_root.into(),
            session_name: session_name.into(),
            worktrees: BTreeMap::new(),
            master_agents: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Find an agent by id across all worktrees and master agents.
    #[must_use]
    pub fn find_agent(&self, agent_id: &str) -> Option<(Option<&str>, &Agent)> {
        if let Some(agent) = self.master_agents.get(agent_id) {
            return Some((None, agent));
        }
        for worktree in self.worktrees.values() {
            if let Some(agent) = worktree.agents.get(agent_id) {
                return Some((Some(worktree.id.as_str()), agent));
            }
        }
        None
    }

    /// All agents across every worktree and the master-agent set.
    #[must_use]
    pub fn all_agents(&self) -> Vec<&Agent> {
        let mut agents: Vec<&Agent> = self.master_agents.values().collect();
        agents.extend(self.worktrees.values().flat_map(|wt| wt.agents.values()));
        agents
    }

    /// Whether `branch` is in use by an active (non-cleaned, non-merged) worktree (invariant W2).
    #[must_use]
    pub fn branch_in_use(&self, branch: &str) -> bool {
        self.worktrees.values().any(|wt| {
            wt.branch == branch
                && !matches!(wt.status, WorktreeStatus::Merged | WorktreeStatus::Cleaned)
        })
    }
}

/// Migrate a manifest read from disk in legacy form. Structurally a no-op today (the "newer"
/// status set was chosen as canonical from day one of this crate — see SPEC_FULL.md §3), but
/// kept as the attachment point for future schema bumps: any manifest with `version <
/// CURRENT_VERSION` passes through here before being handed to an `update` closure.
pub(crate) fn migrate(mut manifest: Manifest) -> Manifest {
    if manifest.version < CURRENT_VERSION {
        manifest.version = CURRENT_VERSION;
    }
    manifest
}

/// Test-only constructors shared across this crate's test modules.
#[cfg(test)]
pub(crate) mod test_support {
    use super::{Agent, AgentStatus, Worktree, WorktreeStatus};
    use chrono::Utc;
    use std::collections::BTreeMap;

    pub(crate) fn test_agent(id: &str) -> Agent {
        Agent {
            id: id.to_string(),
            name: "agent".to_string(),
            agent_type: "claude".to_string(),
            status: AgentStatus::Running,
            tmux_target: "ppg-demo:0".to_string(),
            prompt: "do X".to_string(),
            result_file: None,
            started_at: Utc::now(),
            completed_at: None,
            exit_code: None,
            error: None,
            session_id: None,
        }
    }

    pub(crate) fn test_worktree(id: &str) -> Worktree {
        Worktree {
            id: id.to_string(),
            name: "t1".to_string(),
            path: format!("/repo/.worktrees/{id}"),
            branch: "ppg/t1".to_string(),
            base_branch: "main".to_string(),
            status: WorktreeStatus::Active,
            tmux_window: "ppg-demo:0".to_string(),
            agents: BTreeMap::new(),
            created_at: Utc::now(),
            merged_at: None,
            pr_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{test_agent, test_worktree};
    use super::*;

    #[test]
    fn test_new_manifest_has_matching_timestamps() {
        let manifest = Manifest::new("/repo", "ppg-demo");
        assert_eq!(manifest.version, CURRENT_VERSION);
        assert_eq!(manifest.created_at, manifest.updated_at);
        assert!(manifest.worktrees.is_empty());
    }

    #[test]
    fn test_find_agent_in_worktree() {
        let mut manifest = Manifest::new("/repo", "ppg-demo");
        let agent = test_agent("ag-aaaaaaaa");
        let mut wt = test_worktree("wt-aaaaaa");
        wt.agents.insert(agent.id.clone(), agent.clone());
        manifest.worktrees.insert(wt.id.clone(), wt);

        let (owner, found) = manifest.find_agent("ag-aaaaaaaa").expect("agent present");
        assert_eq!(owner, Some("wt-aaaaaa"));
        assert_eq!(found.id, agent.id);
    }

    #[test]
    fn test_find_master_agent() {
        let mut manifest = Manifest::new("/repo", "ppg-demo");
        let agent = test_agent("ag-bbbbbbbb");
        manifest.master_agents.insert(agent.id.clone(), agent);

        let (owner, _) = manifest.find_agent("ag-bbbbbbbb").expect("agent present");
        assert_eq!(owner, None);
    }

    #[test]
    fn test_branch_in_use_ignores_cleaned() {
        let mut manifest = Manifest::new("/repo", "ppg-demo");
        let mut wt = test_worktree("wt-cccccc");
        wt.status = WorktreeStatus::Cleaned;
        wt.branch = "ppg/done".to_string();
        manifest.worktrees.insert(wt.id.clone(), wt);

        assert!(!manifest.branch_in_use("ppg/done"));
    }

    #[test]
    fn test_terminal_statuses_are_monotone_by_construction() {
        for status in [
            AgentStatus::Exited,
            AgentStatus::Gone,
            AgentStatus::Completed,
            AgentStatus::Failed,
            AgentStatus::Killed,
            AgentStatus::Lost,
        ] {
            assert!(status.is_terminal());
            assert!(!status.is_live_probe_result() || status == AgentStatus::Gone);
        }
        for status in [AgentStatus::Spawning, AgentStatus::Running, AgentStatus::Waiting, AgentStatus::Idle] {
            assert!(!status.is_terminal());
        }
    }
}
