//! Reset scenarios (spec §8 scenario 3: "Reset with at-risk work").

use crate::common::{skip_if_no_tmux, Fixture};
use ppg::manifest::ManifestStore;
use ppg::ops::{self, KillOptions, KillScope, ResetOptions, SpawnOptions};

#[test]
fn reset_blocked_by_idle_unmerged_work_then_forced() {
    if skip_if_no_tmux() {
        return;
    }
    let fixture = Fixture::new("reset");
    ops::init(fixture.root(), Some(&fixture.session_name)).expect("init");

    let spawned = ops::perform_spawn(
        fixture.root(),
        SpawnOptions { prompt: Some("do X".to_string()), name: Some("t1".to_string()), count: 1, ..Default::default() },
    )
    .expect("spawn");
    let agent_id = spawned.agents[0].id.clone();

    // Kill (rather than wait for real idle quiescence) to reach a terminal, non-merged,
    // non-PR'd state cheaply — `killed` is not one of the at-risk statuses, so mark it `idle`
    // directly in the manifest to exercise the at-risk predicate precisely.
    ManifestStore::update(fixture.root(), |m| {
        if let Some(wt) = m.worktrees.get_mut(&spawned.worktree_id) {
            if let Some(agent) = wt.agents.get_mut(&agent_id) {
                agent.status = ppg::manifest::AgentStatus::Idle;
            }
        }
        Ok(())
    })
    .expect("mark idle");

    let err = ops::perform_reset(fixture.root(), ResetOptions::default()).unwrap_err();
    assert_eq!(err.code(), "UNMERGED_WORK");
    assert!(err.to_string().contains("t1 (ppg/t1)"));

    let result = ops::perform_reset(fixture.root(), ResetOptions { force: true, ..Default::default() }).expect("forced reset");
    assert!(result.removed.contains(&spawned.worktree_id));

    let manifest = ManifestStore::read(fixture.root()).expect("read");
    assert!(
        manifest.worktrees.get(&spawned.worktree_id).is_none(),
        "cleaned worktree entry is removed from the manifest"
    );
}

#[test]
fn reset_is_idempotent() {
    if skip_if_no_tmux() {
        return;
    }
    let fixture = Fixture::new("resetidempotent");
    ops::init(fixture.root(), Some(&fixture.session_name)).expect("init");

    ops::perform_spawn(
        fixture.root(),
        SpawnOptions { prompt: Some("do X".to_string()), name: Some("once".to_string()), count: 1, ..Default::default() },
    )
    .expect("spawn");

    ops::perform_reset(fixture.root(), ResetOptions { force: true, prune: true, ..Default::default() }).expect("first reset");
    let manifest = ManifestStore::read(fixture.root()).expect("read after first reset");
    assert!(manifest.worktrees.is_empty(), "first reset leaves an empty worktrees map");

    let second = ops::perform_reset(fixture.root(), ResetOptions { force: true, prune: true, ..Default::default() }).expect("second reset");

    // The worktrees map is already empty, so the second pass removes nothing new.
    assert!(second.removed.is_empty());
}

#[test]
fn kill_all_with_cleanup_removes_worktree_records() {
    if skip_if_no_tmux() {
        return;
    }
    let fixture = Fixture::new("killall");
    ops::init(fixture.root(), Some(&fixture.session_name)).expect("init");

    let spawned = ops::perform_spawn(
        fixture.root(),
        SpawnOptions { prompt: Some("do X".to_string()), name: Some("all".to_string()), count: 1, ..Default::default() },
    )
    .expect("spawn");

    let result = ops::perform_kill(fixture.root(), KillScope::All, KillOptions { cleanup: true, force: false }).expect("kill all");
    assert_eq!(result.killed.len(), 1);
    assert_eq!(result.removed_worktrees, vec![spawned.worktree_id.clone()]);
}
