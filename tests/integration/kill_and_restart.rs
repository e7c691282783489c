//! Spawn-then-kill and restart scenarios (spec §8 scenarios 1 and 4).

use crate::common::{skip_if_no_tmux, Fixture};
use ppg::manifest::{AgentStatus, ManifestStore};
use ppg::ops::{self, KillOptions, KillScope, SpawnOptions};
use std::collections::BTreeMap;

#[test]
fn spawn_then_kill_marks_agent_killed() {
    if skip_if_no_tmux() {
        return;
    }
    let fixture = Fixture::new("spawnkill");
    ops::init(fixture.root(), Some(&fixture.session_name)).expect("init");

    let result = ops::perform_spawn(
        fixture.root(),
        SpawnOptions { prompt: Some("do X".to_string()), name: Some("t1".to_string()), count: 1, ..Default::default() },
    )
    .expect("spawn");

    assert_eq!(result.name, "t1");
    assert_eq!(result.branch, "ppg/t1");
    assert_eq!(result.agents.len(), 1);
    let agent_id = result.agents[0].id.clone();
    assert!(agent_id.starts_with("ag-"));
    assert!(result.worktree_id.starts_with("wt-"));

    let manifest = ManifestStore::read(fixture.root()).expect("read");
    let worktree = manifest.worktrees.get(&result.worktree_id).expect("worktree present");
    assert_eq!(worktree.agents.len(), 1);

    let kill_result = ops::perform_kill(fixture.root(), KillScope::Agent(agent_id.clone()), KillOptions::default()).expect("kill");
    assert_eq!(kill_result.killed, vec![agent_id.clone()]);
    assert!(kill_result.skipped.is_empty());

    let manifest = ManifestStore::read(fixture.root()).expect("read after kill");
    let (_, agent) = manifest.find_agent(&agent_id).expect("agent still tracked");
    assert_eq!(agent.status, AgentStatus::Killed);
    assert!(agent.completed_at.is_some());
}

#[test]
fn killing_an_already_terminal_agent_is_idempotent() {
    if skip_if_no_tmux() {
        return;
    }
    let fixture = Fixture::new("idempotentkill");
    ops::init(fixture.root(), Some(&fixture.session_name)).expect("init");

    let result = ops::perform_spawn(
        fixture.root(),
        SpawnOptions { prompt: Some("do X".to_string()), name: Some("idem".to_string()), count: 1, ..Default::default() },
    )
    .expect("spawn");
    let agent_id = result.agents[0].id.clone();

    ops::perform_kill(fixture.root(), KillScope::Agent(agent_id.clone()), KillOptions::default()).expect("first kill");
    let second = ops::perform_kill(fixture.root(), KillScope::Agent(agent_id.clone()), KillOptions::default()).expect("second kill");

    // Already-terminal agents are filtered out of the live set before killing, so the second
    // call is a no-op: neither killed nor skipped, and it does not error.
    assert!(second.killed.is_empty());
    assert!(second.skipped.is_empty());
}

#[test]
fn restart_preserves_worktree_but_replaces_agent_id() {
    if skip_if_no_tmux() {
        return;
    }
    let fixture = Fixture::new("restart");
    ops::init(fixture.root(), Some(&fixture.session_name)).expect("init");

    let spawned = ops::perform_spawn(
        fixture.root(),
        SpawnOptions { prompt: Some("do X".to_string()), name: Some("restartme".to_string()), count: 1, ..Default::default() },
    )
    .expect("spawn");
    let old_agent_id = spawned.agents[0].id.clone();

    let restart = ops::perform_restart(fixture.root(), &old_agent_id, Some("retry")).expect("restart");
    assert_eq!(restart.old_agent_id, old_agent_id);
    assert_ne!(restart.new_agent_id, old_agent_id);
    assert!(restart.tmux_target.starts_with(&fixture.session_name));

    let manifest = ManifestStore::read(fixture.root()).expect("read");
    let worktree = manifest.worktrees.get(&spawned.worktree_id).expect("worktree still present");
    assert_eq!(worktree.agents.len(), 2, "old and new agent both tracked");

    let (_, old_agent) = manifest.find_agent(&old_agent_id).expect("old agent still tracked");
    assert_eq!(old_agent.status, AgentStatus::Killed);

    let (_, new_agent) = manifest.find_agent(&restart.new_agent_id).expect("new agent tracked");
    assert_eq!(new_agent.status, AgentStatus::Running);
}

#[test]
fn restart_on_a_master_agent_is_rejected() {
    if skip_if_no_tmux() {
        return;
    }
    let fixture = Fixture::new("restartmaster");
    ops::init(fixture.root(), Some(&fixture.session_name)).expect("init");

    let master = ops::perform_spawn_master(fixture.root(), "conductor", "claude", "oversee the others").expect("spawn master");
    let err = ops::perform_restart(fixture.root(), &master.id, None).unwrap_err();
    assert_eq!(err.code(), "INVALID_ARGS");
}

#[test]
fn spawn_rejects_conflicting_prompt_sources() {
    let fixture = Fixture::new("conflictprompt");
    ops::init(fixture.root(), Some(&fixture.session_name)).expect("init");

    let err = ops::perform_spawn(
        fixture.root(),
        SpawnOptions {
            prompt: Some("a".to_string()),
            template: Some("b".to_string()),
            name: Some("bad".to_string()),
            vars: BTreeMap::new(),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.code(), "INVALID_ARGS");
}
