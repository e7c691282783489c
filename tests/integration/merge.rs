//! Merge scenarios (spec §8 scenario 2: "Merge-with-running-agents").

use crate::common::{skip_if_no_tmux, Fixture};
use ppg::manifest::{ManifestStore, WorktreeStatus};
use ppg::ops::{self, MergeOptions, MergeStrategy, SpawnOptions};

#[test]
fn merge_blocked_by_running_agents_then_forced() {
    if skip_if_no_tmux() {
        return;
    }
    let fixture = Fixture::new("merge");
    ops::init(fixture.root(), Some(&fixture.session_name)).expect("init");

    let spawned = ops::perform_spawn(
        fixture.root(),
        SpawnOptions { prompt: Some("do X".to_string()), name: Some("t1".to_string()), count: 2, ..Default::default() },
    )
    .expect("spawn 2 agents");

    let err = ops::perform_merge(fixture.root(), &spawned.worktree_id, MergeOptions { strategy: MergeStrategy::Squash, cleanup: false, force: false })
        .unwrap_err();
    assert_eq!(err.code(), "AGENTS_RUNNING");

    let result = ops::perform_merge(
        fixture.root(),
        &spawned.worktree_id,
        MergeOptions { strategy: MergeStrategy::Squash, cleanup: true, force: true },
    )
    .expect("forced merge succeeds");

    assert_eq!(result.status, "cleaned");
    assert!(result.cleaned);
    assert!(!result.self_protected);

    let manifest = ManifestStore::read(fixture.root()).expect("read");
    let worktree = manifest.worktrees.get(&spawned.worktree_id).expect("worktree entry remains until a later reset/clean");
    assert_eq!(worktree.status, WorktreeStatus::Cleaned);
    assert!(!std::path::Path::new(&worktree.path).exists(), "worktree directory removed");
}

#[test]
fn merge_with_unknown_worktree_is_not_found() {
    let fixture = Fixture::new("mergeunknown");
    ops::init(fixture.root(), Some(&fixture.session_name)).expect("init");

    let err = ops::perform_merge(fixture.root(), "wt-ffffff", MergeOptions::default()).unwrap_err();
    assert_eq!(err.code(), "WORKTREE_NOT_FOUND");
}
