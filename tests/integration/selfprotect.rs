//! Self-protection from the operation layer's point of view (spec §8 "Self-protection").
//!
//! The unit tests alongside `src/selfprotect.rs` exercise `SelfProtection`'s partition logic
//! directly; these integration tests confirm the operations that are supposed to consult it
//! actually do, for the common case of a caller that is not itself inside the multiplexer
//! (`TMUX_PANE` unset), where nothing should ever be skipped.

use crate::common::{skip_if_no_tmux, Fixture};
use ppg::ops::{self, KillOptions, KillScope, SpawnOptions};

#[test]
fn kill_outside_the_mux_never_skips_anything() {
    if skip_if_no_tmux() {
        return;
    }
    assert!(std::env::var_os("TMUX_PANE").is_none(), "test process must not itself be inside tmux");

    let fixture = Fixture::new("selfprotect");
    ops::init(fixture.root(), Some(&fixture.session_name)).expect("init");

    let spawned = ops::perform_spawn(
        fixture.root(),
        SpawnOptions { prompt: Some("do X".to_string()), name: Some("sp".to_string()), count: 2, ..Default::default() },
    )
    .expect("spawn 2 agents");

    let result = ops::perform_kill(fixture.root(), KillScope::Worktree(spawned.worktree_id), KillOptions::default()).expect("kill worktree");

    assert_eq!(result.killed.len(), 2);
    assert!(result.skipped.is_empty(), "no pane is self or an ancestor of this test process");
}
