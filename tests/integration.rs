//! Scenario-level integration tests (spec §8 "Concrete end-to-end scenarios").
//!
//! Run with `--test-threads=1` if tmux-backed tests are enabled on a machine with a single
//! tmux server, to avoid cross-test session interference (mirrors the teacher's own
//! integration test harness note).

mod common;

mod integration {
    mod init;
    mod kill_and_restart;
    mod manifest_lock;
    mod merge;
    mod reset;
    mod selfprotect;
}
