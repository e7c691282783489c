//! `init` and the manifest integrity invariants (spec §8 "Manifest integrity").

use crate::common::Fixture;
use ppg::manifest::ManifestStore;

#[test]
fn init_creates_a_parseable_manifest_with_sane_invariants() {
    let fixture = Fixture::new("init");
    let manifest = ppg::ops::init(fixture.root(), Some(&fixture.session_name)).expect("init");

    assert_eq!(manifest.version, 1);
    assert!(manifest.updated_at >= manifest.created_at);
    assert!(manifest.worktrees.is_empty());
    assert_eq!(manifest.session_name, fixture.session_name);

    // Re-reading from disk round-trips the same data.
    let reread = ManifestStore::read(fixture.root()).expect("read");
    assert_eq!(reread.version, manifest.version);
    assert_eq!(reread.session_name, manifest.session_name);
    assert_eq!(reread.project_root, manifest.project_root);
}

#[test]
fn init_rejects_a_non_git_directory() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let err = ppg::ops::resolve_project_root(Some(dir.path().to_path_buf())).unwrap_err();
    assert_eq!(err.code(), "NOT_GIT_REPO");
}

#[test]
fn reading_before_init_fails_not_initialized() {
    let fixture = Fixture::new("noinit");
    let err = ManifestStore::read(fixture.root()).unwrap_err();
    assert_eq!(err.code(), "NOT_INITIALIZED");
}

#[test]
fn a_no_op_update_is_a_fixpoint_modulo_updated_at() {
    let fixture = Fixture::new("fixpoint");
    let before = ppg::ops::init(fixture.root(), Some(&fixture.session_name)).expect("init");

    ManifestStore::update(fixture.root(), |_m| Ok(())).expect("no-op update");

    let after = ManifestStore::read(fixture.root()).expect("read");
    assert_eq!(after.version, before.version);
    assert_eq!(after.session_name, before.session_name);
    assert_eq!(after.worktrees.len(), before.worktrees.len());
    assert!(after.updated_at >= before.updated_at);
}
