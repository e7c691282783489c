//! The three-operation Manifest Store primitive (spec §4.2): `read`, `write`, `update`.
//!
//! `update` is the sole mutation path for the entire kernel. The lockfile is acquired via the
//! `fs4` crate's `FileExt::lock_exclusive` (present in the teacher's `Cargo.toml` but unused in
//! its source — this module wires it up for the first time), with a bounded retry-with-backoff
//! loop around `try_lock_exclusive` before surfacing `MANIFEST_LOCK`. The atomic `write`
//! generalizes the teacher's `mux/pidfile.rs::write_atomically` temp-file-plus-rename protocol.

use crate::error::{KernelError, Result};
use crate::manifest::{migrate, Manifest};
use crate::paths::ProjectPaths;
use fs4::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

/// How long `update` retries acquiring the lock before giving up.
const LOCK_BUDGET: Duration = Duration::from_secs(5);
/// Delay between lock-acquisition attempts.
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Entry point for all manifest reads/writes. Stateless: every call resolves paths fresh from
/// `project_root`, so two `ManifestStore` values for the same project root are interchangeable.
#[derive(Debug, Clone, Copy)]
pub struct ManifestStore;

impl ManifestStore {
    /// Read the manifest for `project_root` without taking any lock.
    ///
    /// # Errors
    ///
    /// Returns `KernelError::NotInitialized` if `.ppg/manifest.json` is absent, or an internal
    /// error if it exists but cannot be parsed.
    pub fn read(project_root: &Path) -> Result<Manifest> {
        let path = ProjectPaths::new(project_root).manifest_file();
        if !path.exists() {
            return Err(KernelError::NotInitialized(
                project_root.display().to_string(),
            ));
        }
        Self::read_unlocked(&path)
    }

    fn read_unlocked(path: &Path) -> Result<Manifest> {
        let contents = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read manifest {}: {e}", path.display()))?;
        let manifest: Manifest = serde_json::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse manifest {}: {e}", path.display()))?;
        Ok(migrate(manifest))
    }

    /// Atomically replace the manifest on disk: write to a sibling temp file, then rename.
    ///
    /// # Errors
    ///
    /// Returns an error if the temp file cannot be written or the rename fails.
    pub fn write(project_root: &Path, manifest: &Manifest) -> Result<()> {
        let paths = ProjectPaths::new(project_root);
        fs::create_dir_all(paths.state_dir())
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", paths.state_dir().display()))?;
        write_atomically(&paths.manifest_file(), manifest)
    }

    /// Acquire the cross-process manifest lock, read the manifest, call `f` with a mutable
    /// reference it may edit in place, write the result back (with `updated_at` stamped to
    /// `now`), and release the lock.
    ///
    /// `f`'s body should be kept small: compute plans *outside* `update` and only perform the
    /// actual field mutations inside the closure, so the lock is held for as little wall-clock
    /// time as possible (spec §5 "Manifest lock").
    ///
    /// # Errors
    ///
    /// Returns `KernelError::ManifestLock` if the lock cannot be acquired within the retry
    /// budget, `KernelError::NotInitialized` if no manifest exists yet, or propagates whatever
    /// error `f` returns.
    pub fn update<T>(
        project_root: &Path,
        f: impl FnOnce(&mut Manifest) -> Result<T>,
    ) -> Result<T> {
        let paths = ProjectPaths::new(project_root);
        fs::create_dir_all(paths.state_dir())
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", paths.state_dir().display()))?;

        let lock_path = paths.manifest_lock_file();
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| anyhow::anyhow!("Failed to open lock file {}: {e}", lock_path.display()))?;

        acquire_lock(&lock_file)?;
        let result = (|| {
            let mut manifest = Self::read_unlocked(&paths.manifest_file())?;
            let value = f(&mut manifest)?;
            manifest.updated_at = chrono::Utc::now();
            write_atomically(&paths.manifest_file(), &manifest)?;
            Ok(value)
        })();
        let _ = lock_file.unlock();
        result
    }

    /// Initialize a fresh manifest at `project_root`, failing if one already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if a manifest already exists, or if it cannot be written.
    pub fn init(project_root: &Path, session_name: &str) -> Result<Manifest> {
        let paths = ProjectPaths::new(project_root);
        if paths.manifest_file().exists() {
            return Err(KernelError::InvalidArgs(format!(
                "{} is already initialized",
                project_root.display()
            )));
        }
        let manifest = Manifest::new(project_root.display().to_string(), session_name);
        Self::write(project_root, &manifest)?;
        Ok(manifest)
    }
}

fn acquire_lock(file: &File) -> Result<()> {
    let deadline = Instant::now() + LOCK_BUDGET;
    loop {
        match file.try_lock_exclusive() {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(e) => return Err(anyhow::anyhow!("Failed to lock manifest: {e}").into()),
        }
        if Instant::now() >= deadline {
            return Err(KernelError::ManifestLock(
                "timed out waiting for manifest lock".to_string(),
            ));
        }
        thread::sleep(LOCK_RETRY_INTERVAL);
    }
}

fn write_atomically(path: &Path, manifest: &Manifest) -> Result<()> {
    let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
    let contents = serde_json::to_string_pretty(manifest)
        .map_err(|e| anyhow::anyhow!("Failed to serialize manifest: {e}"))?;

    let write_result = (|| -> anyhow::Result<()> {
        fs::write(&tmp, contents.as_bytes())?;
        let file = File::open(&tmp)?;
        file.sync_all()?;
        fs::rename(&tmp, path)?;
        Ok(())
    })();

    if write_result.is_err() {
        let _ = fs::remove_file(&tmp);
    }

    write_result.map_err(|e| anyhow::anyhow!("Failed to write manifest {}: {e}", path.display()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::WorktreeStatus;
    use tempfile::TempDir;

    #[test]
    fn test_init_then_read() -> Result<()> {
        let dir = TempDir::new().map_err(|e| anyhow::anyhow!(e))?;
        ManifestStore::init(dir.path(), "ppg-demo")?;
        let manifest = ManifestStore::read(dir.path())?;
        assert_eq!(manifest.session_name, "ppg-demo");
        assert_eq!(manifest.version, crate::manifest::CURRENT_VERSION);
        Ok(())
    }

    #[test]
    fn test_read_without_init_is_not_initialized() {
        let dir = TempDir::new().expect("tempdir");
        let result = ManifestStore::read(dir.path());
        assert!(matches!(result, Err(KernelError::NotInitialized(_))));
    }

    #[test]
    fn test_double_init_fails() -> Result<()> {
        let dir = TempDir::new().map_err(|e| anyhow::anyhow!(e))?;
        ManifestStore::init(dir.path(), "ppg-demo")?;
        let result = ManifestStore::init(dir.path(), "ppg-demo");
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn test_update_mutates_and_stamps_updated_at() -> Result<()> {
        let dir = TempDir::new().map_err(|e| anyhow::anyhow!(e))?;
        let initial = ManifestStore::init(dir.path(), "ppg-demo")?;

        std::thread::sleep(Duration::from_millis(5));
        ManifestStore::update(dir.path(), |m| {
            let mut wt = crate::manifest::test_support::test_worktree("wt-aaaaaa");
            wt.status = WorktreeStatus::Active;
            m.worktrees.insert(wt.id.clone(), wt);
            Ok(())
        })?;

        let after = ManifestStore::read(dir.path())?;
        assert_eq!(after.worktrees.len(), 1);
        assert!(after.updated_at > initial.updated_at);
        Ok(())
    }

    #[test]
    fn test_update_on_missing_manifest_fails() {
        let dir = TempDir::new().expect("tempdir");
        let result = ManifestStore::update(dir.path(), |_m| Ok(()));
        assert!(matches!(result, Err(KernelError::NotInitialized(_))));
    }

    #[test]
    fn test_noop_update_is_bytewise_fixpoint_modulo_updated_at() -> Result<()> {
        let dir = TempDir::new().map_err(|e| anyhow::anyhow!(e))?;
        ManifestStore::init(dir.path(), "ppg-demo")?;
        let before = ManifestStore::read(dir.path())?;

        ManifestStore::update(dir.path(), |_m| Ok(()))?;
        let after = ManifestStore::read(dir.path())?;

        assert_eq!(before.worktrees, after.worktrees);
        assert_eq!(before.created_at, after.created_at);
        assert_eq!(before.project_root, after.project_root);
        Ok(())
    }

    #[test]
    fn test_sequential_updates_observe_prior_commit() -> Result<()> {
        let dir = TempDir::new().map_err(|e| anyhow::anyhow!(e))?;
        ManifestStore::init(dir.path(), "ppg-demo")?;

        ManifestStore::update(dir.path(), |m| {
            m.worktrees
                .insert("wt-aaaaaa".to_string(), crate::manifest::test_support::test_worktree("wt-aaaaaa"));
            Ok(())
        })?;
        ManifestStore::update(dir.path(), |m| {
            assert_eq!(m.worktrees.len(), 1);
            m.worktrees
                .insert("wt-bbbbbb".to_string(), crate::manifest::test_support::test_worktree("wt-bbbbbb"));
            Ok(())
        })?;

        let manifest = ManifestStore::read(dir.path())?;
        assert_eq!(manifest.worktrees.len(), 2);
        Ok(())
    }
}
