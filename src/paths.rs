//! Identifier & Path Service (spec §4.1, component C1).
//!
//! Every function here is a pure function of `projectRoot` (and, where relevant, an id) — no
//! I/O happens in this module. Callers create directories/files themselves at the point of use.

use std::path::{Path, PathBuf};

/// The on-disk root all kernel state lives under, relative to a project root.
const STATE_DIR: &str = ".ppg";

/// All `.ppg/`-relative paths for a single project root, resolved once per operation.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    root: PathBuf,
}

impl ProjectPaths {
    /// Resolve paths rooted at `project_root` (the git repository's working directory).
    #[must_use]
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            root: project_root.into(),
        }
    }

    /// The project root itself.
    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.root
    }

    /// `<projectRoot>/.ppg`.
    #[must_use]
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    /// `<projectRoot>/.ppg/manifest.json`.
    #[must_use]
    pub fn manifest_file(&self) -> PathBuf {
        self.state_dir().join("manifest.json")
    }

    /// `<projectRoot>/.ppg/manifest.json.lock`.
    #[must_use]
    pub fn manifest_lock_file(&self) -> PathBuf {
        self.state_dir().join("manifest.json.lock")
    }

    /// `<projectRoot>/.ppg/config.json`.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.state_dir().join("config.json")
    }

    /// `<projectRoot>/.ppg/schedules.yaml`.
    #[must_use]
    pub fn schedule_file(&self) -> PathBuf {
        self.state_dir().join("schedules.yaml")
    }

    /// `<projectRoot>/.ppg/schedules.yaml.lock`.
    #[must_use]
    pub fn schedule_lock_file(&self) -> PathBuf {
        self.state_dir().join("schedules.yaml.lock")
    }

    /// `<projectRoot>/.ppg/cron.pid`.
    #[must_use]
    pub fn cron_pid_file(&self) -> PathBuf {
        self.state_dir().join("cron.pid")
    }

    /// `<projectRoot>/.ppg/logs`.
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.state_dir().join("logs")
    }

    /// `<projectRoot>/.ppg/logs/cron.log`.
    #[must_use]
    pub fn cron_log_file(&self) -> PathBuf {
        self.logs_dir().join("cron.log")
    }

    /// `<projectRoot>/.ppg/pane-cache.json` — best-effort, non-manifest cache of each agent's
    /// last-observed pane output hash and change timestamp, the state the quiescence heuristic
    /// (spec §4.5 `checkAgentStatus`) needs across otherwise-stateless CLI invocations. Not
    /// covered by the manifest lock: losing or corrupting this file only degrades the
    /// idle/running classification for one cycle, never manifest integrity.
    #[must_use]
    pub fn pane_cache_file(&self) -> PathBuf {
        self.state_dir().join("pane-cache.json")
    }

    /// `<projectRoot>/.ppg/results`.
    #[must_use]
    pub fn results_dir(&self) -> PathBuf {
        self.state_dir().join("results")
    }

    /// `<projectRoot>/.ppg/results/<agentId>.md`.
    #[must_use]
    pub fn result_file(&self, agent_id: &str) -> PathBuf {
        self.results_dir().join(format!("{agent_id}.md"))
    }

    /// `<projectRoot>/.ppg/agent-prompts`.
    #[must_use]
    pub fn agent_prompts_dir(&self) -> PathBuf {
        self.state_dir().join("agent-prompts")
    }

    /// `<projectRoot>/.ppg/agent-prompts/<agentId>.md`.
    #[must_use]
    pub fn agent_prompt_file(&self, agent_id: &str) -> PathBuf {
        self.agent_prompts_dir().join(format!("{agent_id}.md"))
    }

    /// `<projectRoot>/.worktrees`, the parent directory newly created worktrees land under.
    #[must_use]
    pub fn worktrees_dir(&self) -> PathBuf {
        self.root.join(".worktrees")
    }

    /// `<projectRoot>/.worktrees/<id>`, the default path for a worktree not explicitly adopted
    /// at another location.
    #[must_use]
    pub fn worktree_dir(&self, worktree_id: &str) -> PathBuf {
        self.worktrees_dir().join(worktree_id)
    }

    /// `<projectRoot>/.ppg/prompts`, project-local named prompt templates (`ppg prompt <name>`).
    #[must_use]
    pub fn project_prompts_dir(&self) -> PathBuf {
        self.state_dir().join("prompts")
    }

    /// `<projectRoot>/.ppg/swarms`, project-local swarm templates.
    #[must_use]
    pub fn project_swarms_dir(&self) -> PathBuf {
        self.state_dir().join("swarms")
    }

    /// A worktree's path is "under `.worktrees/`" per invariant W2 iff it has this directory as
    /// an ancestor.
    #[must_use]
    pub fn is_under_worktrees_dir(&self, candidate: &Path) -> bool {
        candidate.starts_with(self.worktrees_dir())
    }
}

/// Global (user-level, not project-level) directory for prompt/template/swarm files shared
/// across projects, mirroring the project-local directories above. Resolved from `$HOME`
/// without pulling in an external `dirs` crate, matching the teacher's own hand-rolled
/// `home_dir`/`data_local_dir` helpers.
#[must_use]
pub fn global_state_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".ppg"))
}

/// `<home>/.ppg/prompts`.
#[must_use]
pub fn global_prompts_dir() -> Option<PathBuf> {
    global_state_dir().map(|dir| dir.join("prompts"))
}

/// `<home>/.ppg/swarms`.
#[must_use]
pub fn global_swarms_dir() -> Option<PathBuf> {
    global_state_dir().map(|dir| dir.join("swarms"))
}

#[cfg(windows)]
fn home_dir_from(var_os: &mut impl FnMut(&'static str) -> Option<std::ffi::OsString>) -> Option<PathBuf> {
    if let Some(home) = var_os("USERPROFILE") {
        return Some(PathBuf::from(home));
    }

    let drive = var_os("HOMEDRIVE");
    let path = var_os("HOMEPATH");
    if let (Some(drive), Some(path)) = (drive, path) {
        let mut combined = PathBuf::from(drive);
        combined.push(path);
        return Some(combined);
    }

    var_os("HOME").map(PathBuf::from)
}

#[cfg(not(windows))]
fn home_dir_from(var_os: &mut impl FnMut(&'static str) -> Option<std::ffi::OsString>) -> Option<PathBuf> {
    var_os("HOME").map(PathBuf::from)
}

/// Locate the user's home directory without pulling in external crates.
#[must_use]
pub fn home_dir() -> Option<PathBuf> {
    let mut var_os = |key: &'static str| std::env::var_os(key);
    home_dir_from(&mut var_os)
}
