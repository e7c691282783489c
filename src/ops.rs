//! Operation API (spec §4.9, component C9) — the single façade the CLI (and any future
//! transport) calls through. Every public function here owns one operation end to end: resolve
//! inputs, perform git/mux/gh subprocess I/O *outside* the manifest lock, then commit the small
//! resulting mutation inside one or more `ManifestStore::update` closures, per spec §4.2's
//! "plan outside, mutate inside" rule.

use crate::config::{AgentConfig, Config};
use crate::error::{KernelError, Result};
use crate::git::{self, BranchManager, DiffSummary, Repository};
use crate::manifest::{Agent, AgentStatus, Manifest, ManifestStore, Worktree, WorktreeStatus};
use crate::mux;
use crate::paths::ProjectPaths;
use crate::reconcile;
use crate::selfprotect::SelfProtection;
use crate::{agent as agent_engine, gh, id, prompts, worktree as worktree_engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::warn;

/// Resolve the project root an operation runs against: `explicit` if given, else the current
/// directory, validated to be (or be inside) a git repository.
///
/// # Errors
///
/// Returns `KernelError::NotGitRepo` if the candidate directory is not inside a git repository.
pub fn resolve_project_root(explicit: Option<PathBuf>) -> Result<PathBuf> {
    let candidate = match explicit {
        Some(path) => path,
        None => std::env::current_dir()
            .map_err(|e| anyhow::anyhow!("Failed to read current directory: {e}"))?,
    };
    if !git::is_git_repository(&candidate) {
        return Err(KernelError::NotGitRepo(candidate.display().to_string()));
    }
    git::repository_root(&candidate)
}

/// Lowercase-alnum-dash slug, trimmed and capped at 50 characters, matching the branch/window
/// naming rules the worktree and mux layers expect. Falls back to `"agent"` if nothing survives.
fn slugify(input: &str) -> String {
    let mut out = String::new();
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if c == '-' || c == '_' || c.is_whitespace() {
            out.push('-');
        }
    }
    let trimmed: String = out.trim_matches('-').chars().take(50).collect();
    let trimmed = trimmed.trim_matches('-');
    if trimmed.is_empty() {
        "agent".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `init` (spec §6) — create `.ppg/manifest.json` and a default `.ppg/config.json`, and make sure
/// git itself ignores `.ppg` and `.worktrees`.
///
/// # Errors
///
/// Returns an error if the project root is already initialized, or if any of the files involved
/// cannot be written.
pub fn init(project_root: &Path, session_name: Option<&str>) -> Result<Manifest> {
    let name = session_name.map_or_else(|| "ppg".to_string(), slugify);
    let manifest = ManifestStore::init(project_root, &name)?;
    Config::default().save(project_root)?;
    git::ensure_ppg_excluded(project_root)?;
    Ok(manifest)
}

/// Options for `perform_spawn` (spec §6 `spawn`).
#[derive(Debug, Clone)]
pub struct SpawnOptions {
    /// Name used for the worktree/branch slug and as a prefix for agent names.
    pub name: Option<String>,
    /// Explicit branch to create or adopt. Mutually exclusive with `worktree`.
    pub branch: Option<String>,
    /// Spawn into an already-tracked worktree instead of creating a new one.
    pub worktree: Option<String>,
    /// Base branch a new branch is cut from. Mutually exclusive with `worktree`.
    pub base: Option<String>,
    /// Inline prompt text. At most one of `prompt`/`prompt_file`/`template` may be set.
    pub prompt: Option<String>,
    /// Path to a file containing the prompt text.
    pub prompt_file: Option<PathBuf>,
    /// Name of a named prompt template resolved via `crate::prompts::resolve_prompt`.
    pub template: Option<String>,
    /// Template variable substitutions applied to the resolved prompt text.
    pub vars: BTreeMap<String, String>,
    /// Configured agent program to use (falls back to `Config::default_agent`).
    pub agent_type: Option<String>,
    /// Number of agents to spawn into the (possibly new) worktree.
    pub count: u32,
    /// When spawning more than one agent, split panes from the first window instead of opening
    /// a new window per agent.
    pub split: bool,
    /// Suppress the `resultInstructions` appended to the prompt and the result-file bookkeeping.
    pub skip_result_instructions: bool,
    /// Also open a desktop terminal attached to the session (spec §4.3 `openDesktopTerminal`).
    pub open_terminal: bool,
}

impl Default for SpawnOptions {
    fn default() -> Self {
        Self {
            name: None,
            branch: None,
            worktree: None,
            base: None,
            prompt: None,
            prompt_file: None,
            template: None,
            vars: BTreeMap::new(),
            agent_type: None,
            count: 1,
            split: false,
            skip_result_instructions: false,
            open_terminal: false,
        }
    }
}

/// A single agent spawned by `perform_spawn`.
#[derive(Debug, Clone, Serialize)]
pub struct SpawnedAgent {
    /// The agent's id.
    pub id: String,
    /// The multiplexer target the agent's pane runs in.
    pub tmux_target: String,
}

/// Outcome of `perform_spawn`.
#[derive(Debug, Clone, Serialize)]
pub struct SpawnResult {
    /// The worktree agents were spawned into (new, adopted, or pre-existing).
    pub worktree_id: String,
    /// The worktree's slug name.
    pub name: String,
    /// The worktree's branch.
    pub branch: String,
    /// Every agent spawned by this call, in spawn order.
    pub agents: Vec<SpawnedAgent>,
}

fn resolve_prompt_text(project_root: &Path, options: &SpawnOptions) -> Result<String> {
    let provided = [
        options.prompt.is_some(),
        options.prompt_file.is_some(),
        options.template.is_some(),
    ];
    if provided.iter().filter(|&&set| set).count() > 1 {
        return Err(KernelError::InvalidArgs(
            "at most one of --prompt, --prompt-file, --template may be given".to_string(),
        ));
    }

    let base_text = if let Some(prompt) = &options.prompt {
        prompt.clone()
    } else if let Some(path) = &options.prompt_file {
        std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read prompt file {}: {e}", path.display()))?
    } else if let Some(template) = &options.template {
        prompts::resolve_prompt(project_root, template)
            .map_err(|e| KernelError::PromptNotFound(e.to_string()))?
    } else {
        return Err(KernelError::InvalidArgs(
            "one of --prompt, --prompt-file, --template is required".to_string(),
        ));
    };

    Ok(prompts::render(&base_text, &options.vars))
}

/// `spawn` (spec §6) — create or adopt a worktree (unless `options.worktree` targets an existing
/// one) and spawn one or more agents into it.
///
/// # Errors
///
/// Returns an error if the options are contradictory, the prompt cannot be resolved, the
/// worktree/branch plan is invalid, or the underlying git/mux/agent steps fail.
pub fn perform_spawn(project_root: &Path, options: SpawnOptions) -> Result<SpawnResult> {
    if options.worktree.is_some() && (options.branch.is_some() || options.base.is_some()) {
        return Err(KernelError::InvalidArgs(
            "--worktree cannot be combined with --branch or --base".to_string(),
        ));
    }

    let config = Config::load(project_root)?;
    let (agent_type, agent_config) = config
        .agent(options.agent_type.as_deref())
        .ok_or_else(|| {
            KernelError::InvalidArgs(format!(
                "no agent configured named '{}'",
                options.agent_type.as_deref().unwrap_or(&config.default_agent)
            ))
        })?;
    let agent_type = agent_type.to_string();
    let agent_config = agent_config.clone();
    let prompt_text = resolve_prompt_text(project_root, &options)?;

    if let Some(worktree_id) = options.worktree.clone() {
        spawn_into_existing_worktree(project_root, &worktree_id, &agent_type, &agent_config, &prompt_text, &options)
    } else {
        let repo = git::open_repository(project_root)?;
        spawn_new_or_adopted_worktree(project_root, &repo, &config, &agent_type, &agent_config, &prompt_text, &options)
    }
}

fn spawn_into_existing_worktree(
    project_root: &Path,
    worktree_id: &str,
    agent_type: &str,
    agent_config: &AgentConfig,
    prompt_text: &str,
    options: &SpawnOptions,
) -> Result<SpawnResult> {
    let manifest = ManifestStore::read(project_root)?;
    let worktree = manifest
        .worktrees
        .get(worktree_id)
        .ok_or_else(|| KernelError::WorktreeNotFound(worktree_id.to_string()))?;
    let session_name = manifest.session_name.clone();
    let name = worktree.name.clone();
    let branch = worktree.branch.clone();

    let agents = spawn_agents(
        project_root,
        worktree_id,
        &session_name,
        agent_type,
        agent_config,
        prompt_text,
        options.count,
        options.split,
        options.skip_result_instructions,
    )?;

    if options.open_terminal {
        mux::open_desktop_terminal(&session_name);
    }

    Ok(SpawnResult { worktree_id: worktree_id.to_string(), name, branch, agents })
}

fn resolve_branch_plan(
    repo: &Repository,
    branch: &Option<String>,
    base: &Option<String>,
    slug: &str,
) -> Result<(String, String, bool)> {
    let branches = BranchManager::new(repo);
    let base_branch = match base {
        Some(explicit) => explicit.clone(),
        None => branches.current()?,
    };
    match branch {
        Some(name) => {
            let adopt = branches.exists(name);
            Ok((name.clone(), base_branch, adopt))
        }
        None => Ok((format!("ppg/{slug}"), base_branch, false)),
    }
}

/// Create the worktree's directory, branch, window and manifest record, shared by
/// `spawn_new_or_adopted_worktree` and `perform_worktree_create`.
fn provision_worktree(
    project_root: &Path,
    repo: &Repository,
    config: &Config,
    session_name: &str,
    slug: &str,
    branch: &str,
    base_branch: &str,
    adopt: bool,
) -> Result<Worktree> {
    let worktree_id = id::worktree_id();
    let worktree_path = ProjectPaths::new(project_root).worktree_dir(&worktree_id);

    if adopt {
        worktree_engine::adopt_worktree(repo, &worktree_path, branch)?;
    } else {
        worktree_engine::create_worktree(repo, &worktree_path, branch, base_branch)?;
    }
    worktree_engine::setup_worktree_env(project_root, &worktree_path, config);

    mux::ensure_session(session_name, &worktree_path).map_err(|e| anyhow::anyhow!(e))?;
    let window_target = mux::create_window(session_name, slug, &worktree_path).map_err(|e| anyhow::anyhow!(e))?;

    let worktree = Worktree {
        id: worktree_id.clone(),
        name: slug.to_string(),
        path: worktree_path.display().to_string(),
        branch: branch.to_string(),
        base_branch: base_branch.to_string(),
        status: WorktreeStatus::Active,
        tmux_window: window_target,
        agents: BTreeMap::new(),
        created_at: Utc::now(),
        merged_at: None,
        pr_url: None,
    };

    ManifestStore::update(project_root, |m| {
        m.worktrees.insert(worktree.id.clone(), worktree.clone());
        Ok(())
    })?;

    Ok(worktree)
}

fn spawn_new_or_adopted_worktree(
    project_root: &Path,
    repo: &Repository,
    config: &Config,
    agent_type: &str,
    agent_config: &AgentConfig,
    prompt_text: &str,
    options: &SpawnOptions,
) -> Result<SpawnResult> {
    let manifest = ManifestStore::read(project_root)?;
    let slug = options.name.as_deref().map_or_else(|| slugify(agent_type), slugify);
    let (branch, base_branch, adopt) = resolve_branch_plan(repo, &options.branch, &options.base, &slug)?;

    if manifest.branch_in_use(&branch) {
        return Err(KernelError::InvalidArgs(format!(
            "branch '{branch}' is already in use by an active worktree"
        )));
    }

    let session_name = manifest.session_name.clone();
    let worktree = provision_worktree(project_root, repo, config, &session_name, &slug, &branch, &base_branch, adopt)?;

    let agents = spawn_agents(
        project_root,
        &worktree.id,
        &session_name,
        agent_type,
        agent_config,
        prompt_text,
        options.count,
        options.split,
        options.skip_result_instructions,
    )?;

    if options.open_terminal {
        mux::open_desktop_terminal(&session_name);
    }

    Ok(SpawnResult { worktree_id: worktree.id, name: slug, branch, agents })
}

#[allow(clippy::too_many_arguments, reason = "mirrors spawnAgent's plan-then-commit loop shape")]
fn spawn_agents(
    project_root: &Path,
    worktree_id: &str,
    session_name: &str,
    agent_type: &str,
    agent_config: &AgentConfig,
    prompt_text: &str,
    count: u32,
    split: bool,
    skip_result_instructions: bool,
) -> Result<Vec<SpawnedAgent>> {
    let mut spawned = Vec::new();

    for i in 0..count.max(1) {
        let manifest = ManifestStore::read(project_root)?;
        let worktree = manifest
            .worktrees
            .get(worktree_id)
            .ok_or_else(|| KernelError::WorktreeNotFound(worktree_id.to_string()))?;
        let worktree_path = worktree_engine::worktree_path(worktree);

        let target = if i == 0 && worktree.agents.is_empty() {
            let choice = worktree_engine::choose_spawn_target(worktree);
            worktree_engine::resolve_spawn_target(worktree, choice, &worktree_path)?
        } else if split {
            mux::split_pane(&worktree.tmux_window, mux::SplitDirection::Vertical, &worktree_path)
                .map_err(|e| anyhow::anyhow!("Failed to split pane for agent {i}: {e}"))?
        } else {
            mux::create_window(session_name, &format!("{}-{i}", worktree.name), &worktree_path)
                .map_err(|e| anyhow::anyhow!("Failed to create window for agent {i}: {e}"))?
        };

        let agent_id = id::agent_id();
        let name = format!("{agent_type}-{}", i + 1);

        match agent_engine::spawn_agent(
            &agent_id,
            &name,
            agent_type,
            agent_config,
            prompt_text,
            project_root,
            &target,
            None,
            skip_result_instructions,
        ) {
            Ok(agent) => {
                spawned.push(SpawnedAgent { id: agent.id.clone(), tmux_target: agent.tmux_target.clone() });
                ManifestStore::update(project_root, |m| {
                    let wt = m
                        .worktrees
                        .get_mut(worktree_id)
                        .ok_or_else(|| KernelError::WorktreeNotFound(worktree_id.to_string()))?;
                    wt.agents.insert(agent.id.clone(), agent.clone());
                    Ok(())
                })?;
            }
            Err(e) => {
                let failed = agent_engine::failed_agent(&agent_id, &name, agent_type, &target, &e.to_string());
                let _ = ManifestStore::update(project_root, |m| {
                    if let Some(wt) = m.worktrees.get_mut(worktree_id) {
                        wt.agents.insert(failed.id.clone(), failed.clone());
                    }
                    Ok::<(), KernelError>(())
                });
                return Err(e);
            }
        }
    }

    Ok(spawned)
}

/// `spawn` for an agent not tied to any worktree, used by `ppg spawn --master` (if exposed) and
/// by the scheduler's bare-prompt cron entries.
///
/// # Errors
///
/// Returns an error if the agent type is unconfigured or the launch fails.
pub fn perform_spawn_master(project_root: &Path, name: &str, agent_type: &str, prompt_text: &str) -> Result<SpawnedAgent> {
    let manifest = ManifestStore::read(project_root)?;
    let config = Config::load(project_root)?;
    let (resolved_type, agent_config) = config.agent(Some(agent_type)).ok_or_else(|| {
        KernelError::InvalidArgs(format!("no agent configured named '{agent_type}'"))
    })?;
    let resolved_type = resolved_type.to_string();
    let agent_config = agent_config.clone();

    let session_name = manifest.session_name.clone();
    mux::ensure_session(&session_name, project_root).map_err(|e| anyhow::anyhow!(e))?;
    let target = mux::create_window(&session_name, name, project_root).map_err(|e| anyhow::anyhow!(e))?;

    let agent_id = id::agent_id();
    let agent = agent_engine::spawn_master_agent(&agent_id, name, &resolved_type, &agent_config, prompt_text, project_root, &target)?;

    ManifestStore::update(project_root, |m| {
        m.master_agents.insert(agent.id.clone(), agent.clone());
        Ok(())
    })?;

    Ok(SpawnedAgent { id: agent.id.clone(), tmux_target: agent.tmux_target.clone() })
}

/// Options for `perform_swarm` (spec §6 `swarm`).
#[derive(Debug, Clone)]
pub struct SwarmOptions {
    /// Name of the swarm template to resolve via `crate::prompts::resolve_swarm`.
    pub swarm: String,
    /// Base name used for each entry's worktree/agent, falling back to the swarm's own name.
    pub name: Option<String>,
    /// Template variable substitutions applied to every entry's rendered prompt.
    pub vars: BTreeMap<String, String>,
}

/// One entry of `perform_swarm`'s outcome.
#[derive(Debug, Clone, Serialize)]
pub struct SwarmSpawnedEntry {
    /// The swarm entry's name.
    pub entry_name: String,
    /// The worktree this entry's agent was spawned into.
    pub worktree_id: String,
    /// The spawned agent.
    pub agent: SpawnedAgent,
}

/// Outcome of `perform_swarm`.
#[derive(Debug, Clone, Serialize)]
pub struct SwarmResult {
    /// The resolved swarm template's name.
    pub swarm: String,
    /// Every distinct worktree id touched, in spawn order.
    pub worktrees: Vec<String>,
    /// Every entry spawned, in template order.
    pub entries: Vec<SwarmSpawnedEntry>,
}

/// `swarm` (spec §6) — resolve a named swarm template and spawn one agent per entry, sharing a
/// single worktree if `swarm.shared_worktree` is set, or giving each entry its own worktree
/// otherwise.
///
/// # Errors
///
/// Returns `KernelError::PromptNotFound` if the swarm template does not resolve,
/// `KernelError::InvalidArgs` if an entry has no prompt and the swarm defines no default, or
/// propagates the underlying `perform_spawn` failure.
pub fn perform_swarm(project_root: &Path, options: SwarmOptions) -> Result<SwarmResult> {
    let swarm = prompts::resolve_swarm(project_root, &options.swarm)
        .map_err(|e| KernelError::PromptNotFound(e.to_string()))?;
    let base_name = options.name.unwrap_or_else(|| swarm.name.clone());

    let mut entries = Vec::new();
    let mut worktrees = Vec::new();
    let mut shared_worktree_id: Option<String> = None;

    for swarm_entry in &swarm.agents {
        let prompt_template = swarm_entry
            .prompt
            .as_deref()
            .or(swarm.prompt.as_deref())
            .ok_or_else(|| {
                KernelError::InvalidArgs(format!(
                    "swarm entry '{}' has no prompt and swarm '{}' defines no default",
                    swarm_entry.name, options.swarm
                ))
            })?;
        let prompt_text = prompts::render(prompt_template, &options.vars);

        let spawn_options = SpawnOptions {
            name: shared_worktree_id.is_none().then(|| format!("{base_name}-{}", swarm_entry.name)),
            worktree: shared_worktree_id.clone(),
            agent_type: swarm_entry.agent_type.clone(),
            prompt: Some(prompt_text),
            ..SpawnOptions::default()
        };

        let result = perform_spawn(project_root, spawn_options)?;
        if swarm.shared_worktree && shared_worktree_id.is_none() {
            shared_worktree_id = Some(result.worktree_id.clone());
        }
        if !worktrees.contains(&result.worktree_id) {
            worktrees.push(result.worktree_id.clone());
        }
        let agent = result.agents.into_iter().next().ok_or_else(|| {
            anyhow::anyhow!("swarm entry '{}' spawned no agent", swarm_entry.name)
        })?;
        entries.push(SwarmSpawnedEntry { entry_name: swarm_entry.name.clone(), worktree_id: result.worktree_id, agent });
    }

    Ok(SwarmResult { swarm: options.swarm, worktrees, entries })
}

/// Options for `perform_worktree_create` (spec §6 `worktree create`).
#[derive(Debug, Clone, Default)]
pub struct WorktreeCreateOptions {
    /// Name used for the worktree slug.
    pub name: Option<String>,
    /// Explicit branch to create or adopt.
    pub branch: Option<String>,
    /// Base branch a new branch is cut from.
    pub base: Option<String>,
}

/// Outcome of `perform_worktree_create`.
#[derive(Debug, Clone, Serialize)]
pub struct WorktreeCreateResult {
    /// The new worktree's id.
    pub worktree_id: String,
    /// The worktree's slug name.
    pub name: String,
    /// The worktree's branch.
    pub branch: String,
    /// Absolute path to the worktree on disk.
    pub path: String,
}

/// `worktree create` (spec §6) — create (or adopt) a worktree without spawning any agent into it.
///
/// # Errors
///
/// Returns an error if the branch is already in use, or the underlying git/mux steps fail.
pub fn perform_worktree_create(project_root: &Path, options: WorktreeCreateOptions) -> Result<WorktreeCreateResult> {
    let repo = git::open_repository(project_root)?;
    let config = Config::load(project_root)?;
    let manifest = ManifestStore::read(project_root)?;
    let slug = options.name.as_deref().map_or_else(|| slugify("worktree"), slugify);
    let (branch, base_branch, adopt) = resolve_branch_plan(&repo, &options.branch, &options.base, &slug)?;

    if manifest.branch_in_use(&branch) {
        return Err(KernelError::InvalidArgs(format!(
            "branch '{branch}' is already in use by an active worktree"
        )));
    }

    let session_name = manifest.session_name.clone();
    let worktree = provision_worktree(project_root, &repo, &config, &session_name, &slug, &branch, &base_branch, adopt)?;

    Ok(WorktreeCreateResult {
        worktree_id: worktree.id,
        name: slug,
        branch,
        path: worktree.path,
    })
}

/// How `perform_merge` should combine a worktree's branch into its base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// `git merge --squash`.
    Squash,
    /// `git merge --no-ff`.
    NoFf,
}

/// Options for `perform_merge` (spec §6 `merge`).
#[derive(Debug, Clone, Copy)]
pub struct MergeOptions {
    /// Which merge strategy to use.
    pub strategy: MergeStrategy,
    /// Clean up (remove) the worktree after a successful merge.
    pub cleanup: bool,
    /// Merge even if the worktree has agents that are not yet terminal.
    pub force: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self { strategy: MergeStrategy::Squash, cleanup: false, force: false }
    }
}

/// Outcome of `perform_merge`.
#[derive(Debug, Clone, Serialize)]
pub struct MergeResultReport {
    /// The merged worktree's id.
    pub worktree_id: String,
    /// `"merged"` or `"cleaned"`.
    pub status: String,
    /// The worktree's PR URL, if one had been opened.
    pub pr_url: Option<String>,
    /// Whether cleanup actually ran (only meaningful when `options.cleanup` was set).
    pub cleaned: bool,
    /// Whether cleanup was skipped because it would have affected the caller's own pane.
    pub self_protected: bool,
}

/// `merge` (spec §6) — merge a worktree's branch into its base branch, optionally cleaning up
/// afterward.
///
/// # Errors
///
/// Returns `KernelError::AgentsRunning` if agents are still live and `force` was not set, or
/// `KernelError::MergeFailed` if the merge conflicts.
pub fn perform_merge(project_root: &Path, worktree_id: &str, options: MergeOptions) -> Result<MergeResultReport> {
    refresh_statuses(project_root)?;
    let manifest = ManifestStore::read(project_root)?;
    let worktree = manifest
        .worktrees
        .get(worktree_id)
        .ok_or_else(|| KernelError::WorktreeNotFound(worktree_id.to_string()))?
        .clone();

    if !options.force {
        let running = worktree.agents.values().any(|a| !a.status.is_terminal());
        if running {
            return Err(KernelError::AgentsRunning(format!(
                "worktree '{worktree_id}' has running agents; pass --force to merge anyway"
            )));
        }
    }

    ManifestStore::update(project_root, |m| {
        if let Some(wt) = m.worktrees.get_mut(worktree_id) {
            wt.status = WorktreeStatus::Merging;
        }
        Ok(())
    })?;

    let repo = git::open_repository(project_root)?;
    let squash = matches!(options.strategy, MergeStrategy::Squash);
    let merge_result = worktree_engine::merge_worktree(&repo, &worktree, squash)?;

    if merge_result.conflicted {
        let _ = worktree_engine::abort_merge(&repo);
        ManifestStore::update(project_root, |m| {
            if let Some(wt) = m.worktrees.get_mut(worktree_id) {
                wt.status = WorktreeStatus::Failed;
            }
            Ok(())
        })?;
        return Err(KernelError::MergeFailed(merge_result.output));
    }

    ManifestStore::update(project_root, |m| {
        if let Some(wt) = m.worktrees.get_mut(worktree_id) {
            wt.status = WorktreeStatus::Merged;
            wt.merged_at = Some(Utc::now());
        }
        Ok(())
    })?;

    let mut cleaned = false;
    let mut self_protected = false;
    if options.cleanup {
        let protection = SelfProtection::capture(&manifest.session_name).unwrap_or_else(|_| SelfProtection::none());
        let outcome = worktree_engine::cleanup_worktree(&repo, &worktree, &protection)?;
        self_protected = outcome.self_protected;
        if !self_protected {
            ManifestStore::update(project_root, |m| {
                if let Some(wt) = m.worktrees.get_mut(worktree_id) {
                    wt.status = WorktreeStatus::Cleaned;
                }
                Ok(())
            })?;
            cleaned = true;
        }
    }

    Ok(MergeResultReport {
        worktree_id: worktree_id.to_string(),
        status: if cleaned { "cleaned".to_string() } else { "merged".to_string() },
        pr_url: worktree.pr_url,
        cleaned,
        self_protected,
    })
}

/// Which agent(s) `perform_kill` targets.
#[derive(Debug, Clone)]
pub enum KillScope {
    /// A single agent by id.
    Agent(String),
    /// Every agent in a single worktree.
    Worktree(String),
    /// Every tracked agent.
    All,
}

/// Options for `perform_kill` (spec §6 `kill`).
#[derive(Debug, Clone, Copy, Default)]
pub struct KillOptions {
    /// After killing, also remove the git worktree(s) the killed agents belonged to.
    pub cleanup: bool,
    /// Kill self-protected panes too (normally skipped to avoid killing the caller's own pane).
    pub force: bool,
}

/// Outcome of `perform_kill`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct KillResult {
    /// Ids of agents actually killed.
    pub killed: Vec<String>,
    /// Ids of agents skipped because killing them would have affected the caller's own pane.
    pub skipped: Vec<String>,
    /// Ids of worktrees removed as part of `cleanup`.
    pub removed_worktrees: Vec<String>,
}

/// `kill` (spec §6) — kill one agent, every agent in a worktree, or every tracked agent.
///
/// # Errors
///
/// Returns `KernelError::AgentNotFound`/`WorktreeNotFound` if the scope does not resolve.
pub fn perform_kill(project_root: &Path, scope: KillScope, options: KillOptions) -> Result<KillResult> {
    let manifest = ManifestStore::read(project_root)?;
    let session_name = manifest.session_name.clone();
    let protection = SelfProtection::capture(&session_name).unwrap_or_else(|_| SelfProtection::none());

    let affected_worktrees: Vec<String> = match &scope {
        KillScope::Agent(agent_id) => {
            let (owner, _) = manifest
                .find_agent(agent_id)
                .ok_or_else(|| KernelError::AgentNotFound(agent_id.clone()))?;
            owner.map(str::to_string).into_iter().collect()
        }
        KillScope::Worktree(worktree_id) => {
            manifest
                .worktrees
                .get(worktree_id)
                .ok_or_else(|| KernelError::WorktreeNotFound(worktree_id.clone()))?;
            vec![worktree_id.clone()]
        }
        KillScope::All => manifest.worktrees.keys().cloned().collect(),
    };

    let targets: Vec<Agent> = match &scope {
        KillScope::Agent(agent_id) => {
            let (_, agent) = manifest
                .find_agent(agent_id)
                .ok_or_else(|| KernelError::AgentNotFound(agent_id.clone()))?;
            vec![agent.clone()]
        }
        KillScope::Worktree(worktree_id) => manifest
            .worktrees
            .get(worktree_id)
            .map(|wt| wt.agents.values().cloned().collect())
            .unwrap_or_default(),
        KillScope::All => manifest.all_agents().into_iter().cloned().collect(),
    };

    let live: Vec<&Agent> = targets.iter().filter(|a| !a.status.is_terminal()).collect();
    let (safe, skipped) = if options.force { (live, Vec::new()) } else { protection.exclude_self(&live) };

    let mut result = KillResult::default();
    for agent in &safe {
        agent_engine::kill_agent(agent)?;
        result.killed.push(agent.id.clone());
    }
    for agent in &skipped {
        result.skipped.push(agent.id.clone());
    }

    if !safe.is_empty() {
        let killed_ids: std::collections::BTreeSet<String> = safe.iter().map(|a| a.id.clone()).collect();
        ManifestStore::update(project_root, |m| {
            let now = Utc::now();
            for agent in m.master_agents.values_mut().chain(m.worktrees.values_mut().flat_map(|wt| wt.agents.values_mut())) {
                if killed_ids.contains(&agent.id) {
                    agent.status = AgentStatus::Killed;
                    agent.completed_at = Some(now);
                }
            }
            Ok(())
        })?;
    }

    if options.cleanup {
        let repo = git::open_repository(project_root)?;
        let manifest = ManifestStore::read(project_root)?;
        for worktree_id in &affected_worktrees {
            let Some(worktree) = manifest.worktrees.get(worktree_id) else { continue };
            if matches!(worktree.status, WorktreeStatus::Cleaned | WorktreeStatus::Merged) {
                continue;
            }
            let outcome = worktree_engine::cleanup_worktree(&repo, worktree, &protection)?;
            if !outcome.self_protected {
                ManifestStore::update(project_root, |m| {
                    if let Some(wt) = m.worktrees.get_mut(worktree_id) {
                        wt.status = WorktreeStatus::Cleaned;
                    }
                    Ok(())
                })?;
                result.removed_worktrees.push(worktree_id.clone());
            }
        }
    }

    Ok(result)
}

/// Outcome of `perform_restart`.
#[derive(Debug, Clone, Serialize)]
pub struct RestartResult {
    /// Id of the agent that was killed.
    pub old_agent_id: String,
    /// Id of the replacement agent.
    pub new_agent_id: String,
    /// Multiplexer target of the replacement agent's pane.
    pub tmux_target: String,
}

/// `restart` (spec §6) — kill an agent (if still live) and spawn a replacement in a fresh window,
/// reusing its archived prompt unless `prompt_override` is given.
///
/// # Errors
///
/// Returns `KernelError::AgentNotFound` if `agent_id` does not resolve, `KernelError::InvalidArgs`
/// if it names a master agent, or `KernelError::PromptNotFound` if no archived prompt exists and
/// no override was given.
pub fn perform_restart(project_root: &Path, agent_id: &str, prompt_override: Option<&str>) -> Result<RestartResult> {
    let manifest = ManifestStore::read(project_root)?;
    let (owner, old_agent) = manifest
        .find_agent(agent_id)
        .ok_or_else(|| KernelError::AgentNotFound(agent_id.to_string()))?;
    let worktree_id = owner
        .ok_or_else(|| KernelError::InvalidArgs("master agents cannot be restarted".to_string()))?
        .to_string();
    let worktree = manifest
        .worktrees
        .get(&worktree_id)
        .ok_or_else(|| KernelError::WorktreeNotFound(worktree_id.clone()))?
        .clone();
    let old_agent = old_agent.clone();

    let config = Config::load(project_root)?;
    let agent_config = config.agents.get(&old_agent.agent_type).cloned().ok_or_else(|| {
        KernelError::InvalidArgs(format!("agent type '{}' no longer configured", old_agent.agent_type))
    })?;

    let (new_target, new_agent) =
        agent_engine::restart_agent(project_root, &old_agent, &worktree, &manifest.session_name, &agent_config, prompt_override)?;

    ManifestStore::update(project_root, |m| {
        if let Some(wt) = m.worktrees.get_mut(&worktree_id) {
            if let Some(existing) = wt.agents.get_mut(&old_agent.id) {
                existing.status = AgentStatus::Killed;
                existing.completed_at = Some(Utc::now());
            }
            wt.agents.insert(new_agent.id.clone(), new_agent.clone());
        }
        Ok(())
    })?;

    Ok(RestartResult { old_agent_id: old_agent.id, new_agent_id: new_agent.id, tmux_target: new_target })
}

/// Options for `perform_reset` (spec §6 `reset`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ResetOptions {
    /// Reset even if some worktrees have unmerged work.
    pub force: bool,
    /// Also run `git worktree prune` after cleanup.
    pub prune: bool,
    /// Clean up worktrees with an open PR too, instead of querying `gh` and skipping them.
    pub include_open_prs: bool,
}

/// Outcome of `perform_reset`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResetResult {
    /// Ids of worktrees removed.
    pub removed: Vec<String>,
    /// Ids of worktrees left alone (already cleaned, open-PR'd, or self-protected).
    pub skipped: Vec<String>,
    /// Count of orphaned multiplexer windows killed.
    pub orphan_windows_killed: usize,
}

/// `reset` (spec §6) — kill every live agent and clean up every worktree in the project, as a
/// last-resort recovery operation.
///
/// # Errors
///
/// Returns `KernelError::UnmergedWork` if any worktree has unmerged (and, unless
/// `include_open_prs`, un-PR'd) work and `force` was not set.
pub fn perform_reset(project_root: &Path, options: ResetOptions) -> Result<ResetResult> {
    refresh_statuses(project_root)?;
    let manifest = ManifestStore::read(project_root)?;
    let repo = git::open_repository(project_root)?;
    let session_name = manifest.session_name.clone();

    if !options.force {
        let at_risk: Vec<String> = manifest
            .worktrees
            .values()
            .filter(|wt| !matches!(wt.status, WorktreeStatus::Merged | WorktreeStatus::Cleaned))
            .filter(|wt| wt.pr_url.is_none())
            .filter(|wt| wt.agents.values().any(|a| matches!(a.status, AgentStatus::Idle | AgentStatus::Exited)))
            .map(|wt| format!("{} ({})", wt.name, wt.branch))
            .collect();
        if !at_risk.is_empty() {
            return Err(KernelError::UnmergedWork(at_risk.join(", ")));
        }
    }

    let protection = SelfProtection::capture(&session_name).unwrap_or_else(|_| SelfProtection::none());

    let live_agents: Vec<Agent> = manifest.all_agents().into_iter().filter(|a| !a.status.is_terminal()).cloned().collect();
    let live_refs: Vec<&Agent> = live_agents.iter().collect();
    let (safe, _skipped) = protection.exclude_self(&live_refs);
    agent_engine::kill_agents(&safe);

    let mut result = ResetResult::default();
    let mut known_windows = Vec::new();

    for worktree in manifest.worktrees.values() {
        known_windows.push(worktree.tmux_window.clone());
        if matches!(worktree.status, WorktreeStatus::Cleaned) {
            result.skipped.push(worktree.id.clone());
            continue;
        }
        if !options.include_open_prs
            && gh::is_available()
            && matches!(gh::pr_state(&repo.root, &worktree.branch), Ok(Some(gh::PrState::Open)))
        {
            result.skipped.push(worktree.id.clone());
            continue;
        }
        match worktree_engine::cleanup_worktree(&repo, worktree, &protection) {
            Ok(outcome) if !outcome.self_protected => result.removed.push(worktree.id.clone()),
            _ => result.skipped.push(worktree.id.clone()),
        }
    }

    let removed = result.removed.clone();
    ManifestStore::update(project_root, |m| {
        for worktree_id in &removed {
            m.worktrees.remove(worktree_id);
        }
        Ok(())
    })?;

    if mux::is_available() {
        if let Ok(killed) = worktree_engine::sweep_orphan_windows(&session_name, &known_windows, &protection) {
            result.orphan_windows_killed = killed;
        }
    }

    if options.prune {
        worktree_engine::prune_worktrees(&repo)?;
    }

    Ok(result)
}

/// Options for `perform_pr` (spec §6 `pr`).
#[derive(Debug, Clone, Default)]
pub struct PrOptions {
    /// PR title; defaults to `"<name>: <branch>"`.
    pub title: Option<String>,
    /// PR body; defaults to the worktree's agents' assembled result files.
    pub body: Option<String>,
    /// Open the PR as a draft.
    pub draft: bool,
}

/// `pr` (spec §6) — push the worktree's branch and open a pull request for it via `gh`.
///
/// # Errors
///
/// Returns `KernelError::GhNotFound` if `gh` is not installed, or propagates a push/`gh` failure.
pub fn perform_pr(project_root: &Path, worktree_id: &str, options: PrOptions) -> Result<String> {
    if !gh::is_available() {
        return Err(KernelError::GhNotFound("gh CLI is not installed or not on PATH".to_string()));
    }

    let manifest = ManifestStore::read(project_root)?;
    let worktree = manifest
        .worktrees
        .get(worktree_id)
        .ok_or_else(|| KernelError::WorktreeNotFound(worktree_id.to_string()))?
        .clone();

    let repo = git::open_repository(project_root)?;
    BranchManager::new(&repo).push(&worktree.branch)?;

    let title = options.title.unwrap_or_else(|| format!("{}: {}", worktree.name, worktree.branch));
    let body = options.body.unwrap_or_else(|| gh::assemble_pr_body(&collect_result_contents(&worktree)));

    let pr_url = gh::create_pr(&repo.root, &worktree.branch, &worktree.base_branch, &title, &body, options.draft)?;

    ManifestStore::update(project_root, |m| {
        if let Some(wt) = m.worktrees.get_mut(worktree_id) {
            wt.pr_url = Some(pr_url.clone());
        }
        Ok(())
    })?;

    Ok(pr_url)
}

fn collect_result_contents(worktree: &Worktree) -> Vec<String> {
    worktree
        .agents
        .values()
        .filter_map(|agent| agent.result_file.as_ref())
        .filter_map(|path| std::fs::read_to_string(path).ok())
        .collect()
}

/// `diff` (spec §6) — numstat-based diff summary between a worktree's base and its branch.
///
/// # Errors
///
/// Returns an error if the worktree is unknown or the underlying `git diff` fails.
pub fn perform_diff(project_root: &Path, worktree_id: &str) -> Result<DiffSummary> {
    let manifest = ManifestStore::read(project_root)?;
    let worktree = manifest
        .worktrees
        .get(worktree_id)
        .ok_or_else(|| KernelError::WorktreeNotFound(worktree_id.to_string()))?;
    let repo = git::open_repository(project_root)?;
    let summary = git::DiffGenerator::new(&repo).numstat_summary(&worktree.base_branch, &worktree.branch)?;
    Ok(summary)
}

/// What `perform_wait` blocks on.
#[derive(Debug, Clone, Copy)]
pub enum WaitTarget<'a> {
    /// Wait for a single agent to reach a terminal status.
    Agent(&'a str),
    /// Wait for every agent in a worktree to reach a terminal status.
    Worktree(&'a str),
}

/// `wait` (spec §6) — poll status until the target is terminal or `timeout` elapses.
///
/// # Errors
///
/// Returns `KernelError::AgentNotFound`/`WorktreeNotFound` if the target does not resolve, or
/// `KernelError::WaitTimeout` if the deadline passes first.
pub fn perform_wait(project_root: &Path, target: WaitTarget<'_>, timeout: Duration, poll_interval: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        refresh_statuses(project_root)?;
        let manifest = ManifestStore::read(project_root)?;
        let done = match target {
            WaitTarget::Agent(agent_id) => {
                let (_, agent) = manifest
                    .find_agent(agent_id)
                    .ok_or_else(|| KernelError::AgentNotFound(agent_id.to_string()))?;
                agent.status.is_terminal()
            }
            WaitTarget::Worktree(worktree_id) => {
                let worktree = manifest
                    .worktrees
                    .get(worktree_id)
                    .ok_or_else(|| KernelError::WorktreeNotFound(worktree_id.to_string()))?;
                worktree.agents.values().all(|a| a.status.is_terminal())
            }
        };
        if done {
            return Ok(());
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(KernelError::WaitTimeout(timeout.as_secs()));
        }
        std::thread::sleep(poll_interval.min(deadline.saturating_duration_since(now)));
    }
}

/// A single agent's reported status (`status`/`aggregate` JSON shape, spec §6).
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatusReport {
    /// The agent's id.
    pub id: String,
    /// The agent's name.
    pub name: String,
    /// Lowercase status string (e.g. `"running"`).
    pub status: String,
}

/// A worktree's reported status.
#[derive(Debug, Clone, Serialize)]
pub struct WorktreeStatusReport {
    /// The worktree's id.
    pub id: String,
    /// The worktree's slug name.
    pub name: String,
    /// The worktree's branch.
    pub branch: String,
    /// Derived lifecycle string (spec §4.7 `Lifecycle`).
    pub lifecycle: String,
    /// Every tracked agent's status.
    pub agents: Vec<AgentStatusReport>,
}

fn status_string(status: AgentStatus) -> String {
    format!("{status:?}").to_lowercase()
}

/// `status` (spec §6) — refresh live statuses, then report every worktree's derived lifecycle
/// and agent statuses.
///
/// # Errors
///
/// Returns an error if the manifest cannot be read.
pub fn perform_status(project_root: &Path) -> Result<Vec<WorktreeStatusReport>> {
    refresh_statuses(project_root)?;
    let manifest = ManifestStore::read(project_root)?;
    let mut reports: Vec<WorktreeStatusReport> = manifest
        .worktrees
        .values()
        .map(|wt| WorktreeStatusReport {
            id: wt.id.clone(),
            name: wt.name.clone(),
            branch: wt.branch.clone(),
            lifecycle: reconcile::derive_lifecycle(wt).to_string(),
            agents: wt
                .agents
                .values()
                .map(|a| AgentStatusReport { id: a.id.clone(), name: a.name.clone(), status: status_string(a.status) })
                .collect(),
        })
        .collect();
    reports.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(reports)
}

/// `aggregate` (spec §6) — assemble the combined result-file body for a worktree (the same text
/// `perform_pr` would use for a PR body), without opening a PR.
///
/// # Errors
///
/// Returns an error if the worktree is unknown.
pub fn perform_aggregate(project_root: &Path, worktree_id: &str) -> Result<String> {
    let manifest = ManifestStore::read(project_root)?;
    let worktree = manifest
        .worktrees
        .get(worktree_id)
        .ok_or_else(|| KernelError::WorktreeNotFound(worktree_id.to_string()))?;
    Ok(gh::assemble_pr_body(&collect_result_contents(worktree)))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PaneObservation {
    hash: u64,
    observed_at: DateTime<Utc>,
}

fn load_pane_cache(path: &Path) -> BTreeMap<String, PaneObservation> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|contents| serde_json::from_str(&contents).ok())
        .unwrap_or_default()
}

fn save_pane_cache(path: &Path, cache: &BTreeMap<String, PaneObservation>) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!(error = %e, "Failed to create pane cache directory");
            return;
        }
    }
    match serde_json::to_string_pretty(cache) {
        Ok(contents) => {
            if let Err(e) = std::fs::write(path, contents) {
                warn!(error = %e, "Failed to write pane cache");
            }
        }
        Err(e) => warn!(error = %e, "Failed to serialize pane cache"),
    }
}

fn hash_pane_output(text: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Drive the C7 reconciler: capture each live agent's pane output, update the best-effort
/// pane-content cache, and commit the resulting statuses in one manifest update. A no-op (not an
/// error) if tmux is unavailable or the session has no panes, since status refresh is advisory.
///
/// # Errors
///
/// Returns an error if the manifest cannot be read or the update cannot be committed.
pub fn refresh_statuses(project_root: &Path) -> Result<()> {
    if !mux::is_available() {
        return Ok(());
    }

    let manifest = ManifestStore::read(project_root)?;
    let session_name = manifest.session_name.clone();
    let quiescence = Duration::from_secs(Config::load(project_root)?.quiescence_secs);

    let Ok(panes) = mux::list_session_panes(&session_name) else {
        return Ok(());
    };

    let cache_path = ProjectPaths::new(project_root).pane_cache_file();
    let mut cache = load_pane_cache(&cache_path);
    let now = Utc::now();
    let mut unchanged_durations: BTreeMap<String, Duration> = BTreeMap::new();

    for agent in manifest.all_agents() {
        if agent.status.is_terminal() {
            continue;
        }
        let Ok(captured) = mux::capture_pane(&agent.tmux_target, Some(50)) else {
            continue;
        };
        let hash = hash_pane_output(&captured);
        let unchanged_since = match cache.get(&agent.id) {
            Some(observation) if observation.hash == hash => observation.observed_at,
            _ => {
                cache.insert(agent.id.clone(), PaneObservation { hash, observed_at: now });
                now
            }
        };
        let elapsed = (now - unchanged_since).to_std().unwrap_or(Duration::ZERO);
        unchanged_durations.insert(agent.id.clone(), elapsed);
    }

    save_pane_cache(&cache_path, &cache);

    ManifestStore::update(project_root, |m| {
        reconcile::refresh_agent_statuses(&mut m.master_agents, &panes, &unchanged_durations, quiescence);
        for worktree in m.worktrees.values_mut() {
            reconcile::refresh_agent_statuses(&mut worktree.agents, &panes, &unchanged_durations, quiescence);
        }
        Ok(())
    })
}

/// Outcome of `perform_clean`.
#[derive(Debug, Clone, Serialize)]
pub struct CleanResult {
    /// The worktree that was (or would have been) cleaned.
    pub worktree_id: String,
    /// Whether cleanup actually ran.
    pub cleaned: bool,
    /// Whether cleanup was skipped because it would have affected the caller's own pane.
    pub self_protected: bool,
}

/// `clean` (spec §6) — remove a single worktree's git/mux resources without merging it first.
///
/// # Errors
///
/// Returns `KernelError::AgentsRunning` if agents are still live and `force` was not set.
pub fn perform_clean(project_root: &Path, worktree_id: &str, force: bool) -> Result<CleanResult> {
    let manifest = ManifestStore::read(project_root)?;
    let worktree = manifest
        .worktrees
        .get(worktree_id)
        .ok_or_else(|| KernelError::WorktreeNotFound(worktree_id.to_string()))?
        .clone();

    if matches!(worktree.status, WorktreeStatus::Cleaned) {
        return Ok(CleanResult { worktree_id: worktree_id.to_string(), cleaned: false, self_protected: false });
    }

    if !force {
        let running = worktree.agents.values().any(|a| !a.status.is_terminal());
        if running {
            return Err(KernelError::AgentsRunning(format!(
                "worktree '{worktree_id}' has running agents; pass --force to clean anyway"
            )));
        }
    }

    let repo = git::open_repository(project_root)?;
    let protection = SelfProtection::capture(&manifest.session_name).unwrap_or_else(|_| SelfProtection::none());
    let outcome = worktree_engine::cleanup_worktree(&repo, &worktree, &protection)?;

    if !outcome.self_protected {
        ManifestStore::update(project_root, |m| {
            if let Some(wt) = m.worktrees.get_mut(worktree_id) {
                wt.status = WorktreeStatus::Cleaned;
            }
            Ok(())
        })?;
    }

    Ok(CleanResult { worktree_id: worktree_id.to_string(), cleaned: !outcome.self_protected, self_protected: outcome.self_protected })
}

/// `send` (spec §6) — send keystrokes (or, if `literal`, literal text with no `Enter`) to an
/// agent's pane.
///
/// # Errors
///
/// Returns `KernelError::AgentNotFound` if the agent is unknown, or propagates a mux failure.
pub fn perform_send(project_root: &Path, agent_id: &str, text: &str, literal: bool) -> Result<()> {
    let manifest = ManifestStore::read(project_root)?;
    let (_, agent) = manifest.find_agent(agent_id).ok_or_else(|| KernelError::AgentNotFound(agent_id.to_string()))?;
    if literal {
        mux::send_literal(&agent.tmux_target, text).map_err(|e| anyhow::anyhow!(e).into())
    } else {
        mux::send_keys(&agent.tmux_target, text).map_err(|e| anyhow::anyhow!(e).into())
    }
}

/// `logs` (spec §6) — capture an agent's pane output, optionally limited to its last `last_n`
/// lines.
///
/// # Errors
///
/// Returns `KernelError::AgentNotFound` if the agent is unknown, or propagates a mux failure.
pub fn perform_logs(project_root: &Path, agent_id: &str, last_n: Option<u32>) -> Result<String> {
    let manifest = ManifestStore::read(project_root)?;
    let (_, agent) = manifest.find_agent(agent_id).ok_or_else(|| KernelError::AgentNotFound(agent_id.to_string()))?;
    mux::capture_pane(&agent.tmux_target, last_n).map_err(|e| anyhow::anyhow!(e).into())
}

/// Resolve the multiplexer target `attach` (spec §6) should hand to `tmux attach-session`/`exec`.
///
/// # Errors
///
/// Returns `KernelError::AgentNotFound` if the agent is unknown.
pub fn resolve_attach_target(project_root: &Path, agent_id: &str) -> Result<String> {
    let manifest = ManifestStore::read(project_root)?;
    let (_, agent) = manifest.find_agent(agent_id).ok_or_else(|| KernelError::AgentNotFound(agent_id.to_string()))?;
    Ok(agent.tmux_target.clone())
}
