//! Agent Lifecycle Engine (spec §4.5, component C5).
//!
//! Spawning never forks a child directly — the multiplexer owns the process, matching the
//! teacher's own `SessionManager::send_keys_and_submit` pattern in
//! `app/handlers/agent_lifecycle.rs`, generalized from "open a terminal" to "launch a
//! configured agent program with a rendered prompt."

use crate::command::parse_command_line;
use crate::config::AgentConfig;
use crate::error::{KernelError, Result};
use crate::manifest::{Agent, AgentStatus, Worktree};
use crate::mux;
use crate::paths::ProjectPaths;
use crate::prompts;
use chrono::Utc;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Brief settle time after launching the agent program before typing its prompt, for agents
/// that take a prompt on stdin rather than as a launch flag. Mirrors the teacher's own
/// window-creation-then-send-keys two-step rather than assuming instantaneous readiness.
const PROMPT_SETTLE: Duration = Duration::from_millis(500);

/// `spawnAgent` (spec §4.5). Writes the prompt archive, starts the configured agent program in
/// `tmux_target` via `sendKeys`, and returns a fully populated `Agent` with `status = running`.
///
/// # Errors
///
/// Returns an error if the prompt archive cannot be written, or if the mux launch fails — in
/// which case the caller receives a `Agent` via [`failed_agent`] instead and must persist it.
#[allow(clippy::too_many_arguments, reason = "mirrors the spec's spawnAgent signature verbatim")]
pub fn spawn_agent(
    agent_id: &str,
    name: &str,
    agent_type: &str,
    agent_config: &AgentConfig,
    prompt: &str,
    project_root: &Path,
    tmux_target: &str,
    session_id: Option<String>,
    skip_result_instructions: bool,
) -> Result<Agent> {
    let paths = ProjectPaths::new(project_root);
    let result_file = if skip_result_instructions {
        None
    } else {
        agent_config.result_instructions.as_ref().map(|_| paths.result_file(agent_id))
    };

    let rendered = match (&agent_config.result_instructions, &result_file) {
        (Some(instructions), Some(path)) => {
            prompts::append_result_instructions(prompt, instructions, path)
        }
        _ => prompt.to_string(),
    };

    let archive_path = paths.agent_prompt_file(agent_id);
    if let Some(parent) = archive_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", parent.display()))?;
    }
    fs::write(&archive_path, &rendered)
        .map_err(|e| anyhow::anyhow!("Failed to write prompt archive {}: {e}", archive_path.display()))?;

    if let Some(result_file) = &result_file {
        if let Some(parent) = result_file.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", parent.display()))?;
        }
    }

    let launch = build_launch_command(agent_config, &rendered, &archive_path)?;
    info!(agent_id, tmux_target, "Launching agent");

    let started_at = Utc::now();
    match &launch {
        LaunchCommand::WithPrompt(command_line) => {
            mux::send_keys(tmux_target, command_line).map_err(|e| {
                anyhow::anyhow!("Failed to launch agent '{agent_id}' in {tmux_target}: {e}")
            })?;
        }
        LaunchCommand::BareThenType(command_line) => {
            mux::send_keys(tmux_target, command_line).map_err(|e| {
                anyhow::anyhow!("Failed to launch agent '{agent_id}' in {tmux_target}: {e}")
            })?;
            if agent_config.interactive {
                std::thread::sleep(PROMPT_SETTLE);
                mux::send_keys(tmux_target, &rendered).map_err(|e| {
                    anyhow::anyhow!("Failed to send prompt to agent '{agent_id}': {e}")
                })?;
            }
        }
    }

    Ok(Agent {
        id: agent_id.to_string(),
        name: name.to_string(),
        agent_type: agent_type.to_string(),
        status: AgentStatus::Running,
        tmux_target: tmux_target.to_string(),
        prompt: truncate_snapshot(&rendered),
        result_file: result_file.map(|p| p.display().to_string()),
        started_at,
        completed_at: None,
        exit_code: None,
        error: None,
        session_id,
    })
}

/// Build a skeleton agent record in `failed` status for a spawn that could not be launched, so
/// cleanup can find it (spec §4.5: "the caller is expected to have already persisted a skeleton
/// record so cleanup can find it").
#[must_use]
pub fn failed_agent(agent_id: &str, name: &str, agent_type: &str, tmux_target: &str, error: &str) -> Agent {
    let now = Utc::now();
    Agent {
        id: agent_id.to_string(),
        name: name.to_string(),
        agent_type: agent_type.to_string(),
        status: AgentStatus::Failed,
        tmux_target: tmux_target.to_string(),
        prompt: String::new(),
        result_file: None,
        started_at: now,
        completed_at: Some(now),
        exit_code: None,
        error: Some(error.to_string()),
        session_id: None,
    }
}

enum LaunchCommand {
    /// A single command line that already embeds the prompt (via a prompt/prompt-file flag).
    WithPrompt(String),
    /// A bare launch command; the prompt must be typed in separately once the program is ready.
    BareThenType(String),
}

fn build_launch_command(config: &AgentConfig, rendered: &str, archive_path: &Path) -> Result<LaunchCommand> {
    let mut argv = parse_command_line(&config.command)
        .map_err(|e| anyhow::anyhow!("Invalid agent command '{}': {e}", config.command))?;

    if let Some(flag) = &config.prompt_flag {
        argv.push(flag.clone());
        argv.push(rendered.to_string());
        return Ok(LaunchCommand::WithPrompt(shell_words::join(&argv)));
    }
    if let Some(flag) = &config.prompt_file_flag {
        argv.push(flag.clone());
        argv.push(archive_path.display().to_string());
        return Ok(LaunchCommand::WithPrompt(shell_words::join(&argv)));
    }
    Ok(LaunchCommand::BareThenType(shell_words::join(&argv)))
}

fn truncate_snapshot(prompt: &str) -> String {
    const MAX_LEN: usize = 500;
    if prompt.len() <= MAX_LEN {
        return prompt.to_string();
    }
    let boundary = (0..=MAX_LEN).rev().find(|&i| prompt.is_char_boundary(i)).unwrap_or(0);
    format!("{}…", &prompt[..boundary])
}

/// `killAgent` (spec §4.5). Best-effort: tolerates an already-dead target. Does not mutate the
/// manifest; the caller commits the resulting status via `ManifestStore::update`.
///
/// # Errors
///
/// Returns an error only if the mux transport itself is unavailable.
pub fn kill_agent(agent: &Agent) -> Result<()> {
    mux::kill_window(&agent.tmux_target).map_err(|e| anyhow::anyhow!("Failed to kill agent pane: {e}").into())
}

/// `killAgents` (spec §4.5). Best-effort over a batch; individual failures are logged and
/// skipped rather than aborting the whole batch, matching the spec's framing of kill as
/// best-effort.
pub fn kill_agents(agents: &[&Agent]) {
    for agent in agents {
        if let Err(e) = kill_agent(agent) {
            warn!(agent_id = agent.id, error = %e, "Failed to kill agent pane");
        }
    }
}

/// `restartAgent` (spec §4.5). Kills the old agent if live, allocates a new id, opens a new
/// window in the worktree, and spawns the replacement. Returns `(new_agent, new_target)`; the
/// caller is responsible for committing both the old agent's `killed` transition and the new
/// agent's insertion in a single `update`.
///
/// # Errors
///
/// Returns `KernelError::PromptNotFound` if no archived prompt exists for `old_agent`, or
/// propagates mux/launch failures.
pub fn restart_agent(
    project_root: &Path,
    old_agent: &Agent,
    worktree: &Worktree,
    session_name: &str,
    agent_config: &AgentConfig,
    prompt_override: Option<&str>,
) -> Result<(String, Agent)> {
    let paths = ProjectPaths::new(project_root);
    let prompt = match prompt_override {
        Some(text) => text.to_string(),
        None => {
            let archive = paths.agent_prompt_file(&old_agent.id);
            fs::read_to_string(&archive).map_err(|_| {
                KernelError::PromptNotFound(format!("no archived prompt for agent {}", old_agent.id))
            })?
        }
    };

    if !old_agent.status.is_terminal() {
        kill_agent(old_agent)?;
    }

    let new_agent_id = crate::id::agent_id();
    let target = mux::create_window(session_name, &worktree.name, Path::new(&worktree.path))
        .map_err(|e| anyhow::anyhow!("Failed to create window for restarted agent: {e}"))?;

    let new_agent = spawn_agent(
        &new_agent_id,
        &old_agent.name,
        &old_agent.agent_type,
        agent_config,
        &prompt,
        project_root,
        &target,
        None,
        false,
    )?;

    Ok((target, new_agent))
}

/// `spawnMasterAgent` (spec §4.5) — spawns an agent not tied to any worktree. Identical launch
/// mechanics to `spawn_agent`; the distinction (manifest placement under `master_agents` rather
/// than a worktree) is the caller's responsibility when committing the result.
#[allow(clippy::too_many_arguments, reason = "mirrors spawn_agent's signature")]
pub fn spawn_master_agent(
    agent_id: &str,
    name: &str,
    agent_type: &str,
    agent_config: &AgentConfig,
    prompt: &str,
    project_root: &Path,
    tmux_target: &str,
) -> Result<Agent> {
    spawn_agent(
        agent_id,
        name,
        agent_type,
        agent_config,
        prompt,
        project_root,
        tmux_target,
        None,
        false,
    )
}
