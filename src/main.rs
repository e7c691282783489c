//! `ppg` CLI front-end — parses arguments, delegates to `ppg::ops`/`ppg::scheduler`, and prints
//! either a human-readable summary or (with `--json`) the operation's result object verbatim.
//!
//! The front-end is deliberately thin: every decision of substance lives in `ops.rs`; this file's
//! job is argument parsing, output formatting, and exit-code mapping (spec §6).

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use ppg::error::KernelError;
use ppg::ops::{
    self, KillOptions, KillScope, MergeOptions, MergeStrategy, PrOptions, SpawnOptions, SwarmOptions, WaitTarget,
    WorktreeCreateOptions,
};
use ppg::scheduler::{self, ScheduleEntry};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "ppg", version, about = "Orchestration kernel for parallel AI coding agents")]
struct Cli {
    /// Emit the operation's result as JSON instead of a human-readable summary.
    #[arg(long, global = true)]
    json: bool,

    /// Project root to operate on (defaults to the current directory's git repository).
    #[arg(long, global = true, value_name = "PATH")]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// A single `--var KEY=VALUE` template substitution, repeatable.
#[derive(Debug, Clone)]
struct VarArg {
    key: String,
    value: String,
}

fn parse_var(raw: &str) -> Result<VarArg, String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    Ok(VarArg { key: key.to_string(), value: value.to_string() })
}

fn vars_map(vars: &[VarArg]) -> BTreeMap<String, String> {
    vars.iter().map(|v| (v.key.clone(), v.value.clone())).collect()
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize `.ppg/` in the project root.
    Init {
        /// Multiplexer session name (defaults to a slug of the repository name).
        name: Option<String>,
    },
    /// Create or adopt a worktree and spawn one or more agents into it.
    Spawn {
        /// Name used for the worktree/branch slug.
        #[arg(long)]
        name: Option<String>,
        /// Explicit branch to create or adopt. Mutually exclusive with `--worktree`.
        #[arg(long)]
        branch: Option<String>,
        /// Spawn into an already-tracked worktree instead of creating a new one.
        #[arg(long)]
        worktree: Option<String>,
        /// Base branch a new branch is cut from. Mutually exclusive with `--worktree`.
        #[arg(long)]
        base: Option<String>,
        /// Inline prompt text.
        #[arg(long)]
        prompt: Option<String>,
        /// Path to a file containing the prompt text.
        #[arg(long)]
        prompt_file: Option<PathBuf>,
        /// Name of a named prompt template.
        #[arg(long)]
        template: Option<String>,
        /// Template variable substitution `KEY=VALUE`, repeatable.
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<VarArg>,
        /// Configured agent program to use.
        #[arg(long = "agent")]
        agent_type: Option<String>,
        /// Number of agents to spawn into the worktree.
        #[arg(long, default_value_t = 1)]
        count: u32,
        /// Split panes from the first window instead of opening a new window per agent.
        #[arg(long)]
        split: bool,
        /// Suppress the result-file instructions appended to the prompt.
        #[arg(long)]
        skip_result_instructions: bool,
        /// Also open a desktop terminal attached to the session.
        #[arg(long)]
        open_terminal: bool,
    },
    /// Resolve a named swarm template and spawn one agent per entry.
    Swarm {
        /// Name of the swarm template to resolve.
        swarm: String,
        /// Base name used for each entry's worktree/agent.
        #[arg(long)]
        name: Option<String>,
        /// Template variable substitution `KEY=VALUE`, repeatable.
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<VarArg>,
    },
    /// Print the multiplexer target to attach to for an agent.
    Attach {
        /// Agent id.
        agent: String,
    },
    /// Report every worktree's derived lifecycle and agent statuses.
    Status,
    /// Capture an agent's pane output.
    Logs {
        /// Agent id.
        agent: String,
        /// Limit output to the last N lines.
        #[arg(long)]
        last: Option<u32>,
    },
    /// Send keystrokes to an agent's pane.
    Send {
        /// Agent id.
        agent: String,
        /// Text to send.
        text: String,
        /// Send literal text with no trailing `Enter`.
        #[arg(long)]
        literal: bool,
    },
    /// Kill one agent, every agent in a worktree, or every tracked agent.
    Kill {
        /// Agent id to kill.
        #[arg(long, conflicts_with_all = ["worktree", "all"])]
        agent: Option<String>,
        /// Worktree whose agents should be killed.
        #[arg(long, conflicts_with = "all")]
        worktree: Option<String>,
        /// Kill every tracked agent.
        #[arg(long)]
        all: bool,
        /// Also remove the git worktree(s) the killed agents belonged to.
        #[arg(long)]
        cleanup: bool,
        /// Kill self-protected panes too.
        #[arg(long)]
        force: bool,
    },
    /// Kill an agent and spawn a replacement in a fresh window.
    Restart {
        /// Agent id.
        agent: String,
        /// Override the archived prompt instead of reusing it.
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Merge a worktree's branch into its base branch.
    Merge {
        /// Worktree id.
        worktree: String,
        /// Use `git merge --no-ff` instead of `--squash`.
        #[arg(long)]
        no_ff: bool,
        /// Remove the worktree after a successful merge.
        #[arg(long)]
        cleanup: bool,
        /// Merge even if agents are not yet terminal.
        #[arg(long)]
        force: bool,
    },
    /// Push a worktree's branch and open a pull request for it.
    Pr {
        /// Worktree id.
        worktree: String,
        /// PR title (defaults to `"<name>: <branch>"`).
        #[arg(long)]
        title: Option<String>,
        /// PR body (defaults to the worktree's assembled result files).
        #[arg(long)]
        body: Option<String>,
        /// Open the PR as a draft.
        #[arg(long)]
        draft: bool,
    },
    /// Summarize a worktree's diff against its base branch.
    Diff {
        /// Worktree id.
        worktree: String,
    },
    /// Block until an agent or worktree reaches a terminal status.
    Wait {
        /// Agent id to wait on. Mutually exclusive with `--worktree`.
        #[arg(long, conflicts_with = "worktree")]
        agent: Option<String>,
        /// Worktree id to wait on. Mutually exclusive with `--agent`.
        #[arg(long)]
        worktree: Option<String>,
        /// Absolute timeout in seconds.
        #[arg(long, default_value_t = 300)]
        timeout: u64,
        /// Polling interval in seconds.
        #[arg(long, default_value_t = 5)]
        poll_interval: u64,
    },
    /// Assemble a worktree's combined result-file body.
    Aggregate {
        /// Worktree id.
        worktree: String,
    },
    /// Remove a single worktree's git/mux resources without merging it first.
    Clean {
        /// Worktree id.
        worktree: String,
        /// Clean even if agents are not yet terminal.
        #[arg(long)]
        force: bool,
    },
    /// Kill every live agent and clean up every worktree in the project.
    Reset {
        /// Reset even if some worktrees have unmerged work.
        #[arg(long)]
        force: bool,
        /// Also run `git worktree prune` after cleanup.
        #[arg(long)]
        prune: bool,
        /// Treat worktrees with an open PR as safe to reset too.
        #[arg(long)]
        include_open_prs: bool,
    },
    /// Worktree-only operations not tied to spawning an agent.
    Worktree {
        #[command(subcommand)]
        action: WorktreeCommands,
    },
    /// List named resources visible to the project.
    List {
        #[command(subcommand)]
        kind: ListCommands,
    },
    /// Print a named prompt template's rendered text.
    Prompt {
        /// Prompt template name.
        name: String,
    },
    /// Cron-style scheduler daemon control (spec §4.8).
    Cron {
        #[command(subcommand)]
        action: CronCommands,
    },
    /// Local HTTPS control-plane process (not implemented by this build).
    Serve {
        #[command(subcommand)]
        action: ServeCommands,
    },
}

#[derive(Subcommand)]
enum WorktreeCommands {
    /// Create (or adopt) a worktree without spawning an agent into it.
    Create {
        /// Name used for the worktree slug.
        #[arg(long)]
        name: Option<String>,
        /// Explicit branch to create or adopt.
        #[arg(long)]
        branch: Option<String>,
        /// Base branch a new branch is cut from.
        #[arg(long)]
        base: Option<String>,
    },
}

#[derive(Subcommand)]
enum ListCommands {
    /// List configured agent program names.
    Templates,
    /// List named prompt templates.
    Prompts,
    /// List named swarm templates.
    Swarms,
}

#[derive(Subcommand)]
enum CronCommands {
    /// Start the scheduler daemon, detached from the calling terminal.
    Start,
    /// Stop a running scheduler daemon.
    Stop,
    /// Report whether a scheduler daemon is running.
    Status,
    /// List every schedule entry.
    List,
    /// Add a schedule entry.
    Add {
        /// Unique name within the schedule file.
        name: String,
        /// Standard 5-field crontab expression.
        cron: String,
        /// Name of a swarm template to fire. Mutually exclusive with `--prompt`.
        #[arg(long, conflicts_with = "prompt")]
        swarm: Option<String>,
        /// Inline prompt text to fire. Mutually exclusive with `--swarm`.
        #[arg(long)]
        prompt: Option<String>,
        /// Template variable substitution `KEY=VALUE`, repeatable.
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<VarArg>,
    },
    /// Remove a schedule entry by name.
    Remove {
        /// Schedule entry name.
        name: String,
    },
    /// Run the scheduler daemon in the foreground. Internal: launched by `cron start`.
    #[command(hide = true, name = "_daemon")]
    Daemon,
}

#[derive(Subcommand)]
enum ServeCommands {
    /// Start the HTTPS control-plane process.
    Start,
    /// Stop the HTTPS control-plane process.
    Stop,
    /// Report whether the HTTPS control-plane process is running.
    Status,
    /// Register a pairing token.
    Register,
    /// Revoke a pairing token.
    Unregister,
    /// Run the HTTPS control-plane process in the foreground. Internal.
    #[command(hide = true, name = "_daemon")]
    Daemon,
}

/// Build the `EnvFilter`, preferring `PPG_LOG` over the conventional `RUST_LOG` (spec "Logging").
fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_env("PPG_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
}

/// Initialize the global tracing subscriber. A detached `cron _daemon` process has no controlling
/// terminal once its parent CLI invocation exits, so it writes through a non-blocking file
/// appender into `.ppg/logs/` instead of stderr; every other invocation logs to stderr as usual.
/// The returned guard must be kept alive for the process's lifetime or buffered lines are lost.
fn init_tracing(project_root: Option<&std::path::Path>, is_daemon: bool) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    if is_daemon {
        if let Some(root) = project_root {
            let logs_dir = ppg::paths::ProjectPaths::new(root).logs_dir();
            let _ = std::fs::create_dir_all(&logs_dir);
            let appender = tracing_appender::rolling::never(&logs_dir, "daemon.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt().with_env_filter(env_filter()).with_writer(writer).with_ansi(false).init();
            return Some(guard);
        }
    }
    tracing_subscriber::fmt().with_env_filter(env_filter()).init();
    None
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            if e.kind() == clap::error::ErrorKind::DisplayHelp || e.kind() == clap::error::ErrorKind::DisplayVersion {
                e.exit();
            }
            eprintln!("error: {}\n", e.kind());
            let _ = Cli::command().print_help();
            std::process::exit(1);
        }
    };

    let is_daemon = matches!(
        cli.command,
        Commands::Cron { action: CronCommands::Daemon } | Commands::Serve { action: ServeCommands::Daemon }
    );
    let _guard = init_tracing(cli.project.as_deref(), is_daemon);

    let json = cli.json;
    match run(cli) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            report_error(&e, json);
            std::process::exit(e.exit_code());
        }
    }
}

fn report_error(err: &KernelError, json: bool) {
    if json {
        let payload = serde_json::json!({ "error": { "code": err.code(), "message": err.to_string() } });
        println!("{payload}");
    } else {
        eprintln!("error [{}]: {err}", err.code());
    }
}

fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce(&T)) -> ppg::Result<()> {
    if json {
        let rendered =
            serde_json::to_string_pretty(value).map_err(|e| anyhow::anyhow!("Failed to serialize result: {e}"))?;
        println!("{rendered}");
    } else {
        human(value);
    }
    Ok(())
}

#[allow(clippy::too_many_lines, reason = "one dispatch arm per CLI subcommand, mirrors the spec's flat command list")]
fn run(cli: Cli) -> ppg::Result<()> {
    let json = cli.json;
    let project_root = ops::resolve_project_root(cli.project)?;

    match cli.command {
        Commands::Init { name } => {
            let manifest = ops::init(&project_root, name.as_deref())?;
            emit(json, &manifest, |m| {
                println!("Initialized .ppg for session '{}' at {}", m.session_name, m.project_root);
            })
        }

        Commands::Spawn {
            name,
            branch,
            worktree,
            base,
            prompt,
            prompt_file,
            template,
            vars,
            agent_type,
            count,
            split,
            skip_result_instructions,
            open_terminal,
        } => {
            let options = SpawnOptions {
                name,
                branch,
                worktree,
                base,
                prompt,
                prompt_file,
                template,
                vars: vars_map(&vars),
                agent_type,
                count,
                split,
                skip_result_instructions,
                open_terminal,
            };
            let result = ops::perform_spawn(&project_root, options)?;
            emit(json, &result, |r| {
                println!("Spawned {} agent(s) into worktree {} ({})", r.agents.len(), r.worktree_id, r.branch);
                for agent in &r.agents {
                    println!("  {} -> {}", agent.id, agent.tmux_target);
                }
            })
        }

        Commands::Swarm { swarm, name, vars } => {
            let options = SwarmOptions { swarm, name, vars: vars_map(&vars) };
            let result = ops::perform_swarm(&project_root, options)?;
            emit(json, &result, |r| {
                println!("Spawned swarm '{}' across {} worktree(s):", r.swarm, r.worktrees.len());
                for entry in &r.entries {
                    println!("  {} -> {} ({})", entry.entry_name, entry.agent.id, entry.worktree_id);
                }
            })
        }

        Commands::Attach { agent } => {
            let target = ops::resolve_attach_target(&project_root, &agent)?;
            emit(json, &target, |t| println!("{t}"))
        }

        Commands::Status => {
            let reports = ops::perform_status(&project_root)?;
            emit(json, &reports, |reports| {
                for wt in reports {
                    println!("{} {} ({}) [{}]", wt.id, wt.name, wt.branch, wt.lifecycle);
                    for agent in &wt.agents {
                        println!("  {} {} {}", agent.id, agent.name, agent.status);
                    }
                }
            })
        }

        Commands::Logs { agent, last } => {
            let output = ops::perform_logs(&project_root, &agent, last)?;
            emit(json, &output, |o| println!("{o}"))
        }

        Commands::Send { agent, text, literal } => {
            ops::perform_send(&project_root, &agent, &text, literal)?;
            emit(json, &(), |()| println!("Sent to {agent}"))
        }

        Commands::Kill { agent, worktree, all, cleanup, force } => {
            let scope = resolve_kill_scope(agent, worktree, all)?;
            let result = ops::perform_kill(&project_root, scope, KillOptions { cleanup, force })?;
            emit(json, &result, |r| {
                println!("killed: {:?}", r.killed);
                if !r.skipped.is_empty() {
                    println!("skipped (self-protected): {:?}", r.skipped);
                }
                if !r.removed_worktrees.is_empty() {
                    println!("removed worktrees: {:?}", r.removed_worktrees);
                }
            })
        }

        Commands::Restart { agent, prompt } => {
            let result = ops::perform_restart(&project_root, &agent, prompt.as_deref())?;
            emit(json, &result, |r| {
                println!("{} -> {} ({})", r.old_agent_id, r.new_agent_id, r.tmux_target);
            })
        }

        Commands::Merge { worktree, no_ff, cleanup, force } => {
            let strategy = if no_ff { MergeStrategy::NoFf } else { MergeStrategy::Squash };
            let result = ops::perform_merge(&project_root, &worktree, MergeOptions { strategy, cleanup, force })?;
            emit(json, &result, |r| println!("{} {}", r.worktree_id, r.status))
        }

        Commands::Pr { worktree, title, body, draft } => {
            let url = ops::perform_pr(&project_root, &worktree, PrOptions { title, body, draft })?;
            emit(json, &url, |u| println!("{u}"))
        }

        Commands::Diff { worktree } => {
            let summary = ops::perform_diff(&project_root, &worktree)?;
            emit(json, &summary, |s| println!("{s}"))
        }

        Commands::Wait { agent, worktree, timeout, poll_interval } => {
            let target = resolve_wait_target(agent.as_deref(), worktree.as_deref())?;
            ops::perform_wait(&project_root, target, Duration::from_secs(timeout), Duration::from_secs(poll_interval))?;
            emit(json, &(), |()| println!("done"))
        }

        Commands::Aggregate { worktree } => {
            let body = ops::perform_aggregate(&project_root, &worktree)?;
            emit(json, &body, |b| println!("{b}"))
        }

        Commands::Clean { worktree, force } => {
            let result = ops::perform_clean(&project_root, &worktree, force)?;
            emit(json, &result, |r| println!("{} cleaned={}", r.worktree_id, r.cleaned))
        }

        Commands::Reset { force, prune, include_open_prs } => {
            let result = ops::perform_reset(&project_root, ops::ResetOptions { force, prune, include_open_prs })?;
            emit(json, &result, |r| {
                println!("removed: {:?}", r.removed);
                println!("skipped: {:?}", r.skipped);
                println!("orphan windows killed: {}", r.orphan_windows_killed);
            })
        }

        Commands::Worktree { action: WorktreeCommands::Create { name, branch, base } } => {
            let result = ops::perform_worktree_create(&project_root, WorktreeCreateOptions { name, branch, base })?;
            emit(json, &result, |r| println!("{} {} ({})", r.worktree_id, r.name, r.path))
        }

        Commands::List { kind } => run_list(&project_root, kind, json),

        Commands::Prompt { name } => {
            let text = ppg::prompts::resolve_prompt(&project_root, &name).map_err(|e| KernelError::PromptNotFound(e.to_string()))?;
            emit(json, &text, |t| println!("{t}"))
        }

        Commands::Cron { action } => run_cron(&project_root, action, json),

        Commands::Serve { action: _ } => Err(KernelError::InvalidArgs(
            "ppg serve is not implemented by this build; the HTTPS transport is an external caller of the kernel, not part of it".to_string(),
        )),
    }
}

fn resolve_kill_scope(agent: Option<String>, worktree: Option<String>, all: bool) -> ppg::Result<KillScope> {
    match (agent, worktree, all) {
        (Some(agent), None, false) => Ok(KillScope::Agent(agent)),
        (None, Some(worktree), false) => Ok(KillScope::Worktree(worktree)),
        (None, None, true) => Ok(KillScope::All),
        _ => Err(KernelError::InvalidArgs("exactly one of --agent, --worktree, --all is required".to_string())),
    }
}

fn resolve_wait_target<'a>(agent: Option<&'a str>, worktree: Option<&'a str>) -> ppg::Result<WaitTarget<'a>> {
    match (agent, worktree) {
        (Some(agent), None) => Ok(WaitTarget::Agent(agent)),
        (None, Some(worktree)) => Ok(WaitTarget::Worktree(worktree)),
        _ => Err(KernelError::InvalidArgs("exactly one of --agent, --worktree is required".to_string())),
    }
}

fn run_list(project_root: &std::path::Path, kind: ListCommands, json: bool) -> ppg::Result<()> {
    let names = match kind {
        ListCommands::Templates => {
            let config = ppg::config::Config::load(project_root)?;
            config.agents.keys().cloned().collect::<Vec<_>>()
        }
        ListCommands::Prompts => ppg::prompts::list_prompts(project_root),
        ListCommands::Swarms => ppg::prompts::list_swarms(project_root),
    };
    emit(json, &names, |names| {
        for name in names {
            println!("{name}");
        }
    })
}

fn run_cron(project_root: &std::path::Path, action: CronCommands, json: bool) -> ppg::Result<()> {
    match action {
        CronCommands::Start => {
            if scheduler::daemon_status(project_root).is_some() {
                return Err(KernelError::InvalidArgs("scheduler is already running".to_string()));
            }
            let exe = std::env::current_exe().map_err(|e| anyhow::anyhow!("Failed to resolve own executable: {e}"))?;
            let child = std::process::Command::new(exe)
                .args(["--project", &project_root.display().to_string(), "cron", "_daemon"])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .map_err(|e| anyhow::anyhow!("Failed to spawn scheduler daemon: {e}"))?;
            let pid = child.id();
            emit(json, &pid, |pid| println!("Scheduler daemon started (pid {pid})"))
        }
        CronCommands::Stop => {
            let pid = scheduler::stop_daemon(project_root)?;
            emit(json, &pid, |pid| println!("Stopped scheduler daemon (pid {pid})"))
        }
        CronCommands::Status => {
            let pid = scheduler::daemon_status(project_root);
            emit(json, &pid, |pid| match pid {
                Some(pid) => println!("running (pid {pid})"),
                None => println!("not running"),
            })
        }
        CronCommands::List => {
            let entries = scheduler::schedule_file::read(project_root)?;
            emit(json, &entries, |entries| {
                for entry in entries {
                    let target = entry.swarm.as_deref().map_or_else(|| "prompt".to_string(), |s| format!("swarm:{s}"));
                    println!("{} [{}] {target}", entry.name, entry.cron);
                }
            })
        }
        CronCommands::Add { name, cron, swarm, prompt, vars } => {
            let entry = ScheduleEntry { name, cron, swarm, prompt, vars: vars_map(&vars) };
            scheduler::schedule_file::add(project_root, entry)?;
            emit(json, &(), |()| println!("Added"))
        }
        CronCommands::Remove { name } => {
            let removed = scheduler::schedule_file::remove(project_root, &name)?;
            emit(json, &removed, |removed| println!("removed={removed}"))
        }
        CronCommands::Daemon => scheduler::run_daemon(project_root),
    }
}
