//! Prompt template rendering and discovery (spec §4.1 path service + §6 `list`/`prompt` CLI
//! surface). Templates use `$VAR_NAME` substitution, generalizing the teacher's
//! `build_review_prompt`'s single `.replace("$BASE_BRANCH", base_branch)` call into an
//! arbitrary-`vars`-map renderer, since a schedule entry's `vars` (spec §3 "Schedule Entry")
//! can name any variable, not just a base branch.
//!
//! Swarm templates (GLOSSARY "Swarm") describe one or more agent spawns sharing or not sharing
//! a worktree; stored as YAML alongside prompt markdown files, resolved project-local-first then
//! globally, matching the two-tier `project_prompts_dir`/`global_prompts_dir` split in `paths`.

use crate::paths::{self, ProjectPaths};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Render `template`, substituting every `$NAME` occurrence with `vars["NAME"]`. Unknown `$NAME`
/// tokens are left as-is, since a template may legitimately contain a literal `$` unrelated to
/// variable substitution (e.g. shell snippets the agent is meant to run verbatim).
#[must_use]
pub fn render(template: &str, vars: &BTreeMap<String, String>) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("${key}"), value);
    }
    out
}

/// One entry in a swarm template: a single agent spawn, optionally overriding the swarm's
/// default agent type or sharing its siblings' worktree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmEntry {
    /// Name of this spawn within the swarm (used to suffix the worktree/agent name).
    pub name: String,
    /// Prompt template rendered for this entry (falls back to the swarm's `prompt` if absent).
    #[serde(default)]
    pub prompt: Option<String>,
    /// Configured agent type to launch this entry as (falls back to the default agent).
    #[serde(default)]
    pub agent_type: Option<String>,
}

/// A named, reusable template describing one or more agent spawns (spec GLOSSARY "Swarm").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Swarm {
    /// Swarm template name (the file's stem).
    #[serde(skip)]
    pub name: String,
    /// Default prompt used by entries that don't override it.
    #[serde(default)]
    pub prompt: Option<String>,
    /// Whether every entry spawns into the same worktree (`true`) or each gets its own
    /// (`false`, the default).
    #[serde(default)]
    pub shared_worktree: bool,
    /// The spawns this swarm describes.
    pub agents: Vec<SwarmEntry>,
}

fn candidate_dirs(project_root: &Path, project_dir: impl Fn(&ProjectPaths) -> PathBuf, global_dir: impl Fn() -> Option<PathBuf>) -> Vec<PathBuf> {
    let mut dirs = vec![project_dir(&ProjectPaths::new(project_root))];
    if let Some(global) = global_dir() {
        dirs.push(global);
    }
    dirs
}

/// Resolve a named prompt template, searching the project-local directory before the global
/// one. Returns the rendered template text.
///
/// # Errors
///
/// Returns an error (surfaced by the caller as `PROMPT_NOT_FOUND`) if no file named `<name>.md`
/// exists in either directory.
pub fn resolve_prompt(project_root: &Path, name: &str) -> Result<String> {
    for dir in candidate_dirs(project_root, ProjectPaths::project_prompts_dir, paths::global_prompts_dir) {
        let path = dir.join(format!("{name}.md"));
        if path.exists() {
            return fs::read_to_string(&path)
                .with_context(|| format!("Failed to read prompt template {}", path.display()));
        }
    }
    anyhow::bail!("No prompt template named '{name}' found")
}

/// List every named prompt template visible to `project_root` (project-local then global,
/// deduplicated by name with project-local taking precedence).
#[must_use]
pub fn list_prompts(project_root: &Path) -> Vec<String> {
    list_templates(project_root, ProjectPaths::project_prompts_dir, paths::global_prompts_dir, "md")
}

/// Resolve a named swarm template.
///
/// # Errors
///
/// Returns an error if no file named `<name>.yaml` exists in either directory, or if it cannot
/// be parsed.
pub fn resolve_swarm(project_root: &Path, name: &str) -> Result<Swarm> {
    for dir in candidate_dirs(project_root, ProjectPaths::project_swarms_dir, paths::global_swarms_dir) {
        let path = dir.join(format!("{name}.yaml"));
        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read swarm template {}", path.display()))?;
            let mut swarm: Swarm = serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse swarm template {}", path.display()))?;
            swarm.name = name.to_string();
            return Ok(swarm);
        }
    }
    anyhow::bail!("No swarm template named '{name}' found")
}

/// List every named swarm template visible to `project_root`.
#[must_use]
pub fn list_swarms(project_root: &Path) -> Vec<String> {
    list_templates(project_root, ProjectPaths::project_swarms_dir, paths::global_swarms_dir, "yaml")
}

fn list_templates(
    project_root: &Path,
    project_dir: impl Fn(&ProjectPaths) -> PathBuf,
    global_dir: impl Fn() -> Option<PathBuf>,
    extension: &str,
) -> Vec<String> {
    let mut names = std::collections::BTreeSet::new();
    for dir in candidate_dirs(project_root, project_dir, global_dir) {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(extension) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.insert(stem.to_string());
                }
            }
        }
    }
    names.into_iter().collect()
}

/// The canonical instructions appended to a rendered prompt when `resultInstructions` are
/// configured and not suppressed (spec §4.5 `spawnAgent`).
#[must_use]
pub fn append_result_instructions(prompt: &str, instructions: &str, result_file: &Path) -> String {
    format!(
        "{prompt}\n\n---\n\n{instructions}\n\nWrite your final output to: {}",
        result_file.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_render_substitutes_known_vars() {
        let mut vars = BTreeMap::new();
        vars.insert("BASE_BRANCH".to_string(), "main".to_string());
        let rendered = render("diff against $BASE_BRANCH", &vars);
        assert_eq!(rendered, "diff against main");
    }

    #[test]
    fn test_render_leaves_unknown_tokens_untouched() {
        let vars = BTreeMap::new();
        let rendered = render("cost is $5", &vars);
        assert_eq!(rendered, "cost is $5");
    }

    #[test]
    fn test_resolve_prompt_prefers_project_local() {
        let project = TempDir::new().expect("tempdir");
        let prompts_dir = ProjectPaths::new(project.path()).project_prompts_dir();
        fs::create_dir_all(&prompts_dir).expect("mkdir");
        fs::write(prompts_dir.join("plan.md"), "project plan template").expect("write");

        let resolved = resolve_prompt(project.path(), "plan").expect("found");
        assert_eq!(resolved, "project plan template");
    }

    #[test]
    fn test_resolve_prompt_missing_errors() {
        let project = TempDir::new().expect("tempdir");
        assert!(resolve_prompt(project.path(), "nonexistent").is_err());
    }

    #[test]
    fn test_list_prompts_deduplicates_by_stem() {
        let project = TempDir::new().expect("tempdir");
        let prompts_dir = ProjectPaths::new(project.path()).project_prompts_dir();
        fs::create_dir_all(&prompts_dir).expect("mkdir");
        fs::write(prompts_dir.join("a.md"), "a").expect("write");
        fs::write(prompts_dir.join("b.md"), "b").expect("write");

        let names = list_prompts(project.path());
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_resolve_swarm_parses_yaml() {
        let project = TempDir::new().expect("tempdir");
        let swarms_dir = ProjectPaths::new(project.path()).project_swarms_dir();
        fs::create_dir_all(&swarms_dir).expect("mkdir");
        fs::write(
            swarms_dir.join("review.yaml"),
            "prompt: review this\nshared_worktree: true\nagents:\n  - name: reviewer-a\n  - name: reviewer-b\n    agent_type: claude\n",
        )
        .expect("write");

        let swarm = resolve_swarm(project.path(), "review").expect("parsed");
        assert_eq!(swarm.name, "review");
        assert!(swarm.shared_worktree);
        assert_eq!(swarm.agents.len(), 2);
        assert_eq!(swarm.agents[1].agent_type.as_deref(), Some("claude"));
    }

    #[test]
    fn test_append_result_instructions_includes_path() {
        let result_file = Path::new("/repo/.ppg/results/ag-aaaaaaaa.md");
        let rendered = append_result_instructions("do X", "Write your findings.", result_file);
        assert!(rendered.contains("do X"));
        assert!(rendered.contains("Write your findings."));
        assert!(rendered.contains("/repo/.ppg/results/ag-aaaaaaaa.md"));
    }
}
