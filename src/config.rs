//! Project configuration (spec §3 "Configuration", read-only from the kernel's perspective).
//!
//! Unlike the teacher's user-global `~/.config/tenex/config.json`, this configuration is
//! per-project: `sessionName` and the configured `agents` map are properties of a single
//! repository's orchestration setup, not of the user's machine, so the file lives at
//! `<projectRoot>/.ppg/config.json` (see `paths::ProjectPaths::config_file`). Same
//! serde-derive-with-defaults style as the teacher's `config/mod.rs`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Configuration for a single configured agent program (spec §3 `agents` map entry).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentConfig {
    /// Shell command used to launch the agent (parsed with `shell_words`).
    pub command: String,
    /// CLI flag the agent uses to receive an inline prompt string, if any (e.g. `--prompt`).
    #[serde(default)]
    pub prompt_flag: Option<String>,
    /// CLI flag the agent uses to receive a prompt file path, if any (e.g. `--prompt-file`).
    #[serde(default)]
    pub prompt_file_flag: Option<String>,
    /// Whether the agent is an interactive program driven via the pane (`true`, the common
    /// case) rather than a one-shot command that exits on its own.
    #[serde(default = "default_true")]
    pub interactive: bool,
    /// Extra instructions appended to the rendered prompt asking the agent to write its result
    /// to the canonical result file, unless suppressed by the caller.
    #[serde(default)]
    pub result_instructions: Option<String>,
}

const fn default_true() -> bool {
    true
}

fn default_session_name() -> String {
    "ppg".to_string()
}

fn default_agent() -> String {
    "claude".to_string()
}

fn default_agents() -> BTreeMap<String, AgentConfig> {
    let mut map = BTreeMap::new();
    map.insert(
        "claude".to_string(),
        AgentConfig {
            command: "claude".to_string(),
            prompt_flag: None,
            prompt_file_flag: None,
            interactive: true,
            result_instructions: Some(
                "When you are done, write your final output to the path given above."
                    .to_string(),
            ),
        },
    );
    map
}

/// Project-level configuration, loaded once per operation from `<projectRoot>/.ppg/config.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Sanitized multiplexer session name this project's agents run under.
    #[serde(default = "default_session_name")]
    pub session_name: String,
    /// Name of the agent used when a spawn doesn't specify one explicitly.
    #[serde(default = "default_agent")]
    pub default_agent: String,
    /// Configured agent programs, keyed by name.
    #[serde(default = "default_agents")]
    pub agents: BTreeMap<String, AgentConfig>,
    /// Dotfiles copied from the project root into each new worktree.
    #[serde(default)]
    pub env_files: Vec<String>,
    /// Whether to symlink `node_modules` (or an analogous dependency cache) into new worktrees.
    #[serde(default)]
    pub symlink_node_modules: bool,
    /// Seconds of unchanged pane output before an agent is classified `idle` rather than
    /// `running` (spec §9: "expose its quiescence threshold as a configuration knob").
    #[serde(default = "default_quiescence_secs")]
    pub quiescence_secs: u64,
}

const fn default_quiescence_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_name: default_session_name(),
            default_agent: default_agent(),
            agents: default_agents(),
            env_files: Vec::new(),
            symlink_node_modules: false,
            quiescence_secs: default_quiescence_secs(),
        }
    }
}

impl Config {
    /// Load configuration from `<projectRoot>/.ppg/config.json`, or the default if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = crate::paths::ProjectPaths::new(project_root).config_file();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to `<projectRoot>/.ppg/config.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file cannot be written.
    pub fn save(&self, project_root: &Path) -> Result<()> {
        let path = crate::paths::ProjectPaths::new(project_root).config_file();
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory {}", parent.display())
            })?;
        }
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    /// Look up a configured agent by name, falling back to `default_agent`.
    #[must_use]
    pub fn agent(&self, name: Option<&str>) -> Option<(&str, &AgentConfig)> {
        let name = name.unwrap_or(&self.default_agent);
        self.agents.get(name).map(|cfg| (name, cfg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.session_name, "ppg");
        assert_eq!(config.default_agent, "claude");
        assert!(config.agents.contains_key("claude"));
        assert_eq!(config.quiescence_secs, 30);
    }

    #[test]
    fn test_save_and_load_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.json");

        let mut config = Config::default();
        config.session_name = "ppg-demo".to_string();
        config.save_to(&path)?;

        let loaded = Config::load_from(&path)?;
        assert_eq!(loaded.session_name, "ppg-demo");
        Ok(())
    }

    #[test]
    fn test_load_missing_file_returns_default() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let loaded = Config::load(temp_dir.path())?;
        assert_eq!(loaded, Config::default());
        Ok(())
    }

    #[test]
    fn test_agent_lookup_falls_back_to_default() {
        let config = Config::default();
        let (name, _) = config.agent(None).expect("default agent configured");
        assert_eq!(name, "claude");
        assert!(config.agent(Some("nonexistent")).is_none());
    }
}
