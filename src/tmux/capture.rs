//! Tmux output capture

use anyhow::{Context, Result, bail};
use std::process::Command;

/// Capture output from tmux sessions
#[derive(Debug, Clone, Copy, Default)]
pub struct Capture;

impl Capture {
    /// Create a new output capture instance
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Capture the visible pane content
    ///
    /// # Errors
    ///
    /// Returns an error if capture fails
    pub fn capture_pane(&self, session: &str) -> Result<String> {
        let output = super::tmux_command()
            .arg("capture-pane")
            .arg("-t")
            .arg(session)
            .arg("-p")
            .output()
            .context("Failed to execute tmux")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("Failed to capture pane for session '{session}': {stderr}");
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Capture pane with scroll-back history
    ///
    /// # Errors
    ///
    /// Returns an error if capture fails
    pub fn capture_pane_with_history(&self, session: &str, lines: u32) -> Result<String> {
        let start = format!("-{lines}");

        let output = super::tmux_command()
            .arg("capture-pane")
            .arg("-t")
            .arg(session)
            .arg("-p")
            .arg("-S")
            .arg(&start)
            .output()
            .context("Failed to execute tmux")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("Failed to capture pane with history for session '{session}': {stderr}");
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Capture entire scroll-back buffer
    ///
    /// # Errors
    ///
    /// Returns an error if capture fails
    pub fn capture_full_history(&self, session: &str) -> Result<String> {
        let output = super::tmux_command()
            .arg("capture-pane")
            .arg("-t")
            .arg(session)
            .arg("-p")
            .arg("-S")
            .arg("-")
            .output()
            .context("Failed to execute tmux")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("Failed to capture full history for session '{session}': {stderr}");
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Get the current pane size
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be retrieved
    pub fn pane_size(&self, session: &str) -> Result<(u16, u16)> {
        let output = super::tmux_command()
            .arg("display-message")
            .arg("-t")
            .arg(session)
            .arg("-p")
            .arg("#{pane_width}x#{pane_height}")
            .output()
            .context("Failed to execute tmux")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("Failed to get pane size for session '{session}': {stderr}");
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let parts: Vec<&str> = stdout.trim().split('x').collect();

        if parts.len() != 2 {
            bail!("Invalid pane size format: {stdout}");
        }

        let width: u16 = parts[0].parse().context("Invalid width")?;
        let height: u16 = parts[1].parse().context("Invalid height")?;

        Ok((width, height))
    }

    /// Get the cursor position in the pane
    ///
    /// # Errors
    ///
    /// Returns an error if the position cannot be retrieved
    pub fn cursor_position(&self, session: &str) -> Result<(u16, u16)> {
        let output = super::tmux_command()
            .arg("display-message")
            .arg("-t")
            .arg(session)
            .arg("-p")
            .arg("#{cursor_x},#{cursor_y}")
            .output()
            .context("Failed to execute tmux")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("Failed to get cursor position for session '{session}': {stderr}");
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let parts: Vec<&str> = stdout.trim().split(',').collect();

        if parts.len() != 2 {
            bail!("Invalid cursor position format: {stdout}");
        }

        let x: u16 = parts[0].parse().context("Invalid x position")?;
        let y: u16 = parts[1].parse().context("Invalid y position")?;

        Ok((x, y))
    }

    /// Check if the pane is running a program
    ///
    /// # Errors
    ///
    /// Returns an error if the status cannot be retrieved
    pub fn pane_current_command(&self, session: &str) -> Result<String> {
        let output = super::tmux_command()
            .arg("display-message")
            .arg("-t")
            .arg(session)
            .arg("-p")
            .arg("#{pane_current_command}")
            .output()
            .context("Failed to execute tmux")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("Failed to get current command for session '{session}': {stderr}");
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Get the last N lines from the pane
    ///
    /// # Errors
    ///
    /// Returns an error if capture fails
    pub fn tail(&self, session: &str, lines: usize) -> Result<Vec<String>> {
        let line_count = u32::try_from(lines).unwrap_or(u32::MAX);
        let content = self.capture_pane_with_history(session, line_count)?;

        let mut result: Vec<String> = content
            .lines()
            .map(String::from)
            .rev()
            .filter(|l| !l.trim().is_empty())
            .take(lines)
            .collect();

        result.reverse();
        Ok(result)
    }
}
