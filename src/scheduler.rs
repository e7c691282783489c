//! Cron-style Scheduler (spec §4.8, component C8).
//!
//! The daemon never shares parsing machinery with the CLI's `cron add`/`cron remove` editors:
//! both go through [`schedule_file::read`]/[`schedule_file::write`] under the schedule file's own
//! lock (`schedules.yaml.lock`), entirely independent of the manifest lock, and the daemon keeps
//! no in-memory schedule cache — every tick re-reads the file from disk so `cron add` takes effect
//! on the running daemon without a restart.

use crate::error::{KernelError, Result};
use crate::ops;
use crate::paths::ProjectPaths;
use chrono::{DateTime, Datelike, Local, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// A single entry of the schedule file (spec §3 "Schedule Entry").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Unique name within the schedule file, `[A-Za-z0-9_-]+`.
    pub name: String,
    /// Standard 5-field crontab expression.
    pub cron: String,
    /// Name of a swarm template to fire. Mutually exclusive with `prompt`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swarm: Option<String>,
    /// Inline prompt text to fire as a single spawned agent. Mutually exclusive with `swarm`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Template variable substitutions applied to the fired prompt(s).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, String>,
}

impl ScheduleEntry {
    /// Validate the entry's shape: a well-formed name, exactly one fire target, and a parseable
    /// cron expression.
    ///
    /// # Errors
    ///
    /// Returns `KernelError::InvalidArgs` if any of those checks fail.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty()
            || !self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(KernelError::InvalidArgs(format!(
                "schedule name '{}' must match [A-Za-z0-9_-]+",
                self.name
            )));
        }
        match (&self.swarm, &self.prompt) {
            (Some(_), None) | (None, Some(_)) => {}
            _ => {
                return Err(KernelError::InvalidArgs(format!(
                    "schedule '{}' must set exactly one of swarm/prompt",
                    self.name
                )));
            }
        }
        cron::CronSchedule::parse(&self.cron)?;
        Ok(())
    }
}

/// Crontab field parsing and minute-boundary matching.
mod cron {
    use super::{KernelError, Result};
    use chrono::{DateTime, Datelike, Local, Timelike};
    use std::collections::BTreeSet;

    #[derive(Debug, Clone)]
    struct Field {
        values: BTreeSet<u32>,
        wildcard: bool,
    }

    impl Field {
        fn parse(spec: &str, min: u32, max: u32) -> Result<Self> {
            let wildcard = spec == "*";
            let mut values = BTreeSet::new();
            for part in spec.split(',') {
                let (range_part, step) = match part.split_once('/') {
                    Some((range, step)) => {
                        let step: u32 = step.parse().map_err(|_| {
                            KernelError::InvalidArgs(format!("invalid cron step in '{part}'"))
                        })?;
                        (range, step.max(1))
                    }
                    None => (part, 1),
                };
                let (lo, hi) = if range_part == "*" {
                    (min, max)
                } else if let Some((a, b)) = range_part.split_once('-') {
                    let lo: u32 = a.parse().map_err(|_| {
                        KernelError::InvalidArgs(format!("invalid cron range in '{part}'"))
                    })?;
                    let hi: u32 = b.parse().map_err(|_| {
                        KernelError::InvalidArgs(format!("invalid cron range in '{part}'"))
                    })?;
                    (lo, hi)
                } else {
                    let v: u32 = range_part.parse().map_err(|_| {
                        KernelError::InvalidArgs(format!("invalid cron field value '{part}'"))
                    })?;
                    (v, v)
                };
                if lo > hi || lo < min || hi > max {
                    return Err(KernelError::InvalidArgs(format!(
                        "cron field '{part}' out of range {min}-{max}"
                    )));
                }
                let mut v = lo;
                while v <= hi {
                    values.insert(v);
                    v += step;
                }
            }
            Ok(Self { values, wildcard })
        }

        fn matches(&self, value: u32) -> bool {
            self.values.contains(&value)
        }
    }

    /// A parsed standard 5-field crontab expression (minute hour day-of-month month
    /// day-of-week), matched against the local timezone.
    #[derive(Debug, Clone)]
    pub struct CronSchedule {
        minute: Field,
        hour: Field,
        day_of_month: Field,
        month: Field,
        day_of_week: Field,
    }

    impl CronSchedule {
        /// Parse a standard 5-field crontab expression.
        ///
        /// # Errors
        ///
        /// Returns `KernelError::InvalidArgs` if the expression does not have exactly 5
        /// whitespace-separated fields, or any field is malformed or out of range.
        pub fn parse(expr: &str) -> Result<Self> {
            let fields: Vec<&str> = expr.split_whitespace().collect();
            let [minute, hour, dom, month, dow] = fields.as_slice() else {
                return Err(KernelError::InvalidArgs(format!(
                    "cron expression '{expr}' must have exactly 5 fields"
                )));
            };
            Ok(Self {
                minute: Field::parse(minute, 0, 59)?,
                hour: Field::parse(hour, 0, 23)?,
                day_of_month: Field::parse(dom, 1, 31)?,
                month: Field::parse(month, 1, 12)?,
                day_of_week: Field::parse(dow, 0, 6)?,
            })
        }

        /// Whether this schedule fires at the given local-time minute boundary. Day-of-month and
        /// day-of-week combine with standard crontab OR-semantics when both are restricted
        /// (non-`*`), and AND-semantics otherwise.
        #[must_use]
        pub fn matches_minute(&self, at: &DateTime<Local>) -> bool {
            if !self.minute.matches(at.minute()) || !self.hour.matches(at.hour()) || !self.month.matches(at.month()) {
                return false;
            }
            let dom_match = self.day_of_month.matches(at.day());
            let dow_match = self.day_of_week.matches(at.weekday().num_days_from_sunday());
            if self.day_of_month.wildcard || self.day_of_week.wildcard {
                dom_match && dow_match
            } else {
                dom_match || dow_match
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use chrono::TimeZone;
        use rstest::rstest;

        #[rstest]
        #[case("*/15 * * * *", 2024, 1, 1, 0, 15, true)]
        #[case("*/15 * * * *", 2024, 1, 1, 0, 20, false)]
        #[case("0 9 * * 1-5", 2024, 1, 1, 9, 0, true)] // Monday
        #[case("0 9 * * 1-5", 2024, 1, 7, 9, 0, false)] // Sunday
        #[case("30 2 1 * *", 2024, 3, 1, 2, 30, true)]
        fn test_matches_minute(
            #[case] expr: &str,
            #[case] year: i32,
            #[case] month: u32,
            #[case] day: u32,
            #[case] hour: u32,
            #[case] minute: u32,
            #[case] expected: bool,
        ) {
            let schedule = CronSchedule::parse(expr).expect("parses");
            let at = Local.with_ymd_and_hms(year, month, day, hour, minute, 0).single().expect("valid time");
            assert_eq!(schedule.matches_minute(&at), expected);
        }

        #[test]
        fn test_rejects_wrong_field_count() {
            assert!(CronSchedule::parse("* * *").is_err());
        }

        #[test]
        fn test_rejects_out_of_range_value() {
            assert!(CronSchedule::parse("60 * * * *").is_err());
        }

        #[test]
        fn test_dom_dow_combine_with_or_when_both_restricted() {
            // Fires on the 1st of the month OR on any Friday.
            let schedule = CronSchedule::parse("0 0 1 * 5").expect("parses");
            let first = Local.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).single().expect("valid");
            assert!(schedule.matches_minute(&first));
            let friday = Local.with_ymd_and_hms(2024, 2, 2, 0, 0, 0).single().expect("valid");
            assert!(schedule.matches_minute(&friday));
            let other = Local.with_ymd_and_hms(2024, 2, 6, 0, 0, 0).single().expect("valid");
            assert!(!schedule.matches_minute(&other));
        }
    }
}

pub use cron::CronSchedule;

/// Schedule file read/write, independent of the manifest lock (spec §9 design note).
pub mod schedule_file {
    use super::ScheduleEntry;
    use crate::error::{KernelError, Result};
    use crate::paths::ProjectPaths;
    use fs4::FileExt;
    use std::fs::{self, File, OpenOptions};
    use std::path::Path;
    use std::time::{Duration, Instant};

    const LOCK_BUDGET: Duration = Duration::from_secs(5);
    const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);

    #[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
    struct OnDisk {
        #[serde(default)]
        schedules: Vec<ScheduleEntry>,
    }

    fn acquire_lock(file: &File) -> Result<()> {
        let deadline = Instant::now() + LOCK_BUDGET;
        loop {
            match file.try_lock_exclusive() {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) => return Err(anyhow::anyhow!("Failed to lock schedule file: {e}").into()),
            }
            if Instant::now() >= deadline {
                return Err(KernelError::ManifestLock(
                    "could not acquire schedule file lock within the retry budget".to_string(),
                ));
            }
            std::thread::sleep(LOCK_RETRY_INTERVAL);
        }
    }

    /// Read every schedule entry, or an empty list if no schedule file exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn read(project_root: &Path) -> Result<Vec<ScheduleEntry>> {
        let path = ProjectPaths::new(project_root).schedule_file();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
        let parsed: OnDisk = serde_yaml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {e}", path.display()))?;
        Ok(parsed.schedules)
    }

    fn write_unlocked(path: &Path, entries: &[ScheduleEntry]) -> Result<()> {
        let on_disk = OnDisk { schedules: entries.to_vec() };
        let contents = serde_yaml::to_string(&on_disk)
            .map_err(|e| anyhow::anyhow!("Failed to serialize schedule file: {e}"))?;
        fs::write(path, contents)
            .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", path.display()))?;
        Ok(())
    }

    /// Overwrite the schedule file with `entries`, under the schedule file's own lock.
    ///
    /// # Errors
    ///
    /// Returns `KernelError::ManifestLock` if the lock cannot be acquired in time, or an error if
    /// the file cannot be written.
    pub fn write(project_root: &Path, entries: &[ScheduleEntry]) -> Result<()> {
        let paths = ProjectPaths::new(project_root);
        fs::create_dir_all(paths.state_dir())
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", paths.state_dir().display()))?;
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(paths.schedule_lock_file())
            .map_err(|e| anyhow::anyhow!("Failed to open schedule lock file: {e}"))?;
        acquire_lock(&lock_file)?;
        let result = write_unlocked(&paths.schedule_file(), entries);
        let _ = lock_file.unlock();
        result
    }

    /// Append `entry` under lock, rejecting a duplicate name.
    ///
    /// # Errors
    ///
    /// Returns `KernelError::InvalidArgs` if the name is already taken, or propagates a
    /// read/write failure.
    pub fn add(project_root: &Path, entry: ScheduleEntry) -> Result<()> {
        entry.validate()?;
        let paths = ProjectPaths::new(project_root);
        fs::create_dir_all(paths.state_dir())
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", paths.state_dir().display()))?;
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(paths.schedule_lock_file())
            .map_err(|e| anyhow::anyhow!("Failed to open schedule lock file: {e}"))?;
        acquire_lock(&lock_file)?;
        let result = (|| {
            let mut entries = read(project_root)?;
            if entries.iter().any(|e| e.name == entry.name) {
                return Err(KernelError::InvalidArgs(format!(
                    "a schedule named '{}' already exists",
                    entry.name
                )));
            }
            entries.push(entry);
            write_unlocked(&paths.schedule_file(), &entries)
        })();
        let _ = lock_file.unlock();
        result
    }

    /// Remove the entry named `name` under lock. Returns whether an entry was actually removed.
    ///
    /// # Errors
    ///
    /// Propagates a read/write failure.
    pub fn remove(project_root: &Path, name: &str) -> Result<bool> {
        let paths = ProjectPaths::new(project_root);
        fs::create_dir_all(paths.state_dir())
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", paths.state_dir().display()))?;
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(paths.schedule_lock_file())
            .map_err(|e| anyhow::anyhow!("Failed to open schedule lock file: {e}"))?;
        acquire_lock(&lock_file)?;
        let result = (|| {
            let mut entries = read(project_root)?;
            let before = entries.len();
            entries.retain(|e| e.name != name);
            let removed = entries.len() != before;
            write_unlocked(&paths.schedule_file(), &entries)?;
            Ok(removed)
        })();
        let _ = lock_file.unlock();
        result
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use tempfile::TempDir;

        fn entry(name: &str) -> ScheduleEntry {
            ScheduleEntry {
                name: name.to_string(),
                cron: "*/5 * * * *".to_string(),
                swarm: None,
                prompt: Some("ping".to_string()),
                vars: std::collections::BTreeMap::new(),
            }
        }

        #[test]
        fn test_read_missing_file_returns_empty() {
            let dir = TempDir::new().expect("tempdir");
            assert!(read(dir.path()).expect("read").is_empty());
        }

        #[test]
        fn test_add_then_read_round_trips() {
            let dir = TempDir::new().expect("tempdir");
            add(dir.path(), entry("nightly")).expect("add");
            let entries = read(dir.path()).expect("read");
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].name, "nightly");
        }

        #[test]
        fn test_add_duplicate_name_rejected() {
            let dir = TempDir::new().expect("tempdir");
            add(dir.path(), entry("nightly")).expect("add");
            let err = add(dir.path(), entry("nightly")).expect_err("duplicate rejected");
            assert_eq!(err.code(), "INVALID_ARGS");
        }

        #[test]
        fn test_remove_returns_whether_anything_removed() {
            let dir = TempDir::new().expect("tempdir");
            add(dir.path(), entry("nightly")).expect("add");
            assert!(remove(dir.path(), "nightly").expect("remove"));
            assert!(!remove(dir.path(), "nightly").expect("remove again"));
        }
    }
}

const TICK: Duration = Duration::from_secs(1);

fn is_pid_alive(pid: u32) -> bool {
    #[cfg(target_os = "linux")]
    {
        Path::new(&format!("/proc/{pid}")).exists()
    }
    #[cfg(not(target_os = "linux"))]
    {
        std::process::Command::new("ps")
            .args(["-p", &pid.to_string()])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

fn read_pid_file(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn write_pid_file(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", parent.display()))?;
    }
    std::fs::write(path, format!("{}\n", std::process::id()))
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", path.display()))?;
    Ok(())
}

/// `cron start` (spec §4.8) — start the scheduler daemon in the foreground, blocking forever (the
/// CLI is expected to have already detached this process). Returns only on a fatal error; a
/// already-running daemon is reported as `KernelError::InvalidArgs`.
///
/// # Errors
///
/// Returns `KernelError::InvalidArgs` if a live daemon's PID file is already present, or
/// propagates an I/O failure writing the PID/log files.
pub fn run_daemon(project_root: &Path) -> Result<()> {
    let paths = ProjectPaths::new(project_root);
    let pid_path = paths.cron_pid_file();

    if let Some(existing) = read_pid_file(&pid_path) {
        if is_pid_alive(existing) {
            return Err(KernelError::InvalidArgs(format!(
                "scheduler already running (pid {existing})"
            )));
        }
        warn!(pid = existing, "Stale cron.pid found; overwriting");
    }
    write_pid_file(&pid_path)?;

    std::fs::create_dir_all(paths.logs_dir())
        .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", paths.logs_dir().display()))?;

    let mut last_fired: BTreeMap<String, DateTime<Local>> = BTreeMap::new();
    info!("Scheduler daemon started");

    let result = daemon_loop(project_root, &mut last_fired);

    let _ = std::fs::remove_file(&pid_path);
    info!("Scheduler daemon stopped");
    result
}

fn daemon_loop(project_root: &Path, last_fired: &mut BTreeMap<String, DateTime<Local>>) -> Result<()> {
    loop {
        let now = Local::now();
        match schedule_file::read(project_root) {
            Ok(entries) => {
                for entry in &entries {
                    if already_fired_this_minute(last_fired, &entry.name, &now) {
                        continue;
                    }
                    let Ok(schedule) = cron::CronSchedule::parse(&entry.cron) else {
                        warn!(schedule = entry.name, cron = entry.cron, "Invalid cron expression, skipping");
                        continue;
                    };
                    if schedule.matches_minute(&now) {
                        last_fired.insert(entry.name.clone(), now);
                        fire(project_root, entry, &now);
                    }
                }
            }
            Err(e) => warn!(error = %e, "Failed to read schedule file"),
        }
        std::thread::sleep(TICK);
    }
}

fn already_fired_this_minute(last_fired: &BTreeMap<String, DateTime<Local>>, name: &str, now: &DateTime<Local>) -> bool {
    last_fired
        .get(name)
        .is_some_and(|at| at.year() == now.year() && at.ordinal() == now.ordinal() && at.hour() == now.hour() && at.minute() == now.minute())
}

fn fire(project_root: &Path, entry: &ScheduleEntry, at: &DateTime<Local>) {
    let outcome = if let Some(swarm) = &entry.swarm {
        ops::perform_swarm(
            project_root,
            ops::SwarmOptions {
                swarm: swarm.clone(),
                name: Some(entry.name.clone()),
                vars: entry.vars.clone(),
            },
        )
        .map(|r| format!("spawned swarm '{}' into {} worktree(s)", swarm, r.worktrees.len()))
    } else if let Some(prompt) = &entry.prompt {
        let rendered = crate::prompts::render(prompt, &entry.vars);
        ops::perform_spawn(
            project_root,
            ops::SpawnOptions { name: Some(entry.name.clone()), prompt: Some(rendered), ..ops::SpawnOptions::default() },
        )
        .map(|r| format!("spawned agent into worktree {}", r.worktree_id))
    } else {
        Err(KernelError::InvalidArgs(format!("schedule '{}' has no fire target", entry.name)))
    };

    log_fire(project_root, entry, at, &outcome);
}

fn log_fire(project_root: &Path, entry: &ScheduleEntry, at: &DateTime<Local>, outcome: &Result<String>) {
    let paths = ProjectPaths::new(project_root);
    let line = match outcome {
        Ok(message) => format!("{} schedule={} ok {message}\n", at.to_rfc3339(), entry.name),
        Err(e) => format!("{} schedule={} error {e}\n", at.to_rfc3339(), entry.name),
    };
    match outcome {
        Ok(message) => info!(schedule = entry.name, message, "Schedule fired"),
        Err(e) => warn!(schedule = entry.name, error = %e, "Schedule fire failed"),
    }
    use std::io::Write;
    if let Ok(mut file) = OpenOptionsAppend::open(&paths.cron_log_file()) {
        let _ = file.write_all(line.as_bytes());
    }
}

struct OpenOptionsAppend;
impl OpenOptionsAppend {
    fn open(path: &Path) -> std::io::Result<std::fs::File> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::OpenOptions::new().create(true).append(true).open(path)
    }
}

/// `cron stop` (spec §4.8) — signal a running daemon to stop. Since the daemon treats OS
/// termination as an ordinary exit (spec §5: line-buffered append-only logs need no signal
/// handler for durability), this sends `SIGTERM` on Unix platforms and reports unsupported
/// elsewhere.
///
/// # Errors
///
/// Returns `KernelError::InvalidArgs` if no daemon is currently running.
pub fn stop_daemon(project_root: &Path) -> Result<u32> {
    let pid_path = ProjectPaths::new(project_root).cron_pid_file();
    let Some(pid) = read_pid_file(&pid_path) else {
        return Err(KernelError::InvalidArgs("no scheduler is running".to_string()));
    };
    if !is_pid_alive(pid) {
        let _ = std::fs::remove_file(&pid_path);
        return Err(KernelError::InvalidArgs("no scheduler is running".to_string()));
    }
    terminate(pid)?;
    Ok(pid)
}

#[cfg(unix)]
fn terminate(pid: u32) -> Result<()> {
    let status = std::process::Command::new("kill")
        .arg(pid.to_string())
        .status()
        .map_err(|e| anyhow::anyhow!("Failed to signal pid {pid}: {e}"))?;
    if status.success() {
        Ok(())
    } else {
        Err(anyhow::anyhow!("kill {pid} exited with {status}").into())
    }
}

#[cfg(not(unix))]
fn terminate(pid: u32) -> Result<()> {
    let status = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .status()
        .map_err(|e| anyhow::anyhow!("Failed to terminate pid {pid}: {e}"))?;
    if status.success() {
        Ok(())
    } else {
        Err(anyhow::anyhow!("taskkill {pid} exited with {status}").into())
    }
}

/// `cron status` (spec §4.8) — whether a daemon is currently running and, if so, its PID.
#[must_use]
pub fn daemon_status(project_root: &Path) -> Option<u32> {
    let pid_path = ProjectPaths::new(project_root).cron_pid_file();
    read_pid_file(&pid_path).filter(|&pid| is_pid_alive(pid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_schedule_entry_rejects_both_targets() {
        let entry = ScheduleEntry {
            name: "x".to_string(),
            cron: "* * * * *".to_string(),
            swarm: Some("a".to_string()),
            prompt: Some("b".to_string()),
            vars: BTreeMap::new(),
        };
        assert!(entry.validate().is_err());
    }

    #[test]
    fn test_schedule_entry_rejects_neither_target() {
        let entry = ScheduleEntry {
            name: "x".to_string(),
            cron: "* * * * *".to_string(),
            swarm: None,
            prompt: None,
            vars: BTreeMap::new(),
        };
        assert!(entry.validate().is_err());
    }

    #[test]
    fn test_schedule_entry_rejects_bad_name() {
        let entry = ScheduleEntry {
            name: "bad name!".to_string(),
            cron: "* * * * *".to_string(),
            swarm: None,
            prompt: Some("b".to_string()),
            vars: BTreeMap::new(),
        };
        assert!(entry.validate().is_err());
    }

    #[test]
    fn test_schedule_entry_accepts_valid_prompt_entry() {
        let entry = ScheduleEntry {
            name: "nightly-1".to_string(),
            cron: "0 2 * * *".to_string(),
            swarm: None,
            prompt: Some("ping".to_string()),
            vars: BTreeMap::new(),
        };
        assert!(entry.validate().is_ok());
    }

    #[test]
    fn test_daemon_status_none_when_no_pid_file() {
        let dir = TempDir::new().expect("tempdir");
        assert!(daemon_status(dir.path()).is_none());
    }

    #[test]
    fn test_daemon_status_ignores_stale_pid() {
        let dir = TempDir::new().expect("tempdir");
        let paths = ProjectPaths::new(dir.path());
        write_pid_file(&paths.cron_pid_file()).expect("write pid");
        std::fs::write(paths.cron_pid_file(), "999999999\n").expect("overwrite with bogus pid");
        assert!(daemon_status(dir.path()).is_none());
    }
}
