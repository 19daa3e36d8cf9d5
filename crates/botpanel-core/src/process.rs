//! Process-manager table model.
//!
//! The table is never cached: every caller re-reads `pm2 jlist` so that the
//! remote process manager stays the single source of truth.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PanelError, Result};

/// Status of a managed bot process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BotStatus {
    /// Process is up.
    Running,
    /// Process is launching.
    Starting,
    /// Stop requested but not finished.
    Stopping,
    /// Process is stopped.
    Stopped,
    /// Process crashed or failed to start.
    Errored,
    /// Status not recognised.
    #[default]
    Unknown,
}

impl BotStatus {
    /// Maps a pm2 status string.
    pub fn from_pm2(status: &str) -> Self {
        match status {
            "online" => BotStatus::Running,
            "launching" | "waiting restart" => BotStatus::Starting,
            "stopping" => BotStatus::Stopping,
            "stopped" => BotStatus::Stopped,
            "errored" => BotStatus::Errored,
            _ => BotStatus::Unknown,
        }
    }

    /// Returns true if no process is running for this entry.
    pub fn is_terminal(self) -> bool {
        matches!(self, BotStatus::Stopped | BotStatus::Errored)
    }
}

/// One entry of the process-manager table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotProcess {
    /// Unique process name.
    pub name: String,
    /// pm2 numeric id.
    pub pm_id: Option<u64>,
    /// OS process id, when running.
    pub pid: Option<u64>,
    /// Current status.
    pub status: BotStatus,
    /// Working directory pinned at start.
    pub working_directory: Option<String>,
    /// Script path pm2 executes.
    pub exec_path: Option<String>,
    /// Resident memory in bytes.
    pub memory_bytes: Option<u64>,
    /// CPU usage percentage.
    pub cpu_percent: Option<f64>,
    /// Restart counter.
    pub restarts: Option<u64>,
    /// When the current run started.
    pub started_at: Option<DateTime<Utc>>,
}

impl BotProcess {
    /// Builds an entry from one `pm2 jlist` record. Returns `None` for
    /// records without a name.
    pub fn from_pm2_record(record: &Value) -> Option<Self> {
        let name = record.get("name")?.as_str()?.to_string();
        let env = record.get("pm2_env");
        let env_str = |key: &str| {
            env.and_then(|e| e.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let env_u64 = |key: &str| env.and_then(|e| e.get(key)).and_then(Value::as_u64);
        let monit = record.get("monit");

        let status = env_str("status")
            .map(|s| BotStatus::from_pm2(&s))
            .unwrap_or_default();
        let started_at = env
            .and_then(|e| e.get("pm_uptime"))
            .and_then(Value::as_i64)
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

        Some(Self {
            name,
            pm_id: record.get("pm_id").and_then(Value::as_u64),
            pid: record.get("pid").and_then(Value::as_u64).filter(|p| *p != 0),
            status,
            working_directory: env_str("pm_cwd"),
            exec_path: env_str("pm_exec_path"),
            memory_bytes: monit.and_then(|m| m.get("memory")).and_then(Value::as_u64),
            cpu_percent: monit.and_then(|m| m.get("cpu")).and_then(Value::as_f64),
            restarts: env_u64("restart_time"),
            started_at,
        })
    }
}

/// Parses `pm2 jlist` output.
///
/// pm2 sometimes prints warnings or its `[PM2] ...` daemon banner before the
/// JSON array. Parsing starts at the first line opening with `[` that holds a
/// valid array.
pub fn parse_process_list(raw: &str) -> Result<Vec<BotProcess>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let mut last_error = None;
    let mut offset = 0;
    for line in trimmed.split_inclusive('\n') {
        if line.trim_start().starts_with('[') {
            match serde_json::from_str::<Vec<Value>>(&trimmed[offset..]) {
                Ok(records) => {
                    return Ok(records.iter().filter_map(BotProcess::from_pm2_record).collect())
                }
                Err(e) => last_error = Some(e),
            }
        }
        offset += line.len();
    }
    Err(PanelError::CommandFailed {
        exit_code: 0,
        message: match last_error {
            Some(e) => format!("unparseable process list: {e}"),
            None => "process manager returned no process list".to_string(),
        },
    })
}

/// Process-control action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessAction {
    /// `pm2 start <name>`
    Start,
    /// `pm2 stop <name>`
    Stop,
    /// `pm2 restart <name>`
    Restart,
}

impl ProcessAction {
    /// pm2 subcommand.
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessAction::Start => "start",
            ProcessAction::Stop => "stop",
            ProcessAction::Restart => "restart",
        }
    }
}

impl fmt::Display for ProcessAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessAction {
    type Err = PanelError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "start" => Ok(ProcessAction::Start),
            "stop" => Ok(ProcessAction::Stop),
            "restart" => Ok(ProcessAction::Restart),
            other => Err(PanelError::InvalidInput(format!("unknown action '{other}'"))),
        }
    }
}

/// Rejects names that are unsafe as a process name or directory component.
pub fn validate_bot_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(PanelError::InvalidInput("bot name is required".to_string()));
    }
    if name.starts_with('.')
        || name.contains('/')
        || name.chars().any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(PanelError::InvalidInput(format!(
            "bot name '{name}' must not start with '.' or contain '/', whitespace or control characters"
        )));
    }
    Ok(())
}
