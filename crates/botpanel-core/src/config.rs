//! Panel configuration.

use std::time::Duration;

use crate::poll::PollPolicy;

/// Default directory under which new bots are cloned.
pub const DEFAULT_BASE_BOT_PATH: &str = "/root";

/// Default shell prefix that puts node, npm and pm2 on PATH.
pub const DEFAULT_NODE_ENV_PREFIX: &str = "source /root/.nvm/nvm.sh";

/// Default persisted WhatsApp Web session directory name.
pub const DEFAULT_SESSION_DIR: &str = ".wwebjs_auth";

/// Default generated notifier module name.
pub const DEFAULT_NOTIFIER_FILE: &str = "telegramNotifier.js";

/// Configuration for remote bot orchestration.
#[derive(Debug, Clone)]
pub struct PanelConfig {
    /// Directory under which `add` clones new bots.
    pub base_bot_path: String,
    /// Command sourced before node/npm/pm2 invocations, if any.
    pub node_env_prefix: Option<String>,
    /// Session directory name inside a bot's working directory.
    pub session_dir: String,
    /// Notifier shim file name, written next to the main script.
    pub notifier_file: String,
    /// Stop-confirmation poll for the session reset workflow.
    pub stop_poll: PollPolicy,
    /// Deletion-confirmation poll for the session reset workflow.
    pub delete_poll: PollPolicy,
    /// Default number of log lines returned by `logs`.
    pub log_lines: usize,
    /// Number of log lines replayed before following.
    pub follow_lines: usize,
    /// How often the status broadcaster polls the process table.
    pub status_interval: Duration,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            base_bot_path: DEFAULT_BASE_BOT_PATH.to_string(),
            node_env_prefix: Some(DEFAULT_NODE_ENV_PREFIX.to_string()),
            session_dir: DEFAULT_SESSION_DIR.to_string(),
            notifier_file: DEFAULT_NOTIFIER_FILE.to_string(),
            stop_poll: PollPolicy::new(Duration::from_secs(30), Duration::from_secs(2)),
            delete_poll: PollPolicy::new(Duration::from_secs(10), Duration::from_secs(1)),
            log_lines: 100,
            follow_lines: 20,
            status_interval: Duration::from_secs(5),
        }
    }
}

impl PanelConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base path for new bots.
    pub fn with_base_bot_path(mut self, path: impl Into<String>) -> Self {
        self.base_bot_path = path.into();
        self
    }

    /// Sets the node environment prefix; an empty string disables it.
    pub fn with_node_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.node_env_prefix = if prefix.trim().is_empty() {
            None
        } else {
            Some(prefix)
        };
        self
    }

    /// Sets the session directory name.
    pub fn with_session_dir(mut self, dir: impl Into<String>) -> Self {
        self.session_dir = dir.into();
        self
    }

    /// Sets both reset-workflow poll policies.
    pub fn with_reset_polls(mut self, stop: PollPolicy, delete: PollPolicy) -> Self {
        self.stop_poll = stop;
        self.delete_poll = delete;
        self
    }

    /// Sets the status broadcast interval.
    pub fn with_status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PanelConfig::default();
        assert_eq!(config.base_bot_path, "/root");
        assert_eq!(config.session_dir, ".wwebjs_auth");
        assert_eq!(config.stop_poll.timeout, Duration::from_secs(30));
        assert_eq!(config.stop_poll.interval, Duration::from_secs(2));
        assert_eq!(config.delete_poll.timeout, Duration::from_secs(10));
        assert_eq!(config.status_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_empty_prefix_disables_it() {
        let config = PanelConfig::new().with_node_env_prefix("  ");
        assert!(config.node_env_prefix.is_none());

        let config = PanelConfig::new().with_node_env_prefix("source ~/.profile");
        assert_eq!(config.node_env_prefix.as_deref(), Some("source ~/.profile"));
    }
}
