//! Command-line interface definition using clap.

use std::time::Duration;

use botpanel_api::ApiConfig;
use botpanel_core::config::{DEFAULT_BASE_BOT_PATH, DEFAULT_NODE_ENV_PREFIX};
use botpanel_core::PanelConfig;
use botpanel_remote::{SshAuth, SshConfig};
use clap::Parser;

/// Bot Panel - manage pm2 Node bots on a remote host over SSH
#[derive(Parser, Debug)]
#[command(name = "botpanel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// HTTP port
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Address to bind the HTTP server to
    #[arg(long, env = "BIND_HOST", default_value = "127.0.0.1")]
    pub bind_host: String,

    /// Allowed CORS origins, comma separated
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    pub cors_origins: Vec<String>,

    /// Remote host running the bots
    #[arg(long, env = "SSH_HOST")]
    pub ssh_host: String,

    /// Remote SSH port
    #[arg(long, env = "SSH_PORT", default_value_t = 22)]
    pub ssh_port: u16,

    /// Remote login user
    #[arg(long, env = "SSH_USER", default_value = "root")]
    pub ssh_user: String,

    /// Password for the remote user
    #[arg(long, env = "SSH_PASSWORD", hide_env_values = true)]
    pub ssh_password: Option<String>,

    /// Private key file; takes precedence over the password
    #[arg(long, env = "SSH_KEY_PATH")]
    pub ssh_key_path: Option<String>,

    /// Passphrase of an encrypted private key
    #[arg(long, env = "SSH_KEY_PASSPHRASE", hide_env_values = true)]
    pub ssh_key_passphrase: Option<String>,

    /// Directory under which new bots are cloned
    #[arg(long, env = "BASE_BOT_PATH", default_value = DEFAULT_BASE_BOT_PATH)]
    pub base_bot_path: String,

    /// Shell snippet that puts node, npm and pm2 on PATH; empty disables it
    #[arg(long, env = "NODE_ENV_PREFIX", default_value = DEFAULT_NODE_ENV_PREFIX)]
    pub node_env_prefix: String,

    /// Seconds between status broadcasts
    #[arg(long, env = "STATUS_INTERVAL_SECS", default_value_t = 5)]
    pub status_interval_secs: u64,
}

impl Cli {
    /// Log filter derived from the verbosity flag.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "botpanel=info",
            1 => "botpanel=debug",
            _ => "botpanel=trace",
        }
    }

    /// SSH transport settings. A key path wins over a password.
    pub fn ssh_config(&self) -> Result<SshConfig, String> {
        let auth = match (&self.ssh_key_path, &self.ssh_password) {
            (Some(path), _) if !path.trim().is_empty() => SshAuth::Key {
                path: path.clone(),
                passphrase: self.ssh_key_passphrase.clone(),
            },
            (_, Some(password)) if !password.is_empty() => SshAuth::Password(password.clone()),
            _ => return Err("set SSH_KEY_PATH or SSH_PASSWORD".to_string()),
        };
        Ok(SshConfig::new(&self.ssh_host, &self.ssh_user, auth).with_port(self.ssh_port))
    }

    /// Orchestration settings.
    pub fn panel_config(&self) -> PanelConfig {
        PanelConfig::new()
            .with_base_bot_path(&self.base_bot_path)
            .with_node_env_prefix(&self.node_env_prefix)
            .with_status_interval(Duration::from_secs(self.status_interval_secs.max(1)))
    }

    /// HTTP server settings.
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig::new(&self.bind_host, self.port).with_cors_origins(self.cors_origins.clone())
    }
}
