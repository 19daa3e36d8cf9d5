//! SSH transport backed by russh.

use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect};
use russh_keys::key;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::command::redact;
use crate::config::{SshAuth, SshConfig};
use crate::error::{RemoteError, Result};
use crate::output::{CommandOutput, OutputChunk, NO_EXIT_STATUS};
use crate::shell::{Connector, RemoteShell};

/// Extended data stream id for stderr (RFC 4254 §5.2).
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

struct ClientHandler {
    host: String,
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        // Host keys are not pinned; the panel talks to one operator-owned host.
        debug!(
            host = %self.host,
            fingerprint = %server_public_key.fingerprint(),
            "accepting server key"
        );
        Ok(true)
    }
}

/// Opens SSH sessions to the configured host.
#[derive(Debug, Clone)]
pub struct SshConnector {
    config: SshConfig,
}

impl SshConnector {
    /// Creates a connector for the given configuration.
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SshConfig {
        &self.config
    }

    async fn handshake(&self) -> Result<Handle<ClientHandler>> {
        let ssh_config = Arc::new(client::Config::default());
        let handler = ClientHandler {
            host: self.config.host.clone(),
        };

        let mut handle = client::connect(
            ssh_config,
            (self.config.host.as_str(), self.config.port),
            handler,
        )
        .await
        .map_err(|e| RemoteError::Connect {
            host: self.config.host.clone(),
            reason: e.to_string(),
        })?;

        let accepted = match &self.config.auth {
            SshAuth::Password(password) => {
                handle
                    .authenticate_password(self.config.username.clone(), password.clone())
                    .await?
            }
            SshAuth::Key { path, passphrase } => {
                let expanded = shellexpand::full(path)
                    .map(|p| p.into_owned())
                    .unwrap_or_else(|_| path.clone());
                let key_pair = russh_keys::load_secret_key(&expanded, passphrase.as_deref())
                    .map_err(|e| RemoteError::Key {
                        path: expanded.clone(),
                        reason: e.to_string(),
                    })?;
                handle
                    .authenticate_publickey(self.config.username.clone(), Arc::new(key_pair))
                    .await?
            }
        };

        if !accepted {
            return Err(RemoteError::Auth(self.config.username.clone()));
        }
        Ok(handle)
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(&self) -> Result<Box<dyn RemoteShell>> {
        let timeout = self.config.connect_timeout;
        debug!(remote = %self.config.target(), "opening ssh session");

        let handle = tokio::time::timeout(timeout, self.handshake())
            .await
            .map_err(|_| RemoteError::Timeout {
                host: self.config.host.clone(),
                secs: timeout.as_secs(),
            })??;

        Ok(Box::new(SshShell {
            handle,
            target: self.config.target(),
        }))
    }

    fn target(&self) -> String {
        self.config.target()
    }
}

/// One authenticated SSH session.
///
/// Dropping the shell drops the russh handle, which tears the connection down.
pub struct SshShell {
    handle: Handle<ClientHandler>,
    target: String,
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn exec(&self, command: &str) -> Result<CommandOutput> {
        trace!(remote = %self.target, command = %redact(command), "exec");
        let mut channel = self.handle.channel_open_session().await?;
        channel.exec(true, command).await?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = None;

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext } if ext == SSH_EXTENDED_DATA_STDERR => {
                    stderr.extend_from_slice(data)
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    exit_code = Some(i32::try_from(exit_status).unwrap_or(i32::MAX))
                }
                _ => {}
            }
        }

        let output = CommandOutput {
            exit_code: exit_code.unwrap_or(NO_EXIT_STATUS),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        };
        trace!(
            exit_code = output.exit_code,
            stdout_len = output.stdout.len(),
            stderr_len = output.stderr.len(),
            "exec completed"
        );
        Ok(output)
    }

    async fn exec_streaming(
        &self,
        command: &str,
        sink: mpsc::Sender<OutputChunk>,
    ) -> Result<Option<i32>> {
        debug!(remote = %self.target, command = %redact(command), "exec streaming");
        let mut channel = self.handle.channel_open_session().await?;
        channel.exec(true, command).await?;

        let mut exit_code = None;
        while let Some(msg) = channel.wait().await {
            let chunk = match msg {
                ChannelMsg::Data { ref data } => {
                    OutputChunk::Stdout(String::from_utf8_lossy(data).into_owned())
                }
                ChannelMsg::ExtendedData { ref data, ext } if ext == SSH_EXTENDED_DATA_STDERR => {
                    OutputChunk::Stderr(String::from_utf8_lossy(data).into_owned())
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    exit_code = Some(i32::try_from(exit_status).unwrap_or(i32::MAX));
                    continue;
                }
                _ => continue,
            };
            if sink.send(chunk).await.is_err() {
                debug!(remote = %self.target, "stream consumer went away");
                if let Err(e) = channel.close().await {
                    trace!(error = %e, "channel close after consumer left");
                }
                return Ok(None);
            }
        }
        Ok(exit_code)
    }

    async fn close(&self) {
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            warn!(remote = %self.target, error = %e, "ssh disconnect failed");
        }
    }
}
