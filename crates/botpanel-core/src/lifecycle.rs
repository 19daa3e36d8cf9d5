//! Bot lifecycle operations.
//!
//! Every operation opens its own remote session and closes it before
//! returning, on success and on failure alike. Nothing is shared between
//! concurrent operations, and nothing prevents two of them from touching the
//! same bot at once.

use std::sync::Arc;

use botpanel_remote::command::{
    copy_file, file_exists, has_entries, join_path, read_file, remove_dir_all, write_file,
};
use botpanel_remote::{Connector, OutputChunk, RemoteShell};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::PanelConfig;
use crate::error::{PanelError, Result};
use crate::locator::{self, BotLocation, ENV_FILE, MANIFEST_FILE};
use crate::process::{validate_bot_name, BotProcess, ProcessAction};
use crate::toolchain::{parse_default_branch, Toolchain};
use crate::transcript::Transcript;

/// Placeholder returned when a bot has no log output.
pub const NO_LOGS: &str = "(no log output)";

/// A bot to create from a git repository.
#[derive(Debug, Clone)]
pub struct NewBot {
    /// Process name and directory name under the base path.
    pub name: String,
    /// Repository to clone.
    pub git_url: String,
    /// Content written verbatim to `.env`.
    pub env_content: String,
}

/// Orchestrates bot operations on the remote host.
#[derive(Clone)]
pub struct BotController {
    connector: Arc<dyn Connector>,
    config: Arc<PanelConfig>,
}

impl BotController {
    /// Creates a controller.
    pub fn new(connector: Arc<dyn Connector>, config: PanelConfig) -> Self {
        Self {
            connector,
            config: Arc::new(config),
        }
    }

    /// The panel configuration.
    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    pub(crate) fn toolchain(&self) -> Toolchain<'_> {
        Toolchain::new(self.config.node_env_prefix.as_deref())
    }

    pub(crate) async fn open(&self) -> Result<Box<dyn RemoteShell>> {
        let shell = self.connector.connect().await?;
        debug!(remote = %self.connector.target(), "session opened");
        Ok(shell)
    }

    /// The live process table.
    pub async fn list(&self) -> Result<Vec<BotProcess>> {
        let shell = self.open().await?;
        let result = locator::list_processes(shell.as_ref(), self.toolchain()).await;
        shell.close().await;
        result
    }

    /// Working directory and main script of `name`.
    pub async fn locate(&self, name: &str) -> Result<BotLocation> {
        let shell = self.open().await?;
        let result = locator::locate(shell.as_ref(), self.toolchain(), name).await;
        shell.close().await;
        result
    }

    /// Clones, configures, installs and starts a new bot. Returns the
    /// transcript of the steps run.
    ///
    /// A target directory that already has entries is refused; an empty one
    /// is cloned into. Every failing step, including an unusable
    /// `package.json`, comes back as [`PanelError::StepFailed`].
    pub async fn add(&self, bot: &NewBot) -> Result<String> {
        validate_bot_name(&bot.name)?;
        if bot.git_url.trim().is_empty() {
            return Err(PanelError::InvalidInput("repository URL is required".to_string()));
        }
        let dir = join_path(&self.config.base_bot_path, &bot.name);

        let shell = self.open().await?;
        let result = self.add_in(shell.as_ref(), bot, &dir).await;
        shell.close().await;
        result
    }

    async fn add_in(&self, shell: &dyn RemoteShell, bot: &NewBot, dir: &str) -> Result<String> {
        if shell.exec(&has_entries(dir)).await?.success() {
            return Err(PanelError::DirectoryExists(dir.to_string()));
        }

        let mut transcript = Transcript::new();
        match self.provision(shell, bot, dir, &mut transcript).await {
            Ok(()) => {
                info!(bot = %bot.name, dir = %dir, "bot added");
                Ok(transcript.into_string())
            }
            Err(e) => {
                warn!(bot = %bot.name, dir = %dir, error = %e, "add failed, removing directory");
                match shell.exec(&remove_dir_all(dir)).await {
                    Ok(out) if out.success() => {}
                    Ok(out) => warn!(dir = %dir, stderr = %out.stderr.trim(), "cleanup failed"),
                    Err(cleanup) => warn!(dir = %dir, error = %cleanup, "cleanup failed"),
                }
                Err(e)
            }
        }
    }

    async fn provision(
        &self,
        shell: &dyn RemoteShell,
        bot: &NewBot,
        dir: &str,
        transcript: &mut Transcript,
    ) -> Result<()> {
        let tc = self.toolchain();
        transcript.step(shell, &tc.git_clone(bot.git_url.trim(), dir)).await?;
        transcript
            .step(shell, &write_file(&join_path(dir, ENV_FILE), &bot.env_content))
            .await?;
        transcript.step(shell, &tc.npm_install(dir)).await?;

        let entry = locator::read_entry_point(shell, dir).await.map_err(|e| {
            if matches!(e, PanelError::Transport(_)) {
                return e;
            }
            PanelError::StepFailed {
                command: read_file(&join_path(dir, MANIFEST_FILE)),
                stderr: e.to_string(),
                transcript: transcript.as_str().to_string(),
            }
        })?;
        transcript.note(format!("entry point: {entry}"));
        transcript
            .step(shell, &tc.pm2_start_script(&join_path(dir, &entry), &bot.name, dir))
            .await?;
        Ok(())
    }

    /// Starts, stops or restarts `name`.
    pub async fn manage(&self, name: &str, action: ProcessAction) -> Result<String> {
        validate_bot_name(name)?;
        let shell = self.open().await?;
        let result = shell.exec(&self.toolchain().pm2_action(action, name)).await;
        shell.close().await;

        result?.checked(|| format!("failed to {action} bot '{name}'"))?;
        info!(bot = %name, action = %action, "bot managed");
        Ok(format!("bot '{name}' {action} ok"))
    }

    /// Current `.env` content; empty when the file does not exist.
    pub async fn read_env(&self, name: &str) -> Result<String> {
        let shell = self.open().await?;
        let result = self.read_env_in(shell.as_ref(), name).await;
        shell.close().await;
        result
    }

    async fn read_env_in(&self, shell: &dyn RemoteShell, name: &str) -> Result<String> {
        let dir = locator::working_directory(shell, self.toolchain(), name).await?;
        read_optional(shell, &join_path(&dir, ENV_FILE)).await
    }

    /// Replaces `.env` and reloads the bot.
    ///
    /// A reload failure after the write is reported as
    /// [`PanelError::PartialSuccess`]: the file is saved, the process still
    /// runs the old configuration.
    pub async fn update_env(&self, name: &str, content: &str) -> Result<String> {
        let shell = self.open().await?;
        let result = self.update_env_in(shell.as_ref(), name, content).await;
        shell.close().await;
        result
    }

    async fn update_env_in(&self, shell: &dyn RemoteShell, name: &str, content: &str) -> Result<String> {
        let tc = self.toolchain();
        let dir = locator::working_directory(shell, tc, name).await?;
        let path = join_path(&dir, ENV_FILE);

        advisory(shell, &copy_file(&path, &format!("{path}.bak")), "env backup").await;

        shell
            .exec(&write_file(&path, content))
            .await?
            .checked(|| format!("failed to write {path}"))?;

        let reload = shell.exec(&tc.pm2_reload(name)).await?;
        if !reload.success() {
            let reason = match reload.stderr.trim() {
                "" => format!("exit code {}", reload.exit_code),
                s => s.to_string(),
            };
            warn!(bot = %name, error = %reason, "env saved but reload failed");
            return Err(PanelError::PartialSuccess {
                saved: format!("configuration for '{name}' was saved"),
                failure: format!("reloading the bot failed: {reason}"),
            });
        }
        info!(bot = %name, "env updated");
        Ok(format!("configuration for '{name}' saved and bot reloaded"))
    }

    /// Removes `name` from the process table. Source files stay on disk.
    pub async fn delete(&self, name: &str) -> Result<String> {
        validate_bot_name(name)?;
        let shell = self.open().await?;
        let result = shell.exec(&self.toolchain().pm2_delete(name)).await;
        shell.close().await;

        result?.checked(|| format!("failed to delete bot '{name}'"))?;
        info!(bot = %name, "bot deleted from process manager");
        Ok(format!("bot '{name}' removed from the process manager"))
    }

    /// Last `lines` lines of the bot's logs.
    pub async fn logs(&self, name: &str, lines: Option<usize>) -> Result<String> {
        validate_bot_name(name)?;
        let lines = lines.unwrap_or(self.config.log_lines);
        let shell = self.open().await?;
        let result = shell.exec(&self.toolchain().pm2_logs(name, lines)).await;
        shell.close().await;

        let output = result?;
        if output.stdout.trim().is_empty() {
            if !output.stderr.trim().is_empty() {
                return Err(PanelError::CommandFailed {
                    exit_code: output.exit_code,
                    message: output.stderr.trim().to_string(),
                });
            }
            return Ok(NO_LOGS.to_string());
        }
        Ok(output.stdout)
    }

    /// Pulls the latest code from the repository's default branch,
    /// reinstalls and reloads. Local changes in the work tree are discarded.
    ///
    /// `git_url` repoints `origin` first; `None` keeps the current remote.
    pub async fn update(&self, name: &str, git_url: Option<&str>) -> Result<String> {
        let shell = self.open().await?;
        let result = self.update_in(shell.as_ref(), name, git_url).await;
        shell.close().await;
        result
    }

    async fn update_in(&self, shell: &dyn RemoteShell, name: &str, git_url: Option<&str>) -> Result<String> {
        let tc = self.toolchain();
        let location = locator::locate(shell, tc, name).await?;
        let dir = location.working_directory.as_str();
        let mut transcript = Transcript::new();

        let head = transcript.step(shell, &tc.git_default_branch(dir)).await?;
        let branch = parse_default_branch(&head).ok_or_else(|| PanelError::StepFailed {
            command: tc.git_default_branch(dir),
            stderr: "remote default branch could not be resolved".to_string(),
            transcript: transcript.as_str().to_string(),
        })?;
        transcript.note(format!("default branch: {branch}"));

        if let Some(url) = git_url.map(str::trim).filter(|u| !u.is_empty()) {
            transcript.step(shell, &tc.git_set_remote(dir, url)).await?;
        }
        transcript.step(shell, &tc.git_fetch(dir)).await?;
        transcript.step(shell, &tc.git_reset_hard(dir, &branch)).await?;
        transcript.step(shell, &tc.npm_install(dir)).await?;
        transcript.step(shell, &tc.pm2_reload(name)).await?;

        info!(bot = %name, branch = %branch, "bot updated");
        Ok(transcript.into_string())
    }

    /// Streams raw log output of `name` into `sink` until the remote command
    /// ends or the sink is dropped.
    pub async fn follow_logs(
        &self,
        name: &str,
        lines: Option<usize>,
        sink: mpsc::Sender<OutputChunk>,
    ) -> Result<Option<i32>> {
        validate_bot_name(name)?;
        let lines = lines.unwrap_or(self.config.follow_lines);
        let shell = self.open().await?;
        let result = shell
            .exec_streaming(&self.toolchain().pm2_logs_follow(name, lines), sink)
            .await;
        shell.close().await;
        debug!(bot = %name, "log follow ended");
        Ok(result?)
    }
}

/// Reads a remote file; a missing file reads as empty.
pub(crate) async fn read_optional(shell: &dyn RemoteShell, path: &str) -> Result<String> {
    if !shell.exec(&file_exists(path)).await?.success() {
        return Ok(String::new());
    }
    let content = shell
        .exec(&read_file(path))
        .await?
        .checked(|| format!("failed to read {path}"))?;
    Ok(content)
}

/// Runs a command whose outcome never decides the caller's result.
pub(crate) async fn advisory(shell: &dyn RemoteShell, command: &str, what: &str) -> bool {
    match shell.exec(command).await {
        Ok(out) if out.success() => true,
        Ok(out) => {
            debug!(step = %what, stderr = %out.stderr.trim(), "advisory step failed");
            false
        }
        Err(e) => {
            debug!(step = %what, error = %e, "advisory step failed");
            false
        }
    }
}
