//! Session reset: stop a bot, wipe its persisted session directory and start
//! it again so it asks for a fresh pairing.
//!
//! The directory is only deleted once the process table confirms the bot is
//! no longer running. Any failure after the stop was issued triggers a
//! best-effort restart.

use botpanel_remote::command::{dir_exists, join_path, remove_dir_all};
use botpanel_remote::RemoteShell;
use tracing::{info, warn};

use crate::error::{PanelError, Result};
use crate::lifecycle::BotController;
use crate::locator;
use crate::observer::{ObserverMessage, ProgressSink};
use crate::poll::wait_until;
use crate::process::ProcessAction;

impl BotController {
    /// Resets the persisted session of `name`, reporting each step to
    /// `progress`.
    pub async fn reset_session(&self, name: &str, progress: &dyn ProgressSink) -> Result<String> {
        let shell = match self.open().await {
            Ok(shell) => shell,
            Err(e) => {
                progress.emit(ObserverMessage::error(e.to_string()));
                return Err(e);
            }
        };
        let result = self.reset_in(shell.as_ref(), name, progress).await;
        shell.close().await;

        if let Err(e) = &result {
            progress.emit(ObserverMessage::error(format!(
                "session reset of '{name}' failed: {e}"
            )));
        }
        result
    }

    async fn reset_in(&self, shell: &dyn RemoteShell, name: &str, progress: &dyn ProgressSink) -> Result<String> {
        let dir = locator::working_directory(shell, self.toolchain(), name).await?;
        let session_dir = join_path(&dir, &self.config().session_dir);

        match self.wipe_session(shell, name, &session_dir, progress).await {
            Ok(()) => {
                info!(bot = %name, "session reset");
                progress.emit(ObserverMessage::progress(format!(
                    "Session of '{name}' reset. Watch the logs for a new pairing code."
                )));
                Ok(format!("session of '{name}' reset"))
            }
            Err(e) => {
                warn!(bot = %name, error = %e, "session reset failed, restarting bot");
                progress.emit(ObserverMessage::progress(format!(
                    "Reset failed, restarting '{name}'..."
                )));
                let restart = self.toolchain().pm2_action(ProcessAction::Restart, name);
                let restarted = match shell.exec(&restart).await {
                    Ok(out) if out.success() => Ok(()),
                    Ok(out) => Err(out.stderr.trim().to_string()),
                    Err(err) => Err(err.to_string()),
                };
                if let Err(reason) = restarted {
                    warn!(bot = %name, error = %reason, "restart after failed reset failed");
                    progress.emit(ObserverMessage::progress(format!(
                        "Warning: could not restart '{name}': {reason}"
                    )));
                }
                Err(e)
            }
        }
    }

    async fn wipe_session(
        &self,
        shell: &dyn RemoteShell,
        name: &str,
        session_dir: &str,
        progress: &dyn ProgressSink,
    ) -> Result<()> {
        let tc = self.toolchain();
        let config = self.config();

        progress.emit(ObserverMessage::progress(format!("Stopping '{name}'...")));
        shell
            .exec(&tc.pm2_action(ProcessAction::Stop, name))
            .await?
            .checked(|| format!("failed to stop bot '{name}'"))?;

        progress.emit(ObserverMessage::progress(format!(
            "Waiting for '{name}' to stop..."
        )));
        let stopped = wait_until(config.stop_poll, || async move {
            match locator::list_processes(shell, tc).await {
                Ok(table) => table
                    .iter()
                    .find(|p| p.name == name)
                    .map_or(true, |p| p.status.is_terminal()),
                Err(e) => {
                    warn!(bot = %name, error = %e, "status check failed");
                    false
                }
            }
        })
        .await;
        if !stopped {
            return Err(PanelError::ConfirmationTimeout(format!(
                "bot '{name}' did not stop within {}s",
                config.stop_poll.timeout.as_secs()
            )));
        }

        progress.emit(ObserverMessage::progress(format!(
            "Deleting session directory {session_dir}..."
        )));
        shell
            .exec(&remove_dir_all(session_dir))
            .await?
            .checked(|| format!("failed to delete {session_dir}"))?;

        let deleted = wait_until(config.delete_poll, || async move {
            matches!(shell.exec(&dir_exists(session_dir)).await, Ok(out) if !out.success())
        })
        .await;
        if !deleted {
            return Err(PanelError::ConfirmationTimeout(format!(
                "session directory {session_dir} still exists after {}s",
                config.delete_poll.timeout.as_secs()
            )));
        }

        progress.emit(ObserverMessage::progress(format!("Starting '{name}'...")));
        shell
            .exec(&tc.pm2_action(ProcessAction::Start, name))
            .await?
            .checked(|| format!("failed to start bot '{name}'"))?;
        Ok(())
    }
}
