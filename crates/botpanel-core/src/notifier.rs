//! Notification configuration of a bot: channels in `.env`, the generated
//! notifier module and the import in the main script.

use botpanel_remote::command::{copy_file, copy_file_if_absent, read_file, write_file};
use botpanel_remote::RemoteShell;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::env_file::{self, NotificationChannel};
use crate::error::{PanelError, Result};
use crate::lifecycle::{advisory, read_optional, BotController};
use crate::locator::{self, BotLocation};
use crate::shim::{self, SHIM_DEPENDENCIES};
use crate::toolchain::Toolchain;

/// What the dashboard shows for a bot's notifications.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    /// Channels configured in `.env`.
    pub notifications: Vec<NotificationChannel>,
    /// Whether the main script imports the notifier module.
    pub notifier_injected: bool,
    /// Purpose tags the main script sends by.
    pub found_purposes: Vec<String>,
}

/// Outcome of an injection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionReport {
    /// Where the notifier module was written.
    pub shim_path: String,
    /// Whether the import line was added to the main script.
    pub import_added: bool,
    /// Direct Telegram client lines commented out.
    pub legacy_lines_disabled: usize,
}

/// Installs the notifier's dependencies, rewrites the notifier module and
/// patches the main script if it does not import it yet.
pub async fn inject(
    shell: &dyn RemoteShell,
    toolchain: Toolchain<'_>,
    location: &BotLocation,
    notifier_file: &str,
) -> Result<InjectionReport> {
    shell
        .exec(&toolchain.npm_add(&location.working_directory, &SHIM_DEPENDENCIES))
        .await?
        .checked(|| "failed to install notifier dependencies".to_string())?;

    let shim_path = location.beside_script(notifier_file);
    let env_file = shim::relative_path(&location.script_dir(), &location.env_path());
    shell
        .exec(&write_file(&shim_path, &shim::render_shim(&env_file)))
        .await?
        .checked(|| format!("failed to write {shim_path}"))?;

    let script = shell
        .exec(&read_file(&location.main_script))
        .await?
        .checked(|| format!("failed to read {}", location.main_script))?;
    let patch = shim::patch_main_script(&script, notifier_file);

    if patch.modified() {
        advisory(
            shell,
            &copy_file_if_absent(&location.main_script, &location.script_backup_path()),
            "main script backup",
        )
        .await;
        shell
            .exec(&write_file(&location.main_script, &patch.content))
            .await?
            .checked(|| format!("failed to write {}", location.main_script))?;
        info!(
            bot = %location.name,
            import_added = patch.import_added,
            legacy_lines = patch.legacy_lines_disabled,
            "main script patched"
        );
    } else {
        debug!(bot = %location.name, "main script already patched");
    }

    Ok(InjectionReport {
        shim_path,
        import_added: patch.import_added,
        legacy_lines_disabled: patch.legacy_lines_disabled,
    })
}

#[derive(Clone, Copy)]
enum EnvChange<'a> {
    Upsert(&'a NotificationChannel),
    Remove(u32),
}

impl BotController {
    /// Channels, injection state and purpose tags used by the script.
    pub async fn read_settings(&self, name: &str) -> Result<NotificationSettings> {
        let shell = self.open().await?;
        let result = self.read_settings_in(shell.as_ref(), name).await;
        shell.close().await;
        result
    }

    async fn read_settings_in(&self, shell: &dyn RemoteShell, name: &str) -> Result<NotificationSettings> {
        let location = locator::locate(shell, self.toolchain(), name).await?;
        let env = read_optional(shell, &location.env_path()).await?;
        let script = shell
            .exec(&read_file(&location.main_script))
            .await?
            .checked(|| format!("failed to read {}", location.main_script))?;

        Ok(NotificationSettings {
            notifications: env_file::parse_channels(&env),
            notifier_injected: shim::has_import(&script, &self.config().notifier_file),
            found_purposes: shim::find_purposes(&script),
        })
    }

    /// Adds or replaces a channel, makes sure the notifier is injected and
    /// reloads the bot.
    pub async fn save_channel(&self, name: &str, channel: &NotificationChannel) -> Result<String> {
        channel.validate()?;
        let shell = self.open().await?;
        let result = self
            .change_channels(shell.as_ref(), name, EnvChange::Upsert(channel))
            .await;
        shell.close().await;
        result?;
        Ok(format!("notification '{}' saved and bot '{name}' reloaded", channel.name))
    }

    /// Drops a channel and reloads the bot.
    pub async fn remove_channel(&self, name: &str, id: u32) -> Result<String> {
        let shell = self.open().await?;
        let result = self
            .change_channels(shell.as_ref(), name, EnvChange::Remove(id))
            .await;
        shell.close().await;
        result?;
        Ok(format!("notification {id} removed and bot '{name}' reloaded"))
    }

    async fn change_channels(&self, shell: &dyn RemoteShell, name: &str, change: EnvChange<'_>) -> Result<()> {
        let tc = self.toolchain();
        let location = locator::locate(shell, tc, name).await?;
        let env_path = location.env_path();
        let backup_path = location.env_backup_path();

        let backed_up = advisory(shell, &copy_file(&env_path, &backup_path), "env backup").await;

        let result = async {
            let current = read_optional(shell, &env_path).await?;
            let updated = match change {
                EnvChange::Upsert(channel) => env_file::upsert_channel(&current, channel),
                EnvChange::Remove(id) => env_file::remove_channel(&current, id),
            };
            shell
                .exec(&write_file(&env_path, &updated))
                .await?
                .checked(|| format!("failed to write {env_path}"))?;

            if let EnvChange::Upsert(_) = change {
                inject(shell, tc, &location, &self.config().notifier_file).await?;
            }

            shell
                .exec(&tc.pm2_reload(name))
                .await?
                .checked(|| format!("reloading bot '{name}' failed"))?;
            Ok::<(), PanelError>(())
        }
        .await;

        if let Err(e) = &result {
            warn!(bot = %name, error = %e, "notification change failed");
            if backed_up {
                advisory(shell, &copy_file(&backup_path, &env_path), "env restore").await;
            }
        } else {
            info!(bot = %name, "notification channels updated");
        }
        result
    }

    /// Injects the notifier into `name` and reloads it.
    pub async fn inject_notifier(&self, name: &str) -> Result<String> {
        let shell = self.open().await?;
        let result = self.inject_notifier_in(shell.as_ref(), name).await;
        shell.close().await;

        let report = result?;
        Ok(if report.import_added {
            format!("notifier injected into '{name}' and bot reloaded")
        } else {
            format!("notifier refreshed for '{name}' and bot reloaded")
        })
    }

    async fn inject_notifier_in(&self, shell: &dyn RemoteShell, name: &str) -> Result<InjectionReport> {
        let tc = self.toolchain();
        let location = locator::locate(shell, tc, name).await?;
        let report = inject(shell, tc, &location, &self.config().notifier_file).await?;
        shell
            .exec(&tc.pm2_reload(name))
            .await?
            .checked(|| format!("notifier injected, but reloading bot '{name}' failed"))?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PanelConfig;
    use crate::shim::import_line;
    use botpanel_remote::{CommandOutput, MockConnector};
    use std::sync::Arc;

    const JLIST: &str = r#"[{"name":"shop","pm_id":0,"pm2_env":{"status":"online","pm_cwd":"/root/shop"}}]"#;

    fn setup() -> (MockConnector, BotController) {
        let mock = MockConnector::new();
        mock.on("pm2 jlist", CommandOutput::ok(JLIST));
        mock.with_file("/root/shop/package.json", r#"{"main":"index.js"}"#);
        mock.with_file("/root/shop/index.js", "sendNotification('alerts', 'up');\n");
        let ctl = BotController::new(Arc::new(mock.clone()), PanelConfig::new());
        (mock, ctl)
    }

    fn ops() -> NotificationChannel {
        NotificationChannel::new(2, "Ops", "alerts", "t", "c")
    }

    #[tokio::test]
    async fn test_read_settings() {
        let (mock, ctl) = setup();
        mock.with_file("/root/shop/.env", "NAME_1=A\nTOKEN_1=t\nCHAT_ID_1=1\n");

        let settings = ctl.read_settings("shop").await.unwrap();
        assert_eq!(settings.notifications.len(), 1);
        assert!(!settings.notifier_injected);
        assert_eq!(settings.found_purposes, vec!["alerts"]);
    }

    #[tokio::test]
    async fn test_save_channel_writes_env_injects_and_reloads() {
        let (mock, ctl) = setup();
        mock.with_file("/root/shop/.env", "PORT=1\n");

        ctl.save_channel("shop", &ops()).await.unwrap();

        let env = mock.file("/root/shop/.env").unwrap();
        assert!(env.starts_with("PORT=1\n"));
        assert_eq!(env_file::parse_channels(&env), vec![ops()]);
        assert_eq!(mock.file("/root/shop/.env.bak").unwrap(), "PORT=1\n");

        let shim = mock.file("/root/shop/telegramNotifier.js").unwrap();
        assert!(shim.contains("sendNotification"));
        let script = mock.file("/root/shop/index.js").unwrap();
        assert!(script.starts_with(&import_line("telegramNotifier.js")));
        assert!(mock.file("/root/shop/index.js.bak").is_some());

        let install = mock.position("node-telegram-bot-api").unwrap();
        let reload = mock.position("pm2 reload 'shop'").unwrap();
        assert!(install < reload);
        assert_eq!(mock.sessions_closed(), 1);
    }

    #[tokio::test]
    async fn test_injection_is_idempotent() {
        let (mock, ctl) = setup();
        ctl.inject_notifier("shop").await.unwrap();
        ctl.inject_notifier("shop").await.unwrap();

        let script = mock.file("/root/shop/index.js").unwrap();
        assert_eq!(script.matches(&import_line("telegramNotifier.js")).count(), 1);
        assert_eq!(mock.writes_to("/root/shop/index.js").len(), 1);
        assert_eq!(mock.writes_to("/root/shop/telegramNotifier.js").len(), 2);
        assert_eq!(mock.count("node-telegram-bot-api"), 2);
        assert_eq!(
            mock.file("/root/shop/index.js.bak").unwrap(),
            "sendNotification('alerts', 'up');\n"
        );
    }

    #[tokio::test]
    async fn test_reload_failure_restores_env_backup() {
        let (mock, ctl) = setup();
        mock.with_file("/root/shop/.env", "PORT=1\n");
        mock.on("pm2 reload", CommandOutput::failed(1, ""));

        let err = ctl.save_channel("shop", &ops()).await.unwrap_err();
        assert!(matches!(err, PanelError::CommandFailed { .. }));
        assert!(err.to_string().contains("reloading bot 'shop' failed"));
        assert_eq!(mock.file("/root/shop/.env").unwrap(), "PORT=1\n");
    }

    #[tokio::test]
    async fn test_restore_failure_does_not_mask_error() {
        let (mock, ctl) = setup();
        mock.with_file("/root/shop/.env", "PORT=1\n");
        mock.on("pm2 reload", CommandOutput::failed(1, "reload exploded"));
        mock.on("cp '/root/shop/.env.bak'", CommandOutput::failed(1, "cp: denied"));

        let err = ctl.save_channel("shop", &ops()).await.unwrap_err();
        assert_eq!(err.to_string(), "reload exploded");
    }

    #[tokio::test]
    async fn test_remove_channel() {
        let (mock, ctl) = setup();
        let env = env_file::upsert_channel("", &NotificationChannel::new(1, "Main", "", "t1", "c1"));
        let env = env_file::upsert_channel(&env, &ops());
        mock.with_file("/root/shop/.env", env);

        ctl.remove_channel("shop", 2).await.unwrap();

        let channels = env_file::parse_channels(&mock.file("/root/shop/.env").unwrap());
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].id, 1);
        assert!(!mock.executed("node-telegram-bot-api"));
    }

    #[tokio::test]
    async fn test_invalid_channel_rejected_before_connecting() {
        let (mock, ctl) = setup();
        let bad = NotificationChannel::new(1, "", "", "t", "c");
        assert!(matches!(
            ctl.save_channel("shop", &bad).await,
            Err(PanelError::InvalidInput(_))
        ));
        assert_eq!(mock.sessions_opened(), 0);
    }
}
