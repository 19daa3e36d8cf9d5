//! Resolves a bot name to its working directory and main script.
//!
//! Nothing here is cached. The working directory of a bot can change across
//! reinstalls, so every lookup re-reads the process table and the manifest.

use botpanel_remote::command::{join_path, parent_dir, read_file};
use botpanel_remote::RemoteShell;
use serde_json::Value;
use tracing::debug;

use crate::error::{PanelError, Result};
use crate::process::{parse_process_list, validate_bot_name, BotProcess};
use crate::toolchain::Toolchain;

/// Manifest file name inside a bot's working directory.
pub const MANIFEST_FILE: &str = "package.json";

/// Environment file name inside a bot's working directory.
pub const ENV_FILE: &str = ".env";

/// Where a bot lives on the remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotLocation {
    /// Process name.
    pub name: String,
    /// Absolute working directory.
    pub working_directory: String,
    /// Absolute path of the main script.
    pub main_script: String,
}

impl BotLocation {
    /// `<workdir>/.env`
    pub fn env_path(&self) -> String {
        join_path(&self.working_directory, ENV_FILE)
    }

    /// `<workdir>/.env.bak`
    pub fn env_backup_path(&self) -> String {
        format!("{}.bak", self.env_path())
    }

    /// `<mainScript>.bak`
    pub fn script_backup_path(&self) -> String {
        format!("{}.bak", self.main_script)
    }

    /// Directory holding the main script.
    pub fn script_dir(&self) -> String {
        parent_dir(&self.main_script)
    }

    /// A file placed next to the main script.
    pub fn beside_script(&self, file_name: &str) -> String {
        join_path(&self.script_dir(), file_name)
    }
}

/// Reads the process table.
pub async fn list_processes(shell: &dyn RemoteShell, toolchain: Toolchain<'_>) -> Result<Vec<BotProcess>> {
    let stdout = shell
        .exec(&toolchain.pm2_list())
        .await?
        .checked(|| "failed to list processes".to_string())?;
    parse_process_list(&stdout)
}

/// Finds `name` in the process table.
pub async fn find_process(
    shell: &dyn RemoteShell,
    toolchain: Toolchain<'_>,
    name: &str,
) -> Result<BotProcess> {
    list_processes(shell, toolchain)
        .await?
        .into_iter()
        .find(|p| p.name == name)
        .ok_or_else(|| PanelError::NotFound(name.to_string()))
}

/// Resolves the working directory pinned for `name`.
pub async fn working_directory(
    shell: &dyn RemoteShell,
    toolchain: Toolchain<'_>,
    name: &str,
) -> Result<String> {
    validate_bot_name(name)?;
    find_process(shell, toolchain, name)
        .await?
        .working_directory
        .filter(|d| !d.is_empty())
        .ok_or_else(|| PanelError::NotFound(name.to_string()))
}

/// Resolves the working directory and main script of `name`.
pub async fn locate(shell: &dyn RemoteShell, toolchain: Toolchain<'_>, name: &str) -> Result<BotLocation> {
    let working_directory = working_directory(shell, toolchain, name).await?;
    let entry = read_entry_point(shell, &working_directory).await?;
    let location = BotLocation {
        name: name.to_string(),
        main_script: join_path(&working_directory, &entry),
        working_directory,
    };
    debug!(
        bot = %name,
        dir = %location.working_directory,
        script = %location.main_script,
        "located bot"
    );
    Ok(location)
}

/// Reads `<dir>/package.json` and returns its entry point, relative to `dir`.
pub async fn read_entry_point(shell: &dyn RemoteShell, dir: &str) -> Result<String> {
    let path = join_path(dir, MANIFEST_FILE);
    let output = shell.exec(&read_file(&path)).await?;
    if !output.success() {
        return Err(PanelError::ManifestUnreadable {
            reason: match output.stderr.trim() {
                "" => format!("exit code {}", output.exit_code),
                s => s.to_string(),
            },
            path,
        });
    }
    entry_point(&output.stdout, &path)
}

/// Derives the entry script from manifest text: `main`, or else the last
/// whitespace-separated token of `scripts.start`.
pub fn entry_point(manifest: &str, path: &str) -> Result<String> {
    let value: Value = serde_json::from_str(manifest).map_err(|e| PanelError::ManifestUnreadable {
        path: path.to_string(),
        reason: e.to_string(),
    })?;

    let main = value
        .get("main")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty());
    if let Some(main) = main {
        return Ok(main.to_string());
    }

    value
        .get("scripts")
        .and_then(|s| s.get("start"))
        .and_then(Value::as_str)
        .and_then(|start| start.split_whitespace().last())
        .map(str::to_string)
        .ok_or_else(|| PanelError::NoEntryPoint(path.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use botpanel_remote::{CommandOutput, Connector, MockConnector};

    const JLIST: &str = r#"[{"name":"x","pm_id":0,"pid":10,
        "pm2_env":{"status":"online","pm_cwd":"/root/x"}},
        {"name":"nodir","pm_id":1,"pm2_env":{"status":"stopped"}}]"#;

    fn mock() -> MockConnector {
        let mock = MockConnector::new();
        mock.on("pm2 jlist", CommandOutput::ok(JLIST));
        mock
    }

    #[test]
    fn test_entry_point_prefers_main() {
        let m = r#"{"main":"bot.js","scripts":{"start":"node other.js"}}"#;
        assert_eq!(entry_point(m, "p").unwrap(), "bot.js");
    }

    #[test]
    fn test_entry_point_from_start_script() {
        let m = r#"{"scripts":{"start":"node --max-old-space-size=512 src/index.js"}}"#;
        assert_eq!(entry_point(m, "p").unwrap(), "src/index.js");
        let m = r#"{"main":"  ","scripts":{"start":"node app.js"}}"#;
        assert_eq!(entry_point(m, "p").unwrap(), "app.js");
    }

    #[test]
    fn test_entry_point_errors() {
        assert!(matches!(
            entry_point(r#"{"name":"x"}"#, "/root/x/package.json"),
            Err(PanelError::NoEntryPoint(p)) if p == "/root/x/package.json"
        ));
        assert!(matches!(
            entry_point(r#"{"scripts":{"start":"  "}}"#, "p"),
            Err(PanelError::NoEntryPoint(_))
        ));
        assert!(matches!(
            entry_point("not json", "p"),
            Err(PanelError::ManifestUnreadable { .. })
        ));
    }

    #[tokio::test]
    async fn test_locate_with_main() {
        let mock = mock();
        mock.with_file("/root/x/package.json", r#"{"main":"bot.js"}"#);
        let shell = mock.connect().await.unwrap();

        let loc = locate(shell.as_ref(), Toolchain::new(None), "x").await.unwrap();
        assert_eq!(loc.working_directory, "/root/x");
        assert_eq!(loc.main_script, "/root/x/bot.js");
        assert_eq!(loc.env_path(), "/root/x/.env");
        assert_eq!(loc.beside_script("telegramNotifier.js"), "/root/x/telegramNotifier.js");

        let again = locate(shell.as_ref(), Toolchain::new(None), "x").await.unwrap();
        assert_eq!(loc, again);
    }

    #[tokio::test]
    async fn test_locate_absent_name_reads_no_manifest() {
        let mock = mock();
        let shell = mock.connect().await.unwrap();

        let err = locate(shell.as_ref(), Toolchain::new(None), "ghost").await.unwrap_err();
        assert!(matches!(err, PanelError::NotFound(n) if n == "ghost"));
        assert!(!mock.executed("package.json"));
    }

    #[tokio::test]
    async fn test_locate_missing_working_directory() {
        let mock = mock();
        let shell = mock.connect().await.unwrap();
        let err = locate(shell.as_ref(), Toolchain::new(None), "nodir").await.unwrap_err();
        assert!(matches!(err, PanelError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_locate_unreadable_manifest() {
        let mock = mock();
        let shell = mock.connect().await.unwrap();
        let err = locate(shell.as_ref(), Toolchain::new(None), "x").await.unwrap_err();
        match err {
            PanelError::ManifestUnreadable { path, reason } => {
                assert_eq!(path, "/root/x/package.json");
                assert!(reason.contains("No such file"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_failure_is_command_failed() {
        let mock = MockConnector::new();
        mock.on("pm2 jlist", CommandOutput::failed(127, "pm2: command not found"));
        let shell = mock.connect().await.unwrap();
        let err = list_processes(shell.as_ref(), Toolchain::new(None)).await.unwrap_err();
        assert_eq!(err.to_string(), "pm2: command not found");
    }
}
