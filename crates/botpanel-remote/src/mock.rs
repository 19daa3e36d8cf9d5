//! Scripted in-memory remote shell.
//!
//! Commands are answered by the first rule whose pattern is a substring of
//! the command. Unmatched commands fall through to a tiny simulated
//! filesystem (`cat`, `cp`, `rm -rf`, base64 writes, `test -f/-d`, `ls -A` emptiness checks), and
//! anything else succeeds with empty output. A directory exists when some
//! file lives under it. Every command is recorded.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::command::{decode_write, unquote};
use crate::error::{RemoteError, Result};
use crate::output::{CommandOutput, OutputChunk};
use crate::shell::{Connector, RemoteShell};

struct Rule {
    pattern: String,
    responses: VecDeque<CommandOutput>,
}

impl Rule {
    fn next(&mut self) -> CommandOutput {
        if self.responses.len() > 1 {
            self.responses.pop_front().unwrap_or_default()
        } else {
            self.responses.front().cloned().unwrap_or_default()
        }
    }
}

#[derive(Default)]
struct MockState {
    rules: Vec<Rule>,
    commands: Vec<String>,
    files: HashMap<String, String>,
    connect_error: Option<String>,
    opened: usize,
    closed: usize,
}

impl MockState {
    fn answer(&mut self, command: &str) -> CommandOutput {
        self.commands.push(command.to_string());

        if let Some(rule) = self
            .rules
            .iter_mut()
            .find(|r| command.contains(r.pattern.as_str()))
        {
            return rule.next();
        }

        if let Some((path, content)) = decode_write(command) {
            self.files.insert(path, content);
            return CommandOutput::ok("");
        }
        if let Some((from, to)) = parse_copy_if_absent(command) {
            if !self.files.contains_key(&to) {
                return self.copy(&from, &to);
            }
            return CommandOutput::ok("");
        }
        if let Some(rest) = command.strip_prefix("cp ") {
            if let Some((from, to)) = split_two_tokens(rest) {
                return self.copy(&from, &to);
            }
        }
        if let Some(path) = command.strip_prefix("cat ") {
            let path = unquote(path);
            return match self.files.get(&path) {
                Some(content) => CommandOutput::ok(content.clone()),
                None => CommandOutput::failed(1, format!("cat: {path}: No such file or directory")),
            };
        }
        if let Some(path) = command.strip_prefix("rm -rf ") {
            let path = unquote(path);
            let nested = format!("{}/", path.trim_end_matches('/'));
            self.files
                .retain(|p, _| p != &path && !p.starts_with(&nested));
            return CommandOutput::ok("");
        }
        if let Some(path) = command
            .strip_prefix("test -n \"$(ls -A ")
            .and_then(|rest| rest.strip_suffix(" 2>/dev/null)\""))
        {
            let path = unquote(path);
            return if self.files.contains_key(&path) || self.has_dir(&path) {
                CommandOutput::ok("")
            } else {
                CommandOutput::failed(1, "")
            };
        }
        for prefix in ["test -f ", "test -d "] {
            if let Some(path) = command.strip_prefix(prefix) {
                let path = unquote(path);
                let exists = match prefix {
                    "test -f " => self.files.contains_key(&path),
                    _ => self.has_dir(&path),
                };
                return if exists {
                    CommandOutput::ok("")
                } else {
                    CommandOutput::failed(1, "")
                };
            }
        }

        CommandOutput::ok("")
    }

    fn has_dir(&self, path: &str) -> bool {
        let nested = format!("{}/", path.trim_end_matches('/'));
        self.files.keys().any(|p| p.starts_with(&nested))
    }

    fn copy(&mut self, from: &str, to: &str) -> CommandOutput {
        match self.files.get(from).cloned() {
            Some(content) => {
                self.files.insert(to.to_string(), content);
                CommandOutput::ok("")
            }
            None => CommandOutput::failed(1, format!("cp: cannot stat '{from}': No such file or directory")),
        }
    }
}

fn split_two_tokens(rest: &str) -> Option<(String, String)> {
    // Tokens produced by `quote` are `'...'` separated by one space.
    let (first, second) = rest.split_once("' '")?;
    Some((unquote(&format!("{first}'")), unquote(&format!("'{second}"))))
}

fn parse_copy_if_absent(command: &str) -> Option<(String, String)> {
    let rest = command.strip_prefix("[ -e ")?;
    let (_, copy) = rest.split_once(" ] || cp ")?;
    split_two_tokens(copy)
}

/// A connector handing out [`MockShell`]s that share one scripted state.
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    /// Creates an empty mock where every command succeeds silently.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Answers commands containing `pattern` with `output`.
    pub fn on(&self, pattern: impl Into<String>, output: CommandOutput) -> &Self {
        self.on_sequence(pattern, vec![output])
    }

    /// Answers successive matching commands with `outputs` in order; the last
    /// output repeats once the others are used up.
    pub fn on_sequence(&self, pattern: impl Into<String>, outputs: Vec<CommandOutput>) -> &Self {
        self.lock().rules.push(Rule {
            pattern: pattern.into(),
            responses: outputs.into(),
        });
        self
    }

    /// Seeds a file in the simulated filesystem.
    pub fn with_file(&self, path: impl Into<String>, content: impl Into<String>) -> &Self {
        self.lock().files.insert(path.into(), content.into());
        self
    }

    /// Makes every subsequent `connect` fail with a transport error.
    pub fn fail_connect(&self, reason: impl Into<String>) -> &Self {
        self.lock().connect_error = Some(reason.into());
        self
    }

    /// All commands executed so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.lock().commands.clone()
    }

    /// Returns true if any executed command contains `pattern`.
    pub fn executed(&self, pattern: &str) -> bool {
        self.lock().commands.iter().any(|c| c.contains(pattern))
    }

    /// Number of executed commands containing `pattern`.
    pub fn count(&self, pattern: &str) -> usize {
        self.lock()
            .commands
            .iter()
            .filter(|c| c.contains(pattern))
            .count()
    }

    /// Index of the first executed command containing `pattern`.
    pub fn position(&self, pattern: &str) -> Option<usize> {
        self.lock().commands.iter().position(|c| c.contains(pattern))
    }

    /// Current content of a simulated file.
    pub fn file(&self, path: &str) -> Option<String> {
        self.lock().files.get(path).cloned()
    }

    /// Contents written to `path` via base64 writes, in order.
    pub fn writes_to(&self, path: &str) -> Vec<String> {
        self.lock()
            .commands
            .iter()
            .filter_map(|c| decode_write(c))
            .filter(|(p, _)| p == path)
            .map(|(_, content)| content)
            .collect()
    }

    /// Number of sessions opened.
    pub fn sessions_opened(&self) -> usize {
        self.lock().opened
    }

    /// Number of sessions explicitly closed.
    pub fn sessions_closed(&self) -> usize {
        self.lock().closed
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Box<dyn RemoteShell>> {
        let mut state = self.lock();
        if let Some(reason) = &state.connect_error {
            return Err(RemoteError::Connect {
                host: "mock".to_string(),
                reason: reason.clone(),
            });
        }
        state.opened += 1;
        Ok(Box::new(MockShell {
            state: Arc::clone(&self.state),
        }))
    }

    fn target(&self) -> String {
        "mock".to_string()
    }
}

/// A session produced by [`MockConnector`].
pub struct MockShell {
    state: Arc<Mutex<MockState>>,
}

impl MockShell {
    fn answer(&self, command: &str) -> CommandOutput {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .answer(command)
    }
}

#[async_trait]
impl RemoteShell for MockShell {
    async fn exec(&self, command: &str) -> Result<CommandOutput> {
        Ok(self.answer(command))
    }

    async fn exec_streaming(
        &self,
        command: &str,
        sink: mpsc::Sender<OutputChunk>,
    ) -> Result<Option<i32>> {
        let output = self.answer(command);
        if !output.stdout.is_empty() && sink.send(OutputChunk::Stdout(output.stdout)).await.is_err() {
            return Ok(None);
        }
        if !output.stderr.is_empty() && sink.send(OutputChunk::Stderr(output.stderr)).await.is_err() {
            return Ok(None);
        }
        Ok(Some(output.exit_code))
    }

    async fn close(&self) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).closed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{
        copy_file, copy_file_if_absent, dir_exists, has_entries, read_file, remove_dir_all,
        write_file,
    };

    #[tokio::test]
    async fn test_rules_and_sequences() {
        let mock = MockConnector::new();
        mock.on_sequence(
            "pm2 jlist",
            vec![CommandOutput::ok("first"), CommandOutput::ok("second")],
        );
        let shell = mock.connect().await.unwrap();
        assert_eq!(shell.exec("pm2 jlist").await.unwrap().stdout, "first");
        assert_eq!(shell.exec("pm2 jlist").await.unwrap().stdout, "second");
        assert_eq!(shell.exec("pm2 jlist").await.unwrap().stdout, "second");
        assert_eq!(mock.count("jlist"), 3);
    }

    #[tokio::test]
    async fn test_simulated_files() {
        let mock = MockConnector::new();
        mock.with_file("/b/.env", "A=1\n");
        let shell = mock.connect().await.unwrap();

        shell.exec(&copy_file("/b/.env", "/b/.env.bak")).await.unwrap();
        shell.exec(&write_file("/b/.env", "A=2\n")).await.unwrap();
        assert_eq!(mock.file("/b/.env.bak").unwrap(), "A=1\n");
        assert_eq!(shell.exec(&read_file("/b/.env")).await.unwrap().stdout, "A=2\n");

        shell
            .exec(&copy_file_if_absent("/b/.env", "/b/.env.bak"))
            .await
            .unwrap();
        assert_eq!(mock.file("/b/.env.bak").unwrap(), "A=1\n");

        let missing = shell.exec(&read_file("/b/none")).await.unwrap();
        assert!(!missing.success());
        assert_eq!(mock.writes_to("/b/.env"), vec!["A=2\n".to_string()]);
    }

    #[tokio::test]
    async fn test_simulated_directories() {
        let mock = MockConnector::new();
        mock.with_file("/b/.wwebjs_auth/session/Default", "x");
        let shell = mock.connect().await.unwrap();

        assert!(shell.exec(&dir_exists("/b/.wwebjs_auth")).await.unwrap().success());
        assert!(shell.exec(&has_entries("/b")).await.unwrap().success());
        assert!(!shell.exec(&has_entries("/missing")).await.unwrap().success());

        shell.exec(&remove_dir_all("/b/.wwebjs_auth")).await.unwrap();
        assert!(!shell.exec(&dir_exists("/b/.wwebjs_auth")).await.unwrap().success());
        assert!(mock.file("/b/.wwebjs_auth/session/Default").is_none());
    }

    #[tokio::test]
    async fn test_connect_failure_and_session_counts() {
        let mock = MockConnector::new();
        let shell = mock.connect().await.unwrap();
        shell.close().await;
        assert_eq!(mock.sessions_opened(), 1);
        assert_eq!(mock.sessions_closed(), 1);

        mock.fail_connect("refused");
        let err = mock.connect().await.err().unwrap();
        assert!(err.is_transport());
    }
}
