//! Command builders for the remote toolchain (pm2, npm, git).
//!
//! node, npm and pm2 usually live behind nvm on the remote host, so their
//! commands are prefixed with the configured environment setup.

use botpanel_remote::command::{in_dir, quote};

use crate::process::ProcessAction;

/// Builds remote toolchain commands.
#[derive(Debug, Clone, Copy)]
pub struct Toolchain<'a> {
    node_env_prefix: Option<&'a str>,
}

impl<'a> Toolchain<'a> {
    /// Creates a builder using `node_env_prefix` before node tools.
    pub fn new(node_env_prefix: Option<&'a str>) -> Self {
        Self { node_env_prefix }
    }

    fn node(&self, command: String) -> String {
        match self.node_env_prefix {
            Some(prefix) => format!("{prefix} && {command}"),
            None => command,
        }
    }

    /// Process table as JSON.
    pub fn pm2_list(&self) -> String {
        self.node("pm2 jlist".to_string())
    }

    /// start / stop / restart by name.
    pub fn pm2_action(&self, action: ProcessAction, name: &str) -> String {
        self.node(format!("pm2 {} {}", action.as_str(), quote(name)))
    }

    /// Starts `script` under `name` with the working directory pinned to `cwd`.
    pub fn pm2_start_script(&self, script: &str, name: &str, cwd: &str) -> String {
        in_dir(
            cwd,
            &self.node(format!(
                "pm2 start {} --name {} --cwd {}",
                quote(script),
                quote(name),
                quote(cwd)
            )),
        )
    }

    /// Zero-downtime reload by name.
    pub fn pm2_reload(&self, name: &str) -> String {
        self.node(format!("pm2 reload {}", quote(name)))
    }

    /// Removes the process-table entry.
    pub fn pm2_delete(&self, name: &str) -> String {
        self.node(format!("pm2 delete {}", quote(name)))
    }

    /// Last `lines` log lines, non-streaming.
    pub fn pm2_logs(&self, name: &str, lines: usize) -> String {
        self.node(format!("pm2 logs {} --lines {} --nostream", quote(name), lines))
    }

    /// Raw log follow, replaying `lines` lines first.
    pub fn pm2_logs_follow(&self, name: &str, lines: usize) -> String {
        self.node(format!("pm2 logs {} --raw --lines {}", quote(name), lines))
    }

    /// Installs the dependencies declared in `dir/package.json`.
    pub fn npm_install(&self, dir: &str) -> String {
        self.node(format!("npm install --prefix {}", quote(dir)))
    }

    /// Installs extra packages into `dir`.
    pub fn npm_add(&self, dir: &str, packages: &[&str]) -> String {
        let packages: Vec<String> = packages.iter().map(|p| quote(p)).collect();
        self.node(format!(
            "npm install --prefix {} {}",
            quote(dir),
            packages.join(" ")
        ))
    }

    /// Clones `url` into `dir`.
    pub fn git_clone(&self, url: &str, dir: &str) -> String {
        format!("git clone {} {}", quote(url), quote(dir))
    }

    /// Prints `refs/remotes/origin/<branch>` for the remote default branch.
    pub fn git_default_branch(&self, dir: &str) -> String {
        format!("git -C {} symbolic-ref refs/remotes/origin/HEAD", quote(dir))
    }

    /// Points `origin` at `url`.
    pub fn git_set_remote(&self, dir: &str, url: &str) -> String {
        format!("git -C {} remote set-url origin {}", quote(dir), quote(url))
    }

    /// Fetches `origin`.
    pub fn git_fetch(&self, dir: &str) -> String {
        format!("git -C {} fetch origin", quote(dir))
    }

    /// Hard-resets the work tree to `origin/<branch>`.
    pub fn git_reset_hard(&self, dir: &str, branch: &str) -> String {
        format!(
            "git -C {} reset --hard {}",
            quote(dir),
            quote(&format!("origin/{branch}"))
        )
    }
}

/// Extracts the branch name from `git symbolic-ref refs/remotes/origin/HEAD`.
pub fn parse_default_branch(output: &str) -> Option<String> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    let branch = line.strip_prefix("refs/remotes/origin/").unwrap_or(line);
    if branch.is_empty() {
        None
    } else {
        Some(branch.to_string())
    }
}
