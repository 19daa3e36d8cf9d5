//! Remote command execution for the bot control panel.
//!
//! This crate is the only place that talks to the remote host:
//! - Open one SSH session per operation and close it afterwards
//! - Run a shell command and collect exit code, stdout and stderr
//! - Stream output of long-running commands (log follow)
//! - Build commands with quoted identifiers and base64 file transfer
//!
//! # Example
//!
//! ```no_run
//! use botpanel_remote::{command, Connector, SshAuth, SshConfig, SshConnector};
//!
//! # async fn run() -> botpanel_remote::Result<()> {
//! let config = SshConfig::new("10.0.0.5", "root", SshAuth::Password("secret".into()));
//! let connector = SshConnector::new(config);
//!
//! let shell = connector.connect().await?;
//! let output = shell.exec(&command::read_file("/root/bot/package.json")).await;
//! shell.close().await;
//!
//! println!("{}", output?.stdout);
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod config;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod output;
pub mod shell;
pub mod ssh;

pub use config::{SshAuth, SshConfig};
pub use error::{RemoteError, Result};
pub use output::{CommandOutput, OutputChunk};
pub use shell::{Connector, RemoteShell};
pub use ssh::{SshConnector, SshShell};

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockConnector, MockShell};
