//! SSH connection configuration.

use std::fmt;
use std::time::Duration;

/// How to authenticate against the remote host.
#[derive(Clone)]
pub enum SshAuth {
    /// Password authentication.
    Password(String),
    /// Private key file, optionally encrypted.
    Key {
        /// Path to the key; `~` and `$VARS` are expanded.
        path: String,
        /// Passphrase for an encrypted key.
        passphrase: Option<String>,
    },
}

impl fmt::Debug for SshAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SshAuth::Password(_) => f.write_str("Password(***)"),
            SshAuth::Key { path, .. } => f.debug_struct("Key").field("path", path).finish(),
        }
    }
}

/// Configuration for the SSH transport.
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Remote host name or address.
    pub host: String,
    /// Remote port.
    pub port: u16,
    /// Login user.
    pub username: String,
    /// Credentials.
    pub auth: SshAuth,
    /// Bound on connection establishment (TCP + handshake + auth).
    pub connect_timeout: Duration,
}

impl SshConfig {
    /// Creates a config using password authentication on port 22.
    pub fn new(host: impl Into<String>, username: impl Into<String>, auth: SshAuth) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: username.into(),
            auth,
            connect_timeout: Duration::from_secs(20),
        }
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Returns `user@host:port`.
    pub fn target(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_builder() {
        let config = SshConfig::new("10.0.0.5", "root", SshAuth::Password("pw".into()))
            .with_port(2222)
            .with_connect_timeout(Duration::from_secs(5));
        assert_eq!(config.port, 2222);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.target(), "root@10.0.0.5:2222");
    }

    #[test]
    fn test_debug_hides_password() {
        let config = SshConfig::new("h", "u", SshAuth::Password("hunter2".into()));
        let shown = format!("{config:?}");
        assert!(!shown.contains("hunter2"));
    }
}
