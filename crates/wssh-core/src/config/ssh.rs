//! SSH target configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use wssh_protocol::TerminalSize;

use super::serde_utils::duration_secs;
use crate::error::ConfigError;

/// How the server's host key is checked
///
/// `AcceptAny` trusts whatever key the server presents. It is the default
/// because the relay is usually pointed at a host the operator controls,
/// but it leaves the SSH leg open to interception; every connection made
/// under it logs the key fingerprint at warn level.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum HostKeyPolicy {
    /// Accept any host key
    #[default]
    AcceptAny,
    /// Require the SHA-256 fingerprint to match exactly
    Fingerprint {
        /// Expected fingerprint as printed by russh (`SHA256:...`)
        fingerprint: String,
    },
}

/// Authentication method chosen for one connection attempt
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// Public key from a private key file
    PublicKey {
        /// Path to the private key
        identity_file: PathBuf,
        /// Passphrase protecting the key
        passphrase: Option<String>,
    },
    /// Plain password
    Password(String),
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::PublicKey {
                identity_file,
                passphrase,
            } => f
                .debug_struct("PublicKey")
                .field("identity_file", identity_file)
                .field("passphrase", &passphrase.as_ref().map(|_| "<redacted>"))
                .finish(),
            AuthMethod::Password(_) => f.debug_tuple("Password").field(&"<redacted>").finish(),
        }
    }
}

/// Configuration for the SSH side of the relay
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// SSH server hostname or IP
    pub host: String,

    /// SSH server port
    pub port: u16,

    /// Username for SSH authentication
    pub user: String,

    /// Private key file; takes precedence over `password`
    pub identity_file: Option<PathBuf>,

    /// Password for password authentication
    pub password: Option<String>,

    /// Passphrase for `identity_file`
    pub key_passphrase: Option<String>,

    /// Bound on TCP connect, key exchange and authentication
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Host key verification
    pub host_key: HostKeyPolicy,

    /// Terminal type sent with the PTY request
    pub term: String,

    /// Geometry of the PTY before the browser sends its first resize
    pub initial_size: TerminalSize,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 22,
            user: "root".to_string(),
            identity_file: None,
            password: None,
            key_passphrase: None,
            connect_timeout: Duration::from_secs(10),
            host_key: HostKeyPolicy::AcceptAny,
            term: "xterm-256color".to_string(),
            initial_size: TerminalSize::default(),
        }
    }
}

impl fmt::Debug for SshConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("SshConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("identity_file", &self.identity_file)
            .field("password", &redact(&self.password))
            .field("key_passphrase", &redact(&self.key_passphrase))
            .field("connect_timeout", &self.connect_timeout)
            .field("host_key", &self.host_key)
            .field("term", &self.term)
            .field("initial_size", &self.initial_size)
            .finish()
    }
}

impl SshConfig {
    /// `host:port` for dialing and log messages
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check the config before any connection attempt
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingField("ssh.host".to_string()));
        }
        if self.user.trim().is_empty() {
            return Err(ConfigError::MissingField("ssh.user".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("ssh.port must not be 0".to_string()));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "ssh.connect_timeout must be positive".to_string(),
            ));
        }
        if self.term.is_empty() {
            return Err(ConfigError::MissingField("ssh.term".to_string()));
        }
        if let HostKeyPolicy::Fingerprint { fingerprint } = &self.host_key {
            if fingerprint.trim().is_empty() {
                return Err(ConfigError::MissingField(
                    "ssh.host_key.fingerprint".to_string(),
                ));
            }
        }
        self.auth_method().map(|_| ())
    }

    /// Pick the authentication method
    ///
    /// An identity file wins over a password. The key passphrase comes from
    /// `key_passphrase`; if that is unset and a password is present, the
    /// password is used as the passphrase.
    pub fn auth_method(&self) -> Result<AuthMethod, ConfigError> {
        match (&self.identity_file, &self.password) {
            (Some(identity_file), password) => {
                let passphrase = match (&self.key_passphrase, password) {
                    (Some(passphrase), _) => Some(passphrase.clone()),
                    (None, Some(password)) => {
                        tracing::debug!(
                            "No key_passphrase set, using password as passphrase for {}",
                            identity_file.display()
                        );
                        Some(password.clone())
                    }
                    (None, None) => None,
                };
                Ok(AuthMethod::PublicKey {
                    identity_file: identity_file.clone(),
                    passphrase,
                })
            }
            (None, Some(password)) => Ok(AuthMethod::Password(password.clone())),
            (None, None) => Err(ConfigError::MissingField(
                "ssh.identity_file or ssh.password".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_password() -> SshConfig {
        SshConfig {
            password: Some("secret".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = SshConfig::default();
        assert_eq!(config.address(), "localhost:22");
        assert_eq!(config.user, "root");
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.term, "xterm-256color");
        assert_eq!(config.initial_size, TerminalSize::new(80, 30));
        assert_eq!(config.host_key, HostKeyPolicy::AcceptAny);
    }

    #[test]
    fn test_password_auth() {
        let method = with_password().auth_method().unwrap();
        assert_eq!(method, AuthMethod::Password("secret".to_string()));
    }

    #[test]
    fn test_identity_takes_precedence() {
        let config = SshConfig {
            identity_file: Some(PathBuf::from("/keys/id_ed25519")),
            key_passphrase: Some("hunter2".to_string()),
            ..with_password()
        };

        assert_eq!(
            config.auth_method().unwrap(),
            AuthMethod::PublicKey {
                identity_file: PathBuf::from("/keys/id_ed25519"),
                passphrase: Some("hunter2".to_string()),
            }
        );
    }

    #[test]
    fn test_password_doubles_as_passphrase() {
        let config = SshConfig {
            identity_file: Some(PathBuf::from("/keys/id_rsa")),
            ..with_password()
        };

        assert_eq!(
            config.auth_method().unwrap(),
            AuthMethod::PublicKey {
                identity_file: PathBuf::from("/keys/id_rsa"),
                passphrase: Some("secret".to_string()),
            }
        );
    }

    #[test]
    fn test_no_credentials_rejected() {
        let result = SshConfig::default().validate();
        assert!(matches!(result, Err(ConfigError::MissingField(_))));
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        let mut config = with_password();
        config.port = 0;
        assert!(config.validate().is_err());

        let mut config = with_password();
        config.host = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = with_password();
        config.host_key = HostKeyPolicy::Fingerprint {
            fingerprint: String::new(),
        };
        assert!(config.validate().is_err());

        assert!(with_password().validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = SshConfig {
            key_passphrase: Some("hunter2".to_string()),
            ..with_password()
        };
        let printed = format!("{:?}", config);
        assert!(!printed.contains("secret"));
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }
}
