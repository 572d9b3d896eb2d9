//! SSH session factory
//!
//! Dials the SSH server, authenticates, opens one session channel and
//! allocates a PTY on it. Every step runs under the same connect deadline,
//! and any failure disconnects whatever was already established before the
//! error is returned.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{self, Config, Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect, Pty};
use russh_keys::key::{KeyPair, PublicKey};
use thiserror::Error;
use tokio::time::Instant;

use wssh_core::config::{AuthMethod, HostKeyPolicy, SshConfig};
use wssh_core::{RemoteSession, SessionError, SessionOpener};

use super::session::SshSession;

/// Terminal modes sent with every PTY request: echo on, 14.4 kbaud in/out
const TERMINAL_MODES: &[(Pty, u32)] = &[
    (Pty::ECHO, 1),
    (Pty::TTY_OP_ISPEED, 14400),
    (Pty::TTY_OP_OSPEED, 14400),
];

/// Raised from the russh handler when the host key does not match
#[derive(Debug, Error)]
#[error("host key mismatch: expected {expected}, got {actual}")]
struct HostKeyMismatch {
    expected: String,
    actual: String,
}

/// Opens fully established SSH sessions from one [`SshConfig`]
pub struct SessionFactory {
    /// Target and credentials
    config: SshConfig,
    /// russh client configuration
    ssh_config: Arc<Config>,
}

impl SessionFactory {
    /// Create a factory, validating the configuration once
    pub fn new(config: SshConfig) -> Result<Self, SessionError> {
        config.validate()?;

        if config.host_key == HostKeyPolicy::AcceptAny {
            tracing::warn!(
                "Host key verification is disabled (accept_any); any server presenting itself as {} will be trusted",
                config.address()
            );
        }

        Ok(Self {
            config,
            ssh_config: Arc::new(Config::default()),
        })
    }

    /// Open one session with a PTY of the configured initial size
    pub async fn open_session(&self) -> Result<SshSession, SessionError> {
        let address = self.config.address();
        let timeout = self.config.connect_timeout;
        let deadline = Instant::now() + timeout;

        // Resolve credentials before dialing so a bad key never opens a socket
        let credentials = Credentials::load(self.config.auth_method()?)?;

        tracing::debug!("Connecting to {}", address);
        let handler = ClientHandler::new(self.config.host_key.clone());
        let mut handle = tokio::time::timeout_at(
            deadline,
            client::connect(Arc::clone(&self.ssh_config), address.clone(), handler),
        )
        .await
        .map_err(|_| SessionError::Timeout(timeout))?
        .map_err(|e| connect_error(&address, e))?;

        match tokio::time::timeout_at(deadline, self.establish(&mut handle, credentials)).await {
            Ok(Ok(channel)) => {
                tracing::info!("SSH session established to {}", address);
                Ok(SshSession::spawn(handle, channel))
            }
            Ok(Err(e)) => {
                disconnect(&handle).await;
                Err(e)
            }
            Err(_) => {
                disconnect(&handle).await;
                Err(SessionError::Timeout(timeout))
            }
        }
    }

    /// Authenticate, open the session channel and request the PTY
    async fn establish(
        &self,
        handle: &mut Handle<ClientHandler>,
        credentials: Credentials,
    ) -> Result<Channel<Msg>, SessionError> {
        let user = self.config.user.as_str();

        tracing::debug!(
            "Authenticating as user '{}' with {}",
            user,
            credentials.describe()
        );
        let authenticated = match credentials {
            Credentials::Key(key) => handle.authenticate_publickey(user, key).await,
            Credentials::Password(password) => handle.authenticate_password(user, password).await,
        }
        .map_err(|e| SessionError::Auth(e.to_string()))?;

        if !authenticated {
            return Err(SessionError::Auth(format!(
                "server rejected credentials for user '{}'",
                user
            )));
        }

        tracing::debug!("Authentication successful, opening session channel");
        let mut channel = handle
            .channel_open_session()
            .await
            .map_err(|e| SessionError::Dial {
                address: self.config.address(),
                message: format!("failed to open session channel: {}", e),
            })?;

        let size = self.config.initial_size;
        tracing::debug!(
            "Requesting {} PTY with size {}x{}",
            self.config.term,
            size.cols,
            size.rows
        );
        channel
            .request_pty(
                true,
                &self.config.term,
                size.cols,
                size.rows,
                0,
                0,
                TERMINAL_MODES,
            )
            .await
            .map_err(|e| SessionError::Pty(e.to_string()))?;

        wait_for_reply(&mut channel).await.map_err(SessionError::Pty)?;

        Ok(channel)
    }
}

#[async_trait]
impl SessionOpener for SessionFactory {
    async fn open(&self) -> Result<Arc<dyn RemoteSession>, SessionError> {
        let session = self.open_session().await?;
        Ok(Arc::new(session))
    }

    fn target(&self) -> String {
        format!("{}@{}", self.config.user, self.config.address())
    }
}

/// Credentials ready to hand to russh
enum Credentials {
    Key(Arc<KeyPair>),
    Password(String),
}

impl Credentials {
    fn load(method: AuthMethod) -> Result<Self, SessionError> {
        match method {
            AuthMethod::PublicKey {
                identity_file,
                passphrase,
            } => load_key(&identity_file, passphrase.as_deref()).map(|key| Self::Key(Arc::new(key))),
            AuthMethod::Password(password) => Ok(Self::Password(password)),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Credentials::Key(_) => "public key",
            Credentials::Password(_) => "password",
        }
    }
}

/// Load a private key, decrypting it with `passphrase` if given
fn load_key(path: &Path, passphrase: Option<&str>) -> Result<KeyPair, SessionError> {
    if !path.exists() {
        return Err(SessionError::Auth(format!(
            "private key not found at {}",
            path.display()
        )));
    }

    russh_keys::load_secret_key(path, passphrase).map_err(|e| {
        SessionError::Auth(format!("failed to load key {}: {}", path.display(), e))
    })
}

/// Wait for the server's answer to a want-reply channel request
async fn wait_for_reply(channel: &mut Channel<Msg>) -> Result<(), String> {
    loop {
        match channel.wait().await {
            Some(ChannelMsg::Success) => return Ok(()),
            Some(ChannelMsg::Failure) => return Err("rejected by server".to_string()),
            Some(ChannelMsg::Close) | None => {
                return Err("channel closed before reply".to_string())
            }
            Some(other) => {
                tracing::trace!("Ignoring {:?} while waiting for request reply", other);
            }
        }
    }
}

/// Classify an error from `client::connect`
fn connect_error(address: &str, error: anyhow::Error) -> SessionError {
    match error.downcast::<HostKeyMismatch>() {
        Ok(mismatch) => SessionError::HostKeyRejected {
            expected: mismatch.expected,
            actual: mismatch.actual,
        },
        Err(error) => SessionError::Dial {
            address: address.to_string(),
            message: error.to_string(),
        },
    }
}

/// Best-effort disconnect on an error path
async fn disconnect(handle: &Handle<ClientHandler>) {
    if let Err(e) = handle
        .disconnect(Disconnect::ByApplication, "session setup failed", "en")
        .await
    {
        tracing::debug!("Disconnect after failed setup: {}", e);
    }
}

/// Strip the optional `SHA256:` prefix so both notations compare equal
fn normalize_fingerprint(fingerprint: &str) -> &str {
    let fingerprint = fingerprint.trim();
    fingerprint.strip_prefix("SHA256:").unwrap_or(fingerprint)
}

/// russh client handler: host key verification only
pub struct ClientHandler {
    /// Verification policy for the server's host key
    policy: HostKeyPolicy,
}

impl ClientHandler {
    fn new(policy: HostKeyPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = anyhow::Error;

    /// Verify the server's host key against the configured policy
    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint();

        match &self.policy {
            HostKeyPolicy::AcceptAny => {
                tracing::warn!("Accepting unverified server host key SHA256:{}", fingerprint);
                Ok(true)
            }
            HostKeyPolicy::Fingerprint { fingerprint: expected } => {
                if normalize_fingerprint(expected) == normalize_fingerprint(&fingerprint) {
                    tracing::debug!("Host key verified against configured fingerprint");
                    Ok(true)
                } else {
                    tracing::error!(
                        "Host key mismatch: expected {}, got SHA256:{}",
                        expected,
                        fingerprint
                    );
                    Err(HostKeyMismatch {
                        expected: expected.clone(),
                        actual: format!("SHA256:{}", fingerprint),
                    }
                    .into())
                }
            }
        }
    }
}
