//! Functional options that configure an [`SshServer`].
//!
//! Each option is a closure applied to the server in order; the first failing option aborts construction.

use std::{
    fmt,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use certauth_core::{CertVerifier, ConnectionContext, PublicKeyHandler};
use tracing::debug;

use crate::{
    error::{ServerError, ServerResult},
    host_keys::{HostKey, parse_certificate, parse_private_key},
};

/// Callback for password authentication attempts.
pub type PasswordHandler = Arc<dyn Fn(&ConnectionContext, &str) -> bool + Send + Sync>;

/// One round of a keyboard-interactive exchange, as decided by a [`KeyboardInteractiveHandler`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyboardInteractiveStep {
    /// Send these prompts to the client. Each prompt is `(text, echo)`.
    Ask {
        name: String,
        instructions: String,
        prompts: Vec<(String, bool)>,
    },
    Accept,
    Reject,
}

/// Callback driving keyboard-interactive authentication.
///
/// It receives the answers of every completed round so far, oldest first. The first call of an attempt gets an
/// empty slice.
pub type KeyboardInteractiveHandler =
    Arc<dyn Fn(&ConnectionContext, &[Vec<String>]) -> KeyboardInteractiveStep + Send + Sync>;

/// Called with the peer address as each connection is accepted. Returning false drops the connection before any
/// authentication method is tried.
pub type ConnCallback = Arc<dyn Fn(Option<SocketAddr>) -> bool + Send + Sync>;

/// A single configuration step applied to an [`SshServer`].
pub type ServerOption = Box<dyn FnOnce(&mut SshServer) -> ServerResult<()> + Send>;

/// Server-side authentication and host identity settings handed to the transport.
#[derive(Clone)]
pub struct SshServer {
    pub(crate) public_key_handler: Option<PublicKeyHandler>,
    pub(crate) password_handler: Option<PasswordHandler>,
    pub(crate) keyboard_interactive_handler: Option<KeyboardInteractiveHandler>,
    pub(crate) conn_callback: Option<ConnCallback>,
    pub(crate) host_keys: Vec<HostKey>,
    pub(crate) pty_allowed: bool,
}

impl Default for SshServer {
    fn default() -> Self {
        Self {
            public_key_handler: None,
            password_handler: None,
            keyboard_interactive_handler: None,
            conn_callback: None,
            host_keys: Vec::new(),
            pty_allowed: true,
        }
    }
}

impl fmt::Debug for SshServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshServer")
            .field("public_key_handler", &self.public_key_handler.is_some())
            .field("password_handler", &self.password_handler.is_some())
            .field("keyboard_interactive_handler", &self.keyboard_interactive_handler.is_some())
            .field("conn_callback", &self.conn_callback.is_some())
            .field("host_keys", &self.host_keys.len())
            .field("pty_allowed", &self.pty_allowed)
            .finish()
    }
}

impl SshServer {
    /// Build a server by applying `options` in order.
    pub fn new(options: impl IntoIterator<Item = ServerOption>) -> ServerResult<Self> {
        let mut server = Self::default();
        for option in options {
            server.set_option(option)?;
        }
        Ok(server)
    }

    pub fn set_option(&mut self, option: ServerOption) -> ServerResult<()> {
        option(self)
    }

    /// Add a host key, replacing any existing key with the same algorithm.
    pub fn add_host_key(&mut self, host_key: HostKey) {
        let algorithm = host_key.algorithm();
        self.host_keys.retain(|existing| existing.algorithm() != algorithm);
        debug!(%algorithm, certified = host_key.certificate.is_some(), "host key added");
        self.host_keys.push(host_key);
    }

    pub fn host_keys(&self) -> &[HostKey] {
        &self.host_keys
    }

    pub fn public_key_handler(&self) -> Option<&PublicKeyHandler> {
        self.public_key_handler.as_ref()
    }

    pub fn password_handler(&self) -> Option<&PasswordHandler> {
        self.password_handler.as_ref()
    }

    pub fn keyboard_interactive_handler(&self) -> Option<&KeyboardInteractiveHandler> {
        self.keyboard_interactive_handler.as_ref()
    }

    /// Whether a connection from `peer` may proceed. Always true without a [`conn_callback`].
    pub fn admits(&self, peer: Option<SocketAddr>) -> bool {
        self.conn_callback.as_ref().is_none_or(|callback| callback(peer))
    }

    pub fn pty_allowed(&self) -> bool {
        self.pty_allowed
    }
}

/// Register the public-key authentication callback.
pub fn public_key_auth(handler: PublicKeyHandler) -> ServerOption {
    Box::new(move |server| {
        server.public_key_handler = Some(handler);
        Ok(())
    })
}

/// Register `verifier` as the public-key callback, so only CA-issued user certificates authenticate.
pub fn client_cert_auth(verifier: Arc<CertVerifier>) -> ServerOption {
    public_key_auth(verifier.into_handler())
}

pub fn password_auth(handler: PasswordHandler) -> ServerOption {
    Box::new(move |server| {
        server.password_handler = Some(handler);
        Ok(())
    })
}

pub fn keyboard_interactive_auth(handler: KeyboardInteractiveHandler) -> ServerOption {
    Box::new(move |server| {
        server.keyboard_interactive_handler = Some(handler);
        Ok(())
    })
}

/// Register a callback that can refuse connections by peer address.
pub fn conn_callback(callback: ConnCallback) -> ServerOption {
    Box::new(move |server| {
        server.conn_callback = Some(callback);
        Ok(())
    })
}

/// Add a host key read from a PEM file.
pub fn host_key_file(path: impl Into<PathBuf>) -> ServerOption {
    let path = path.into();
    Box::new(move |server| {
        let pem = read_file(&path)?;
        server.add_host_key(HostKey::new(parse_private_key(&pem)?));
        Ok(())
    })
}

/// Add a host key from in-memory PEM bytes.
pub fn host_key_pem(bytes: impl Into<Vec<u8>>) -> ServerOption {
    let bytes = bytes.into();
    Box::new(move |server| {
        server.add_host_key(HostKey::new(parse_private_key(&bytes)?));
        Ok(())
    })
}

/// Add a host key read from `key_path`, certified by the host certificate in `cert_path`.
///
/// The certificate is checked against the key and kept on the [`HostKey`], but the russh transport only offers the
/// plain host key during key exchange. Clients that require a CA-signed host key will not see the certificate.
pub fn host_key_file_with_cert(key_path: impl Into<PathBuf>, cert_path: impl Into<PathBuf>) -> ServerOption {
    let key_path = key_path.into();
    let cert_path = cert_path.into();
    Box::new(move |server| {
        let pem = read_file(&key_path)?;
        let cert = read_file(&cert_path)?;
        add_certified_host_key(server, &pem, &cert)
    })
}

/// Same as [`host_key_file_with_cert`] with both inputs already in memory, and with the same transport limitation.
pub fn host_key_with_cert_from_raw(raw_key: impl Into<Vec<u8>>, raw_cert: impl Into<Vec<u8>>) -> ServerOption {
    let raw_key = raw_key.into();
    let raw_cert = raw_cert.into();
    Box::new(move |server| add_certified_host_key(server, &raw_key, &raw_cert))
}

/// Deny every PTY request.
pub fn no_pty() -> ServerOption {
    Box::new(|server| {
        server.pty_allowed = false;
        Ok(())
    })
}

fn add_certified_host_key(server: &mut SshServer, pem: &[u8], cert: &[u8]) -> ServerResult<()> {
    let key = parse_private_key(pem)?;
    let cert = parse_certificate(cert)?;
    server.add_host_key(HostKey::with_certificate(key, cert)?);
    Ok(())
}

fn read_file(path: &Path) -> ServerResult<Vec<u8>> {
    std::fs::read(path).map_err(|source| ServerError::read_file(path, source))
}
