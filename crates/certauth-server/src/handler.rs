//! Per-connection russh handler that hands authentication attempts to the registered callbacks.

use std::{borrow::Cow, net::SocketAddr, sync::Arc};

use certauth_core::{ConnectionContext, PresentedKey, context::display_addr};
use russh::{
    Channel, ChannelId, CryptoVec,
    keys::{PublicKey, ssh_key::Certificate},
    server::{Auth, Msg, Response, Session},
};
use tracing::{debug, error, info, warn};

use crate::options::{KeyboardInteractiveStep, SshServer};

/// Tracks authentication state for a single SSH connection.
pub(crate) struct ConnectionHandler {
    server: Arc<SshServer>,
    peer_addr: Option<SocketAddr>,
    admitted: bool,
    username: Option<String>,
    /// Answers of the keyboard-interactive rounds completed in the current attempt.
    kbd_answers: Vec<Vec<String>>,
}

impl ConnectionHandler {
    /// Runs the server's connection callback; a refused peer is disconnected at its first request.
    pub(crate) fn new(server: Arc<SshServer>, peer_addr: Option<SocketAddr>) -> Self {
        let admitted = server.admits(peer_addr);
        if !admitted {
            info!(peer = %display_addr(peer_addr), "connection refused by callback");
        }
        Self {
            server,
            peer_addr,
            admitted,
            username: None,
            kbd_answers: Vec::new(),
        }
    }

    fn context(&self, user: &str) -> ConnectionContext {
        ConnectionContext::new(user).with_peer(self.peer_addr)
    }

    fn ensure_admitted(&self) -> Result<(), russh::Error> {
        if self.admitted { Ok(()) } else { Err(russh::Error::Disconnect) }
    }

    /// Advance a keyboard-interactive attempt. `answers` is `None` when the client starts a new attempt.
    fn decide_keyboard_interactive(&mut self, user: &str, answers: Option<Vec<String>>) -> Auth {
        let Some(handler) = self.server.keyboard_interactive_handler().cloned() else {
            return Auth::reject();
        };
        match answers {
            Some(round) => self.kbd_answers.push(round),
            None => self.kbd_answers.clear(),
        }

        match handler(&self.context(user), &self.kbd_answers) {
            KeyboardInteractiveStep::Ask {
                name,
                instructions,
                prompts,
            } => Auth::Partial {
                name: Cow::Owned(name),
                instructions: Cow::Owned(instructions),
                prompts: Cow::Owned(prompts.into_iter().map(|(text, echo)| (Cow::Owned(text), echo)).collect()),
            },
            KeyboardInteractiveStep::Accept => {
                self.kbd_answers.clear();
                self.username = Some(user.to_string());
                info!(peer = %display_addr(self.peer_addr), user, "keyboard-interactive authentication accepted");
                Auth::Accept
            }
            KeyboardInteractiveStep::Reject => {
                self.kbd_answers.clear();
                warn!(peer = %display_addr(self.peer_addr), user, "keyboard-interactive authentication rejected");
                Auth::reject()
            }
        }
    }

    /// There is no shell behind this server; tell the client who it is and close the channel.
    fn finish_session(&self, channel: ChannelId, session: &mut Session) -> Result<(), russh::Error> {
        session.channel_success(channel)?;
        let user = self.username.as_deref().unwrap_or_default();
        let mut payload = CryptoVec::new();
        payload.extend(format!("authenticated as {user}; no shell is available\r\n").as_bytes());
        session.data(channel, payload)?;
        session.exit_status_request(channel, 0)?;
        session.eof(channel)?;
        session.close(channel)?;
        debug!(peer = %display_addr(self.peer_addr), user, "session channel closed");
        Ok(())
    }

    /// Run the public-key callback. A credential that could not be converted counts as a rejection.
    fn decide_public_key(&mut self, user: &str, presented: Option<PresentedKey>) -> Auth {
        let Some(handler) = self.server.public_key_handler() else {
            warn!(peer = %display_addr(self.peer_addr), user, "public key authentication attempted but no callback registered");
            return Auth::reject();
        };
        let Some(presented) = presented else {
            return Auth::reject();
        };

        if handler(&self.context(user), &presented) {
            self.username = Some(user.to_string());
            info!(
                peer = %display_addr(self.peer_addr),
                user,
                algorithm = %presented.algorithm(),
                "public key authentication accepted"
            );
            Auth::Accept
        } else {
            warn!(peer = %display_addr(self.peer_addr), user, "public key authentication rejected");
            Auth::reject()
        }
    }
}

fn bare_key(public_key: &PublicKey) -> Option<PresentedKey> {
    let bytes = match public_key.to_bytes() {
        Ok(b) => b,
        Err(e) => {
            error!(error = %e, "failed to encode ssh key");
            return None;
        }
    };
    match ssh_key::PublicKey::from_bytes(&bytes) {
        Ok(key) => Some(PresentedKey::Bare(key)),
        Err(e) => {
            warn!(error = %e, "failed to parse presented public key");
            None
        }
    }
}

fn certificate(certificate: &Certificate) -> Option<PresentedKey> {
    let encoded = match certificate.to_openssh() {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to encode ssh certificate");
            return None;
        }
    };
    match PresentedKey::from_openssh(&encoded) {
        Ok(presented) => Some(presented),
        Err(e) => {
            warn!(error = %e, "failed to parse presented certificate");
            None
        }
    }
}

impl russh::server::Handler for ConnectionHandler {
    type Error = russh::Error;

    async fn auth_none(&mut self, _user: &str) -> Result<Auth, Self::Error> {
        self.ensure_admitted()?;
        Ok(Auth::reject())
    }

    async fn auth_publickey(&mut self, user: &str, public_key: &PublicKey) -> Result<Auth, Self::Error> {
        self.ensure_admitted()?;
        let presented = bare_key(public_key);
        Ok(self.decide_public_key(user, presented))
    }

    async fn auth_openssh_certificate(&mut self, user: &str, cert: &Certificate) -> Result<Auth, Self::Error> {
        self.ensure_admitted()?;
        let presented = certificate(cert);
        Ok(self.decide_public_key(user, presented))
    }

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<Auth, Self::Error> {
        self.ensure_admitted()?;
        let accepted = match self.server.password_handler() {
            Some(handler) => handler(&self.context(user), password),
            None => false,
        };
        if accepted {
            self.username = Some(user.to_string());
            info!(peer = %display_addr(self.peer_addr), user, "password authentication accepted");
            Ok(Auth::Accept)
        } else {
            warn!(peer = %display_addr(self.peer_addr), user, "password authentication rejected");
            Ok(Auth::reject())
        }
    }

    async fn auth_keyboard_interactive(
        &mut self,
        user: &str,
        _submethods: &str,
        response: Option<Response<'_>>,
    ) -> Result<Auth, Self::Error> {
        self.ensure_admitted()?;
        let answers = response.map(|answers| answers.map(|answer| String::from_utf8_lossy(&answer).into_owned()).collect());
        Ok(self.decide_keyboard_interactive(user, answers))
    }

    async fn channel_open_session(&mut self, _channel: Channel<Msg>, _session: &mut Session) -> Result<bool, Self::Error> {
        Ok(self.username.is_some())
    }

    async fn shell_request(&mut self, channel: ChannelId, session: &mut Session) -> Result<(), Self::Error> {
        self.finish_session(channel, session)
    }

    async fn exec_request(&mut self, channel: ChannelId, _data: &[u8], session: &mut Session) -> Result<(), Self::Error> {
        self.finish_session(channel, session)
    }

    async fn pty_request(
        &mut self,
        channel: ChannelId,
        _term: &str,
        _col_width: u32,
        _row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _modes: &[(russh::Pty, u32)],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        if self.server.pty_allowed() {
            session.channel_success(channel)?;
        } else {
            info!(peer = %display_addr(self.peer_addr), "pty request denied");
            session.channel_failure(channel)?;
        }
        Ok(())
    }
}
