//! Listener startup.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use russh::{
    MethodKind, MethodSet,
    server::{self as ssh_server, Server},
};
use tracing::{info, warn};

use crate::{
    config::ServerConfig,
    error::{ServerError, ServerResult},
    handler::ConnectionHandler,
    options::SshServer,
};

/// Factory invoked by russh whenever a client connects.
struct ServerManager {
    server: Arc<SshServer>,
}

impl ssh_server::Server for ServerManager {
    type Handler = ConnectionHandler;

    fn new_client(&mut self, addr: Option<SocketAddr>) -> Self::Handler {
        info!(peer = %certauth_core::context::display_addr(addr), "client connected");
        ConnectionHandler::new(Arc::clone(&self.server), addr)
    }

    fn handle_session_error(&mut self, error: <Self::Handler as ssh_server::Handler>::Error) {
        warn!(?error, "server session ended with error");
    }
}

/// Translate an [`SshServer`] into russh configuration.
///
/// Only the methods that have a registered callback are offered. A server without host keys or without any
/// callback is refused so it can never run unauthenticated.
pub fn build_russh_config(server: &SshServer, config: &ServerConfig) -> ServerResult<ssh_server::Config> {
    if server.host_keys().is_empty() {
        return Err(ServerError::invalid_config("no host keys configured"));
    }
    if server.public_key_handler().is_none()
        && server.password_handler().is_none()
        && server.keyboard_interactive_handler().is_none()
    {
        return Err(ServerError::invalid_config("no authentication callback registered"));
    }

    let mut methods = MethodSet::empty();
    if server.public_key_handler().is_some() {
        methods.push(MethodKind::PublicKey);
    }
    if server.password_handler().is_some() {
        methods.push(MethodKind::Password);
    }
    if server.keyboard_interactive_handler().is_some() {
        methods.push(MethodKind::KeyboardInteractive);
    }

    let mut ssh_config = ssh_server::Config {
        auth_rejection_time: config.auth_rejection_time(),
        auth_rejection_time_initial: Some(Duration::from_millis(0)),
        nodelay: true,
        ..Default::default()
    };
    ssh_config.methods = methods;
    ssh_config.keys = server.host_keys().iter().map(|host_key| host_key.key.clone()).collect();
    Ok(ssh_config)
}

/// Listen on `config.bind:config.port` until the listener fails.
pub async fn run_ssh_server(server: SshServer, config: ServerConfig) -> ServerResult<()> {
    let ssh_config = build_russh_config(&server, &config)?;
    let mut manager = ServerManager { server: Arc::new(server) };

    info!(bind = %config.bind, port = config.port, "starting SSH server");
    manager
        .run_on_address(Arc::new(ssh_config), (config.bind.as_str(), config.port))
        .await?;
    Ok(())
}
