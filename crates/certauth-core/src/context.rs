use std::net::SocketAddr;

/// Per-attempt authentication context handed to the decision function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionContext {
    user: String,
    peer_addr: Option<SocketAddr>,
}

impl ConnectionContext {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            peer_addr: None,
        }
    }

    pub fn with_peer(mut self, peer_addr: Option<SocketAddr>) -> Self {
        self.peer_addr = peer_addr;
        self
    }

    /// Username the client is trying to authenticate as.
    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }
}

/// Display helper used for tracing; keeps logging concise when the socket address is unavailable.
pub fn display_addr(addr: Option<SocketAddr>) -> String {
    addr.map(|a| a.to_string()).unwrap_or_else(|| "<unknown>".into())
}
