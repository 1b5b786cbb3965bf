//! The accept/reject decision registered as the server's public-key callback.

use std::{
    path::Path,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use ssh_key::PublicKey;
use tracing::{debug, error, info, warn};

use crate::{
    ca::CaKeyStore,
    checker::CertChecker,
    config::VerifierConfig,
    context::{ConnectionContext, display_addr},
    error::{CertAuthResult, Rejection},
    keys::{fingerprint, keys_equal},
    presented::PresentedKey,
};

/// Callback shape the server invokes once per public-key authentication attempt.
pub type PublicKeyHandler = Arc<dyn Fn(&ConnectionContext, &PresentedKey) -> bool + Send + Sync>;

/// Client certificate verifier pinned to a single CA key.
///
/// The decision path only reads a snapshot of the CA key, so one instance can be shared across every
/// connection task.
#[derive(Debug, Default)]
pub struct CertVerifier {
    ca: CaKeyStore,
    checker: CertChecker,
    diagnostics: bool,
}

impl CertVerifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self {
            ca: CaKeyStore::new(),
            checker: CertChecker::new(&config),
            diagnostics: config.diagnostics,
        }
    }

    /// Load the CA key from an authorized-key file. See [`CaKeyStore::load_from_file`].
    pub fn load_ca_file(&self, path: impl AsRef<Path>) -> CertAuthResult<()> {
        self.ca.load_from_file(path)?;
        if self.diagnostics {
            info!(fingerprint = %display_fingerprint(&self.ca), "user CA key loaded");
        }
        Ok(())
    }

    pub fn set_ca_key(&self, key: PublicKey) {
        self.ca.set(key);
    }

    pub fn ca(&self) -> &CaKeyStore {
        &self.ca
    }

    /// Decide whether `key` authenticates `ctx.user()` at the current wall-clock time.
    pub fn check_client_cert(&self, ctx: &ConnectionContext, key: &PresentedKey) -> bool {
        self.check_client_cert_at(ctx, key, unix_now())
    }

    /// Same as [`Self::check_client_cert`] with an explicit unix timestamp.
    pub fn check_client_cert_at(&self, ctx: &ConnectionContext, key: &PresentedKey, now: u64) -> bool {
        let outcome = self.evaluate(ctx, key, now);
        if self.diagnostics {
            log_outcome(ctx, key, &outcome);
        }
        outcome.is_ok()
    }

    /// The decision itself, with the reason for a rejection. Never logs.
    pub fn evaluate(&self, ctx: &ConnectionContext, key: &PresentedKey, now: u64) -> Result<(), Rejection> {
        let PresentedKey::Certificate(cert) = key else {
            return Err(Rejection::NotACertificate {
                algorithm: key.algorithm(),
            });
        };

        let ca = self.ca.snapshot().ok_or(Rejection::NoTrustAnchor)?;

        self.checker.check_cert(ctx, cert, now)?;

        if !keys_equal(ca.key_data(), cert.signature_key()) {
            return Err(Rejection::UntrustedCa {
                expected: fingerprint(ca.key_data()),
                actual: fingerprint(cert.signature_key()),
            });
        }

        Ok(())
    }

    /// Wrap a shared verifier as a server callback.
    pub fn into_handler(self: Arc<Self>) -> PublicKeyHandler {
        Arc::new(move |ctx: &ConnectionContext, key: &PresentedKey| self.check_client_cert(ctx, key))
    }
}

fn log_outcome(ctx: &ConnectionContext, key: &PresentedKey, outcome: &Result<(), Rejection>) {
    let peer = display_addr(ctx.peer_addr());
    let user = ctx.user();
    match outcome {
        Ok(()) => {
            let key_id = key.certificate().map(|c| c.key_id()).unwrap_or_default();
            debug!(peer = %peer, user = %user, key_id = %key_id, "client certificate accepted");
        }
        Err(Rejection::NoTrustAnchor) => {
            error!(peer = %peer, user = %user, "no CA key configured; rejecting client certificate");
        }
        Err(Rejection::NotACertificate { algorithm }) => {
            warn!(peer = %peer, user = %user, "got {algorithm}, want certificate");
        }
        Err(Rejection::Invalid(err)) => {
            warn!(peer = %peer, user = %user, key = %key.fingerprint(), "certificate check failed: {err}");
        }
        Err(Rejection::UntrustedCa { expected, actual }) => {
            warn!(peer = %peer, user = %user, "expected CA {expected}, certificate signed by {actual}");
        }
    }
}

fn display_fingerprint(ca: &CaKeyStore) -> String {
    ca.fingerprint().map(|fp| fp.to_string()).unwrap_or_else(|| "<none>".into())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
