//! Subcommand implementations.

use std::{
    path::Path,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, Result, anyhow};
use certauth_core::{CertVerifier, ConnectionContext, PresentedKey, ca::parse_single_record};
use certauth_server::{SshServer, client_cert_auth, host_key_file, host_key_file_with_cert, no_pty, run_ssh_server};
use ssh_key::HashAlg;
use tracing::info;

use crate::cli::{ServeArgs, VerifyArgs};

/// Result of an offline verification, printed by the binary.
#[derive(Debug)]
pub enum VerifyOutcome {
    Accepted,
    Rejected(String),
}

impl VerifyOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

impl std::fmt::Display for VerifyOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accepted => write!(f, "accepted"),
            Self::Rejected(reason) => write!(f, "rejected: {reason}"),
        }
    }
}

pub fn verify(args: &VerifyArgs) -> Result<VerifyOutcome> {
    let verifier = CertVerifier::new(args.trust.to_verifier_config(!args.quiet));
    verifier
        .load_ca_file(&args.trust.ca)
        .with_context(|| format!("loading CA key from {}", args.trust.ca.display()))?;

    let presented = read_presented_key(&args.cert)?;
    let now = args.at.unwrap_or_else(unix_now);
    let ctx = ConnectionContext::new(args.user.clone()).with_peer(args.from);

    if verifier.check_client_cert_at(&ctx, &presented, now) {
        return Ok(VerifyOutcome::Accepted);
    }
    // Same inputs, so this only recovers the reason for printing.
    let reason = verifier
        .evaluate(&ctx, &presented, now)
        .err()
        .map(|rejection| rejection.to_string())
        .unwrap_or_default();
    Ok(VerifyOutcome::Rejected(reason))
}

/// `<algorithm> <fingerprint>` for the single record in `path`.
pub fn fingerprint(path: &Path) -> Result<String> {
    let contents = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let key = parse_single_record(&contents)?;
    Ok(format!("{} {}", key.algorithm(), key.fingerprint(HashAlg::Sha256)))
}

pub async fn serve(args: &ServeArgs) -> Result<()> {
    let verifier = Arc::new(CertVerifier::new(args.trust.to_verifier_config(args.diagnostics)));
    verifier
        .load_ca_file(&args.trust.ca)
        .with_context(|| format!("loading CA key from {}", args.trust.ca.display()))?;
    if let Some(fp) = verifier.ca().fingerprint() {
        info!(fingerprint = %fp, "trusting user CA");
    }

    let host_key = match &args.host_cert {
        Some(cert) => host_key_file_with_cert(&args.host_key, cert),
        None => host_key_file(&args.host_key),
    };
    let mut options = vec![host_key, client_cert_auth(verifier)];
    if !args.allow_pty {
        options.push(no_pty());
    }
    let server = SshServer::new(options)?;

    run_ssh_server(server, args.to_server_config()).await?;
    Ok(())
}

fn read_presented_key(path: &Path) -> Result<PresentedKey> {
    let contents = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let line = contents
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .ok_or_else(|| anyhow!("{} holds no key record", path.display()))?;
    PresentedKey::from_openssh(line).with_context(|| format!("parsing {}", path.display()))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
