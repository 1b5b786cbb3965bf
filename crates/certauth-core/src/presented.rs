//! The credential a client presents during public-key authentication.
use ssh_key::{Certificate, Fingerprint, PublicKey, public::KeyData};

use crate::keys::fingerprint;

/// Algorithm suffix carried by every OpenSSH certificate type name.
pub const CERT_ALGORITHM_SUFFIX: &str = "-cert-v01@openssh.com";

/// Either a bare public key or an OpenSSH certificate wrapping one.
#[derive(Clone, Debug)]
pub enum PresentedKey {
    Bare(PublicKey),
    Certificate(Box<Certificate>),
}

impl PresentedKey {
    /// Parse a single `<type> <base64> [comment]` line, dispatching on the type name.
    pub fn from_openssh(line: &str) -> Result<Self, ssh_key::Error> {
        let line = line.trim();
        if is_certificate_line(line) {
            Ok(Self::Certificate(Box::new(Certificate::from_openssh(line)?)))
        } else {
            Ok(Self::Bare(PublicKey::from_openssh(line)?))
        }
    }

    /// Wire algorithm name, e.g. `ssh-ed25519` or `ssh-ed25519-cert-v01@openssh.com`.
    pub fn algorithm(&self) -> String {
        match self {
            Self::Bare(key) => key.algorithm().to_string(),
            Self::Certificate(cert) => cert.algorithm().to_certificate_type().to_string(),
        }
    }

    /// The subject key: the bare key itself, or the key a certificate certifies.
    pub fn key_data(&self) -> &KeyData {
        match self {
            Self::Bare(key) => key.key_data(),
            Self::Certificate(cert) => cert.public_key(),
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint(self.key_data())
    }

    pub fn certificate(&self) -> Option<&Certificate> {
        match self {
            Self::Bare(_) => None,
            Self::Certificate(cert) => Some(cert),
        }
    }
}

impl From<PublicKey> for PresentedKey {
    fn from(key: PublicKey) -> Self {
        Self::Bare(key)
    }
}

impl From<Certificate> for PresentedKey {
    fn from(cert: Certificate) -> Self {
        Self::Certificate(Box::new(cert))
    }
}

pub(crate) fn is_certificate_line(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .is_some_and(|alg| alg.ends_with(CERT_ALGORITHM_SUFFIX))
}
