use std::{net::IpAddr, path::PathBuf};

use ssh_key::{Fingerprint, certificate::CertType};
use thiserror::Error;

/// Errors raised while configuring the trust anchor. These are the only errors that propagate to callers;
/// everything that happens per connection is folded into a [`Rejection`].
#[derive(Error, Debug)]
pub enum CertAuthError {
    /// CA key file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record is neither a public key nor a certificate
    #[error("line {line}: not a valid public key or certificate record: {source}")]
    Parse {
        line: usize,
        #[source]
        source: ssh_key::Error,
    },

    /// Input holds no key record at all
    #[error("no public key record found")]
    NoKeyRecord,

    /// Input holds more than one key record
    #[error("expected exactly one public key record, found {count}")]
    AmbiguousKeyRecords { count: usize },

    /// SSH key encoding error
    #[error("SSH key error: {0}")]
    SshKey(#[from] ssh_key::Error),
}

/// Result type alias for trust configuration
pub type CertAuthResult<T> = Result<T, CertAuthError>;

impl CertAuthError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Structural certificate failures, independent of which CA signed the certificate.
#[derive(Error, Debug)]
pub enum CertValidationError {
    #[error("certificate is not yet valid (valid after {valid_after}, now {now})")]
    NotYetValid { valid_after: u64, now: u64 },

    #[error("certificate has expired (valid before {valid_before}, now {now})")]
    Expired { valid_before: u64, now: u64 },

    #[error("certificate type is {0:?}, want User")]
    WrongCertType(CertType),

    #[error("principal {principal:?} not in the set of valid principals")]
    PrincipalNotListed { principal: String },

    #[error("certificate lists no principals")]
    NoPrincipals,

    #[error("unsupported critical option {0:?}")]
    UnsupportedCriticalOption(String),

    #[error("certificate is restricted by source-address but the peer address is unknown")]
    SourceAddressUnknown,

    #[error("source address {addr} is not permitted by the certificate")]
    SourceAddressNotPermitted { addr: IpAddr },

    #[error("malformed source-address option {value:?}")]
    InvalidSourceAddress { value: String },

    #[error("signature does not verify: {0}")]
    BadSignature(#[source] ssh_key::Error),
}

/// Why a presented credential was refused. Never shown to the client.
#[derive(Error, Debug)]
pub enum Rejection {
    #[error("no CA key configured")]
    NoTrustAnchor,

    #[error("got {algorithm}, want certificate")]
    NotACertificate { algorithm: String },

    #[error("certificate check failed: {0}")]
    Invalid(#[from] CertValidationError),

    #[error("expected CA {expected}, certificate signed by {actual}")]
    UntrustedCa { expected: Fingerprint, actual: Fingerprint },
}
