//! Structural checks on a user certificate.
//!
//! This mirrors what a standard OpenSSH certificate checker does before any trust decision: certificate type,
//! critical options, principal, validity window and the signature under the embedded signing key. Which CA
//! signed the certificate is not looked at here; that is the verifier's pinning step.
//!
//! `source-address` is always enforced against the peer address, whether or not it is listed as supported.

use std::net::{IpAddr, SocketAddr};

use ipnetwork::IpNetwork;
use ssh_key::{Certificate, certificate::CertType};

use crate::{
    config::{PrincipalPolicy, VerifierConfig},
    context::ConnectionContext,
    error::CertValidationError,
    keys::fingerprint,
};

/// Critical option restricting the addresses a certificate may be used from.
pub const SOURCE_ADDRESS: &str = "source-address";

#[derive(Clone, Debug, Default)]
pub struct CertChecker {
    principals: PrincipalPolicy,
    supported_critical_options: Vec<String>,
}

impl CertChecker {
    pub fn new(config: &VerifierConfig) -> Self {
        Self {
            principals: config.principals,
            supported_critical_options: config.supported_critical_options.clone(),
        }
    }

    /// Check that `cert` is usable by `ctx.user()`, connecting from `ctx.peer_addr()`, at unix time `now`.
    pub fn check_cert(&self, ctx: &ConnectionContext, cert: &Certificate, now: u64) -> Result<(), CertValidationError> {
        if cert.cert_type() != CertType::User {
            return Err(CertValidationError::WrongCertType(cert.cert_type()));
        }

        for (name, value) in cert.critical_options().iter() {
            if name == SOURCE_ADDRESS {
                check_source_address(value, ctx.peer_addr())?;
            } else if !self.supported_critical_options.iter().any(|s| s == name) {
                return Err(CertValidationError::UnsupportedCriticalOption(name.clone()));
            }
        }

        self.check_principal(ctx.user(), cert.valid_principals())?;
        check_window(cert.valid_after(), cert.valid_before(), now)?;

        // Trust the certificate's own signing key for this step so only the signature is being judged.
        let signer = fingerprint(cert.signature_key());
        cert.validate_at(now, [&signer])
            .map_err(CertValidationError::BadSignature)
    }

    fn check_principal(&self, principal: &str, listed: &[String]) -> Result<(), CertValidationError> {
        if listed.is_empty() {
            return match self.principals {
                PrincipalPolicy::AllowEmpty => Ok(()),
                PrincipalPolicy::RequireListed => Err(CertValidationError::NoPrincipals),
            };
        }
        if listed.iter().any(|p| p == principal) {
            Ok(())
        } else {
            Err(CertValidationError::PrincipalNotListed {
                principal: principal.to_string(),
            })
        }
    }
}

/// `value` is a comma-separated list of addresses and CIDR blocks; the peer must fall inside one of them.
fn check_source_address(value: &str, peer: Option<SocketAddr>) -> Result<(), CertValidationError> {
    let addr = peer.ok_or(CertValidationError::SourceAddressUnknown)?.ip().to_canonical();
    let malformed = || CertValidationError::InvalidSourceAddress {
        value: value.to_string(),
    };

    for entry in value.split(',').map(str::trim) {
        let permitted = if entry.contains('/') {
            entry.parse::<IpNetwork>().map_err(|_| malformed())?.contains(addr)
        } else {
            entry.parse::<IpAddr>().map_err(|_| malformed())? == addr
        };
        if permitted {
            return Ok(());
        }
    }
    Err(CertValidationError::SourceAddressNotPermitted { addr })
}

/// `valid_after <= now < valid_before`
fn check_window(valid_after: u64, valid_before: u64, now: u64) -> Result<(), CertValidationError> {
    if now < valid_after {
        return Err(CertValidationError::NotYetValid { valid_after, now });
    }
    if now >= valid_before {
        return Err(CertValidationError::Expired { valid_before, now });
    }
    Ok(())
}
