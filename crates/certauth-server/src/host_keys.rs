//! Host key loading.
//!
//! Host keys are private keys in OpenSSH or PKCS#8 form. A key may be paired with a host certificate, which
//! must certify exactly that key.

use russh::keys::{
    self, PrivateKey,
    ssh_key::{Certificate, certificate::CertType},
};

use crate::error::{ServerError, ServerResult};

/// A host key and, optionally, the certificate vouching for it.
#[derive(Clone, Debug)]
pub struct HostKey {
    pub key: PrivateKey,
    /// Validated against `key` but not presented during key exchange; russh only offers plain host keys.
    pub certificate: Option<Certificate>,
}

impl HostKey {
    pub fn new(key: PrivateKey) -> Self {
        Self { key, certificate: None }
    }

    /// Pair `key` with `certificate`, refusing certificates that are not host certificates for this key.
    pub fn with_certificate(key: PrivateKey, certificate: Certificate) -> ServerResult<Self> {
        if certificate.cert_type() != CertType::Host {
            return Err(ServerError::invalid_config("host certificate is not of type host"));
        }
        if certificate.public_key() != key.public_key().key_data() {
            return Err(ServerError::invalid_config("host certificate does not certify the host key"));
        }
        Ok(Self {
            key,
            certificate: Some(certificate),
        })
    }

    pub fn algorithm(&self) -> keys::Algorithm {
        self.key.algorithm()
    }
}

/// Parse an unencrypted private key from PEM bytes.
pub fn parse_private_key(bytes: &[u8]) -> ServerResult<PrivateKey> {
    let text = std::str::from_utf8(bytes).map_err(|_| ServerError::invalid_config("host key is not valid UTF-8"))?;

    if let Ok(key) = PrivateKey::from_openssh(text) {
        return Ok(key);
    }

    match keys::decode_secret_key(text, None) {
        Ok(key) => Ok(key),
        Err(keys::Error::KeyIsEncrypted) => Err(ServerError::invalid_config("encrypted host keys are not supported")),
        Err(err) => Err(err.into()),
    }
}

/// Parse the first certificate record from authorized-key formatted bytes.
pub fn parse_certificate(bytes: &[u8]) -> ServerResult<Certificate> {
    let text = std::str::from_utf8(bytes).map_err(|_| ServerError::invalid_config("certificate is not valid UTF-8"))?;
    let line = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .ok_or_else(|| ServerError::invalid_config("certificate file is empty"))?;

    let is_cert = line
        .split_whitespace()
        .next()
        .is_some_and(|alg| alg.ends_with(certauth_core::presented::CERT_ALGORITHM_SUFFIX));
    if !is_cert {
        return Err(ServerError::invalid_config("record is a public key, not a certificate"));
    }
    Ok(Certificate::from_openssh(line)?)
}
