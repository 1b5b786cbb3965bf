//! The pinned certificate-authority key.
//!
//! Exactly one CA public key is trusted at a time. The key is stored behind an `Arc` and swapped whole, so a
//! verification running concurrently with a rotation sees either the old key or the new one.

use std::{
    path::Path,
    sync::{Arc, PoisonError, RwLock},
};

use ssh_key::{Fingerprint, PublicKey, authorized_keys::Entry};

use crate::{
    error::{CertAuthError, CertAuthResult},
    keys::fingerprint,
    presented::PresentedKey,
};

#[derive(Debug, Default)]
pub struct CaKeyStore {
    key: RwLock<Option<Arc<PublicKey>>>,
}

impl CaKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `path` and install the single key record it contains, replacing any previous CA key.
    ///
    /// The stored key is left untouched when reading or parsing fails.
    pub fn load_from_file(&self, path: impl AsRef<Path>) -> CertAuthResult<()> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| CertAuthError::io(path, source))?;
        self.load_from_str(&contents)
    }

    pub fn load_from_str(&self, contents: &str) -> CertAuthResult<()> {
        let key = parse_single_record(contents)?;
        self.set(key);
        Ok(())
    }

    /// Install `key` as the trust anchor.
    pub fn set(&self, key: PublicKey) {
        let key = Arc::new(key);
        *self.key.write().unwrap_or_else(PoisonError::into_inner) = Some(key);
    }

    /// Consistent view of the current CA key, or `None` when nothing has been configured.
    pub fn snapshot(&self) -> Option<Arc<PublicKey>> {
        self.key.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_configured(&self) -> bool {
        self.snapshot().is_some()
    }

    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.snapshot().map(|key| fingerprint(key.key_data()))
    }
}

/// Parse authorized-key text holding exactly one record.
///
/// Blank lines and `#` comments are skipped. A certificate record yields the key it certifies. Zero or several
/// records are refused rather than guessing which one was meant.
pub fn parse_single_record(contents: &str) -> CertAuthResult<PublicKey> {
    let mut found = Vec::new();
    for (idx, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let key = parse_record(line).map_err(|source| CertAuthError::Parse { line: idx + 1, source })?;
        found.push(key);
    }

    match found.len() {
        0 => Err(CertAuthError::NoKeyRecord),
        1 => found.pop().ok_or(CertAuthError::NoKeyRecord),
        count => Err(CertAuthError::AmbiguousKeyRecords { count }),
    }
}

fn parse_record(line: &str) -> Result<PublicKey, ssh_key::Error> {
    match PresentedKey::from_openssh(line) {
        Ok(PresentedKey::Bare(key)) => return Ok(key),
        Ok(PresentedKey::Certificate(cert)) => return Ok(PublicKey::new(cert.public_key().clone(), cert.comment())),
        Err(_) => {}
    }
    // authorized_keys syntax may prefix options such as `cert-authority`
    Ok(line.parse::<Entry>()?.public_key().clone())
}

#[cfg(test)]
mod tests {
    use ssh_key::{Algorithm, PrivateKey, certificate, rand_core::OsRng};

    use super::*;
    use crate::keys::keys_equal;

    fn random_key() -> PrivateKey {
        PrivateKey::random(&mut OsRng, Algorithm::Ed25519).unwrap()
    }

    #[test]
    fn parses_single_record_with_comments_and_blank_lines() {
        let key = random_key();
        let text = format!("# user CA\n\n{}\n", key.public_key().to_openssh().unwrap());
        let parsed = parse_single_record(&text).unwrap();
        assert!(keys_equal(parsed.key_data(), key.public_key().key_data()));
    }

    #[test]
    fn accepts_cert_authority_option_prefix() {
        let key = random_key();
        let text = format!("cert-authority {}", key.public_key().to_openssh().unwrap());
        let parsed = parse_single_record(&text).unwrap();
        assert!(keys_equal(parsed.key_data(), key.public_key().key_data()));
    }

    #[test]
    fn certificate_record_yields_inner_key() {
        let signer = random_key();
        let subject = random_key();
        let mut builder =
            certificate::Builder::new_with_random_nonce(&mut OsRng, subject.public_key().key_data().clone(), 0, u32::MAX as u64).unwrap();
        builder.all_principals_valid().unwrap();
        let cert = builder.sign(&signer).unwrap();

        let parsed = parse_single_record(&cert.to_openssh().unwrap()).unwrap();
        assert!(keys_equal(parsed.key_data(), subject.public_key().key_data()));
        assert!(!keys_equal(parsed.key_data(), signer.public_key().key_data()));
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(parse_single_record("# nothing here\n\n"), Err(CertAuthError::NoKeyRecord)));
    }

    #[test]
    fn rejects_multiple_records() {
        let a = random_key().public_key().to_openssh().unwrap();
        let b = random_key().public_key().to_openssh().unwrap();
        let err = parse_single_record(&format!("{a}\n{b}\n")).unwrap_err();
        assert!(matches!(err, CertAuthError::AmbiguousKeyRecords { count: 2 }));
    }

    #[test]
    fn reports_line_of_garbage_record() {
        let err = parse_single_record("# header\nssh-ed25519 not-base64!!\n").unwrap_err();
        assert!(matches!(err, CertAuthError::Parse { line: 2, .. }));
    }

    #[test]
    fn failed_load_keeps_previous_key() {
        let store = CaKeyStore::new();
        let key = random_key();
        store.set(key.public_key().clone());

        assert!(store.load_from_str("garbage").is_err());
        let current = store.snapshot().unwrap();
        assert!(keys_equal(current.key_data(), key.public_key().key_data()));
    }

    #[test]
    fn set_replaces_key_and_snapshot_survives_rotation() {
        let store = CaKeyStore::new();
        assert!(!store.is_configured());
        assert!(store.fingerprint().is_none());

        let first = random_key();
        let second = random_key();
        store.set(first.public_key().clone());
        let before = store.snapshot().unwrap();
        store.set(second.public_key().clone());

        assert!(keys_equal(before.key_data(), first.public_key().key_data()));
        assert!(keys_equal(store.snapshot().unwrap().key_data(), second.public_key().key_data()));
        assert_eq!(store.fingerprint(), Some(second.public_key().fingerprint(ssh_key::HashAlg::Sha256)));
    }
}
