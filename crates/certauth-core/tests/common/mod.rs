#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::Result;
use ssh_key::{
    Algorithm, Certificate, PrivateKey,
    certificate::{Builder, CertType},
    rand_core::OsRng,
};

pub fn random_key() -> Result<PrivateKey> {
    Ok(PrivateKey::random(&mut OsRng, Algorithm::Ed25519)?)
}

pub fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}

/// Issue a user certificate for a fresh key, valid from `valid_after` until `valid_before`.
/// An empty `principals` slice produces a certificate valid for all principals.
pub fn issue_user_cert(ca: &PrivateKey, principals: &[&str], valid_after: u64, valid_before: u64) -> Result<Certificate> {
    let subject = random_key()?;
    let mut builder = Builder::new_with_random_nonce(&mut OsRng, subject.public_key().key_data().clone(), valid_after, valid_before)?;
    builder.serial(1)?;
    builder.key_id("test-cert")?;
    builder.cert_type(CertType::User)?;
    if principals.is_empty() {
        builder.all_principals_valid()?;
    }
    for principal in principals {
        builder.valid_principal(*principal)?;
    }
    Ok(builder.sign(ca)?)
}

/// Certificate for `principals` that is valid for the next hour.
pub fn current_cert(ca: &PrivateKey, principals: &[&str]) -> Result<Certificate> {
    let now = now();
    issue_user_cert(ca, principals, now - 60, now + 3600)
}

pub fn write_public_key(dir: &Path, name: &str, key: &PrivateKey) -> Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, format!("{}\n", key.public_key().to_openssh()?))?;
    Ok(path)
}

/// Certificate for `principal`, valid for the next hour, usable only from `source_address`.
pub fn source_restricted_cert(ca: &PrivateKey, principal: &str, source_address: &str) -> Result<Certificate> {
    let now = now();
    let subject = random_key()?;
    let mut builder = Builder::new_with_random_nonce(&mut OsRng, subject.public_key().key_data().clone(), now - 60, now + 3600)?;
    builder.cert_type(CertType::User)?;
    builder.valid_principal(principal)?;
    builder.critical_option("source-address", source_address)?;
    Ok(builder.sign(ca)?)
}
