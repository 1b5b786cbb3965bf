//! Key identity helpers.
use ssh_key::{Fingerprint, HashAlg, PublicKey, public::KeyData};

/// Exact key equality over the canonical wire encoding of both keys.
///
/// Fingerprints are never used here; they exist for logs only. A key that cannot be encoded is equal to nothing.
pub fn keys_equal(a: &KeyData, b: &KeyData) -> bool {
    match (encode(a), encode(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// SHA-256 fingerprint used in diagnostics.
pub fn fingerprint(key: &KeyData) -> Fingerprint {
    key.fingerprint(HashAlg::Sha256)
}

fn encode(key: &KeyData) -> Option<Vec<u8>> {
    PublicKey::from(key.clone()).to_bytes().ok()
}

#[cfg(test)]
mod tests {
    use ssh_key::{Algorithm, PrivateKey, rand_core::OsRng};

    use super::*;

    #[test]
    fn same_key_material_is_equal_regardless_of_comment() {
        let key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519).unwrap();
        let mut a = key.public_key().clone();
        let b = key.public_key().clone();
        a.set_comment("laptop");
        assert!(keys_equal(a.key_data(), b.key_data()));
    }

    #[test]
    fn different_keys_are_not_equal() {
        let a = PrivateKey::random(&mut OsRng, Algorithm::Ed25519).unwrap();
        let b = PrivateKey::random(&mut OsRng, Algorithm::Ed25519).unwrap();
        assert!(!keys_equal(a.public_key().key_data(), b.public_key().key_data()));
    }

    #[test]
    fn fingerprint_uses_sha256() {
        let key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519).unwrap();
        let fp = fingerprint(key.public_key().key_data());
        assert!(fp.to_string().starts_with("SHA256:"));
    }
}
