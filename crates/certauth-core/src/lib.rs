//! Trust-verification core for SSH client-certificate authentication.
//!
//! A [`CertVerifier`] holds one pinned CA public key and decides, per connection attempt, whether the
//! presented credential is a valid user certificate issued by that CA for the claimed user.

pub mod ca;
pub mod checker;
pub mod config;
pub mod context;
pub mod error;
pub mod keys;
pub mod presented;
pub mod verifier;

pub use ca::CaKeyStore;
pub use checker::CertChecker;
pub use config::{PrincipalPolicy, VerifierConfig};
pub use context::ConnectionContext;
pub use error::{CertAuthError, CertAuthResult, CertValidationError, Rejection};
pub use keys::keys_equal;
pub use presented::PresentedKey;
pub use verifier::{CertVerifier, PublicKeyHandler};
