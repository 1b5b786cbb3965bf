//! Verifier configuration.
use serde::{Deserialize, Serialize};

/// How to treat a certificate whose principal list is empty.
///
/// OpenSSH-style checkers read an empty list as "valid for any principal". That is a frequent source of
/// privilege escalation, so the default here refuses such certificates and the permissive reading has to be
/// opted into.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalPolicy {
    /// The claimed user must appear in a non-empty principal list.
    #[default]
    RequireListed,
    /// An empty principal list matches every user.
    AllowEmpty,
}

/// Settings injected into a [`crate::CertVerifier`] at construction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Emit diagnostic log records for accept/reject decisions. When false the verifier logs nothing.
    #[serde(default)]
    pub diagnostics: bool,
    /// Empty principal list handling.
    #[serde(default)]
    pub principals: PrincipalPolicy,
    /// Critical options the host knows how to enforce. Certificates carrying any other critical option are refused.
    #[serde(default)]
    pub supported_critical_options: Vec<String>,
}

impl VerifierConfig {
    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    pub fn with_principal_policy(mut self, policy: PrincipalPolicy) -> Self {
        self.principals = policy;
        self
    }
}
