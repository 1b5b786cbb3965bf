use std::path::PathBuf;

use certauth_core::CertAuthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    #[error("SSH key decode error: {0}")]
    KeyDecode(#[from] russh::keys::Error),

    #[error("SSH Key error: {0}")]
    SshKey(#[from] russh::keys::ssh_key::Error),

    #[error("Trust configuration error: {0}")]
    CertAuth(#[from] CertAuthError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ServerError {
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
