//! russh server plumbing around the client-certificate verifier.
//!
//! An [`SshServer`] is assembled from [`ServerOption`]s. The option this workspace exists for is
//! [`client_cert_auth`], which registers a [`certauth_core::CertVerifier`] as the public-key callback.

pub mod config;
pub mod error;
mod handler;
pub mod host_keys;
pub mod options;
mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use options::{
    ConnCallback, KeyboardInteractiveHandler, KeyboardInteractiveStep, PasswordHandler, ServerOption, SshServer,
    client_cert_auth, conn_callback, host_key_file, host_key_file_with_cert, host_key_pem, host_key_with_cert_from_raw,
    keyboard_interactive_auth, no_pty, password_auth, public_key_auth,
};
pub use server::{build_russh_config, run_ssh_server};
