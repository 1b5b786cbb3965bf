use std::{net::SocketAddr, path::PathBuf};

use certauth_core::{PrincipalPolicy, VerifierConfig};
use certauth_server::{ServerConfig, config::{DEFAULT_BIND, DEFAULT_PORT}};
use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "certauth", about = "Verify SSH client certificates against a pinned user CA")]
pub struct CliArgs {
    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check a certificate file offline, as the server would for a login
    Verify(VerifyArgs),
    /// Print the SHA-256 fingerprint of a public key or certificate file
    Fingerprint {
        /// File holding exactly one key record
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
    /// Run an SSH server whose only login method is client certificate auth
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
pub struct TrustArgs {
    /// User CA public key (authorized-key format)
    #[arg(long, value_name = "FILE")]
    pub ca: PathBuf,
    /// Treat certificates without principals as valid for every user
    #[arg(long, action = ArgAction::SetTrue)]
    pub allow_empty_principals: bool,
    /// Critical option the host enforces itself (repeatable); source-address is always checked against the peer
    #[arg(long = "critical-option", value_name = "NAME")]
    pub critical_options: Vec<String>,
}

impl TrustArgs {
    pub fn to_verifier_config(&self, diagnostics: bool) -> VerifierConfig {
        let principals = if self.allow_empty_principals {
            PrincipalPolicy::AllowEmpty
        } else {
            PrincipalPolicy::RequireListed
        };
        VerifierConfig {
            diagnostics,
            principals,
            supported_critical_options: self.critical_options.clone(),
        }
    }
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub trust: TrustArgs,
    /// Username the client claims
    #[arg(long, value_name = "NAME")]
    pub user: String,
    /// Presented certificate (or public key) file
    #[arg(long, value_name = "FILE")]
    pub cert: PathBuf,
    /// Evaluate at this unix time instead of now
    #[arg(long, value_name = "UNIX_SECS")]
    pub at: Option<u64>,
    /// Peer address to check source-address restrictions against
    #[arg(long, value_name = "IP:PORT")]
    pub from: Option<SocketAddr>,
    /// Do not log the verifier's reasoning
    #[arg(short, long, action = ArgAction::SetTrue)]
    pub quiet: bool,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub trust: TrustArgs,
    /// Host private key (OpenSSH or PKCS#8 PEM)
    #[arg(long, value_name = "FILE")]
    pub host_key: PathBuf,
    /// Host certificate for --host-key (checked against the key; russh offers only the plain key)
    #[arg(long, value_name = "FILE")]
    pub host_cert: Option<PathBuf>,
    /// Address to bind (defaults to 127.0.0.1)
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,
    /// Listening port (defaults to 2222)
    #[arg(short = 'P', long, value_name = "PORT")]
    pub port: Option<u16>,
    /// Log why each certificate was accepted or rejected
    #[arg(long, action = ArgAction::SetTrue)]
    pub diagnostics: bool,
    /// Allow PTY allocation
    #[arg(long, action = ArgAction::SetTrue)]
    pub allow_pty: bool,
}

impl ServeArgs {
    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig {
            bind: self.bind.clone().unwrap_or_else(|| DEFAULT_BIND.to_string()),
            port: self.port.unwrap_or(DEFAULT_PORT),
            ..Default::default()
        }
    }
}
