use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::Result;
use certauth_cli::{
    cli::{CliArgs, Command},
    commands,
};
use certauth_core::PrincipalPolicy;
use clap::Parser;
use ssh_key::{
    Algorithm, HashAlg, PrivateKey,
    certificate::{Builder, CertType},
    rand_core::OsRng,
};

struct Fixture {
    _dir: tempfile::TempDir,
    ca: PathBuf,
    cert: PathBuf,
    ca_key: PrivateKey,
    now: u64,
}

fn write(dir: &Path, name: &str, contents: String) -> Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, contents)?;
    Ok(path)
}

fn fixture(signer_is_ca: bool) -> Result<Fixture> {
    let dir = tempfile::tempdir()?;
    let ca_key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519)?;
    let signer = if signer_is_ca {
        ca_key.clone()
    } else {
        PrivateKey::random(&mut OsRng, Algorithm::Ed25519)?
    };
    let subject = PrivateKey::random(&mut OsRng, Algorithm::Ed25519)?;
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

    let mut builder = Builder::new_with_random_nonce(&mut OsRng, subject.public_key().key_data().clone(), now - 60, now + 3600)?;
    builder.cert_type(CertType::User)?;
    builder.key_id("alice@laptop")?;
    builder.valid_principal("alice")?;
    let cert = builder.sign(&signer)?;

    let ca = write(dir.path(), "user_ca.pub", ca_key.public_key().to_openssh()?)?;
    let cert = write(dir.path(), "id_ed25519-cert.pub", cert.to_openssh()?)?;
    Ok(Fixture {
        _dir: dir,
        ca,
        cert,
        ca_key,
        now,
    })
}

fn verify_args(fx: &Fixture, user: &str, extra: &[&str]) -> Result<CliArgs> {
    let mut argv = vec![
        "certauth".to_string(),
        "verify".to_string(),
        "--ca".to_string(),
        fx.ca.display().to_string(),
        "--cert".to_string(),
        fx.cert.display().to_string(),
        "--user".to_string(),
        user.to_string(),
    ];
    argv.extend(extra.iter().map(|s| s.to_string()));
    Ok(CliArgs::try_parse_from(argv)?)
}

fn run_verify(args: &CliArgs) -> Result<commands::VerifyOutcome> {
    match &args.cmd {
        Command::Verify(verify) => commands::verify(verify),
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn verify_accepts_and_rejects_like_the_server() -> Result<()> {
    let fx = fixture(true)?;

    let outcome = run_verify(&verify_args(&fx, "alice", &[])?)?;
    assert!(outcome.is_accepted(), "{outcome}");

    let outcome = run_verify(&verify_args(&fx, "bob", &[])?)?;
    assert!(!outcome.is_accepted());
    assert!(outcome.to_string().contains("bob"), "{outcome}");

    let later = (fx.now + 7200).to_string();
    let outcome = run_verify(&verify_args(&fx, "alice", &["--at", later.as_str()])?)?;
    assert!(outcome.to_string().contains("expired"), "{outcome}");
    Ok(())
}

#[test]
fn verify_reports_untrusted_ca() -> Result<()> {
    let fx = fixture(false)?;
    let outcome = run_verify(&verify_args(&fx, "alice", &[])?)?;
    let expected = fx.ca_key.public_key().fingerprint(HashAlg::Sha256).to_string();
    assert!(outcome.to_string().contains(&expected), "{outcome}");
    Ok(())
}

#[test]
fn verify_fails_on_unreadable_ca() -> Result<()> {
    let fx = fixture(true)?;
    std::fs::write(&fx.ca, "")?;
    assert!(run_verify(&verify_args(&fx, "alice", &[])?).is_err());
    Ok(())
}

#[test]
fn trust_flags_map_to_verifier_config() -> Result<()> {
    let fx = fixture(true)?;
    let args = verify_args(&fx, "alice", &["--allow-empty-principals", "--critical-option", "force-command"])?;
    let Command::Verify(verify) = &args.cmd else {
        panic!("expected verify");
    };
    let config = verify.trust.to_verifier_config(false);
    assert_eq!(config.principals, PrincipalPolicy::AllowEmpty);
    assert_eq!(config.supported_critical_options, vec!["force-command".to_string()]);
    assert!(!config.diagnostics);
    Ok(())
}

#[test]
fn fingerprint_prints_algorithm_and_digest() -> Result<()> {
    let fx = fixture(true)?;
    let printed = commands::fingerprint(&fx.ca)?;
    let expected = fx.ca_key.public_key().fingerprint(HashAlg::Sha256).to_string();
    assert_eq!(printed, format!("ssh-ed25519 {expected}"));
    Ok(())
}

#[test]
fn serve_args_default_listener() -> Result<()> {
    let args = CliArgs::try_parse_from(["certauth", "serve", "--ca", "ca.pub", "--host-key", "host_key", "-P", "2022"])?;
    let Command::Serve(serve) = &args.cmd else {
        panic!("expected serve");
    };
    let config = serve.to_server_config();
    assert_eq!(config.bind, "127.0.0.1");
    assert_eq!(config.port, 2022);
    assert!(serve.host_cert.is_none());
    assert!(!serve.allow_pty);
    Ok(())
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn verify_logging(args: &CliArgs) -> Result<(commands::VerifyOutcome, String)> {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .finish();
    let outcome = tracing::subscriber::with_default(subscriber, || run_verify(args))?;
    let output = String::from_utf8(logs.0.lock().unwrap().clone())?;
    Ok((outcome, output))
}

#[test]
fn verify_logs_reasoning_unless_quiet() -> Result<()> {
    let fx = fixture(false)?;
    let expected = fx.ca_key.public_key().fingerprint(HashAlg::Sha256).to_string();

    let (outcome, output) = verify_logging(&verify_args(&fx, "alice", &[])?)?;
    assert!(!outcome.is_accepted());
    assert!(output.contains(&expected), "{output}");

    let args = verify_args(&fx, "alice", &["--quiet"])?;
    let Command::Verify(verify) = &args.cmd else {
        panic!("expected verify");
    };
    assert!(verify.quiet);
    let (outcome, output) = verify_logging(&args)?;
    assert!(!outcome.is_accepted());
    assert!(outcome.to_string().contains(&expected), "{outcome}");
    assert!(output.is_empty(), "{output}");
    Ok(())
}

#[test]
fn verify_checks_source_address_against_from() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let ca_key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519)?;
    let subject = PrivateKey::random(&mut OsRng, Algorithm::Ed25519)?;
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let mut builder = Builder::new_with_random_nonce(&mut OsRng, subject.public_key().key_data().clone(), now - 60, now + 3600)?;
    builder.cert_type(CertType::User)?;
    builder.valid_principal("alice")?;
    builder.critical_option("source-address", "192.0.2.0/24")?;
    let cert = builder.sign(&ca_key)?;

    let fx = Fixture {
        ca: write(dir.path(), "user_ca.pub", ca_key.public_key().to_openssh()?)?,
        cert: write(dir.path(), "id_ed25519-cert.pub", cert.to_openssh()?)?,
        _dir: dir,
        ca_key,
        now,
    };

    let outcome = run_verify(&verify_args(&fx, "alice", &["--quiet", "--from", "192.0.2.10:40000"])?)?;
    assert!(outcome.is_accepted(), "{outcome}");

    let outcome = run_verify(&verify_args(&fx, "alice", &["--quiet", "--from", "198.51.100.7:40000"])?)?;
    assert!(outcome.to_string().contains("198.51.100.7"), "{outcome}");

    let outcome = run_verify(&verify_args(&fx, "alice", &["--quiet"])?)?;
    assert!(outcome.to_string().contains("peer address is unknown"), "{outcome}");
    Ok(())
}
