use anyhow::Result;
use certauth_cli::{
    cli::{CliArgs, Command},
    commands, init_tracing,
};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.verbose);

    match &args.cmd {
        Command::Verify(verify) => {
            let outcome = commands::verify(verify)?;
            println!("{outcome}");
            if !outcome.is_accepted() {
                std::process::exit(1);
            }
        }
        Command::Fingerprint { path } => {
            println!("{}", commands::fingerprint(path)?);
        }
        Command::Serve(serve) => commands::serve(serve).await?,
    }
    Ok(())
}
