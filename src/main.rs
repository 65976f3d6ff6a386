// Entrypoint for the CLI application.
// - Loads `.env`, sets up logging, parses arguments and runs the mode.
// - Exits non-zero when any file failed or was left unfinished.

use alist_upload::cli::Cli;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the variables may come from the shell.
    if dotenvy::dotenv().is_err() {
        eprintln!("No .env file found.");
    }

    let cli = Cli::parse();

    let default_level = match cli.global.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .with_target(false)
        .init();

    let report = alist_upload::ui::run(cli)?;
    if !report.is_success() {
        anyhow::bail!(
            "{} file(s) failed, {} unfinished",
            report.failed(),
            report.pending.len()
        );
    }
    Ok(())
}
