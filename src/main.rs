//! scriptgate CLI
//!
//! `scriptgate serve` reads one JSON API request per line on stdin and
//! writes one JSON response per line on stdout. Designed to sit behind a
//! transport that has already verified identity assertions.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use scriptgate::{ApiHandler, ServiceConfig};

#[derive(Parser)]
#[command(name = "scriptgate")]
#[command(about = "Sealed script artifact registry and delivery gate", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve API requests over stdin/stdout
    Serve {
        /// Path to a TOML config file
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Run with the fixed development secret. Tags produced in this
        /// mode prove nothing; never use in production.
        #[arg(long)]
        insecure_dev: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            insecure_dev,
        } => {
            let mut config = match config {
                Some(path) => match ServiceConfig::load(&path) {
                    Ok(config) => config,
                    Err(e) => {
                        eprintln!("scriptgate: {}", e);
                        return ExitCode::FAILURE;
                    }
                },
                None => ServiceConfig::default(),
            };
            config.apply_env();

            let sealer = match config.sealer(insecure_dev) {
                Ok(sealer) => sealer,
                Err(e) => {
                    eprintln!("scriptgate: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            if sealer.is_dev_mode() {
                eprintln!("scriptgate: WARNING: running with the insecure development secret");
            }

            let handler = ApiHandler::new(&config, sealer);
            if let Err(e) = handler.run_with_io(&mut io::stdin().lock(), &mut io::stdout().lock())
            {
                eprintln!("scriptgate: serve loop error: {}", e);
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
    }
}
