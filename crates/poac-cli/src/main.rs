use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "poac")]
#[command(about = "Package manager for C++", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install dependencies declared in poac.toml
    Install {
        /// Errors only
        #[arg(short, long)]
        quiet: bool,
        /// Per-package fetch detail
        #[arg(short, long)]
        verbose: bool,
        /// Extra packages to install and add to poac.toml
        packages: Vec<String>,
    },
    /// Verify this package and publish it to the registry
    Publish {
        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show the current poac version
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Install {
            quiet,
            verbose,
            packages,
        } => {
            commands::install::run(commands::install::InstallArgs {
                packages,
                quiet,
                verbose,
                project_dir: PathBuf::from("."),
            })?;
        }
        Commands::Publish { verbose, yes } => {
            commands::publish::run(commands::publish::PublishArgs {
                verbose,
                yes,
                project_dir: PathBuf::from("."),
            })?;
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
