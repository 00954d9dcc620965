#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "modget")]
#[command(author, version, about = "A fast parallel module installer", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Resolve and install modules from the registry
    Install {
        /// Modules to install, as `Name` or `Name@Version`
        #[arg(required = true)]
        specs: Vec<String>,

        /// Registry service index URL
        #[arg(long, value_name = "URL")]
        source: Option<String>,

        /// Destination module tree
        #[arg(long, value_name = "PATH")]
        destination: Option<PathBuf>,

        /// Archive cache directory
        #[arg(long, value_name = "PATH")]
        cache: Option<PathBuf>,

        /// Allow pre-release versions to satisfy constraints
        #[arg(long)]
        prerelease: bool,

        /// Re-resolve modules even when a local install satisfies the spec
        #[arg(long)]
        update: bool,

        /// Stop after printing the install plan
        #[arg(long)]
        plan_only: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.json);

    match cli.command {
        Commands::Install {
            specs,
            source,
            destination,
            cache,
            prerelease,
            update,
            plan_only,
        } => commands::install::run(
            commands::install::InstallArgs {
                specs,
                source,
                destination,
                cache,
                prerelease,
                update,
                plan_only,
            },
            cli.json,
        ),
    }
}
