use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};

mod completion;
mod config;
mod dispatch;
mod logging;
mod render;

use completion::CliCompletionShell;

#[derive(Parser, Debug)]
#[command(name = "parcel")]
#[command(about = "Transactional package operations over local repositories", long_about = None)]
struct Cli {
    /// Config file; defaults to $PARCEL_CONFIG, then <root>/parcel.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Repeat for more log output.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Print transaction events as JSON lines.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
struct TransactionArgs {
    /// Walk the transaction without fetching or applying anything.
    #[arg(long)]
    simulate: bool,
    /// Refuse packages whose record is not signed by a trusted key.
    #[arg(long)]
    only_trusted: bool,
    /// Accept a license ahead of time; may be repeated.
    #[arg(long = "accept-license", value_name = "LICENSE")]
    accept_license: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Install {
        #[arg(required = true)]
        packages: Vec<String>,
        #[command(flatten)]
        transaction: TransactionArgs,
        /// Fetch the named packages without installing them.
        #[arg(long)]
        only_download: bool,
    },
    Update {
        packages: Vec<String>,
        #[command(flatten)]
        transaction: TransactionArgs,
    },
    Remove {
        #[arg(required = true)]
        packages: Vec<String>,
        #[command(flatten)]
        transaction: TransactionArgs,
        /// Also remove installed packages that depend on the targets.
        #[arg(long)]
        allow_deps: bool,
        #[arg(long)]
        auto_remove: bool,
    },
    Download {
        #[arg(required = true)]
        packages: Vec<String>,
        #[arg(long, value_name = "DIR")]
        dest: PathBuf,
        #[command(flatten)]
        transaction: TransactionArgs,
    },
    Refresh {
        #[arg(long)]
        force: bool,
    },
    DependsOn {
        #[arg(required = true)]
        packages: Vec<String>,
        #[arg(long)]
        recursive: bool,
    },
    RequiredBy {
        #[arg(required = true)]
        packages: Vec<String>,
        #[arg(long)]
        recursive: bool,
    },
    Search {
        needle: String,
    },
    /// List newer versions of installed packages without installing them.
    Updates {
        packages: Vec<String>,
    },
    Details {
        #[arg(required = true)]
        packages: Vec<String>,
    },
    Repos,
    Completions {
        #[arg(value_enum)]
        shell: CliCompletionShell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::setup_logger(cli.verbose);
    dispatch::run_cli(cli)
}
