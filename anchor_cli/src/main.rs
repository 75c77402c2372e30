use anchor_core::Hash;
use anchor_pin::PinQuery;
use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use clap_verbosity_flag::InfoLevel;
use directories::ProjectDirs;
use std::path::PathBuf;

mod cmd;
mod config;
mod init_config;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Repository directory holding `anchor.toml`; defaults to the
    /// platform data directory
    #[arg(short, long, value_name = "PATH")]
    repo: Option<PathBuf>,

    #[command(flatten)]
    verbosity: clap_verbosity_flag::Verbosity<InfoLevel>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the repository config if it doesn't exist
    Init,
    /// Store and inspect DAG nodes
    Object {
        #[command(subcommand)]
        cmd: ObjectCmd,
    },
    /// Manage pins. Every change is flushed before the command returns.
    Pin {
        #[command(subcommand)]
        cmd: PinCmd,
    },
    /// Delete every block that is not pinned, directly, recursively or
    /// as part of the pin record
    Gc {
        /// Only print which blocks would be deleted
        #[arg(long, action = ArgAction::SetTrue)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum ObjectCmd {
    /// Store a file's contents as a node and print its hash
    Put {
        path: PathBuf,
        /// Link to an existing node, as NAME=HASH (repeatable)
        #[arg(short, long = "link", value_name = "NAME=HASH", value_parser = cmd::parse_link)]
        links: Vec<anchor_core::Link>,
    },
    /// Write a node's data to stdout
    Get { hash: Hash },
    /// List a node's links
    Links { hash: Hash },
}

#[derive(Subcommand)]
enum PinCmd {
    /// Pin a node, and with -r everything reachable from it
    Add {
        hash: Hash,
        #[arg(short, long, action = ArgAction::SetTrue)]
        recursive: bool,
    },
    /// Remove a pin. Recursive pins need -r.
    Rm {
        hash: Hash,
        #[arg(short, long, action = ArgAction::SetTrue)]
        recursive: bool,
    },
    /// List pinned hashes
    Ls {
        /// One of all, direct, recursive, internal, indirect
        #[arg(short = 't', long = "type", default_value = "all")]
        kind: PinQuery,
    },
    /// Check that every pinned node is present in the store
    Verify,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .with_writer(std::io::stderr)
        .init();

    let repo = match cli.repo {
        Some(repo) => repo,
        None => ProjectDirs::from("", "", "anchor")
            .context("failed to determine data directory path")?
            .data_dir()
            .to_path_buf(),
    };

    cmd::run_command(&repo, cli.cmd).await
}
