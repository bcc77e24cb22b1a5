use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "nanocloud",
    about = "nanocloud: a small self-hosted file store",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// List stored objects
    Ls(StoreArgs),
    /// Store a local file under a key
    Put(PutArgs),
    /// Fetch an object
    Get(GetArgs),
    /// Delete an object
    Rm(RmArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Listen address, overrides the configuration
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Storage root, overrides the configuration
    #[arg(long)]
    pub root: Option<PathBuf>,
}

#[derive(Args)]
pub struct StoreArgs {
    /// Storage root directory
    #[arg(long, default_value = "data")]
    pub root: PathBuf,
}

#[derive(Args)]
pub struct PutArgs {
    pub key: String,
    pub file: PathBuf,
    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Args)]
pub struct GetArgs {
    pub key: String,
    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub out: Option<PathBuf>,
    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Args)]
pub struct RmArgs {
    pub key: String,
    #[command(flatten)]
    pub store: StoreArgs,
}
