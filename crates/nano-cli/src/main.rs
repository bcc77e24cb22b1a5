use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    init_logging(cli.verbose);
    commands::run_command(cli)
}

/// `RUST_LOG` wins when set.
fn init_logging(verbose: bool) {
    let default = if verbose {
        "nanocloud=debug,nano_server=debug,tower_http=debug"
    } else {
        "nanocloud=info,nano_server=info,tower_http=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
