use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use nano_server::{NanoServer, ServerConfig};
use nano_store::{LocalObjectStore, ObjectMetadata, ObjectStore};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Ls(args) => {
            let store = open_store(&args.root)?;
            print!("{}", cmd_ls(&store, cli.format)?);
            Ok(())
        }
        Command::Put(args) => {
            let store = open_store(&args.store.root)?;
            let written = cmd_put(&store, &args.key, &args.file)?;
            println!("{} stored {} ({} bytes)", "✓".green().bold(), args.key.bold(), written);
            Ok(())
        }
        Command::Get(args) => {
            let store = open_store(&args.store.root)?;
            let data = cmd_get(&store, &args.key)?;
            match &args.out {
                Some(out) => {
                    std::fs::write(out, &data)
                        .with_context(|| format!("cannot write {}", out.display()))?;
                    eprintln!("{} wrote {} to {}", "✓".green().bold(), args.key.bold(), out.display());
                }
                None => std::io::stdout()
                    .write_all(&data)
                    .context("cannot write to stdout")?,
            }
            Ok(())
        }
        Command::Rm(args) => {
            let store = open_store(&args.store.root)?;
            store
                .delete(&args.key)
                .with_context(|| format!("cannot delete {}", args.key))?;
            tracing::info!(key = %args.key, "object deleted");
            println!("{} deleted {}", "✓".green().bold(), args.key.bold());
            Ok(())
        }
    }
}

fn open_store(root: &Path) -> anyhow::Result<LocalObjectStore> {
    tracing::debug!(root = %root.display(), "opening local store");
    LocalObjectStore::new(root).with_context(|| format!("cannot open store at {}", root.display()))
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = ServerConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(root) = args.root {
        config.storage_root = root;
    }
    tracing::debug!(?config, "effective server configuration");
    let server = NanoServer::new(config)?;
    println!(
        "nanocloud on {} (root: {})",
        server.config().bind_addr.to_string().bold(),
        server.config().storage_root.display()
    );

    let runtime = tokio::runtime::Runtime::new().context("cannot start async runtime")?;
    runtime.block_on(server.serve())?;
    Ok(())
}

fn cmd_ls(store: &dyn ObjectStore, format: OutputFormat) -> anyhow::Result<String> {
    let objects = store.list().context("cannot list objects")?;
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&objects)? + "\n"),
        OutputFormat::Text => Ok(render_listing(&objects)),
    }
}

fn render_listing(objects: &[ObjectMetadata]) -> String {
    if objects.is_empty() {
        return "No objects.\n".to_string();
    }
    let mut out = String::new();
    for object in objects {
        out.push_str(&format!("{:>12}  {}\n", object.size, object.path.cyan()));
    }
    out.push_str(&format!("{} objects\n", objects.len().to_string().bold()));
    out
}

fn cmd_put(store: &dyn ObjectStore, key: &str, file: &Path) -> anyhow::Result<u64> {
    let mut source =
        File::open(file).with_context(|| format!("cannot open {}", file.display()))?;
    let written = store
        .save(key, &mut source)
        .with_context(|| format!("cannot store {key}"))?;
    tracing::info!(%key, bytes = written, "object stored");
    Ok(written)
}

fn cmd_get(store: &dyn ObjectStore, key: &str) -> anyhow::Result<Vec<u8>> {
    store.read(key).with_context(|| format!("cannot read {key}"))
}
