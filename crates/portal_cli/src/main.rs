//! `portal-docs`: list, resolve and download course documents from the
//! university portal.
mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use portal_engine::{
    AtomicFileWriter, DocumentEngine, FileStore, FolderRef, ReqwestTransport, Resolution,
    ResolvedLocation,
};
use portal_logging::{portal_info, LogDestination};
use serde_json::json;

#[derive(Parser)]
#[command(name = "portal-docs", about = "Course document discovery for the university portal")]
struct Cli {
    /// RON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where log output goes
    #[arg(long, value_enum, default_value_t = LogTarget::Terminal)]
    log: LogTarget,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogTarget {
    Terminal,
    File,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File,
            LogTarget::Both => LogDestination::Both,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Print the documents of a folder as JSON
    List {
        /// Folder reference (absolute or relative to the portal base)
        folder: String,
        /// Cache identity of the folder; defaults to its path
        #[arg(long)]
        id: Option<String>,
        /// Skip the cache and rediscover the folder
        #[arg(long)]
        fresh: bool,
    },
    /// Resolve a document reference without saving it
    Resolve { reference: String },
    /// Resolve a document reference and save the file
    Fetch {
        reference: String,
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Drop every cached record whose key starts with the prefix
    Invalidate { prefix: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    portal_logging::initialize(cli.log.into(), level);

    let file = config::load(cli.config.as_deref())?;
    let engine_config = file.engine_config()?;
    let transport = ReqwestTransport::new(file.transport_settings())
        .context("building http client")?;
    let store = FileStore::new(file.cache_dir());
    let engine = DocumentEngine::new(engine_config, Arc::new(transport), Arc::new(store));

    let outcome = run(&engine, cli.command).await;

    let drained = engine.cache().drain_revalidations().await;
    if drained > 0 {
        portal_info!("finished {drained} background refreshes");
    }
    outcome
}

async fn run(engine: &DocumentEngine, command: Command) -> Result<()> {
    match command {
        Command::List { folder, id, fresh } => {
            let id = id.unwrap_or_else(|| folder_id(&folder));
            let folder = FolderRef::new(id, folder);
            let listing = if fresh {
                engine.refresh_folder(&folder).await
            } else {
                engine.list_folder(&folder).await
            };
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        Command::Resolve { reference } => {
            let resolution = engine.open_document(&reference).await;
            println!("{}", serde_json::to_string_pretty(&describe(&resolution))?);
        }
        Command::Fetch { reference, out } => match engine.open_document(&reference).await {
            Resolution::Ready { location, body } => {
                let path = AtomicFileWriter::new(out)
                    .write(&location.file_name, &body)
                    .with_context(|| format!("saving {}", location.file_name))?;
                println!("{}", path.display());
            }
            Resolution::OpenExternally(location) => {
                println!("open in a browser: {}", location.uri);
            }
            Resolution::RetrievalFailed { location, failure } => {
                bail!("could not retrieve {}: {failure}", location.uri);
            }
        },
        Command::Invalidate { prefix } => {
            let removed = engine.cache().invalidate_prefix(&prefix).await;
            println!("removed {removed} cached records");
        }
    }
    Ok(())
}

/// `/auth/el/fi/jaro2026/ALG/um/` -> `auth_el_fi_jaro2026_ALG_um`
fn folder_id(reference: &str) -> String {
    let path = reference
        .split_once("://")
        .map_or(reference, |(_, rest)| rest.split_once('/').map_or("", |(_, path)| path));
    let id: Vec<&str> = path
        .split(['/', '?', '&', '=', ';'])
        .filter(|part| !part.is_empty())
        .collect();
    if id.is_empty() {
        "root".to_string()
    } else {
        id.join("_")
    }
}

fn describe(resolution: &Resolution) -> serde_json::Value {
    let location_json = |location: &ResolvedLocation| {
        json!({
            "uri": location.uri,
            "kind": location.kind.as_str(),
            "file_name": location.file_name,
        })
    };
    match resolution {
        Resolution::Ready { location, body } => json!({
            "status": "ready",
            "location": location_json(location),
            "bytes": body.len(),
        }),
        Resolution::OpenExternally(location) => json!({
            "status": "open_externally",
            "location": location_json(location),
        }),
        Resolution::RetrievalFailed { location, failure } => json!({
            "status": "failed",
            "location": location_json(location),
            "error": failure.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_ids_come_from_the_path() {
        assert_eq!(
            folder_id("https://is.example.cz/auth/el/fi/jaro2026/ALG/um/"),
            "auth_el_fi_jaro2026_ALG_um"
        );
        assert_eq!(folder_id("/auth/el/um/?offset=10"), "auth_el_um_offset_10");
        assert_eq!(folder_id("https://is.example.cz/"), "root");
    }
}
