use std::path::PathBuf;
use anyhow::{Result, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tagtree::database::repo::Store;
use tagtree::ingest::orchestrator::ScanStatus;
use tagtree::ingest::worker::ScanWorker;
use tagtree::library::browse;
use tagtree::library::hierarchy::{self, HierarchySchema};
use tagtree::media::strategy::lofty_builder;
use tagtree::utils::config::{self, Settings};

#[derive(Parser, Debug)]
#[command(author, version, about = "Index music files into a tag hierarchy", long_about = None)]
struct Args {
    /// Settings file (key=value lines)
    #[arg(short, long, default_value = ".env")]
    config: PathBuf,

    /// Library root, overrides LIBRARY_ROOT
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Database path, overrides LIBRARY_DB
    #[arg(short, long)]
    db: Option<PathBuf>,

    /// Force sample data mode
    #[arg(long)]
    sample_data: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Wipe the library and rebuild it from the root
    Scan,
    /// List the children of an entry (top level when no parent is given)
    Browse {
        #[arg(short, long)]
        parent: Option<i64>,

        #[arg(long)]
        json: bool,
    },
    /// Print the configured hierarchy
    Schema,
    /// Edit the settings file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    Set { key: String, value: String },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    if let Command::Config { action: ConfigAction::Set { key, value } } = &args.command {
        config::set_value(&args.config, key, value)?;
        info!("Updated {} in {:?}", key, args.config);
        return Ok(());
    }

    let mut settings = config::load(&args.config)?;
    if let Some(root) = args.root {
        settings.root = Some(root);
    }
    if let Some(db) = args.db {
        settings.db_path = db;
    }
    settings.sample_data |= args.sample_data;

    let store = open_store(&settings)?;

    match args.command {
        Command::Scan => {
            let worker = ScanWorker::spawn(store, settings.scan_settings(), lofty_builder());
            worker.trigger();
            let summary = worker.shutdown();

            let status = summary.last.map(|r| r.status).unwrap_or(ScanStatus::StoreFailed);
            println!("{}", status);
        }
        Command::Browse { parent, json } => {
            let children = browse::children_of(store.connection(), parent)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&children)?);
            } else {
                for child in children {
                    println!(
                        "{}\t{}\t{}",
                        child.entry_id,
                        child.parent_id.map(|p| p.to_string()).unwrap_or_default(),
                        child.display_text.as_deref().unwrap_or("<unknown>")
                    );
                }
            }
        }
        Command::Schema => {
            let schema = HierarchySchema::load(store.connection())?;
            print!("{}", schema);
        }
        Command::Config { .. } => {}
    }

    Ok(())
}

fn open_store(settings: &Settings) -> Result<Store> {
    let store = Store::open(&settings.db_path)?;
    hierarchy::provision(store.connection(), &settings.hierarchy)
        .context("Failed to provision hierarchy schema")?;
    Ok(store)
}
