//! kiln-cli — operator tool for a Kiln block store.
//!
//! Opens the RocksDB-backed store under the data directory and runs one
//! command: dump the chain, inspect blocks, revert the tip or migrate
//! legacy index entries.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;

use kiln_core::kv::KeyValueStore;
use kiln_core::traits::ChainBlock;
use kiln_core::types::Block;
use kiln_store::{BlockStore, RocksKeyValueStore, StoreConfig};

type Store = BlockStore<Block, RocksKeyValueStore>;

/// Kiln block-store operator CLI.
#[derive(Parser, Debug)]
#[command(name = "kiln-cli", version, about = "Inspect and maintain a Kiln block store")]
struct Cli {
    /// Config file (TOML or JSON). KILN_* environment variables also apply.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory holding the `index` and `blocks` databases
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print every height with its recorded blocks; the main-chain one in brackets.
    Dump,
    /// Show the best block and total difficulty.
    Best,
    /// Show every block recorded at a height.
    Block {
        /// Block height.
        number: u64,
    },
    /// List main-chain hashes upward from a height.
    Hashes {
        /// First height.
        #[arg(long, default_value_t = 0)]
        from: u64,
        /// Maximum number of heights to visit.
        #[arg(long, default_value_t = 20)]
        count: u64,
    },
    /// Discard the main chain above a height.
    Revert {
        /// Height that becomes the new tip.
        height: u64,
    },
    /// Rewrite legacy-format index entries in the current format.
    Migrate,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = StoreConfig::load(cli.config.as_deref()).context("failed to load config")?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    init_logging(&config.log_level, &cli.log_format);
    info!(data_dir = ?config.data_dir, "kiln-cli v{}", env!("CARGO_PKG_VERSION"));

    let mut store = Store::open(&config)
        .with_context(|| format!("failed to open block store at {}", config.data_dir.display()))?;

    let result = run(&mut store, cli.command);
    finish(&mut store, result)
}

/// Commit staged writes only when the command succeeded, then close.
///
/// A command that fails partway (a `revert` hitting a missing ancestor, say)
/// leaves its partial changes uncommitted.
fn finish<K: KeyValueStore>(store: &mut BlockStore<Block, K>, result: Result<()>) -> Result<()> {
    if result.is_ok() {
        store.flush();
    }
    store.close();
    result
}

fn run(store: &mut Store, command: Commands) -> Result<()> {
    match command {
        Commands::Dump => {
            print!("{}", store.dump_chain()?);
        }
        Commands::Best => {
            let best = store.best_block()?;
            let td = store.total_difficulty()?;
            let out = match best {
                Some(block) => json!({
                    "number": block.number(),
                    "hash": block.hash().to_string(),
                    "parent_hash": block.parent_hash().to_string(),
                    "total_difficulty": td.to_string(),
                }),
                None => json!(null),
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Commands::Block { number } => {
            let main_hash = store.block_hash_by_number(number)?;
            let mut blocks = Vec::new();
            for block in store.blocks_by_number(number)? {
                let hash = block.hash();
                blocks.push(json!({
                    "hash": hash.to_string(),
                    "parent_hash": block.parent_hash().to_string(),
                    "main_chain": main_hash == Some(hash),
                    "total_difficulty": store.total_difficulty_for_hash(&hash)?.to_string(),
                    "transactions": block.transactions.len(),
                }));
            }
            println!("{}", serde_json::to_string_pretty(&blocks)?);
        }
        Commands::Hashes { from, count } => {
            for hash in store.list_hashes_start_with(from, count)? {
                println!("{hash}");
            }
        }
        Commands::Revert { height } => {
            let before = store.max_number();
            store.revert(height)?;
            info!(?before, after = ?store.max_number(), "revert finished");
        }
        Commands::Migrate => {
            let rewritten = store.migrate_legacy_index()?;
            println!("rewrote {rewritten} height index entries");
        }
    }
    Ok(())
}

/// Initialize the tracing subscriber with the given level and format.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init();
    }
}
