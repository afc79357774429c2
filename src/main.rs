// src/main.rs
//! cagekv 快照检查工具
//!
//! ```bash
//! cagekv check dump.rdb
//! cagekv dump dump.rdb --hex
//! cagekv info ./data --section keyspace
//! cagekv rewrite old.rdb new.rdb
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cagekv::config::{self, Config};
use cagekv::engine::{Keyspace, MemoryKeyspace};
use cagekv::expire::now_ms;
use cagekv::monitor::build_info_response;
use cagekv::persistence::{Persistence, load_from_path, save_to_path};
use cagekv::snapshot::{LoadOptions, LoadStats, SnapshotWriter};
use cagekv::types::string::ByteBuffer;

#[derive(Parser, Debug)]
#[command(name = "cagekv", version, about = "Inspect and verify cagekv snapshot files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON 配置文件，不存在时写出默认配置
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 以从节点身份加载（保留已过期的 key）
    #[arg(long, global = true)]
    replica: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load a snapshot with full verification and print per-database key counts
    Check { file: PathBuf },

    /// Print one `db type encoding expire key` line per key
    Dump {
        file: PathBuf,
        /// Print keys as hex instead of quoted strings
        #[arg(long)]
        hex: bool,
    },

    /// Load `<dir>/<rdb_filename>` and print an INFO report
    Info {
        dir: PathBuf,
        #[arg(long)]
        section: Option<String>,
    },

    /// Load a snapshot and write it back with the current encoding thresholds
    Rewrite { input: PathBuf, output: PathBuf },
}

fn load(cfg: &Config, replica: bool, file: &Path) -> Result<(MemoryKeyspace, LoadStats)> {
    let mut opts = LoadOptions::from_config(cfg);
    opts.replica = replica;
    let ks = MemoryKeyspace::from_config(cfg);
    load_from_path(file, opts, ks, |p| match p.total_bytes {
        Some(total) if total > 0 => {
            info!(loaded = p.loaded_bytes, total, "loading {:.1}%", p.loaded_bytes as f64 * 100.0 / total as f64)
        }
        _ => info!(loaded = p.loaded_bytes, "loading"),
    })
    .with_context(|| format!("failed to load snapshot {:?}", file))
}

fn render_key(key: &[u8], hex: bool) -> String {
    if hex {
        return hex::encode(key);
    }
    let mut out = ByteBuffer::new();
    out.append_repr(key);
    String::from_utf8_lossy(out.as_bytes()).into_owned()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Check { file } => {
            let (ks, stats) = load(&cfg, cli.replica, &file)?;
            println!("version: {}", stats.version);
            println!("bytes: {}", stats.bytes);
            for db in 0..ks.db_count() {
                if let Some(d) = ks.database(db).filter(|d| !d.is_empty()) {
                    println!("db{}: keys={} expires={}", db, d.len(), d.expires_len());
                }
            }
            println!("keys: {} (expired skipped: {})", stats.keys_loaded, stats.expired_skipped);
        }
        Commands::Dump { file, hex } => {
            let (ks, _) = load(&cfg, cli.replica, &file)?;
            for db in 0..ks.db_count() {
                let mut entries: Vec<_> = ks.entries(db).collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                for (key, value, expire) in entries {
                    println!(
                        "{} {} {} {} {}",
                        db,
                        value.kind(),
                        value.encoding(),
                        expire.unwrap_or(-1),
                        render_key(key, hex)
                    );
                }
            }
        }
        Commands::Info { dir, section } => {
            let pers = Persistence::new(cfg, &dir);
            let (ks, _) = pers.load(cli.replica)?;
            print!("{}", build_info_response(section.as_deref(), &ks, &pers));
        }
        Commands::Rewrite { input, output } => {
            let (ks, _) = load(&cfg, cli.replica, &input)?;
            let stats = save_to_path(&output, &ks, SnapshotWriter::from_config(&cfg), now_ms())
                .with_context(|| format!("failed to write {:?}", output))?;
            info!(keys = stats.keys, bytes = stats.bytes, "snapshot rewritten");
        }
    }
    Ok(())
}
