//! gitpool CLI - inspect and query a pool of git repositories

mod commands;

use clap::{Args, Parser, Subcommand};
use gitpool::config::{self, PoolConfig};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "gitpool")]
#[command(version)]
#[command(about = "Expose plain and archive-backed git repositories as one row stream")]
#[command(long_about = r#"
gitpool registers git repositories from directories and archive trees and
streams rows from all of them in registration order.

Example usage:
  gitpool list --dir ./repos --prefix 1
  gitpool refs --dir ./repos --archives ./siva --skip-errors
  gitpool init
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Sources {
    /// Single repository directory (repeatable)
    #[arg(long = "repo")]
    repos: Vec<PathBuf>,

    /// Directory whose immediate subdirectories are repositories (repeatable)
    #[arg(long = "dir")]
    dirs: Vec<PathBuf>,

    /// Directory holding archive files, scanned one level deep (repeatable)
    #[arg(long = "archives")]
    archives: Vec<PathBuf>,

    /// Number of leading path segments stripped from directory ids
    #[arg(long)]
    prefix: Option<usize>,

    /// Root for archive staging directories
    #[arg(long)]
    staging_dir: Option<PathBuf>,
}

impl Sources {
    fn apply(self, cfg: &mut PoolConfig) {
        cfg.repositories.extend(self.repos);
        cfg.directories.extend(self.dirs);
        cfg.archives.extend(self.archives);
        if let Some(prefix) = self.prefix {
            cfg.id_prefix_strip = prefix;
        }
        if let Some(staging) = self.staging_dir {
            cfg.staging_dir = Some(staging);
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List the registered repositories
    List {
        #[command(flatten)]
        sources: Sources,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Stream every reference of every repository
    Refs {
        #[command(flatten)]
        sources: Sources,

        /// Skip repositories that fail instead of aborting
        #[arg(long)]
        skip_errors: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Write a default config file
    Init {
        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut cfg = config::load_config(cli.config.as_deref())?.unwrap_or_default();

    match cli.command {
        Commands::List { sources, json } => {
            sources.apply(&mut cfg);
            commands::run_list(&cfg, json)
        }
        Commands::Refs {
            sources,
            skip_errors,
            json,
        } => {
            sources.apply(&mut cfg);
            commands::run_refs(&cfg, skip_errors || cfg.skip_git_errors, json)
        }
        Commands::Init { force } => {
            let path = cli.config.unwrap_or_else(config::default_config_path);
            commands::run_init(&path, force)
        }
    }
}
