//! wbembed CLI entry point.
//!
//! Offline tooling for the workbook embed: replay a traffic dump into a fresh
//! mirror, classify a single posting, or print the config schema.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::info;
use serde_json::Value;
use workbook_embed::config::{config_schema, default_config_path, load_config};
use workbook_embed::dump::{read_dump, Direction};
use workbook_embed::{Delivery, MemoryFrameHost, PresentationShell, WorkbookEmbed};

#[derive(Parser, Debug)]
#[command(name = "wbembed")]
#[command(about = "Tools for debugging embedded workbook traffic")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: <config dir>/workbook-embed/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay the inbound postings of a dump and print the resulting state
    Replay {
        /// JSON-lines dump written by an embed with `dump_path` set
        dump: PathBuf,

        /// Source URL the workbook was loaded from
        #[arg(long)]
        source_url: String,

        /// Origin for entries that did not record one (default: the source's origin)
        #[arg(long)]
        origin: Option<String>,

        /// Print the shell view instead of the raw state
        #[arg(long)]
        view: bool,
    },

    /// Classify one posting; exits non-zero if it would be dropped
    Check {
        /// File holding the posting's JSON
        posting: PathBuf,

        /// Origin the posting came from
        #[arg(long)]
        origin: String,

        /// Source URL the workbook was loaded from
        #[arg(long)]
        source_url: String,
    },

    /// Print the JSON schema of the config file
    Schema,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    match cli.command {
        Commands::Replay {
            dump,
            source_url,
            origin,
            view,
        } => replay(cli.config, dump, &source_url, origin, view),
        Commands::Check {
            posting,
            origin,
            source_url,
        } => check(cli.config, posting, &origin, &source_url),
        Commands::Schema => {
            println!("{}", config_schema()?);
            Ok(())
        }
    }
}

fn open_embed(
    config: Option<PathBuf>,
    source_url: &str,
) -> anyhow::Result<(MemoryFrameHost, WorkbookEmbed)> {
    let path = config.unwrap_or_else(default_config_path);
    let mut config = load_config(&path);
    // Never write traffic while reading it back
    config.dump_path = None;

    let host = MemoryFrameHost::new();
    let embed = WorkbookEmbed::new(Box::new(host.clone()), config);
    embed.initialize(source_url)?;
    embed.frame_loaded();
    Ok((host, embed))
}

fn replay(
    config: Option<PathBuf>,
    dump: PathBuf,
    source_url: &str,
    origin: Option<String>,
    view: bool,
) -> anyhow::Result<()> {
    let entries = read_dump(&dump)?;
    let (host, embed) = open_embed(config, source_url)?;
    let fallback_origin = match origin {
        Some(origin) => origin,
        None => embed
            .inbox()
            .map(|inbox| inbox.expected_origin().to_string())
            .context("embed has no listener")?,
    };

    let (mut dispatched, mut dropped) = (0, 0);
    for entry in entries.into_iter().filter(|e| e.dir == Direction::In) {
        let origin = entry.origin.as_deref().unwrap_or(&fallback_origin);
        match host.deliver_raw(origin, entry.msg) {
            Some(Delivery::Dispatched { .. }) => dispatched += 1,
            _ => dropped += 1,
        }
    }
    info!(
        "Replayed {} postings from {} ({} dropped)",
        dispatched,
        dump.display(),
        dropped
    );

    let output = if view {
        let shell = PresentationShell::new(embed.config().shell.clone());
        serde_json::to_string_pretty(&shell.render(&embed))?
    } else {
        serde_json::to_string_pretty(&embed.state())?
    };
    println!("{}", output);
    Ok(())
}

fn check(
    config: Option<PathBuf>,
    posting: PathBuf,
    origin: &str,
    source_url: &str,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&posting)
        .with_context(|| format!("reading {}", posting.display()))?;
    let data: Value =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", posting.display()))?;

    let (_host, embed) = open_embed(config, source_url)?;
    let inbox = embed.inbox().context("embed has no listener")?;
    let event = inbox
        .accept(origin, data)
        .with_context(|| format!("{} would be dropped", posting.display()))?;
    println!("{}", serde_json::to_string_pretty(event.payload())?);
    Ok(())
}
