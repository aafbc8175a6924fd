//! External-process hook binary for the database host.
//!
//! Reads one JSON request per line from stdin and writes one JSON reply
//! per line to stdout. Logging goes to a file so that stdout remains a
//! clean protocol channel.
//!
//! ```text
//! lucene-federate-hook [--config FILE] [-u URL] [--once] [key=value]...
//! ```
//!
//! Recognized `key=value` overrides: `lucene.host`, `lucene.port`,
//! `lucene.shards`, `log.dir`.

use std::path::PathBuf;

use clap::Parser;
use lucene_federate::host::stdio::run_stdio;
use lucene_federate::{AppConfig, SearchProxy};

/// Search hook relaying and federating requests from a database host.
#[derive(Parser, Debug)]
#[command(name = "lucene-federate-hook", version, about)]
struct Args {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Single search server URL; replaces the configured shard list.
    #[arg(short, long)]
    url: Option<String>,

    /// Answer one request and exit.
    #[arg(long)]
    once: bool,

    /// `key=value` configuration overrides.
    overrides: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    for token in &args.overrides {
        config.apply_override(token)?;
    }
    if let Some(url) = args.url {
        config.federation.shards = vec![url];
    }
    config.validate()?;

    let _guard = lucene_federate::logging::init_file(&config.log)?;
    tracing::info!(
        shards = ?config.federation.shards,
        log = %config.log.path().display(),
        "searcher started"
    );

    let proxy = SearchProxy::new(&config)?;
    let answered = run_stdio(&proxy, args.once).await.map_err(|e| {
        tracing::error!(error = %e, "hook exited with error");
        anyhow::anyhow!("lucene-federate-hook failed: {e}")
    })?;

    tracing::info!(answered, "searcher stopped");
    Ok(())
}
