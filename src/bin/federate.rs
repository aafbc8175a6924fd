//! CLI binary: federate one query and print the merged page.
//!
//! ```text
//! lucene-federate --shard search-1 --shard search-2:5986 \
//!     '/search/enron/mail/by_content?q=content:enron&limit=10'
//! ```
//!
//! Prints one JSON document on stdout: the merged result, or a
//! `{code, body}` error with a non-zero exit status.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use federate_search::RankingMode;
use lucene_federate::oneshot::{error_document, search, SearchOptions};
use lucene_federate::{AppConfig, HookError};

/// Federated full-text search across search shard servers.
#[derive(Parser, Debug)]
#[command(name = "lucene-federate", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Shard address (`host`, `host:port`, or URL). Repeatable; replaces
    /// the configured shard list.
    #[arg(short, long = "shard")]
    shards: Vec<String>,

    /// Merge whatever shards answer instead of failing on the first error.
    #[arg(long)]
    best_effort: bool,

    /// Cross-shard ranking strategy.
    #[arg(long, value_enum)]
    ranking: Option<Ranking>,

    /// Per-shard timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Raw query: `path?key=value&...`.
    query: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Ranking {
    SortKey,
    IncrementalScore,
}

impl From<Ranking> for RankingMode {
    fn from(ranking: Ranking) -> Self {
        match ranking {
            Ranking::SortKey => Self::SortKey,
            Ranking::IncrementalScore => Self::IncrementalScore,
        }
    }
}

impl Cli {
    fn options(&self) -> SearchOptions {
        SearchOptions {
            config: self.config.clone(),
            shards: self.shards.clone(),
            best_effort: self.best_effort,
            ranking: self.ranking.map(RankingMode::from),
            timeout_seconds: self.timeout,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let outcome = match prepare(&cli.options()) {
        Ok(config) => search(&config, &cli.query).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(bytes) => print(&bytes, ExitCode::SUCCESS),
        Err(e) => {
            tracing::error!(error = %e, code = e.code(), "federated search failed");
            print(&error_document(&e), ExitCode::FAILURE)
        }
    }
}

fn prepare(options: &SearchOptions) -> Result<AppConfig, HookError> {
    let config = options.resolve_config()?;
    lucene_federate::logging::init_stderr(&config.log.level)?;
    Ok(config)
}

fn print(document: &[u8], status: ExitCode) -> ExitCode {
    match write_line(document) {
        Ok(()) => status,
        Err(e) => {
            eprintln!("lucene-federate: cannot write to stdout: {e}");
            ExitCode::FAILURE
        }
    }
}

fn write_line(document: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(document)?;
    stdout.write_all(b"\n")?;
    stdout.flush()
}
