use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use dump_indexer::{Dependencies, IndexerConfig, IndexingError};
use dump_indexer_pipeline::{DrainStatus, DumpReader, IndexingStrategy};
use dump_indexer_shared::WriteMode;

#[derive(Parser)]
#[command(name = "dump-indexer")]
#[command(about = "Bulk load a Wiktionary XML dump into OpenSearch", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the pages-articles XML dump (.xml or .xml.bz2)
    dump: PathBuf,

    /// OpenSearch URL
    #[arg(long)]
    opensearch_url: Option<String>,

    /// Index name
    #[arg(long)]
    index_name: Option<String>,

    /// Indexing strategy (batched|concurrent)
    #[arg(long)]
    strategy: Option<IndexingStrategy>,

    /// Write mode (create|upsert)
    #[arg(long)]
    write_mode: Option<WriteMode>,

    /// Bulk request size in bytes
    #[arg(long)]
    bulk_size_bytes: Option<usize>,

    /// Seconds to wait for outstanding writes at the end of the run
    #[arg(long)]
    drain_timeout_secs: Option<u64>,
}

impl Cli {
    /// Environment configuration with the command line overrides applied.
    fn config(&self) -> Result<IndexerConfig, IndexingError> {
        let mut config = IndexerConfig::from_env()?;
        self.apply(&mut config);
        config.validated()
    }

    fn apply(&self, config: &mut IndexerConfig) {
        if let Some(ref url) = self.opensearch_url {
            config.opensearch_url = url.clone();
        }
        if let Some(ref index_name) = self.index_name {
            config.index_name = index_name.clone();
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(write_mode) = self.write_mode {
            config.write_mode = write_mode;
        }
        if let Some(bulk_size_bytes) = self.bulk_size_bytes {
            config.bulk_size_bytes = bulk_size_bytes;
        }
        if let Some(secs) = self.drain_timeout_secs {
            config.drain_timeout = Duration::from_secs(secs);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run(cli: Cli) -> Result<(), IndexingError> {
    if !cli.dump.is_file() {
        return Err(IndexingError::config(format!(
            "Dump file not found: {}",
            cli.dump.display()
        )));
    }

    let config = cli.config()?;

    let dependencies = Dependencies::new(&config).await?;
    let reader = DumpReader::open(&cli.dump)?;
    let report = dependencies.orchestrator.run(reader).await?;

    if let DrainStatus::TimedOut { outstanding } = report.drain {
        warn!(outstanding, "Some writes had not completed when the run ended");
    }
    if report.stalled {
        warn!("Streaming stopped early because the index stopped accepting writes");
    }
    if !report.restored {
        warn!(index = %config.index_name, "Refresh interval was not restored");
    }
    info!(
        submitted = report.submitted,
        successes = report.summary.successes,
        failures = report.summary.failures,
        interrupted = report.interrupted,
        stalled = report.stalled,
        "Dump indexer finished"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Dump indexer failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overridden(args: &[&str]) -> Result<IndexerConfig, IndexingError> {
        let cli = Cli::try_parse_from(args).unwrap();
        let mut config = IndexerConfig::default();
        cli.apply(&mut config);
        config.validated()
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = overridden(&[
            "dump-indexer",
            "dump.xml.bz2",
            "--index-name",
            "enwiktionary",
            "--strategy",
            "concurrent",
            "--write-mode",
            "upsert",
            "--drain-timeout-secs",
            "10",
        ])
        .unwrap();

        assert_eq!(config.index_name, "enwiktionary");
        assert_eq!(config.strategy, IndexingStrategy::Concurrent);
        assert_eq!(config.write_mode, WriteMode::Upsert);
        assert_eq!(config.drain_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_overrides_are_rejected() {
        let zero_bulk = overridden(&["dump-indexer", "dump.xml", "--bulk-size-bytes", "0"]);
        assert!(matches!(zero_bulk, Err(IndexingError::ConfigError(_))));

        let empty_index = overridden(&["dump-indexer", "dump.xml", "--index-name", ""]);
        assert!(matches!(empty_index, Err(IndexingError::ConfigError(_))));
    }
}
