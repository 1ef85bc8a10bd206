//! collection-worker: virtual collection membership matcher.
//!
//! Subcommands:
//! - `scan <file>`: bulk-match one collection definition against the search index
//! - `stream [--input FILE] [--events FILE]`: match NDJSON entity envelopes against every
//!   cached collection; collection change events from `--events` trigger bulk scans
//! - `validate <file>`: check a definition and print its compiled query

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};

use collecta_core::config::{self, Config};
use collecta_matcher::{
    BatchReport, BulkMatcher, MessageRouter, OpenSearchIndex, RelationshipAnnotator, StreamMatcher,
};
use collecta_queue::{EntityPublisher, JsonLinesPublisher, LineConsumer, MicroBatcher, QueueConsumer, QueueError};
use collecta_rules::{
    spawn_refresh_task, CollectionCache, CollectionDefinition, FileCollectionStore, Predicate, QueryCompiler,
};

// ── CLI ─────────────────────────────────────────────────────────────

/// Matches entities against virtual collection filters and records membership.
#[derive(Parser, Debug)]
#[command(name = "collection-worker", version, about)]
struct Cli {
    /// Configuration profile; keys are looked up as `{PROFILE}_{KEY}` first.
    #[arg(long, env = "COLLECTA_PROFILE", default_value = "")]
    profile: String,

    /// Directory of collection definition files (overrides COLLECTIONS_DIR).
    #[arg(long)]
    collections_dir: Option<PathBuf>,

    /// Search index name (overrides OPENSEARCH_INDEX).
    #[arg(long)]
    index: Option<String>,

    /// Hits per search page (overrides OPENSEARCH_PAGE_SIZE).
    #[arg(long)]
    page_size: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan the search index for every member of one collection.
    Scan {
        /// Collection definition file (.yml, .yaml or .json).
        definition: PathBuf,
    },
    /// Match inbound entity envelopes (one JSON object per line).
    Stream {
        /// Read from this file instead of stdin.
        #[arg(long)]
        input: Option<PathBuf>,
        /// Collection change events (one JSON object per line) to scan for.
        #[arg(long)]
        events: Option<PathBuf>,
    },
    /// Validate a definition and print the compiled query.
    Validate {
        definition: PathBuf,
    },
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::for_profile(&self.profile);
        if let Some(dir) = &self.collections_dir {
            config.cache.collections_dir = dir.clone();
        }
        if let Some(index) = &self.index {
            config.opensearch.index = index.clone();
        }
        if let Some(size) = self.page_size {
            config.opensearch.page_size = size;
        }
        config
    }
}

// ── Wiring ──────────────────────────────────────────────────────────

fn stdout_publisher() -> Arc<dyn EntityPublisher> {
    Arc::new(JsonLinesPublisher::new(tokio::io::stdout(), tokio::io::stderr()))
}

fn bulk_matcher(config: &Config, publisher: Arc<dyn EntityPublisher>) -> anyhow::Result<BulkMatcher> {
    let index = OpenSearchIndex::from_config(&config.opensearch).context("building search client")?;
    Ok(BulkMatcher::new(
        Arc::new(index),
        publisher,
        RelationshipAnnotator::from_config(&config.application),
        config.opensearch.page_size,
    ))
}

type LineInput = LineConsumer<Box<dyn AsyncBufRead + Unpin + Send>>;

/// NDJSON input from `path`, or stdin.
async fn line_input(path: Option<&Path>) -> anyhow::Result<LineInput> {
    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match path {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };
    Ok(LineConsumer::new(reader))
}

fn load_definition(path: &Path) -> anyhow::Result<CollectionDefinition> {
    FileCollectionStore::load_file(path).with_context(|| format!("loading {}", path.display()))
}

// ── Subcommands ─────────────────────────────────────────────────────

async fn scan(config: &Config, path: &Path) -> anyhow::Result<()> {
    let definition = load_definition(path)?;
    if !definition.is_active() {
        bail!("collection '{}' is tombstoned, nothing to scan", definition.id);
    }

    let bulk = bulk_matcher(config, stdout_publisher())?;
    let processed = bulk.run(&definition).await?;
    info!(collection_id = %definition.id, processed, "scan complete");
    Ok(())
}

async fn stream(config: &Config, input: Option<&Path>, events: Option<&Path>) -> anyhow::Result<()> {
    let store = Arc::new(FileCollectionStore::new(config.cache.collections_dir.clone()));
    let cache = Arc::new(CollectionCache::new(store));
    let loaded = cache
        .refresh()
        .await
        .with_context(|| format!("loading collections from {}", config.cache.collections_dir.display()))?;
    if loaded == 0 {
        warn!("no active collections loaded, every entity will pass through unmatched");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let refresher = spawn_refresh_task(cache.clone(), config.cache.refresh_interval(), shutdown_rx);

    let publisher = stdout_publisher();
    let annotator = RelationshipAnnotator::from_config(&config.application);
    let router = Arc::new(MessageRouter::new(
        StreamMatcher::new(cache, publisher.clone(), annotator),
        bulk_matcher(config, publisher.clone())?,
        publisher,
    ));

    let consumer = line_input(input).await?;
    let event_task = match events {
        Some(path) => {
            let events = line_input(Some(path)).await?;
            let router = router.clone();
            Some(tokio::spawn(async move { router.consume_events(&events).await }))
        }
        None => None,
    };

    let mut batcher = MicroBatcher::new(config.queue.batch_size, config.queue.batch_wait());
    let mut totals = BatchReport::default();

    loop {
        let wait = batcher.remaining_wait();
        tokio::select! {
            polled = consumer.poll_batch(batcher.capacity_left()) => match polled {
                Ok(messages) => batcher.push(messages),
                Err(QueueError::Closed) => break,
                Err(e) => {
                    let _ = shutdown_tx.send(true);
                    return Err(e.into());
                }
            },
            _ = tokio::time::sleep(wait.unwrap_or_default()), if wait.is_some() => {}
        }

        if let Some(batch) = batcher.try_flush() {
            accumulate(&mut totals, router.route_entities(batch).await);
        }
    }

    if !batcher.is_empty() {
        accumulate(&mut totals, router.route_entities(batcher.flush()).await);
    }

    if let Some(task) = event_task {
        let scans = task.await.context("event task panicked")?;
        info!(scans, "collection events exhausted");
    }

    let _ = shutdown_tx.send(true);
    refresher.await.context("refresh task panicked")?;

    info!(
        entities = totals.entities,
        rejected = totals.rejected,
        matched = totals.matched,
        emitted = totals.emitted,
        failed = totals.failed,
        "input exhausted"
    );
    Ok(())
}

fn accumulate(totals: &mut BatchReport, batch: BatchReport) {
    totals.entities += batch.entities;
    totals.rejected += batch.rejected;
    totals.evaluated += batch.evaluated;
    totals.matched += batch.matched;
    totals.emitted += batch.emitted;
    totals.failed += batch.failed;
}

fn validate(path: &Path) -> anyhow::Result<()> {
    let definition = load_definition(path)?;
    let predicate = Predicate::from_filter(&definition.filter)
        .with_context(|| format!("collection '{}' has an invalid filter", definition.id))?;
    let query = QueryCompiler::compile_predicate(&predicate);

    info!(
        collection_id = %definition.id,
        active = definition.is_active(),
        leaves = predicate.leaf_count(),
        "filter is valid"
    );
    println!("{}", serde_json::to_string_pretty(&query.to_dsl())?);
    Ok(())
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config();
    config.log_summary();

    match &cli.command {
        Command::Scan { definition } => scan(&config, definition).await,
        Command::Stream { input, events } => stream(&config, input.as_deref(), events.as_deref()).await,
        Command::Validate { definition } => validate(definition),
    }
}
