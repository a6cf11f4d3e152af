use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use product_import_lib::{
    BulkLoader, CommitMode, FieldMapping, GraphConfig, Migration, MigrationConfig,
    MigrationError, MigrationEvent, MongoSource, Neo4jLoader, PageState, ProductSource,
    RunSummary, SourceConfig, StagedPage, Transport, config,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Migrate product documents from MongoDB into Neo4j.
///
/// Pages through the source collection, writes each page to a CSV staging
/// file inside the Neo4j import directory, and bulk-merges it with
/// LOAD CSV. Every flag defaults to the values the import was built for.
///
/// Examples:
///   product-import                          # Run with the built-in defaults
///   product-import --dry-run -v             # Fetch and serialize only
///   product-import --start-offset 42000     # Resume from the page holding 42000
///   product-import --transport unwind       # Skip the staging file entirely
#[derive(Debug, Parser)]
#[command(name = "product-import")]
#[command(version)]
#[command(about = "Migrate product documents from MongoDB into Neo4j")]
struct Cli {
    /// Documents per page.
    #[arg(long, default_value_t = config::DEFAULT_PAGE_SIZE, value_parser = clap::value_parser!(u64).range(1..))]
    page_size: u64,

    /// Source MongoDB connection string.
    #[arg(long, default_value = config::DEFAULT_MONGO_URI, value_name = "URI")]
    mongo_uri: String,

    /// Source database name.
    #[arg(long, default_value = config::DEFAULT_DATABASE)]
    database: String,

    /// Source collection name.
    #[arg(long, default_value = config::DEFAULT_COLLECTION)]
    collection: String,

    /// Source field holding the product identifier.
    #[arg(long, default_value = config::DEFAULT_ID_FIELD, value_name = "FIELD")]
    id_field: String,

    /// Source field holding the title.
    #[arg(long, default_value = config::DEFAULT_TITLE_FIELD, value_name = "FIELD")]
    title_field: String,

    /// Source field holding the description.
    #[arg(long, default_value = config::DEFAULT_DESCRIPTION_FIELD, value_name = "FIELD")]
    description_field: String,

    /// Source field holding the image URL.
    #[arg(long, default_value = config::DEFAULT_IMAGE_FIELD, value_name = "FIELD")]
    image_field: String,

    /// Target Neo4j Bolt endpoint.
    #[arg(long, default_value = config::DEFAULT_NEO4J_URI, value_name = "URI")]
    neo4j_uri: String,

    #[arg(long, default_value = config::DEFAULT_NEO4J_USER, value_name = "USER")]
    neo4j_user: String,

    #[arg(long, default_value = config::DEFAULT_NEO4J_PASSWORD, value_name = "PASSWORD", hide_default_value = true)]
    neo4j_password: String,

    /// Local path of the staging CSV (inside the Neo4j import directory).
    #[arg(long, default_value = config::DEFAULT_STAGING_PATH, value_name = "PATH")]
    staging_path: PathBuf,

    /// The staging CSV as the Neo4j server resolves it.
    #[arg(long, default_value = config::DEFAULT_FILE_URI, value_name = "URI")]
    file_uri: String,

    /// How the bulk statement commits.
    #[arg(long, value_enum, default_value_t = CommitArg::PeriodicCommit)]
    commit_mode: CommitArg,

    /// How page rows reach Neo4j.
    #[arg(long, value_enum, default_value_t = TransportArg::CsvFile)]
    transport: TransportArg,

    /// Create the :Product(productID) uniqueness constraint before loading.
    #[arg(long)]
    create_constraint: bool,

    /// Skip pages that start before this offset.
    #[arg(long, default_value_t = 0, value_name = "OFFSET")]
    start_offset: u64,

    /// Fetch and serialize pages without writing or loading anything.
    #[arg(long)]
    dry_run: bool,

    /// Exit with an error if any page failed.
    #[arg(long)]
    strict: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    log_verbosity: u8,

    /// Output logs as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CommitArg {
    /// USING PERIODIC COMMIT (Neo4j 4.x)
    PeriodicCommit,
    /// CALL { ... } IN TRANSACTIONS (Neo4j 5.x)
    InTransactions,
}

impl From<CommitArg> for CommitMode {
    fn from(arg: CommitArg) -> Self {
        match arg {
            CommitArg::PeriodicCommit => CommitMode::PeriodicCommit,
            CommitArg::InTransactions => CommitMode::InTransactions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TransportArg {
    /// Stage each page as CSV and LOAD CSV it
    CsvFile,
    /// Send each page as a statement parameter
    Unwind,
}

impl From<TransportArg> for Transport {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::CsvFile => Transport::CsvFile,
            TransportArg::Unwind => Transport::Unwind,
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error("{failed} of {pages} pages failed")]
    PagesFailed { failed: usize, pages: usize },
}

impl Cli {
    fn migration_config(&self) -> MigrationConfig {
        MigrationConfig::default()
            .with_page_size(self.page_size)
            .with_staging_path(&self.staging_path)
            .with_file_uri(&self.file_uri)
            .with_commit_mode(self.commit_mode.into())
            .with_transport(self.transport.into())
            .with_resume_from(self.start_offset)
            .with_dry_run(self.dry_run)
    }

    fn source_config(&self) -> SourceConfig {
        SourceConfig {
            uri: self.mongo_uri.clone(),
            database: self.database.clone(),
            collection: self.collection.clone(),
            mapping: FieldMapping {
                product_id: self.id_field.clone(),
                title: self.title_field.clone(),
                description: self.description_field.clone(),
                image_url: self.image_field.clone(),
            },
        }
    }

    fn graph_config(&self) -> GraphConfig {
        GraphConfig {
            uri: self.neo4j_uri.clone(),
            user: self.neo4j_user.clone(),
            password: self.neo4j_password.clone(),
        }
    }
}

/// Stands in for the graph store during a dry run, where no page is loaded.
struct NoLoad;

impl BulkLoader for NoLoad {
    async fn load(&self, _page: &StagedPage<'_>) -> product_import_lib::Result<()> {
        Ok(())
    }
}

/// Directive used when `RUST_LOG` is unset: dependencies stay at `warn`,
/// the import's own crates follow `-v`.
fn default_filter(verbose: u8) -> String {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    format!("warn,product_import_lib={level},product_import={level}")
}

/// Logs go to stderr so stdout carries only the per-page lines.
fn init_tracing(verbose: u8, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2);
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(layer.json()).init();
    } else {
        registry.with(layer.compact()).init();
    }
}

/// Turns migration events into console lines, numbering finished pages.
#[derive(Debug, Default)]
struct Progress {
    total: u64,
    pages: usize,
    finished: usize,
}

impl Progress {
    fn line(&mut self, event: &MigrationEvent) -> Option<String> {
        match event {
            MigrationEvent::Planned { total, pages } => {
                self.total = *total;
                self.pages = *pages;
                Some(format!("Migrating {total} documents in {pages} pages"))
            }
            MigrationEvent::PageChanged { range, state } => {
                if state.is_terminal() {
                    self.finished += 1;
                }
                let outcome = match state {
                    PageState::Done { records } => {
                        format!("complete: {records} records ({} total)", self.total)
                    }
                    PageState::Failed { error } => format!("failed: {error}"),
                    PageState::Pending | PageState::Running => return None,
                };
                Some(format!(
                    "[{}/{}] Batch {range} {outcome}",
                    self.finished, self.pages
                ))
            }
        }
    }
}

/// Prints one line per finished page until the run drops its sender.
fn spawn_reporter(mut rx: mpsc::UnboundedReceiver<MigrationEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut progress = Progress::default();
        while let Some(event) = rx.recv().await {
            if let Some(line) = progress.line(&event) {
                println!("{line}");
            }
        }
    })
}

async fn run_migration<S, L>(
    source: S,
    loader: L,
    config: MigrationConfig,
) -> Result<RunSummary, CliError>
where
    S: ProductSource,
    L: BulkLoader,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let reporter = spawn_reporter(rx);

    let result = Migration::new(source, loader, config)
        .with_events(tx)
        .run()
        .await;

    let _ = reporter.await;
    Ok(result?)
}

fn print_summary(summary: &RunSummary) {
    println!("{}", "=".repeat(60));
    println!(
        "Complete: {} succeeded, {} failed, {} records in {:.1}s",
        summary.succeeded,
        summary.failed.len(),
        summary.records,
        summary.elapsed.as_secs_f64()
    );
    for range in &summary.failed {
        println!("  failed batch {range}");
    }
    println!("{}", "=".repeat(60));
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_tracing(cli.log_verbosity, cli.json);

    let config = cli.migration_config();

    let source = MongoSource::connect(&cli.source_config())
        .await
        .inspect_err(|e| tracing::error!(error = %e, "cannot reach source store"))?;

    let summary = if cli.dry_run {
        run_migration(source, NoLoad, config).await?
    } else {
        let connected =
            Neo4jLoader::connect(&cli.graph_config(), config.commit_mode, config.transport).await;
        let loader = match connected {
            Ok(loader) => loader,
            Err(e) => {
                tracing::error!(error = %e, "cannot reach graph store");
                source.close().await;
                return Err(e.into());
            }
        };
        if cli.create_constraint
            && let Err(e) = loader.ensure_constraint().await
        {
            source.close().await;
            return Err(e.into());
        }
        run_migration(source, loader, config).await?
    };

    print_summary(&summary);

    if cli.strict && !summary.is_clean() {
        return Err(CliError::PagesFailed {
            failed: summary.failed.len(),
            pages: summary.pages,
        });
    }
    Ok(())
}
