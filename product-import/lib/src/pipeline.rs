//! The migration orchestrator.
//!
//! A run counts the source collection, plans the pages, and then drives each
//! page through the same ordered stages:
//!
//! 1. fetch the page from the source
//! 2. serialize it to CSV
//! 3. write the staging file
//! 4. bulk-load it into the graph store
//! 5. remove the staging file
//!
//! Pages run strictly one after another. Any stage error stops that page
//! (the remaining stages, cleanup included, are skipped), is logged with the
//! page's offset range, and the run continues with the next page.
//!
//! ## Examples
//!
//! ```no_run
//! use product_import_lib::{
//!     GraphConfig, Migration, MigrationConfig, MongoSource, Neo4jLoader, SourceConfig,
//! };
//!
//! # async fn example() -> product_import_lib::Result<()> {
//! let config = MigrationConfig::default();
//! let source = MongoSource::connect(&SourceConfig::default()).await?;
//! let loader =
//!     Neo4jLoader::connect(&GraphConfig::default(), config.commit_mode, config.transport).await?;
//!
//! let summary = Migration::new(source, loader, config).run().await?;
//! println!("{} of {} pages loaded", summary.succeeded, summary.pages);
//! # Ok(())
//! # }
//! ```

use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::{MigrationConfig, Transport};
use crate::csv_codec::serialize_page;
use crate::error::Result;
use crate::loader::{BulkLoader, StagedPage};
use crate::plan::{PageRange, plan_pages};
use crate::source::ProductSource;
use crate::staging::StagingFile;
use crate::types::{MigrationEvent, PageState, RunSummary};

/// One migration run over a source and a graph loader.
///
/// The source connection is owned by the run and closed when it ends,
/// whether the run completed or the initial count failed.
pub struct Migration<S, L> {
    source: S,
    loader: L,
    config: MigrationConfig,
    staging: StagingFile,
    event_tx: Option<mpsc::UnboundedSender<MigrationEvent>>,
}

impl<S: ProductSource, L: BulkLoader> Migration<S, L> {
    #[must_use]
    pub fn new(source: S, loader: L, config: MigrationConfig) -> Self {
        let staging = StagingFile::new(config.staging_path.clone());
        Self {
            source,
            loader,
            config,
            staging,
            event_tx: None,
        }
    }

    /// Sends page state transitions to `event_tx` as the run progresses.
    ///
    /// Sending never waits on the receiver, so it may be drained while the
    /// run is going or only after it returns. A dropped receiver is ignored.
    #[must_use]
    pub fn with_events(mut self, event_tx: mpsc::UnboundedSender<MigrationEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Runs every planned page and returns the run summary.
    ///
    /// Page failures are recorded in the summary and never end the run.
    ///
    /// ## Errors
    ///
    /// Returns the count error if the source collection cannot be counted.
    /// No page is attempted in that case.
    pub async fn run(self) -> Result<RunSummary> {
        let started = Instant::now();

        let total = match self.source.count().await {
            Ok(total) => total,
            Err(e) => {
                error!(error = %e, "failed to count source collection");
                self.source.close().await;
                return Err(e);
            }
        };

        let pages = plan_pages(total, self.config.page_size, self.config.resume_from);
        info!(
            total,
            pages = pages.len(),
            page_size = self.config.page_size,
            dry_run = self.config.dry_run,
            "planned migration"
        );
        self.emit(MigrationEvent::Planned {
            total,
            pages: pages.len(),
        });

        let mut summary = RunSummary {
            total,
            pages: pages.len(),
            ..RunSummary::default()
        };

        for range in pages {
            self.emit_state(range, PageState::Pending);
            self.emit_state(range, PageState::Running);

            match self.process_page(range).await {
                Ok(records) => {
                    info!(range = %range, records, total, "page complete");
                    summary.succeeded += 1;
                    summary.records += records;
                    self.emit_state(range, PageState::Done { records });
                }
                Err(e) => {
                    error!(range = %range, error = ?e, "page failed");
                    summary.failed.push(range);
                    self.emit_state(range, PageState::Failed { error: e.to_string() });
                }
            }
        }

        summary.elapsed = started.elapsed();
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed.len(),
            records = summary.records,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "migration finished"
        );

        self.source.close().await;
        Ok(summary)
    }

    /// Runs one page through fetch, serialize, stage, load, and cleanup.
    ///
    /// Returns the number of records in the page.
    async fn process_page(&self, range: PageRange) -> Result<usize> {
        let records = self
            .source
            .fetch_page(range.start, self.config.page_size)
            .await?;
        debug!(range = %range, fetched = records.len(), "page fetched");

        let transport = self.config.transport;
        if transport == Transport::CsvFile || self.config.dry_run {
            let csv = serialize_page(&records, &self.config.fields)?;
            debug!(range = %range, bytes = csv.len(), "page serialized");

            if self.config.dry_run {
                return Ok(records.len());
            }

            self.staging.write(&csv).await?;
        }

        let staged = StagedPage {
            range,
            records: &records,
            file_uri: &self.config.file_uri,
            staging_path: (transport == Transport::CsvFile).then(|| self.staging.path()),
        };
        self.loader.load(&staged).await?;
        debug!(range = %range, "page loaded");

        if transport == Transport::CsvFile {
            self.staging.remove().await;
        }

        Ok(records.len())
    }

    fn emit_state(&self, range: PageRange, state: PageState) {
        self.emit(MigrationEvent::PageChanged { range, state });
    }

    fn emit(&self, event: MigrationEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }
}
