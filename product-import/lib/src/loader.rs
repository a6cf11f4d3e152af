//! Bulk upsert into the graph store.
//!
//! Products are merged on `productID`. Descriptive fields are only written
//! when the node is created, so reloading a product never overwrites the
//! title, description, or image URL stored by the first load.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;

use neo4rs::{BoltType, Graph, query};
use tracing::{debug, info};

use crate::config::{CommitMode, GraphConfig, Transport};
use crate::error::{MigrationError, Result};
use crate::plan::PageRange;
use crate::types::{ProductField, ProductRecord};

const MERGE_PRODUCT: &str = "MERGE (product:Product {productID: row.productID})
ON CREATE SET product.title = row.title,
              product.description = row.description,
              product.imageUrl = row.imageUrl";

const PRODUCT_CONSTRAINT: &str = "CREATE CONSTRAINT product_id IF NOT EXISTS
FOR (product:Product) REQUIRE product.productID IS UNIQUE";

/// One page, ready for the loader.
#[derive(Debug, Clone, Copy)]
pub struct StagedPage<'a> {
    pub range: PageRange,
    /// The page's records, in source order.
    pub records: &'a [ProductRecord],
    /// The staging file as the graph server resolves it (`$file`).
    pub file_uri: &'a str,
    /// Local staging file, if the page was written to disk.
    pub staging_path: Option<&'a Path>,
}

/// A graph store that can bulk-upsert one page of products.
pub trait BulkLoader: Send + Sync {
    /// Merges every product in `page` into the graph store.
    ///
    /// ## Errors
    ///
    /// Returns [`MigrationError::Load`] if the statement fails.
    fn load(&self, page: &StagedPage<'_>) -> impl Future<Output = Result<()>> + Send;
}

/// Returns the `LOAD CSV` statement for `mode`. The file URI is bound to `$file`.
pub fn bulk_upsert_statement(mode: CommitMode) -> String {
    match mode {
        CommitMode::PeriodicCommit => format!(
            "USING PERIODIC COMMIT\nLOAD CSV WITH HEADERS FROM $file AS row\n{MERGE_PRODUCT}"
        ),
        CommitMode::InTransactions => format!(
            "LOAD CSV WITH HEADERS FROM $file AS row\nCALL {{\n  WITH row\n  {MERGE_PRODUCT}\n}} IN TRANSACTIONS"
        ),
    }
}

/// Returns the `UNWIND` statement that merges rows bound to `$rows`.
pub fn unwind_upsert_statement() -> String {
    format!("UNWIND $rows AS row\n{MERGE_PRODUCT}")
}

/// Converts records into the `$rows` parameter for [`unwind_upsert_statement`].
pub fn records_to_rows(records: &[ProductRecord]) -> Vec<HashMap<String, BoltType>> {
    records
        .iter()
        .map(|record| {
            let mut row: HashMap<String, BoltType> = HashMap::new();
            for field in ProductField::ALL {
                row.insert(field.as_str().to_string(), record.get(field).to_string().into());
            }
            row
        })
        .collect()
}

/// Neo4j loader over a pooled Bolt connection.
///
/// Each [`load`](BulkLoader::load) call is one session: a connection is
/// checked out of the pool for the statement and returned when the call
/// finishes, on success and on error alike. Statements run in auto-commit
/// mode, which both `USING PERIODIC COMMIT` and `IN TRANSACTIONS` require.
pub struct Neo4jLoader {
    graph: Graph,
    commit_mode: CommitMode,
    transport: Transport,
}

impl Neo4jLoader {
    /// Connects to the graph store and runs a trivial statement on it.
    ///
    /// Building the pool alone opens no connection, so the round trip is what
    /// surfaces a down server or bad credentials before any page is fetched.
    ///
    /// ## Errors
    ///
    /// Returns [`MigrationError::Connection`] if the server is unreachable or
    /// rejects the credentials.
    pub async fn connect(
        config: &GraphConfig,
        commit_mode: CommitMode,
        transport: Transport,
    ) -> Result<Self> {
        let graph = Graph::new(&config.uri, &config.user, &config.password)
            .await
            .map_err(|e| MigrationError::connection("graph store", e))?;
        graph
            .run(query("RETURN 1"))
            .await
            .map_err(|e| MigrationError::connection("graph store", e))?;
        info!(uri = %config.uri, "connected to graph store");
        Ok(Self {
            graph,
            commit_mode,
            transport,
        })
    }

    /// Creates the `:Product(productID)` uniqueness constraint if absent.
    ///
    /// ## Errors
    ///
    /// Returns [`MigrationError::Load`] if the server rejects the statement.
    pub async fn ensure_constraint(&self) -> Result<()> {
        self.graph
            .run(query(PRODUCT_CONSTRAINT))
            .await
            .map_err(|e| MigrationError::Load(e.to_string()))?;
        debug!("product uniqueness constraint ensured");
        Ok(())
    }
}

impl BulkLoader for Neo4jLoader {
    async fn load(&self, page: &StagedPage<'_>) -> Result<()> {
        let statement = match self.transport {
            Transport::CsvFile => {
                query(&bulk_upsert_statement(self.commit_mode)).param("file", page.file_uri)
            }
            Transport::Unwind => {
                query(&unwind_upsert_statement()).param("rows", records_to_rows(page.records))
            }
        };

        debug!(range = %page.range, transport = ?self.transport, "running bulk statement");
        self.graph
            .run(statement)
            .await
            .map_err(|e| MigrationError::Load(e.to_string()))
    }
}
