//! Migration settings and their fixed defaults.
//!
//! Every setting has a constant default; [`MigrationConfig::default`] with no
//! overrides reproduces the fixed settings the import was written against.

use std::path::PathBuf;

use crate::types::ProductField;

/// Documents per page.
pub const DEFAULT_PAGE_SIZE: u64 = 1000;

/// Source store connection string.
pub const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017";

/// Source database name.
pub const DEFAULT_DATABASE: &str = "natural_med";

/// Source collection name.
pub const DEFAULT_COLLECTION: &str = "full_health_care_meta";

/// Graph store Bolt endpoint.
pub const DEFAULT_NEO4J_URI: &str = "bolt://localhost:7687";

pub const DEFAULT_NEO4J_USER: &str = "neo4j";

pub const DEFAULT_NEO4J_PASSWORD: &str = "natural_med";

/// Local path of the staging file. Must sit inside the graph server's
/// import directory for `LOAD CSV` to see it.
pub const DEFAULT_STAGING_PATH: &str = "import/import_data.csv";

/// The staging file as the graph server resolves it.
pub const DEFAULT_FILE_URI: &str = "file:///import_data.csv";

/// Source field renamed to `productID`.
pub const DEFAULT_ID_FIELD: &str = "asin";

pub const DEFAULT_TITLE_FIELD: &str = "title";

pub const DEFAULT_DESCRIPTION_FIELD: &str = "description";

/// Source field renamed to `imageUrl`.
pub const DEFAULT_IMAGE_FIELD: &str = "imUrl";

/// Source document field names projected onto each [`ProductField`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub product_id: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
}

impl FieldMapping {
    /// Returns the source field name for `field`.
    pub fn source_name(&self, field: ProductField) -> &str {
        match field {
            ProductField::ProductId => &self.product_id,
            ProductField::Title => &self.title,
            ProductField::Description => &self.description,
            ProductField::ImageUrl => &self.image_url,
        }
    }
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            product_id: DEFAULT_ID_FIELD.to_string(),
            title: DEFAULT_TITLE_FIELD.to_string(),
            description: DEFAULT_DESCRIPTION_FIELD.to_string(),
            image_url: DEFAULT_IMAGE_FIELD.to_string(),
        }
    }
}

/// How the bulk statement batches its commits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommitMode {
    /// `USING PERIODIC COMMIT` (Neo4j 4.x and earlier).
    #[default]
    PeriodicCommit,
    /// `CALL { ... } IN TRANSACTIONS` (Neo4j 5.x).
    InTransactions,
}

/// How a page's rows reach the graph store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Transport {
    /// Write the page to the staging file and `LOAD CSV` it server-side.
    #[default]
    CsvFile,
    /// Send the rows as a statement parameter; no staging file is written.
    Unwind,
}

/// Settings for one migration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    /// Documents per page; clamped to at least one.
    pub page_size: u64,
    /// Column order of the staging file.
    pub fields: Vec<ProductField>,
    /// Local staging file path.
    pub staging_path: PathBuf,
    /// Staging file URI as seen by the graph server.
    pub file_uri: String,
    pub commit_mode: CommitMode,
    pub transport: Transport,
    /// Skip pages that start below this offset.
    pub resume_from: u64,
    /// Fetch and serialize only; never stage or load.
    pub dry_run: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            fields: ProductField::ALL.to_vec(),
            staging_path: PathBuf::from(DEFAULT_STAGING_PATH),
            file_uri: DEFAULT_FILE_URI.to_string(),
            commit_mode: CommitMode::default(),
            transport: Transport::default(),
            resume_from: 0,
            dry_run: false,
        }
    }
}

impl MigrationConfig {
    /// Sets the page size. Zero is raised to one.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    #[must_use]
    pub fn with_staging_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.staging_path = path.into();
        self
    }

    #[must_use]
    pub fn with_file_uri(mut self, uri: impl Into<String>) -> Self {
        self.file_uri = uri.into();
        self
    }

    #[must_use]
    pub fn with_commit_mode(mut self, mode: CommitMode) -> Self {
        self.commit_mode = mode;
        self
    }

    #[must_use]
    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    #[must_use]
    pub fn with_resume_from(mut self, offset: u64) -> Self {
        self.resume_from = offset;
        self
    }

    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Connection settings for the source document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
    pub mapping: FieldMapping,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_MONGO_URI.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            mapping: FieldMapping::default(),
        }
    }
}

/// Connection settings for the target graph store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_NEO4J_URI.to_string(),
            user: DEFAULT_NEO4J_USER.to_string(),
            password: DEFAULT_NEO4J_PASSWORD.to_string(),
        }
    }
}
