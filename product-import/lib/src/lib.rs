//! Product import library: pages products out of a document store and bulk
//! loads them into a graph store.
//!
//! ## Core Types
//!
//! - [`ProductRecord`] - A product projected into the four canonical columns
//! - [`PageRange`] - The offsets covered by one page
//! - [`PageState`] - Lifecycle of a page (pending, running, done, failed)
//! - [`RunSummary`] - Outcome of a whole run
//!
//! ## Pipeline Stages
//!
//! - [`ProductSource`] / [`MongoSource`] - Counts and pages the source collection
//! - [`serialize_page`] / [`parse_page`] - CSV encoding of a page
//! - [`StagingFile`] - The file handed to the graph server's `LOAD CSV`
//! - [`BulkLoader`] / [`Neo4jLoader`] - Merges a page into the graph store
//! - [`Migration`] - Drives every page through the stages in order
//!
//! ## Configuration
//!
//! - [`MigrationConfig`], [`SourceConfig`], [`GraphConfig`] - Settings whose
//!   defaults are the fixed constants in [`config`]

pub mod config;
mod csv_codec;
mod error;
mod loader;
mod pipeline;
mod plan;
mod source;
mod staging;
mod types;

pub use config::{CommitMode, FieldMapping, GraphConfig, MigrationConfig, SourceConfig, Transport};
pub use csv_codec::{parse_page, serialize_page};
pub use error::{MigrationError, Result};
pub use loader::{
    BulkLoader, Neo4jLoader, StagedPage, bulk_upsert_statement, records_to_rows,
    unwind_upsert_statement,
};
pub use pipeline::Migration;
pub use plan::{PageRange, page_offsets, plan_pages};
pub use source::{MongoSource, ProductSource, projection_pipeline, record_from_document};
pub use staging::StagingFile;
pub use types::{MigrationEvent, PageState, ProductField, ProductRecord, RunSummary};
