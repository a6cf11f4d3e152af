//! Source document store access.
//!
//! The [`ProductSource`] trait covers the two reads the migration needs
//! (count and paged fetch). [`MongoSource`] implements it over a MongoDB
//! collection using an aggregation that renames the source fields into the
//! canonical [`ProductRecord`] columns.

use std::future::Future;

use futures::TryStreamExt;
use mongodb::Client;
use mongodb::Collection;
use mongodb::bson::{Bson, Document, doc};
use tracing::{debug, info};

use crate::config::{FieldMapping, SourceConfig};
use crate::error::{MigrationError, Result};
use crate::types::{ProductField, ProductRecord};

/// A paged, countable collection of products.
///
/// The connection behind a source is opened once and shared by every page;
/// [`close`](ProductSource::close) releases it at the end of the run.
pub trait ProductSource: Send + Sync {
    /// Returns the number of documents in the collection.
    ///
    /// ## Errors
    ///
    /// Returns [`MigrationError::Store`] if the count fails.
    fn count(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Fetches up to `limit` records starting at `offset`, in natural order.
    ///
    /// Returns an empty list when `offset` is past the end of the collection.
    ///
    /// ## Errors
    ///
    /// Returns [`MigrationError::Store`] if the query fails.
    fn fetch_page(
        &self,
        offset: u64,
        limit: u64,
    ) -> impl Future<Output = Result<Vec<ProductRecord>>> + Send;

    /// Releases the underlying connection.
    fn close(self) -> impl Future<Output = ()> + Send
    where
        Self: Sized;
}

/// MongoDB-backed product source.
pub struct MongoSource {
    client: Client,
    collection: Collection<Document>,
    mapping: FieldMapping,
}

impl MongoSource {
    /// Connects to the source store and verifies it is reachable.
    ///
    /// ## Errors
    ///
    /// Returns [`MigrationError::Connection`] if the URI is invalid or the
    /// server does not answer a ping.
    pub async fn connect(config: &SourceConfig) -> Result<Self> {
        let client = Client::with_uri_str(&config.uri)
            .await
            .map_err(|e| MigrationError::connection("source store", e))?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| MigrationError::connection("source store", e))?;

        info!(
            uri = %config.uri,
            database = %config.database,
            collection = %config.collection,
            "connected to source store"
        );

        let collection = client
            .database(&config.database)
            .collection::<Document>(&config.collection);

        Ok(Self {
            client,
            collection,
            mapping: config.mapping.clone(),
        })
    }
}

impl ProductSource for MongoSource {
    async fn count(&self) -> Result<u64> {
        let total = self
            .collection
            .count_documents(doc! {})
            .await
            .map_err(|e| MigrationError::store("count", e))?;
        debug!(total, "counted source documents");
        Ok(total)
    }

    async fn fetch_page(&self, offset: u64, limit: u64) -> Result<Vec<ProductRecord>> {
        let pipeline = projection_pipeline(&self.mapping, offset, limit);
        let cursor = self
            .collection
            .aggregate(pipeline)
            .await
            .map_err(|e| MigrationError::store("fetch", e))?;
        let documents: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| MigrationError::store("fetch", e))?;
        Ok(documents.iter().map(record_from_document).collect())
    }

    async fn close(self) {
        self.client.shutdown().await;
        debug!("source store connection closed");
    }
}

/// Builds the `$project -> $skip -> $limit` aggregation for one page.
///
/// The projection renames every mapped source field onto its canonical
/// column name and drops `_id`.
pub fn projection_pipeline(mapping: &FieldMapping, offset: u64, limit: u64) -> Vec<Document> {
    let mut projection = doc! { "_id": 0 };
    for field in ProductField::ALL {
        projection.insert(field.as_str(), format!("${}", mapping.source_name(field)));
    }

    vec![
        doc! { "$project": projection },
        doc! { "$skip": clamp_i64(offset) },
        doc! { "$limit": clamp_i64(limit) },
    ]
}

/// Converts a projected document into a record.
///
/// Missing and null fields become empty strings; non-string values use
/// their BSON text form.
pub fn record_from_document(document: &Document) -> ProductRecord {
    let mut record = ProductRecord::default();
    for field in ProductField::ALL {
        record.set(field, bson_to_text(document.get(field.as_str())));
    }
    record
}

fn bson_to_text(value: Option<&Bson>) -> String {
    match value {
        None | Some(Bson::Null) | Some(Bson::Undefined) => String::new(),
        Some(Bson::String(s)) => s.clone(),
        Some(Bson::Int32(n)) => n.to_string(),
        Some(Bson::Int64(n)) => n.to_string(),
        Some(Bson::Double(n)) => n.to_string(),
        Some(Bson::Boolean(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
