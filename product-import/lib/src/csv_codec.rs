//! CSV encoding of a page.
//!
//! The staging file always starts with a header row naming the columns in
//! the configured order, followed by one row per record. Quoting follows the
//! `csv` crate defaults (quote only when needed, double embedded quotes).

use csv::{ReaderBuilder, WriterBuilder};

use crate::error::{MigrationError, Result};
use crate::types::{ProductField, ProductRecord};

/// Serializes `records` with a header row matching `fields`.
///
/// Columns are emitted in `fields` order regardless of how the record stores
/// them. An empty page yields just the header row.
///
/// ## Errors
///
/// Returns [`MigrationError::Format`] if the writer rejects a row.
///
/// ## Examples
///
/// ```
/// use product_import_lib::{ProductField, ProductRecord, serialize_page};
///
/// let csv = serialize_page(&[], &ProductField::ALL).unwrap();
/// assert_eq!(csv, "productID,title,description,imageUrl\n");
/// ```
pub fn serialize_page(records: &[ProductRecord], fields: &[ProductField]) -> Result<String> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(Vec::new());

    writer.write_record(fields.iter().map(|f| f.as_str()))?;
    for record in records {
        writer.write_record(fields.iter().map(|&f| record.get(f)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| MigrationError::Format(csv::Error::from(e.into_error())))?;

    // Every field is a `String`, so the output is always valid UTF-8.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Parses a serialized page back into records.
///
/// Columns are matched by header name; unknown columns are ignored and
/// absent ones read as empty.
///
/// ## Errors
///
/// Returns [`MigrationError::Format`] on malformed CSV.
pub fn parse_page(text: &str) -> Result<Vec<ProductRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for row in reader.deserialize::<ProductRecord>() {
        records.push(row?);
    }
    Ok(records)
}
