//! Core data types for the product import.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::plan::PageRange;

/// A canonical column of a [`ProductRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductField {
    /// Unique product identifier; the graph merge key.
    ProductId,
    Title,
    Description,
    ImageUrl,
}

impl ProductField {
    /// All fields in the column order used by the staging file.
    pub const ALL: [ProductField; 4] = [
        ProductField::ProductId,
        ProductField::Title,
        ProductField::Description,
        ProductField::ImageUrl,
    ];

    /// Returns the column header for this field.
    pub fn as_str(self) -> &'static str {
        match self {
            ProductField::ProductId => "productID",
            ProductField::Title => "title",
            ProductField::Description => "description",
            ProductField::ImageUrl => "imageUrl",
        }
    }
}

impl fmt::Display for ProductField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A product projected out of a source document.
///
/// No field is validated; anything missing in the source is an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProductRecord {
    #[serde(rename = "productID")]
    pub product_id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
}

impl ProductRecord {
    /// Creates a record from its four field values.
    ///
    /// ## Examples
    ///
    /// ```
    /// use product_import_lib::{ProductField, ProductRecord};
    ///
    /// let record = ProductRecord::new("B0001", "Tea", "Green tea", "http://img/1.jpg");
    /// assert_eq!(record.get(ProductField::ProductId), "B0001");
    /// ```
    pub fn new(
        product_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        image_url: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            title: title.into(),
            description: description.into(),
            image_url: image_url.into(),
        }
    }

    /// Returns the value of `field`.
    pub fn get(&self, field: ProductField) -> &str {
        match field {
            ProductField::ProductId => &self.product_id,
            ProductField::Title => &self.title,
            ProductField::Description => &self.description,
            ProductField::ImageUrl => &self.image_url,
        }
    }

    /// Sets the value of `field`.
    pub fn set(&mut self, field: ProductField, value: impl Into<String>) {
        let slot = match field {
            ProductField::ProductId => &mut self.product_id,
            ProductField::Title => &mut self.title,
            ProductField::Description => &mut self.description,
            ProductField::ImageUrl => &mut self.image_url,
        };
        *slot = value.into();
    }
}

/// The processing state of one page.
///
/// A page moves `Pending -> Running -> Done | Failed` exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageState {
    /// Page is planned but not yet started.
    #[default]
    Pending,
    /// Page is being fetched, staged, or loaded.
    Running,
    /// Page was loaded into the graph store.
    Done {
        /// Number of records in the page.
        records: usize,
    },
    /// Page failed; later pages still run.
    Failed {
        /// The error message describing why the page failed.
        error: String,
    },
}

impl PageState {
    /// Returns true once the page can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PageState::Done { .. } | PageState::Failed { .. })
    }
}

/// Event emitted while a migration runs.
#[derive(Debug, Clone)]
pub enum MigrationEvent {
    /// The source collection was counted and pages were planned.
    Planned {
        /// Total documents in the source collection.
        total: u64,
        /// Number of pages that will be processed.
        pages: usize,
    },
    /// A page changed state.
    PageChanged {
        /// The offsets covered by the page.
        range: PageRange,
        /// The new state of the page.
        state: PageState,
    },
}

/// Outcome of a whole migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Documents reported by the source count.
    pub total: u64,
    /// Pages attempted.
    pub pages: usize,
    /// Pages that reached [`PageState::Done`].
    pub succeeded: usize,
    /// Pages that reached [`PageState::Failed`], with their ranges.
    pub failed: Vec<PageRange>,
    /// Records handed to the loader across all successful pages.
    pub records: usize,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
}

impl RunSummary {
    /// Returns true when no page failed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
