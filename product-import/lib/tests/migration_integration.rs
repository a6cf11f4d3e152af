//! Integration tests for the migration orchestrator.
//!
//! These tests drive full runs against an in-memory source collection and an
//! in-memory graph that applies the same merge rules as the bulk statement:
//! nodes are keyed on `productID` and descriptive fields are set on create only.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use product_import_lib::{
    BulkLoader, MigrationConfig, MigrationError, MigrationEvent, Migration, PageRange, PageState,
    ProductRecord, ProductSource, Result, StagedPage, Transport, parse_page,
};
use tempfile::{TempDir, tempdir};
use tokio::sync::mpsc;

// ============================================================================
// Test doubles
// ============================================================================

#[derive(Default)]
struct MemorySource {
    documents: Vec<ProductRecord>,
    failing_offsets: HashSet<u64>,
    fail_count: bool,
    fetches: Arc<Mutex<Vec<u64>>>,
    closed: Arc<AtomicBool>,
}

impl MemorySource {
    fn with_products(count: usize) -> Self {
        let documents = (0..count)
            .map(|i| {
                ProductRecord::new(
                    format!("P{i:05}"),
                    format!("Product {i}"),
                    format!("Description, number {i}"),
                    format!("http://img/{i}.jpg"),
                )
            })
            .collect();
        Self {
            documents,
            ..Self::default()
        }
    }

    fn failing_at(mut self, offset: u64) -> Self {
        self.failing_offsets.insert(offset);
        self
    }
}

impl ProductSource for MemorySource {
    async fn count(&self) -> Result<u64> {
        if self.fail_count {
            return Err(MigrationError::store("count", "server selection timeout"));
        }
        Ok(self.documents.len() as u64)
    }

    async fn fetch_page(&self, offset: u64, limit: u64) -> Result<Vec<ProductRecord>> {
        self.fetches.lock().unwrap().push(offset);
        if self.failing_offsets.contains(&offset) {
            return Err(MigrationError::store("fetch", "cursor killed"));
        }
        Ok(self
            .documents
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn close(self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// In-memory graph keyed on productID with create-only descriptive fields.
#[derive(Clone, Default)]
struct MemoryGraph {
    nodes: Arc<Mutex<HashMap<String, ProductRecord>>>,
    loads: Arc<Mutex<Vec<PageRange>>>,
    failing_ranges: Arc<HashSet<u64>>,
    /// Deletes the staging file before returning, so cleanup finds nothing.
    consume_file: bool,
}

impl MemoryGraph {
    fn node(&self, id: &str) -> Option<ProductRecord> {
        self.nodes.lock().unwrap().get(id).cloned()
    }

    fn node_count(&self) -> usize {
        self.nodes.lock().unwrap().len()
    }

    fn merge(&self, rows: Vec<ProductRecord>) {
        let mut nodes = self.nodes.lock().unwrap();
        for row in rows {
            nodes.entry(row.product_id.clone()).or_insert(row);
        }
    }
}

impl BulkLoader for MemoryGraph {
    async fn load(&self, page: &StagedPage<'_>) -> Result<()> {
        self.loads.lock().unwrap().push(page.range);
        if self.failing_ranges.contains(&page.range.start) {
            return Err(MigrationError::Load("Neo.TransientError.General".to_string()));
        }

        let rows = match page.staging_path {
            Some(path) => {
                let text = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| MigrationError::io(path, e))?;
                if self.consume_file {
                    let _ = tokio::fs::remove_file(path).await;
                }
                parse_page(&text)?
            }
            None => page.records.to_vec(),
        };

        self.merge(rows);
        Ok(())
    }
}

fn config_in(dir: &TempDir) -> (MigrationConfig, PathBuf) {
    let path = dir.path().join("import").join("import_data.csv");
    (MigrationConfig::default().with_staging_path(&path), path)
}

// ============================================================================
// Paging
// ============================================================================

#[tokio::test]
async fn three_pages_for_2500_documents() {
    let dir = tempdir().unwrap();
    let (config, staging) = config_in(&dir);
    let source = MemorySource::with_products(2500);
    let fetches = source.fetches.clone();
    let closed = source.closed.clone();
    let graph = MemoryGraph::default();

    let summary = Migration::new(source, graph.clone(), config)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.total, 2500);
    assert_eq!(summary.pages, 3);
    assert_eq!(summary.succeeded, 3);
    assert!(summary.is_clean());
    assert_eq!(summary.records, 2500);
    assert_eq!(*fetches.lock().unwrap(), vec![0, 1000, 2000]);

    let loads = graph.loads.lock().unwrap().clone();
    assert_eq!(loads.last(), Some(&PageRange { start: 2000, end: 2500 }));
    assert_eq!(graph.node_count(), 2500);
    assert_eq!(
        graph.node("P02499").map(|n| n.description),
        Some("Description, number 2499".to_string())
    );

    assert!(!staging.exists(), "staging file should be removed after each page");
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn empty_collection_runs_no_pages() {
    let dir = tempdir().unwrap();
    let (config, _) = config_in(&dir);
    let source = MemorySource::default();
    let closed = source.closed.clone();
    let graph = MemoryGraph::default();

    let summary = Migration::new(source, graph.clone(), config)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.pages, 0);
    assert!(graph.loads.lock().unwrap().is_empty());
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn resume_skips_earlier_pages() {
    let dir = tempdir().unwrap();
    let (config, _) = config_in(&dir);
    let source = MemorySource::with_products(2500);
    let fetches = source.fetches.clone();

    let summary = Migration::new(source, MemoryGraph::default(), config.with_resume_from(1200))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.pages, 2);
    assert_eq!(*fetches.lock().unwrap(), vec![1000, 2000]);
}

// ============================================================================
// Failure handling
// ============================================================================

#[tokio::test]
async fn fetch_failure_does_not_stop_next_page() {
    let dir = tempdir().unwrap();
    let (config, _) = config_in(&dir);
    let source = MemorySource::with_products(2500).failing_at(1000);
    let fetches = source.fetches.clone();
    let graph = MemoryGraph::default();

    let summary = Migration::new(source, graph.clone(), config)
        .run()
        .await
        .unwrap();

    assert_eq!(*fetches.lock().unwrap(), vec![0, 1000, 2000]);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, vec![PageRange { start: 1000, end: 2000 }]);
    assert_eq!(graph.node_count(), 1500);
    assert!(graph.node("P01000").is_none());
}

#[tokio::test]
async fn load_failure_skips_cleanup_and_continues() {
    let dir = tempdir().unwrap();
    let (config, staging) = config_in(&dir);
    let source = MemorySource::with_products(1500);
    let graph = MemoryGraph {
        failing_ranges: Arc::new(HashSet::from([1000])),
        ..MemoryGraph::default()
    };

    let summary = Migration::new(source, graph.clone(), config)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, vec![PageRange { start: 1000, end: 1500 }]);

    // The failed page's file is left behind for inspection.
    let leftover = std::fs::read_to_string(&staging).unwrap();
    let rows = parse_page(&leftover).unwrap();
    assert_eq!(rows.len(), 500);
    assert_eq!(rows[0].product_id, "P01000");
}

#[tokio::test]
async fn missing_staging_file_at_cleanup_is_not_an_error() {
    let dir = tempdir().unwrap();
    let (config, _) = config_in(&dir);
    let source = MemorySource::with_products(2100);
    let graph = MemoryGraph {
        consume_file: true,
        ..MemoryGraph::default()
    };

    let summary = Migration::new(source, graph.clone(), config)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 3);
    assert!(summary.is_clean());
}

#[tokio::test]
async fn count_failure_aborts_before_any_page() {
    let dir = tempdir().unwrap();
    let (config, _) = config_in(&dir);
    let source = MemorySource {
        fail_count: true,
        ..MemorySource::with_products(10)
    };
    let fetches = source.fetches.clone();
    let closed = source.closed.clone();

    let err = Migration::new(source, MemoryGraph::default(), config)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, MigrationError::Store { operation: "count", .. }));
    assert!(fetches.lock().unwrap().is_empty());
    assert!(closed.load(Ordering::SeqCst), "source must be closed on the error path");
}

// ============================================================================
// Merge semantics
// ============================================================================

#[tokio::test]
async fn reload_keeps_descriptive_fields_from_first_load() {
    let dir = tempdir().unwrap();
    let graph = MemoryGraph::default();

    for title in ["T1", "T2"] {
        let (config, _) = config_in(&dir);
        let source = MemorySource {
            documents: vec![ProductRecord::new("A", title, "", "")],
            ..MemorySource::default()
        };
        Migration::new(source, graph.clone(), config)
            .run()
            .await
            .unwrap();
    }

    assert_eq!(graph.node_count(), 1);
    assert_eq!(graph.node("A").map(|n| n.title), Some("T1".to_string()));
}

// ============================================================================
// Modes
// ============================================================================

#[tokio::test]
async fn unwind_transport_never_touches_staging_file() {
    let dir = tempdir().unwrap();
    let (config, staging) = config_in(&dir);
    let source = MemorySource::with_products(1200);
    let graph = MemoryGraph::default();

    let summary = Migration::new(source, graph.clone(), config.with_transport(Transport::Unwind))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 2);
    assert_eq!(graph.node_count(), 1200);
    assert!(!staging.parent().unwrap().exists());
}

#[tokio::test]
async fn dry_run_fetches_but_never_loads() {
    let dir = tempdir().unwrap();
    let (config, staging) = config_in(&dir);
    let source = MemorySource::with_products(1200);
    let fetches = source.fetches.clone();
    let graph = MemoryGraph::default();

    let summary = Migration::new(source, graph.clone(), config.with_dry_run(true))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.records, 1200);
    assert_eq!(fetches.lock().unwrap().len(), 2);
    assert!(graph.loads.lock().unwrap().is_empty());
    assert!(!staging.exists());
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn events_follow_page_state_machine() {
    let dir = tempdir().unwrap();
    let (config, _) = config_in(&dir);
    let source = MemorySource::with_products(1500).failing_at(0);
    let (tx, mut rx) = mpsc::unbounded_channel();

    Migration::new(source, MemoryGraph::default(), config)
        .with_events(tx)
        .run()
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert!(matches!(
        events[0],
        MigrationEvent::Planned { total: 1500, pages: 2 }
    ));

    let first = PageRange { start: 0, end: 1000 };
    let second = PageRange { start: 1000, end: 1500 };
    let states: Vec<(PageRange, PageState)> = events[1..]
        .iter()
        .map(|e| match e {
            MigrationEvent::PageChanged { range, state } => (*range, state.clone()),
            other => panic!("unexpected event {other:?}"),
        })
        .collect();

    assert_eq!(states.len(), 6);
    assert_eq!(states[0], (first, PageState::Pending));
    assert_eq!(states[1], (first, PageState::Running));
    assert!(matches!(&states[2], (r, PageState::Failed { error }) if *r == first && error.contains("cursor killed")));
    assert_eq!(states[3], (second, PageState::Pending));
    assert_eq!(states[4], (second, PageState::Running));
    assert_eq!(states[5], (second, PageState::Done { records: 500 }));
}

#[tokio::test]
async fn undrained_receiver_never_stalls_a_long_run() {
    let dir = tempdir().unwrap();
    let (config, _) = config_in(&dir);
    let config = config.with_page_size(10);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let run = Migration::new(MemorySource::with_products(1000), MemoryGraph::default(), config)
        .with_events(tx)
        .run();
    let summary = tokio::time::timeout(std::time::Duration::from_secs(10), run)
        .await
        .expect("run should finish without anyone reading events")
        .unwrap();
    assert_eq!(summary.pages, 100);

    let mut planned = 0;
    let mut finished = 0;
    while let Some(event) = rx.recv().await {
        match event {
            MigrationEvent::Planned { pages, .. } => {
                assert_eq!(pages, 100);
                planned += 1;
            }
            MigrationEvent::PageChanged { state, .. } if state.is_terminal() => finished += 1,
            MigrationEvent::PageChanged { .. } => {}
        }
    }
    assert_eq!(planned, 1);
    assert_eq!(finished, 100);
}
