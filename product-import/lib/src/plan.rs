//! Page planning.
//!
//! Turns a document count and a page size into the ordered list of
//! offset ranges the orchestrator walks through.

use std::fmt;

/// A half-open range of source offsets, `start..end`, processed as one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageRange {
    /// First offset of the page (the `$skip` value).
    pub start: u64,
    /// One past the last offset expected in the page.
    pub end: u64,
}

impl PageRange {
    /// Number of documents the page is expected to hold.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Returns true if the page covers no offsets.
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Returns the page offsets `0, P, 2P, ...` strictly below `total`.
///
/// A page size of zero is treated as one.
///
/// ## Examples
///
/// ```
/// use product_import_lib::page_offsets;
///
/// assert_eq!(page_offsets(2500, 1000), vec![0, 1000, 2000]);
/// assert!(page_offsets(0, 1000).is_empty());
/// ```
pub fn page_offsets(total: u64, page_size: u64) -> Vec<u64> {
    let step = page_size.max(1);
    let mut offsets = Vec::with_capacity(total.div_ceil(step) as usize);
    let mut offset = 0;
    while offset < total {
        offsets.push(offset);
        offset += step;
    }
    offsets
}

/// Plans the page ranges for a run.
///
/// Pages starting before `resume_from` are skipped. `resume_from` is rounded
/// down to a page boundary so a resumed run never splits a page.
pub fn plan_pages(total: u64, page_size: u64, resume_from: u64) -> Vec<PageRange> {
    let step = page_size.max(1);
    let first = resume_from - resume_from % step;
    page_offsets(total, step)
        .into_iter()
        .filter(|&start| start >= first)
        .map(|start| PageRange {
            start,
            end: (start + step).min(total),
        })
        .collect()
}
