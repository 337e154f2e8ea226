//! Page partitioning: split a document into contiguous per-worker ranges.
//!
//! Table extraction is CPU-bound, so the orchestrator assigns each worker a
//! contiguous run of pages. Ranges are sized by ceiling division so the last
//! range is never more than one page smaller than the rest, and the range
//! count never exceeds the page count.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// A contiguous run of 0-based page indices assigned to one worker.
///
/// `end` is exclusive. Display uses 1-based page numbers, matching what a
/// payroll auditor sees in their PDF viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    /// Number of pages in this range.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// The 0-based page indices in this range, in document order.
    pub fn pages(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len() == 1 {
            write!(f, "page {}", self.start + 1)
        } else {
            write!(f, "pages {}-{}", self.start + 1, self.end)
        }
    }
}

/// Partition `total_pages` into at most `workers` contiguous ranges.
///
/// Range count is `min(workers, total_pages)`; range size is the ceiling of
/// `total_pages / workers`, so all ranges are balanced within one page.
/// An empty document yields no ranges.
pub fn partition(total_pages: usize, workers: usize) -> Vec<PageRange> {
    if total_pages == 0 {
        return Vec::new();
    }

    let workers = workers.clamp(1, total_pages);
    let chunk_size = total_pages.div_ceil(workers);

    (0..total_pages)
        .step_by(chunk_size)
        .map(|start| PageRange {
            start,
            end: (start + chunk_size).min(total_pages),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn covered(ranges: &[PageRange]) -> Vec<usize> {
        ranges.iter().flat_map(|r| r.pages()).collect()
    }

    #[test]
    fn empty_document_yields_no_ranges() {
        assert!(partition(0, 8).is_empty());
    }

    #[test]
    fn single_page_single_range() {
        assert_eq!(partition(1, 8), vec![PageRange { start: 0, end: 1 }]);
    }

    #[test]
    fn ranges_cover_all_pages_exactly_once() {
        for total in 1..50 {
            for workers in 1..12 {
                let ranges = partition(total, workers);
                assert_eq!(
                    covered(&ranges),
                    (0..total).collect::<Vec<_>>(),
                    "total={total} workers={workers}"
                );
                assert!(ranges.len() <= workers.min(total));
            }
        }
    }

    #[test]
    fn ranges_are_balanced_within_one_chunk() {
        let ranges = partition(10, 4);
        // Ceiling division: 10 pages over 4 workers gives size-3 chunks,
        // so only 4 ranges with the last holding the single remainder page.
        assert_eq!(
            ranges,
            vec![
                PageRange { start: 0, end: 3 },
                PageRange { start: 3, end: 6 },
                PageRange { start: 6, end: 9 },
                PageRange { start: 9, end: 10 },
            ]
        );
    }

    #[test]
    fn more_workers_than_pages() {
        let ranges = partition(3, 16);
        assert_eq!(ranges.len(), 3);
        assert!(ranges.iter().all(|r| r.len() == 1));
    }

    #[test]
    fn display_is_one_based() {
        assert_eq!(PageRange { start: 0, end: 1 }.to_string(), "page 1");
        assert_eq!(PageRange { start: 3, end: 6 }.to_string(), "pages 4-6");
    }
}
