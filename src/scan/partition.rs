use parking_lot::Mutex;
use tracing::trace;

/// Largest block number a tid can address; the last range is widened to it so
/// pages appended after bind are still read.
pub const POSTGRES_TID_MAX: u64 = 4_294_967_295;

/// Half-open page range `[min, max)` handed to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub min: u64,
    pub max: u64,
}

/// Hands out consecutive page ranges to workers.
#[derive(Debug)]
pub struct PartitionCoordinator {
    pages_approx: u64,
    pages_per_task: u64,
    cursor: Mutex<u64>,
}

impl PartitionCoordinator {
    #[must_use]
    pub fn new(pages_approx: u64, pages_per_task: u64) -> Self {
        Self {
            pages_approx,
            pages_per_task: pages_per_task.max(1),
            cursor: Mutex::new(0),
        }
    }

    /// Next unclaimed range, or `None` once every page has been handed out.
    pub fn next_range(&self) -> Option<PageRange> {
        let mut cursor = self.cursor.lock();
        if *cursor >= self.pages_approx {
            return None;
        }
        let min = *cursor;
        let mut max = min + self.pages_per_task;
        if max >= self.pages_approx {
            max = POSTGRES_TID_MAX;
        }
        *cursor += self.pages_per_task;
        trace!(min, max, "claimed page range");
        Some(PageRange { min, max })
    }

    /// Worker-count hint: one per task, at least one, optionally capped.
    #[must_use]
    pub fn max_workers(&self, cap: Option<usize>) -> usize {
        let tasks = (self.pages_approx / self.pages_per_task).max(1);
        let tasks = usize::try_from(tasks).unwrap_or(usize::MAX);
        match cap {
            Some(cap) => tasks.min(cap.max(1)),
            None => tasks,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_ranges_cover_table() {
        let coordinator = PartitionCoordinator::new(2500, 1000);
        assert_eq!(coordinator.next_range(), Some(PageRange { min: 0, max: 1000 }));
        assert_eq!(coordinator.next_range(), Some(PageRange { min: 1000, max: 2000 }));
        assert_eq!(
            coordinator.next_range(),
            Some(PageRange {
                min: 2000,
                max: POSTGRES_TID_MAX
            })
        );
        assert_eq!(coordinator.next_range(), None);
    }

    #[test]
    fn test_single_page_table() {
        let coordinator = PartitionCoordinator::new(1, 1000);
        assert_eq!(
            coordinator.next_range(),
            Some(PageRange {
                min: 0,
                max: POSTGRES_TID_MAX
            })
        );
        assert_eq!(coordinator.next_range(), None);
    }

    #[test]
    fn test_exact_multiple_widens_last_range() {
        let coordinator = PartitionCoordinator::new(2000, 1000);
        assert_eq!(coordinator.next_range().unwrap().max, 1000);
        assert_eq!(coordinator.next_range().unwrap().max, POSTGRES_TID_MAX);
        assert!(coordinator.next_range().is_none());
    }

    #[test]
    fn test_max_workers() {
        assert_eq!(PartitionCoordinator::new(1, 1000).max_workers(None), 1);
        assert_eq!(PartitionCoordinator::new(10_000, 1000).max_workers(None), 10);
        assert_eq!(PartitionCoordinator::new(10_000, 1000).max_workers(Some(4)), 4);
        assert_eq!(PartitionCoordinator::new(10_000, 1000).max_workers(Some(0)), 1);
    }

    #[test]
    fn test_concurrent_claims_are_disjoint() {
        let coordinator = Arc::new(PartitionCoordinator::new(100_000, 7));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                std::thread::spawn(move || {
                    let mut mins = Vec::new();
                    while let Some(range) = coordinator.next_range() {
                        mins.push(range.min);
                    }
                    mins
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for min in handle.join().unwrap() {
                assert!(seen.insert(min), "range starting at {min} claimed twice");
            }
        }
        assert_eq!(seen.len(), 100_000usize.div_ceil(7));
    }
}
