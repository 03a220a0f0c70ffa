use std::sync::Arc;

use crate::core::{Result, ScanError, TargetType};
use crate::filter::FilterSet;
use crate::transaction::ScanSnapshot;

use super::bind::BoundTable;
use super::partition::PartitionCoordinator;
use super::query::{filter_clause, ProjectedColumn};

/// Tuning knobs for one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    pub pages_per_task: u64,
    pub batch_size: usize,
    pub max_workers: Option<usize>,
    pub filter_pushdown: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            pages_per_task: 1000,
            batch_size: 2048,
            max_workers: None,
            filter_pushdown: true,
        }
    }
}

/// Everything the workers of one scan share. Read-only apart from the coordinator.
#[derive(Debug)]
pub struct ScanPlan {
    pub table: Arc<BoundTable>,
    pub snapshot: ScanSnapshot,
    pub projection: Vec<ProjectedColumn>,
    pub output_types: Vec<TargetType>,
    pub filter_clause: String,
    pub options: ScanOptions,
    pub coordinator: PartitionCoordinator,
}

impl ScanPlan {
    pub fn new(
        table: Arc<BoundTable>,
        snapshot: ScanSnapshot,
        projection: Vec<ProjectedColumn>,
        filters: &FilterSet,
        options: ScanOptions,
    ) -> Result<Self> {
        if projection.is_empty() {
            return Err(ScanError::Internal("scan needs at least one projected column".to_string()));
        }
        if options.batch_size == 0 {
            return Err(ScanError::InvalidConfig("batch_size must be positive".to_string()));
        }
        let output_types = projection
            .iter()
            .map(|column| column.target_type(&table.schema))
            .collect::<Result<Vec<_>>>()?;
        let filter_clause = if options.filter_pushdown {
            filter_clause(&table.schema, filters)?
        } else {
            String::new()
        };
        let coordinator = PartitionCoordinator::new(table.info.pages_approx, options.pages_per_task);
        Ok(Self {
            table,
            snapshot,
            projection,
            output_types,
            filter_clause,
            options,
            coordinator,
        })
    }

    /// Number of workers worth starting for this plan.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.coordinator.max_workers(self.options.max_workers)
    }
}
