use std::any::Any;
use std::sync::Arc;

use futures::stream::{self, BoxStream};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::config::ScanConfig;
use crate::core::{DataBatch, Result, ScanError};
use crate::filter::FilterSet;
use crate::mapping::TargetSchema;
use crate::network::{Connector, PgConnector};
use crate::transaction::ScanSnapshot;

use super::bind::{bind_table, BoundTable};
use super::plan::{ScanOptions, ScanPlan};
use super::query::ProjectedColumn;
use super::reader::ScanWorker;

/// A bound Postgres table, ready to be scanned.
///
/// Holds the session whose transaction exported the shared snapshot. Postgres
/// invalidates an exported snapshot as soon as that transaction ends, so the
/// session lives as long as the scanner and every scan started from it.
pub struct PostgresScanner<C: Connector> {
    connector: Arc<C>,
    session: Arc<C::Conn>,
    table: Arc<BoundTable>,
    snapshot: ScanSnapshot,
    options: ScanOptions,
}

impl PostgresScanner<PgConnector> {
    /// Binds `schema.table` using the connection string from `config`.
    pub async fn connect(config: &ScanConfig, schema_name: &str, table_name: &str) -> Result<Self> {
        let connector = PgConnector::new(config.connection_string.clone());
        Self::bind(connector, schema_name, table_name, config.scan_options()).await
    }
}

impl<C: Connector> PostgresScanner<C> {
    pub async fn bind(connector: C, schema_name: &str, table_name: &str, options: ScanOptions) -> Result<Self> {
        let session = connector.connect().await?;
        let snapshot = ScanSnapshot::export(&session).await?;
        let table = bind_table(&session, schema_name, table_name).await?;
        Ok(Self {
            connector: Arc::new(connector),
            session: Arc::new(session),
            table: Arc::new(table),
            snapshot,
            options,
        })
    }

    #[must_use]
    pub fn schema(&self) -> &TargetSchema {
        &self.table.schema
    }

    #[must_use]
    pub fn table(&self) -> &BoundTable {
        &self.table
    }

    #[must_use]
    pub const fn snapshot(&self) -> &ScanSnapshot {
        &self.snapshot
    }

    #[must_use]
    pub const fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Plans a scan. `None` projects every table column in physical order.
    pub fn plan(&self, projection: Option<Vec<ProjectedColumn>>, filters: &FilterSet) -> Result<Arc<ScanPlan>> {
        let projection =
            projection.unwrap_or_else(|| (0..self.table.schema.len()).map(ProjectedColumn::Column).collect());
        let plan = ScanPlan::new(
            Arc::clone(&self.table),
            self.snapshot.clone(),
            projection,
            filters,
            self.options,
        )?;
        Ok(Arc::new(plan))
    }

    /// A single worker over `plan`. Several workers may share one plan.
    #[must_use]
    pub fn worker(&self, plan: &Arc<ScanPlan>) -> ScanWorker<C> {
        ScanWorker::new(Arc::clone(plan), Arc::clone(&self.connector))
    }

    /// Starts `plan.worker_count()` workers on the tokio runtime.
    pub fn scan(&self, projection: Option<Vec<ProjectedColumn>>, filters: &FilterSet) -> Result<ParallelScan> {
        let plan = self.plan(projection, filters)?;
        let workers = plan.worker_count();
        let (tx, receiver) = mpsc::channel(workers * 2);
        let mut tasks = JoinSet::new();

        info!(
            table = %self.table.table_name,
            workers,
            pages = self.table.info.pages_approx,
            "starting parallel scan"
        );
        for worker_id in 0..workers {
            let mut worker = self.worker(&plan);
            let tx = tx.clone();
            tasks.spawn(async move {
                loop {
                    match worker.pull().await {
                        Ok(Some(batch)) => {
                            if tx.send(Ok(batch)).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            error!(worker_id, %e, "scan worker failed");
                            let _ = tx.send(Err(e)).await;
                            break;
                        }
                    }
                }
                debug!(worker_id, "scan worker finished");
            });
        }

        let session: Arc<dyn Any + Send + Sync> = Arc::clone(&self.session) as _;
        Ok(ParallelScan {
            receiver,
            tasks,
            _session: session,
        })
    }
}

/// Batches from all workers of one scan, in arrival order.
///
/// Dropping it aborts the workers that are still running.
pub struct ParallelScan {
    receiver: mpsc::Receiver<Result<DataBatch>>,
    tasks: JoinSet<()>,
    _session: Arc<dyn Any + Send + Sync>,
}

impl ParallelScan {
    pub async fn next_batch(&mut self) -> Result<Option<DataBatch>> {
        match self.receiver.recv().await {
            Some(Ok(batch)) => Ok(Some(batch)),
            Some(Err(e)) => {
                self.tasks.abort_all();
                Err(e)
            }
            None => {
                while let Some(joined) = self.tasks.join_next().await {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            return Err(ScanError::Internal(format!("scan worker panicked: {e}")));
                        }
                    }
                }
                Ok(None)
            }
        }
    }

    /// Adapts the scan into a stream that ends after the first error.
    #[must_use]
    pub fn into_stream(self) -> BoxStream<'static, Result<DataBatch>> {
        stream::unfold(Some(self), |scan| async move {
            let mut scan = scan?;
            match scan.next_batch().await {
                Ok(Some(batch)) => Some((Ok(batch), Some(scan))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
        .boxed()
    }
}
