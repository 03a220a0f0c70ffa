//! In-memory source used by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use parking_lot::Mutex;

use super::connection::{Connector, ScanConnection, SourceCatalog, TableInfo};
use crate::core::{ColumnDescriptor, PgTypeInfo, Result, ScanError};

type CopyHandler = Arc<dyn Fn(&str) -> Result<Vec<Bytes>> + Send + Sync>;

/// Held by every connected session; releases its slot in the live count on drop.
struct SessionGuard(Arc<AtomicUsize>);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub(crate) struct FakeSource {
    tables: HashMap<(String, String), (TableInfo, Vec<ColumnDescriptor>)>,
    enums: HashMap<String, Vec<String>>,
    in_recovery: bool,
    copy_handler: CopyHandler,
    stall_copy: bool,
    log: Arc<Mutex<Vec<String>>>,
    live: Arc<AtomicUsize>,
    guard: Option<Arc<SessionGuard>>,
}

impl FakeSource {
    pub(crate) fn new() -> Self {
        Self {
            tables: HashMap::new(),
            enums: HashMap::new(),
            in_recovery: false,
            copy_handler: Arc::new(|_| Ok(Vec::new())),
            stall_copy: false,
            log: Arc::new(Mutex::new(Vec::new())),
            live: Arc::new(AtomicUsize::new(0)),
            guard: None,
        }
    }

    pub(crate) fn in_recovery(mut self) -> Self {
        self.in_recovery = true;
        self
    }

    pub(crate) fn with_table(mut self, schema: &str, table: &str, pages: u64, columns: Vec<ColumnDescriptor>) -> Self {
        let info = TableInfo {
            oid: 16384 + self.tables.len() as u32,
            pages_approx: pages,
        };
        self.tables.insert((schema.to_string(), table.to_string()), (info, columns));
        self
    }

    pub(crate) fn with_enum(mut self, type_name: &str, labels: &[&str]) -> Self {
        self.enums
            .insert(type_name.to_string(), labels.iter().map(|l| (*l).to_string()).collect());
        self
    }

    pub(crate) fn with_copy<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str) -> Result<Vec<Bytes>> + Send + Sync + 'static,
    {
        self.copy_handler = Arc::new(handler);
        self
    }

    /// COPY streams never end after the handler's chunks.
    pub(crate) fn stalling(mut self) -> Self {
        self.stall_copy = true;
        self
    }

    pub(crate) fn session(&self) -> Self {
        self.clone()
    }

    /// Sessions opened through `connect` and not yet dropped.
    pub(crate) fn live_sessions(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub(crate) fn statements(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    fn record(&self, sql: &str) {
        self.log.lock().push(sql.to_string());
    }
}

impl ScanConnection for FakeSource {
    async fn execute(&self, sql: &str) -> Result<()> {
        self.record(sql);
        Ok(())
    }

    async fn copy_out(&self, sql: &str) -> Result<BoxStream<'static, Result<Bytes>>> {
        self.record(sql);
        let chunks = stream::iter((self.copy_handler)(sql)?.into_iter().map(Ok));
        if self.stall_copy {
            Ok(chunks.chain(stream::pending()).boxed())
        } else {
            Ok(chunks.boxed())
        }
    }
}

impl SourceCatalog for FakeSource {
    async fn table_info(&self, schema: &str, table: &str) -> Result<Option<TableInfo>> {
        Ok(self
            .tables
            .get(&(schema.to_string(), table.to_string()))
            .map(|(info, _)| *info))
    }

    async fn columns(&self, table_oid: u32) -> Result<Vec<ColumnDescriptor>> {
        Ok(self
            .tables
            .values()
            .find(|(info, _)| info.oid == table_oid)
            .map(|(_, columns)| columns.clone())
            .unwrap_or_default())
    }

    async fn enum_labels(&self, type_info: &PgTypeInfo) -> Result<Vec<String>> {
        self.enums
            .get(&type_info.name)
            .cloned()
            .ok_or_else(|| ScanError::Internal(format!("no enum {}", type_info.name)))
    }

    async fn is_in_recovery(&self) -> Result<bool> {
        self.record("SELECT pg_is_in_recovery()");
        Ok(self.in_recovery)
    }

    async fn export_snapshot(&self) -> Result<String> {
        self.record("SELECT pg_export_snapshot()");
        Ok("00000003-0000001B-1".to_string())
    }
}

impl Connector for FakeSource {
    type Conn = Self;

    async fn connect(&self) -> Result<Self> {
        let mut session = self.session();
        self.live.fetch_add(1, Ordering::SeqCst);
        session.guard = Some(Arc::new(SessionGuard(Arc::clone(&self.live))));
        Ok(session)
    }
}
