// Shared fixtures: an in-memory Postgres and helpers to build binary COPY payloads
#![allow(dead_code)]

use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use parking_lot::Mutex;
use postgrustscan::core::{ColumnDescriptor, PgTypeInfo, Result, TypeKind};
use postgrustscan::network::{BinaryCopyEncoder, Connector, ScanConnection, SourceCatalog, TableInfo};

type CopyFn = Arc<dyn Fn(&str) -> Vec<u8> + Send + Sync>;

/// One table, served to any number of sessions. Every statement is logged.
#[derive(Clone)]
pub struct FakePostgres {
    pub columns: Vec<ColumnDescriptor>,
    pub pages: u64,
    pub enums: Vec<(String, Vec<String>)>,
    pub chunk_size: usize,
    copy: CopyFn,
    log: Arc<Mutex<Vec<String>>>,
}

impl FakePostgres {
    pub fn new<F>(columns: Vec<ColumnDescriptor>, pages: u64, copy: F) -> Self
    where
        F: Fn(&str) -> Vec<u8> + Send + Sync + 'static,
    {
        Self {
            columns,
            pages,
            enums: Vec::new(),
            chunk_size: 7,
            copy: Arc::new(copy),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_enum(mut self, name: &str, labels: &[&str]) -> Self {
        self.enums
            .push((name.to_string(), labels.iter().map(|l| (*l).to_string()).collect()));
        self
    }

    pub fn statements(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn copy_statements(&self) -> Vec<String> {
        self.statements().into_iter().filter(|s| s.starts_with("COPY")).collect()
    }

    fn record(&self, sql: &str) {
        self.log.lock().push(sql.to_string());
    }
}

impl ScanConnection for FakePostgres {
    async fn execute(&self, sql: &str) -> Result<()> {
        self.record(sql);
        Ok(())
    }

    async fn copy_out(&self, sql: &str) -> Result<BoxStream<'static, Result<Bytes>>> {
        self.record(sql);
        let raw = (self.copy)(sql);
        let chunks: Vec<Result<Bytes>> = raw
            .chunks(self.chunk_size.max(1))
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();
        Ok(stream::iter(chunks).boxed())
    }
}

impl SourceCatalog for FakePostgres {
    async fn table_info(&self, schema: &str, table: &str) -> Result<Option<TableInfo>> {
        Ok((schema == "public" && table == "items").then_some(TableInfo {
            oid: 16_400,
            pages_approx: self.pages,
        }))
    }

    async fn columns(&self, _table_oid: u32) -> Result<Vec<ColumnDescriptor>> {
        Ok(self.columns.clone())
    }

    async fn enum_labels(&self, type_info: &PgTypeInfo) -> Result<Vec<String>> {
        Ok(self
            .enums
            .iter()
            .find(|(name, _)| *name == type_info.name)
            .map(|(_, labels)| labels.clone())
            .unwrap_or_default())
    }

    async fn is_in_recovery(&self) -> Result<bool> {
        Ok(false)
    }

    async fn export_snapshot(&self) -> Result<String> {
        self.record("SELECT pg_export_snapshot()");
        Ok("00000004-00000002-1".to_string())
    }
}

impl Connector for FakePostgres {
    type Conn = Self;

    async fn connect(&self) -> Result<Self> {
        Ok(self.clone())
    }
}

pub fn enum_type(name: &str) -> PgTypeInfo {
    PgTypeInfo {
        namespace: "public".to_string(),
        name: name.to_string(),
        len: 4,
        kind: TypeKind::Enum,
    }
}

/// Numeric `atttypmod` for `numeric(precision, scale)`.
pub const fn numeric_typmod(precision: i32, scale: i32) -> i32 {
    ((precision << 16) | (scale & 0x7ff)) + 4
}

/// Lower page bound of the range a COPY statement asks for.
pub fn range_start(sql: &str) -> u64 {
    sql.split("BETWEEN '(")
        .nth(1)
        .and_then(|rest| rest.split(',').next())
        .and_then(|page| page.parse().ok())
        .unwrap_or(u64::MAX)
}

/// Complete COPY payload: header, rows, trailer.
pub fn copy_payload(rows: &[Vec<Option<Vec<u8>>>]) -> Vec<u8> {
    let mut raw = BinaryCopyEncoder::write_header();
    for row in rows {
        let fields: Vec<Option<&[u8]>> = row.iter().map(Option::as_deref).collect();
        raw.extend(BinaryCopyEncoder::encode_row(&fields));
    }
    raw.extend(BinaryCopyEncoder::write_trailer());
    raw
}

/// One-dimensional array payload with the given element oid.
pub fn array_payload(element_oid: u32, elements: &[Option<Vec<u8>>]) -> Vec<u8> {
    let mut raw = Vec::new();
    raw.extend(1i32.to_be_bytes());
    raw.extend(i32::from(elements.iter().any(Option::is_none)).to_be_bytes());
    raw.extend(element_oid.to_be_bytes());
    raw.extend((elements.len() as i32).to_be_bytes());
    raw.extend(1i32.to_be_bytes());
    for element in elements {
        match element {
            Some(data) => {
                raw.extend((data.len() as i32).to_be_bytes());
                raw.extend(data);
            }
            None => raw.extend((-1i32).to_be_bytes()),
        }
    }
    raw
}

pub fn tid(page: u32, slot: u16) -> Vec<u8> {
    let mut raw = page.to_be_bytes().to_vec();
    raw.extend(slot.to_be_bytes());
    raw
}
