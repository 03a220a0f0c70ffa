use std::future::Future;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, trace};

use crate::core::{ColumnDescriptor, PgTypeInfo, Result, ScanError, TypeKind};

/// Location and approximate size of the source relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableInfo {
    pub oid: u32,
    /// `GREATEST(relpages, 1)`, so never zero.
    pub pages_approx: u64,
}

/// Catalog lookups needed at bind time.
pub trait SourceCatalog: Send + Sync {
    fn table_info(&self, schema: &str, table: &str) -> impl Future<Output = Result<Option<TableInfo>>> + Send;

    fn columns(&self, table_oid: u32) -> impl Future<Output = Result<Vec<ColumnDescriptor>>> + Send;

    fn enum_labels(&self, type_info: &PgTypeInfo) -> impl Future<Output = Result<Vec<String>>> + Send;

    fn is_in_recovery(&self) -> impl Future<Output = Result<bool>> + Send;

    fn export_snapshot(&self) -> impl Future<Output = Result<String>> + Send;
}

/// A session able to run statements and stream `COPY ... TO STDOUT` output.
pub trait ScanConnection: Send + Sync {
    fn execute(&self, sql: &str) -> impl Future<Output = Result<()>> + Send;

    fn copy_out(&self, sql: &str) -> impl Future<Output = Result<BoxStream<'static, Result<Bytes>>>> + Send;
}

/// Opens fresh sessions for the bind step and for every scan worker.
pub trait Connector: Send + Sync + 'static {
    type Conn: ScanConnection + SourceCatalog + 'static;

    fn connect(&self) -> impl Future<Output = Result<Self::Conn>> + Send;
}

/// tokio-postgres session. The connection driver runs on its own task and is
/// aborted when the session is dropped.
pub struct PgConnection {
    client: Client,
    driver: JoinHandle<()>,
}

impl PgConnection {
    pub async fn connect(conn_str: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(conn_str, NoTls).await?;
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!(%e, "postgres connection errored");
            }
        });
        Ok(Self { client, driver })
    }
}

impl Drop for PgConnection {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

impl ScanConnection for PgConnection {
    async fn execute(&self, sql: &str) -> Result<()> {
        trace!(sql, "execute");
        self.client.batch_execute(sql).await?;
        Ok(())
    }

    async fn copy_out(&self, sql: &str) -> Result<BoxStream<'static, Result<Bytes>>> {
        debug!(sql, "starting binary copy");
        let stream = self.client.copy_out(sql).await?;
        Ok(stream.map_err(ScanError::from).boxed())
    }
}

impl SourceCatalog for PgConnection {
    async fn table_info(&self, schema: &str, table: &str) -> Result<Option<TableInfo>> {
        let rows = self
            .client
            .query(
                "
                SELECT pg_class.oid, GREATEST(relpages, 1)::int8
                FROM pg_class JOIN pg_namespace ON relnamespace = pg_namespace.oid
                WHERE nspname = $1 AND relname = $2
                ",
                &[&schema, &table],
            )
            .await?;
        if rows.len() != 1 {
            return Ok(None);
        }
        let oid: u32 = rows[0].try_get(0)?;
        let pages: i64 = rows[0].try_get(1)?;
        Ok(Some(TableInfo {
            oid,
            pages_approx: pages.max(1) as u64,
        }))
    }

    async fn columns(&self, table_oid: u32) -> Result<Vec<ColumnDescriptor>> {
        let rows = self
            .client
            .query(
                "
                SELECT
                    attname::text, atttypmod, pg_namespace.nspname::text,
                    pg_type.typname::text, pg_type.typlen, pg_type.typtype::text, pg_type.typelem,
                    elem_ns.nspname::text, pg_type_elem.typname::text,
                    pg_type_elem.typlen, pg_type_elem.typtype::text,
                    attnotnull
                FROM pg_attribute
                    JOIN pg_type ON atttypid = pg_type.oid
                    LEFT JOIN pg_type pg_type_elem ON pg_type.typelem = pg_type_elem.oid
                    LEFT JOIN pg_namespace ON pg_type.typnamespace = pg_namespace.oid
                    LEFT JOIN pg_namespace elem_ns ON pg_type_elem.typnamespace = elem_ns.oid
                WHERE attrelid = $1 AND attnum > 0 AND NOT attisdropped
                ORDER BY attnum
                ",
                &[&table_oid],
            )
            .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get(0)?;
            let type_info = PgTypeInfo {
                namespace: row.try_get::<_, Option<String>>(2)?.unwrap_or_default(),
                name: row.try_get(3)?,
                len: row.try_get(4)?,
                kind: TypeKind::from_typtype(&row.try_get::<_, String>(5)?),
            };
            let mut column = ColumnDescriptor::new(&name, type_info).with_type_modifier(row.try_get(1)?);
            column.nullable = !row.try_get::<_, bool>(11)?;

            let element_oid: u32 = row.try_get(6)?;
            let element_name: Option<String> = row.try_get(8)?;
            if let Some(element_name) = element_name.filter(|_| element_oid != 0) {
                let element = PgTypeInfo {
                    namespace: row.try_get::<_, Option<String>>(7)?.unwrap_or_default(),
                    name: element_name,
                    len: row.try_get::<_, Option<i16>>(9)?.unwrap_or(-1),
                    kind: TypeKind::from_typtype(&row.try_get::<_, Option<String>>(10)?.unwrap_or_default()),
                };
                column = column.with_element(element, element_oid);
            }
            columns.push(column);
        }
        Ok(columns)
    }

    async fn enum_labels(&self, type_info: &PgTypeInfo) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT unnest(enum_range(NULL::{}.{}))::text",
            quote_identifier(&type_info.namespace),
            quote_identifier(&type_info.name)
        );
        let rows = self.client.query(sql.as_str(), &[]).await?;
        rows.iter()
            .map(|row| row.try_get::<_, String>(0).map_err(ScanError::from))
            .collect()
    }

    async fn is_in_recovery(&self) -> Result<bool> {
        let row = self.client.query_one("SELECT pg_is_in_recovery()", &[]).await?;
        Ok(row.try_get(0)?)
    }

    async fn export_snapshot(&self) -> Result<String> {
        let row = self.client.query_one("SELECT pg_export_snapshot()", &[]).await?;
        Ok(row.try_get(0)?)
    }
}

/// Connects with a libpq-style connection string.
#[derive(Debug, Clone)]
pub struct PgConnector {
    conn_str: String,
}

impl PgConnector {
    #[must_use]
    pub fn new(conn_str: impl Into<String>) -> Self {
        Self {
            conn_str: conn_str.into(),
        }
    }
}

impl Connector for PgConnector {
    type Conn = PgConnection;

    async fn connect(&self) -> Result<PgConnection> {
        PgConnection::connect(&self.conn_str).await
    }
}

/// Quotes an identifier, doubling embedded double quotes.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
