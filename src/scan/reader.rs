use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, warn};

use crate::core::{DataBatch, Result, ScanError};
use crate::decode::{decode_field, decode_row_id};
use crate::network::{BinaryCopyDecoder, Connector, Frame, RowFrame, ScanConnection};

use super::partition::PageRange;
use super::plan::ScanPlan;
use super::query::{build_copy_query, ProjectedColumn};

/// Where a worker stands within its current page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// No range claimed yet.
    Idle,
    /// COPY issued, header not yet seen.
    QueryIssued,
    HeaderRead,
    StreamingRows,
    /// Trailer consumed; the next pull claims a new range.
    RangeExhausted,
    /// Coordinator has no ranges left.
    Done,
}

/// One scan worker: a dedicated session plus the state of its current COPY.
pub struct ScanWorker<C: Connector> {
    plan: Arc<ScanPlan>,
    connector: Arc<C>,
    conn: Option<C::Conn>,
    state: ReaderState,
    stream: Option<BoxStream<'static, Result<Bytes>>>,
    buffer: BytesMut,
    range: Option<PageRange>,
    rows_in_range: u64,
}

impl<C: Connector> ScanWorker<C> {
    #[must_use]
    pub fn new(plan: Arc<ScanPlan>, connector: Arc<C>) -> Self {
        Self {
            plan,
            connector,
            conn: None,
            state: ReaderState::Idle,
            stream: None,
            buffer: BytesMut::new(),
            range: None,
            rows_in_range: 0,
        }
    }

    #[must_use]
    pub const fn state(&self) -> ReaderState {
        self.state
    }

    /// Fills the next batch. Returns `None` once every range has been read.
    ///
    /// Batches never exceed the configured batch size; a short batch only
    /// appears at the end of the scan.
    pub async fn pull(&mut self) -> Result<Option<DataBatch>> {
        let batch_size = self.plan.options.batch_size;
        let mut batch = DataBatch::with_capacity(&self.plan.output_types, batch_size);

        while batch.num_rows() < batch_size {
            match self.state {
                ReaderState::Done => break,
                ReaderState::Idle | ReaderState::RangeExhausted => {
                    let Some(range) = self.plan.coordinator.next_range() else {
                        self.finish();
                        break;
                    };
                    self.start_range(range).await?;
                }
                ReaderState::QueryIssued => {
                    if BinaryCopyDecoder::read_header(&mut self.buffer)?.is_some() {
                        self.state = ReaderState::HeaderRead;
                    } else if !self.fill().await? {
                        return Err(ScanError::InvalidCopyHeader(
                            "stream ended before the COPY header".to_string(),
                        ));
                    }
                }
                ReaderState::HeaderRead | ReaderState::StreamingRows => {
                    match BinaryCopyDecoder::next_frame(&mut self.buffer)? {
                        Some(Frame::Row(row)) => {
                            self.decode_row(&row, &mut batch)?;
                            self.rows_in_range += 1;
                            self.state = ReaderState::StreamingRows;
                        }
                        Some(Frame::Trailer) => {
                            self.drain().await?;
                            self.end_range();
                        }
                        None => {
                            if !self.fill().await? {
                                if !self.buffer.is_empty() {
                                    return Err(ScanError::Transport(format!(
                                        "stream closed with {} bytes of an incomplete row",
                                        self.buffer.len()
                                    )));
                                }
                                warn!(range = ?self.range, "COPY stream ended without a trailer");
                                self.end_range();
                            }
                        }
                    }
                }
            }
        }

        if batch.is_empty() && self.state == ReaderState::Done {
            return Ok(None);
        }
        Ok(Some(batch))
    }

    async fn start_range(&mut self, range: PageRange) -> Result<()> {
        if self.conn.is_none() {
            let conn = self.connector.connect().await?;
            self.plan.snapshot.attach(&conn).await?;
            self.conn = Some(conn);
        }
        let Some(conn) = self.conn.as_ref() else {
            return Err(ScanError::Internal("worker session missing".to_string()));
        };

        let table = &self.plan.table;
        let sql = build_copy_query(
            &table.schema_name,
            &table.table_name,
            &table.schema,
            &self.plan.projection,
            &self.plan.filter_clause,
            range,
        )?;
        self.stream = Some(conn.copy_out(&sql).await?);
        self.buffer.clear();
        self.range = Some(range);
        self.rows_in_range = 0;
        self.state = ReaderState::QueryIssued;
        Ok(())
    }

    /// Appends the next chunk to the buffer; `false` once the stream is closed.
    async fn fill(&mut self) -> Result<bool> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(false);
        };
        match stream.next().await {
            Some(chunk) => {
                self.buffer.extend_from_slice(&chunk?);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Reads the stream to completion so the session is ready for the next COPY.
    async fn drain(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.as_mut() {
            while let Some(chunk) = stream.next().await {
                chunk?;
            }
        }
        Ok(())
    }

    fn end_range(&mut self) {
        debug!(range = ?self.range, rows = self.rows_in_range, "finished page range");
        self.stream = None;
        self.buffer.clear();
        self.state = ReaderState::RangeExhausted;
    }

    fn finish(&mut self) {
        self.stream = None;
        self.state = ReaderState::Done;
    }

    fn decode_row(&self, row: &RowFrame, batch: &mut DataBatch) -> Result<()> {
        let projection = &self.plan.projection;
        if row.field_count() != projection.len() {
            return Err(ScanError::FieldCountMismatch {
                expected: projection.len(),
                actual: row.field_count() as i16,
            });
        }

        let schema = &self.plan.table.schema;
        for (idx, (column, out)) in projection.iter().zip(batch.columns_mut()).enumerate() {
            let Some(data) = row.field(idx) else {
                out.push_null();
                continue;
            };
            match column {
                ProjectedColumn::RowId => decode_row_id(data, out)?,
                ProjectedColumn::Column(col) => {
                    let mapped = schema
                        .column(*col)
                        .ok_or_else(|| ScanError::Internal(format!("projected column {col} out of range")))?;
                    decode_field(&mapped.mapped, data, out)?;
                }
            }
        }
        batch.finish_row();
        Ok(())
    }
}
