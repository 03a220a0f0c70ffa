use crate::core::{Result, ScanError, TargetType};
use crate::filter::{translate_filter, FilterSet};
use crate::mapping::TargetSchema;
use crate::network::quote_identifier;

use super::partition::PageRange;

/// One output column of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectedColumn {
    /// Table column by physical index.
    Column(usize),
    /// The tuple id, emitted as `(page << 16) + slot`.
    RowId,
}

impl ProjectedColumn {
    pub(crate) fn target_type(self, schema: &TargetSchema) -> Result<TargetType> {
        match self {
            Self::RowId => Ok(TargetType::Int64),
            Self::Column(idx) => schema
                .column(idx)
                .map(|c| c.target_type().clone())
                .ok_or_else(|| ScanError::Internal(format!("projected column {idx} out of range"))),
        }
    }

    fn select_item(self, schema: &TargetSchema) -> Result<String> {
        match self {
            Self::RowId => Ok("ctid".to_string()),
            Self::Column(idx) => {
                let column = schema
                    .column(idx)
                    .ok_or_else(|| ScanError::Internal(format!("projected column {idx} out of range")))?;
                let name = quote_identifier(column.name());
                if column.needs_text_fallback {
                    Ok(format!("{name}::VARCHAR"))
                } else {
                    Ok(name)
                }
            }
        }
    }
}

/// Renders the pushed-down filters as ` AND ...`, or an empty string.
pub fn filter_clause(schema: &TargetSchema, filters: &FilterSet) -> Result<String> {
    if filters.is_empty() {
        return Ok(String::new());
    }
    let entries = filters
        .iter()
        .map(|(idx, filter)| {
            let column = schema
                .column(idx)
                .ok_or_else(|| ScanError::Internal(format!("filter on unknown column {idx}")))?;
            translate_filter(&quote_identifier(column.name()), filter)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(format!(" AND {}", entries.join(" AND ")))
}

/// Builds the `COPY ... TO STDOUT (FORMAT binary)` statement for one page range.
pub fn build_copy_query(
    source_schema: &str,
    source_table: &str,
    schema: &TargetSchema,
    projection: &[ProjectedColumn],
    filter_clause: &str,
    range: PageRange,
) -> Result<String> {
    let columns = projection
        .iter()
        .map(|column| column.select_item(schema))
        .collect::<Result<Vec<_>>>()?;

    Ok(format!(
        "COPY (SELECT {} FROM {}.{} WHERE ctid BETWEEN '({},0)'::tid AND '({},0)'::tid{}) TO STDOUT (FORMAT binary)",
        columns.join(", "),
        quote_identifier(source_schema),
        quote_identifier(source_table),
        range.min,
        range.max,
        filter_clause,
    ))
}
