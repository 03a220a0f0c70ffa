use tracing::{debug, info};

use crate::core::{Result, ScanError, TypeKind};
use crate::mapping::{EnumCatalog, TargetSchema};
use crate::network::{SourceCatalog, TableInfo};

/// A source table resolved against the catalog, with its output schema.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundTable {
    pub schema_name: String,
    pub table_name: String,
    pub info: TableInfo,
    pub schema: TargetSchema,
}

/// Resolves `schema.table`, reads its columns and maps every one of them.
pub async fn bind_table<C: SourceCatalog>(conn: &C, schema_name: &str, table_name: &str) -> Result<BoundTable> {
    let info = conn
        .table_info(schema_name, table_name)
        .await?
        .ok_or_else(|| ScanError::TableNotFound {
            schema: schema_name.to_string(),
            table: table_name.to_string(),
        })?;

    let descriptors = conn.columns(info.oid).await?;
    if descriptors.is_empty() {
        return Err(ScanError::NoColumns(table_name.to_string()));
    }

    let mut enums = EnumCatalog::new();
    for descriptor in &descriptors {
        let enum_type = if descriptor.type_info.kind == TypeKind::Enum {
            Some(&descriptor.type_info)
        } else {
            descriptor.element.as_ref().filter(|e| e.kind == TypeKind::Enum)
        };
        if let Some(type_info) = enum_type {
            if !enums.contains(type_info) {
                let labels = conn.enum_labels(type_info).await?;
                debug!(type_name = %type_info.name, labels = labels.len(), "loaded enum labels");
                enums.insert(type_info, labels);
            }
        }
    }

    let schema = TargetSchema::bind(&descriptors, &enums)?;
    info!(
        schema = schema_name,
        table = table_name,
        columns = schema.len(),
        pages = info.pages_approx,
        "bound postgres table"
    );
    Ok(BoundTable {
        schema_name: schema_name.to_string(),
        table_name: table_name.to_string(),
        info,
        schema,
    })
}
