use crate::core::{ColumnDescriptor, Result, TargetType};

use super::type_map::{map_column, EnumCatalog, MappedColumn};

/// Bound output schema, in the table's physical column order.
///
/// Projection is applied later by column index; the schema itself is never
/// re-queried or reordered.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSchema {
    columns: Vec<MappedColumn>,
}

impl TargetSchema {
    pub fn bind(descriptors: &[ColumnDescriptor], enums: &EnumCatalog) -> Result<Self> {
        let columns = descriptors
            .iter()
            .map(|descriptor| map_column(descriptor, enums))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { columns })
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    #[must_use]
    pub fn column(&self, idx: usize) -> Option<&MappedColumn> {
        self.columns.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MappedColumn> {
        self.columns.iter()
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(MappedColumn::name).collect()
    }

    #[must_use]
    pub fn types(&self) -> Vec<TargetType> {
        self.columns.iter().map(|c| c.target_type().clone()).collect()
    }

    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }
}
