// Type mapping - source column descriptors to target column types

mod schema;
mod type_map;

pub use schema::TargetSchema;
pub use type_map::{map_column, map_type, numeric_typmod, EnumCatalog, MappedColumn, MappedType, SourceType};
