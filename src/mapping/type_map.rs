//! Source type → target type resolution.
//!
//! Every column is resolved once at bind time into a [`MappedType`], which
//! carries both how the value arrives on the wire and what column type it is
//! written into. Types without a direct mapping are read through a text cast.

use std::collections::HashMap;

use crate::core::{
    ColumnDescriptor, EnumType, PgTypeInfo, Result, ScanError, TargetType, TypeKind, MAX_DECIMAL_PRECISION,
    MAX_DECIMAL_SCALE,
};

/// `VARHDRSZ`, subtracted from a numeric type modifier before unpacking it.
const TYPMOD_HEADER: i32 = 4;

/// Wire encoding of a source column.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceType {
    Bool,
    Int2,
    Int4,
    Int8,
    Oid,
    Float4,
    Float8,
    Numeric,
    /// Single-byte `"char"`; the wire byte need not be UTF-8.
    Char,
    Text,
    Jsonb,
    Bytea,
    Date,
    Time,
    TimeTz,
    Timestamp,
    TimestampTz,
    Interval,
    Uuid,
    Enum,
    Array {
        element: Box<MappedType>,
        element_oid: Option<u32>,
    },
    /// Projected as `col::VARCHAR`, so the wire carries plain text.
    TextCast,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappedType {
    pub source: SourceType,
    pub target: TargetType,
}

impl MappedType {
    #[must_use]
    pub const fn new(source: SourceType, target: TargetType) -> Self {
        Self { source, target }
    }

    /// Name used in decode errors.
    #[must_use]
    pub fn type_name(&self) -> String {
        match &self.source {
            SourceType::TextCast => "text (cast)".to_string(),
            SourceType::Array { element, .. } => format!("{}[]", element.type_name()),
            other => format!("{other:?}").to_lowercase(),
        }
    }
}

/// Enum types resolved at bind time, keyed by `namespace.name`.
#[derive(Debug, Clone, Default)]
pub struct EnumCatalog {
    types: HashMap<String, EnumType>,
}

impl EnumCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, info: &PgTypeInfo, labels: Vec<String>) {
        let enum_type = EnumType::new(format!("postgres_enum_{}", info.name), labels);
        self.types.insert(Self::key(info), enum_type);
    }

    #[must_use]
    pub fn contains(&self, info: &PgTypeInfo) -> bool {
        self.types.contains_key(&Self::key(info))
    }

    #[must_use]
    pub fn get(&self, info: &PgTypeInfo) -> Option<&EnumType> {
        self.types.get(&Self::key(info))
    }

    fn key(info: &PgTypeInfo) -> String {
        format!("{}.{}", info.namespace, info.name)
    }
}

/// Unpacks a numeric `atttypmod` into (precision, scale). Scale may be negative.
#[must_use]
pub const fn numeric_typmod(typmod: i32) -> Option<(i32, i32)> {
    if typmod < TYPMOD_HEADER {
        return None;
    }
    let packed = typmod - TYPMOD_HEADER;
    let precision = (packed >> 16) & 0xffff;
    let scale = ((packed & 0x7ff) ^ 1024) - 1024;
    Some((precision, scale))
}

fn numeric_target(typmod: i32) -> TargetType {
    match numeric_typmod(typmod) {
        Some((precision, scale))
            if (1..=i32::from(MAX_DECIMAL_PRECISION)).contains(&precision)
                && (0..=precision.min(i32::from(MAX_DECIMAL_SCALE))).contains(&scale) =>
        {
            TargetType::Decimal {
                precision: precision as u8,
                scale: scale as u8,
            }
        }
        // Unbounded, or outside what a fixed-width decimal can hold.
        _ => TargetType::Float64,
    }
}

/// Resolves one source type. `None` means there is no direct mapping.
#[must_use]
pub fn map_type(
    info: &PgTypeInfo,
    typmod: i32,
    element: Option<(&PgTypeInfo, Option<u32>)>,
    enums: &EnumCatalog,
) -> Option<MappedType> {
    if info.is_array() {
        let (element_info, element_oid) = element?;
        let child = map_type(element_info, typmod, None, enums)?;
        let target = TargetType::list(child.target.clone());
        return Some(MappedType::new(
            SourceType::Array {
                element: Box::new(child),
                element_oid,
            },
            target,
        ));
    }

    if info.kind == TypeKind::Enum {
        let enum_type = enums.get(info)?;
        return Some(MappedType::new(SourceType::Enum, TargetType::Enum(enum_type.clone())));
    }

    let (source, target) = match info.name.as_str() {
        "bool" => (SourceType::Bool, TargetType::Boolean),
        "int2" => (SourceType::Int2, TargetType::Int16),
        "int4" => (SourceType::Int4, TargetType::Int32),
        "int8" => (SourceType::Int8, TargetType::Int64),
        "oid" => (SourceType::Oid, TargetType::UInt32),
        "float4" => (SourceType::Float4, TargetType::Float32),
        "float8" => (SourceType::Float8, TargetType::Float64),
        "numeric" => (SourceType::Numeric, numeric_target(typmod)),
        "char" => (SourceType::Char, TargetType::Utf8),
        "bpchar" | "varchar" | "text" | "name" | "json" => (SourceType::Text, TargetType::Utf8),
        "jsonb" => (SourceType::Jsonb, TargetType::Utf8),
        "bytea" => (SourceType::Bytea, TargetType::Binary),
        "date" => (SourceType::Date, TargetType::Date),
        "time" => (SourceType::Time, TargetType::Time),
        "timetz" => (SourceType::TimeTz, TargetType::TimeTz),
        "timestamp" => (SourceType::Timestamp, TargetType::Timestamp),
        "timestamptz" => (SourceType::TimestampTz, TargetType::TimestampTz),
        "interval" => (SourceType::Interval, TargetType::Interval),
        "uuid" => (SourceType::Uuid, TargetType::Uuid),
        _ => return None,
    };
    Some(MappedType::new(source, target))
}

/// A bound column: descriptor, resolved type and whether it is read through a text cast.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedColumn {
    pub descriptor: ColumnDescriptor,
    pub mapped: MappedType,
    pub needs_text_fallback: bool,
}

impl MappedColumn {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    #[must_use]
    pub const fn target_type(&self) -> &TargetType {
        &self.mapped.target
    }
}

/// Resolves a column, substituting a text read for anything without a direct mapping.
pub fn map_column(descriptor: &ColumnDescriptor, enums: &EnumCatalog) -> Result<MappedColumn> {
    let element = descriptor
        .element
        .as_ref()
        .map(|info| (info, descriptor.element_oid));

    if let Some(mapped) = map_type(&descriptor.type_info, descriptor.type_modifier, element, enums) {
        return Ok(MappedColumn {
            descriptor: descriptor.clone(),
            mapped,
            needs_text_fallback: false,
        });
    }

    // Pseudo-types have no output function we can cast through.
    if descriptor.type_info.kind == TypeKind::Pseudo {
        return Err(ScanError::UnsupportedType {
            column: descriptor.name.clone(),
            type_name: descriptor.type_info.name.clone(),
        });
    }

    Ok(MappedColumn {
        descriptor: descriptor.clone(),
        mapped: MappedType::new(SourceType::TextCast, TargetType::Utf8),
        needs_text_fallback: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_mod(precision: i32, scale: i32) -> i32 {
        ((precision << 16) | (scale & 0x7ff)) + TYPMOD_HEADER
    }

    fn enum_info(name: &str) -> PgTypeInfo {
        PgTypeInfo {
            namespace: "public".to_string(),
            name: name.to_string(),
            len: 4,
            kind: TypeKind::Enum,
        }
    }

    #[test]
    fn test_fixed_width_types() {
        let enums = EnumCatalog::new();
        let int4 = map_type(&PgTypeInfo::base("int4"), -1, None, &enums).unwrap();
        assert_eq!(int4.target, TargetType::Int32);
        let oid = map_type(&PgTypeInfo::base("oid"), -1, None, &enums).unwrap();
        assert_eq!(oid.target, TargetType::UInt32);
        let jsonb = map_type(&PgTypeInfo::base("jsonb"), -1, None, &enums).unwrap();
        assert_eq!(jsonb.source, SourceType::Jsonb);
        assert_eq!(jsonb.target, TargetType::Utf8);
        let single = map_type(&PgTypeInfo::base("char"), -1, None, &enums).unwrap();
        assert_eq!(single.source, SourceType::Char);
        let padded = map_type(&PgTypeInfo::base("bpchar"), -1, None, &enums).unwrap();
        assert_eq!(padded.source, SourceType::Text);
    }

    #[test]
    fn test_numeric_typmod() {
        assert_eq!(numeric_typmod(numeric_mod(10, 2)), Some((10, 2)));
        assert_eq!(numeric_typmod(numeric_mod(5, -3)), Some((5, -3)));
        assert_eq!(numeric_typmod(-1), None);
    }

    #[test]
    fn test_numeric_targets() {
        let enums = EnumCatalog::new();
        let info = PgTypeInfo::base("numeric");
        let bounded = map_type(&info, numeric_mod(10, 2), None, &enums).unwrap();
        assert_eq!(bounded.target, TargetType::Decimal { precision: 10, scale: 2 });

        let unbounded = map_type(&info, -1, None, &enums).unwrap();
        assert_eq!(unbounded.target, TargetType::Float64);

        let too_wide = map_type(&info, numeric_mod(60, 2), None, &enums).unwrap();
        assert_eq!(too_wide.target, TargetType::Float64);

        let negative_scale = map_type(&info, numeric_mod(5, -2), None, &enums).unwrap();
        assert_eq!(negative_scale.target, TargetType::Float64);
    }

    #[test]
    fn test_array_maps_to_list() {
        let enums = EnumCatalog::new();
        let column = ColumnDescriptor::new("tags", PgTypeInfo::base("_int4"))
            .with_element(PgTypeInfo::base("int4"), 23);
        let mapped = map_column(&column, &enums).unwrap();
        assert_eq!(mapped.target_type(), &TargetType::list(TargetType::Int32));
        assert!(!mapped.needs_text_fallback);
        match mapped.mapped.source {
            SourceType::Array { element_oid, .. } => assert_eq!(element_oid, Some(23)),
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn test_enum_keeps_label_order() {
        let mut enums = EnumCatalog::new();
        let mood = enum_info("mood");
        enums.insert(&mood, vec!["sad".into(), "ok".into(), "happy".into()]);

        let mapped = map_column(&ColumnDescriptor::new("m", mood), &enums).unwrap();
        match mapped.target_type() {
            TargetType::Enum(e) => {
                assert_eq!(e.name(), "postgres_enum_mood");
                assert_eq!(e.labels(), ["sad", "ok", "happy"]);
            }
            other => panic!("unexpected target {other}"),
        }
    }

    #[test]
    fn test_unknown_type_falls_back_to_text() {
        let enums = EnumCatalog::new();
        let column = ColumnDescriptor::new("doc", PgTypeInfo::base("tsvector"));
        let mapped = map_column(&column, &enums).unwrap();
        assert!(mapped.needs_text_fallback);
        assert_eq!(mapped.target_type(), &TargetType::Utf8);
        assert_eq!(mapped.mapped.source, SourceType::TextCast);
    }

    #[test]
    fn test_array_of_unknown_falls_back_to_text() {
        let enums = EnumCatalog::new();
        let column = ColumnDescriptor::new("pts", PgTypeInfo::base("_point"))
            .with_element(PgTypeInfo::base("point"), 600);
        let mapped = map_column(&column, &enums).unwrap();
        assert!(mapped.needs_text_fallback);
    }

    #[test]
    fn test_pseudo_type_is_bind_error() {
        let enums = EnumCatalog::new();
        let mut info = PgTypeInfo::base("anyelement");
        info.kind = TypeKind::Pseudo;
        let err = map_column(&ColumnDescriptor::new("x", info), &enums).unwrap_err();
        assert!(err.is_bind_error());
    }
}
