/// `pg_type.typtype` classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Base,
    Composite,
    Domain,
    Enum,
    Pseudo,
    Range,
    Multirange,
}

impl TypeKind {
    #[must_use]
    pub fn from_typtype(typtype: &str) -> Self {
        match typtype {
            "c" => Self::Composite,
            "d" => Self::Domain,
            "e" => Self::Enum,
            "p" => Self::Pseudo,
            "r" => Self::Range,
            "m" => Self::Multirange,
            _ => Self::Base,
        }
    }
}

/// Source type as reported by `pg_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgTypeInfo {
    pub namespace: String,
    pub name: String,
    pub len: i16,
    pub kind: TypeKind,
}

impl PgTypeInfo {
    #[must_use]
    pub fn base(name: &str) -> Self {
        Self {
            namespace: "pg_catalog".to_string(),
            name: name.to_string(),
            len: -1,
            kind: TypeKind::Base,
        }
    }

    /// Postgres names array types after their element with a leading underscore.
    #[must_use]
    pub fn is_array(&self) -> bool {
        self.name.starts_with('_')
    }
}

/// One column of the source table, bound once and shared read-only by all workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub type_info: PgTypeInfo,
    /// `atttypmod`, -1 when the type carries no modifier.
    pub type_modifier: i32,
    pub element: Option<PgTypeInfo>,
    pub element_oid: Option<u32>,
    pub nullable: bool,
}

impl ColumnDescriptor {
    #[must_use]
    pub fn new(name: &str, type_info: PgTypeInfo) -> Self {
        Self {
            name: name.to_string(),
            type_info,
            type_modifier: -1,
            element: None,
            element_oid: None,
            nullable: true,
        }
    }

    #[must_use]
    pub const fn with_type_modifier(mut self, type_modifier: i32) -> Self {
        self.type_modifier = type_modifier;
        self
    }

    #[must_use]
    pub fn with_element(mut self, element: PgTypeInfo, element_oid: u32) -> Self {
        self.element = Some(element);
        self.element_oid = Some(element_oid);
        self
    }
}
