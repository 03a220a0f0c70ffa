use std::collections::BTreeMap;
use std::fmt;

use crate::core::{Result, ScalarValue, ScanError};

/// Comparison kinds the host engine may attach to a constant filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
    IsDistinctFrom,
    IsNotDistinctFrom,
}

impl ComparisonOp {
    fn to_sql(self) -> Result<&'static str> {
        match self {
            Self::Equal => Ok("="),
            Self::NotEqual => Ok("!="),
            Self::LessThan => Ok("<"),
            Self::GreaterThan => Ok(">"),
            Self::LessThanOrEqual => Ok("<="),
            Self::GreaterThanOrEqual => Ok(">="),
            other => Err(ScanError::Internal(format!(
                "unsupported comparison in pushed-down filter: {other:?}"
            ))),
        }
    }
}

/// Filter bound to a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum TableFilter {
    ConstantComparison { op: ComparisonOp, value: ScalarValue },
    IsNull,
    IsNotNull,
    And(Vec<TableFilter>),
    Or(Vec<TableFilter>),
}

impl TableFilter {
    #[must_use]
    pub const fn compare(op: ComparisonOp, value: ScalarValue) -> Self {
        Self::ConstantComparison { op, value }
    }
}

impl fmt::Display for TableFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match translate_filter("col", self) {
            Ok(sql) => write!(f, "{sql}"),
            Err(e) => write!(f, "<{e}>"),
        }
    }
}

/// Filters keyed by table column index. Entries are combined with AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    filters: BTreeMap<usize, TableFilter>,
}

impl FilterSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter; a second filter on the same column is ANDed with the first.
    pub fn push(&mut self, column: usize, filter: TableFilter) {
        let merged = match self.filters.remove(&column) {
            Some(TableFilter::And(mut children)) => {
                children.push(filter);
                TableFilter::And(children)
            }
            Some(existing) => TableFilter::And(vec![existing, filter]),
            None => filter,
        };
        self.filters.insert(column, merged);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &TableFilter)> {
        self.filters.iter().map(|(idx, filter)| (*idx, filter))
    }
}

/// Quotes a constant as a string literal, doubling embedded quotes.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Renders a filter against an already-quoted column reference.
pub fn translate_filter(column: &str, filter: &TableFilter) -> Result<String> {
    match filter {
        TableFilter::IsNull => Ok(format!("{column} IS NULL")),
        TableFilter::IsNotNull => Ok(format!("{column} IS NOT NULL")),
        TableFilter::And(children) => conjunction(column, children, "AND"),
        TableFilter::Or(children) => conjunction(column, children, "OR"),
        TableFilter::ConstantComparison { op, value } => {
            if value.is_null() {
                return Err(ScanError::Internal(
                    "comparison against NULL cannot be pushed down".to_string(),
                ));
            }
            Ok(format!("{column} {} {}", op.to_sql()?, quote_literal(&value.to_string())))
        }
    }
}

fn conjunction(column: &str, children: &[TableFilter], op: &str) -> Result<String> {
    if children.is_empty() {
        return Err(ScanError::Internal(format!("empty {op} conjunction in pushed-down filter")));
    }
    let entries = children
        .iter()
        .map(|child| translate_filter(column, child))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("({})", entries.join(&format!(" {op} "))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eq(v: i32) -> TableFilter {
        TableFilter::compare(ComparisonOp::Equal, ScalarValue::Int32(v))
    }

    #[test]
    fn test_comparisons() {
        let filter = TableFilter::compare(ComparisonOp::GreaterThanOrEqual, ScalarValue::Int64(10));
        assert_eq!(translate_filter("\"id\"", &filter).unwrap(), "\"id\" >= '10'");

        let filter = TableFilter::compare(ComparisonOp::NotEqual, ScalarValue::Utf8("x".into()));
        assert_eq!(translate_filter("\"name\"", &filter).unwrap(), "\"name\" != 'x'");
    }

    #[test]
    fn test_null_checks() {
        assert_eq!(translate_filter("\"a\"", &TableFilter::IsNull).unwrap(), "\"a\" IS NULL");
        assert_eq!(translate_filter("\"a\"", &TableFilter::IsNotNull).unwrap(), "\"a\" IS NOT NULL");
    }

    #[test]
    fn test_nested_conjunctions_are_parenthesized() {
        let filter = TableFilter::And(vec![eq(1), TableFilter::Or(vec![eq(2), eq(3)])]);
        assert_eq!(
            translate_filter("c", &filter).unwrap(),
            "(c = '1' AND (c = '2' OR c = '3'))"
        );
    }

    #[test]
    fn test_literal_quotes_are_escaped() {
        let filter = TableFilter::compare(ComparisonOp::Equal, ScalarValue::Utf8("O'Brien".into()));
        assert_eq!(translate_filter("n", &filter).unwrap(), "n = 'O''Brien'");
    }

    #[test]
    fn test_unsupported_filters_are_internal_errors() {
        let filter = TableFilter::compare(ComparisonOp::IsDistinctFrom, ScalarValue::Int32(1));
        assert!(matches!(translate_filter("c", &filter), Err(ScanError::Internal(_))));
        assert!(matches!(
            translate_filter("c", &TableFilter::Or(vec![])),
            Err(ScanError::Internal(_))
        ));
    }

    #[test]
    fn test_filter_set_merges_same_column() {
        let mut set = FilterSet::new();
        set.push(0, eq(1));
        set.push(0, TableFilter::IsNotNull);
        set.push(0, eq(2));
        let filters: Vec<_> = set.iter().collect();
        assert_eq!(filters.len(), 1);
        assert_eq!(
            translate_filter("c", filters[0].1).unwrap(),
            "(c = '1' AND c IS NOT NULL AND c = '2')"
        );
    }
}
