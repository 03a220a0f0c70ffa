// Predicate pushdown - host filter trees rendered as source WHERE fragments

mod translate;

pub use translate::{quote_literal, translate_filter, ComparisonOp, FilterSet, TableFilter};
