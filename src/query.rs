//! Interpretation result model and the single-table SQL compiler. Queries
//! hold detached node snapshots; the rule pass appends to them and `to_sql`
//! turns the accumulated structure into a parameterized statement.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SqlError;
use crate::node::{AggregationFn, ColumnNode, DataType, OperatorNode, TableNode};

/// Wrap function for a grouped query's select column with no preference.
pub const DEFAULT_AGGREGATION_FN: AggregationFn = AggregationFn::Count;

/// A typed literal bound to a positional placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlParam {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for SqlParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlParam::Int(v) => write!(f, "{v}"),
            SqlParam::Float(v) => write!(f, "{v}"),
            SqlParam::Text(v) => write!(f, "{v}"),
        }
    }
}

/// Compiled statement: text with `$N` placeholders and the parallel args.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledSql {
    pub query: String,
    pub params: Vec<SqlParam>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Query {
    /// Tables referenced by resolved fragments, keyed by table id.
    #[serde(default)]
    pub tables: BTreeMap<String, TableNode>,
    #[serde(default)]
    pub select: Vec<ColumnNode>,
    #[serde(default)]
    pub group_by: Vec<ColumnNode>,
    #[serde(default)]
    pub filters: Vec<OperatorNode>,
    /// Opaque slot callers can attach execution results to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl Query {
    pub fn new() -> Query {
        Query::default()
    }

    /// Compile to a single-table statement. Exactly one table must have been
    /// registered; anything else is an explicit error.
    pub fn to_sql(&self) -> Result<CompiledSql, SqlError> {
        let table = match self.tables.len() {
            0 => return Err(SqlError::NoTables),
            1 => match self.tables.values().next() {
                Some(t) => t,
                None => return Err(SqlError::NoTables),
            },
            n => return Err(SqlError::UnsupportedTableCount(n)),
        };

        // A named group-by column forces aggregation wrapping on the select
        // list (the select columns only, never the group-by columns).
        let grouped = self.group_by.iter().any(|c| !c.name.is_empty());

        let mut cols: Vec<String> = Vec::new();
        for col in &self.select {
            if col.name.is_empty() {
                continue;
            }
            if grouped {
                let agg = col.aggregation_fn.unwrap_or(DEFAULT_AGGREGATION_FN);
                cols.push(format!("{}(\"{}\") AS \"{}\"", agg.as_sql(), col.name, col.name));
            } else {
                cols.push(format!("\"{}\" AS \"{}\"", col.name, col.name));
            }
        }
        for col in &self.group_by {
            if col.name.is_empty() {
                continue;
            }
            cols.push(format!("\"{}\"", col.name));
        }

        let mut sql = format!("SELECT {} FROM \"{}\"", cols.join(", "), table.name);

        let mut params: Vec<SqlParam> = Vec::new();
        let mut predicates: Vec<String> = Vec::new();
        for filter in &self.filters {
            match compile_filter(filter, params.len() + 1) {
                Some((predicate, param)) => {
                    predicates.push(predicate);
                    params.push(param);
                }
                None => debug!(filter = %filter.uid, "filter_skipped"),
            }
        }
        if !predicates.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&predicates.join(" AND "));
        }

        if grouped {
            let names: Vec<String> = self
                .group_by
                .iter()
                .filter(|c| !c.name.is_empty())
                .map(|c| format!("\"{}\"", c.name))
                .collect();
            sql.push_str(" GROUP BY ");
            sql.push_str(&names.join(", "));
        }

        Ok(CompiledSql { query: sql, params })
    }
}

/// One filter to a `"col" OP $N` predicate plus its bound argument. `None`
/// when the filter fails validation: unnamed or missing column, not exactly
/// one operand, a pattern operation on a comparable-only column, an
/// unparsable numeric literal, or a time operand on a non-date column.
fn compile_filter(op: &OperatorNode, position: usize) -> Option<(String, SqlParam)> {
    let col = op.column.as_deref()?;
    if col.name.is_empty() {
        return None;
    }

    let populated = usize::from(op.value.is_some())
        + usize::from(op.unknown.is_some())
        + usize::from(op.time.is_some());
    if populated != 1 {
        return None;
    }

    if col.data_type.is_comparable_only() && !op.operation.is_comparison() {
        return None;
    }

    let literal: String = if let Some(v) = op.value.as_deref() {
        if v.name.is_empty() { v.word.clone() } else { v.name.clone() }
    } else if let Some(u) = op.unknown.as_deref() {
        u.word.clone()
    } else {
        let t = op.time.as_deref()?;
        if col.data_type != DataType::Date {
            return None;
        }
        t.filter_time()?.to_rfc3339()
    };

    let param = match col.data_type {
        DataType::Int => SqlParam::Int(literal.trim().parse::<i64>().ok()?),
        DataType::Float => SqlParam::Float(literal.trim().parse::<f64>().ok()?),
        DataType::String | DataType::Date => {
            if op.operation.is_pattern() {
                SqlParam::Text(format!("'%{literal}%'"))
            } else {
                SqlParam::Text(format!("'{literal}'"))
            }
        }
    };

    // `contains` has no SQL spelling of its own; both patterns render as like.
    let symbol = if op.operation.is_pattern() { "like" } else { op.operation.symbol() };
    Some((format!("\"{}\" {} ${}", col.name, symbol, position), param))
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod query_tests;
