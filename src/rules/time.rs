//! Time filter rules. Time candidates are never projected into the tag
//! sequence, so these cannot fire through matching today; they stay
//! registered for priority stability and are exercised directly.

use anyhow::{bail, Result};

use super::{register_parent_table, Rule, RuleEngine};
use crate::node::NodeKind::{Column, Operator, Time};
use crate::node::{ColumnNode, DataType, OperatorNode};
use crate::query::Query;
use crate::token::FastToken;

const GROUP: usize = 2;
const TAG: &str = "time";

pub(crate) fn register(engine: &mut RuleEngine) {
    engine.register(
        GROUP,
        TAG,
        Rule::new(
            "column-time-filter",
            "column, operator and a time expression become a filter",
            vec![Column, Operator, Time],
            column_time,
        ),
    );
    engine.register(
        GROUP,
        TAG,
        Rule::new(
            "operator-time-filter",
            "operator and a time expression filter the table's date column",
            vec![Operator, Time],
            operator_time,
        ),
    );
    engine.register(
        GROUP,
        TAG,
        Rule::new(
            "bare-time-filter",
            "a lone time expression becomes an equality filter on the table's date column",
            vec![Time],
            bare_time,
        ),
    );
}

/// The date column time filters land on when no column is named: the first
/// table's (by id) declared default, or its first date-typed column.
fn default_date_column(query: &Query) -> Option<ColumnNode> {
    query.tables.values().next().and_then(|t| t.date_column())
}

pub(crate) fn column_time(query: &mut Query, tokens: &[FastToken], span: &[usize]) -> Result<()> {
    let (ci, oi, ti) = match span {
        [c, o, t] => (*c, *o, *t),
        _ => bail!("column-time-filter expects a three-token span"),
    };
    let col = match tokens.get(ci).and_then(|t| t.columns.first()) {
        Some(c) => c,
        None => return Ok(()),
    };
    let op = match tokens.get(oi).and_then(|t| t.operators.first()) {
        Some(o) => o,
        None => return Ok(()),
    };
    let time = match tokens.get(ti).and_then(|t| t.times.first()) {
        Some(t) => t,
        None => return Ok(()),
    };
    // Only date-typed columns take a time bound.
    if col.read().data_type != DataType::Date {
        return Ok(());
    }
    if col.read().resolved || op.read().resolved || time.read().resolved {
        return Ok(());
    }

    let mut filter = op.read().clone();
    filter.column = Some(Box::new(col.read().clone()));
    filter.time = Some(Box::new(time.read().clone()));
    filter.resolved = true;
    col.write().resolved = true;
    op.write().resolved = true;
    time.write().resolved = true;
    register_parent_table(query, &col.read());
    query.filters.push(filter);
    Ok(())
}

pub(crate) fn operator_time(query: &mut Query, tokens: &[FastToken], span: &[usize]) -> Result<()> {
    let (oi, ti) = match span {
        [o, t] => (*o, *t),
        _ => bail!("operator-time-filter expects a two-token span"),
    };
    let op = match tokens.get(oi).and_then(|t| t.operators.first()) {
        Some(o) => o,
        None => return Ok(()),
    };
    let time = match tokens.get(ti).and_then(|t| t.times.first()) {
        Some(t) => t,
        None => return Ok(()),
    };
    if op.read().resolved || time.read().resolved {
        return Ok(());
    }
    let date_col = match default_date_column(query) {
        Some(c) => c,
        None => return Ok(()),
    };

    let mut filter = op.read().clone();
    filter.column = Some(Box::new(date_col));
    filter.time = Some(Box::new(time.read().clone()));
    filter.resolved = true;
    op.write().resolved = true;
    time.write().resolved = true;
    query.filters.push(filter);
    Ok(())
}

pub(crate) fn bare_time(query: &mut Query, tokens: &[FastToken], span: &[usize]) -> Result<()> {
    let ti = match span {
        [t] => *t,
        _ => bail!("bare-time-filter expects a single-token span"),
    };
    let time = match tokens.get(ti).and_then(|t| t.times.first()) {
        Some(t) => t,
        None => return Ok(()),
    };
    if time.read().resolved {
        return Ok(());
    }
    let date_col = match default_date_column(query) {
        Some(c) => c,
        None => return Ok(()),
    };

    let mut filter = OperatorNode::synthesized_eq(&time.read().uid);
    filter.column = Some(Box::new(date_col));
    filter.time = Some(Box::new(time.read().clone()));
    filter.resolved = true;
    time.write().resolved = true;
    query.filters.push(filter);
    Ok(())
}
