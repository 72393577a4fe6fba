//! Select backstops: whenever the earlier groups resolved something but left
//! the select list empty, borrow a column so compilation has something to
//! project. At most one of these takes effect per query.

use anyhow::{bail, Result};

use super::{Rule, RuleEngine};
use crate::node::NodeKind::{Column, Operator, Value};
use crate::query::Query;
use crate::token::FastToken;

const GROUP: usize = 3;
const TAG: &str = "backstops";

pub(crate) fn register(engine: &mut RuleEngine) {
    engine.register(
        GROUP,
        TAG,
        Rule::new(
            "select-from-group-by",
            "with no select columns, the first grouping key is selected instead",
            vec![Column],
            select_from_group_by,
        ),
    );
    engine.register(
        GROUP,
        TAG,
        Rule::new(
            "select-from-filter",
            "with no select columns, the first filter's column is selected",
            vec![Operator],
            select_from_filter,
        ),
    );
    engine.register(
        GROUP,
        TAG,
        Rule::new(
            "select-from-value",
            "with no select columns, a known value's own column is selected",
            vec![Value],
            select_from_value,
        ),
    );
}

pub(crate) fn select_from_group_by(query: &mut Query, _tokens: &[FastToken], span: &[usize]) -> Result<()> {
    if span.len() != 1 {
        bail!("select-from-group-by expects a single-token span");
    }
    if !query.select.is_empty() || query.group_by.is_empty() {
        return Ok(());
    }
    let col = query.group_by.remove(0);
    query.select.push(col);
    Ok(())
}

pub(crate) fn select_from_filter(query: &mut Query, _tokens: &[FastToken], span: &[usize]) -> Result<()> {
    if span.len() != 1 {
        bail!("select-from-filter expects a single-token span");
    }
    if !query.select.is_empty() {
        return Ok(());
    }
    let col = match query.filters.iter().find_map(|f| f.column.as_deref()) {
        Some(c) => c.clone(),
        None => return Ok(()),
    };
    query.select.push(col);
    Ok(())
}

pub(crate) fn select_from_value(query: &mut Query, tokens: &[FastToken], span: &[usize]) -> Result<()> {
    let vi = match span {
        [v] => *v,
        _ => bail!("select-from-value expects a single-token span"),
    };
    if !query.select.is_empty() {
        return Ok(());
    }
    let val = match tokens.get(vi).and_then(|t| t.values.first()) {
        Some(v) => v,
        None => return Ok(()),
    };
    let parent = match val.read().parent_column() {
        Some(c) => c,
        None => return Ok(()),
    };
    query.select.push(parent);
    Ok(())
}
