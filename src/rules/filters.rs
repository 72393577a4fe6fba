//! Filter rules: operator-bound spans and the operator-less value forms.

use anyhow::{bail, Result};

use super::{register_parent_table, Rule, RuleEngine};
use crate::node::NodeKind::{Column, Operator, Unknown, Value};
use crate::node::OperatorNode;
use crate::query::Query;
use crate::token::FastToken;

const GROUP: usize = 0;
const TAG: &str = "filters";

pub(crate) fn register(engine: &mut RuleEngine) {
    engine.register(
        GROUP,
        TAG,
        Rule::new(
            "unknown-value-filter",
            "column, operator and an unknown word become a filter",
            vec![Column, Operator, Unknown],
            unknown_value,
        ),
    );
    engine.register(
        GROUP,
        TAG,
        Rule::new(
            "known-value-filter",
            "column, operator and one of the column's known values become a filter",
            vec![Column, Operator, Value],
            known_value,
        ),
    );
    engine.register(
        GROUP,
        TAG,
        Rule::new(
            "default-operator-filter",
            "column followed by a known value becomes an equality filter",
            vec![Column, Value],
            default_operator,
        ),
    );
    engine.register(
        GROUP,
        TAG,
        Rule::new(
            "value-only-filter",
            "a lone known value becomes an equality filter on its own column",
            vec![Value],
            value_only,
        ),
    );
}

pub(crate) fn unknown_value(query: &mut Query, tokens: &[FastToken], span: &[usize]) -> Result<()> {
    let (ci, oi, ui) = match span {
        [c, o, u] => (*c, *o, *u),
        _ => bail!("unknown-value-filter expects a three-token span"),
    };
    let col = match tokens.get(ci).and_then(|t| t.columns.first()) {
        Some(c) => c,
        None => return Ok(()),
    };
    let op = match tokens.get(oi).and_then(|t| t.operators.first()) {
        Some(o) => o,
        None => return Ok(()),
    };
    let unk = match tokens.get(ui).and_then(|t| t.unknowns.first()) {
        Some(u) => u,
        None => return Ok(()),
    };
    if col.read().resolved || op.read().resolved || unk.read().resolved {
        return Ok(());
    }

    let mut filter = op.read().clone();
    filter.column = Some(Box::new(col.read().clone()));
    filter.unknown = Some(Box::new(unk.read().clone()));
    filter.resolved = true;
    col.write().resolved = true;
    op.write().resolved = true;
    unk.write().resolved = true;
    query.filters.push(filter);
    Ok(())
}

pub(crate) fn known_value(query: &mut Query, tokens: &[FastToken], span: &[usize]) -> Result<()> {
    let (ci, oi, vi) = match span {
        [c, o, v] => (*c, *o, *v),
        _ => bail!("known-value-filter expects a three-token span"),
    };
    let col = match tokens.get(ci).and_then(|t| t.columns.first()) {
        Some(c) => c,
        None => return Ok(()),
    };
    let op = match tokens.get(oi).and_then(|t| t.operators.first()) {
        Some(o) => o,
        None => return Ok(()),
    };
    let val = match tokens.get(vi).and_then(|t| t.values.first()) {
        Some(v) => v,
        None => return Ok(()),
    };
    // The value must belong to the column it is being filtered against.
    if val.read().parent_uid != col.read().uid {
        return Ok(());
    }
    if col.read().resolved || op.read().resolved || val.read().resolved {
        return Ok(());
    }

    let mut filter = op.read().clone();
    filter.column = Some(Box::new(col.read().clone()));
    filter.value = Some(Box::new(val.read().clone()));
    filter.resolved = true;
    col.write().resolved = true;
    op.write().resolved = true;
    val.write().resolved = true;
    register_parent_table(query, &col.read());
    query.filters.push(filter);
    Ok(())
}

pub(crate) fn default_operator(query: &mut Query, tokens: &[FastToken], span: &[usize]) -> Result<()> {
    let (ci, vi) = match span {
        [c, v] => (*c, *v),
        _ => bail!("default-operator-filter expects a two-token span"),
    };
    let col = match tokens.get(ci).and_then(|t| t.columns.first()) {
        Some(c) => c,
        None => return Ok(()),
    };
    let val = match tokens.get(vi).and_then(|t| t.values.first()) {
        Some(v) => v,
        None => return Ok(()),
    };
    // The value must belong to the column it is being filtered against.
    if val.read().parent_uid != col.read().uid {
        return Ok(());
    }
    if col.read().resolved || val.read().resolved {
        return Ok(());
    }

    let mut filter = OperatorNode::synthesized_eq(&val.read().uid);
    filter.column = Some(Box::new(col.read().clone()));
    filter.value = Some(Box::new(val.read().clone()));
    filter.resolved = true;
    col.write().resolved = true;
    val.write().resolved = true;
    query.filters.push(filter);
    Ok(())
}

pub(crate) fn value_only(query: &mut Query, tokens: &[FastToken], span: &[usize]) -> Result<()> {
    let vi = match span {
        [v] => *v,
        _ => bail!("value-only-filter expects a single-token span"),
    };
    let val = match tokens.get(vi).and_then(|t| t.values.first()) {
        Some(v) => v,
        None => return Ok(()),
    };
    if val.read().resolved {
        return Ok(());
    }
    let parent = match val.read().parent_column() {
        Some(c) => c,
        None => return Ok(()),
    };

    let mut filter = OperatorNode::synthesized_eq(&val.read().uid);
    filter.column = Some(Box::new(parent));
    filter.value = Some(Box::new(val.read().clone()));
    filter.resolved = true;
    val.write().resolved = true;
    query.filters.push(filter);
    Ok(())
}
