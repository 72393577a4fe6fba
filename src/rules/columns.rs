//! Column rules. Group-by runs before select, so dimension-flagged columns
//! are consumed as grouping keys and everything else falls through to select.

use anyhow::{bail, Result};

use super::{register_parent_table, Rule, RuleEngine};
use crate::node::NodeKind::Column;
use crate::query::Query;
use crate::token::FastToken;

const GROUP: usize = 1;
const TAG: &str = "columns";

pub(crate) fn register(engine: &mut RuleEngine) {
    engine.register(
        GROUP,
        TAG,
        Rule::new(
            "group-by-column",
            "a dimension column becomes a grouping key",
            vec![Column],
            group_by_column,
        ),
    );
    engine.register(
        GROUP,
        TAG,
        Rule::new(
            "select-column",
            "a column becomes a select column",
            vec![Column],
            select_column,
        ),
    );
}

pub(crate) fn group_by_column(query: &mut Query, tokens: &[FastToken], span: &[usize]) -> Result<()> {
    let ci = match span {
        [c] => *c,
        _ => bail!("group-by-column expects a single-token span"),
    };
    let col = match tokens.get(ci).and_then(|t| t.columns.first()) {
        Some(c) => c,
        None => return Ok(()),
    };
    {
        let c = col.read();
        if !c.dimension || c.resolved {
            return Ok(());
        }
    }

    col.write().resolved = true;
    register_parent_table(query, &col.read());
    query.group_by.push(col.read().clone());
    Ok(())
}

pub(crate) fn select_column(query: &mut Query, tokens: &[FastToken], span: &[usize]) -> Result<()> {
    let ci = match span {
        [c] => *c,
        _ => bail!("select-column expects a single-token span"),
    };
    let col = match tokens.get(ci).and_then(|t| t.columns.first()) {
        Some(c) => c,
        None => return Ok(()),
    };
    if col.read().resolved {
        return Ok(());
    }

    col.write().resolved = true;
    register_parent_table(query, &col.read());
    query.select.push(col.read().clone());
    Ok(())
}
