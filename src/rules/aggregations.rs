//! Aggregation backfill. The GroupBy tag is never projected, so this fires
//! only when invoked directly; the compiler's COUNT default covers the
//! matched path. Registered to keep the priority layout complete.

use anyhow::{bail, Result};

use super::{Rule, RuleEngine};
use crate::node::{AggregationFn, NodeKind};
use crate::query::Query;
use crate::token::FastToken;

const GROUP: usize = 4;
const TAG: &str = "aggregations";

pub(crate) fn register(engine: &mut RuleEngine) {
    engine.register(
        GROUP,
        TAG,
        Rule::new(
            "aggregation-backfill",
            "grouped queries aggregate their select columns, SUM for numeric measures and COUNT otherwise",
            vec![NodeKind::GroupBy],
            backfill,
        ),
    );
}

pub(crate) fn backfill(query: &mut Query, _tokens: &[FastToken], span: &[usize]) -> Result<()> {
    if span.len() != 1 {
        bail!("aggregation-backfill expects a single-token span");
    }
    if query.group_by.is_empty() {
        return Ok(());
    }
    for col in &mut query.select {
        if col.aggregation_fn.is_none() {
            col.aggregation_fn = Some(if col.data_type.is_numeric() && col.measure {
                AggregationFn::Sum
            } else {
                AggregationFn::Count
            });
        }
    }
    Ok(())
}
