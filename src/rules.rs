//! Prioritized rule engine. Rules carry a template of semantic type tags that
//! is matched (KMP, all overlapping occurrences) against a projection of the
//! token stream; matched rules run resolvers that accumulate Query fragments.
//! Priority is two-level: group registration order, then in-group order.

use anyhow::Result;
use serde::Serialize;
use tracing::warn;

use crate::kmp::Kmp;
use crate::node::{ColumnNode, NodeKind};
use crate::query::Query;
use crate::token::FastToken;

mod aggregations;
mod backstops;
mod columns;
mod filters;
mod time;

/// A resolver maps one template match onto Query mutations. `span` holds the
/// token index for each template position; resolvers address tokens only
/// through it.
pub type Resolver = Box<dyn Fn(&mut Query, &[FastToken], &[usize]) -> Result<()> + Send + Sync>;

pub struct Rule {
    pub name: String,
    pub description: String,
    pub disabled: bool,
    pub template: Vec<NodeKind>,
    resolver: Resolver,
    matcher: Kmp,
    /// Start positions in the projection, refreshed by every match pass.
    matches: Vec<usize>,
}

impl Rule {
    pub fn new<F>(name: &str, description: &str, template: Vec<NodeKind>, resolver: F) -> Rule
    where
        F: Fn(&mut Query, &[FastToken], &[usize]) -> Result<()> + Send + Sync + 'static,
    {
        let matcher = Kmp::new(&template);
        Rule {
            name: name.to_string(),
            description: description.to_string(),
            disabled: false,
            template,
            resolver: Box::new(resolver),
            matcher,
            matches: Vec::new(),
        }
    }
}

pub struct RuleGroup {
    pub tag: String,
    pub rules: Vec<Rule>,
}

/// Introspection snapshot of a registered rule.
#[derive(Debug, Clone, Serialize)]
pub struct RuleInfo {
    pub group: usize,
    pub index: usize,
    pub group_tag: String,
    pub name: String,
    pub description: String,
    pub disabled: bool,
    pub template: Vec<NodeKind>,
}

/// One representative type tag per token, with the parallel map back to token
/// indices. Tokens with no projectable candidate contribute nothing, so the
/// tag sequence can be shorter than the token slice.
pub(crate) struct Projection {
    pub tags: Vec<NodeKind>,
    pub token_index: Vec<usize>,
}

/// Fixed precedence: Operator > Value > Column > Table > Unknown. Time
/// candidates are never projected, so time-templated rules cannot fire
/// through matching.
pub(crate) fn project(tokens: &[FastToken]) -> Projection {
    let mut tags = Vec::new();
    let mut token_index = Vec::new();
    for (i, tok) in tokens.iter().enumerate() {
        let tag = if !tok.operators.is_empty() {
            NodeKind::Operator
        } else if !tok.values.is_empty() {
            NodeKind::Value
        } else if !tok.columns.is_empty() {
            NodeKind::Column
        } else if !tok.tables.is_empty() {
            NodeKind::Table
        } else if !tok.unknowns.is_empty() {
            NodeKind::Unknown
        } else {
            continue;
        };
        tags.push(tag);
        token_index.push(i);
    }
    Projection { tags, token_index }
}

#[derive(Default)]
pub struct RuleEngine {
    groups: Vec<RuleGroup>,
}

impl RuleEngine {
    pub fn new() -> RuleEngine {
        RuleEngine::default()
    }

    /// The built-in rule set: filters, columns, time filters, select
    /// backstops and aggregation backfill, in that priority order.
    pub fn with_default_rules() -> RuleEngine {
        let mut engine = RuleEngine::new();
        filters::register(&mut engine);
        columns::register(&mut engine);
        time::register(&mut engine);
        backstops::register(&mut engine);
        aggregations::register(&mut engine);
        engine
    }

    /// Append a rule at the given group slot. Registering at an occupied slot
    /// with a different tag replaces that whole group.
    pub fn register(&mut self, group: usize, tag: &str, rule: Rule) {
        while self.groups.len() <= group {
            self.groups.push(RuleGroup { tag: String::new(), rules: Vec::new() });
        }
        let slot = &mut self.groups[group];
        if slot.tag != tag {
            slot.tag = tag.to_string();
            slot.rules.clear();
        }
        slot.rules.push(rule);
    }

    /// Toggle a rule by its (group, in-group) coordinate. False when the
    /// coordinate does not exist.
    pub fn set_disabled(&mut self, group: usize, index: usize, disabled: bool) -> bool {
        match self.groups.get_mut(group).and_then(|g| g.rules.get_mut(index)) {
            Some(rule) => {
                rule.disabled = disabled;
                true
            }
            None => false,
        }
    }

    pub fn rules(&self) -> Vec<RuleInfo> {
        let mut out = Vec::new();
        for (gi, group) in self.groups.iter().enumerate() {
            for (ri, rule) in group.rules.iter().enumerate() {
                out.push(RuleInfo {
                    group: gi,
                    index: ri,
                    group_tag: group.tag.clone(),
                    name: rule.name.clone(),
                    description: rule.description.clone(),
                    disabled: rule.disabled,
                    template: rule.template.clone(),
                });
            }
        }
        out
    }

    fn match_rules(&mut self, tags: &[NodeKind]) {
        for group in &mut self.groups {
            for rule in &mut group.rules {
                rule.matches = if rule.disabled { Vec::new() } else { rule.matcher.matches(tags) };
            }
        }
    }

    /// Run the full rule pass over one token stream and return the
    /// accumulated Query. Resolver errors are logged and that application
    /// skipped; resolution order is strict (group, in-group, match position).
    pub fn interpret(&mut self, tokens: &[FastToken]) -> Query {
        let projection = project(tokens);
        self.match_rules(&projection.tags);

        let mut query = Query::new();
        for group in &self.groups {
            for rule in &group.rules {
                if rule.disabled {
                    continue;
                }
                for &start in &rule.matches {
                    let span = &projection.token_index[start..start + rule.template.len()];
                    if let Err(err) = (rule.resolver)(&mut query, tokens, span) {
                        warn!(rule = %rule.name, error = %err, "rule resolver failed; match skipped");
                    }
                }
            }
        }
        query
    }
}

/// Register the column's parent table on the query, when the back-pointer is
/// populated. Only some resolvers do this; the selection is deliberate and
/// drives the single-table check at compile time.
pub(crate) fn register_parent_table(query: &mut Query, col: &ColumnNode) {
    if let Some(table) = col.parent_table() {
        query.tables.entry(table.uid.clone()).or_insert(table);
    }
}

#[cfg(test)]
#[path = "rules_tests.rs"]
mod rules_tests;
