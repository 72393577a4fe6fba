//! Token shapes produced by tokenization: the flat `Token` (word + candidate
//! list) and the bucketed `FastToken` the rule engine works over.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::node::{
    cell, Cell, ColumnNode, Node, OperatorNode, TableNode, TimeNode, UnknownNode, ValueNode,
};

/// A matched word at a sentence position with its candidate nodes.
/// Positions are char indices until the pipeline renumbers them to ordinals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Token {
    pub pos: usize,
    pub word: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
}

impl Token {
    pub fn new(pos: usize, word: impl Into<String>, nodes: Vec<Node>) -> Token {
        Token { pos, word: word.into(), nodes }
    }

    /// Deep copy: candidates land in fresh cells.
    pub fn deep_copy(&self) -> Token {
        Token {
            pos: self.pos,
            word: self.word.clone(),
            nodes: self.nodes.iter().map(Node::deep_copy).collect(),
        }
    }

    /// Partition candidates into typed buckets. Every candidate is copied
    /// into a fresh cell so resolver mutations never reach cached lexicon
    /// state. KnowledgeBase candidates carry no rule semantics and are
    /// dropped here.
    pub fn fast(&self) -> FastToken {
        let mut out = FastToken {
            pos: self.pos,
            word: self.word.clone(),
            ..Default::default()
        };
        for node in &self.nodes {
            match node {
                Node::Table(c) => out.tables.push(cell(c.read().clone())),
                Node::Column(c) => out.columns.push(cell(c.read().clone())),
                Node::Value(c) => out.values.push(cell(c.read().clone())),
                Node::Operator(c) => out.operators.push(cell(c.read().clone())),
                Node::Unknown(c) => out.unknowns.push(cell(c.read().clone())),
                Node::Time(c) => out.times.push(cell(c.read().clone())),
                Node::KnowledgeBase(_) => {}
            }
        }
        out
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.word, self.pos)
    }
}

/// A token with candidates split by type. Built once per tokenization call;
/// the rule pass shares the slice and mutates nodes through the cells.
#[derive(Debug, Clone, Default)]
pub struct FastToken {
    pub pos: usize,
    pub word: String,
    pub tables: Vec<Cell<TableNode>>,
    pub columns: Vec<Cell<ColumnNode>>,
    pub values: Vec<Cell<ValueNode>>,
    pub operators: Vec<Cell<OperatorNode>>,
    pub unknowns: Vec<Cell<UnknownNode>>,
    pub times: Vec<Cell<TimeNode>>,
}

impl FastToken {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
            && self.columns.is_empty()
            && self.values.is_empty()
            && self.operators.is_empty()
            && self.unknowns.is_empty()
            && self.times.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{KnowledgeBaseNode, NodeKind};

    fn sample() -> Token {
        Token::new(
            3,
            "cars",
            vec![
                ColumnNode { uid: "c1".into(), word: "cars".into(), name: "car".into(), ..Default::default() }.into(),
                ValueNode { uid: "v1".into(), word: "cars".into(), name: "cars".into(), ..Default::default() }.into(),
                KnowledgeBaseNode { uid: "kb".into(), word: "cars".into(), name: "auto".into(), resolved: false }.into(),
            ],
        )
    }

    #[test]
    fn partitions_by_kind_and_drops_knowledge_base() {
        let ft = sample().fast();
        assert_eq!(ft.columns.len(), 1);
        assert_eq!(ft.values.len(), 1);
        assert!(ft.tables.is_empty());
        assert!(!ft.is_empty());
    }

    #[test]
    fn fast_copies_do_not_touch_the_source_token() {
        let tok = sample();
        let ft = tok.fast();
        ft.columns[0].write().resolved = true;
        assert!(!tok.nodes[0].is_resolved());
        assert_eq!(tok.nodes[0].kind(), NodeKind::Column);
    }

    #[test]
    fn display_is_word_dash_pos() {
        assert_eq!(sample().to_string(), "cars-3");
    }
}
