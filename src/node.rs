//! Semantic node model: the closed set of entity candidates a token can carry
//! (tables, columns, values, operators, unknown words, time expressions) plus
//! the shared-cell plumbing that lets rule resolvers mark nodes resolved
//! through any alias.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Shared, interior-mutable node cell. Candidates are held in cells so the
/// same instance can sit in a token's candidate list and in a typed bucket
/// at once; resolution through one alias is visible through all of them.
pub type Cell<T> = Arc<RwLock<T>>;

pub fn cell<T>(value: T) -> Cell<T> {
    Arc::new(RwLock::new(value))
}

/// Semantic type tags. `GroupBy` and `AggregationFn` exist for rule templates
/// only; no token candidate carries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    KnowledgeBase,
    Table,
    Column,
    Value,
    Operator,
    GroupBy,
    AggregationFn,
    Unknown,
    Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Int,
    Float,
    #[default]
    String,
    Date,
}

impl DataType {
    /// int, float and date columns only accept ordered comparisons in filters.
    pub fn is_comparable_only(&self) -> bool {
        matches!(self, DataType::Int | DataType::Float | DataType::Date)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int | DataType::Float)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationFn { Sum, Count, Avg, Min, Max }

impl AggregationFn {
    pub fn as_sql(&self) -> &'static str {
        match self {
            AggregationFn::Sum => "SUM",
            AggregationFn::Count => "COUNT",
            AggregationFn::Avg => "AVG",
            AggregationFn::Min => "MIN",
            AggregationFn::Max => "MAX",
        }
    }
}

/// Filter operations an operator word can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    #[default]
    Eq,
    Ne,
    Ge,
    Le,
    Contains,
    Like,
}

impl Operation {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operation::Eq => "=",
            Operation::Ne => "!=",
            Operation::Ge => ">=",
            Operation::Le => "<=",
            Operation::Contains => "contains",
            Operation::Like => "like",
        }
    }

    /// Whether this operation is one of the plain comparisons allowed on
    /// int/float/date columns.
    pub fn is_comparison(&self) -> bool {
        matches!(self, Operation::Eq | Operation::Ne | Operation::Ge | Operation::Le)
    }

    /// Whether the bound value should be wrapped in `%` wildcards.
    pub fn is_pattern(&self) -> bool {
        matches!(self, Operation::Contains | Operation::Like)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KnowledgeBaseNode {
    pub uid: String,
    pub word: String,
    pub name: String,
    #[serde(default)]
    pub resolved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TableNode {
    pub uid: String,
    pub word: String,
    pub name: String,
    // Owned column snapshots; their parent back-pointers are not populated.
    #[serde(default)]
    pub children: Vec<ColumnNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_date_field: Option<Box<ColumnNode>>,
    #[serde(default)]
    pub resolved: bool,
}

impl TableNode {
    /// The column a bare time filter should land on: the declared default
    /// date field, otherwise the first date-typed child.
    pub fn date_column(&self) -> Option<ColumnNode> {
        if let Some(f) = &self.default_date_field {
            return Some((**f).clone());
        }
        self.children.iter().find(|c| c.data_type == DataType::Date).cloned()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ColumnNode {
    pub uid: String,
    pub word: String,
    pub name: String,
    #[serde(default)]
    pub parent_uid: String,
    // In-process back-pointer to the owning table cell; never serialized and
    // never an ownership edge (the table does not point back at this cell).
    #[serde(skip)]
    pub parent: Option<Cell<TableNode>>,
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default)]
    pub dimension: bool,
    #[serde(default)]
    pub measure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation_fn: Option<AggregationFn>,
    #[serde(default)]
    pub resolved: bool,
}

impl ColumnNode {
    /// Snapshot of the parent table, if the back-pointer is populated.
    pub fn parent_table(&self) -> Option<TableNode> {
        self.parent.as_ref().map(|t| t.read().clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ValueNode {
    pub uid: String,
    pub word: String,
    pub name: String,
    #[serde(default)]
    pub parent_uid: String,
    #[serde(skip)]
    pub parent: Option<Cell<ColumnNode>>,
    #[serde(default)]
    pub resolved: bool,
}

impl ValueNode {
    pub fn parent_column(&self) -> Option<ColumnNode> {
        self.parent.as_ref().map(|c| c.read().clone())
    }
}

/// A filter operator, optionally bound to its operands. At most one of
/// `value`, `unknown` and `time` is populated alongside `column`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OperatorNode {
    pub uid: String,
    pub word: String,
    #[serde(default)]
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<Box<ColumnNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Box<ValueNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unknown: Option<Box<UnknownNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<Box<TimeNode>>,
    #[serde(default)]
    pub resolved: bool,
}

impl OperatorNode {
    /// Synthesized equality operator used by rules that have an operand but
    /// no operator word in the sentence. The id derives from the operand node
    /// so repeated synthesis for the same operand is stable.
    pub fn synthesized_eq(operand_uid: &str) -> OperatorNode {
        OperatorNode {
            uid: format!("Operator-{}", operand_uid),
            word: "is".to_string(),
            operation: Operation::Eq,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UnknownNode {
    pub uid: String,
    pub word: String,
    #[serde(default)]
    pub resolved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBound {
    pub time: DateTime<FixedOffset>,
    pub grain: String,
}

/// A recognized time expression. Point results carry `time`; interval results
/// carry at least one of `from`/`to` (and `time` mirrors the from-bound when
/// present).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TimeNode {
    pub uid: String,
    pub word: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub grain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<TimeBound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<TimeBound>,
    #[serde(default)]
    pub resolved: bool,
}

impl TimeNode {
    /// The timestamp a filter binds: the from-bound for intervals, otherwise
    /// the point value.
    pub fn filter_time(&self) -> Option<DateTime<FixedOffset>> {
        self.from.as_ref().map(|b| b.time).or(self.time)
    }
}

/// A token candidate. Cloning is cheap (the variants hold shared cells), and
/// a clone aliases the same underlying node.
#[derive(Debug, Clone)]
pub enum Node {
    KnowledgeBase(Cell<KnowledgeBaseNode>),
    Table(Cell<TableNode>),
    Column(Cell<ColumnNode>),
    Value(Cell<ValueNode>),
    Operator(Cell<OperatorNode>),
    Unknown(Cell<UnknownNode>),
    Time(Cell<TimeNode>),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::KnowledgeBase(_) => NodeKind::KnowledgeBase,
            Node::Table(_) => NodeKind::Table,
            Node::Column(_) => NodeKind::Column,
            Node::Value(_) => NodeKind::Value,
            Node::Operator(_) => NodeKind::Operator,
            Node::Unknown(_) => NodeKind::Unknown,
            Node::Time(_) => NodeKind::Time,
        }
    }

    pub fn uid(&self) -> String {
        match self {
            Node::KnowledgeBase(c) => c.read().uid.clone(),
            Node::Table(c) => c.read().uid.clone(),
            Node::Column(c) => c.read().uid.clone(),
            Node::Value(c) => c.read().uid.clone(),
            Node::Operator(c) => c.read().uid.clone(),
            Node::Unknown(c) => c.read().uid.clone(),
            Node::Time(c) => c.read().uid.clone(),
        }
    }

    pub fn word(&self) -> String {
        match self {
            Node::KnowledgeBase(c) => c.read().word.clone(),
            Node::Table(c) => c.read().word.clone(),
            Node::Column(c) => c.read().word.clone(),
            Node::Value(c) => c.read().word.clone(),
            Node::Operator(c) => c.read().word.clone(),
            Node::Unknown(c) => c.read().word.clone(),
            Node::Time(c) => c.read().word.clone(),
        }
    }

    /// Owning parent id; empty for variants without a parent edge.
    pub fn parent_uid(&self) -> String {
        match self {
            Node::Column(c) => c.read().parent_uid.clone(),
            Node::Value(c) => c.read().parent_uid.clone(),
            _ => String::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        match self {
            Node::KnowledgeBase(c) => c.read().resolved,
            Node::Table(c) => c.read().resolved,
            Node::Column(c) => c.read().resolved,
            Node::Value(c) => c.read().resolved,
            Node::Operator(c) => c.read().resolved,
            Node::Unknown(c) => c.read().resolved,
            Node::Time(c) => c.read().resolved,
        }
    }

    pub fn set_resolved(&self, resolved: bool) {
        match self {
            Node::KnowledgeBase(c) => c.write().resolved = resolved,
            Node::Table(c) => c.write().resolved = resolved,
            Node::Column(c) => c.write().resolved = resolved,
            Node::Value(c) => c.write().resolved = resolved,
            Node::Operator(c) => c.write().resolved = resolved,
            Node::Unknown(c) => c.write().resolved = resolved,
            Node::Time(c) => c.write().resolved = resolved,
        }
    }

    /// Fresh cell with a cloned payload. Parent back-pointers still alias the
    /// original parent cells; only this node's own state is detached.
    pub fn deep_copy(&self) -> Node {
        match self {
            Node::KnowledgeBase(c) => Node::KnowledgeBase(cell(c.read().clone())),
            Node::Table(c) => Node::Table(cell(c.read().clone())),
            Node::Column(c) => Node::Column(cell(c.read().clone())),
            Node::Value(c) => Node::Value(cell(c.read().clone())),
            Node::Operator(c) => Node::Operator(cell(c.read().clone())),
            Node::Unknown(c) => Node::Unknown(cell(c.read().clone())),
            Node::Time(c) => Node::Time(cell(c.read().clone())),
        }
    }
}

impl From<KnowledgeBaseNode> for Node {
    fn from(n: KnowledgeBaseNode) -> Node { Node::KnowledgeBase(cell(n)) }
}
impl From<TableNode> for Node {
    fn from(n: TableNode) -> Node { Node::Table(cell(n)) }
}
impl From<ColumnNode> for Node {
    fn from(n: ColumnNode) -> Node { Node::Column(cell(n)) }
}
impl From<ValueNode> for Node {
    fn from(n: ValueNode) -> Node { Node::Value(cell(n)) }
}
impl From<OperatorNode> for Node {
    fn from(n: OperatorNode) -> Node { Node::Operator(cell(n)) }
}
impl From<UnknownNode> for Node {
    fn from(n: UnknownNode) -> Node { Node::Unknown(cell(n)) }
}
impl From<TimeNode> for Node {
    fn from(n: TimeNode) -> Node { Node::Time(cell(n)) }
}

// Wire form: the payload flattened next to a `type` tag. Back-pointers are
// skipped by the payload structs themselves.
#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum NodeRepr {
    KnowledgeBase(KnowledgeBaseNode),
    Table(TableNode),
    Column(ColumnNode),
    Value(ValueNode),
    Operator(OperatorNode),
    Unknown(UnknownNode),
    Time(TimeNode),
}

impl Serialize for Node {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let repr = match self {
            Node::KnowledgeBase(c) => NodeRepr::KnowledgeBase(c.read().clone()),
            Node::Table(c) => NodeRepr::Table(c.read().clone()),
            Node::Column(c) => NodeRepr::Column(c.read().clone()),
            Node::Value(c) => NodeRepr::Value(c.read().clone()),
            Node::Operator(c) => NodeRepr::Operator(c.read().clone()),
            Node::Unknown(c) => NodeRepr::Unknown(c.read().clone()),
            Node::Time(c) => NodeRepr::Time(c.read().clone()),
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match NodeRepr::deserialize(deserializer)? {
            NodeRepr::KnowledgeBase(n) => Node::KnowledgeBase(cell(n)),
            NodeRepr::Table(n) => Node::Table(cell(n)),
            NodeRepr::Column(n) => Node::Column(cell(n)),
            NodeRepr::Value(n) => Node::Value(cell(n)),
            NodeRepr::Operator(n) => Node::Operator(cell(n)),
            NodeRepr::Unknown(n) => Node::Unknown(cell(n)),
            NodeRepr::Time(n) => Node::Time(cell(n)),
        })
    }
}
