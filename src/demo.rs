//! Built-in automobile-sales knowledge base. The CLI serves it through the
//! source-fallback path and the end-to-end suites interpret against it, so
//! every consumer sees the same words and wiring.

use crate::lexicon::Lexicon;
use crate::node::{
    cell, AggregationFn, ColumnNode, DataType, Node, Operation, OperatorNode, TableNode, ValueNode,
};
use crate::token::Token;

fn operator_nodes(uid: &str, word: &str, operation: Operation) -> Vec<Node> {
    vec![OperatorNode { uid: uid.into(), word: word.into(), operation, ..Default::default() }.into()]
}

/// One table with a plain column, a dimension, a date column and a measure,
/// one known value and three operator words. "sales" is deliberately
/// ambiguous between the table and its measure column, and car/brand carry
/// plural word forms alongside the singular ones.
pub fn lexicon() -> Lexicon {
    let table = cell(TableNode {
        uid: "t-automobile-sales".into(),
        word: "sales".into(),
        name: "automobile sales".into(),
        ..Default::default()
    });
    let car = cell(ColumnNode {
        uid: "c-car".into(),
        word: "car".into(),
        name: "car".into(),
        parent_uid: "t-automobile-sales".into(),
        parent: Some(table.clone()),
        ..Default::default()
    });
    let brand = cell(ColumnNode {
        uid: "c-brand".into(),
        word: "brand".into(),
        name: "brand".into(),
        parent_uid: "t-automobile-sales".into(),
        parent: Some(table.clone()),
        dimension: true,
        ..Default::default()
    });
    let year = cell(ColumnNode {
        uid: "c-financial-year".into(),
        word: "year".into(),
        name: "financial-year".into(),
        parent_uid: "t-automobile-sales".into(),
        parent: Some(table.clone()),
        data_type: DataType::Date,
        ..Default::default()
    });
    let sales = cell(ColumnNode {
        uid: "c-sales".into(),
        word: "sales".into(),
        name: "sales".into(),
        parent_uid: "t-automobile-sales".into(),
        parent: Some(table.clone()),
        data_type: DataType::Int,
        measure: true,
        aggregation_fn: Some(AggregationFn::Sum),
        ..Default::default()
    });
    {
        let mut t = table.write();
        t.children = vec![car.read().clone(), brand.read().clone(), year.read().clone(), sales.read().clone()];
        t.default_date_field = Some(Box::new(year.read().clone()));
    }
    let swift = cell(ValueNode {
        uid: "v-swift".into(),
        word: "Swift".into(),
        name: "Swift".into(),
        parent_uid: "c-car".into(),
        parent: Some(car.clone()),
        ..Default::default()
    });

    let mut lx = Lexicon::new();
    lx.insert("car", Token::new(0, "car", vec![Node::Column(car.clone())]));
    lx.insert("cars", Token::new(0, "cars", vec![Node::Column(car)]));
    lx.insert("brand", Token::new(0, "brand", vec![Node::Column(brand.clone())]));
    lx.insert("brands", Token::new(0, "brands", vec![Node::Column(brand)]));
    lx.insert("year", Token::new(0, "year", vec![Node::Column(year)]));
    lx.insert("sales", Token::new(0, "sales", vec![Node::Table(table), Node::Column(sales)]));
    lx.insert("Swift", Token::new(0, "Swift", vec![Node::Value(swift)]));
    lx.insert("is", Token::new(0, "is", operator_nodes("o-is", "is", Operation::Eq)));
    lx.insert("before", Token::new(0, "before", operator_nodes("o-before", "before", Operation::Le)));
    lx.insert("like", Token::new(0, "like", operator_nodes("o-like", "like", Operation::Like)));
    lx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_the_words_and_wiring_the_flows_depend_on() {
        let lx = lexicon();

        // Singular and plural forms so overlapping matches get exercised.
        for word in ["car", "cars", "brand", "brands", "year", "sales", "Swift", "is", "before", "like"] {
            assert!(lx.map.contains_key(word), "missing word {word}");
        }

        // "sales" stays ambiguous between the table and its measure column.
        let sales = &lx.map["sales"].nodes;
        assert!(sales.iter().any(|n| matches!(n, Node::Table(_))));
        let measure = sales
            .iter()
            .find_map(|n| match n {
                Node::Column(c) => Some(c.read().clone()),
                _ => None,
            })
            .unwrap();
        assert!(measure.measure);
        assert_eq!(measure.aggregation_fn, Some(AggregationFn::Sum));

        // The known value belongs to the car column, back-pointer included.
        match &lx.map["Swift"].nodes[0] {
            Node::Value(v) => {
                assert_eq!(v.read().parent_uid, "c-car");
                assert_eq!(v.read().parent.as_ref().unwrap().read().uid, "c-car");
            }
            other => panic!("Swift should be a value, got {:?}", other.kind()),
        }

        // Time filters land on the declared default date column.
        match &lx.map["sales"].nodes[0] {
            Node::Table(t) => {
                let default = t.read().default_date_field.as_deref().cloned().unwrap();
                assert_eq!(default.uid, "c-financial-year");
                assert_eq!(default.data_type, DataType::Date);
            }
            other => panic!("first sales candidate should be the table, got {:?}", other.kind()),
        }
    }
}
