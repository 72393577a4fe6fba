use super::*;
use crate::node::{Operation, TimeBound, TimeNode, UnknownNode, ValueNode};
use chrono::DateTime;

fn table(name: &str) -> TableNode {
    TableNode { uid: format!("t-{name}"), name: name.into(), ..Default::default() }
}

fn column(name: &str, data_type: DataType) -> ColumnNode {
    ColumnNode { uid: format!("c-{name}"), name: name.into(), data_type, ..Default::default() }
}

fn filter(col: ColumnNode, operation: Operation) -> OperatorNode {
    OperatorNode {
        uid: format!("o-{}", col.name),
        word: "is".into(),
        operation,
        column: Some(Box::new(col)),
        ..Default::default()
    }
}

fn with_unknown(mut op: OperatorNode, word: &str) -> OperatorNode {
    op.unknown = Some(Box::new(UnknownNode { uid: "U0".into(), word: word.into(), resolved: false }));
    op
}

fn with_value(mut op: OperatorNode, name: &str, word: &str) -> OperatorNode {
    op.value = Some(Box::new(ValueNode {
        uid: "v0".into(),
        name: name.into(),
        word: word.into(),
        ..Default::default()
    }));
    op
}

fn single_table(name: &str) -> Query {
    let t = table(name);
    let mut q = Query::new();
    q.tables.insert(t.uid.clone(), t);
    q
}

#[test]
fn bare_select_compiles_to_golden_string() {
    let mut q = single_table("stores");
    q.select.push(column("city", DataType::String));
    let compiled = q.to_sql().unwrap();
    assert_eq!(compiled.query, r#"SELECT "city" AS "city" FROM "stores""#);
    assert!(compiled.params.is_empty());
}

#[test]
fn table_count_must_be_exactly_one() {
    let q = Query::new();
    assert!(matches!(q.to_sql(), Err(SqlError::NoTables)));

    let mut q = single_table("stores");
    let extra = table("sales");
    q.tables.insert(extra.uid.clone(), extra);
    assert!(matches!(q.to_sql(), Err(SqlError::UnsupportedTableCount(2))));
}

#[test]
fn unnamed_select_columns_are_skipped() {
    let mut q = single_table("stores");
    q.select.push(ColumnNode::default());
    q.select.push(column("city", DataType::String));
    let compiled = q.to_sql().unwrap();
    assert_eq!(compiled.query, r#"SELECT "city" AS "city" FROM "stores""#);
}

#[test]
fn unknown_operand_binds_quoted_text() {
    let mut q = single_table("stores");
    q.select.push(column("city", DataType::String));
    q.filters.push(with_unknown(filter(column("city", DataType::String), Operation::Eq), "Delhi"));
    let compiled = q.to_sql().unwrap();
    assert_eq!(
        compiled.query,
        r#"SELECT "city" AS "city" FROM "stores" WHERE "city" = $1"#
    );
    assert_eq!(compiled.params, vec![SqlParam::Text("'Delhi'".into())]);
}

#[test]
fn value_operand_prefers_name_over_word() {
    let mut q = single_table("stores");
    q.select.push(column("city", DataType::String));
    q.filters.push(with_value(filter(column("city", DataType::String), Operation::Eq), "Delhi", "delhi"));
    let compiled = q.to_sql().unwrap();
    assert_eq!(compiled.params, vec![SqlParam::Text("'Delhi'".into())]);
}

#[test]
fn grouping_wraps_select_columns_only() {
    let mut q = single_table("sales");
    let mut measure = column("revenue", DataType::Int);
    measure.aggregation_fn = Some(AggregationFn::Sum);
    q.select.push(measure);
    q.group_by.push(column("brand", DataType::String));
    let compiled = q.to_sql().unwrap();
    assert_eq!(
        compiled.query,
        r#"SELECT SUM("revenue") AS "revenue", "brand" FROM "sales" GROUP BY "brand""#
    );
}

#[test]
fn grouping_defaults_to_count() {
    let mut q = single_table("sales");
    q.select.push(column("car", DataType::String));
    q.group_by.push(column("brand", DataType::String));
    let compiled = q.to_sql().unwrap();
    assert_eq!(
        compiled.query,
        r#"SELECT COUNT("car") AS "car", "brand" FROM "sales" GROUP BY "brand""#
    );
}

#[test]
fn numeric_literals_parse_into_typed_params() {
    let mut q = single_table("sales");
    q.select.push(column("car", DataType::String));
    q.filters.push(with_unknown(filter(column("units", DataType::Int), Operation::Ge), "40"));
    q.filters.push(with_unknown(filter(column("price", DataType::Float), Operation::Le), "9.5"));
    let compiled = q.to_sql().unwrap();
    assert_eq!(
        compiled.query,
        r#"SELECT "car" AS "car" FROM "sales" WHERE "units" >= $1 AND "price" <= $2"#
    );
    assert_eq!(compiled.params, vec![SqlParam::Int(40), SqlParam::Float(9.5)]);
}

#[test]
fn unparsable_numeric_literal_drops_the_filter() {
    let mut q = single_table("sales");
    q.select.push(column("car", DataType::String));
    q.filters.push(with_unknown(filter(column("units", DataType::Int), Operation::Eq), "forty"));
    let compiled = q.to_sql().unwrap();
    assert_eq!(compiled.query, r#"SELECT "car" AS "car" FROM "sales""#);
    assert!(compiled.params.is_empty());
}

#[test]
fn pattern_operations_need_a_text_column() {
    let mut q = single_table("sales");
    q.select.push(column("car", DataType::String));
    q.filters.push(with_unknown(filter(column("units", DataType::Int), Operation::Like), "4"));
    q.filters.push(with_unknown(filter(column("car", DataType::String), Operation::Contains), "wift"));
    let compiled = q.to_sql().unwrap();
    // The int filter is dropped; contains renders as like with wildcards.
    assert_eq!(
        compiled.query,
        r#"SELECT "car" AS "car" FROM "sales" WHERE "car" like $1"#
    );
    assert_eq!(compiled.params, vec![SqlParam::Text("'%wift%'".into())]);
}

#[test]
fn time_operand_requires_a_date_column() {
    let from = DateTime::parse_from_rfc3339("2019-01-01T00:00:00-08:00").unwrap();
    let time = TimeNode {
        uid: "T0".into(),
        word: "2019".into(),
        from: Some(TimeBound { time: from, grain: "year".into() }),
        ..Default::default()
    };

    let mut q = single_table("sales");
    q.select.push(column("car", DataType::String));
    let mut op = filter(column("financial-year", DataType::Date), Operation::Ge);
    op.time = Some(Box::new(time.clone()));
    q.filters.push(op);
    let compiled = q.to_sql().unwrap();
    assert_eq!(
        compiled.query,
        r#"SELECT "car" AS "car" FROM "sales" WHERE "financial-year" >= $1"#
    );
    assert_eq!(compiled.params, vec![SqlParam::Text("'2019-01-01T00:00:00-08:00'".into())]);

    let mut q = single_table("sales");
    q.select.push(column("car", DataType::String));
    let mut op = filter(column("car", DataType::String), Operation::Ge);
    op.time = Some(Box::new(time));
    q.filters.push(op);
    assert_eq!(q.to_sql().unwrap().query, r#"SELECT "car" AS "car" FROM "sales""#);
}

#[test]
fn filters_with_no_single_operand_are_dropped() {
    let mut q = single_table("stores");
    q.select.push(column("city", DataType::String));
    // No operand at all.
    q.filters.push(filter(column("city", DataType::String), Operation::Eq));
    // Two operands at once.
    let double = with_value(
        with_unknown(filter(column("city", DataType::String), Operation::Eq), "Delhi"),
        "Delhi",
        "delhi",
    );
    q.filters.push(double);
    let compiled = q.to_sql().unwrap();
    assert_eq!(compiled.query, r#"SELECT "city" AS "city" FROM "stores""#);
}
