use vexc_expr::{
    AggKind, BinaryOp, ExecutionUnit, ExprArena, InMemorySchemaProvider, InputTable, UnaryOp,
    serialize_to_sql,
};
use vexc_result::Error;
use vexc_test_utils::init_tracing_for_tests;
use vexc_types::{Datum, TypeContext};

fn schema() -> InMemorySchemaProvider {
    let mut schema = InMemorySchemaProvider::new();
    schema
        .add_table(0, 1, "orders")
        .add_column(0, 1, 1, "price")
        .add_column(0, 1, 2, "qty")
        .add_column(0, 1, 3, "region")
        .add_table(0, 2, "regions")
        .add_column(0, 2, 1, "name");
    schema
}

#[test]
fn filter_and_projection() {
    init_tracing_for_tests();
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let price = arena.column_var(ctx.int64(true), 1, 1);
    let qty = arena.column_var(ctx.int32(true), 1, 2);
    let ten = arena.constant(ctx.int64(false), Datum::Int(10));
    let gt = arena.boolean_op(BinaryOp::Gt, price, ten);
    let not_null = arena.is_not_null(qty);
    let product = arena.arith(BinaryOp::Multiply, price, qty);

    let unit = ExecutionUnit {
        input_tables: vec![InputTable {
            db_id: 0,
            table_id: 1,
        }],
        simple_quals: vec![not_null],
        quals: vec![gt],
        target_exprs: vec![product],
        ..Default::default()
    };
    let sql = serialize_to_sql(&arena, &unit, &schema()).unwrap();
    assert_eq!(sql.from_table, "orders");
    assert_eq!(
        sql.query,
        "SELECT (orders.price * orders.qty) FROM orders \
         WHERE orders.qty IS NOT NULL AND (orders.price > 10)"
    );
}

#[test]
fn group_by_with_aggregates() {
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let region = arena.column_var(ctx.text(true), 1, 3);
    let price = arena.column_var(ctx.int64(true), 1, 1);
    let sum = arena.agg(ctx.int64(true), AggKind::Sum, Some(price), false);
    let count = arena.agg(ctx.int64(false), AggKind::Count, None, false);
    let distinct = arena.agg(ctx.int64(false), AggKind::Count, Some(region), true);

    let unit = ExecutionUnit {
        groupby_exprs: vec![region],
        target_exprs: vec![region, sum, count, distinct],
        ..Default::default()
    };
    let sql = serialize_to_sql(&arena, &unit, &schema()).unwrap();
    assert_eq!(
        sql.query,
        "SELECT orders.region, SUM(orders.price), COUNT(*), COUNT(DISTINCT orders.region) \
         FROM orders GROUP BY orders.region"
    );
}

#[test]
fn from_clause_lists_every_referenced_table() {
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let region = arena.column_var(ctx.text(true), 1, 3);
    let name = arena.column_var(ctx.text(true), 2, 1);
    let eq = arena.boolean_op(BinaryOp::Eq, region, name);
    let unit = ExecutionUnit {
        quals: vec![eq],
        target_exprs: vec![name],
        ..Default::default()
    };
    let sql = serialize_to_sql(&arena, &unit, &schema()).unwrap();
    assert_eq!(sql.from_table, "regions, orders");
}

#[test]
fn case_cast_and_in_list() {
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let qty = arena.column_var(ctx.int32(true), 1, 2);
    let one = arena.constant(ctx.int32(false), Datum::Int(1));
    let two = arena.constant(ctx.int32(false), Datum::Int(2));
    let in_list = arena.in_values(qty, vec![one, two]);
    let label_a = arena.constant(ctx.text(false), Datum::Str("it's small".into()));
    let label_b = arena.null_constant(ctx.text(true));
    let case = arena.case(ctx.text(true), vec![(in_list, label_a)], label_b);
    let widened = arena.uoper(ctx.int64(true), UnaryOp::Cast, qty);

    let unit = ExecutionUnit {
        target_exprs: vec![case, widened],
        ..Default::default()
    };
    let sql = serialize_to_sql(&arena, &unit, &schema()).unwrap();
    assert_eq!(
        sql.query,
        "SELECT CASE WHEN orders.qty IN (1, 2) THEN 'it''s small' ELSE NULL END, \
         CAST(orders.qty AS BIGINT) FROM orders"
    );
}

#[test]
fn variants_without_sql_form_are_rejected() {
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let qty = arena.column_var(ctx.int32(true), 1, 2);
    let unnest = arena.uoper(ctx.int32(true), UnaryOp::Unnest, qty);
    let unit = ExecutionUnit {
        target_exprs: vec![unnest],
        ..Default::default()
    };
    let err = serialize_to_sql(&arena, &unit, &schema()).unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)), "{err}");
}

#[test]
fn unknown_columns_are_reported() {
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let missing = arena.column_var(ctx.int32(true), 1, 99);
    let unit = ExecutionUnit {
        target_exprs: vec![missing],
        ..Default::default()
    };
    let err = serialize_to_sql(&arena, &unit, &schema()).unwrap_err();
    assert!(matches!(err, Error::InvalidArgumentError(_)));
}
