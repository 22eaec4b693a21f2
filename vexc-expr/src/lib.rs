//! Expression trees for the vexc compiler.
//!
//! The planner lowers SQL into an [`ExprArena`] of typed nodes and bundles the
//! roots of one query step into an [`ExecutionUnit`]. This crate provides the
//! [`ScalarExprVisitor`] framework every analysis and the code generator are
//! written against, a few reusable collectors, per-target summaries and the
//! reverse mapping back to SQL text.

pub mod collect;
pub mod expr;
pub mod ops;
pub mod sql;
pub mod target_info;
pub mod unit;
pub mod visitor;

pub use collect::{ExprByPredicateCollector, UsedColumns, any_node, collect_used_columns};
pub use expr::{
    Agg, ArrayExpr, BinOper, Case, CharLength, ColumnRef, ColumnVar, Constant, DateAdd, DateDiff,
    Datetrunc, Expr, ExprArena, ExprId, ExprKind, ExpressionTuple, Extract, FunctionOper,
    GroupColumnRef, InIntegerSet, InSubquery, InValues, Like, Likelihood, Regexp, ScalarSubquery,
    UOper, UnaryBuiltin, Var, WidthBucket, WindowFunction,
};
pub use ops::{AggKind, BinaryOp, OrderEntry, Qualifier, UnaryOp, WhichRow, WindowFunctionKind};
pub use sql::{
    ExecutionUnitSql, InMemorySchemaProvider, ScalarExprToSql, SchemaProvider, serialize_to_sql,
};
pub use target_info::{
    TargetInfo, get_target_info, is_agg_domain_range_equivalent, is_distinct_target,
    takes_float_argument,
};
pub use unit::{ExecutionUnit, InputTable};
pub use visitor::{ScalarExprVisitor, dispatch};
