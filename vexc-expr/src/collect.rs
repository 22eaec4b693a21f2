//! Visitors that gather sub-expressions.

use rustc_hash::FxHashSet;

use crate::expr::{ColumnVar, ExprArena, ExprId, Var};
use crate::visitor::{ScalarExprVisitor, dispatch};

/// Collects every node of a tree (pre-order) for which `predicate` holds.
pub struct ExprByPredicateCollector<'a, F> {
    arena: &'a ExprArena,
    predicate: F,
    found: Vec<ExprId>,
}

impl<'a, F> ExprByPredicateCollector<'a, F>
where
    F: FnMut(&'a ExprArena, ExprId) -> bool,
{
    pub fn collect(arena: &'a ExprArena, root: ExprId, predicate: F) -> Vec<ExprId> {
        let mut collector = Self {
            arena,
            predicate,
            found: Vec::new(),
        };
        collector.visit(root);
        collector.found
    }
}

impl<'a, F> ScalarExprVisitor<'a> for ExprByPredicateCollector<'a, F>
where
    F: FnMut(&'a ExprArena, ExprId) -> bool,
{
    type Output = ();

    fn arena(&self) -> &'a ExprArena {
        self.arena
    }

    fn default_result(&mut self) {}

    fn visit(&mut self, id: ExprId) {
        if (self.predicate)(self.arena, id) {
            self.found.push(id);
        }
        dispatch(self, id)
    }
}

/// Whether any node of the tree satisfies `predicate`.
pub fn any_node<'a>(
    arena: &'a ExprArena,
    root: ExprId,
    predicate: impl FnMut(&'a ExprArena, ExprId) -> bool,
) -> bool {
    !ExprByPredicateCollector::collect(arena, root, predicate).is_empty()
}

/// Distinct stored columns read by a set of expressions, in first-use order.
#[derive(Debug, Default)]
pub struct UsedColumns {
    pub columns: Vec<ColumnVar>,
    seen: FxHashSet<ColumnVar>,
}

impl UsedColumns {
    fn push(&mut self, col: ColumnVar) {
        if self.seen.insert(col) {
            self.columns.push(col);
        }
    }

    /// Distinct `(db_id, table_id)` pairs, in first-use order.
    pub fn tables(&self) -> Vec<(i32, i32)> {
        let mut out: Vec<(i32, i32)> = Vec::new();
        for col in &self.columns {
            let key = (col.db_id, col.table_id);
            if !out.contains(&key) {
                out.push(key);
            }
        }
        out
    }
}

struct UsedColumnsVisitor<'a, 'u> {
    arena: &'a ExprArena,
    used: &'u mut UsedColumns,
}

impl<'a> ScalarExprVisitor<'a> for UsedColumnsVisitor<'a, '_> {
    type Output = ();

    fn arena(&self) -> &'a ExprArena {
        self.arena
    }

    fn default_result(&mut self) {}

    fn visit_column_var(&mut self, _id: ExprId, col: &'a ColumnVar) {
        self.used.push(*col);
    }

    fn visit_var(&mut self, _id: ExprId, var: &'a Var) {
        self.used.push(var.column);
    }
}

/// Columns referenced by `roots`, including through `Var`s.
pub fn collect_used_columns(arena: &ExprArena, roots: &[ExprId]) -> UsedColumns {
    let mut used = UsedColumns::default();
    let mut visitor = UsedColumnsVisitor {
        arena,
        used: &mut used,
    };
    for root in roots {
        visitor.visit(*root);
    }
    used
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ExprKind;
    use crate::ops::BinaryOp;
    use vexc_types::{Datum, TypeContext};

    #[test]
    fn collects_matching_nodes_in_preorder() {
        let ctx = TypeContext::global();
        let mut arena = ExprArena::new();
        let x = arena.column_var(ctx.int32(true), 1, 1);
        let two = arena.constant(ctx.int32(false), Datum::Int(2));
        let div = arena.arith(BinaryOp::Divide, x, two);
        let y = arena.column_var(ctx.int32(true), 1, 2);
        let inner = arena.arith(BinaryOp::Divide, div, y);
        let found = ExprByPredicateCollector::collect(&arena, inner, |arena, id| {
            matches!(arena.kind(id), ExprKind::BinOper(b) if b.op == BinaryOp::Divide)
        });
        assert_eq!(found, vec![inner, div]);
    }

    #[test]
    fn used_columns_are_deduplicated() {
        let ctx = TypeContext::global();
        let mut arena = ExprArena::new();
        let a = arena.column_var(ctx.int32(true), 7, 1);
        let a2 = arena.column_var(ctx.int32(true), 7, 1);
        let b = arena.column_var(ctx.int32(true), 7, 2);
        let sum = arena.arith(BinaryOp::Plus, a, b);
        let used = collect_used_columns(&arena, &[sum, a2]);
        assert_eq!(used.columns.len(), 2);
        assert_eq!(used.tables(), vec![(0, 7)]);
    }
}
