//! Expression nodes and the arena that owns them.
//!
//! The planner builds one [`ExprArena`] per statement. Nodes refer to their
//! children by [`ExprId`], so a subexpression may be shared by several parents
//! (hoisted quals, repeated targets) without reference counting. The compiler
//! only reads the arena.

#![forbid(unsafe_code)]

use std::fmt;

use vexc_types::datetime::{DateaddField, DatetruncField, ExtractField};
use vexc_types::{Datum, Type, TypeContext, TypeRef};

use crate::ops::{AggKind, BinaryOp, OrderEntry, Qualifier, UnaryOp, WhichRow, WindowFunctionKind};

/// Stable index of a node within its [`ExprArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub u32);

impl ExprId {
    /// Placeholder used when comparing node shapes without their children.
    const HOLE: ExprId = ExprId(u32::MAX);

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Reference to a stored table column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColumnVar {
    pub db_id: i32,
    pub table_id: i32,
    pub column_id: i32,
    /// Position of the table in the query's range table (join nesting level).
    pub rte_idx: i32,
}

/// Reference to a column produced by an earlier step of the plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Var {
    pub column: ColumnVar,
    pub which_row: WhichRow,
    /// One-based index into the producing step's targets.
    pub var_no: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub node_id: u32,
    pub index: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GroupColumnRef {
    pub index: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExpressionTuple {
    pub tuple: Vec<ExprId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Constant {
    pub value: Datum,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UOper {
    pub op: UnaryOp,
    pub operand: ExprId,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BinOper {
    pub op: BinaryOp,
    pub qualifier: Qualifier,
    pub left: ExprId,
    pub right: ExprId,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScalarSubquery {
    pub node_id: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InValues {
    pub arg: ExprId,
    pub values: Vec<ExprId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InIntegerSet {
    pub arg: ExprId,
    pub values: Vec<i64>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InSubquery {
    pub arg: ExprId,
    pub node_id: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CharLength {
    pub arg: ExprId,
    pub calc_encoded_length: bool,
}

/// Single-argument built-ins: `KEY_FOR_STRING`, `SAMPLE_RATIO`, `LOWER`,
/// `CARDINALITY`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnaryBuiltin {
    pub arg: ExprId,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Like {
    pub arg: ExprId,
    pub pattern: ExprId,
    pub escape: Option<ExprId>,
    pub is_ilike: bool,
    /// Pattern is a plain prefix/suffix/substring match without wildcards
    /// in the middle.
    pub is_simple: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Regexp {
    pub arg: ExprId,
    pub pattern: ExprId,
    pub escape: Option<ExprId>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WidthBucket {
    pub target: ExprId,
    pub lower: ExprId,
    pub upper: ExprId,
    pub partition_count: ExprId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Case {
    /// `(condition, result)` pairs in evaluation order.
    pub branches: Vec<(ExprId, ExprId)>,
    /// Always present; the planner fills a typed null when SQL omits `ELSE`.
    pub else_expr: ExprId,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Datetrunc {
    pub field: DatetruncField,
    pub from: ExprId,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Extract {
    pub field: ExtractField,
    pub from: ExprId,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DateAdd {
    pub field: DateaddField,
    pub number: ExprId,
    pub datetime: ExprId,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DateDiff {
    pub field: DateaddField,
    pub start: ExprId,
    pub end: ExprId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionOper {
    pub name: String,
    pub args: Vec<ExprId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ArrayExpr {
    pub elements: Vec<ExprId>,
    pub is_null: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WindowFunction {
    pub kind: WindowFunctionKind,
    pub args: Vec<ExprId>,
    pub partition_keys: Vec<ExprId>,
    pub order_keys: Vec<ExprId>,
    pub collation: Vec<OrderEntry>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Likelihood {
    pub arg: ExprId,
    pub likelihood: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Agg {
    pub kind: AggKind,
    pub arg: Option<ExprId>,
    pub is_distinct: bool,
    /// Second argument of `APPROX_QUANTILE` / `APPROX_COUNT_DISTINCT`.
    pub arg1: Option<ExprId>,
}

/// Every expression variant the compiler understands.
#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Var(Var),
    ColumnVar(ColumnVar),
    ColumnRef(ColumnRef),
    GroupColumnRef(GroupColumnRef),
    ExpressionTuple(ExpressionTuple),
    Constant(Constant),
    UOper(UOper),
    BinOper(BinOper),
    ScalarSubquery(ScalarSubquery),
    InValues(InValues),
    InIntegerSet(InIntegerSet),
    InSubquery(InSubquery),
    CharLength(CharLength),
    KeyForString(UnaryBuiltin),
    SampleRatio(UnaryBuiltin),
    Lower(UnaryBuiltin),
    Cardinality(UnaryBuiltin),
    Like(Like),
    Regexp(Regexp),
    WidthBucket(WidthBucket),
    Case(Case),
    Datetrunc(Datetrunc),
    Extract(Extract),
    DateAdd(DateAdd),
    DateDiff(DateDiff),
    FunctionOper(FunctionOper),
    FunctionOperWithCustomTypeHandling(FunctionOper),
    ArrayExpr(ArrayExpr),
    WindowFunction(WindowFunction),
    Likelihood(Likelihood),
    OffsetInFragment,
    Agg(Agg),
}

impl ExprKind {
    pub fn name(&self) -> &'static str {
        match self {
            ExprKind::Var(_) => "Var",
            ExprKind::ColumnVar(_) => "ColumnVar",
            ExprKind::ColumnRef(_) => "ColumnRef",
            ExprKind::GroupColumnRef(_) => "GroupColumnRef",
            ExprKind::ExpressionTuple(_) => "ExpressionTuple",
            ExprKind::Constant(_) => "Constant",
            ExprKind::UOper(_) => "UOper",
            ExprKind::BinOper(_) => "BinOper",
            ExprKind::ScalarSubquery(_) => "ScalarSubquery",
            ExprKind::InValues(_) => "InValues",
            ExprKind::InIntegerSet(_) => "InIntegerSet",
            ExprKind::InSubquery(_) => "InSubquery",
            ExprKind::CharLength(_) => "CharLength",
            ExprKind::KeyForString(_) => "KeyForString",
            ExprKind::SampleRatio(_) => "SampleRatio",
            ExprKind::Lower(_) => "Lower",
            ExprKind::Cardinality(_) => "Cardinality",
            ExprKind::Like(_) => "Like",
            ExprKind::Regexp(_) => "Regexp",
            ExprKind::WidthBucket(_) => "WidthBucket",
            ExprKind::Case(_) => "Case",
            ExprKind::Datetrunc(_) => "Datetrunc",
            ExprKind::Extract(_) => "Extract",
            ExprKind::DateAdd(_) => "DateAdd",
            ExprKind::DateDiff(_) => "DateDiff",
            ExprKind::FunctionOper(_) => "FunctionOper",
            ExprKind::FunctionOperWithCustomTypeHandling(_) => {
                "FunctionOperWithCustomTypeHandling"
            }
            ExprKind::ArrayExpr(_) => "ArrayExpr",
            ExprKind::WindowFunction(_) => "WindowFunction",
            ExprKind::Likelihood(_) => "Likelihood",
            ExprKind::OffsetInFragment => "OffsetInFragment",
            ExprKind::Agg(_) => "Agg",
        }
    }

    /// Direct children in visitor order.
    pub fn children(&self) -> Vec<ExprId> {
        let mut out = Vec::new();
        match self {
            ExprKind::Var(_)
            | ExprKind::ColumnVar(_)
            | ExprKind::ColumnRef(_)
            | ExprKind::GroupColumnRef(_)
            | ExprKind::Constant(_)
            | ExprKind::ScalarSubquery(_)
            | ExprKind::OffsetInFragment => {}
            ExprKind::ExpressionTuple(t) => out.extend(&t.tuple),
            ExprKind::UOper(u) => out.push(u.operand),
            ExprKind::BinOper(b) => out.extend([b.left, b.right]),
            ExprKind::InValues(i) => {
                out.push(i.arg);
                out.extend(&i.values);
            }
            ExprKind::InIntegerSet(i) => out.push(i.arg),
            ExprKind::InSubquery(i) => out.push(i.arg),
            ExprKind::CharLength(c) => out.push(c.arg),
            ExprKind::KeyForString(u)
            | ExprKind::SampleRatio(u)
            | ExprKind::Lower(u)
            | ExprKind::Cardinality(u) => out.push(u.arg),
            ExprKind::Like(l) => {
                out.extend([l.arg, l.pattern]);
                out.extend(l.escape);
            }
            ExprKind::Regexp(r) => {
                out.extend([r.arg, r.pattern]);
                out.extend(r.escape);
            }
            ExprKind::WidthBucket(w) => out.extend([w.target, w.lower, w.upper, w.partition_count]),
            ExprKind::Case(c) => {
                for (cond, result) in &c.branches {
                    out.extend([*cond, *result]);
                }
                out.push(c.else_expr);
            }
            ExprKind::Datetrunc(d) => out.push(d.from),
            ExprKind::Extract(e) => out.push(e.from),
            ExprKind::DateAdd(d) => out.extend([d.number, d.datetime]),
            ExprKind::DateDiff(d) => out.extend([d.start, d.end]),
            ExprKind::FunctionOper(f) | ExprKind::FunctionOperWithCustomTypeHandling(f) => {
                out.extend(&f.args)
            }
            ExprKind::ArrayExpr(a) => out.extend(&a.elements),
            ExprKind::WindowFunction(w) => {
                out.extend(&w.args);
                out.extend(&w.partition_keys);
                out.extend(&w.order_keys);
            }
            ExprKind::Likelihood(l) => out.push(l.arg),
            ExprKind::Agg(a) => {
                out.extend(a.arg);
                out.extend(a.arg1);
            }
        }
        out
    }

    /// A copy of the node with every child id passed through `f`.
    pub fn map_children(&self, mut f: impl FnMut(ExprId) -> ExprId) -> ExprKind {
        let mut kind = self.clone();
        match &mut kind {
            ExprKind::Var(_)
            | ExprKind::ColumnVar(_)
            | ExprKind::ColumnRef(_)
            | ExprKind::GroupColumnRef(_)
            | ExprKind::Constant(_)
            | ExprKind::ScalarSubquery(_)
            | ExprKind::OffsetInFragment => {}
            ExprKind::ExpressionTuple(t) => t.tuple.iter_mut().for_each(|id| *id = f(*id)),
            ExprKind::UOper(u) => u.operand = f(u.operand),
            ExprKind::BinOper(b) => {
                b.left = f(b.left);
                b.right = f(b.right);
            }
            ExprKind::InValues(i) => {
                i.arg = f(i.arg);
                i.values.iter_mut().for_each(|id| *id = f(*id));
            }
            ExprKind::InIntegerSet(i) => i.arg = f(i.arg),
            ExprKind::InSubquery(i) => i.arg = f(i.arg),
            ExprKind::CharLength(c) => c.arg = f(c.arg),
            ExprKind::KeyForString(u)
            | ExprKind::SampleRatio(u)
            | ExprKind::Lower(u)
            | ExprKind::Cardinality(u) => u.arg = f(u.arg),
            ExprKind::Like(l) => {
                l.arg = f(l.arg);
                l.pattern = f(l.pattern);
                l.escape = l.escape.map(&mut f);
            }
            ExprKind::Regexp(r) => {
                r.arg = f(r.arg);
                r.pattern = f(r.pattern);
                r.escape = r.escape.map(&mut f);
            }
            ExprKind::WidthBucket(w) => {
                w.target = f(w.target);
                w.lower = f(w.lower);
                w.upper = f(w.upper);
                w.partition_count = f(w.partition_count);
            }
            ExprKind::Case(c) => {
                for (cond, result) in c.branches.iter_mut() {
                    *cond = f(*cond);
                    *result = f(*result);
                }
                c.else_expr = f(c.else_expr);
            }
            ExprKind::Datetrunc(d) => d.from = f(d.from),
            ExprKind::Extract(e) => e.from = f(e.from),
            ExprKind::DateAdd(d) => {
                d.number = f(d.number);
                d.datetime = f(d.datetime);
            }
            ExprKind::DateDiff(d) => {
                d.start = f(d.start);
                d.end = f(d.end);
            }
            ExprKind::FunctionOper(func) | ExprKind::FunctionOperWithCustomTypeHandling(func) => {
                func.args.iter_mut().for_each(|id| *id = f(*id))
            }
            ExprKind::ArrayExpr(a) => a.elements.iter_mut().for_each(|id| *id = f(*id)),
            ExprKind::WindowFunction(w) => {
                w.args.iter_mut().for_each(|id| *id = f(*id));
                w.partition_keys.iter_mut().for_each(|id| *id = f(*id));
                w.order_keys.iter_mut().for_each(|id| *id = f(*id));
            }
            ExprKind::Likelihood(l) => l.arg = f(l.arg),
            ExprKind::Agg(a) => {
                a.arg = a.arg.map(&mut f);
                a.arg1 = a.arg1.map(&mut f);
            }
        }
        kind
    }
}

/// A typed node.
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub ty: TypeRef,
    pub kind: ExprKind,
}

/// Owner of all expression nodes of one statement.
#[derive(Clone, Debug, Default)]
pub struct ExprArena {
    nodes: Vec<Expr>,
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append a node and return its id.
    pub fn add(&mut self, ty: TypeRef, kind: ExprKind) -> ExprId {
        let id = ExprId(self.nodes.len() as u32);
        self.nodes.push(Expr { ty, kind });
        id
    }

    /// # Panics
    ///
    /// If `id` was not issued by this arena.
    #[inline]
    pub fn get(&self, id: ExprId) -> &Expr {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn ty(&self, id: ExprId) -> TypeRef {
        self.get(id).ty
    }

    #[inline]
    pub fn kind(&self, id: ExprId) -> &ExprKind {
        &self.get(id).kind
    }

    pub fn as_bin_oper(&self, id: ExprId) -> Option<&BinOper> {
        match self.kind(id) {
            ExprKind::BinOper(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_uoper(&self, id: ExprId) -> Option<&UOper> {
        match self.kind(id) {
            ExprKind::UOper(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_constant(&self, id: ExprId) -> Option<&Constant> {
        match self.kind(id) {
            ExprKind::Constant(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_agg(&self, id: ExprId) -> Option<&Agg> {
        match self.kind(id) {
            ExprKind::Agg(a) => Some(a),
            _ => None,
        }
    }

    /// Whether two subtrees compute the same value: same types, same node
    /// fields and structurally equal children.
    pub fn structurally_equal(&self, a: ExprId, b: ExprId) -> bool {
        if a == b {
            return true;
        }
        let (ea, eb) = (self.get(a), self.get(b));
        if !Type::same(ea.ty, eb.ty) {
            return false;
        }
        if ea.kind.map_children(|_| ExprId::HOLE) != eb.kind.map_children(|_| ExprId::HOLE) {
            return false;
        }
        let (ca, cb) = (ea.kind.children(), eb.kind.children());
        ca.len() == cb.len()
            && ca
                .iter()
                .zip(&cb)
                .all(|(x, y)| self.structurally_equal(*x, *y))
    }

    pub fn column_var(&mut self, ty: TypeRef, table_id: i32, column_id: i32) -> ExprId {
        self.add(
            ty,
            ExprKind::ColumnVar(ColumnVar {
                db_id: 0,
                table_id,
                column_id,
                rte_idx: 0,
            }),
        )
    }

    pub fn constant(&mut self, ty: TypeRef, value: Datum) -> ExprId {
        self.add(ty, ExprKind::Constant(Constant { value }))
    }

    /// Typed null literal.
    pub fn null_constant(&mut self, ty: TypeRef) -> ExprId {
        self.constant(ty.with_nullable(true), Datum::Null)
    }

    pub fn uoper(&mut self, ty: TypeRef, op: UnaryOp, operand: ExprId) -> ExprId {
        self.add(ty, ExprKind::UOper(UOper { op, operand }))
    }

    pub fn not(&mut self, operand: ExprId) -> ExprId {
        let ty = self.ty(operand);
        self.uoper(ty, UnaryOp::Not, operand)
    }

    pub fn is_null(&mut self, operand: ExprId) -> ExprId {
        let ty = TypeContext::global().boolean(false);
        self.uoper(ty, UnaryOp::IsNull, operand)
    }

    pub fn is_not_null(&mut self, operand: ExprId) -> ExprId {
        let ty = TypeContext::global().boolean(false);
        self.uoper(ty, UnaryOp::IsNotNull, operand)
    }

    pub fn cast(&mut self, ty: TypeRef, operand: ExprId) -> ExprId {
        self.uoper(ty, UnaryOp::Cast, operand)
    }

    pub fn bin_oper(&mut self, ty: TypeRef, op: BinaryOp, left: ExprId, right: ExprId) -> ExprId {
        self.add(
            ty,
            ExprKind::BinOper(BinOper {
                op,
                qualifier: Qualifier::One,
                left,
                right,
            }),
        )
    }

    /// Comparison or logical operator; the boolean result is nullable when
    /// either operand is.
    pub fn boolean_op(&mut self, op: BinaryOp, left: ExprId, right: ExprId) -> ExprId {
        let nullable = self.ty(left).nullable() || self.ty(right).nullable();
        let ty = TypeContext::global().boolean(nullable);
        self.bin_oper(ty, op, left, right)
    }

    pub fn and(&mut self, left: ExprId, right: ExprId) -> ExprId {
        self.boolean_op(BinaryOp::And, left, right)
    }

    pub fn or(&mut self, left: ExprId, right: ExprId) -> ExprId {
        self.boolean_op(BinaryOp::Or, left, right)
    }

    /// `left <op> ANY|ALL (right)` against an array-typed right operand.
    pub fn qualified_comparison(
        &mut self,
        op: BinaryOp,
        qualifier: Qualifier,
        left: ExprId,
        right: ExprId,
    ) -> ExprId {
        let nullable = self.ty(left).nullable() || self.ty(right).nullable();
        let ty = TypeContext::global().boolean(nullable);
        self.add(
            ty,
            ExprKind::BinOper(BinOper {
                op,
                qualifier,
                left,
                right,
            }),
        )
    }

    /// Arithmetic in the left operand's type, nullable when either side is.
    pub fn arith(&mut self, op: BinaryOp, left: ExprId, right: ExprId) -> ExprId {
        let nullable = self.ty(left).nullable() || self.ty(right).nullable();
        let ty = self.ty(left).with_nullable(nullable);
        self.bin_oper(ty, op, left, right)
    }

    pub fn likelihood(&mut self, arg: ExprId, likelihood: f32) -> ExprId {
        let ty = self.ty(arg);
        self.add(ty, ExprKind::Likelihood(Likelihood { arg, likelihood }))
    }

    pub fn like(&mut self, arg: ExprId, pattern: ExprId, is_simple: bool) -> ExprId {
        let ty = TypeContext::global().boolean(self.ty(arg).nullable());
        self.add(
            ty,
            ExprKind::Like(Like {
                arg,
                pattern,
                escape: None,
                is_ilike: false,
                is_simple,
            }),
        )
    }

    pub fn regexp(&mut self, arg: ExprId, pattern: ExprId) -> ExprId {
        let ty = TypeContext::global().boolean(self.ty(arg).nullable());
        self.add(
            ty,
            ExprKind::Regexp(Regexp {
                arg,
                pattern,
                escape: None,
            }),
        )
    }

    pub fn case(&mut self, ty: TypeRef, branches: Vec<(ExprId, ExprId)>, else_expr: ExprId) -> ExprId {
        self.add(ty, ExprKind::Case(Case { branches, else_expr }))
    }

    pub fn in_values(&mut self, arg: ExprId, values: Vec<ExprId>) -> ExprId {
        let nullable =
            self.ty(arg).nullable() || values.iter().any(|v| self.ty(*v).nullable());
        let ty = TypeContext::global().boolean(nullable);
        self.add(ty, ExprKind::InValues(InValues { arg, values }))
    }

    pub fn function(&mut self, ty: TypeRef, name: &str, args: Vec<ExprId>) -> ExprId {
        self.add(
            ty,
            ExprKind::FunctionOper(FunctionOper {
                name: name.to_string(),
                args,
            }),
        )
    }

    /// `EXTRACT(field FROM from)` as a `BIGINT`.
    pub fn extract(&mut self, field: ExtractField, from: ExprId) -> ExprId {
        let ty = TypeContext::global().int64(self.ty(from).nullable());
        self.add(ty, ExprKind::Extract(Extract { field, from }))
    }

    pub fn datetrunc(&mut self, field: DatetruncField, from: ExprId) -> ExprId {
        let ty = self.ty(from);
        self.add(ty, ExprKind::Datetrunc(Datetrunc { field, from }))
    }

    /// `DATE_ADD` in the type of `datetime`, nullable when either operand is.
    pub fn date_add(&mut self, field: DateaddField, number: ExprId, datetime: ExprId) -> ExprId {
        let nullable = self.ty(number).nullable() || self.ty(datetime).nullable();
        let ty = self.ty(datetime).with_nullable(nullable);
        self.add(
            ty,
            ExprKind::DateAdd(DateAdd {
                field,
                number,
                datetime,
            }),
        )
    }

    pub fn date_diff(&mut self, field: DateaddField, start: ExprId, end: ExprId) -> ExprId {
        let nullable = self.ty(start).nullable() || self.ty(end).nullable();
        let ty = TypeContext::global().int64(nullable);
        self.add(ty, ExprKind::DateDiff(DateDiff { field, start, end }))
    }

    pub fn agg(&mut self, ty: TypeRef, kind: AggKind, arg: Option<ExprId>, is_distinct: bool) -> ExprId {
        self.add(
            ty,
            ExprKind::Agg(Agg {
                kind,
                arg,
                is_distinct,
                arg1: None,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality_ignores_identity() {
        let ctx = TypeContext::global();
        let mut arena = ExprArena::new();
        let a = arena.column_var(ctx.int32(true), 1, 2);
        let b = arena.column_var(ctx.int32(true), 1, 2);
        let c = arena.column_var(ctx.int32(true), 1, 3);
        assert!(arena.structurally_equal(a, b));
        assert!(!arena.structurally_equal(a, c));

        let one = arena.constant(ctx.int32(false), Datum::Int(1));
        let one_again = arena.constant(ctx.int32(false), Datum::Int(1));
        let sum_a = arena.arith(BinaryOp::Plus, a, one);
        let sum_b = arena.arith(BinaryOp::Plus, b, one_again);
        let sum_c = arena.arith(BinaryOp::Plus, c, one);
        assert!(arena.structurally_equal(sum_a, sum_b));
        assert!(!arena.structurally_equal(sum_a, sum_c));
    }

    #[test]
    fn structural_equality_checks_types() {
        let ctx = TypeContext::global();
        let mut arena = ExprArena::new();
        let a = arena.column_var(ctx.int32(true), 1, 2);
        let b = arena.column_var(ctx.int32(false), 1, 2);
        assert!(!arena.structurally_equal(a, b));
    }

    #[test]
    fn children_follow_visit_order() {
        let ctx = TypeContext::global();
        let mut arena = ExprArena::new();
        let c1 = arena.constant(ctx.boolean(false), Datum::Bool(true));
        let r1 = arena.constant(ctx.int32(false), Datum::Int(1));
        let r2 = arena.constant(ctx.int32(false), Datum::Int(2));
        let case = arena.case(ctx.int32(false), vec![(c1, r1)], r2);
        assert_eq!(arena.kind(case).children(), vec![c1, r1, r2]);
    }

    #[test]
    fn map_children_rewrites_ids() {
        let ctx = TypeContext::global();
        let mut arena = ExprArena::new();
        let a = arena.column_var(ctx.int64(true), 1, 1);
        let b = arena.column_var(ctx.int64(true), 1, 2);
        let cmp = arena.boolean_op(BinaryOp::Lt, a, b);
        let swapped = arena.kind(cmp).map_children(|id| if id == a { b } else { a });
        assert_eq!(swapped.children(), vec![b, a]);
    }
}
