//! AND, OR, NOT and null tests.

use vexc_expr::{BinOper, BinaryOp, ExprArena, ExprId, ExprKind, Qualifier};
use vexc_result::Result;

use super::CodeGenerator;
use crate::cgen_state::FetchCacheAnchor;
use crate::estimates::{contains_unsafe_division, get_likelihood, get_weight};
use crate::ir::{BinOp, FloatPredicate, IntPredicate, IrType, RuntimeFn, UnOp, ValueId};

/// Operand order for a short-circuited AND/OR, or `None` to evaluate both
/// sides eagerly. The first operand gates evaluation of the second.
pub(crate) fn short_circuit_order(arena: &ExprArena, bin: &BinOper) -> Option<(ExprId, ExprId)> {
    let (lhs, rhs) = (bin.left, bin.right);
    let is_or = bin.op == BinaryOp::Or;
    let decisive = |e: ExprId| {
        let likelihood = get_likelihood(arena, e);
        (is_or && likelihood.gt(0.90)) || (!is_or && likelihood.lt(0.10))
    };
    if contains_unsafe_division(arena, rhs) {
        Some((lhs, rhs))
    } else if contains_unsafe_division(arena, lhs) {
        Some((rhs, lhs))
    } else if decisive(lhs) && get_weight(arena, rhs, 0).gt(10) {
        Some((lhs, rhs))
    } else if decisive(rhs) && get_weight(arena, lhs, 0).gt(10) {
        Some((rhs, lhs))
    } else {
        None
    }
}

fn is_qualified_bin_oper(arena: &ExprArena, id: ExprId) -> bool {
    matches!(arena.kind(id), ExprKind::BinOper(b) if b.qualifier != Qualifier::One)
}

impl CodeGenerator<'_> {
    pub(super) fn codegen_logical(&mut self, id: ExprId, bin: &BinOper) -> Result<ValueId> {
        if let Some((gate, gated)) = short_circuit_order(self.arena, bin) {
            tracing::trace!(op = bin.op.as_str(), %gate, %gated, "short-circuiting");
            return self.codegen_short_circuit(id, bin.op, gate, gated);
        }
        let lhs = self.codegen(bin.left)?;
        let rhs = self.codegen(bin.right)?;
        let ty = self.arena.ty(id);
        if !ty.nullable() {
            let lhs = self.to_bool(lhs);
            let rhs = self.to_bool(rhs);
            let op = if bin.op == BinaryOp::And { BinOp::And } else { BinOp::Or };
            return Ok(self.state.binary(op, lhs, rhs));
        }
        let lhs = self.state.cast_to_type_in(lhs, IrType::I8);
        let rhs = self.state.cast_to_type_in(rhs, IrType::I8);
        let null = self.state.inline_int_null(ty)?;
        let func = if bin.op == BinaryOp::And {
            RuntimeFn::LogicalAnd
        } else {
            RuntimeFn::LogicalOr
        };
        Ok(self.state.emit_call(func, vec![lhs, rhs, null]))
    }

    /// Evaluate `gated` only when `gate` does not already decide the result.
    ///
    /// With nullable operands a null on either side is resolved in a
    /// separate block: the gated value still decides when it is the
    /// dominant constant (`true` for OR, `false` for AND), otherwise the
    /// result is null. This matches the eager three-valued result.
    fn codegen_short_circuit(
        &mut self,
        id: ExprId,
        op: BinaryOp,
        gate: ExprId,
        gated: ExprId,
    ) -> Result<ValueId> {
        let ty = self.arena.ty(id);
        let dominant = (op == BinaryOp::Or) as i64;

        let lhs = self.codegen(gate)?;
        let (lhs, result_ty) = if ty.nullable() {
            (self.state.cast_to_type_in(lhs, IrType::I8), IrType::I8)
        } else {
            (self.to_bool(lhs), IrType::I1)
        };
        let cnst = self.state.iconst(result_ty, dominant);
        let null = if ty.nullable() {
            Some(self.state.inline_int_null(ty)?)
        } else {
            None
        };
        let undecided = self.state.icmp(IntPredicate::Ne, lhs, cnst);
        let sc_bb = self.state.current_block();

        let mut scope = FetchCacheAnchor::new(self);
        let rhs_bb = scope.state.create_block("rhs_bb");
        let ret_bb = scope.state.create_block("ret_bb");
        scope.state.cond_br(undecided, rhs_bb, ret_bb, Some((10, 90)));

        scope.state.switch_to(rhs_bb);
        let rhs = scope.codegen(gated)?;
        let mut incoming = vec![(sc_bb, cnst)];
        match null {
            Some(null) => {
                let rhs = scope.state.cast_to_type_in(rhs, IrType::I8);
                let lhs_null = scope.state.icmp(IntPredicate::Eq, lhs, null);
                let rhs_null = scope.state.icmp(IntPredicate::Eq, rhs, null);
                let any_null = scope.state.binary(BinOp::Or, lhs_null, rhs_null);
                let fail_bb = scope.state.create_block("nullcheck_fail_bb");
                incoming.push((scope.state.current_block(), rhs));
                scope.state.cond_br(any_null, fail_bb, ret_bb, None);

                scope.state.switch_to(fail_bb);
                let rhs_dominant = scope.state.icmp(IntPredicate::Eq, rhs, cnst);
                let resolved = scope.state.select(rhs_dominant, cnst, null);
                incoming.push((fail_bb, resolved));
                scope.state.br(ret_bb);
            }
            None => {
                let rhs = scope.to_bool(rhs);
                incoming.push((scope.state.current_block(), rhs));
                scope.state.br(ret_bb);
            }
        }
        drop(scope);

        self.state.switch_to(ret_bb);
        Ok(self.state.phi(result_ty, incoming))
    }

    pub(super) fn codegen_not(&mut self, operand: ExprId) -> Result<ValueId> {
        let operand_ty = self.arena.ty(operand);
        let value = self.codegen(operand)?;
        let not_null = !operand_ty.nullable() || is_qualified_bin_oper(self.arena, operand);
        if not_null {
            let b = self.to_bool(value);
            return Ok(self.state.unary(UnOp::Not, b));
        }
        let value = self.state.cast_to_type_in(value, IrType::I8);
        let null = self.state.inline_int_null(operand_ty)?;
        Ok(self.state.emit_call(RuntimeFn::LogicalNot, vec![value, null]))
    }

    /// `i1` truth of `operand IS NULL`.
    pub(super) fn codegen_is_null(&mut self, operand: ExprId) -> Result<ValueId> {
        if self
            .arena
            .as_constant(operand)
            .is_some_and(|c| c.value.is_null())
        {
            return Ok(self.state.bool_const(true));
        }
        let ty = self.arena.ty(operand);
        if !ty.nullable() {
            return Ok(self.state.bool_const(false));
        }
        let value = self.codegen(operand)?;
        if ty.is_array() {
            let pos = self.state.pos();
            return Ok(self.state.emit_call(RuntimeFn::ArrayIsNull, vec![value, pos]));
        }
        if ty.is_floating_point() {
            let null = self.state.inline_fp_null(ty);
            return Ok(self.state.fcmp(FloatPredicate::Oeq, value, null));
        }
        let null = self.state.inline_int_null(ty)?;
        Ok(self.state.icmp(IntPredicate::Eq, value, null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vexc_types::{Datum, TypeContext};

    #[test]
    fn unsafe_division_is_gated() {
        let ctx = TypeContext::global();
        let mut arena = ExprArena::new();
        let x = arena.column_var(ctx.int64(false), 1, 1);
        let zero = arena.constant(ctx.int64(false), Datum::Int(0));
        let div = arena.arith(BinaryOp::Divide, x, zero);
        let one = arena.constant(ctx.int64(false), Datum::Int(1));
        let bad = arena.boolean_op(BinaryOp::Eq, div, one);
        let ok = arena.boolean_op(BinaryOp::Gt, x, zero);

        let and = arena.and(bad, ok);
        let bin = *arena.as_bin_oper(and).unwrap();
        assert_eq!(short_circuit_order(&arena, &bin), Some((ok, bad)));

        let and = arena.and(ok, bad);
        let bin = *arena.as_bin_oper(and).unwrap();
        assert_eq!(short_circuit_order(&arena, &bin), Some((ok, bad)));
    }

    #[test]
    fn cheap_operands_are_eager() {
        let ctx = TypeContext::global();
        let mut arena = ExprArena::new();
        let a = arena.column_var(ctx.boolean(true), 1, 1);
        let b = arena.column_var(ctx.boolean(true), 1, 2);
        let rare = arena.likelihood(a, 0.01);
        let and = arena.and(rare, b);
        let bin = *arena.as_bin_oper(and).unwrap();
        // Likely false, but the other side is too cheap to skip.
        assert_eq!(short_circuit_order(&arena, &bin), None);
    }

    #[test]
    fn heavy_operand_is_skipped_behind_a_decisive_one() {
        let ctx = TypeContext::global();
        let mut arena = ExprArena::new();
        let a = arena.column_var(ctx.boolean(true), 1, 1);
        let s = arena.column_var(ctx.ext_dict(ctx.text(true), 1, 4), 1, 2);
        let p = arena.constant(ctx.text(false), Datum::Str("%x%".into()));
        let like = arena.like(s, p, false);
        let usual = arena.likelihood(a, 0.95);

        let or = arena.or(like, usual);
        let bin = *arena.as_bin_oper(or).unwrap();
        assert_eq!(short_circuit_order(&arena, &bin), Some((usual, like)));

        let and = arena.and(like, usual);
        let bin = *arena.as_bin_oper(and).unwrap();
        assert_eq!(short_circuit_order(&arena, &bin), None);
    }
}
