//! CASE, IN lists and extension function calls.

use vexc_expr::{BinaryOp, Case, ExprId, FunctionOper, InValues};
use vexc_result::Result;
use vexc_types::{Type, TypeRef};

use super::{CodeGenerator, value_ir_type};
use crate::cgen_state::FetchCacheAnchor;
use crate::ir::{BinOp, BlockId, RuntimeFn, ValueId};

fn decimal_scale(ty: &Type) -> i32 {
    if ty.is_decimal() { ty.scale() } else { 0 }
}

impl CodeGenerator<'_> {
    /// Branches test their conditions in order; a null condition counts as
    /// false. Every result is converted to the CASE type and joined by a phi.
    pub(super) fn codegen_case(&mut self, id: ExprId, case: &Case) -> Result<ValueId> {
        let arena = self.arena;
        let ty = arena.ty(id);
        let result_ir = value_ir_type(ty)?;
        let mut incoming: Vec<(BlockId, ValueId)> = Vec::with_capacity(case.branches.len() + 1);

        let mut scope = FetchCacheAnchor::new(self);
        let join = scope.state.create_block("case_end");
        for (cond, value) in &case.branches {
            let truth = scope.codegen(*cond)?;
            let truth = scope.to_bool(truth);
            let then_bb = scope.state.create_block("case_then");
            let next_bb = scope.state.create_block("case_next");
            scope.state.cond_br(truth, then_bb, next_bb, None);

            scope.state.switch_to(then_bb);
            {
                let mut branch = FetchCacheAnchor::new(&mut *scope);
                let v = branch.codegen(*value)?;
                let v = branch.cast_value(v, arena.ty(*value), ty)?;
                incoming.push((branch.state.current_block(), v));
                branch.state.br(join);
            }
            scope.state.switch_to(next_bb);
        }
        let v = scope.codegen(case.else_expr)?;
        let v = scope.cast_value(v, arena.ty(case.else_expr), ty)?;
        incoming.push((scope.state.current_block(), v));
        scope.state.br(join);
        drop(scope);

        self.state.switch_to(join);
        Ok(self.state.phi(result_ir, incoming))
    }

    /// `arg IN (v1, ..., vn)` as a three-valued OR of equalities.
    pub(super) fn codegen_in_values(&mut self, id: ExprId, in_values: &InValues) -> Result<ValueId> {
        let ty = self.arena.ty(id);
        let Some((first, rest)) = in_values.values.split_first() else {
            return Ok(self.state.bool_const(false));
        };
        let arg_ty = self.arena.ty(in_values.arg);
        let arg = self.codegen(in_values.arg)?;
        let null = if ty.nullable() {
            Some(self.state.inline_int_null(ty)?)
        } else {
            None
        };
        let first_ty = self.arena.ty(*first);
        let v = self.codegen(*first)?;
        let mut acc = self.compare_values(BinaryOp::Eq, arg, arg_ty, v, first_ty, ty.nullable())?;
        for value in rest {
            let value_ty = self.arena.ty(*value);
            let v = self.codegen(*value)?;
            let eq = self.compare_values(BinaryOp::Eq, arg, arg_ty, v, value_ty, ty.nullable())?;
            acc = match null {
                Some(null) => self.state.emit_call(RuntimeFn::LogicalOr, vec![acc, eq, null]),
                None => self.state.binary(BinOp::Or, acc, eq),
            };
        }
        Ok(acc)
    }

    /// Call of the extension overload bound for the argument types. Any
    /// null argument makes the result null.
    pub(super) fn codegen_function_oper(&mut self, id: ExprId, func: &FunctionOper) -> Result<ValueId> {
        let ty = self.arena.ty(id);
        if !ty.is_number() {
            return Err(self.unsupported(&format!("{} returning {ty}", func.name)));
        }
        let arg_types: Vec<TypeRef> = func.args.iter().map(|a| self.arena.ty(*a)).collect();
        let bound = self
            .extensions
            .bind_function(&func.name, &arg_types, self.options.is_gpu())?;
        if arg_types.iter().any(|t| t.is_null()) {
            return self.state.inline_null(ty);
        }

        let mut args = Vec::with_capacity(func.args.len());
        let mut nulls = Vec::with_capacity(func.args.len());
        for ((arg, arg_ty), param) in func.args.iter().zip(&arg_types).zip(bound.arg_types()) {
            let v = self.codegen(*arg)?;
            nulls.push(self.null_check(v, arg_ty)?);
            args.push(self.numeric_to(v, decimal_scale(arg_ty), *param, 0)?);
        }
        let ret = self.state.emit_external_call(&bound, args);
        let result = self.numeric_to(ret, 0, value_ir_type(ty)?, decimal_scale(ty))?;
        let any_null = self.any_null(&nulls);
        self.propagate_null(any_null, result, ty)
    }
}
