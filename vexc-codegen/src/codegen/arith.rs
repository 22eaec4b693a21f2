//! Comparisons, arithmetic and casts.

use vexc_expr::{BinOper, BinaryOp, ExprId};
use vexc_result::{Error, Result};
use vexc_types::datetime::{
    SECS_PER_DAY, ScalingType, datetime_scaled_epoch, timestamp_precision_scale,
};
use vexc_types::{Type, TypeId, TypeRef};

use super::{CodeGenerator, value_ir_type};
use crate::ir::{BinOp, CastOp, FloatPredicate, IntPredicate, IrType, UnOp, ValueId};
use crate::runtime::{ERR_DIV_BY_ZERO, ERR_OVERFLOW_OR_UNDERFLOW};

fn decimal_scale(ty: &Type) -> i32 {
    if ty.is_decimal() { ty.scale() } else { 0 }
}

fn time_dimension(ty: &Type) -> i32 {
    ty.unit().map_or(0, |u| u.dimension())
}

fn pow10(exp: i32) -> Result<i64> {
    10i64
        .checked_pow(exp as u32)
        .ok_or_else(|| Error::NumericOverflow(format!("decimal scale factor 10^{exp}")))
}

fn int_predicate(op: BinaryOp) -> IntPredicate {
    match op {
        BinaryOp::Eq => IntPredicate::Eq,
        BinaryOp::Ne => IntPredicate::Ne,
        BinaryOp::Lt => IntPredicate::Slt,
        BinaryOp::Le => IntPredicate::Sle,
        BinaryOp::Gt => IntPredicate::Sgt,
        BinaryOp::Ge => IntPredicate::Sge,
        other => panic!("{} is not a comparison", other.as_str()),
    }
}

fn float_predicate(op: BinaryOp) -> FloatPredicate {
    match op {
        BinaryOp::Eq => FloatPredicate::Oeq,
        BinaryOp::Ne => FloatPredicate::Une,
        BinaryOp::Lt => FloatPredicate::Olt,
        BinaryOp::Le => FloatPredicate::Ole,
        BinaryOp::Gt => FloatPredicate::Ogt,
        BinaryOp::Ge => FloatPredicate::Oge,
        other => panic!("{} is not a comparison", other.as_str()),
    }
}

impl CodeGenerator<'_> {
    pub(super) fn codegen_cmp(&mut self, id: ExprId, bin: &BinOper) -> Result<ValueId> {
        let (lt, rt) = (self.arena.ty(bin.left), self.arena.ty(bin.right));
        let lhs = self.codegen(bin.left)?;
        let rhs = self.codegen(bin.right)?;
        let nullable = self.arena.ty(id).nullable();
        self.compare_values(bin.op, lhs, lt, rhs, rt, nullable)
    }

    /// `lhs <op> rhs`, `i8` with null propagation when `nullable`, else `i1`.
    pub(super) fn compare_values(
        &mut self,
        op: BinaryOp,
        lhs: ValueId,
        lt: TypeRef,
        rhs: ValueId,
        rt: TypeRef,
        nullable: bool,
    ) -> Result<ValueId> {
        if lt.is_array() || rt.is_array() {
            return Err(self.unsupported("array comparisons"));
        }
        if lt.is_ext_dictionary() || rt.is_ext_dictionary() {
            let same_dict = lt.is_ext_dictionary()
                && rt.is_ext_dictionary()
                && lt.dict_id() == rt.dict_id();
            if !same_dict || !matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
                return Err(self.unsupported(&format!("{lt} {} {rt}", op.as_str())));
            }
        }
        if (lt.is_date_time() || rt.is_date_time())
            && (lt.id() != rt.id() || lt.unit() != rt.unit())
        {
            return Err(self.unsupported(&format!("{lt} {} {rt}", op.as_str())));
        }

        let lhs_null = self.null_check(lhs, lt)?;
        let rhs_null = self.null_check(rhs, rt)?;
        let (l, r) = self.unify_operands(lhs, lt, rhs, rt)?;
        let cmp = if self.state.value_type(l).is_float() {
            self.state.fcmp(float_predicate(op), l, r)
        } else {
            self.state.icmp(int_predicate(op), l, r)
        };
        if !nullable {
            return Ok(cmp);
        }
        let cmp = self.state.cast_to_type_in(cmp, IrType::I8);
        let any_null = self.any_null(&[lhs_null, rhs_null]);
        let bool_ty = vexc_types::TypeContext::global().boolean(true);
        self.propagate_null(any_null, cmp, bool_ty)
    }

    /// Bring two operands to one IR type and decimal scale.
    fn unify_operands(
        &mut self,
        lhs: ValueId,
        lt: &Type,
        rhs: ValueId,
        rt: &Type,
    ) -> Result<(ValueId, ValueId)> {
        let (lir, rir) = (self.state.value_type(lhs), self.state.value_type(rhs));
        let (ls, rs) = (decimal_scale(lt), decimal_scale(rt));
        if lir.is_float() || rir.is_float() {
            let target = if lir == IrType::F64 || rir == IrType::F64 {
                IrType::F64
            } else {
                IrType::F32
            };
            let l = self.numeric_to(lhs, ls, target, 0)?;
            let r = self.numeric_to(rhs, rs, target, 0)?;
            return Ok((l, r));
        }
        if lir == rir && ls == rs {
            return Ok((lhs, rhs));
        }
        let scale = ls.max(rs);
        let l = self.numeric_to(lhs, ls, IrType::I64, scale)?;
        let r = self.numeric_to(rhs, rs, IrType::I64, scale)?;
        Ok((l, r))
    }

    /// Convert a number between IR representations and decimal scales.
    ///
    /// Integer rescaling multiplies or truncates toward zero; float to
    /// integer conversion saturates.
    pub(super) fn numeric_to(
        &mut self,
        value: ValueId,
        from_scale: i32,
        to: IrType,
        to_scale: i32,
    ) -> Result<ValueId> {
        let from = self.state.value_type(value);
        match (from.is_float(), to.is_float()) {
            (false, false) => {
                if from_scale == to_scale {
                    return Ok(self.state.cast_to_type_in(value, to));
                }
                let wide = self.state.cast_to_type_in(value, IrType::I64);
                let scaled = self.rescale_int(wide, to_scale - from_scale)?;
                Ok(self.state.cast_to_type_in(scaled, to))
            }
            (false, true) => {
                let wide = self.state.cast_to_type_in(value, IrType::I64);
                let f = self.state.cast(CastOp::SiToFp, wide, to);
                if from_scale <= 0 {
                    return Ok(f);
                }
                let divisor = self.state.fconst(to, pow10(from_scale)? as f64);
                Ok(self.state.binary(BinOp::FDiv, f, divisor))
            }
            (true, false) => {
                let scaled = if to_scale > 0 {
                    let factor = self.state.fconst(from, pow10(to_scale)? as f64);
                    self.state.binary(BinOp::FMul, value, factor)
                } else {
                    value
                };
                let i = self.state.cast(CastOp::FpToSi, scaled, IrType::I64);
                Ok(self.state.cast_to_type_in(i, to))
            }
            (true, true) => Ok(match from.bits().cmp(&to.bits()) {
                std::cmp::Ordering::Less => self.state.cast(CastOp::FpExt, value, to),
                std::cmp::Ordering::Greater => self.state.cast(CastOp::FpTrunc, value, to),
                std::cmp::Ordering::Equal => value,
            }),
        }
    }

    /// Multiply an `i64` by `10^diff`, or divide by `10^-diff`.
    fn rescale_int(&mut self, value: ValueId, diff: i32) -> Result<ValueId> {
        if diff == 0 {
            return Ok(value);
        }
        let factor = self.state.iconst(IrType::I64, pow10(diff.abs())?);
        let op = if diff > 0 { BinOp::Mul } else { BinOp::SDiv };
        Ok(self.state.binary(op, value, factor))
    }

    pub(super) fn codegen_arith(&mut self, id: ExprId, bin: &BinOper) -> Result<ValueId> {
        let ty = self.arena.ty(id);
        let (lt, rt) = (self.arena.ty(bin.left), self.arena.ty(bin.right));
        if !ty.is_number() || !lt.is_number() || !rt.is_number() {
            return Err(self.unsupported(&format!("{lt} {} {rt}", bin.op.as_str())));
        }
        let res_ir = value_ir_type(ty)?;
        let (ls, rs) = (decimal_scale(lt), decimal_scale(rt));
        // Scales the operands are brought to before the integer operation.
        let (l_scale, r_scale) = if ty.is_decimal() {
            let scale = ty.scale();
            match bin.op {
                BinaryOp::Plus | BinaryOp::Minus if ls <= scale && rs <= scale => (scale, scale),
                BinaryOp::Multiply if ls + rs == scale => (ls, rs),
                _ => {
                    return Err(self.unsupported(&format!(
                        "DECIMAL {} producing {ty}",
                        bin.op.as_str()
                    )));
                }
            }
        } else {
            (0, 0)
        };

        let lhs = self.codegen(bin.left)?;
        let rhs = self.codegen(bin.right)?;
        let lhs_null = self.null_check(lhs, lt)?;
        let rhs_null = self.null_check(rhs, rt)?;
        let l = self.numeric_to(lhs, ls, res_ir, l_scale)?;
        let r = self.numeric_to(rhs, rs, res_ir, r_scale)?;

        let result = if res_ir.is_float() {
            match bin.op {
                BinaryOp::Plus => self.state.binary(BinOp::FAdd, l, r),
                BinaryOp::Minus => self.state.binary(BinOp::FSub, l, r),
                BinaryOp::Multiply => self.state.binary(BinOp::FMul, l, r),
                BinaryOp::Divide => self.guarded_fdiv(l, r),
                _ => return Err(self.unsupported("floating point modulo")),
            }
        } else {
            match bin.op {
                BinaryOp::Plus => self.state.binary(BinOp::Add, l, r),
                BinaryOp::Minus => self.state.binary(BinOp::Sub, l, r),
                BinaryOp::Multiply => self.state.binary(BinOp::Mul, l, r),
                BinaryOp::Divide => self.guarded_int_div(BinOp::SDiv, l, r),
                BinaryOp::Modulo => self.guarded_int_div(BinOp::SRem, l, r),
                other => panic!("{} is not arithmetic", other.as_str()),
            }
        };
        let any_null = self.any_null(&[lhs_null, rhs_null]);
        self.propagate_null(any_null, result, ty)
    }

    /// Leave the row with [`ERR_DIV_BY_ZERO`] when `is_zero` holds and
    /// continue in a fresh block otherwise.
    fn guard_zero_divisor(&mut self, is_zero: ValueId) {
        let error = self.state.error_block(ERR_DIV_BY_ZERO);
        let ok = self.state.create_block("div_ok");
        self.state.cond_br(is_zero, error, ok, Some((1, 99)));
        self.state.switch_to(ok);
    }

    /// Signed division or remainder that never traps: zero divisors leave
    /// the row, and `MIN / -1` wraps instead of overflowing.
    fn guarded_int_div(&mut self, op: BinOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        let ty = self.state.value_type(rhs);
        let zero = self.state.iconst(ty, 0);
        let is_zero = self.state.icmp(IntPredicate::Eq, rhs, zero);
        self.guard_zero_divisor(is_zero);

        let minus_one = self.state.iconst(ty, -1);
        let one = self.state.iconst(ty, 1);
        let by_minus_one = self.state.icmp(IntPredicate::Eq, rhs, minus_one);
        let divisor = self.state.select(by_minus_one, one, rhs);
        let quotient = self.state.binary(op, lhs, divisor);
        let special = match op {
            BinOp::SDiv => self.state.binary(BinOp::Sub, zero, lhs),
            _ => zero,
        };
        self.state.select(by_minus_one, special, quotient)
    }

    fn guarded_fdiv(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        let ty = self.state.value_type(rhs);
        let zero = self.state.fconst(ty, 0.0);
        let is_zero = self.state.fcmp(FloatPredicate::Oeq, rhs, zero);
        self.guard_zero_divisor(is_zero);
        self.state.binary(BinOp::FDiv, lhs, rhs)
    }

    pub(super) fn codegen_uminus(&mut self, id: ExprId, operand: ExprId) -> Result<ValueId> {
        let ty = self.arena.ty(id);
        let operand_ty = self.arena.ty(operand);
        if !operand_ty.is_number() {
            return Err(self.unsupported(&format!("unary minus on {operand_ty}")));
        }
        let value = self.codegen(operand)?;
        let is_null = self.null_check(value, operand_ty)?;
        let op = if self.state.value_type(value).is_float() {
            UnOp::FNeg
        } else {
            UnOp::Neg
        };
        let negated = self.state.unary(op, value);
        self.propagate_null(is_null, negated, ty)
    }

    pub(super) fn codegen_cast(&mut self, id: ExprId, operand: ExprId) -> Result<ValueId> {
        let to = self.arena.ty(id);
        let from = self.arena.ty(operand);
        if let Some(folded) = self.fold_temporal_cast(operand, from, to)? {
            return Ok(folded);
        }
        if from.is_null() {
            return self.state.inline_null(to);
        }
        let value = self.codegen(operand)?;
        self.cast_value(value, from, to)
    }

    /// Precision casts of non-null datetime literals are evaluated at
    /// compile time; an overflow is reported instead of wrapping.
    fn fold_temporal_cast(
        &mut self,
        operand: ExprId,
        from: &Type,
        to: &Type,
    ) -> Result<Option<ValueId>> {
        let Some(epoch) = self.arena.as_constant(operand).and_then(|c| c.value.as_i64()) else {
            return Ok(None);
        };
        let folded = match (from.id(), to.id()) {
            (TypeId::Timestamp, TypeId::Timestamp) => {
                let diff = time_dimension(to) - time_dimension(from);
                match diff.cmp(&0) {
                    std::cmp::Ordering::Greater => {
                        datetime_scaled_epoch(ScalingType::ScaleUp, epoch, diff)?
                    }
                    std::cmp::Ordering::Less => {
                        datetime_scaled_epoch(ScalingType::ScaleDown, epoch, -diff)?
                    }
                    std::cmp::Ordering::Equal => epoch,
                }
            }
            (TypeId::Date, TypeId::Timestamp) => {
                datetime_scaled_epoch(ScalingType::ScaleUp, epoch, time_dimension(to))?
            }
            _ => return Ok(None),
        };
        let ir = value_ir_type(to)?;
        Ok(Some(self.state.iconst(ir, folded)))
    }

    /// Convert `value` of type `from` into the representation of `to`,
    /// keeping nulls null.
    pub(super) fn cast_value(&mut self, value: ValueId, from: TypeRef, to: TypeRef) -> Result<ValueId> {
        if from.is_null() {
            return self.state.inline_null(to);
        }
        let to_ir = value_ir_type(to)?;
        if Type::same(from.with_nullable(to.nullable()), to) {
            return Ok(match (self.state.value_type(value), to_ir) {
                (IrType::I8, IrType::I1) => self.to_bool(value),
                (_, to_ir) if to.is_boolean() => self.state.cast_to_type_in(value, to_ir),
                _ => value,
            });
        }
        let is_null = self.null_check(value, from)?;
        let converted = self.convert(value, from, to, to_ir, is_null)?;
        if !to.nullable() {
            return Ok(converted);
        }
        self.propagate_null(is_null, converted, to)
    }

    fn convert(
        &mut self,
        value: ValueId,
        from: &Type,
        to: &Type,
        to_ir: IrType,
        is_null: Option<ValueId>,
    ) -> Result<ValueId> {
        let from_ir = self.state.value_type(value);
        if to.is_boolean() {
            let truth = if from.is_boolean() {
                self.to_bool(value)
            } else if from_ir.is_float() {
                let zero = self.state.fconst(from_ir, 0.0);
                self.state.fcmp(FloatPredicate::Une, value, zero)
            } else if from_ir.is_int() {
                let zero = self.state.iconst(from_ir, 0);
                self.state.icmp(IntPredicate::Ne, value, zero)
            } else {
                return Err(self.unsupported(&format!("cast from {from} to {to}")));
            };
            return Ok(self.state.cast_to_type_in(truth, to_ir));
        }
        if from.is_date_time() || to.is_date_time() {
            return self.convert_temporal(value, from, to, to_ir, is_null);
        }
        if from.is_ext_dictionary() || to.is_ext_dictionary() {
            if from.is_ext_dictionary() && to.is_ext_dictionary() && from.dict_id() == to.dict_id() {
                return Ok(self.state.cast_to_type_in(value, to_ir));
            }
            return Err(self.unsupported(&format!("cast from {from} to {to}")));
        }
        if (from.is_number() || from.is_boolean()) && to.is_number() {
            return self.numeric_to(value, decimal_scale(from), to_ir, decimal_scale(to));
        }
        Err(self.unsupported(&format!("cast from {from} to {to}")))
    }

    fn convert_temporal(
        &mut self,
        value: ValueId,
        from: &Type,
        to: &Type,
        to_ir: IrType,
        is_null: Option<ValueId>,
    ) -> Result<ValueId> {
        let converted = match (from.id(), to.id()) {
            (TypeId::Timestamp, TypeId::Timestamp) => {
                let diff = time_dimension(to) - time_dimension(from);
                self.rescale_by_precision(value, diff, is_null)?
            }
            (TypeId::Date, TypeId::Timestamp) => {
                self.rescale_by_precision(value, time_dimension(to), is_null)?
            }
            (TypeId::Timestamp, TypeId::Date) => {
                // Floor at the source precision so sub-second ticks before
                // midnight stay on the previous day.
                let scale = timestamp_precision_scale(time_dimension(from))?;
                let ticks = self.state.cast_to_type_in(value, IrType::I64);
                let day_start = self.round_down(ticks, SECS_PER_DAY * scale);
                self.rescale_by_precision(day_start, -time_dimension(from), is_null)?
            }
            (a, b) if a == b && from.unit() == to.unit() => value,
            (TypeId::Date, TypeId::Date) => value,
            _ => return Err(self.unsupported(&format!("cast from {from} to {to}"))),
        };
        Ok(self.state.cast_to_type_in(converted, to_ir))
    }

    /// Scale an epoch by `10^diff` between datetime precisions. Scaling up
    /// leaves non-null rows whose result would not fit in 64 bits with
    /// [`ERR_OVERFLOW_OR_UNDERFLOW`].
    fn rescale_by_precision(
        &mut self,
        value: ValueId,
        diff: i32,
        is_null: Option<ValueId>,
    ) -> Result<ValueId> {
        if diff == 0 {
            return Ok(value);
        }
        let value = self.state.cast_to_type_in(value, IrType::I64);
        let scale = timestamp_precision_scale(diff.abs())?;
        let factor = self.state.iconst(IrType::I64, scale);
        if diff < 0 {
            return Ok(self.state.binary(BinOp::SDiv, value, factor));
        }
        self.guard_scale_overflow(value, scale, is_null);
        Ok(self.state.binary(BinOp::Mul, value, factor))
    }

    pub(super) fn guard_scale_overflow(
        &mut self,
        value: ValueId,
        scale: i64,
        is_null: Option<ValueId>,
    ) {
        let max = self.state.iconst(IrType::I64, i64::MAX / scale);
        let min = self.state.iconst(IrType::I64, i64::MIN / scale);
        let above = self.state.icmp(IntPredicate::Sgt, value, max);
        let below = self.state.icmp(IntPredicate::Slt, value, min);
        let mut overflow = self.state.binary(BinOp::Or, above, below);
        // The null sentinel is out of range but never scaled.
        if let Some(is_null) = is_null {
            let present = self.state.unary(UnOp::Not, is_null);
            overflow = self.state.binary(BinOp::And, overflow, present);
        }
        let error = self.state.error_block(ERR_OVERFLOW_OR_UNDERFLOW);
        let ok = self.state.create_block("scale_ok");
        self.state.cond_br(overflow, error, ok, Some((1, 99)));
        self.state.switch_to(ok);
    }
}
