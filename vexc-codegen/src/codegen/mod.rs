//! Lowering of expression trees into routine IR.
//!
//! [`CodeGenerator`] is a [`ScalarExprVisitor`] whose output is the SSA value
//! of the visited node. Values follow one representation per type (see
//! [`value_ir_type`]); nulls are inline sentinels, so every operator that can
//! see a null checks for it explicitly.
//!
//! Node kinds without a lowering report [`Error::Unsupported`], which lets
//! the caller fall back to another execution path.

mod arith;
mod case;
mod datetime;
mod logical;

use vexc_expr::{
    Agg, ColumnVar, Constant, DateAdd, DateDiff, Datetrunc, ExprArena, ExprId, ExprKind, Extract,
    InIntegerSet, InSubquery, Likelihood, ScalarExprVisitor, UnaryBuiltin, Var, WhichRow, dispatch,
};
use vexc_result::{Error, Result};
use vexc_types::{Datum, Type, TypeId};

use crate::buffers::storage_ir_type;
use crate::cgen_state::{CgenState, CgenStateOwner, InputColumn};
use crate::extensions::{ExtensionFunction, ExtensionRegistry};
use crate::ir::{Function, IntPredicate, IrType, ValueId};
use crate::options::CompilationOptions;

/// IR type of an expression value of type `ty`.
///
/// Non-nullable booleans are `i1`, nullable booleans and the null type `i8`.
/// Everything else uses its storage type: integers at their logical width,
/// floats at theirs, arrays as a pointer to the column buffer.
pub fn value_ir_type(ty: &Type) -> Result<IrType> {
    match ty.id() {
        TypeId::Boolean if !ty.nullable() => Ok(IrType::I1),
        TypeId::Boolean | TypeId::Null => Ok(IrType::I8),
        _ => storage_ir_type(ty),
    }
}

pub struct CodeGenerator<'a> {
    arena: &'a ExprArena,
    options: &'a CompilationOptions,
    extensions: &'a ExtensionRegistry,
    state: CgenState,
    /// Node being dispatched, for error messages.
    current: ExprId,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(
        arena: &'a ExprArena,
        options: &'a CompilationOptions,
        extensions: &'a ExtensionRegistry,
        routine_name: &str,
    ) -> Self {
        Self {
            arena,
            options,
            extensions,
            state: CgenState::new(routine_name, options.hoist_literals),
            current: ExprId(0),
        }
    }

    pub fn state(&mut self) -> &mut CgenState {
        &mut self.state
    }

    pub fn options(&self) -> &CompilationOptions {
        self.options
    }

    /// Value of `id`, in the representation [`value_ir_type`] prescribes for
    /// its type.
    pub fn codegen(&mut self, id: ExprId) -> Result<ValueId> {
        let value = self.visit(id)?;
        let ty = self.arena.ty(id);
        if !ty.is_boolean() {
            return Ok(value);
        }
        let want = value_ir_type(ty)?;
        Ok(match (self.state.value_type(value), want) {
            (IrType::I1, IrType::I8) => self.state.cast_to_type_in(value, IrType::I8),
            (IrType::I8, IrType::I1) => self.to_bool(value),
            _ => value,
        })
    }

    /// `i1` truth of an integer value: `v > 0` for anything wider than one
    /// bit, so the boolean null sentinel reads as false.
    pub fn to_bool(&mut self, value: ValueId) -> ValueId {
        let ty = self.state.value_type(value);
        if ty == IrType::I1 {
            return value;
        }
        let zero = self.state.iconst(ty, 0);
        self.state.icmp(IntPredicate::Sgt, value, zero)
    }

    /// `i1` that is true when `value` of type `ty` holds the null sentinel,
    /// or `None` when `ty` cannot be null.
    pub(crate) fn null_check(&mut self, value: ValueId, ty: &Type) -> Result<Option<ValueId>> {
        if !ty.nullable() {
            return Ok(None);
        }
        let vt = self.state.value_type(value);
        if vt == IrType::I1 {
            return Ok(None);
        }
        if ty.is_floating_point() {
            let null = self.state.inline_fp_null(ty);
            Ok(Some(self.state.fcmp(
                crate::ir::FloatPredicate::Oeq,
                value,
                null,
            )))
        } else {
            let null = self.state.inline_int_null(ty)?;
            let null = self.state.cast_to_type_in(null, vt);
            Ok(Some(self.state.icmp(IntPredicate::Eq, value, null)))
        }
    }

    /// OR of the optional null flags, `None` when no operand can be null.
    pub(crate) fn any_null(&mut self, flags: &[Option<ValueId>]) -> Option<ValueId> {
        let mut acc: Option<ValueId> = None;
        for flag in flags.iter().flatten() {
            acc = Some(match acc {
                None => *flag,
                Some(prev) => self.state.binary(crate::ir::BinOp::Or, prev, *flag),
            });
        }
        acc
    }

    /// `null` of `ty` where `is_null` holds, `value` elsewhere.
    pub(crate) fn propagate_null(
        &mut self,
        is_null: Option<ValueId>,
        value: ValueId,
        ty: &Type,
    ) -> Result<ValueId> {
        let Some(is_null) = is_null else {
            return Ok(value);
        };
        let null = self.state.inline_null(ty)?;
        let null = self.state.cast_to_type_in(null, self.state.value_type(value));
        Ok(self.state.select(is_null, null, value))
    }

    /// Hand over the routine, the columns it reads and the extension
    /// functions it calls.
    pub fn finish(self) -> (Function, Vec<InputColumn>, Vec<ExtensionFunction>) {
        self.state.finish()
    }

    fn unsupported(&self, what: &str) -> Error {
        Error::unsupported(format!("code generation for {what}"))
    }
}

impl CgenStateOwner for CodeGenerator<'_> {
    fn cgen_state(&mut self) -> &mut CgenState {
        &mut self.state
    }
}

impl<'a> ScalarExprVisitor<'a> for CodeGenerator<'a> {
    type Output = Result<ValueId>;

    fn arena(&self) -> &'a ExprArena {
        self.arena
    }

    fn default_result(&mut self) -> Result<ValueId> {
        Err(self.unsupported(self.arena.kind(self.current).name()))
    }

    fn aggregate_result(&mut self, aggregate: Result<ValueId>, _next: Result<ValueId>) -> Result<ValueId> {
        aggregate
    }

    fn visit(&mut self, id: ExprId) -> Result<ValueId> {
        let outer = std::mem::replace(&mut self.current, id);
        let result = dispatch(self, id);
        self.current = outer;
        result
    }

    fn visit_column_var(&mut self, id: ExprId, col: &'a ColumnVar) -> Result<ValueId> {
        let ty = self.arena.ty(id);
        if ty.is_array() {
            return self.state.column_buffer(*col, ty);
        }
        let loaded = self.state.fetch_column(*col, ty)?;
        if ty.is_boolean() && !ty.nullable() {
            let zero = self.state.iconst(IrType::I8, 0);
            return Ok(self.state.icmp(IntPredicate::Ne, loaded, zero));
        }
        Ok(loaded)
    }

    fn visit_var(&mut self, id: ExprId, var: &'a Var) -> Result<ValueId> {
        if var.which_row != WhichRow::InputRow {
            return Err(self.unsupported("output row references"));
        }
        let ty = self.arena.ty(id);
        if ty.is_array() {
            return self.state.column_buffer(var.column, ty);
        }
        self.state.fetch_column(var.column, ty)
    }

    fn visit_constant(&mut self, id: ExprId, constant: &'a Constant) -> Result<ValueId> {
        let ty = self.arena.ty(id);
        if constant.value.is_null() {
            if ty.is_array() {
                return Err(self.unsupported("array literals"));
            }
            return self.state.inline_null(ty);
        }
        let ir = value_ir_type(ty)?;
        match (&constant.value, ir) {
            (Datum::Str(_), _) => Err(self.unsupported("string literals")),
            (value, IrType::F32 | IrType::F64) => match value.as_f64() {
                Some(v) => Ok(self.state.fconst(ir, v)),
                None => Err(Error::InvalidArgumentError(format!(
                    "literal {value:?} does not fit {ty}"
                ))),
            },
            (value, ir) if ir.is_int() => match value.as_i64() {
                Some(v) => Ok(self.state.iconst(ir, v)),
                None => Err(Error::InvalidArgumentError(format!(
                    "literal {value:?} does not fit {ty}"
                ))),
            },
            _ => Err(self.unsupported(&format!("literals of type {ty}"))),
        }
    }

    fn visit_likelihood(&mut self, _id: ExprId, likelihood: &'a Likelihood) -> Result<ValueId> {
        self.codegen(likelihood.arg)
    }

    fn visit_in_integer_set(&mut self, _id: ExprId, _in_set: &'a InIntegerSet) -> Result<ValueId> {
        Err(self.unsupported("IN over an integer set"))
    }

    fn visit_in_subquery(&mut self, _id: ExprId, _in_subquery: &'a InSubquery) -> Result<ValueId> {
        Err(self.unsupported("IN over a subquery"))
    }

    fn visit_lower(&mut self, _id: ExprId, _lower: &'a UnaryBuiltin) -> Result<ValueId> {
        Err(self.unsupported("LOWER"))
    }

    fn visit_agg(&mut self, _id: ExprId, _agg: &'a Agg) -> Result<ValueId> {
        Err(self.unsupported("aggregates inside scalar expressions"))
    }

    fn visit_uoper(&mut self, id: ExprId, uoper: &'a vexc_expr::UOper) -> Result<ValueId> {
        use vexc_expr::UnaryOp;
        match uoper.op {
            UnaryOp::Not => self.codegen_not(uoper.operand),
            UnaryOp::IsNull => self.codegen_is_null(uoper.operand),
            UnaryOp::IsNotNull => {
                let is_null = self.codegen_is_null(uoper.operand)?;
                Ok(self.state.unary(crate::ir::UnOp::Not, is_null))
            }
            UnaryOp::UMinus => self.codegen_uminus(id, uoper.operand),
            UnaryOp::Cast => self.codegen_cast(id, uoper.operand),
            UnaryOp::Unnest => Err(self.unsupported("UNNEST")),
        }
    }

    fn visit_bin_oper(&mut self, id: ExprId, bin: &'a vexc_expr::BinOper) -> Result<ValueId> {
        if bin.op.is_logic() {
            return self.codegen_logical(id, bin);
        }
        if bin.qualifier != vexc_expr::Qualifier::One {
            return Err(self.unsupported(&format!(
                "{} {} comparison",
                bin.op.as_str(),
                bin.qualifier.as_str()
            )));
        }
        if bin.op.is_comparison() {
            return self.codegen_cmp(id, bin);
        }
        self.codegen_arith(id, bin)
    }

    fn visit_case(&mut self, id: ExprId, case: &'a vexc_expr::Case) -> Result<ValueId> {
        self.codegen_case(id, case)
    }

    fn visit_in_values(&mut self, id: ExprId, in_values: &'a vexc_expr::InValues) -> Result<ValueId> {
        self.codegen_in_values(id, in_values)
    }

    fn visit_function_oper(&mut self, id: ExprId, func: &'a vexc_expr::FunctionOper) -> Result<ValueId> {
        self.codegen_function_oper(id, func)
    }

    fn visit_extract(&mut self, id: ExprId, extract: &'a Extract) -> Result<ValueId> {
        self.codegen_extract(id, extract)
    }

    fn visit_datetrunc(&mut self, id: ExprId, datetrunc: &'a Datetrunc) -> Result<ValueId> {
        self.codegen_datetrunc(id, datetrunc)
    }

    fn visit_date_add(&mut self, id: ExprId, dateadd: &'a DateAdd) -> Result<ValueId> {
        self.codegen_date_add(id, dateadd)
    }

    fn visit_date_diff(&mut self, id: ExprId, datediff: &'a DateDiff) -> Result<ValueId> {
        self.codegen_date_diff(id, datediff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Inst;
    use crate::options::ExecutorDeviceType;
    use vexc_types::TypeContext;

    fn generator<'a>(
        arena: &'a ExprArena,
        options: &'a CompilationOptions,
        registry: &'a ExtensionRegistry,
    ) -> CodeGenerator<'a> {
        CodeGenerator::new(arena, options, registry, "test")
    }

    #[test]
    fn boolean_representation_follows_nullability() {
        let ctx = TypeContext::global();
        assert_eq!(value_ir_type(ctx.boolean(false)).unwrap(), IrType::I1);
        assert_eq!(value_ir_type(ctx.boolean(true)).unwrap(), IrType::I8);
        assert_eq!(value_ir_type(ctx.null()).unwrap(), IrType::I8);
        assert_eq!(value_ir_type(ctx.int16(true)).unwrap(), IrType::I16);
        assert_eq!(value_ir_type(ctx.fp32(true)).unwrap(), IrType::F32);
        assert!(value_ir_type(ctx.text(true)).is_err());
    }

    #[test]
    fn repeated_column_reads_share_one_load() {
        let ctx = TypeContext::global();
        let mut arena = ExprArena::new();
        let a = arena.column_var(ctx.int32(true), 1, 1);
        let b = arena.column_var(ctx.int32(true), 1, 1);
        let options = CompilationOptions::defaults(ExecutorDeviceType::Cpu);
        let registry = ExtensionRegistry::with_builtins();
        let mut cg = generator(&arena, &options, &registry);
        let va = cg.codegen(a).unwrap();
        let vb = cg.codegen(b).unwrap();
        assert_eq!(va, vb);
        let (func, inputs, _) = cg.finish();
        assert_eq!(inputs.len(), 1);
        let loads = func
            .block(Function::ENTRY)
            .insts
            .iter()
            .filter(|v| matches!(func.value(**v).inst, Inst::LoadColumn { .. }))
            .count();
        assert_eq!(loads, 1);
    }

    #[test]
    fn unsupported_kinds_name_themselves() {
        let ctx = TypeContext::global();
        let mut arena = ExprArena::new();
        let s = arena.column_var(ctx.ext_dict(ctx.text(true), 1, 4), 1, 1);
        let p = arena.constant(ctx.text(false), Datum::Str("a%".into()));
        let like = arena.like(s, p, true);
        let options = CompilationOptions::defaults(ExecutorDeviceType::Cpu);
        let registry = ExtensionRegistry::with_builtins();
        let mut cg = generator(&arena, &options, &registry);
        let err = cg.codegen(like).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
        assert!(err.to_string().contains("Like"));
    }

    #[test]
    fn nullable_boolean_literals_are_bytes() {
        let ctx = TypeContext::global();
        let mut arena = ExprArena::new();
        let t = arena.constant(ctx.boolean(true), Datum::Bool(true));
        let n = arena.null_constant(ctx.boolean(false));
        let options = CompilationOptions::defaults(ExecutorDeviceType::Cpu);
        let registry = ExtensionRegistry::with_builtins();
        let mut cg = generator(&arena, &options, &registry);
        let vt = cg.codegen(t).unwrap();
        let vn = cg.codegen(n).unwrap();
        assert_eq!(cg.state().value_type(vt), IrType::I8);
        assert_eq!(cg.state().value_type(vn), IrType::I8);
        assert_eq!(
            cg.state().func().value(vn).inst,
            Inst::IConst {
                ty: IrType::I8,
                value: -128
            }
        );
    }
}
