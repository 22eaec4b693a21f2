//! In-process compilation of row routines with the Cranelift JIT.
//!
//! The routine IR maps onto Cranelift almost one to one. `i1` values live in
//! `i8` registers holding 0 or 1, phis become block parameters passed on
//! every incoming edge, and runtime primitives plus bound extension functions
//! are imported by symbol from the host process.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use cranelift_codegen::ir::condcodes::{FloatCC, IntCC};
use cranelift_codegen::ir::{
    AbiParam, Block, BlockArg, FuncRef, InstBuilder, MemFlags, Type, Value, types,
};
use cranelift_codegen::settings::{self, Configurable};
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{Linkage, Module, default_libcall_names};
use rustc_hash::FxHashMap;
use vexc_codegen::ir::{
    BinOp, BlockId, CastOp, FloatPredicate, IntPredicate, UnOp, ValueId,
};
use vexc_codegen::runtime::host_address;
use vexc_codegen::{
    ColumnBuffers, CompilationOptions, ExecutorDeviceType, ExtensionFunction, Function, Inst,
    IrType, RoutineModule, RowOutput, RuntimeFn, Terminator,
};
use vexc_result::{Error, Result};

use crate::{Backend, CompilationContext};

/// `(col_buffers, pos, out) -> status`
type RowFn = unsafe extern "C" fn(*const *const u8, i64, *mut i64) -> i32;

/// Stateless JIT backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for CpuBackend {
    fn device_type(&self) -> ExecutorDeviceType {
        ExecutorDeviceType::Cpu
    }

    fn generate_native_code(
        &self,
        routine: &RoutineModule,
        _wrapper: &str,
        live_funcs: &[ExtensionFunction],
        options: &CompilationOptions,
    ) -> Result<Arc<dyn CompilationContext>> {
        let context = CpuCompilationContext::compile(routine, live_funcs, options)?;
        Ok(Arc::new(context))
    }
}

/// A JIT-compiled row function and the code memory backing it.
pub struct CpuCompilationContext {
    fn_ptr: RowFn,
    /// Owns the code pages; released on drop.
    module: Option<JITModule>,
    name: String,
    input_types: Vec<IrType>,
    num_outputs: usize,
}

// SAFETY: after `finalize_definitions` the code pages are immutable and
// `fn_ptr` is a plain function pointer callable from any thread. The module
// is only kept to own that memory and is not touched again until drop.
unsafe impl Send for CpuCompilationContext {}
unsafe impl Sync for CpuCompilationContext {}

impl CpuCompilationContext {
    fn compile(
        routine: &RoutineModule,
        live_funcs: &[ExtensionFunction],
        options: &CompilationOptions,
    ) -> Result<Self> {
        let mut flag_builder = settings::builder();
        let opt_level = if options.opt_level == 0 { "none" } else { "speed" };
        flag_builder
            .set("opt_level", opt_level)
            .map_err(Error::backend)?;
        flag_builder.set("is_pic", "false").map_err(Error::backend)?;
        let isa = cranelift_native::builder()
            .map_err(Error::backend)?
            .finish(settings::Flags::new(flag_builder))
            .map_err(Error::backend)?;

        let mut jit_builder = JITBuilder::with_isa(isa, default_libcall_names());
        for func in RuntimeFn::ALL {
            jit_builder.symbol(func.name(), host_address(func));
        }
        for ext in routine.extensions.iter().chain(live_funcs) {
            jit_builder.symbol(ext.symbol.as_str(), ext.imp.address());
        }
        let mut module = JITModule::new(jit_builder);
        let mut ctx = module.make_context();
        let mut func_ctx = FunctionBuilderContext::new();
        let ptr_type = module.target_config().pointer_type();

        ctx.func.signature.params = vec![
            AbiParam::new(ptr_type),   // col_buffers
            AbiParam::new(types::I64), // pos
            AbiParam::new(ptr_type),   // out
        ];
        ctx.func.signature.returns = vec![AbiParam::new(types::I32)];
        let func_id = module
            .declare_function(routine.func.name(), Linkage::Local, &ctx.func.signature)
            .map_err(Error::backend)?;

        {
            let builder = FunctionBuilder::new(&mut ctx.func, &mut func_ctx);
            Lowering::new(&routine.func, builder, &mut module, ptr_type)?.run()?;
        }

        module
            .define_function(func_id, &mut ctx)
            .map_err(Error::backend)?;
        module.finalize_definitions().map_err(Error::backend)?;
        let raw_ptr = module.get_finalized_function(func_id);
        // SAFETY: the declared signature is exactly `RowFn` and the module
        // owning the code is stored alongside the pointer.
        let fn_ptr = unsafe { std::mem::transmute::<*const u8, RowFn>(raw_ptr) };

        tracing::debug!(
            name = routine.func.name(),
            blocks = routine.func.num_blocks(),
            inputs = routine.input_columns.len(),
            outputs = routine.num_outputs,
            "JIT-compiled row routine"
        );
        Ok(Self {
            fn_ptr,
            module: Some(module),
            name: routine.func.name().to_string(),
            input_types: routine.input_ir_types(),
            num_outputs: routine.num_outputs,
        })
    }

    pub fn input_types(&self) -> &[IrType] {
        &self.input_types
    }

    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    /// Evaluate row `pos` of `buffers`.
    pub fn run_row(&self, buffers: &ColumnBuffers, pos: usize) -> Result<RowOutput> {
        buffers.validate(&self.input_types)?;
        if pos >= buffers.num_rows() {
            return Err(Error::InvalidArgumentError(format!(
                "row {pos} of a batch of {} rows",
                buffers.num_rows()
            )));
        }
        Ok(self.invoke(&buffers.raw_pointers(), pos))
    }

    /// Evaluate every row of `buffers`.
    pub fn run(&self, buffers: &ColumnBuffers) -> Result<Vec<RowOutput>> {
        buffers.validate(&self.input_types)?;
        let pointers = buffers.raw_pointers();
        Ok((0..buffers.num_rows())
            .map(|pos| self.invoke(&pointers, pos))
            .collect())
    }

    fn invoke(&self, pointers: &[*const u8], pos: usize) -> RowOutput {
        let mut out = vec![0i64; self.num_outputs];
        // SAFETY: the buffers behind `pointers` were validated against the
        // routine inputs and cover `pos`; `out` has one slot per target.
        let status = unsafe { (self.fn_ptr)(pointers.as_ptr(), pos as i64, out.as_mut_ptr()) };
        RowOutput { status, out }
    }
}

impl CompilationContext for CpuCompilationContext {
    fn device_type(&self) -> ExecutorDeviceType {
        ExecutorDeviceType::Cpu
    }

    fn entry_name(&self) -> &str {
        &self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for CpuCompilationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuCompilationContext")
            .field("name", &self.name)
            .field("input_types", &self.input_types)
            .field("num_outputs", &self.num_outputs)
            .finish_non_exhaustive()
    }
}

impl Drop for CpuCompilationContext {
    fn drop(&mut self) {
        if let Some(module) = self.module.take() {
            // SAFETY: `fn_ptr` is the only pointer into the module's code and
            // it dies with `self`.
            unsafe { module.free_memory() };
        }
    }
}

struct Lowering<'a> {
    routine: &'a Function,
    builder: FunctionBuilder<'a>,
    module: &'a mut JITModule,
    ptr_type: Type,
    blocks: Vec<Option<Block>>,
    values: Vec<Option<Value>>,
    imports: FxHashMap<String, FuncRef>,
    col_buffers: Value,
    pos: Value,
    out: Value,
}

impl<'a> Lowering<'a> {
    fn new(
        routine: &'a Function,
        mut builder: FunctionBuilder<'a>,
        module: &'a mut JITModule,
        ptr_type: Type,
    ) -> Result<Self> {
        let mut blocks = vec![None; routine.num_blocks()];
        let mut values = vec![None; routine.num_values()];
        for block in routine.reverse_postorder() {
            let clif = builder.create_block();
            for &id in &routine.block(block).insts {
                if let Inst::Phi { ty, .. } = routine.value(id).inst {
                    let param = builder.append_block_param(clif, clif_type(ty, ptr_type));
                    values[id.index()] = Some(param);
                }
            }
            blocks[block.index()] = Some(clif);
        }
        let entry = blocks[Function::ENTRY.index()]
            .ok_or_else(|| Error::backend("entry block missing from its own reverse postorder"))?;
        builder.append_block_params_for_function_params(entry);
        let (col_buffers, pos, out) = match builder.block_params(entry) {
            &[col_buffers, pos, out] => (col_buffers, pos, out),
            other => {
                return Err(Error::backend(format!(
                    "row function takes 3 parameters, not {}",
                    other.len()
                )));
            }
        };
        Ok(Self {
            routine,
            builder,
            module,
            ptr_type,
            blocks,
            values,
            imports: FxHashMap::default(),
            col_buffers,
            pos,
            out,
        })
    }

    fn run(mut self) -> Result<()> {
        for block in self.routine.reverse_postorder() {
            let clif = self.block(block)?;
            self.builder.switch_to_block(clif);
            let data = self.routine.block(block);
            for &id in &data.insts {
                self.lower_inst(id)?;
            }
            let Some(term) = data.term else {
                return Err(Error::backend(format!("block {} has no terminator", data.name)));
            };
            self.lower_terminator(block, term)?;
        }
        self.builder.seal_all_blocks();
        self.builder.finalize();
        Ok(())
    }

    fn ty(&self, ty: IrType) -> Type {
        clif_type(ty, self.ptr_type)
    }

    fn block(&self, id: BlockId) -> Result<Block> {
        self.blocks[id.index()].ok_or_else(|| {
            Error::backend(format!(
                "branch to unreachable block {}",
                self.routine.block(id).name
            ))
        })
    }

    fn value(&self, id: ValueId) -> Result<Value> {
        self.values[id.index()]
            .ok_or_else(|| Error::backend(format!("{id} used before its definition")))
    }

    fn lower_inst(&mut self, id: ValueId) -> Result<()> {
        let data = self.routine.value(id);
        let value = match &data.inst {
            Inst::Phi { .. } => return Ok(()),
            Inst::IConst { ty, value } => self.iconst(*ty, *value),
            Inst::FConst { ty, value } => match ty {
                IrType::F32 => self.builder.ins().f32const(*value as f32),
                IrType::F64 => self.builder.ins().f64const(*value),
                other => return Err(Error::backend(format!("float constant of type {other}"))),
            },
            Inst::Pos => self.pos,
            Inst::ColumnBuffer { slot } => self.column_buffer(*slot),
            Inst::LoadColumn { slot, ty } => {
                let base = self.column_buffer(*slot);
                let offset = self.builder.ins().imul_imm(self.pos, ty.bytes() as i64);
                let addr = self.builder.ins().iadd(base, offset);
                let clif = self.ty(*ty);
                self.builder.ins().load(clif, MemFlags::trusted(), addr, 0)
            }
            Inst::Cast { op, value, to } => self.cast(*op, *value, *to)?,
            Inst::Binary { op, lhs, rhs } => {
                let (l, r) = (self.value(*lhs)?, self.value(*rhs)?);
                let ins = self.builder.ins();
                match op {
                    BinOp::Add => ins.iadd(l, r),
                    BinOp::Sub => ins.isub(l, r),
                    BinOp::Mul => ins.imul(l, r),
                    BinOp::SDiv => ins.sdiv(l, r),
                    BinOp::SRem => ins.srem(l, r),
                    BinOp::And => ins.band(l, r),
                    BinOp::Or => ins.bor(l, r),
                    BinOp::Xor => ins.bxor(l, r),
                    BinOp::FAdd => ins.fadd(l, r),
                    BinOp::FSub => ins.fsub(l, r),
                    BinOp::FMul => ins.fmul(l, r),
                    BinOp::FDiv => ins.fdiv(l, r),
                }
            }
            Inst::Unary { op, value } => {
                let v = self.value(*value)?;
                let ins = self.builder.ins();
                match op {
                    UnOp::Not if data.ty == IrType::I1 => ins.bxor_imm(v, 1),
                    UnOp::Not => ins.bnot(v),
                    UnOp::Neg => ins.ineg(v),
                    UnOp::FNeg => ins.fneg(v),
                }
            }
            Inst::ICmp { pred, lhs, rhs } => {
                let (l, r) = (self.value(*lhs)?, self.value(*rhs)?);
                self.builder.ins().icmp(int_cc(*pred), l, r)
            }
            Inst::FCmp { pred, lhs, rhs } => {
                let (l, r) = (self.value(*lhs)?, self.value(*rhs)?);
                self.builder.ins().fcmp(float_cc(*pred), l, r)
            }
            Inst::Select {
                cond,
                if_true,
                if_false,
            } => {
                let c = self.value(*cond)?;
                let (t, f) = (self.value(*if_true)?, self.value(*if_false)?);
                self.builder.ins().select(c, t, f)
            }
            Inst::Call { func, args } => self.call(func.name(), func.params(), func.ret(), args)?,
            Inst::CallExtension { symbol, args, ret } => {
                let params: Vec<IrType> =
                    args.iter().map(|a| self.routine.value_type(*a)).collect();
                self.call(symbol, &params, *ret, args)?
            }
            Inst::StoreOutput { index, value } => {
                let v = self.value(*value)?;
                self.builder
                    .ins()
                    .store(MemFlags::trusted(), v, self.out, (*index * 8) as i32);
                return Ok(());
            }
        };
        self.values[id.index()] = Some(value);
        Ok(())
    }

    fn iconst(&mut self, ty: IrType, value: i64) -> Value {
        let clif = self.ty(ty);
        let bits = clif.bits();
        // narrow immediates are given zero-extended
        let imm = if bits >= 64 {
            value
        } else {
            value & ((1i64 << bits) - 1)
        };
        self.builder.ins().iconst(clif, imm)
    }

    fn column_buffer(&mut self, slot: usize) -> Value {
        let offset = (slot * self.ptr_type.bytes() as usize) as i32;
        self.builder
            .ins()
            .load(self.ptr_type, MemFlags::trusted(), self.col_buffers, offset)
    }

    fn cast(&mut self, op: CastOp, value: ValueId, to: IrType) -> Result<Value> {
        let from = self.routine.value_type(value);
        let v = self.value(value)?;
        let (from_ty, to_ty) = (self.ty(from), self.ty(to));
        let b = &mut self.builder;
        Ok(match op {
            CastOp::SExt if from == IrType::I1 => {
                let wide = if to_ty == from_ty {
                    v
                } else {
                    b.ins().uextend(to_ty, v)
                };
                b.ins().ineg(wide)
            }
            CastOp::SExt => b.ins().sextend(to_ty, v),
            CastOp::ZExt if to_ty == from_ty => v,
            CastOp::ZExt => b.ins().uextend(to_ty, v),
            CastOp::Trunc if to == IrType::I1 => {
                let narrow = if from_ty == types::I8 {
                    v
                } else {
                    b.ins().ireduce(types::I8, v)
                };
                b.ins().band_imm(narrow, 1)
            }
            CastOp::Trunc if to_ty == from_ty => v,
            CastOp::Trunc => b.ins().ireduce(to_ty, v),
            CastOp::SiToFp if from_ty.bits() < 32 => {
                let wide = b.ins().sextend(types::I32, v);
                b.ins().fcvt_from_sint(to_ty, wide)
            }
            CastOp::SiToFp => b.ins().fcvt_from_sint(to_ty, v),
            CastOp::FpToSi if to_ty.bits() >= 32 => b.ins().fcvt_to_sint_sat(to_ty, v),
            CastOp::FpToSi => {
                // saturate at i32, then clamp to the narrow range
                let wide = b.ins().fcvt_to_sint_sat(types::I32, v);
                let bits = to_ty.bits();
                let max = b.ins().iconst(types::I32, (1i64 << (bits - 1)) - 1);
                let min = b.ins().iconst(types::I32, -(1i64 << (bits - 1)) & 0xffff_ffff);
                let clamped = b.ins().smin(wide, max);
                let clamped = b.ins().smax(clamped, min);
                b.ins().ireduce(to_ty, clamped)
            }
            CastOp::FpExt => b.ins().fpromote(to_ty, v),
            CastOp::FpTrunc => b.ins().fdemote(to_ty, v),
            CastOp::Bitcast => b.ins().bitcast(to_ty, MemFlags::new(), v),
        })
    }

    fn call(
        &mut self,
        name: &str,
        params: &[IrType],
        ret: IrType,
        args: &[ValueId],
    ) -> Result<Value> {
        let func_ref = self.import(name, params, ret)?;
        let args = args
            .iter()
            .map(|a| self.value(*a))
            .collect::<Result<Vec<_>>>()?;
        let call = self.builder.ins().call(func_ref, &args);
        match self.builder.inst_results(call) {
            [result] => Ok(*result),
            other => Err(Error::backend(format!(
                "{name} returned {} values",
                other.len()
            ))),
        }
    }

    fn import(&mut self, name: &str, params: &[IrType], ret: IrType) -> Result<FuncRef> {
        if let Some(func_ref) = self.imports.get(name) {
            return Ok(*func_ref);
        }
        let mut sig = self.module.make_signature();
        sig.params
            .extend(params.iter().map(|p| abi_param(*p, self.ptr_type)));
        sig.returns.push(abi_param(ret, self.ptr_type));
        let func_id = self
            .module
            .declare_function(name, Linkage::Import, &sig)
            .map_err(Error::backend)?;
        let func_ref = self.module.declare_func_in_func(func_id, self.builder.func);
        self.imports.insert(name.to_string(), func_ref);
        Ok(func_ref)
    }

    /// Phi operands `from` passes along its edge to `to`.
    fn edge_args(&self, from: BlockId, to: BlockId) -> Result<Vec<BlockArg>> {
        let mut args = Vec::new();
        for &id in &self.routine.block(to).insts {
            let Inst::Phi { incoming, .. } = &self.routine.value(id).inst else {
                continue;
            };
            let Some((_, value)) = incoming.iter().find(|(block, _)| *block == from) else {
                return Err(Error::backend(format!(
                    "phi {id} has no value for {}",
                    self.routine.block(from).name
                )));
            };
            args.push(BlockArg::Value(self.value(*value)?));
        }
        Ok(args)
    }

    fn lower_terminator(&mut self, from: BlockId, term: Terminator) -> Result<()> {
        match term {
            Terminator::Br(target) => {
                let args = self.edge_args(from, target)?;
                let block = self.block(target)?;
                self.builder.ins().jump(block, &args);
            }
            Terminator::CondBr {
                cond,
                if_true,
                if_false,
                weights,
            } => {
                let c = self.value(cond)?;
                let then_args = self.edge_args(from, if_true)?;
                let else_args = self.edge_args(from, if_false)?;
                let (then_block, else_block) = (self.block(if_true)?, self.block(if_false)?);
                match weights {
                    Some((t, e)) if t.saturating_mul(4) <= e => {
                        self.builder.set_cold_block(then_block)
                    }
                    Some((t, e)) if e.saturating_mul(4) <= t => {
                        self.builder.set_cold_block(else_block)
                    }
                    _ => {}
                }
                self.builder
                    .ins()
                    .brif(c, then_block, &then_args, else_block, &else_args);
            }
            Terminator::Ret(status) => {
                let v = self.value(status)?;
                self.builder.ins().return_(&[v]);
            }
        }
        Ok(())
    }
}

fn clif_type(ty: IrType, ptr_type: Type) -> Type {
    match ty {
        IrType::I1 | IrType::I8 => types::I8,
        IrType::I16 => types::I16,
        IrType::I32 => types::I32,
        IrType::I64 => types::I64,
        IrType::F32 => types::F32,
        IrType::F64 => types::F64,
        IrType::Ptr => ptr_type,
        IrType::Void => types::INVALID,
    }
}

/// Narrow integers are widened by the caller, as the C ABI expects.
fn abi_param(ty: IrType, ptr_type: Type) -> AbiParam {
    let param = AbiParam::new(clif_type(ty, ptr_type));
    match ty {
        IrType::I1 => param.uext(),
        IrType::I8 | IrType::I16 => param.sext(),
        _ => param,
    }
}

fn int_cc(pred: IntPredicate) -> IntCC {
    match pred {
        IntPredicate::Eq => IntCC::Equal,
        IntPredicate::Ne => IntCC::NotEqual,
        IntPredicate::Slt => IntCC::SignedLessThan,
        IntPredicate::Sle => IntCC::SignedLessThanOrEqual,
        IntPredicate::Sgt => IntCC::SignedGreaterThan,
        IntPredicate::Sge => IntCC::SignedGreaterThanOrEqual,
    }
}

fn float_cc(pred: FloatPredicate) -> FloatCC {
    match pred {
        FloatPredicate::Oeq => FloatCC::Equal,
        FloatPredicate::Une => FloatCC::NotEqual,
        FloatPredicate::Olt => FloatCC::LessThan,
        FloatPredicate::Ole => FloatCC::LessThanOrEqual,
        FloatPredicate::Ogt => FloatCC::GreaterThan,
        FloatPredicate::Oge => FloatCC::GreaterThanOrEqual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passing_routine() -> Function {
        let mut func = Function::new("passes");
        let status = func.append(
            Function::ENTRY,
            Inst::IConst {
                ty: IrType::I32,
                value: 1,
            },
        );
        func.terminate(Function::ENTRY, Terminator::Ret(status));
        func
    }

    #[test]
    fn lowering_rejects_a_signature_without_row_parameters() {
        let mut module = JITModule::new(JITBuilder::new(default_libcall_names()).unwrap());
        let mut ctx = module.make_context();
        let mut func_ctx = FunctionBuilderContext::new();
        let ptr_type = module.target_config().pointer_type();
        ctx.func.signature.params = vec![AbiParam::new(ptr_type)];
        ctx.func.signature.returns = vec![AbiParam::new(types::I32)];

        let routine = passing_routine();
        let builder = FunctionBuilder::new(&mut ctx.func, &mut func_ctx);
        let Err(err) = Lowering::new(&routine, builder, &mut module, ptr_type) else {
            panic!("a one-parameter signature was accepted");
        };
        assert!(
            matches!(&err, Error::Backend(msg) if msg.contains("3 parameters, not 1")),
            "{err:?}"
        );
    }
}
