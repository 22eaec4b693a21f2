//! Assembly of the per-row routine of an execution unit.
//!
//! ```text
//! entry:          primary quals ──false──> filtered
//!                      │ true
//! deferred_quals: deferred quals ─false──> filtered
//!                      │ true
//! body:           store every target, return 1
//! filtered:       return 0
//! ```
//!
//! Division guards add a shared error block returning a negative status.

use vexc_expr::{AggKind, ExecutionUnit, ExprArena, ExprId};
use vexc_result::{Error, Result};

use crate::buffers::ColumnBuffers;
use crate::cgen_state::InputColumn;
use crate::codegen::CodeGenerator;
use crate::extensions::{ExtensionFunction, ExtensionRegistry};
use crate::interp::Interpreter;
use crate::ir::{BinOp, CastOp, Function, Inst, IrType, ValueId};
use crate::options::CompilationOptions;
use crate::quals::{PrioritizedQuals, prioritize_quals};
use crate::runtime::{ROW_FILTERED, ROW_PASSED};

pub const ROW_FUNCTION_NAME: &str = "row_func";

/// A compiled row routine with everything a backend needs to lower it.
#[derive(Clone, Debug)]
pub struct RoutineModule {
    pub func: Function,
    /// Columns read by the routine, in buffer slot order.
    pub input_columns: Vec<InputColumn>,
    /// Extension functions the routine calls.
    pub extensions: Vec<ExtensionFunction>,
    /// One `i64` output slot per target.
    pub num_outputs: usize,
    pub quals: PrioritizedQuals,
}

impl RoutineModule {
    pub fn short_circuit(&self) -> bool {
        self.quals.short_circuit
    }

    /// IR types the column buffers must have, in slot order.
    pub fn input_ir_types(&self) -> Vec<IrType> {
        self.input_columns.iter().map(|c| c.ir_type).collect()
    }

    /// Evaluate one row with the interpreter.
    pub fn interpret_row(&self, buffers: &ColumnBuffers, pos: usize) -> Result<RowOutput> {
        let interp = Interpreter::new(&self.func, &self.extensions);
        let mut out = vec![0i64; self.num_outputs];
        let status = interp.run_row(buffers, pos, &mut out)?;
        Ok(RowOutput { status, out })
    }

    /// Evaluate every row of `buffers` with the interpreter.
    pub fn interpret(&self, buffers: &ColumnBuffers) -> Result<Vec<RowOutput>> {
        buffers.validate(&self.input_ir_types())?;
        let interp = Interpreter::new(&self.func, &self.extensions);
        (0..buffers.num_rows())
            .map(|pos| {
                let mut out = vec![0i64; self.num_outputs];
                let status = interp.run_row(buffers, pos, &mut out)?;
                Ok(RowOutput { status, out })
            })
            .collect()
    }
}

/// Status and target slots of one evaluated row. The slots are only
/// written when the row passed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowOutput {
    pub status: i32,
    pub out: Vec<i64>,
}

impl RowOutput {
    pub fn passed(&self) -> bool {
        self.status == ROW_PASSED
    }
}

/// Build the row routine of `unit`.
pub fn compile_execution_unit(
    arena: &ExprArena,
    unit: &ExecutionUnit,
    options: &CompilationOptions,
    extensions: &ExtensionRegistry,
) -> Result<RoutineModule> {
    let quals = prioritize_quals(arena, unit);
    let mut cg = CodeGenerator::new(arena, options, extensions, ROW_FUNCTION_NAME);

    let primary = codegen_conjunction(&mut cg, &quals.primary)?;
    let state = cg.state();
    let deferred_bb = state.create_block("deferred_quals");
    let filtered_bb = state.create_block("filtered");
    let weights = quals.short_circuit.then_some((10, 90));
    state.cond_br(primary, deferred_bb, filtered_bb, weights);

    state.switch_to(deferred_bb);
    let deferred = codegen_conjunction(&mut cg, &quals.deferred)?;
    let state = cg.state();
    let body_bb = state.create_block("body");
    state.cond_br(deferred, body_bb, filtered_bb, None);

    cg.state().switch_to(body_bb);
    for (index, target) in unit.target_exprs.iter().enumerate() {
        let value = codegen_target(&mut cg, arena, *target)?;
        let value = encode_i64(&mut cg, value)?;
        cg.state().push(Inst::StoreOutput { index, value });
    }
    let state = cg.state();
    let passed = state.iconst(IrType::I32, ROW_PASSED as i64);
    state.ret(passed);

    state.switch_to(filtered_bb);
    let filtered = state.iconst(IrType::I32, ROW_FILTERED as i64);
    state.ret(filtered);

    let (func, input_columns, extensions) = cg.finish();
    func.verify()?;
    tracing::debug!(
        blocks = func.num_blocks(),
        values = func.num_values(),
        inputs = input_columns.len(),
        short_circuit = quals.short_circuit,
        "generated row routine"
    );
    Ok(RoutineModule {
        func,
        input_columns,
        extensions,
        num_outputs: unit.target_exprs.len(),
        quals,
    })
}

/// `i1` AND of the truth of every qual; constant true for none.
fn codegen_conjunction(cg: &mut CodeGenerator<'_>, quals: &[ExprId]) -> Result<ValueId> {
    let mut acc: Option<ValueId> = None;
    for qual in quals {
        let value = cg.codegen(*qual)?;
        let truth = cg.to_bool(value);
        acc = Some(match acc {
            None => truth,
            Some(prev) => cg.state().binary(BinOp::And, prev, truth),
        });
    }
    Ok(match acc {
        Some(v) => v,
        None => cg.state().bool_const(true),
    })
}

/// Per-row contribution of a target: its value, the aggregate argument, or
/// 1 for `COUNT(*)`.
fn codegen_target(cg: &mut CodeGenerator<'_>, arena: &ExprArena, target: ExprId) -> Result<ValueId> {
    match arena.as_agg(target) {
        None => cg.codegen(target),
        Some(agg) => match agg.arg {
            Some(arg) => cg.codegen(arg),
            None if agg.kind == AggKind::Count => Ok(cg.state().iconst(IrType::I64, 1)),
            None => Err(Error::InvalidArgumentError(format!(
                "{} without an argument",
                agg.kind
            ))),
        },
    }
}

/// Bit pattern of `value` in an `i64` slot: integers sign-extended
/// (`i1` zero-extended), floats by their IEEE bits.
fn encode_i64(cg: &mut CodeGenerator<'_>, value: ValueId) -> Result<ValueId> {
    let state = cg.state();
    Ok(match state.value_type(value) {
        IrType::I1 => state.cast(CastOp::ZExt, value, IrType::I64),
        IrType::I8 | IrType::I16 | IrType::I32 => state.cast(CastOp::SExt, value, IrType::I64),
        IrType::I64 => value,
        IrType::F32 => {
            let bits = state.cast(CastOp::Bitcast, value, IrType::I32);
            state.cast(CastOp::ZExt, bits, IrType::I64)
        }
        IrType::F64 => state.cast(CastOp::Bitcast, value, IrType::I64),
        other => {
            return Err(Error::unsupported(format!("projecting a value of type {other}")));
        }
    })
}
