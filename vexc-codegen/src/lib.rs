//! Lowering of vexc expression trees into row routines.
//!
//! [`compile_execution_unit`] turns the quals and targets of an
//! [`ExecutionUnit`](vexc_expr::ExecutionUnit) into one SSA [`Function`]:
//! filters are ordered by their estimated selectivity and cost, nullable
//! values follow SQL three-valued logic through inline null sentinels and
//! divisions are guarded so a zero divisor surfaces as a status code. The
//! result is lowered to native code by `vexc-backend` or executed directly
//! by the [`Interpreter`].

pub mod buffers;
pub mod cgen_state;
pub mod codegen;
pub mod estimates;
pub mod extensions;
pub mod interp;
pub mod ir;
pub mod options;
pub mod quals;
pub mod routine;
pub mod runtime;

pub use buffers::{ColumnBuffers, ColumnData, storage_ir_type};
pub use cgen_state::{CgenState, FetchCacheAnchor, InputColumn};
pub use codegen::{CodeGenerator, value_ir_type};
pub use estimates::{Likelihood, Weight, get_likelihood, get_weight};
pub use extensions::{ExtensionFunction, ExtensionImpl, ExtensionRegistry};
pub use interp::{Interpreter, Scalar};
pub use ir::{Function, Inst, IrType, RuntimeFn, Terminator};
pub use options::{CompilationOptions, CompilerConfig, ExecutorDeviceType, ExplainType};
pub use quals::{PrioritizedQuals, prioritize_quals};
pub use routine::{RoutineModule, RowOutput, compile_execution_unit};
pub use runtime::{ERR_DIV_BY_ZERO, ERR_OVERFLOW_OR_UNDERFLOW, ROW_FILTERED, ROW_PASSED};
