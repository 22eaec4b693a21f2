//! vexc: expression compilation for columnar query execution.
//!
//! This crate is the entrypoint of the vexc workspace. It re-exports the
//! expression model, the row routine compiler and the native backends, and
//! ties them together in [`QueryCompiler`].
//!
//! # Quick Start
//!
//! Compile `SELECT x + 1 FROM t WHERE x > 10` for the CPU and run it:
//!
//! ```rust
//! use vexc::{
//!     BinaryOp, ColumnBuffers, ColumnData, CompilationOptions, CompilerConfig, Datum,
//!     ExecutionUnit, ExecutorDeviceType, ExprArena, QueryCompiler, QueryDescriptionType,
//!     QueryMemoryDescriptor, TypeContext,
//! };
//!
//! let ctx = TypeContext::global();
//! let mut arena = ExprArena::new();
//! let x = arena.column_var(ctx.int64(true), 1, 1);
//! let ten = arena.constant(ctx.int64(false), Datum::Int(10));
//! let one = arena.constant(ctx.int64(false), Datum::Int(1));
//! let filter = arena.boolean_op(BinaryOp::Gt, x, ten);
//! let next = arena.arith(BinaryOp::Plus, x, one);
//! let unit = ExecutionUnit {
//!     quals: vec![filter],
//!     target_exprs: vec![next],
//!     ..Default::default()
//! };
//!
//! let layout = QueryMemoryDescriptor::new(QueryDescriptionType::Projection, 8).with_slot(8);
//! let options = CompilationOptions::defaults(ExecutorDeviceType::Cpu);
//! let compiler = QueryCompiler::new(CompilerConfig::default());
//! let query = compiler.compile(&arena, &unit, &layout, &options).unwrap();
//!
//! let mut buffers = ColumnBuffers::new(2);
//! buffers
//!     .push(ColumnData::from_ints(ctx.int64(true), &[Some(5), Some(41)]).unwrap())
//!     .unwrap();
//! let rows = query.run(&buffers).unwrap();
//! assert!(!rows[0].passed());
//! assert_eq!(rows[1].out, vec![42]);
//! ```
//!
//! # Architecture
//!
//! - **Types** (`vexc-types`): interned SQL types, null sentinels, datetime scaling.
//! - **Expressions** (`vexc-expr`): arena-allocated expression trees, visitors, SQL text.
//! - **Codegen** (`vexc-codegen`): three-valued IR generation, qual ordering, the interpreter.
//! - **Aggregates** (`vexc-aggregate`): result slot widths and initial values.
//! - **Backends** (`vexc-backend`): Cranelift JIT for the CPU, PTX for the GPU.

mod compiler;

pub use compiler::{CompiledQuery, QueryCompiler};

pub use vexc_aggregate::{
    QueryDescriptionType, QueryMemoryDescriptor, QueryMemoryLayout, init_agg_val_vec,
    target_infos_for_exprs,
};
pub use vexc_backend::{
    Backend, CompilationContext, CpuCompilationContext, GpuCompilationContext, GpuTarget,
    KERNEL_ENTRY_NAME, get_backend,
};
pub use vexc_codegen::{
    ColumnBuffers, ColumnData, CompilationOptions, CompilerConfig, ERR_DIV_BY_ZERO,
    ERR_OVERFLOW_OR_UNDERFLOW, ExecutorDeviceType, ExplainType, ExtensionFunction, ExtensionImpl,
    ExtensionRegistry, ROW_FILTERED, ROW_PASSED, RoutineModule, RowOutput,
    compile_execution_unit,
};
pub use vexc_expr::{AggKind, BinaryOp, ExecutionUnit, ExprArena, ExprId, TargetInfo};
pub use vexc_result::{Error, Result};
pub use vexc_types::datetime::{DateaddField, DatetruncField, ExtractField};
pub use vexc_types::{Datum, TimeUnit, Type, TypeContext, TypeRef};
