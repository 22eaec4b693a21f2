use std::sync::Arc;

use arrow::array::{ArrayRef, Int32Array, Int64Array};
use vexc::{
    AggKind, BinaryOp, ColumnBuffers, ColumnData, CompilationOptions, CompilerConfig,
    DateaddField, DatetruncField, Datum, ERR_DIV_BY_ZERO, Error, ExecutionUnit,
    ExecutorDeviceType, ExplainType, ExprArena, ExtractField, GpuCompilationContext, GpuTarget,
    QueryCompiler, QueryDescriptionType, QueryMemoryDescriptor, ROW_FILTERED, ROW_PASSED,
    TimeUnit, TypeContext, TypeRef,
};
use vexc_test_utils::init_tracing_for_tests;

fn cpu() -> CompilationOptions {
    CompilationOptions::defaults(ExecutorDeviceType::Cpu)
}

fn gpu() -> CompilationOptions {
    CompilationOptions::defaults(ExecutorDeviceType::Gpu)
}

fn projection(slots: usize) -> QueryMemoryDescriptor {
    (0..slots).fold(
        QueryMemoryDescriptor::new(QueryDescriptionType::Projection, 8),
        |desc, _| desc.with_slot(8),
    )
}

#[test]
fn filtered_projection_over_arrow_input() {
    init_tracing_for_tests();
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let x = arena.column_var(ctx.int64(true), 1, 1);
    let y = arena.column_var(ctx.int32(false), 1, 2);
    let zero = arena.constant(ctx.int32(false), Datum::Int(0));
    let positive = arena.boolean_op(BinaryOp::Gt, y, zero);
    let wide_y = arena.cast(ctx.int64(false), y);
    let sum = arena.arith(BinaryOp::Plus, x, wide_y);
    let unit = ExecutionUnit {
        quals: vec![positive],
        target_exprs: vec![sum],
        ..Default::default()
    };

    let compiler = QueryCompiler::default();
    let query = compiler.compile(&arena, &unit, &projection(1), &cpu()).unwrap();
    assert_eq!(query.device_type(), ExecutorDeviceType::Cpu);
    assert_eq!(query.init_agg_vals, vec![0]);
    assert!(!query.target_infos[0].is_agg);

    // Slot order follows the first read during codegen.
    let types = query.input_types();
    let mut arrays: Vec<ArrayRef> = Vec::new();
    for input in &query.routine().input_columns {
        match input.column.column_id {
            1 => arrays.push(Arc::new(Int64Array::from(vec![Some(10), None, Some(30)]))),
            _ => arrays.push(Arc::new(Int32Array::from(vec![1, 2, -3]))),
        }
    }
    let buffers = ColumnBuffers::from_arrays(&arrays, &types).unwrap();
    let rows = query.run(&buffers).unwrap();
    assert_eq!(rows[0].status, ROW_PASSED);
    assert_eq!(rows[0].out, vec![11]);
    assert_eq!(rows[1].out, vec![i64::MIN]);
    assert_eq!(rows[2].status, ROW_FILTERED);
}

#[test]
fn ungrouped_aggregates_start_at_null_or_zero() {
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let x = arena.column_var(ctx.int64(true), 1, 1);
    let sum = arena.agg(ctx.int64(true), AggKind::Sum, Some(x), false);
    let count = arena.agg(ctx.int64(false), AggKind::Count, None, false);
    let unit = ExecutionUnit {
        target_exprs: vec![sum, count],
        ..Default::default()
    };
    let layout = QueryMemoryDescriptor::new(QueryDescriptionType::NonGroupedAggregate, 8)
        .with_slot(8)
        .with_slot(8);

    let query = QueryCompiler::default()
        .compile(&arena, &unit, &layout, &cpu())
        .unwrap();
    assert_eq!(query.init_agg_vals, vec![i64::MIN, 0]);
    assert!(query.target_infos.iter().all(|t| t.is_agg));

    let mut buffers = ColumnBuffers::new(2);
    buffers
        .push(ColumnData::from_ints(ctx.int64(true), &[Some(4), None]).unwrap())
        .unwrap();
    let rows = query.run(&buffers).unwrap();
    assert_eq!(rows[0].out, vec![4, 1]);
    assert_eq!(rows[1].out, vec![i64::MIN, 1]);
}

#[test]
fn not_null_filters_tighten_grouped_initial_values() {
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let x = arena.column_var(ctx.int32(true), 1, 1);
    let max = arena.agg(ctx.int32(true), AggKind::Max, Some(x), false);
    let not_null = arena.is_not_null(x);
    let layout = QueryMemoryDescriptor::new(QueryDescriptionType::GroupByPerfectHash, 8).with_slot(8);
    let compiler = QueryCompiler::default();

    let open = ExecutionUnit {
        target_exprs: vec![max],
        ..Default::default()
    };
    let query = compiler.compile(&arena, &open, &layout, &cpu()).unwrap();
    assert_eq!(query.init_agg_vals, vec![i32::MIN as i64]);

    let filtered = ExecutionUnit {
        quals: vec![not_null],
        target_exprs: vec![max],
        ..Default::default()
    };
    let query = compiler.compile(&arena, &filtered, &layout, &cpu()).unwrap();
    assert!(!query.target_infos[0].ty.nullable());
    assert_eq!(query.init_agg_vals, vec![i64::MIN]);
}

#[test]
fn division_errors_surface_as_row_status() {
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let x = arena.column_var(ctx.int64(false), 1, 1);
    let y = arena.column_var(ctx.int64(false), 1, 2);
    let div = arena.arith(BinaryOp::Divide, x, y);
    let unit = ExecutionUnit {
        target_exprs: vec![div],
        ..Default::default()
    };
    let query = QueryCompiler::default()
        .compile(&arena, &unit, &projection(1), &cpu())
        .unwrap();

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(vec![8, 8])),
        Arc::new(Int64Array::from(vec![2, 0])),
    ];
    let buffers = ColumnBuffers::from_arrays(&arrays, &query.input_types()).unwrap();
    let rows = query.run(&buffers).unwrap();
    assert_eq!(rows[0].out, vec![4]);
    assert_eq!(rows[1].status, ERR_DIV_BY_ZERO);
}

#[test]
fn gpu_without_a_device_falls_back_to_cpu() {
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let x = arena.column_var(ctx.int64(false), 1, 1);
    let unit = ExecutionUnit {
        target_exprs: vec![x],
        ..Default::default()
    };
    let compiler = QueryCompiler::default();

    let err = compiler
        .compile(&arena, &unit, &projection(1), &gpu())
        .unwrap_err();
    assert!(matches!(err, Error::Backend(_)), "{err:?}");

    let query = compiler
        .compile_or_fallback(&arena, &unit, &projection(1), &gpu())
        .unwrap();
    assert_eq!(query.device_type(), ExecutorDeviceType::Cpu);
}

#[test]
fn gpu_aggregates_reserve_shared_memory() {
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let x = arena.column_var(ctx.int64(false), 1, 1);
    let sum = arena.agg(ctx.int64(false), AggKind::Sum, Some(x), false);
    let unit = ExecutionUnit {
        target_exprs: vec![sum],
        ..Default::default()
    };
    let layout = QueryMemoryDescriptor::new(QueryDescriptionType::NonGroupedAggregate, 8).with_slot(8);
    let compiler = QueryCompiler::default().with_gpu_target(GpuTarget::new(8, 6).with_block_size(128));

    let query = compiler.compile(&arena, &unit, &layout, &gpu()).unwrap();
    assert_eq!(query.device_type(), ExecutorDeviceType::Gpu);
    let kernel = query.context.downcast_ref::<GpuCompilationContext>().unwrap();
    assert_eq!(kernel.shared_memory_bytes(), 8 * 128);
    assert!(kernel.ptx().contains(".target sm_86"));

    // Without a device to launch on, the host evaluates the routine.
    let mut buffers = ColumnBuffers::new(1);
    buffers
        .push(ColumnData::from_ints(ctx.int64(false), &[Some(7)]).unwrap())
        .unwrap();
    assert_eq!(query.run(&buffers).unwrap()[0].out, vec![7]);
}

#[test]
fn host_only_functions_fall_back_from_gpu() {
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let x = arena.column_var(ctx.fp64(false), 1, 1);
    let ln = arena.function(ctx.fp64(false), "ln", vec![x]);
    let unit = ExecutionUnit {
        target_exprs: vec![ln],
        ..Default::default()
    };
    let compiler = QueryCompiler::default().with_gpu_target(GpuTarget::new(8, 0));

    let err = compiler
        .compile(&arena, &unit, &projection(1), &gpu())
        .unwrap_err();
    assert!(matches!(err, Error::ExtensionFunctionBinding(_)), "{err:?}");
    let query = compiler
        .compile_or_fallback(&arena, &unit, &projection(1), &gpu())
        .unwrap();
    assert_eq!(query.device_type(), ExecutorDeviceType::Cpu);
    assert_eq!(query.routine().extensions[0].symbol, "ln_f64");
}

#[test]
fn explain_logs_truncated_ir() {
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let x = arena.column_var(ctx.int32(true), 1, 1);
    let y = arena.column_var(ctx.int32(true), 1, 2);
    let lt = arena.boolean_op(BinaryOp::Lt, x, y);
    let unit = ExecutionUnit {
        target_exprs: vec![lt],
        ..Default::default()
    };
    let config = CompilerConfig::default().with_max_log_length(16);
    let compiler = QueryCompiler::new(config);
    let mut options = cpu();
    options.explain_type = ExplainType::Optimized;

    let query = compiler.compile(&arena, &unit, &projection(1), &options).unwrap();
    let ir = query.routine().func.to_string();
    assert!(ir.len() > 16);
    assert_eq!(compiler.config().truncate_for_log(&ir).len(), 16);
}

#[test]
fn unsupported_expressions_are_not_retried() {
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let s = arena.column_var(ctx.ext_dict(ctx.text(true), 1, 4), 1, 1);
    let pattern = arena.constant(ctx.text(false), Datum::Str("a%".into()));
    let like = arena.like(s, pattern, true);
    let unit = ExecutionUnit {
        quals: vec![like],
        ..Default::default()
    };
    let err = QueryCompiler::default()
        .compile_or_fallback(&arena, &unit, &projection(0), &cpu())
        .unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)), "{err:?}");
}

fn run_cast(from: TypeRef, to: TypeRef, values: &[Option<i64>]) -> vexc::Result<Vec<i64>> {
    let mut arena = ExprArena::new();
    let x = arena.column_var(from, 1, 1);
    let cast = arena.cast(to, x);
    let unit = ExecutionUnit {
        target_exprs: vec![cast],
        ..Default::default()
    };
    let query = QueryCompiler::default().compile(&arena, &unit, &projection(1), &cpu())?;
    let mut buffers = ColumnBuffers::new(values.len());
    buffers.push(ColumnData::from_ints(from, values)?)?;
    Ok(query.run(&buffers)?.into_iter().map(|row| row.out[0]).collect())
}

#[test]
fn timestamp_precision_scales_up() {
    let ctx = TypeContext::global();
    let secs = ctx.timestamp(TimeUnit::Second, false);
    let epochs = [Some(1_600_000_000), Some(-1)];
    for (unit, scale) in [
        (TimeUnit::Milli, 1_000),
        (TimeUnit::Micro, 1_000_000),
        (TimeUnit::Nano, 1_000_000_000),
    ] {
        let scaled = run_cast(secs, ctx.timestamp(unit, false), &epochs).unwrap();
        assert_eq!(scaled, vec![1_600_000_000 * scale, -scale], "{unit:?}");
    }
}

#[test]
fn timestamp_scale_up_out_of_range_is_an_error() {
    init_tracing_for_tests();
    let ctx = TypeContext::global();
    let secs = ctx.timestamp(TimeUnit::Second, false);
    let nanos = ctx.timestamp(TimeUnit::Nano, false);
    for epoch in [i64::MAX / 10, i64::MIN / 10] {
        let err = run_cast(secs, nanos, &[Some(0), Some(epoch)]).unwrap_err();
        assert!(matches!(err, Error::NumericOverflow(_)), "{err:?}");
    }

    // Largest value that still fits.
    let millis = ctx.timestamp(TimeUnit::Milli, false);
    let edge = i64::MAX / 1_000;
    assert_eq!(run_cast(secs, millis, &[Some(edge)]).unwrap(), vec![edge * 1_000]);

    // Nulls are never scaled.
    let scaled = run_cast(
        ctx.timestamp(TimeUnit::Second, true),
        ctx.timestamp(TimeUnit::Nano, true),
        &[None, Some(2)],
    )
    .unwrap();
    assert_eq!(scaled, vec![i64::MIN, 2_000_000_000]);
}

#[test]
fn timestamp_scale_down_truncates_negative_epochs() {
    let ctx = TypeContext::global();
    let millis = ctx.timestamp(TimeUnit::Milli, false);
    let secs = ctx.timestamp(TimeUnit::Second, false);
    let scaled = run_cast(millis, secs, &[Some(-1_500), Some(-999), Some(1_500)]).unwrap();
    assert_eq!(scaled, vec![-1, 0, 1]);

    let nanos = ctx.timestamp(TimeUnit::Nano, false);
    let micros = ctx.timestamp(TimeUnit::Micro, false);
    assert_eq!(run_cast(nanos, micros, &[Some(-1_500)]).unwrap(), vec![-1]);
}

#[test]
fn timestamp_to_date_floors_before_the_epoch() {
    let ctx = TypeContext::global();
    let date = ctx.date64(TimeUnit::Second, false);
    let secs = ctx.timestamp(TimeUnit::Second, false);
    let days =
        run_cast(secs, date, &[Some(-1), Some(-86_400), Some(-86_401), Some(86_399)]).unwrap();
    assert_eq!(days, vec![-86_400, -86_400, -172_800, 0]);

    // One millisecond before midnight is still the previous day.
    let millis = ctx.timestamp(TimeUnit::Milli, false);
    assert_eq!(run_cast(millis, date, &[Some(-1)]).unwrap(), vec![-86_400]);
}

#[test]
fn calendar_functions_run_through_the_jit() {
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let ts = arena.column_var(ctx.timestamp(TimeUnit::Milli, true), 1, 1);
    let year = arena.extract(ExtractField::Year, ts);
    let month_start = arena.datetrunc(DatetruncField::Month, ts);
    let one = arena.constant(ctx.int32(false), Datum::Int(1));
    let next_month = arena.date_add(DateaddField::Month, one, ts);
    let days = arena.date_diff(DateaddField::Day, ts, next_month);
    let unit = ExecutionUnit {
        target_exprs: vec![year, month_start, next_month, days],
        ..Default::default()
    };
    let query = QueryCompiler::default()
        .compile(&arena, &unit, &projection(4), &cpu())
        .unwrap();

    // 1969-01-31 12:00:00.250 and a null.
    let millis = -28_900_799_750;
    let mut buffers = ColumnBuffers::new(2);
    buffers
        .push(
            ColumnData::from_ints(ctx.timestamp(TimeUnit::Milli, true), &[Some(millis), None])
                .unwrap(),
        )
        .unwrap();
    let rows = query.run(&buffers).unwrap();
    // 1969-01-01 and 1969-02-28 12:00:00.250.
    assert_eq!(rows[0].out, vec![1969, -31_536_000_000, -26_481_599_750, 28]);
    assert_eq!(rows[1].out, vec![i64::MIN; 4]);
    assert_eq!(rows, query.routine().interpret(&buffers).unwrap());
}
