use std::hint::black_box;
use std::sync::Arc;

use arrow::array::{ArrayRef, Int32Array, Int64Array};
use criterion::{Criterion, criterion_group, criterion_main};
use vexc::{
    BinaryOp, ColumnBuffers, CompilationOptions, CompiledQuery, Datum, ExecutionUnit,
    ExecutorDeviceType, ExprArena, QueryCompiler, QueryDescriptionType, QueryMemoryDescriptor,
    TypeContext,
};

const NUM_ROWS: usize = 100_000;

/// `SELECT a * 3 + b FROM t WHERE b % 7 <> 0 AND a > 100 OR b IS NULL`
fn compile_query() -> CompiledQuery {
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let a = arena.column_var(ctx.int64(false), 1, 1);
    let b = arena.column_var(ctx.int32(true), 1, 2);
    let seven = arena.constant(ctx.int32(false), Datum::Int(7));
    let zero = arena.constant(ctx.int32(false), Datum::Int(0));
    let hundred = arena.constant(ctx.int64(false), Datum::Int(100));
    let three = arena.constant(ctx.int64(false), Datum::Int(3));

    let rem = arena.arith(BinaryOp::Modulo, b, seven);
    let not_multiple = arena.boolean_op(BinaryOp::Ne, rem, zero);
    let big = arena.boolean_op(BinaryOp::Gt, a, hundred);
    let both = arena.and(not_multiple, big);
    let missing = arena.is_null(b);
    let filter = arena.or(both, missing);
    let scaled = arena.arith(BinaryOp::Multiply, a, three);
    let wide_b = arena.cast(ctx.int64(true), b);
    let target = arena.arith(BinaryOp::Plus, scaled, wide_b);

    let unit = ExecutionUnit {
        quals: vec![filter],
        target_exprs: vec![target],
        ..Default::default()
    };
    let layout = QueryMemoryDescriptor::new(QueryDescriptionType::Projection, 8).with_slot(8);
    let options = CompilationOptions::defaults(ExecutorDeviceType::Cpu);
    QueryCompiler::default()
        .compile(&arena, &unit, &layout, &options)
        .unwrap()
}

fn input(query: &CompiledQuery) -> ColumnBuffers {
    let arrays: Vec<ArrayRef> = query
        .routine()
        .input_columns
        .iter()
        .map(|input| -> ArrayRef {
            match input.column.column_id {
                1 => Arc::new(Int64Array::from_iter_values(0..NUM_ROWS as i64)),
                _ => Arc::new(Int32Array::from_iter(
                    (0..NUM_ROWS as i32).map(|i| (i % 13 != 0).then_some(i)),
                )),
            }
        })
        .collect();
    ColumnBuffers::from_arrays(&arrays, &query.input_types()).unwrap()
}

fn bench_row_routine(c: &mut Criterion) {
    let query = compile_query();
    let buffers = input(&query);

    let mut group = c.benchmark_group("row_routine");
    group.sample_size(20);
    group.bench_function("jit", |b| {
        b.iter(|| black_box(query.run(black_box(&buffers)).unwrap()))
    });
    group.bench_function("interpreter", |b| {
        b.iter(|| black_box(query.routine().interpret(black_box(&buffers)).unwrap()))
    });
    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile_query", |b| b.iter(|| black_box(compile_query())));
}

criterion_group!(benches, bench_row_routine, bench_compile);
criterion_main!(benches);
