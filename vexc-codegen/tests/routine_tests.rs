use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vexc_codegen::{
    ColumnBuffers, ColumnData, CompilationOptions, ERR_DIV_BY_ZERO, ExecutorDeviceType,
    ExtensionRegistry, ROW_FILTERED, ROW_PASSED, RoutineModule, compile_execution_unit,
};
use vexc_expr::{BinaryOp, ExecutionUnit, ExprArena, ExprId};
use vexc_result::Error;
use vexc_test_utils::{init_tracing_for_tests, nullable_sequence};
use vexc_types::{Datum, TypeContext};

const NULL_BOOL: i64 = i8::MIN as i64;

fn bool_cell(v: Option<bool>) -> i64 {
    v.map_or(NULL_BOOL, i64::from)
}

fn compile(arena: &ExprArena, unit: &ExecutionUnit) -> RoutineModule {
    let options = CompilationOptions::defaults(ExecutorDeviceType::Cpu);
    compile_execution_unit(arena, unit, &options, &ExtensionRegistry::with_builtins()).unwrap()
}

/// Column buffers in the slot order the routine reads them.
fn bind(routine: &RoutineModule, num_rows: usize, mut cols: Vec<(i32, ColumnData)>) -> ColumnBuffers {
    let mut buffers = ColumnBuffers::new(num_rows);
    for input in &routine.input_columns {
        let at = cols
            .iter()
            .position(|(id, _)| *id == input.column.column_id)
            .unwrap_or_else(|| panic!("no data for column {}", input.column.column_id));
        buffers.push(cols.swap_remove(at).1).unwrap();
    }
    buffers
}

fn project(targets: Vec<ExprId>) -> ExecutionUnit {
    ExecutionUnit {
        target_exprs: targets,
        ..Default::default()
    }
}

fn or3(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

fn and3(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

const TRUTH: [Option<bool>; 3] = [Some(true), Some(false), None];

/// Every pair of truth values, as parallel columns.
fn truth_pairs() -> (Vec<Option<bool>>, Vec<Option<bool>>) {
    let mut lhs = Vec::new();
    let mut rhs = Vec::new();
    for a in TRUTH {
        for b in TRUTH {
            lhs.push(a);
            rhs.push(b);
        }
    }
    (lhs, rhs)
}

#[test]
fn eager_logic_follows_three_valued_truth_tables() {
    init_tracing_for_tests();
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let a = arena.column_var(ctx.boolean(true), 1, 1);
    let b = arena.column_var(ctx.boolean(true), 1, 2);
    let and = arena.and(a, b);
    let or = arena.or(a, b);
    let not = arena.not(a);
    let routine = compile(&arena, &project(vec![and, or, not]));
    assert!(!routine.short_circuit());

    let (lhs, rhs) = truth_pairs();
    let buffers = bind(
        &routine,
        lhs.len(),
        vec![(1, ColumnData::from_bools(&lhs)), (2, ColumnData::from_bools(&rhs))],
    );
    let rows = routine.interpret(&buffers).unwrap();
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row.status, ROW_PASSED);
        let (l, r) = (lhs[i], rhs[i]);
        assert_eq!(row.out[0], bool_cell(and3(l, r)), "{l:?} AND {r:?}");
        assert_eq!(row.out[1], bool_cell(or3(l, r)), "{l:?} OR {r:?}");
        assert_eq!(row.out[2], bool_cell(l.map(|v| !v)), "NOT {l:?}");
    }
}

/// `x / y > 0` with `y = 1` yields true, false or null from `x` alone.
fn division_comparison(arena: &mut ExprArena) -> ExprId {
    let ctx = TypeContext::global();
    let x = arena.column_var(ctx.int32(true), 1, 2);
    let y = arena.column_var(ctx.int32(false), 1, 3);
    let zero = arena.constant(ctx.int32(false), Datum::Int(0));
    let div = arena.arith(BinaryOp::Divide, x, y);
    arena.boolean_op(BinaryOp::Gt, div, zero)
}

fn encode_truth(v: Option<bool>) -> Option<i64> {
    v.map(|b| if b { 1 } else { -1 })
}

#[test]
fn short_circuit_logic_matches_the_eager_tables() {
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let a = arena.column_var(ctx.boolean(true), 1, 1);
    let cmp = division_comparison(&mut arena);
    let and = arena.and(a, cmp);
    let or = arena.or(a, cmp);
    let routine = compile(&arena, &project(vec![and, or]));

    let (lhs, rhs) = truth_pairs();
    let xs: Vec<Option<i64>> = rhs.iter().map(|v| encode_truth(*v)).collect();
    let ones = vec![Some(1); lhs.len()];
    let buffers = bind(
        &routine,
        lhs.len(),
        vec![
            (1, ColumnData::from_bools(&lhs)),
            (2, ColumnData::from_ints(ctx.int32(true), &xs).unwrap()),
            (3, ColumnData::from_ints(ctx.int32(false), &ones).unwrap()),
        ],
    );

    let rows = routine.interpret(&buffers).unwrap();
    for (i, row) in rows.iter().enumerate() {
        let (l, r) = (lhs[i], rhs[i]);
        assert_eq!(row.status, ROW_PASSED);
        assert_eq!(row.out[0], bool_cell(and3(l, r)), "{l:?} AND {r:?}");
        assert_eq!(row.out[1], bool_cell(or3(l, r)), "{l:?} OR {r:?}");
    }
}

#[test]
fn decided_operand_skips_the_division() {
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let a = arena.column_var(ctx.boolean(false), 1, 1);
    let cmp = division_comparison(&mut arena);
    let or = arena.or(a, cmp);
    let routine = compile(&arena, &project(vec![or]));

    let buffers = bind(
        &routine,
        2,
        vec![
            (1, ColumnData::from_bools(&[Some(true), Some(false)])),
            (2, ColumnData::from_ints(ctx.int32(true), &[Some(7), Some(7)]).unwrap()),
            (3, ColumnData::from_ints(ctx.int32(false), &[Some(0), Some(0)]).unwrap()),
        ],
    );
    let rows = routine.interpret(&buffers).unwrap();
    assert_eq!(rows[0].status, ROW_PASSED);
    assert_eq!(rows[0].out, vec![1]);
    assert_eq!(rows[1].status, ERR_DIV_BY_ZERO);
}

#[test]
fn zero_divisor_is_reported_even_for_a_null_dividend() {
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let x = arena.column_var(ctx.int64(true), 1, 1);
    let y = arena.column_var(ctx.int64(false), 1, 2);
    let div = arena.arith(BinaryOp::Divide, x, y);
    let rem = arena.arith(BinaryOp::Modulo, x, y);
    let routine = compile(&arena, &project(vec![div, rem]));

    let xs = [Some(7), None, Some(i64::MIN), Some(-7)];
    let ys = [Some(2), Some(0), Some(-1), Some(2)];
    let buffers = bind(
        &routine,
        4,
        vec![
            (1, ColumnData::from_ints(ctx.int64(true), &xs).unwrap()),
            (2, ColumnData::from_ints(ctx.int64(false), &ys).unwrap()),
        ],
    );
    let rows = routine.interpret(&buffers).unwrap();
    assert_eq!(rows[0].out, vec![3, 1]);
    assert_eq!(rows[1].status, ERR_DIV_BY_ZERO);
    // The row holding the sentinel reads as null, whatever the divisor.
    assert_eq!(rows[2].out, vec![i64::MIN, i64::MIN]);
    assert_eq!(rows[3].out, vec![-3, -1]);
}

#[test]
fn cheap_quals_guard_deferred_divisions() {
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let x = arena.column_var(ctx.int32(false), 1, 1);
    let y = arena.column_var(ctx.int32(false), 1, 2);
    let zero = arena.constant(ctx.int32(false), Datum::Int(0));
    let one = arena.constant(ctx.int32(false), Datum::Int(1));
    let nonzero = arena.boolean_op(BinaryOp::Ne, y, zero);
    let div = arena.arith(BinaryOp::Divide, x, y);
    let big = arena.boolean_op(BinaryOp::Gt, div, one);

    let unit = ExecutionUnit {
        quals: vec![big, nonzero],
        target_exprs: vec![div],
        ..Default::default()
    };
    let routine = compile(&arena, &unit);
    assert_eq!(routine.quals.primary, vec![nonzero]);
    assert_eq!(routine.quals.deferred, vec![big]);

    let xs = [Some(10), Some(10), Some(1)];
    let ys = [Some(0), Some(2), Some(1)];
    let buffers = bind(
        &routine,
        3,
        vec![
            (1, ColumnData::from_ints(ctx.int32(false), &xs).unwrap()),
            (2, ColumnData::from_ints(ctx.int32(false), &ys).unwrap()),
        ],
    );
    let rows = routine.interpret(&buffers).unwrap();
    assert_eq!(rows[0].status, ROW_FILTERED);
    assert_eq!(rows[1].status, ROW_PASSED);
    assert_eq!(rows[1].out, vec![5]);
    assert_eq!(rows[2].status, ROW_FILTERED);
}

#[test]
fn case_and_in_lists() {
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let x = arena.column_var(ctx.int32(true), 1, 1);
    let ten = arena.constant(ctx.int32(false), Datum::Int(10));
    let gt = arena.boolean_op(BinaryOp::Gt, x, ten);
    let is_null = arena.is_null(x);
    let big = arena.constant(ctx.int64(false), Datum::Int(1));
    let missing = arena.constant(ctx.int64(false), Datum::Int(-1));
    let other = arena.constant(ctx.int64(false), Datum::Int(0));
    let case = arena.case(ctx.int64(false), vec![(gt, big), (is_null, missing)], other);

    let values: Vec<ExprId> = [1, 2, 3]
        .into_iter()
        .map(|v| arena.constant(ctx.int32(false), Datum::Int(v)))
        .collect();
    let in_list = arena.in_values(x, values);
    let routine = compile(&arena, &project(vec![case, in_list]));

    let data = ColumnData::from_ints(ctx.int32(true), &[Some(20), None, Some(2)]).unwrap();
    let buffers = bind(&routine, 3, vec![(1, data)]);
    let rows = routine.interpret(&buffers).unwrap();
    assert_eq!(rows[0].out, vec![1, 0]);
    assert_eq!(rows[1].out, vec![-1, NULL_BOOL]);
    assert_eq!(rows[2].out, vec![0, 1]);
}

#[test]
fn casts_between_numbers() {
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let x = arena.column_var(ctx.int32(true), 1, 1);
    let wide = arena.cast(ctx.int64(true), x);
    let double = arena.cast(ctx.fp64(true), x);
    let money = arena.cast(ctx.decimal64(10, 2, true), x);
    let routine = compile(&arena, &project(vec![wide, double, money]));

    let data = ColumnData::from_ints(ctx.int32(true), &[Some(-5), None]).unwrap();
    let buffers = bind(&routine, 2, vec![(1, data)]);
    let rows = routine.interpret(&buffers).unwrap();
    assert_eq!(rows[0].out, vec![-5, (-5.0f64).to_bits() as i64, -500]);
    assert_eq!(
        rows[1].out,
        vec![i64::MIN, f64::MIN_POSITIVE.to_bits() as i64, i64::MIN]
    );
}

#[test]
fn extension_calls_propagate_nulls() {
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let x = arena.column_var(ctx.int64(true), 1, 1);
    let abs = arena.function(ctx.int64(true), "abs", vec![x]);
    let routine = compile(&arena, &project(vec![abs]));
    assert_eq!(routine.extensions.len(), 1);

    let data = ColumnData::from_ints(ctx.int64(true), &[Some(-4), Some(9), None]).unwrap();
    let buffers = bind(&routine, 3, vec![(1, data)]);
    let rows = routine.interpret(&buffers).unwrap();
    let out: Vec<i64> = rows.iter().map(|r| r.out[0]).collect();
    assert_eq!(out, vec![4, 9, i64::MIN]);
}

#[test]
fn cpu_only_functions_do_not_bind_on_gpu() {
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let x = arena.column_var(ctx.fp64(false), 1, 1);
    let ln = arena.function(ctx.fp64(false), "LN", vec![x]);
    let options = CompilationOptions::defaults(ExecutorDeviceType::Gpu);
    let err = compile_execution_unit(
        &arena,
        &project(vec![ln]),
        &options,
        &ExtensionRegistry::with_builtins(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::ExtensionFunctionBinding(_)), "{err:?}");
}

#[test]
fn unsupported_nodes_are_reported() {
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let s = arena.column_var(ctx.ext_dict(ctx.text(true), 1, 4), 1, 1);
    let pattern = arena.constant(ctx.text(false), Datum::Str("a%".into()));
    let like = arena.like(s, pattern, true);
    let options = CompilationOptions::defaults(ExecutorDeviceType::Cpu);
    let err = compile_execution_unit(
        &arena,
        &ExecutionUnit {
            quals: vec![like],
            ..Default::default()
        },
        &options,
        &ExtensionRegistry::with_builtins(),
    )
    .unwrap_err();
    assert!(err.is_fallback_candidate(), "{err:?}");
}

/// Three-valued reference for `(z > 0) OR (x / y > 0)`.
fn reference(z: Option<i64>, x: Option<i64>, y: Option<i64>) -> Option<bool> {
    let lhs = z.map(|z| z > 0);
    let rhs = match (x, y) {
        (Some(x), Some(y)) => Some(x / y > 0),
        _ => None,
    };
    or3(lhs, rhs)
}

#[test]
fn random_rows_agree_with_a_reference_model() {
    let ctx = TypeContext::global();
    let mut arena = ExprArena::new();
    let z = arena.column_var(ctx.int32(true), 1, 1);
    let x = arena.column_var(ctx.int32(true), 1, 2);
    let y = arena.column_var(ctx.int32(true), 1, 3);
    let zero = arena.constant(ctx.int32(false), Datum::Int(0));
    let z_pos = arena.boolean_op(BinaryOp::Gt, z, zero);
    let div = arena.arith(BinaryOp::Divide, x, y);
    let div_pos = arena.boolean_op(BinaryOp::Gt, div, zero);
    let or = arena.or(z_pos, div_pos);
    let sum = arena.arith(BinaryOp::Plus, z, x);
    let routine = compile(&arena, &project(vec![or, sum]));

    let mut rng = StdRng::seed_from_u64(0x5eed);
    let n = 500;
    let zs = nullable_sequence(n, 7, |_| 0);
    let zs: Vec<Option<i64>> = zs
        .into_iter()
        .map(|v| v.map(|_| rng.random_range(-20..20)))
        .collect();
    let xs: Vec<Option<i64>> = (0..n)
        .map(|_| (!rng.random_bool(0.15)).then(|| rng.random_range(-100..100)))
        .collect();
    // Rows whose divisor is zero must be decided by `z` alone.
    let ys: Vec<Option<i64>> = (0..n)
        .map(|i| match zs[i] {
            Some(z) if z > 0 => Some(rng.random_range(-3..=3)),
            _ if rng.random_bool(0.1) => None,
            _ => Some([-3, -2, -1, 1, 2, 3][rng.random_range(0..6)]),
        })
        .collect();

    let cols = [&zs, &xs, &ys]
        .into_iter()
        .zip(1..)
        .map(|(col, id)| (id, ColumnData::from_ints(ctx.int32(true), col).unwrap()))
        .collect();
    let buffers = bind(&routine, n, cols);
    let rows = routine.interpret(&buffers).unwrap();
    for i in 0..n {
        assert_eq!(rows[i].status, ROW_PASSED, "row {i}");
        assert_eq!(
            rows[i].out[0],
            bool_cell(reference(zs[i], xs[i], ys[i])),
            "row {i}: z={:?} x={:?} y={:?}",
            zs[i],
            xs[i],
            ys[i]
        );
        let expected_sum = match (zs[i], xs[i]) {
            (Some(z), Some(x)) => z + x,
            _ => i32::MIN as i64,
        };
        assert_eq!(rows[i].out[1], expected_sum, "row {i}");
    }
}
