//! Static selectivity and cost estimates used to order predicate evaluation.

use std::ops::{Add, Div, Mul, Sub};

use vexc_expr::{BinaryOp, ExprArena, ExprByPredicateCollector, ExprId, ExprKind, UnaryOp};

/// A value that may be unknown.
///
/// Arithmetic between two estimates keeps whichever side is known when the
/// other is not; only two unknowns combine to unknown. Scalar arithmetic on
/// an unknown stays unknown, and comparisons against an unknown are false.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Estimate<T>(Option<T>);

/// Probability that a predicate holds.
pub type Likelihood = Estimate<f64>;
/// Relative evaluation cost.
pub type Weight = Estimate<i64>;

impl<T: Copy + PartialOrd> Estimate<T> {
    pub fn new(value: T) -> Self {
        Estimate(Some(value))
    }

    pub fn invalid() -> Self {
        Estimate(None)
    }

    pub fn is_invalid(&self) -> bool {
        self.0.is_none()
    }

    pub fn value(&self) -> Option<T> {
        self.0
    }

    pub fn lt(&self, bound: T) -> bool {
        self.0.is_some_and(|v| v < bound)
    }

    pub fn gt(&self, bound: T) -> bool {
        self.0.is_some_and(|v| v > bound)
    }

    fn combine(self, other: Self, f: impl FnOnce(T, T) -> T) -> Self {
        match (self.0, other.0) {
            (Some(a), Some(b)) => Estimate(Some(f(a, b))),
            (Some(a), None) | (None, Some(a)) => Estimate(Some(a)),
            (None, None) => Estimate(None),
        }
    }
}

impl<T: Copy + PartialOrd + Add<Output = T>> Add for Estimate<T> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.combine(rhs, |a, b| a + b)
    }
}

impl<T: Copy + PartialOrd + Sub<Output = T>> Sub for Estimate<T> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.combine(rhs, |a, b| a - b)
    }
}

impl<T: Copy + PartialOrd + Mul<Output = T>> Mul for Estimate<T> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        self.combine(rhs, |a, b| a * b)
    }
}

impl<T: Copy + Add<Output = T>> Add<T> for Estimate<T> {
    type Output = Self;

    fn add(self, rhs: T) -> Self {
        Estimate(self.0.map(|v| v + rhs))
    }
}

impl<T: Copy + Div<Output = T>> Div<T> for Estimate<T> {
    type Output = Self;

    fn div(self, rhs: T) -> Self {
        Estimate(self.0.map(|v| v / rhs))
    }
}

fn is_unsafe_division(arena: &ExprArena, id: ExprId) -> bool {
    let Some(bin) = arena.as_bin_oper(id) else {
        return false;
    };
    if bin.op != BinaryOp::Divide {
        return false;
    }
    match arena.as_constant(bin.right) {
        None => true,
        Some(constant) => constant.value.is_null() || constant.value.is_zero(),
    }
}

/// Whether `id` contains a division whose divisor may be zero: anything but
/// a non-null, non-zero literal.
pub fn contains_unsafe_division(arena: &ExprArena, id: ExprId) -> bool {
    !ExprByPredicateCollector::collect(arena, id, is_unsafe_division).is_empty()
}

/// Whether a predicate is expensive or hazardous enough to evaluate only
/// after cheaper ones passed.
pub fn should_defer_eval(arena: &ExprArena, id: ExprId) -> bool {
    match arena.kind(id) {
        ExprKind::Like(_) | ExprKind::Regexp(_) | ExprKind::FunctionOper(_) => true,
        ExprKind::BinOper(bin) => {
            contains_unsafe_division(arena, id) || arena.ty(bin.right).is_array()
        }
        _ => false,
    }
}

/// Estimated probability that `id` is true.
pub fn get_likelihood(arena: &ExprArena, id: ExprId) -> Likelihood {
    let truth = Likelihood::new(1.0);
    match arena.kind(id) {
        ExprKind::Likelihood(hint) => Likelihood::new(hint.likelihood as f64),
        ExprKind::UOper(uoper) => {
            let operand = get_likelihood(arena, uoper.operand);
            if operand.is_invalid() {
                return Likelihood::invalid();
            }
            if uoper.op == UnaryOp::Not {
                truth - operand
            } else {
                operand
            }
        }
        ExprKind::BinOper(bin) => {
            let lhs = get_likelihood(arena, bin.left);
            let rhs = get_likelihood(arena, bin.right);
            if lhs.is_invalid() && rhs.is_invalid() {
                return Likelihood::invalid();
            }
            match bin.op {
                BinaryOp::Or => {
                    let both_false = (truth - lhs) * (truth - rhs);
                    truth - both_false
                }
                BinaryOp::And => lhs * rhs,
                _ => (lhs + rhs) / 2.0,
            }
        }
        _ => Likelihood::invalid(),
    }
}

/// Estimated cost of evaluating `id`. Cheap leaves near the root are
/// unknown; only pattern matches, array comparisons and deep trees carry
/// a weight.
pub fn get_weight(arena: &ExprArena, id: ExprId, depth: u32) -> Weight {
    match arena.kind(id) {
        ExprKind::Like(like) => Weight::new(if like.is_simple { 200 } else { 1000 }),
        ExprKind::Regexp(_) => Weight::new(2000),
        ExprKind::UOper(uoper) => get_weight(arena, uoper.operand, depth + 1) + 1,
        ExprKind::BinOper(bin) => {
            let lhs = get_weight(arena, bin.left, depth + 1);
            let mut rhs = get_weight(arena, bin.right, depth + 1);
            if arena.ty(bin.right).is_array() {
                rhs = rhs + Weight::new(100);
            }
            (lhs + rhs) + 1
        }
        _ if depth > 4 => Weight::new(1),
        _ => Weight::invalid(),
    }
}
