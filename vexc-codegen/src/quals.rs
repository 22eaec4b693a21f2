//! Split a unit's filters into quals evaluated up front and quals evaluated
//! only after the first group passed.

use vexc_expr::{ExecutionUnit, ExprArena, ExprId};

use crate::estimates::{contains_unsafe_division, get_likelihood, should_defer_eval};

/// Selectivity below which a general qual gates every later one.
const SHORT_CIRCUIT_LIKELIHOOD: f64 = 0.10;

/// Evaluation order of a unit's filters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrioritizedQuals {
    pub primary: Vec<ExprId>,
    pub deferred: Vec<ExprId>,
    /// A highly selective qual was found; deferred quals run only when the
    /// primary ones pass.
    pub short_circuit: bool,
}

/// Order the unit's quals, skipping the ones already hoisted elsewhere.
///
/// Simple quals are primary unless [`should_defer_eval`] says otherwise.
/// Among general quals the first one that is likely false and free of
/// unsafe division becomes primary and turns every later qual into a
/// deferred one.
pub fn prioritize_quals(arena: &ExprArena, unit: &ExecutionUnit) -> PrioritizedQuals {
    let mut out = PrioritizedQuals::default();

    for &qual in &unit.simple_quals {
        if unit.hoisted.contains(&qual) {
            continue;
        }
        if should_defer_eval(arena, qual) {
            out.deferred.push(qual);
        } else {
            out.primary.push(qual);
        }
    }

    for &qual in &unit.quals {
        if unit.hoisted.contains(&qual) {
            continue;
        }
        if !out.short_circuit
            && get_likelihood(arena, qual).lt(SHORT_CIRCUIT_LIKELIHOOD)
            && !contains_unsafe_division(arena, qual)
        {
            out.primary.push(qual);
            out.short_circuit = true;
            continue;
        }
        if out.short_circuit || should_defer_eval(arena, qual) {
            out.deferred.push(qual);
        } else {
            out.primary.push(qual);
        }
    }

    tracing::debug!(
        primary = out.primary.len(),
        deferred = out.deferred.len(),
        short_circuit = out.short_circuit,
        "prioritized quals"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use vexc_expr::BinaryOp;
    use vexc_types::{Datum, TypeContext};

    struct Fixture {
        arena: ExprArena,
        x: ExprId,
    }

    fn fixture() -> Fixture {
        let mut arena = ExprArena::new();
        let x = arena.column_var(TypeContext::global().int64(true), 1, 1);
        Fixture { arena, x }
    }

    impl Fixture {
        fn cmp(&mut self, value: i64) -> ExprId {
            let c = self
                .arena
                .constant(TypeContext::global().int64(false), Datum::Int(value));
            self.arena.boolean_op(BinaryOp::Gt, self.x, c)
        }

        fn like(&mut self) -> ExprId {
            let ctx = TypeContext::global();
            let s = self.arena.column_var(ctx.ext_dict(ctx.text(true), 1, 4), 1, 2);
            let p = self.arena.constant(ctx.text(false), Datum::Str("a%".into()));
            self.arena.like(s, p, true)
        }
    }

    #[test]
    fn selective_qual_gates_the_rest() {
        let mut f = fixture();
        let c1 = f.cmp(1);
        let q1 = f.arena.likelihood(c1, 0.05);
        let q2 = f.like();
        let c3 = f.cmp(3);
        let q3 = f.arena.likelihood(c3, 0.5);
        let unit = ExecutionUnit {
            quals: vec![q1, q2, q3],
            ..Default::default()
        };
        let out = prioritize_quals(&f.arena, &unit);
        assert_eq!(out.primary, vec![q1]);
        assert_eq!(out.deferred, vec![q2, q3]);
        assert!(out.short_circuit);
    }

    #[test]
    fn without_hints_only_expensive_quals_are_deferred() {
        let mut f = fixture();
        let a = f.cmp(1);
        let like = f.like();
        let b = f.cmp(2);
        let unit = ExecutionUnit {
            simple_quals: vec![a],
            quals: vec![like, b],
            ..Default::default()
        };
        let out = prioritize_quals(&f.arena, &unit);
        assert_eq!(out.primary, vec![a, b]);
        assert_eq!(out.deferred, vec![like]);
        assert!(!out.short_circuit);
    }

    #[test]
    fn unsafe_division_never_gates() {
        let ctx = TypeContext::global();
        let mut f = fixture();
        let zero = f.arena.constant(ctx.int64(false), Datum::Int(0));
        let div = f.arena.arith(BinaryOp::Divide, f.x, zero);
        let one = f.arena.constant(ctx.int64(false), Datum::Int(1));
        let cmp = f.arena.boolean_op(BinaryOp::Eq, div, one);
        let hinted = f.arena.likelihood(cmp, 0.01);
        let unit = ExecutionUnit {
            quals: vec![hinted],
            ..Default::default()
        };
        let out = prioritize_quals(&f.arena, &unit);
        assert!(!out.short_circuit);
        assert_eq!(out.primary, vec![hinted]);

        // Simple quals defer on the unsafe division itself.
        let unit = ExecutionUnit {
            simple_quals: vec![cmp],
            ..Default::default()
        };
        let out = prioritize_quals(&f.arena, &unit);
        assert_eq!(out.deferred, vec![cmp]);
    }

    #[test]
    fn hoisted_quals_are_skipped() {
        let mut f = fixture();
        let a = f.cmp(1);
        let b = f.cmp(2);
        let mut unit = ExecutionUnit {
            simple_quals: vec![a],
            quals: vec![b],
            ..Default::default()
        };
        unit.hoisted.insert(a);
        let out = prioritize_quals(&f.arena, &unit);
        assert_eq!(out.primary, vec![b]);
        assert!(out.deferred.is_empty());
    }
}
