//! Reference interpreter for row routines.
//!
//! Executes a [`Function`] one row at a time over [`ColumnBuffers`] with the
//! same semantics the native backends implement: wrapping integer
//! arithmetic, saturating float to integer conversion and the runtime
//! primitives of [`crate::runtime`]. It serves as the interpreted fallback
//! when native compilation is unavailable and as the oracle in tests.

#![forbid(unsafe_code)]

use vexc_result::{Error, Result};

use crate::buffers::ColumnBuffers;
use crate::extensions::{ExtensionFunction, ExtensionImpl};
use crate::ir::{
    BinOp, BlockId, CastOp, Function, Inst, IrType, RuntimeFn, Terminator, UnOp, ValueId,
};
use crate::runtime;

/// A runtime value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scalar {
    /// Integer of any width, sign-extended; `i1` holds 0 or 1.
    Int(i64),
    F32(f32),
    F64(f64),
    /// Base pointer of input column `slot`.
    Buffer(usize),
    Void,
}

impl Scalar {
    fn int(self) -> Result<i64> {
        match self {
            Scalar::Int(v) => Ok(v),
            other => Err(Error::Internal(format!("expected an integer, got {other:?}"))),
        }
    }

    fn float(self) -> Result<f64> {
        match self {
            Scalar::F32(v) => Ok(v as f64),
            Scalar::F64(v) => Ok(v),
            other => Err(Error::Internal(format!("expected a float, got {other:?}"))),
        }
    }

    fn from_float(ty: IrType, v: f64) -> Scalar {
        match ty {
            IrType::F32 => Scalar::F32(v as f32),
            _ => Scalar::F64(v),
        }
    }
}

/// Reduce `v` to the value range of integer type `ty`.
fn wrap(ty: IrType, v: i64) -> i64 {
    match ty {
        IrType::I1 => v & 1,
        IrType::I8 => v as i8 as i64,
        IrType::I16 => v as i16 as i64,
        IrType::I32 => v as i32 as i64,
        _ => v,
    }
}

/// `v` of integer type `ty` reinterpreted as unsigned.
fn zero_extend(ty: IrType, v: i64) -> i64 {
    match ty {
        IrType::I1 => v & 1,
        IrType::I8 => v as u8 as i64,
        IrType::I16 => v as u16 as i64,
        IrType::I32 => v as u32 as i64,
        _ => v,
    }
}

fn saturate_to_int(ty: IrType, f: f64) -> i64 {
    match ty {
        IrType::I8 => f as i8 as i64,
        IrType::I16 => f as i16 as i64,
        IrType::I32 => f as i32 as i64,
        _ => f as i64,
    }
}

impl ExtensionImpl {
    /// Call the host implementation with interpreter values.
    pub fn call(&self, args: &[Scalar]) -> Result<Scalar> {
        let arg = |i: usize| {
            args.get(i)
                .copied()
                .ok_or_else(|| Error::Internal(format!("missing extension argument {i}")))
        };
        Ok(match self {
            ExtensionImpl::UnaryI32(f) => Scalar::Int(f(arg(0)?.int()? as i32) as i64),
            ExtensionImpl::UnaryI64(f) => Scalar::Int(f(arg(0)?.int()?)),
            ExtensionImpl::UnaryF32(f) => Scalar::F32(f(arg(0)?.float()? as f32)),
            ExtensionImpl::UnaryF64(f) => Scalar::F64(f(arg(0)?.float()?)),
            ExtensionImpl::BinaryI64(f) => Scalar::Int(f(arg(0)?.int()?, arg(1)?.int()?)),
            ExtensionImpl::BinaryF64(f) => Scalar::F64(f(arg(0)?.float()?, arg(1)?.float()?)),
        })
    }
}

/// Executes one routine.
pub struct Interpreter<'f> {
    func: &'f Function,
    extensions: &'f [ExtensionFunction],
}

impl<'f> Interpreter<'f> {
    pub fn new(func: &'f Function, extensions: &'f [ExtensionFunction]) -> Self {
        Self { func, extensions }
    }

    /// Evaluate row `pos`, writing targets into `out`. Returns the row
    /// status.
    pub fn run_row(&self, buffers: &ColumnBuffers, pos: usize, out: &mut [i64]) -> Result<i32> {
        let mut values = vec![Scalar::Void; self.func.num_values()];
        let mut block = Function::ENTRY;
        let mut pred: Option<BlockId> = None;
        loop {
            let data = self.func.block(block);
            // Phis read their inputs before any of them is overwritten.
            let mut phi_values = Vec::new();
            for id in &data.insts {
                if let Inst::Phi { incoming, .. } = &self.func.value(*id).inst {
                    let from = pred.ok_or_else(|| {
                        Error::Internal(format!("phi {id} in the entry block"))
                    })?;
                    let (_, src) = incoming.iter().find(|(b, _)| *b == from).ok_or_else(|| {
                        Error::Internal(format!("phi {id} has no input from its predecessor"))
                    })?;
                    phi_values.push((*id, values[src.index()]));
                }
            }
            for (id, value) in phi_values {
                values[id.index()] = value;
            }
            for id in &data.insts {
                let inst = &self.func.value(*id).inst;
                if matches!(inst, Inst::Phi { .. }) {
                    continue;
                }
                values[id.index()] = self.eval(*id, inst, &values, buffers, pos, out)?;
            }
            match data.term {
                Some(Terminator::Br(target)) => {
                    pred = Some(block);
                    block = target;
                }
                Some(Terminator::CondBr {
                    cond,
                    if_true,
                    if_false,
                    ..
                }) => {
                    pred = Some(block);
                    block = if values[cond.index()].int()? != 0 {
                        if_true
                    } else {
                        if_false
                    };
                }
                Some(Terminator::Ret(v)) => return Ok(values[v.index()].int()? as i32),
                None => {
                    return Err(Error::Internal(format!(
                        "fell off unterminated block {}",
                        data.name
                    )));
                }
            }
        }
    }

    fn eval(
        &self,
        id: ValueId,
        inst: &Inst,
        values: &[Scalar],
        buffers: &ColumnBuffers,
        pos: usize,
        out: &mut [i64],
    ) -> Result<Scalar> {
        let ty = self.func.value_type(id);
        let get = |v: &ValueId| values[v.index()];
        Ok(match inst {
            Inst::IConst { value, .. } => Scalar::Int(wrap(ty, *value)),
            Inst::FConst { value, .. } => Scalar::from_float(ty, *value),
            Inst::Pos => Scalar::Int(pos as i64),
            Inst::ColumnBuffer { slot } => Scalar::Buffer(*slot),
            Inst::LoadColumn { slot, .. } => {
                let column = buffers.column(*slot);
                if ty.is_float() {
                    Scalar::from_float(ty, column.float_at(pos).ok_or_else(|| {
                        Error::Internal(format!("column {slot} is not a float column"))
                    })?)
                } else {
                    Scalar::Int(column.int_at(pos).ok_or_else(|| {
                        Error::Internal(format!("column {slot} is not an integer column"))
                    })?)
                }
            }
            Inst::Cast { op, value, to } => {
                let from = self.func.value_type(*value);
                let v = get(value);
                match op {
                    CastOp::SExt if from == IrType::I1 => Scalar::Int(-v.int()?),
                    CastOp::SExt => Scalar::Int(v.int()?),
                    CastOp::ZExt => Scalar::Int(zero_extend(from, v.int()?)),
                    CastOp::Trunc => Scalar::Int(wrap(*to, v.int()?)),
                    CastOp::SiToFp => Scalar::from_float(*to, v.int()? as f64),
                    CastOp::FpToSi => Scalar::Int(saturate_to_int(*to, v.float()?)),
                    CastOp::FpExt | CastOp::FpTrunc => Scalar::from_float(*to, v.float()?),
                    CastOp::Bitcast => match (v, *to) {
                        (Scalar::F32(f), IrType::I32) => Scalar::Int(f.to_bits() as i32 as i64),
                        (Scalar::F64(f), IrType::I64) => Scalar::Int(f.to_bits() as i64),
                        (Scalar::Int(i), IrType::F32) => Scalar::F32(f32::from_bits(i as u32)),
                        (Scalar::Int(i), IrType::F64) => Scalar::F64(f64::from_bits(i as u64)),
                        (other, to) => {
                            return Err(Error::Internal(format!(
                                "bitcast of {other:?} to {to}"
                            )));
                        }
                    },
                }
            }
            Inst::Binary { op, lhs, rhs } => {
                if op.is_float() {
                    let (a, b) = (get(lhs).float()?, get(rhs).float()?);
                    let r = match op {
                        BinOp::FAdd => a + b,
                        BinOp::FSub => a - b,
                        BinOp::FMul => a * b,
                        _ => a / b,
                    };
                    // f32 arithmetic rounds at its own width.
                    if ty == IrType::F32 {
                        let (a, b) = (a as f32, b as f32);
                        Scalar::F32(match op {
                            BinOp::FAdd => a + b,
                            BinOp::FSub => a - b,
                            BinOp::FMul => a * b,
                            _ => a / b,
                        })
                    } else {
                        Scalar::F64(r)
                    }
                } else {
                    let (a, b) = (get(lhs).int()?, get(rhs).int()?);
                    let r = match op {
                        BinOp::Add => a.wrapping_add(b),
                        BinOp::Sub => a.wrapping_sub(b),
                        BinOp::Mul => a.wrapping_mul(b),
                        BinOp::SDiv | BinOp::SRem if b == 0 => {
                            return Err(Error::Internal(format!(
                                "unguarded division by zero at {id}"
                            )));
                        }
                        BinOp::SDiv => a.wrapping_div(b),
                        BinOp::SRem => a.wrapping_rem(b),
                        BinOp::And => a & b,
                        BinOp::Or => a | b,
                        BinOp::Xor => a ^ b,
                        _ => unreachable!("float op {op:?} on integers"),
                    };
                    Scalar::Int(wrap(ty, r))
                }
            }
            Inst::Unary { op, value } => match op {
                UnOp::Not => Scalar::Int(wrap(ty, !get(value).int()?)),
                UnOp::Neg => Scalar::Int(wrap(ty, get(value).int()?.wrapping_neg())),
                UnOp::FNeg => match get(value) {
                    Scalar::F32(f) => Scalar::F32(-f),
                    other => Scalar::F64(-other.float()?),
                },
            },
            Inst::ICmp { pred, lhs, rhs } => {
                Scalar::Int(pred.holds(get(lhs).int()?, get(rhs).int()?) as i64)
            }
            Inst::FCmp { pred, lhs, rhs } => {
                Scalar::Int(pred.holds(get(lhs).float()?, get(rhs).float()?) as i64)
            }
            Inst::Select {
                cond,
                if_true,
                if_false,
            } => {
                if get(cond).int()? != 0 {
                    get(if_true)
                } else {
                    get(if_false)
                }
            }
            Inst::Call { func, args } => {
                let arg = |i: usize| get(&args[i]);
                match func {
                    RuntimeFn::LogicalAnd => Scalar::Int(runtime::logical_and(
                        arg(0).int()? as i8,
                        arg(1).int()? as i8,
                        arg(2).int()? as i8,
                    ) as i64),
                    RuntimeFn::LogicalOr => Scalar::Int(runtime::logical_or(
                        arg(0).int()? as i8,
                        arg(1).int()? as i8,
                        arg(2).int()? as i8,
                    ) as i64),
                    RuntimeFn::LogicalNot => Scalar::Int(runtime::logical_not(
                        arg(0).int()? as i8,
                        arg(1).int()? as i8,
                    ) as i64),
                    RuntimeFn::ArrayIsNull => {
                        let Scalar::Buffer(slot) = arg(0) else {
                            return Err(Error::Internal(
                                "array_is_null on a non-buffer value".to_string(),
                            ));
                        };
                        let row = arg(1).int()? as usize;
                        let headers = buffers.column(slot).array_headers().ok_or_else(|| {
                            Error::Internal(format!("column {slot} has no array headers"))
                        })?;
                        Scalar::Int(runtime::array_is_null_at(headers, row) as i64)
                    }
                }
            }
            Inst::CallExtension { symbol, args, .. } => {
                let func = self
                    .extensions
                    .iter()
                    .find(|f| &f.symbol == symbol)
                    .ok_or_else(|| Error::Internal(format!("unknown extension symbol {symbol}")))?;
                let args: Vec<Scalar> = args.iter().map(get).collect();
                func.imp.call(&args)?
            }
            Inst::Phi { .. } => unreachable!("phis are resolved on block entry"),
            Inst::StoreOutput { index, value } => {
                let slot = out.get_mut(*index).ok_or_else(|| {
                    Error::InvalidArgumentError(format!("no output slot {index}"))
                })?;
                *slot = get(value).int()?;
                Scalar::Void
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffers::ColumnData;
    use crate::ir::IntPredicate;

    fn iconst(func: &mut Function, ty: IrType, value: i64) -> ValueId {
        func.append(Function::ENTRY, Inst::IConst { ty, value })
    }

    #[test]
    fn arithmetic_wraps_at_type_width() {
        let mut func = Function::new("wrap");
        let max = iconst(&mut func, IrType::I32, i32::MAX as i64);
        let one = iconst(&mut func, IrType::I32, 1);
        let sum = func.append(
            Function::ENTRY,
            Inst::Binary {
                op: BinOp::Add,
                lhs: max,
                rhs: one,
            },
        );
        let wide = func.append(
            Function::ENTRY,
            Inst::Cast {
                op: CastOp::SExt,
                value: sum,
                to: IrType::I64,
            },
        );
        func.append(Function::ENTRY, Inst::StoreOutput { index: 0, value: wide });
        let status = iconst(&mut func, IrType::I32, 1);
        func.terminate(Function::ENTRY, Terminator::Ret(status));

        let mut out = [0i64];
        let status = Interpreter::new(&func, &[])
            .run_row(&ColumnBuffers::new(1), 0, &mut out)
            .unwrap();
        assert_eq!(status, 1);
        assert_eq!(out[0], i32::MIN as i64);
    }

    #[test]
    fn phi_takes_value_of_taken_edge() {
        let mut func = Function::new("branch");
        let then_bb = func.create_block("then");
        let else_bb = func.create_block("else");
        let join = func.create_block("join");
        let x = func.append(
            Function::ENTRY,
            Inst::LoadColumn {
                slot: 0,
                ty: IrType::I64,
            },
        );
        let zero = iconst(&mut func, IrType::I64, 0);
        let cond = func.append(
            Function::ENTRY,
            Inst::ICmp {
                pred: IntPredicate::Sgt,
                lhs: x,
                rhs: zero,
            },
        );
        func.terminate(
            Function::ENTRY,
            Terminator::CondBr {
                cond,
                if_true: then_bb,
                if_false: else_bb,
                weights: None,
            },
        );
        let a = func.append(then_bb, Inst::IConst { ty: IrType::I32, value: 1 });
        func.terminate(then_bb, Terminator::Br(join));
        let b = func.append(else_bb, Inst::IConst { ty: IrType::I32, value: 0 });
        func.terminate(else_bb, Terminator::Br(join));
        let phi = func.append(
            join,
            Inst::Phi {
                ty: IrType::I32,
                incoming: vec![(then_bb, a), (else_bb, b)],
            },
        );
        func.terminate(join, Terminator::Ret(phi));
        func.verify().unwrap();

        let mut buffers = ColumnBuffers::new(2);
        buffers.push(ColumnData::I64(vec![5, -5])).unwrap();
        let interp = Interpreter::new(&func, &[]);
        assert_eq!(interp.run_row(&buffers, 0, &mut []).unwrap(), 1);
        assert_eq!(interp.run_row(&buffers, 1, &mut []).unwrap(), 0);
    }

    #[test]
    fn float_to_int_saturates() {
        assert_eq!(saturate_to_int(IrType::I8, 1e9), i8::MAX as i64);
        assert_eq!(saturate_to_int(IrType::I32, f64::NAN), 0);
        assert_eq!(zero_extend(IrType::I8, -1), 255);
    }
}
