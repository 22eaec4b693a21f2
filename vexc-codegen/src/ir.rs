//! SSA intermediate representation of a row routine.
//!
//! A [`Function`] is a list of basic blocks over typed SSA values. Every row
//! routine has the same signature:
//!
//! ```text
//! i32 row_func(ptr col_buffers, i64 pos, ptr out)
//! ```
//!
//! `col_buffers` is an array of pointers to per-column value arrays in
//! logical layout, `pos` the row being evaluated and `out` an `i64` slot per
//! target. The IR never names the parameters directly: [`Inst::Pos`],
//! [`Inst::ColumnBuffer`], [`Inst::LoadColumn`] and [`Inst::StoreOutput`]
//! read and write through them. Booleans are `i1`; nullable booleans are `i8`
//! holding 0, 1 or the null sentinel.
//!
//! Backends lower this IR (Cranelift on CPU, PTX on GPU) and the interpreter
//! executes it directly.

use std::fmt;

use vexc_result::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IrType {
    Void,
    I1,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Ptr,
}

impl IrType {
    /// Integer type of `bits` width.
    ///
    /// # Panics
    ///
    /// On widths other than 1, 8, 16, 32 or 64.
    pub fn int(bits: u32) -> IrType {
        match bits {
            1 => IrType::I1,
            8 => IrType::I8,
            16 => IrType::I16,
            32 => IrType::I32,
            64 => IrType::I64,
            other => panic!("no integer IR type of {other} bits"),
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            IrType::Void => 0,
            IrType::I1 => 1,
            IrType::I8 => 8,
            IrType::I16 => 16,
            IrType::I32 | IrType::F32 => 32,
            IrType::I64 | IrType::F64 | IrType::Ptr => 64,
        }
    }

    /// Storage width in bytes. `i1` occupies a byte.
    pub fn bytes(self) -> usize {
        match self {
            IrType::I1 => 1,
            other => other.bits() as usize / 8,
        }
    }

    pub fn is_int(self) -> bool {
        matches!(
            self,
            IrType::I1 | IrType::I8 | IrType::I16 | IrType::I32 | IrType::I64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, IrType::F32 | IrType::F64)
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IrType::Void => "void",
            IrType::I1 => "i1",
            IrType::I8 => "i8",
            IrType::I16 => "i16",
            IrType::I32 => "i32",
            IrType::I64 => "i64",
            IrType::F32 => "float",
            IrType::F64 => "double",
            IrType::Ptr => "ptr",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

impl ValueId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl BlockId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    SRem,
    And,
    Or,
    Xor,
    FAdd,
    FSub,
    FMul,
    FDiv,
}

impl BinOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::SDiv => "sdiv",
            BinOp::SRem => "srem",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
            BinOp::FAdd => "fadd",
            BinOp::FSub => "fsub",
            BinOp::FMul => "fmul",
            BinOp::FDiv => "fdiv",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, BinOp::FAdd | BinOp::FSub | BinOp::FMul | BinOp::FDiv)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnOp {
    /// Bitwise complement; on `i1` this is logical negation.
    Not,
    Neg,
    FNeg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CastOp {
    SExt,
    ZExt,
    Trunc,
    SiToFp,
    /// Saturating, NaN becomes 0.
    FpToSi,
    FpExt,
    FpTrunc,
    Bitcast,
}

impl CastOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CastOp::SExt => "sext",
            CastOp::ZExt => "zext",
            CastOp::Trunc => "trunc",
            CastOp::SiToFp => "sitofp",
            CastOp::FpToSi => "fptosi.sat",
            CastOp::FpExt => "fpext",
            CastOp::FpTrunc => "fptrunc",
            CastOp::Bitcast => "bitcast",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntPredicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl IntPredicate {
    pub fn as_str(self) -> &'static str {
        match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Slt => "slt",
            IntPredicate::Sle => "sle",
            IntPredicate::Sgt => "sgt",
            IntPredicate::Sge => "sge",
        }
    }

    pub fn holds(self, lhs: i64, rhs: i64) -> bool {
        match self {
            IntPredicate::Eq => lhs == rhs,
            IntPredicate::Ne => lhs != rhs,
            IntPredicate::Slt => lhs < rhs,
            IntPredicate::Sle => lhs <= rhs,
            IntPredicate::Sgt => lhs > rhs,
            IntPredicate::Sge => lhs >= rhs,
        }
    }
}

/// Float comparisons. Everything but `Une` is false when an operand is NaN.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FloatPredicate {
    Oeq,
    Une,
    Olt,
    Ole,
    Ogt,
    Oge,
}

impl FloatPredicate {
    pub fn as_str(self) -> &'static str {
        match self {
            FloatPredicate::Oeq => "oeq",
            FloatPredicate::Une => "une",
            FloatPredicate::Olt => "olt",
            FloatPredicate::Ole => "ole",
            FloatPredicate::Ogt => "ogt",
            FloatPredicate::Oge => "oge",
        }
    }

    pub fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            FloatPredicate::Oeq => lhs == rhs,
            FloatPredicate::Une => lhs != rhs,
            FloatPredicate::Olt => lhs < rhs,
            FloatPredicate::Ole => lhs <= rhs,
            FloatPredicate::Ogt => lhs > rhs,
            FloatPredicate::Oge => lhs >= rhs,
        }
    }
}

/// Runtime primitives every backend provides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RuntimeFn {
    /// `(i8 lhs, i8 rhs, i8 null) -> i8`
    LogicalAnd,
    /// `(i8 lhs, i8 rhs, i8 null) -> i8`
    LogicalOr,
    /// `(i8 operand, i8 null) -> i8`
    LogicalNot,
    /// `(ptr buffer, i64 pos) -> i1`
    ArrayIsNull,
}

impl RuntimeFn {
    pub const ALL: [RuntimeFn; 4] = [
        RuntimeFn::LogicalAnd,
        RuntimeFn::LogicalOr,
        RuntimeFn::LogicalNot,
        RuntimeFn::ArrayIsNull,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RuntimeFn::LogicalAnd => "logical_and",
            RuntimeFn::LogicalOr => "logical_or",
            RuntimeFn::LogicalNot => "logical_not",
            RuntimeFn::ArrayIsNull => "array_is_null",
        }
    }

    pub fn params(self) -> &'static [IrType] {
        match self {
            RuntimeFn::LogicalAnd | RuntimeFn::LogicalOr => &[IrType::I8, IrType::I8, IrType::I8],
            RuntimeFn::LogicalNot => &[IrType::I8, IrType::I8],
            RuntimeFn::ArrayIsNull => &[IrType::Ptr, IrType::I64],
        }
    }

    pub fn ret(self) -> IrType {
        match self {
            RuntimeFn::ArrayIsNull => IrType::I1,
            _ => IrType::I8,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Inst {
    IConst {
        ty: IrType,
        value: i64,
    },
    FConst {
        ty: IrType,
        value: f64,
    },
    /// Row position argument.
    Pos,
    /// Base pointer of input column `slot`.
    ColumnBuffer {
        slot: usize,
    },
    /// Value of input column `slot` at the current row.
    LoadColumn {
        slot: usize,
        ty: IrType,
    },
    Cast {
        op: CastOp,
        value: ValueId,
        to: IrType,
    },
    Binary {
        op: BinOp,
        lhs: ValueId,
        rhs: ValueId,
    },
    Unary {
        op: UnOp,
        value: ValueId,
    },
    ICmp {
        pred: IntPredicate,
        lhs: ValueId,
        rhs: ValueId,
    },
    FCmp {
        pred: FloatPredicate,
        lhs: ValueId,
        rhs: ValueId,
    },
    Select {
        cond: ValueId,
        if_true: ValueId,
        if_false: ValueId,
    },
    Call {
        func: RuntimeFn,
        args: Vec<ValueId>,
    },
    /// Call of a bound extension function by symbol.
    CallExtension {
        symbol: String,
        args: Vec<ValueId>,
        ret: IrType,
    },
    Phi {
        ty: IrType,
        incoming: Vec<(BlockId, ValueId)>,
    },
    /// Store an `i64` into target slot `index`.
    StoreOutput {
        index: usize,
        value: ValueId,
    },
}

impl Inst {
    /// SSA operands in evaluation order.
    pub fn operands(&self) -> Vec<ValueId> {
        match self {
            Inst::IConst { .. }
            | Inst::FConst { .. }
            | Inst::Pos
            | Inst::ColumnBuffer { .. }
            | Inst::LoadColumn { .. } => Vec::new(),
            Inst::Cast { value, .. } | Inst::Unary { value, .. } => vec![*value],
            Inst::Binary { lhs, rhs, .. }
            | Inst::ICmp { lhs, rhs, .. }
            | Inst::FCmp { lhs, rhs, .. } => vec![*lhs, *rhs],
            Inst::Select {
                cond,
                if_true,
                if_false,
            } => vec![*cond, *if_true, *if_false],
            Inst::Call { args, .. } | Inst::CallExtension { args, .. } => args.clone(),
            Inst::Phi { incoming, .. } => incoming.iter().map(|(_, v)| *v).collect(),
            Inst::StoreOutput { value, .. } => vec![*value],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Terminator {
    Br(BlockId),
    CondBr {
        cond: ValueId,
        if_true: BlockId,
        if_false: BlockId,
        /// Relative likelihood of the two edges.
        weights: Option<(u32, u32)>,
    },
    /// Return an `i32` status.
    Ret(ValueId),
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Br(target) => vec![*target],
            Terminator::CondBr {
                if_true, if_false, ..
            } => vec![*if_true, *if_false],
            Terminator::Ret(_) => Vec::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ValueData {
    pub inst: Inst,
    pub ty: IrType,
    pub block: BlockId,
}

#[derive(Clone, Debug)]
pub struct BlockData {
    pub name: String,
    pub insts: Vec<ValueId>,
    pub term: Option<Terminator>,
}

/// One row routine.
#[derive(Clone, Debug)]
pub struct Function {
    name: String,
    values: Vec<ValueData>,
    blocks: Vec<BlockData>,
}

impl Function {
    pub const ENTRY: BlockId = BlockId(0);

    pub fn new(name: impl Into<String>) -> Self {
        let mut func = Self {
            name: name.into(),
            values: Vec::new(),
            blocks: Vec::new(),
        };
        func.create_block("entry");
        func
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn create_block(&mut self, name: &str) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        let name = if self.blocks.iter().any(|b| b.name == name) {
            format!("{name}{}", id.0)
        } else {
            name.to_string()
        };
        self.blocks.push(BlockData {
            name,
            insts: Vec::new(),
            term: None,
        });
        id
    }

    /// Append `inst` to `block`.
    ///
    /// Instructions may be added to a terminated block; they execute before
    /// its terminator. Literal hoisting relies on this for the entry block.
    pub fn append(&mut self, block: BlockId, inst: Inst) -> ValueId {
        let ty = self.result_type(&inst);
        let id = ValueId(self.values.len() as u32);
        self.values.push(ValueData { inst, ty, block });
        self.blocks[block.index()].insts.push(id);
        id
    }

    /// # Panics
    ///
    /// If `block` already has a terminator.
    pub fn terminate(&mut self, block: BlockId, term: Terminator) {
        let data = &mut self.blocks[block.index()];
        assert!(
            data.term.is_none(),
            "block {} terminated twice",
            data.name
        );
        data.term = Some(term);
    }

    pub fn is_terminated(&self, block: BlockId) -> bool {
        self.blocks[block.index()].term.is_some()
    }

    fn result_type(&self, inst: &Inst) -> IrType {
        match inst {
            Inst::IConst { ty, .. } | Inst::FConst { ty, .. } => *ty,
            Inst::Pos => IrType::I64,
            Inst::ColumnBuffer { .. } => IrType::Ptr,
            Inst::LoadColumn { ty, .. } => *ty,
            Inst::Cast { to, .. } => *to,
            Inst::Binary { lhs, .. } => self.value_type(*lhs),
            Inst::Unary { value, .. } => self.value_type(*value),
            Inst::ICmp { .. } | Inst::FCmp { .. } => IrType::I1,
            Inst::Select { if_true, .. } => self.value_type(*if_true),
            Inst::Call { func, .. } => func.ret(),
            Inst::CallExtension { ret, .. } => *ret,
            Inst::Phi { ty, .. } => *ty,
            Inst::StoreOutput { .. } => IrType::Void,
        }
    }

    #[inline]
    pub fn value(&self, id: ValueId) -> &ValueData {
        &self.values[id.index()]
    }

    #[inline]
    pub fn value_type(&self, id: ValueId) -> IrType {
        self.value(id).ty
    }

    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn block(&self, id: BlockId) -> &BlockData {
        &self.blocks[id.index()]
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        (0..self.blocks.len() as u32).map(BlockId)
    }

    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        self.block(block)
            .term
            .map(|t| t.successors())
            .unwrap_or_default()
    }

    /// Predecessor lists indexed by block.
    pub fn predecessors(&self) -> Vec<Vec<BlockId>> {
        let mut preds = vec![Vec::new(); self.blocks.len()];
        for block in self.block_ids() {
            for succ in self.successors(block) {
                if !preds[succ.index()].contains(&block) {
                    preds[succ.index()].push(block);
                }
            }
        }
        preds
    }

    /// Blocks reachable from the entry, in reverse postorder.
    pub fn reverse_postorder(&self) -> Vec<BlockId> {
        let mut visited = vec![false; self.blocks.len()];
        let mut postorder = Vec::with_capacity(self.blocks.len());
        // (block, next successor index) pairs of the DFS stack
        let mut stack = vec![(Self::ENTRY, 0usize)];
        visited[Self::ENTRY.index()] = true;
        while let Some((block, next)) = stack.pop() {
            let succs = self.successors(block);
            if next < succs.len() {
                stack.push((block, next + 1));
                let succ = succs[next];
                if !visited[succ.index()] {
                    visited[succ.index()] = true;
                    stack.push((succ, 0));
                }
            } else {
                postorder.push(block);
            }
        }
        postorder.reverse();
        postorder
    }

    /// Check the structural invariants backends rely on.
    pub fn verify(&self) -> Result<()> {
        let preds = self.predecessors();
        for block in self.reverse_postorder() {
            let data = self.block(block);
            let Some(term) = data.term else {
                return Err(Error::codegen(format!("block {} has no terminator", data.name)));
            };
            let mut seen_non_phi = false;
            for id in &data.insts {
                let value = self.value(*id);
                match &value.inst {
                    Inst::Phi { incoming, .. } => {
                        if seen_non_phi {
                            return Err(Error::codegen(format!(
                                "phi {id} in {} follows a non-phi instruction",
                                data.name
                            )));
                        }
                        let mut from: Vec<BlockId> = incoming.iter().map(|(b, _)| *b).collect();
                        let mut expected = preds[block.index()].clone();
                        from.sort();
                        expected.sort();
                        if from != expected {
                            return Err(Error::codegen(format!(
                                "phi {id} in {} does not cover its predecessors",
                                data.name
                            )));
                        }
                        for (_, v) in incoming {
                            if self.value_type(*v) != value.ty {
                                return Err(Error::codegen(format!(
                                    "phi {id} mixes {} and {}",
                                    value.ty,
                                    self.value_type(*v)
                                )));
                            }
                        }
                    }
                    inst => {
                        seen_non_phi = true;
                        self.verify_operands(*id, inst)?;
                    }
                }
            }
            if let Terminator::Ret(v) = term
                && self.value_type(v) != IrType::I32
            {
                return Err(Error::codegen(format!(
                    "{} returns {} instead of i32",
                    data.name,
                    self.value_type(v)
                )));
            }
        }
        Ok(())
    }

    fn verify_operands(&self, id: ValueId, inst: &Inst) -> Result<()> {
        let mismatch = |what: &str| Err(Error::codegen(format!("{id}: {what}")));
        match inst {
            Inst::Binary { op, lhs, rhs } => {
                let (l, r) = (self.value_type(*lhs), self.value_type(*rhs));
                if l != r {
                    return mismatch(&format!("{} on {l} and {r}", op.as_str()));
                }
                if op.is_float() != l.is_float() {
                    return mismatch(&format!("{} on {l}", op.as_str()));
                }
            }
            Inst::ICmp { lhs, rhs, .. } => {
                let (l, r) = (self.value_type(*lhs), self.value_type(*rhs));
                if l != r || !l.is_int() {
                    return mismatch(&format!("icmp on {l} and {r}"));
                }
            }
            Inst::FCmp { lhs, rhs, .. } => {
                let (l, r) = (self.value_type(*lhs), self.value_type(*rhs));
                if l != r || !l.is_float() {
                    return mismatch(&format!("fcmp on {l} and {r}"));
                }
            }
            Inst::Select {
                cond,
                if_true,
                if_false,
            } => {
                if self.value_type(*cond) != IrType::I1 {
                    return mismatch("select condition is not i1");
                }
                if self.value_type(*if_true) != self.value_type(*if_false) {
                    return mismatch("select arms differ in type");
                }
            }
            Inst::Call { func, args } => {
                let types: Vec<IrType> = args.iter().map(|a| self.value_type(*a)).collect();
                if types != func.params() {
                    return mismatch(&format!("bad arguments to {}", func.name()));
                }
            }
            Inst::StoreOutput { value, .. } => {
                if self.value_type(*value) != IrType::I64 {
                    return mismatch("stored output is not i64");
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "define i32 @{}(ptr %col_buffers, i64 %pos, ptr %out) {{",
            self.name
        )?;
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{}:", block.name)?;
            for id in &block.insts {
                let value = self.value(*id);
                write!(f, "  ")?;
                if value.ty != IrType::Void {
                    write!(f, "{id} = ")?;
                }
                self.fmt_inst(f, &value.inst, value.ty)?;
                writeln!(f)?;
            }
            match block.term {
                Some(Terminator::Br(target)) => {
                    writeln!(f, "  br label %{}", self.block(target).name)?
                }
                Some(Terminator::CondBr {
                    cond,
                    if_true,
                    if_false,
                    weights,
                }) => {
                    write!(
                        f,
                        "  br i1 {cond}, label %{}, label %{}",
                        self.block(if_true).name,
                        self.block(if_false).name
                    )?;
                    if let Some((t, e)) = weights {
                        write!(f, ", !weights({t}, {e})")?;
                    }
                    writeln!(f)?;
                }
                Some(Terminator::Ret(v)) => writeln!(f, "  ret i32 {v}")?,
                None => writeln!(f, "  <unterminated>")?,
            }
        }
        writeln!(f, "}}")
    }
}

impl Function {
    fn fmt_inst(&self, f: &mut fmt::Formatter<'_>, inst: &Inst, ty: IrType) -> fmt::Result {
        match inst {
            Inst::IConst { value, .. } => write!(f, "const {ty} {value}"),
            Inst::FConst { value, .. } => write!(f, "const {ty} {value:e}"),
            Inst::Pos => write!(f, "pos"),
            Inst::ColumnBuffer { slot } => write!(f, "column_buffer {slot}"),
            Inst::LoadColumn { slot, .. } => write!(f, "load {ty}, column {slot}"),
            Inst::Cast { op, value, to } => write!(
                f,
                "{} {} {value} to {to}",
                op.as_str(),
                self.value_type(*value)
            ),
            Inst::Binary { op, lhs, rhs } => write!(f, "{} {ty} {lhs}, {rhs}", op.as_str()),
            Inst::Unary { op, value } => match op {
                UnOp::Not => write!(f, "not {ty} {value}"),
                UnOp::Neg => write!(f, "neg {ty} {value}"),
                UnOp::FNeg => write!(f, "fneg {ty} {value}"),
            },
            Inst::ICmp { pred, lhs, rhs } => write!(
                f,
                "icmp {} {} {lhs}, {rhs}",
                pred.as_str(),
                self.value_type(*lhs)
            ),
            Inst::FCmp { pred, lhs, rhs } => write!(
                f,
                "fcmp {} {} {lhs}, {rhs}",
                pred.as_str(),
                self.value_type(*lhs)
            ),
            Inst::Select {
                cond,
                if_true,
                if_false,
            } => write!(f, "select i1 {cond}, {ty} {if_true}, {ty} {if_false}"),
            Inst::Call { func, args } => {
                write!(f, "call {ty} @{}(", func.name())?;
                self.fmt_args(f, args)?;
                write!(f, ")")
            }
            Inst::CallExtension { symbol, args, .. } => {
                write!(f, "call {ty} @{symbol}(")?;
                self.fmt_args(f, args)?;
                write!(f, ")")
            }
            Inst::Phi { incoming, .. } => {
                write!(f, "phi {ty} ")?;
                for (i, (block, value)) in incoming.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "[ {value}, %{} ]", self.block(*block).name)?;
                }
                Ok(())
            }
            Inst::StoreOutput { index, value } => write!(f, "store i64 {value}, out[{index}]"),
        }
    }

    fn fmt_args(&self, f: &mut fmt::Formatter<'_>, args: &[ValueId]) -> fmt::Result {
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {arg}", self.value_type(*arg))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> (Function, BlockId, BlockId, BlockId) {
        let mut func = Function::new("diamond");
        let left = func.create_block("left");
        let right = func.create_block("right");
        let join = func.create_block("join");
        let pos = func.append(Function::ENTRY, Inst::Pos);
        let zero = func.append(
            Function::ENTRY,
            Inst::IConst {
                ty: IrType::I64,
                value: 0,
            },
        );
        let cond = func.append(
            Function::ENTRY,
            Inst::ICmp {
                pred: IntPredicate::Sgt,
                lhs: pos,
                rhs: zero,
            },
        );
        func.terminate(
            Function::ENTRY,
            Terminator::CondBr {
                cond,
                if_true: left,
                if_false: right,
                weights: None,
            },
        );
        let one = func.append(
            left,
            Inst::IConst {
                ty: IrType::I32,
                value: 1,
            },
        );
        func.terminate(left, Terminator::Br(join));
        let two = func.append(
            right,
            Inst::IConst {
                ty: IrType::I32,
                value: 2,
            },
        );
        func.terminate(right, Terminator::Br(join));
        let phi = func.append(
            join,
            Inst::Phi {
                ty: IrType::I32,
                incoming: vec![(left, one), (right, two)],
            },
        );
        func.terminate(join, Terminator::Ret(phi));
        (func, left, right, join)
    }

    #[test]
    fn reverse_postorder_puts_join_last() {
        let (func, left, right, join) = diamond();
        let rpo = func.reverse_postorder();
        assert_eq!(rpo.first(), Some(&Function::ENTRY));
        assert_eq!(rpo.last(), Some(&join));
        assert!(rpo.contains(&left) && rpo.contains(&right));
        func.verify().unwrap();
    }

    #[test]
    fn verify_rejects_incomplete_phi() {
        let (mut func, _, right, join) = diamond();
        let phi = func.block(join).insts[0];
        if let Inst::Phi { incoming, .. } = &mut func.values[phi.index()].inst {
            incoming.retain(|(b, _)| *b != right);
        }
        assert!(func.verify().is_err());
    }

    #[test]
    fn duplicate_block_names_are_suffixed() {
        let mut func = Function::new("f");
        let a = func.create_block("rhs_bb");
        let b = func.create_block("rhs_bb");
        assert_ne!(func.block(a).name, func.block(b).name);
    }

    #[test]
    fn display_renders_branch_weights() {
        let (mut func, ..) = diamond();
        if let Some(Terminator::CondBr { weights, .. }) = &mut func.blocks[0].term {
            *weights = Some((10, 90));
        }
        let text = func.to_string();
        assert!(text.starts_with("define i32 @diamond("));
        assert!(text.contains("!weights(10, 90)"));
        assert!(text.contains("phi i32 [ %3, %left ], [ %4, %right ]"));
    }
}
