//! Mutable state of one routine under construction.

use std::ops::{Deref, DerefMut};

use rustc_hash::FxHashMap;
use vexc_expr::ColumnVar;
use vexc_result::Result;
use vexc_types::{Type, TypeRef, inline_fp_null_value, inline_int_null_value};

use crate::buffers::storage_ir_type;
use crate::extensions::ExtensionFunction;
use crate::ir::{
    BinOp, BlockId, CastOp, FloatPredicate, Function, Inst, IntPredicate, IrType, RuntimeFn,
    Terminator, UnOp, ValueId,
};

/// A stored column read by the routine, in buffer slot order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputColumn {
    pub column: ColumnVar,
    pub ty: TypeRef,
    pub ir_type: IrType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum LiteralKey {
    Int(IrType, i64),
    Float(IrType, u64),
}

/// Owns the function being built, the insertion point and the caches that
/// make repeated column reads and literals free.
#[derive(Debug)]
pub struct CgenState {
    func: Function,
    current_block: BlockId,
    fetch_cache: FxHashMap<ColumnVar, ValueId>,
    /// Snapshots of `fetch_cache`, innermost last.
    anchors: Vec<FxHashMap<ColumnVar, ValueId>>,
    inputs: Vec<InputColumn>,
    input_slots: FxHashMap<ColumnVar, usize>,
    literals: FxHashMap<LiteralKey, ValueId>,
    pos: Option<ValueId>,
    error_blocks: FxHashMap<i32, BlockId>,
    hoist_literals: bool,
    live_extensions: Vec<ExtensionFunction>,
}

impl CgenState {
    pub fn new(name: &str, hoist_literals: bool) -> Self {
        Self {
            func: Function::new(name),
            current_block: Function::ENTRY,
            fetch_cache: FxHashMap::default(),
            anchors: Vec::new(),
            inputs: Vec::new(),
            input_slots: FxHashMap::default(),
            literals: FxHashMap::default(),
            pos: None,
            error_blocks: FxHashMap::default(),
            hoist_literals,
            live_extensions: Vec::new(),
        }
    }

    pub fn func(&self) -> &Function {
        &self.func
    }

    pub fn current_block(&self) -> BlockId {
        self.current_block
    }

    pub fn create_block(&mut self, name: &str) -> BlockId {
        self.func.create_block(name)
    }

    /// Move the insertion point to the end of `block`.
    pub fn switch_to(&mut self, block: BlockId) {
        self.current_block = block;
    }

    pub fn push(&mut self, inst: Inst) -> ValueId {
        self.func.append(self.current_block, inst)
    }

    #[inline]
    pub fn value_type(&self, value: ValueId) -> IrType {
        self.func.value_type(value)
    }

    fn literal(&mut self, key: LiteralKey, inst: Inst) -> ValueId {
        if !self.hoist_literals {
            return self.push(inst);
        }
        if let Some(v) = self.literals.get(&key) {
            return *v;
        }
        let v = self.func.append(Function::ENTRY, inst);
        self.literals.insert(key, v);
        v
    }

    pub fn iconst(&mut self, ty: IrType, value: i64) -> ValueId {
        self.literal(LiteralKey::Int(ty, value), Inst::IConst { ty, value })
    }

    pub fn fconst(&mut self, ty: IrType, value: f64) -> ValueId {
        self.literal(
            LiteralKey::Float(ty, value.to_bits()),
            Inst::FConst { ty, value },
        )
    }

    pub fn bool_const(&mut self, value: bool) -> ValueId {
        self.iconst(IrType::I1, value as i64)
    }

    /// Row position. Materialized once in the entry block.
    pub fn pos(&mut self) -> ValueId {
        if let Some(pos) = self.pos {
            return pos;
        }
        let pos = self.func.append(Function::ENTRY, Inst::Pos);
        self.pos = Some(pos);
        pos
    }

    /// Integer null sentinel of `ty` at its value width; booleans are `i8`.
    pub fn inline_int_null(&mut self, ty: &Type) -> Result<ValueId> {
        let ir = if ty.is_boolean() || ty.is_null() {
            IrType::I8
        } else {
            storage_ir_type(ty)?
        };
        Ok(self.iconst(ir, inline_int_null_value(ty)))
    }

    /// Floating point null sentinel of `ty`.
    pub fn inline_fp_null(&mut self, ty: &Type) -> ValueId {
        let ir = if ty.size() == 4 { IrType::F32 } else { IrType::F64 };
        self.fconst(ir, inline_fp_null_value(ty))
    }

    /// Null sentinel of any scalar type.
    pub fn inline_null(&mut self, ty: &Type) -> Result<ValueId> {
        if ty.is_floating_point() {
            Ok(self.inline_fp_null(ty))
        } else {
            self.inline_int_null(ty)
        }
    }

    /// Resize an integer to `to`: `i1` zero-extends, wider types sign-extend
    /// or truncate.
    pub fn cast_to_type_in(&mut self, value: ValueId, to: IrType) -> ValueId {
        let from = self.value_type(value);
        if from == to {
            return value;
        }
        let op = if from == IrType::I1 {
            CastOp::ZExt
        } else if from.bits() < to.bits() {
            CastOp::SExt
        } else {
            CastOp::Trunc
        };
        self.cast(op, value, to)
    }

    pub fn cast(&mut self, op: CastOp, value: ValueId, to: IrType) -> ValueId {
        self.push(Inst::Cast { op, value, to })
    }

    pub fn binary(&mut self, op: BinOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.push(Inst::Binary { op, lhs, rhs })
    }

    pub fn unary(&mut self, op: UnOp, value: ValueId) -> ValueId {
        self.push(Inst::Unary { op, value })
    }

    pub fn icmp(&mut self, pred: IntPredicate, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.push(Inst::ICmp { pred, lhs, rhs })
    }

    pub fn fcmp(&mut self, pred: FloatPredicate, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.push(Inst::FCmp { pred, lhs, rhs })
    }

    pub fn select(&mut self, cond: ValueId, if_true: ValueId, if_false: ValueId) -> ValueId {
        self.push(Inst::Select {
            cond,
            if_true,
            if_false,
        })
    }

    pub fn phi(&mut self, ty: IrType, incoming: Vec<(BlockId, ValueId)>) -> ValueId {
        self.push(Inst::Phi { ty, incoming })
    }

    pub fn emit_call(&mut self, func: RuntimeFn, args: Vec<ValueId>) -> ValueId {
        self.push(Inst::Call { func, args })
    }

    /// Call a bound extension function and record it as live.
    pub fn emit_external_call(&mut self, func: &ExtensionFunction, args: Vec<ValueId>) -> ValueId {
        if !self.live_extensions.iter().any(|f| f.symbol == func.symbol) {
            self.live_extensions.push(func.clone());
        }
        self.push(Inst::CallExtension {
            symbol: func.symbol.clone(),
            args,
            ret: func.ret_type(),
        })
    }

    pub fn br(&mut self, target: BlockId) {
        self.func.terminate(self.current_block, Terminator::Br(target));
    }

    pub fn cond_br(
        &mut self,
        cond: ValueId,
        if_true: BlockId,
        if_false: BlockId,
        weights: Option<(u32, u32)>,
    ) {
        self.func.terminate(
            self.current_block,
            Terminator::CondBr {
                cond,
                if_true,
                if_false,
                weights,
            },
        );
    }

    pub fn ret(&mut self, status: ValueId) {
        self.func.terminate(self.current_block, Terminator::Ret(status));
    }

    /// Buffer slot of `column`, registering it as an input on first use.
    pub fn input_slot(&mut self, column: ColumnVar, ty: TypeRef) -> Result<usize> {
        if let Some(slot) = self.input_slots.get(&column) {
            return Ok(*slot);
        }
        let ir_type = storage_ir_type(ty)?;
        let slot = self.inputs.len();
        self.inputs.push(InputColumn {
            column,
            ty,
            ir_type,
        });
        self.input_slots.insert(column, slot);
        Ok(slot)
    }

    /// Value of `column` at the current row, loaded once per dominating path.
    pub fn fetch_column(&mut self, column: ColumnVar, ty: TypeRef) -> Result<ValueId> {
        if let Some(v) = self.fetch_cache.get(&column) {
            return Ok(*v);
        }
        let slot = self.input_slot(column, ty)?;
        let ir_type = self.inputs[slot].ir_type;
        let v = self.push(Inst::LoadColumn { slot, ty: ir_type });
        self.fetch_cache.insert(column, v);
        Ok(v)
    }

    /// Base pointer of `column`'s buffer.
    pub fn column_buffer(&mut self, column: ColumnVar, ty: TypeRef) -> Result<ValueId> {
        let slot = self.input_slot(column, ty)?;
        Ok(self.push(Inst::ColumnBuffer { slot }))
    }

    /// Shared block returning `code`, created on first request.
    pub fn error_block(&mut self, code: i32) -> BlockId {
        if let Some(block) = self.error_blocks.get(&code) {
            return *block;
        }
        let block = self.func.create_block("error");
        let status = self.func.append(
            block,
            Inst::IConst {
                ty: IrType::I32,
                value: code as i64,
            },
        );
        self.func.terminate(block, Terminator::Ret(status));
        self.error_blocks.insert(code, block);
        block
    }

    pub fn inputs(&self) -> &[InputColumn] {
        &self.inputs
    }

    pub fn live_extensions(&self) -> &[ExtensionFunction] {
        &self.live_extensions
    }

    /// Hand over the finished function, its inputs and the extension
    /// functions it calls.
    pub fn finish(self) -> (Function, Vec<InputColumn>, Vec<ExtensionFunction>) {
        debug_assert!(self.anchors.is_empty(), "fetch cache anchor outlived codegen");
        (self.func, self.inputs, self.live_extensions)
    }
}

/// Access to the [`CgenState`] inside a larger code generator.
pub trait CgenStateOwner {
    fn cgen_state(&mut self) -> &mut CgenState;
}

impl CgenStateOwner for CgenState {
    fn cgen_state(&mut self) -> &mut CgenState {
        self
    }
}

/// Scope guard around divergent control flow.
///
/// Creating the anchor snapshots the fetch cache; dropping it restores the
/// snapshot, so columns first loaded inside a conditional block are not
/// reused on paths that block does not dominate. Anchors nest strictly.
pub struct FetchCacheAnchor<'g, G: CgenStateOwner + ?Sized> {
    owner: &'g mut G,
    depth: usize,
}

impl<'g, G: CgenStateOwner + ?Sized> FetchCacheAnchor<'g, G> {
    pub fn new(owner: &'g mut G) -> Self {
        let state = owner.cgen_state();
        let snapshot = state.fetch_cache.clone();
        state.anchors.push(snapshot);
        let depth = state.anchors.len();
        Self { owner, depth }
    }
}

impl<G: CgenStateOwner + ?Sized> Deref for FetchCacheAnchor<'_, G> {
    type Target = G;

    fn deref(&self) -> &G {
        self.owner
    }
}

impl<G: CgenStateOwner + ?Sized> DerefMut for FetchCacheAnchor<'_, G> {
    fn deref_mut(&mut self) -> &mut G {
        self.owner
    }
}

impl<G: CgenStateOwner + ?Sized> Drop for FetchCacheAnchor<'_, G> {
    fn drop(&mut self) {
        let state = self.owner.cgen_state();
        debug_assert_eq!(
            state.anchors.len(),
            self.depth,
            "fetch cache anchors released out of order"
        );
        if let Some(snapshot) = state.anchors.pop() {
            state.fetch_cache = snapshot;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vexc_types::TypeContext;

    fn col(column_id: i32) -> ColumnVar {
        ColumnVar {
            db_id: 0,
            table_id: 1,
            column_id,
            rte_idx: 0,
        }
    }

    #[test]
    fn anchor_drops_loads_from_inner_blocks() {
        let ty = TypeContext::global().int64(true);
        let mut state = CgenState::new("f", true);
        let outer = state.fetch_column(col(1), ty).unwrap();
        let inner;
        {
            let mut anchor = FetchCacheAnchor::new(&mut state);
            let block = anchor.create_block("inner");
            anchor.switch_to(block);
            assert_eq!(anchor.fetch_column(col(1), ty).unwrap(), outer);
            inner = anchor.fetch_column(col(2), ty).unwrap();
            assert_eq!(anchor.fetch_cache.len(), 2);
        }
        assert_eq!(state.fetch_cache.len(), 1);
        assert!(state.anchors.is_empty());
        // Same slot, fresh load.
        let again = state.fetch_column(col(2), ty).unwrap();
        assert_eq!(state.inputs().len(), 2);
        assert_ne!(inner, again);
    }

    #[test]
    fn nested_anchors_restore_in_order() {
        let ty = TypeContext::global().int32(false);
        let mut state = CgenState::new("f", true);
        let mut outer = FetchCacheAnchor::new(&mut state);
        outer.fetch_column(col(1), ty).unwrap();
        {
            let mut inner = FetchCacheAnchor::new(&mut *outer);
            inner.fetch_column(col(2), ty).unwrap();
            assert_eq!(inner.anchors.len(), 2);
        }
        assert_eq!(outer.fetch_cache.len(), 1);
        drop(outer);
        assert!(state.fetch_cache.is_empty());
    }

    #[test]
    fn hoisted_literals_are_shared_and_live_in_entry() {
        let mut state = CgenState::new("f", true);
        let block = state.create_block("body");
        state.switch_to(block);
        let a = state.iconst(IrType::I64, 42);
        let b = state.iconst(IrType::I64, 42);
        assert_eq!(a, b);
        assert_eq!(state.func().value(a).block, Function::ENTRY);

        let mut eager = CgenState::new("g", false);
        let x = eager.iconst(IrType::I64, 42);
        let y = eager.iconst(IrType::I64, 42);
        assert_ne!(x, y);
    }

    #[test]
    fn boolean_null_is_byte_wide() {
        let ctx = TypeContext::global();
        let mut state = CgenState::new("f", true);
        let null = state.inline_int_null(ctx.boolean(true)).unwrap();
        assert_eq!(state.value_type(null), IrType::I8);
        let null = state.inline_int_null(ctx.int16(true)).unwrap();
        assert_eq!(state.value_type(null), IrType::I16);
    }

    #[test]
    fn error_blocks_are_shared() {
        let mut state = CgenState::new("f", true);
        let a = state.error_block(-1);
        let b = state.error_block(-1);
        assert_eq!(a, b);
        assert!(state.func().is_terminated(a));
    }
}
