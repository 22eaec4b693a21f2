//! PTX generation for row routines.
//!
//! The row function becomes a `.func` taking the same three arguments as on
//! CPU, and a `.entry` kernel evaluates it for one row per thread, writing
//! the row status to a separate array. Runtime primitives are emitted as
//! device functions next to the routine; extension functions are declared
//! `.extern` and resolved against the device extension modules at link time.
//!
//! `i8` values live in 16-bit registers, sign-extended, and are rewrapped
//! after every arithmetic instruction so overflow behaves as on CPU.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashSet;
use vexc_codegen::ir::{
    BinOp, BlockId, CastOp, FloatPredicate, IntPredicate, UnOp, ValueId,
};
use vexc_codegen::{
    CompilationOptions, ExecutorDeviceType, ExtensionFunction, Function, Inst, IrType,
    RoutineModule, RuntimeFn, Terminator,
};
use vexc_result::{Error, Result};

use crate::{Backend, CompilationContext};

/// Streaming multiprocessor architectures PTX is generated for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GpuArch {
    Sm50,
    Sm60,
    Sm70,
    Sm75,
    Sm80,
    Sm86,
    Sm89,
    Sm90,
}

impl GpuArch {
    /// Newest architecture a device of compute capability `major.minor`
    /// runs, `None` for devices older than `sm_50`.
    pub fn from_compute_capability(major: u32, minor: u32) -> Option<GpuArch> {
        let cc = major * 10 + minor;
        [
            (90, GpuArch::Sm90),
            (89, GpuArch::Sm89),
            (86, GpuArch::Sm86),
            (80, GpuArch::Sm80),
            (75, GpuArch::Sm75),
            (70, GpuArch::Sm70),
            (60, GpuArch::Sm60),
            (50, GpuArch::Sm50),
        ]
        .into_iter()
        .find(|(min, _)| cc >= *min)
        .map(|(_, arch)| arch)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GpuArch::Sm50 => "sm_50",
            GpuArch::Sm60 => "sm_60",
            GpuArch::Sm70 => "sm_70",
            GpuArch::Sm75 => "sm_75",
            GpuArch::Sm80 => "sm_80",
            GpuArch::Sm86 => "sm_86",
            GpuArch::Sm89 => "sm_89",
            GpuArch::Sm90 => "sm_90",
        }
    }

    /// Oldest PTX ISA version accepting this target.
    pub fn ptx_version(self) -> (u32, u32) {
        match self {
            GpuArch::Sm50 => (4, 0),
            GpuArch::Sm60 => (5, 0),
            GpuArch::Sm70 => (6, 0),
            GpuArch::Sm75 => (6, 3),
            GpuArch::Sm80 => (7, 0),
            GpuArch::Sm86 => (7, 1),
            GpuArch::Sm89 | GpuArch::Sm90 => (7, 8),
        }
    }
}

impl fmt::Display for GpuArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device the GPU backend compiles for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GpuTarget {
    /// `None` when no device is present.
    pub compute_capability: Option<(u32, u32)>,
    /// Threads per block of the generated kernel.
    pub block_size: u32,
}

impl GpuTarget {
    pub const DEFAULT_BLOCK_SIZE: u32 = 1024;

    pub fn new(major: u32, minor: u32) -> Self {
        Self {
            compute_capability: Some((major, minor)),
            block_size: Self::DEFAULT_BLOCK_SIZE,
        }
    }

    /// Target of a host without a GPU.
    pub fn none() -> Self {
        Self {
            compute_capability: None,
            block_size: Self::DEFAULT_BLOCK_SIZE,
        }
    }

    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn device_arch(&self) -> Result<GpuArch> {
        let Some((major, minor)) = self.compute_capability else {
            return Err(Error::backend("no GPU device available"));
        };
        GpuArch::from_compute_capability(major, minor).ok_or_else(|| {
            Error::backend(format!("compute capability {major}.{minor} is not supported"))
        })
    }
}

impl Default for GpuTarget {
    fn default() -> Self {
        Self::none()
    }
}

/// Code generation settings for one device architecture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NvptxTargetMachine {
    arch: GpuArch,
}

impl NvptxTargetMachine {
    pub const TRIPLE: &'static str = "nvptx64-nvidia-cuda";
    pub const DATA_LAYOUT: &'static str = "e-i64:64-i128:128-v16:16-v32:32-n16:32:64";

    pub fn initialize(arch: GpuArch) -> Self {
        tracing::info!(
            %arch,
            triple = Self::TRIPLE,
            ptx_version = ?arch.ptx_version(),
            "initialized NVPTX target machine"
        );
        Self { arch }
    }

    pub fn arch(&self) -> GpuArch {
        self.arch
    }

    fn module_header(&self) -> String {
        let (major, minor) = self.arch.ptx_version();
        format!(
            "//\n// Generated by vexc for {}\n//\n\n.version {major}.{minor}\n.target {}\n.address_size 64\n",
            Self::TRIPLE,
            self.arch
        )
    }
}

/// Backend owning the target machine of one device.
#[derive(Debug)]
pub struct GpuBackend {
    target_machine: NvptxTargetMachine,
    /// Symbols of extension functions with a device build.
    device_functions: FxHashSet<String>,
    is_gpu_smem_used: bool,
    block_size: u32,
}

impl GpuBackend {
    pub fn new(
        extension_modules: &[ExtensionFunction],
        is_gpu_smem_used: bool,
        gpu_target: &GpuTarget,
    ) -> Result<Self> {
        let arch = gpu_target.device_arch()?;
        if gpu_target.block_size == 0 {
            return Err(Error::backend("GPU block size must be positive"));
        }
        Ok(Self {
            target_machine: NvptxTargetMachine::initialize(arch),
            device_functions: extension_modules
                .iter()
                .filter(|f| f.gpu)
                .map(|f| f.symbol.clone())
                .collect(),
            is_gpu_smem_used,
            block_size: gpu_target.block_size,
        })
    }

    pub fn target_machine(&self) -> &NvptxTargetMachine {
        &self.target_machine
    }
}

impl Backend for GpuBackend {
    fn device_type(&self) -> ExecutorDeviceType {
        ExecutorDeviceType::Gpu
    }

    fn generate_native_code(
        &self,
        routine: &RoutineModule,
        wrapper: &str,
        live_funcs: &[ExtensionFunction],
        options: &CompilationOptions,
    ) -> Result<Arc<dyn CompilationContext>> {
        for func in routine.extensions.iter().chain(live_funcs) {
            if !func.gpu || !self.device_functions.contains(&func.symbol) {
                return Err(Error::backend(format!(
                    "{func} has no device implementation"
                )));
            }
        }
        let shared_memory_bytes = if self.is_gpu_smem_used && options.allow_shared_memory {
            routine.num_outputs * 8 * self.block_size as usize
        } else {
            0
        };

        let mut ptx = self.target_machine.module_header();
        let mut writer = PtxWriter::new(&routine.func);
        writer.emit_row_function()?;
        for decl in writer.extern_declarations() {
            ptx.push('\n');
            ptx.push_str(&decl);
        }
        for func in writer.runtime_functions() {
            ptx.push('\n');
            ptx.push_str(device_runtime_function(func));
        }
        ptx.push('\n');
        ptx.push_str(&writer.finish());
        ptx.push('\n');
        ptx.push_str(&kernel_entry(
            wrapper,
            routine.func.name(),
            routine.num_outputs,
            self.block_size,
            shared_memory_bytes,
        ));

        tracing::debug!(
            arch = %self.target_machine.arch(),
            kernel = wrapper,
            bytes = ptx.len(),
            shared_memory_bytes,
            "generated PTX"
        );
        Ok(Arc::new(GpuCompilationContext {
            ptx,
            kernel_name: wrapper.to_string(),
            arch: self.target_machine.arch(),
            shared_memory_bytes,
            block_size: self.block_size,
            num_outputs: routine.num_outputs,
            input_types: routine.input_ir_types(),
        }))
    }
}

/// PTX module plus what the launcher needs to run its kernel.
#[derive(Clone, Debug)]
pub struct GpuCompilationContext {
    ptx: String,
    kernel_name: String,
    arch: GpuArch,
    shared_memory_bytes: usize,
    block_size: u32,
    num_outputs: usize,
    input_types: Vec<IrType>,
}

impl GpuCompilationContext {
    pub fn ptx(&self) -> &str {
        &self.ptx
    }

    pub fn arch(&self) -> GpuArch {
        self.arch
    }

    pub fn shared_memory_bytes(&self) -> usize {
        self.shared_memory_bytes
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Blocks needed to cover `num_rows` rows.
    pub fn grid_size(&self, num_rows: usize) -> usize {
        num_rows.div_ceil(self.block_size as usize)
    }

    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    pub fn input_types(&self) -> &[IrType] {
        &self.input_types
    }
}

impl CompilationContext for GpuCompilationContext {
    fn device_type(&self) -> ExecutorDeviceType {
        ExecutorDeviceType::Gpu
    }

    fn entry_name(&self) -> &str {
        &self.kernel_name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn kernel_entry(
    name: &str,
    row_func: &str,
    num_outputs: usize,
    block_size: u32,
    shared_memory_bytes: usize,
) -> String {
    let mut ptx = String::new();
    if shared_memory_bytes > 0 {
        ptx.push_str(&format!(
            ".shared .align 8 .b8 {name}_smem[{shared_memory_bytes}];\n\n"
        ));
    }
    ptx.push_str(&format!(
        "\
.visible .entry {name}(
    .param .u64 {name}_param_0,
    .param .u64 {name}_param_1,
    .param .u64 {name}_param_2,
    .param .u64 {name}_param_3
)
.maxntid {block_size}, 1, 1
{{
    .reg .pred %p<2>;
    .reg .b32 %r<5>;
    .reg .b64 %rd<10>;

    ld.param.u64 %rd1, [{name}_param_0];
    ld.param.u64 %rd2, [{name}_param_1];
    ld.param.u64 %rd3, [{name}_param_2];
    ld.param.u64 %rd4, [{name}_param_3];
    mov.u32 %r1, %ctaid.x;
    mov.u32 %r2, %ntid.x;
    mov.u32 %r3, %tid.x;
    cvt.u64.u32 %rd6, %r3;
    mad.wide.u32 %rd5, %r1, %r2, %rd6;
    setp.ge.u64 %p1, %rd5, %rd2;
    @%p1 bra $L__exit;
    mul.lo.s64 %rd7, %rd5, {out_stride};
    add.s64 %rd7, %rd3, %rd7;
    {{
    .param .b64 param0;
    st.param.b64 [param0], %rd1;
    .param .b64 param1;
    st.param.b64 [param1], %rd5;
    .param .b64 param2;
    st.param.b64 [param2], %rd7;
    .param .b32 retval0;
    call.uni (retval0), {row_func}, (param0, param1, param2);
    ld.param.b32 %r4, [retval0];
    }}
    shl.b64 %rd8, %rd5, 2;
    add.s64 %rd8, %rd4, %rd8;
    st.global.u32 [%rd8], %r4;
$L__exit:
    ret;
}}
",
        out_stride = num_outputs * 8
    ));
    ptx
}

/// Register class of an IR type.
fn reg_prefix(ty: IrType) -> &'static str {
    match ty {
        IrType::I1 => "%p",
        IrType::I8 | IrType::I16 => "%rs",
        IrType::I32 => "%r",
        IrType::I64 | IrType::Ptr => "%rd",
        IrType::F32 => "%f",
        IrType::F64 => "%fd",
        IrType::Void => "%void",
    }
}

fn mov_type(ty: IrType) -> &'static str {
    match ty {
        IrType::I1 => "pred",
        IrType::I8 | IrType::I16 => "b16",
        IrType::I32 => "b32",
        IrType::I64 | IrType::Ptr => "b64",
        IrType::F32 => "f32",
        IrType::F64 | IrType::Void => "f64",
    }
}

/// Signed integer type name as a conversion operand.
fn int_type(ty: IrType) -> &'static str {
    match ty {
        IrType::I8 => "s8",
        IrType::I16 => "s16",
        IrType::I32 => "s32",
        _ => "s64",
    }
}

/// Width of the register holding `ty`.
fn reg_bits(ty: IrType) -> u32 {
    match ty {
        IrType::I1 | IrType::I8 | IrType::I16 => 16,
        other => other.bits(),
    }
}

fn param_type(ty: IrType) -> &'static str {
    match ty {
        IrType::I64 | IrType::Ptr => "b64",
        IrType::F32 => "f32",
        IrType::F64 => "f64",
        _ => "b32",
    }
}

fn int_cmp(pred: IntPredicate) -> &'static str {
    match pred {
        IntPredicate::Eq => "eq",
        IntPredicate::Ne => "ne",
        IntPredicate::Slt => "lt",
        IntPredicate::Sle => "le",
        IntPredicate::Sgt => "gt",
        IntPredicate::Sge => "ge",
    }
}

fn float_cmp(pred: FloatPredicate) -> &'static str {
    match pred {
        FloatPredicate::Oeq => "eq",
        FloatPredicate::Une => "neu",
        FloatPredicate::Olt => "lt",
        FloatPredicate::Ole => "le",
        FloatPredicate::Ogt => "gt",
        FloatPredicate::Oge => "ge",
    }
}

struct PtxWriter<'a> {
    func: &'a Function,
    body: Vec<String>,
    runtime: Vec<RuntimeFn>,
    externs: Vec<(String, Vec<IrType>, IrType)>,
}

impl<'a> PtxWriter<'a> {
    fn new(func: &'a Function) -> Self {
        Self {
            func,
            body: Vec::new(),
            runtime: Vec::new(),
            externs: Vec::new(),
        }
    }

    fn emit(&mut self, line: impl Into<String>) {
        self.body.push(format!("    {}", line.into()));
    }

    fn label(&mut self, label: String) {
        self.body.push(label);
    }

    fn reg(&self, id: ValueId) -> String {
        format!("{}{}", reg_prefix(self.func.value_type(id)), id.0)
    }

    fn block_label(id: BlockId) -> String {
        format!("$L__BB{}", id.0)
    }

    /// Runtime primitives the routine calls, in declaration order.
    fn runtime_functions(&self) -> Vec<RuntimeFn> {
        RuntimeFn::ALL
            .into_iter()
            .filter(|f| self.runtime.contains(f))
            .collect()
    }

    fn extern_declarations(&self) -> Vec<String> {
        self.externs
            .iter()
            .map(|(symbol, params, ret)| {
                let params: Vec<String> = params
                    .iter()
                    .enumerate()
                    .map(|(i, ty)| format!(".param .{} {symbol}_param_{i}", param_type(*ty)))
                    .collect();
                format!(
                    ".extern .func (.param .{} func_retval0) {symbol}(\n    {}\n);\n",
                    param_type(*ret),
                    params.join(",\n    ")
                )
            })
            .collect()
    }

    fn emit_row_function(&mut self) -> Result<()> {
        for block in self.func.reverse_postorder() {
            let data = self.func.block(block);
            self.label(format!("{}: // {}", Self::block_label(block), data.name));
            for &id in &data.insts {
                self.emit_inst(id)?;
            }
            let Some(term) = data.term else {
                return Err(Error::backend(format!("block {} has no terminator", data.name)));
            };
            self.emit_terminator(block, term)?;
        }
        Ok(())
    }

    fn finish(self) -> String {
        let name = self.func.name();
        let n = self.func.num_values();
        let mut ptx = format!(
            "\
.visible .func (.param .b32 func_retval0) {name}(
    .param .b64 {name}_param_0,
    .param .b64 {name}_param_1,
    .param .b64 {name}_param_2
)
{{
    .reg .pred %p<{n}>;
    .reg .b16 %rs<{n}>;
    .reg .b32 %r<{n}>;
    .reg .b64 %rd<{n}>;
    .reg .f32 %f<{n}>;
    .reg .f64 %fd<{n}>;
    .reg .b16 %ts;
    .reg .b32 %tr;
    .reg .b64 %ta;
    .reg .b64 %col_buffers;
    .reg .b64 %pos;
    .reg .b64 %out;

    ld.param.u64 %col_buffers, [{name}_param_0];
    ld.param.u64 %pos, [{name}_param_1];
    ld.param.u64 %out, [{name}_param_2];
"
        );
        for line in self.body {
            ptx.push_str(&line);
            ptx.push('\n');
        }
        ptx.push_str("}\n");
        ptx
    }

    fn emit_inst(&mut self, id: ValueId) -> Result<()> {
        let data = self.func.value(id);
        let ty = data.ty;
        let dst = self.reg(id);
        match &data.inst {
            Inst::Phi { .. } => {}
            Inst::IConst { value, .. } => match ty {
                IrType::I1 => self.emit(format!("setp.ne.u32 {dst}, {}, 0;", value & 1)),
                IrType::I8 => self.emit(format!("mov.s16 {dst}, {};", *value as i8)),
                IrType::I16 => self.emit(format!("mov.s16 {dst}, {};", *value as i16)),
                IrType::I32 => self.emit(format!("mov.s32 {dst}, {};", *value as i32)),
                _ => self.emit(format!("mov.s64 {dst}, {value};")),
            },
            Inst::FConst { value, .. } => match ty {
                IrType::F32 => self.emit(format!(
                    "mov.f32 {dst}, 0f{:08X};",
                    (*value as f32).to_bits()
                )),
                _ => self.emit(format!("mov.f64 {dst}, 0d{:016X};", value.to_bits())),
            },
            Inst::Pos => self.emit(format!("mov.b64 {dst}, %pos;")),
            Inst::ColumnBuffer { slot } => {
                self.emit(format!("ld.global.u64 {dst}, [%col_buffers+{}];", slot * 8))
            }
            Inst::LoadColumn { slot, ty } => {
                self.emit(format!("ld.global.u64 %ta, [%col_buffers+{}];", slot * 8));
                self.emit(format!("mad.lo.s64 %ta, %pos, {}, %ta;", ty.bytes()));
                match ty {
                    IrType::I1 => {
                        self.emit("ld.global.u8 %ts, [%ta];");
                        self.emit(format!("setp.ne.u16 {dst}, %ts, 0;"));
                    }
                    IrType::F32 => self.emit(format!("ld.global.f32 {dst}, [%ta];")),
                    IrType::F64 => self.emit(format!("ld.global.f64 {dst}, [%ta];")),
                    IrType::Ptr => self.emit(format!("ld.global.u64 {dst}, [%ta];")),
                    int => self.emit(format!("ld.global.{} {dst}, [%ta];", int_type(*int))),
                }
            }
            Inst::Cast { op, value, to } => self.emit_cast(&dst, *op, *value, *to)?,
            Inst::Binary { op, lhs, rhs } => {
                let (l, r) = (self.reg(*lhs), self.reg(*rhs));
                let bits = reg_bits(ty);
                let text = match (op, ty) {
                    (BinOp::And, IrType::I1) => format!("and.pred {dst}, {l}, {r};"),
                    (BinOp::Or, IrType::I1) => format!("or.pred {dst}, {l}, {r};"),
                    (BinOp::Xor, IrType::I1) => format!("xor.pred {dst}, {l}, {r};"),
                    (_, IrType::I1) => {
                        return Err(Error::backend(format!("{} on i1", op.as_str())));
                    }
                    (BinOp::Add, _) => format!("add.s{bits} {dst}, {l}, {r};"),
                    (BinOp::Sub, _) => format!("sub.s{bits} {dst}, {l}, {r};"),
                    (BinOp::Mul, _) => format!("mul.lo.s{bits} {dst}, {l}, {r};"),
                    (BinOp::SDiv, _) => format!("div.s{bits} {dst}, {l}, {r};"),
                    (BinOp::SRem, _) => format!("rem.s{bits} {dst}, {l}, {r};"),
                    (BinOp::And, _) => format!("and.b{bits} {dst}, {l}, {r};"),
                    (BinOp::Or, _) => format!("or.b{bits} {dst}, {l}, {r};"),
                    (BinOp::Xor, _) => format!("xor.b{bits} {dst}, {l}, {r};"),
                    (BinOp::FAdd, _) => format!("add.rn.f{bits} {dst}, {l}, {r};"),
                    (BinOp::FSub, _) => format!("sub.rn.f{bits} {dst}, {l}, {r};"),
                    (BinOp::FMul, _) => format!("mul.rn.f{bits} {dst}, {l}, {r};"),
                    (BinOp::FDiv, _) => format!("div.rn.f{bits} {dst}, {l}, {r};"),
                };
                self.emit(text);
                if ty == IrType::I8 && !op.is_float() {
                    self.emit(format!("cvt.s16.s8 {dst}, {dst};"));
                }
            }
            Inst::Unary { op, value } => {
                let src = self.reg(*value);
                let bits = reg_bits(ty);
                match (op, ty) {
                    (UnOp::Not, IrType::I1) => self.emit(format!("not.pred {dst}, {src};")),
                    (UnOp::Not, _) => self.emit(format!("not.b{bits} {dst}, {src};")),
                    (UnOp::Neg, _) => {
                        self.emit(format!("neg.s{bits} {dst}, {src};"));
                        if ty == IrType::I8 {
                            self.emit(format!("cvt.s16.s8 {dst}, {dst};"));
                        }
                    }
                    (UnOp::FNeg, _) => self.emit(format!("neg.f{bits} {dst}, {src};")),
                }
            }
            Inst::ICmp { pred, lhs, rhs } => {
                let (l, r) = (self.reg(*lhs), self.reg(*rhs));
                let operand = self.func.value_type(*lhs);
                match (operand, pred) {
                    (IrType::I1, IntPredicate::Ne) => self.emit(format!("xor.pred {dst}, {l}, {r};")),
                    (IrType::I1, IntPredicate::Eq) => {
                        self.emit(format!("xor.pred {dst}, {l}, {r};"));
                        self.emit(format!("not.pred {dst}, {dst};"));
                    }
                    (IrType::I1, _) => {
                        return Err(Error::backend(format!(
                            "ordered comparison {} of i1 values",
                            pred.as_str()
                        )));
                    }
                    _ => self.emit(format!(
                        "setp.{}.s{} {dst}, {l}, {r};",
                        int_cmp(*pred),
                        reg_bits(operand)
                    )),
                }
            }
            Inst::FCmp { pred, lhs, rhs } => {
                let bits = self.func.value_type(*lhs).bits();
                let (l, r) = (self.reg(*lhs), self.reg(*rhs));
                self.emit(format!("setp.{}.f{bits} {dst}, {l}, {r};", float_cmp(*pred)));
            }
            Inst::Select {
                cond,
                if_true,
                if_false,
            } => {
                let c = self.reg(*cond);
                let (t, f) = (self.reg(*if_true), self.reg(*if_false));
                if ty == IrType::I1 {
                    self.emit(format!("@{c} mov.pred {dst}, {t};"));
                    self.emit(format!("@!{c} mov.pred {dst}, {f};"));
                } else {
                    self.emit(format!("selp.{} {dst}, {t}, {f}, {c};", mov_type(ty)));
                }
            }
            Inst::Call { func, args } => {
                if !self.runtime.contains(func) {
                    self.runtime.push(*func);
                }
                self.emit_call(&dst, func.name(), args, func.ret());
            }
            Inst::CallExtension { symbol, args, ret } => {
                if !self.externs.iter().any(|(s, ..)| s == symbol) {
                    let params = args.iter().map(|a| self.func.value_type(*a)).collect();
                    self.externs.push((symbol.clone(), params, *ret));
                }
                self.emit_call(&dst, symbol, args, *ret);
            }
            Inst::StoreOutput { index, value } => {
                let src = self.reg(*value);
                self.emit(format!("st.global.u64 [%out+{}], {src};", index * 8));
            }
        }
        Ok(())
    }

    fn emit_cast(&mut self, dst: &str, op: CastOp, value: ValueId, to: IrType) -> Result<()> {
        let from = self.func.value_type(value);
        let src = self.reg(value);
        match op {
            CastOp::SExt if from == IrType::I1 => {
                self.emit(format!("selp.s{} {dst}, -1, 0, {src};", reg_bits(to)))
            }
            CastOp::ZExt if from == IrType::I1 => {
                self.emit(format!("selp.u{} {dst}, 1, 0, {src};", reg_bits(to)))
            }
            CastOp::SExt => self.emit(format!("cvt.{}.{} {dst}, {src};", int_type(to), int_type(from))),
            CastOp::ZExt => self.emit(format!(
                "cvt.u{}.u{} {dst}, {src};",
                reg_bits(to),
                from.bits()
            )),
            CastOp::Trunc if to == IrType::I1 => {
                let (scratch, bits) = match reg_bits(from) {
                    16 => ("%ts", 16),
                    32 => ("%tr", 32),
                    _ => ("%ta", 64),
                };
                self.emit(format!("and.b{bits} {scratch}, {src}, 1;"));
                self.emit(format!("setp.ne.b{bits} {dst}, {scratch}, 0;"));
            }
            CastOp::Trunc if to == IrType::I8 => {
                if reg_bits(from) == 16 {
                    self.emit(format!("cvt.s16.s8 {dst}, {src};"));
                } else {
                    self.emit(format!("cvt.u16.u{} {dst}, {src};", from.bits()));
                    self.emit(format!("cvt.s16.s8 {dst}, {dst};"));
                }
            }
            CastOp::Trunc => self.emit(format!(
                "cvt.u{}.u{} {dst}, {src};",
                to.bits(),
                from.bits()
            )),
            CastOp::SiToFp => self.emit(format!(
                "cvt.rn.f{}.{} {dst}, {src};",
                to.bits(),
                int_type(from)
            )),
            CastOp::FpToSi => self.emit(format!(
                "cvt.rzi.{}.f{} {dst}, {src};",
                int_type(to),
                from.bits()
            )),
            CastOp::FpExt => self.emit(format!("cvt.f64.f32 {dst}, {src};")),
            CastOp::FpTrunc => self.emit(format!("cvt.rn.f32.f64 {dst}, {src};")),
            CastOp::Bitcast => {
                if from == IrType::I1 || to == IrType::I1 {
                    return Err(Error::backend("bitcast of i1"));
                }
                self.emit(format!("mov.b{} {dst}, {src};", to.bits()))
            }
        }
        Ok(())
    }

    fn emit_call(&mut self, dst: &str, callee: &str, args: &[ValueId], ret: IrType) {
        self.emit("{");
        let mut params = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let ty = self.func.value_type(*arg);
            let src = self.reg(*arg);
            let param = format!("param{i}");
            self.emit(format!(".param .{} {param};", param_type(ty)));
            match ty {
                IrType::I1 => {
                    self.emit(format!("selp.u32 %tr, 1, 0, {src};"));
                    self.emit(format!("st.param.b32 [{param}], %tr;"));
                }
                IrType::I8 | IrType::I16 => {
                    self.emit(format!("cvt.s32.s16 %tr, {src};"));
                    self.emit(format!("st.param.b32 [{param}], %tr;"));
                }
                other => self.emit(format!("st.param.{} [{param}], {src};", param_type(other))),
            }
            params.push(param);
        }
        self.emit(format!(".param .{} retval0;", param_type(ret)));
        self.emit(format!(
            "call.uni (retval0), {callee}, ({});",
            params.join(", ")
        ));
        match ret {
            IrType::I1 => {
                self.emit("ld.param.b32 %tr, [retval0];");
                self.emit(format!("setp.ne.s32 {dst}, %tr, 0;"));
            }
            IrType::I8 => {
                self.emit("ld.param.b32 %tr, [retval0];");
                self.emit(format!("cvt.u16.u32 {dst}, %tr;"));
                self.emit(format!("cvt.s16.s8 {dst}, {dst};"));
            }
            IrType::I16 => {
                self.emit("ld.param.b32 %tr, [retval0];");
                self.emit(format!("cvt.u16.u32 {dst}, %tr;"));
            }
            other => self.emit(format!(
                "ld.param.{} {dst}, [retval0];",
                param_type(other)
            )),
        }
        self.emit("}");
    }

    /// Copies into the phi registers of `to` along the edge from `from`.
    fn phi_moves(&self, from: BlockId, to: BlockId) -> Result<Vec<String>> {
        let mut moves = Vec::new();
        for &id in &self.func.block(to).insts {
            let Inst::Phi { incoming, ty } = &self.func.value(id).inst else {
                continue;
            };
            let Some((_, value)) = incoming.iter().find(|(block, _)| *block == from) else {
                return Err(Error::backend(format!(
                    "phi {id} has no value for {}",
                    self.func.block(from).name
                )));
            };
            moves.push(format!(
                "mov.{} {}, {};",
                mov_type(*ty),
                self.reg(id),
                self.reg(*value)
            ));
        }
        Ok(moves)
    }

    fn emit_terminator(&mut self, from: BlockId, term: Terminator) -> Result<()> {
        match term {
            Terminator::Br(target) => {
                for mv in self.phi_moves(from, target)? {
                    self.emit(mv);
                }
                self.emit(format!("bra.uni {};", Self::block_label(target)));
            }
            Terminator::CondBr {
                cond,
                if_true,
                if_false,
                ..
            } => {
                let c = self.reg(cond);
                let true_moves = self.phi_moves(from, if_true)?;
                let false_moves = self.phi_moves(from, if_false)?;
                let edge = format!("{}_T", Self::block_label(from));
                if true_moves.is_empty() {
                    self.emit(format!("@{c} bra {};", Self::block_label(if_true)));
                } else {
                    self.emit(format!("@{c} bra {edge};"));
                }
                for mv in false_moves {
                    self.emit(mv);
                }
                self.emit(format!("bra.uni {};", Self::block_label(if_false)));
                if !true_moves.is_empty() {
                    self.label(format!("{edge}:"));
                    for mv in true_moves {
                        self.emit(mv);
                    }
                    self.emit(format!("bra.uni {};", Self::block_label(if_true)));
                }
            }
            Terminator::Ret(status) => {
                let src = self.reg(status);
                self.emit(format!("st.param.b32 [func_retval0], {src};"));
                self.emit("ret;");
            }
        }
        Ok(())
    }
}

/// Device build of a runtime primitive. `i8` operands travel as sign-extended
/// 32-bit parameters.
fn device_runtime_function(func: RuntimeFn) -> &'static str {
    match func {
        RuntimeFn::LogicalAnd => LOGICAL_AND_PTX,
        RuntimeFn::LogicalOr => LOGICAL_OR_PTX,
        RuntimeFn::LogicalNot => LOGICAL_NOT_PTX,
        RuntimeFn::ArrayIsNull => ARRAY_IS_NULL_PTX,
    }
}

const LOGICAL_AND_PTX: &str = "\
.func (.param .b32 func_retval0) logical_and(
    .param .b32 logical_and_param_0,
    .param .b32 logical_and_param_1,
    .param .b32 logical_and_param_2
)
{
    .reg .pred %p<4>;
    .reg .b32 %r<5>;

    ld.param.b32 %r1, [logical_and_param_0];
    ld.param.b32 %r2, [logical_and_param_1];
    ld.param.b32 %r3, [logical_and_param_2];
    setp.eq.s32 %p1, %r1, 0;
    setp.eq.s32 %p2, %r2, 0;
    or.pred %p3, %p1, %p2;
    @%p3 bra $L__false;
    setp.eq.s32 %p1, %r1, %r3;
    setp.eq.s32 %p2, %r2, %r3;
    or.pred %p3, %p1, %p2;
    selp.b32 %r4, %r3, 1, %p3;
    st.param.b32 [func_retval0], %r4;
    ret;
$L__false:
    st.param.b32 [func_retval0], 0;
    ret;
}
";

const LOGICAL_OR_PTX: &str = "\
.func (.param .b32 func_retval0) logical_or(
    .param .b32 logical_or_param_0,
    .param .b32 logical_or_param_1,
    .param .b32 logical_or_param_2
)
{
    .reg .pred %p<4>;
    .reg .b32 %r<5>;

    ld.param.b32 %r1, [logical_or_param_0];
    ld.param.b32 %r2, [logical_or_param_1];
    ld.param.b32 %r3, [logical_or_param_2];
    setp.ne.s32 %p1, %r1, 0;
    setp.ne.s32 %p2, %r1, %r3;
    and.pred %p1, %p1, %p2;
    setp.ne.s32 %p2, %r2, 0;
    setp.ne.s32 %p3, %r2, %r3;
    and.pred %p2, %p2, %p3;
    or.pred %p1, %p1, %p2;
    @%p1 bra $L__true;
    setp.eq.s32 %p1, %r1, %r3;
    setp.eq.s32 %p2, %r2, %r3;
    or.pred %p3, %p1, %p2;
    selp.b32 %r4, %r3, 0, %p3;
    st.param.b32 [func_retval0], %r4;
    ret;
$L__true:
    st.param.b32 [func_retval0], 1;
    ret;
}
";

const LOGICAL_NOT_PTX: &str = "\
.func (.param .b32 func_retval0) logical_not(
    .param .b32 logical_not_param_0,
    .param .b32 logical_not_param_1
)
{
    .reg .pred %p<3>;
    .reg .b32 %r<4>;

    ld.param.b32 %r1, [logical_not_param_0];
    ld.param.b32 %r2, [logical_not_param_1];
    setp.eq.s32 %p1, %r1, 0;
    selp.b32 %r3, 1, 0, %p1;
    setp.eq.s32 %p2, %r1, %r2;
    selp.b32 %r3, %r1, %r3, %p2;
    st.param.b32 [func_retval0], %r3;
    ret;
}
";

const ARRAY_IS_NULL_PTX: &str = "\
.func (.param .b32 func_retval0) array_is_null(
    .param .b64 array_is_null_param_0,
    .param .b64 array_is_null_param_1
)
{
    .reg .pred %p<2>;
    .reg .b32 %r<3>;
    .reg .b64 %rd<3>;

    ld.param.u64 %rd1, [array_is_null_param_0];
    ld.param.u64 %rd2, [array_is_null_param_1];
    shl.b64 %rd2, %rd2, 2;
    add.s64 %rd1, %rd1, %rd2;
    ld.global.s32 %r1, [%rd1];
    setp.eq.s32 %p1, %r1, -1;
    selp.b32 %r2, 1, 0, %p1;
    st.param.b32 [func_retval0], %r2;
    ret;
}
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_capability_resolves_to_the_newest_arch() {
        assert_eq!(GpuArch::from_compute_capability(8, 6), Some(GpuArch::Sm86));
        assert_eq!(GpuArch::from_compute_capability(7, 2), Some(GpuArch::Sm70));
        assert_eq!(GpuArch::from_compute_capability(9, 0), Some(GpuArch::Sm90));
        assert_eq!(GpuArch::from_compute_capability(3, 5), None);
    }

    #[test]
    fn target_without_a_device_does_not_resolve() {
        assert!(GpuTarget::none().device_arch().is_err());
        assert!(GpuTarget::new(2, 1).device_arch().is_err());
        assert_eq!(GpuTarget::new(7, 5).device_arch().unwrap(), GpuArch::Sm75);
    }

    #[test]
    fn header_names_target_and_version() {
        let header = NvptxTargetMachine::initialize(GpuArch::Sm80).module_header();
        assert!(header.contains(".version 7.0"));
        assert!(header.contains(".target sm_80"));
        assert!(header.contains(".address_size 64"));
    }

    #[test]
    fn grid_covers_every_row() {
        let ctx = GpuCompilationContext {
            ptx: String::new(),
            kernel_name: "k".into(),
            arch: GpuArch::Sm70,
            shared_memory_bytes: 0,
            block_size: 256,
            num_outputs: 1,
            input_types: Vec::new(),
        };
        assert_eq!(ctx.grid_size(0), 0);
        assert_eq!(ctx.grid_size(256), 1);
        assert_eq!(ctx.grid_size(257), 2);
    }
}
