use std::sync::Arc;

use vexc_aggregate::{
    QueryDescriptionType, QueryMemoryLayout, init_agg_val_vec, target_infos_for_exprs,
};
use vexc_backend::{
    CompilationContext, CpuCompilationContext, GpuTarget, KERNEL_ENTRY_NAME, get_backend,
};
use vexc_codegen::{
    ColumnBuffers, CompilationOptions, CompilerConfig, ERR_OVERFLOW_OR_UNDERFLOW, ExecutorDeviceType,
    ExplainType,
    ExtensionFunction, ExtensionRegistry, RoutineModule, RowOutput, compile_execution_unit,
};
use vexc_expr::{ExecutionUnit, ExprArena, ExprId, TargetInfo};
use vexc_result::{Error, Result};
use vexc_types::TypeRef;

/// Compiles execution units into native routines plus the aggregate slot
/// initializers the execution kernel starts from.
#[derive(Clone, Debug)]
pub struct QueryCompiler {
    config: CompilerConfig,
    registry: ExtensionRegistry,
    gpu_target: GpuTarget,
    bigint_count: bool,
}

impl QueryCompiler {
    /// Compiler with the built-in extension functions and no GPU.
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            registry: ExtensionRegistry::with_builtins(),
            gpu_target: GpuTarget::none(),
            bigint_count: false,
        }
    }

    pub fn with_registry(mut self, registry: ExtensionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_gpu_target(mut self, gpu_target: GpuTarget) -> Self {
        self.gpu_target = gpu_target;
        self
    }

    /// Count into 64-bit slots instead of 32-bit ones.
    pub fn with_bigint_count(mut self, bigint_count: bool) -> Self {
        self.bigint_count = bigint_count;
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    /// Generate, lower and compile the row routine of `unit` for
    /// `options.device_type`.
    ///
    /// A GPU request on a host without a usable device fails with
    /// [`vexc_result::Error::Backend`]; see [`QueryCompiler::compile_or_fallback`].
    pub fn compile(
        &self,
        arena: &ExprArena,
        unit: &ExecutionUnit,
        layout: &dyn QueryMemoryLayout,
        options: &CompilationOptions,
    ) -> Result<CompiledQuery> {
        let routine = compile_execution_unit(arena, unit, options, &self.registry)?;
        if options.explain_type == ExplainType::Optimized {
            let ir = routine.func.to_string();
            tracing::info!(ir = self.config.truncate_for_log(&ir), "row routine IR");
        }

        let quals: Vec<ExprId> = unit.all_quals().collect();
        let target_infos =
            target_infos_for_exprs(arena, &unit.target_exprs, &quals, layout, self.bigint_count);
        let init_agg_vals = init_agg_val_vec(&target_infos, layout);

        if options.is_gpu() {
            self.gpu_target.device_arch()?;
        }
        let is_gpu_smem_used = layout.query_description_type()
            == QueryDescriptionType::NonGroupedAggregate
            && target_infos.iter().any(|t| t.is_agg);
        let extension_modules: Vec<ExtensionFunction> =
            self.registry.iter().filter(|f| f.gpu).cloned().collect();
        let backend = get_backend(
            options.device_type,
            &extension_modules,
            is_gpu_smem_used,
            &self.gpu_target,
        );
        let context = backend.generate_native_code(&routine, KERNEL_ENTRY_NAME, &[], options)?;

        tracing::debug!(
            device = %options.device_type,
            targets = target_infos.len(),
            slots = init_agg_vals.len(),
            short_circuit = routine.short_circuit(),
            "compiled query"
        );
        Ok(CompiledQuery {
            context,
            init_agg_vals,
            target_infos,
            short_circuit: routine.short_circuit(),
            routine,
        })
    }

    /// [`QueryCompiler::compile`], retrying on the CPU when a GPU compile
    /// fails in a way the CPU path can still handle: no usable device, a
    /// construct the device cannot run, or a function with host-only
    /// overloads.
    pub fn compile_or_fallback(
        &self,
        arena: &ExprArena,
        unit: &ExecutionUnit,
        layout: &dyn QueryMemoryLayout,
        options: &CompilationOptions,
    ) -> Result<CompiledQuery> {
        match self.compile(arena, unit, layout, options) {
            Err(err) if options.is_gpu() && retry_on_cpu(&err) => {
                tracing::warn!(%err, "GPU compilation failed, retrying on CPU");
                let cpu = CompilationOptions {
                    device_type: ExecutorDeviceType::Cpu,
                    allow_shared_memory: false,
                    ..options.clone()
                };
                self.compile(arena, unit, layout, &cpu)
            }
            other => other,
        }
    }
}

fn retry_on_cpu(err: &Error) -> bool {
    err.is_fallback_candidate() || matches!(err, Error::ExtensionFunctionBinding(_))
}

impl Default for QueryCompiler {
    fn default() -> Self {
        Self::new(CompilerConfig::default())
    }
}

/// A compiled execution unit.
#[derive(Debug)]
pub struct CompiledQuery {
    pub context: Arc<dyn CompilationContext>,
    /// Initial value of every result slot.
    pub init_agg_vals: Vec<i64>,
    pub target_infos: Vec<TargetInfo>,
    /// Whether deferred quals were split off the primary ones.
    pub short_circuit: bool,
    routine: RoutineModule,
}

impl CompiledQuery {
    pub fn device_type(&self) -> ExecutorDeviceType {
        self.context.device_type()
    }

    pub fn routine(&self) -> &RoutineModule {
        &self.routine
    }

    /// Logical types of the input columns, in buffer slot order.
    pub fn input_types(&self) -> Vec<TypeRef> {
        self.routine.input_columns.iter().map(|c| c.ty).collect()
    }

    /// Evaluate every row of `buffers` on the host.
    ///
    /// CPU queries run their native code. Device kernels are launched by the
    /// host runtime, so GPU queries are evaluated by the interpreter here.
    /// A row whose datetime cast overflowed fails the whole run with
    /// [`Error::NumericOverflow`]; other statuses are returned per row.
    pub fn run(&self, buffers: &ColumnBuffers) -> Result<Vec<RowOutput>> {
        let rows = match self.context.downcast_ref::<CpuCompilationContext>() {
            Some(cpu) => cpu.run(buffers)?,
            None => {
                tracing::debug!(device = %self.device_type(), "interpreting row routine");
                self.routine.interpret(buffers)?
            }
        };
        if let Some(pos) = rows
            .iter()
            .position(|row| row.status == ERR_OVERFLOW_OR_UNDERFLOW)
        {
            return Err(Error::NumericOverflow(format!(
                "row {pos}: datetime value out of range for the target precision"
            )));
        }
        Ok(rows)
    }
}
