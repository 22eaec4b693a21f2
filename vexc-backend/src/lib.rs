//! Native code generation for vexc row routines.
//!
//! A [`Backend`] turns a [`RoutineModule`] into a [`CompilationContext`] the
//! execution kernel invokes. [`CpuBackend`] JIT-compiles the routine with
//! Cranelift and is stateless. [`GpuBackend`] owns the NVPTX target machine
//! for the device it was built for and emits a PTX module holding the row
//! function plus a kernel entry that runs it for every row.
//!
//! [`get_backend`] picks the implementation from the device kind.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use vexc_codegen::{CompilationOptions, ExecutorDeviceType, ExtensionFunction, RoutineModule};
use vexc_result::Result;

pub mod cpu;
pub mod gpu;

pub use cpu::{CpuBackend, CpuCompilationContext};
pub use gpu::{GpuArch, GpuBackend, GpuCompilationContext, GpuTarget, NvptxTargetMachine};

/// Name of the kernel entry wrapping the row function on devices that need
/// one.
pub const KERNEL_ENTRY_NAME: &str = "row_kernel";

/// Compiled routine ready for invocation. Dropping the last reference
/// releases the code it owns.
pub trait CompilationContext: Send + Sync + fmt::Debug {
    fn device_type(&self) -> ExecutorDeviceType;

    /// Symbol the execution kernel invokes.
    fn entry_name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

impl dyn CompilationContext {
    pub fn downcast_ref<T: CompilationContext + 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Code generation strategy for one device kind.
pub trait Backend: Send + Sync {
    fn device_type(&self) -> ExecutorDeviceType;

    /// Compile `routine` together with the extension functions it calls.
    ///
    /// `wrapper` names the kernel entry on devices that launch one; the CPU
    /// backend calls the row function directly and ignores it.
    fn generate_native_code(
        &self,
        routine: &RoutineModule,
        wrapper: &str,
        live_funcs: &[ExtensionFunction],
        options: &CompilationOptions,
    ) -> Result<Arc<dyn CompilationContext>>;
}

/// Backend for `device`.
///
/// `extension_modules` are the extension functions with device builds, only
/// consulted for GPU. Unlike the CPU backend, the GPU backend initializes its
/// target machine here.
///
/// # Panics
///
/// When a GPU backend is requested and `gpu_target` names no usable device.
pub fn get_backend(
    device: ExecutorDeviceType,
    extension_modules: &[ExtensionFunction],
    is_gpu_smem_used: bool,
    gpu_target: &GpuTarget,
) -> Arc<dyn Backend> {
    tracing::debug!(%device, is_gpu_smem_used, "selecting backend");
    match device {
        ExecutorDeviceType::Cpu => Arc::new(CpuBackend::new()),
        ExecutorDeviceType::Gpu => {
            match GpuBackend::new(extension_modules, is_gpu_smem_used, gpu_target) {
                Ok(backend) => Arc::new(backend),
                Err(err) => panic!("cannot resolve GPU device: {err}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_follows_the_device_kind() {
        let target = GpuTarget::new(8, 0);
        let cpu = get_backend(ExecutorDeviceType::Cpu, &[], false, &target);
        let gpu = get_backend(ExecutorDeviceType::Gpu, &[], false, &target);
        assert_eq!(cpu.device_type(), ExecutorDeviceType::Cpu);
        assert_eq!(gpu.device_type(), ExecutorDeviceType::Gpu);
    }

    #[test]
    #[should_panic(expected = "cannot resolve GPU device")]
    fn missing_gpu_is_fatal() {
        get_backend(ExecutorDeviceType::Gpu, &[], false, &GpuTarget::none());
    }

    #[test]
    fn cpu_does_not_need_a_device() {
        let cpu = get_backend(ExecutorDeviceType::Cpu, &[], true, &GpuTarget::none());
        assert_eq!(cpu.device_type(), ExecutorDeviceType::Cpu);
    }
}
