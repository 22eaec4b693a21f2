//! Per-request compilation options and process-level compiler policy.

use std::fmt;
use std::str::FromStr;

use vexc_result::{Error, Result};

/// Device a routine is compiled for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ExecutorDeviceType {
    #[default]
    Cpu,
    Gpu,
}

impl fmt::Display for ExecutorDeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorDeviceType::Cpu => write!(f, "CPU"),
            ExecutorDeviceType::Gpu => write!(f, "GPU"),
        }
    }
}

impl FromStr for ExecutorDeviceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(ExecutorDeviceType::Cpu),
            "gpu" => Ok(ExecutorDeviceType::Gpu),
            other => Err(Error::InvalidArgumentError(format!(
                "unknown device type '{other}', expected 'cpu' or 'gpu'"
            ))),
        }
    }
}

/// What `EXPLAIN` asked to see instead of executing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ExplainType {
    #[default]
    Default,
    /// Print the routine IR after lowering.
    Optimized,
    ExecutionPlan,
}

/// Options for one compilation request.
///
/// Passed by reference into every codegen call and never changed while a
/// routine is being built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompilationOptions {
    pub device_type: ExecutorDeviceType,
    /// Materialize literals once at routine entry instead of at each use.
    pub hoist_literals: bool,
    /// Backend optimization effort, 0 (none) to 2 (speed).
    pub opt_level: u8,
    pub explain_type: ExplainType,
    /// Allow GPU kernels to aggregate in shared memory.
    pub allow_shared_memory: bool,
}

impl CompilationOptions {
    /// Defaults for `device`.
    pub fn defaults(device: ExecutorDeviceType) -> Self {
        Self {
            device_type: device,
            hoist_literals: true,
            opt_level: 2,
            explain_type: ExplainType::Default,
            allow_shared_memory: device == ExecutorDeviceType::Gpu,
        }
    }

    pub fn is_gpu(&self) -> bool {
        self.device_type == ExecutorDeviceType::Gpu
    }
}

impl Default for CompilationOptions {
    fn default() -> Self {
        Self::defaults(ExecutorDeviceType::Cpu)
    }
}

/// Process-level compiler policy.
///
/// Built once by the host engine and handed to every compilation entry point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Longest IR or SQL text emitted in a single log record.
    pub max_log_length: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self { max_log_length: 500 }
    }
}

impl CompilerConfig {
    pub fn with_max_log_length(mut self, len: usize) -> Self {
        self.max_log_length = len;
        self
    }

    /// `text` cut to [`CompilerConfig::max_log_length`] bytes on a char
    /// boundary.
    pub fn truncate_for_log<'t>(&self, text: &'t str) -> &'t str {
        if text.len() <= self.max_log_length {
            return text;
        }
        let mut end = self.max_log_length;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        &text[..end]
    }
}
