//! Runtime extension functions callable from SQL function operators.
//!
//! A function name maps to one or more typed overloads. Binding picks the
//! overload whose parameters the call's argument types convert to most
//! cheaply, restricted to device-capable overloads when compiling for GPU.

use std::fmt;

use rustc_hash::FxHashMap;
use vexc_result::{Error, Result};
use vexc_types::{Type, TypeId, TypeRef};

use crate::ir::IrType;

/// Host implementation of an overload.
#[derive(Clone, Copy, Debug)]
pub enum ExtensionImpl {
    UnaryI32(extern "C" fn(i32) -> i32),
    UnaryI64(extern "C" fn(i64) -> i64),
    UnaryF32(extern "C" fn(f32) -> f32),
    UnaryF64(extern "C" fn(f64) -> f64),
    BinaryI64(extern "C" fn(i64, i64) -> i64),
    BinaryF64(extern "C" fn(f64, f64) -> f64),
}

impl ExtensionImpl {
    pub fn arg_types(&self) -> &'static [IrType] {
        match self {
            ExtensionImpl::UnaryI32(_) => &[IrType::I32],
            ExtensionImpl::UnaryI64(_) => &[IrType::I64],
            ExtensionImpl::UnaryF32(_) => &[IrType::F32],
            ExtensionImpl::UnaryF64(_) => &[IrType::F64],
            ExtensionImpl::BinaryI64(_) => &[IrType::I64, IrType::I64],
            ExtensionImpl::BinaryF64(_) => &[IrType::F64, IrType::F64],
        }
    }

    pub fn ret_type(&self) -> IrType {
        match self {
            ExtensionImpl::UnaryI32(_) => IrType::I32,
            ExtensionImpl::UnaryI64(_) | ExtensionImpl::BinaryI64(_) => IrType::I64,
            ExtensionImpl::UnaryF32(_) => IrType::F32,
            ExtensionImpl::UnaryF64(_) | ExtensionImpl::BinaryF64(_) => IrType::F64,
        }
    }

    /// Entry point for JIT symbol registration.
    pub fn address(&self) -> *const u8 {
        match self {
            ExtensionImpl::UnaryI32(f) => *f as *const u8,
            ExtensionImpl::UnaryI64(f) => *f as *const u8,
            ExtensionImpl::UnaryF32(f) => *f as *const u8,
            ExtensionImpl::UnaryF64(f) => *f as *const u8,
            ExtensionImpl::BinaryI64(f) => *f as *const u8,
            ExtensionImpl::BinaryF64(f) => *f as *const u8,
        }
    }
}

/// One overload of a SQL-callable function.
#[derive(Clone, Debug)]
pub struct ExtensionFunction {
    /// Upper-case SQL name.
    pub sql_name: String,
    /// Link name of this overload, unique across the registry.
    pub symbol: String,
    pub imp: ExtensionImpl,
    /// Whether a device implementation exists.
    pub gpu: bool,
}

impl ExtensionFunction {
    pub fn new(sql_name: &str, symbol: &str, imp: ExtensionImpl, gpu: bool) -> Self {
        Self {
            sql_name: sql_name.to_ascii_uppercase(),
            symbol: symbol.to_string(),
            imp,
            gpu,
        }
    }

    pub fn arg_types(&self) -> &'static [IrType] {
        self.imp.arg_types()
    }

    pub fn ret_type(&self) -> IrType {
        self.imp.ret_type()
    }
}

impl fmt::Display for ExtensionFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.sql_name)?;
        for (i, ty) in self.arg_types().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{ty}")?;
        }
        write!(f, ") -> {}", self.ret_type())
    }
}

/// Registered overloads by upper-case SQL name.
#[derive(Clone, Debug, Default)]
pub struct ExtensionRegistry {
    functions: FxHashMap<String, Vec<ExtensionFunction>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the math built-ins.
    pub fn with_builtins() -> Self {
        use ExtensionImpl::*;
        let mut registry = Self::new();
        registry
            .register(ExtensionFunction::new("ABS", "abs_i32", UnaryI32(abs_i32), true))
            .register(ExtensionFunction::new("ABS", "abs_i64", UnaryI64(abs_i64), true))
            .register(ExtensionFunction::new("ABS", "abs_f32", UnaryF32(abs_f32), true))
            .register(ExtensionFunction::new("ABS", "abs_f64", UnaryF64(abs_f64), true))
            .register(ExtensionFunction::new("FLOOR", "floor_f32", UnaryF32(floor_f32), true))
            .register(ExtensionFunction::new("FLOOR", "floor_f64", UnaryF64(floor_f64), true))
            .register(ExtensionFunction::new("CEIL", "ceil_f32", UnaryF32(ceil_f32), true))
            .register(ExtensionFunction::new("CEIL", "ceil_f64", UnaryF64(ceil_f64), true))
            .register(ExtensionFunction::new("SQRT", "sqrt_f64", UnaryF64(sqrt_f64), true))
            .register(ExtensionFunction::new("LN", "ln_f64", UnaryF64(ln_f64), false))
            .register(ExtensionFunction::new("EXP", "exp_f64", UnaryF64(exp_f64), false))
            .register(ExtensionFunction::new("POWER", "power_f64", BinaryF64(power_f64), false))
            .register(ExtensionFunction::new("GCD", "gcd_i64", BinaryI64(gcd_i64), true));
        registry
    }

    pub fn register(&mut self, func: ExtensionFunction) -> &mut Self {
        self.functions
            .entry(func.sql_name.clone())
            .or_default()
            .push(func);
        self
    }

    pub fn overloads(&self, name: &str) -> &[ExtensionFunction] {
        self.functions
            .get(&name.to_ascii_uppercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Overload with the given link name.
    pub fn by_symbol(&self, symbol: &str) -> Option<&ExtensionFunction> {
        self.iter().find(|f| f.symbol == symbol)
    }

    /// Every registered overload, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &ExtensionFunction> + '_ {
        self.functions.values().flatten()
    }

    /// Pick the overload of `name` that `args` convert to most cheaply.
    ///
    /// Exact matches cost nothing; integer widening, integer or decimal to
    /// float, and float widening add increasing penalties. Ties go to the
    /// overload registered first. With `is_gpu` only device-capable overloads
    /// are considered.
    pub fn bind_function(
        &self,
        name: &str,
        args: &[TypeRef],
        is_gpu: bool,
    ) -> Result<ExtensionFunction> {
        let mut best: Option<(u32, &ExtensionFunction)> = None;
        for candidate in self.overloads(name) {
            if is_gpu && !candidate.gpu {
                continue;
            }
            let params = candidate.arg_types();
            if params.len() != args.len() {
                continue;
            }
            let penalty: Option<u32> = args
                .iter()
                .zip(params)
                .map(|(arg, param)| conversion_penalty(arg, *param))
                .sum();
            if let Some(penalty) = penalty
                && best.is_none_or(|(p, _)| penalty < p)
            {
                best = Some((penalty, candidate));
            }
        }
        match best {
            Some((penalty, func)) => {
                tracing::trace!(function = %func, penalty, "bound extension function");
                Ok(func.clone())
            }
            None => {
                let types: Vec<String> = args.iter().map(|t| t.sql_name()).collect();
                let device = if is_gpu { " on GPU" } else { "" };
                Err(Error::ExtensionFunctionBinding(format!(
                    "Function {}({}) not supported{device}.",
                    name.to_ascii_uppercase(),
                    types.join(", ")
                )))
            }
        }
    }
}

/// Cost of passing a value of `arg` where `param` is expected.
fn conversion_penalty(arg: &Type, param: IrType) -> Option<u32> {
    match arg.id() {
        TypeId::Null => Some(1),
        TypeId::Integer | TypeId::Boolean => {
            let size = arg.size();
            match param {
                IrType::I32 if size == 4 => Some(0),
                IrType::I32 if size < 4 => Some(1),
                IrType::I64 if size == 8 => Some(0),
                IrType::I64 => Some(2),
                IrType::F64 => Some(3),
                IrType::F32 => Some(4),
                _ => None,
            }
        }
        TypeId::Decimal => match param {
            IrType::F64 => Some(3),
            _ => None,
        },
        TypeId::FloatingPoint => match (arg.size(), param) {
            (4, IrType::F32) | (8, IrType::F64) => Some(0),
            (4, IrType::F64) => Some(1),
            _ => None,
        },
        _ => None,
    }
}

extern "C" fn abs_i32(x: i32) -> i32 {
    x.wrapping_abs()
}

extern "C" fn abs_i64(x: i64) -> i64 {
    x.wrapping_abs()
}

extern "C" fn abs_f32(x: f32) -> f32 {
    x.abs()
}

extern "C" fn abs_f64(x: f64) -> f64 {
    x.abs()
}

extern "C" fn floor_f32(x: f32) -> f32 {
    x.floor()
}

extern "C" fn floor_f64(x: f64) -> f64 {
    x.floor()
}

extern "C" fn ceil_f32(x: f32) -> f32 {
    x.ceil()
}

extern "C" fn ceil_f64(x: f64) -> f64 {
    x.ceil()
}

extern "C" fn sqrt_f64(x: f64) -> f64 {
    x.sqrt()
}

extern "C" fn ln_f64(x: f64) -> f64 {
    x.ln()
}

extern "C" fn exp_f64(x: f64) -> f64 {
    x.exp()
}

extern "C" fn power_f64(x: f64, y: f64) -> f64 {
    x.powf(y)
}

extern "C" fn gcd_i64(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use vexc_types::TypeContext;

    #[test]
    fn exact_overload_wins() {
        let ctx = TypeContext::global();
        let registry = ExtensionRegistry::with_builtins();
        let bound = registry
            .bind_function("abs", &[ctx.int64(true)], false)
            .unwrap();
        assert_eq!(bound.symbol, "abs_i64");
        let bound = registry
            .bind_function("ABS", &[ctx.fp32(false)], false)
            .unwrap();
        assert_eq!(bound.symbol, "abs_f32");
    }

    #[test]
    fn narrow_integers_widen_to_i32() {
        let ctx = TypeContext::global();
        let registry = ExtensionRegistry::with_builtins();
        let bound = registry
            .bind_function("ABS", &[ctx.int16(true)], false)
            .unwrap();
        assert_eq!(bound.symbol, "abs_i32");
    }

    #[test]
    fn integers_convert_to_double_when_needed() {
        let ctx = TypeContext::global();
        let registry = ExtensionRegistry::with_builtins();
        let bound = registry
            .bind_function("power", &[ctx.int32(false), ctx.fp32(false)], false)
            .unwrap();
        assert_eq!(bound.symbol, "power_f64");
    }

    #[test]
    fn cpu_only_functions_do_not_bind_on_gpu() {
        let ctx = TypeContext::global();
        let registry = ExtensionRegistry::with_builtins();
        let err = registry
            .bind_function("ln", &[ctx.fp64(false)], true)
            .unwrap_err();
        match err {
            Error::ExtensionFunctionBinding(msg) => {
                assert_eq!(msg, "Function LN(DOUBLE) not supported on GPU.")
            }
            other => panic!("unexpected error {other}"),
        }
        assert!(registry.bind_function("ln", &[ctx.fp64(false)], false).is_ok());
    }

    #[test]
    fn unknown_signature_is_reported() {
        let ctx = TypeContext::global();
        let registry = ExtensionRegistry::with_builtins();
        let err = registry
            .bind_function("sqrt", &[ctx.text(false)], false)
            .unwrap_err();
        assert!(matches!(err, Error::ExtensionFunctionBinding(ref m) if m == "Function SQRT(TEXT) not supported."));
    }

    #[test]
    fn gcd_handles_signs() {
        assert_eq!(gcd_i64(-12, 18), 6);
        assert_eq!(gcd_i64(0, 5), 5);
    }
}
