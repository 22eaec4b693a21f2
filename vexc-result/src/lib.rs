//! Error types and result definitions for the vexc expression compiler.
//!
//! Every crate in the workspace reports failures through the single [`Error`]
//! enum and the [`Result<T>`] alias, so errors cross crate boundaries with `?`
//! and callers can match on the variant to pick a fallback.
//!
//! # Error Categories
//!
//! - **Unsupported constructs** ([`Error::Unsupported`]): an expression variant with
//!   no codegen or textual form. Callers fall back (interpreter, CPU, no pushdown).
//! - **Numeric hazards** ([`Error::NumericOverflow`]): overflow while rescaling
//!   datetime precision or folding constants.
//! - **Binding failures** ([`Error::ExtensionFunctionBinding`]): no runtime
//!   function overload accepts the argument types.
//! - **Code generation / backend failures** ([`Error::Codegen`], [`Error::Backend`]).
//! - **Internal errors** ([`Error::Internal`]): bugs or unexpected states that are
//!   still safe to report instead of aborting.
//!
//! Planner invariant violations (unknown type tags, unsupported aggregate kinds,
//! an unresolvable device) are not represented here. Those panic.

pub mod error;
pub mod result;

pub use error::Error;
pub use result::Result;
