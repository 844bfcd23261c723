//! Transform module.
//!
//! In-place dataset transforms with error-bar propagation:
//! - Args: argument values, operands and parameter binding
//! - Propagate: error-propagation kernels
//! - Operations: one function per transform family
//! - Registry: the named catalog and bound invocables

pub mod args;
pub mod operations;
pub mod propagate;
pub mod registry;

pub use args::{Arg, BoundArgs, Call, Operand, Param, ParamDefault, ScalarFn};
pub use registry::{BoundTransform, Category, Registry, Target, TransformInfo, TransformSpec};
