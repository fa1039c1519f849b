//! Type definitions for the engine
//!
//! - Runtime values (Value, ValueType)
//! - Declarations (FunctionTemplate, Param, ScopedVar, Expected)
//! - Activations (RunningFunction, FrameState)

pub mod frame;
pub mod template;
pub mod values;

pub use frame::{FrameState, RunningFunction};
pub use template::{Expected, FunctionTemplate, Param, ScopedVar, ScopedVarSpec};
pub use values::{Value, ValueType};
