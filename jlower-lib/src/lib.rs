#![deny(clippy::items_after_statements)]
#![deny(clippy::needless_borrow)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![deny(clippy::redundant_field_names)]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![deny(unconditional_recursion)]

//! Lowers JVM bytecode into a register-based three-address IR.
//!
//! Each method's operand stack is simulated symbolically; values are held as unevaluated
//! expressions for as long as possible and only spilled into registers when a later instruction,
//! a control-flow join or a side effect requires it. The result is a [`Body`] of statements over
//! registers, constants and expressions, with exception traps and control-flow edges.

mod assemble;
pub mod error;
mod frame;
pub mod frontend;
mod handlers;
pub mod ir;
pub mod jvmtypes;
mod locals;
mod lower;
pub mod method;
mod rules;
mod stack;
pub mod types;

use std::error::Error;

pub use error::{ErrorKind, LoweringError};
pub use ir::Body;
pub use lower::{lower_method, lower_method_with};
pub use method::{LoweringOptions, MethodInput};

pub type GeneralResult<T> = std::result::Result<T, Box<dyn Error>>;
