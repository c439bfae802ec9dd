//! Intermediate representation for the WebAssembly-to-Rust generator.
//!
//! This crate holds the decoded module description consumed by the code
//! generator, a fluent builder for constructing modules in code, and the
//! binary wire format used to hand modules between tools.

mod builder;
pub mod codec;
mod instr;
mod module;
mod types;

pub use builder::*;
pub use codec::{DecodeError, decode, encode};
pub use instr::*;
pub use module::*;
pub use types::*;
