// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # lodestar-emit
//!
//! Register bytecode emission for a JavaScript-family engine.
//!
//! ## Overview
//!
//! Given a numbered syntax tree, this crate:
//! - Binds every name to a register, a scope slot, a scope property or a
//!   dynamic lookup ([`binder`], [`scope`])
//! - Allocates registers with a strict temp stack ([`regalloc`])
//! - Lowers each function to instructions through a [`BytecodeWriter`]
//!   ([`emitter`], [`compiler`])
//!
//! Control flow through `finally`, iterator closing on early exit, and
//! generator suspension inside `try` are lowered to explicit instructions;
//! the output needs no unwinding tables.
//!
//! ## Quick Start
//!
//! ```rust
//! use lodestar_emit::ast::Program;
//! use lodestar_emit::bytecode::disasm;
//! use lodestar_emit::{EmitConfig, compile_program};
//!
//! let program = Program::from_json(
//!     r#"{ "body": [ { "kind": { "Expression": { "Literal": { "Number": 1.0 } } } } ] }"#,
//! )?;
//! let compiled = compile_program(&program, &EmitConfig::default())?;
//! println!("{}", disasm::disassemble(&compiled.body));
//! # Ok::<(), lodestar_emit::EmitError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod binder;
pub mod bytecode;
pub mod compiler;
pub mod config;
pub mod emitter;
pub mod error;
pub mod regalloc;
pub mod scope;

// Re-exports for convenience
pub use bytecode::{BytecodeBuffer, BytecodeWriter, FunctionBody, Instruction, OpCode};
pub use compiler::{CompiledFunction, Compiler};
pub use config::EmitConfig;
pub use error::{EmitError, Result};

/// Lowers `program` into an in-memory [`CompiledFunction`] tree.
pub fn compile_program(program: &ast::Program, config: &EmitConfig) -> Result<CompiledFunction> {
    Compiler::new(config.clone()).compile(program)
}
