// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Declarative helper macros for the lodestar bytecode emitter.
//!
//! # Macros Overview
//!
//! ## Error Handling
//! - [`bail!`] - Early return with an error
//! - [`ensure!`] - Invariant check that returns an error instead of panicking
//!
//! ## Type Definitions
//! - [`index_newtype!`] - Typed arena/register index over `u32`
//! - [`opcodes!`] - Opcode enum with a name table and integer conversion
//!
//! ## Testing
//! - [`assert_matches!`] - Pattern assertion with a readable failure message
//! - [`assert_ok!`] / [`assert_err!`] - Result assertions
//! - [`assert_contains!`] - Substring assertion
//!
//! # Examples
//!
//! ```
//! use lodestar_macros::*;
//!
//! fn checked_release(top: u32, reg: u32) -> Result<(), String> {
//!     ensure!(top == reg, "released r{} while r{} is on top", reg, top);
//!     Ok(())
//! }
//!
//! assert!(checked_release(3, 3).is_ok());
//! assert!(checked_release(3, 2).is_err());
//! ```

#![warn(missing_docs)]

mod error;
mod tables;
mod testing;
mod types;
