// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Compiler-internal failures.
//!
//! Errors in the *source program* (TDZ reads, const assignment, bad
//! destructuring sources) never surface here; they are emitted as
//! error-raising instructions. An [`EmitError`] means the compilation unit
//! itself is abandoned.

use thiserror::Error;

use crate::ast::{NodeId, ValidationError};
use crate::bytecode::{Label, Reg};

/// Result type for emission.
pub type Result<T> = std::result::Result<T, EmitError>;

/// Fatal errors that abort the current compilation unit.
#[derive(Debug, Error)]
pub enum EmitError {
    /// Tree nesting exceeded the configured limit
    #[error("syntax tree nested deeper than {limit} levels")]
    NestingTooDeep {
        /// Configured limit
        limit: usize,
    },

    /// A temp was released out of LIFO order, twice, or never acquired
    #[error("register discipline violated: released {released} but top of temp stack is {expected}")]
    RegisterDiscipline {
        /// Register being released
        released: Reg,
        /// Register that should have been released
        expected: String,
    },

    /// A permanent register was requested after temps were handed out
    #[error("permanent register requested after temp allocation began")]
    PermanentAfterTemp,

    /// A statement finished with temps still live
    #[error("statement leaked {count} temp register(s)")]
    TempLeak {
        /// Number of leaked temps
        count: u32,
    },

    /// A label was bound twice
    #[error("label {0} marked more than once")]
    LabelMarkedTwice(Label),

    /// A label was never bound
    #[error("label {0} defined but never marked")]
    UnmarkedLabel(Label),

    /// A label the writer never handed out
    #[error("label {0} was not defined by this writer")]
    UnknownLabel(Label),

    /// The binder produced no scope or function for a node
    #[error("no binding information for node {0:?}; was the tree numbered?")]
    UnboundNode(NodeId),

    /// Two scope-bearing nodes share an id
    #[error("node id {0:?} used by more than one node; renumber the tree")]
    DuplicateNode(NodeId),

    /// A break/continue whose target is not on the jump stack
    #[error("no enclosing target for {0}")]
    MissingJumpTarget(String),

    /// A scope-record end without a matching start
    #[error("unbalanced debugger scope records")]
    UnbalancedScopeRecord,

    /// The input tree failed validation
    #[error("invalid syntax tree: {0}")]
    InvalidTree(#[from] ValidationError),

    /// A syntax tree document could not be decoded
    #[error("malformed syntax tree document: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration could not be parsed or is out of range
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be read
    #[error("configuration file error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for EmitError {
    fn from(err: toml::de::Error) -> Self {
        EmitError::Config(err.to_string())
    }
}
