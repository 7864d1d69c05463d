//! The seam between the emitter and whatever stores instructions.

use super::{ConstIndex, Constant, Instruction, Label, NameIndex, Reg};
use crate::ast::Span;
use crate::error::Result;

/// What a debugger scope record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugScopeKind {
    /// Global scope
    Global,
    /// Function body or parameter scope
    Function,
    /// Block, loop head or switch scope
    Block,
    /// Catch parameter scope
    Catch,
    /// `with` object scope
    With,
    /// Class scope
    Class,
}

/// Where a variable lives, as far as a debugger needs to know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableLocation {
    /// In a frame register
    Register(Reg),
    /// In slot `n` of the scope's slot array
    Slot(u32),
    /// As a property of the scope object
    Property,
}

/// A variable visible in a debugger scope record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugVariable {
    /// Source name
    pub name: String,
    /// Storage
    pub location: VariableLocation,
    /// Whether declared const
    pub is_const: bool,
}

/// Debugger description of a scope, recorded when the scope is entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugScope {
    /// Scope kind
    pub kind: DebugScopeKind,
    /// Register holding the scope's runtime object, if instantiated
    pub object: Option<Reg>,
    /// Variables in declaration order
    pub variables: Vec<DebugVariable>,
}

/// Receives emitted code for one function.
///
/// Labels are defined before use and marked exactly once; `finish` fails if
/// a defined label was never marked. Scope records and loops nest.
pub trait BytecodeWriter {
    /// What `finish` produces.
    type Output;

    /// Allocates a new, unmarked label.
    fn define_label(&mut self) -> Label;

    /// Binds `label` to the current position.
    fn mark_label(&mut self, label: Label) -> Result<()>;

    /// Appends an instruction.
    fn emit(&mut self, instruction: Instruction);

    /// Number of instructions emitted so far.
    fn offset(&self) -> u32;

    /// Adds a constant, returning the existing index for duplicates.
    fn add_constant(&mut self, constant: Constant) -> ConstIndex;

    /// Interns a property or binding name.
    fn intern_name(&mut self, name: &str) -> NameIndex;

    /// Starts a statement at `span`.
    fn start_statement(&mut self, span: Span);

    /// Ends the innermost statement.
    fn end_statement(&mut self);

    /// Opens a debugger scope record at the current position.
    fn record_start_scope_object(&mut self, scope: DebugScope);

    /// Closes the innermost scope record.
    fn record_end_scope_object(&mut self) -> Result<()>;

    /// Opens a loop whose header is at the current position; returns its id.
    fn enter_loop(&mut self) -> u32;

    /// Closes the loop `id`.
    fn exit_loop(&mut self, id: u32);

    /// Discards everything written so far.
    fn reset(&mut self);

    /// Validates and hands over the finished function body.
    fn finish(&mut self) -> Result<Self::Output>;
}
