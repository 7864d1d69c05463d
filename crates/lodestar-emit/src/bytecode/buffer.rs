//! In-memory writer.

use lodestar_macros::ensure;
use rustc_hash::FxHashMap;

use super::writer::{BytecodeWriter, DebugScope};
use super::{ConstIndex, Constant, ConstantKey, Instruction, Label, NameIndex, OpCode};
use crate::ast::Span;
use crate::error::{EmitError, Result};

/// Instruction range of one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementRange {
    /// Source span
    pub span: Span,
    /// First instruction
    pub start: u32,
    /// One past the last instruction
    pub end: u32,
}

/// Instruction range covered by a debugger scope record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRange {
    /// The recorded scope
    pub scope: DebugScope,
    /// First covered instruction
    pub start: u32,
    /// One past the last covered instruction
    pub end: u32,
}

/// Instruction range of a loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopRange {
    /// Loop id, as passed to `LoopHeader`
    pub id: u32,
    /// Header position
    pub start: u32,
    /// One past the loop's last instruction
    pub end: u32,
}

/// A finished function body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionBody {
    /// The instructions
    pub instructions: Vec<Instruction>,
    /// The constant pool
    pub constants: Vec<Constant>,
    /// Interned names
    pub names: Vec<String>,
    /// Instruction offset of every label
    pub labels: Vec<u32>,
    /// Statement boundaries
    pub statements: Vec<StatementRange>,
    /// Debugger scope records, in the order they were opened
    pub scopes: Vec<ScopeRange>,
    /// Loops, in the order they were entered
    pub loops: Vec<LoopRange>,
}

impl FunctionBody {
    /// The opcodes in order.
    pub fn opcodes(&self) -> Vec<OpCode> {
        self.instructions.iter().map(|i| i.opcode).collect()
    }

    /// How many times `opcode` occurs.
    pub fn count(&self, opcode: OpCode) -> usize {
        self.instructions.iter().filter(|i| i.opcode == opcode).count()
    }

    /// Whether `opcode` occurs at all.
    pub fn contains(&self, opcode: OpCode) -> bool {
        self.instructions.iter().any(|i| i.opcode == opcode)
    }

    /// Position of the first `opcode`.
    pub fn position(&self, opcode: OpCode) -> Option<usize> {
        self.instructions.iter().position(|i| i.opcode == opcode)
    }

    /// The interned name at `index`.
    pub fn name(&self, index: NameIndex) -> Option<&str> {
        self.names.get(index.index()).map(String::as_str)
    }

    /// The instruction offset `label` was bound to.
    pub fn label_offset(&self, label: Label) -> Option<u32> {
        self.labels.get(label.index()).copied()
    }
}

/// Collects instructions for one function in memory.
#[derive(Debug, Default)]
pub struct BytecodeBuffer {
    instructions: Vec<Instruction>,
    constants: Vec<Constant>,
    constant_index: FxHashMap<ConstantKey, ConstIndex>,
    names: Vec<String>,
    name_index: FxHashMap<String, NameIndex>,
    labels: Vec<Option<u32>>,
    statements: Vec<StatementRange>,
    open_statements: Vec<(Span, u32)>,
    scopes: Vec<ScopeRange>,
    open_scopes: Vec<usize>,
    loops: Vec<LoopRange>,
}

impl BytecodeBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Instructions written so far.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    fn here(&self) -> u32 {
        self.instructions.len() as u32
    }
}

impl BytecodeWriter for BytecodeBuffer {
    type Output = FunctionBody;

    fn define_label(&mut self) -> Label {
        let label = Label::new(self.labels.len());
        self.labels.push(None);
        label
    }

    fn mark_label(&mut self, label: Label) -> Result<()> {
        let here = self.here();
        match self.labels.get_mut(label.index()) {
            None => Err(EmitError::UnknownLabel(label)),
            Some(Some(_)) => Err(EmitError::LabelMarkedTwice(label)),
            Some(slot) => {
                *slot = Some(here);
                Ok(())
            }
        }
    }

    fn emit(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    fn offset(&self) -> u32 {
        self.here()
    }

    fn add_constant(&mut self, constant: Constant) -> ConstIndex {
        let key = ConstantKey::from(&constant);
        if let Some(&index) = self.constant_index.get(&key) {
            return index;
        }
        let index = ConstIndex::new(self.constants.len());
        self.constants.push(constant);
        self.constant_index.insert(key, index);
        index
    }

    fn intern_name(&mut self, name: &str) -> NameIndex {
        if let Some(&index) = self.name_index.get(name) {
            return index;
        }
        let index = NameIndex::new(self.names.len());
        self.names.push(name.to_string());
        self.name_index.insert(name.to_string(), index);
        index
    }

    fn start_statement(&mut self, span: Span) {
        self.open_statements.push((span, self.here()));
    }

    fn end_statement(&mut self) {
        if let Some((span, start)) = self.open_statements.pop() {
            let end = self.here();
            if end > start {
                self.statements.push(StatementRange { span, start, end });
            }
        }
    }

    fn record_start_scope_object(&mut self, scope: DebugScope) {
        self.open_scopes.push(self.scopes.len());
        let here = self.here();
        self.scopes.push(ScopeRange {
            scope,
            start: here,
            end: here,
        });
    }

    fn record_end_scope_object(&mut self) -> Result<()> {
        let index = self.open_scopes.pop().ok_or(EmitError::UnbalancedScopeRecord)?;
        self.scopes[index].end = self.here();
        Ok(())
    }

    fn enter_loop(&mut self) -> u32 {
        let id = self.loops.len() as u32;
        let here = self.here();
        self.loops.push(LoopRange { id, start: here, end: here });
        id
    }

    fn exit_loop(&mut self, id: u32) {
        let here = self.here();
        if let Some(range) = self.loops.get_mut(id as usize) {
            range.end = here;
        }
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn finish(&mut self) -> Result<FunctionBody> {
        ensure!(self.open_scopes.is_empty(), EmitError::UnbalancedScopeRecord);
        let mut labels = Vec::with_capacity(self.labels.len());
        for (index, offset) in self.labels.iter().enumerate() {
            labels.push(offset.ok_or(EmitError::UnmarkedLabel(Label::new(index)))?);
        }
        let taken = std::mem::take(self);
        Ok(FunctionBody {
            instructions: taken.instructions,
            constants: taken.constants,
            names: taken.names,
            labels,
            statements: taken.statements,
            scopes: taken.scopes,
            loops: taken.loops,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Reg;
    use crate::instr;
    use lodestar_macros::{assert_matches, assert_ok};

    #[test]
    fn test_constants_are_deduplicated() {
        let mut buffer = BytecodeBuffer::new();
        let a = buffer.add_constant(Constant::String("x".into()));
        let b = buffer.add_constant(Constant::Number(1.0));
        let c = buffer.add_constant(Constant::String("x".into()));
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(buffer.intern_name("f"), buffer.intern_name("f"));
    }

    #[test]
    fn test_label_marked_twice() {
        let mut buffer = BytecodeBuffer::new();
        let label = buffer.define_label();
        assert_ok!(buffer.mark_label(label));
        assert_matches!(buffer.mark_label(label), Err(EmitError::LabelMarkedTwice(_)));
    }

    #[test]
    fn test_unmarked_label_fails_finish() {
        let mut buffer = BytecodeBuffer::new();
        let label = buffer.define_label();
        buffer.emit(instr!(Br, label));
        assert_matches!(buffer.finish(), Err(EmitError::UnmarkedLabel(l)) if l == label);
    }

    #[test]
    fn test_ranges() {
        let mut buffer = BytecodeBuffer::new();
        buffer.start_statement(Span::new(0, 5));
        let id = buffer.enter_loop();
        buffer.emit(instr!(LoopHeader, id));
        buffer.emit(instr!(LdUndef, Reg(0)));
        buffer.exit_loop(id);
        buffer.end_statement();
        // empty statements leave no range
        buffer.start_statement(Span::new(6, 7));
        buffer.end_statement();
        let body = assert_ok!(buffer.finish());
        assert_eq!(body.statements.len(), 1);
        assert_eq!(body.statements[0].end, 2);
        assert_eq!(body.loops[0], LoopRange { id: 0, start: 0, end: 2 });
    }

    #[test]
    fn test_unbalanced_scope_record() {
        let mut buffer = BytecodeBuffer::new();
        assert_matches!(buffer.record_end_scope_object(), Err(EmitError::UnbalancedScopeRecord));
    }
}
