//! Bytecode definitions.
//!
//! Instructions are register-based: every operand names a register, a
//! label, a constant, an interned name, a child function or an immediate.

use lodestar_macros::index_newtype;
use num_bigint::BigInt;
use std::fmt;

mod buffer;
pub mod disasm;
mod opcode;
mod writer;

pub use buffer::{BytecodeBuffer, FunctionBody, LoopRange, ScopeRange, StatementRange};
pub use opcode::OpCode;
pub use writer::{BytecodeWriter, DebugScope, DebugScopeKind, DebugVariable, VariableLocation};

index_newtype! {
    /// A virtual register.
    pub struct Reg;
}

index_newtype! {
    /// A forward or backward branch target.
    pub struct Label;
}

index_newtype! {
    /// Index into a function's constant pool.
    pub struct ConstIndex;
}

index_newtype! {
    /// Index into a function's interned name table.
    pub struct NameIndex;
}

index_newtype! {
    /// Index of a child function, in creation order.
    pub struct FuncIndex;
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Completion type codes carried in the `ctype` register of a finally region.
pub mod completion {
    /// Fell off the end of the protected block
    pub const NORMAL: u32 = 0;
    /// An exception is pending in `cval`
    pub const THROW: u32 = 1;
    /// A return is pending with its value in `cval`
    pub const RETURN: u32 = 2;
    /// First code used for registered break/continue jumps
    pub const FIRST_JUMP: u32 = 3;
}

/// Kinds of error raised by `RuntimeError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum RuntimeErrorKind {
    /// ReferenceError: binding read before its declaration ran
    UseBeforeDeclaration = 0,
    /// TypeError: assignment to a constant binding
    AssignmentToConst = 1,
    /// SyntaxError detected late: `super()` outside a derived constructor
    InvalidSuperCall = 2,
}

impl RuntimeErrorKind {
    /// Decodes an immediate.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::UseBeforeDeclaration),
            1 => Some(Self::AssignmentToConst),
            2 => Some(Self::InvalidSuperCall),
            _ => None,
        }
    }

    /// The mnemonic used in disassembly.
    pub fn name(self) -> &'static str {
        match self {
            Self::UseBeforeDeclaration => "use-before-declaration",
            Self::AssignmentToConst => "assignment-to-const",
            Self::InvalidSuperCall => "invalid-super-call",
        }
    }
}

/// Instruction operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// Register
    Reg(Reg),
    /// Branch target
    Label(Label),
    /// Constant pool entry
    Const(ConstIndex),
    /// Interned name
    Name(NameIndex),
    /// Child function
    Func(FuncIndex),
    /// Immediate integer
    Imm(u32),
}

impl From<Reg> for Operand {
    fn from(reg: Reg) -> Self {
        Operand::Reg(reg)
    }
}

impl From<Label> for Operand {
    fn from(label: Label) -> Self {
        Operand::Label(label)
    }
}

impl From<ConstIndex> for Operand {
    fn from(index: ConstIndex) -> Self {
        Operand::Const(index)
    }
}

impl From<NameIndex> for Operand {
    fn from(index: NameIndex) -> Self {
        Operand::Name(index)
    }
}

impl From<FuncIndex> for Operand {
    fn from(index: FuncIndex) -> Self {
        Operand::Func(index)
    }
}

impl From<u32> for Operand {
    fn from(value: u32) -> Self {
        Operand::Imm(value)
    }
}

impl Operand {
    /// The register, if this operand is one.
    pub fn as_reg(self) -> Option<Reg> {
        match self {
            Operand::Reg(r) => Some(r),
            _ => None,
        }
    }

    /// The label, if this operand is one.
    pub fn as_label(self) -> Option<Label> {
        match self {
            Operand::Label(l) => Some(l),
            _ => None,
        }
    }
}

/// A single bytecode instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// The operation code
    pub opcode: OpCode,
    /// Operands in opcode order
    pub operands: Vec<Operand>,
}

impl Instruction {
    /// Creates an instruction.
    pub fn new(opcode: OpCode, operands: Vec<Operand>) -> Self {
        Self { opcode, operands }
    }

    /// Creates an instruction with no operands.
    pub fn simple(opcode: OpCode) -> Self {
        Self {
            opcode,
            operands: Vec::new(),
        }
    }

    /// Registers read or written by this instruction.
    pub fn registers(&self) -> impl Iterator<Item = Reg> + '_ {
        self.operands.iter().filter_map(|op| op.as_reg())
    }

    /// The branch target, for branches.
    pub fn target(&self) -> Option<Label> {
        if self.opcode.is_branch() || self.opcode == OpCode::ForInNext {
            self.operands.iter().find_map(|op| op.as_label())
        } else {
            None
        }
    }
}

/// Builds an [`Instruction`] from an opcode and operands convertible to [`Operand`].
///
/// ```
/// use lodestar_emit::bytecode::{OpCode, Reg};
/// use lodestar_emit::instr;
///
/// let mov = instr!(Mov, Reg(1), Reg(0));
/// assert_eq!(mov.opcode, OpCode::Mov);
/// assert_eq!(mov.operands.len(), 2);
/// ```
#[macro_export]
macro_rules! instr {
    ($op:ident $(, $operand:expr)* $(,)?) => {
        $crate::bytecode::Instruction::new(
            $crate::bytecode::OpCode::$op,
            vec![$($crate::bytecode::Operand::from($operand)),*],
        )
    };
}

/// A constant pool entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Number
    Number(f64),
    /// String
    String(String),
    /// Arbitrary precision integer
    BigInt(BigInt),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Number(n) => write!(f, "{}", n),
            Constant::String(s) => write!(f, "{:?}", s),
            Constant::BigInt(b) => write!(f, "{}n", b),
        }
    }
}

/// Dedup key for constants; numbers compare by bit pattern so `-0` and `NaN`
/// stay distinct entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ConstantKey {
    Number(u64),
    String(String),
    BigInt(BigInt),
}

impl From<&Constant> for ConstantKey {
    fn from(constant: &Constant) -> Self {
        match constant {
            Constant::Number(n) => ConstantKey::Number(n.to_bits()),
            Constant::String(s) => ConstantKey::String(s.clone()),
            Constant::BigInt(b) => ConstantKey::BigInt(b.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Reg(4).to_string(), "r4");
        assert_eq!(Label(0).to_string(), "L0");
        assert_eq!(Constant::BigInt(BigInt::from(12)).to_string(), "12n");
        assert_eq!(Constant::String("a".into()).to_string(), "\"a\"");
    }

    #[test]
    fn test_branch_target() {
        let br = instr!(BrTrue, Label(3), Reg(1));
        assert_eq!(br.target(), Some(Label(3)));
        let next = instr!(ForInNext, Reg(2), Reg(1), Label(7));
        assert_eq!(next.target(), Some(Label(7)));
        assert_eq!(instr!(Mov, Reg(1), Reg(2)).target(), None);
    }

    #[test]
    fn test_negative_zero_is_distinct_key() {
        let a = ConstantKey::from(&Constant::Number(0.0));
        let b = ConstantKey::from(&Constant::Number(-0.0));
        assert_ne!(a, b);
    }

    #[test]
    fn test_runtime_error_codes() {
        for kind in [
            RuntimeErrorKind::UseBeforeDeclaration,
            RuntimeErrorKind::AssignmentToConst,
            RuntimeErrorKind::InvalidSuperCall,
        ] {
            assert_eq!(RuntimeErrorKind::from_code(kind as u32), Some(kind));
        }
    }
}
