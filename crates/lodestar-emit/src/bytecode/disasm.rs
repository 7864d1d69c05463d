//! Textual disassembly.
//!
//! ```text
//! L0:
//!     3  BrFalse      L1, r2
//!     4  LdField      r3, r1, "next"
//! ```

use std::fmt::Write;

use super::{FunctionBody, Instruction, OpCode, Operand, RuntimeErrorKind};

/// One disassembled instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Labels bound to this offset
    pub labels: Vec<String>,
    /// Instruction offset
    pub offset: u32,
    /// Mnemonic
    pub mnemonic: &'static str,
    /// Rendered operands
    pub operands: Vec<String>,
}

fn operand(body: &FunctionBody, instruction: &Instruction, op: &Operand) -> String {
    match op {
        Operand::Reg(r) => r.to_string(),
        Operand::Label(l) => l.to_string(),
        Operand::Const(k) => match body.constants.get(k.index()) {
            Some(c) => c.to_string(),
            None => format!("k{}", k.0),
        },
        Operand::Name(n) => match body.name(*n) {
            Some(name) => format!("{:?}", name),
            None => format!("n{}", n.0),
        },
        Operand::Func(f) => format!("fn#{}", f.0),
        Operand::Imm(v) if instruction.opcode == OpCode::RuntimeError => {
            match RuntimeErrorKind::from_code(*v) {
                Some(kind) => kind.name().to_string(),
                None => format!("#{}", v),
            }
        }
        Operand::Imm(v) => format!("#{}", v),
    }
}

/// Disassembles `body` line by line.
pub fn lines(body: &FunctionBody) -> Vec<Line> {
    let mut by_offset: Vec<Vec<String>> = vec![Vec::new(); body.instructions.len() + 1];
    for (index, &offset) in body.labels.iter().enumerate() {
        if let Some(slot) = by_offset.get_mut(offset as usize) {
            slot.push(format!("L{}", index));
        }
    }

    let mut out: Vec<Line> = body
        .instructions
        .iter()
        .enumerate()
        .map(|(offset, instruction)| Line {
            labels: std::mem::take(&mut by_offset[offset]),
            offset: offset as u32,
            mnemonic: instruction.opcode.name(),
            operands: instruction
                .operands
                .iter()
                .map(|op| operand(body, instruction, op))
                .collect(),
        })
        .collect();

    // labels bound past the last instruction
    let trailing = std::mem::take(&mut by_offset[body.instructions.len()]);
    if !trailing.is_empty() {
        out.push(Line {
            labels: trailing,
            offset: body.instructions.len() as u32,
            mnemonic: "",
            operands: Vec::new(),
        });
    }
    out
}

/// Disassembles `body` into a string.
pub fn disassemble(body: &FunctionBody) -> String {
    let mut text = String::new();
    for line in lines(body) {
        for label in &line.labels {
            let _ = writeln!(text, "{}:", label);
        }
        if line.mnemonic.is_empty() {
            continue;
        }
        let _ = writeln!(
            text,
            "{:>5}  {:<24} {}",
            line.offset,
            line.mnemonic,
            line.operands.join(", ")
        );
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{BytecodeBuffer, BytecodeWriter, Constant, Reg};
    use crate::instr;
    use lodestar_macros::{assert_contains, assert_ok};

    #[test]
    fn test_disassemble() {
        let mut buffer = BytecodeBuffer::new();
        let done = buffer.define_label();
        let k = buffer.add_constant(Constant::Number(2.0));
        let name = buffer.intern_name("next");
        buffer.emit(instr!(LdConst, Reg(0), k));
        buffer.emit(instr!(BrFalse, done, Reg(0)));
        buffer.emit(instr!(LdField, Reg(1), Reg(0), name));
        assert_ok!(buffer.mark_label(done));
        buffer.emit(instr!(RuntimeError, RuntimeErrorKind::AssignmentToConst as u32));
        let body = assert_ok!(buffer.finish());

        let text = disassemble(&body);
        assert_contains!(text, "LdConst");
        assert_contains!(text, "r0, 2");
        assert_contains!(text, "\"next\"");
        assert_contains!(text, "L0:");
        assert_contains!(text, "assignment-to-const");
    }
}
