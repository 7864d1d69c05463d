//! Conditions lowered straight to branches.
//!
//! A condition gets a true label, a false label and the side that falls
//! through. Comparisons fuse with their branch; `!`, `&&` and `||` never
//! materialize a boolean.

use num_traits::Zero;

use super::*;

/// Which outcome continues at the next instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Fallthrough {
    True,
    False,
}

impl Fallthrough {
    fn flip(self) -> Self {
        match self {
            Fallthrough::True => Fallthrough::False,
            Fallthrough::False => Fallthrough::True,
        }
    }
}

/// Truthiness of a literal known at compile time.
pub(super) fn literal_truthiness(literal: &Literal) -> Option<bool> {
    match literal {
        Literal::Number(n) => Some(*n != 0.0 && !n.is_nan()),
        Literal::String(s) => Some(!s.is_empty()),
        Literal::Boolean(b) => Some(*b),
        Literal::Null | Literal::Undefined => Some(false),
        Literal::BigInt(digits) => parse_bigint_literal(digits).map(|n| !n.is_zero()),
        Literal::RegExp { .. } => Some(true),
    }
}

impl<'a, 'w, W: BytecodeWriter> FunctionEmitter<'a, 'w, W> {
    /// The truthiness of `expr` when branch folding may rely on it.
    pub(super) fn constant_truthiness(&self, expr: &Expression) -> Option<bool> {
        match expr {
            Expression::Literal(literal) if self.config.fold_constant_branches => literal_truthiness(literal),
            _ => None,
        }
    }

    /// Branches to `on_true` or `on_false`; the side named by `fallthrough`
    /// must be marked right after by the caller.
    pub(super) fn emit_condition(
        &mut self,
        expr: &'a Expression,
        on_true: Label,
        on_false: Label,
        fallthrough: Fallthrough,
    ) -> Result<()> {
        self.descend()?;
        let result = self.condition_kind(expr, on_true, on_false, fallthrough);
        self.ascend();
        result
    }

    fn condition_kind(
        &mut self,
        expr: &'a Expression,
        on_true: Label,
        on_false: Label,
        fallthrough: Fallthrough,
    ) -> Result<()> {
        if let Some(truthy) = self.constant_truthiness(expr) {
            match (truthy, fallthrough) {
                (true, Fallthrough::False) => self.emit_instr(instr!(Br, on_true)),
                (false, Fallthrough::True) => self.emit_instr(instr!(Br, on_false)),
                _ => {}
            }
            return Ok(());
        }

        if let Expression::Binary(binary) = expr
            && let Some(branches) = fused_branch(binary.operator)
        {
            return self.emit_compare_branch(binary, branches, on_true, on_false, fallthrough);
        }

        match expr {
            Expression::Unary(unary) if unary.operator == UnaryOperator::LogicalNot => {
                self.emit_condition(&unary.argument, on_false, on_true, fallthrough.flip())
            }
            Expression::Binary(binary) if binary.operator == BinaryOperator::LogicalAnd => {
                let right = self.label();
                self.emit_condition(&binary.left, right, on_false, Fallthrough::True)?;
                self.mark(right)?;
                self.emit_condition(&binary.right, on_true, on_false, fallthrough)
            }
            Expression::Binary(binary) if binary.operator == BinaryOperator::LogicalOr => {
                let right = self.label();
                self.emit_condition(&binary.left, on_true, right, Fallthrough::False)?;
                self.mark(right)?;
                self.emit_condition(&binary.right, on_true, on_false, fallthrough)
            }
            _ => {
                let value = self.emit_held(expr)?;
                match fallthrough {
                    Fallthrough::True => self.emit_instr(instr!(BrFalse, on_false, value.reg)),
                    Fallthrough::False => self.emit_instr(instr!(BrTrue, on_true, value.reg)),
                }
                self.drop_held(value)
            }
        }
    }

    fn emit_compare_branch(
        &mut self,
        binary: &'a BinaryExpression,
        (branch, inverse): (OpCode, Option<OpCode>),
        on_true: Label,
        on_false: Label,
        fallthrough: Fallthrough,
    ) -> Result<()> {
        let left = self.emit_operand(&binary.left, may_mutate(&binary.right))?;
        let right = self.emit_held(&binary.right)?;
        let operands = |label: Label| vec![label.into(), left.reg.into(), right.reg.into()];
        match (fallthrough, inverse) {
            (Fallthrough::False, _) => self.emit_instr(Instruction::new(branch, operands(on_true))),
            (Fallthrough::True, Some(inverse)) => self.emit_instr(Instruction::new(inverse, operands(on_false))),
            // NaN makes `!(a < b)` differ from `a >= b`
            (Fallthrough::True, None) => {
                self.emit_instr(Instruction::new(branch, operands(on_true)));
                self.emit_instr(instr!(Br, on_false));
            }
        }
        self.drop_held(right)?;
        self.drop_held(left)
    }
}

/// The fused branch of a comparison and, for equality, its exact inverse.
fn fused_branch(operator: BinaryOperator) -> Option<(OpCode, Option<OpCode>)> {
    Some(match operator {
        BinaryOperator::Equal => (OpCode::BrEq, Some(OpCode::BrNeq)),
        BinaryOperator::NotEqual => (OpCode::BrNeq, Some(OpCode::BrEq)),
        BinaryOperator::StrictEqual => (OpCode::BrStrictEq, Some(OpCode::BrStrictNeq)),
        BinaryOperator::StrictNotEqual => (OpCode::BrStrictNeq, Some(OpCode::BrStrictEq)),
        BinaryOperator::LessThan => (OpCode::BrLt, None),
        BinaryOperator::LessThanEqual => (OpCode::BrLe, None),
        BinaryOperator::GreaterThan => (OpCode::BrGt, None),
        BinaryOperator::GreaterThanEqual => (OpCode::BrGe, None),
        _ => return None,
    })
}
