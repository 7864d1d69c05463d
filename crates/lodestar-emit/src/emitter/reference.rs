//! Assignment targets: references, assignment and update expressions.

use super::*;
use crate::ast::ValidationError;
use crate::bytecode::Operand;
use crate::scope::implicit;
use scope_access::StoreMode;

/// A property key: an interned name, or a converted key in a temp.
#[derive(Debug, Clone, Copy)]
pub(super) enum Key {
    Name(NameIndex),
    Reg(Reg),
}

impl Key {
    pub(super) fn operand(self) -> Operand {
        match self {
            Key::Name(name) => name.into(),
            Key::Reg(reg) => reg.into(),
        }
    }
}

/// An evaluated assignment target.
#[derive(Debug)]
pub(super) enum Reference<'a> {
    Binding(&'a str),
    Field { object: Held, name: NameIndex },
    Element { object: Held, key: Held },
    Super { home: Held, this: Held, key: Key },
}

impl<'a, 'w, W: BytecodeWriter> FunctionEmitter<'a, 'w, W> {
    /// Evaluates a property key. Computed keys are converted once, here.
    pub(super) fn emit_property_key(&mut self, key: &'a PropertyKey) -> Result<Key> {
        if let Some(name) = key.static_name() {
            return Ok(Key::Name(self.name(&name)));
        }
        let held = match key {
            PropertyKey::Computed(expr) => self.emit_held(expr)?,
            PropertyKey::Literal(literal) => {
                let value = self.emit_literal(literal, Dest::Any)?;
                self.hold(value)
            }
            PropertyKey::Identifier(id) => return Ok(Key::Name(self.name(&id.name))),
        };
        Ok(Key::Reg(self.to_property_key(held)))
    }

    fn to_property_key(&mut self, held: Held) -> Reg {
        let reg = if held.temp { held.reg } else { self.temp() };
        self.emit_instr(instr!(ToPropertyKey, reg, held.reg));
        reg
    }

    pub(super) fn drop_key(&mut self, key: Key) -> Result<()> {
        match key {
            Key::Name(_) => Ok(()),
            Key::Reg(reg) => self.release(reg),
        }
    }

    /// Evaluates the parts of an assignment target. With `protect`, parts
    /// held in binding registers are copied first.
    pub(super) fn emit_reference(&mut self, target: &'a Expression, protect: bool) -> Result<Reference<'a>> {
        match target {
            Expression::Identifier(id) => Ok(Reference::Binding(&id.name)),
            Expression::Member(member) => {
                let object = self.emit_operand(&member.object, protect)?;
                match &member.property {
                    MemberProperty::Identifier(id) => Ok(Reference::Field {
                        object,
                        name: self.name(&id.name),
                    }),
                    MemberProperty::Expression(expr) => {
                        let key = self.emit_operand(expr, protect)?;
                        Ok(Reference::Element { object, key })
                    }
                }
            }
            Expression::SuperMember(property) => {
                let home = self.load_implicit(implicit::HOME_OBJECT, Dest::Any)?;
                let home = self.hold(home);
                let this = self.load_this(Dest::Any)?;
                let this = self.hold(this);
                let key = match property {
                    MemberProperty::Identifier(id) => Key::Name(self.name(&id.name)),
                    MemberProperty::Expression(expr) => {
                        let held = self.emit_held(expr)?;
                        Key::Reg(self.to_property_key(held))
                    }
                };
                Ok(Reference::Super { home, this, key })
            }
            _ => Err(EmitError::InvalidTree(ValidationError::InvalidAssignmentTarget)),
        }
    }

    pub(super) fn load_reference(&mut self, reference: &Reference<'a>, dst: Reg) -> Result<()> {
        match *reference {
            Reference::Binding(name) => {
                self.load_name(name, Dest::Reg(dst))?;
            }
            Reference::Field { object, name } => self.emit_instr(instr!(LdField, dst, object.reg, name)),
            Reference::Element { object, key } => self.emit_instr(instr!(LdElem, dst, object.reg, key.reg)),
            Reference::Super { home, this, key } => {
                self.emit_instr(instr!(LdSuper, dst, home.reg, this.reg, key.operand()))
            }
        }
        Ok(())
    }

    pub(super) fn store_reference(&mut self, reference: &Reference<'a>, src: Reg) -> Result<()> {
        match *reference {
            Reference::Binding(name) => return self.store_name(name, src, StoreMode::Assign),
            Reference::Field { object, name } => self.emit_instr(instr!(StField, object.reg, name, src)),
            Reference::Element { object, key } => self.emit_instr(instr!(StElem, object.reg, key.reg, src)),
            Reference::Super { home, this, key } => {
                self.emit_instr(instr!(StSuper, home.reg, this.reg, key.operand(), src))
            }
        }
        Ok(())
    }

    pub(super) fn drop_reference(&mut self, reference: Reference<'a>) -> Result<()> {
        match reference {
            Reference::Binding(_) => Ok(()),
            Reference::Field { object, .. } => self.drop_held(object),
            Reference::Element { object, key } => {
                self.drop_held(key)?;
                self.drop_held(object)
            }
            Reference::Super { home, this, key } => {
                self.drop_key(key)?;
                self.drop_held(this)?;
                self.drop_held(home)
            }
        }
    }

    /// Takes the result register up front, below any temps the expression
    /// will need, so they can all be released before it is handed back.
    fn result_slot(&mut self, dest: Dest) -> Option<Reg> {
        match dest {
            Dest::Discard => None,
            Dest::Any => Some(self.temp()),
            Dest::Reg(reg) => Some(reg),
        }
    }

    fn finish_result(&self, dest: Dest, result: Option<Reg>) -> Value {
        match (dest, result) {
            (Dest::Any, Some(reg)) => Value::Temp(reg),
            (Dest::Reg(_), Some(reg)) => Value::Fixed(reg),
            _ => Value::Discarded,
        }
    }

    // ========================================================================
    // Assignment
    // ========================================================================

    pub(super) fn emit_assignment(&mut self, assignment: &'a AssignmentExpression, dest: Dest) -> Result<Value> {
        let value = &*assignment.value;
        match (&assignment.target, assignment.operator.binary_operator()) {
            (Pattern::Identifier(id), None) => self.assign_identifier(&id.name, value, dest),
            (Pattern::Member(target), None) => {
                let result = self.result_slot(dest);
                let reference = self.emit_reference(target, may_mutate(value))?;
                let held = match result {
                    Some(reg) => {
                        self.emit_expression(value, Dest::Reg(reg))?;
                        Held { reg, temp: false }
                    }
                    None => self.emit_held(value)?,
                };
                self.store_reference(&reference, held.reg)?;
                self.drop_held(held)?;
                self.drop_reference(reference)?;
                Ok(self.finish_result(dest, result))
            }
            (pattern @ (Pattern::Array(_) | Pattern::Object(_)), None) => {
                // the pattern may reassign whatever binding holds the source
                let source = self.emit_operand(value, true)?;
                self.assign_pattern(pattern, source.reg, StoreMode::Assign)?;
                self.place(dest, Value::Temp(source.reg))
            }
            (target, Some(operator)) => self.emit_compound(target, operator, value, dest),
        }
    }

    pub(super) fn assign_identifier(&mut self, name: &'a str, value: &'a Expression, dest: Dest) -> Result<Value> {
        if let Some(reg) = self.plain_register_binding(name)
            && writes_target_last(value)
        {
            self.emit_expression(value, Dest::Reg(reg))?;
            return self.place(dest, Value::Fixed(reg));
        }
        let held = self.emit_held(value)?;
        self.store_name(name, held.reg, StoreMode::Assign)?;
        let value = if held.temp { Value::Temp(held.reg) } else { Value::Fixed(held.reg) };
        self.place(dest, value)
    }

    fn emit_compound(
        &mut self,
        target: &'a Pattern,
        operator: BinaryOperator,
        value: &'a Expression,
        dest: Dest,
    ) -> Result<Value> {
        let result = self.result_slot(dest);
        let reference = match target {
            Pattern::Identifier(id) => Reference::Binding(&id.name),
            Pattern::Member(target) => self.emit_reference(target, may_mutate(value))?,
            Pattern::Array(_) | Pattern::Object(_) => {
                return Err(EmitError::InvalidTree(ValidationError::CompoundPatternAssignment));
            }
        };
        let current = match result {
            Some(reg) => reg,
            None => self.temp(),
        };
        self.load_reference(&reference, current)?;

        match binary_opcode(operator) {
            Some(opcode) => {
                let rhs = self.emit_held(value)?;
                self.drop_held(rhs)?;
                self.emit_instr(Instruction::new(opcode, vec![current.into(), current.into(), rhs.reg.into()]));
                self.store_reference(&reference, current)?;
            }
            None => {
                let skip = self.label();
                self.emit_short_circuit_branch(operator, skip, current);
                self.emit_expression(value, Dest::Reg(current))?;
                self.store_reference(&reference, current)?;
                self.mark(skip)?;
            }
        }

        if result.is_none() {
            self.release(current)?;
        }
        self.drop_reference(reference)?;
        Ok(self.finish_result(dest, result))
    }

    /// Branches to `skip` when a short-circuit operator would not evaluate
    /// its right side.
    pub(super) fn emit_short_circuit_branch(&mut self, operator: BinaryOperator, skip: Label, value: Reg) {
        let branch = match operator {
            BinaryOperator::LogicalAnd => instr!(BrFalse, skip, value),
            BinaryOperator::LogicalOr => instr!(BrTrue, skip, value),
            _ => instr!(BrNotNullish, skip, value),
        };
        self.emit_instr(branch);
    }

    // ========================================================================
    // Update
    // ========================================================================

    pub(super) fn emit_update(&mut self, update: &'a UpdateExpression, dest: Dest) -> Result<Value> {
        let result = self.result_slot(dest);
        let reference = self.emit_reference(&update.argument, false)?;
        let current = self.temp();
        self.load_reference(&reference, current)?;
        let opcode = match update.operator {
            UpdateOperator::Increment => OpCode::Inc,
            UpdateOperator::Decrement => OpCode::Dec,
        };
        match result {
            Some(old) if !update.prefix => {
                self.emit_instr(instr!(ToNumeric, old, current));
                self.emit_instr(Instruction::new(opcode, vec![current.into(), old.into()]));
            }
            _ => self.emit_instr(Instruction::new(opcode, vec![current.into(), current.into()])),
        }
        self.store_reference(&reference, current)?;
        if update.prefix
            && let Some(reg) = result
        {
            self.emit_instr(instr!(Mov, reg, current));
        }
        self.release(current)?;
        self.drop_reference(reference)?;
        Ok(self.finish_result(dest, result))
    }
}

/// The arithmetic or comparison opcode of a binary operator.
pub(super) fn binary_opcode(operator: BinaryOperator) -> Option<OpCode> {
    use BinaryOperator::*;
    Some(match operator {
        Add => OpCode::Add,
        Subtract => OpCode::Sub,
        Multiply => OpCode::Mul,
        Divide => OpCode::Div,
        Modulo => OpCode::Mod,
        Exponent => OpCode::Pow,
        Equal => OpCode::Eq,
        NotEqual => OpCode::Neq,
        StrictEqual => OpCode::StrictEq,
        StrictNotEqual => OpCode::StrictNeq,
        LessThan => OpCode::Lt,
        LessThanEqual => OpCode::Le,
        GreaterThan => OpCode::Gt,
        GreaterThanEqual => OpCode::Ge,
        BitwiseAnd => OpCode::BitAnd,
        BitwiseOr => OpCode::BitOr,
        BitwiseXor => OpCode::BitXor,
        LeftShift => OpCode::Shl,
        RightShift => OpCode::Shr,
        UnsignedRightShift => OpCode::UShr,
        In => OpCode::In,
        InstanceOf => OpCode::InstanceOf,
        LogicalAnd | LogicalOr | NullishCoalescing => return None,
    })
}
