//! Expression lowering.

use super::*;
use crate::ast::ValidationError;
use crate::bytecode::RuntimeErrorKind;
use crate::scope::implicit;
use reference::Key;
use scope_access::StoreMode;

/// Evaluated call arguments.
#[derive(Debug, Clone, Copy)]
enum Arguments {
    /// `count` consecutive temps starting at `first`
    List { first: Reg, count: u32 },
    /// One array holding every argument
    Spread(Reg),
}

impl<'a, 'w, W: BytecodeWriter> FunctionEmitter<'a, 'w, W> {
    pub(super) fn emit_expression(&mut self, expr: &'a Expression, dest: Dest) -> Result<Value> {
        self.descend()?;
        let result = self.expression_kind(expr, dest);
        self.ascend();
        result
    }

    fn expression_kind(&mut self, expr: &'a Expression, dest: Dest) -> Result<Value> {
        match expr {
            Expression::Literal(literal) => self.emit_literal(literal, dest),
            Expression::Identifier(id) => self.load_name(&id.name, dest),
            Expression::This => self.load_this(dest),
            Expression::NewTarget => self.load_implicit(implicit::NEW_TARGET, dest),
            Expression::Array(array) => self.emit_array(array, dest),
            Expression::Object(object) => self.emit_object(object, dest),
            Expression::Function(function) => {
                if dest == Dest::Discard {
                    return Ok(Value::Discarded);
                }
                let dst = self.target_reg(dest);
                self.new_closure(dst, FunctionSource::Function(function))?;
                self.deliver(dest, dst)
            }
            Expression::Class(class) => self.emit_class(class, dest),
            Expression::Binary(binary) => self.emit_binary(binary, dest),
            Expression::Unary(unary) => self.emit_unary(unary, dest),
            Expression::Update(update) => self.emit_update(update, dest),
            Expression::Assignment(assignment) => self.emit_assignment(assignment, dest),
            Expression::Conditional(conditional) => self.emit_conditional(conditional, dest),
            Expression::Sequence(list) => {
                let Some((last, init)) = list.split_last() else {
                    return self.emit_literal(&Literal::Undefined, dest);
                };
                for expr in init {
                    self.emit_expression(expr, Dest::Discard)?;
                }
                self.emit_expression(last, dest)
            }
            Expression::Call(call) => self.emit_call(call, dest),
            Expression::SuperCall(args) => self.emit_super_call(args, dest),
            Expression::New(new) => self.emit_new(new, dest),
            Expression::Member(member) => self.emit_member(member, dest),
            Expression::SuperMember(property) => self.emit_super_member(property, dest),
            Expression::Template(template) => self.emit_template(template, dest),
            Expression::Yield(expr) if expr.delegate => self.emit_yield_star(expr, dest),
            Expression::Yield(expr) => self.emit_yield(expr, dest),
            Expression::Await(argument) => self.emit_await(argument, dest),
        }
    }

    // ========================================================================
    // Literals
    // ========================================================================

    pub(super) fn emit_literal(&mut self, literal: &Literal, dest: Dest) -> Result<Value> {
        if dest == Dest::Discard {
            return Ok(Value::Discarded);
        }
        let dst = self.target_reg(dest);
        let instruction = match literal {
            Literal::Number(n) => instr!(LdConst, dst, self.constant(Constant::Number(*n))),
            Literal::String(s) => instr!(LdConst, dst, self.constant(Constant::String(s.clone()))),
            Literal::Boolean(true) => instr!(LdTrue, dst),
            Literal::Boolean(false) => instr!(LdFalse, dst),
            Literal::Null => instr!(LdNull, dst),
            Literal::Undefined => instr!(LdUndef, dst),
            Literal::BigInt(digits) => {
                let value = parse_bigint_literal(digits)
                    .ok_or_else(|| EmitError::InvalidTree(ValidationError::InvalidBigInt(digits.clone())))?;
                instr!(LdConst, dst, self.constant(Constant::BigInt(value)))
            }
            Literal::RegExp { pattern, flags } => {
                let pattern = self.constant(Constant::String(pattern.clone()));
                let flags = self.constant(Constant::String(flags.clone()));
                instr!(NewRegExp, dst, pattern, flags)
            }
        };
        self.emit_instr(instruction);
        self.deliver(dest, dst)
    }

    fn emit_array(&mut self, array: &'a ArrayExpression, dest: Dest) -> Result<Value> {
        let dst = self.target_reg(dest);
        self.emit_instr(instr!(NewArray, dst));
        for element in &array.elements {
            match element {
                None => self.emit_instr(instr!(ArrayHole, dst)),
                Some(Argument::Expression(expr)) => {
                    let value = self.emit_held(expr)?;
                    self.emit_instr(instr!(ArrayPush, dst, value.reg));
                    self.drop_held(value)?;
                }
                Some(Argument::Spread(expr)) => {
                    let value = self.emit_held(expr)?;
                    self.emit_instr(instr!(ArraySpread, dst, value.reg));
                    self.drop_held(value)?;
                }
            }
        }
        self.deliver(dest, dst)
    }

    fn emit_object(&mut self, object: &'a ObjectExpression, dest: Dest) -> Result<Value> {
        let dst = self.target_reg(dest);
        self.emit_instr(instr!(NewObject, dst));
        for property in &object.properties {
            match property {
                Property::Init { key, value } => {
                    let key = self.emit_property_key(key)?;
                    let value = self.emit_held(value)?;
                    self.emit_instr(instr!(DefineField, dst, key.operand(), value.reg));
                    self.drop_held(value)?;
                    self.drop_key(key)?;
                }
                Property::Method { key, function } => {
                    let key = self.emit_property_key(key)?;
                    let closure = self.temp();
                    self.new_closure(closure, FunctionSource::Function(function))?;
                    let define = match function.kind {
                        FunctionKind::Getter => OpCode::DefineGetter,
                        FunctionKind::Setter => OpCode::DefineSetter,
                        _ => OpCode::DefineMethod,
                    };
                    self.emit_instr(Instruction::new(
                        define,
                        vec![dst.into(), key.operand(), closure.into(), 1u32.into()],
                    ));
                    self.release(closure)?;
                    self.drop_key(key)?;
                }
                Property::Spread(source) => {
                    let source = self.emit_held(source)?;
                    self.emit_instr(instr!(CopyDataProperties, dst, source.reg));
                    self.drop_held(source)?;
                }
            }
        }
        self.deliver(dest, dst)
    }

    fn emit_template(&mut self, template: &'a TemplateLiteral, dest: Dest) -> Result<Value> {
        let dst = self.target_reg(dest);
        let head = template.quasis.first().cloned().unwrap_or_default();
        let head = self.constant(Constant::String(head));
        self.emit_instr(instr!(LdConst, dst, head));
        for (index, expr) in template.expressions.iter().enumerate() {
            let value = self.emit_held(expr)?;
            let text = if value.temp { value.reg } else { self.temp() };
            self.emit_instr(instr!(ToStringValue, text, value.reg));
            self.emit_instr(instr!(Add, dst, dst, text));
            self.release(text)?;
            match template.quasis.get(index + 1) {
                Some(quasi) if !quasi.is_empty() => {
                    let quasi = self.constant(Constant::String(quasi.clone()));
                    let part = self.temp();
                    self.emit_instr(instr!(LdConst, part, quasi));
                    self.emit_instr(instr!(Add, dst, dst, part));
                    self.release(part)?;
                }
                _ => {}
            }
        }
        self.deliver(dest, dst)
    }

    // ========================================================================
    // Operators
    // ========================================================================

    fn emit_binary(&mut self, binary: &'a BinaryExpression, dest: Dest) -> Result<Value> {
        let Some(opcode) = reference::binary_opcode(binary.operator) else {
            return self.emit_logical(binary, dest);
        };
        let left = self.emit_operand(&binary.left, may_mutate(&binary.right))?;
        let right = self.emit_held(&binary.right)?;
        self.drop_held(right)?;
        self.drop_held(left)?;
        let dst = self.target_reg(dest);
        self.emit_instr(Instruction::new(opcode, vec![dst.into(), left.reg.into(), right.reg.into()]));
        self.deliver(dest, dst)
    }

    /// `&&`, `||` and `??` used for their value.
    fn emit_logical(&mut self, binary: &'a BinaryExpression, dest: Dest) -> Result<Value> {
        let skip = self.label();
        if dest == Dest::Discard {
            let left = self.emit_held(&binary.left)?;
            self.emit_short_circuit_branch(binary.operator, skip, left.reg);
            self.drop_held(left)?;
            self.emit_expression(&binary.right, Dest::Discard)?;
            self.mark(skip)?;
            return Ok(Value::Discarded);
        }
        let dst = self.target_reg(dest);
        self.emit_expression(&binary.left, Dest::Reg(dst))?;
        self.emit_short_circuit_branch(binary.operator, skip, dst);
        self.emit_expression(&binary.right, Dest::Reg(dst))?;
        self.mark(skip)?;
        self.deliver(dest, dst)
    }

    fn emit_unary(&mut self, unary: &'a UnaryExpression, dest: Dest) -> Result<Value> {
        let opcode = match unary.operator {
            UnaryOperator::Typeof => {
                if let Expression::Identifier(id) = &*unary.argument {
                    return self.typeof_name(&id.name, dest);
                }
                OpCode::TypeOf
            }
            UnaryOperator::Delete => return self.emit_delete(&unary.argument, dest),
            UnaryOperator::Void => {
                self.emit_expression(&unary.argument, Dest::Discard)?;
                return self.emit_literal(&Literal::Undefined, dest);
            }
            UnaryOperator::Minus => OpCode::Neg,
            UnaryOperator::Plus => OpCode::ToNumber,
            UnaryOperator::LogicalNot => OpCode::Not,
            UnaryOperator::BitwiseNot => OpCode::BitNot,
        };
        let operand = self.emit_held(&unary.argument)?;
        self.drop_held(operand)?;
        let dst = self.target_reg(dest);
        self.emit_instr(Instruction::new(opcode, vec![dst.into(), operand.reg.into()]));
        self.deliver(dest, dst)
    }

    fn emit_delete(&mut self, argument: &'a Expression, dest: Dest) -> Result<Value> {
        match argument {
            Expression::Identifier(id) => self.delete_name(&id.name, dest),
            Expression::Member(member) => {
                let object = self.emit_held(&member.object)?;
                match &member.property {
                    MemberProperty::Identifier(id) => {
                        let name = self.name(&id.name);
                        self.drop_held(object)?;
                        let dst = self.target_reg(dest);
                        self.emit_instr(instr!(DeleteField, dst, object.reg, name));
                        self.deliver(dest, dst)
                    }
                    MemberProperty::Expression(expr) => {
                        let key = self.emit_held(expr)?;
                        self.drop_held(key)?;
                        self.drop_held(object)?;
                        let dst = self.target_reg(dest);
                        self.emit_instr(instr!(DeleteElem, dst, object.reg, key.reg));
                        self.deliver(dest, dst)
                    }
                }
            }
            _ => {
                self.emit_expression(argument, Dest::Discard)?;
                if dest == Dest::Discard {
                    return Ok(Value::Discarded);
                }
                let dst = self.target_reg(dest);
                self.emit_instr(instr!(LdTrue, dst));
                self.deliver(dest, dst)
            }
        }
    }

    fn emit_conditional(&mut self, conditional: &'a ConditionalExpression, dest: Dest) -> Result<Value> {
        if let Some(truthy) = self.constant_truthiness(&conditional.test) {
            let taken = if truthy { &conditional.consequent } else { &conditional.alternate };
            return self.emit_expression(taken, dest);
        }
        let consequent = self.label();
        let alternate = self.label();
        let end = self.label();
        let branch_dest = match dest {
            Dest::Discard => Dest::Discard,
            _ => Dest::Reg(self.target_reg(dest)),
        };
        self.emit_condition(&conditional.test, consequent, alternate, conditions::Fallthrough::True)?;
        self.mark(consequent)?;
        self.emit_expression(&conditional.consequent, branch_dest)?;
        self.emit_instr(instr!(Br, end));
        self.mark(alternate)?;
        self.emit_expression(&conditional.alternate, branch_dest)?;
        self.mark(end)?;
        match branch_dest {
            Dest::Reg(dst) => self.deliver(dest, dst),
            _ => Ok(Value::Discarded),
        }
    }

    // ========================================================================
    // Property access
    // ========================================================================

    fn emit_member(&mut self, member: &'a MemberExpression, dest: Dest) -> Result<Value> {
        let key_mutates = matches!(&member.property, MemberProperty::Expression(e) if may_mutate(e));
        let object = self.emit_operand(&member.object, key_mutates)?;
        match &member.property {
            MemberProperty::Identifier(id) => {
                let name = self.name(&id.name);
                self.drop_held(object)?;
                let dst = self.target_reg(dest);
                self.emit_instr(instr!(LdField, dst, object.reg, name));
                self.deliver(dest, dst)
            }
            MemberProperty::Expression(expr) => {
                let key = self.emit_held(expr)?;
                self.drop_held(key)?;
                self.drop_held(object)?;
                let dst = self.target_reg(dest);
                self.emit_instr(instr!(LdElem, dst, object.reg, key.reg));
                self.deliver(dest, dst)
            }
        }
    }

    fn emit_super_member(&mut self, property: &'a MemberProperty, dest: Dest) -> Result<Value> {
        let home = self.load_implicit(implicit::HOME_OBJECT, Dest::Any)?;
        let home = self.hold(home);
        let this = self.load_this(Dest::Any)?;
        let this = self.hold(this);
        let key = match property {
            MemberProperty::Identifier(id) => Key::Name(self.name(&id.name)),
            MemberProperty::Expression(expr) => Key::Reg(self.emit_operand(expr, true)?.reg),
        };
        self.drop_key(key)?;
        self.drop_held(this)?;
        self.drop_held(home)?;
        let dst = self.target_reg(dest);
        self.emit_instr(instr!(LdSuper, dst, home.reg, this.reg, key.operand()));
        self.deliver(dest, dst)
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Evaluates arguments into consecutive temps, or into one array when
    /// any of them is spread.
    fn emit_arguments(&mut self, args: &'a [Argument]) -> Result<Arguments> {
        if args.iter().any(Argument::is_spread) {
            let array = self.temp();
            self.emit_instr(instr!(NewArray, array));
            for arg in args {
                let (Argument::Expression(expr) | Argument::Spread(expr)) = arg;
                let value = self.emit_held(expr)?;
                if arg.is_spread() {
                    self.emit_instr(instr!(ArraySpread, array, value.reg));
                } else {
                    self.emit_instr(instr!(ArrayPush, array, value.reg));
                }
                self.drop_held(value)?;
            }
            return Ok(Arguments::Spread(array));
        }

        let mut regs = Vec::with_capacity(args.len());
        for arg in args {
            let (Argument::Expression(expr) | Argument::Spread(expr)) = arg;
            let reg = self.temp();
            self.emit_expression(expr, Dest::Reg(reg))?;
            regs.push(reg);
        }
        let first = match regs.first() {
            Some(&first) => first,
            None => {
                // the next free register; nothing is read from it
                let next = self.temp();
                self.release(next)?;
                next
            }
        };
        Ok(Arguments::List {
            first,
            count: regs.len() as u32,
        })
    }

    fn release_arguments(&mut self, args: Arguments) -> Result<()> {
        match args {
            Arguments::Spread(array) => self.release(array),
            Arguments::List { first, count } => {
                for offset in (0..count).rev() {
                    self.release(Reg(first.0 + offset))?;
                }
                Ok(())
            }
        }
    }

    fn emit_call(&mut self, call: &'a CallExpression, dest: Dest) -> Result<Value> {
        let args_mutate = call.arguments.iter().any(|arg| {
            let (Argument::Expression(expr) | Argument::Spread(expr)) = arg;
            may_mutate(expr)
        });
        let direct_eval =
            call.is_direct_eval() && self.tree.resolve("eval", self.current_scope()).symbol.is_none();

        // receiver first, then the callee
        let (this, callee) = match &*call.callee {
            Expression::Member(member) => {
                let this = self.emit_operand(&member.object, true)?;
                let callee = self.temp();
                match &member.property {
                    MemberProperty::Identifier(id) => {
                        let name = self.name(&id.name);
                        self.emit_instr(instr!(LdField, callee, this.reg, name));
                    }
                    MemberProperty::Expression(expr) => {
                        let key = self.emit_held(expr)?;
                        self.emit_instr(instr!(LdElem, callee, this.reg, key.reg));
                        self.drop_held(key)?;
                    }
                }
                (this, Held { reg: callee, temp: true })
            }
            Expression::SuperMember(property) => {
                let this = self.load_this(Dest::Any)?;
                let this = self.hold(this);
                let callee = self.temp();
                let home = self.load_implicit(implicit::HOME_OBJECT, Dest::Any)?;
                let home = self.hold(home);
                let key = match property {
                    MemberProperty::Identifier(id) => Key::Name(self.name(&id.name)),
                    MemberProperty::Expression(expr) => {
                        let key = self.emit_operand(expr, true)?;
                        Key::Reg(key.reg)
                    }
                };
                self.emit_instr(instr!(LdSuper, callee, home.reg, this.reg, key.operand()));
                self.drop_key(key)?;
                self.drop_held(home)?;
                (this, Held { reg: callee, temp: true })
            }
            Expression::Identifier(id)
                if !self.tree.resolve(&id.name, self.current_scope()).probes.is_empty() =>
            {
                let this = self.temp();
                let callee = self.temp();
                self.load_callee(&id.name, this, callee)?;
                (Held { reg: this, temp: true }, Held { reg: callee, temp: true })
            }
            callee => {
                let this = self.temp();
                self.emit_instr(instr!(LdUndef, this));
                let callee = self.emit_operand(callee, args_mutate)?;
                (Held { reg: this, temp: true }, callee)
            }
        };

        let args = self.emit_arguments(&call.arguments)?;
        self.release_arguments(args)?;
        self.drop_held(callee)?;
        self.drop_held(this)?;
        let dst = self.target_reg(dest);
        let instruction = match args {
            Arguments::Spread(array) => instr!(CallSpread, dst, callee.reg, this.reg, array),
            Arguments::List { first, count } if direct_eval => {
                let env = self.current_env()?;
                instr!(CallEval, dst, callee.reg, this.reg, first, env, count)
            }
            Arguments::List { first, count } => instr!(Call, dst, callee.reg, this.reg, first, count),
        };
        self.emit_instr(instruction);
        self.deliver(dest, dst)
    }

    fn emit_new(&mut self, new: &'a NewExpression, dest: Dest) -> Result<Value> {
        let args_mutate = new.arguments.iter().any(|arg| {
            let (Argument::Expression(expr) | Argument::Spread(expr)) = arg;
            may_mutate(expr)
        });
        let callee = self.emit_operand(&new.callee, args_mutate)?;
        let args = self.emit_arguments(&new.arguments)?;
        self.release_arguments(args)?;
        self.drop_held(callee)?;
        let dst = self.target_reg(dest);
        let instruction = match args {
            Arguments::Spread(array) => instr!(NewSpread, dst, callee.reg, array),
            Arguments::List { first, count } => instr!(New, dst, callee.reg, first, count),
        };
        self.emit_instr(instruction);
        self.deliver(dest, dst)
    }

    /// `super(...)`: binds `this` once the parent constructor returns.
    fn emit_super_call(&mut self, args: &'a [Argument], dest: Dest) -> Result<Value> {
        let tree = self.tree;
        let derived = tree
            .this_function(self.function)
            .is_some_and(|owner| tree.function(owner).flavor == FunctionFlavor::DerivedConstructor);
        if !derived {
            self.runtime_error(RuntimeErrorKind::InvalidSuperCall, None);
            return self.emit_literal(&Literal::Undefined, dest);
        }

        let args = self.emit_arguments(args)?;
        self.release_arguments(args)?;
        let dst = self.target_reg(dest);
        let instruction = match args {
            Arguments::Spread(array) => instr!(SuperCallSpread, dst, array),
            Arguments::List { first, count } => instr!(SuperCall, dst, first, count),
        };
        self.emit_instr(instruction);
        self.emit_instr(instr!(InitThis, dst));
        if let Some(this) = tree.implicit_symbol(self.function, implicit::THIS) {
            self.store_symbol(this, dst, StoreMode::Init)?;
        }
        self.deliver(dest, dst)
    }
}
