//! Per-function bytecode emission.
//!
//! A [`FunctionEmitter`] lowers one function (or the program) against a
//! finished [`ScopeTree`], writing through a [`BytecodeWriter`]. Nested
//! functions are not lowered here: each closure creation records a
//! [`FunctionSource`] and the driver lowers them afterwards, depth-first, in
//! creation order.
//!
//! Environments are explicit. Every instantiated scope lives in a permanent
//! register and is created with its parent environment as an operand, so
//! leaving a scope needs no instruction at run time.

mod classes;
mod conditions;
mod control;
mod destructuring;
mod exceptions;
mod expressions;
mod generators;
mod iteration;
mod reference;
mod scope_access;
mod statements;

#[cfg(test)]
mod tests;

use rustc_hash::FxHashSet;
use tracing::trace;

use crate::ast::*;
use crate::bytecode::{
    BytecodeWriter, ConstIndex, Constant, DebugScope, DebugVariable, FuncIndex, Instruction, Label,
    NameIndex, OpCode, Reg, VariableLocation,
};
use crate::config::EmitConfig;
use crate::error::{EmitError, Result};
use crate::instr;
use crate::regalloc::{RegisterAllocator, RegisterLayout};
use crate::scope::{
    FunctionFlavor, FunctionId, FunctionInfo, Representation, ScopeId, ScopeKind, ScopeTree, Storage,
    SymbolId, SymbolRole,
};

use control::JumpTarget;
use exceptions::{FinallyContext, TryScopeRecord};

/// Code a function is lowered from.
#[derive(Debug, Clone, Copy)]
pub enum FunctionSource<'a> {
    /// The program's top level
    Program(&'a Program),
    /// A function, arrow, method, accessor or constructor
    Function(&'a Function),
    /// The synthesized field initializer of a class
    FieldInitializer {
        /// Owning class
        class: &'a Class,
        /// Static or instance fields
        is_static: bool,
    },
}

impl FunctionSource<'_> {
    /// The node the binder keyed this function by.
    pub fn node(&self) -> NodeId {
        match self {
            FunctionSource::Program(p) => p.id,
            FunctionSource::Function(f) => f.id,
            FunctionSource::FieldInitializer { class, is_static: false } => class.fields_id,
            FunctionSource::FieldInitializer { class, is_static: true } => class.static_fields_id,
        }
    }
}

/// Where the parent wants an expression's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dest {
    /// Evaluate for side effects only
    Discard,
    /// Any register will do
    Any,
    /// This exact register
    Reg(Reg),
}

/// Where an expression left its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Value {
    /// Nothing was kept
    Discarded,
    /// A temp the caller must release
    Temp(Reg),
    /// A register owned by someone else (a binding or the caller's target)
    Fixed(Reg),
}

/// A value held in a register, with whether the holder must release it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Held {
    pub reg: Reg,
    pub temp: bool,
}

#[derive(Debug, Clone, Copy)]
struct ActiveScope {
    id: ScopeId,
    recorded: bool,
}

/// Emission state for one function.
pub struct FunctionEmitter<'a, 'w, W: BytecodeWriter> {
    tree: &'a ScopeTree,
    config: &'a EmitConfig,
    function: FunctionId,
    info: &'a FunctionInfo,
    writer: &'w mut W,
    alloc: RegisterAllocator,
    scopes: Vec<ActiveScope>,
    /// Symbols whose declaration has been emitted in this function
    declared: FxHashSet<SymbolId>,
    jumps: Vec<JumpTarget>,
    finally_stack: Vec<FinallyContext>,
    try_records: Vec<TryScopeRecord>,
    children: Vec<FunctionSource<'a>>,
    pending_labels: Vec<String>,
    depth: usize,
}

impl<'a, 'w, W: BytecodeWriter> FunctionEmitter<'a, 'w, W> {
    /// Creates an emitter for `function`, reserving its permanent registers.
    pub fn new(
        tree: &'a ScopeTree,
        config: &'a EmitConfig,
        function: FunctionId,
        writer: &'w mut W,
    ) -> Result<Self> {
        let info = tree.function(function);
        let mut alloc = RegisterAllocator::new();
        for _ in 0..info.permanent_registers {
            alloc.acquire_permanent()?;
        }
        alloc.seal();
        Ok(Self {
            tree,
            config,
            function,
            info,
            writer,
            alloc,
            scopes: Vec::new(),
            declared: FxHashSet::default(),
            jumps: Vec::new(),
            finally_stack: Vec::new(),
            try_records: Vec::new(),
            children: Vec::new(),
            pending_labels: Vec::new(),
            depth: 0,
        })
    }

    /// Lowers `source` and returns the nested functions it creates, in
    /// creation order, with the frame layout.
    pub fn emit(mut self, source: FunctionSource<'a>) -> Result<(Vec<FunctionSource<'a>>, RegisterLayout)> {
        match source {
            FunctionSource::Program(program) => self.emit_program(program)?,
            FunctionSource::Function(function) => self.emit_function(function)?,
            FunctionSource::FieldInitializer { class, is_static } => {
                self.emit_field_initializer(class, is_static)?
            }
        }
        self.alloc.check_depth(0)?;
        Ok((self.children, self.alloc.layout()))
    }

    // ========================================================================
    // Writer and allocator plumbing
    // ========================================================================

    fn emit_instr(&mut self, instruction: Instruction) {
        self.writer.emit(instruction);
    }

    fn label(&mut self) -> Label {
        self.writer.define_label()
    }

    fn mark(&mut self, label: Label) -> Result<()> {
        trace!(%label, offset = self.writer.offset(), "label marked");
        self.writer.mark_label(label)
    }

    fn temp(&mut self) -> Reg {
        self.alloc.acquire_temp()
    }

    fn release(&mut self, reg: Reg) -> Result<()> {
        self.alloc.release(reg)
    }

    fn drop_held(&mut self, held: Held) -> Result<()> {
        if held.temp { self.release(held.reg) } else { Ok(()) }
    }

    fn drop_value(&mut self, value: Value) -> Result<()> {
        match value {
            Value::Temp(reg) => self.release(reg),
            Value::Fixed(_) | Value::Discarded => Ok(()),
        }
    }

    fn name(&mut self, name: &str) -> NameIndex {
        self.writer.intern_name(name)
    }

    fn constant(&mut self, constant: Constant) -> ConstIndex {
        self.writer.add_constant(constant)
    }

    fn number(&mut self, n: u32) -> ConstIndex {
        self.constant(Constant::Number(f64::from(n)))
    }

    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.config.max_depth {
            return Err(EmitError::NestingTooDeep {
                limit: self.config.max_depth,
            });
        }
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    /// The register a result goes to: the requested one or a fresh temp.
    fn target_reg(&mut self, dest: Dest) -> Reg {
        match dest {
            Dest::Reg(reg) => reg,
            Dest::Any | Dest::Discard => self.temp(),
        }
    }

    /// Hands a result computed into `reg` (from [`Self::target_reg`]) to the parent.
    fn deliver(&mut self, dest: Dest, reg: Reg) -> Result<Value> {
        match dest {
            Dest::Discard => {
                self.release(reg)?;
                Ok(Value::Discarded)
            }
            Dest::Any => Ok(Value::Temp(reg)),
            Dest::Reg(_) => Ok(Value::Fixed(reg)),
        }
    }

    /// Moves an existing value to where `dest` wants it.
    fn place(&mut self, dest: Dest, value: Value) -> Result<Value> {
        match (dest, value) {
            (Dest::Discard, value) => {
                self.drop_value(value)?;
                Ok(Value::Discarded)
            }
            (Dest::Any, value) => Ok(value),
            (Dest::Reg(target), Value::Fixed(reg) | Value::Temp(reg)) if reg == target => Ok(Value::Fixed(target)),
            (Dest::Reg(target), Value::Fixed(reg)) => {
                self.emit_instr(instr!(Mov, target, reg));
                Ok(Value::Fixed(target))
            }
            (Dest::Reg(target), Value::Temp(reg)) => {
                self.emit_instr(instr!(Mov, target, reg));
                self.release(reg)?;
                Ok(Value::Fixed(target))
            }
            (Dest::Reg(target), Value::Discarded) => {
                self.emit_instr(instr!(LdUndef, target));
                Ok(Value::Fixed(target))
            }
        }
    }

    /// Turns a value evaluated for [`Dest::Any`] into a held register.
    fn hold(&mut self, value: Value) -> Held {
        match value {
            Value::Temp(reg) => Held { reg, temp: true },
            Value::Fixed(reg) => Held { reg, temp: false },
            Value::Discarded => {
                let reg = self.temp();
                self.emit_instr(instr!(LdUndef, reg));
                Held { reg, temp: true }
            }
        }
    }

    /// Evaluates `expr` into some register.
    fn emit_held(&mut self, expr: &'a Expression) -> Result<Held> {
        let value = self.emit_expression(expr, Dest::Any)?;
        Ok(self.hold(value))
    }

    /// Evaluates an operand that must survive the evaluation of later
    /// operands. With `protect`, a binding register is copied so a later
    /// assignment to the binding cannot change it.
    fn emit_operand(&mut self, expr: &'a Expression, protect: bool) -> Result<Held> {
        let held = self.emit_held(expr)?;
        if protect && !held.temp {
            let copy = self.temp();
            self.emit_instr(instr!(Mov, copy, held.reg));
            return Ok(Held { reg: copy, temp: true });
        }
        Ok(held)
    }

    // ========================================================================
    // Scopes
    // ========================================================================

    fn current_scope(&self) -> ScopeId {
        self.scopes.last().map_or(self.info.body_scope, |active| active.id)
    }

    /// The innermost environment register: the newest instantiated scope of
    /// this function, else the closure environment.
    fn current_env(&self) -> Result<Reg> {
        self.scopes
            .iter()
            .rev()
            .map(|active| self.tree.scope(active.id))
            .find(|scope| scope.is_instantiated())
            .and_then(|scope| scope.register)
            .or(self.info.env_register)
            .ok_or(EmitError::UnboundNode(self.info.node))
    }

    /// Enters `scope`, creating its run-time object when it has one.
    /// `with_object` is the object of a `with` scope.
    fn enter_scope(&mut self, id: ScopeId, with_object: Option<Reg>) -> Result<()> {
        let tree = self.tree;
        let scope = tree.scope(id);
        if scope.is_instantiated() {
            let parent = self.current_env()?;
            let reg = scope.register.ok_or(EmitError::UnboundNode(scope.node))?;
            match (scope.kind, scope.representation) {
                (ScopeKind::With, _) => {
                    let object = with_object.ok_or(EmitError::UnboundNode(scope.node))?;
                    self.emit_instr(instr!(NewWithScope, reg, parent, object));
                }
                (_, Representation::Slots) => {
                    self.emit_instr(instr!(NewScopeSlots, reg, parent, scope.symbols.len() as u32));
                }
                _ => self.emit_instr(instr!(NewScopeObject, reg, parent)),
            }
            trace!(scope = id.0, %reg, "scope object created");
        }

        let recorded = self.config.debugger_tracking && !scope.symbols.is_empty();
        if recorded {
            let variables = scope
                .symbols
                .iter()
                .filter_map(|&sym| {
                    let symbol = tree.symbol(sym);
                    let location = match symbol.storage {
                        Storage::Register(reg) => VariableLocation::Register(reg),
                        Storage::Slot(slot) => VariableLocation::Slot(slot),
                        Storage::Property => VariableLocation::Property,
                        Storage::Unallocated => return None,
                    };
                    Some(DebugVariable {
                        name: symbol.name.clone(),
                        location,
                        is_const: symbol.is_const,
                    })
                })
                .collect();
            self.writer.record_start_scope_object(DebugScope {
                kind: scope.kind.debug_kind(),
                object: scope.is_instantiated().then_some(scope.register).flatten(),
                variables,
            });
        }
        self.scopes.push(ActiveScope { id, recorded });

        for &sym in &scope.symbols {
            let symbol = tree.symbol(sym);
            if !symbol.needs_declaration || symbol.is_global {
                continue;
            }
            match (symbol.storage, scope.register) {
                (Storage::Slot(slot), Some(reg)) => self.emit_instr(instr!(InitUndeclSlot, reg, slot)),
                (Storage::Register(reg), _) if scope.is_switch => self.emit_instr(instr!(InitUndecl, reg)),
                _ => {}
            }
        }
        Ok(())
    }

    fn exit_scope(&mut self) -> Result<()> {
        match self.scopes.pop() {
            Some(ActiveScope { recorded: true, .. }) => self.writer.record_end_scope_object(),
            _ => Ok(()),
        }
    }

    /// Creates the closures for function declarations directly in `body`
    /// and binds them in the current scope.
    fn hoist_functions(&mut self, body: &'a [Statement]) -> Result<()> {
        for stmt in body {
            let StatementKind::FunctionDeclaration(function) = &stmt.kind else {
                continue;
            };
            let Some(name) = &function.name else {
                continue;
            };
            let closure = self.temp();
            self.new_closure(closure, FunctionSource::Function(function))?;
            self.store_name(&name.name, closure, scope_access::StoreMode::Init)?;
            self.release(closure)?;
        }
        Ok(())
    }

    /// Records `source` as the next child function.
    fn child(&mut self, source: FunctionSource<'a>) -> FuncIndex {
        self.children.push(source);
        FuncIndex::new(self.children.len() - 1)
    }

    /// `dst <- closure over source` in the current environment.
    fn new_closure(&mut self, dst: Reg, source: FunctionSource<'a>) -> Result<()> {
        let index = self.child(source);
        let env = self.current_env()?;
        self.emit_instr(instr!(NewFunction, dst, index, env));
        Ok(())
    }

    // ========================================================================
    // Function entry
    // ========================================================================

    fn emit_program(&mut self, program: &'a Program) -> Result<()> {
        if let Some(env) = self.info.env_register {
            self.emit_instr(instr!(LdEnv, env));
        }
        let tree = self.tree;
        let global = self.info.body_scope;
        self.enter_scope(global, None)?;

        for &sym in &tree.scope(global).symbols {
            let symbol = tree.symbol(sym);
            let name = self.name(&symbol.name);
            if symbol.is_block_scoped && !symbol.is_function_decl {
                self.emit_instr(instr!(DeclareGlobalLexical, name, u32::from(symbol.is_const)));
            } else {
                self.emit_instr(instr!(DeclareGlobalVar, name));
            }
        }
        self.hoist_functions(&program.body)?;

        for stmt in &program.body {
            self.emit_statement(stmt)?;
        }
        self.emit_return_undefined()?;
        self.exit_scope()
    }

    fn emit_function(&mut self, function: &'a Function) -> Result<()> {
        let tree = self.tree;
        let info = self.info;
        if let Some(env) = info.env_register {
            self.emit_instr(instr!(LdEnv, env));
        }
        self.enter_scope(info.params_scope, None)?;
        self.emit_implicit_bindings()?;

        for (index, param) in function.params.iter().enumerate() {
            self.emit_parameter(index as u32, param)?;
        }
        if let Some(rest) = &function.rest {
            let reg = self.temp();
            self.emit_instr(instr!(LdRestArgs, reg, function.params.len() as u32));
            self.assign_pattern(rest, reg, scope_access::StoreMode::Init)?;
            self.release(reg)?;
        }
        if info.is_generator {
            self.emit_initial_yield()?;
        }

        self.enter_scope(info.body_scope, None)?;
        let body = tree.scope(info.body_scope);
        if body.representation == Representation::Object
            && let Some(object) = body.register
        {
            for &sym in &body.symbols {
                let symbol = tree.symbol(sym);
                if symbol.is_block_scoped || symbol.is_function_decl {
                    continue;
                }
                let name = self.name(&symbol.name);
                let undefined = self.temp();
                self.emit_instr(instr!(LdUndef, undefined));
                self.emit_instr(instr!(StScopeProp, object, name, undefined));
                self.release(undefined)?;
            }
        }
        self.hoist_functions(&function.body)?;
        for stmt in &function.body {
            self.emit_statement(stmt)?;
        }
        self.emit_return_undefined()?;
        self.exit_scope()?;
        self.exit_scope()
    }

    /// Loads `this`, `new.target`, the home object, `arguments` and the
    /// function's own name into their bindings.
    fn emit_implicit_bindings(&mut self) -> Result<()> {
        let tree = self.tree;
        let derived = self.info.flavor == FunctionFlavor::DerivedConstructor;
        for &sym in &tree.scope(self.info.params_scope).symbols {
            let symbol = tree.symbol(sym);
            let opcode = match symbol.role {
                SymbolRole::This if derived => OpCode::InitUndecl,
                SymbolRole::This => OpCode::LdThis,
                SymbolRole::NewTarget => OpCode::LdNewTarget,
                SymbolRole::HomeObject => OpCode::LdHomeObject,
                SymbolRole::Arguments => OpCode::LdArguments,
                SymbolRole::FunctionName => OpCode::LdCallee,
                SymbolRole::Normal | SymbolRole::FieldKey => continue,
            };
            if let Storage::Register(reg) = symbol.storage {
                self.emit_instr(Instruction::new(opcode, vec![reg.into()]));
                self.declared.insert(sym);
            } else {
                let value = self.temp();
                self.emit_instr(Instruction::new(opcode, vec![value.into()]));
                self.store_symbol(sym, value, scope_access::StoreMode::Init)?;
                self.release(value)?;
            }
        }
        Ok(())
    }

    fn emit_parameter(&mut self, index: u32, param: &'a PatternElement) -> Result<()> {
        if let (Pattern::Identifier(id), None) = (&param.target, &param.default)
            && let Some(sym) = self.tree.scope(self.info.params_scope).lookup(&id.name)
            && let Storage::Register(reg) = self.tree.symbol(sym).storage
        {
            self.emit_instr(instr!(LdArg, reg, index));
            self.declared.insert(sym);
            return Ok(());
        }
        let value = self.temp();
        self.emit_instr(instr!(LdArg, value, index));
        self.emit_default(value, param.default.as_ref())?;
        self.assign_pattern(&param.target, value, scope_access::StoreMode::Init)?;
        self.release(value)
    }

    /// Replaces `value` with `default` when it is exactly undefined.
    fn emit_default(&mut self, value: Reg, default: Option<&'a Expression>) -> Result<()> {
        let Some(default) = default else {
            return Ok(());
        };
        let present = self.label();
        self.emit_instr(instr!(BrNotUndefined, present, value));
        self.emit_expression(default, Dest::Reg(value))?;
        self.mark(present)
    }

    fn emit_return_undefined(&mut self) -> Result<()> {
        let value = self.temp();
        self.emit_instr(instr!(LdUndef, value));
        self.emit_instr(instr!(Ret, value));
        self.release(value)
    }

    // ========================================================================
    // Statements
    // ========================================================================

    /// Emits one statement, bracketing it for the debugger and checking
    /// that it leaves the temp stack where it found it.
    fn emit_statement(&mut self, stmt: &'a Statement) -> Result<()> {
        self.descend()?;
        let depth = self.alloc.depth();
        if self.config.statement_boundaries {
            self.writer.start_statement(stmt.span);
        }
        let result = self.statement_kind(stmt);
        if self.config.statement_boundaries {
            self.writer.end_statement();
        }
        self.ascend();
        result?;
        self.alloc.check_depth(depth)
    }
}

/// Whether evaluating `expr` could assign a binding register.
pub(crate) fn may_mutate(expr: &Expression) -> bool {
    match expr {
        Expression::Assignment(_)
        | Expression::Update(_)
        | Expression::Call(_)
        | Expression::New(_)
        | Expression::SuperCall(_)
        | Expression::Yield(_)
        | Expression::Await(_)
        | Expression::Class(_) => true,
        Expression::Literal(_)
        | Expression::Identifier(_)
        | Expression::This
        | Expression::NewTarget
        | Expression::Function(_) => false,
        Expression::Array(array) => array.elements.iter().flatten().any(|element| match element {
            Argument::Expression(e) | Argument::Spread(e) => may_mutate(e),
        }),
        Expression::Object(object) => object.properties.iter().any(|property| match property {
            Property::Init { key, value } => key_may_mutate(key) || may_mutate(value),
            Property::Method { key, .. } => key_may_mutate(key),
            Property::Spread(e) => may_mutate(e),
        }),
        Expression::Binary(b) => may_mutate(&b.left) || may_mutate(&b.right),
        Expression::Unary(u) => may_mutate(&u.argument),
        Expression::Conditional(c) => may_mutate(&c.test) || may_mutate(&c.consequent) || may_mutate(&c.alternate),
        Expression::Sequence(list) => list.iter().any(may_mutate),
        Expression::Member(m) => may_mutate(&m.object) || property_may_mutate(&m.property),
        Expression::SuperMember(property) => property_may_mutate(property),
        Expression::Template(t) => t.expressions.iter().any(may_mutate),
    }
}

fn key_may_mutate(key: &PropertyKey) -> bool {
    matches!(key, PropertyKey::Computed(e) if may_mutate(e))
}

fn property_may_mutate(property: &MemberProperty) -> bool {
    matches!(property, MemberProperty::Expression(e) if may_mutate(e))
}

/// Whether `expr` writes its destination only after reading everything
/// else, so a binding register can be its direct target.
pub(crate) fn writes_target_last(expr: &Expression) -> bool {
    match expr {
        Expression::Literal(_)
        | Expression::Identifier(_)
        | Expression::This
        | Expression::NewTarget
        | Expression::Function(_)
        | Expression::Unary(_)
        | Expression::Call(_)
        | Expression::New(_)
        | Expression::Member(_) => true,
        Expression::Binary(b) => !b.operator.is_short_circuit(),
        _ => false,
    }
}
