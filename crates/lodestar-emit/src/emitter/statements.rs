//! Statement lowering.

use super::*;
use scope_access::StoreMode;

impl<'a, 'w, W: BytecodeWriter> FunctionEmitter<'a, 'w, W> {
    pub(super) fn statement_kind(&mut self, stmt: &'a Statement) -> Result<()> {
        match &stmt.kind {
            StatementKind::VariableDeclaration(decl) => self.emit_variable_declaration(decl),
            // created when the enclosing scope was entered
            StatementKind::FunctionDeclaration(_) => Ok(()),
            StatementKind::ClassDeclaration(class) => self.emit_class_declaration(class),
            StatementKind::Expression(expr) => self.emit_expression(expr, Dest::Discard).map(drop),
            StatementKind::Block(block) => self.emit_block(block),
            StatementKind::If(stmt) => self.emit_if(stmt),
            StatementKind::Switch(stmt) => self.emit_switch(stmt),
            StatementKind::While(stmt) => self.emit_while(stmt),
            StatementKind::DoWhile(stmt) => self.emit_do_while(stmt),
            StatementKind::For(stmt) => self.emit_for(stmt),
            StatementKind::ForIn(stmt) => self.emit_for_in(stmt),
            StatementKind::ForOf(stmt) => self.emit_for_of(stmt),
            StatementKind::Return(argument) => {
                let value = match argument {
                    Some(argument) => self.emit_held(argument)?,
                    None => self.hold(Value::Discarded),
                };
                self.emit_return(value.reg)?;
                self.drop_held(value)
            }
            StatementKind::Break(label) => self.emit_break(label.as_deref()),
            StatementKind::Continue(label) => self.emit_continue(label.as_deref()),
            StatementKind::Throw(argument) => {
                let value = self.emit_held(argument)?;
                self.emit_instr(instr!(Throw, value.reg));
                self.drop_held(value)
            }
            StatementKind::Try(stmt) => self.emit_try(stmt),
            StatementKind::With(stmt) => self.emit_with(stmt),
            StatementKind::Labeled(stmt) => self.emit_labeled(stmt),
            StatementKind::Debugger => {
                self.emit_instr(instr!(Debugger));
                Ok(())
            }
            StatementKind::Empty => Ok(()),
        }
    }

    pub(super) fn emit_block(&mut self, block: &'a BlockStatement) -> Result<()> {
        let scope = self.tree.scope_for(block.id, ScopeKind::Block)?;
        self.enter_scope(scope, None)?;
        self.hoist_functions(&block.body)?;
        for stmt in &block.body {
            self.emit_statement(stmt)?;
        }
        self.exit_scope()
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    /// `var` declarators assign; `let` and `const` initialize.
    pub(super) fn emit_variable_declaration(&mut self, decl: &'a VariableDeclaration) -> Result<()> {
        let mode = if decl.kind.is_lexical() { StoreMode::Init } else { StoreMode::Assign };
        for declarator in &decl.declarations {
            match (&declarator.target, &declarator.init, mode) {
                (Pattern::Identifier(id), Some(init), StoreMode::Assign) => {
                    self.assign_identifier(&id.name, init, Dest::Discard)?;
                }
                (Pattern::Identifier(id), Some(init), StoreMode::Init) => self.init_identifier(&id.name, init)?,
                (target, Some(init), _) => {
                    let source = self.emit_operand(init, true)?;
                    self.assign_pattern(target, source.reg, mode)?;
                    self.drop_held(source)?;
                }
                (Pattern::Identifier(id), None, StoreMode::Init) => {
                    let undefined = self.hold(Value::Discarded);
                    self.store_name(&id.name, undefined.reg, StoreMode::Init)?;
                    self.drop_held(undefined)?;
                }
                (_, None, _) => {}
            }
        }
        Ok(())
    }

    /// Initializes a lexical binding, straight into its register when the
    /// initializer allows it.
    fn init_identifier(&mut self, name: &str, init: &'a Expression) -> Result<()> {
        let resolution = self.tree.resolve(name, self.current_scope());
        if resolution.probes.is_empty()
            && let Some(sym) = resolution.symbol
            && let Storage::Register(reg) = self.tree.symbol(sym).storage
            && writes_target_last(init)
        {
            self.emit_expression(init, Dest::Reg(reg))?;
            self.declared.insert(sym);
            return Ok(());
        }
        let value = self.emit_held(init)?;
        self.store_name(name, value.reg, StoreMode::Init)?;
        self.drop_held(value)
    }

    // ========================================================================
    // Branching
    // ========================================================================

    fn emit_if(&mut self, stmt: &'a IfStatement) -> Result<()> {
        if let Some(truthy) = self.constant_truthiness(&stmt.test) {
            return match (truthy, &stmt.alternate) {
                (true, _) => self.emit_statement(&stmt.consequent),
                (false, Some(alternate)) => self.emit_statement(alternate),
                (false, None) => Ok(()),
            };
        }

        let consequent = self.label();
        let alternate = self.label();
        self.emit_condition(&stmt.test, consequent, alternate, conditions::Fallthrough::True)?;
        self.mark(consequent)?;
        self.emit_statement(&stmt.consequent)?;
        match &stmt.alternate {
            Some(statement) => {
                let end = self.label();
                self.emit_instr(instr!(Br, end));
                self.mark(alternate)?;
                self.emit_statement(statement)?;
                self.mark(end)
            }
            None => self.mark(alternate),
        }
    }

    /// Tests every case with `===` in order, then falls back to `default`
    /// wherever it appears. All cases share one block scope.
    fn emit_switch(&mut self, stmt: &'a SwitchStatement) -> Result<()> {
        let discriminant = self.emit_operand(&stmt.discriminant, true)?;
        let scope = self.tree.scope_for(stmt.id, ScopeKind::Block)?;
        self.enter_scope(scope, None)?;
        for case in &stmt.cases {
            self.hoist_functions(&case.consequent)?;
        }

        let exit = self.label();
        let labels: Vec<Label> = stmt.cases.iter().map(|_| self.label()).collect();
        let mut default = None;
        for (case, &label) in stmt.cases.iter().zip(&labels) {
            let Some(test) = &case.test else {
                default = Some(label);
                continue;
            };
            let value = self.emit_held(test)?;
            self.emit_instr(instr!(BrStrictEq, label, discriminant.reg, value.reg));
            self.drop_held(value)?;
        }
        self.emit_instr(instr!(Br, default.unwrap_or(exit)));

        let depth = self.try_records.len();
        self.jumps.push(control::JumpTarget {
            labels: Vec::new(),
            break_label: exit,
            continue_label: None,
            breakable: true,
            break_depth: depth,
            continue_depth: depth,
        });
        for (case, label) in stmt.cases.iter().zip(labels) {
            self.mark(label)?;
            for stmt in &case.consequent {
                self.emit_statement(stmt)?;
            }
        }
        self.jumps.pop();
        self.mark(exit)?;
        self.exit_scope()?;
        self.drop_held(discriminant)
    }

    fn emit_with(&mut self, stmt: &'a WithStatement) -> Result<()> {
        let object = self.emit_held(&stmt.object)?;
        let scope = self.tree.scope_for(stmt.id, ScopeKind::With)?;
        self.enter_scope(scope, Some(object.reg))?;
        self.emit_statement(&stmt.body)?;
        self.exit_scope()?;
        self.drop_held(object)
    }
}
