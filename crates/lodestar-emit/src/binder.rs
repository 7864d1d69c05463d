//! The binding pass.
//!
//! Walks the whole program once, creating a scope for every scope-bearing
//! node and a symbol for every declaration, then marks captures and dynamic
//! constructs. Representations and storage are fixed in [`Binder::finish`]
//! after the walk, since a capture found deep inside a nested function can
//! change the layout of an outer scope.

use tracing::{debug, trace};

use crate::ast::*;
use crate::config::EmitConfig;
use crate::error::{EmitError, Result};
use crate::regalloc::RegisterAllocator;
use crate::scope::{
    FunctionFlavor, FunctionId, FunctionInfo, Representation, Scope, ScopeId, ScopeKind, ScopeTree,
    Storage, Symbol, SymbolId, SymbolRole, implicit,
};

/// Builds the scope tree for `program`.
pub fn bind(program: &Program, config: &EmitConfig) -> Result<ScopeTree> {
    let mut binder = Binder::new(config);
    binder.program(program)?;
    binder.finish()
}

/// Names a declaration introduces.
fn pattern_names<'p>(pattern: &'p Pattern, out: &mut Vec<&'p str>) {
    match pattern {
        Pattern::Identifier(id) => out.push(&id.name),
        Pattern::Member(_) => {}
        Pattern::Array(array) => {
            for element in array.elements.iter().flatten() {
                pattern_names(&element.target, out);
            }
            if let Some(rest) = &array.rest {
                pattern_names(rest, out);
            }
        }
        Pattern::Object(object) => {
            for prop in &object.properties {
                pattern_names(&prop.value.target, out);
            }
            if let Some(rest) = &object.rest {
                pattern_names(rest, out);
            }
        }
    }
}

/// `var` names declared anywhere in `body` outside nested functions.
fn var_names<'p>(body: &'p [Statement], out: &mut Vec<&'p str>) {
    for stmt in body {
        var_names_in(stmt, out);
    }
}

fn var_names_in<'p>(stmt: &'p Statement, out: &mut Vec<&'p str>) {
    match &stmt.kind {
        StatementKind::VariableDeclaration(decl) if decl.kind == VariableKind::Var => {
            for d in &decl.declarations {
                pattern_names(&d.target, out);
            }
        }
        StatementKind::Block(block) => var_names(&block.body, out),
        StatementKind::If(i) => {
            var_names_in(&i.consequent, out);
            if let Some(alt) = &i.alternate {
                var_names_in(alt, out);
            }
        }
        StatementKind::Switch(s) => {
            for case in &s.cases {
                var_names(&case.consequent, out);
            }
        }
        StatementKind::While(w) => var_names_in(&w.body, out),
        StatementKind::DoWhile(d) => var_names_in(&d.body, out),
        StatementKind::For(f) => {
            if let Some(ForInit::Declaration(decl)) = &f.init
                && decl.kind == VariableKind::Var
            {
                for d in &decl.declarations {
                    pattern_names(&d.target, out);
                }
            }
            var_names_in(&f.body, out);
        }
        StatementKind::ForIn(ForInStatement { left, body, .. })
        | StatementKind::ForOf(ForOfStatement { left, body, .. }) => {
            if let ForHead::Declaration {
                kind: VariableKind::Var,
                target,
            } = left
            {
                pattern_names(target, out);
            }
            var_names_in(body, out);
        }
        StatementKind::Try(t) => {
            var_names(&t.block.body, out);
            if let Some(handler) = &t.handler {
                var_names(&handler.body.body, out);
            }
            if let Some(finalizer) = &t.finalizer {
                var_names(&finalizer.body, out);
            }
        }
        StatementKind::With(w) => var_names_in(&w.body, out),
        StatementKind::Labeled(l) => var_names_in(&l.body, out),
        _ => {}
    }
}

/// Whether a parameter list needs per-parameter initialization checks.
fn has_complex_params(f: &Function) -> bool {
    f.rest.is_some()
        || f
            .params
            .iter()
            .any(|p| p.default.is_some() || !matches!(p.target, Pattern::Identifier(_)))
}

fn flavor_of(kind: FunctionKind) -> FunctionFlavor {
    match kind {
        FunctionKind::Normal => FunctionFlavor::Normal,
        FunctionKind::Arrow => FunctionFlavor::Arrow,
        FunctionKind::Method => FunctionFlavor::Method,
        FunctionKind::Getter => FunctionFlavor::Getter,
        FunctionKind::Setter => FunctionFlavor::Setter,
        FunctionKind::Constructor => FunctionFlavor::Constructor,
        FunctionKind::DerivedConstructor => FunctionFlavor::DerivedConstructor,
    }
}

/// State of the binding walk.
pub struct Binder<'c> {
    tree: ScopeTree,
    config: &'c EmitConfig,
    scope: ScopeId,
    function: FunctionId,
    depth: usize,
}

impl<'c> Binder<'c> {
    /// Creates a binder.
    pub fn new(config: &'c EmitConfig) -> Self {
        Self {
            tree: ScopeTree::default(),
            config,
            scope: ScopeId::default(),
            function: ScopeTree::ROOT,
            depth: 0,
        }
    }

    // ------------------------------------------------------------------
    // Arena helpers
    // ------------------------------------------------------------------

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

    fn new_scope(&mut self, kind: ScopeKind, node: NodeId) -> Result<ScopeId> {
        let id = ScopeId::new(self.tree.scopes.len());
        let parent = (!self.tree.scopes.is_empty()).then_some(self.scope);
        if self.tree.scope_index.insert((node, kind), id).is_some() {
            return Err(EmitError::DuplicateNode(node));
        }
        self.tree.scopes.push(Scope::new(kind, node, parent, self.function));
        trace!(scope = id.0, ?kind, "scope created");
        Ok(id)
    }

    fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.tree.scopes[id.index()]
    }

    fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.tree.symbols[id.index()]
    }

    fn info_mut(&mut self, id: FunctionId) -> &mut FunctionInfo {
        &mut self.tree.functions[id.index()]
    }

    fn strict(&self) -> bool {
        self.tree.function(self.function).strict
    }

    /// Declares `name` in `scope`, returning the existing symbol on redeclaration.
    fn declare(&mut self, scope: ScopeId, name: &str, role: SymbolRole) -> SymbolId {
        if let Some(existing) = self.tree.scope(scope).lookup(name) {
            return existing;
        }
        let id = SymbolId::new(self.tree.symbols.len());
        let mut symbol = Symbol::new(name, scope, role);
        symbol.is_global = self.tree.scope(scope).kind == ScopeKind::Global;
        self.tree.symbols.push(symbol);
        let s = self.scope_mut(scope);
        s.symbols.push(id);
        s.names.insert(name.to_string(), id);
        id
    }

    fn declare_lexical(&mut self, scope: ScopeId, name: &str, is_const: bool) {
        let id = self.declare(scope, name, SymbolRole::Normal);
        let symbol = self.symbol_mut(id);
        symbol.is_block_scoped = true;
        symbol.is_const = is_const;
        symbol.needs_declaration = true;
    }

    /// Runs `f` with `scope` as the current scope.
    fn in_scope<T>(&mut self, scope: ScopeId, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = std::mem::replace(&mut self.scope, scope);
        let result = f(self);
        self.scope = saved;
        result
    }

    // ------------------------------------------------------------------
    // References
    // ------------------------------------------------------------------

    fn mark_reference(&mut self, symbol: SymbolId) {
        let owner_scope = self.tree.symbol(symbol).scope;
        let owner = self.tree.scope(owner_scope).function;
        if owner != self.function && !self.tree.symbol(symbol).is_global {
            trace!(name = %self.tree.symbol(symbol).name, "captured");
            self.symbol_mut(symbol).captured = true;
            self.scope_mut(owner_scope).must_instantiate = true;
            let current = self.function;
            self.info_mut(current).uses_outer_scopes = true;
        }
    }

    fn reference(&mut self, name: &str) {
        if name == implicit::ARGUMENTS && self.reference_arguments() {
            return;
        }
        let resolution = self.tree.resolve(name, self.scope);
        let current = self.function;
        if resolution
            .probes
            .iter()
            .any(|&p| self.tree.scope(p).function != current)
        {
            self.info_mut(current).uses_outer_scopes = true;
        }
        if let Some(symbol) = resolution.symbol {
            self.mark_reference(symbol);
        }
    }

    /// Binds `arguments` to the nearest non-arrow function unless a closer
    /// declaration shadows it. Returns false at global level.
    fn reference_arguments(&mut self) -> bool {
        let Some(owner) = self.tree.this_function(self.function) else {
            return false;
        };
        let resolution = self.tree.resolve(implicit::ARGUMENTS, self.scope);
        if let Some(symbol) = resolution.symbol {
            let declared_in = self.tree.scope(self.tree.symbol(symbol).scope).function;
            if self.tree.is_within(declared_in, owner) {
                self.mark_reference(symbol);
                return true;
            }
        }
        self.implicit(SymbolRole::Arguments, implicit::ARGUMENTS);
        true
    }

    /// Declares an implicit binding in the nearest function that owns one.
    fn implicit(&mut self, role: SymbolRole, name: &str) {
        let Some(owner) = self.tree.this_function(self.function) else {
            return;
        };
        let params = self.tree.function(owner).params_scope;
        let symbol = self.declare(params, name, role);
        self.mark_reference(symbol);
    }

    fn direct_eval(&mut self) {
        let current = self.function;
        self.info_mut(current).calls_eval = true;
        let mut scope = Some(self.scope);
        while let Some(id) = scope {
            self.scope_mut(id).captures_all = true;
            scope = self.tree.scope(id).parent;
        }
        if !self.strict() {
            let body = self.tree.function(current).body_scope;
            if self.tree.scope(body).kind != ScopeKind::Global {
                self.scope_mut(body).dynamic = true;
            }
        }
        if self.tree.this_function(current).is_some() {
            self.implicit(SymbolRole::This, implicit::THIS);
            self.implicit(SymbolRole::NewTarget, implicit::NEW_TARGET);
            self.implicit(SymbolRole::Arguments, implicit::ARGUMENTS);
        }
        debug!(function = current.0, "direct eval forces captures-all");
    }

    fn debugger_statement(&mut self) {
        if !self.config.debugger_tracking {
            return;
        }
        let mut scope = Some(self.scope);
        while let Some(id) = scope {
            self.scope_mut(id).captures_all = true;
            scope = self.tree.scope(id).parent;
        }
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    /// Hoists `var` and function declarations into a function or global scope,
    /// plus the top-level lexical declarations.
    fn hoist_var_scope(&mut self, scope: ScopeId, body: &[Statement], params: Option<ScopeId>) {
        let mut vars = Vec::new();
        var_names(body, &mut vars);
        for name in vars {
            if params.is_some_and(|p| self.tree.scope(p).lookup(name).is_some()) {
                continue;
            }
            self.declare(scope, name, SymbolRole::Normal);
        }
        for stmt in body {
            if let StatementKind::FunctionDeclaration(f) = &stmt.kind
                && let Some(name) = &f.name
            {
                let id = self.declare(scope, &name.name, SymbolRole::Normal);
                self.symbol_mut(id).is_function_decl = true;
            }
        }
        self.hoist_lexical(scope, body, false);
    }

    /// Declares the lexical bindings of a statement list.
    fn hoist_lexical(&mut self, scope: ScopeId, body: &[Statement], functions: bool) {
        for stmt in body {
            match &stmt.kind {
                StatementKind::VariableDeclaration(decl) if decl.kind.is_lexical() => {
                    let mut names = Vec::new();
                    for d in &decl.declarations {
                        pattern_names(&d.target, &mut names);
                    }
                    for name in names {
                        self.declare_lexical(scope, name, decl.kind == VariableKind::Const);
                    }
                }
                StatementKind::ClassDeclaration(class) => {
                    if let Some(name) = &class.name {
                        self.declare_lexical(scope, &name.name, false);
                    }
                }
                StatementKind::FunctionDeclaration(f) if functions => {
                    if let Some(name) = &f.name {
                        let id = self.declare(scope, &name.name, SymbolRole::Normal);
                        let symbol = self.symbol_mut(id);
                        symbol.is_function_decl = true;
                        symbol.is_block_scoped = true;
                    }
                }
                _ => {}
            }
        }
    }

    // ------------------------------------------------------------------
    // Program and functions
    // ------------------------------------------------------------------

    fn program(&mut self, program: &Program) -> Result<()> {
        let strict = program.strict || self.config.strict;
        self.tree.functions.push(FunctionInfo {
            node: program.id,
            name: None,
            flavor: FunctionFlavor::Global,
            is_async: false,
            is_generator: false,
            strict,
            parent: None,
            definition_scope: None,
            params_scope: ScopeId::default(),
            body_scope: ScopeId::default(),
            param_count: 0,
            calls_eval: false,
            creates_closures: false,
            uses_outer_scopes: false,
            env_register: None,
            permanent_registers: 0,
        });
        self.tree.function_index.insert(program.id, ScopeTree::ROOT);
        let global = self.new_scope(ScopeKind::Global, program.id)?;
        let info = self.info_mut(ScopeTree::ROOT);
        info.params_scope = global;
        info.body_scope = global;
        self.scope = global;
        self.hoist_var_scope(global, &program.body, None);
        self.statements(&program.body)
    }

    fn new_function(
        &mut self,
        node: NodeId,
        name: Option<String>,
        flavor: FunctionFlavor,
        strict: bool,
    ) -> Result<FunctionId> {
        let id = FunctionId::new(self.tree.functions.len());
        if self.tree.function_index.insert(node, id).is_some() {
            return Err(EmitError::DuplicateNode(node));
        }
        let parent = self.function;
        self.info_mut(parent).creates_closures = true;
        self.tree.functions.push(FunctionInfo {
            node,
            name,
            flavor,
            is_async: false,
            is_generator: false,
            strict,
            parent: Some(parent),
            definition_scope: Some(self.scope),
            params_scope: ScopeId::default(),
            body_scope: ScopeId::default(),
            param_count: 0,
            calls_eval: false,
            creates_closures: false,
            uses_outer_scopes: false,
            env_register: None,
            permanent_registers: 0,
        });
        Ok(id)
    }

    /// Binds a function node. `in_class` makes it strict; `is_expression`
    /// lets a named function see its own name.
    fn function(&mut self, f: &Function, in_class: bool, is_expression: bool) -> Result<FunctionId> {
        self.descend()?;
        let strict = self.strict() || f.strict || in_class;
        let id = self.new_function(
            f.id,
            f.name.as_ref().map(|n| n.name.clone()),
            flavor_of(f.kind),
            strict,
        )?;
        {
            let info = self.info_mut(id);
            info.is_async = f.is_async;
            info.is_generator = f.is_generator;
            info.param_count = f.params.len() as u32;
        }

        let saved_function = std::mem::replace(&mut self.function, id);
        let saved_scope = self.scope;
        let result = self.function_scopes(f, is_expression);
        self.function = saved_function;
        self.scope = saved_scope;
        self.ascend();
        result.map(|()| id)
    }

    fn function_scopes(&mut self, f: &Function, is_expression: bool) -> Result<()> {
        let id = self.function;
        let params = self.new_scope(ScopeKind::Parameters, f.id)?;
        self.info_mut(id).params_scope = params;

        let complex = has_complex_params(f);
        let mut names = Vec::new();
        for param in &f.params {
            pattern_names(&param.target, &mut names);
        }
        if let Some(rest) = &f.rest {
            pattern_names(rest, &mut names);
        }
        for name in names {
            let symbol = self.declare(params, name, SymbolRole::Normal);
            let symbol = self.symbol_mut(symbol);
            symbol.is_param = true;
            symbol.needs_declaration = complex;
        }
        if is_expression
            && f.kind == FunctionKind::Normal
            && let Some(name) = &f.name
            && self.tree.scope(params).lookup(&name.name).is_none()
        {
            self.declare(params, &name.name, SymbolRole::FunctionName);
        }

        self.scope = params;
        for param in &f.params {
            self.element(param)?;
        }
        if let Some(rest) = &f.rest {
            self.pattern(rest)?;
        }

        let body = self.new_scope(ScopeKind::FunctionBody, f.id)?;
        self.info_mut(id).body_scope = body;
        self.hoist_var_scope(body, &f.body, Some(params));
        self.scope = body;
        self.statements(&f.body)
    }

    /// Binds the synthesized field initializer of `class`.
    fn field_initializer(&mut self, class: &Class, node: NodeId, is_static: bool) -> Result<()> {
        let id = self.new_function(node, None, FunctionFlavor::FieldInitializer, true)?;
        let saved_function = std::mem::replace(&mut self.function, id);
        let saved_scope = self.scope;
        let result = self.field_initializer_scopes(class, node, is_static);
        self.function = saved_function;
        self.scope = saved_scope;
        result
    }

    fn field_initializer_scopes(&mut self, class: &Class, node: NodeId, is_static: bool) -> Result<()> {
        let id = self.function;
        let class_scope = self.tree.scope_for(class.id, ScopeKind::Class)?;
        let params = self.new_scope(ScopeKind::Parameters, node)?;
        self.info_mut(id).params_scope = params;
        self.scope = params;
        let body = self.new_scope(ScopeKind::FunctionBody, node)?;
        self.info_mut(id).body_scope = body;
        self.scope = body;
        self.implicit(SymbolRole::This, implicit::THIS);
        for (index, member) in class.members.iter().enumerate() {
            if member.is_static != is_static {
                continue;
            }
            let ClassMemberValue::Field(init) = &member.value else {
                continue;
            };
            if matches!(member.key, PropertyKey::Computed(_))
                && let Some(key) = self.tree.scope(class_scope).lookup(&implicit::field_key(index))
            {
                self.mark_reference(key);
            }
            if let Some(init) = init {
                self.expression(init)?;
            }
        }
        Ok(())
    }

    fn class(&mut self, class: &Class) -> Result<()> {
        self.descend()?;
        let scope = self.new_scope(ScopeKind::Class, class.id)?;
        let result = self.in_scope(scope, |b| {
            if let Some(name) = &class.name {
                b.declare_lexical(scope, &name.name, true);
            }
            if let Some(heritage) = &class.super_class {
                b.expression(heritage)?;
            }
            if let Some(ctor) = &class.constructor {
                b.function(ctor, true, false)?;
            }
            for (index, member) in class.members.iter().enumerate() {
                if let PropertyKey::Computed(key) = &member.key {
                    b.expression(key)?;
                    if matches!(member.value, ClassMemberValue::Field(_)) {
                        let id = b.declare(scope, &implicit::field_key(index), SymbolRole::FieldKey);
                        b.symbol_mut(id).is_const = true;
                    }
                }
                match &member.value {
                    ClassMemberValue::Method(f) | ClassMemberValue::Getter(f) | ClassMemberValue::Setter(f) => {
                        b.function(f, true, false)?;
                    }
                    ClassMemberValue::Field(_) => {}
                }
            }
            if class.instance_fields().next().is_some() {
                b.field_initializer(class, class.fields_id, false)?;
            }
            if class.static_fields().next().is_some() {
                b.field_initializer(class, class.static_fields_id, true)?;
            }
            Ok(())
        });
        self.ascend();
        result
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn statements(&mut self, body: &[Statement]) -> Result<()> {
        body.iter().try_for_each(|stmt| self.statement(stmt))
    }

    fn block(&mut self, block: &BlockStatement) -> Result<()> {
        let scope = self.new_scope(ScopeKind::Block, block.id)?;
        self.hoist_lexical(scope, &block.body, true);
        self.in_scope(scope, |b| b.statements(&block.body))
    }

    fn declaration(&mut self, decl: &VariableDeclaration) -> Result<()> {
        for d in &decl.declarations {
            self.pattern(&d.target)?;
            if let Some(init) = &d.init {
                self.expression(init)?;
            }
        }
        Ok(())
    }

    fn for_head(&mut self, node: NodeId, left: &ForHead) -> Result<ScopeId> {
        let scope = self.new_scope(ScopeKind::Block, node)?;
        if let ForHead::Declaration { kind, target } = left
            && kind.is_lexical()
        {
            let mut names = Vec::new();
            pattern_names(target, &mut names);
            for name in names {
                self.declare_lexical(scope, name, *kind == VariableKind::Const);
            }
        }
        Ok(scope)
    }

    fn statement(&mut self, stmt: &Statement) -> Result<()> {
        self.descend()?;
        let result = match &stmt.kind {
            StatementKind::VariableDeclaration(decl) => self.declaration(decl),
            StatementKind::FunctionDeclaration(f) => self.function(f, false, false).map(drop),
            StatementKind::ClassDeclaration(class) => self.class(class),
            StatementKind::Expression(e) | StatementKind::Throw(e) => self.expression(e),
            StatementKind::Block(block) => self.block(block),
            StatementKind::If(i) => {
                self.expression(&i.test)?;
                self.statement(&i.consequent)?;
                match &i.alternate {
                    Some(alt) => self.statement(alt),
                    None => Ok(()),
                }
            }
            StatementKind::Switch(s) => {
                self.expression(&s.discriminant)?;
                let scope = self.new_scope(ScopeKind::Block, s.id)?;
                self.scope_mut(scope).is_switch = true;
                for case in &s.cases {
                    self.hoist_lexical(scope, &case.consequent, true);
                }
                self.in_scope(scope, |b| {
                    for case in &s.cases {
                        if let Some(test) = &case.test {
                            b.expression(test)?;
                        }
                        b.statements(&case.consequent)?;
                    }
                    Ok(())
                })
            }
            StatementKind::While(w) => {
                self.expression(&w.test)?;
                self.statement(&w.body)
            }
            StatementKind::DoWhile(d) => {
                self.statement(&d.body)?;
                self.expression(&d.test)
            }
            StatementKind::For(f) => {
                let scope = self.new_scope(ScopeKind::Block, f.id)?;
                if let Some(ForInit::Declaration(decl)) = &f.init
                    && decl.kind.is_lexical()
                {
                    let mut names = Vec::new();
                    for d in &decl.declarations {
                        pattern_names(&d.target, &mut names);
                    }
                    for name in names {
                        self.declare_lexical(scope, name, decl.kind == VariableKind::Const);
                    }
                    self.scope_mut(scope).per_iteration = decl.kind == VariableKind::Let;
                }
                self.in_scope(scope, |b| {
                    match &f.init {
                        Some(ForInit::Declaration(decl)) => b.declaration(decl)?,
                        Some(ForInit::Expression(e)) => b.expression(e)?,
                        None => {}
                    }
                    if let Some(test) = &f.test {
                        b.expression(test)?;
                    }
                    if let Some(update) = &f.update {
                        b.expression(update)?;
                    }
                    b.statement(&f.body)
                })
            }
            StatementKind::ForIn(ForInStatement {
                id, left, right, body, ..
            })
            | StatementKind::ForOf(ForOfStatement {
                id, left, right, body, ..
            }) => {
                self.expression(right)?;
                let scope = self.for_head(*id, left)?;
                self.in_scope(scope, |b| {
                    match left {
                        ForHead::Declaration { target, .. } | ForHead::Target(target) => b.pattern(target)?,
                    }
                    b.statement(body)
                })
            }
            StatementKind::Return(arg) => match arg {
                Some(e) => self.expression(e),
                None => Ok(()),
            },
            StatementKind::Try(t) => {
                self.block(&t.block)?;
                if let Some(handler) = &t.handler {
                    let scope = self.new_scope(ScopeKind::Catch, handler.id)?;
                    if let Some(param) = &handler.param {
                        let mut names = Vec::new();
                        pattern_names(param, &mut names);
                        for name in names {
                            let id = self.declare(scope, name, SymbolRole::Normal);
                            let symbol = self.symbol_mut(id);
                            symbol.is_catch_param = true;
                            symbol.is_block_scoped = true;
                        }
                    }
                    self.in_scope(scope, |b| {
                        if let Some(param) = &handler.param {
                            b.pattern(param)?;
                        }
                        b.block(&handler.body)
                    })?;
                }
                match &t.finalizer {
                    Some(finalizer) => self.block(finalizer),
                    None => Ok(()),
                }
            }
            StatementKind::With(w) => {
                self.expression(&w.object)?;
                let scope = self.new_scope(ScopeKind::With, w.id)?;
                self.in_scope(scope, |b| b.statement(&w.body))
            }
            StatementKind::Labeled(l) => self.statement(&l.body),
            StatementKind::Debugger => {
                self.debugger_statement();
                Ok(())
            }
            StatementKind::Break(_) | StatementKind::Continue(_) | StatementKind::Empty => Ok(()),
        };
        self.ascend();
        result
    }

    // ------------------------------------------------------------------
    // Patterns and expressions
    // ------------------------------------------------------------------

    fn element(&mut self, element: &PatternElement) -> Result<()> {
        self.pattern(&element.target)?;
        match &element.default {
            Some(default) => self.expression(default),
            None => Ok(()),
        }
    }

    fn pattern(&mut self, pattern: &Pattern) -> Result<()> {
        match pattern {
            Pattern::Identifier(id) => {
                self.reference(&id.name);
                Ok(())
            }
            Pattern::Member(e) => self.expression(e),
            Pattern::Array(array) => {
                for element in array.elements.iter().flatten() {
                    self.element(element)?;
                }
                match &array.rest {
                    Some(rest) => self.pattern(rest),
                    None => Ok(()),
                }
            }
            Pattern::Object(object) => {
                for prop in &object.properties {
                    self.key(&prop.key)?;
                    self.element(&prop.value)?;
                }
                match &object.rest {
                    Some(rest) => self.pattern(rest),
                    None => Ok(()),
                }
            }
        }
    }

    fn key(&mut self, key: &PropertyKey) -> Result<()> {
        match key {
            PropertyKey::Computed(e) => self.expression(e),
            _ => Ok(()),
        }
    }

    fn arguments(&mut self, args: &[Argument]) -> Result<()> {
        args.iter().try_for_each(|a| match a {
            Argument::Expression(e) | Argument::Spread(e) => self.expression(e),
        })
    }

    fn member_property(&mut self, property: &MemberProperty) -> Result<()> {
        match property {
            MemberProperty::Identifier(_) => Ok(()),
            MemberProperty::Expression(e) => self.expression(e),
        }
    }

    fn expression(&mut self, expr: &Expression) -> Result<()> {
        self.descend()?;
        let result = match expr {
            Expression::Literal(_) => Ok(()),
            Expression::Identifier(id) => {
                self.reference(&id.name);
                Ok(())
            }
            Expression::This => {
                self.implicit(SymbolRole::This, implicit::THIS);
                Ok(())
            }
            Expression::NewTarget => {
                self.implicit(SymbolRole::NewTarget, implicit::NEW_TARGET);
                Ok(())
            }
            Expression::Array(array) => array.elements.iter().flatten().try_for_each(|a| match a {
                Argument::Expression(e) | Argument::Spread(e) => self.expression(e),
            }),
            Expression::Object(object) => object.properties.iter().try_for_each(|p| match p {
                Property::Init { key, value } => {
                    self.key(key)?;
                    self.expression(value)
                }
                Property::Method { key, function } => {
                    self.key(key)?;
                    self.function(function, false, false).map(drop)
                }
                Property::Spread(e) => self.expression(e),
            }),
            Expression::Function(f) => self.function(f, false, true).map(drop),
            Expression::Class(class) => self.class(class),
            Expression::Binary(b) => {
                self.expression(&b.left)?;
                self.expression(&b.right)
            }
            Expression::Unary(u) => self.expression(&u.argument),
            Expression::Update(u) => self.expression(&u.argument),
            Expression::Assignment(a) => {
                self.pattern(&a.target)?;
                self.expression(&a.value)
            }
            Expression::Conditional(c) => {
                self.expression(&c.test)?;
                self.expression(&c.consequent)?;
                self.expression(&c.alternate)
            }
            Expression::Sequence(list) => list.iter().try_for_each(|e| self.expression(e)),
            Expression::Call(call) => {
                if call.is_direct_eval() {
                    self.direct_eval();
                }
                self.expression(&call.callee)?;
                self.arguments(&call.arguments)
            }
            Expression::SuperCall(args) => {
                self.implicit(SymbolRole::This, implicit::THIS);
                self.arguments(args)
            }
            Expression::New(new) => {
                self.expression(&new.callee)?;
                self.arguments(&new.arguments)
            }
            Expression::Member(m) => {
                self.expression(&m.object)?;
                self.member_property(&m.property)
            }
            Expression::SuperMember(property) => {
                self.implicit(SymbolRole::HomeObject, implicit::HOME_OBJECT);
                self.implicit(SymbolRole::This, implicit::THIS);
                self.member_property(property)
            }
            Expression::Template(t) => t.expressions.iter().try_for_each(|e| self.expression(e)),
            Expression::Yield(y) => match &y.argument {
                Some(arg) => self.expression(arg),
                None => Ok(()),
            },
            Expression::Await(arg) => self.expression(arg),
        };
        self.ascend();
        result
    }

    // ------------------------------------------------------------------
    // Layout
    // ------------------------------------------------------------------

    /// Fixes representations and storage, then hands over the tree.
    pub fn finish(mut self) -> Result<ScopeTree> {
        for index in 0..self.tree.scopes.len() {
            let scope = &mut self.tree.scopes[index];
            scope.representation = match scope.kind {
                ScopeKind::Global | ScopeKind::With => Representation::Object,
                _ if scope.dynamic => Representation::Object,
                _ if (scope.must_instantiate || scope.captures_all) && !scope.symbols.is_empty() => {
                    Representation::Slots
                }
                _ => Representation::Registers,
            };
            debug!(
                scope = index,
                kind = ?scope.kind,
                representation = ?scope.representation,
                symbols = scope.symbols.len(),
                "scope layout fixed"
            );
        }

        let mut by_function: Vec<Vec<ScopeId>> = vec![Vec::new(); self.tree.functions.len()];
        for (index, scope) in self.tree.scopes.iter().enumerate() {
            by_function[scope.function.index()].push(ScopeId::new(index));
        }

        for (index, scopes) in by_function.iter().enumerate() {
            let id = FunctionId::new(index);
            let needs_env = {
                let tree = &self.tree;
                let info = tree.function(id);
                info.creates_closures
                    || info.uses_outer_scopes
                    || info.calls_eval
                    || scopes.iter().any(|&s| tree.scope(s).is_instantiated())
                    || info
                        .definition_scope
                        .is_some_and(|d| tree.env_chain(d).iter().any(|&s| tree.scope(s).dynamic))
            };

            let mut alloc = RegisterAllocator::new();
            let env = if needs_env {
                Some(alloc.acquire_permanent()?)
            } else {
                None
            };
            for &scope in scopes {
                if self.tree.scope(scope).is_instantiated() {
                    self.tree.scopes[scope.index()].register = Some(alloc.acquire_permanent()?);
                }
            }
            for &scope in scopes {
                let (representation, kind) = {
                    let s = self.tree.scope(scope);
                    (s.representation, s.kind)
                };
                let members = self.tree.scope(scope).symbols.clone();
                for (slot, symbol) in members.into_iter().enumerate() {
                    let storage = match representation {
                        Representation::Registers => Storage::Register(alloc.acquire_permanent()?),
                        Representation::Slots => Storage::Slot(slot as u32),
                        Representation::Object => Storage::Property,
                    };
                    let symbol = self.symbol_mut(symbol);
                    symbol.storage = storage;
                    symbol.is_global = kind == ScopeKind::Global;
                }
            }
            alloc.seal();
            let layout = alloc.layout();
            let info = self.info_mut(id);
            info.env_register = env;
            info.permanent_registers = layout.permanent;
            debug!(
                function = index,
                flavor = ?info.flavor,
                permanent = layout.permanent,
                env = ?env,
                "function layout fixed"
            );
        }
        Ok(self.tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use lodestar_macros::{assert_matches, assert_ok};

    fn bind_ok(program: &Program) -> ScopeTree {
        assert_ok!(bind(program, &EmitConfig::default()))
    }

    fn symbol_named<'t>(tree: &'t ScopeTree, name: &str) -> &'t Symbol {
        tree.symbols
            .iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("no symbol {}", name))
    }

    #[test]
    fn test_uncaptured_locals_get_registers() {
        let program = program(vec![function_decl(
            "f",
            &["a"],
            vec![let_("x", ident("a")), return_(Some(ident("x")))],
        )]);
        let tree = bind_ok(&program);
        assert_matches!(symbol_named(&tree, "x").storage, Storage::Register(_));
        assert_matches!(symbol_named(&tree, "a").storage, Storage::Register(_));
        assert!(symbol_named(&tree, "f").is_global);
    }

    #[test]
    fn test_capture_moves_symbol_to_slot() {
        let program = program(vec![function_decl(
            "outer",
            &[],
            vec![
                let_("count", num(0.0)),
                return_(Some(arrow(&[], vec![return_(Some(ident("count")))]))),
            ],
        )]);
        let tree = bind_ok(&program);
        let count = symbol_named(&tree, "count");
        assert!(count.captured);
        assert_eq!(count.storage, Storage::Slot(0));
        let scope = tree.scope(count.scope);
        assert_eq!(scope.representation, Representation::Slots);
        assert!(scope.register.is_some());
    }

    #[test]
    fn test_var_hoists_past_blocks() {
        let program = program(vec![function_decl(
            "f",
            &[],
            vec![block(vec![var_("v", num(1.0)), let_("l", num(2.0))])],
        )]);
        let tree = bind_ok(&program);
        let v = symbol_named(&tree, "v");
        let l = symbol_named(&tree, "l");
        assert_eq!(tree.scope(v.scope).kind, ScopeKind::FunctionBody);
        assert_eq!(tree.scope(l.scope).kind, ScopeKind::Block);
        assert!(l.needs_declaration);
        assert!(!v.needs_declaration);
    }

    #[test]
    fn test_direct_eval_forces_captures_all() {
        let program = program(vec![function_decl(
            "f",
            &["p"],
            vec![
                block(vec![let_("inner", num(1.0)), expr_stmt(call(ident("eval"), vec![string("inner")]))]),
            ],
        )]);
        let tree = bind_ok(&program);
        let inner = symbol_named(&tree, "inner");
        assert_eq!(tree.scope(inner.scope).representation, Representation::Slots);
        assert_matches!(symbol_named(&tree, "p").storage, Storage::Slot(_));
        let f = tree.function(FunctionId::new(1));
        assert!(f.calls_eval);
        // sloppy eval can add vars to the body scope
        assert_eq!(tree.scope(f.body_scope).representation, Representation::Object);
        assert!(tree.scope(f.body_scope).dynamic);
    }

    #[test]
    fn test_arrow_this_captures_enclosing_function() {
        let program = program(vec![function_decl(
            "f",
            &[],
            vec![return_(Some(arrow(&[], vec![return_(Some(this()))])))],
        )]);
        let tree = bind_ok(&program);
        let this = symbol_named(&tree, implicit::THIS);
        assert_eq!(this.role, SymbolRole::This);
        assert!(this.captured);
        assert_eq!(tree.scope(this.scope).kind, ScopeKind::Parameters);
    }

    #[test]
    fn test_arguments_is_lazy() {
        let without = program(vec![function_decl("f", &[], vec![])]);
        assert!(bind_ok(&without).symbols.iter().all(|s| s.name != "arguments"));

        let with = program(vec![function_decl("f", &[], vec![expr_stmt(ident("arguments"))])]);
        let tree = bind_ok(&with);
        assert_eq!(symbol_named(&tree, "arguments").role, SymbolRole::Arguments);
    }

    #[test]
    fn test_with_scope_is_dynamic_object() {
        let program = program(vec![with_(ident("obj"), block(vec![expr_stmt(assign_name("x", num(1.0)))]))]);
        let tree = bind_ok(&program);
        let with = tree.scopes.iter().find(|s| s.kind == ScopeKind::With).unwrap();
        assert!(with.dynamic);
        assert_eq!(with.representation, Representation::Object);
        assert!(with.register.is_some());
        assert!(tree.function(ScopeTree::ROOT).env_register.is_some());
    }

    #[test]
    fn test_for_let_is_per_iteration() {
        let program = program(vec![for_(
            for_let("i", num(0.0)),
            None,
            None,
            block(vec![expr_stmt(arrow(&[], vec![return_(Some(ident("i")))]))]),
        )]);
        let tree = bind_ok(&program);
        let i = symbol_named(&tree, "i");
        let head = tree.scope(i.scope);
        assert!(head.per_iteration);
        assert_eq!(head.representation, Representation::Slots);
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let mut program = program(vec![block(vec![]), block(vec![])]);
        for stmt in &mut program.body {
            if let StatementKind::Block(b) = &mut stmt.kind {
                b.id = NodeId(7);
            }
        }
        assert_matches!(
            bind(&program, &EmitConfig::default()),
            Err(EmitError::DuplicateNode(NodeId(7)))
        );
    }

    #[test]
    fn test_depth_limit() {
        let mut expr = num(1.0);
        for _ in 0..64 {
            expr = not(expr);
        }
        let program = program(vec![expr_stmt(expr)]);
        let config = EmitConfig {
            max_depth: 16,
            ..EmitConfig::default()
        };
        assert_matches!(bind(&program, &config), Err(EmitError::NestingTooDeep { limit: 16 }));
    }

    #[test]
    fn test_debugger_tracking_captures_chain() {
        let program = program(vec![function_decl(
            "f",
            &[],
            vec![let_("local", num(1.0)), debugger()],
        )]);
        let plain = bind_ok(&program);
        assert_matches!(symbol_named(&plain, "local").storage, Storage::Register(_));

        let tree = assert_ok!(bind(&program, &EmitConfig::debugging()));
        assert_matches!(symbol_named(&tree, "local").storage, Storage::Slot(_));
    }

    #[test]
    fn test_class_field_keys_are_hidden_symbols() {
        let program = program(vec![class_decl(
            "C",
            None,
            vec![field(PropertyKey::Computed(Box::new(ident("k"))), false, Some(num(1.0)))],
        )]);
        let tree = bind_ok(&program);
        let key = symbol_named(&tree, &implicit::field_key(0));
        assert_eq!(key.role, SymbolRole::FieldKey);
        // read by the synthesized initializer, so it lives in a slot
        assert!(key.captured);
        assert_matches!(key.storage, Storage::Slot(_));
    }
}
