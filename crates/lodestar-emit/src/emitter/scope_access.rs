//! Reading and writing bindings.
//!
//! A name resolves statically to a symbol (or to the global object when no
//! scope declares it). When dynamic scopes (`with`, sloppy direct eval) sit
//! between the use and the owner, each is probed at run time first, innermost
//! first, and the static access only runs when none of them has the name.

use super::*;
use crate::bytecode::RuntimeErrorKind;
use crate::scope::implicit;

/// How a store treats the binding's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StoreMode {
    /// Ordinary assignment; TDZ and const rules apply
    Assign,
    /// The declaration's own initialization
    Init,
}

impl<'a, 'w, W: BytecodeWriter> FunctionEmitter<'a, 'w, W> {
    pub(super) fn runtime_error(&mut self, kind: RuntimeErrorKind, name: Option<&str>) {
        match name {
            Some(name) => {
                let name = self.name(name);
                self.emit_instr(instr!(RuntimeError, name, kind as u32));
            }
            None => self.emit_instr(instr!(RuntimeError, kind as u32)),
        }
    }

    fn owner_function(&self, sym: SymbolId) -> FunctionId {
        self.tree.scope(self.tree.symbol(sym).scope).function
    }

    /// A read that provably happens before the declaration ran.
    fn is_early_access(&self, sym: SymbolId) -> bool {
        let symbol = self.tree.symbol(sym);
        symbol.needs_declaration
            && self.owner_function(sym) == self.function
            && !self.tree.scope(symbol.scope).is_switch
            && !self.declared.contains(&sym)
    }

    /// Whether the binding may still be uninitialized when this code runs.
    fn needs_tdz_check(&self, sym: SymbolId) -> bool {
        let symbol = self.tree.symbol(sym);
        symbol.needs_declaration
            && !symbol.is_global
            && (self.owner_function(sym) != self.function || self.tree.scope(symbol.scope).is_switch)
    }

    /// The run-time object of `scope` as seen from this function. An outer
    /// function's scope is reached through the closure environment; `scratch`
    /// receives the walked environment instead of a fresh temp when given.
    pub(super) fn scope_object(&mut self, scope: ScopeId, scratch: Option<Reg>) -> Result<Held> {
        let tree = self.tree;
        let owner = tree.scope(scope);
        if owner.function == self.function {
            let reg = owner.register.ok_or(EmitError::UnboundNode(owner.node))?;
            return Ok(Held { reg, temp: false });
        }
        let hops = tree.hops(self.function, scope).ok_or(EmitError::UnboundNode(owner.node))?;
        let env = self.info.env_register.ok_or(EmitError::UnboundNode(self.info.node))?;
        if hops == 0 {
            return Ok(Held { reg: env, temp: false });
        }
        let (reg, temp) = match scratch {
            Some(reg) => (reg, false),
            None => (self.temp(), true),
        };
        self.emit_instr(instr!(LdEnvAt, reg, env, hops));
        Ok(Held { reg, temp })
    }

    /// Loads the symbol's storage into `dst`, with no state checks.
    fn read_symbol(&mut self, sym: SymbolId, dst: Reg) -> Result<()> {
        let symbol = self.tree.symbol(sym);
        match symbol.storage {
            Storage::Register(reg) => {
                if reg != dst {
                    self.emit_instr(instr!(Mov, dst, reg));
                }
            }
            Storage::Slot(slot) => {
                let object = self.scope_object(symbol.scope, Some(dst))?;
                self.emit_instr(instr!(LdSlot, dst, object.reg, slot));
                self.drop_held(object)?;
            }
            Storage::Property if symbol.is_global => {
                let name = self.name(&symbol.name);
                self.emit_instr(instr!(LdGlobal, dst, name));
            }
            Storage::Property => {
                let name = self.name(&symbol.name);
                let object = self.scope_object(symbol.scope, Some(dst))?;
                self.emit_instr(instr!(LdScopeProp, dst, object.reg, name));
                self.drop_held(object)?;
            }
            Storage::Unallocated => return Err(EmitError::UnboundNode(self.tree.scope(symbol.scope).node)),
        }
        Ok(())
    }

    /// Stores `src` into the symbol's storage, with no state checks.
    fn write_symbol(&mut self, sym: SymbolId, src: Reg, init: bool) -> Result<()> {
        let symbol = self.tree.symbol(sym);
        match symbol.storage {
            Storage::Register(reg) => {
                if reg != src {
                    self.emit_instr(instr!(Mov, reg, src));
                }
            }
            Storage::Slot(slot) => {
                let object = self.scope_object(symbol.scope, None)?;
                self.emit_instr(instr!(StSlot, object.reg, slot, src));
                self.drop_held(object)?;
            }
            Storage::Property if symbol.is_global => {
                let name = self.name(&symbol.name);
                if init && symbol.is_block_scoped {
                    self.emit_instr(instr!(InitGlobalLexical, name, src));
                } else {
                    self.emit_instr(instr!(StGlobal, name, src));
                }
            }
            Storage::Property => {
                let name = self.name(&symbol.name);
                let object = self.scope_object(symbol.scope, None)?;
                self.emit_instr(instr!(StScopeProp, object.reg, name, src));
                self.drop_held(object)?;
            }
            Storage::Unallocated => return Err(EmitError::UnboundNode(self.tree.scope(symbol.scope).node)),
        }
        Ok(())
    }

    /// Loads a symbol, raising a ReferenceError for uninitialized lexicals.
    pub(super) fn load_symbol(&mut self, sym: SymbolId, dest: Dest) -> Result<Value> {
        let symbol = self.tree.symbol(sym);
        if self.is_early_access(sym) {
            self.runtime_error(RuntimeErrorKind::UseBeforeDeclaration, Some(&symbol.name));
        }
        let check = self.needs_tdz_check(sym);

        if let Storage::Register(reg) = symbol.storage {
            if check {
                let name = self.name(&symbol.name);
                self.emit_instr(instr!(CheckTdz, reg, name));
            }
            return match dest {
                Dest::Discard => Ok(Value::Discarded),
                Dest::Any => Ok(Value::Fixed(reg)),
                Dest::Reg(target) => {
                    if target != reg {
                        self.emit_instr(instr!(Mov, target, reg));
                    }
                    Ok(Value::Fixed(target))
                }
            };
        }

        let dst = self.target_reg(dest);
        self.read_symbol(sym, dst)?;
        if check {
            let name = self.name(&symbol.name);
            self.emit_instr(instr!(CheckTdz, dst, name));
        }
        self.deliver(dest, dst)
    }

    /// Stores into a symbol. Assignments check the binding's state first;
    /// const and function-name bindings raise instead of storing.
    pub(super) fn store_symbol(&mut self, sym: SymbolId, src: Reg, mode: StoreMode) -> Result<()> {
        let symbol = self.tree.symbol(sym);
        if mode == StoreMode::Init {
            self.write_symbol(sym, src, true)?;
            self.declared.insert(sym);
            return Ok(());
        }

        if symbol.role == SymbolRole::FunctionName {
            if self.info.strict {
                self.runtime_error(RuntimeErrorKind::AssignmentToConst, Some(&symbol.name));
            }
            return Ok(());
        }
        let initialized = self.check_initialized(sym)?;
        if symbol.is_const {
            self.runtime_error(RuntimeErrorKind::AssignmentToConst, Some(&symbol.name));
            return Ok(());
        }
        if initialized {
            self.write_symbol(sym, src, false)?;
        }
        Ok(())
    }

    /// Emits the TDZ check an assignment needs. Returns false when the
    /// assignment always fails.
    fn check_initialized(&mut self, sym: SymbolId) -> Result<bool> {
        let symbol = self.tree.symbol(sym);
        if self.is_early_access(sym) {
            self.runtime_error(RuntimeErrorKind::UseBeforeDeclaration, Some(&symbol.name));
            return Ok(false);
        }
        if self.needs_tdz_check(sym) {
            let name = self.name(&symbol.name);
            if let Storage::Register(reg) = symbol.storage {
                self.emit_instr(instr!(CheckTdz, reg, name));
            } else {
                let current = self.temp();
                self.read_symbol(sym, current)?;
                self.emit_instr(instr!(CheckTdz, current, name));
                self.release(current)?;
            }
        }
        Ok(true)
    }

    /// Emits `BrHasBinding` for each dynamic scope, returning the hit labels.
    fn emit_probes(&mut self, name: NameIndex, probes: &[ScopeId]) -> Result<Vec<(ScopeId, Label)>> {
        let mut hits = Vec::with_capacity(probes.len());
        for &scope in probes {
            let hit = self.label();
            let object = self.scope_object(scope, None)?;
            self.emit_instr(instr!(BrHasBinding, hit, object.reg, name));
            self.drop_held(object)?;
            hits.push((scope, hit));
        }
        Ok(hits)
    }

    /// Probes every dynamic scope for `name`, runs `fallback` when none has
    /// it, and `on_hit` with the scope object of the first one that does.
    fn guarded(
        &mut self,
        name: NameIndex,
        probes: &[ScopeId],
        fallback: impl FnOnce(&mut Self) -> Result<()>,
        mut on_hit: impl FnMut(&mut Self, ScopeId, Reg) -> Result<()>,
    ) -> Result<()> {
        let done = self.label();
        let hits = self.emit_probes(name, probes)?;
        fallback(self)?;
        self.emit_instr(instr!(Br, done));
        for (scope, hit) in hits {
            self.mark(hit)?;
            let object = self.scope_object(scope, None)?;
            on_hit(self, scope, object.reg)?;
            self.drop_held(object)?;
            self.emit_instr(instr!(Br, done));
        }
        self.mark(done)
    }

    /// Reads the static location of a name into `dst`.
    fn load_static(&mut self, symbol: Option<SymbolId>, name: NameIndex, dst: Reg) -> Result<()> {
        match symbol {
            Some(sym) => {
                self.load_symbol(sym, Dest::Reg(dst))?;
            }
            None => self.emit_instr(instr!(LdGlobal, dst, name)),
        }
        Ok(())
    }

    /// Loads the binding `name` resolves to from the current scope.
    pub(super) fn load_name(&mut self, name: &str, dest: Dest) -> Result<Value> {
        let resolution = self.tree.resolve(name, self.current_scope());
        if resolution.probes.is_empty()
            && let Some(sym) = resolution.symbol
        {
            return self.load_symbol(sym, dest);
        }

        // every path writes the same register, so take it before probing
        let dst = self.target_reg(dest);
        let name = self.name(name);
        self.guarded(
            name,
            &resolution.probes,
            |this| this.load_static(resolution.symbol, name, dst),
            |this, _, object| {
                this.emit_instr(instr!(LdScopeProp, dst, object, name));
                Ok(())
            },
        )?;
        self.deliver(dest, dst)
    }

    /// Loads a called name into `callee`. `this` receives the `with` object
    /// the name was found on, and undefined otherwise.
    pub(super) fn load_callee(&mut self, name: &str, this: Reg, callee: Reg) -> Result<()> {
        let resolution = self.tree.resolve(name, self.current_scope());
        let tree = self.tree;
        let name = self.name(name);
        self.emit_instr(instr!(LdUndef, this));
        self.guarded(
            name,
            &resolution.probes,
            |emitter| emitter.load_static(resolution.symbol, name, callee),
            |emitter, scope, object| {
                if tree.scope(scope).kind == ScopeKind::With {
                    emitter.emit_instr(instr!(Mov, this, object));
                }
                emitter.emit_instr(instr!(LdScopeProp, callee, object, name));
                Ok(())
            },
        )
    }

    /// Stores `src` into the binding `name` resolves to.
    pub(super) fn store_name(&mut self, name: &str, src: Reg, mode: StoreMode) -> Result<()> {
        let resolution = self.tree.resolve(name, self.current_scope());
        if resolution.probes.is_empty() || mode == StoreMode::Init {
            return self.store_resolved(resolution.symbol, name, src, mode);
        }

        let name_index = self.name(name);
        self.guarded(
            name_index,
            &resolution.probes,
            |this| this.store_resolved(resolution.symbol, name, src, mode),
            |this, _, object| {
                this.emit_instr(instr!(StScopeProp, object, name_index, src));
                Ok(())
            },
        )
    }

    fn store_resolved(&mut self, symbol: Option<SymbolId>, name: &str, src: Reg, mode: StoreMode) -> Result<()> {
        match symbol {
            Some(sym) => self.store_symbol(sym, src, mode),
            None => {
                let name = self.name(name);
                if self.info.strict {
                    self.emit_instr(instr!(StGlobalStrict, name, src));
                } else {
                    self.emit_instr(instr!(StGlobal, name, src));
                }
                Ok(())
            }
        }
    }

    /// Whether `name` names a register binding that a plain assignment may
    /// target directly: no probes, no checks, no const.
    pub(super) fn plain_register_binding(&self, name: &str) -> Option<Reg> {
        let resolution = self.tree.resolve(name, self.current_scope());
        if !resolution.probes.is_empty() {
            return None;
        }
        let sym = resolution.symbol?;
        let symbol = self.tree.symbol(sym);
        let plain = symbol.role == SymbolRole::Normal
            && !symbol.is_const
            && (!symbol.needs_declaration || self.declared.contains(&sym))
            && !self.needs_tdz_check(sym);
        match symbol.storage {
            Storage::Register(reg) if plain => Some(reg),
            _ => None,
        }
    }

    /// `typeof name`, which must not throw for undeclared globals.
    pub(super) fn typeof_name(&mut self, name: &str, dest: Dest) -> Result<Value> {
        let resolution = self.tree.resolve(name, self.current_scope());
        if resolution.symbol.is_some() {
            let value = self.load_name(name, Dest::Any)?;
            let held = self.hold(value);
            self.drop_held(held)?;
            let dst = self.target_reg(dest);
            self.emit_instr(instr!(TypeOf, dst, held.reg));
            return self.deliver(dest, dst);
        }

        let dst = self.target_reg(dest);
        let name = self.name(name);
        self.guarded(
            name,
            &resolution.probes,
            |this| {
                this.emit_instr(instr!(TypeofGlobal, dst, name));
                Ok(())
            },
            |this, _, object| {
                this.emit_instr(instr!(LdScopeProp, dst, object, name));
                this.emit_instr(instr!(TypeOf, dst, dst));
                Ok(())
            },
        )?;
        self.deliver(dest, dst)
    }

    /// `delete name`: declared bindings stay, global object and dynamic
    /// scope properties can go away.
    pub(super) fn delete_name(&mut self, name: &str, dest: Dest) -> Result<Value> {
        let resolution = self.tree.resolve(name, self.current_scope());
        let dst = self.target_reg(dest);
        let name = self.name(name);
        let declared = resolution
            .symbol
            .is_some_and(|sym| !self.tree.symbol(sym).is_global);
        self.guarded(
            name,
            &resolution.probes,
            |this| {
                if declared {
                    this.emit_instr(instr!(LdFalse, dst));
                } else {
                    this.emit_instr(instr!(DeleteGlobal, dst, name));
                }
                Ok(())
            },
            |this, _, object| {
                this.emit_instr(instr!(DeleteField, dst, object, name));
                Ok(())
            },
        )?;
        self.deliver(dest, dst)
    }

    // ========================================================================
    // Implicit bindings
    // ========================================================================

    /// `this`. Derived constructors check that `super()` has run.
    pub(super) fn load_this(&mut self, dest: Dest) -> Result<Value> {
        let tree = self.tree;
        let Some(sym) = tree.implicit_symbol(self.function, implicit::THIS) else {
            if dest == Dest::Discard {
                return Ok(Value::Discarded);
            }
            let dst = self.target_reg(dest);
            self.emit_instr(instr!(LdGlobalThis, dst));
            return self.deliver(dest, dst);
        };
        let derived = tree
            .this_function(self.function)
            .is_some_and(|owner| tree.function(owner).flavor == FunctionFlavor::DerivedConstructor);
        if !derived {
            return self.load_symbol(sym, dest);
        }
        let dst = self.target_reg(dest);
        self.load_symbol(sym, Dest::Reg(dst))?;
        self.emit_instr(instr!(CheckThisInitialized, dst));
        self.deliver(dest, dst)
    }

    /// `new.target`, or the home object of a method, loaded from its
    /// implicit binding; undefined where none exists.
    pub(super) fn load_implicit(&mut self, name: &str, dest: Dest) -> Result<Value> {
        match self.tree.implicit_symbol(self.function, name) {
            Some(sym) => self.load_symbol(sym, dest),
            None => {
                let dst = self.target_reg(dest);
                self.emit_instr(instr!(LdUndef, dst));
                self.deliver(dest, dst)
            }
        }
    }
}
