//! Class definitions and their field initializers.

use super::*;
use crate::scope::implicit;
use reference::Key;
use scope_access::StoreMode;

impl<'a, 'w, W: BytecodeWriter> FunctionEmitter<'a, 'w, W> {
    /// Evaluates a class: heritage, constructor, the inner name, static
    /// members on the constructor, instance members on the prototype, then
    /// the field initializers.
    pub(super) fn emit_class(&mut self, class: &'a Class, dest: Dest) -> Result<Value> {
        let scope = self.tree.scope_for(class.id, ScopeKind::Class)?;
        let constructor = self.temp();
        self.enter_scope(scope, None)?;

        let heritage = match &class.super_class {
            Some(heritage) => Some(self.emit_held(heritage)?),
            None => None,
        };
        let instruction = match (&class.constructor, heritage) {
            (Some(function), heritage) => {
                let index = self.child(FunctionSource::Function(function));
                let env = self.current_env()?;
                match heritage {
                    Some(heritage) => instr!(NewClass, constructor, index, env, heritage.reg),
                    None => instr!(NewClass, constructor, index, env),
                }
            }
            (None, Some(heritage)) => instr!(NewDefaultClass, constructor, heritage.reg),
            (None, None) => instr!(NewDefaultClass, constructor),
        };
        self.emit_instr(instruction);
        if let Some(heritage) = heritage {
            self.drop_held(heritage)?;
        }
        if let Some(name) = &class.name {
            self.store_name(&name.name, constructor, StoreMode::Init)?;
        }

        let prototype = self.temp();
        let prototype_name = self.name("prototype");
        self.emit_instr(instr!(LdField, prototype, constructor, prototype_name));
        self.emit_class_members(class, constructor, true)?;
        self.emit_class_members(class, prototype, false)?;
        self.release(prototype)?;

        if class.instance_fields().next().is_some() {
            let initializer = self.temp();
            self.new_closure(initializer, FunctionSource::FieldInitializer { class, is_static: false })?;
            self.emit_instr(instr!(SetFieldInitializer, constructor, initializer));
            self.release(initializer)?;
        }
        if class.static_fields().next().is_some() {
            let initializer = self.temp();
            self.new_closure(initializer, FunctionSource::FieldInitializer { class, is_static: true })?;
            self.emit_instr(instr!(Call, initializer, initializer, constructor, initializer, 0u32));
            self.release(initializer)?;
        }

        self.exit_scope()?;
        self.place(dest, Value::Temp(constructor))
    }

    /// Installs the methods of one group on `target` and evaluates the
    /// group's computed field keys, in source order.
    fn emit_class_members(&mut self, class: &'a Class, target: Reg, is_static: bool) -> Result<()> {
        for (index, member) in class.members.iter().enumerate() {
            if member.is_static != is_static {
                continue;
            }
            let (define, function) = match &member.value {
                ClassMemberValue::Method(function) => (OpCode::DefineMethod, function),
                ClassMemberValue::Getter(function) => (OpCode::DefineGetter, function),
                ClassMemberValue::Setter(function) => (OpCode::DefineSetter, function),
                ClassMemberValue::Field(_) => {
                    if matches!(member.key, PropertyKey::Computed(_)) {
                        let Key::Reg(key) = self.emit_property_key(&member.key)? else {
                            continue;
                        };
                        self.store_name(&implicit::field_key(index), key, StoreMode::Init)?;
                        self.release(key)?;
                    }
                    continue;
                }
            };
            let key = self.emit_property_key(&member.key)?;
            let closure = self.temp();
            self.new_closure(closure, FunctionSource::Function(function))?;
            // class methods are not enumerable
            self.emit_instr(Instruction::new(
                define,
                vec![target.into(), key.operand(), closure.into(), 0u32.into()],
            ));
            self.release(closure)?;
            self.drop_key(key)?;
        }
        Ok(())
    }

    pub(super) fn emit_class_declaration(&mut self, class: &'a Class) -> Result<()> {
        let value = self.emit_class(class, Dest::Any)?;
        let held = self.hold(value);
        if let Some(name) = &class.name {
            self.store_name(&name.name, held.reg, StoreMode::Init)?;
        }
        self.drop_held(held)
    }

    /// The body of a synthesized field initializer: defines each field of
    /// the group on `this`.
    pub(super) fn emit_field_initializer(&mut self, class: &'a Class, is_static: bool) -> Result<()> {
        let info = self.info;
        if let Some(env) = info.env_register {
            self.emit_instr(instr!(LdEnv, env));
        }
        self.enter_scope(info.params_scope, None)?;
        self.emit_implicit_bindings()?;
        self.enter_scope(info.body_scope, None)?;

        let this = self.load_this(Dest::Any)?;
        let this = self.hold(this);
        for (index, member) in class.members.iter().enumerate() {
            if member.is_static != is_static {
                continue;
            }
            let ClassMemberValue::Field(init) = &member.value else {
                continue;
            };
            let key = match &member.key {
                PropertyKey::Computed(_) => {
                    let reg = self.temp();
                    self.load_name(&implicit::field_key(index), Dest::Reg(reg))?;
                    Key::Reg(reg)
                }
                key => self.emit_property_key(key)?,
            };
            let value = match init {
                Some(init) => self.emit_held(init)?,
                None => self.hold(Value::Discarded),
            };
            self.emit_instr(instr!(DefineField, this.reg, key.operand(), value.reg));
            self.drop_held(value)?;
            self.drop_key(key)?;
        }
        self.drop_held(this)?;

        self.emit_return_undefined()?;
        self.exit_scope()?;
        self.exit_scope()
    }
}
