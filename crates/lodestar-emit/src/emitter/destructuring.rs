//! Destructuring for declarations, parameters and assignment.

use super::*;
use reference::Key;
use reference::Reference;
use iteration::IteratorGuard;
use scope_access::StoreMode;

/// A destructuring target whose member reference, if any, has already been
/// evaluated.
enum Target<'a> {
    Pinned(Reference<'a>),
    Pattern(&'a Pattern),
}

impl<'a, 'w, W: BytecodeWriter> FunctionEmitter<'a, 'w, W> {
    /// Stores `value` into `pattern`. A member `pattern` is evaluated after
    /// the value; nested member targets are evaluated before theirs.
    pub(super) fn assign_pattern(&mut self, pattern: &'a Pattern, value: Reg, mode: StoreMode) -> Result<()> {
        self.descend()?;
        let result = match pattern {
            Pattern::Identifier(id) => self.store_name(&id.name, value, mode),
            Pattern::Member(target) => {
                let reference = self.emit_reference(target, false)?;
                self.store_reference(&reference, value)?;
                self.drop_reference(reference)
            }
            Pattern::Array(array) => self.assign_array_pattern(array, value, mode),
            Pattern::Object(object) => self.assign_object_pattern(object, value, mode),
        };
        self.ascend();
        result
    }

    /// Evaluates a member target's object and key ahead of its value.
    fn emit_target(&mut self, pattern: &'a Pattern) -> Result<Target<'a>> {
        match pattern {
            Pattern::Member(target) => Ok(Target::Pinned(self.emit_reference(target, true)?)),
            pattern => Ok(Target::Pattern(pattern)),
        }
    }

    fn drop_target(&mut self, target: Target<'a>) -> Result<()> {
        match target {
            Target::Pinned(reference) => self.drop_reference(reference),
            Target::Pattern(_) => Ok(()),
        }
    }

    /// Applies the element's default, then assigns. `value` must be a temp
    /// the caller owns.
    fn assign_element(
        &mut self,
        target: &Target<'a>,
        default: Option<&'a Expression>,
        value: Reg,
        mode: StoreMode,
    ) -> Result<()> {
        self.emit_default(value, default)?;
        match target {
            Target::Pinned(reference) => self.store_reference(reference, value),
            Target::Pattern(pattern) => self.assign_pattern(pattern, value, mode),
        }
    }

    fn assign_object_pattern(&mut self, pattern: &'a ObjectPattern, source: Reg, mode: StoreMode) -> Result<()> {
        self.emit_instr(instr!(CheckObjectCoercible, source));
        let excluded = match pattern.rest {
            Some(_) => {
                let keys = self.temp();
                self.emit_instr(instr!(NewArray, keys));
                Some(keys)
            }
            None => None,
        };

        for property in &pattern.properties {
            let key = self.emit_property_key(&property.key)?;
            if let Some(keys) = excluded {
                match key {
                    Key::Reg(reg) => self.emit_instr(instr!(ArrayPush, keys, reg)),
                    Key::Name(_) => {
                        let name = property.key.static_name().unwrap_or_default();
                        let name = self.constant(Constant::String(name));
                        let reg = self.temp();
                        self.emit_instr(instr!(LdConst, reg, name));
                        self.emit_instr(instr!(ArrayPush, keys, reg));
                        self.release(reg)?;
                    }
                }
            }
            let target = self.emit_target(&property.value.target)?;
            let value = self.temp();
            match key {
                Key::Name(name) => self.emit_instr(instr!(LdField, value, source, name)),
                Key::Reg(reg) => self.emit_instr(instr!(LdElem, value, source, reg)),
            }
            self.assign_element(&target, property.value.default.as_ref(), value, mode)?;
            self.release(value)?;
            self.drop_target(target)?;
            self.drop_key(key)?;
        }

        if let (Some(rest), Some(keys)) = (&pattern.rest, excluded) {
            let target = self.emit_target(rest)?;
            let remaining = self.temp();
            self.emit_instr(instr!(NewObject, remaining));
            self.emit_instr(instr!(CopyDataProperties, remaining, source, keys));
            self.assign_element(&target, None, remaining, mode)?;
            self.release(remaining)?;
            self.drop_target(target)?;
            self.release(keys)?;
        }
        Ok(())
    }

    fn assign_array_pattern(&mut self, pattern: &'a ArrayPattern, source: Reg, mode: StoreMode) -> Result<()> {
        let iter = self.temp();
        self.emit_instr(instr!(GetIterator, iter, source));
        let done = self.temp();
        self.emit_instr(instr!(LdFalse, done));
        let guard = self.open_guard(iter)?;

        for element in &pattern.elements {
            let target = match element {
                Some(element) => Some(self.emit_guarded_target(&guard, done, &element.target)?),
                None => None,
            };
            let value = self.temp();
            self.emit_iterator_step(iter, done, value)?;
            if let (Some(element), Some(target)) = (element, &target) {
                self.arm_unless_done(&guard, done);
                self.assign_element(target, element.default.as_ref(), value, mode)?;
                self.disarm(&guard);
            }
            self.release(value)?;
            if let Some(target) = target {
                self.drop_target(target)?;
            }
        }

        if let Some(rest) = &pattern.rest {
            let target = self.emit_guarded_target(&guard, done, rest)?;
            let array = self.temp();
            self.emit_instr(instr!(NewArray, array));
            let value = self.temp();
            let collect = self.label();
            let collected = self.label();
            self.mark(collect)?;
            self.emit_instr(instr!(BrTrue, collected, done));
            self.emit_iterator_step(iter, done, value)?;
            self.emit_instr(instr!(BrTrue, collected, done));
            self.emit_instr(instr!(ArrayPush, array, value));
            self.emit_instr(instr!(Br, collect));
            self.mark(collected)?;
            self.release(value)?;
            // the iterator is drained or has thrown; nothing left to close
            self.assign_element(&target, None, array, mode)?;
            self.release(array)?;
            self.drop_target(target)?;
        }

        self.close_guard(guard)?;
        let exhausted = self.label();
        self.emit_instr(instr!(BrTrue, exhausted, done));
        self.emit_instr(instr!(IteratorClose, iter));
        self.mark(exhausted)?;
        self.release(done)?;
        self.release(iter)
    }

    /// Evaluates a member target while a throw would still have to close
    /// the iterator.
    fn emit_guarded_target(&mut self, guard: &IteratorGuard, done: Reg, pattern: &'a Pattern) -> Result<Target<'a>> {
        if !matches!(pattern, Pattern::Member(_)) {
            return Ok(Target::Pattern(pattern));
        }
        self.arm_unless_done(guard, done);
        let target = self.emit_target(pattern)?;
        self.disarm(guard);
        Ok(target)
    }

    /// `value <- next value`, or undefined once `done` is set. A throwing
    /// `next()` leaves `done` set so nothing closes the iterator.
    fn emit_iterator_step(&mut self, iter: Reg, done: Reg, value: Reg) -> Result<()> {
        let exhausted = self.label();
        let end = self.label();
        self.emit_instr(instr!(LdUndef, value));
        self.emit_instr(instr!(BrTrue, end, done));
        self.emit_instr(instr!(LdTrue, done));
        self.emit_instr(instr!(IteratorNext, value, iter));
        self.emit_instr(instr!(CheckIteratorResult, value));
        let flag = self.temp();
        let done_name = self.name("done");
        self.emit_instr(instr!(LdField, flag, value, done_name));
        self.emit_instr(instr!(BrTrue, exhausted, flag));
        self.release(flag)?;
        self.emit_instr(instr!(LdFalse, done));
        let value_name = self.name("value");
        self.emit_instr(instr!(LdField, value, value, value_name));
        self.emit_instr(instr!(Br, end));
        self.mark(exhausted)?;
        self.emit_instr(instr!(LdUndef, value));
        self.mark(end)
    }
}
