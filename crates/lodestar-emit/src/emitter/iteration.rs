//! The iterator-close protocol and for-of loops.
//!
//! While user code runs with an iterator outstanding, the iterator is
//! guarded by a catch region inside a finally region. Two flags say whether
//! each path must close it: the catch path closes (suppressing errors from
//! `return()`) and rethrows, the finally path closes on break, continue to
//! an outer loop, and return. The catch path clears the finally flag before
//! closing so the rethrow does not close a second time.

use super::*;
use exceptions::FinallyRegion;

/// A guarded iterator.
#[derive(Debug)]
pub(super) struct IteratorGuard {
    iter: Reg,
    close_on_throw: Reg,
    close_on_exit: Reg,
    region: FinallyRegion,
    handler: Label,
}

impl<'a, 'w, W: BytecodeWriter> FunctionEmitter<'a, 'w, W> {
    /// Opens the guard regions around `iter`, disarmed.
    pub(super) fn open_guard(&mut self, iter: Reg) -> Result<IteratorGuard> {
        let close_on_throw = self.temp();
        let close_on_exit = self.temp();
        self.emit_instr(instr!(LdFalse, close_on_throw));
        self.emit_instr(instr!(LdFalse, close_on_exit));
        let region = self.open_finally();
        let handler = self.label();
        self.emit_instr(instr!(TryCatch, handler));
        self.try_records.push(TryScopeRecord::TryCatch { handler });
        Ok(IteratorGuard {
            iter,
            close_on_throw,
            close_on_exit,
            region,
            handler,
        })
    }

    pub(super) fn arm(&mut self, guard: &IteratorGuard) {
        self.emit_instr(instr!(LdTrue, guard.close_on_throw));
        self.emit_instr(instr!(LdTrue, guard.close_on_exit));
    }

    /// Arms the guard only while the iterator is not `done`.
    pub(super) fn arm_unless_done(&mut self, guard: &IteratorGuard, done: Reg) {
        self.emit_instr(instr!(Not, guard.close_on_throw, done));
        self.emit_instr(instr!(Not, guard.close_on_exit, done));
    }

    pub(super) fn disarm(&mut self, guard: &IteratorGuard) {
        self.emit_instr(instr!(LdFalse, guard.close_on_throw));
        self.emit_instr(instr!(LdFalse, guard.close_on_exit));
    }

    /// Emits the catch and finally paths and releases the flags.
    pub(super) fn close_guard(&mut self, guard: IteratorGuard) -> Result<()> {
        let IteratorGuard {
            iter,
            close_on_throw,
            close_on_exit,
            region,
            handler,
        } = guard;

        self.try_records.pop();
        self.emit_instr(instr!(Leave));
        let after = self.label();
        self.emit_instr(instr!(Br, after));

        self.mark(handler)?;
        let exception = self.temp();
        self.emit_instr(instr!(Catch, exception));
        self.try_records.push(TryScopeRecord::CatchBody);
        let rethrow = self.label();
        self.emit_instr(instr!(BrFalse, rethrow, close_on_throw));
        self.emit_instr(instr!(LdFalse, close_on_exit));
        self.emit_instr(instr!(IteratorCloseSuppressed, iter));
        self.mark(rethrow)?;
        self.try_records.pop();
        self.emit_instr(instr!(Leave));
        self.emit_instr(instr!(Throw, exception));
        self.release(exception)?;
        self.mark(after)?;

        self.close_finally(region, |this| {
            let skip = this.label();
            this.emit_instr(instr!(BrFalse, skip, close_on_exit));
            this.emit_instr(instr!(IteratorClose, iter));
            this.mark(skip)
        })?;
        self.release(close_on_exit)?;
        self.release(close_on_throw)
    }

    pub(super) fn emit_for_of(&mut self, stmt: &'a ForOfStatement) -> Result<()> {
        let iter = self.temp();
        let source = self.emit_held(&stmt.right)?;
        if stmt.is_await {
            self.emit_instr(instr!(GetAsyncIterator, iter, source.reg));
        } else {
            self.emit_instr(instr!(GetIterator, iter, source.reg));
        }
        self.drop_held(source)?;

        let exit = self.label();
        let break_depth = self.try_records.len();
        let guard = self.open_guard(iter)?;
        let value = self.temp();
        let entrance = self.label();
        let exhausted = self.label();
        let id = self.writer.enter_loop();
        self.mark(entrance)?;
        self.emit_instr(instr!(LoopHeader, id));
        // `next()` itself is not guarded; `continue` arrives armed
        self.disarm(&guard);
        self.emit_instr(instr!(IteratorNext, value, iter));
        if stmt.is_await {
            self.emit_suspension(OpCode::Await, value, value)?;
            self.emit_instr(instr!(ResumeYield, value, value));
        }
        self.emit_instr(instr!(CheckIteratorResult, value));
        let done = self.temp();
        let done_name = self.name("done");
        self.emit_instr(instr!(LdField, done, value, done_name));
        self.emit_instr(instr!(BrTrue, exhausted, done));
        self.release(done)?;
        let value_name = self.name("value");
        self.emit_instr(instr!(LdField, value, value, value_name));

        self.arm(&guard);
        let head = self.tree.scope_for(stmt.id, ScopeKind::Block)?;
        self.enter_scope(head, None)?;
        self.assign_for_head(&stmt.left, value)?;
        let depth = self.try_records.len();
        self.jumps.push(control::JumpTarget {
            labels: std::mem::take(&mut self.pending_labels),
            break_label: exit,
            continue_label: Some(entrance),
            breakable: true,
            break_depth,
            continue_depth: depth,
        });
        self.emit_statement(&stmt.body)?;
        self.exit_scope()?;
        self.emit_instr(instr!(Br, entrance));

        self.mark(exhausted)?;
        self.writer.exit_loop(id);
        self.release(value)?;
        // the finally dispatch may still route a break to `exit`
        self.close_guard(guard)?;
        self.jumps.pop();
        self.mark(exit)?;
        self.release(iter)
    }
}
