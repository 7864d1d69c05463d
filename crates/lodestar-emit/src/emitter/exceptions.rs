//! try/catch/finally and completion records.
//!
//! A finally region owns a completion-type register and a completion-value
//! register. Every way into the finally body sets both: falling off the end
//! of the protected code stores `NORMAL`, a throw stores `THROW` and the
//! exception, a `return` stores `RETURN` and the value, and each distinct
//! break/continue target gets its own code from `FIRST_JUMP` up. The
//! dispatch after the body replays whichever completion arrived.

use super::*;
use crate::bytecode::completion;
use control::PendingJump;
use scope_access::StoreMode;

/// An open exception region, innermost last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TryScopeRecord {
    /// Code protected by a catch handler
    TryCatch { handler: Label },
    /// Code protected by a finally body; `context` indexes the finally stack
    TryFinally {
        handler: Label,
        ctype: Reg,
        cval: Reg,
        context: usize,
    },
    /// Inside a catch handler
    CatchBody,
    /// Inside a finally body
    FinallyBody { handler: Label, ctype: Reg, cval: Reg },
}

/// Completions routed through one finally body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FinallyContext {
    /// Jumps in completion-code order, starting at `FIRST_JUMP`
    pub jumps: Vec<PendingJump>,
    /// Some `return` reached the finally body
    pub has_return: bool,
}

/// An opened finally region awaiting its body.
#[derive(Debug, Clone, Copy)]
pub(super) struct FinallyRegion {
    handler: Label,
    ctype: Reg,
    cval: Reg,
}

impl<'a, 'w, W: BytecodeWriter> FunctionEmitter<'a, 'w, W> {
    fn completion_code(&mut self, reg: Reg, code: u32) {
        let code = self.number(code);
        self.emit_instr(instr!(LdConst, reg, code));
    }

    /// Opens a finally region around the code that follows.
    pub(super) fn open_finally(&mut self) -> FinallyRegion {
        let ctype = self.temp();
        let cval = self.temp();
        let handler = self.label();
        self.emit_instr(instr!(TryFinally, handler, ctype, cval));
        let context = self.finally_stack.len();
        self.finally_stack.push(FinallyContext::default());
        self.try_records.push(TryScopeRecord::TryFinally {
            handler,
            ctype,
            cval,
            context,
        });
        FinallyRegion { handler, ctype, cval }
    }

    /// Closes the protected code, emits the finally body and dispatches on
    /// the completion that reached it.
    pub(super) fn close_finally(
        &mut self,
        region: FinallyRegion,
        body: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        let FinallyRegion { handler, ctype, cval } = region;
        self.try_records.pop();
        self.emit_instr(instr!(Leave));
        self.completion_code(ctype, completion::NORMAL);
        self.mark(handler)?;
        self.emit_instr(instr!(Finally, ctype, cval));
        self.try_records.push(TryScopeRecord::FinallyBody { handler, ctype, cval });
        body(self)?;
        self.try_records.pop();
        self.emit_instr(instr!(Leave));

        let context = self.finally_stack.pop().unwrap_or_default();
        let after = self.label();
        self.emit_instr(instr!(BrCompletion, after, ctype, completion::NORMAL));
        // a resumed generator can be asked to return from any suspension
        let returns = (context.has_return || self.info.is_generator).then(|| self.label());
        if let Some(label) = returns {
            self.emit_instr(instr!(BrCompletion, label, ctype, completion::RETURN));
        }
        let mut jumps = Vec::with_capacity(context.jumps.len());
        for (index, jump) in context.jumps.iter().enumerate() {
            let label = self.label();
            self.emit_instr(instr!(BrCompletion, label, ctype, completion::FIRST_JUMP + index as u32));
            jumps.push((label, *jump));
        }
        self.emit_instr(instr!(Throw, cval));
        if let Some(label) = returns {
            self.mark(label)?;
            self.emit_return(cval)?;
        }
        for (label, jump) in jumps {
            self.mark(label)?;
            self.emit_jump(jump)?;
        }
        self.mark(after)?;
        self.release(cval)?;
        self.release(ctype)
    }

    /// Returns `value`, running every enclosing finally body first.
    pub(super) fn emit_return(&mut self, value: Reg) -> Result<()> {
        for index in (0..self.try_records.len()).rev() {
            match self.try_records[index] {
                TryScopeRecord::TryFinally {
                    handler,
                    ctype,
                    cval,
                    context,
                } => {
                    self.completion_code(ctype, completion::RETURN);
                    if cval != value {
                        self.emit_instr(instr!(Mov, cval, value));
                    }
                    self.emit_instr(instr!(Leave));
                    self.emit_instr(instr!(Br, handler));
                    if let Some(context) = self.finally_stack.get_mut(context) {
                        context.has_return = true;
                    }
                    return Ok(());
                }
                _ => self.emit_instr(instr!(Leave)),
            }
        }
        self.emit_instr(instr!(Ret, value));
        Ok(())
    }

    /// Leaves the regions above `depth`. When a finally region is in the
    /// way, parks `jump` there under its own completion code and returns
    /// false; the finally dispatch finishes the jump.
    pub(super) fn leave_regions(&mut self, depth: usize, jump: PendingJump) -> bool {
        for index in (depth..self.try_records.len()).rev() {
            match self.try_records[index] {
                TryScopeRecord::TryFinally {
                    handler,
                    ctype,
                    context,
                    ..
                } => {
                    let Some(pending) = self.finally_stack.get_mut(context) else {
                        continue;
                    };
                    let slot = match pending.jumps.iter().position(|j| *j == jump) {
                        Some(slot) => slot,
                        None => {
                            pending.jumps.push(jump);
                            pending.jumps.len() - 1
                        }
                    };
                    self.completion_code(ctype, completion::FIRST_JUMP + slot as u32);
                    self.emit_instr(instr!(Leave));
                    self.emit_instr(instr!(Br, handler));
                    return false;
                }
                _ => self.emit_instr(instr!(Leave)),
            }
        }
        true
    }

    // ========================================================================
    // Statements
    // ========================================================================

    pub(super) fn emit_try(&mut self, stmt: &'a TryStatement) -> Result<()> {
        let finally = stmt.finalizer.as_ref().map(|_| self.open_finally());

        match &stmt.handler {
            Some(handler) => {
                let catch = self.label();
                let end = self.label();
                self.emit_instr(instr!(TryCatch, catch));
                self.try_records.push(TryScopeRecord::TryCatch { handler: catch });
                self.emit_block(&stmt.block)?;
                self.try_records.pop();
                self.emit_instr(instr!(Leave));
                self.emit_instr(instr!(Br, end));

                self.mark(catch)?;
                let exception = self.temp();
                self.emit_instr(instr!(Catch, exception));
                self.try_records.push(TryScopeRecord::CatchBody);
                self.emit_catch_clause(handler, exception)?;
                self.try_records.pop();
                self.emit_instr(instr!(Leave));
                self.release(exception)?;
                self.mark(end)?;
            }
            None => self.emit_block(&stmt.block)?,
        }

        match (finally, &stmt.finalizer) {
            (Some(region), Some(finalizer)) => self.close_finally(region, |this| this.emit_block(finalizer)),
            _ => Ok(()),
        }
    }

    fn emit_catch_clause(&mut self, clause: &'a CatchClause, exception: Reg) -> Result<()> {
        let scope = self.tree.scope_for(clause.id, ScopeKind::Catch)?;
        self.enter_scope(scope, None)?;
        if let Some(param) = &clause.param {
            self.assign_pattern(param, exception, StoreMode::Init)?;
        }
        self.emit_block(&clause.body)?;
        self.exit_scope()
    }
}
