//! Suspension points: yield, yield*, await.
//!
//! A suspended frame keeps its registers but not its region stack. Every
//! suspension leaves all open regions first and re-enters them, outermost
//! first, right after resuming, so a throw or return delivered on resume
//! finds the same handlers.

use super::*;

impl<'a, 'w, W: BytecodeWriter> FunctionEmitter<'a, 'w, W> {
    /// `op` is `Yield` or `Await`; `dst` receives the raw resume record.
    pub(super) fn emit_suspension(&mut self, op: OpCode, dst: Reg, src: Reg) -> Result<()> {
        for _ in 0..self.try_records.len() {
            self.emit_instr(instr!(Leave));
        }
        self.emit_instr(Instruction::new(op, vec![dst.into(), src.into()]));
        for index in 0..self.try_records.len() {
            let marker = match self.try_records[index] {
                TryScopeRecord::TryCatch { handler } => instr!(TryCatch, handler),
                TryScopeRecord::TryFinally {
                    handler, ctype, cval, ..
                } => instr!(TryFinally, handler, ctype, cval),
                TryScopeRecord::CatchBody => instr!(ResumeCatch),
                TryScopeRecord::FinallyBody { handler, ctype, cval } => {
                    instr!(ResumeFinally, handler, ctype, cval)
                }
            };
            self.emit_instr(marker);
        }
        trace!(op = %op.name(), regions = self.try_records.len(), "suspension point");
        Ok(())
    }

    /// The suspension every generator starts with, once its parameters are
    /// bound.
    pub(super) fn emit_initial_yield(&mut self) -> Result<()> {
        let record = self.temp();
        self.emit_instr(instr!(LdUndef, record));
        self.emit_suspension(OpCode::Yield, record, record)?;
        self.emit_instr(instr!(ResumeYield, record, record));
        self.release(record)
    }

    pub(super) fn emit_yield(&mut self, expr: &'a YieldExpression, dest: Dest) -> Result<Value> {
        let value = match &expr.argument {
            Some(argument) => self.emit_held(argument)?,
            None => {
                let reg = self.temp();
                self.emit_instr(instr!(LdUndef, reg));
                Held { reg, temp: true }
            }
        };
        self.drop_held(value)?;
        let dst = self.target_reg(dest);
        self.emit_suspension(OpCode::Yield, dst, value.reg)?;
        self.emit_instr(instr!(ResumeYield, dst, dst));
        self.deliver(dest, dst)
    }

    pub(super) fn emit_await(&mut self, argument: &'a Expression, dest: Dest) -> Result<Value> {
        let value = self.emit_held(argument)?;
        self.drop_held(value)?;
        let dst = self.target_reg(dest);
        self.emit_suspension(OpCode::Await, dst, value.reg)?;
        self.emit_instr(instr!(ResumeYield, dst, dst));
        self.deliver(dest, dst)
    }

    /// `yield*`: forwards every resume record to the inner iterator and
    /// yields its results untouched until it is done.
    pub(super) fn emit_yield_star(&mut self, expr: &'a YieldExpression, dest: Dest) -> Result<Value> {
        let iter = self.temp();
        let source = match &expr.argument {
            Some(argument) => self.emit_held(argument)?,
            None => self.hold(Value::Discarded),
        };
        if self.info.is_async {
            self.emit_instr(instr!(GetAsyncIterator, iter, source.reg));
        } else {
            self.emit_instr(instr!(GetIterator, iter, source.reg));
        }
        self.drop_held(source)?;
        let received = self.temp();
        self.emit_instr(instr!(LdUndef, received));
        let result = self.temp();

        let resume = self.label();
        let finished = self.label();
        self.mark(resume)?;
        self.emit_instr(instr!(IteratorResume, result, iter, received));
        if self.info.is_async {
            self.emit_suspension(OpCode::Await, result, result)?;
            self.emit_instr(instr!(ResumeYield, result, result));
        }
        self.emit_instr(instr!(CheckIteratorResult, result));
        let done = self.temp();
        let done_name = self.name("done");
        self.emit_instr(instr!(LdField, done, result, done_name));
        self.emit_instr(instr!(BrTrue, finished, done));
        self.release(done)?;
        self.emit_suspension(OpCode::Yield, received, result)?;
        self.emit_instr(instr!(Br, resume));

        self.mark(finished)?;
        let value_name = self.name("value");
        self.emit_instr(instr!(LdField, iter, result, value_name));
        self.release(result)?;
        self.release(received)?;
        self.place(dest, Value::Temp(iter))
    }
}
