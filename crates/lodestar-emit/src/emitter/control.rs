//! Loops, labels, break and continue.

use super::*;
use scope_access::StoreMode;

/// Something `break` or `continue` can leave through.
#[derive(Debug, Clone)]
pub(crate) struct JumpTarget {
    /// Statement labels naming this target
    pub labels: Vec<String>,
    pub break_label: Label,
    /// Only loops can be continued
    pub continue_label: Option<Label>,
    /// An unlabeled `break` stops here (loops and switch)
    pub breakable: bool,
    /// Open regions outside the statement
    pub break_depth: usize,
    /// Open regions around the loop body
    pub continue_depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JumpKind {
    Break,
    Continue,
}

/// A jump waiting for the finally bodies in its way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingJump {
    /// Index into the jump-target stack
    pub target: usize,
    pub kind: JumpKind,
}

fn is_loop(stmt: &Statement) -> bool {
    matches!(
        stmt.kind,
        StatementKind::While(_)
            | StatementKind::DoWhile(_)
            | StatementKind::For(_)
            | StatementKind::ForIn(_)
            | StatementKind::ForOf(_)
    )
}

impl<'a, 'w, W: BytecodeWriter> FunctionEmitter<'a, 'w, W> {
    /// Pushes the target of a loop, claiming any labels just seen.
    pub(super) fn push_loop_target(&mut self, break_label: Label, continue_label: Label) {
        let depth = self.try_records.len();
        self.jumps.push(JumpTarget {
            labels: std::mem::take(&mut self.pending_labels),
            break_label,
            continue_label: Some(continue_label),
            breakable: true,
            break_depth: depth,
            continue_depth: depth,
        });
    }

    /// Finds the innermost target of a `break`/`continue`.
    fn find_target(&self, label: Option<&str>, kind: JumpKind) -> Result<usize> {
        self.jumps
            .iter()
            .rposition(|target| {
                let continuable = kind == JumpKind::Break || target.continue_label.is_some();
                match label {
                    Some(label) => continuable && target.labels.iter().any(|l| l == label),
                    None if kind == JumpKind::Break => target.breakable,
                    None => continuable,
                }
            })
            .ok_or_else(|| {
                EmitError::MissingJumpTarget(label.map_or_else(
                    || match kind {
                        JumpKind::Break => "break".to_string(),
                        JumpKind::Continue => "continue".to_string(),
                    },
                    str::to_string,
                ))
            })
    }

    /// Jumps to a target, leaving every region on the way.
    pub(super) fn emit_jump(&mut self, jump: PendingJump) -> Result<()> {
        let target = &self.jumps[jump.target];
        let (label, depth) = match jump.kind {
            JumpKind::Break => (target.break_label, target.break_depth),
            JumpKind::Continue => (
                target
                    .continue_label
                    .ok_or_else(|| EmitError::MissingJumpTarget("continue".to_string()))?,
                target.continue_depth,
            ),
        };
        if self.leave_regions(depth, jump) {
            self.emit_instr(instr!(Br, label));
        }
        Ok(())
    }

    pub(super) fn emit_break(&mut self, label: Option<&str>) -> Result<()> {
        let target = self.find_target(label, JumpKind::Break)?;
        self.emit_jump(PendingJump {
            target,
            kind: JumpKind::Break,
        })
    }

    pub(super) fn emit_continue(&mut self, label: Option<&str>) -> Result<()> {
        let target = self.find_target(label, JumpKind::Continue)?;
        self.emit_jump(PendingJump {
            target,
            kind: JumpKind::Continue,
        })
    }

    pub(super) fn emit_labeled(&mut self, stmt: &'a LabeledStatement) -> Result<()> {
        self.pending_labels.push(stmt.label.clone());
        if is_loop(&stmt.body) || matches!(stmt.body.kind, StatementKind::Labeled(_)) {
            return self.emit_statement(&stmt.body);
        }
        let end = self.label();
        let depth = self.try_records.len();
        self.jumps.push(JumpTarget {
            labels: std::mem::take(&mut self.pending_labels),
            break_label: end,
            continue_label: None,
            breakable: false,
            break_depth: depth,
            continue_depth: depth,
        });
        self.emit_statement(&stmt.body)?;
        self.jumps.pop();
        self.mark(end)
    }

    // ========================================================================
    // Loops
    // ========================================================================

    /// Marks a loop entrance.
    fn begin_loop(&mut self, entrance: Label) -> Result<u32> {
        let id = self.writer.enter_loop();
        self.mark(entrance)?;
        self.emit_instr(instr!(LoopHeader, id));
        Ok(id)
    }

    pub(super) fn emit_while(&mut self, stmt: &'a WhileStatement) -> Result<()> {
        let entrance = self.label();
        let body = self.label();
        let exit = self.label();
        let id = self.begin_loop(entrance)?;
        self.emit_condition(&stmt.test, body, exit, conditions::Fallthrough::True)?;
        self.mark(body)?;
        self.push_loop_target(exit, entrance);
        self.emit_statement(&stmt.body)?;
        self.jumps.pop();
        self.emit_instr(instr!(Br, entrance));
        self.mark(exit)?;
        self.writer.exit_loop(id);
        Ok(())
    }

    pub(super) fn emit_do_while(&mut self, stmt: &'a DoWhileStatement) -> Result<()> {
        let entrance = self.label();
        let test = self.label();
        let exit = self.label();
        let id = self.begin_loop(entrance)?;
        self.push_loop_target(exit, test);
        self.emit_statement(&stmt.body)?;
        self.jumps.pop();
        self.mark(test)?;
        self.emit_condition(&stmt.test, entrance, exit, conditions::Fallthrough::False)?;
        self.mark(exit)?;
        self.writer.exit_loop(id);
        Ok(())
    }

    pub(super) fn emit_for(&mut self, stmt: &'a ForStatement) -> Result<()> {
        let tree = self.tree;
        let scope_id = tree.scope_for(stmt.id, ScopeKind::Block)?;
        self.enter_scope(scope_id, None)?;
        match &stmt.init {
            Some(ForInit::Declaration(decl)) => self.emit_variable_declaration(decl)?,
            Some(ForInit::Expression(expr)) => {
                self.emit_expression(expr, Dest::Discard)?;
            }
            None => {}
        }

        // captured per-iteration bindings get a fresh copy for every pass
        let scope = tree.scope(scope_id);
        let copy = match (scope.per_iteration, scope.representation, scope.register) {
            (true, Representation::Slots, Some(reg)) => Some(reg),
            _ => None,
        };
        if let Some(reg) = copy {
            self.emit_instr(instr!(CloneScopeSlots, reg, reg));
        }

        let entrance = self.label();
        let body = self.label();
        let update = self.label();
        let exit = self.label();
        let id = self.begin_loop(entrance)?;
        if let Some(test) = &stmt.test {
            self.emit_condition(test, body, exit, conditions::Fallthrough::True)?;
        }
        self.mark(body)?;
        self.push_loop_target(exit, update);
        self.emit_statement(&stmt.body)?;
        self.jumps.pop();
        self.mark(update)?;
        if let Some(reg) = copy {
            self.emit_instr(instr!(CloneScopeSlots, reg, reg));
        }
        if let Some(expr) = &stmt.update {
            self.emit_expression(expr, Dest::Discard)?;
        }
        self.emit_instr(instr!(Br, entrance));
        self.mark(exit)?;
        self.writer.exit_loop(id);
        self.exit_scope()
    }

    /// Binds the iteration value of a for-in/for-of head.
    pub(super) fn assign_for_head(&mut self, head: &'a ForHead, value: Reg) -> Result<()> {
        match head {
            ForHead::Declaration { kind, target } if kind.is_lexical() => {
                self.assign_pattern(target, value, StoreMode::Init)
            }
            ForHead::Declaration { target, .. } | ForHead::Target(target) => {
                self.assign_pattern(target, value, StoreMode::Assign)
            }
        }
    }

    pub(super) fn emit_for_in(&mut self, stmt: &'a ForInStatement) -> Result<()> {
        let enumerator = self.temp();
        let object = self.emit_held(&stmt.right)?;
        self.emit_instr(instr!(ForInInit, enumerator, object.reg));
        self.drop_held(object)?;
        let key = self.temp();

        let entrance = self.label();
        let exit = self.label();
        let id = self.begin_loop(entrance)?;
        self.emit_instr(instr!(ForInNext, key, enumerator, exit));
        let head = self.tree.scope_for(stmt.id, ScopeKind::Block)?;
        self.enter_scope(head, None)?;
        self.assign_for_head(&stmt.left, key)?;
        self.push_loop_target(exit, entrance);
        self.emit_statement(&stmt.body)?;
        self.jumps.pop();
        self.exit_scope()?;
        self.emit_instr(instr!(Br, entrance));
        self.mark(exit)?;
        self.writer.exit_loop(id);
        self.release(key)?;
        self.release(enumerator)
    }
}
