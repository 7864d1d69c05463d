//! Node numbering.
//!
//! Trees arriving from JSON or built by hand carry default ids; numbering
//! gives every scope-bearing node a unique id in pre-order.

use super::*;

struct Numbering {
    next: u32,
}

impl Numbering {
    fn fresh(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }

    fn statements(&mut self, body: &mut [Statement]) {
        for stmt in body {
            self.statement(stmt);
        }
    }

    fn statement(&mut self, stmt: &mut Statement) {
        match &mut stmt.kind {
            StatementKind::VariableDeclaration(decl) => self.declaration(decl),
            StatementKind::FunctionDeclaration(func) => self.function(func),
            StatementKind::ClassDeclaration(class) => self.class(class),
            StatementKind::Expression(expr) | StatementKind::Throw(expr) => self.expression(expr),
            StatementKind::Block(block) => self.block(block),
            StatementKind::If(if_stmt) => {
                self.expression(&mut if_stmt.test);
                self.statement(&mut if_stmt.consequent);
                if let Some(alt) = &mut if_stmt.alternate {
                    self.statement(alt);
                }
            }
            StatementKind::Switch(switch) => {
                switch.id = self.fresh();
                self.expression(&mut switch.discriminant);
                for case in &mut switch.cases {
                    if let Some(test) = &mut case.test {
                        self.expression(test);
                    }
                    self.statements(&mut case.consequent);
                }
            }
            StatementKind::While(w) => {
                self.expression(&mut w.test);
                self.statement(&mut w.body);
            }
            StatementKind::DoWhile(d) => {
                self.statement(&mut d.body);
                self.expression(&mut d.test);
            }
            StatementKind::For(f) => {
                f.id = self.fresh();
                match &mut f.init {
                    Some(ForInit::Declaration(decl)) => self.declaration(decl),
                    Some(ForInit::Expression(expr)) => self.expression(expr),
                    None => {}
                }
                if let Some(test) = &mut f.test {
                    self.expression(test);
                }
                if let Some(update) = &mut f.update {
                    self.expression(update);
                }
                self.statement(&mut f.body);
            }
            StatementKind::ForIn(f) => {
                f.id = self.fresh();
                self.for_head(&mut f.left);
                self.expression(&mut f.right);
                self.statement(&mut f.body);
            }
            StatementKind::ForOf(f) => {
                f.id = self.fresh();
                self.for_head(&mut f.left);
                self.expression(&mut f.right);
                self.statement(&mut f.body);
            }
            StatementKind::Return(arg) => {
                if let Some(expr) = arg {
                    self.expression(expr);
                }
            }
            StatementKind::Try(t) => {
                self.block(&mut t.block);
                if let Some(handler) = &mut t.handler {
                    handler.id = self.fresh();
                    if let Some(param) = &mut handler.param {
                        self.pattern(param);
                    }
                    self.block(&mut handler.body);
                }
                if let Some(finalizer) = &mut t.finalizer {
                    self.block(finalizer);
                }
            }
            StatementKind::With(w) => {
                w.id = self.fresh();
                self.expression(&mut w.object);
                self.statement(&mut w.body);
            }
            StatementKind::Labeled(l) => self.statement(&mut l.body),
            StatementKind::Break(_)
            | StatementKind::Continue(_)
            | StatementKind::Debugger
            | StatementKind::Empty => {}
        }
    }

    fn block(&mut self, block: &mut BlockStatement) {
        block.id = self.fresh();
        self.statements(&mut block.body);
    }

    fn declaration(&mut self, decl: &mut VariableDeclaration) {
        for declarator in &mut decl.declarations {
            self.pattern(&mut declarator.target);
            if let Some(init) = &mut declarator.init {
                self.expression(init);
            }
        }
    }

    fn for_head(&mut self, head: &mut ForHead) {
        match head {
            ForHead::Declaration { target, .. } | ForHead::Target(target) => self.pattern(target),
        }
    }

    fn function(&mut self, func: &mut Function) {
        func.id = self.fresh();
        for param in &mut func.params {
            self.element(param);
        }
        if let Some(rest) = &mut func.rest {
            self.pattern(rest);
        }
        self.statements(&mut func.body);
    }

    fn class(&mut self, class: &mut Class) {
        class.id = self.fresh();
        class.fields_id = self.fresh();
        class.static_fields_id = self.fresh();
        if let Some(sup) = &mut class.super_class {
            self.expression(sup);
        }
        if let Some(ctor) = &mut class.constructor {
            self.function(ctor);
        }
        for member in &mut class.members {
            self.key(&mut member.key);
            match &mut member.value {
                ClassMemberValue::Method(f)
                | ClassMemberValue::Getter(f)
                | ClassMemberValue::Setter(f) => self.function(f),
                ClassMemberValue::Field(Some(init)) => self.expression(init),
                ClassMemberValue::Field(None) => {}
            }
        }
    }

    fn pattern(&mut self, pattern: &mut Pattern) {
        match pattern {
            Pattern::Identifier(_) => {}
            Pattern::Member(expr) => self.expression(expr),
            Pattern::Array(array) => {
                for element in array.elements.iter_mut().flatten() {
                    self.element(element);
                }
                if let Some(rest) = &mut array.rest {
                    self.pattern(rest);
                }
            }
            Pattern::Object(object) => {
                for prop in &mut object.properties {
                    self.key(&mut prop.key);
                    self.element(&mut prop.value);
                }
                if let Some(rest) = &mut object.rest {
                    self.pattern(rest);
                }
            }
        }
    }

    fn element(&mut self, element: &mut PatternElement) {
        self.pattern(&mut element.target);
        if let Some(default) = &mut element.default {
            self.expression(default);
        }
    }

    fn key(&mut self, key: &mut PropertyKey) {
        if let PropertyKey::Computed(expr) = key {
            self.expression(expr);
        }
    }

    fn arguments(&mut self, args: &mut [Argument]) {
        for arg in args {
            match arg {
                Argument::Expression(e) | Argument::Spread(e) => self.expression(e),
            }
        }
    }

    fn member_property(&mut self, property: &mut MemberProperty) {
        if let MemberProperty::Expression(expr) = property {
            self.expression(expr);
        }
    }

    fn expression(&mut self, expr: &mut Expression) {
        match expr {
            Expression::Literal(_)
            | Expression::Identifier(_)
            | Expression::This
            | Expression::NewTarget => {}
            Expression::Array(array) => {
                for element in array.elements.iter_mut().flatten() {
                    match element {
                        Argument::Expression(e) | Argument::Spread(e) => self.expression(e),
                    }
                }
            }
            Expression::Object(object) => {
                for prop in &mut object.properties {
                    match prop {
                        Property::Init { key, value } => {
                            self.key(key);
                            self.expression(value);
                        }
                        Property::Method { key, function } => {
                            self.key(key);
                            self.function(function);
                        }
                        Property::Spread(e) => self.expression(e),
                    }
                }
            }
            Expression::Function(func) => self.function(func),
            Expression::Class(class) => self.class(class),
            Expression::Binary(b) => {
                self.expression(&mut b.left);
                self.expression(&mut b.right);
            }
            Expression::Unary(u) => self.expression(&mut u.argument),
            Expression::Update(u) => self.expression(&mut u.argument),
            Expression::Assignment(a) => {
                self.pattern(&mut a.target);
                self.expression(&mut a.value);
            }
            Expression::Conditional(c) => {
                self.expression(&mut c.test);
                self.expression(&mut c.consequent);
                self.expression(&mut c.alternate);
            }
            Expression::Sequence(exprs) => {
                for e in exprs {
                    self.expression(e);
                }
            }
            Expression::Call(call) => {
                self.expression(&mut call.callee);
                self.arguments(&mut call.arguments);
            }
            Expression::SuperCall(args) => self.arguments(args),
            Expression::New(new) => {
                self.expression(&mut new.callee);
                self.arguments(&mut new.arguments);
            }
            Expression::Member(m) => {
                self.expression(&mut m.object);
                self.member_property(&mut m.property);
            }
            Expression::SuperMember(property) => self.member_property(property),
            Expression::Template(t) => {
                for e in &mut t.expressions {
                    self.expression(e);
                }
            }
            Expression::Yield(y) => {
                if let Some(arg) = &mut y.argument {
                    self.expression(arg);
                }
            }
            Expression::Await(arg) => self.expression(arg),
        }
    }
}

impl Program {
    /// Gives every scope-bearing node a unique id, in pre-order.
    ///
    /// Returns the number of ids handed out.
    pub fn assign_node_ids(&mut self) -> u32 {
        let mut numbering = Numbering { next: 0 };
        self.id = numbering.fresh();
        numbering.statements(&mut self.body);
        numbering.next
    }

    /// Decodes a JSON document and numbers it, ready for lowering.
    pub fn from_json(source: &str) -> crate::error::Result<Self> {
        let mut program: Program = serde_json::from_str(source)?;
        let ids = program.assign_node_ids();
        tracing::debug!(ids, statements = program.body.len(), "syntax tree loaded");
        Ok(program)
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::build::*;

    #[test]
    fn test_ids_are_unique_and_preorder() {
        let mut program = program(vec![
            block(vec![let_("x", num(1.0))]),
            function_decl("f", &[], vec![block(vec![])]),
        ]);
        let count = program.assign_node_ids();
        // program, outer block, function, inner block
        assert_eq!(count, 4);
        assert_eq!(program.id, NodeId(0));
        match (&program.body[0].kind, &program.body[1].kind) {
            (StatementKind::Block(b), StatementKind::FunctionDeclaration(f)) => {
                assert_eq!(b.id, NodeId(1));
                assert_eq!(f.id, NodeId(2));
            }
            other => panic!("unexpected statements: {:?}", other),
        }
    }

    #[test]
    fn test_class_gets_three_ids() {
        let mut program = program(vec![class_decl("C", None, vec![])]);
        assert_eq!(program.assign_node_ids(), 4);
    }
}
