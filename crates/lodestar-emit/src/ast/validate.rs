//! Structural checks for trees that did not come from a trusted parser.

use thiserror::Error;
use unicode_xid::UnicodeXID;

use super::*;

/// A malformed input tree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// An identifier that is not a valid binding name
    #[error("invalid identifier name '{0}'")]
    InvalidIdentifier(String),

    /// Template literal part counts disagree
    #[error("template literal has {quasis} string parts for {expressions} substitutions")]
    MalformedTemplate {
        /// Number of cooked strings
        quasis: usize,
        /// Number of substitutions
        expressions: usize,
    },

    /// A member expression used where only bindings are allowed
    #[error("member expression used as a declaration target")]
    MemberInDeclaration,

    /// A compound assignment whose target is a pattern
    #[error("compound assignment to a destructuring pattern")]
    CompoundPatternAssignment,

    /// A class constructor with the wrong function kind
    #[error("class constructor must have constructor kind, found {0:?}")]
    ConstructorKind(FunctionKind),

    /// BigInt digits that do not form an integer
    #[error("invalid BigInt literal '{0}n'")]
    InvalidBigInt(String),

    /// An assignment or update target that is not a name or property
    #[error("invalid assignment target")]
    InvalidAssignmentTarget,
}

/// Whether `name` is an IdentifierName (`$` and `_` included).
pub fn is_identifier_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '$' || c == '_' || UnicodeXID::is_xid_start(c) => {}
        _ => return false,
    }
    chars.all(|c| c == '$' || c == '\u{200c}' || c == '\u{200d}' || UnicodeXID::is_xid_continue(c))
}

type Result = std::result::Result<(), ValidationError>;

fn identifier(id: &Identifier) -> Result {
    if is_identifier_name(&id.name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidIdentifier(id.name.clone()))
    }
}

fn statements(body: &[Statement]) -> Result {
    body.iter().try_for_each(statement)
}

fn statement(stmt: &Statement) -> Result {
    match &stmt.kind {
        StatementKind::VariableDeclaration(decl) => declaration(decl),
        StatementKind::FunctionDeclaration(func) => function(func),
        StatementKind::ClassDeclaration(c) => class(c),
        StatementKind::Expression(e) | StatementKind::Throw(e) => expression(e),
        StatementKind::Block(b) => statements(&b.body),
        StatementKind::If(i) => {
            expression(&i.test)?;
            statement(&i.consequent)?;
            i.alternate.as_deref().map_or(Ok(()), statement)
        }
        StatementKind::Switch(s) => {
            expression(&s.discriminant)?;
            for case in &s.cases {
                case.test.as_ref().map_or(Ok(()), expression)?;
                statements(&case.consequent)?;
            }
            Ok(())
        }
        StatementKind::While(w) => {
            expression(&w.test)?;
            statement(&w.body)
        }
        StatementKind::DoWhile(d) => {
            statement(&d.body)?;
            expression(&d.test)
        }
        StatementKind::For(f) => {
            match &f.init {
                Some(ForInit::Declaration(d)) => declaration(d)?,
                Some(ForInit::Expression(e)) => expression(e)?,
                None => {}
            }
            f.test.as_ref().map_or(Ok(()), expression)?;
            f.update.as_ref().map_or(Ok(()), expression)?;
            statement(&f.body)
        }
        StatementKind::ForIn(f) => {
            for_head(&f.left)?;
            expression(&f.right)?;
            statement(&f.body)
        }
        StatementKind::ForOf(f) => {
            for_head(&f.left)?;
            expression(&f.right)?;
            statement(&f.body)
        }
        StatementKind::Return(e) => e.as_ref().map_or(Ok(()), expression),
        StatementKind::Try(t) => {
            statements(&t.block.body)?;
            if let Some(handler) = &t.handler {
                handler.param.as_ref().map_or(Ok(()), binding)?;
                statements(&handler.body.body)?;
            }
            t.finalizer.as_ref().map_or(Ok(()), |f| statements(&f.body))
        }
        StatementKind::With(w) => {
            expression(&w.object)?;
            statement(&w.body)
        }
        StatementKind::Labeled(l) => statement(&l.body),
        StatementKind::Break(_)
        | StatementKind::Continue(_)
        | StatementKind::Debugger
        | StatementKind::Empty => Ok(()),
    }
}

fn declaration(decl: &VariableDeclaration) -> Result {
    for d in &decl.declarations {
        binding(&d.target)?;
        d.init.as_ref().map_or(Ok(()), expression)?;
    }
    Ok(())
}

fn for_head(head: &ForHead) -> Result {
    match head {
        ForHead::Declaration { target, .. } => binding(target),
        ForHead::Target(target) => pattern(target),
    }
}

/// A declaration target: no member expressions anywhere.
fn binding(p: &Pattern) -> Result {
    match p {
        Pattern::Member(_) => Err(ValidationError::MemberInDeclaration),
        Pattern::Identifier(id) => identifier(id),
        Pattern::Array(a) => {
            for e in a.elements.iter().flatten() {
                binding(&e.target)?;
                e.default.as_ref().map_or(Ok(()), expression)?;
            }
            a.rest.as_deref().map_or(Ok(()), binding)
        }
        Pattern::Object(o) => {
            for prop in &o.properties {
                key(&prop.key)?;
                binding(&prop.value.target)?;
                prop.value.default.as_ref().map_or(Ok(()), expression)?;
            }
            o.rest.as_deref().map_or(Ok(()), binding)
        }
    }
}

fn pattern(p: &Pattern) -> Result {
    match p {
        Pattern::Identifier(id) => identifier(id),
        Pattern::Member(e) => {
            simple_target(e)?;
            expression(e)
        }
        Pattern::Array(a) => {
            for e in a.elements.iter().flatten() {
                pattern(&e.target)?;
                e.default.as_ref().map_or(Ok(()), expression)?;
            }
            a.rest.as_deref().map_or(Ok(()), pattern)
        }
        Pattern::Object(o) => {
            for prop in &o.properties {
                key(&prop.key)?;
                pattern(&prop.value.target)?;
                prop.value.default.as_ref().map_or(Ok(()), expression)?;
            }
            o.rest.as_deref().map_or(Ok(()), pattern)
        }
    }
}

fn simple_target(e: &Expression) -> Result {
    match e {
        Expression::Identifier(_) | Expression::Member(_) | Expression::SuperMember(_) => Ok(()),
        _ => Err(ValidationError::InvalidAssignmentTarget),
    }
}

fn key(k: &PropertyKey) -> Result {
    match k {
        PropertyKey::Computed(e) => expression(e),
        _ => Ok(()),
    }
}

fn function(f: &Function) -> Result {
    if let Some(name) = &f.name {
        identifier(name)?;
    }
    for p in &f.params {
        binding(&p.target)?;
        p.default.as_ref().map_or(Ok(()), expression)?;
    }
    f.rest.as_ref().map_or(Ok(()), binding)?;
    statements(&f.body)
}

fn class(c: &Class) -> Result {
    if let Some(name) = &c.name {
        identifier(name)?;
    }
    c.super_class.as_deref().map_or(Ok(()), expression)?;
    if let Some(ctor) = &c.constructor {
        let expected = if c.super_class.is_some() {
            FunctionKind::DerivedConstructor
        } else {
            FunctionKind::Constructor
        };
        if ctor.kind != expected {
            return Err(ValidationError::ConstructorKind(ctor.kind));
        }
        function(ctor)?;
    }
    for m in &c.members {
        key(&m.key)?;
        match &m.value {
            ClassMemberValue::Method(f) | ClassMemberValue::Getter(f) | ClassMemberValue::Setter(f) => {
                function(f)?
            }
            ClassMemberValue::Field(init) => init.as_ref().map_or(Ok(()), expression)?,
        }
    }
    Ok(())
}

fn arguments(args: &[Argument]) -> Result {
    args.iter().try_for_each(|a| match a {
        Argument::Expression(e) | Argument::Spread(e) => expression(e),
    })
}

fn expression(e: &Expression) -> Result {
    match e {
        Expression::Literal(Literal::BigInt(digits)) => match parse_bigint_literal(digits) {
            Some(_) => Ok(()),
            None => Err(ValidationError::InvalidBigInt(digits.clone())),
        },
        Expression::Literal(_) | Expression::This | Expression::NewTarget => Ok(()),
        Expression::Identifier(id) => identifier(id),
        Expression::Array(a) => a.elements.iter().flatten().try_for_each(|el| match el {
            Argument::Expression(e) | Argument::Spread(e) => expression(e),
        }),
        Expression::Object(o) => o.properties.iter().try_for_each(|p| match p {
            Property::Init { key: k, value } => {
                key(k)?;
                expression(value)
            }
            Property::Method { key: k, function: f } => {
                key(k)?;
                function(f)
            }
            Property::Spread(e) => expression(e),
        }),
        Expression::Function(f) => function(f),
        Expression::Class(c) => class(c),
        Expression::Binary(b) => {
            expression(&b.left)?;
            expression(&b.right)
        }
        Expression::Unary(u) => expression(&u.argument),
        Expression::Update(u) => {
            simple_target(&u.argument)?;
            expression(&u.argument)
        }
        Expression::Assignment(a) => {
            if a.operator != AssignmentOperator::Assign
                && matches!(a.target, Pattern::Array(_) | Pattern::Object(_))
            {
                return Err(ValidationError::CompoundPatternAssignment);
            }
            pattern(&a.target)?;
            expression(&a.value)
        }
        Expression::Conditional(c) => {
            expression(&c.test)?;
            expression(&c.consequent)?;
            expression(&c.alternate)
        }
        Expression::Sequence(list) => list.iter().try_for_each(expression),
        Expression::Call(c) => {
            expression(&c.callee)?;
            arguments(&c.arguments)
        }
        Expression::SuperCall(args) => arguments(args),
        Expression::New(n) => {
            expression(&n.callee)?;
            arguments(&n.arguments)
        }
        Expression::Member(m) => {
            expression(&m.object)?;
            match &m.property {
                MemberProperty::Identifier(_) => Ok(()),
                MemberProperty::Expression(e) => expression(e),
            }
        }
        Expression::SuperMember(p) => match p {
            MemberProperty::Identifier(_) => Ok(()),
            MemberProperty::Expression(e) => expression(e),
        },
        Expression::Template(t) => {
            if t.quasis.len() != t.expressions.len() + 1 {
                return Err(ValidationError::MalformedTemplate {
                    quasis: t.quasis.len(),
                    expressions: t.expressions.len(),
                });
            }
            t.expressions.iter().try_for_each(expression)
        }
        Expression::Yield(y) => y.argument.as_deref().map_or(Ok(()), expression),
        Expression::Await(a) => expression(a),
    }
}

impl Program {
    /// Checks identifier names and structural constraints the emitter assumes.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        statements(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use num_bigint::BigInt;

    #[test]
    fn test_identifier_names() {
        assert!(is_identifier_name("x"));
        assert!(is_identifier_name("$el"));
        assert!(is_identifier_name("_private1"));
        assert!(is_identifier_name("café"));
        assert!(!is_identifier_name("1x"));
        assert!(!is_identifier_name(""));
        assert!(!is_identifier_name("a b"));
    }

    #[test]
    fn test_rejects_bad_identifier() {
        let program = program(vec![expr_stmt(ident("not valid"))]);
        assert_eq!(
            program.validate(),
            Err(ValidationError::InvalidIdentifier("not valid".into()))
        );
    }

    #[test]
    fn test_rejects_member_in_declaration() {
        let program = program(vec![var_decl(
            VariableKind::Let,
            Pattern::Member(Box::new(member(ident("o"), "x"))),
            None,
        )]);
        assert_eq!(program.validate(), Err(ValidationError::MemberInDeclaration));
    }

    #[test]
    fn test_rejects_malformed_template() {
        let program = program(vec![expr_stmt(Expression::Template(TemplateLiteral {
            quasis: vec!["a".into()],
            expressions: vec![ident("x")],
        }))]);
        assert!(matches!(
            program.validate(),
            Err(ValidationError::MalformedTemplate { quasis: 1, expressions: 1 })
        ));
    }

    #[test]
    fn test_rejects_call_as_update_target() {
        let program = program(vec![expr_stmt(update(UpdateOperator::Increment, true, call(ident("f"), vec![])))]);
        assert_eq!(program.validate(), Err(ValidationError::InvalidAssignmentTarget));
    }

    #[test]
    fn test_bigint_literals() {
        assert_eq!(parse_bigint_literal("0x1f"), Some(BigInt::from(31)));
        assert_eq!(parse_bigint_literal("1_000"), Some(BigInt::from(1000)));
        assert_eq!(parse_bigint_literal("0b"), None);
        let program = program(vec![expr_stmt(Expression::Literal(Literal::BigInt("12a".into())))]);
        assert_eq!(program.validate(), Err(ValidationError::InvalidBigInt("12a".into())));
    }
}
