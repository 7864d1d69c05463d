//! Terse constructors for building trees in tests, benchmarks and tools.
//!
//! ```
//! use lodestar_emit::ast::build::*;
//!
//! // for (const v of it) { if (c) break; }
//! let program = program(vec![for_of(
//!     Some(VariableKind::Const),
//!     pat("v"),
//!     ident("it"),
//!     block(vec![if_(ident("c"), break_(None), None)]),
//! )]);
//! assert_eq!(program.body.len(), 1);
//! ```

pub use super::*;

/// A numbered program.
pub fn program(body: Vec<Statement>) -> Program {
    let mut program = Program {
        id: NodeId::default(),
        body,
        strict: false,
    };
    program.assign_node_ids();
    program
}

/// A numbered strict-mode program.
pub fn strict_program(body: Vec<Statement>) -> Program {
    let mut program = program(body);
    program.strict = true;
    program
}

// ============================================================================
// Statements
// ============================================================================

/// `expr;`
pub fn expr_stmt(expr: Expression) -> Statement {
    StatementKind::Expression(expr).into()
}

/// A single-declarator declaration.
pub fn var_decl(kind: VariableKind, target: Pattern, init: Option<Expression>) -> Statement {
    StatementKind::VariableDeclaration(VariableDeclaration {
        kind,
        declarations: vec![VariableDeclarator { target, init }],
    })
    .into()
}

/// `var name = init;`
pub fn var_(name: &str, init: Expression) -> Statement {
    var_decl(VariableKind::Var, pat(name), Some(init))
}

/// `let name = init;`
pub fn let_(name: &str, init: Expression) -> Statement {
    var_decl(VariableKind::Let, pat(name), Some(init))
}

/// `const name = init;`
pub fn const_(name: &str, init: Expression) -> Statement {
    var_decl(VariableKind::Const, pat(name), Some(init))
}

/// `{ ... }`
pub fn block(body: Vec<Statement>) -> Statement {
    StatementKind::Block(BlockStatement {
        id: NodeId::default(),
        body,
    })
    .into()
}

fn block_of(body: Vec<Statement>) -> BlockStatement {
    BlockStatement {
        id: NodeId::default(),
        body,
    }
}

/// `if (test) consequent else alternate`
pub fn if_(test: Expression, consequent: Statement, alternate: Option<Statement>) -> Statement {
    StatementKind::If(IfStatement {
        test,
        consequent: Box::new(consequent),
        alternate: alternate.map(Box::new),
    })
    .into()
}

/// `while (test) body`
pub fn while_(test: Expression, body: Statement) -> Statement {
    StatementKind::While(WhileStatement {
        test,
        body: Box::new(body),
    })
    .into()
}

/// `do body while (test)`
pub fn do_while(body: Statement, test: Expression) -> Statement {
    StatementKind::DoWhile(DoWhileStatement {
        body: Box::new(body),
        test,
    })
    .into()
}

/// `for (init; test; update) body`
pub fn for_(
    init: Option<ForInit>,
    test: Option<Expression>,
    update: Option<Expression>,
    body: Statement,
) -> Statement {
    StatementKind::For(ForStatement {
        id: NodeId::default(),
        init,
        test,
        update,
        body: Box::new(body),
    })
    .into()
}

/// `let name = init` as a for-loop initializer.
pub fn for_let(name: &str, init: Expression) -> Option<ForInit> {
    Some(ForInit::Declaration(VariableDeclaration {
        kind: VariableKind::Let,
        declarations: vec![VariableDeclarator {
            target: pat(name),
            init: Some(init),
        }],
    }))
}

fn head(kind: Option<VariableKind>, target: Pattern) -> ForHead {
    match kind {
        Some(kind) => ForHead::Declaration { kind, target },
        None => ForHead::Target(target),
    }
}

/// `for (kind target of right) body`
pub fn for_of(kind: Option<VariableKind>, target: Pattern, right: Expression, body: Statement) -> Statement {
    StatementKind::ForOf(ForOfStatement {
        id: NodeId::default(),
        left: head(kind, target),
        right,
        body: Box::new(body),
        is_await: false,
    })
    .into()
}

/// `for await (kind target of right) body`
pub fn for_await(kind: Option<VariableKind>, target: Pattern, right: Expression, body: Statement) -> Statement {
    let mut stmt = for_of(kind, target, right, body);
    if let StatementKind::ForOf(f) = &mut stmt.kind {
        f.is_await = true;
    }
    stmt
}

/// `for (kind target in right) body`
pub fn for_in(kind: Option<VariableKind>, target: Pattern, right: Expression, body: Statement) -> Statement {
    StatementKind::ForIn(ForInStatement {
        id: NodeId::default(),
        left: head(kind, target),
        right,
        body: Box::new(body),
    })
    .into()
}

/// `switch (discriminant) { cases }`
pub fn switch_(discriminant: Expression, cases: Vec<SwitchCase>) -> Statement {
    StatementKind::Switch(SwitchStatement {
        id: NodeId::default(),
        discriminant,
        cases,
    })
    .into()
}

/// `case test: consequent`
pub fn case(test: Expression, consequent: Vec<Statement>) -> SwitchCase {
    SwitchCase {
        test: Some(test),
        consequent,
    }
}

/// `default: consequent`
pub fn default_case(consequent: Vec<Statement>) -> SwitchCase {
    SwitchCase {
        test: None,
        consequent,
    }
}

/// `return arg;`
pub fn return_(arg: Option<Expression>) -> Statement {
    StatementKind::Return(arg).into()
}

/// `break label;`
pub fn break_(label: Option<&str>) -> Statement {
    StatementKind::Break(label.map(str::to_string)).into()
}

/// `continue label;`
pub fn continue_(label: Option<&str>) -> Statement {
    StatementKind::Continue(label.map(str::to_string)).into()
}

/// `throw arg;`
pub fn throw_(arg: Expression) -> Statement {
    StatementKind::Throw(arg).into()
}

/// `try { block } catch (param) { handler } finally { finalizer }`
pub fn try_(
    block: Vec<Statement>,
    handler: Option<(Option<Pattern>, Vec<Statement>)>,
    finalizer: Option<Vec<Statement>>,
) -> Statement {
    StatementKind::Try(TryStatement {
        block: block_of(block),
        handler: handler.map(|(param, body)| CatchClause {
            id: NodeId::default(),
            param,
            body: block_of(body),
        }),
        finalizer: finalizer.map(block_of),
    })
    .into()
}

/// `with (object) body`
pub fn with_(object: Expression, body: Statement) -> Statement {
    StatementKind::With(WithStatement {
        id: NodeId::default(),
        object,
        body: Box::new(body),
    })
    .into()
}

/// `label: body`
pub fn labeled(label: &str, body: Statement) -> Statement {
    StatementKind::Labeled(LabeledStatement {
        label: label.to_string(),
        body: Box::new(body),
    })
    .into()
}

/// `debugger;`
pub fn debugger() -> Statement {
    StatementKind::Debugger.into()
}

/// `function name(params) { body }`
pub fn function_decl(name: &str, params: &[&str], body: Vec<Statement>) -> Statement {
    StatementKind::FunctionDeclaration(func(Some(name), params, body)).into()
}

/// `function* name(params) { body }`
pub fn generator_decl(name: &str, params: &[&str], body: Vec<Statement>) -> Statement {
    let mut f = func(Some(name), params, body);
    f.is_generator = true;
    StatementKind::FunctionDeclaration(f).into()
}

/// `async function name(params) { body }`
pub fn async_decl(name: &str, params: &[&str], body: Vec<Statement>) -> Statement {
    let mut f = func(Some(name), params, body);
    f.is_async = true;
    StatementKind::FunctionDeclaration(f).into()
}

/// `class name extends super_class { members }`
pub fn class_decl(name: &str, super_class: Option<Expression>, members: Vec<ClassMember>) -> Statement {
    StatementKind::ClassDeclaration(class(Some(name), super_class, None, members)).into()
}

// ============================================================================
// Functions and classes
// ============================================================================

/// A normal function with simple parameters.
pub fn func(name: Option<&str>, params: &[&str], body: Vec<Statement>) -> Function {
    Function {
        name: name.map(Identifier::new),
        params: params.iter().map(|p| elem(pat(p))).collect(),
        body,
        ..Function::default()
    }
}

/// A function of the given kind.
pub fn func_of(kind: FunctionKind, params: &[&str], body: Vec<Statement>) -> Function {
    Function {
        kind,
        ..func(None, params, body)
    }
}

/// A class node.
pub fn class(
    name: Option<&str>,
    super_class: Option<Expression>,
    constructor: Option<Function>,
    members: Vec<ClassMember>,
) -> Class {
    Class {
        name: name.map(Identifier::new),
        super_class: super_class.map(Box::new),
        constructor: constructor.map(Box::new),
        members,
        ..Class::default()
    }
}

/// A method named `name`.
pub fn method(name: &str, is_static: bool, params: &[&str], body: Vec<Statement>) -> ClassMember {
    ClassMember {
        key: PropertyKey::Identifier(Identifier::new(name)),
        is_static,
        value: ClassMemberValue::Method(func_of(FunctionKind::Method, params, body)),
    }
}

/// A field with an optional initializer.
pub fn field(key: PropertyKey, is_static: bool, init: Option<Expression>) -> ClassMember {
    ClassMember {
        key,
        is_static,
        value: ClassMemberValue::Field(init),
    }
}

// ============================================================================
// Patterns
// ============================================================================

/// A name pattern.
pub fn pat(name: &str) -> Pattern {
    Pattern::Identifier(Identifier::new(name))
}

/// A pattern element without default.
pub fn elem(target: Pattern) -> PatternElement {
    PatternElement { target, default: None }
}

/// A pattern element with a default.
pub fn elem_default(target: Pattern, default: Expression) -> PatternElement {
    PatternElement {
        target,
        default: Some(default),
    }
}

/// `[elements, ...rest]`
pub fn array_pat(elements: Vec<Option<PatternElement>>, rest: Option<Pattern>) -> Pattern {
    Pattern::Array(ArrayPattern {
        elements,
        rest: rest.map(Box::new),
    })
}

/// `{key: target, ...rest}`
pub fn object_pat(properties: Vec<(&str, PatternElement)>, rest: Option<Pattern>) -> Pattern {
    Pattern::Object(ObjectPattern {
        properties: properties
            .into_iter()
            .map(|(key, value)| PatternProperty {
                key: PropertyKey::Identifier(Identifier::new(key)),
                value,
            })
            .collect(),
        rest: rest.map(Box::new),
    })
}

// ============================================================================
// Expressions
// ============================================================================

/// Number literal.
pub fn num(n: f64) -> Expression {
    Expression::Literal(Literal::Number(n))
}

/// String literal.
pub fn string(s: &str) -> Expression {
    Expression::Literal(Literal::String(s.to_string()))
}

/// Boolean literal.
pub fn boolean(b: bool) -> Expression {
    Expression::Literal(Literal::Boolean(b))
}

/// `undefined`
pub fn undefined() -> Expression {
    Expression::Literal(Literal::Undefined)
}

/// Identifier reference.
pub fn ident(name: &str) -> Expression {
    Expression::Identifier(Identifier::new(name))
}

/// `this`
pub fn this() -> Expression {
    Expression::This
}

/// `callee(args)`
pub fn call(callee: Expression, args: Vec<Expression>) -> Expression {
    Expression::Call(CallExpression {
        callee: Box::new(callee),
        arguments: args.into_iter().map(Argument::Expression).collect(),
    })
}

/// `object.name(args)`
pub fn method_call(object: Expression, name: &str, args: Vec<Expression>) -> Expression {
    call(member(object, name), args)
}

/// `new callee(args)`
pub fn new_(callee: Expression, args: Vec<Expression>) -> Expression {
    Expression::New(NewExpression {
        callee: Box::new(callee),
        arguments: args.into_iter().map(Argument::Expression).collect(),
    })
}

/// `object.name`
pub fn member(object: Expression, name: &str) -> Expression {
    Expression::Member(MemberExpression {
        object: Box::new(object),
        property: MemberProperty::Identifier(Identifier::new(name)),
    })
}

/// `object[key]`
pub fn index(object: Expression, key: Expression) -> Expression {
    Expression::Member(MemberExpression {
        object: Box::new(object),
        property: MemberProperty::Expression(Box::new(key)),
    })
}

/// `target op= value`
pub fn assign_op(operator: AssignmentOperator, target: Pattern, value: Expression) -> Expression {
    Expression::Assignment(AssignmentExpression {
        operator,
        target,
        value: Box::new(value),
    })
}

/// `target = value`
pub fn assign(target: Pattern, value: Expression) -> Expression {
    assign_op(AssignmentOperator::Assign, target, value)
}

/// `name = value`
pub fn assign_name(name: &str, value: Expression) -> Expression {
    assign(pat(name), value)
}

/// `left op right`
pub fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
    Expression::Binary(BinaryExpression {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    })
}

/// `left && right`
pub fn and(left: Expression, right: Expression) -> Expression {
    binary(BinaryOperator::LogicalAnd, left, right)
}

/// `left || right`
pub fn or(left: Expression, right: Expression) -> Expression {
    binary(BinaryOperator::LogicalOr, left, right)
}

/// `op argument`
pub fn unary(operator: UnaryOperator, argument: Expression) -> Expression {
    Expression::Unary(UnaryExpression {
        operator,
        argument: Box::new(argument),
    })
}

/// `!argument`
pub fn not(argument: Expression) -> Expression {
    unary(UnaryOperator::LogicalNot, argument)
}

/// `++argument` / `argument++`
pub fn update(operator: UpdateOperator, prefix: bool, argument: Expression) -> Expression {
    Expression::Update(UpdateExpression {
        operator,
        prefix,
        argument: Box::new(argument),
    })
}

/// `test ? consequent : alternate`
pub fn conditional(test: Expression, consequent: Expression, alternate: Expression) -> Expression {
    Expression::Conditional(ConditionalExpression {
        test: Box::new(test),
        consequent: Box::new(consequent),
        alternate: Box::new(alternate),
    })
}

/// `function (params) { body }`
pub fn function_expr(params: &[&str], body: Vec<Statement>) -> Expression {
    Expression::Function(Box::new(func(None, params, body)))
}

/// `(params) => { body }`
pub fn arrow(params: &[&str], body: Vec<Statement>) -> Expression {
    Expression::Function(Box::new(func_of(FunctionKind::Arrow, params, body)))
}

/// `yield argument`
pub fn yield_(argument: Option<Expression>) -> Expression {
    Expression::Yield(YieldExpression {
        argument: argument.map(Box::new),
        delegate: false,
    })
}

/// `yield* argument`
pub fn yield_star(argument: Expression) -> Expression {
    Expression::Yield(YieldExpression {
        argument: Some(Box::new(argument)),
        delegate: true,
    })
}

/// `await argument`
pub fn await_(argument: Expression) -> Expression {
    Expression::Await(Box::new(argument))
}

/// `[elements]`
pub fn array(elements: Vec<Expression>) -> Expression {
    Expression::Array(ArrayExpression {
        elements: elements.into_iter().map(|e| Some(Argument::Expression(e))).collect(),
    })
}

/// `{key: value, ...}`
pub fn object(properties: Vec<(&str, Expression)>) -> Expression {
    Expression::Object(ObjectExpression {
        properties: properties
            .into_iter()
            .map(|(key, value)| Property::Init {
                key: PropertyKey::Identifier(Identifier::new(key)),
                value,
            })
            .collect(),
    })
}

/// `...argument`
pub fn spread(argument: Expression) -> Argument {
    Argument::Spread(argument)
}
