//! Syntax tree handed to the emitter.
//!
//! These structures are ESTree-shaped and read-only to the emitter. Nodes that
//! open a scope (programs, functions, blocks, loop heads, catch clauses, `with`,
//! `switch`, classes) carry a [`NodeId`]; the binder keys its side tables by
//! those ids, so a tree must be numbered with [`Program::assign_node_ids`]
//! before it is lowered.

use lodestar_macros::index_newtype;
use num_bigint::BigInt;
use num_traits::Num;
use serde::{Deserialize, Serialize};

pub mod build;
mod ids;
mod validate;

pub use validate::{ValidationError, is_identifier_name};

index_newtype! {
    /// Identity of a scope-bearing node, unique within a program.
    #[derive(Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct NodeId;
}

/// Byte range of a statement in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    /// Start offset
    pub start: u32,
    /// End offset (exclusive)
    pub end: u32,
}

impl Span {
    /// Creates a span.
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

/// A complete program.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    /// Scope identity of the global scope
    #[serde(default)]
    pub id: NodeId,
    /// The statements in the program
    pub body: Vec<Statement>,
    /// Whether the program starts with a "use strict" directive
    #[serde(default)]
    pub strict: bool,
}

/// An identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    /// The name of the identifier
    pub name: String,
}

impl Identifier {
    /// Creates an identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A statement with its source span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    /// What kind of statement this is
    pub kind: StatementKind,
    /// Where it came from
    #[serde(default)]
    pub span: Span,
}

impl From<StatementKind> for Statement {
    fn from(kind: StatementKind) -> Self {
        Self {
            kind,
            span: Span::default(),
        }
    }
}

/// Statement kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatementKind {
    /// Variable declaration (var, let, const)
    VariableDeclaration(VariableDeclaration),
    /// Function declaration
    FunctionDeclaration(Function),
    /// Class declaration
    ClassDeclaration(Class),
    /// Expression statement
    Expression(Expression),
    /// Block statement { ... }
    Block(BlockStatement),
    /// If statement
    If(IfStatement),
    /// Switch statement
    Switch(SwitchStatement),
    /// While statement
    While(WhileStatement),
    /// Do-while statement
    DoWhile(DoWhileStatement),
    /// For statement
    For(ForStatement),
    /// For-in statement
    ForIn(ForInStatement),
    /// For-of statement (including `for await`)
    ForOf(ForOfStatement),
    /// Return statement
    Return(Option<Expression>),
    /// Break statement with optional label
    Break(Option<String>),
    /// Continue statement with optional label
    Continue(Option<String>),
    /// Throw statement
    Throw(Expression),
    /// Try statement
    Try(TryStatement),
    /// With statement (sloppy mode only)
    With(WithStatement),
    /// Labeled statement
    Labeled(LabeledStatement),
    /// Debugger statement
    Debugger,
    /// Empty statement (;)
    Empty,
}

/// Variable declaration kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableKind {
    /// var declaration
    Var,
    /// let declaration
    Let,
    /// const declaration
    Const,
}

impl VariableKind {
    /// Whether the declaration binds in the enclosing block.
    pub fn is_lexical(self) -> bool {
        !matches!(self, VariableKind::Var)
    }
}

/// A variable declaration statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDeclaration {
    /// The kind of declaration
    pub kind: VariableKind,
    /// The declarators
    pub declarations: Vec<VariableDeclarator>,
}

/// A single variable declarator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDeclarator {
    /// The binding target
    pub target: Pattern,
    /// Optional initializer expression
    pub init: Option<Expression>,
}

/// A block statement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockStatement {
    /// Scope identity
    #[serde(default)]
    pub id: NodeId,
    /// The statements in the block
    pub body: Vec<Statement>,
}

/// An if statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStatement {
    /// The condition
    pub test: Expression,
    /// The then branch
    pub consequent: Box<Statement>,
    /// The optional else branch
    pub alternate: Option<Box<Statement>>,
}

/// A while statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhileStatement {
    /// The condition
    pub test: Expression,
    /// The loop body
    pub body: Box<Statement>,
}

/// A do-while statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoWhileStatement {
    /// The loop body
    pub body: Box<Statement>,
    /// The condition
    pub test: Expression,
}

/// A C-style for statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForStatement {
    /// Scope identity of the loop head
    #[serde(default)]
    pub id: NodeId,
    /// Initializer
    pub init: Option<ForInit>,
    /// Condition
    pub test: Option<Expression>,
    /// Update expression
    pub update: Option<Expression>,
    /// The loop body
    pub body: Box<Statement>,
}

/// For loop initializer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ForInit {
    /// Variable declaration
    Declaration(VariableDeclaration),
    /// Expression
    Expression(Expression),
}

/// Left-hand side of a for-in/for-of head.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ForHead {
    /// `for (let x of ...)`
    Declaration {
        /// Declaration kind
        kind: VariableKind,
        /// Bound pattern
        target: Pattern,
    },
    /// `for (x.y of ...)`
    Target(Pattern),
}

/// A for-in statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForInStatement {
    /// Scope identity of the loop head
    #[serde(default)]
    pub id: NodeId,
    /// The iteration binding
    pub left: ForHead,
    /// The enumerated object
    pub right: Expression,
    /// The loop body
    pub body: Box<Statement>,
}

/// A for-of statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForOfStatement {
    /// Scope identity of the loop head
    #[serde(default)]
    pub id: NodeId,
    /// The iteration binding
    pub left: ForHead,
    /// The iterated value
    pub right: Expression,
    /// The loop body
    pub body: Box<Statement>,
    /// `for await (...)`
    #[serde(default)]
    pub is_await: bool,
}

/// A switch statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchStatement {
    /// Scope identity of the case block
    #[serde(default)]
    pub id: NodeId,
    /// The discriminant
    pub discriminant: Expression,
    /// The cases
    pub cases: Vec<SwitchCase>,
}

/// A switch case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    /// The test expression (None for default)
    pub test: Option<Expression>,
    /// The consequent statements
    pub consequent: Vec<Statement>,
}

/// A try statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TryStatement {
    /// The try block
    pub block: BlockStatement,
    /// The catch clause
    pub handler: Option<CatchClause>,
    /// The finally block
    pub finalizer: Option<BlockStatement>,
}

/// A catch clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchClause {
    /// Scope identity of the parameter scope
    #[serde(default)]
    pub id: NodeId,
    /// The catch parameter (optional catch binding when None)
    pub param: Option<Pattern>,
    /// The catch body
    pub body: BlockStatement,
}

/// A with statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithStatement {
    /// Scope identity of the object scope
    #[serde(default)]
    pub id: NodeId,
    /// The object
    pub object: Expression,
    /// The body
    pub body: Box<Statement>,
}

/// A labeled statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledStatement {
    /// The label
    pub label: String,
    /// The body
    pub body: Box<Statement>,
}

// ============================================================================
// Functions and classes
// ============================================================================

/// What sort of callable a function node produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FunctionKind {
    /// `function` declaration or expression
    #[default]
    Normal,
    /// Arrow function
    Arrow,
    /// Object or class method
    Method,
    /// Accessor getter
    Getter,
    /// Accessor setter
    Setter,
    /// Constructor of a base class
    Constructor,
    /// Constructor of a class with `extends`
    DerivedConstructor,
}

impl FunctionKind {
    /// Whether the function receives its own `this`.
    pub fn has_own_this(self) -> bool {
        !matches!(self, FunctionKind::Arrow)
    }

    /// Whether `super.x` is available through a home object.
    pub fn has_home_object(self) -> bool {
        matches!(
            self,
            FunctionKind::Method
                | FunctionKind::Getter
                | FunctionKind::Setter
                | FunctionKind::Constructor
                | FunctionKind::DerivedConstructor
        )
    }
}

/// A function of any kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Function {
    /// Scope identity of the parameter and body scopes
    #[serde(default)]
    pub id: NodeId,
    /// Function name (declarations and named expressions)
    pub name: Option<Identifier>,
    /// Parameters with optional defaults
    pub params: Vec<PatternElement>,
    /// Rest parameter
    #[serde(default)]
    pub rest: Option<Pattern>,
    /// Body statements (arrow expression bodies become a single return)
    pub body: Vec<Statement>,
    /// Kind of callable
    #[serde(default)]
    pub kind: FunctionKind,
    /// Whether async
    #[serde(default)]
    pub is_async: bool,
    /// Whether generator
    #[serde(default)]
    pub is_generator: bool,
    /// Whether the body has a "use strict" directive
    #[serde(default)]
    pub strict: bool,
    /// Source span
    #[serde(default)]
    pub span: Span,
}

/// A class declaration or expression.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Class {
    /// Scope identity of the class scope
    #[serde(default)]
    pub id: NodeId,
    /// Identity of the synthesized instance field initializer
    #[serde(default)]
    pub fields_id: NodeId,
    /// Identity of the synthesized static field initializer
    #[serde(default)]
    pub static_fields_id: NodeId,
    /// Class name
    pub name: Option<Identifier>,
    /// `extends` clause
    pub super_class: Option<Box<Expression>>,
    /// Explicit constructor
    pub constructor: Option<Box<Function>>,
    /// Methods, accessors and fields in source order
    pub members: Vec<ClassMember>,
    /// Source span
    #[serde(default)]
    pub span: Span,
}

impl Class {
    /// Instance fields in source order.
    pub fn instance_fields(&self) -> impl Iterator<Item = &ClassMember> {
        self.members
            .iter()
            .filter(|m| !m.is_static && matches!(m.value, ClassMemberValue::Field(_)))
    }

    /// Static fields in source order.
    pub fn static_fields(&self) -> impl Iterator<Item = &ClassMember> {
        self.members
            .iter()
            .filter(|m| m.is_static && matches!(m.value, ClassMemberValue::Field(_)))
    }
}

/// A class element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMember {
    /// The member key
    pub key: PropertyKey,
    /// Whether declared `static`
    #[serde(default)]
    pub is_static: bool,
    /// The member payload
    pub value: ClassMemberValue,
}

/// Class element payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClassMemberValue {
    /// Method
    Method(Function),
    /// Getter
    Getter(Function),
    /// Setter
    Setter(Function),
    /// Field with optional initializer
    Field(Option<Expression>),
}

// ============================================================================
// Patterns
// ============================================================================

/// A binding or assignment target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    /// Plain name
    Identifier(Identifier),
    /// Member expression (assignment targets only)
    Member(Box<Expression>),
    /// `[a, b = 1, ...rest]`
    Array(ArrayPattern),
    /// `{a, b: c, ...rest}`
    Object(ObjectPattern),
}

/// An array destructuring pattern.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArrayPattern {
    /// Elements (None represents an elision)
    pub elements: Vec<Option<PatternElement>>,
    /// Rest element
    pub rest: Option<Box<Pattern>>,
}

/// An object destructuring pattern.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectPattern {
    /// Properties in source order
    pub properties: Vec<PatternProperty>,
    /// Rest element
    pub rest: Option<Box<Pattern>>,
}

/// A pattern slot with optional default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternElement {
    /// The target
    pub target: Pattern,
    /// Default applied when the extracted value is undefined
    pub default: Option<Expression>,
}

/// A property of an object pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternProperty {
    /// The property key
    pub key: PropertyKey,
    /// The target and default
    pub value: PatternElement,
}

// ============================================================================
// Expressions
// ============================================================================

/// An expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// Literal value
    Literal(Literal),
    /// Identifier reference
    Identifier(Identifier),
    /// this keyword
    This,
    /// new.target
    NewTarget,
    /// Array literal
    Array(ArrayExpression),
    /// Object literal
    Object(ObjectExpression),
    /// Function or arrow expression
    Function(Box<Function>),
    /// Class expression
    Class(Box<Class>),
    /// Binary expression (including the short-circuit operators)
    Binary(BinaryExpression),
    /// Unary expression
    Unary(UnaryExpression),
    /// Update expression (++/--)
    Update(UpdateExpression),
    /// Assignment expression
    Assignment(AssignmentExpression),
    /// Conditional (ternary) expression
    Conditional(ConditionalExpression),
    /// Sequence expression (comma operator)
    Sequence(Vec<Expression>),
    /// Call expression
    Call(CallExpression),
    /// `super(...)`
    SuperCall(Vec<Argument>),
    /// new expression
    New(NewExpression),
    /// Member access expression
    Member(MemberExpression),
    /// `super.x` / `super[x]`
    SuperMember(MemberProperty),
    /// Template literal
    Template(TemplateLiteral),
    /// yield / yield*
    Yield(YieldExpression),
    /// await
    Await(Box<Expression>),
}

/// A literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),
    /// null literal
    Null,
    /// undefined literal
    Undefined,
    /// BigInt literal (digits without the `n` suffix)
    BigInt(String),
    /// Regular expression literal
    RegExp {
        /// Pattern source
        pattern: String,
        /// Flags
        flags: String,
    },
}

/// A call argument or array element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Argument {
    /// Plain value
    Expression(Expression),
    /// `...iterable`
    Spread(Expression),
}

impl Argument {
    /// Whether this is a spread element.
    pub fn is_spread(&self) -> bool {
        matches!(self, Argument::Spread(_))
    }
}

/// An array expression.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArrayExpression {
    /// The elements (None represents a hole)
    pub elements: Vec<Option<Argument>>,
}

/// An object expression.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectExpression {
    /// The properties
    pub properties: Vec<Property>,
}

/// An object literal property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Property {
    /// `key: value` (shorthand `a` is `a: a`)
    Init {
        /// The property key
        key: PropertyKey,
        /// The property value
        value: Expression,
    },
    /// Method or accessor
    Method {
        /// The property key
        key: PropertyKey,
        /// The function (kind Method, Getter or Setter)
        function: Function,
    },
    /// `...source`
    Spread(Expression),
}

/// A property key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyKey {
    /// Identifier key
    Identifier(Identifier),
    /// Computed key
    Computed(Box<Expression>),
    /// Literal key (e.g., numeric or string)
    Literal(Literal),
}

impl PropertyKey {
    /// The key as a property name when it is known statically.
    pub fn static_name(&self) -> Option<String> {
        match self {
            PropertyKey::Identifier(id) => Some(id.name.clone()),
            PropertyKey::Literal(Literal::String(s)) => Some(s.clone()),
            PropertyKey::Literal(Literal::Number(n)) => Some(number_to_key(*n)),
            PropertyKey::Literal(Literal::BigInt(digits)) => Some(digits.clone()),
            PropertyKey::Literal(Literal::Boolean(b)) => Some(b.to_string()),
            PropertyKey::Literal(Literal::Null) => Some("null".to_string()),
            PropertyKey::Literal(Literal::Undefined) => Some("undefined".to_string()),
            PropertyKey::Literal(Literal::RegExp { .. }) | PropertyKey::Computed(_) => None,
        }
    }
}

/// Canonical property name of a numeric key.
pub fn number_to_key(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Parses BigInt literal digits (decimal, or `0x`/`0o`/`0b` prefixed;
/// `_` separators allowed).
pub fn parse_bigint_literal(digits: &str) -> Option<BigInt> {
    let cleaned: String = digits.chars().filter(|&c| c != '_').collect();
    let (radix, body) = match cleaned.get(..2) {
        Some("0x" | "0X") => (16, &cleaned[2..]),
        Some("0o" | "0O") => (8, &cleaned[2..]),
        Some("0b" | "0B") => (2, &cleaned[2..]),
        _ => (10, cleaned.as_str()),
    };
    if body.is_empty() || body.starts_with(['+', '-']) {
        return None;
    }
    BigInt::from_str_radix(body, radix).ok()
}

/// A binary expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryExpression {
    /// The operator
    pub operator: BinaryOperator,
    /// The left operand
    pub left: Box<Expression>,
    /// The right operand
    pub right: Box<Expression>,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    // Arithmetic
    /// +
    Add,
    /// -
    Subtract,
    /// *
    Multiply,
    /// /
    Divide,
    /// %
    Modulo,
    /// **
    Exponent,
    // Comparison
    /// ==
    Equal,
    /// !=
    NotEqual,
    /// ===
    StrictEqual,
    /// !==
    StrictNotEqual,
    /// <
    LessThan,
    /// <=
    LessThanEqual,
    /// >
    GreaterThan,
    /// >=
    GreaterThanEqual,
    // Logical
    /// &&
    LogicalAnd,
    /// ||
    LogicalOr,
    /// ??
    NullishCoalescing,
    // Bitwise
    /// &
    BitwiseAnd,
    /// |
    BitwiseOr,
    /// ^
    BitwiseXor,
    /// <<
    LeftShift,
    /// >>
    RightShift,
    /// >>>
    UnsignedRightShift,
    // Other
    /// in
    In,
    /// instanceof
    InstanceOf,
}

impl BinaryOperator {
    /// Whether the right operand is evaluated conditionally.
    pub fn is_short_circuit(self) -> bool {
        matches!(
            self,
            BinaryOperator::LogicalAnd | BinaryOperator::LogicalOr | BinaryOperator::NullishCoalescing
        )
    }
}

/// A unary expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryExpression {
    /// The operator
    pub operator: UnaryOperator,
    /// The operand
    pub argument: Box<Expression>,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    /// -
    Minus,
    /// +
    Plus,
    /// !
    LogicalNot,
    /// ~
    BitwiseNot,
    /// typeof
    Typeof,
    /// void
    Void,
    /// delete
    Delete,
}

/// An update expression (++/--).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateExpression {
    /// The operator
    pub operator: UpdateOperator,
    /// The operand
    pub argument: Box<Expression>,
    /// Whether prefix (++x) or postfix (x++)
    pub prefix: bool,
}

/// Update operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateOperator {
    /// ++
    Increment,
    /// --
    Decrement,
}

/// An assignment expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentExpression {
    /// The operator
    pub operator: AssignmentOperator,
    /// The target (patterns only with plain `=`)
    pub target: Pattern,
    /// The right-hand side
    pub value: Box<Expression>,
}

/// Assignment operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum AssignmentOperator {
    Assign,
    AddAssign,
    SubtractAssign,
    MultiplyAssign,
    DivideAssign,
    ModuloAssign,
    ExponentAssign,
    LeftShiftAssign,
    RightShiftAssign,
    UnsignedRightShiftAssign,
    BitwiseAndAssign,
    BitwiseOrAssign,
    BitwiseXorAssign,
    LogicalAndAssign,
    LogicalOrAssign,
    NullishCoalescingAssign,
}

impl AssignmentOperator {
    /// The binary operator a compound assignment applies.
    pub fn binary_operator(self) -> Option<BinaryOperator> {
        use AssignmentOperator::*;
        Some(match self {
            Assign => return None,
            AddAssign => BinaryOperator::Add,
            SubtractAssign => BinaryOperator::Subtract,
            MultiplyAssign => BinaryOperator::Multiply,
            DivideAssign => BinaryOperator::Divide,
            ModuloAssign => BinaryOperator::Modulo,
            ExponentAssign => BinaryOperator::Exponent,
            LeftShiftAssign => BinaryOperator::LeftShift,
            RightShiftAssign => BinaryOperator::RightShift,
            UnsignedRightShiftAssign => BinaryOperator::UnsignedRightShift,
            BitwiseAndAssign => BinaryOperator::BitwiseAnd,
            BitwiseOrAssign => BinaryOperator::BitwiseOr,
            BitwiseXorAssign => BinaryOperator::BitwiseXor,
            LogicalAndAssign => BinaryOperator::LogicalAnd,
            LogicalOrAssign => BinaryOperator::LogicalOr,
            NullishCoalescingAssign => BinaryOperator::NullishCoalescing,
        })
    }
}

/// A conditional (ternary) expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalExpression {
    /// The condition
    pub test: Box<Expression>,
    /// The consequent (if true)
    pub consequent: Box<Expression>,
    /// The alternate (if false)
    pub alternate: Box<Expression>,
}

/// A function call expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpression {
    /// The function being called
    pub callee: Box<Expression>,
    /// The arguments
    pub arguments: Vec<Argument>,
}

impl CallExpression {
    /// Whether this is a direct `eval(...)` call.
    pub fn is_direct_eval(&self) -> bool {
        matches!(&*self.callee, Expression::Identifier(id) if id.name == "eval")
    }
}

/// A new expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpression {
    /// The constructor
    pub callee: Box<Expression>,
    /// The arguments
    pub arguments: Vec<Argument>,
}

/// A member access expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberExpression {
    /// The object
    pub object: Box<Expression>,
    /// The property
    pub property: MemberProperty,
}

/// Member property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MemberProperty {
    /// Identifier property
    Identifier(Identifier),
    /// Computed property expression
    Expression(Box<Expression>),
}

/// A template literal without a tag.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TemplateLiteral {
    /// Cooked string parts; always one longer than `expressions`
    pub quasis: Vec<String>,
    /// Substitutions
    pub expressions: Vec<Expression>,
}

/// A yield expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldExpression {
    /// The yielded value
    pub argument: Option<Box<Expression>>,
    /// `yield*`
    #[serde(default)]
    pub delegate: bool,
}
