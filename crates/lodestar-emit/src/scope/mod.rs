//! Scopes, symbols and name resolution.
//!
//! The binder builds one [`ScopeTree`] for a whole program before anything is
//! emitted; the emitter only reads it. Scopes and symbols live in flat arenas
//! and refer to each other by index.

use lodestar_macros::index_newtype;
use rustc_hash::FxHashMap;

use crate::ast::NodeId;
use crate::bytecode::{DebugScopeKind, Reg};
use crate::error::{EmitError, Result};

index_newtype! {
    /// Index of a scope in the tree's arena.
    pub struct ScopeId;
}

index_newtype! {
    /// Index of a symbol in the tree's arena.
    pub struct SymbolId;
}

index_newtype! {
    /// Index of a function in the tree's arena. The program is function 0.
    pub struct FunctionId;
}

/// What introduced a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// The program's top level
    Global,
    /// Top-level statements of a function body
    FunctionBody,
    /// Parameters and implicit bindings of a function
    Parameters,
    /// Block, loop head or switch case block
    Block,
    /// Catch parameter
    Catch,
    /// `with` object
    With,
    /// Class heritage, inner name and hidden field keys
    Class,
}

impl ScopeKind {
    /// The scope kind reported in debugger records.
    pub fn debug_kind(self) -> DebugScopeKind {
        match self {
            ScopeKind::Global => DebugScopeKind::Global,
            ScopeKind::FunctionBody | ScopeKind::Parameters => DebugScopeKind::Function,
            ScopeKind::Block => DebugScopeKind::Block,
            ScopeKind::Catch => DebugScopeKind::Catch,
            ScopeKind::With => DebugScopeKind::With,
            ScopeKind::Class => DebugScopeKind::Class,
        }
    }
}

/// How a scope's bindings exist at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Representation {
    /// Each binding is a frame register; no scope object exists
    #[default]
    Registers,
    /// A slot array, reachable from closures
    Slots,
    /// A property bag (global object, `with` object, sloppy-eval scope)
    Object,
}

/// Where a symbol's value is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Storage {
    /// Not yet placed
    #[default]
    Unallocated,
    /// A permanent frame register
    Register(Reg),
    /// Slot `n` of the owning scope's slot array
    Slot(u32),
    /// A named property of the owning scope's object
    Property,
}

/// Ordinary names versus bindings the language creates implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolRole {
    /// A declared name
    Normal,
    /// `this`
    This,
    /// `new.target`
    NewTarget,
    /// Home object used by `super.x`
    HomeObject,
    /// The `arguments` object
    Arguments,
    /// A named function expression's own name
    FunctionName,
    /// Evaluated key of a computed class field
    FieldKey,
}

/// Binding names of the implicit symbols. None of them is a valid identifier
/// reference except `arguments`.
pub mod implicit {
    /// `this`
    pub const THIS: &str = "this";
    /// `new.target`
    pub const NEW_TARGET: &str = "new.target";
    /// Home object
    pub const HOME_OBJECT: &str = "%home";
    /// `arguments`
    pub const ARGUMENTS: &str = "arguments";

    /// Hidden binding holding the evaluated key of computed class member `index`.
    pub fn field_key(index: usize) -> String {
        format!("%key{}", index)
    }
}

/// A name binding.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    /// Binding name
    pub name: String,
    /// Owning scope
    pub scope: ScopeId,
    /// Ordinary or implicit
    pub role: SymbolRole,
    /// Placement, fixed when the binder finishes
    pub storage: Storage,
    /// Lives in the global object or global lexical environment
    pub is_global: bool,
    /// Declared with `let`, `const` or `class`
    pub is_block_scoped: bool,
    /// Assignment raises a TypeError
    pub is_const: bool,
    /// Bound by a catch clause
    pub is_catch_param: bool,
    /// Reads before initialization must fail
    pub needs_declaration: bool,
    /// Referenced from a function other than the owner's
    pub captured: bool,
    /// Initialized by a hoisted function declaration
    pub is_function_decl: bool,
    /// A formal parameter
    pub is_param: bool,
}

impl Symbol {
    pub(crate) fn new(name: impl Into<String>, scope: ScopeId, role: SymbolRole) -> Self {
        Self {
            name: name.into(),
            scope,
            role,
            storage: Storage::Unallocated,
            is_global: false,
            is_block_scoped: false,
            is_const: false,
            is_catch_param: false,
            needs_declaration: false,
            captured: false,
            is_function_decl: false,
            is_param: false,
        }
    }
}

/// A nested binding environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    /// What introduced the scope
    pub kind: ScopeKind,
    /// The introducing node
    pub node: NodeId,
    /// Enclosing scope
    pub parent: Option<ScopeId>,
    /// Function the scope belongs to
    pub function: FunctionId,
    /// Symbols in layout order
    pub symbols: Vec<SymbolId>,
    pub(crate) names: FxHashMap<String, SymbolId>,
    /// Run-time representation, fixed when the binder finishes
    pub representation: Representation,
    /// Referenced from another function, so it needs a run-time object
    pub must_instantiate: bool,
    /// Every binding must be reachable by name (eval, debugger)
    pub captures_all: bool,
    /// Bindings may appear at run time (`with`, sloppy direct eval)
    pub dynamic: bool,
    /// A `for (let ...)` head whose bindings are copied per iteration
    pub per_iteration: bool,
    /// The case block of a `switch`
    pub is_switch: bool,
    /// Register holding the scope object inside its own function
    pub register: Option<Reg>,
}

impl Scope {
    pub(crate) fn new(kind: ScopeKind, node: NodeId, parent: Option<ScopeId>, function: FunctionId) -> Self {
        Self {
            kind,
            node,
            parent,
            function,
            symbols: Vec::new(),
            names: FxHashMap::default(),
            representation: Representation::Registers,
            must_instantiate: false,
            captures_all: false,
            dynamic: kind == ScopeKind::With,
            per_iteration: false,
            is_switch: false,
            register: None,
        }
    }

    /// Looks up a name declared directly in this scope.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.names.get(name).copied()
    }

    /// Whether a run-time scope object exists in the environment chain.
    pub fn is_instantiated(&self) -> bool {
        self.kind != ScopeKind::Global && self.representation != Representation::Registers
    }
}

/// What sort of code a function is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionFlavor {
    /// The program itself
    Global,
    /// `function`
    Normal,
    /// Arrow function
    Arrow,
    /// Method
    Method,
    /// Getter
    Getter,
    /// Setter
    Setter,
    /// Base class constructor
    Constructor,
    /// Derived class constructor
    DerivedConstructor,
    /// Synthesized class field initializer
    FieldInitializer,
}

impl FunctionFlavor {
    /// Whether the function binds its own `this`, `new.target` and `arguments`.
    pub fn has_own_this(self) -> bool {
        !matches!(self, FunctionFlavor::Arrow | FunctionFlavor::Global)
    }
}

/// Binding facts about one function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionInfo {
    /// Defining node
    pub node: NodeId,
    /// Name, when it has one
    pub name: Option<String>,
    /// Kind of code
    pub flavor: FunctionFlavor,
    /// `async`
    pub is_async: bool,
    /// Generator
    pub is_generator: bool,
    /// Strict mode code
    pub strict: bool,
    /// Enclosing function
    pub parent: Option<FunctionId>,
    /// Scope in the enclosing function where the closure is created
    pub definition_scope: Option<ScopeId>,
    /// Parameter scope (the global scope for the program)
    pub params_scope: ScopeId,
    /// Body scope (the global scope for the program)
    pub body_scope: ScopeId,
    /// Number of formal parameters before any rest parameter
    pub param_count: u32,
    /// Contains a direct `eval(...)` call
    pub calls_eval: bool,
    /// Contains or creates nested functions
    pub creates_closures: bool,
    /// Reads bindings or probes scopes owned by enclosing functions
    pub uses_outer_scopes: bool,
    /// Register loaded with the closure environment on entry
    pub env_register: Option<Reg>,
    /// Registers below this number are permanent
    pub permanent_registers: u32,
}

impl FunctionInfo {
    /// Whether bindings may be created at run time in the body scope.
    pub fn has_dynamic_body(&self, tree: &ScopeTree) -> bool {
        tree.scope(self.body_scope).dynamic
    }
}

/// Where a name resolves and which dynamic scopes must be checked first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The static binding; `None` means the global object
    pub symbol: Option<SymbolId>,
    /// Scope owning the binding
    pub owner: Option<ScopeId>,
    /// Dynamic scopes between use site and owner, innermost first
    pub probes: Vec<ScopeId>,
}

/// Slot layout of an instantiated scope, for run-time eval and debuggers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeInfo {
    /// Scope
    pub scope: ScopeId,
    /// Debugger kind
    pub kind: DebugScopeKind,
    /// Register holding the scope object
    pub register: Option<Reg>,
    /// Bindings may appear at run time
    pub dynamic: bool,
    /// Slot-array bindings by name
    pub slots: Vec<(String, u32)>,
}

/// All scopes, symbols and functions of a program.
#[derive(Debug, Clone, Default)]
pub struct ScopeTree {
    pub(crate) scopes: Vec<Scope>,
    pub(crate) symbols: Vec<Symbol>,
    pub(crate) functions: Vec<FunctionInfo>,
    pub(crate) scope_index: FxHashMap<(NodeId, ScopeKind), ScopeId>,
    pub(crate) function_index: FxHashMap<NodeId, FunctionId>,
}

impl ScopeTree {
    /// The program's function.
    pub const ROOT: FunctionId = FunctionId(0);

    /// Scope by id.
    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    /// Symbol by id.
    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    /// Function by id.
    pub fn function(&self, id: FunctionId) -> &FunctionInfo {
        &self.functions[id.index()]
    }

    /// Number of functions, the program included.
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Number of scopes.
    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    /// The scope of `kind` introduced by `node`.
    pub fn scope_for(&self, node: NodeId, kind: ScopeKind) -> Result<ScopeId> {
        self.scope_index
            .get(&(node, kind))
            .copied()
            .ok_or(EmitError::UnboundNode(node))
    }

    /// The function introduced by `node`.
    pub fn function_for(&self, node: NodeId) -> Result<FunctionId> {
        self.function_index.get(&node).copied().ok_or(EmitError::UnboundNode(node))
    }

    /// Resolves `name` as seen from `from`.
    pub fn resolve(&self, name: &str, from: ScopeId) -> Resolution {
        let mut probes = Vec::new();
        let mut current = Some(from);
        while let Some(id) = current {
            let scope = self.scope(id);
            if let Some(symbol) = scope.lookup(name) {
                return Resolution {
                    symbol: Some(symbol),
                    owner: Some(id),
                    probes,
                };
            }
            if scope.dynamic {
                probes.push(id);
            }
            current = scope.parent;
        }
        Resolution {
            symbol: None,
            owner: None,
            probes,
        }
    }

    /// Instantiated scopes from `from` outward, excluding the global scope.
    pub fn env_chain(&self, from: ScopeId) -> Vec<ScopeId> {
        let mut chain = Vec::new();
        let mut current = Some(from);
        while let Some(id) = current {
            let scope = self.scope(id);
            if scope.is_instantiated() {
                chain.push(id);
            }
            current = scope.parent;
        }
        chain
    }

    /// Environment hops from the closure environment of `function` to `target`.
    pub fn hops(&self, function: FunctionId, target: ScopeId) -> Option<u32> {
        let from = self.function(function).definition_scope?;
        self.env_chain(from)
            .iter()
            .position(|&id| id == target)
            .map(|p| p as u32)
    }

    /// Scopes belonging to `function`, in creation order.
    pub fn scopes_of(&self, function: FunctionId) -> impl Iterator<Item = ScopeId> + '_ {
        self.scopes
            .iter()
            .enumerate()
            .filter(move |(_, s)| s.function == function)
            .map(|(i, _)| ScopeId::new(i))
    }

    /// Slot layouts of the instantiated scopes of `function`.
    pub fn scope_info(&self, function: FunctionId) -> Vec<ScopeInfo> {
        self.scopes_of(function)
            .filter(|&id| self.scope(id).is_instantiated())
            .map(|id| {
                let scope = self.scope(id);
                let slots = scope
                    .symbols
                    .iter()
                    .filter_map(|&s| match self.symbol(s).storage {
                        Storage::Slot(n) => Some((self.symbol(s).name.clone(), n)),
                        _ => None,
                    })
                    .collect();
                ScopeInfo {
                    scope: id,
                    kind: scope.kind.debug_kind(),
                    register: scope.register,
                    dynamic: scope.dynamic,
                    slots,
                }
            })
            .collect()
    }

    /// An implicit binding (`this`, `new.target`, home object) visible from
    /// `function`, if the binder declared one.
    pub fn implicit_symbol(&self, function: FunctionId, name: &str) -> Option<SymbolId> {
        let owner = self.this_function(function)?;
        self.scope(self.function(owner).params_scope).lookup(name)
    }

    /// Whether `inner` is `outer` or nested inside it.
    pub fn is_within(&self, inner: FunctionId, outer: FunctionId) -> bool {
        let mut current = Some(inner);
        while let Some(id) = current {
            if id == outer {
                return true;
            }
            current = self.function(id).parent;
        }
        false
    }

    /// Innermost function scope that binds its own `this`, searching outward.
    pub fn this_function(&self, from: FunctionId) -> Option<FunctionId> {
        let mut current = Some(from);
        while let Some(id) = current {
            let info = self.function(id);
            if info.flavor.has_own_this() {
                return Some(id);
            }
            current = info.parent;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with_chain() -> (ScopeTree, ScopeId, ScopeId, ScopeId) {
        let mut tree = ScopeTree::default();
        let global = ScopeId::new(0);
        tree.scopes.push(Scope::new(ScopeKind::Global, NodeId(0), None, ScopeTree::ROOT));
        let with = ScopeId::new(1);
        tree.scopes.push(Scope::new(ScopeKind::With, NodeId(1), Some(global), ScopeTree::ROOT));
        let block = ScopeId::new(2);
        tree.scopes.push(Scope::new(ScopeKind::Block, NodeId(2), Some(with), ScopeTree::ROOT));
        (tree, global, with, block)
    }

    #[test]
    fn test_resolve_records_dynamic_probes() {
        let (mut tree, global, with, block) = tree_with_chain();
        let x = SymbolId::new(0);
        tree.symbols.push(Symbol::new("x", global, SymbolRole::Normal));
        tree.scopes[global.index()].symbols.push(x);
        tree.scopes[global.index()].names.insert("x".into(), x);

        let resolution = tree.resolve("x", block);
        assert_eq!(resolution.symbol, Some(x));
        assert_eq!(resolution.owner, Some(global));
        assert_eq!(resolution.probes, vec![with]);

        let missing = tree.resolve("y", block);
        assert_eq!(missing.symbol, None);
        assert_eq!(missing.probes, vec![with]);
    }

    #[test]
    fn test_env_chain_skips_register_scopes() {
        let (mut tree, _, with, block) = tree_with_chain();
        tree.scopes[with.index()].representation = Representation::Object;
        assert_eq!(tree.env_chain(block), vec![with]);
        tree.scopes[block.index()].representation = Representation::Slots;
        assert_eq!(tree.env_chain(block), vec![block, with]);
    }
}
