//! The instruction set.
//!
//! Operand conventions: `dst` is always first when present, labels come
//! first for branches, immediates (`#n`) last. The runtime contract of each
//! opcode is stated only as far as the emitter relies on it.

use lodestar_macros::opcodes;

opcodes! {
    /// Register-machine opcodes.
    pub enum OpCode {
        // Moves and loads
        /// `dst <- src`
        Mov,
        /// `dst <- constants[k]`
        LdConst,
        /// `dst <- undefined`
        LdUndef,
        /// `dst <- null`
        LdNull,
        /// `dst <- true`
        LdTrue,
        /// `dst <- false`
        LdFalse,
        /// `dst <- closure environment of the running function`
        LdEnv,
        /// `dst <- env` walked `#hops` parents outward
        LdEnvAt,
        /// `dst <- receiver of the running function`
        LdThis,
        /// `dst <- global this value`
        LdGlobalThis,
        /// `dst <- new.target`
        LdNewTarget,
        /// `dst <- home object of the running method`
        LdHomeObject,
        /// `dst <- fresh arguments object`
        LdArguments,
        /// `dst <- argument #i` (undefined when absent)
        LdArg,
        /// `dst <- array of arguments from #i on`
        LdRestArgs,
        /// `dst <- the running function object`
        LdCallee,

        // Scope objects
        /// `dst <- new slot array with parent env and #count slots`
        NewScopeSlots,
        /// `dst <- new dynamic scope object with parent env`
        NewScopeObject,
        /// `dst <- new with-scope wrapping obj, parent env`
        NewWithScope,
        /// `dst <- copy of slot array src` (per-iteration bindings)
        CloneScopeSlots,
        /// `dst <- scope[#slot]`
        LdSlot,
        /// `scope[#slot] <- src`
        StSlot,
        /// `dst <- scope.name` on an object-backed scope
        LdScopeProp,
        /// `scope.name <- src` on an object-backed scope
        StScopeProp,
        /// `dst <- uninitialized-binding marker`
        InitUndecl,
        /// `scope[#slot] <- uninitialized-binding marker`
        InitUndeclSlot,
        /// throw ReferenceError(name) if src holds the uninitialized marker
        CheckTdz,
        /// branch to label if the dynamic scope `scope` has a binding `name`
        BrHasBinding,

        // Globals
        /// `dst <- global name` (ReferenceError when missing)
        LdGlobal,
        /// `global name <- src`
        StGlobal,
        /// `global name <- src`, ReferenceError when missing
        StGlobalStrict,
        /// `dst <- typeof global name` (no ReferenceError)
        TypeofGlobal,
        /// `dst <- delete global name`
        DeleteGlobal,
        /// declare a global `var` or function binding
        DeclareGlobalVar,
        /// declare a global lexical binding; `#1` when const
        DeclareGlobalLexical,
        /// initialize a global lexical binding
        InitGlobalLexical,

        // Binary operators: dst, lhs, rhs
        /// `+`
        Add,
        /// `-`
        Sub,
        /// `*`
        Mul,
        /// `/`
        Div,
        /// `%`
        Mod,
        /// `**`
        Pow,
        /// `&`
        BitAnd,
        /// `|`
        BitOr,
        /// `^`
        BitXor,
        /// `<<`
        Shl,
        /// `>>`
        Shr,
        /// `>>>`
        UShr,
        /// `==`
        Eq,
        /// `!=`
        Neq,
        /// `===`
        StrictEq,
        /// `!==`
        StrictNeq,
        /// `<`
        Lt,
        /// `<=`
        Le,
        /// `>`
        Gt,
        /// `>=`
        Ge,
        /// `in`
        In,
        /// `instanceof`
        InstanceOf,

        // Unary operators: dst, src
        /// `-src`
        Neg,
        /// `+src`
        ToNumber,
        /// numeric conversion for update expressions
        ToNumeric,
        /// `!src`
        Not,
        /// `~src`
        BitNot,
        /// `typeof src`
        TypeOf,
        /// `src + 1`
        Inc,
        /// `src - 1`
        Dec,
        /// string conversion for template substitutions
        ToStringValue,
        /// property key conversion for computed keys
        ToPropertyKey,

        // Control flow
        /// jump to label
        Br,
        /// jump to label when src is truthy
        BrTrue,
        /// jump to label when src is falsy
        BrFalse,
        /// jump to label when src is not exactly undefined
        BrNotUndefined,
        /// jump to label when src is null or undefined
        BrNullish,
        /// jump to label when src is neither null nor undefined
        BrNotNullish,
        /// fused `==` and branch
        BrEq,
        /// fused `!=` and branch
        BrNeq,
        /// fused `===` and branch
        BrStrictEq,
        /// fused `!==` and branch
        BrStrictNeq,
        /// fused `<` and branch
        BrLt,
        /// fused `<=` and branch
        BrLe,
        /// fused `>` and branch
        BrGt,
        /// fused `>=` and branch
        BrGe,
        /// jump to label when the completion register holds `#code`
        BrCompletion,
        /// marks a loop entrance; operand is the loop id
        LoopHeader,

        // Properties
        /// `dst <- obj.name`
        LdField,
        /// `obj.name <- src`
        StField,
        /// `dst <- obj[key]`
        LdElem,
        /// `obj[key] <- src`
        StElem,
        /// `dst <- delete obj.name`
        DeleteField,
        /// `dst <- delete obj[key]`
        DeleteElem,
        /// define an own data property; key is a name or register
        DefineField,
        /// define a method; `#1` when enumerable
        DefineMethod,
        /// define a getter; `#1` when enumerable
        DefineGetter,
        /// define a setter; `#1` when enumerable
        DefineSetter,
        /// `dst <- copy of src's own enumerable properties minus keys in array`
        CopyDataProperties,
        /// `dst <- super[key]` with the given home object and receiver
        LdSuper,
        /// `super[key] <- src` with the given home object and receiver
        StSuper,

        // Literals
        /// `dst <- {}`
        NewObject,
        /// `dst <- []`
        NewArray,
        /// append src to array
        ArrayPush,
        /// append a hole to array
        ArrayHole,
        /// append every value produced by iterating src
        ArraySpread,
        /// `dst <- new RegExp(pattern, flags)`
        NewRegExp,

        // Functions and classes
        /// `dst <- closure over func #i with environment env`
        NewFunction,
        /// `dst <- class with constructor func #i, env[, heritage]`
        NewClass,
        /// `dst <- class with a default constructor[, heritage]`
        NewDefaultClass,
        /// attach the instance field initializer function to a constructor
        SetFieldInitializer,
        /// `dst <- callee.call(this, args...)` with `#argc` arguments from first
        Call,
        /// `dst <- callee.call(this, ...array)`
        CallSpread,
        /// direct eval in the scope env
        CallEval,
        /// `dst <- new callee(args...)`
        New,
        /// `dst <- new callee(...array)`
        NewSpread,
        /// `dst <- super(args...)`
        SuperCall,
        /// `dst <- super(...array)`
        SuperCallSpread,
        /// bind `this` after `super()`; ReferenceError if already bound
        InitThis,
        /// ReferenceError if src is still the uninitialized `this`
        CheckThisInitialized,
        /// return src
        Ret,
        /// throw src
        Throw,

        // Iteration
        /// `dst <- src[Symbol.iterator]()`
        GetIterator,
        /// `dst <- src[Symbol.asyncIterator]()` (or sync fallback)
        GetAsyncIterator,
        /// `dst <- iter.next()`
        IteratorNext,
        /// TypeError unless src is an object
        CheckIteratorResult,
        /// close iter after a normal or break completion
        IteratorClose,
        /// close iter after a throw completion; errors from `return()` are dropped
        IteratorCloseSuppressed,
        /// forward a resume record to a delegated iterator (`yield*`)
        IteratorResume,
        /// `dst <- key enumerator over obj`
        ForInInit,
        /// `dst <- next key` or jump to label when exhausted
        ForInNext,
        /// TypeError if src is null or undefined
        CheckObjectCoercible,

        // Exception regions
        /// open a catch region whose handler is label
        TryCatch,
        /// open a finally region; handler label, completion type and value registers
        TryFinally,
        /// close the innermost region
        Leave,
        /// enter a catch handler; `dst <- exception`
        Catch,
        /// enter a finally body with completion type and value registers
        Finally,
        /// re-enter a catch handler after resumption
        ResumeCatch,
        /// re-enter a finally body after resumption
        ResumeFinally,
        /// throw an error of kind `#k` (with optional name)
        RuntimeError,

        // Suspension
        /// suspend, yielding src; `dst <- resume record`
        Yield,
        /// suspend on a promise; `dst <- resume record`
        Await,
        /// unpack a resume record: throw, return, or `dst <- value`
        ResumeYield,

        /// invoke the debugger
        Debugger,
    }
}

impl OpCode {
    /// Whether the first operand is a branch target.
    pub fn is_branch(self) -> bool {
        matches!(
            self,
            OpCode::Br
                | OpCode::BrTrue
                | OpCode::BrFalse
                | OpCode::BrNotUndefined
                | OpCode::BrNullish
                | OpCode::BrNotNullish
                | OpCode::BrEq
                | OpCode::BrNeq
                | OpCode::BrStrictEq
                | OpCode::BrStrictNeq
                | OpCode::BrLt
                | OpCode::BrLe
                | OpCode::BrGt
                | OpCode::BrGe
                | OpCode::BrCompletion
                | OpCode::BrHasBinding
        )
    }

    /// Whether control never falls through to the next instruction.
    pub fn is_terminator(self) -> bool {
        matches!(self, OpCode::Br | OpCode::Ret | OpCode::Throw | OpCode::RuntimeError)
    }

    /// Whether this opens or re-enters an exception region.
    pub fn enters_region(self) -> bool {
        matches!(
            self,
            OpCode::TryCatch
                | OpCode::TryFinally
                | OpCode::Catch
                | OpCode::Finally
                | OpCode::ResumeCatch
                | OpCode::ResumeFinally
        )
    }

    /// Whether this is a suspension point.
    pub fn is_suspension(self) -> bool {
        matches!(self, OpCode::Yield | OpCode::Await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<_> = OpCode::all().iter().map(|op| op.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), OpCode::all().len());
    }

    #[test]
    fn test_branch_classification() {
        assert!(OpCode::BrLt.is_branch());
        assert!(!OpCode::Lt.is_branch());
        assert!(OpCode::Throw.is_terminator());
        assert!(OpCode::Yield.is_suspension());
        assert!(OpCode::ResumeFinally.enters_region());
    }
}
