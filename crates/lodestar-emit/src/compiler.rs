// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The compilation driver.
//!
//! A [`Compiler`] validates a program, binds it once, then lowers the
//! program function and every nested function depth-first, in creation
//! order. Each function gets a fresh [`FunctionEmitter`] over the shared
//! writer; the writer's output for that function is taken with
//! [`BytecodeWriter::finish`] before its children are lowered.

use tracing::{debug, instrument, warn};

use crate::ast::Program;
use crate::binder;
use crate::bytecode::{BytecodeBuffer, BytecodeWriter, FunctionBody};
use crate::config::EmitConfig;
use crate::emitter::{FunctionEmitter, FunctionSource};
use crate::error::{EmitError, Result};
use crate::regalloc::RegisterLayout;
use crate::scope::{FunctionFlavor, FunctionId, ScopeInfo, ScopeTree};

/// One lowered function and the functions it creates.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFunction<B = FunctionBody> {
    /// Declared or inferred name
    pub name: Option<String>,
    /// What kind of function this is
    pub flavor: FunctionFlavor,
    /// `async` function
    pub is_async: bool,
    /// Generator function
    pub is_generator: bool,
    /// Strict mode code
    pub strict: bool,
    /// Declared parameters, the rest parameter excluded
    pub param_count: u32,
    /// Frame size
    pub layout: RegisterLayout,
    /// The writer's output
    pub body: B,
    /// Slot layouts of the function's scope objects
    pub scope_info: Vec<ScopeInfo>,
    /// Nested functions, indexed by the `NewFunction`/`NewClass` operand
    pub children: Vec<CompiledFunction<B>>,
}

impl<B> CompiledFunction<B> {
    /// This function and all nested ones, depth-first.
    pub fn iter(&self) -> impl Iterator<Item = &CompiledFunction<B>> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.children.iter().rev());
            Some(next)
        })
    }

    /// Number of functions in the tree, this one included.
    pub fn function_count(&self) -> usize {
        self.iter().count()
    }

    /// Follows child indices from this function.
    pub fn descendant(&self, path: &[usize]) -> Option<&CompiledFunction<B>> {
        path.iter().try_fold(self, |function, &index| function.children.get(index))
    }
}

/// Lowers programs through a [`BytecodeWriter`].
///
/// # Example
///
/// ```
/// use lodestar_emit::ast::build::*;
/// use lodestar_emit::bytecode::OpCode;
/// use lodestar_emit::{Compiler, EmitConfig};
///
/// let program = program(vec![let_("x", num(1.0))]);
/// let mut compiler = Compiler::new(EmitConfig::default());
/// let compiled = compiler.compile(&program).unwrap();
/// assert!(compiled.body.contains(OpCode::Ret));
/// ```
#[derive(Debug)]
pub struct Compiler<W: BytecodeWriter = BytecodeBuffer> {
    config: EmitConfig,
    writer: W,
}

impl Compiler<BytecodeBuffer> {
    /// Creates a compiler writing into an in-memory buffer.
    pub fn new(config: EmitConfig) -> Self {
        Self::with_writer(config, BytecodeBuffer::default())
    }
}

impl<W: BytecodeWriter> Compiler<W> {
    /// Creates a compiler over a custom writer.
    pub fn with_writer(config: EmitConfig, writer: W) -> Self {
        Self { config, writer }
    }

    /// The configuration every function is lowered with.
    pub fn config(&self) -> &EmitConfig {
        &self.config
    }

    /// The writer functions are lowered through.
    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Validates, binds and lowers `program`.
    ///
    /// The program must be numbered (see [`Program::assign_node_ids`]). On
    /// failure the writer is reset and nothing of the program is kept.
    pub fn compile(&mut self, program: &Program) -> Result<CompiledFunction<W::Output>> {
        self.config.validate()?;
        program.validate()?;
        let tree = binder::bind(program, &self.config)?;
        debug!(
            functions = tree.function_count(),
            scopes = tree.scope_count(),
            "program bound"
        );
        lower(
            &tree,
            &self.config,
            &mut self.writer,
            ScopeTree::ROOT,
            FunctionSource::Program(program),
        )
    }
}

/// Lowers one function, then its children.
#[instrument(level = "debug", skip_all, fields(function = function.index()))]
fn lower<'a, W: BytecodeWriter>(
    tree: &'a ScopeTree,
    config: &'a EmitConfig,
    writer: &mut W,
    function: FunctionId,
    source: FunctionSource<'a>,
) -> Result<CompiledFunction<W::Output>> {
    let emitted = FunctionEmitter::new(tree, config, function, writer).and_then(|emitter| emitter.emit(source));
    let (sources, layout) = match emitted {
        Ok(parts) => parts,
        Err(err) => return Err(discard(writer, function, err)),
    };
    let body = match writer.finish() {
        Ok(body) => body,
        Err(err) => return Err(discard(writer, function, err)),
    };

    let info = tree.function(function);
    debug!(
        name = info.name.as_deref().unwrap_or("<anonymous>"),
        permanent = layout.permanent,
        registers = layout.total,
        children = sources.len(),
        "function lowered"
    );

    let children = sources
        .into_iter()
        .map(|child| lower(tree, config, writer, tree.function_for(child.node())?, child))
        .collect::<Result<Vec<_>>>()?;

    Ok(CompiledFunction {
        name: info.name.clone(),
        flavor: info.flavor,
        is_async: info.is_async,
        is_generator: info.is_generator,
        strict: info.strict,
        param_count: info.param_count,
        layout,
        body,
        scope_info: tree.scope_info(function),
        children,
    })
}

fn discard<W: BytecodeWriter>(writer: &mut W, function: FunctionId, err: EmitError) -> EmitError {
    writer.reset();
    warn!(function = function.index(), error = %err, "compilation unit discarded");
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOperator;
    use crate::ast::build::*;
    use crate::bytecode::OpCode;
    use lodestar_macros::{assert_err, assert_matches, assert_ok};

    #[test]
    fn test_children_follow_creation_order() {
        let program = program(vec![
            function_decl("first", &[], vec![]),
            expr_stmt(call(ident("first"), vec![])),
            function_decl("second", &["a", "b"], vec![function_decl("inner", &[], vec![])]),
        ]);
        let compiled = assert_ok!(Compiler::new(EmitConfig::default()).compile(&program));

        assert_eq!(compiled.children.len(), 2);
        assert_eq!(compiled.children[0].name.as_deref(), Some("first"));
        assert_eq!(compiled.children[1].name.as_deref(), Some("second"));
        assert_eq!(compiled.children[1].param_count, 2);
        assert_eq!(
            compiled.descendant(&[1, 0]).and_then(|f| f.name.as_deref()),
            Some("inner")
        );
        assert_eq!(compiled.function_count(), 4);
        assert_eq!(compiled.flavor, FunctionFlavor::Global);
    }

    #[test]
    fn test_every_function_is_finished() {
        let program = program(vec![function_decl(
            "outer",
            &["x"],
            vec![return_(Some(ident("x")))],
        )]);
        let compiled = assert_ok!(Compiler::new(EmitConfig::default()).compile(&program));
        for function in compiled.iter() {
            assert!(function.body.contains(OpCode::Ret));
            assert!(function.layout.total >= function.layout.permanent);
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = EmitConfig {
            max_depth: 0,
            ..EmitConfig::default()
        };
        let err = assert_err!(Compiler::new(config).compile(&program(vec![])));
        assert_matches!(err, EmitError::Config(_));
    }

    #[test]
    fn test_failure_resets_writer() {
        let broken = program(vec![
            let_("x", num(1.0)),
            while_(ident("x"), block(vec![break_(Some("nowhere"))])),
        ]);
        let mut compiler = Compiler::new(EmitConfig::default());
        let err = assert_err!(compiler.compile(&broken));
        assert_matches!(err, EmitError::MissingJumpTarget(ref label) if label == "nowhere");

        // nothing of the failed program leaks into the next one
        let compiled = assert_ok!(compiler.compile(&program(vec![expr_stmt(num(2.0))])));
        assert!(compiled.body.labels.is_empty());
        assert!(!compiled.body.contains(OpCode::LoopHeader));
        assert!(compiled.body.constants.len() <= 1);
    }

    #[test]
    fn test_nesting_limit_aborts() {
        let config = EmitConfig {
            max_depth: 8,
            ..EmitConfig::default()
        };
        let mut nested = num(1.0);
        for _ in 0..16 {
            nested = binary(BinaryOperator::Add, nested, num(1.0));
        }
        let err = assert_err!(Compiler::new(config).compile(&program(vec![expr_stmt(nested)])));
        assert_matches!(err, EmitError::NestingTooDeep { limit: 8 });
    }
}
