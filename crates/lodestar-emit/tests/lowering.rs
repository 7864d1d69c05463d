//! End-to-end lowering through the public API.

use lodestar_emit::ast::build::*;
use lodestar_emit::ast::{
    AssignmentOperator, FunctionKind, Identifier, Pattern, Program, PropertyKey, Span, StatementKind, VariableKind,
};
use lodestar_emit::bytecode::{
    BytecodeBuffer, BytecodeWriter, ConstIndex, Constant, DebugScope, FunctionBody, Instruction, Label,
    NameIndex, OpCode, Operand, completion, disasm,
};
use lodestar_emit::regalloc::RegisterAllocator;
use lodestar_emit::{CompiledFunction, Compiler, EmitConfig, EmitError, compile_program};
use lodestar_macros::{assert_contains, assert_err, assert_matches, assert_ok};

// ============================================================================
// Helpers
// ============================================================================

fn compile_ok(program: &Program) -> CompiledFunction {
    assert_ok!(compile_program(program, &EmitConfig::default()))
}

fn branch_codes(body: &FunctionBody) -> Vec<u32> {
    body.instructions
        .iter()
        .filter(|i| i.opcode == OpCode::BrCompletion)
        .filter_map(|i| match i.operands.last() {
            Some(Operand::Imm(code)) => Some(*code),
            _ => None,
        })
        .collect()
}

fn positions(body: &FunctionBody, opcode: OpCode) -> Vec<usize> {
    body.opcodes()
        .iter()
        .enumerate()
        .filter(|(_, op)| **op == opcode)
        .map(|(index, _)| index)
        .collect()
}

/// Structural checks every lowered function must pass.
fn assert_well_formed(function: &CompiledFunction) {
    let body = &function.body;
    let end = body.instructions.len() as u32;
    for (index, offset) in body.labels.iter().enumerate() {
        assert!(*offset <= end, "label L{index} points past the end");
    }
    for instruction in &body.instructions {
        for reg in instruction.registers() {
            assert!(reg.0 < function.layout.total, "{reg} outside a frame of {}", function.layout.total);
        }
        if let Some(label) = instruction.target() {
            assert!(body.label_offset(label).is_some(), "{label} never bound");
        }
    }
    assert_eq!(body.opcodes().last(), Some(&OpCode::Ret));
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_break_out_of_for_of_closes_once() {
    // for (const v of it) { if (c) break; }
    let program = program(vec![for_of(
        Some(VariableKind::Const),
        pat("v"),
        ident("it"),
        block(vec![if_(ident("c"), break_(None), None)]),
    )]);
    let compiled = compile_ok(&program);
    let body = &compiled.body;

    assert_eq!(body.count(OpCode::GetIterator), 1);
    // one close on the exit path, one suppressed close on the throw path
    assert_eq!(body.count(OpCode::IteratorClose), 1);
    assert_eq!(body.count(OpCode::IteratorCloseSuppressed), 1);
    // the break is parked as a jump completion and dispatched after closing
    assert!(branch_codes(body).contains(&completion::FIRST_JUMP));
    let close = positions(body, OpCode::IteratorClose)[0];
    let finally = positions(body, OpCode::Finally)[0];
    assert!(finally < close);
    assert_well_formed(&compiled);
}

#[test]
fn test_array_destructuring_with_default_and_rest() {
    // let [a, b = 2, ...c] = src;
    let pattern = array_pat(
        vec![Some(elem(pat("a"))), Some(elem_default(pat("b"), num(2.0)))],
        Some(pat("c")),
    );
    let program = program(vec![var_decl(VariableKind::Let, pattern, Some(ident("src")))]);
    let compiled = compile_ok(&program);
    let body = &compiled.body;

    // a, b, and the rest loop each step the iterator
    assert_eq!(body.count(OpCode::IteratorNext), 3);
    // the default applies only to an exactly undefined element
    assert_eq!(body.count(OpCode::BrNotUndefined), 1);
    assert!(body.constants.contains(&Constant::Number(2.0)));
    // the rest element drains into a fresh array
    assert_eq!(body.count(OpCode::NewArray), 1);
    assert_eq!(body.count(OpCode::ArrayPush), 1);
    let drain = positions(body, OpCode::ArrayPush)[0];
    let closes = positions(body, OpCode::IteratorClose);
    assert_eq!(closes.len(), 2, "guard close plus the trailing close");
    let tail_close = closes[1];
    // the trailing close is skipped once the iterator is done
    assert!(drain < tail_close);
    assert_eq!(body.opcodes()[tail_close - 1], OpCode::BrTrue);
    assert_well_formed(&compiled);
}

#[test]
fn test_generator_finally_runs_after_suspension() {
    // function* g(){ try { yield 1; } finally { cleanup(); } }
    let program = program(vec![generator_decl(
        "g",
        &[],
        vec![try_(
            vec![expr_stmt(yield_(Some(num(1.0))))],
            None,
            Some(vec![expr_stmt(call(ident("cleanup"), vec![]))]),
        )],
    )]);
    let compiled = compile_ok(&program);
    let g = &compiled.children[0];
    let ops = g.body.opcodes();

    let yields = positions(&g.body, OpCode::Yield);
    assert_eq!(yields.len(), 2, "initial yield plus the user yield");
    let inner = yields[1];
    // the suspension leaves the finally region and re-enters it on resume
    assert_eq!(ops[inner - 1], OpCode::Leave);
    assert_eq!(ops[inner + 1], OpCode::TryFinally);
    // a return delivered on resume is routed through the finally body
    assert!(branch_codes(&g.body).contains(&completion::RETURN));
    let finally = positions(&g.body, OpCode::Finally)[0];
    let cleanup = positions(&g.body, OpCode::Call)[0];
    assert!(finally < cleanup);
    assert_eq!(g.body.count(OpCode::Call), 1);
    assert_well_formed(g);
}

#[test]
fn test_with_write_checks_object_before_global() {
    // var x; with (obj) { x = 1; }
    let program = program(vec![
        var_decl(VariableKind::Var, pat("x"), None),
        with_(ident("obj"), block(vec![expr_stmt(assign_name("x", num(1.0)))])),
    ]);
    let compiled = compile_ok(&program);
    let body = &compiled.body;

    let guard = positions(body, OpCode::BrHasBinding);
    let global = positions(body, OpCode::StGlobal);
    assert_eq!(guard.len(), 1);
    assert!(!global.is_empty());
    assert!(guard[0] < global[0]);
    assert!(body.contains(OpCode::StScopeProp));
    assert_well_formed(&compiled);
}

#[test]
fn test_released_temp_is_reused() {
    let mut alloc = RegisterAllocator::new();
    let first = alloc.acquire_temp();
    assert_ok!(alloc.release(first));
    let second = alloc.acquire_temp();
    assert_eq!(first, second);
    let third = alloc.acquire_temp();
    assert_ne!(second, third);
    assert_ok!(alloc.release(third));
    assert_ok!(alloc.release(second));
    assert_eq!(alloc.layout().total, 2);
}

// ============================================================================
// Whole programs
// ============================================================================

#[test]
fn test_mixed_program_is_well_formed() {
    let constructor = func_of(FunctionKind::Constructor, &["x"], vec![expr_stmt(assign(
        Pattern::Member(Box::new(member(this(), "x"))),
        ident("x"),
    ))]);
    let members = vec![
        method("norm", false, &[], vec![return_(Some(member(this(), "x")))]),
        field(PropertyKey::Identifier(Identifier::new("y")), false, Some(num(0.0))),
    ];
    let program = program(vec![
        StatementKind::ClassDeclaration(class(Some("Point"), None, Some(constructor), members)).into(),
        function_decl(
            "walk",
            &["items"],
            vec![
                let_("total", num(0.0)),
                for_of(
                    Some(VariableKind::Const),
                    pat("item"),
                    ident("items"),
                    block(vec![try_(
                        vec![expr_stmt(assign_op(
                            AssignmentOperator::AddAssign,
                            pat("total"),
                            ident("item"),
                        ))],
                        Some((Some(pat("e")), vec![continue_(None)])),
                        Some(vec![expr_stmt(call(ident("log"), vec![ident("total")]))]),
                    )]),
                ),
                return_(Some(ident("total"))),
            ],
        ),
        async_decl("load", &["p"], vec![return_(Some(await_(ident("p"))))]),
    ]);
    let compiled = compile_ok(&program);
    // program, constructor, method, field initializer, walk, load
    assert_eq!(compiled.function_count(), 6);
    for function in compiled.iter() {
        assert_well_formed(function);
    }
    let text = disasm::disassemble(&compiled.body);
    assert_contains!(text, "NewClass");
    assert_contains!(text, "NewFunction");
}

#[test]
fn test_program_from_json_matches_builders() {
    let built = program(vec![
        let_("x", num(1.0)),
        if_(ident("x"), expr_stmt(call(ident("f"), vec![ident("x")])), None),
    ]);
    let document = assert_ok!(serde_json::to_string(&built));
    let loaded = assert_ok!(Program::from_json(&document));

    let expected = disasm::disassemble(&compile_ok(&built).body);
    let actual = disasm::disassemble(&compile_ok(&loaded).body);
    assert_eq!(expected, actual);
}

#[test]
fn test_malformed_json_is_rejected() {
    let err = assert_err!(Program::from_json(r#"{ "body": [ { "kind": "Nope" } ] }"#));
    assert_matches!(err, EmitError::Json(_));
}

#[test]
fn test_config_from_toml() {
    let config = assert_ok!(EmitConfig::from_toml_str(
        "debugger_tracking = true\nstatement_boundaries = false\n"
    ));
    let program = program(vec![let_("x", num(1.0)), debugger()]);
    let compiled = assert_ok!(Compiler::new(config).compile(&program));
    assert!(compiled.body.statements.is_empty());
    assert!(compiled.body.contains(OpCode::Debugger));

    let err = assert_err!(EmitConfig::from_toml_str("max_depth = 0\n"));
    assert_matches!(err, EmitError::Config(_));
}

// ============================================================================
// Custom writers
// ============================================================================

/// Counts finished and discarded functions, delegating the rest.
#[derive(Default)]
struct CountingWriter {
    inner: BytecodeBuffer,
    finished: usize,
    resets: usize,
}

impl BytecodeWriter for CountingWriter {
    type Output = usize;

    fn define_label(&mut self) -> Label {
        self.inner.define_label()
    }

    fn mark_label(&mut self, label: Label) -> lodestar_emit::Result<()> {
        self.inner.mark_label(label)
    }

    fn emit(&mut self, instruction: Instruction) {
        self.inner.emit(instruction)
    }

    fn offset(&self) -> u32 {
        self.inner.offset()
    }

    fn add_constant(&mut self, constant: Constant) -> ConstIndex {
        self.inner.add_constant(constant)
    }

    fn intern_name(&mut self, name: &str) -> NameIndex {
        self.inner.intern_name(name)
    }

    fn start_statement(&mut self, span: Span) {
        self.inner.start_statement(span)
    }

    fn end_statement(&mut self) {
        self.inner.end_statement()
    }

    fn record_start_scope_object(&mut self, scope: DebugScope) {
        self.inner.record_start_scope_object(scope)
    }

    fn record_end_scope_object(&mut self) -> lodestar_emit::Result<()> {
        self.inner.record_end_scope_object()
    }

    fn enter_loop(&mut self) -> u32 {
        self.inner.enter_loop()
    }

    fn exit_loop(&mut self, id: u32) {
        self.inner.exit_loop(id)
    }

    fn reset(&mut self) {
        self.resets += 1;
        self.inner.reset()
    }

    fn finish(&mut self) -> lodestar_emit::Result<usize> {
        self.finished += 1;
        Ok(self.inner.finish()?.instructions.len())
    }
}

#[test]
fn test_custom_writer_sees_every_function() {
    let mut compiler = Compiler::with_writer(EmitConfig::default(), CountingWriter::default());
    let functions = program(vec![
        function_decl("a", &[], vec![]),
        function_decl("b", &[], vec![function_decl("c", &[], vec![])]),
    ]);
    let compiled = assert_ok!(compiler.compile(&functions));
    assert_eq!(compiled.function_count(), 4);
    assert!(compiled.iter().all(|f| f.body > 0));
    assert_eq!(compiler.writer().finished, 4);

    let broken = program(vec![
        let_("x", num(1.0)),
        while_(ident("x"), block(vec![break_(Some("missing"))])),
    ]);
    assert_matches!(compiler.compile(&broken), Err(EmitError::MissingJumpTarget(_)));
    assert_eq!(compiler.writer().resets, 1);
    assert_eq!(compiler.writer().finished, 4);
}
