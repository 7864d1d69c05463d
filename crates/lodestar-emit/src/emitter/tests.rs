//! Tests for function emission.

use super::*;
use crate::ast::build::*;
use crate::bytecode::{FunctionBody, Operand, RuntimeErrorKind, completion};
use crate::compiler::{CompiledFunction, Compiler};
use lodestar_macros::{assert_matches, assert_ok};

fn compile_with(body: Vec<Statement>, config: EmitConfig) -> CompiledFunction {
    assert_ok!(Compiler::new(config).compile(&program(body)))
}

fn compile_ok(body: Vec<Statement>) -> CompiledFunction {
    compile_with(body, EmitConfig::default())
}

/// Compiles `function f(params) { body }` and returns `f`.
fn function_ok(params: &[&str], body: Vec<Statement>) -> CompiledFunction {
    let mut compiled = compile_ok(vec![function_decl("f", params, body)]);
    compiled.children.remove(0)
}

fn runtime_errors(body: &FunctionBody) -> Vec<RuntimeErrorKind> {
    body.instructions
        .iter()
        .filter(|i| i.opcode == OpCode::RuntimeError)
        .filter_map(|i| match i.operands.last() {
            Some(Operand::Imm(code)) => RuntimeErrorKind::from_code(*code),
            _ => None,
        })
        .collect()
}

/// Completion codes tested by `BrCompletion` instructions, in order.
fn completion_codes(body: &FunctionBody) -> Vec<u32> {
    body.instructions
        .iter()
        .filter(|i| i.opcode == OpCode::BrCompletion)
        .filter_map(|i| match i.operands.last() {
            Some(Operand::Imm(code)) => Some(*code),
            _ => None,
        })
        .collect()
}

/// Names used as the key operand of `Define*` instructions, in order.
fn defined_names(body: &FunctionBody) -> Vec<String> {
    body.instructions
        .iter()
        .filter(|i| {
            matches!(
                i.opcode,
                OpCode::DefineMethod | OpCode::DefineGetter | OpCode::DefineSetter | OpCode::DefineField
            )
        })
        .filter_map(|i| match i.operands.get(1) {
            Some(Operand::Name(name)) => body.name(*name).map(str::to_string),
            _ => None,
        })
        .collect()
}

/// Names read with `LdGlobal`, in order.
fn global_loads(body: &FunctionBody) -> Vec<String> {
    body.instructions
        .iter()
        .filter(|i| i.opcode == OpCode::LdGlobal)
        .filter_map(|i| match i.operands.get(1) {
            Some(Operand::Name(name)) => body.name(*name).map(str::to_string),
            _ => None,
        })
        .collect()
}

fn last_position(body: &FunctionBody, opcode: OpCode) -> Option<usize> {
    body.instructions.iter().rposition(|i| i.opcode == opcode)
}

/// Every suspension leaves exactly the regions it re-enters.
fn assert_suspensions_balanced(body: &FunctionBody) {
    let ops = body.opcodes();
    for (index, op) in ops.iter().enumerate() {
        if !matches!(op, OpCode::Yield | OpCode::Await) {
            continue;
        }
        let left = ops[..index].iter().rev().take_while(|&&o| o == OpCode::Leave).count();
        let right = ops[index + 1..]
            .iter()
            .take_while(|&&o| {
                matches!(
                    o,
                    OpCode::TryCatch | OpCode::TryFinally | OpCode::ResumeCatch | OpCode::ResumeFinally
                )
            })
            .count();
        assert_eq!(left, right, "suspension at {index} leaves {left} regions but restores {right}");
    }
}

// ============================================================================
// Bindings
// ============================================================================

#[test]
fn test_program_declares_globals() {
    let compiled = compile_ok(vec![var_("a", num(1.0)), let_("b", num(2.0))]);
    assert!(compiled.body.contains(OpCode::DeclareGlobalVar));
    assert!(compiled.body.contains(OpCode::DeclareGlobalLexical));
    assert!(compiled.body.contains(OpCode::InitGlobalLexical));
    assert_eq!(compiled.body.opcodes().last(), Some(&OpCode::Ret));
}

#[test]
fn test_read_before_declaration_raises() {
    let f = function_ok(&[], vec![block(vec![expr_stmt(ident("x")), let_("x", num(1.0))])]);
    assert_eq!(runtime_errors(&f.body), vec![RuntimeErrorKind::UseBeforeDeclaration]);
}

#[test]
fn test_read_after_declaration_is_unchecked() {
    let f = function_ok(&[], vec![let_("x", num(1.0)), return_(Some(ident("x")))]);
    assert!(runtime_errors(&f.body).is_empty());
    assert!(!f.body.contains(OpCode::CheckTdz));
}

#[test]
fn test_const_assignment_raises() {
    let f = function_ok(&[], vec![const_("c", num(1.0)), expr_stmt(assign_name("c", num(2.0)))]);
    assert_eq!(runtime_errors(&f.body), vec![RuntimeErrorKind::AssignmentToConst]);
}

#[test]
fn test_captured_binding_uses_slots_and_tdz_checks() {
    let f = function_ok(
        &[],
        vec![
            let_("x", num(1.0)),
            function_decl("g", &[], vec![return_(Some(ident("x")))]),
        ],
    );
    assert!(f.body.contains(OpCode::NewScopeSlots));
    assert!(f.body.contains(OpCode::InitUndeclSlot));
    assert!(f.body.contains(OpCode::StSlot));

    let g = &f.children[0];
    assert!(g.body.contains(OpCode::LdSlot));
    assert!(g.body.contains(OpCode::CheckTdz));
}

#[test]
fn test_parameters_load_straight_into_registers() {
    let f = function_ok(&["a", "b"], vec![return_(Some(binary(BinaryOperator::Add, ident("a"), ident("b"))))]);
    assert_eq!(f.body.count(OpCode::LdArg), 2);
    assert_eq!(f.param_count, 2);
    assert!(!f.body.contains(OpCode::Mov));
}

#[test]
fn test_switch_bindings_are_checked_at_run_time() {
    let f = function_ok(
        &["x"],
        vec![switch_(
            ident("x"),
            vec![
                case(num(1.0), vec![let_("y", num(1.0)), break_(None)]),
                default_case(vec![expr_stmt(ident("y"))]),
            ],
        )],
    );
    assert!(f.body.contains(OpCode::InitUndecl));
    assert!(f.body.contains(OpCode::CheckTdz));
    assert!(runtime_errors(&f.body).is_empty());
}

#[test]
fn test_typeof_undeclared_global_does_not_throw() {
    let f = function_ok(&[], vec![return_(Some(unary(UnaryOperator::Typeof, ident("missing"))))]);
    assert!(f.body.contains(OpCode::TypeofGlobal));
    assert!(!f.body.contains(OpCode::LdGlobal));
}

#[test]
fn test_with_probes_the_object_first() {
    let f = function_ok(
        &["o"],
        vec![
            var_("x", num(0.0)),
            with_(ident("o"), block(vec![expr_stmt(assign_name("x", num(1.0)))])),
        ],
    );
    assert!(f.body.contains(OpCode::NewWithScope));
    assert!(f.body.contains(OpCode::BrHasBinding));
    let probe = f.body.position(OpCode::BrHasBinding);
    let with = f.body.position(OpCode::NewWithScope);
    assert!(with < probe);
}

#[test]
fn test_typeof_inside_with_does_not_throw() {
    let f = function_ok(
        &["o"],
        vec![with_(ident("o"), return_(Some(unary(UnaryOperator::Typeof, ident("zz")))))],
    );
    assert!(f.body.position(OpCode::BrHasBinding) < f.body.position(OpCode::TypeofGlobal));
    // the object hit reads the property, then takes its type
    assert!(f.body.contains(OpCode::LdScopeProp));
    assert!(f.body.contains(OpCode::TypeOf));
    assert!(global_loads(&f.body).is_empty());
}

#[test]
fn test_typeof_after_eval_does_not_throw() {
    let f = function_ok(
        &["s"],
        vec![
            expr_stmt(call(ident("eval"), vec![ident("s")])),
            return_(Some(unary(UnaryOperator::Typeof, ident("zz")))),
        ],
    );
    assert!(f.body.contains(OpCode::TypeofGlobal));
    assert!(global_loads(&f.body).iter().all(|name| name == "eval"));
}

#[test]
fn test_delete_inside_with_removes_object_property() {
    let f = function_ok(
        &["o"],
        vec![with_(ident("o"), expr_stmt(unary(UnaryOperator::Delete, ident("x"))))],
    );
    assert!(f.body.contains(OpCode::DeleteField));
    assert!(f.body.position(OpCode::BrHasBinding) < f.body.position(OpCode::DeleteGlobal));
}

#[test]
fn test_delete_declared_binding_inside_with_still_probes() {
    let f = function_ok(
        &["o"],
        vec![
            var_("x", num(0.0)),
            with_(ident("o"), expr_stmt(unary(UnaryOperator::Delete, ident("x")))),
        ],
    );
    assert!(f.body.contains(OpCode::DeleteField));
    assert!(!f.body.contains(OpCode::DeleteGlobal));
}

#[test]
fn test_call_through_with_passes_object_as_receiver() {
    let f = function_ok(
        &["o"],
        vec![with_(ident("o"), expr_stmt(call(ident("g"), vec![num(1.0)])))],
    );
    let mov = assert_ok!(
        f.body
            .instructions
            .iter()
            .rposition(|i| i.opcode == OpCode::Mov)
            .ok_or("no Mov")
    );
    let call = assert_ok!(f.body.position(OpCode::Call).ok_or("no Call"));
    assert!(f.body.position(OpCode::BrHasBinding) < Some(mov));
    assert!(mov < call);
    // the moved object is the call's receiver
    assert_eq!(
        f.body.instructions[mov].operands.first(),
        f.body.instructions[call].operands.get(2)
    );
}

#[test]
fn test_direct_eval_captures_everything() {
    let f = function_ok(
        &[],
        vec![let_("x", num(1.0)), expr_stmt(call(ident("eval"), vec![string("x")]))],
    );
    assert!(f.body.contains(OpCode::CallEval));
    assert!(!f.body.contains(OpCode::Call));
    assert!(f.scope_info.iter().any(|scope| scope.dynamic));
}

#[test]
fn test_shadowed_eval_is_a_plain_call() {
    let f = function_ok(
        &["eval"],
        vec![expr_stmt(call(ident("eval"), vec![string("x")]))],
    );
    assert!(f.body.contains(OpCode::Call));
    assert!(!f.body.contains(OpCode::CallEval));
}

// ============================================================================
// Conditions and folding
// ============================================================================

#[test]
fn test_comparison_fuses_with_branch() {
    let f = function_ok(
        &["a", "b"],
        vec![if_(
            binary(BinaryOperator::LessThan, ident("a"), ident("b")),
            expr_stmt(call(ident("g"), vec![])),
            None,
        )],
    );
    assert!(f.body.contains(OpCode::BrLt));
    assert!(!f.body.contains(OpCode::Lt));
    assert!(!f.body.contains(OpCode::BrFalse));
}

#[test]
fn test_strict_equality_branches_on_inverse() {
    let f = function_ok(
        &["a", "b"],
        vec![if_(
            binary(BinaryOperator::StrictEqual, ident("a"), ident("b")),
            expr_stmt(call(ident("g"), vec![])),
            None,
        )],
    );
    assert!(f.body.contains(OpCode::BrStrictNeq));
    assert!(!f.body.contains(OpCode::StrictEq));
}

#[test]
fn test_logical_conditions_never_materialize() {
    let f = function_ok(
        &["a", "b"],
        vec![if_(
            and(ident("a"), not(ident("b"))),
            expr_stmt(call(ident("g"), vec![])),
            None,
        )],
    );
    assert!(!f.body.contains(OpCode::Not));
    assert!(f.body.contains(OpCode::BrFalse));
    assert!(f.body.contains(OpCode::BrTrue));
}

#[test]
fn test_constant_branch_is_folded() {
    let body = vec![if_(
        boolean(false),
        expr_stmt(call(ident("g"), vec![])),
        Some(expr_stmt(call(ident("h"), vec![]))),
    )];
    let folded = compile_ok(body.clone());
    assert_eq!(folded.body.count(OpCode::Call), 1);
    assert!(folded.body.labels.is_empty());

    let config = EmitConfig {
        fold_constant_branches: false,
        ..EmitConfig::default()
    };
    let unfolded = compile_with(body, config);
    assert_eq!(unfolded.body.count(OpCode::Call), 2);
    assert!(unfolded.body.contains(OpCode::BrFalse));
}

#[test]
fn test_switch_compares_cases_in_order() {
    let f = function_ok(
        &["x"],
        vec![switch_(
            ident("x"),
            vec![
                case(num(1.0), vec![expr_stmt(call(ident("a"), vec![])), break_(None)]),
                default_case(vec![expr_stmt(call(ident("b"), vec![]))]),
                case(num(2.0), vec![expr_stmt(call(ident("c"), vec![]))]),
            ],
        )],
    );
    assert_eq!(f.body.count(OpCode::BrStrictEq), 2);
    assert_eq!(f.body.count(OpCode::Call), 3);
}

// ============================================================================
// Loops and jumps
// ============================================================================

#[test]
fn test_loops_are_recorded() {
    let f = function_ok(
        &["n"],
        vec![while_(ident("n"), block(vec![expr_stmt(update(UpdateOperator::Decrement, false, ident("n")))]))],
    );
    assert_eq!(f.body.loops.len(), 1);
    assert_eq!(f.body.count(OpCode::LoopHeader), 1);
}

#[test]
fn test_for_let_copies_captured_bindings_per_iteration() {
    let f = function_ok(
        &["n"],
        vec![for_(
            for_let("i", num(0.0)),
            Some(binary(BinaryOperator::LessThan, ident("i"), ident("n"))),
            Some(update(UpdateOperator::Increment, false, ident("i"))),
            block(vec![expr_stmt(call(ident("g"), vec![arrow(&[], vec![return_(Some(ident("i")))])]))]),
        )],
    );
    assert_eq!(f.body.count(OpCode::CloneScopeSlots), 2);
}

#[test]
fn test_for_in_enumerates() {
    let f = function_ok(
        &["o"],
        vec![for_in(Some(VariableKind::Const), pat("k"), ident("o"), block(vec![]))],
    );
    assert!(f.body.contains(OpCode::ForInInit));
    assert!(f.body.contains(OpCode::ForInNext));
}

#[test]
fn test_unknown_label_is_fatal() {
    let err = Compiler::new(EmitConfig::default())
        .compile(&program(vec![while_(ident("x"), continue_(Some("missing")))]));
    assert_matches!(err, Err(EmitError::MissingJumpTarget(_)));
}

#[test]
fn test_labeled_block_break() {
    let f = function_ok(
        &["x"],
        vec![labeled(
            "done",
            block(vec![if_(ident("x"), break_(Some("done")), None), expr_stmt(call(ident("g"), vec![]))]),
        )],
    );
    assert_eq!(f.body.count(OpCode::Br), 1);
}

#[test]
fn test_labeled_break_runs_finally() {
    let f = function_ok(
        &[],
        vec![labeled(
            "outer",
            while_(
                ident("x"),
                block(vec![try_(
                    vec![break_(Some("outer"))],
                    None,
                    Some(vec![expr_stmt(call(ident("g"), vec![]))]),
                )]),
            ),
        )],
    );
    let codes = completion_codes(&f.body);
    assert!(codes.contains(&completion::NORMAL));
    assert!(codes.contains(&completion::FIRST_JUMP));
    assert!(!codes.contains(&completion::RETURN));
}

// ============================================================================
// Exceptions
// ============================================================================

#[test]
fn test_return_routes_through_finally() {
    let f = function_ok(
        &[],
        vec![try_(
            vec![return_(Some(num(1.0)))],
            None,
            Some(vec![expr_stmt(call(ident("g"), vec![]))]),
        )],
    );
    assert!(completion_codes(&f.body).contains(&completion::RETURN));
    // the only Ret for `return 1` runs after the finally body
    let finally = f.body.position(OpCode::Finally);
    let first_ret = f.body.position(OpCode::Ret);
    assert!(finally < first_ret);
    assert_eq!(f.body.count(OpCode::Ret), 2);
}

#[test]
fn test_try_catch_binds_exception() {
    let f = function_ok(
        &[],
        vec![try_(
            vec![expr_stmt(call(ident("g"), vec![]))],
            Some((Some(pat("e")), vec![expr_stmt(call(ident("h"), vec![ident("e")]))])),
            None,
        )],
    );
    assert_eq!(f.body.count(OpCode::TryCatch), 1);
    assert_eq!(f.body.count(OpCode::Catch), 1);
    assert!(!f.body.contains(OpCode::TryFinally));
    // protected block and handler each close their region
    assert_eq!(f.body.count(OpCode::Leave), 2);
}

#[test]
fn test_return_inside_catch_leaves_handler_region() {
    let f = function_ok(
        &[],
        vec![try_(
            vec![],
            Some((None, vec![return_(Some(num(1.0)))])),
            None,
        )],
    );
    let ops = f.body.opcodes();
    let ret = assert_ok!(f.body.position(OpCode::Ret).ok_or("no Ret"));
    assert_eq!(ops[ret - 1], OpCode::Leave);
}

// ============================================================================
// Iterators
// ============================================================================

#[test]
fn test_for_of_guards_iterator() {
    let f = function_ok(
        &["it"],
        vec![for_of(
            Some(VariableKind::Const),
            pat("v"),
            ident("it"),
            block(vec![if_(ident("v"), break_(None), None)]),
        )],
    );
    assert!(f.body.contains(OpCode::GetIterator));
    assert!(f.body.contains(OpCode::CheckIteratorResult));
    assert_eq!(f.body.count(OpCode::IteratorCloseSuppressed), 1);
    assert_eq!(f.body.count(OpCode::IteratorClose), 1);
    assert!(f.body.position(OpCode::IteratorCloseSuppressed) < f.body.position(OpCode::IteratorClose));
    // `break` is parked in the finally region
    assert!(completion_codes(&f.body).contains(&completion::FIRST_JUMP));
}

#[test]
fn test_for_await_awaits_each_step() {
    let mut compiled = compile_ok(vec![async_decl(
        "f",
        &["it"],
        vec![for_await(Some(VariableKind::Const), pat("v"), ident("it"), block(vec![]))],
    )]);
    let f = compiled.children.remove(0);
    assert!(f.is_async);
    assert!(f.body.contains(OpCode::GetAsyncIterator));
    assert_eq!(f.body.count(OpCode::Await), 1);
    assert_suspensions_balanced(&f.body);
}

#[test]
fn test_array_destructuring_closes_iterator() {
    let f = function_ok(
        &["it"],
        vec![var_decl(
            VariableKind::Const,
            array_pat(vec![Some(elem(pat("a"))), Some(elem_default(pat("b"), num(1.0)))], None),
            Some(ident("it")),
        )],
    );
    assert_eq!(f.body.count(OpCode::IteratorNext), 2);
    assert!(f.body.contains(OpCode::IteratorClose));
    assert!(f.body.contains(OpCode::IteratorCloseSuppressed));
    assert!(f.body.contains(OpCode::BrNotUndefined));
}

#[test]
fn test_destructuring_evaluates_member_target_before_value() {
    let target = Pattern::Member(Box::new(index(ident("o"), call(ident("g"), vec![]))));
    let f = function_ok(
        &["o", "src"],
        vec![expr_stmt(assign(array_pat(vec![Some(elem(target))], None), ident("src")))],
    );
    assert!(f.body.position(OpCode::Call) < f.body.position(OpCode::IteratorNext));
    assert!(f.body.position(OpCode::IteratorNext) < f.body.position(OpCode::StElem));
}

#[test]
fn test_object_destructuring_evaluates_member_target_before_value() {
    let target = Pattern::Member(Box::new(index(ident("o"), call(ident("g"), vec![]))));
    let f = function_ok(
        &["o", "src"],
        vec![expr_stmt(assign(object_pat(vec![("a", elem(target))], None), ident("src")))],
    );
    assert!(f.body.position(OpCode::Call) < f.body.position(OpCode::LdField));
}

#[test]
fn test_rest_element_does_not_close_drained_iterator() {
    let rest = object_pat(vec![("length", elem_default(pat("n"), call(ident("g"), vec![])))], None);
    let f = function_ok(
        &["src"],
        vec![var_decl(VariableKind::Let, array_pat(vec![], Some(rest)), Some(ident("src")))],
    );
    let push = assert_ok!(last_position(&f.body, OpCode::ArrayPush).ok_or("no ArrayPush"));
    let call = assert_ok!(last_position(&f.body, OpCode::Call).ok_or("no Call"));
    assert!(push < call);
    // no flag is armed once the rest array is collected
    let ops = f.body.opcodes();
    assert!(!ops[push..call].iter().any(|&op| matches!(op, OpCode::LdTrue | OpCode::Not)));
}

#[test]
fn test_throw_in_for_of_closes_on_catch_path_only() {
    let f = function_ok(
        &["it"],
        vec![for_of(
            Some(VariableKind::Const),
            pat("v"),
            ident("it"),
            block(vec![throw_(ident("v"))]),
        )],
    );
    let ops = f.body.opcodes();
    let suppressed = assert_ok!(f.body.position(OpCode::IteratorCloseSuppressed).ok_or("no suppressed close"));
    let catch = assert_ok!(f.body.position(OpCode::Catch).ok_or("no Catch"));
    assert!(catch < suppressed);
    // the catch path clears the exit flag before closing
    assert_eq!(ops[suppressed - 1], OpCode::LdFalse);
    assert_eq!(f.body.count(OpCode::IteratorClose), 1);
}

#[test]
fn test_object_rest_copies_remaining_properties() {
    let f = function_ok(
        &["o"],
        vec![var_decl(
            VariableKind::Let,
            object_pat(vec![("a", elem(pat("a")))], Some(pat("rest"))),
            Some(ident("o")),
        )],
    );
    assert!(f.body.contains(OpCode::CheckObjectCoercible));
    assert!(f.body.contains(OpCode::NewObject));
    assert!(f.body.contains(OpCode::CopyDataProperties));
}

// ============================================================================
// Generators
// ============================================================================

#[test]
fn test_generator_starts_suspended() {
    let mut compiled = compile_ok(vec![generator_decl("g", &[], vec![])]);
    let g = compiled.children.remove(0);
    assert!(g.is_generator);
    assert_eq!(g.body.count(OpCode::Yield), 1);
    assert_suspensions_balanced(&g.body);
}

#[test]
fn test_suspension_restores_regions() {
    let mut compiled = compile_ok(vec![generator_decl(
        "g",
        &[],
        vec![try_(
            vec![expr_stmt(yield_(Some(num(1.0))))],
            Some((Some(pat("e")), vec![expr_stmt(yield_(Some(num(2.0))))])),
            Some(vec![expr_stmt(yield_(Some(num(3.0))))]),
        )],
    )]);
    let g = compiled.children.remove(0);
    assert_eq!(g.body.count(OpCode::Yield), 4);
    assert_eq!(g.body.count(OpCode::ResumeYield), 4);
    assert!(g.body.contains(OpCode::ResumeCatch));
    assert!(g.body.contains(OpCode::ResumeFinally));
    assert_suspensions_balanced(&g.body);
    // a resumed generator may be asked to return from inside the try
    assert!(completion_codes(&g.body).contains(&completion::RETURN));
}

#[test]
fn test_yield_star_forwards_resumptions() {
    let mut compiled = compile_ok(vec![generator_decl(
        "g",
        &["inner"],
        vec![expr_stmt(yield_star(ident("inner")))],
    )]);
    let g = compiled.children.remove(0);
    assert!(g.body.contains(OpCode::IteratorResume));
    assert_eq!(g.body.count(OpCode::Yield), 2);
    // the inner iterator receives the raw resume record
    assert_eq!(g.body.count(OpCode::ResumeYield), 1);
    assert_suspensions_balanced(&g.body);
}

#[test]
fn test_await_resumes_with_record() {
    let mut compiled = compile_ok(vec![async_decl(
        "f",
        &["p"],
        vec![return_(Some(await_(ident("p"))))],
    )]);
    let f = compiled.children.remove(0);
    assert_eq!(f.body.count(OpCode::Await), 1);
    assert!(!f.body.contains(OpCode::Yield));
    assert_suspensions_balanced(&f.body);
}

// ============================================================================
// Classes
// ============================================================================

#[test]
fn test_class_members_install_static_then_instance() {
    let getter = ClassMember {
        key: PropertyKey::Identifier(Identifier::new("g")),
        is_static: false,
        value: ClassMemberValue::Getter(func_of(FunctionKind::Getter, &[], vec![])),
    };
    let compiled = compile_ok(vec![class_decl(
        "C",
        None,
        vec![method("m", false, &[], vec![]), method("s", true, &[], vec![]), getter],
    )]);
    assert!(compiled.body.contains(OpCode::NewDefaultClass));
    assert_eq!(defined_names(&compiled.body), vec!["s", "m", "g"]);
    assert_eq!(compiled.children.len(), 3);
}

#[test]
fn test_class_fields_get_initializers() {
    let compiled = compile_ok(vec![class_decl(
        "C",
        None,
        vec![
            field(PropertyKey::Identifier(Identifier::new("a")), false, Some(num(1.0))),
            field(PropertyKey::Computed(Box::new(ident("k"))), false, None),
            field(PropertyKey::Identifier(Identifier::new("b")), true, Some(num(2.0))),
        ],
    )]);
    assert!(compiled.body.contains(OpCode::SetFieldInitializer));
    // the computed key is evaluated once, at class definition
    assert!(compiled.body.contains(OpCode::ToPropertyKey));

    let flavors: Vec<_> = compiled.children.iter().map(|c| c.flavor).collect();
    assert_eq!(flavors, vec![FunctionFlavor::FieldInitializer, FunctionFlavor::FieldInitializer]);
    let instance = &compiled.children[0];
    assert_eq!(instance.body.count(OpCode::DefineField), 2);
    assert_eq!(compiled.children[1].body.count(OpCode::DefineField), 1);
}

#[test]
fn test_derived_constructor_initializes_this() {
    let constructor = func_of(
        FunctionKind::DerivedConstructor,
        &[],
        vec![expr_stmt(Expression::SuperCall(vec![])), expr_stmt(this())],
    );
    let compiled = compile_ok(vec![
        StatementKind::ClassDeclaration(class(Some("D"), Some(ident("B")), Some(constructor), vec![])).into(),
    ]);
    assert!(compiled.body.contains(OpCode::NewClass));
    let ctor = &compiled.children[0];
    assert_eq!(ctor.flavor, FunctionFlavor::DerivedConstructor);
    assert!(ctor.body.contains(OpCode::SuperCall));
    assert!(ctor.body.contains(OpCode::InitThis));
    assert!(ctor.body.contains(OpCode::CheckThisInitialized));
}

#[test]
fn test_super_call_outside_derived_constructor_raises() {
    let f = function_ok(&[], vec![expr_stmt(Expression::SuperCall(vec![]))]);
    assert_eq!(runtime_errors(&f.body), vec![RuntimeErrorKind::InvalidSuperCall]);
    assert!(!f.body.contains(OpCode::SuperCall));
}

// ============================================================================
// Expressions
// ============================================================================

#[test]
fn test_constants_are_deduplicated() {
    let compiled = compile_ok(vec![expr_stmt(call(
        ident("f"),
        vec![num(1.0), num(1.0), string("a"), string("a")],
    ))]);
    assert_eq!(compiled.body.constants.len(), 2);
}

#[test]
fn test_method_call_passes_receiver() {
    let f = function_ok(&["o"], vec![expr_stmt(method_call(ident("o"), "m", vec![num(1.0)]))]);
    assert!(f.body.contains(OpCode::LdField));
    assert!(f.body.contains(OpCode::Call));
    // the receiver is `o`, not undefined
    assert!(f.body.position(OpCode::LdUndef) > f.body.position(OpCode::Call));
}

#[test]
fn test_spread_call_builds_array() {
    let callee = Expression::Call(CallExpression {
        callee: Box::new(ident("g")),
        arguments: vec![Argument::Expression(num(1.0)), spread(ident("rest"))],
    });
    let f = function_ok(&["rest"], vec![expr_stmt(callee)]);
    assert!(f.body.contains(OpCode::CallSpread));
    assert!(f.body.contains(OpCode::ArraySpread));
}

#[test]
fn test_nested_expressions_keep_temp_stack_balanced() {
    let expr = conditional(
        or(ident("a"), and(ident("b"), ident("c"))),
        array(vec![object(vec![("k", binary(BinaryOperator::Multiply, ident("a"), num(2.0)))])]),
        index(member(ident("o"), "p"), binary(BinaryOperator::Add, ident("i"), num(1.0))),
    );
    let f = function_ok(&["a", "b", "c", "o", "i"], vec![return_(Some(expr))]);
    assert!(f.layout.total > f.layout.permanent);
}

#[test]
fn test_nesting_limit() {
    let config = EmitConfig {
        max_depth: 4,
        ..EmitConfig::default()
    };
    let body = vec![block(vec![block(vec![block(vec![block(vec![block(vec![])])])])])];
    let err = Compiler::new(config).compile(&program(body));
    assert_matches!(err, Err(EmitError::NestingTooDeep { limit: 4 }));
}

// ============================================================================
// Debugger support
// ============================================================================

#[test]
fn test_debugger_tracking_records_scopes() {
    let mut compiled = compile_with(
        vec![function_decl(
            "f",
            &[],
            vec![let_("x", num(1.0)), block(vec![let_("y", num(2.0)), debugger()])],
        )],
        EmitConfig::debugging(),
    );
    let f = compiled.children.remove(0);
    assert!(f.body.contains(OpCode::Debugger));
    assert!(f.body.scopes.len() >= 2);
    assert!(f.body.scopes.iter().all(|range| range.start <= range.end));
    assert!(
        f.body
            .scopes
            .iter()
            .any(|range| range.scope.variables.iter().any(|v| v.name == "y"))
    );
    // the debugger can observe every enclosing binding
    assert!(f.body.contains(OpCode::NewScopeSlots));
}

#[test]
fn test_statement_boundaries() {
    let f = function_ok(
        &[],
        vec![let_("x", num(1.0)), expr_stmt(call(ident("g"), vec![ident("x")]))],
    );
    assert_eq!(f.body.statements.len(), 2);

    let config = EmitConfig {
        statement_boundaries: false,
        ..EmitConfig::default()
    };
    let mut compiled = compile_with(vec![function_decl("f", &[], vec![let_("x", num(1.0))])], config);
    assert!(compiled.children.remove(0).body.statements.is_empty());
}
