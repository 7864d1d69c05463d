use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use lodestar_emit::ast::build::*;
use lodestar_emit::ast::{BinaryOperator, Program, Statement, VariableKind};
use lodestar_emit::{EmitConfig, compile_program};

/// `n` functions, each summing an array inside try/finally.
fn wide_program(n: usize) -> Program {
    let body: Vec<Statement> = (0..n)
        .map(|i| {
            function_decl(
                &format!("f{i}"),
                &["items"],
                vec![
                    let_("total", num(0.0)),
                    for_of(
                        Some(VariableKind::Const),
                        pat("item"),
                        ident("items"),
                        block(vec![try_(
                            vec![expr_stmt(assign_name(
                                "total",
                                binary(BinaryOperator::Add, ident("total"), ident("item")),
                            ))],
                            None,
                            Some(vec![expr_stmt(call(ident("tick"), vec![]))]),
                        )]),
                    ),
                    return_(Some(ident("total"))),
                ],
            )
        })
        .collect();
    program(body)
}

/// Functions nested `depth` deep, each capturing its parent's binding.
fn deep_program(depth: usize) -> Program {
    let mut body = vec![return_(Some(ident("v0")))];
    for level in (0..depth).rev() {
        body = vec![
            let_(&format!("v{level}"), num(level as f64)),
            function_decl(&format!("g{level}"), &[], body),
        ];
    }
    program(body)
}

fn bench_wide(c: &mut Criterion) {
    let mut group = c.benchmark_group("wide");
    let config = EmitConfig::default();
    for n in [10, 100] {
        let program = wide_program(n);
        group.bench_with_input(BenchmarkId::new("functions", n), &program, |b, program| {
            b.iter(|| compile_program(black_box(program), &config).unwrap());
        });
    }
    group.finish();
}

fn bench_deep(c: &mut Criterion) {
    let config = EmitConfig::default();
    let program = deep_program(64);
    c.bench_function("deep_closures", |b| {
        b.iter(|| compile_program(black_box(&program), &config).unwrap());
    });
}

fn bench_debugging(c: &mut Criterion) {
    let config = EmitConfig::debugging();
    let program = wide_program(50);
    c.bench_function("wide_debugging", |b| {
        b.iter(|| compile_program(black_box(&program), &config).unwrap());
    });
}

criterion_group!(benches, bench_wide, bench_deep, bench_debugging);
criterion_main!(benches);
