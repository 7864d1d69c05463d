// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! lodestar - lowers a JSON syntax tree to register bytecode
//!
//! Reads a program document, compiles it and prints the disassembly of every
//! function, depth-first.
//!
//! ## Configuration
//!
//! Options come from, in order of precedence:
//! - command line flags
//! - the file given with `--config`
//! - `<config dir>/lodestar/config.toml`, when present
//! - built-in defaults

use clap::Parser;
use lodestar_emit::ast::Program;
use lodestar_emit::bytecode::disasm;
use lodestar_emit::{CompiledFunction, Compiler, EmitConfig, EmitError};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "lodestar")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Syntax tree document (JSON)
    input: PathBuf,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit debugger scope records
    #[arg(long)]
    debugger: bool,

    /// Compile everything as strict code
    #[arg(long)]
    strict: bool,

    /// Print the listing without colors
    #[arg(long)]
    no_color: bool,

    /// Print one line per function instead of the full listing
    #[arg(short, long)]
    summary: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::new("lodestar_emit=debug,lodestar=debug")
    } else {
        tracing_subscriber::EnvFilter::from_default_env()
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<(), EmitError> {
    let mut config = load_config(cli.config.as_deref()).await?;
    config.debugger_tracking |= cli.debugger;
    config.strict |= cli.strict;

    let document = tokio::fs::read_to_string(&cli.input).await?;
    let program = Program::from_json(&document)?;
    let compiled = Compiler::new(config).compile(&program)?;

    if cli.summary {
        print_summary(&compiled);
    } else if cli.no_color {
        for (path, function) in walk(&compiled) {
            println!("function {} {}", path, display_name(function));
            println!("{}", disasm::disassemble(&function.body));
        }
    } else {
        for (path, function) in walk(&compiled) {
            print_function(&path, function);
        }
    }
    Ok(())
}

/// The explicit file, else the per-user file, else defaults.
async fn load_config(explicit: Option<&Path>) -> Result<EmitConfig, EmitError> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => dirs::config_dir()
            .map(|dir| dir.join("lodestar").join("config.toml"))
            .filter(|path| path.is_file()),
    };
    match path {
        Some(path) => {
            debug!(path = %path.display(), "loading configuration");
            let source = tokio::fs::read_to_string(&path).await?;
            EmitConfig::from_toml_str(&source)
        }
        None => Ok(EmitConfig::default()),
    }
}

/// Every function with its child-index path, depth-first.
fn walk(root: &CompiledFunction) -> Vec<(String, &CompiledFunction)> {
    let mut out = Vec::new();
    let mut stack = vec![("0".to_string(), root)];
    while let Some((path, function)) = stack.pop() {
        for (index, child) in function.children.iter().enumerate().rev() {
            stack.push((format!("{}.{}", path, index), child));
        }
        out.push((path, function));
    }
    out
}

fn display_name(function: &CompiledFunction) -> String {
    let mut name = function.name.clone().unwrap_or_else(|| "<anonymous>".to_string());
    if function.is_async {
        name.insert_str(0, "async ");
    }
    if function.is_generator {
        name.push('*');
    }
    name
}

fn print_function(path: &str, function: &CompiledFunction) {
    println!(
        "{} {} {}",
        "function".white().bold(),
        path.dimmed(),
        display_name(function).bright_cyan().bold()
    );
    println!(
        "  {:?}, {} params, {} registers ({} permanent){}",
        function.flavor,
        function.param_count,
        function.layout.total,
        function.layout.permanent,
        if function.strict { ", strict" } else { "" }
    );

    for line in disasm::lines(&function.body) {
        for label in &line.labels {
            println!("{}:", label.yellow());
        }
        println!(
            "  {:>5}  {:12} {}",
            line.offset.dimmed(),
            line.mnemonic.green(),
            line.operands.join(", ")
        );
    }

    if !function.body.constants.is_empty() {
        println!("  {}", "constants:".white().bold());
        for (index, constant) in function.body.constants.iter().enumerate() {
            println!("    {} {}", format!("k{}", index).dimmed(), constant);
        }
    }
    for info in &function.scope_info {
        let slots: Vec<String> = info.slots.iter().map(|(name, slot)| format!("{}@{}", name, slot)).collect();
        println!(
            "  {} {:?}{}{} [{}]",
            "scope".white().bold(),
            info.kind,
            info.register.map(|r| format!(" in {}", r)).unwrap_or_default(),
            if info.dynamic { " dynamic" } else { "" },
            slots.join(", ")
        );
    }
    println!();
}

fn print_summary(root: &CompiledFunction) {
    for (path, function) in walk(root) {
        println!(
            "{:12} {:24} {:>6} instructions {:>4} registers {:>3} children",
            path.dimmed(),
            display_name(function).bright_cyan(),
            function.body.instructions.len(),
            function.layout.total,
            function.children.len()
        );
    }
    println!("{} functions", root.function_count().to_string().yellow());
}
