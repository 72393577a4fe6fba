//!
//! glossa CLI binary
//! -----------------
//! Interactive interpreter for the glossa question-to-SQL library. Loads a
//! demo automobile-sales lexicon through the source-fallback path and turns
//! typed questions into parameterized SQL. Also supports one-shot mode via
//! --query.

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use glossa::datetime::DucklingClient;
use glossa::demo;
use glossa::interpreter::{Interpreter, InterpreterOptions};
use glossa::lexicon::{Lexicon, LexiconSource};
use glossa::query::Query;

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--tenant <name>] [--duckling <url>]              # interactive interpreter\n  {program} --query \"<question>\" [--tenant <name>]           # one-shot\n  {program} -q \"<question>\"\n\nFlags:\n  --tenant <name>       Tenant whose lexicon to interpret against (default: demo)\n  --duckling <url>      Duckling time-recognition server (default: DUCKLING_SERVER env or http://localhost:8000)\n  -q, --query <text>    Interpret one question, print the SQL, and exit\n  -h, --help            Show this help\n\nInteractive commands:\n  rules                        list registered rules with their coordinates\n  disable <group> <index>      switch a rule off\n  enable <group> <index>       switch a rule back on\n  tokens <question>            show the token stream for a question\n  json <question>              print the interpreted query as JSON\n  help                         show this help\n  quit | exit                  leave the interpreter\n  <question>                   interpret and print SQL with its parameters\n\nExamples:\n  {program} --query \"car is Swift\"\n  {program}\n    glossa> show me the brands of cars\n    glossa> brand sales"
    );
}

/// Serves the built-in knowledge base to every tenant, standing in for the
/// directory service a deployment would fetch lexicons from.
struct DemoSource;

#[async_trait]
impl LexiconSource for DemoSource {
    async fn fetch(&self, tenant: &str) -> Result<Lexicon> {
        tracing::debug!(tenant = %tenant, "serving demo lexicon");
        Ok(demo::lexicon())
    }
}

fn print_compiled(query: &Query) {
    match query.to_sql() {
        Ok(compiled) => {
            println!("{}", compiled.query);
            for (i, p) in compiled.params.iter().enumerate() {
                println!("  ${} = {}", i + 1, p);
            }
        }
        Err(err) => eprintln!("cannot compile: {err}"),
    }
}

fn main() -> Result<()> {
    println!("glossa {} - natural-language questions to SQL", env!("CARGO_PKG_VERSION"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();

    let mut args: Vec<String> = env::args().collect();
    let program = args.remove(0);

    let mut tenant: String = "demo".to_string();
    let mut query: Option<String> = None;
    let mut duckling: Option<String> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--tenant" => {
                if i + 1 >= args.len() { eprintln!("--tenant requires a value"); print_usage(&program); std::process::exit(2); }
                tenant = args[i + 1].clone();
                i += 2; continue;
            }
            "--duckling" => {
                if i + 1 >= args.len() { eprintln!("--duckling requires a URL"); print_usage(&program); std::process::exit(2); }
                duckling = Some(args[i + 1].clone());
                i += 2; continue;
            }
            "--query" | "-q" => {
                if i + 1 >= args.len() { eprintln!("--query requires a value"); print_usage(&program); std::process::exit(2); }
                query = Some(args[i + 1].clone());
                i += 2; continue;
            }
            "-h" | "--help" => {
                print_usage(&program);
                return Ok(());
            }
            unk => {
                // Allow passing the question without a flag as a single arg
                if query.is_none() { query = Some(unk.to_string()); i += 1; continue; }
                eprintln!("Unrecognized argument: {}", unk);
                print_usage(&program);
                std::process::exit(2);
            }
        }
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    let recognizer = match duckling {
        Some(url) => Some(DucklingClient::new(url)?),
        None => match DucklingClient::from_env() {
            Ok(client) => Some(client),
            Err(err) => {
                eprintln!("time recognition unavailable: {err}");
                None
            }
        }
    };

    let interpreter = rt.block_on(async {
        Interpreter::start(InterpreterOptions {
            source: Some(Arc::new(DemoSource)),
            recognizer: recognizer.map(|c| Arc::new(c) as _),
            ..Default::default()
        })
    });

    // One-shot mode
    if let Some(question) = query {
        match rt.block_on(interpreter.interpret_text(&tenant, &question)) {
            Ok(q) => print_compiled(&q),
            Err(err) => {
                eprintln!("error: {err}");
                rt.block_on(interpreter.stop());
                std::process::exit(1);
            }
        }
        rt.block_on(interpreter.stop());
        return Ok(());
    }

    println!("glossa interpreter for tenant '{}'. Type 'help' for commands.", tenant);
    let mut rl = DefaultEditor::new().context("Failed to start line editor")?;
    loop {
        match rl.readline("glossa> ") {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() { continue; }
                let _ = rl.add_history_entry(line.as_str());
                let low = line.to_lowercase();
                if low == "exit" || low == "quit" { break; }
                if low == "help" { print_usage(&program); continue; }
                if low == "rules" {
                    for r in interpreter.rules() {
                        let state = if r.disabled { "off" } else { "on " };
                        println!("  {}.{} [{}] {:<24} {:<22} {:?}", r.group, r.index, state, r.name, r.group_tag, r.template);
                    }
                    continue;
                }
                if low.starts_with("disable ") || low.starts_with("enable ") {
                    let disabled = low.starts_with("disable ");
                    let parts: Vec<&str> = line.split_whitespace().collect();
                    let coords = (parts.get(1).and_then(|p| p.parse::<usize>().ok()), parts.get(2).and_then(|p| p.parse::<usize>().ok()));
                    match coords {
                        (Some(g), Some(ix)) => {
                            if interpreter.set_rule_disabled(g, ix, disabled) {
                                println!("rule {}.{} {}", g, ix, if disabled { "disabled" } else { "enabled" });
                            } else {
                                eprintln!("no rule at {}.{}", g, ix);
                            }
                        }
                        _ => eprintln!("usage: {} <group> <index>", if disabled { "disable" } else { "enable" }),
                    }
                    continue;
                }
                if let Some(question) = line.strip_prefix("tokens ") {
                    match rt.block_on(interpreter.tokenize(&tenant, question)) {
                        Ok(tokens) => {
                            for t in &tokens {
                                let mut kinds: Vec<&str> = Vec::new();
                                if !t.tables.is_empty() { kinds.push("table"); }
                                if !t.columns.is_empty() { kinds.push("column"); }
                                if !t.values.is_empty() { kinds.push("value"); }
                                if !t.operators.is_empty() { kinds.push("operator"); }
                                if !t.unknowns.is_empty() { kinds.push("unknown"); }
                                if !t.times.is_empty() { kinds.push("time"); }
                                println!("  {:>3}  {:<16} {}", t.pos, t.word, kinds.join(","));
                            }
                        }
                        Err(err) => eprintln!("error: {err}"),
                    }
                    continue;
                }
                if let Some(question) = line.strip_prefix("json ") {
                    match rt.block_on(interpreter.interpret_text(&tenant, question)) {
                        Ok(q) => match serde_json::to_string_pretty(&q) {
                            Ok(js) => println!("{js}"),
                            Err(err) => eprintln!("error: {err}"),
                        },
                        Err(err) => eprintln!("error: {err}"),
                    }
                    continue;
                }
                match rt.block_on(interpreter.interpret_text(&tenant, &line)) {
                    Ok(q) => print_compiled(&q),
                    Err(err) => eprintln!("error: {err}"),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("readline error: {err}");
                break;
            }
        }
    }

    rt.block_on(interpreter.stop());
    Ok(())
}
