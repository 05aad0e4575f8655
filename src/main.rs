use std::process;
use std::sync::atomic::Ordering;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use perch::{eval_source, standard_scope, Context, Error, Scope};

fn repl(ctx: &Context, scope: &Scope) -> i32 {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("failed to start line editor: {err}");
            return 1;
        }
    };

    println!("perch {}", env!("CARGO_PKG_VERSION"));

    loop {
        match editor.readline("=> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(&line);
                match eval_source(ctx, scope, &line) {
                    Ok(value) => println!("{value}"),
                    Err(err) => eprintln!("error: {err}"),
                }
                // a Ctrl+C delivered mid-evaluation should not poison the
                // next line
                ctx.interrupt_flag().store(false, Ordering::SeqCst);
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => return 0,
            Err(err) => {
                eprintln!("readline: {err}");
                return 1;
            }
        }
    }
}

fn run_file(ctx: &Context, scope: &Scope, path: &str) -> i32 {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("failed to read {path}: {err}");
            return 1;
        }
    };

    match eval_source(ctx, scope, &source) {
        Ok(_) => 0,
        Err(err) => {
            eprintln!("error: {err}");
            for frame in ctx.trace().frames() {
                eprintln!("  in {frame}");
            }
            match err {
                Error::Reader { .. } => 2,
                Error::Cancelled => 130,
                _ => 1,
            }
        }
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  perch               Start interactive REPL");
    eprintln!("  perch <file.perch>  Run a script");
    eprintln!("  perch --help        Show this help message");
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let ctx = Context::new();
    let scope = match standard_scope(&ctx) {
        Ok(scope) => scope,
        Err(err) => {
            eprintln!("bootstrap failed: {err}");
            process::exit(1);
        }
    };

    let args: Vec<String> = std::env::args().collect();
    let code = match args.len() {
        1 => repl(&ctx, &scope),
        2 => {
            let arg = &args[1];
            if arg == "--help" || arg == "-h" {
                print_usage();
                0
            } else {
                run_file(&ctx, &scope, arg)
            }
        }
        _ => {
            eprintln!("error: too many arguments");
            print_usage();
            1
        }
    };

    // let background tasks drain before exiting
    ctx.runs().wait();
    process::exit(code);
}
