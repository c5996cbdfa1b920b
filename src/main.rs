//! Quill CLI and REPL
//!
//! Usage:
//!   quill run <file.ql>   - Execute a Quill file
//!   quill repl            - Start interactive REPL
//!   quill help            - Show help message
//!
//! Set `QUILL_LOG` (e.g. `QUILL_LOG=quill=debug`) to enable tracing output.

use std::env;
use std::fs;
use std::process;

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use quill::{Config, Interpreter, VERSION};

fn main() {
    init_tracing();

    let mut args: Vec<String> = env::args().skip(1).collect();
    let max_depth = match take_max_depth(&mut args) {
        Ok(depth) => depth,
        Err(message) => {
            eprintln!("{}: {}", "error".red(), message);
            process::exit(2);
        }
    };

    let Some(command) = args.first() else {
        print_help();
        return;
    };

    match command.as_str() {
        "run" => {
            let Some(path) = args.get(1) else {
                eprintln!("{}: missing file argument", "error".red());
                eprintln!("Usage: quill run <file.ql>");
                process::exit(1);
            };
            run_file(path, with_depth(Config::new(), max_depth));
        }
        "repl" => run_repl(with_depth(Config::repl(), max_depth)),
        "help" | "--help" | "-h" => print_help(),
        "version" | "--version" | "-v" => println!("Quill {}", VERSION),
        path if path.ends_with(".ql") => run_file(path, with_depth(Config::new(), max_depth)),
        other => {
            eprintln!("{}: unknown command '{}'", "error".red(), other);
            print_help();
            process::exit(1);
        }
    }
}

fn init_tracing() {
    if let Ok(filter) = env::var("QUILL_LOG") {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(filter))
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Pull `--max-depth N` out of the argument list
fn take_max_depth(args: &mut Vec<String>) -> Result<Option<usize>, String> {
    let Some(pos) = args.iter().position(|a| a == "--max-depth") else {
        return Ok(None);
    };
    let value = args
        .get(pos + 1)
        .ok_or_else(|| "--max-depth needs a value".to_string())?;
    let depth = value
        .parse::<usize>()
        .map_err(|_| format!("invalid --max-depth '{}'", value))?;
    args.drain(pos..pos + 2);
    Ok(Some(depth))
}

fn with_depth(config: Config, depth: Option<usize>) -> Config {
    match depth {
        Some(depth) => config.max_call_depth(depth),
        None => config,
    }
}

fn print_help() {
    println!("{}", "Quill".cyan().bold());
    println!("A small dynamically typed scripting language");
    println!("{} {}\n", "Version".cyan(), VERSION);
    println!("{}", "USAGE:".yellow());
    println!("  quill run <file.ql>      Execute a Quill file");
    println!("  quill repl               Start interactive REPL");
    println!("  quill help               Show this help message");
    println!("  quill version            Show version\n");
    println!("{}", "OPTIONS:".yellow());
    println!("  --max-depth <N>          Maximum call depth (default {})\n", quill::config::DEFAULT_MAX_CALL_DEPTH);
    println!("{}", "LANGUAGE FEATURES:".yellow());
    println!("  var x = 10;                      Variable");
    println!("  fun add(a, b) {{ return a + b; }}  Function definition");
    println!("  class B < A {{ init() {{ super.init(); }} }}");
    println!("  try {{ throw \"x\"; }} catch (e) {{ print e.message; }}");
    println!("  foreach (i in 0..10) print i;    Ranges and foreach");
}

fn run_file(path: &str, config: Config) {
    let source = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("{}: cannot read file '{}': {}", "error".red(), path, e);
            process::exit(1);
        }
    };

    let mut interpreter = Interpreter::with_config(config);
    let result = quill::compile(&source, &mut interpreter)
        .and_then(|program| interpreter.interpret(&program, false));

    if let Err(e) = result {
        eprintln!("{}", e.with_source(&source));
        process::exit(1);
    }
}

fn run_repl(config: Config) {
    println!("{} {} - {}",
        "Quill".cyan().bold(),
        VERSION.cyan(),
        "a small scripting language".dimmed()
    );
    println!("Type {} to exit, {} for help\n",
        "exit".yellow(),
        "help".yellow()
    );

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("{}: failed to start REPL: {}", "error".red(), e);
            process::exit(1);
        }
    };

    // Globals persist across lines
    let mut interpreter = Interpreter::with_config(config.clone());

    loop {
        match rl.readline(&format!("{} ", "quill>".green().bold())) {
            Ok(line) => {
                let line = line.trim();

                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match line {
                    "exit" | "quit" => {
                        println!("{}", "Goodbye!".cyan());
                        break;
                    }
                    "help" => {
                        print_repl_help();
                        continue;
                    }
                    "clear" => {
                        interpreter = Interpreter::with_config(config.clone());
                        println!("{}", "State cleared.".dimmed());
                        continue;
                    }
                    _ => {}
                }

                let result = quill::compile(line, &mut interpreter)
                    .and_then(|program| interpreter.interpret(&program, config.echo_expressions));
                if let Err(e) = result {
                    let err = e.with_source(line);
                    eprintln!("{}", format!("{}", err).red());
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "^C".dimmed());
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "Goodbye!".cyan());
                break;
            }
            Err(err) => {
                eprintln!("{}: {:?}", "error".red(), err);
                break;
            }
        }
    }
}

fn print_repl_help() {
    println!("{}", "REPL Commands:".yellow());
    println!("  exit, quit   Exit the REPL");
    println!("  clear        Forget all definitions");
    println!("  help         Show this help\n");
    println!("{}", "Language Examples:".yellow());
    println!("  var x = 10;");
    println!("  x * 2;");
    println!("  fun double(n) {{ return n * 2; }}");
    println!("  [1, 2, 3].map(double)");
}
