//! Quill - a small dynamically typed scripting language
//!
//! Source is lexed, parsed, run through a static resolver that records the
//! binding distance of every local reference, then executed by a
//! tree-walking interpreter over a chain of environments.

pub mod token;
pub mod lexer;
pub mod parser;
pub mod ast;
pub mod value;
pub mod number;
pub mod collections;
pub mod object;
pub mod environment;
pub mod config;
pub mod error;
pub mod resolver;
pub mod interpreter;

pub use config::Config;
pub use error::{ErrorKind, QuillError, Result};
pub use interpreter::Interpreter;
pub use lexer::Lexer;
pub use parser::Parser;
pub use value::Value;

/// Lex, parse and resolve `source` without running it
pub fn compile(source: &str, interpreter: &mut Interpreter) -> Result<ast::Program> {
    let tokens = Lexer::new(source).tokenize()?;
    let program = Parser::new(tokens).with_source(source).parse()?;
    resolver::resolve(&program, interpreter)?;
    Ok(program)
}

/// Convenience function to run Quill code, returning everything it printed
pub fn run(source: &str) -> Result<String> {
    let mut interpreter = Interpreter::new().capture_output();
    compile(source, &mut interpreter)
        .and_then(|program| interpreter.interpret(&program, false))
        .map_err(|e| e.with_source(source))?;
    Ok(interpreter.take_output())
}

/// Version of the Quill language
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
