//! Tree-walking interpreter for Quill
//!
//! Statements execute to `Result<(), Unwind>` and expressions evaluate to
//! `Result<Value, Unwind>`. Early exits (`return`, `break`, `continue`,
//! `throw`) and runtime errors all travel as [`Unwind`] through ordinary
//! `?` propagation; the construct that owns a signal consumes it.

mod access;
mod call;
mod expr;
mod methods;
mod natives;
mod stmt;

use std::io::Write;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::ast::{NodeId, Program, Stmt};
use crate::config::Config;
use crate::environment::{self, Env, Environment};
use crate::error::{ErrorKind, QuillError, Result};
use crate::object::ErrorObject;
use crate::token::Span;
use crate::value::Value;

/// Keep at least this much stack free before recursing further
const RED_ZONE: usize = 100 * 1024;

/// Stack space to allocate when growing
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Grow the native stack if deeply nested evaluation is about to exhaust it
#[inline]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

/// Non-local exit from statement execution or expression evaluation
#[derive(Debug)]
pub enum Unwind {
    Return(Value),
    Break,
    Continue,
    /// User-level `throw`, carrying the thrown value and where it was thrown
    Throw(Value, Span),
    Error(QuillError),
}

impl From<QuillError> for Unwind {
    fn from(err: QuillError) -> Self {
        Unwind::Error(err)
    }
}

pub(crate) type Exec = std::result::Result<(), Unwind>;
pub(crate) type Eval = std::result::Result<Value, Unwind>;

/// Build a runtime error signal located at `span`
pub(crate) fn fail(kind: ErrorKind, span: Span) -> Unwind {
    Unwind::Error(QuillError::at(kind, span))
}

/// Where `print` and echoed results go
#[derive(Debug)]
enum Output {
    Stdout,
    Captured(String),
}

/// The interpreter state
#[derive(Debug)]
pub struct Interpreter {
    globals: Env,
    environment: Env,
    /// Binding distance of every resolved local reference
    resolutions: FxHashMap<NodeId, usize>,
    config: Config,
    output: Output,
    call_depth: usize,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let globals = Environment::global();
        let mut interpreter = Self {
            environment: Rc::clone(&globals),
            globals,
            resolutions: FxHashMap::default(),
            config,
            output: Output::Stdout,
            call_depth: 0,
        };
        interpreter.define_natives();
        interpreter
    }

    /// Collect output in memory instead of writing to stdout
    pub fn capture_output(mut self) -> Self {
        self.output = Output::Captured(String::new());
        self
    }

    /// Drain captured output; empty when writing to stdout
    pub fn take_output(&mut self) -> String {
        match &mut self.output {
            Output::Captured(buffer) => std::mem::take(buffer),
            Output::Stdout => String::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Record the binding distance for a local reference
    pub fn resolve(&mut self, id: NodeId, distance: usize) {
        self.resolutions.insert(id, distance);
    }

    pub fn resolution_count(&self) -> usize {
        self.resolutions.len()
    }

    /// Execute a resolved program against the global environment.
    ///
    /// With `top_level`, bare expression statements print their value.
    pub fn interpret(&mut self, program: &Program, top_level: bool) -> Result<()> {
        debug!(statements = program.statements.len(), top_level, "interpret");
        self.call_depth = 0;
        self.environment = Rc::clone(&self.globals);

        for stmt in &program.statements {
            let outcome = match stmt {
                Stmt::Expr { expr } if top_level => self.evaluate(expr).map(|value| {
                    self.write_output(&format!("{}\n", value));
                }),
                _ => self.execute(stmt),
            };
            if let Err(unwind) = outcome {
                self.environment = Rc::clone(&self.globals);
                return Err(Self::escape(unwind));
            }
        }
        Ok(())
    }

    /// Turn a signal that escaped the program into a reportable error
    fn escape(unwind: Unwind) -> QuillError {
        match unwind {
            Unwind::Error(err) => err,
            Unwind::Throw(value, span) => {
                let message = match &value {
                    Value::Error(err) => err.message.clone(),
                    other => other.to_string(),
                };
                QuillError::at(ErrorKind::Uncaught(message), span)
            }
            Unwind::Return(_) => ErrorKind::Internal("return escaped its function".into()).into(),
            Unwind::Break | Unwind::Continue => {
                ErrorKind::Internal("loop control escaped its loop".into()).into()
            }
        }
    }

    pub(crate) fn write_output(&mut self, text: &str) {
        match &mut self.output {
            Output::Stdout => {
                let mut stdout = std::io::stdout().lock();
                // A closed stdout is not a script error
                let _ = stdout.write_all(text.as_bytes());
                let _ = stdout.flush();
            }
            Output::Captured(buffer) => buffer.push_str(text),
        }
    }

    // ==================== Scopes ====================

    /// Run `stmts` with `env` as the current scope, restoring the previous
    /// scope on every exit path
    pub(crate) fn execute_block(&mut self, stmts: &[Stmt], env: Env) -> Exec {
        self.with_env(env, |this| {
            for stmt in stmts {
                this.execute(stmt)?;
            }
            Ok(())
        })
    }

    pub(crate) fn with_env<T>(&mut self, env: Env, f: impl FnOnce(&mut Self) -> T) -> T {
        let previous = std::mem::replace(&mut self.environment, env);
        let result = f(self);
        self.environment = previous;
        result
    }

    pub(crate) fn child_env(&self) -> Env {
        Environment::child(&self.environment)
    }

    pub(crate) fn lookup_variable(&self, name: &str, id: NodeId, span: Span) -> Eval {
        let found = match self.resolutions.get(&id) {
            Some(&distance) => environment::get_at(&self.environment, distance, name),
            None => self.globals.borrow().get(name),
        };
        found.map_err(|e| Unwind::Error(e.or_at(span)))
    }

    pub(crate) fn assign_variable(&self, name: &str, id: NodeId, value: Value, span: Span) -> Exec {
        let assigned = match self.resolutions.get(&id) {
            Some(&distance) => environment::assign_at(&self.environment, distance, name, value),
            None => self.globals.borrow_mut().assign(name, value),
        };
        assigned.map_err(|e| Unwind::Error(e.or_at(span)))
    }

    pub(crate) fn distance(&self, id: NodeId) -> Option<usize> {
        self.resolutions.get(&id).copied()
    }

    /// Script-visible error value for a caught runtime error
    pub(crate) fn error_value(err: &QuillError) -> Value {
        Value::Error(Rc::new(ErrorObject::new(
            err.kind.category(),
            err.kind.to_string(),
            err.line(),
        )))
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::resolver;
    use pretty_assertions::assert_eq;

    fn run(source: &str, top_level: bool) -> Result<String> {
        let tokens = Lexer::new(source).tokenize()?;
        let program = Parser::new(tokens).with_source(source).parse()?;
        let mut interpreter = Interpreter::new().capture_output();
        resolver::resolve(&program, &mut interpreter)?;
        interpreter.interpret(&program, top_level)?;
        Ok(interpreter.take_output())
    }

    #[test]
    fn test_top_level_echoes_expressions() {
        assert_eq!(run("1 + 2; var x = 3; x;", true).unwrap(), "3\n3\n");
        assert_eq!(run("1 + 2;", false).unwrap(), "");
    }

    #[test]
    fn test_uncaught_throw_reports_message() {
        let err = run("var a = 1;\nthrow \"bad\";", false).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Uncaught(ref m) if m == "bad"));
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn test_scope_restored_after_error() {
        let source = "fun f() { var local = 1; undefined_name; }";
        let tokens = Lexer::new(source).tokenize().unwrap();
        let program = Parser::new(tokens).parse().unwrap();
        let mut interpreter = Interpreter::new().capture_output();
        resolver::resolve(&program, &mut interpreter).unwrap();
        interpreter.interpret(&program, false).unwrap();

        let call = Parser::new(Lexer::new("f();").tokenize().unwrap()).parse().unwrap();
        resolver::resolve(&call, &mut interpreter).unwrap();
        assert!(interpreter.interpret(&call, false).is_err());
        assert!(Rc::ptr_eq(&interpreter.environment, &interpreter.globals));
    }
}
