//! Error types for Quill
//!
//! Provides structured error handling with source locations.

use crate::token::Span;
use std::fmt;
use thiserror::Error;

/// Error kinds in Quill
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    // Lexer errors
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),
    #[error("unterminated string")]
    UnterminatedString,
    #[error("unterminated block comment")]
    UnterminatedComment,
    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    // Parser errors
    #[error("expected {0}, got '{1}'")]
    ExpectedToken(String, String),
    #[error("expected expression, got '{0}'")]
    ExpectedExpression(String),
    #[error("invalid assignment target")]
    InvalidAssignmentTarget,
    #[error("try statement needs a catch or finally block")]
    BareTry,

    // Static (resolver) errors
    #[error("can't read local variable '{0}' in its own initializer")]
    SelfReferentialInitializer(String),
    #[error("variable '{0}' is already declared in this scope")]
    DuplicateDeclaration(String),
    #[error("return outside of function")]
    ReturnOutsideFunction,
    #[error("can't return a value from an initializer")]
    ReturnFromInitializer,
    #[error("break outside of loop")]
    BreakOutsideLoop,
    #[error("continue outside of loop")]
    ContinueOutsideLoop,
    #[error("can't use 'this' outside of a class")]
    ThisOutsideClass,
    #[error("can't use 'super' outside of a class")]
    SuperOutsideClass,
    #[error("can't use 'super' in a class with no superclass")]
    SuperWithoutSuperclass,
    #[error("can't use '{0}' in a static method")]
    InstanceKeywordInStatic(&'static str),
    #[error("a class can't inherit from itself ('{0}')")]
    SelfInheritance(String),

    // Runtime errors
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),
    #[error("undefined property '{0}'")]
    UndefinedProperty(String),
    #[error("type mismatch: expected {0}, got {1}")]
    TypeMismatch(String, String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("value of type {0} is not callable")]
    NotCallable(String),
    #[error("{name} expected {expected} arguments, got {got}")]
    WrongArity {
        name: String,
        expected: String,
        got: usize,
    },
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: String, len: usize },
    #[error("key not found: {0}")]
    KeyNotFound(String),
    #[error("superclass must be a class, got {0}")]
    SuperclassNotClass(String),
    #[error("bitwise operand must be finite, got {0}")]
    InvalidBitwiseOperand(String),
    #[error("assertion failed: {0}")]
    AssertionFailed(String),
    #[error("stack overflow (call depth exceeded {0})")]
    StackOverflow(usize),
    #[error("uncaught {0}")]
    Uncaught(String),
    #[error("internal error: {0}")]
    Internal(String),

    // Generic runtime error
    #[error("{0}")]
    Runtime(String),
}

impl ErrorKind {
    /// Short category name exposed to scripts as `error.kind`.
    pub fn category(&self) -> &'static str {
        match self {
            ErrorKind::UndefinedVariable(_) => "UndefinedVariable",
            ErrorKind::UndefinedProperty(_) => "UndefinedProperty",
            ErrorKind::TypeMismatch(..) => "TypeError",
            ErrorKind::DivisionByZero => "DivisionByZero",
            ErrorKind::NotCallable(_) => "TypeError",
            ErrorKind::WrongArity { .. } => "ArityError",
            ErrorKind::IndexOutOfRange { .. } => "IndexError",
            ErrorKind::KeyNotFound(_) => "KeyError",
            ErrorKind::InvalidBitwiseOperand(_) => "ValueError",
            ErrorKind::AssertionFailed(_) => "AssertionError",
            ErrorKind::StackOverflow(_) => "StackOverflow",
            _ => "Error",
        }
    }
}

/// A Quill error with location information
#[derive(Debug, Clone)]
pub struct QuillError {
    pub kind: ErrorKind,
    pub span: Option<Span>,
    pub source_line: Option<String>,
}

impl QuillError {
    pub fn new(kind: ErrorKind, span: Option<Span>) -> Self {
        Self {
            kind,
            span,
            source_line: None,
        }
    }

    pub fn at(kind: ErrorKind, span: Span) -> Self {
        Self::new(kind, Some(span))
    }

    /// Fill in the span if the error was raised without one.
    pub fn or_at(mut self, span: Span) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }

    pub fn line(&self) -> Option<usize> {
        self.span.map(|s| s.line)
    }

    pub fn with_source(mut self, source: &str) -> Self {
        if let Some(span) = &self.span {
            let lines: Vec<&str> = source.lines().collect();
            if span.line > 0 && span.line <= lines.len() {
                self.source_line = Some(lines[span.line - 1].to_string());
            }
        }
        self
    }
}

impl fmt::Display for QuillError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(span) = &self.span {
            write!(f, "[line {}:{}] Error: {}", span.line, span.column, self.kind)?;

            if let Some(ref line) = self.source_line {
                write!(f, "\n  | {}", line)?;
                write!(f, "\n  | {}^", " ".repeat(span.column.saturating_sub(1)))?;
            }
        } else {
            write!(f, "Error: {}", self.kind)?;
        }
        Ok(())
    }
}

impl std::error::Error for QuillError {}

impl From<ErrorKind> for QuillError {
    fn from(kind: ErrorKind) -> Self {
        QuillError::new(kind, None)
    }
}

/// Result type for Quill operations
pub type Result<T> = std::result::Result<T, QuillError>;
