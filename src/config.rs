//! Interpreter configuration
//!
//! Everything that would otherwise be process-wide state lives here and is
//! handed to the interpreter at construction.

/// Default ceiling on nested calls before `StackOverflow` is raised
pub const DEFAULT_MAX_CALL_DEPTH: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Running under the REPL: top-level redeclarations are expected
    pub interactive: bool,
    pub max_call_depth: usize,
    /// Print the value of bare expression statements at top level
    pub echo_expressions: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interactive: false,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            echo_expressions: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// REPL defaults: interactive and echoing expression results
    pub fn repl() -> Self {
        Self::default().interactive(true).echo_expressions(true)
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn echo_expressions(mut self, echo: bool) -> Self {
        self.echo_expressions = echo;
        self
    }
}
