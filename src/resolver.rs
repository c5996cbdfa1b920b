//! Static scope resolution
//!
//! Walks the AST once before execution, mirroring the scopes the
//! interpreter will create, and records for every local reference how many
//! scopes out its binding lives. Globals are never tracked: a reference
//! with no recorded distance is looked up dynamically.

use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use crate::ast::{Arg, ClassDecl, Expr, FieldDecl, FunctionDecl, NodeId, Program, Stmt};
use crate::error::{ErrorKind, QuillError, Result};
use crate::interpreter::Interpreter;
use crate::token::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionKind {
    None,
    Function,
    Method,
    Initializer,
    StaticMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassKind {
    None,
    Class,
    Subclass,
}

/// Resolve `program`, recording binding distances in `interpreter`.
///
/// The first static error aborts the pass.
#[tracing::instrument(level = "debug", skip_all, fields(statements = program.statements.len()))]
pub fn resolve(program: &Program, interpreter: &mut Interpreter) -> Result<()> {
    let interactive = interpreter.config().interactive;
    let mut resolver = Resolver::new(interpreter, interactive);
    resolver.resolve_stmts(&program.statements)?;
    debug!(locals = resolver.resolved, "resolution complete");
    Ok(())
}

struct Resolver<'a> {
    interpreter: &'a mut Interpreter,
    /// name -> defined? for each open local scope
    scopes: Vec<FxHashMap<String, bool>>,
    /// Names declared at top level by this program, for redeclaration warnings
    globals: FxHashMap<String, Span>,
    function: FunctionKind,
    class: ClassKind,
    /// Inside a static method or static field initializer
    in_static: bool,
    loop_depth: usize,
    interactive: bool,
    resolved: usize,
}

impl<'a> Resolver<'a> {
    fn new(interpreter: &'a mut Interpreter, interactive: bool) -> Self {
        Self {
            interpreter,
            scopes: Vec::new(),
            globals: FxHashMap::default(),
            function: FunctionKind::None,
            class: ClassKind::None,
            in_static: false,
            loop_depth: 0,
            interactive,
            resolved: 0,
        }
    }

    // ==================== Scopes ====================

    fn begin_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str, span: Span) -> Result<()> {
        match self.scopes.last_mut() {
            Some(scope) => {
                if scope.contains_key(name) {
                    return Err(QuillError::at(
                        ErrorKind::DuplicateDeclaration(name.to_string()),
                        span,
                    ));
                }
                scope.insert(name.to_string(), false);
            }
            None => {
                if let Some(previous) = self.globals.insert(name.to_string(), span) {
                    if !self.interactive {
                        warn!(global = name, first_line = previous.line, line = span.line, "global redeclared");
                    }
                }
            }
        }
        Ok(())
    }

    fn define(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), true);
        }
    }

    fn declare_and_define(&mut self, name: &str, span: Span) -> Result<()> {
        self.declare(name, span)?;
        self.define(name);
        Ok(())
    }

    fn resolve_local(&mut self, id: NodeId, name: &str) {
        for (distance, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(name) {
                trace!(variable = name, distance, "resolved local");
                self.interpreter.resolve(id, distance);
                self.resolved += 1;
                return;
            }
        }
        // Not found: global
    }

    // ==================== Statements ====================

    fn resolve_stmts(&mut self, stmts: &[Stmt]) -> Result<()> {
        for stmt in stmts {
            self.resolve_stmt(stmt)?;
        }
        Ok(())
    }

    fn resolve_block(&mut self, stmts: &[Stmt]) -> Result<()> {
        self.begin_scope();
        let result = self.resolve_stmts(stmts);
        self.end_scope();
        result
    }

    fn resolve_loop_body(&mut self, body: &Stmt) -> Result<()> {
        self.loop_depth += 1;
        let result = self.resolve_stmt(body);
        self.loop_depth -= 1;
        result
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Expr { expr } => self.resolve_expr(expr),

            Stmt::Print { expr, .. } => self.resolve_expr(expr),

            Stmt::Var {
                name,
                initializer,
                span,
            } => {
                self.declare(name, *span)?;
                if let Some(init) = initializer {
                    self.resolve_expr(init)?;
                }
                self.define(name);
                Ok(())
            }

            Stmt::Block { stmts, .. } => self.resolve_block(stmts),

            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch)?;
                }
                Ok(())
            }

            Stmt::While {
                condition, body, ..
            }
            | Stmt::DoWhile {
                condition, body, ..
            } => {
                self.resolve_expr(condition)?;
                self.resolve_loop_body(body)
            }

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
                ..
            } => {
                // The initializer gets a scope of its own so it never leaks
                self.begin_scope();
                let result = (|| {
                    if let Some(init) = initializer {
                        self.resolve_stmt(init)?;
                    }
                    if let Some(cond) = condition {
                        self.resolve_expr(cond)?;
                    }
                    if let Some(incr) = increment {
                        self.resolve_expr(incr)?;
                    }
                    self.resolve_loop_body(body)
                })();
                self.end_scope();
                result
            }

            Stmt::Foreach {
                var,
                iterable,
                body,
                span,
            } => {
                self.resolve_expr(iterable)?;
                self.begin_scope();
                let result = self
                    .declare_and_define(var, *span)
                    .and_then(|_| self.resolve_loop_body(body));
                self.end_scope();
                result
            }

            Stmt::Repeat { count, body, .. } => {
                self.resolve_expr(count)?;
                self.resolve_loop_body(body)
            }

            Stmt::Loop { body, .. } => self.resolve_loop_body(body),

            Stmt::Function { decl } => {
                self.declare_and_define(&decl.name, decl.span)?;
                self.resolve_function(decl, FunctionKind::Function)
            }

            Stmt::Class { decl } => self.resolve_class(decl),

            Stmt::Enum { name, span, .. } => {
                debug!(enum_name = %name, "enum declared");
                self.declare_and_define(name, *span)
            }

            Stmt::Return { value, span } => {
                if self.function == FunctionKind::None {
                    return Err(QuillError::at(ErrorKind::ReturnOutsideFunction, *span));
                }
                if let Some(value) = value {
                    if self.function == FunctionKind::Initializer {
                        return Err(QuillError::at(ErrorKind::ReturnFromInitializer, *span));
                    }
                    self.resolve_expr(value)?;
                }
                Ok(())
            }

            Stmt::Break { span } => {
                if self.loop_depth == 0 {
                    return Err(QuillError::at(ErrorKind::BreakOutsideLoop, *span));
                }
                Ok(())
            }

            Stmt::Continue { span } => {
                if self.loop_depth == 0 {
                    return Err(QuillError::at(ErrorKind::ContinueOutsideLoop, *span));
                }
                Ok(())
            }

            Stmt::Throw { value, .. } => self.resolve_expr(value),

            Stmt::Try {
                body,
                catch_var,
                catch_body,
                finally_body,
                span,
            } => {
                self.resolve_block(body)?;
                if let Some(catch_body) = catch_body {
                    self.begin_scope();
                    let result = match catch_var {
                        Some(var) => self.declare_and_define(var, *span),
                        None => Ok(()),
                    }
                    .and_then(|_| self.resolve_stmts(catch_body));
                    self.end_scope();
                    result?;
                }
                if let Some(finally_body) = finally_body {
                    self.resolve_block(finally_body)?;
                }
                Ok(())
            }

            Stmt::Assert { expr, .. } => self.resolve_expr(expr),
        }
    }

    fn resolve_function(&mut self, decl: &FunctionDecl, kind: FunctionKind) -> Result<()> {
        let enclosing_function = std::mem::replace(&mut self.function, kind);
        let enclosing_loops = std::mem::replace(&mut self.loop_depth, 0);

        self.begin_scope();
        let result = (|| {
            for param in decl.params.iter().chain(decl.rest.iter()) {
                self.declare_and_define(param, decl.span)?;
            }
            self.resolve_stmts(&decl.body)
        })();
        self.end_scope();

        self.function = enclosing_function;
        self.loop_depth = enclosing_loops;
        result
    }

    fn resolve_class(&mut self, decl: &ClassDecl) -> Result<()> {
        debug!(
            class = %decl.name,
            methods = decl.methods.len(),
            statics = decl.static_methods.len() + decl.static_fields.len(),
            "class declared"
        );

        let enclosing_class = self.class;
        let enclosing_static = std::mem::replace(&mut self.in_static, false);
        self.class = ClassKind::Class;

        let result = self.resolve_class_body(decl);

        self.class = enclosing_class;
        self.in_static = enclosing_static;
        result
    }

    fn resolve_class_body(&mut self, decl: &ClassDecl) -> Result<()> {
        self.declare_and_define(&decl.name, decl.span)?;

        if let Some(superclass) = &decl.superclass {
            if let Expr::Variable { name, span, .. } = superclass {
                if *name == decl.name {
                    return Err(QuillError::at(
                        ErrorKind::SelfInheritance(name.clone()),
                        *span,
                    ));
                }
            }
            self.class = ClassKind::Subclass;
            self.resolve_expr(superclass)?;
        }

        // Statics live in the declaring scope
        self.in_static = true;
        for field in &decl.static_fields {
            self.resolve_field(field)?;
        }
        for method in &decl.static_methods {
            self.resolve_function(method, FunctionKind::StaticMethod)?;
        }
        self.in_static = false;

        if decl.superclass.is_some() {
            self.begin_scope();
            self.define("super");
        }
        self.begin_scope();
        self.define("this");

        let result = (|| {
            for field in &decl.fields {
                self.resolve_field(field)?;
            }
            for method in &decl.methods {
                let kind = if method.name == "init" {
                    FunctionKind::Initializer
                } else {
                    FunctionKind::Method
                };
                self.resolve_function(method, kind)?;
            }
            Ok(())
        })();

        self.end_scope();
        if decl.superclass.is_some() {
            self.end_scope();
        }
        result
    }

    fn resolve_field(&mut self, field: &FieldDecl) -> Result<()> {
        match &field.initializer {
            Some(init) => self.resolve_expr(init),
            None => Ok(()),
        }
    }

    // ==================== Expressions ====================

    fn resolve_args(&mut self, args: &[Arg]) -> Result<()> {
        for arg in args {
            match arg {
                Arg::Plain(expr) | Arg::Spread(expr) => self.resolve_expr(expr)?,
            }
        }
        Ok(())
    }

    fn resolve_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Literal { .. } => Ok(()),

            Expr::Variable { name, id, span } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(name) == Some(&false) {
                        return Err(QuillError::at(
                            ErrorKind::SelfReferentialInitializer(name.clone()),
                            *span,
                        ));
                    }
                }
                self.resolve_local(*id, name);
                Ok(())
            }

            Expr::Assign { name, value, id, .. } => {
                self.resolve_expr(value)?;
                self.resolve_local(*id, name);
                Ok(())
            }

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)
            }

            Expr::Unary { operand, .. } => self.resolve_expr(operand),

            Expr::Ternary {
                condition,
                then_expr,
                else_expr,
                ..
            } => {
                self.resolve_expr(condition)?;
                self.resolve_expr(then_expr)?;
                self.resolve_expr(else_expr)
            }

            Expr::Grouping { expr, .. } => self.resolve_expr(expr),

            Expr::Call { callee, args, .. } => {
                self.resolve_expr(callee)?;
                self.resolve_args(args)
            }

            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(value)?;
                self.resolve_expr(object)
            }

            Expr::Index { object, index, .. } => {
                self.resolve_expr(object)?;
                self.resolve_expr(index)
            }

            Expr::Slice {
                object, start, end, ..
            } => {
                self.resolve_expr(object)?;
                if let Some(start) = start {
                    self.resolve_expr(start)?;
                }
                if let Some(end) = end {
                    self.resolve_expr(end)?;
                }
                Ok(())
            }

            Expr::IndexSet {
                object,
                index,
                value,
                ..
            } => {
                self.resolve_expr(object)?;
                self.resolve_expr(index)?;
                self.resolve_expr(value)
            }

            Expr::This { id, span } => {
                if self.class == ClassKind::None {
                    return Err(QuillError::at(ErrorKind::ThisOutsideClass, *span));
                }
                if self.in_static {
                    return Err(QuillError::at(ErrorKind::InstanceKeywordInStatic("this"), *span));
                }
                self.resolve_local(*id, "this");
                Ok(())
            }

            Expr::Super { id, span, .. } => {
                match self.class {
                    ClassKind::None => {
                        return Err(QuillError::at(ErrorKind::SuperOutsideClass, *span));
                    }
                    ClassKind::Class => {
                        return Err(QuillError::at(ErrorKind::SuperWithoutSuperclass, *span));
                    }
                    ClassKind::Subclass => {}
                }
                if self.in_static {
                    return Err(QuillError::at(ErrorKind::InstanceKeywordInStatic("super"), *span));
                }
                self.resolve_local(*id, "super");
                Ok(())
            }

            Expr::Lambda { decl, .. } => self.resolve_function(decl, FunctionKind::Function),

            Expr::List { items, .. } => self.resolve_args(items),

            Expr::Dict { entries, .. } => {
                for (key, value) in entries {
                    self.resolve_expr(key)?;
                    self.resolve_expr(value)?;
                }
                Ok(())
            }

            Expr::Range { start, end, .. } => {
                self.resolve_expr(start)?;
                self.resolve_expr(end)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn resolve_source(source: &str) -> Result<Interpreter> {
        let tokens = Lexer::new(source).tokenize()?;
        let program = Parser::new(tokens).with_source(source).parse()?;
        let mut interpreter = Interpreter::new();
        resolve(&program, &mut interpreter)?;
        Ok(interpreter)
    }

    fn resolve_err(source: &str) -> ErrorKind {
        match resolve_source(source) {
            Ok(_) => panic!("expected resolution to fail for: {}", source),
            Err(e) => e.kind,
        }
    }

    #[test]
    fn test_globals_are_not_recorded() {
        let interpreter = resolve_source("var x = 1; print x;").unwrap();
        assert_eq!(interpreter.resolution_count(), 0);
    }

    #[test]
    fn test_locals_are_recorded() {
        let interpreter = resolve_source("{ var x = 1; { print x; } }").unwrap();
        assert_eq!(interpreter.resolution_count(), 1);
    }

    #[test]
    fn test_self_referential_initializer() {
        assert!(matches!(
            resolve_err("{ var a = 1; { var a = a; } }"),
            ErrorKind::SelfReferentialInitializer(_)
        ));
    }

    #[test]
    fn test_duplicate_local() {
        assert!(matches!(
            resolve_err("{ var a = 1; var a = 2; }"),
            ErrorKind::DuplicateDeclaration(_)
        ));
        assert!(matches!(
            resolve_err("fun f(a, a) {}"),
            ErrorKind::DuplicateDeclaration(_)
        ));
        // top level redeclaration is fine
        assert!(resolve_source("var a = 1; var a = 2;").is_ok());
    }

    #[test]
    fn test_return_placement() {
        assert!(matches!(resolve_err("return 1;"), ErrorKind::ReturnOutsideFunction));
        assert!(matches!(
            resolve_err("class A { init() { return 1; } }"),
            ErrorKind::ReturnFromInitializer
        ));
        assert!(resolve_source("class A { init() { return; } }").is_ok());
    }

    #[test]
    fn test_loop_control_placement() {
        assert!(matches!(resolve_err("break;"), ErrorKind::BreakOutsideLoop));
        assert!(matches!(
            resolve_err("while (true) { fun f() { continue; } }"),
            ErrorKind::ContinueOutsideLoop
        ));
        assert!(resolve_source("while (true) { if (1) break; }").is_ok());
    }

    #[test]
    fn test_this_and_super_misuse() {
        assert!(matches!(resolve_err("print this;"), ErrorKind::ThisOutsideClass));
        assert!(matches!(resolve_err("fun f() { super.m(); }"), ErrorKind::SuperOutsideClass));
        assert!(matches!(
            resolve_err("class A { m() { super.m(); } }"),
            ErrorKind::SuperWithoutSuperclass
        ));
        assert!(matches!(
            resolve_err("class A { static make() { return this; } }"),
            ErrorKind::InstanceKeywordInStatic("this")
        ));
    }

    #[test]
    fn test_self_inheritance() {
        assert!(matches!(resolve_err("class A < A {}"), ErrorKind::SelfInheritance(_)));
    }

    #[test]
    fn test_error_carries_line() {
        let err = resolve_source("var ok = 1;\n{\n  var a = 1;\n  var a = 2;\n}").unwrap_err();
        assert_eq!(err.line(), Some(4));
    }
}
