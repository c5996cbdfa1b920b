//! Statement execution

use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::debug;

use super::{fail, Exec, Interpreter, Unwind};
use crate::ast::{ClassDecl, Stmt};
use crate::environment::Environment;
use crate::error::ErrorKind;
use crate::number;
use crate::object::{Class, EnumDef, Function};
use crate::token::Span;
use crate::value::Value;

/// What a loop should do after its body ran once
enum Flow {
    Next,
    Exit,
}

/// Consume `break`/`continue` aimed at the enclosing loop
fn loop_flow(result: Exec) -> Result<Flow, Unwind> {
    match result {
        Ok(()) | Err(Unwind::Continue) => Ok(Flow::Next),
        Err(Unwind::Break) => Ok(Flow::Exit),
        Err(other) => Err(other),
    }
}

impl Interpreter {
    pub(crate) fn execute(&mut self, stmt: &Stmt) -> Exec {
        match stmt {
            Stmt::Expr { expr } => {
                self.evaluate(expr)?;
                Ok(())
            }

            Stmt::Print { expr, newline, .. } => {
                let value = self.evaluate(expr)?;
                let text = if *newline {
                    format!("{}\n", value)
                } else {
                    value.to_string()
                };
                self.write_output(&text);
                Ok(())
            }

            Stmt::Var {
                name, initializer, ..
            } => {
                let value = match initializer {
                    Some(init) => self.evaluate(init)?,
                    None => Value::Nil,
                };
                self.environment.borrow_mut().define(name.as_str(), value);
                Ok(())
            }

            Stmt::Block { stmts, .. } => {
                let env = self.child_env();
                self.execute_block(stmts, env)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(())
                }
            }

            Stmt::While {
                condition, body, ..
            } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Exit = loop_flow(self.execute(body))? {
                        break;
                    }
                }
                Ok(())
            }

            Stmt::DoWhile {
                body, condition, ..
            } => {
                loop {
                    if let Flow::Exit = loop_flow(self.execute(body))? {
                        break;
                    }
                    if !self.evaluate(condition)?.is_truthy() {
                        break;
                    }
                }
                Ok(())
            }

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
                ..
            } => {
                let env = self.child_env();
                self.with_env(env, |this| {
                    if let Some(init) = initializer {
                        this.execute(init)?;
                    }
                    loop {
                        if let Some(cond) = condition {
                            if !this.evaluate(cond)?.is_truthy() {
                                break;
                            }
                        }
                        if let Flow::Exit = loop_flow(this.execute(body))? {
                            break;
                        }
                        // continue lands here too
                        if let Some(incr) = increment {
                            this.evaluate(incr)?;
                        }
                    }
                    Ok(())
                })
            }

            Stmt::Foreach {
                var,
                iterable,
                body,
                span,
            } => {
                let target = self.evaluate(iterable)?;
                let mut cursor = self.cursor(target, *span)?;
                while let Some(item) = self.cursor_next(&mut cursor, *span)? {
                    let env = self.child_env();
                    env.borrow_mut().define(var.as_str(), item);
                    let result = self.with_env(env, |this| this.execute(body));
                    if let Flow::Exit = loop_flow(result)? {
                        break;
                    }
                }
                Ok(())
            }

            Stmt::Repeat { count, body, span } => {
                let value = self.evaluate(count)?;
                let times = Self::int_arg(&value, "integer count", *span)?;
                for _ in 0..times.max(0) {
                    if let Flow::Exit = loop_flow(self.execute(body))? {
                        break;
                    }
                }
                Ok(())
            }

            Stmt::Loop { body, .. } => loop {
                if let Flow::Exit = loop_flow(self.execute(body))? {
                    return Ok(());
                }
            },

            Stmt::Function { decl } => {
                let function = Function::new(Rc::clone(decl), Rc::clone(&self.environment), false);
                self.environment
                    .borrow_mut()
                    .define(decl.name.as_str(), Value::Function(Rc::new(function)));
                Ok(())
            }

            Stmt::Class { decl } => self.declare_class(decl),

            Stmt::Enum { name, variants, .. } => {
                debug!(enum_name = %name, variants = variants.len(), "enum defined");
                let def = EnumDef {
                    name: name.clone(),
                    variants: variants.clone(),
                };
                self.environment
                    .borrow_mut()
                    .define(name.as_str(), Value::Enum(Rc::new(def)));
                Ok(())
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                Err(Unwind::Return(value))
            }

            Stmt::Break { .. } => Err(Unwind::Break),

            Stmt::Continue { .. } => Err(Unwind::Continue),

            Stmt::Throw { value, span } => {
                let value = self.evaluate(value)?;
                let thrown = match value {
                    Value::Error(_) => value,
                    other => Value::error("Error", other.to_string(), Some(span.line)),
                };
                Err(Unwind::Throw(thrown, *span))
            }

            Stmt::Try {
                body,
                catch_var,
                catch_body,
                finally_body,
                ..
            } => self.execute_try(body, catch_var.as_deref(), catch_body.as_deref(), finally_body.as_deref()),

            Stmt::Assert { expr, source, span } => {
                if self.evaluate(expr)?.is_truthy() {
                    Ok(())
                } else {
                    Err(fail(ErrorKind::AssertionFailed(source.clone()), *span))
                }
            }
        }
    }

    fn execute_try(
        &mut self,
        body: &[Stmt],
        catch_var: Option<&str>,
        catch_body: Option<&[Stmt]>,
        finally_body: Option<&[Stmt]>,
    ) -> Exec {
        let env = self.child_env();
        let mut outcome = self.execute_block(body, env);

        if let Some(handler) = catch_body {
            let caught = match &outcome {
                Err(Unwind::Throw(value, _)) => Some(value.clone()),
                Err(Unwind::Error(err)) => Some(Self::error_value(err)),
                _ => None,
            };
            if let Some(value) = caught {
                let env = self.child_env();
                if let Some(name) = catch_var {
                    env.borrow_mut().define(name, value);
                }
                outcome = self.execute_block(handler, env);
            }
        }

        if let Some(finally_body) = finally_body {
            let env = self.child_env();
            // A signal raised by finally replaces whatever was in flight
            self.execute_block(finally_body, env)?;
        }

        outcome
    }

    fn declare_class(&mut self, decl: &Rc<ClassDecl>) -> Exec {
        let superclass = match &decl.superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                other => {
                    return Err(fail(
                        ErrorKind::SuperclassNotClass(other.type_name().to_string()),
                        expr.span(),
                    ))
                }
            },
            None => None,
        };

        self.environment
            .borrow_mut()
            .define(decl.name.as_str(), Value::Nil);

        let declaring_env = Rc::clone(&self.environment);
        let method_env = match &superclass {
            Some(sup) => {
                let env = Environment::child(&declaring_env);
                env.borrow_mut().define("super", Value::Class(Rc::clone(sup)));
                env
            }
            None => Rc::clone(&declaring_env),
        };

        let methods: FxHashMap<String, Rc<Function>> = decl
            .methods
            .iter()
            .map(|method| {
                let function = Function::new(
                    Rc::clone(method),
                    Rc::clone(&method_env),
                    method.name == "init",
                );
                (method.name.clone(), Rc::new(function))
            })
            .collect();

        let statics = Environment::global();
        let class = Rc::new(Class {
            name: decl.name.clone(),
            decl: Rc::clone(decl),
            superclass,
            methods,
            statics: Rc::clone(&statics),
            method_env,
        });
        self.environment
            .borrow_mut()
            .define(decl.name.as_str(), Value::Class(Rc::clone(&class)));

        for method in &decl.static_methods {
            let function = Function::new(Rc::clone(method), Rc::clone(&declaring_env), false);
            statics
                .borrow_mut()
                .define(method.name.as_str(), Value::Function(Rc::new(function)));
        }
        // Static fields are evaluated once, in declaration order, and may
        // refer to the class and its static methods
        for field in &decl.static_fields {
            let value = match &field.initializer {
                Some(init) => self.evaluate(init)?,
                None => Value::Nil,
            };
            statics.borrow_mut().define(field.name.as_str(), value);
        }

        debug!(
            class = %decl.name,
            superclass = ?class.superclass.as_ref().map(|s| s.name.as_str()),
            methods = class.methods.len(),
            "class defined"
        );
        Ok(())
    }

    /// Check a value used as a loop count or index
    pub(crate) fn int_arg(value: &Value, what: &str, span: Span) -> Result<i64, Unwind> {
        number::to_index(value).ok_or_else(|| {
            fail(
                ErrorKind::TypeMismatch(what.to_string(), value.type_name().to_string()),
                span,
            )
        })
    }
}
