//! Calling functions, natives, bound methods and classes

use std::rc::Rc;

use tracing::trace;

use super::{ensure_sufficient_stack, fail, Eval, Exec, Interpreter, Unwind};
use crate::environment::{self, Environment};
use crate::error::ErrorKind;
use crate::object::{Class, Function, Instance};
use crate::token::Span;
use crate::value::Value;

impl Interpreter {
    pub(crate) fn call_value(&mut self, callee: Value, args: Vec<Value>, span: Span) -> Eval {
        match callee {
            Value::Function(function) => self.call_function(&function, args, span),
            Value::Native(native) => {
                if let Some(arity) = native.arity {
                    if args.len() != arity {
                        return Err(fail(
                            ErrorKind::WrongArity {
                                name: native.name.to_string(),
                                expected: arity.to_string(),
                                got: args.len(),
                            },
                            span,
                        ));
                    }
                }
                trace!(native = native.name, args = args.len(), "call native");
                (native.func)(self, &args).map_err(|message| fail(ErrorKind::Runtime(message), span))
            }
            Value::BuiltinMethod(method) => {
                self.call_method(&method.receiver, &method.name, args, span)
            }
            Value::Class(class) => self.instantiate(&class, args, span),
            other => Err(fail(ErrorKind::NotCallable(other.type_name().to_string()), span)),
        }
    }

    pub(crate) fn call_function(&mut self, function: &Rc<Function>, args: Vec<Value>, span: Span) -> Eval {
        if self.call_depth >= self.config.max_call_depth {
            return Err(fail(ErrorKind::StackOverflow(self.config.max_call_depth), span));
        }

        self.call_depth += 1;
        let result = ensure_sufficient_stack(|| self.invoke_function(function, args, span));
        self.call_depth -= 1;
        result
    }

    fn invoke_function(&mut self, function: &Function, args: Vec<Value>, span: Span) -> Eval {
        let decl = &function.decl;
        let arity = decl.arity();
        let arity_ok = match decl.rest {
            Some(_) => args.len() >= arity,
            None => args.len() == arity,
        };
        if !arity_ok {
            let expected = match decl.rest {
                Some(_) => format!("at least {}", arity),
                None => arity.to_string(),
            };
            return Err(fail(
                ErrorKind::WrongArity {
                    name: decl.name.clone(),
                    expected,
                    got: args.len(),
                },
                span,
            ));
        }

        trace!(function = %decl.name, args = args.len(), depth = self.call_depth, "call");

        let env = Environment::child(&function.closure);
        {
            let mut scope = env.borrow_mut();
            let mut args = args.into_iter();
            for param in &decl.params {
                scope.define(param.as_str(), args.next().unwrap_or(Value::Nil));
            }
            if let Some(rest) = &decl.rest {
                scope.define(rest.as_str(), Value::list(args.collect()));
            }
        }

        let returned = match self.execute_block(&decl.body, env) {
            Ok(()) => Value::Nil,
            Err(Unwind::Return(value)) => value,
            Err(Unwind::Break) | Err(Unwind::Continue) => {
                return Err(fail(
                    ErrorKind::Internal("loop control escaped a function body".into()),
                    span,
                ))
            }
            Err(other) => return Err(other),
        };

        if function.is_initializer {
            // init always yields the instance, however it exits
            return environment::get_at(&function.closure, 0, "this").map_err(Unwind::from);
        }
        Ok(returned)
    }

    /// Construct an instance: fields first (superclass first), then `init`
    fn instantiate(&mut self, class: &Rc<Class>, args: Vec<Value>, span: Span) -> Eval {
        let instance = Value::Instance(Rc::new(Instance::new(Rc::clone(class))));
        self.init_fields(class, &instance)?;

        match class.find_method("init") {
            Some(init) => {
                let bound = Rc::new(init.bind(instance.clone()));
                self.call_function(&bound, args, span)?;
            }
            None if !args.is_empty() => {
                return Err(fail(
                    ErrorKind::WrongArity {
                        name: class.name.clone(),
                        expected: "0".to_string(),
                        got: args.len(),
                    },
                    span,
                ))
            }
            None => {}
        }
        Ok(instance)
    }

    fn init_fields(&mut self, class: &Rc<Class>, instance: &Value) -> Exec {
        if let Some(superclass) = &class.superclass {
            self.init_fields(superclass, instance)?;
        }
        if class.decl.fields.is_empty() {
            return Ok(());
        }

        let Value::Instance(object) = instance else {
            return Ok(());
        };
        let env = Environment::child(&class.method_env);
        env.borrow_mut().define("this", instance.clone());

        self.with_env(env, |this| {
            for field in &class.decl.fields {
                let value = match &field.initializer {
                    Some(init) => this.evaluate(init)?,
                    None => Value::Nil,
                };
                object.fields.borrow_mut().insert(field.name.clone(), value);
            }
            Ok(())
        })
    }
}
