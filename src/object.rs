//! Callable and object-model values: closures, natives, classes,
//! instances, enums and error objects.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::ast::{ClassDecl, FunctionDecl};
use crate::environment::{Env, Environment};
use crate::interpreter::Interpreter;
use crate::value::Value;

/// User-defined function paired with the environment it was declared in
#[derive(Debug)]
pub struct Function {
    pub decl: Rc<FunctionDecl>,
    pub closure: Env,
    pub is_initializer: bool,
}

impl Function {
    pub fn new(decl: Rc<FunctionDecl>, closure: Env, is_initializer: bool) -> Self {
        Self {
            decl,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.decl.name
    }

    /// Copy of this method whose closure has `this` bound to `instance`
    pub fn bind(&self, instance: Value) -> Function {
        let env = Environment::child(&self.closure);
        env.borrow_mut().define("this", instance);
        Function::new(Rc::clone(&self.decl), env, self.is_initializer)
    }
}

/// Native function signature
pub type NativeFnPtr = fn(&mut Interpreter, &[Value]) -> Result<Value, String>;

/// Native/built-in function
#[derive(Clone)]
pub struct NativeFn {
    pub name: &'static str,
    pub arity: Option<usize>, // None means variadic
    pub func: NativeFnPtr,
}

impl NativeFn {
    pub fn new(name: &'static str, arity: Option<usize>, func: NativeFnPtr) -> Self {
        Self { name, arity, func }
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

/// A built-in method looked up on a non-instance receiver, e.g. `xs.push`
#[derive(Debug)]
pub struct BuiltinMethod {
    pub receiver: Value,
    pub name: String,
}

#[derive(Debug)]
pub struct Class {
    pub name: String,
    pub decl: Rc<ClassDecl>,
    pub superclass: Option<Rc<Class>>,
    pub methods: FxHashMap<String, Rc<Function>>,
    /// Static fields and static methods, filled in at declaration time
    pub statics: Env,
    /// Environment instance field initializers are chained to
    pub method_env: Env,
}

impl Class {
    /// Method lookup through the inheritance chain
    pub fn find_method(&self, name: &str) -> Option<Rc<Function>> {
        match self.methods.get(name) {
            Some(method) => Some(Rc::clone(method)),
            None => self.superclass.as_ref().and_then(|s| s.find_method(name)),
        }
    }

    /// Static member lookup, falling back to superclass statics
    pub fn find_static(&self, name: &str) -> Option<Value> {
        match self.statics.borrow().get_local(name) {
            Some(value) => Some(value),
            None => self.superclass.as_ref().and_then(|s| s.find_static(name)),
        }
    }

    /// Class in the chain that owns the static `name`
    pub fn static_owner(self: &Rc<Self>, name: &str) -> Option<Rc<Class>> {
        if self.statics.borrow().contains_local(name) {
            return Some(Rc::clone(self));
        }
        self.superclass.as_ref().and_then(|s| s.static_owner(name))
    }
}

#[derive(Debug)]
pub struct Instance {
    pub class: Rc<Class>,
    pub fields: RefCell<FxHashMap<String, Value>>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: RefCell::new(FxHashMap::default()),
        }
    }
}

#[derive(Debug)]
pub struct EnumDef {
    pub name: String,
    pub variants: Vec<String>,
}

impl EnumDef {
    pub fn variant(self: &Rc<Self>, name: &str) -> Option<EnumValue> {
        self.variants
            .iter()
            .position(|v| v == name)
            .map(|ordinal| EnumValue {
                def: Rc::clone(self),
                ordinal,
            })
    }
}

#[derive(Debug, Clone)]
pub struct EnumValue {
    pub def: Rc<EnumDef>,
    pub ordinal: usize,
}

impl EnumValue {
    pub fn name(&self) -> &str {
        &self.def.variants[self.ordinal]
    }
}

/// Error value raised by `throw` or converted from a runtime error
#[derive(Debug)]
pub struct ErrorObject {
    pub kind: String,
    pub message: String,
    pub line: Option<usize>,
}

impl ErrorObject {
    pub fn new(kind: impl Into<String>, message: impl Into<String>, line: Option<usize>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            line,
        }
    }
}
