//! Runtime value types for Quill
//!
//! Collections, closures and objects are reference types: cloning a
//! `Value` clones the handle, so two bindings can alias the same list and
//! see each other's in-place mutations.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;

use crate::collections::{BigRange, Dict, IterState, Range, Set};
use crate::number;
use crate::object::{
    BuiltinMethod, Class, EnumDef, EnumValue, ErrorObject, Function, Instance, NativeFn,
};

/// Nesting limit when displaying collections that may contain themselves
const MAX_DISPLAY_DEPTH: usize = 32;

/// Runtime values in Quill
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    BigInt(Rc<BigInt>),
    BigFloat(Rc<BigDecimal>),
    Str(Rc<str>),

    List(Rc<RefCell<Vec<Value>>>),
    Dict(Rc<RefCell<Dict>>),
    Set(Rc<RefCell<Set>>),
    /// Mutable byte buffer
    Buffer(Rc<RefCell<Vec<u8>>>),
    /// Lazy integer range
    Range(Range),
    BigRange(Rc<BigRange>),

    /// User-defined function or bound method
    Function(Rc<Function>),
    /// Built-in function
    Native(NativeFn),
    /// Built-in method already attached to its receiver
    BuiltinMethod(Rc<BuiltinMethod>),

    Class(Rc<Class>),
    Instance(Rc<Instance>),
    Enum(Rc<EnumDef>),
    EnumValue(EnumValue),
    Error(Rc<ErrorObject>),
    Iterator(Rc<RefCell<IterState>>),
}

impl Value {
    pub fn str(s: impl Into<Rc<str>>) -> Value {
        Value::Str(s.into())
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn dict(dict: Dict) -> Value {
        Value::Dict(Rc::new(RefCell::new(dict)))
    }

    pub fn set(set: Set) -> Value {
        Value::Set(Rc::new(RefCell::new(set)))
    }

    pub fn buffer(bytes: Vec<u8>) -> Value {
        Value::Buffer(Rc::new(RefCell::new(bytes)))
    }

    pub fn big_int(n: BigInt) -> Value {
        Value::BigInt(Rc::new(n))
    }

    /// Element count as an int, widening to bigint past `i64::MAX`
    pub fn count(n: usize) -> Value {
        i64::try_from(n).map_or_else(|_| Value::big_int(BigInt::from(n)), Value::Int)
    }

    pub fn big_float(d: BigDecimal) -> Value {
        Value::BigFloat(Rc::new(d))
    }

    pub fn error(kind: &str, message: impl Into<String>, line: Option<usize>) -> Value {
        Value::Error(Rc::new(ErrorObject::new(kind, message, line)))
    }

    pub fn iterator(state: IterState) -> Value {
        Value::Iterator(Rc::new(RefCell::new(state)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float(_) => "float",
            Value::BigInt(_) => "bigint",
            Value::BigFloat(_) => "bigfloat",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Set(_) => "set",
            Value::Buffer(_) => "buffer",
            Value::Range(_) => "range",
            Value::BigRange(_) => "bigrange",
            Value::Function(_) => "function",
            Value::Native(_) => "native function",
            Value::BuiltinMethod(_) => "method",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
            Value::Enum(_) => "enum",
            Value::EnumValue(_) => "enum value",
            Value::Error(_) => "error",
            Value::Iterator(_) => "iterator",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(_) | Value::UInt(_) | Value::Float(_) | Value::BigInt(_) | Value::BigFloat(_) => {
                !number::is_zero(self)
            }
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Dict(dict) => !dict.borrow().is_empty(),
            Value::Set(set) => !set.borrow().is_empty(),
            Value::Buffer(bytes) => !bytes.borrow().is_empty(),
            _ => true,
        }
    }

    /// Quoted form used for strings nested inside collections
    pub fn repr(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = write_value(&mut out, self, 0, true);
        out
    }
}

fn format_float(f: f64) -> String {
    let mut text = f.to_string();
    if f.is_finite() && !text.contains('.') {
        text.push_str(".0");
    }
    text
}

fn write_value(out: &mut impl fmt::Write, value: &Value, depth: usize, quoted: bool) -> fmt::Result {
    if depth > MAX_DISPLAY_DEPTH {
        return out.write_str("...");
    }

    let write_seq = |out: &mut dyn fmt::Write, items: &[Value]| -> fmt::Result {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.write_str(", ")?;
            }
            let mut text = String::new();
            write_value(&mut text, item, depth + 1, true)?;
            out.write_str(&text)?;
        }
        Ok(())
    };

    match value {
        Value::Nil => out.write_str("nil"),
        Value::Bool(b) => write!(out, "{}", b),
        Value::Int(n) => write!(out, "{}", n),
        Value::UInt(n) => write!(out, "{}", n),
        Value::Float(f) => out.write_str(&format_float(*f)),
        Value::BigInt(b) => write!(out, "{}", b),
        Value::BigFloat(d) => write!(out, "{}", d),
        Value::Str(s) if quoted => write!(out, "{:?}", s),
        Value::Str(s) => out.write_str(s),
        Value::List(items) => {
            out.write_str("[")?;
            write_seq(out, &items.borrow())?;
            out.write_str("]")
        }
        Value::Dict(dict) => {
            out.write_str("{")?;
            for (i, (key, value)) in dict.borrow().entries().iter().enumerate() {
                if i > 0 {
                    out.write_str(", ")?;
                }
                write_value(out, key, depth + 1, true)?;
                out.write_str(": ")?;
                write_value(out, value, depth + 1, true)?;
            }
            out.write_str("}")
        }
        Value::Set(set) => {
            out.write_str("set(")?;
            write_seq(out, set.borrow().items())?;
            out.write_str(")")
        }
        Value::Buffer(bytes) => {
            let bytes: Vec<String> = bytes.borrow().iter().map(|b| b.to_string()).collect();
            write!(out, "buffer({})", bytes.join(", "))
        }
        Value::Range(r) if r.step == 1 => write!(out, "{}..{}", r.start, r.end),
        Value::Range(r) => write!(out, "range({}, {}, {})", r.start, r.end, r.step),
        Value::BigRange(r) => write!(out, "bigrange({}, {}, {})", r.start, r.end, r.step),
        Value::Function(func) => write!(out, "<fn {}>", func.name()),
        Value::Native(native) => write!(out, "<native fn {}>", native.name),
        Value::BuiltinMethod(method) => write!(
            out,
            "<method {}.{}>",
            method.receiver.type_name(),
            method.name
        ),
        Value::Class(class) => write!(out, "<class {}>", class.name),
        Value::Instance(instance) => write!(out, "<{} instance>", instance.class.name),
        Value::Enum(def) => write!(out, "<enum {}>", def.name),
        Value::EnumValue(e) => write!(out, "{}.{}", e.def.name, e.name()),
        Value::Error(e) if quoted => write!(out, "Error: {}", e.message),
        Value::Error(e) => out.write_str(&e.message),
        Value::Iterator(_) => out.write_str("<iterator>"),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self, 0, false)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.type_name(), self.repr())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        values_equal(self, other, &mut Vec::new())
    }
}

/// Structural equality. `active` holds the container pairs currently being
/// compared; meeting one again means the cycle matched so far.
fn values_equal(a: &Value, b: &Value, active: &mut Vec<(usize, usize)>) -> bool {
    if let Some(equal) = number::numeric_eq(a, b) {
        return equal;
    }
    match (a, b) {
        (Value::Nil, Value::Nil) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let pair = (Rc::as_ptr(x) as usize, Rc::as_ptr(y) as usize);
            if active.contains(&pair) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            if x.len() != y.len() {
                return false;
            }
            active.push(pair);
            let equal = crate::interpreter::ensure_sufficient_stack(|| {
                x.iter().zip(y.iter()).all(|(l, r)| values_equal(l, r, active))
            });
            active.pop();
            equal
        }
        (Value::Dict(x), Value::Dict(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let pair = (Rc::as_ptr(x) as usize, Rc::as_ptr(y) as usize);
            if active.contains(&pair) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            if x.len() != y.len() {
                return false;
            }
            active.push(pair);
            let equal = crate::interpreter::ensure_sufficient_stack(|| {
                x.entries().iter().all(|(k, v)| match y.get(k) {
                    Ok(Some(other)) => values_equal(v, &other, active),
                    _ => false,
                })
            });
            active.pop();
            equal
        }
        (Value::Set(x), Value::Set(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len() && x.items().iter().all(|item| y.contains(item).unwrap_or(false))
        }
        (Value::Buffer(x), Value::Buffer(y)) => *x.borrow() == *y.borrow(),
        (Value::Range(x), Value::Range(y)) => x == y,
        (Value::BigRange(x), Value::BigRange(y)) => x == y,
        (Value::Function(x), Value::Function(y)) => Rc::ptr_eq(x, y),
        (Value::Native(x), Value::Native(y)) => x.name == y.name,
        (Value::BuiltinMethod(x), Value::BuiltinMethod(y)) => Rc::ptr_eq(x, y),
        (Value::Class(x), Value::Class(y)) => Rc::ptr_eq(x, y),
        (Value::Instance(x), Value::Instance(y)) => Rc::ptr_eq(x, y),
        (Value::Enum(x), Value::Enum(y)) => Rc::ptr_eq(x, y),
        (Value::EnumValue(x), Value::EnumValue(y)) => {
            Rc::ptr_eq(&x.def, &y.def) && x.ordinal == y.ordinal
        }
        (Value::Error(x), Value::Error(y)) => Rc::ptr_eq(x, y),
        (Value::Iterator(x), Value::Iterator(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_truthiness() {
        for falsy in [
            Value::Nil,
            Value::Bool(false),
            Value::Int(0),
            Value::UInt(0),
            Value::Float(0.0),
            Value::Float(f64::NAN),
            Value::big_int(BigInt::from(0)),
            Value::str(""),
            Value::list(vec![]),
            Value::dict(Dict::new()),
            Value::set(Set::new()),
            Value::buffer(vec![]),
        ] {
            assert!(!falsy.is_truthy(), "{:?} should be falsy", falsy);
        }
        assert!(Value::Int(-1).is_truthy());
        assert!(Value::str("0").is_truthy());
        assert!(Value::Range(Range::new(0, 0, 1)).is_truthy());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Float(4.0).to_string(), "4.0");
        assert_eq!(Value::Float(3.5).to_string(), "3.5");
        assert_eq!(Value::Float(f64::INFINITY).to_string(), "inf");
        let nested = Value::list(vec![Value::Int(1), Value::str("a"), Value::list(vec![])]);
        assert_eq!(nested.to_string(), "[1, \"a\", []]");
        assert_eq!(Value::str("top").to_string(), "top");
        assert_eq!(Value::Range(Range::new(0, 3, 1)).to_string(), "0..3");
        let set = Set::from_values([Value::Int(1), Value::Int(2)]).unwrap();
        assert_eq!(Value::set(set).to_string(), "set(1, 2)");
    }

    #[test]
    fn test_self_containing_list_displays() {
        let list = Value::list(vec![]);
        if let Value::List(items) = &list {
            items.borrow_mut().push(list.clone());
        }
        assert!(list.to_string().contains("..."));
        // break the cycle so the test does not leak
        if let Value::List(items) = &list {
            items.borrow_mut().clear();
        }
    }

    #[test]
    fn test_structural_equality() {
        let a = Value::list(vec![Value::Int(1), Value::Float(2.0)]);
        let b = Value::list(vec![Value::Float(1.0), Value::Int(2)]);
        assert_eq!(a, b);
        assert_ne!(Value::Bool(true), Value::Int(1));
        assert_ne!(Value::Nil, Value::Int(0));
    }

    #[test]
    fn test_cyclic_lists_compare_structurally() {
        let cyclic = |head: Vec<Value>| {
            let list = Value::list(head);
            if let Value::List(items) = &list {
                items.borrow_mut().push(list.clone());
            }
            list
        };
        let (a, b, c) = (cyclic(vec![]), cyclic(vec![]), cyclic(vec![Value::Int(1)]));
        assert_eq!(a, b);
        assert_ne!(a, c);
        for list in [a, b, c] {
            if let Value::List(items) = &list {
                items.borrow_mut().clear();
            }
        }
    }
}
