//! Property access, indexing, slicing, membership and iteration

use std::cell::RefCell;
use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use super::{fail, methods, Eval, Exec, Interpreter, Unwind};
use crate::collections::{IterSource, IterState};
use crate::error::ErrorKind;
use crate::number;
use crate::object::BuiltinMethod;
use crate::token::Span;
use crate::value::Value;

/// Iteration in progress for `foreach`, spread and collection natives
pub(crate) enum Cursor {
    Builtin(Rc<RefCell<IterState>>),
    /// Instance implementing `hasNext()` / `next()`
    Object(Value),
}

/// Position `index` within `len` items, counting from the end when negative
fn normalize(index: i64, len: usize) -> Option<usize> {
    let len = len as i128;
    let index = if index < 0 { index as i128 + len } else { index as i128 };
    (0..len).contains(&index).then_some(index as usize)
}

/// Clamp optional slice bounds to `[0, len]`; empty when start >= end
fn slice_bounds(start: Option<i64>, end: Option<i64>, len: usize) -> (usize, usize) {
    let clamp = |bound: i64| -> usize {
        let bound = if bound < 0 { bound as i128 + len as i128 } else { bound as i128 };
        bound.clamp(0, len as i128) as usize
    };
    let start = start.map_or(0, clamp);
    let end = end.map_or(len, clamp);
    if start >= end {
        (start, start)
    } else {
        (start, end)
    }
}

fn out_of_range(index: i64, len: usize, span: Span) -> Unwind {
    fail(
        ErrorKind::IndexOutOfRange {
            index: index.to_string(),
            len,
        },
        span,
    )
}

fn type_mismatch(expected: &str, got: &Value, span: Span) -> Unwind {
    fail(
        ErrorKind::TypeMismatch(expected.to_string(), got.type_name().to_string()),
        span,
    )
}

impl Interpreter {
    // ==================== Properties ====================

    pub(crate) fn get_property(&mut self, object: &Value, name: &str, span: Span) -> Eval {
        let undefined = || fail(ErrorKind::UndefinedProperty(name.to_string()), span);

        match object {
            Value::Instance(instance) => {
                if let Some(value) = instance.fields.borrow().get(name) {
                    return Ok(value.clone());
                }
                // Bound fresh on every access
                match instance.class.find_method(name) {
                    Some(method) => Ok(Value::Function(Rc::new(method.bind(object.clone())))),
                    None => Err(undefined()),
                }
            }
            Value::Class(class) => class.find_static(name).ok_or_else(undefined),
            Value::Enum(def) => match def.variant(name) {
                Some(variant) => Ok(Value::EnumValue(variant)),
                None if name == "values" => Ok(Self::builtin_method(object, name)),
                None => Err(undefined()),
            },
            Value::EnumValue(variant) => match name {
                "name" => Ok(Value::str(variant.name())),
                "ordinal" => Ok(Value::Int(variant.ordinal as i64)),
                _ => Err(undefined()),
            },
            Value::Error(err) => match name {
                "message" => Ok(Value::str(err.message.as_str())),
                "kind" => Ok(Value::str(err.kind.as_str())),
                "line" => Ok(err.line.map_or(Value::Nil, |line| Value::Int(line as i64))),
                _ => Err(undefined()),
            },
            _ if methods::has_method(object, name) => Ok(Self::builtin_method(object, name)),
            _ => Err(undefined()),
        }
    }

    fn builtin_method(receiver: &Value, name: &str) -> Value {
        Value::BuiltinMethod(Rc::new(BuiltinMethod {
            receiver: receiver.clone(),
            name: name.to_string(),
        }))
    }

    pub(crate) fn set_property(&mut self, object: &Value, name: &str, value: Value, span: Span) -> Exec {
        match object {
            Value::Instance(instance) => {
                instance.fields.borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            Value::Class(class) => {
                // Write to whichever class in the chain owns the static
                let owner = class.static_owner(name).unwrap_or_else(|| Rc::clone(class));
                owner.statics.borrow_mut().define(name, value);
                Ok(())
            }
            other => Err(type_mismatch("instance or class", other, span)),
        }
    }

    /// Call `name` on `receiver` the way `receiver.name(args)` would
    pub(crate) fn invoke(&mut self, receiver: &Value, name: &str, args: Vec<Value>, span: Span) -> Eval {
        let method = self.get_property(receiver, name, span)?;
        self.call_value(method, args, span)
    }

    // ==================== Indexing ====================

    pub(crate) fn index(&mut self, object: &Value, index: &Value, span: Span) -> Eval {
        match object {
            Value::List(items) => {
                let items = items.borrow();
                let i = Self::int_arg(index, "integer index", span)?;
                normalize(i, items.len())
                    .map(|i| items[i].clone())
                    .ok_or_else(|| out_of_range(i, items.len(), span))
            }
            Value::Str(s) => {
                let i = Self::int_arg(index, "integer index", span)?;
                let chars: Vec<char> = s.chars().collect();
                normalize(i, chars.len())
                    .map(|i| Value::str(chars[i].to_string()))
                    .ok_or_else(|| out_of_range(i, chars.len(), span))
            }
            Value::Buffer(bytes) => {
                let bytes = bytes.borrow();
                let i = Self::int_arg(index, "integer index", span)?;
                normalize(i, bytes.len())
                    .map(|i| Value::Int(i64::from(bytes[i])))
                    .ok_or_else(|| out_of_range(i, bytes.len(), span))
            }
            Value::Range(range) => {
                let i = Self::int_arg(index, "integer index", span)?;
                normalize(i, range.len())
                    .and_then(|i| range.get(i))
                    .map(Value::Int)
                    .ok_or_else(|| out_of_range(i, range.len(), span))
            }
            Value::BigRange(range) => {
                let i = number::big_of(index)
                    .ok_or_else(|| type_mismatch("integer index", index, span))?;
                let len = range.len();
                let i = if *i < BigInt::from(0) { &*i + &len } else { (*i).clone() };
                range.get(&i).map(Value::big_int).ok_or_else(|| {
                    fail(
                        ErrorKind::IndexOutOfRange {
                            index: i.to_string(),
                            len: len.to_usize().unwrap_or(usize::MAX),
                        },
                        span,
                    )
                })
            }
            Value::Dict(dict) => match dict.borrow().get(index) {
                Ok(Some(value)) => Ok(value),
                Ok(None) => Err(fail(ErrorKind::KeyNotFound(index.repr()), span)),
                Err(message) => Err(fail(ErrorKind::Runtime(message), span)),
            },
            other => Err(type_mismatch("indexable value", other, span)),
        }
    }

    pub(crate) fn slice(&mut self, object: &Value, start: Option<&Value>, end: Option<&Value>, span: Span) -> Eval {
        let start = start
            .map(|v| Self::int_arg(v, "integer slice bound", span))
            .transpose()?;
        let end = end
            .map(|v| Self::int_arg(v, "integer slice bound", span))
            .transpose()?;

        match object {
            Value::List(items) => {
                let items = items.borrow();
                let (from, to) = slice_bounds(start, end, items.len());
                Ok(Value::list(items[from..to].to_vec()))
            }
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let (from, to) = slice_bounds(start, end, chars.len());
                Ok(Value::str(chars[from..to].iter().collect::<String>()))
            }
            Value::Buffer(bytes) => {
                let bytes = bytes.borrow();
                let (from, to) = slice_bounds(start, end, bytes.len());
                Ok(Value::buffer(bytes[from..to].to_vec()))
            }
            Value::Range(range) => {
                let (from, to) = slice_bounds(start, end, range.len());
                Ok(Value::Range(range.slice(from, to)))
            }
            other => Err(type_mismatch("sliceable value", other, span)),
        }
    }

    pub(crate) fn index_set(&mut self, object: &Value, index: &Value, value: Value, span: Span) -> Exec {
        match object {
            Value::List(items) => {
                let mut items = items.borrow_mut();
                let i = Self::int_arg(index, "integer index", span)?;
                let len = items.len();
                let slot = normalize(i, len).ok_or_else(|| out_of_range(i, len, span))?;
                items[slot] = value;
                Ok(())
            }
            Value::Buffer(bytes) => {
                let byte = Self::byte_arg(&value, span)?;
                let mut bytes = bytes.borrow_mut();
                let i = Self::int_arg(index, "integer index", span)?;
                let len = bytes.len();
                let slot = normalize(i, len).ok_or_else(|| out_of_range(i, len, span))?;
                bytes[slot] = byte;
                Ok(())
            }
            Value::Dict(dict) => dict
                .borrow_mut()
                .insert(index.clone(), value)
                .map_err(|message| fail(ErrorKind::Runtime(message), span)),
            other => Err(type_mismatch("list, buffer or dict", other, span)),
        }
    }

    pub(crate) fn byte_arg(value: &Value, span: Span) -> Result<u8, Unwind> {
        let n = Self::int_arg(value, "byte", span)?;
        u8::try_from(n)
            .map_err(|_| fail(ErrorKind::Runtime(format!("byte value {} out of range 0..=255", n)), span))
    }

    /// `item in container`
    pub(crate) fn contains(&mut self, container: &Value, item: &Value, span: Span) -> Result<bool, Unwind> {
        let unhashable = |message: String| fail(ErrorKind::Runtime(message), span);
        match container {
            Value::List(items) => Ok(items.borrow().iter().any(|x| x == item)),
            Value::Str(s) => match item {
                Value::Str(needle) => Ok(s.contains(&**needle)),
                other => Err(type_mismatch("string", other, span)),
            },
            Value::Dict(dict) => dict.borrow().contains(item).map_err(unhashable),
            Value::Set(set) => set.borrow().contains(item).map_err(unhashable),
            Value::Buffer(bytes) => Ok(number::to_index(item)
                .and_then(|n| u8::try_from(n).ok())
                .is_some_and(|b| bytes.borrow().contains(&b))),
            Value::Range(range) => Ok(match item {
                Value::Float(f) if f.fract() != 0.0 => false,
                _ => number::to_index(item).is_some_and(|n| range.contains(n)),
            }),
            Value::BigRange(range) => Ok(number::big_of(item).is_some_and(|n| range.contains(&n))),
            Value::Instance(_) => Ok(self.invoke(container, "contains", vec![item.clone()], span)?.is_truthy()),
            other => Err(type_mismatch("container", other, span)),
        }
    }

    // ==================== Iteration ====================

    /// Iterator state over a built-in iterable, None for anything else
    pub(crate) fn iter_state(value: &Value) -> Option<IterState> {
        let source = match value {
            Value::List(items) => IterSource::List(Rc::clone(items)),
            Value::Str(s) => IterSource::Chars(s.chars().collect()),
            Value::Buffer(bytes) => IterSource::Buffer(Rc::clone(bytes)),
            Value::Range(range) => IterSource::Range(*range),
            Value::BigRange(range) => IterSource::BigRange(Rc::clone(range)),
            Value::Dict(dict) => IterSource::Values(dict.borrow().keys().into()),
            Value::Set(set) => IterSource::Values(set.borrow().items().into()),
            _ => return None,
        };
        Some(IterState::new(source))
    }

    pub(crate) fn cursor(&mut self, target: Value, span: Span) -> Result<Cursor, Unwind> {
        if let Value::Iterator(state) = &target {
            return Ok(Cursor::Builtin(Rc::clone(state)));
        }
        if let Some(state) = Self::iter_state(&target) {
            return Ok(Cursor::Builtin(Rc::new(RefCell::new(state))));
        }
        if let Value::Instance(instance) = &target {
            let class = Rc::clone(&instance.class);
            if Self::is_protocol_object(&target) {
                return Ok(Cursor::Object(target));
            }
            if class.find_method("iter").is_some() {
                let produced = self.invoke(&target, "iter", Vec::new(), span)?;
                // One level of iter() only, so an object returning itself cannot spin
                return match produced {
                    Value::Instance(_) if Self::is_protocol_object(&produced) => Ok(Cursor::Object(produced)),
                    Value::Instance(_) => Err(type_mismatch("iterator", &produced, span)),
                    other => self.cursor(other, span),
                };
            }
        }
        Err(type_mismatch("iterable", &target, span))
    }

    fn is_protocol_object(value: &Value) -> bool {
        match value {
            Value::Instance(instance) => {
                instance.class.find_method("hasNext").is_some() && instance.class.find_method("next").is_some()
            }
            _ => false,
        }
    }

    pub(crate) fn cursor_next(&mut self, cursor: &mut Cursor, span: Span) -> Result<Option<Value>, Unwind> {
        match cursor {
            Cursor::Builtin(state) => Ok(state.borrow_mut().next_value()),
            Cursor::Object(object) => {
                let object = object.clone();
                if !self.invoke(&object, "hasNext", Vec::new(), span)?.is_truthy() {
                    return Ok(None);
                }
                self.invoke(&object, "next", Vec::new(), span).map(Some)
            }
        }
    }

    /// Drain every element of an iterable into a vector
    pub(crate) fn collect_iterable(&mut self, target: Value, span: Span) -> Result<Vec<Value>, Unwind> {
        let mut cursor = self.cursor(target, span)?;
        let mut items = Vec::new();
        while let Some(item) = self.cursor_next(&mut cursor, span)? {
            items.push(item);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(0, 3), Some(0));
        assert_eq!(normalize(-1, 3), Some(2));
        assert_eq!(normalize(3, 3), None);
        assert_eq!(normalize(-4, 3), None);
        assert_eq!(normalize(-1, usize::MAX), Some(usize::MAX - 1));
        assert_eq!(normalize(i64::MAX, usize::MAX), Some(i64::MAX as usize));
    }

    #[test]
    fn test_slice_bounds_clamp() {
        assert_eq!(slice_bounds(None, None, 5), (0, 5));
        assert_eq!(slice_bounds(Some(-2), None, 5), (3, 5));
        assert_eq!(slice_bounds(Some(1), Some(100), 5), (1, 5));
        assert_eq!(slice_bounds(Some(4), Some(2), 5), (4, 4));
        assert_eq!(slice_bounds(Some(-100), Some(2), 5), (0, 2));
    }
}
