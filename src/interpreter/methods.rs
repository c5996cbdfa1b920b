//! Built-in methods on strings, collections, ranges, iterators and enums

use std::cmp::Ordering;
use std::rc::Rc;

use num_traits::ToPrimitive;

use super::{fail, Eval, Interpreter, Unwind};
use crate::collections::Set;
use crate::error::ErrorKind;
use crate::number;
use crate::object::EnumValue;
use crate::token::Span;
use crate::value::Value;

const STRING_METHODS: &[&str] = &[
    "len", "upper", "lower", "trim", "split", "contains", "startsWith", "endsWith", "replace",
    "chars", "indexOf", "substr",
];
const LIST_METHODS: &[&str] = &[
    "len", "push", "pop", "insert", "removeAt", "contains", "indexOf", "join", "reverse", "sort",
    "copy", "clear", "extend", "map", "filter", "reduce",
];
const DICT_METHODS: &[&str] = &[
    "len", "get", "set", "has", "remove", "keys", "values", "items", "copy", "clear",
];
const SET_METHODS: &[&str] = &[
    "len", "add", "has", "remove", "values", "copy", "union", "intersection",
];
const BUFFER_METHODS: &[&str] = &["len", "push", "get", "set", "copy", "toList", "decode"];
const RANGE_METHODS: &[&str] = &["len", "contains", "toList"];
const ITERATOR_METHODS: &[&str] = &["hasNext", "next", "index"];

/// Whether `receiver.name` names a built-in method
pub(crate) fn has_method(receiver: &Value, name: &str) -> bool {
    let table = match receiver {
        Value::Str(_) => STRING_METHODS,
        Value::List(_) => LIST_METHODS,
        Value::Dict(_) => DICT_METHODS,
        Value::Set(_) => SET_METHODS,
        Value::Buffer(_) => BUFFER_METHODS,
        Value::Range(_) | Value::BigRange(_) => RANGE_METHODS,
        Value::Iterator(_) => ITERATOR_METHODS,
        Value::Enum(_) => &["values"],
        _ => return false,
    };
    table.contains(&name)
}

fn check_args(name: &str, args: &[Value], min: usize, max: usize, span: Span) -> Result<(), Unwind> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{} to {}", min, max)
        };
        return Err(fail(
            ErrorKind::WrongArity {
                name: name.to_string(),
                expected,
                got: args.len(),
            },
            span,
        ));
    }
    Ok(())
}

fn str_arg<'v>(value: &'v Value, span: Span) -> Result<&'v str, Unwind> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(fail(
            ErrorKind::TypeMismatch("string".into(), other.type_name().into()),
            span,
        )),
    }
}

fn runtime(message: String, span: Span) -> Unwind {
    fail(ErrorKind::Runtime(message), span)
}

impl Interpreter {
    pub(crate) fn call_method(&mut self, receiver: &Value, name: &str, args: Vec<Value>, span: Span) -> Eval {
        match receiver {
            Value::Str(s) => self.string_method(s, name, &args, span),
            Value::List(_) => self.list_method(receiver, name, args, span),
            Value::Dict(_) => self.dict_method(receiver, name, &args, span),
            Value::Set(_) => self.set_method(receiver, name, args, span),
            Value::Buffer(_) => self.buffer_method(receiver, name, &args, span),
            Value::Range(_) | Value::BigRange(_) => self.range_method(receiver, name, &args, span),
            Value::Iterator(state) => {
                check_args(name, &args, 0, 0, span)?;
                let mut state = state.borrow_mut();
                match name {
                    "hasNext" => Ok(Value::Bool(state.has_next())),
                    "next" => state
                        .next_value()
                        .ok_or_else(|| runtime("iterator exhausted".into(), span)),
                    "index" => Ok(Value::Int(state.index as i64)),
                    _ => Err(fail(ErrorKind::UndefinedProperty(name.to_string()), span)),
                }
            }
            Value::Enum(def) if name == "values" => {
                check_args(name, &args, 0, 0, span)?;
                let variants = (0..def.variants.len())
                    .map(|ordinal| {
                        Value::EnumValue(EnumValue {
                            def: Rc::clone(def),
                            ordinal,
                        })
                    })
                    .collect();
                Ok(Value::list(variants))
            }
            _ => Err(fail(ErrorKind::UndefinedProperty(name.to_string()), span)),
        }
    }

    fn string_method(&mut self, s: &Rc<str>, name: &str, args: &[Value], span: Span) -> Eval {
        let arg_str = move |i: usize| str_arg(&args[i], span);
        match name {
            "len" => {
                check_args(name, args, 0, 0, span)?;
                Ok(Value::Int(s.chars().count() as i64))
            }
            "upper" => Ok(Value::str(s.to_uppercase())),
            "lower" => Ok(Value::str(s.to_lowercase())),
            "trim" => Ok(Value::str(s.trim())),
            "split" => {
                check_args(name, args, 1, 1, span)?;
                let sep = arg_str(0)?;
                let parts: Vec<Value> = if sep.is_empty() {
                    s.chars().map(|c| Value::str(c.to_string())).collect()
                } else {
                    s.split(sep).map(Value::str).collect()
                };
                Ok(Value::list(parts))
            }
            "contains" | "startsWith" | "endsWith" => {
                check_args(name, args, 1, 1, span)?;
                let needle = arg_str(0)?;
                Ok(Value::Bool(match name {
                    "contains" => s.contains(needle),
                    "startsWith" => s.starts_with(needle),
                    _ => s.ends_with(needle),
                }))
            }
            "replace" => {
                check_args(name, args, 2, 2, span)?;
                Ok(Value::str(s.replace(arg_str(0)?, arg_str(1)?)))
            }
            "chars" => Ok(Value::list(
                s.chars().map(|c| Value::str(c.to_string())).collect(),
            )),
            "indexOf" => {
                check_args(name, args, 1, 1, span)?;
                let needle = arg_str(0)?;
                Ok(Value::Int(match s.find(needle) {
                    Some(byte) => s[..byte].chars().count() as i64,
                    None => -1,
                }))
            }
            "substr" => {
                check_args(name, args, 1, 2, span)?;
                let chars: Vec<char> = s.chars().collect();
                let len = chars.len() as i64;
                let start = Self::int_arg(&args[0], "integer", span)?.clamp(0, len) as usize;
                let end = match args.get(1) {
                    Some(end) => Self::int_arg(end, "integer", span)?.clamp(0, len) as usize,
                    None => chars.len(),
                };
                let end = end.max(start);
                Ok(Value::str(chars[start..end].iter().collect::<String>()))
            }
            _ => Err(fail(ErrorKind::UndefinedProperty(name.to_string()), span)),
        }
    }

    fn list_method(&mut self, receiver: &Value, name: &str, args: Vec<Value>, span: Span) -> Eval {
        let Value::List(items) = receiver else {
            return Err(fail(ErrorKind::Internal("list method on non-list".into()), span));
        };
        match name {
            "len" => Ok(Value::Int(items.borrow().len() as i64)),
            "push" => {
                items.borrow_mut().extend(args);
                Ok(receiver.clone())
            }
            "pop" => items
                .borrow_mut()
                .pop()
                .ok_or_else(|| runtime("pop from empty list".into(), span)),
            "insert" => {
                check_args(name, &args, 2, 2, span)?;
                let len = items.borrow().len();
                let i = Self::int_arg(&args[0], "integer index", span)?;
                let at = if i < 0 { i + len as i64 } else { i };
                if at < 0 || at > len as i64 {
                    return Err(fail(
                        ErrorKind::IndexOutOfRange {
                            index: i.to_string(),
                            len,
                        },
                        span,
                    ));
                }
                items.borrow_mut().insert(at as usize, args[1].clone());
                Ok(Value::Nil)
            }
            "removeAt" => {
                check_args(name, &args, 1, 1, span)?;
                let len = items.borrow().len();
                let i = Self::int_arg(&args[0], "integer index", span)?;
                let at = if i < 0 { i + len as i64 } else { i };
                if at < 0 || at >= len as i64 {
                    return Err(fail(
                        ErrorKind::IndexOutOfRange {
                            index: i.to_string(),
                            len,
                        },
                        span,
                    ));
                }
                Ok(items.borrow_mut().remove(at as usize))
            }
            "contains" => {
                check_args(name, &args, 1, 1, span)?;
                Ok(Value::Bool(items.borrow().contains(&args[0])))
            }
            "indexOf" => {
                check_args(name, &args, 1, 1, span)?;
                let position = items.borrow().iter().position(|x| *x == args[0]);
                Ok(Value::Int(position.map_or(-1, |p| p as i64)))
            }
            "join" => {
                check_args(name, &args, 0, 1, span)?;
                let sep = match args.first() {
                    Some(sep) => str_arg(sep, span)?.to_string(),
                    None => String::new(),
                };
                let parts: Vec<String> = items.borrow().iter().map(|v| v.to_string()).collect();
                Ok(Value::str(parts.join(&sep)))
            }
            "reverse" => {
                items.borrow_mut().reverse();
                Ok(receiver.clone())
            }
            "sort" => {
                check_args(name, &args, 0, 1, span)?;
                let snapshot = items.borrow().clone();
                let sorted = self.sorted(snapshot, args.first().cloned(), span)?;
                *items.borrow_mut() = sorted;
                Ok(receiver.clone())
            }
            "copy" => Ok(Value::list(items.borrow().clone())),
            "clear" => {
                items.borrow_mut().clear();
                Ok(Value::Nil)
            }
            "extend" => {
                check_args(name, &args, 1, 1, span)?;
                let extra = self.collect_iterable(args[0].clone(), span)?;
                items.borrow_mut().extend(extra);
                Ok(receiver.clone())
            }
            "map" | "filter" => {
                check_args(name, &args, 1, 1, span)?;
                // Snapshot so the callback may mutate the list
                let snapshot = items.borrow().clone();
                let mut out = Vec::with_capacity(snapshot.len());
                for item in snapshot {
                    let result = self.call_value(args[0].clone(), vec![item.clone()], span)?;
                    if name == "map" {
                        out.push(result);
                    } else if result.is_truthy() {
                        out.push(item);
                    }
                }
                Ok(Value::list(out))
            }
            "reduce" => {
                check_args(name, &args, 1, 2, span)?;
                let snapshot = items.borrow().clone();
                let mut rest = snapshot.into_iter();
                let mut acc = match args.get(1) {
                    Some(initial) => initial.clone(),
                    None => rest
                        .next()
                        .ok_or_else(|| runtime("reduce of empty list with no initial value".into(), span))?,
                };
                for item in rest {
                    acc = self.call_value(args[0].clone(), vec![acc, item], span)?;
                }
                Ok(acc)
            }
            _ => Err(fail(ErrorKind::UndefinedProperty(name.to_string()), span)),
        }
    }

    /// Stable sort, by natural order or by a comparator returning a number
    fn sorted(&mut self, mut items: Vec<Value>, comparator: Option<Value>, span: Span) -> Result<Vec<Value>, Unwind> {
        let mut failure: Option<Unwind> = None;
        items.sort_by(|a, b| {
            if failure.is_some() {
                return Ordering::Equal;
            }
            let ordering = match &comparator {
                Some(cmp) => self
                    .call_value(cmp.clone(), vec![a.clone(), b.clone()], span)
                    .map(|result| number::compare(&result, &Value::Int(0)).unwrap_or(Ordering::Equal)),
                None => natural_order(a, b).ok_or_else(|| {
                    fail(
                        ErrorKind::TypeMismatch(
                            "comparable values".into(),
                            format!("{} and {}", a.type_name(), b.type_name()),
                        ),
                        span,
                    )
                }),
            };
            ordering.unwrap_or_else(|err| {
                failure = Some(err);
                Ordering::Equal
            })
        });
        match failure {
            Some(err) => Err(err),
            None => Ok(items),
        }
    }

    fn dict_method(&mut self, receiver: &Value, name: &str, args: &[Value], span: Span) -> Eval {
        let Value::Dict(dict) = receiver else {
            return Err(fail(ErrorKind::Internal("dict method on non-dict".into()), span));
        };
        let unhashable = |message: String| runtime(message, span);
        match name {
            "len" => Ok(Value::Int(dict.borrow().len() as i64)),
            "get" => {
                check_args(name, args, 1, 2, span)?;
                let found = dict.borrow().get(&args[0]).map_err(unhashable)?;
                match (found, args.get(1)) {
                    (Some(value), _) => Ok(value),
                    (None, Some(default)) => Ok(default.clone()),
                    (None, None) => Err(fail(ErrorKind::KeyNotFound(args[0].repr()), span)),
                }
            }
            "set" => {
                check_args(name, args, 2, 2, span)?;
                dict.borrow_mut()
                    .insert(args[0].clone(), args[1].clone())
                    .map_err(unhashable)?;
                Ok(receiver.clone())
            }
            "has" => {
                check_args(name, args, 1, 1, span)?;
                Ok(Value::Bool(dict.borrow().contains(&args[0]).map_err(unhashable)?))
            }
            "remove" => {
                check_args(name, args, 1, 1, span)?;
                let removed = dict.borrow_mut().remove(&args[0]).map_err(unhashable)?;
                Ok(removed.unwrap_or(Value::Nil))
            }
            "keys" => Ok(Value::list(dict.borrow().keys())),
            "values" => Ok(Value::list(dict.borrow().values())),
            "items" => Ok(Value::list(
                dict.borrow()
                    .entries()
                    .iter()
                    .map(|(k, v)| Value::list(vec![k.clone(), v.clone()]))
                    .collect(),
            )),
            "copy" => Ok(Value::dict(dict.borrow().clone())),
            "clear" => {
                dict.borrow_mut().clear();
                Ok(Value::Nil)
            }
            _ => Err(fail(ErrorKind::UndefinedProperty(name.to_string()), span)),
        }
    }

    fn set_method(&mut self, receiver: &Value, name: &str, args: Vec<Value>, span: Span) -> Eval {
        let Value::Set(set) = receiver else {
            return Err(fail(ErrorKind::Internal("set method on non-set".into()), span));
        };
        let unhashable = |message: String| runtime(message, span);
        match name {
            "len" => Ok(Value::Int(set.borrow().len() as i64)),
            "add" => {
                check_args(name, &args, 1, 1, span)?;
                Ok(Value::Bool(set.borrow_mut().insert(args[0].clone()).map_err(unhashable)?))
            }
            "has" => {
                check_args(name, &args, 1, 1, span)?;
                Ok(Value::Bool(set.borrow().contains(&args[0]).map_err(unhashable)?))
            }
            "remove" => {
                check_args(name, &args, 1, 1, span)?;
                Ok(Value::Bool(set.borrow_mut().remove(&args[0]).map_err(unhashable)?))
            }
            "values" => Ok(Value::list(set.borrow().items().to_vec())),
            "copy" => Ok(Value::set(set.borrow().clone())),
            "union" | "intersection" => {
                check_args(name, &args, 1, 1, span)?;
                let other = Set::from_values(self.collect_iterable(args[0].clone(), span)?)
                    .map_err(unhashable)?;
                let mine = set.borrow().clone();
                let result = if name == "union" {
                    let mut merged = mine;
                    for item in other.items() {
                        merged.insert(item.clone()).map_err(unhashable)?;
                    }
                    merged
                } else {
                    let mut common = Set::new();
                    for item in mine.items() {
                        if other.contains(item).map_err(unhashable)? {
                            common.insert(item.clone()).map_err(unhashable)?;
                        }
                    }
                    common
                };
                Ok(Value::set(result))
            }
            _ => Err(fail(ErrorKind::UndefinedProperty(name.to_string()), span)),
        }
    }

    fn buffer_method(&mut self, receiver: &Value, name: &str, args: &[Value], span: Span) -> Eval {
        let Value::Buffer(bytes) = receiver else {
            return Err(fail(ErrorKind::Internal("buffer method on non-buffer".into()), span));
        };
        match name {
            "len" => Ok(Value::Int(bytes.borrow().len() as i64)),
            "push" => {
                for arg in args {
                    let byte = Self::byte_arg(arg, span)?;
                    bytes.borrow_mut().push(byte);
                }
                Ok(receiver.clone())
            }
            "get" => {
                check_args(name, args, 1, 1, span)?;
                self.index(receiver, &args[0], span)
            }
            "set" => {
                check_args(name, args, 2, 2, span)?;
                self.index_set(receiver, &args[0], args[1].clone(), span)?;
                Ok(Value::Nil)
            }
            "copy" => Ok(Value::buffer(bytes.borrow().clone())),
            "toList" => Ok(Value::list(
                bytes.borrow().iter().map(|b| Value::Int(i64::from(*b))).collect(),
            )),
            "decode" => Ok(Value::str(String::from_utf8_lossy(&bytes.borrow()).as_ref())),
            _ => Err(fail(ErrorKind::UndefinedProperty(name.to_string()), span)),
        }
    }

    fn range_method(&mut self, receiver: &Value, name: &str, args: &[Value], span: Span) -> Eval {
        match (receiver, name) {
            (Value::Range(range), "len") => Ok(Value::count(range.len())),
            (Value::BigRange(range), "len") => {
                let len = range.len();
                Ok(len.to_i64().map_or_else(|| Value::big_int(len), Value::Int))
            }
            (_, "contains") => {
                check_args(name, args, 1, 1, span)?;
                Ok(Value::Bool(self.contains(receiver, &args[0], span)?))
            }
            (_, "toList") => Ok(Value::list(self.collect_iterable(receiver.clone(), span)?)),
            _ => Err(fail(ErrorKind::UndefinedProperty(name.to_string()), span)),
        }
    }
}

/// Natural ordering used by `sort`, `min` and `max`
pub(crate) fn natural_order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        _ => number::compare(a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_tables_are_per_type() {
        assert!(has_method(&Value::str("x"), "upper"));
        assert!(!has_method(&Value::str("x"), "push"));
        assert!(has_method(&Value::list(vec![]), "reduce"));
        assert!(!has_method(&Value::Int(1), "len"));
    }

    #[test]
    fn natural_order_mixes_numbers_but_not_strings() {
        assert_eq!(natural_order(&Value::Int(1), &Value::Float(1.5)), Some(Ordering::Less));
        assert_eq!(natural_order(&Value::str("b"), &Value::str("a")), Some(Ordering::Greater));
        assert_eq!(natural_order(&Value::str("a"), &Value::Int(1)), None);
    }
}
