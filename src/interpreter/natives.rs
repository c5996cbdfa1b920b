//! Native functions installed into the global environment

use std::cmp::Ordering;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use bigdecimal::RoundingMode;
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive};

use super::methods::natural_order;
use super::{Interpreter, Unwind};
use crate::collections::{BigRange, Set};
use crate::number;
use crate::object::NativeFn;
use crate::token::Span;
use crate::value::Value;

/// Flatten a signal raised inside a native into its message
fn describe(unwind: Unwind) -> String {
    match unwind {
        Unwind::Error(err) => err.kind.to_string(),
        Unwind::Throw(value, _) => value.to_string(),
        Unwind::Return(_) | Unwind::Break | Unwind::Continue => {
            "control flow escaped a native call".to_string()
        }
    }
}

fn expect_args(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), String> {
    if args.len() < min || args.len() > max {
        return Err(format!(
            "{}() takes {} to {} arguments, got {}",
            name,
            min,
            max,
            args.len()
        ));
    }
    Ok(())
}

fn float_to_int(f: f64) -> Value {
    if f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Value::Int(f as i64)
    } else {
        Value::Float(f)
    }
}

/// Shared body of floor, ceil and round
fn round_with(
    name: &str,
    value: &Value,
    float: fn(f64) -> f64,
    mode: RoundingMode,
) -> Result<Value, String> {
    match value {
        Value::Int(_) | Value::UInt(_) | Value::BigInt(_) => Ok(value.clone()),
        Value::Float(f) => Ok(float_to_int(float(*f))),
        Value::BigFloat(d) => {
            let (digits, _) = d.with_scale_round(0, mode).into_bigint_and_exponent();
            Ok(digits.to_i64().map_or_else(|| Value::big_int(digits), Value::Int))
        }
        other => Err(format!("{}() requires a number, got {}", name, other.type_name())),
    }
}

fn extremum(name: &str, args: &[Value], want: Ordering, interp: &mut Interpreter) -> Result<Value, String> {
    let candidates = match args {
        [single] if !matches!(single, Value::Int(_) | Value::UInt(_) | Value::Float(_)) => interp
            .collect_iterable(single.clone(), Span::default())
            .map_err(describe)?,
        _ => args.to_vec(),
    };
    let mut best: Option<Value> = None;
    for candidate in candidates {
        best = match best {
            None => Some(candidate),
            Some(current) => match natural_order(&candidate, &current) {
                Some(ord) if ord == want => Some(candidate),
                Some(_) => Some(current),
                None => {
                    return Err(format!(
                        "{}() cannot compare {} and {}",
                        name,
                        candidate.type_name(),
                        current.type_name()
                    ))
                }
            },
        };
    }
    best.ok_or_else(|| format!("{}() of an empty sequence", name))
}

impl Interpreter {
    pub(super) fn define_natives(&mut self) {
        let natives = vec![
            // clock() -> seconds since the epoch
            NativeFn::new("clock", Some(0), |_interp, _args| {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_err(|e| e.to_string())?;
                Ok(Value::Float(now.as_secs_f64()))
            }),
            // len(val)
            NativeFn::new("len", Some(1), |_interp, args| match &args[0] {
                Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
                Value::List(items) => Ok(Value::Int(items.borrow().len() as i64)),
                Value::Dict(dict) => Ok(Value::Int(dict.borrow().len() as i64)),
                Value::Set(set) => Ok(Value::Int(set.borrow().len() as i64)),
                Value::Buffer(bytes) => Ok(Value::Int(bytes.borrow().len() as i64)),
                Value::Range(range) => Ok(Value::count(range.len())),
                Value::BigRange(range) => {
                    let len = range.len();
                    Ok(len.to_i64().map_or_else(|| Value::big_int(len), Value::Int))
                }
                other => Err(format!("len() not supported for {}", other.type_name())),
            }),
            NativeFn::new("str", Some(1), |_interp, args| {
                Ok(Value::str(args[0].to_string()))
            }),
            NativeFn::new("type", Some(1), |_interp, args| {
                Ok(Value::str(args[0].type_name()))
            }),
            // Numeric conversions
            NativeFn::new("int", Some(1), |_interp, args| number::to_int(&args[0])),
            NativeFn::new("uint", Some(1), |_interp, args| number::to_uint(&args[0])),
            NativeFn::new("float", Some(1), |_interp, args| number::to_float(&args[0])),
            NativeFn::new("bigint", Some(1), |_interp, args| number::to_bigint(&args[0])),
            NativeFn::new("bigfloat", Some(1), |_interp, args| number::to_bigfloat(&args[0])),
            // list(iterable?)
            NativeFn::new("list", None, |interp, args| {
                expect_args("list", args, 0, 1)?;
                match args.first() {
                    Some(source) => interp
                        .collect_iterable(source.clone(), Span::default())
                        .map(Value::list)
                        .map_err(describe),
                    None => Ok(Value::list(Vec::new())),
                }
            }),
            // set(iterable?)
            NativeFn::new("set", None, |interp, args| {
                expect_args("set", args, 0, 1)?;
                let items = match args.first() {
                    Some(source) => interp
                        .collect_iterable(source.clone(), Span::default())
                        .map_err(describe)?,
                    None => Vec::new(),
                };
                Set::from_values(items).map(Value::set)
            }),
            // buffer(size | string | iterable of bytes)
            NativeFn::new("buffer", None, |interp, args| {
                expect_args("buffer", args, 0, 1)?;
                match args.first() {
                    None => Ok(Value::buffer(Vec::new())),
                    Some(Value::Str(s)) => Ok(Value::buffer(s.as_bytes().to_vec())),
                    Some(size @ (Value::Int(_) | Value::UInt(_))) => {
                        let size = number::to_index(size)
                            .filter(|n| *n >= 0)
                            .ok_or_else(|| "buffer() size must be a non-negative integer".to_string())?;
                        Ok(Value::buffer(vec![0; size as usize]))
                    }
                    Some(source) => {
                        let items = interp
                            .collect_iterable(source.clone(), Span::default())
                            .map_err(describe)?;
                        let bytes = items
                            .iter()
                            .map(|item| Self::byte_arg(item, Span::default()).map_err(describe))
                            .collect::<Result<Vec<u8>, String>>()?;
                        Ok(Value::buffer(bytes))
                    }
                }
            }),
            // range(end) | range(start, end) | range(start, end, step)
            NativeFn::new("range", None, |_interp, args| {
                let result = match args {
                    [end] => Self::make_range(&Value::Int(0), end, None, Span::default()),
                    [start, end] => Self::make_range(start, end, None, Span::default()),
                    [start, end, step] => Self::make_range(start, end, Some(step), Span::default()),
                    _ => return Err(format!("range() takes 1 to 3 arguments, got {}", args.len())),
                };
                result.map_err(describe)
            }),
            // bigrange(...) always produces an arbitrary-precision range
            NativeFn::new("bigrange", None, |_interp, args| {
                let mut bounds = Vec::with_capacity(3);
                for arg in args {
                    let bound = number::big_of(arg).ok_or_else(|| {
                        format!("bigrange() requires integer bounds, got {}", arg.type_name())
                    })?;
                    bounds.push((*bound).clone());
                }
                let (start, end, step) = match bounds.as_slice() {
                    [end] => (BigInt::from(0), end.clone(), BigInt::from(1)),
                    [start, end] => (start.clone(), end.clone(), BigInt::from(1)),
                    [start, end, step] => (start.clone(), end.clone(), step.clone()),
                    _ => return Err(format!("bigrange() takes 1 to 3 arguments, got {}", args.len())),
                };
                if step == BigInt::from(0) {
                    return Err("range step cannot be zero".to_string());
                }
                Ok(Value::BigRange(Rc::new(BigRange::new(start, end, step))))
            }),
            NativeFn::new("iter", Some(1), |_interp, args| match &args[0] {
                Value::Iterator(_) => Ok(args[0].clone()),
                other => Self::iter_state(other)
                    .map(Value::iterator)
                    .ok_or_else(|| format!("{} is not iterable", other.type_name())),
            }),
            // copy(val) -> shallow copy of a mutable collection
            NativeFn::new("copy", Some(1), |_interp, args| match &args[0] {
                Value::List(items) => Ok(Value::list(items.borrow().clone())),
                Value::Dict(dict) => Ok(Value::dict(dict.borrow().clone())),
                Value::Set(set) => Ok(Value::set(set.borrow().clone())),
                Value::Buffer(bytes) => Ok(Value::buffer(bytes.borrow().clone())),
                other => Ok(other.clone()),
            }),
            // Error(message) | Error(kind, message)
            NativeFn::new("Error", None, |_interp, args| {
                match args {
                    [message] => Ok(Value::error("Error", message.to_string(), None)),
                    [kind, message] => Ok(Value::error(&kind.to_string(), message.to_string(), None)),
                    _ => Err(format!("Error() takes 1 or 2 arguments, got {}", args.len())),
                }
            }),
            NativeFn::new("abs", Some(1), |_interp, args| match &args[0] {
                Value::Int(n) => Ok(n
                    .checked_abs()
                    .map_or_else(|| Value::big_int(BigInt::from(*n).abs()), Value::Int)),
                Value::UInt(_) => Ok(args[0].clone()),
                Value::Float(f) => Ok(Value::Float(f.abs())),
                Value::BigInt(n) => Ok(Value::big_int(n.abs())),
                Value::BigFloat(d) => Ok(Value::big_float(d.abs())),
                other => Err(format!("abs() requires a number, got {}", other.type_name())),
            }),
            NativeFn::new("min", None, |interp, args| {
                extremum("min", args, Ordering::Less, interp)
            }),
            NativeFn::new("max", None, |interp, args| {
                extremum("max", args, Ordering::Greater, interp)
            }),
            NativeFn::new("floor", Some(1), |_interp, args| {
                round_with("floor", &args[0], f64::floor, RoundingMode::Floor)
            }),
            NativeFn::new("ceil", Some(1), |_interp, args| {
                round_with("ceil", &args[0], f64::ceil, RoundingMode::Ceiling)
            }),
            NativeFn::new("round", Some(1), |_interp, args| {
                round_with("round", &args[0], f64::round, RoundingMode::HalfUp)
            }),
            NativeFn::new("sqrt", Some(1), |_interp, args| match &args[0] {
                Value::BigFloat(d) => d
                    .sqrt()
                    .map(Value::big_float)
                    .ok_or_else(|| "sqrt() of a negative number".to_string()),
                value @ (Value::Int(_) | Value::UInt(_) | Value::Float(_) | Value::BigInt(_)) => {
                    let n = number::Num::from_value(value)
                        .map(|n| n.to_f64())
                        .ok_or_else(|| "sqrt() requires a number".to_string())?;
                    Ok(Value::Float(n.sqrt()))
                }
                other => Err(format!("sqrt() requires a number, got {}", other.type_name())),
            }),
        ];

        let mut globals = self.globals.borrow_mut();
        for native in natives {
            globals.define(native.name, Value::Native(native));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn call(name: &str, args: Vec<Value>) -> Result<Value, String> {
        let mut interp = Interpreter::new();
        let native = interp.globals.borrow().get(name);
        match native {
            Ok(Value::Native(native)) => (native.func)(&mut interp, &args),
            _ => panic!("{} is not a native", name),
        }
    }

    #[test]
    fn rounding_produces_integers() {
        assert_eq!(call("floor", vec![Value::Float(2.7)]), Ok(Value::Int(2)));
        assert_eq!(call("ceil", vec![Value::Float(2.1)]), Ok(Value::Int(3)));
        assert_eq!(call("round", vec![Value::Float(-2.5)]), Ok(Value::Int(-3)));
        assert_eq!(call("floor", vec![Value::Int(7)]), Ok(Value::Int(7)));
    }

    #[test]
    fn abs_promotes_min_int() {
        let result = call("abs", vec![Value::Int(i64::MIN)]);
        assert_eq!(result, Ok(Value::big_int(BigInt::from(i64::MIN).abs())));
    }

    #[test]
    fn min_max_accept_a_list_or_varargs() {
        let list = Value::list(vec![Value::Int(3), Value::Int(1), Value::Int(2)]);
        assert_eq!(call("min", vec![list]), Ok(Value::Int(1)));
        assert_eq!(
            call("max", vec![Value::Int(3), Value::Float(4.5)]),
            Ok(Value::Float(4.5))
        );
        assert!(call("max", vec![Value::list(vec![])]).is_err());
    }

    #[test]
    fn range_arguments() {
        let Ok(Value::Range(range)) = call("range", vec![Value::Int(5)]) else {
            panic!("expected a range");
        };
        assert_eq!((range.start, range.end, range.step), (0, 5, 1));
        assert!(call("range", vec![Value::Int(0), Value::Int(5), Value::Int(0)]).is_err());
    }
}
