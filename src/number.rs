//! The number tower
//!
//! Operand kinds in ascending generality: bool/nil, int, uint, float,
//! bigint, bigfloat. A binary operation lifts both operands to the more
//! general kind before computing.

use std::cmp::Ordering;
use std::rc::Rc;

use bigdecimal::BigDecimal;
use num_bigint::{BigInt, BigUint};
use num_traits::{FromPrimitive, One, Signed, ToPrimitive, Zero};

use crate::ast::BinaryOp;
use crate::error::ErrorKind;
use crate::value::Value;

/// Largest shift count accepted before it is treated as a runaway allocation
const MAX_SHIFT: i64 = 1_000_000;

/// Largest bigint exponent accepted for a base other than 0, 1 or -1
const MAX_POW_EXPONENT: u32 = 1_000_000;

/// A numeric operand lifted out of a [`Value`]
#[derive(Debug, Clone)]
pub enum Num {
    Int(i64),
    UInt(u64),
    Float(f64),
    Big(BigInt),
    Dec(BigDecimal),
}

/// Two operands lifted to a common kind
enum Pair {
    Int(i64, i64),
    UInt(u64, u64),
    Float(f64, f64),
    Big(BigInt, BigInt),
    Dec(BigDecimal, BigDecimal),
}

impl Num {
    /// bool/nil count as the integers 1/0
    pub fn from_value(value: &Value) -> Option<Num> {
        Some(match value {
            Value::Nil => Num::Int(0),
            Value::Bool(b) => Num::Int(i64::from(*b)),
            Value::Int(n) => Num::Int(*n),
            Value::UInt(n) => Num::UInt(*n),
            Value::Float(f) => Num::Float(*f),
            Value::BigInt(b) => Num::Big((**b).clone()),
            Value::BigFloat(d) => Num::Dec((**d).clone()),
            _ => return None,
        })
    }

    fn rank(&self) -> u8 {
        match self {
            Num::Int(_) => 0,
            Num::UInt(_) => 1,
            Num::Float(_) => 2,
            Num::Big(_) => 3,
            Num::Dec(_) => 4,
        }
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            Num::Int(n) => *n as f64,
            Num::UInt(n) => *n as f64,
            Num::Float(f) => *f,
            Num::Big(b) => b.to_f64().unwrap_or(f64::NAN),
            Num::Dec(d) => d.to_f64().unwrap_or(f64::NAN),
        }
    }

    fn to_big(&self) -> Option<BigInt> {
        match self {
            Num::Int(n) => Some(BigInt::from(*n)),
            Num::UInt(n) => Some(BigInt::from(*n)),
            Num::Float(f) => BigInt::from_f64(f.trunc()),
            Num::Big(b) => Some(b.clone()),
            Num::Dec(d) => Some(dec_trunc(d)),
        }
    }

    fn to_dec(&self) -> Option<BigDecimal> {
        match self {
            Num::Int(n) => Some(BigDecimal::from(*n)),
            Num::UInt(n) => Some(BigDecimal::from(*n)),
            Num::Float(f) => float_to_dec(*f),
            Num::Big(b) => Some(BigDecimal::new(b.clone(), 0)),
            Num::Dec(d) => Some(d.clone()),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Num::Int(n) => Value::Int(n),
            Num::UInt(n) => Value::UInt(n),
            Num::Float(f) => Value::Float(f),
            Num::Big(b) => Value::big_int(b),
            Num::Dec(d) => Value::big_float(d),
        }
    }
}

pub fn float_to_dec(f: f64) -> Option<BigDecimal> {
    if !f.is_finite() {
        return None;
    }
    f.to_string().parse().ok()
}

/// Integer part of a bigfloat, rounding toward zero
pub fn dec_trunc(d: &BigDecimal) -> BigInt {
    let (digits, scale) = d.with_scale(0).into_bigint_and_exponent();
    debug_assert_eq!(scale, 0);
    digits
}

fn unify(a: Num, b: Num) -> Pair {
    let (lo, hi, swapped) = if a.rank() <= b.rank() { (a, b, false) } else { (b, a, true) };
    let pair = match (lo, hi) {
        (Num::Int(x), Num::Int(y)) => Pair::Int(x, y),
        (Num::UInt(x), Num::UInt(y)) => Pair::UInt(x, y),
        (Num::Int(x), Num::UInt(y)) => match i64::try_from(y) {
            Ok(y) => Pair::Int(x, y),
            Err(_) => Pair::Big(BigInt::from(x), BigInt::from(y)),
        },
        (lo @ (Num::Int(_) | Num::UInt(_)), Num::Float(y)) => Pair::Float(lo.to_f64(), y),
        (Num::Float(x), Num::Float(y)) => Pair::Float(x, y),
        (Num::Float(x), hi) if !x.is_finite() => Pair::Float(x, hi.to_f64()),
        (Num::Float(x), Num::Big(y)) if x.fract() == 0.0 => {
            Pair::Big(BigInt::from_f64(x).unwrap_or_default(), y)
        }
        // Finite floats always convert
        (Num::Float(x), hi) => Pair::Dec(
            float_to_dec(x).unwrap_or_default(),
            hi.to_dec().unwrap_or_default(),
        ),
        (lo, Num::Big(y)) => Pair::Big(lo.to_big().unwrap_or_default(), y),
        (lo, Num::Dec(y)) => Pair::Dec(lo.to_dec().unwrap_or_default(), y),
        (lo, hi) => Pair::Float(lo.to_f64(), hi.to_f64()),
    };
    if swapped {
        match pair {
            Pair::Int(x, y) => Pair::Int(y, x),
            Pair::UInt(x, y) => Pair::UInt(y, x),
            Pair::Float(x, y) => Pair::Float(y, x),
            Pair::Big(x, y) => Pair::Big(y, x),
            Pair::Dec(x, y) => Pair::Dec(y, x),
        }
    } else {
        pair
    }
}

fn is_number(value: &Value) -> bool {
    matches!(
        value,
        Value::Int(_) | Value::UInt(_) | Value::Float(_) | Value::BigInt(_) | Value::BigFloat(_)
    )
}

/// `+ - * / % **` including the string, list and repetition cases
pub fn arithmetic(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, ErrorKind> {
    match (op, a, b) {
        (BinaryOp::Add, Value::Str(_), _) | (BinaryOp::Add, _, Value::Str(_)) => {
            return Ok(Value::str(format!("{}{}", a, b)));
        }
        (BinaryOp::Add, Value::List(x), Value::List(y)) => {
            let mut items = x.borrow().clone();
            items.extend(y.borrow().iter().cloned());
            return Ok(Value::list(items));
        }
        (BinaryOp::Mul, Value::Str(s), n) | (BinaryOp::Mul, n, Value::Str(s)) if is_integral(n) => {
            let count = Num::from_value(n).and_then(|n| n.to_big()).and_then(|n| n.to_usize()).unwrap_or(0);
            return Ok(Value::str(s.repeat(count)));
        }
        _ => {}
    }

    let (Some(x), Some(y)) = (Num::from_value(a), Num::from_value(b)) else {
        return Ok(Value::Float(f64::NAN));
    };

    match unify(x, y) {
        Pair::Int(x, y) => Ok(int_op(op, x, y)),
        Pair::UInt(x, y) => Ok(uint_op(op, x, y)),
        Pair::Float(x, y) => Ok(Value::Float(float_op(op, x, y))),
        Pair::Big(x, y) => big_op(op, x, y),
        Pair::Dec(x, y) => dec_op(op, x, y),
    }
}

fn is_integral(value: &Value) -> bool {
    matches!(value, Value::Int(_) | Value::UInt(_) | Value::BigInt(_))
}

fn int_op(op: BinaryOp, x: i64, y: i64) -> Value {
    let promote = |f: fn(BigInt, BigInt) -> BigInt| Value::big_int(f(BigInt::from(x), BigInt::from(y)));
    match op {
        BinaryOp::Add => x.checked_add(y).map_or_else(|| promote(|a, b| a + b), Value::Int),
        BinaryOp::Sub => x.checked_sub(y).map_or_else(|| promote(|a, b| a - b), Value::Int),
        BinaryOp::Mul => x.checked_mul(y).map_or_else(|| promote(|a, b| a * b), Value::Int),
        BinaryOp::Div => {
            if y == 0 {
                return Value::Float(x as f64 / 0.0);
            }
            match (x.checked_rem(y), x.checked_div(y)) {
                (Some(0), Some(q)) => Value::Int(q),
                (None, _) | (_, None) => promote(|a, b| a / b),
                _ => Value::Float(x as f64 / y as f64),
            }
        }
        BinaryOp::Mod => {
            if y == 0 {
                Value::Float(f64::NAN)
            } else {
                Value::Int(x.checked_rem(y).unwrap_or(0))
            }
        }
        BinaryOp::Pow => Value::Int((x as f64).powf(y as f64).trunc() as i64),
        _ => Value::Float(f64::NAN),
    }
}

fn uint_op(op: BinaryOp, x: u64, y: u64) -> Value {
    match op {
        BinaryOp::Add => Value::UInt(x.wrapping_add(y)),
        BinaryOp::Sub => Value::UInt(x.wrapping_sub(y)),
        BinaryOp::Mul => Value::UInt(x.wrapping_mul(y)),
        BinaryOp::Div => {
            if y == 0 {
                Value::Float(x as f64 / 0.0)
            } else if x % y == 0 {
                Value::UInt(x / y)
            } else {
                Value::Float(x as f64 / y as f64)
            }
        }
        BinaryOp::Mod => {
            if y == 0 {
                Value::Float(f64::NAN)
            } else {
                Value::UInt(x % y)
            }
        }
        BinaryOp::Pow => Value::UInt((x as f64).powf(y as f64).trunc() as u64),
        _ => Value::Float(f64::NAN),
    }
}

fn float_op(op: BinaryOp, x: f64, y: f64) -> f64 {
    match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => x / y,
        BinaryOp::Mod => x % y,
        BinaryOp::Pow => x.powf(y),
        _ => f64::NAN,
    }
}

fn big_op(op: BinaryOp, x: BigInt, y: BigInt) -> Result<Value, ErrorKind> {
    Ok(match op {
        BinaryOp::Add => Value::big_int(x + y),
        BinaryOp::Sub => Value::big_int(x - y),
        BinaryOp::Mul => Value::big_int(x * y),
        BinaryOp::Div => {
            if y.is_zero() {
                return Err(ErrorKind::DivisionByZero);
            }
            if (&x % &y).is_zero() {
                Value::big_int(x / y)
            } else {
                Value::big_float(BigDecimal::new(x, 0) / BigDecimal::new(y, 0))
            }
        }
        BinaryOp::Mod => {
            if y.is_zero() {
                return Err(ErrorKind::DivisionByZero);
            }
            Value::big_int(x % y)
        }
        BinaryOp::Pow => match y.to_u32() {
            Some(exp) if exp > MAX_POW_EXPONENT && x.magnitude() > &BigUint::one() => {
                return Err(ErrorKind::Runtime(format!("exponent {} too large", exp)));
            }
            Some(exp) => Value::big_int(x.pow(exp)),
            None => Value::Float(
                x.to_f64()
                    .unwrap_or(f64::NAN)
                    .powf(y.to_f64().unwrap_or(f64::NAN)),
            ),
        },
        _ => Value::Float(f64::NAN),
    })
}

fn dec_op(op: BinaryOp, x: BigDecimal, y: BigDecimal) -> Result<Value, ErrorKind> {
    Ok(match op {
        BinaryOp::Add => Value::big_float(x + y),
        BinaryOp::Sub => Value::big_float(x - y),
        BinaryOp::Mul => Value::big_float(x * y),
        BinaryOp::Div => {
            if y.is_zero() {
                return Err(ErrorKind::DivisionByZero);
            }
            Value::big_float(x / y)
        }
        BinaryOp::Mod => {
            if y.is_zero() {
                return Err(ErrorKind::DivisionByZero);
            }
            Value::big_float(x % y)
        }
        BinaryOp::Pow => {
            return Err(ErrorKind::Runtime(
                "bigfloat does not support exponentiation".to_string(),
            ))
        }
        _ => Value::Float(f64::NAN),
    })
}

/// Integer view of a bitwise operand
enum Bits {
    Int(i64),
    UInt(u64),
    Big(BigInt),
}

fn bits_of(value: &Value) -> Result<Option<Bits>, ErrorKind> {
    let Some(num) = Num::from_value(value) else {
        return Ok(None);
    };
    Ok(Some(match num {
        Num::Int(n) => Bits::Int(n),
        Num::UInt(n) => Bits::UInt(n),
        Num::Float(f) => {
            if !f.is_finite() {
                return Err(ErrorKind::InvalidBitwiseOperand(value.to_string()));
            }
            let t = f.trunc();
            if t >= i64::MIN as f64 && t < i64::MAX as f64 {
                Bits::Int(t as i64)
            } else {
                Bits::Big(BigInt::from_f64(t).unwrap_or_default())
            }
        }
        Num::Big(b) => Bits::Big(b),
        Num::Dec(d) => Bits::Big(dec_trunc(&d)),
    }))
}

impl Bits {
    fn to_big(&self) -> BigInt {
        match self {
            Bits::Int(n) => BigInt::from(*n),
            Bits::UInt(n) => BigInt::from(*n),
            Bits::Big(b) => b.clone(),
        }
    }

    fn to_shift(&self) -> Result<i64, ErrorKind> {
        let count = match self {
            Bits::Int(n) => *n,
            Bits::UInt(n) => i64::try_from(*n).unwrap_or(i64::MAX),
            Bits::Big(b) => b.to_i64().unwrap_or(if b.is_negative() { -1 } else { i64::MAX }),
        };
        if count < 0 {
            return Err(ErrorKind::Runtime(format!("negative shift count {}", count)));
        }
        if count > MAX_SHIFT {
            return Err(ErrorKind::Runtime(format!("shift count {} too large", count)));
        }
        Ok(count)
    }
}

/// `& | ^ << >>`; floats truncate toward zero, non-finite floats are rejected
pub fn bitwise(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, ErrorKind> {
    let (Some(x), Some(y)) = (bits_of(a)?, bits_of(b)?) else {
        return Ok(Value::Float(f64::NAN));
    };

    if matches!(op, BinaryOp::Shl | BinaryOp::Shr) {
        let count = y.to_shift()?;
        return Ok(shift(op, x, count));
    }

    let result = match (x, y) {
        (Bits::UInt(x), Bits::UInt(y)) => Value::UInt(bit_op(op, x, y)),
        (Bits::Int(x), Bits::Int(y)) => Value::Int(bit_op(op, x, y)),
        (Bits::Int(x), Bits::UInt(y)) | (Bits::UInt(y), Bits::Int(x)) if i64::try_from(y).is_ok() => {
            Value::Int(bit_op(op, x, y as i64))
        }
        (x, y) => {
            let (x, y) = (x.to_big(), y.to_big());
            Value::big_int(match op {
                BinaryOp::BitAnd => x & y,
                BinaryOp::BitOr => x | y,
                _ => x ^ y,
            })
        }
    };
    Ok(result)
}

fn bit_op<T>(op: BinaryOp, x: T, y: T) -> T
where
    T: std::ops::BitAnd<Output = T> + std::ops::BitOr<Output = T> + std::ops::BitXor<Output = T>,
{
    match op {
        BinaryOp::BitAnd => x & y,
        BinaryOp::BitOr => x | y,
        _ => x ^ y,
    }
}

fn shift(op: BinaryOp, x: Bits, count: i64) -> Value {
    let left = op == BinaryOp::Shl;
    match x {
        Bits::Int(n) => {
            if left {
                if count < 63 {
                    let shifted = n << count;
                    if shifted >> count == n {
                        return Value::Int(shifted);
                    }
                }
                Value::big_int(BigInt::from(n) << count as usize)
            } else if count >= 64 {
                Value::Int(if n < 0 { -1 } else { 0 })
            } else {
                Value::Int(n >> count)
            }
        }
        Bits::UInt(n) => {
            if count >= 64 {
                Value::UInt(0)
            } else if left {
                Value::UInt(n << count)
            } else {
                Value::UInt(n >> count)
            }
        }
        Bits::Big(b) => {
            if left {
                Value::big_int(b << count as usize)
            } else {
                Value::big_int(b >> count as usize)
            }
        }
    }
}

pub fn negate(value: &Value) -> Value {
    match Num::from_value(value) {
        Some(Num::Int(n)) => n
            .checked_neg()
            .map_or_else(|| Value::big_int(-BigInt::from(n)), Value::Int),
        Some(Num::UInt(n)) => match i64::try_from(n) {
            Ok(n) => Value::Int(-n),
            Err(_) => Value::big_int(-BigInt::from(n)),
        },
        Some(Num::Float(f)) => Value::Float(-f),
        Some(Num::Big(b)) => Value::big_int(-b),
        Some(Num::Dec(d)) => Value::big_float(-d),
        None => Value::Float(f64::NAN),
    }
}

pub fn bit_not(value: &Value) -> Result<Value, ErrorKind> {
    Ok(match bits_of(value)? {
        Some(Bits::Int(n)) => Value::Int(!n),
        Some(Bits::UInt(n)) => Value::UInt(!n),
        Some(Bits::Big(b)) => Value::big_int(-b - 1),
        None => Value::Float(f64::NAN),
    })
}

/// Ordering of two numeric operands; None when either is NaN or non-numeric
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    let (x, y) = (Num::from_value(a)?, Num::from_value(b)?);
    match unify(x, y) {
        Pair::Int(x, y) => Some(x.cmp(&y)),
        Pair::UInt(x, y) => Some(x.cmp(&y)),
        Pair::Float(x, y) => x.partial_cmp(&y),
        Pair::Big(x, y) => Some(x.cmp(&y)),
        Pair::Dec(x, y) => Some(x.cmp(&y)),
    }
}

/// `< <= > >=`. Numbers compare by value, strings lexicographically,
/// anything else yields NaN.
pub fn ordering(op: BinaryOp, a: &Value, b: &Value) -> Value {
    let ord = match (a, b) {
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        _ if Num::from_value(a).is_some() && Num::from_value(b).is_some() => compare(a, b),
        _ => return Value::Float(f64::NAN),
    };
    let Some(ord) = ord else {
        return Value::Bool(false);
    };
    Value::Bool(match op {
        BinaryOp::Lt => ord == Ordering::Less,
        BinaryOp::Le => ord != Ordering::Greater,
        BinaryOp::Gt => ord == Ordering::Greater,
        _ => ord != Ordering::Less,
    })
}

/// Cross-kind numeric equality; None when either side is not a number
pub fn numeric_eq(a: &Value, b: &Value) -> Option<bool> {
    if !is_number(a) || !is_number(b) {
        return None;
    }
    Some(compare(a, b) == Some(Ordering::Equal))
}

pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::Int(n) => *n == 0,
        Value::UInt(n) => *n == 0,
        Value::Float(f) => *f == 0.0 || f.is_nan(),
        Value::BigInt(b) => b.is_zero(),
        Value::BigFloat(d) => d.is_zero(),
        _ => false,
    }
}

// ==================== Conversions ====================

pub fn to_int(value: &Value) -> Result<Value, String> {
    match value {
        Value::Str(s) => parse_int(s.trim()),
        _ => match Num::from_value(value) {
            Some(Num::Int(n)) => Ok(Value::Int(n)),
            Some(Num::Float(f)) if !f.is_finite() => Err(format!("cannot convert {} to int", f)),
            Some(num) => {
                let big = num.to_big().unwrap_or_default();
                Ok(big.to_i64().map_or_else(|| Value::big_int(big), Value::Int))
            }
            None => Err(format!("cannot convert {} to int", value.type_name())),
        },
    }
}

fn parse_int(text: &str) -> Result<Value, String> {
    if let Ok(n) = text.parse::<i64>() {
        return Ok(Value::Int(n));
    }
    if let Ok(big) = text.parse::<BigInt>() {
        return Ok(Value::big_int(big));
    }
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
        _ => Err(format!("invalid integer literal '{}'", text)),
    }
}

pub fn to_uint(value: &Value) -> Result<Value, String> {
    let signed = to_int(value)?;
    match signed {
        Value::Int(n) if n >= 0 => Ok(Value::UInt(n as u64)),
        Value::BigInt(b) => b
            .to_u64()
            .map(Value::UInt)
            .ok_or_else(|| format!("{} out of range for uint", b)),
        other => Err(format!("{} out of range for uint", other)),
    }
}

pub fn to_float(value: &Value) -> Result<Value, String> {
    match value {
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| format!("invalid float literal '{}'", s)),
        _ => Num::from_value(value)
            .map(|n| Value::Float(n.to_f64()))
            .ok_or_else(|| format!("cannot convert {} to float", value.type_name())),
    }
}

pub fn to_bigint(value: &Value) -> Result<Value, String> {
    match value {
        Value::Str(s) => s
            .trim()
            .parse::<BigInt>()
            .map(Value::big_int)
            .map_err(|_| format!("invalid bigint literal '{}'", s)),
        _ => match Num::from_value(value) {
            Some(Num::Float(f)) if !f.is_finite() => Err(format!("cannot convert {} to bigint", f)),
            Some(num) => Ok(Value::big_int(num.to_big().unwrap_or_default())),
            None => Err(format!("cannot convert {} to bigint", value.type_name())),
        },
    }
}

pub fn to_bigfloat(value: &Value) -> Result<Value, String> {
    match value {
        Value::Str(s) => s
            .trim()
            .parse::<BigDecimal>()
            .map(Value::big_float)
            .map_err(|_| format!("invalid bigfloat literal '{}'", s)),
        _ => Num::from_value(value)
            .and_then(|n| n.to_dec())
            .map(Value::big_float)
            .ok_or_else(|| format!("cannot convert {} to bigfloat", value.type_name())),
    }
}

/// Integer index from a numeric value, for subscripts and counts
pub fn to_index(value: &Value) -> Option<i64> {
    match value {
        Value::Int(n) => Some(*n),
        Value::UInt(n) => i64::try_from(*n).ok(),
        Value::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
        Value::BigInt(b) => b.to_i64(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

pub fn big_of(value: &Value) -> Option<Rc<BigInt>> {
    match value {
        Value::BigInt(b) => Some(Rc::clone(b)),
        _ => Num::from_value(value)
            .filter(|n| !matches!(n, Num::Float(f) if f.fract() != 0.0 || !f.is_finite()))
            .filter(|n| !matches!(n, Num::Dec(d) if !d.is_integer()))
            .and_then(|n| n.to_big())
            .map(Rc::new),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn big(n: i64) -> Value {
        Value::big_int(BigInt::from(n))
    }

    fn arith(op: BinaryOp, a: Value, b: Value) -> Value {
        arithmetic(op, &a, &b).unwrap()
    }

    #[test]
    fn test_int_division_exact_and_inexact() {
        assert_eq!(arith(BinaryOp::Div, Value::Int(8), Value::Int(2)), Value::Int(4));
        assert!(matches!(arith(BinaryOp::Div, Value::Int(7), Value::Int(2)), Value::Float(f) if f == 3.5));
        assert!(matches!(arith(BinaryOp::Div, Value::Int(1), Value::Int(0)), Value::Float(f) if f == f64::INFINITY));
        assert!(matches!(arith(BinaryOp::Div, Value::Int(-1), Value::Int(0)), Value::Float(f) if f == f64::NEG_INFINITY));
        assert!(matches!(arith(BinaryOp::Div, Value::Int(0), Value::Int(0)), Value::Float(f) if f.is_nan()));
    }

    #[test]
    fn test_int_overflow_promotes() {
        let sum = arith(BinaryOp::Add, Value::Int(i64::MAX), Value::Int(1));
        assert_eq!(sum, Value::big_int(BigInt::from(i64::MAX) + 1));
        assert!(matches!(sum, Value::BigInt(_)));
    }

    #[test]
    fn test_int_power_truncates() {
        assert_eq!(arith(BinaryOp::Pow, Value::Int(2), Value::Int(10)), Value::Int(1024));
        assert_eq!(arith(BinaryOp::Pow, Value::Int(2), Value::Int(-1)), Value::Int(0));
    }

    #[test]
    fn test_uint_wraps_and_mixes_with_int() {
        assert_eq!(arith(BinaryOp::Sub, Value::UInt(0), Value::UInt(1)), Value::UInt(u64::MAX));
        assert!(matches!(arith(BinaryOp::Add, Value::Int(-1), Value::UInt(3)), Value::Int(2)));
    }

    #[test]
    fn test_float_meets_bigint() {
        assert!(matches!(arith(BinaryOp::Add, Value::Float(2.0), big(3)), Value::BigInt(_)));
        assert!(matches!(arith(BinaryOp::Add, Value::Float(2.5), big(3)), Value::BigFloat(_)));
        assert!(matches!(arith(BinaryOp::Add, Value::Float(f64::INFINITY), big(3)), Value::Float(_)));
    }

    #[test]
    fn test_big_division() {
        assert_eq!(arith(BinaryOp::Div, big(10), Value::Int(2)), big(5));
        assert!(matches!(arith(BinaryOp::Div, big(7), Value::Int(2)), Value::BigFloat(_)));
        assert_eq!(arithmetic(BinaryOp::Div, &big(1), &Value::Int(0)), Err(ErrorKind::DivisionByZero));
        assert_eq!(arithmetic(BinaryOp::Mod, &big(1), &big(0)), Err(ErrorKind::DivisionByZero));
    }

    #[test]
    fn test_bigfloat_pow_is_error() {
        let d = to_bigfloat(&Value::str("1.5")).unwrap();
        assert!(arithmetic(BinaryOp::Pow, &d, &Value::Int(2)).is_err());
    }

    #[test]
    fn test_bigint_pow_exponent_is_capped() {
        let huge = Value::Int(4_000_000_000);
        assert!(matches!(
            arithmetic(BinaryOp::Pow, &big(2), &huge),
            Err(ErrorKind::Runtime(m)) if m.contains("too large")
        ));
        assert_eq!(arith(BinaryOp::Pow, big(1), huge.clone()), big(1));
        assert_eq!(arith(BinaryOp::Pow, big(-1), huge), big(1));
    }

    #[test]
    fn test_incompatible_kinds_are_nan() {
        let v = arith(BinaryOp::Sub, Value::str("a"), Value::list(vec![]));
        assert!(matches!(v, Value::Float(f) if f.is_nan()));
    }

    #[test]
    fn test_string_concat_wins() {
        assert_eq!(arith(BinaryOp::Add, Value::str("n="), Value::Int(1)), Value::str("n=1"));
        assert_eq!(arith(BinaryOp::Add, Value::Float(1.5), Value::str("!")), Value::str("1.5!"));
        assert_eq!(arith(BinaryOp::Mul, Value::str("ab"), Value::Int(3)), Value::str("ababab"));
    }

    #[test]
    fn test_bitwise_float_truncates() {
        assert_eq!(bitwise(BinaryOp::BitAnd, &Value::Float(7.9), &Value::Int(3)).unwrap(), Value::Int(3));
        assert_eq!(bitwise(BinaryOp::BitOr, &Value::Float(-2.7), &Value::Int(0)).unwrap(), Value::Int(-2));
        assert!(matches!(
            bitwise(BinaryOp::BitAnd, &Value::Float(f64::NAN), &Value::Int(1)),
            Err(ErrorKind::InvalidBitwiseOperand(_))
        ));
    }

    #[test]
    fn test_shifts() {
        assert_eq!(bitwise(BinaryOp::Shl, &Value::Int(1), &Value::Int(4)).unwrap(), Value::Int(16));
        assert_eq!(
            bitwise(BinaryOp::Shl, &Value::Int(1), &Value::Int(70)).unwrap(),
            Value::big_int(BigInt::from(1) << 70usize)
        );
        assert!(bitwise(BinaryOp::Shr, &Value::Int(1), &Value::Int(-1)).is_err());
        assert_eq!(bitwise(BinaryOp::Shr, &Value::Int(-8), &Value::Int(1)).unwrap(), Value::Int(-4));
    }

    #[test]
    fn test_cross_kind_equality() {
        assert_eq!(numeric_eq(&Value::Int(1), &Value::Float(1.0)), Some(true));
        assert_eq!(numeric_eq(&Value::UInt(3), &big(3)), Some(true));
        assert_eq!(numeric_eq(&Value::Bool(true), &Value::Int(1)), None);
        assert_eq!(numeric_eq(&Value::Float(f64::NAN), &Value::Float(f64::NAN)), Some(false));
    }

    #[test]
    fn test_ordering() {
        assert_eq!(ordering(BinaryOp::Lt, &Value::Int(1), &Value::Float(1.5)), Value::Bool(true));
        assert_eq!(ordering(BinaryOp::Ge, &Value::str("b"), &Value::str("a")), Value::Bool(true));
        assert!(matches!(ordering(BinaryOp::Lt, &Value::str("a"), &Value::Int(1)), Value::Float(f) if f.is_nan()));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(to_int(&Value::Float(3.9)).unwrap(), Value::Int(3));
        assert_eq!(to_int(&Value::str("42")).unwrap(), Value::Int(42));
        assert!(to_uint(&Value::Int(-1)).is_err());
        assert_eq!(to_bigint(&Value::str("123456789012345678901234567890")).unwrap().to_string(), "123456789012345678901234567890");
    }
}
