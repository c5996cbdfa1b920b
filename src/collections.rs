//! Collection storage shared by the value model
//!
//! Dicts and sets keep insertion order for iteration and display, with a
//! hash index on normalised keys so `1`, `1.0`, `1u` and `1n` address the
//! same slot.

use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::{FromPrimitive, One, Signed, ToPrimitive, Zero};
use rustc_hash::FxHashMap;

use crate::number;
use crate::value::Value;

/// Hashable projection of a [`Value`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    Nil,
    Bool(bool),
    Int(i64),
    Big(BigInt),
    Float(u64),
    Decimal(String),
    Str(Rc<str>),
    Range(i64, i64, i64),
    Ptr(usize),
    Enum(usize, usize),
}

impl HashKey {
    pub fn from_value(value: &Value) -> Result<HashKey, String> {
        Ok(match value {
            Value::Nil => HashKey::Nil,
            Value::Bool(b) => HashKey::Bool(*b),
            Value::Int(n) => HashKey::Int(*n),
            Value::UInt(n) => match i64::try_from(*n) {
                Ok(n) => HashKey::Int(n),
                Err(_) => HashKey::Big(BigInt::from(*n)),
            },
            Value::Float(f) if f.is_finite() && f.fract() == 0.0 => match BigInt::from_f64(*f) {
                Some(big) => Self::from_bigint(&big),
                None => HashKey::Float(f.to_bits()),
            },
            // Fractional floats share the bigfloat key space so `1.5` and
            // `bigfloat("1.5")` address the same slot
            Value::Float(f) => match number::float_to_dec(*f) {
                Some(d) => HashKey::Decimal(d.normalized().to_string()),
                None => HashKey::Float(f.to_bits()),
            },
            Value::BigInt(b) => Self::from_bigint(b),
            Value::BigFloat(d) => {
                if d.is_integer() {
                    let (digits, _) = d.with_scale(0).into_bigint_and_exponent();
                    Self::from_bigint(&digits)
                } else {
                    HashKey::Decimal(d.normalized().to_string())
                }
            }
            Value::Str(s) => HashKey::Str(Rc::clone(s)),
            Value::Range(r) => HashKey::Range(r.start, r.end, r.step),
            Value::EnumValue(e) => HashKey::Enum(Rc::as_ptr(&e.def) as usize, e.ordinal),
            Value::Function(f) => HashKey::Ptr(Rc::as_ptr(f) as usize),
            Value::Class(c) => HashKey::Ptr(Rc::as_ptr(c) as usize),
            Value::Instance(i) => HashKey::Ptr(Rc::as_ptr(i) as usize),
            Value::Enum(e) => HashKey::Ptr(Rc::as_ptr(e) as usize),
            Value::Error(e) => HashKey::Ptr(Rc::as_ptr(e) as usize),
            other => return Err(format!("unhashable type: {}", other.type_name())),
        })
    }

    fn from_bigint(big: &BigInt) -> HashKey {
        match big.to_i64() {
            Some(n) => HashKey::Int(n),
            None => HashKey::Big(big.clone()),
        }
    }
}

/// Insertion-ordered dictionary
#[derive(Debug, Clone, Default)]
pub struct Dict {
    entries: Vec<(Value, Value)>,
    index: FxHashMap<HashKey, usize>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Value) -> Result<Option<Value>, String> {
        let hashed = HashKey::from_value(key)?;
        Ok(self.index.get(&hashed).map(|&i| self.entries[i].1.clone()))
    }

    pub fn contains(&self, key: &Value) -> Result<bool, String> {
        Ok(self.index.contains_key(&HashKey::from_value(key)?))
    }

    pub fn insert(&mut self, key: Value, value: Value) -> Result<(), String> {
        let hashed = HashKey::from_value(&key)?;
        match self.index.get(&hashed) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(hashed, self.entries.len());
                self.entries.push((key, value));
            }
        }
        Ok(())
    }

    pub fn remove(&mut self, key: &Value) -> Result<Option<Value>, String> {
        let hashed = HashKey::from_value(key)?;
        let Some(i) = self.index.remove(&hashed) else {
            return Ok(None);
        };
        let (_, value) = self.entries.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Ok(Some(value))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn entries(&self) -> &[(Value, Value)] {
        &self.entries
    }
}

/// Insertion-ordered set
#[derive(Debug, Clone, Default)]
pub struct Set {
    items: Vec<Value>,
    index: FxHashMap<HashKey, usize>,
}

impl Set {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Result<Self, String> {
        let mut set = Set::new();
        for value in values {
            set.insert(value)?;
        }
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, value: &Value) -> Result<bool, String> {
        Ok(self.index.contains_key(&HashKey::from_value(value)?))
    }

    /// Returns false when the value was already present
    pub fn insert(&mut self, value: Value) -> Result<bool, String> {
        let hashed = HashKey::from_value(&value)?;
        if self.index.contains_key(&hashed) {
            return Ok(false);
        }
        self.index.insert(hashed, self.items.len());
        self.items.push(value);
        Ok(true)
    }

    pub fn remove(&mut self, value: &Value) -> Result<bool, String> {
        let hashed = HashKey::from_value(value)?;
        let Some(i) = self.index.remove(&hashed) else {
            return Ok(false);
        };
        self.items.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Ok(true)
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }
}

/// Lazy integer range `start..end` stepping by `step`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: i64,
    pub end: i64,
    pub step: i64,
}

impl Range {
    pub fn new(start: i64, end: i64, step: i64) -> Self {
        Self { start, end, step }
    }

    pub fn len(&self) -> usize {
        let (start, end, step) = (self.start as i128, self.end as i128, self.step as i128);
        let span = if step > 0 { end - start } else { start - end };
        if span <= 0 || step == 0 {
            return 0;
        }
        let step = step.abs();
        ((span + step - 1) / step) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<i64> {
        if index >= self.len() {
            return None;
        }
        Some((self.start as i128 + index as i128 * self.step as i128) as i64)
    }

    pub fn contains(&self, n: i64) -> bool {
        let offset = n as i128 - self.start as i128;
        let step = self.step as i128;
        if step == 0 || offset % step != 0 {
            return false;
        }
        let index = offset / step;
        index >= 0 && (index as usize) < self.len()
    }

    /// Sub-range covering element positions `[from, to)`; positions at or
    /// past the last element map to `end`
    pub fn slice(&self, from: usize, to: usize) -> Range {
        let at = |index: usize| self.get(index).unwrap_or(self.end);
        let start = at(from);
        let end = if to > from { at(to) } else { start };
        Range::new(start, end, self.step)
    }
}

/// Range over arbitrary-precision integers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigRange {
    pub start: BigInt,
    pub end: BigInt,
    pub step: BigInt,
}

impl BigRange {
    pub fn new(start: BigInt, end: BigInt, step: BigInt) -> Self {
        Self { start, end, step }
    }

    pub fn len(&self) -> BigInt {
        if self.step.is_zero() {
            return BigInt::zero();
        }
        let span = if self.step.is_positive() {
            &self.end - &self.start
        } else {
            &self.start - &self.end
        };
        if !span.is_positive() {
            return BigInt::zero();
        }
        let step = self.step.abs();
        (span + &step - BigInt::one()) / step
    }

    pub fn get(&self, index: &BigInt) -> Option<BigInt> {
        if index.is_negative() || *index >= self.len() {
            return None;
        }
        Some(&self.start + index * &self.step)
    }

    pub fn contains(&self, n: &BigInt) -> bool {
        if self.step.is_zero() {
            return false;
        }
        let offset = n - &self.start;
        if !(&offset % &self.step).is_zero() {
            return false;
        }
        self.get(&(offset / &self.step)).is_some()
    }
}

/// Where an iterator draws its elements from
#[derive(Debug, Clone)]
pub enum IterSource {
    List(Rc<std::cell::RefCell<Vec<Value>>>),
    Chars(Rc<[char]>),
    Buffer(Rc<std::cell::RefCell<Vec<u8>>>),
    Range(Range),
    BigRange(Rc<BigRange>),
    /// Snapshot of dict keys or set members taken when iteration starts
    Values(Rc<[Value]>),
}

/// Cursor implementing the index / hasNext / next protocol
#[derive(Debug, Clone)]
pub struct IterState {
    pub source: IterSource,
    pub index: usize,
}

impl IterState {
    pub fn new(source: IterSource) -> Self {
        Self { source, index: 0 }
    }

    pub fn has_next(&self) -> bool {
        match &self.source {
            IterSource::List(items) => self.index < items.borrow().len(),
            IterSource::Chars(chars) => self.index < chars.len(),
            IterSource::Buffer(bytes) => self.index < bytes.borrow().len(),
            IterSource::Range(range) => self.index < range.len(),
            IterSource::BigRange(range) => BigInt::from(self.index) < range.len(),
            IterSource::Values(values) => self.index < values.len(),
        }
    }

    pub fn next_value(&mut self) -> Option<Value> {
        let value = match &self.source {
            IterSource::List(items) => items.borrow().get(self.index).cloned(),
            IterSource::Chars(chars) => chars.get(self.index).map(|c| Value::str(c.to_string())),
            IterSource::Buffer(bytes) => bytes.borrow().get(self.index).map(|b| Value::Int(i64::from(*b))),
            IterSource::Range(range) => range.get(self.index).map(Value::Int),
            IterSource::BigRange(range) => range.get(&BigInt::from(self.index)).map(Value::big_int),
            IterSource::Values(values) => values.get(self.index).cloned(),
        }?;
        self.index += 1;
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_keys_share_a_slot() {
        let mut dict = Dict::new();
        dict.insert(Value::Int(1), Value::str("int")).unwrap();
        dict.insert(Value::Float(1.0), Value::str("float")).unwrap();
        dict.insert(Value::UInt(1), Value::str("uint")).unwrap();
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.get(&Value::big_int(BigInt::from(1))).unwrap(), Some(Value::str("uint")));
    }

    #[test]
    fn test_fractional_float_and_bigfloat_share_a_slot() {
        let mut set = Set::new();
        set.insert(Value::Float(1.5)).unwrap();
        let dec = number::to_bigfloat(&Value::str("1.50")).unwrap();
        assert!(set.contains(&dec).unwrap());
        assert!(!set.insert(dec).unwrap());
        assert!(!set.contains(&Value::Float(2.5)).unwrap());
    }

    #[test]
    fn test_dict_remove_keeps_order() {
        let mut dict = Dict::new();
        for (i, key) in ["a", "b", "c"].iter().enumerate() {
            dict.insert(Value::str(*key), Value::Int(i as i64)).unwrap();
        }
        assert_eq!(dict.remove(&Value::str("a")).unwrap(), Some(Value::Int(0)));
        assert_eq!(dict.keys(), vec![Value::str("b"), Value::str("c")]);
        assert_eq!(dict.get(&Value::str("c")).unwrap(), Some(Value::Int(2)));
    }

    #[test]
    fn test_lists_are_unhashable() {
        let mut set = Set::new();
        assert!(set.insert(Value::list(vec![])).is_err());
    }

    #[test]
    fn test_range_len_and_contains() {
        let range = Range::new(0, 10, 3);
        assert_eq!(range.len(), 4);
        assert_eq!(range.get(3), Some(9));
        assert!(range.contains(6));
        assert!(!range.contains(7));
        assert!(Range::new(5, 0, 1).is_empty());
        assert_eq!(Range::new(5, 0, -2).len(), 3);
    }

    #[test]
    fn test_range_slice_stays_in_bounds() {
        let range = Range::new(0, 10, 3);
        assert_eq!(range.slice(1, 3), Range::new(3, 9, 3));
        assert_eq!(range.slice(1, 4), Range::new(3, 10, 3));
        assert!(range.slice(4, 4).is_empty());

        let wide = Range::new(0, i64::MAX, 5_000_000_000_000_000_000);
        assert_eq!(wide.len(), 2);
        assert_eq!(wide.slice(0, 2), wide);
        assert_eq!(wide.slice(1, 2).get(0), Some(5_000_000_000_000_000_000));
    }

    #[test]
    fn test_big_range() {
        let range = BigRange::new(BigInt::from(0), BigInt::from(10), BigInt::from(2));
        assert_eq!(range.len(), BigInt::from(5));
        assert!(range.contains(&BigInt::from(8)));
        assert!(!range.contains(&BigInt::from(10)));
    }
}
