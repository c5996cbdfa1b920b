//! Expression evaluation

use std::rc::Rc;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;

use super::{fail, Eval, Interpreter, Unwind};
use crate::ast::{Arg, BinaryOp, Expr, Literal, LogicalOp, NodeId, UnaryOp};
use crate::collections::{BigRange, Dict, Range};
use crate::environment;
use crate::error::ErrorKind;
use crate::number;
use crate::object::Function;
use crate::token::Span;
use crate::value::Value;

impl Interpreter {
    pub(crate) fn evaluate(&mut self, expr: &Expr) -> Eval {
        match expr {
            Expr::Literal { value, span } => Self::literal(value, *span),

            Expr::Variable { name, id, span } => self.lookup_variable(name, *id, *span),

            Expr::Assign {
                name,
                op,
                value,
                id,
                span,
            } => {
                let rhs = self.evaluate(value)?;
                let value = match op {
                    Some(op) => {
                        let current = self.lookup_variable(name, *id, *span)?;
                        self.binary(*op, &current, &rhs, *span)?
                    }
                    None => rhs,
                };
                self.assign_variable(name, *id, value.clone(), *span)?;
                Ok(value)
            }

            Expr::Binary {
                left,
                op,
                right,
                span,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                self.binary(*op, &left, &right, *span)
            }

            Expr::Unary { op, operand, span } => {
                let value = self.evaluate(operand)?;
                match op {
                    UnaryOp::Neg => Ok(number::negate(&value)),
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                    UnaryOp::BitNot => number::bit_not(&value).map_err(|kind| fail(kind, *span)),
                }
            }

            Expr::Logical {
                left, op, right, ..
            } => {
                let left = self.evaluate(left)?;
                match op {
                    LogicalOp::Or if left.is_truthy() => Ok(left),
                    LogicalOp::And if !left.is_truthy() => Ok(left),
                    _ => self.evaluate(right),
                }
            }

            Expr::Ternary {
                condition,
                then_expr,
                else_expr,
                ..
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(then_expr)
                } else {
                    self.evaluate(else_expr)
                }
            }

            Expr::Grouping { expr, .. } => self.evaluate(expr),

            Expr::Call { callee, args, span } => {
                let callee = self.evaluate(callee)?;
                let args = self.evaluate_args(args, *span)?;
                self.call_value(callee, args, *span)
            }

            Expr::Get { object, name, span } => {
                let object = self.evaluate(object)?;
                self.get_property(&object, name, *span)
            }

            Expr::Set {
                object,
                name,
                op,
                value,
                span,
            } => {
                let object = self.evaluate(object)?;
                let rhs = self.evaluate(value)?;
                let value = match op {
                    Some(op) => {
                        let current = self.get_property(&object, name, *span)?;
                        self.binary(*op, &current, &rhs, *span)?
                    }
                    None => rhs,
                };
                self.set_property(&object, name, value.clone(), *span)?;
                Ok(value)
            }

            Expr::Index {
                object,
                index,
                span,
            } => {
                let object = self.evaluate(object)?;
                let index = self.evaluate(index)?;
                self.index(&object, &index, *span)
            }

            Expr::Slice {
                object,
                start,
                end,
                span,
            } => {
                let object = self.evaluate(object)?;
                let start = start.as_ref().map(|e| self.evaluate(e)).transpose()?;
                let end = end.as_ref().map(|e| self.evaluate(e)).transpose()?;
                self.slice(&object, start.as_ref(), end.as_ref(), *span)
            }

            Expr::IndexSet {
                object,
                index,
                op,
                value,
                span,
            } => {
                let object = self.evaluate(object)?;
                let index = self.evaluate(index)?;
                let rhs = self.evaluate(value)?;
                let value = match op {
                    Some(op) => {
                        let current = self.index(&object, &index, *span)?;
                        self.binary(*op, &current, &rhs, *span)?
                    }
                    None => rhs,
                };
                self.index_set(&object, &index, value.clone(), *span)?;
                Ok(value)
            }

            Expr::This { id, span } => self.lookup_variable("this", *id, *span),

            Expr::Super { method, id, span } => self.super_method(method, *id, *span),

            Expr::Lambda { decl, .. } => Ok(Value::Function(Rc::new(Function::new(
                Rc::clone(decl),
                Rc::clone(&self.environment),
                false,
            )))),

            Expr::List { items, span } => Ok(Value::list(self.evaluate_args(items, *span)?)),

            Expr::Dict { entries, span } => {
                let mut dict = Dict::new();
                for (key, value) in entries {
                    let key = self.evaluate(key)?;
                    let value = self.evaluate(value)?;
                    dict.insert(key, value)
                        .map_err(|message| fail(ErrorKind::Runtime(message), *span))?;
                }
                Ok(Value::dict(dict))
            }

            Expr::Range { start, end, span } => {
                let start = self.evaluate(start)?;
                let end = self.evaluate(end)?;
                Self::make_range(&start, &end, None, *span)
            }
        }
    }

    fn literal(value: &Literal, span: Span) -> Eval {
        Ok(match value {
            Literal::Nil => Value::Nil,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(n) => Value::Int(*n),
            Literal::UInt(n) => Value::UInt(*n),
            Literal::Float(f) => Value::Float(*f),
            Literal::BigInt(digits) => digits
                .parse::<BigInt>()
                .map(Value::big_int)
                .map_err(|_| fail(ErrorKind::InvalidNumber(digits.clone()), span))?,
            Literal::BigFloat(digits) => digits
                .parse::<BigDecimal>()
                .map(Value::big_float)
                .map_err(|_| fail(ErrorKind::InvalidNumber(digits.clone()), span))?,
            Literal::String(s) => Value::Str(Rc::clone(s)),
        })
    }

    /// Evaluate call arguments or list items left to right, expanding spreads in place
    fn evaluate_args(&mut self, args: &[Arg], span: Span) -> Result<Vec<Value>, Unwind> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Arg::Plain(expr) => values.push(self.evaluate(expr)?),
                Arg::Spread(expr) => {
                    let iterable = self.evaluate(expr)?;
                    values.extend(self.collect_iterable(iterable, span)?);
                }
            }
        }
        Ok(values)
    }

    pub(crate) fn binary(&mut self, op: BinaryOp, left: &Value, right: &Value, span: Span) -> Eval {
        match op {
            BinaryOp::Add
            | BinaryOp::Sub
            | BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Mod
            | BinaryOp::Pow => number::arithmetic(op, left, right).map_err(|kind| fail(kind, span)),
            BinaryOp::Eq => Ok(Value::Bool(left == right)),
            BinaryOp::Ne => Ok(Value::Bool(left != right)),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                Ok(number::ordering(op, left, right))
            }
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::Shl | BinaryOp::Shr => {
                number::bitwise(op, left, right).map_err(|kind| fail(kind, span))
            }
            BinaryOp::In => Ok(Value::Bool(self.contains(right, left, span)?)),
        }
    }

    fn super_method(&mut self, method: &str, id: NodeId, span: Span) -> Eval {
        let distance = self
            .distance(id)
            .filter(|&d| d > 0)
            .ok_or_else(|| fail(ErrorKind::Internal("unresolved 'super'".into()), span))?;
        let superclass = environment::get_at(&self.environment, distance, "super")?;
        // `this` always lives one scope inside `super`
        let instance = environment::get_at(&self.environment, distance - 1, "this")?;

        let Value::Class(superclass) = superclass else {
            return Err(fail(
                ErrorKind::SuperclassNotClass(superclass.type_name().to_string()),
                span,
            ));
        };
        match superclass.find_method(method) {
            Some(found) => Ok(Value::Function(Rc::new(found.bind(instance)))),
            None => Err(fail(ErrorKind::UndefinedProperty(method.to_string()), span)),
        }
    }

    /// Build a range from integer-valued bounds; bigint bounds give a big range
    pub(crate) fn make_range(start: &Value, end: &Value, step: Option<&Value>, span: Span) -> Eval {
        let step_value = step.cloned().unwrap_or(Value::Int(1));
        let small = (
            number::to_index(start),
            number::to_index(end),
            number::to_index(&step_value),
        );
        let any_big = [Some(start), Some(end), step]
            .into_iter()
            .flatten()
            .any(|v| matches!(v, Value::BigInt(_) | Value::BigFloat(_)));

        if let (Some(s), Some(e), Some(st), false) = (small.0, small.1, small.2, any_big) {
            if st == 0 {
                return Err(fail(ErrorKind::Runtime("range step cannot be zero".into()), span));
            }
            return Ok(Value::Range(Range::new(s, e, st)));
        }

        let bound = |v: &Value| {
            number::big_of(v).ok_or_else(|| {
                fail(
                    ErrorKind::TypeMismatch("integer range bound".into(), v.type_name().into()),
                    span,
                )
            })
        };
        let (s, e, st) = (bound(start)?, bound(end)?, bound(&step_value)?);
        if *st == BigInt::from(0) {
            return Err(fail(ErrorKind::Runtime("range step cannot be zero".into()), span));
        }
        Ok(Value::BigRange(Rc::new(BigRange::new(
            (*s).clone(),
            (*e).clone(),
            (*st).clone(),
        ))))
    }
}
