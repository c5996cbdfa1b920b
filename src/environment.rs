//! Variable environment for Quill
//!
//! Scopes form a chain of shared nodes: a child points at its enclosing
//! scope, never the other way round. Closures keep their defining scope
//! alive through the `Rc`, and every write lands on the shared node, so
//! two closures over the same scope see each other's updates.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::{ErrorKind, QuillError, Result};
use crate::value::Value;

/// Shared handle to a scope
pub type Env = Rc<RefCell<Environment>>;

/// Variable environment with lexical scoping
#[derive(Debug, Default)]
pub struct Environment {
    values: FxHashMap<String, Value>,
    enclosing: Option<Env>,
}

impl Environment {
    /// Create a new global environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh root scope behind a shared handle
    pub fn global() -> Env {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Create a child scope of `enclosing`
    pub fn child(enclosing: &Env) -> Env {
        Rc::new(RefCell::new(Self {
            values: FxHashMap::default(),
            enclosing: Some(Rc::clone(enclosing)),
        }))
    }

    /// Bind `name` in this scope only, overwriting any existing binding here
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Look `name` up by walking outward
    pub fn get(&self, name: &str) -> Result<Value> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(parent) = &self.enclosing {
            parent.borrow().get(name)
        } else {
            Err(QuillError::new(
                ErrorKind::UndefinedVariable(name.to_string()),
                None,
            ))
        }
    }

    /// Overwrite the nearest existing binding of `name`
    pub fn assign(&mut self, name: &str, value: Value) -> Result<()> {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value;
            Ok(())
        } else if let Some(parent) = &self.enclosing {
            parent.borrow_mut().assign(name, value)
        } else {
            Err(QuillError::new(
                ErrorKind::UndefinedVariable(name.to_string()),
                None,
            ))
        }
    }

    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

/// Scope `distance` hops out from `env` (0 is `env` itself)
pub fn ancestor(env: &Env, distance: usize) -> Result<Env> {
    let mut current = Rc::clone(env);
    for _ in 0..distance {
        let next = current.borrow().enclosing.clone();
        current = next.ok_or_else(|| {
            QuillError::from(ErrorKind::Internal(format!(
                "scope chain shorter than resolved distance {}",
                distance
            )))
        })?;
    }
    Ok(current)
}

/// Read `name` from exactly the scope `distance` hops out
pub fn get_at(env: &Env, distance: usize, name: &str) -> Result<Value> {
    ancestor(env, distance)?
        .borrow()
        .get_local(name)
        .ok_or_else(|| {
            QuillError::from(ErrorKind::Internal(format!(
                "'{}' not bound at distance {}",
                name, distance
            )))
        })
}

/// Overwrite `name` in exactly the scope `distance` hops out
pub fn assign_at(env: &Env, distance: usize, name: &str, value: Value) -> Result<()> {
    let scope = ancestor(env, distance)?;
    let mut scope = scope.borrow_mut();
    match scope.values.get_mut(name) {
        Some(slot) => {
            *slot = value;
            Ok(())
        }
        None => Err(QuillError::from(ErrorKind::Internal(format!(
            "'{}' not bound at distance {}",
            name, distance
        )))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_in_child_shadows_parent() {
        let parent = Environment::global();
        parent.borrow_mut().define("x", Value::Int(1));
        let child = Environment::child(&parent);
        child.borrow_mut().define("x", Value::Int(2));

        assert_eq!(child.borrow().get("x").unwrap(), Value::Int(2));
        assert_eq!(parent.borrow().get("x").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_assign_walks_outward() {
        let parent = Environment::global();
        parent.borrow_mut().define("x", Value::Int(1));
        let child = Environment::child(&parent);
        child.borrow_mut().assign("x", Value::Int(5)).unwrap();

        assert_eq!(parent.borrow().get("x").unwrap(), Value::Int(5));
        assert!(!child.borrow().contains_local("x"));
    }

    #[test]
    fn test_undefined_variable() {
        let env = Environment::global();
        let err = env.borrow().get("missing").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UndefinedVariable(ref n) if n == "missing"));
        let err = env.borrow_mut().assign("missing", Value::Nil).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UndefinedVariable(_)));
    }

    #[test]
    fn test_get_at_matches_linear_walk() {
        let root = Environment::global();
        root.borrow_mut().define("a", Value::Int(1));
        let mid = Environment::child(&root);
        mid.borrow_mut().define("b", Value::Int(2));
        let leaf = Environment::child(&mid);

        assert_eq!(get_at(&leaf, 2, "a").unwrap(), leaf.borrow().get("a").unwrap());
        assert_eq!(get_at(&leaf, 1, "b").unwrap(), leaf.borrow().get("b").unwrap());
    }

    #[test]
    fn test_get_at_wrong_distance_is_internal() {
        let root = Environment::global();
        root.borrow_mut().define("a", Value::Int(1));
        let leaf = Environment::child(&root);

        assert!(matches!(get_at(&leaf, 0, "a").unwrap_err().kind, ErrorKind::Internal(_)));
        assert!(matches!(get_at(&leaf, 5, "a").unwrap_err().kind, ErrorKind::Internal(_)));
    }

    #[test]
    fn test_assign_at_is_visible_through_shared_scope() {
        let root = Environment::global();
        root.borrow_mut().define("n", Value::Int(0));
        let first = Environment::child(&root);
        let second = Environment::child(&root);

        assign_at(&first, 1, "n", Value::Int(7)).unwrap();
        assert_eq!(get_at(&second, 1, "n").unwrap(), Value::Int(7));
    }
}
