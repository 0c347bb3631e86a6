use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::lang::value::Value;

/// A binding environment for the tree-walking backend. Environments nest:
/// function bodies evaluate in an environment enclosed by the one the
/// function was created in.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    store: HashMap<String, Value>,
    outer: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment::default()
    }

    pub fn new_enclosed(outer: Rc<RefCell<Environment>>) -> Self {
        Environment {
            store: HashMap::new(),
            outer: Some(outer),
        }
    }

    /// Looks a name up here, then outward.
    pub fn get(&self, name: &str) -> Option<Value> {
        match self.store.get(name) {
            Some(value) => Some(value.clone()),
            None => self
                .outer
                .as_ref()
                .and_then(|outer| outer.borrow().get(name)),
        }
    }

    /// Binds a name in this environment, shadowing any outer binding.
    pub fn set(&mut self, name: &str, value: Value) {
        self.store.insert(name.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_and_set() {
        let mut env = Environment::new();
        env.set("a", Value::Integer(1));

        assert_eq!(env.get("a"), Some(Value::Integer(1)));
        assert_eq!(env.get("b"), None);
    }

    #[test]
    fn test_enclosed_lookup_walks_outward() {
        let outer = Rc::new(RefCell::new(Environment::new()));
        outer.borrow_mut().set("a", Value::Integer(1));

        let mut inner = Environment::new_enclosed(Rc::clone(&outer));
        inner.set("b", Value::Integer(2));

        assert_eq!(inner.get("a"), Some(Value::Integer(1)));
        assert_eq!(inner.get("b"), Some(Value::Integer(2)));
    }

    #[test]
    fn test_inner_binding_shadows_outer() {
        let outer = Rc::new(RefCell::new(Environment::new()));
        outer.borrow_mut().set("a", Value::Integer(1));

        let mut inner = Environment::new_enclosed(Rc::clone(&outer));
        inner.set("a", Value::Integer(2));

        assert_eq!(inner.get("a"), Some(Value::Integer(2)));
        assert_eq!(outer.borrow().get("a"), Some(Value::Integer(1)));
    }
}
