use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    Global,
    Local,
}

/// A name bound in some scope: where it lives and its slot index. Indices
/// are dense and assigned in definition order within each scope class, so
/// they double as direct offsets into the globals array or the local slots.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// Nested name→symbol tables. The root table defines globals; every enclosed
/// table defines locals. Resolution walks outward to the innermost enclosing
/// definition.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    pub outer: Option<Box<SymbolTable>>,
    store: HashMap<String, Symbol>,
    pub num_definitions: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    pub fn new_enclosed(outer: SymbolTable) -> Self {
        SymbolTable {
            outer: Some(Box::new(outer)),
            store: HashMap::new(),
            num_definitions: 0,
        }
    }

    pub fn define(&mut self, name: &str) -> Symbol {
        let scope = if self.outer.is_none() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };

        let symbol = Symbol {
            name: name.to_string(),
            scope,
            index: self.num_definitions,
        };

        self.store.insert(name.to_string(), symbol.clone());
        self.num_definitions += 1;
        symbol
    }

    pub fn resolve(&self, name: &str) -> Option<Symbol> {
        match self.store.get(name) {
            Some(symbol) => Some(symbol.clone()),
            None => self.outer.as_ref().and_then(|outer| outer.resolve(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_global() {
        let mut table = SymbolTable::new();

        let a = table.define("a");
        assert_eq!(a.scope, SymbolScope::Global);
        assert_eq!(a.index, 0);

        let b = table.define("b");
        assert_eq!(b.scope, SymbolScope::Global);
        assert_eq!(b.index, 1);
    }

    #[test]
    fn test_resolve_global() {
        let mut table = SymbolTable::new();
        table.define("a");
        table.define("b");

        let a = table.resolve("a").expect("a should resolve");
        assert_eq!(a.scope, SymbolScope::Global);
        assert_eq!(a.index, 0);

        let b = table.resolve("b").expect("b should resolve");
        assert_eq!(b.index, 1);

        assert_eq!(table.resolve("c"), None);
    }

    #[test]
    fn test_define_local() {
        let mut global = SymbolTable::new();
        global.define("a");

        let mut local = SymbolTable::new_enclosed(global);
        let b = local.define("b");
        assert_eq!(b.scope, SymbolScope::Local);
        assert_eq!(b.index, 0, "local indices restart at zero");

        let c = local.define("c");
        assert_eq!(c.scope, SymbolScope::Local);
        assert_eq!(c.index, 1);
    }

    #[test]
    fn test_resolve_through_outer() {
        let mut global = SymbolTable::new();
        global.define("a");

        let mut local = SymbolTable::new_enclosed(global);
        local.define("b");

        let a = local.resolve("a").expect("a resolves through outer");
        assert_eq!(a.scope, SymbolScope::Global);
        assert_eq!(a.index, 0);

        let b = local.resolve("b").expect("b resolves locally");
        assert_eq!(b.scope, SymbolScope::Local);
        assert_eq!(b.index, 0);
    }

    #[test]
    fn test_shadowing() {
        let mut global = SymbolTable::new();
        global.define("a");

        let mut local = SymbolTable::new_enclosed(global);
        local.define("a");

        let a = local.resolve("a").expect("a should resolve");
        assert_eq!(a.scope, SymbolScope::Local, "inner definition wins");
        assert_eq!(a.index, 0);
    }

    #[test]
    fn test_nested_local_indices_are_dense() {
        let mut global = SymbolTable::new();
        global.define("a");
        global.define("b");

        let mut first = SymbolTable::new_enclosed(global);
        first.define("c");
        first.define("d");

        let mut second = SymbolTable::new_enclosed(first);
        let e = second.define("e");
        let f = second.define("f");

        assert_eq!(e.index, 0);
        assert_eq!(f.index, 1);
    }
}
