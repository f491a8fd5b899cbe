use std::{cell::RefCell, fmt, rc::Rc};

use indexmap::IndexMap;

use crate::value::Value;

pub type ScopeRef = Rc<RefCell<Scope>>;

/// A binding table linked to its enclosing scope.
///
/// Scopes are shared: every child scope and every closure created while
/// a scope is reachable holds a strong reference to it, so a scope lives
/// as long as its longest holder rather than until its block ends.
#[derive(Debug, Default)]
pub struct Scope {
    parent: Option<ScopeRef>,
    bindings: IndexMap<String, Binding>,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Value,
    pub doc: Option<String>,
}

impl Scope {
    pub fn new_root() -> ScopeRef {
        Rc::new(RefCell::new(Self::default()))
    }

    pub fn with_parent(parent: ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Self {
            parent: Some(parent),
            bindings: IndexMap::new(),
        }))
    }

    /// Inserts or overwrites a binding in this table only.
    pub fn bind(&mut self, name: impl Into<String>, value: Value, doc: Option<String>) {
        self.bindings.insert(name.into(), Binding { value, doc });
    }

    pub fn lookup(scope: &ScopeRef, name: &str) -> Option<Value> {
        Scope::resolve(scope, name).map(|binding| binding.value)
    }

    /// Documentation recorded for `name`, or the empty string.
    pub fn doc(scope: &ScopeRef, name: &str) -> String {
        Scope::resolve(scope, name)
            .and_then(|binding| binding.doc)
            .unwrap_or_default()
    }

    /// Topmost scope of the parent chain.
    pub fn root(scope: &ScopeRef) -> ScopeRef {
        let mut current = Rc::clone(scope);
        loop {
            let parent = current.borrow().parent.clone();
            match parent {
                Some(parent) => current = parent,
                None => return current,
            }
        }
    }

    fn resolve(scope: &ScopeRef, name: &str) -> Option<Binding> {
        if let Some(binding) = scope.borrow().bindings.get(name) {
            return Some(binding.clone());
        }
        let parent = scope.borrow().parent.clone();
        match parent {
            Some(parent) => Scope::resolve(&parent, name),
            None => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "scope ({} bindings)", self.bindings.len())?;
        for (name, binding) in &self.bindings {
            writeln!(f, "  {name} = {:?}", binding.value)?;
        }
        if let Some(parent) = &self.parent {
            write!(f, "{}", parent.borrow())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_parent_chain() {
        let root = Scope::new_root();
        root.borrow_mut()
            .bind("x", Value::number(1.0), Some("the x".into()));
        let child = Scope::with_parent(Rc::clone(&root));
        let grandchild = Scope::with_parent(Rc::clone(&child));

        assert_eq!(Scope::lookup(&grandchild, "x"), Some(Value::number(1.0)));
        assert_eq!(Scope::doc(&grandchild, "x"), "the x");
        assert_eq!(Scope::lookup(&grandchild, "y"), None);
        assert_eq!(Scope::doc(&grandchild, "y"), "");
    }

    #[test]
    fn bind_shadows_locally() {
        let root = Scope::new_root();
        root.borrow_mut().bind("x", Value::number(1.0), None);
        let child = Scope::with_parent(Rc::clone(&root));
        child.borrow_mut().bind("x", Value::number(2.0), None);

        assert_eq!(Scope::lookup(&child, "x"), Some(Value::number(2.0)));
        assert_eq!(Scope::lookup(&root, "x"), Some(Value::number(1.0)));
    }

    #[test]
    fn root_is_top_of_chain() {
        let root = Scope::new_root();
        let child = Scope::with_parent(Rc::clone(&root));
        let grandchild = Scope::with_parent(child);
        assert!(Rc::ptr_eq(&Scope::root(&grandchild), &root));
        assert!(Rc::ptr_eq(&Scope::root(&root), &root));
    }
}
