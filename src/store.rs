//! The store: an immutable map from addresses to values
//!
//! Extension never mutates; it hands back a new store sharing structure
//! with the old one, so every previously reified machine state keeps a
//! valid store. That property is what makes the step relation replayable.

use im::OrdMap;

use crate::addr::Addr;
use crate::value::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Store {
    map: OrdMap<Addr, Value>,
}

impl Store {
    /// The empty store, binding no addresses.
    pub fn new() -> Self {
        Self { map: OrdMap::new() }
    }

    /// Look up an address. `None` means the address is unbound.
    pub fn get(&self, addr: &Addr) -> Option<&Value> {
        self.map.get(addr)
    }

    /// Extend the store with a binding, overriding any previous binding
    /// for the same address. Logarithmic, with structural sharing.
    pub fn extend(&self, addr: Addr, value: Value) -> Store {
        Store {
            map: self.map.update(addr, value),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::PointerGen;

    #[test]
    fn empty_store_binds_nothing() {
        let mut gen = PointerGen::new();
        let fp = gen.fresh_frame();
        let store = Store::new();
        assert!(store.is_empty());
        assert_eq!(store.get(&fp.offset("$x")), None);
    }

    #[test]
    fn extend_leaves_the_old_store_intact() {
        let mut gen = PointerGen::new();
        let fp = gen.fresh_frame();
        let s0 = Store::new();
        let s1 = s0.extend(fp.offset("$x"), Value::Int(1));
        let s2 = s1.extend(fp.offset("$x"), Value::Int(2));

        assert_eq!(s0.get(&fp.offset("$x")), None);
        assert_eq!(s1.get(&fp.offset("$x")), Some(&Value::Int(1)));
        assert_eq!(s2.get(&fp.offset("$x")), Some(&Value::Int(2)));
    }

    #[test]
    fn extend_preserves_unrelated_bindings() {
        let mut gen = PointerGen::new();
        let fp = gen.fresh_frame();
        let op = gen.fresh_object();
        let s = Store::new()
            .extend(fp.offset("$a"), Value::Int(10))
            .extend(op.offset("v"), Value::Null)
            .extend(fp.offset("$a"), Value::Int(11));

        assert_eq!(s.get(&fp.offset("$a")), Some(&Value::Int(11)));
        assert_eq!(s.get(&op.offset("v")), Some(&Value::Null));
        assert_eq!(s.len(), 2);
    }
}
