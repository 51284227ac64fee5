use std::collections::HashMap;

/// Interned identifier for a property or method name.
///
/// The numeric id doubles as the symbol's hash: lookup tables index with
/// `id % capacity` directly, no secondary hash function. Id 0 is reserved
/// as the empty-slot marker, so zeroed table memory reads as an empty
/// table; the interner hands out ids starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Symbol(u32);

impl Symbol {
    /// Marker for an unoccupied table slot. Never a real symbol.
    pub(crate) const EMPTY: Symbol = Symbol(0);

    /// Wrap a raw id. Panics on the reserved id 0 — callers outside the
    /// interner only hit this when hand-building symbols in test setups
    /// or compiler tables, where id 0 is always a bug.
    pub fn new(id: u32) -> Symbol {
        assert!(id != 0, "symbol id 0 is reserved for empty table slots");
        Symbol(id)
    }

    /// Wrap a raw id without the reserved-id check. Wire decoding uses
    /// this to represent empty slots.
    pub(crate) const fn from_raw(id: u32) -> Symbol {
        Symbol(id)
    }

    #[inline]
    pub fn id(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Owned interning context mapping name strings to stable symbols.
///
/// Passed explicitly to whatever needs it — never process-global — so
/// tests and embedders can hold independent symbol spaces. Assumed fully
/// populated before any table lookup runs.
#[derive(Debug, Default)]
pub struct SymbolTable {
    names: Vec<Box<str>>,
    ids: HashMap<Box<str>, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// Return the symbol for `name`, interning it on first sight.
    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(&sym) = self.ids.get(name) {
            return sym;
        }
        self.names.push(name.into());
        let sym = Symbol(self.names.len() as u32);
        self.ids.insert(name.into(), sym);
        sym
    }

    /// Look up an already-interned name without creating it.
    pub fn get(&self, name: &str) -> Option<Symbol> {
        self.ids.get(name).copied()
    }

    /// Reverse lookup, for diagnostics.
    pub fn resolve(&self, sym: Symbol) -> Option<&str> {
        if sym == Symbol::EMPTY {
            return None;
        }
        self.names.get(sym.0 as usize - 1).map(|s| &**s)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_stable() {
        let mut syms = SymbolTable::new();
        let x = syms.intern("x");
        let y = syms.intern("y");
        assert_ne!(x, y);
        assert_eq!(syms.intern("x"), x);
        assert_eq!(syms.intern("y"), y);
        assert_eq!(syms.len(), 2);
    }

    #[test]
    fn ids_start_at_one() {
        let mut syms = SymbolTable::new();
        assert_eq!(syms.intern("first").id(), 1);
        assert_ne!(syms.intern("first"), Symbol::EMPTY);
    }

    #[test]
    fn resolve_round_trips() {
        let mut syms = SymbolTable::new();
        let norm = syms.intern("norm");
        assert_eq!(syms.resolve(norm), Some("norm"));
        assert_eq!(syms.resolve(Symbol::EMPTY), None);
        assert_eq!(syms.resolve(Symbol::new(999)), None);
    }

    #[test]
    fn independent_tables_are_independent() {
        let mut a = SymbolTable::new();
        let mut b = SymbolTable::new();
        a.intern("only-in-a");
        assert_eq!(b.get("only-in-a"), None);
        assert_eq!(b.intern("other").id(), 1);
    }

    #[test]
    #[should_panic(expected = "reserved")]
    fn zero_id_is_rejected() {
        let _ = Symbol::new(0);
    }
}
