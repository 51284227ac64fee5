pub mod wire;

use crate::heap::RecordRef;
use crate::symbol::Symbol;
use crate::value::RawValue;

/// Native code entry resolved from a shape's method table. Invocation
/// conventions beyond "it is a function pointer" are the compiler's
/// business; this core only resolves the pointer.
pub type Method = fn(RecordRef, &[RawValue]) -> RawValue;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("no property {symbol} on shape '{shape}'")]
    NoSuchProperty { shape: String, symbol: Symbol },
    #[error("no method {symbol} on shape '{shape}'")]
    NoSuchMethod { shape: String, symbol: Symbol },
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("symbol {symbol} inserted twice into shape '{shape}'")]
    DuplicateSymbol { shape: String, symbol: Symbol },
    #[error("table of capacity {capacity} is full, cannot insert {symbol} into shape '{shape}'")]
    TableFull { shape: String, symbol: Symbol, capacity: usize },
    #[error("offset {offset} out of range for shape '{shape}' with {slots} slots")]
    OffsetOutOfRange { shape: String, offset: u32, slots: u32 },
    #[error("shape '{shape}' offsets are not a permutation of 0..{slots} (offset {offset} repeats)")]
    OffsetClash { shape: String, offset: u32, slots: u32 },
}

// Table slots are (symbol, payload) pairs; symbol EMPTY marks a free
// slot, which is what zeroed memory reads as.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PropSlot {
    pub(crate) symbol: Symbol,
    pub(crate) offset: u32,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct MethodSlot {
    pub(crate) symbol: Symbol,
    pub(crate) func: Option<Method>,
}

/// Immutable descriptor of one record shape.
///
/// Holds the two open-addressed tables: property symbol → slot offset
/// (in value-sized units from the start of the instance's data area)
/// and method symbol → function pointer. Capacities are fixed when the
/// definition is built and never change; every instance of the shape
/// points at the same shared definition, which the heap keeps alive as
/// long as any instance can.
///
/// Lookup probes linearly from `symbol % capacity`, wrapping at the
/// table end, and is bounded: after at most `capacity` steps (or on the
/// first empty slot — the builder never leaves gaps in a probe chain)
/// an absent symbol is reported as a typed [`ShapeError`] rather than
/// looping. Correct at any load factor up to and including 100%.
pub struct RecordDef {
    name: Box<str>,
    props: Box<[PropSlot]>,
    methods: Box<[MethodSlot]>,
    slot_count: u32,
}

fn probe<T: Copy>(table: &[T], symbol: Symbol, sym_of: fn(&T) -> Symbol) -> Option<T> {
    if table.is_empty() {
        return None;
    }
    let cap = table.len();
    let home = symbol.id() as usize % cap;
    for step in 0..cap {
        let slot = &table[(home + step) % cap];
        let at = sym_of(slot);
        if at == symbol {
            return Some(*slot);
        }
        if at == Symbol::EMPTY {
            return None;
        }
    }
    // Full wrap without a hit: table is at 100% load and the symbol
    // is simply not in it.
    None
}

impl RecordDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Distinct property count — the number of value slots an instance
    /// carries. Not the table capacity, which may be larger.
    pub fn slot_count(&self) -> u32 {
        self.slot_count
    }

    pub fn prop_capacity(&self) -> usize {
        self.props.len()
    }

    pub fn method_capacity(&self) -> usize {
        self.methods.len()
    }

    /// Resolve a property symbol to its slot offset.
    pub fn lookup_property(&self, symbol: Symbol) -> Result<u32, ShapeError> {
        probe(&self.props, symbol, |s| s.symbol)
            .map(|slot| slot.offset)
            .ok_or_else(|| ShapeError::NoSuchProperty {
                shape: self.name.to_string(),
                symbol,
            })
    }

    /// Resolve a method symbol to its function pointer.
    pub fn lookup_method(&self, symbol: Symbol) -> Result<Method, ShapeError> {
        probe(&self.methods, symbol, |s| s.symbol)
            .and_then(|slot| slot.func)
            .ok_or_else(|| ShapeError::NoSuchMethod {
                shape: self.name.to_string(),
                symbol,
            })
    }

    /// Occupied property entries in table order, for wire encoding and
    /// diagnostics.
    pub fn properties(&self) -> impl Iterator<Item = (Symbol, u32)> + '_ {
        self.props
            .iter()
            .filter(|s| s.symbol != Symbol::EMPTY)
            .map(|s| (s.symbol, s.offset))
    }

    /// Occupied method entries in table order.
    pub fn methods(&self) -> impl Iterator<Item = (Symbol, Method)> + '_ {
        self.methods
            .iter()
            .filter_map(|s| Some((s.symbol, s.func?)))
    }

    pub(crate) fn prop_slots(&self) -> &[PropSlot] {
        &self.props
    }

    pub(crate) fn method_slots(&self) -> &[MethodSlot] {
        &self.methods
    }

    pub(crate) fn from_parts(
        name: Box<str>,
        props: Box<[PropSlot]>,
        methods: Box<[MethodSlot]>,
        slot_count: u32,
    ) -> RecordDef {
        RecordDef { name, props, methods, slot_count }
    }
}

impl std::fmt::Debug for RecordDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordDef")
            .field("name", &self.name)
            .field("slot_count", &self.slot_count)
            .field("prop_capacity", &self.props.len())
            .field("method_capacity", &self.methods.len())
            .finish()
    }
}

/// Builds a [`RecordDef`] with fixed table capacities.
///
/// The compiler lays shapes out ahead of any instance creation; this is
/// its (and the tests') construction surface. Insertion walks the same
/// probe sequence lookup does, so a symbol is always found before the
/// probe wraps back to its home slot. Capacity and load factor are the
/// builder's caller's choice, up to 100% load.
#[derive(Debug)]
pub struct ShapeBuilder {
    name: String,
    props: Vec<PropSlot>,
    methods: Vec<MethodSlot>,
    slot_count: u32,
}

impl ShapeBuilder {
    pub fn new(name: &str, prop_capacity: usize, method_capacity: usize) -> ShapeBuilder {
        ShapeBuilder {
            name: name.to_string(),
            props: vec![PropSlot { symbol: Symbol::EMPTY, offset: 0 }; prop_capacity],
            methods: vec![MethodSlot { symbol: Symbol::EMPTY, func: None }; method_capacity],
            slot_count: 0,
        }
    }

    fn insert_at(&mut self, table: Table, symbol: Symbol) -> Result<usize, BuildError> {
        let cap = match table {
            Table::Props => self.props.len(),
            Table::Methods => self.methods.len(),
        };
        if cap == 0 {
            return Err(BuildError::TableFull { shape: self.name.clone(), symbol, capacity: 0 });
        }
        let home = symbol.id() as usize % cap;
        for step in 0..cap {
            let idx = (home + step) % cap;
            let at = match table {
                Table::Props => self.props[idx].symbol,
                Table::Methods => self.methods[idx].symbol,
            };
            if at == symbol {
                return Err(BuildError::DuplicateSymbol { shape: self.name.clone(), symbol });
            }
            if at == Symbol::EMPTY {
                return Ok(idx);
            }
        }
        Err(BuildError::TableFull { shape: self.name.clone(), symbol, capacity: cap })
    }

    /// Add a property mapping `symbol` to slot `offset`.
    pub fn prop(mut self, symbol: Symbol, offset: u32) -> Result<ShapeBuilder, BuildError> {
        let idx = self.insert_at(Table::Props, symbol)?;
        self.props[idx] = PropSlot { symbol, offset };
        self.slot_count += 1;
        Ok(self)
    }

    /// Add a method mapping `symbol` to `func`.
    pub fn method(mut self, symbol: Symbol, func: Method) -> Result<ShapeBuilder, BuildError> {
        let idx = self.insert_at(Table::Methods, symbol)?;
        self.methods[idx] = MethodSlot { symbol, func: Some(func) };
        Ok(self)
    }

    /// Validate and freeze the definition.
    ///
    /// Offsets must form a permutation of `0..slot_count`: that is what
    /// makes the ordered-initializer contract of record allocation
    /// well-defined.
    pub fn finish(self) -> Result<RecordDef, BuildError> {
        let slots = self.slot_count;
        let mut seen = vec![false; slots as usize];
        for slot in self.props.iter().filter(|s| s.symbol != Symbol::EMPTY) {
            if slot.offset >= slots {
                return Err(BuildError::OffsetOutOfRange {
                    shape: self.name,
                    offset: slot.offset,
                    slots,
                });
            }
            if seen[slot.offset as usize] {
                return Err(BuildError::OffsetClash {
                    shape: self.name,
                    offset: slot.offset,
                    slots,
                });
            }
            seen[slot.offset as usize] = true;
        }
        Ok(RecordDef {
            name: self.name.into_boxed_str(),
            props: self.props.into_boxed_slice(),
            methods: self.methods.into_boxed_slice(),
            slot_count: slots,
        })
    }
}

#[derive(Clone, Copy)]
enum Table {
    Props,
    Methods,
}
