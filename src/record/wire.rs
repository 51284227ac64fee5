//! The fixed binary layout of a record definition table — the contract
//! between the compiler (which emits it) and this runtime (which loads
//! it). Little-endian, field order load-bearing:
//!
//! ```text
//! [prop_capacity: u32][method_capacity: u32]
//! [(symbol: u32, offset: u64) × prop_capacity]
//! [(symbol: u32, fnref: u64) × method_capacity]
//! ```
//!
//! Symbol 0 marks an empty table slot. A serialized image cannot carry
//! a live code address, so the method entry's `fnref` word holds an id
//! into the loader's function registry; [`DefImage::to_def`] resolves
//! it back to a function pointer at load time.

use crate::record::{Method, MethodSlot, PropSlot, RecordDef};
use crate::symbol::Symbol;

const HEADER_BYTES: usize = 8;
const PROP_ENTRY_BYTES: usize = 12;
const METHOD_ENTRY_BYTES: usize = 12;

// Keeps a corrupt header from driving a multi-gigabyte allocation.
const MAX_CAPACITY: u32 = 1 << 20;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("definition image truncated: need {needed} bytes, have {have}")]
    Truncated { needed: usize, have: usize },
    #[error("definition image has {extra} trailing bytes")]
    TrailingBytes { extra: usize },
    #[error("table capacity {capacity} exceeds the {MAX_CAPACITY} limit")]
    CapacityTooLarge { capacity: u32 },
    #[error("symbol {symbol} appears twice in one table")]
    DuplicateSymbol { symbol: Symbol },
    #[error("entry for symbol {symbol} is unreachable from its probe start")]
    MisplacedEntry { symbol: Symbol },
    #[error("offset {offset} invalid for a shape with {slots} slots")]
    BadOffset { offset: u64, slots: u32 },
    #[error("function reference {fnref} outside the loader registry ({len} entries)")]
    UnknownFunction { fnref: u64, len: usize },
    #[error("method {symbol} points at a function missing from the registry")]
    UnregisteredMethod { symbol: Symbol },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PropEntry {
    pub symbol: u32,
    pub offset: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MethodEntry {
    pub symbol: u32,
    pub fnref: u64,
}

/// In-memory model of one serialized definition table.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DefImage {
    pub prop_capacity: u32,
    pub method_capacity: u32,
    pub props: Vec<PropEntry>,
    pub methods: Vec<MethodEntry>,
}

impl DefImage {
    /// Serialize to the wire layout.
    pub fn encode(&self) -> Vec<u8> {
        debug_assert_eq!(self.props.len(), self.prop_capacity as usize);
        debug_assert_eq!(self.methods.len(), self.method_capacity as usize);
        let mut out = Vec::with_capacity(
            HEADER_BYTES
                + self.props.len() * PROP_ENTRY_BYTES
                + self.methods.len() * METHOD_ENTRY_BYTES,
        );
        out.extend_from_slice(&self.prop_capacity.to_le_bytes());
        out.extend_from_slice(&self.method_capacity.to_le_bytes());
        for p in &self.props {
            out.extend_from_slice(&p.symbol.to_le_bytes());
            out.extend_from_slice(&p.offset.to_le_bytes());
        }
        for m in &self.methods {
            out.extend_from_slice(&m.symbol.to_le_bytes());
            out.extend_from_slice(&m.fnref.to_le_bytes());
        }
        out
    }

    /// Parse the wire layout. Structural checks only; table invariants
    /// are validated by [`DefImage::to_def`].
    pub fn decode(bytes: &[u8]) -> Result<DefImage, WireError> {
        let mut cur = Cursor { bytes, at: 0 };
        let prop_capacity = cur.u32()?;
        let method_capacity = cur.u32()?;
        for capacity in [prop_capacity, method_capacity] {
            if capacity > MAX_CAPACITY {
                return Err(WireError::CapacityTooLarge { capacity });
            }
        }
        let mut props = Vec::with_capacity(prop_capacity as usize);
        for _ in 0..prop_capacity {
            props.push(PropEntry { symbol: cur.u32()?, offset: cur.u64()? });
        }
        let mut methods = Vec::with_capacity(method_capacity as usize);
        for _ in 0..method_capacity {
            methods.push(MethodEntry { symbol: cur.u32()?, fnref: cur.u64()? });
        }
        if cur.at != bytes.len() {
            return Err(WireError::TrailingBytes { extra: bytes.len() - cur.at });
        }
        Ok(DefImage { prop_capacity, method_capacity, props, methods })
    }

    /// Snapshot a built definition as an image. Method pointers become
    /// ids into `registry`; every registered method of `def` must be
    /// present there.
    pub fn from_def(def: &RecordDef, registry: &[Method]) -> Result<DefImage, WireError> {
        let props = def
            .prop_slots()
            .iter()
            .map(|s| PropEntry { symbol: s.symbol.id(), offset: s.offset as u64 })
            .collect();
        let mut methods = Vec::with_capacity(def.method_capacity());
        for slot in def.method_slots() {
            let fnref = match slot.func {
                None => 0,
                Some(f) => registry
                    .iter()
                    .position(|&r| r as usize == f as usize)
                    .ok_or(WireError::UnregisteredMethod { symbol: slot.symbol })?
                    as u64,
            };
            methods.push(MethodEntry { symbol: slot.symbol.id(), fnref });
        }
        Ok(DefImage {
            prop_capacity: def.prop_capacity() as u32,
            method_capacity: def.method_capacity() as u32,
            props,
            methods,
        })
    }

    /// Materialize a definition, resolving `fnref` ids through the
    /// loader's `registry` and validating every table invariant lookup
    /// relies on: distinct symbols, offsets forming a permutation of
    /// `0..slot_count`, and every entry reachable from its probe start
    /// without crossing an empty slot.
    pub fn to_def(&self, name: &str, registry: &[Method]) -> Result<RecordDef, WireError> {
        check_placement(self.props.iter().map(|p| p.symbol))?;
        check_placement(self.methods.iter().map(|m| m.symbol))?;

        let slots = self.props.iter().filter(|p| p.symbol != 0).count() as u32;
        let mut seen = vec![false; slots as usize];
        let mut props = Vec::with_capacity(self.props.len());
        for entry in &self.props {
            if entry.symbol == 0 {
                props.push(PropSlot { symbol: Symbol::EMPTY, offset: 0 });
                continue;
            }
            if entry.offset >= slots as u64 || seen[entry.offset as usize] {
                return Err(WireError::BadOffset { offset: entry.offset, slots });
            }
            seen[entry.offset as usize] = true;
            props.push(PropSlot {
                symbol: Symbol::from_raw(entry.symbol),
                offset: entry.offset as u32,
            });
        }

        let mut methods = Vec::with_capacity(self.methods.len());
        for entry in &self.methods {
            if entry.symbol == 0 {
                methods.push(MethodSlot { symbol: Symbol::EMPTY, func: None });
                continue;
            }
            let func = *registry.get(entry.fnref as usize).ok_or(WireError::UnknownFunction {
                fnref: entry.fnref,
                len: registry.len(),
            })?;
            methods.push(MethodSlot {
                symbol: Symbol::from_raw(entry.symbol),
                func: Some(func),
            });
        }

        Ok(RecordDef::from_parts(
            name.into(),
            props.into_boxed_slice(),
            methods.into_boxed_slice(),
            slots,
        ))
    }
}

/// Verify each occupied slot is reachable by the lookup probe: walking
/// from `symbol % capacity` to the slot's actual index must not cross
/// an empty slot, and no symbol may appear twice.
fn check_placement(symbols: impl Iterator<Item = u32>) -> Result<(), WireError> {
    let table: Vec<u32> = symbols.collect();
    let cap = table.len();
    for (idx, &symbol) in table.iter().enumerate() {
        if symbol == 0 {
            continue;
        }
        let home = symbol as usize % cap;
        let mut at = home;
        loop {
            if table[at] == symbol && at != idx {
                return Err(WireError::DuplicateSymbol { symbol: Symbol::from_raw(symbol) });
            }
            if at == idx {
                break;
            }
            if table[at] == 0 {
                return Err(WireError::MisplacedEntry { symbol: Symbol::from_raw(symbol) });
            }
            at = (at + 1) % cap;
        }
    }
    Ok(())
}

struct Cursor<'a> {
    bytes: &'a [u8],
    at: usize,
}

impl Cursor<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        match self.bytes.get(self.at..self.at + N) {
            Some(chunk) => {
                self.at += N;
                // Slice is exactly N bytes; the conversion cannot fail.
                Ok(chunk.try_into().unwrap_or([0; N]))
            }
            None => Err(WireError::Truncated { needed: self.at + N, have: self.bytes.len() }),
        }
    }

    fn u32(&mut self) -> Result<u32, WireError> {
        Ok(u32::from_le_bytes(self.take::<4>()?))
    }

    fn u64(&mut self) -> Result<u64, WireError> {
        Ok(u64::from_le_bytes(self.take::<8>()?))
    }
}
