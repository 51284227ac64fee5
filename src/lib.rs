//! merl runtime core — the value representation and object-dispatch
//! layer every compiled merl program links against.
//!
//! Two coupled pieces: a one-word packed value encoding
//! ([`value::RawValue`], with [`value::Value`] as its unpacked twin)
//! and the record object model ([`record::RecordDef`] shapes with
//! linear-probed lookup tables, instances allocated on a [`heap::Heap`]
//! through an injected [`heap::Allocator`]). The compiler, collector,
//! and I/O live elsewhere; [`record::wire`] is the binary contract the
//! compiler's shape tables arrive through.

pub mod heap;
pub mod record;
pub mod runtime;
pub mod symbol;
pub mod value;

pub use heap::{AllocError, Allocator, ArenaAlloc, Heap, HeapError, RecordRef, SystemAlloc};
pub use record::wire::{DefImage, WireError};
pub use record::{BuildError, Method, RecordDef, ShapeBuilder, ShapeError};
pub use runtime::{EntryFn, Runtime, RuntimeError};
pub use symbol::{Symbol, SymbolTable};
pub use value::{RawValue, StrId, Value};
