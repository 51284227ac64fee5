use crate::heap::{AllocError, Allocator, Heap, HeapError};
use crate::record::wire::WireError;
use crate::record::{BuildError, ShapeError};
use crate::symbol::SymbolTable;
use crate::value::Value;

/// Top-level error: everything a program running on the core can
/// propagate to its driver.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Alloc(#[from] AllocError),
    #[error(transparent)]
    Heap(#[from] HeapError),
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// A compiled program's designated entry function.
pub type EntryFn = fn(&mut Runtime) -> Result<Value, RuntimeError>;

/// Bootstrap state: the heap (with its injected allocator) and the
/// symbol space the compiler populated. Single-threaded by design —
/// nothing in here is `Sync`, and slot writes carry no internal
/// synchronization.
pub struct Runtime {
    pub heap: Heap,
    pub symbols: SymbolTable,
}

impl Runtime {
    /// Arena-backed runtime with an empty symbol space.
    pub fn new() -> Runtime {
        Runtime { heap: Heap::with_arena(), symbols: SymbolTable::new() }
    }

    pub fn with_allocator(alloc: Box<dyn Allocator>) -> Runtime {
        Runtime { heap: Heap::new(alloc), symbols: SymbolTable::new() }
    }

    /// Initialize, then transfer control to the program's entry
    /// function. The runtime owns no CLI surface beyond this.
    pub fn run(&mut self, entry: EntryFn) -> Result<Value, RuntimeError> {
        entry(self)
    }
}

impl Default for Runtime {
    fn default() -> Runtime {
        Runtime::new()
    }
}
