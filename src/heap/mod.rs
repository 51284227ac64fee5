use std::ptr::NonNull;
use std::rc::Rc;

use crate::record::{Method, RecordDef, ShapeError};
use crate::symbol::Symbol;
use crate::value::RawValue;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("allocation of {requested_words} words failed")]
pub struct AllocError {
    pub requested_words: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum HeapError {
    #[error(transparent)]
    Alloc(#[from] AllocError),
    #[error("shape '{shape}' takes {expected} initial values, got {got}")]
    ArityMismatch { shape: String, expected: u32, got: usize },
}

/// Injected memory provider.
///
/// Returns zero-initialized, pointer-scannable, address-stable blocks
/// measured in 64-bit words, or reports failure. A GC-backed
/// implementation may pause for collection inside `allocate_words`;
/// this core treats that as opaque. Nothing here frees individual
/// blocks — reclamation is the provider's policy (trace, refcount, or
/// arena teardown), under the invariant that an instance survives
/// while a reachable reference to it exists.
pub trait Allocator {
    fn allocate_words(&mut self, words: usize) -> Result<NonNull<u64>, AllocError>;
}

/// Arena-backed allocator: boxed zeroed blocks, freed all at once when
/// the arena drops. An optional word budget makes exhaustion testable.
#[derive(Default)]
pub struct ArenaAlloc {
    blocks: Vec<Box<[u64]>>,
    budget: Option<usize>,
    used: usize,
}

impl ArenaAlloc {
    pub fn new() -> ArenaAlloc {
        ArenaAlloc::default()
    }

    /// Cap the arena at `words` total 64-bit words; further requests
    /// fail with [`AllocError`].
    pub fn with_budget(words: usize) -> ArenaAlloc {
        ArenaAlloc { budget: Some(words), ..ArenaAlloc::default() }
    }

    pub fn words_used(&self) -> usize {
        self.used
    }
}

impl Allocator for ArenaAlloc {
    fn allocate_words(&mut self, words: usize) -> Result<NonNull<u64>, AllocError> {
        let words = words.max(1);
        if let Some(budget) = self.budget {
            if self.used + words > budget {
                return Err(AllocError { requested_words: words });
            }
        }
        self.used += words;
        let mut block = vec![0u64; words].into_boxed_slice();
        // The boxed buffer's address is stable across the move into
        // `blocks`, so the pointer can be taken first.
        let ptr = NonNull::from(&mut block[0]);
        self.blocks.push(block);
        Ok(ptr)
    }
}

/// `calloc`-backed allocator: zeroed blocks straight from the system
/// allocator, freed when this allocator drops. Stands in for the
/// collector-owned memory of a full runtime.
#[derive(Default)]
pub struct SystemAlloc {
    blocks: Vec<NonNull<u64>>,
}

impl SystemAlloc {
    pub fn new() -> SystemAlloc {
        SystemAlloc::default()
    }
}

impl Allocator for SystemAlloc {
    fn allocate_words(&mut self, words: usize) -> Result<NonNull<u64>, AllocError> {
        let words = words.max(1);
        // SAFETY: plain FFI allocation; calloc returns zeroed memory or null.
        let raw = unsafe { libc::calloc(words, size_of::<u64>()) } as *mut u64;
        match NonNull::new(raw) {
            Some(ptr) => {
                self.blocks.push(ptr);
                Ok(ptr)
            }
            None => Err(AllocError { requested_words: words }),
        }
    }
}

impl Drop for SystemAlloc {
    fn drop(&mut self) {
        for block in self.blocks.drain(..) {
            // SAFETY: every pointer in `blocks` came from calloc above
            // and is freed exactly once, here.
            unsafe { libc::free(block.as_ptr() as *mut libc::c_void) };
        }
    }
}

/// Heap a runtime's record instances live on.
///
/// Owns the allocator capability and a strong reference to every record
/// definition any live instance points at, so definition lifetime is
/// the union of instance lifetimes (instances never outlive the heap).
pub struct Heap {
    alloc: Box<dyn Allocator>,
    defs: Vec<Rc<RecordDef>>,
}

impl Heap {
    pub fn new(alloc: Box<dyn Allocator>) -> Heap {
        Heap { alloc, defs: Vec::new() }
    }

    pub fn with_arena() -> Heap {
        Heap::new(Box::new(ArenaAlloc::new()))
    }

    /// Allocate a record instance of `def` with its slots populated
    /// from `init`, in slot-offset order. `init.len()` must equal the
    /// definition's distinct property count.
    ///
    /// Layout contract with the collector: one zeroed block of
    /// `1 + slot_count` words — the definition pointer first, then the
    /// packed value slots, where record/string-tagged slots hold real
    /// pointers. The block is fully written before the `RecordRef` is
    /// returned, so no partially-initialized instance is observable.
    pub fn alloc_record(
        &mut self,
        def: &Rc<RecordDef>,
        init: &[RawValue],
    ) -> Result<RecordRef, HeapError> {
        if init.len() != def.slot_count() as usize {
            return Err(HeapError::ArityMismatch {
                shape: def.name().to_string(),
                expected: def.slot_count(),
                got: init.len(),
            });
        }
        let base = self.alloc.allocate_words(1 + init.len())?;
        if !self.defs.iter().any(|d| Rc::ptr_eq(d, def)) {
            self.defs.push(Rc::clone(def));
        }
        // SAFETY: `base` points at a zeroed block of 1 + init.len()
        // words we just allocated; nothing else references it yet.
        unsafe {
            base.as_ptr().write(Rc::as_ptr(def) as u64);
            for (i, v) in init.iter().enumerate() {
                base.as_ptr().add(1 + i).write(v.to_bits());
            }
        }
        Ok(RecordRef { base })
    }
}

/// Handle to a record instance: a pointer to the `[def ptr][slots...]`
/// block on some [`Heap`].
///
/// A `RecordRef` is valid for the lifetime of the heap that allocated
/// it; the heap keeps the definition alive, and the single-threaded
/// execution model means no slot is mutated concurrently. Using a
/// `RecordRef` after its heap is dropped is undefined behavior — the
/// same discipline compiled code and the collector already live by.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(transparent)]
pub struct RecordRef {
    base: NonNull<u64>,
}

impl RecordRef {
    /// Rehydrate from a packed value payload. Only the value encoding
    /// calls this, with a pointer that originated in `alloc_record`.
    pub(crate) fn from_ptr(base: NonNull<u64>) -> RecordRef {
        RecordRef { base }
    }

    pub fn as_ptr(self) -> NonNull<u64> {
        self.base
    }

    /// The shared definition this instance was allocated against.
    pub fn def<'a>(self) -> &'a RecordDef {
        // SAFETY: word 0 was written by alloc_record from Rc::as_ptr,
        // and the heap holds that Rc for as long as any instance lives.
        unsafe {
            let raw = self.base.as_ptr().read() as *const RecordDef;
            &*raw
        }
    }

    /// Read the slot at `offset` (in value-sized units).
    pub fn slot(self, offset: u32) -> RawValue {
        debug_assert!(offset < self.def().slot_count(), "slot {offset} out of range");
        // SAFETY: offset < slot_count, and the block holds
        // 1 + slot_count words.
        unsafe { RawValue::from_bits(self.base.as_ptr().add(1 + offset as usize).read()) }
    }

    /// Replace the slot at `offset`. Mutation touches slot contents
    /// only; the definition pointer is fixed for the instance's life.
    pub fn set_slot(self, offset: u32, value: RawValue) {
        debug_assert!(offset < self.def().slot_count(), "slot {offset} out of range");
        // SAFETY: as in `slot`.
        unsafe {
            self.base.as_ptr().add(1 + offset as usize).write(value.to_bits());
        }
    }

    /// Resolve and read a property by symbol.
    pub fn try_property(self, symbol: Symbol) -> Result<RawValue, ShapeError> {
        let offset = self.def().lookup_property(symbol)?;
        Ok(self.slot(offset))
    }

    /// Resolve and replace a property by symbol.
    pub fn try_set_property(self, symbol: Symbol, value: RawValue) -> Result<(), ShapeError> {
        let offset = self.def().lookup_property(symbol)?;
        self.set_slot(offset, value);
        Ok(())
    }

    /// Resolve a method by symbol.
    pub fn try_method(self, symbol: Symbol) -> Result<Method, ShapeError> {
        self.def().lookup_method(symbol)
    }

    /// Property access for compiled code. A miss here means the access
    /// was miscompiled against the wrong shape — a defect, not a user
    /// error — so it aborts with the offending symbol and shape rather
    /// than returning undefined data.
    pub fn property(self, symbol: Symbol) -> RawValue {
        match self.try_property(symbol) {
            Ok(v) => v,
            Err(e) => panic!(
                "miscompiled property access: {e} (capacity {}, {} slots)",
                self.def().prop_capacity(),
                self.def().slot_count(),
            ),
        }
    }

    /// Method resolution for compiled code; aborts on a miss, as
    /// [`property`](Self::property) does.
    pub fn method(self, symbol: Symbol) -> Method {
        match self.try_method(symbol) {
            Ok(m) => m,
            Err(e) => panic!(
                "miscompiled method dispatch: {e} (capacity {})",
                self.def().method_capacity(),
            ),
        }
    }
}
