use crate::heap::RecordRef;
use crate::value::StrId;

// ── Packed value encoding ────────────────────────────────────────────
//
// One u64 per value: a 17-bit tag above the largest finite double's bit
// pattern, and 47 bits of payload below it. Every bit pattern at or
// below SHIFTED_MAX_DOUBLE decodes as an IEEE-754 double by plain
// reinterpretation; patterns above it carry a tag in the high bits and
// a payload (one boolean bit, a 32-bit string handle, or a 47-bit
// pointer) in the low bits. NaNs are canonicalized on construction so
// no double ever lands in the tag space.

const TAG_SHIFT: u32 = 47;

// 13 high bits set; shifted, this is the bit pattern of negative quiet
// NaN with an empty payload — the largest pattern still read as a double.
const TAG_MAX_DOUBLE: u64 = 0x1FFF0;
const TAG_BOOLEAN: u64 = TAG_MAX_DOUBLE | 0x1;
const TAG_STRING: u64 = TAG_MAX_DOUBLE | 0x2;
const TAG_RECORD: u64 = TAG_MAX_DOUBLE | 0x3;

const SHIFTED_MAX_DOUBLE: u64 = TAG_MAX_DOUBLE << TAG_SHIFT;

const PAYLOAD_MASK: u64 = (1 << TAG_SHIFT) - 1;
const CANONICAL_NAN: u64 = 0x7FF8_0000_0000_0000;

/// The packed one-word encoding of a runtime value.
///
/// This is what record instance slots store: a single pointer-scannable
/// word, so the collector and compiled code agree on layout without any
/// boxing. All bit manipulation lives in this module; everything else
/// goes through the predicates and converters, or through the unpacked
/// [`Value`](crate::value::Value) enum.
///
/// Calling a converter on a value of the wrong tag is a contract
/// violation on the caller's side — compiled code reaching a converter
/// has already been type-checked. The converters carry `debug_assert!`s
/// so violations are loud in debug builds and free in release builds.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct RawValue(u64);

impl RawValue {
    #[inline]
    pub fn double(n: f64) -> Self {
        if n.is_nan() {
            RawValue(CANONICAL_NAN) // below the tag space
        } else {
            RawValue(n.to_bits())
        }
    }

    #[inline]
    pub fn boolean(b: bool) -> Self {
        RawValue(TAG_BOOLEAN << TAG_SHIFT | b as u64)
    }

    #[inline]
    pub fn string(id: StrId) -> Self {
        RawValue(TAG_STRING << TAG_SHIFT | id.0 as u64)
    }

    #[inline]
    pub fn record(rec: RecordRef) -> Self {
        let ptr = rec.as_ptr().as_ptr() as u64;
        debug_assert!(ptr & !PAYLOAD_MASK == 0, "record pointer exceeds 47 bits: {ptr:#x}");
        RawValue(TAG_RECORD << TAG_SHIFT | ptr)
    }

    /// Hot path: one unsigned comparison, checked before any other tag.
    #[inline]
    pub fn is_double(self) -> bool {
        self.0 <= SHIFTED_MAX_DOUBLE
    }

    #[inline]
    pub fn is_boolean(self) -> bool {
        self.0 >> TAG_SHIFT == TAG_BOOLEAN
    }

    #[inline]
    pub fn is_string(self) -> bool {
        self.0 >> TAG_SHIFT == TAG_STRING
    }

    #[inline]
    pub fn is_record(self) -> bool {
        self.0 >> TAG_SHIFT == TAG_RECORD
    }

    #[inline]
    pub fn as_double(self) -> f64 {
        debug_assert!(self.is_double(), "as_double on non-double {self:?}");
        f64::from_bits(self.0)
    }

    #[inline]
    pub fn as_boolean(self) -> bool {
        debug_assert!(self.is_boolean(), "as_boolean on non-boolean {self:?}");
        self.0 & 1 == 1
    }

    #[inline]
    pub fn as_str(self) -> StrId {
        debug_assert!(self.is_string(), "as_str on non-string {self:?}");
        StrId(self.0 as u32)
    }

    #[inline]
    pub fn as_record(self) -> RecordRef {
        debug_assert!(self.is_record(), "as_record on non-record {self:?}");
        let ptr = (self.0 & PAYLOAD_MASK) as *mut u64;
        // SAFETY: record values are only constructed from a RecordRef,
        // whose pointer came from the allocator and is never null.
        unsafe { RecordRef::from_ptr(std::ptr::NonNull::new_unchecked(ptr)) }
    }

    /// Raw bit pattern, as stored in an instance slot.
    #[inline]
    pub fn to_bits(self) -> u64 {
        self.0
    }

    /// Reinterpret a slot word. The pattern must have been produced by
    /// one of this module's constructors; arbitrary bits above the
    /// double threshold would decode as garbage tags.
    #[inline]
    pub fn from_bits(bits: u64) -> Self {
        RawValue(bits)
    }
}

impl std::fmt::Debug for RawValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_double() {
            write!(f, "RawValue(double {})", f64::from_bits(self.0))
        } else if self.is_boolean() {
            write!(f, "RawValue(boolean {})", self.0 & 1 == 1)
        } else if self.is_string() {
            write!(f, "RawValue(str #{})", self.0 as u32)
        } else if self.is_record() {
            write!(f, "RawValue(record {:#x})", self.0 & PAYLOAD_MASK)
        } else {
            write!(f, "RawValue(bad tag {:#x})", self.0)
        }
    }
}
