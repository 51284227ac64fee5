pub mod packed;

pub use packed::RawValue;

use crate::heap::RecordRef;

/// Opaque handle to a string owned by the external string facility.
/// This core only carries it through the value encoding; string
/// contents and operations live elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct StrId(pub u32);

/// A runtime value, unpacked.
///
/// The explicit tag+payload form of the encoding: convenient at API
/// boundaries and in tests, one word wider than [`RawValue`]. The two
/// forms convert losslessly in both directions; instance slots always
/// hold the packed form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Double(f64),
    Boolean(bool),
    Str(StrId),
    Record(RecordRef),
}

impl Value {
    pub fn pack(self) -> RawValue {
        match self {
            Value::Double(n) => RawValue::double(n),
            Value::Boolean(b) => RawValue::boolean(b),
            Value::Str(id) => RawValue::string(id),
            Value::Record(rec) => RawValue::record(rec),
        }
    }

    pub fn unpack(raw: RawValue) -> Value {
        // Double first — the common case, and a single comparison.
        if raw.is_double() {
            Value::Double(raw.as_double())
        } else if raw.is_boolean() {
            Value::Boolean(raw.as_boolean())
        } else if raw.is_string() {
            Value::Str(raw.as_str())
        } else {
            Value::Record(raw.as_record())
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Value {
        Value::Double(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Boolean(b)
    }
}

impl From<StrId> for Value {
    fn from(id: StrId) -> Value {
        Value::Str(id)
    }
}

impl From<RecordRef> for Value {
    fn from(rec: RecordRef) -> Value {
        Value::Record(rec)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Double(n) => {
                if *n == (*n as i64) as f64 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Str(id) => write!(f, "<str {}>", id.0),
            Value::Record(rec) => {
                let def = rec.def();
                write!(f, "{}(", def.name())?;
                for offset in 0..def.slot_count() {
                    if offset > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", Value::unpack(rec.slot(offset)))?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_round_trips_scalars() {
        for v in [
            Value::Double(3.5),
            Value::Double(-0.0),
            Value::Double(f64::MAX),
            Value::Boolean(true),
            Value::Boolean(false),
            Value::Str(StrId(7)),
        ] {
            assert_eq!(Value::unpack(v.pack()), v);
        }
    }

    #[test]
    fn display_prints_whole_doubles_without_fraction() {
        assert_eq!(Value::Double(5.0).to_string(), "5");
        assert_eq!(Value::Double(2.5).to_string(), "2.5");
        assert_eq!(Value::Boolean(true).to_string(), "true");
        assert_eq!(Value::Str(StrId(3)).to_string(), "<str 3>");
    }
}
