use std::collections::BTreeMap;

/// A dynamically typed bencode value.
///
/// Dictionaries keep their keys sorted (`BTreeMap`) so that re-encoding is
/// always canonical regardless of the order the source bytes used; decode
/// still rejects a source with duplicate keys before values ever reach here
/// (see `decode::decode_dict`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BValue {
    Bytes(Vec<u8>),
    Int(i64),
    List(Vec<BValue>),
    Dict(BTreeMap<Vec<u8>, BValue>),
}

impl BValue {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            BValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            BValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[BValue]> {
        match self {
            BValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<Vec<u8>, BValue>> {
        match self {
            BValue::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Looks a key up in a dict value, returning `None` for both "not a
    /// dict" and "key absent" — callers that need to tell those apart
    /// should match on `as_dict()` themselves.
    pub fn get(&self, key: &[u8]) -> Option<&BValue> {
        self.as_dict().and_then(|d| d.get(key))
    }
}
