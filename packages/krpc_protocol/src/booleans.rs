//! KRPC encodes booleans as the integers `0`/`1` (there is no bencode
//! boolean type), and several optional boolean fields should be omitted
//! from the wire entirely when `false` (`read_only`, BEP-43).

use serde::{Deserialize, Deserializer, Serializer};

pub fn is_false(b: &bool) -> bool {
    !*b
}

pub fn serialize<S: Serializer>(b: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i32(if *b { 1 } else { 0 })
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = i64::deserialize(deserializer)?;
    Ok(value != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_false_matches_bool_negation() {
        assert!(is_false(&false));
        assert!(!is_false(&true));
    }
}
