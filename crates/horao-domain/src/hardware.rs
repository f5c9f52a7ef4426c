//! The shared identity every piece of physical equipment carries.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// A physical unit's identity: what it is, where it sits, and how it's
/// labeled. Equality considers all three fields; hashing deliberately
/// considers only `serial_number` and `model` so a unit keeps the same
/// hash bucket across a slot reassignment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hardware {
    pub serial_number: String,
    pub model: String,
    pub slot_number: u32,
}

impl Hardware {
    pub fn new(serial_number: impl Into<String>, model: impl Into<String>, slot_number: u32) -> Self {
        Self {
            serial_number: serial_number.into(),
            model: model.into(),
            slot_number,
        }
    }
}

impl Hash for Hardware {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.serial_number.hash(state);
        self.model.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(h: &Hardware) -> u64 {
        let mut hasher = DefaultHasher::new();
        h.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn equality_considers_slot_number() {
        let a = Hardware::new("SN1", "X200", 1);
        let b = Hardware::new("SN1", "X200", 2);
        assert_ne!(a, b);
    }

    #[test]
    fn hash_ignores_slot_number() {
        let a = Hardware::new("SN1", "X200", 1);
        let b = Hardware::new("SN1", "X200", 2);
        assert_eq!(hash_of(&a), hash_of(&b));
    }
}
