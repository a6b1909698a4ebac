//! Batch operation types for atomic multi-key writes.

use serde::Deserialize;
use serde::Serialize;

/// A single operation within a batch write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum BatchOperation {
    Set { key: String, value: String },
    Delete { key: String },
}

impl BatchOperation {
    /// Build a batch operation from a put-or-delete entry.
    ///
    /// `Some(value)` puts the value, `None` deletes the key.
    pub fn from_entry(key: String, value: Option<String>) -> Self {
        match value {
            Some(value) => BatchOperation::Set { key, value },
            None => BatchOperation::Delete { key },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_entry_maps_some_to_set_and_none_to_delete() {
        assert_eq!(BatchOperation::from_entry("a".into(), Some("1".into())), BatchOperation::Set {
            key: "a".into(),
            value: "1".into(),
        });
        assert_eq!(BatchOperation::from_entry("b".into(), None), BatchOperation::Delete { key: "b".into() });
    }
}
