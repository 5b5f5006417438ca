use std::collections::HashMap;

/// A field value stored in a hash. Kept as a small tagged union rather than
/// raw bytes so integer counters (`length`, `byte_size`) can be incremented
/// in place without a parse/format round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bytes(Vec<u8>),
    Int(i64),
}

impl FieldValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(n) => Some(*n),
            FieldValue::Bytes(b) => std::str::from_utf8(b).ok()?.parse().ok(),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Int(n)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(b: Vec<u8>) -> Self {
        FieldValue::Bytes(b)
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Bytes(s.into_bytes())
    }
}

/// A collection of hashes (`hash name` -> `field` -> value), the meta-data
/// half of the store: substream/device counters live here as hash fields.
#[derive(Debug, Default)]
pub struct HashStore {
    hashes: HashMap<String, HashMap<String, FieldValue>>,
}

impl HashStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, hash: &str, field: &str, value: impl Into<FieldValue>) {
        self.hashes
            .entry(hash.to_string())
            .or_default()
            .insert(field.to_string(), value.into());
    }

    pub fn get(&self, hash: &str, field: &str) -> Option<&FieldValue> {
        self.hashes.get(hash)?.get(field)
    }

    pub fn get_int(&self, hash: &str, field: &str) -> i64 {
        self.get(hash, field).and_then(FieldValue::as_int).unwrap_or(0)
    }

    /// Adds `delta` to a field, creating it (from a base of 0) if absent.
    /// Returns the new value.
    pub fn incr_by(&mut self, hash: &str, field: &str, delta: i64) -> i64 {
        let entry = self.hashes.entry(hash.to_string()).or_default();
        let current = entry.get(field).and_then(FieldValue::as_int).unwrap_or(0);
        let updated = current + delta;
        entry.insert(field.to_string(), FieldValue::Int(updated));
        updated
    }

    pub fn exists(&self, hash: &str) -> bool {
        self.hashes.contains_key(hash)
    }

    /// Removes an entire hash, matching the original's `DeleteHash` scoping:
    /// only the named hash is removed, never a prefix match.
    pub fn delete(&mut self, hash: &str) -> bool {
        self.hashes.remove(hash).is_some()
    }

    pub fn remove_field(&mut self, hash: &str, field: &str) {
        if let Some(fields) = self.hashes.get_mut(hash) {
            fields.remove(field);
        }
    }

    /// Lists the field names of a hash, used to enumerate registered
    /// substreams of a stream via an index hash.
    pub fn fields(&self, hash: &str) -> Vec<String> {
        self.hashes
            .get(hash)
            .map(|fields| fields.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incr_by_creates_and_accumulates() {
        let mut store = HashStore::new();
        assert_eq!(store.incr_by("h", "length", 3), 3);
        assert_eq!(store.incr_by("h", "length", 2), 5);
        assert_eq!(store.get_int("h", "length"), 5);
    }

    #[test]
    fn delete_removes_exact_hash_only() {
        let mut store = HashStore::new();
        store.set("h1", "a", 1i64);
        store.set("h1:sub", "a", 1i64);
        assert!(store.delete("h1"));
        assert!(store.exists("h1:sub"));
        assert!(!store.exists("h1"));
    }
}
