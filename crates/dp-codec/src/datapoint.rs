use crate::value::Value;
use serde::{Deserialize, Serialize};

/// A single timestamped measurement.
///
/// `timestamp` is seconds since the Unix epoch as a float, matching the
/// floating timestamp convention used throughout the cache. `actor` names
/// whoever produced the point (empty string if anonymous/system-generated).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    pub timestamp: f64,
    pub data: Value,
    pub actor: String,
}

impl Datapoint {
    pub fn new(timestamp: f64, data: impl Into<Value>, actor: impl Into<String>) -> Self {
        Self {
            timestamp,
            data: data.into(),
            actor: actor.into(),
        }
    }
}

/// An ordered run of datapoints, the unit every insert/get/range operation
/// exchanges with callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatapointArray(Vec<Datapoint>);

impl DatapointArray {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_vec(points: Vec<Datapoint>) -> Self {
        Self(points)
    }

    pub fn push(&mut self, dp: Datapoint) {
        self.0.push(dp);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Datapoint> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Datapoint] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Datapoint> {
        self.0
    }

    /// Appends `other`'s points after this array's own, in order.
    pub fn extend(&mut self, other: DatapointArray) {
        self.0.extend(other.0);
    }

    /// Byte size used for stream/device accounting: a flat per-point
    /// estimate (timestamp + a data-shape-dependent payload size) rather
    /// than the exact wire size, so that size-limit checks are cheap to
    /// run on every insert.
    pub fn estimated_byte_size(&self) -> u64 {
        self.0.iter().map(estimate_datapoint_bytes).sum()
    }
}

impl IntoIterator for DatapointArray {
    type Item = Datapoint;
    type IntoIter = std::vec::IntoIter<Datapoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<Datapoint> for DatapointArray {
    fn from_iter<T: IntoIterator<Item = Datapoint>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn estimate_datapoint_bytes(dp: &Datapoint) -> u64 {
    const TIMESTAMP_BYTES: u64 = 8;
    TIMESTAMP_BYTES + estimate_value_bytes(&dp.data) + dp.actor.len() as u64
}

fn estimate_value_bytes(value: &Value) -> u64 {
    match value {
        Value::Number(_) => 8,
        Value::Bool(_) => 1,
        Value::Null => 0,
        Value::Str(s) => s.len() as u64,
        Value::Array(items) => items.iter().map(estimate_value_bytes).sum(),
        Value::Map(pairs) => pairs
            .iter()
            .map(|(k, v)| k.len() as u64 + estimate_value_bytes(v))
            .sum(),
    }
}
