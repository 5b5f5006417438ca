//! Property-based tests for the datapoint codec.
//!
//! Grounded in the teacher's `proptest` + invariant-tag convention: each
//! property names the invariant it checks so a failing case is traceable
//! back to a specific guarantee.

use dp_codec::{decode_array, encode_array, Datapoint, DatapointArray, Value};
use proptest::prelude::*;

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        any::<f64>().prop_filter("finite", |f| f.is_finite()).prop_map(Value::Number),
        ".*".prop_map(Value::Str),
        any::<bool>().prop_map(Value::Bool),
        Just(Value::Null),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::vec((".*", inner), 0..4).prop_map(Value::Map),
        ]
    })
}

fn arb_datapoint() -> impl Strategy<Value = Datapoint> {
    (any::<f64>().prop_filter("finite", |f| f.is_finite()), arb_value(), ".*")
        .prop_map(|(ts, data, actor)| Datapoint { timestamp: ts, data, actor })
}

proptest! {
    /// CODEC-RT-01: encoding then decoding a datapoint array yields the
    /// same array, regardless of value shape or nesting.
    #[test]
    fn prop_array_round_trips(points in prop::collection::vec(arb_datapoint(), 0..20)) {
        let arr = DatapointArray::from_vec(points.clone());
        let encoded = encode_array(&arr).unwrap();
        let (decoded, consumed) = decode_array(&encoded).unwrap();
        prop_assert_eq!(decoded.into_vec(), points);
        prop_assert_eq!(consumed, encoded.len());
    }

    /// CODEC-RT-02: the header's declared count always matches the number
    /// of points that were actually encoded.
    #[test]
    fn prop_header_count_matches(points in prop::collection::vec(arb_datapoint(), 0..20)) {
        let arr = DatapointArray::from_vec(points.clone());
        let encoded = encode_array(&arr).unwrap();
        let header = dp_codec::peek_array_header(&encoded).unwrap();
        prop_assert_eq!(header.count as usize, points.len());
    }
}
