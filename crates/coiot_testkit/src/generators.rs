//! Property-based test generators using proptest.

use proptest::prelude::*;
use serde_json::{json, Value};

/// Strategy for v1 sensor ids (1-3 digits).
pub fn v1_sensor_id() -> impl Strategy<Value = u32> {
    1u32..1000
}

/// Strategy for v2 sensor ids (4 digits).
pub fn v2_sensor_id() -> impl Strategy<Value = u32> {
    1000u32..10_000
}

/// Strategy for raw type tokens, including the ones firmware gets wrong.
pub fn raw_sensor_type() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::sample::select(vec![
            "S", "P", "T", "H", "B", "M", "W", "tC", "tF", "Switch", "VSwitch", "Overtemp",
            "Red", "Green", "Blue", "White", "Gain", "Temp", "input", "output", "brightness",
        ])
        .prop_map(String::from),
        "[A-Za-z]{1,10}",
    ]
}

/// Strategy for raw descriptions, including composite `Name_N` forms.
pub fn raw_description() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        prop::sample::select(vec![
            "State", "Power", "motion", "battery", "Temperature", "Overtemp",
            "e cnt total [W-min]", "Energy counter total [W-min]", "Position",
        ])
        .prop_map(String::from),
        (prop::sample::select(vec!["Power", "VSwitch", "Brightness"]), 0u32..4)
            .prop_map(|(name, idx)| format!("{name}_{idx}")),
        "[a-zA-Z ]{0,16}",
    ]
}

/// Strategy for a complete v1 description payload where every sensor
/// links to block 0.
pub fn v1_description() -> impl Strategy<Value = String> {
    prop::collection::btree_map(v1_sensor_id(), (raw_sensor_type(), raw_description()), 1..8)
        .prop_map(|sensors| {
            let sen: Vec<Value> = sensors
                .into_iter()
                .map(|(id, (t, d))| json!({"I": id, "T": t, "D": d, "R": "0/1", "L": 0}))
                .collect();
            json!({"blk": [{"I": 0, "D": "Relay0"}], "sen": sen}).to_string()
        })
}

/// Strategy for a v2 description payload: 4-digit ids, camelCase
/// descriptions, blocks numbered from 1.
pub fn v2_description() -> impl Strategy<Value = String> {
    prop::collection::btree_set(v2_sensor_id(), 1..8).prop_map(|ids| {
        let sen: Vec<Value> = ids
            .into_iter()
            .map(|id| json!({"I": id, "T": "S", "D": "output", "R": "0/1", "L": 1}))
            .collect();
        json!({"blk": [{"I": 1, "D": "relay_0"}], "sen": sen}).to_string()
    })
}

/// Strategy for a status payload over the given sensor ids.
pub fn status_payload(ids: Vec<u32>) -> impl Strategy<Value = String> {
    let len = ids.len();
    prop::collection::vec(-1000.0f64..100_000.0, len).prop_map(move |values| {
        let samples: Vec<Value> = ids
            .iter()
            .zip(values)
            .map(|(id, value)| json!([0, id, value]))
            .collect();
        json!({ "G": samples }).to_string()
    })
}

/// Strategy for arbitrary datagrams, biased toward CoAP-looking headers.
pub fn datagram() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..64),
        (prop::sample::select(vec![0x40u8, 0x50, 0x60, 0x70]), prop::collection::vec(any::<u8>(), 0..64))
            .prop_map(|(first, rest)| {
                let mut bytes = vec![first];
                bytes.extend(rest);
                bytes
            }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use coiot_protocol::{quirks, DescriptionCache, DescriptionError, ProtocolVersion};

    proptest! {
        #[test]
        fn generated_descriptions_ingest(payload in v1_description()) {
            let mut cache = DescriptionCache::new();
            cache.ingest_payload(&payload, Some(ProtocolVersion::V1)).unwrap();
            prop_assert!(cache.sensors().all(|s| quirks::is_canonical_type(&s.sensor_type)));
        }

        #[test]
        fn v2_descriptions_only_ingest_as_v2(payload in v2_description()) {
            let mut cache = DescriptionCache::new();
            cache.ingest_payload(&payload, Some(ProtocolVersion::V2)).unwrap();
            prop_assert!(cache.check_id_width(ProtocolVersion::V2).is_ok());

            let mut legacy = DescriptionCache::new();
            let rejected = matches!(
                legacy.ingest_payload(&payload, Some(ProtocolVersion::V1)),
                Err(DescriptionError::IdWidthMismatch { .. })
            );
            prop_assert!(rejected);
            prop_assert!(legacy.is_empty());
        }

        #[test]
        fn generated_status_parses(payload in status_payload(vec![111, 112, 113])) {
            let batch = coiot_protocol::parse_status(&payload).unwrap();
            prop_assert_eq!(batch.samples.len(), 3);
        }
    }
}
