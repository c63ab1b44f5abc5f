//! Device descriptions and status payloads as sent by real firmware.
//!
//! Payloads keep the quirks of the devices they come from: missing
//! descriptions, misreported types, composite `Name_N` descriptions.

/// Device id option of a Shelly 1 (v1 firmware).
pub const SHELLY1_ID: &str = "SHSW-1#A4CF12F45678#1";

/// Shelly 1: one relay, sensor without description.
pub const SHELLY1: &str = r#"{"blk":[{"I":0,"D":"Relay0"}],"sen":[{"I":112,"T":"S","R":"0/1","L":0}]}"#;

/// Device id option of a Shelly 1PM.
pub const SHELLY1PM_ID: &str = "SHSW-PM#68C63AF9A3C1#1";

/// Shelly 1PM: legacy `W` power type and `Overtemp` as a type.
pub const SHELLY1PM: &str = r#"{"blk":[{"I":0,"D":"Relay0"},{"I":1,"D":"Device"}],
"sen":[{"I":111,"T":"W","R":"0/3500","L":0},
{"I":112,"T":"Switch","R":"0/1","L":0},
{"I":113,"T":"S","D":"Energy counter total [W-min]","L":0},
{"I":114,"T":"tC","R":"-40/300","L":1},
{"I":115,"T":"Overtemp","R":"0/1","L":1}]}"#;

/// Device id option of a Shelly RGBW2 in white mode.
pub const RGBW2_ID: &str = "SHRGBW2#1B2A3C#1";

/// RGBW2 in white mode: four channels described as `Name_N`, all on block 0.
pub const RGBW2_WHITE: &str = r#"{"blk":[{"I":0,"D":"RGBW2"}],
"sen":[{"I":111,"T":"P","D":"Power_0","R":"0/288","L":0},
{"I":121,"T":"P","D":"Power_1","R":"0/288","L":0},
{"I":131,"T":"P","D":"Power_2","R":"0/288","L":0},
{"I":141,"T":"P","D":"Power_3","R":"0/288","L":0},
{"I":151,"T":"S","D":"VSwitch_0","R":"0/1","L":0},
{"I":161,"T":"S","D":"Brightness_0","R":"0/100","L":0}]}"#;

/// Device id option of a Shelly H&T (battery powered).
pub const SHELLYHT_ID: &str = "SHHT-1#6A3F21#1";

/// Shelly H&T: battery reported with type `H`.
pub const SHELLYHT: &str = r#"{"blk":[{"I":1,"D":"sensors"}],
"sen":[{"I":33,"T":"T","D":"Temperature","R":"-40/125","L":1},
{"I":44,"T":"H","D":"Humidity","R":"0/100","L":1},
{"I":77,"T":"H","D":"Battery","R":"0/100","L":1}]}"#;

/// Device id option of a Shelly 2.5 in roller mode.
pub const SHELLY25_ID: &str = "SHSW-25#2C1A9F#1";

/// Shelly 2.5 in roller mode: two meters and a position sensor.
pub const SHELLY25_ROLLER: &str = r#"{"blk":[{"I":0,"D":"Relay0"},{"I":1,"D":"Relay1"},{"I":2,"D":"Device"}],
"sen":[{"I":111,"T":"P","D":"Power","R":"0/2300","L":0},
{"I":112,"T":"S","D":"State","R":"0/1","L":0},
{"I":121,"T":"P","D":"Power","R":"0/2300","L":1},
{"I":122,"T":"S","D":"State","R":"0/1","L":1},
{"I":113,"T":"S","D":"Position","R":"0/100","L":2}]}"#;

/// Device id option of the same Shelly 2.5 after a firmware update.
pub const SHELLY25_V2_ID: &str = "SHSW-25#2C1A9F#2";

/// Shelly 2.5 with CoIoT v2 firmware, two relays.
pub const SHELLY25_V2: &str = r#"{"blk":[{"I":1,"D":"relay_0"},{"I":2,"D":"relay_1"},{"I":3,"D":"device"}],
"sen":[{"I":1101,"T":"S","D":"output","R":"0/1","L":1},
{"I":2101,"T":"S","D":"output","R":"0/1","L":2},
{"I":4101,"T":"P","D":"power","U":"W","R":["0/2650","-1"],"L":1},
{"I":4201,"T":"P","D":"power","U":"W","R":["0/2650","-1"],"L":2},
{"I":3104,"T":"T","D":"deviceTemp","U":"C","R":["-40/300","999"],"L":3}]}"#;

/// Shelly 1 status: relay on.
pub const SHELLY1_ON: &str = r#"{"G":[[0,112,1]]}"#;

/// Shelly 1 status: relay off.
pub const SHELLY1_OFF: &str = r#"{"G":[[0,112,0]]}"#;

/// H&T status as sent right after wake-up.
pub const SHELLYHT_STATUS: &str = r#"{"G":[[0,33,21.4],[0,44,48.5],[0,77,96]]}"#;

/// Returns every `(device id, description)` pair.
pub fn all_descriptions() -> Vec<(&'static str, &'static str)> {
    vec![
        (SHELLY1_ID, SHELLY1),
        (SHELLY1PM_ID, SHELLY1PM),
        (RGBW2_ID, RGBW2_WHITE),
        (SHELLYHT_ID, SHELLYHT),
        (SHELLY25_ID, SHELLY25_ROLLER),
        (SHELLY25_V2_ID, SHELLY25_V2),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use coiot_protocol::{DescriptionCache, DeviceIdentity};

    #[test]
    fn every_fixture_ingests_for_its_version() {
        for (id, description) in all_descriptions() {
            let version = DeviceIdentity::parse(id).unwrap().version().unwrap();
            let mut cache = DescriptionCache::new();
            let report = cache.ingest_payload(description, Some(version)).unwrap();
            assert!(!report.is_inconsistent(), "{id}: {:?}", report.rejected);
            assert!(!cache.is_empty(), "{id}");
        }
    }

    #[test]
    fn rgbw2_gets_synthetic_blocks() {
        let mut cache = DescriptionCache::new();
        let report = cache.ingest_payload(RGBW2_WHITE, None).unwrap();
        assert_eq!(report.synthetic_blocks, vec!["1", "2", "3"]);
    }
}
