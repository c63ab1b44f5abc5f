//! Textual repair of malformed device JSON.
//!
//! Some firmware releases drop the comma between adjacent objects or
//! arrays, or emit a doubled comma. Only these fixed substitutions are
//! applied; anything else must fail to parse.

/// Substitutions applied in order by [`repair_json`].
pub const JSON_REPAIRS: &[(&str, &str)] = &[("}{", "},{"), ("][", "],["), ("],,[", "],[")];

/// Applies [`JSON_REPAIRS`] to a payload.
pub fn repair_json(payload: &str) -> String {
    JSON_REPAIRS
        .iter()
        .fold(payload.to_string(), |json, (from, to)| json.replace(from, to))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserts_missing_object_separator() {
        assert_eq!(repair_json(r#"[{"a":1}{"b":2}]"#), r#"[{"a":1},{"b":2}]"#);
    }

    #[test]
    fn inserts_missing_array_separator() {
        assert_eq!(
            repair_json(r#"{"G":[[0,112,1][0,111,20.5]]}"#),
            r#"{"G":[[0,112,1],[0,111,20.5]]}"#
        );
    }

    #[test]
    fn collapses_double_comma() {
        assert_eq!(
            repair_json(r#"{"G":[[0,112,1],,[0,111,2]]}"#),
            r#"{"G":[[0,112,1],[0,111,2]]}"#
        );
    }

    #[test]
    fn well_formed_json_is_untouched() {
        let json = r#"{"G":[[0,112,1],[0,111,2]]}"#;
        assert_eq!(repair_json(json), json);
    }

    #[test]
    fn repair_does_not_invent_structure() {
        // Missing comma between scalars is not one of the known defects.
        let json = r#"{"G":[[0 112 1]]}"#;
        assert_eq!(repair_json(json), json);
        assert!(serde_json::from_str::<serde_json::Value>(&repair_json(json)).is_err());
    }
}
