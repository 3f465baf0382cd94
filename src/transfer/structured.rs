//! Structured (JSON) payloads

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::{CredentialRecord, NewCredential};
use crate::transfer::ImportRow;

/// Parses a JSON array of objects keyed `Name`, `Username`, `Secret`,
/// `Url` and optionally `IsPinned`. Unknown keys are ignored. Anything other
/// than an array of objects fails the payload; a value of the wrong type
/// only fails its row on insert.
pub fn parse_rows(content: &str) -> EngineResult<Vec<ImportRow>> {
    serde_json::from_str::<Vec<ImportRow>>(content)
        .map_err(|e| EngineError::parse(format!("JSON payload: {}", e)))
}

/// Pretty-printed array of the portable subset of each record
pub fn render(records: &[CredentialRecord]) -> EngineResult<String> {
    let portable: Vec<NewCredential> = records.iter().map(NewCredential::from).collect();
    serde_json::to_string_pretty(&portable)
        .map_err(|e| EngineError::Io(std::io::Error::other(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::Value;

    #[test]
    fn parses_array_with_optional_keys() {
        let payload = r#"[
            {"Name": "Bank", "Username": "alice", "Secret": "s3cr3t", "Url": "bank.example", "IsPinned": true},
            {"Name": "Mail", "Username": "bob", "Password": "hunter2", "Extra": 42}
        ]"#;
        let rows = parse_rows(payload).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].is_pinned, Some(Value::Bool(true)));
        assert_eq!(rows[1].secret, Some("hunter2".into()));
        assert_eq!(rows[1].url, None);
    }

    #[test]
    fn missing_required_key_still_parses() {
        let rows = parse_rows(r#"[{"Username": "alice", "Secret": "x"}]"#).unwrap();
        assert_eq!(rows[0].name, None);
    }

    #[test]
    fn non_array_payload_is_a_parse_error() {
        let err = parse_rows(r#"{"Name": "Bank"}"#).expect_err("object, not array");
        assert!(matches!(err, EngineError::Parse { .. }));

        assert!(matches!(parse_rows("[{"), Err(EngineError::Parse { .. })));
        assert!(matches!(parse_rows(r#"[{"Name": "Bank"}, 7]"#), Err(EngineError::Parse { .. })));
    }

    #[test]
    fn wrongly_typed_value_is_kept_for_the_row() {
        let payload = r#"[
            {"Name": "D", "Username": "u", "Secret": "p"},
            {"Name": 42, "Username": "v", "Secret": "q"}
        ]"#;
        let rows = parse_rows(payload).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].name, Some(Value::from(42)));
        assert!(rows[1].clone().into_credential().is_err());
    }

    #[test]
    fn renders_portable_fields_only() {
        let now = Utc::now();
        let records = vec![CredentialRecord {
            id: 7,
            name: "Bank".into(),
            username: "alice".into(),
            secret: "s3cr3t".into(),
            url: None,
            is_pinned: true,
            created_at: now,
            modified_at: now,
        }];

        let value: Value = serde_json::from_str(&render(&records).unwrap()).unwrap();
        let entry = &value[0];
        assert_eq!(entry["Name"], "Bank");
        assert_eq!(entry["Secret"], "s3cr3t");
        assert_eq!(entry["IsPinned"], true);
        assert!(entry["Url"].is_null());
        assert!(entry.get("Id").is_none());
        assert!(entry.get("CreatedAt").is_none());
    }
}
