//! Tabular (CSV) payloads

use csv::{ReaderBuilder, StringRecord, Terminator, Trim, WriterBuilder};
use serde_json::Value;

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::{CredentialField, CredentialRecord};
use crate::transfer::ImportRow;

const EXPORT_FIELDS: [CredentialField; 4] = [
    CredentialField::Name,
    CredentialField::Username,
    CredentialField::Secret,
    CredentialField::Url,
];

/// Parses a header-led CSV payload. Fields are trimmed and blank lines
/// skipped. Columns are matched by header name and unknown columns are
/// ignored. An unreadable header or a ragged record fails the whole payload;
/// cell values are only checked when the row is inserted.
pub fn parse_rows(content: &str) -> EngineResult<Vec<ImportRow>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| EngineError::parse(format!("CSV header: {}", e)))?;
    let columns: Vec<Option<CredentialField>> = headers
        .iter()
        .map(|header| CredentialField::from_key(header).ok())
        .collect();

    let mut rows = Vec::new();
    for (index, result) in reader.records().enumerate() {
        // Header is line 1
        let record = result
            .map_err(|e| EngineError::parse(format!("CSV record {}: {}", index + 2, e)))?;
        rows.push(row_from_record(&columns, &record));
    }

    Ok(rows)
}

fn row_from_record(columns: &[Option<CredentialField>], record: &StringRecord) -> ImportRow {
    let mut row = ImportRow::default();
    for (field, cell) in columns.iter().zip(record.iter()) {
        let Some(field) = field else { continue };
        if cell.is_empty() {
            continue;
        }

        let value = Some(Value::from(cell));
        match field {
            CredentialField::Name => row.name = value,
            CredentialField::Username => row.username = value,
            CredentialField::Secret => row.secret = value,
            CredentialField::Url => row.url = value,
            CredentialField::IsPinned => row.is_pinned = value,
        }
    }
    row
}

/// Renders records as `Name,Username,Secret,Url`, quoting fields that
/// contain separators, quotes or line breaks.
pub fn render(records: &[CredentialRecord]) -> EngineResult<String> {
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer
        .write_record(EXPORT_FIELDS.iter().map(|field| field.key()))
        .map_err(write_error)?;

    for record in records {
        writer
            .write_record([
                record.name.as_str(),
                record.username.as_str(),
                record.secret.as_str(),
                record.url.as_deref().unwrap_or(""),
            ])
            .map_err(write_error)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| EngineError::Io(std::io::Error::other(e.to_string())))?;
    String::from_utf8(bytes).map_err(|e| EngineError::Io(std::io::Error::other(e)))
}

fn write_error(e: csv::Error) -> EngineError {
    EngineError::Io(std::io::Error::other(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: i64, name: &str, username: &str, secret: &str, url: Option<&str>) -> CredentialRecord {
        let now = Utc::now();
        CredentialRecord {
            id,
            name: name.to_string(),
            username: username.to_string(),
            secret: secret.to_string(),
            url: url.map(str::to_string),
            is_pinned: false,
            created_at: now,
            modified_at: now,
        }
    }

    #[test]
    fn parses_header_led_rows_with_trimming() {
        let payload = "Name, Username ,Secret,Url\n Bank , alice ,s3cr3t, bank.example \n\nMail,bob,hunter2,\n";
        let rows = parse_rows(payload).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, Some("Bank".into()));
        assert_eq!(rows[0].username, Some("alice".into()));
        assert_eq!(rows[0].url, Some("bank.example".into()));
        assert_eq!(rows[1].url, None);
        assert_eq!(rows[1].is_pinned, None);
    }

    #[test]
    fn accepts_pin_column_and_password_alias() {
        let payload = "Name,Username,Password,Url,IsPinned\nA,u1,p1,,yes\nB,u2,p2,,0\nC,u3,p3,,\n";
        let credentials: Vec<_> = parse_rows(payload)
            .unwrap()
            .into_iter()
            .map(|row| row.into_credential().unwrap())
            .collect();

        assert_eq!(credentials[0].secret, "p1");
        assert!(credentials[0].is_pinned);
        assert!(!credentials[1].is_pinned);
        assert!(!credentials[2].is_pinned);
    }

    #[test]
    fn ragged_record_aborts_the_payload() {
        let payload = "Name,Username,Secret,Url\nA,u1,p1,\nB,u2\n";
        let err = parse_rows(payload).expect_err("second record is short");
        assert!(matches!(err, EngineError::Parse { .. }));
    }

    #[test]
    fn invalid_pin_value_fails_only_its_row() {
        let payload = "Name,Username,Secret,Url,IsPinned\nA,u1,p1,,true\nB,u2,p2,,maybe\nC,u3,p3,,false\n";
        let rows = parse_rows(payload).unwrap();
        assert_eq!(rows.len(), 3);

        let results: Vec<_> = rows.into_iter().map(ImportRow::into_credential).collect();
        assert!(results[0].as_ref().unwrap().is_pinned);
        assert!(matches!(results[1], Err(EngineError::Parse { .. })));
        assert!(!results[2].as_ref().unwrap().is_pinned);
    }

    #[test]
    fn unknown_columns_are_ignored() {
        let payload = "Folder,Name,Username,Secret\nWork,Bank,alice,x\n";
        let rows = parse_rows(payload).unwrap();
        assert_eq!(rows[0].name, Some("Bank".into()));
        assert_eq!(rows[0].url, None);
    }

    #[test]
    fn header_only_payload_has_no_rows() {
        assert!(parse_rows("Name,Username,Secret,Url\n").unwrap().is_empty());
    }

    #[test]
    fn renders_header_and_quotes_special_characters() {
        let records = vec![
            record(1, "Acme, Inc", "alice", "pa\"ss", Some("acme.example")),
            record(2, "Mail", "bob", "line1\nline2", None),
        ];
        let out = render(&records).unwrap();
        let mut lines = out.lines();

        assert_eq!(lines.next(), Some("Name,Username,Secret,Url"));
        assert_eq!(lines.next(), Some("\"Acme, Inc\",alice,\"pa\"\"ss\",acme.example"));
        assert!(out.contains("Mail,bob,\"line1\nline2\","));
    }

    #[test]
    fn rendered_payload_parses_back() {
        let records = vec![record(1, "Acme, Inc", "alice", "a,b\"c", Some("x"))];
        let rows = parse_rows(&render(&records).unwrap()).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, Some("Acme, Inc".into()));
        assert_eq!(rows[0].secret, Some("a,b\"c".into()));
    }
}
