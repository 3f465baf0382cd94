//! DDL for the credentials table.
//!
//! Every statement is idempotent so the schema can be ensured on each
//! startup. Statements are kept separate because prepared statements on
//! both backends only accept one at a time.

pub const CREDENTIALS_TABLE: &str = "credentials";

/// Columns selected by every read, in record field order
pub const CREDENTIAL_COLUMNS: &str =
    "id, name, username, secret, url, is_pinned, created_at, modified_at";

/// Embedded-file schema.
///
/// Timestamps default to millisecond-precision UTC text. The trigger only
/// fires when an update leaves `modified_at` untouched, which is never the
/// case for updates issued by the repository itself.
pub const SQLITE_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS credentials (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT NOT NULL,
        username    TEXT NOT NULL,
        secret      TEXT NOT NULL,
        url         TEXT NULL,
        is_pinned   INTEGER NOT NULL DEFAULT 0,
        created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        modified_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
    )
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS credentials_touch_modified_at
    AFTER UPDATE ON credentials
    FOR EACH ROW WHEN NEW.modified_at IS OLD.modified_at
    BEGIN
        UPDATE credentials
        SET modified_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
        WHERE id = NEW.id;
    END
    "#,
];

/// Client-server schema. `modified_at` refreshes through its on-update
/// column default.
pub const MYSQL_SCHEMA: &[&str] = &[r#"
    CREATE TABLE IF NOT EXISTS credentials (
        id          BIGINT AUTO_INCREMENT PRIMARY KEY,
        name        VARCHAR(255) NOT NULL,
        username    VARCHAR(255) NOT NULL,
        secret      VARCHAR(255) NOT NULL,
        url         VARCHAR(2048) NULL,
        is_pinned   BOOLEAN NOT NULL DEFAULT FALSE,
        created_at  DATETIME(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6),
        modified_at DATETIME(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6)
                    ON UPDATE CURRENT_TIMESTAMP(6)
    )
    "#];
