//! Schema setup and sqlite file handling.

use crate::storage::StorageType;
use sqlx::AnyPool;
use std::path::Path;

const SQLITE_SCHEMA: [&str; 4] = [
    r#"CREATE TABLE IF NOT EXISTS mailitem (
        id TEXT PRIMARY KEY,
        dateSent TEXT NOT NULL,
        fromAddress TEXT NOT NULL,
        toAddressList TEXT NOT NULL,
        subject TEXT NOT NULL,
        xmailer TEXT NOT NULL,
        body TEXT NOT NULL,
        contentType TEXT NOT NULL,
        boundary TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS attachment (
        id TEXT PRIMARY KEY,
        mailItemId TEXT NOT NULL REFERENCES mailitem(id),
        fileName TEXT NOT NULL,
        contentType TEXT NOT NULL,
        content BLOB NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_mailitem_dateSent ON mailitem (dateSent)",
    "CREATE INDEX IF NOT EXISTS idx_attachment_mailItemId ON attachment (mailItemId)",
];

const MYSQL_SCHEMA: [&str; 2] = [
    r#"CREATE TABLE IF NOT EXISTS mailitem (
        id VARCHAR(36) NOT NULL PRIMARY KEY,
        dateSent VARCHAR(19) NOT NULL,
        fromAddress VARCHAR(512) NOT NULL,
        toAddressList TEXT NOT NULL,
        subject TEXT NOT NULL,
        xmailer VARCHAR(255) NOT NULL,
        body LONGTEXT NOT NULL,
        contentType VARCHAR(255) NOT NULL,
        boundary VARCHAR(255) NOT NULL,
        INDEX idx_mailitem_dateSent (dateSent)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS attachment (
        id VARCHAR(36) NOT NULL PRIMARY KEY,
        mailItemId VARCHAR(36) NOT NULL,
        fileName VARCHAR(512) NOT NULL,
        contentType VARCHAR(255) NOT NULL,
        content LONGBLOB NOT NULL,
        INDEX idx_attachment_mailItemId (mailItemId),
        FOREIGN KEY (mailItemId) REFERENCES mailitem(id)
    )"#,
];

/// Create the `mailitem` and `attachment` tables if absent.
pub async fn run_migrations(pool: &AnyPool, engine: StorageType) -> Result<(), sqlx::Error> {
    let statements: &[&str] = match engine {
        StorageType::Mysql => &MYSQL_SCHEMA,
        _ => &SQLITE_SCHEMA,
    };
    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// File path named by a sqlite URL, or `None` for in-memory databases
/// and non-sqlite URLs.
pub fn sqlite_file(db_url: &str) -> Option<&Path> {
    let rest = db_url
        .strip_prefix("sqlite://")
        .or_else(|| db_url.strip_prefix("sqlite:"))?;
    let path = rest.split_once('?').map_or(rest, |(p, _)| p);
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(Path::new(path))
}

/// Create the parent directory and the sqlite file if they do not exist yet.
pub fn ensure_sqlite_file(db_url: &str) -> std::io::Result<()> {
    let Some(path) = sqlite_file(db_url) else {
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_file_strips_scheme_and_query() {
        assert_eq!(
            sqlite_file("sqlite://data/mail.db?mode=rwc"),
            Some(Path::new("data/mail.db"))
        );
        assert_eq!(sqlite_file("sqlite:mail.db"), Some(Path::new("mail.db")));
        assert_eq!(sqlite_file("sqlite::memory:"), None);
        assert_eq!(sqlite_file("mysql://root@localhost/mail"), None);
    }

    #[test]
    fn ensure_creates_missing_parents() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nested/deeper/mail.db");
        let url = format!("sqlite://{}", file.display());
        ensure_sqlite_file(&url).unwrap();
        assert!(file.exists());
    }
}
