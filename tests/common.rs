#![allow(dead_code)]

use slurper::{
    models::{attachment::Attachment, mail::MailItem},
    storage::Storage,
};
use tempfile::TempDir;

/// A fresh sqlite-backed store in its own temporary directory.
pub async fn temp_storage() -> (Storage, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("mail.db").display());
    let storage = Storage::connect(&url, 5).await.expect("connect sqlite");
    (storage, dir)
}

pub fn mail(subject: &str, date_sent: &str) -> MailItem {
    let mut item = MailItem::new();
    item.date_sent = date_sent.to_string();
    item.from_address = "dev@example.test".into();
    item.to_addresses = vec!["you@example.test".into()];
    item.subject = subject.into();
    item.body = format!("body of {subject}");
    item.content_type = "text/plain".into();
    item
}

pub fn attachment(name: &str, content: &[u8]) -> Attachment {
    Attachment::new(name, "application/octet-stream", content.to_vec())
}
