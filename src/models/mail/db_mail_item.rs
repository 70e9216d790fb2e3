//! Database row for a mail item.

use super::mail_item::{MailItem, split_addresses};
use sqlx::FromRow;

#[derive(Debug, FromRow)]
pub struct DbMailItem {
    pub id: String,
    #[sqlx(rename = "dateSent")]
    pub date_sent: String,
    #[sqlx(rename = "fromAddress")]
    pub from_address: String,
    #[sqlx(rename = "toAddressList")]
    pub to_address_list: String,
    pub subject: String,
    pub xmailer: String,
    pub body: String,
    #[sqlx(rename = "contentType")]
    pub content_type: String,
    pub boundary: String,
}

impl From<DbMailItem> for MailItem {
    fn from(d: DbMailItem) -> Self {
        MailItem {
            id: d.id,
            date_sent: d.date_sent,
            from_address: d.from_address,
            to_addresses: split_addresses(&d.to_address_list),
            subject: d.subject,
            xmailer: d.xmailer,
            body: d.body,
            content_type: d.content_type,
            boundary: d.boundary,
            attachments: Vec::new(),
        }
    }
}
