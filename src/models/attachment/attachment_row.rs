//! Attachment rows: metadata for listings, full row for downloads.

use super::Attachment;
use sqlx::FromRow;

#[derive(Debug, FromRow)]
pub struct AttachmentMetaRow {
  pub id: String,
  #[sqlx(rename = "mailItemId")]
  pub mail_item_id: String,
  #[sqlx(rename = "fileName")]
  pub file_name: String,
  #[sqlx(rename = "contentType")]
  pub content_type: String,
}

#[derive(Debug, FromRow)]
pub struct AttachmentRow {
  pub id: String,
  #[sqlx(rename = "mailItemId")]
  pub mail_item_id: String,
  #[sqlx(rename = "fileName")]
  pub file_name: String,
  #[sqlx(rename = "contentType")]
  pub content_type: String,
  pub content: Vec<u8>,
}

impl From<AttachmentMetaRow> for Attachment {
  fn from(r: AttachmentMetaRow) -> Self {
    Attachment {
      id: r.id,
      mail_item_id: r.mail_item_id,
      file_name: r.file_name,
      content_type: r.content_type,
      content: Vec::new(),
    }
  }
}

impl From<AttachmentRow> for Attachment {
  fn from(r: AttachmentRow) -> Self {
    Attachment {
      id: r.id,
      mail_item_id: r.mail_item_id,
      file_name: r.file_name,
      content_type: r.content_type,
      content: r.content,
    }
  }
}
