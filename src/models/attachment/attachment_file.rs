//! File payload owned by a single mail item.

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
  pub id: String,
  pub mail_item_id: String,
  pub file_name: String,
  pub content_type: String,
  /// Empty on list reads; only attachment downloads load the payload.
  #[serde(skip)]
  pub content: Vec<u8>,
}

impl Attachment {
  pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, content: Vec<u8>) -> Self {
    Self {
      file_name: file_name.into(),
      content_type: content_type.into(),
      content,
      ..Self::default()
    }
  }
}
