//! A captured mail message and its attachments.

use crate::models::attachment::Attachment;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Separator used to flatten the recipient list into a single column.
pub const ADDRESS_SEPARATOR: &str = "; ";

/// Storage and wire format for `date_sent`.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailItem {
  pub id: String,
  pub date_sent: String,
  pub from_address: String,
  pub to_addresses: Vec<String>,
  pub subject: String,
  pub xmailer: String,
  pub body: String,
  pub content_type: String,
  pub boundary: String,
  pub attachments: Vec<Attachment>,
}

impl MailItem {
  /// New empty item with a fresh id, sent now.
  pub fn new() -> Self {
    Self {
      id: Uuid::new_v4().to_string(),
      date_sent: format_date(Utc::now()),
      ..Self::default()
    }
  }

  /// An item read back for an unknown id has no identity.
  pub fn is_empty(&self) -> bool {
    self.id.is_empty()
  }
}

pub fn format_date(at: DateTime<Utc>) -> String {
  at.format(DATE_FORMAT).to_string()
}

pub fn join_addresses(addresses: &[String]) -> String {
  addresses.join(ADDRESS_SEPARATOR)
}

/// Inverse of [`join_addresses`]. An empty column yields no recipients.
pub fn split_addresses(joined: &str) -> Vec<String> {
  if joined.is_empty() {
    return Vec::new();
  }
  joined.split(ADDRESS_SEPARATOR).map(str::to_string).collect()
}
