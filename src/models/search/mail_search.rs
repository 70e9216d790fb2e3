//! Filter criteria for searching stored mail. Never persisted.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MailSearch {
  /// Matched against body or subject.
  pub message: String,
  pub from: String,
  pub to: String,
  /// Inclusive lower bound, `YYYY-MM-DD`.
  pub start: String,
  /// Upper bound, `YYYY-MM-DD`, compared against the start of that day.
  pub end: String,
}
