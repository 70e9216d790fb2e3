//! Utility functions: tracing, HTML escape, MIME traversal.

use crate::models::attachment::Attachment;
use mailparse::{MailHeaderMap, ParsedMail};
use tracing_subscriber::{EnvFilter, fmt};

/// Initialize pretty CLI logging. `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  // A second call (tests, embedding) keeps the first subscriber.
  let _ = fmt()
    .with_env_filter(filter)
    .with_target(false)
    .pretty()
    .try_init();
}

/// Escape markup so stored text cannot inject HTML or script.
pub fn html_escape(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#x27;"),
      _ => out.push(c),
    }
  }
  out
}

/// First value of a header, case-insensitive, if present and non-blank.
pub fn header_value(parsed: &ParsedMail<'_>, name: &str) -> Option<String> {
  parsed
    .headers
    .get_first_value(name)
    .map(|v| v.trim().to_string())
    .filter(|v| !v.is_empty())
}

/// Extract first text and HTML bodies from a MIME tree.
pub fn extract_bodies(parsed: &ParsedMail<'_>) -> (Option<String>, Option<String>) {
  if parsed.subparts.is_empty() {
    if is_attachment(parsed) {
      return (None, None);
    }
    let data = parsed.get_body().unwrap_or_default();
    match parsed.ctype.mimetype.as_str() {
      "text/html" => (None, Some(data)),
      _ => (Some(data), None),
    }
  } else {
    let mut text = None;
    let mut html = None;
    for part in &parsed.subparts {
      let (t, h) = extract_bodies(part);
      text = text.or(t);
      html = html.or(h);
    }
    (text, html)
  }
}

/// Traverse MIME leaves and collect the ones that look like attachments.
pub fn collect_attachments(parsed: &ParsedMail<'_>, out: &mut Vec<Attachment>) {
  if !parsed.subparts.is_empty() {
    for part in &parsed.subparts {
      collect_attachments(part, out);
    }
    return;
  }
  if is_attachment(parsed) {
    let content = parsed.get_body_raw().unwrap_or_default();
    out.push(Attachment::new(
      file_name(parsed).unwrap_or_default(),
      parsed.ctype.mimetype.clone(),
      content,
    ));
  }
}

/// Explicit disposition, a file name, or any non-text leaf.
fn is_attachment(part: &ParsedMail<'_>) -> bool {
  let mimetype = part.ctype.mimetype.as_str();
  let is_text = mimetype == "text/plain" || mimetype == "text/html";
  let disposition = part
    .headers
    .get_first_value("Content-Disposition")
    .unwrap_or_default()
    .to_ascii_lowercase();
  disposition.starts_with("attachment") || file_name(part).is_some() || !is_text
}

fn file_name(part: &ParsedMail<'_>) -> Option<String> {
  let disposition = part.get_content_disposition();
  disposition
    .params
    .get("filename")
    .or_else(|| part.ctype.params.get("name"))
    .map(|n| n.trim_matches(['"', '\'']).to_string())
    .filter(|n| !n.is_empty())
}
