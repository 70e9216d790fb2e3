//! Text sanitization applied to stored mail before it is handed back out.

use crate::util::html_escape;

pub trait Sanitizer: Send + Sync {
  fn sanitize(&self, input: &str) -> String;
}

/// Neutralizes markup by escaping it.
#[derive(Debug, Clone, Copy, Default)]
pub struct XssSanitizer;

impl Sanitizer for XssSanitizer {
  fn sanitize(&self, input: &str) -> String {
    html_escape(input)
  }
}
