//! Builds SQL filter clauses from search criteria.
//!
//! Every user value is bound as a parameter; wildcards live in the bound
//! value, never in the SQL text. Placeholders are `?`, which both the sqlite
//! and mysql drivers accept.

use crate::models::{mail::DATE_FORMAT, search::MailSearch};
use chrono::NaiveDate;

const SEARCH_DATE_FORMAT: &str = "%Y-%m-%d";

/// Escape character for `LIKE` patterns; the literal reads the same on
/// sqlite and mysql.
const LIKE_ESCAPE: char = '!';

/// A `WHERE` fragment (starting with ` AND`) and its positional parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub clause: String,
    pub params: Vec<String>,
}

impl SearchFilter {
    fn push(&mut self, clause: &str, params: impl IntoIterator<Item = String>) {
        self.clause.push_str(clause);
        self.params.extend(params);
    }

    pub fn placeholder_count(&self) -> usize {
        self.clause.matches('?').count()
    }
}

pub fn build_filter(search: &MailSearch) -> SearchFilter {
    let mut filter = SearchFilter::default();

    if let Some(term) = non_empty(&search.message) {
        let like = contains(term);
        filter.push(
            " AND (mailitem.body LIKE ? ESCAPE '!' OR mailitem.subject LIKE ? ESCAPE '!')",
            [like.clone(), like],
        );
    }

    if let Some(term) = non_empty(&search.from) {
        filter.push(" AND mailitem.fromAddress LIKE ? ESCAPE '!'", [contains(term)]);
    }

    if let Some(term) = non_empty(&search.to) {
        filter.push(" AND mailitem.toAddressList LIKE ? ESCAPE '!'", [contains(term)]);
    }

    if let Some(start) = non_empty(&search.start).and_then(start_of_day) {
        filter.push(" AND mailitem.dateSent >= ?", [start]);
    }

    if let Some(end) = non_empty(&search.end).and_then(start_of_day) {
        filter.push(" AND mailitem.dateSent <= ?", [end]);
    }

    filter
}

/// `YYYY-MM-DD` to the stored timestamp of that day's midnight.
pub fn start_of_day(day: &str) -> Option<String> {
    NaiveDate::parse_from_str(day.trim(), SEARCH_DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.format(DATE_FORMAT).to_string())
}

fn non_empty(field: &str) -> Option<&str> {
    let t = field.trim();
    if t.is_empty() { None } else { Some(t) }
}

/// `%term%`, with `%`, `_` and the escape character itself matched literally.
fn contains(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_') || c == LIKE_ESCAPE {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_criteria_add_nothing() {
        let f = build_filter(&MailSearch::default());
        assert_eq!(f, SearchFilter::default());
    }

    #[test]
    fn whitespace_only_fields_are_ignored() {
        let search = MailSearch {
            message: "   ".into(),
            from: "\t".into(),
            ..Default::default()
        };
        assert!(build_filter(&search).params.is_empty());
    }

    #[test]
    fn message_binds_body_and_subject() {
        let search = MailSearch {
            message: " hello ".into(),
            ..Default::default()
        };
        let f = build_filter(&search);
        assert!(f.clause.contains("mailitem.body LIKE ?"));
        assert!(f.clause.contains("mailitem.subject LIKE ?"));
        assert_eq!(f.params, vec!["%hello%", "%hello%"]);
    }

    #[test]
    fn from_matches_sender_address() {
        let search = MailSearch {
            from: "a@x.com".into(),
            ..Default::default()
        };
        let f = build_filter(&search);
        assert_eq!(f.clause, " AND mailitem.fromAddress LIKE ? ESCAPE '!'");
        assert_eq!(f.params, vec!["%a@x.com%"]);
    }

    #[test]
    fn like_wildcards_in_terms_are_escaped() {
        assert_eq!(contains("100%"), "%100!%%");
        assert_eq!(contains("a_b"), "%a!_b%");
        assert_eq!(contains("wow!"), "%wow!!%");
        assert_eq!(contains(r"c:\tmp"), r"%c:\tmp%");
    }

    #[test]
    fn dates_become_start_of_day_bounds() {
        let search = MailSearch {
            start: "2020-01-15".into(),
            end: "2020-02-15".into(),
            ..Default::default()
        };
        let f = build_filter(&search);
        assert!(f.clause.contains("dateSent >= ?"));
        assert!(f.clause.contains("dateSent <= ?"));
        assert_eq!(f.params, vec!["2020-01-15 00:00:00", "2020-02-15 00:00:00"]);
    }

    #[test]
    fn malformed_dates_are_dropped() {
        let search = MailSearch {
            to: "b@x.com".into(),
            start: "15/01/2020".into(),
            end: "2020-13-45".into(),
            ..Default::default()
        };
        let f = build_filter(&search);
        assert!(!f.clause.contains("dateSent"));
        assert_eq!(f.params, vec!["%b@x.com%"]);
    }

    #[test]
    fn placeholders_align_with_params() {
        let search = MailSearch {
            message: "m".into(),
            from: "f".into(),
            to: "t".into(),
            start: "2021-03-04".into(),
            end: "2021-05-06".into(),
        };
        let f = build_filter(&search);
        assert_eq!(f.placeholder_count(), f.params.len());
        assert_eq!(
            f.params,
            vec![
                "%m%",
                "%m%",
                "%f%",
                "%t%",
                "2021-03-04 00:00:00",
                "2021-05-06 00:00:00"
            ]
        );
    }
}
