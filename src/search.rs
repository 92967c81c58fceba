use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

// Route numbers like 24, N29, 390A or C2
static LINE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z]?\d+[a-zA-Z]?$").unwrap());

static POSTCODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[a-z]{1,2}\d[a-z\d]?\s*\d[a-z]{2}$").unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum SearchQuery {
    Line(String),
    Postcode(String),
    StopName(String),
}

/// Work out what the user typed into the search box.
pub fn classify(query: &str) -> Option<SearchQuery> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return None;
    }

    let query = if LINE_NUMBER.is_match(trimmed) {
        SearchQuery::Line(trimmed.to_uppercase())
    } else if POSTCODE.is_match(trimmed) {
        SearchQuery::Postcode(trimmed.to_string())
    } else {
        SearchQuery::StopName(trimmed.to_string())
    };
    Some(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_queries_are_ignored() {
        assert_eq!(classify(""), None);
        assert_eq!(classify("   \t"), None);
    }

    #[test]
    fn recognises_line_numbers() {
        for q in ["24", "N29", " C2 ", "7"] {
            assert_eq!(classify(q), Some(SearchQuery::Line(q.trim().to_string())), "{}", q);
        }
        assert_eq!(classify("n29"), Some(SearchQuery::Line("N29".into())));
        assert_eq!(classify("390a "), Some(SearchQuery::Line("390A".into())));
    }

    #[test]
    fn recognises_postcodes() {
        for q in ["SW1A 1AA", "n1 9gu", "EC1A1BB", "W1D 3QF"] {
            assert_eq!(classify(q), Some(SearchQuery::Postcode(q.to_string())), "{}", q);
        }
    }

    #[test]
    fn everything_else_is_a_stop_name() {
        assert_eq!(
            classify("Oxford Circus"),
            Some(SearchQuery::StopName("Oxford Circus".into()))
        );
        assert_eq!(classify("24 bus"), Some(SearchQuery::StopName("24 bus".into())));
    }
}
