//! Free-text and facet filtering over in-memory records.

use std::collections::BTreeMap;

/// An active filter: free text plus exact-match facets.
///
/// A facet with an empty value is inactive.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Query {
    /// Case-insensitive substring matched against a record's search fields.
    pub text: String,
    /// Facet name -> required value.
    pub facets: BTreeMap<String, String>,
}

impl Query {
    /// Create an empty query that matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_facet(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.facets.insert(name.into(), value.into());
        self
    }

    /// Check if the query has any active predicate.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.active_facets().next().is_none()
    }

    /// Facets with a non-empty value.
    pub fn active_facets(&self) -> impl Iterator<Item = (&str, &str)> {
        self.facets
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Records that can be matched by a [`Query`].
pub trait Filterable {
    /// Facet names this record type understands.
    const FACETS: &'static [&'static str];

    /// Fields searched by free text.
    fn search_fields(&self) -> Vec<&str>;

    /// Current value of a facet, `None` when unset on this record.
    fn facet(&self, name: &str) -> Option<String>;
}

/// Check a single record against every active predicate.
pub fn matches<T: Filterable + ?Sized>(record: &T, query: &Query) -> bool {
    let needle = query.text.trim().to_lowercase();
    if !needle.is_empty()
        && !record
            .search_fields()
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    {
        return false;
    }

    query
        .active_facets()
        .all(|(name, value)| record.facet(name).as_deref() == Some(value))
}

/// Keep the records that match, preserving input order.
pub fn filter<'a, T, I>(records: I, query: &Query) -> Vec<&'a T>
where
    T: Filterable + 'a,
    I: IntoIterator<Item = &'a T>,
{
    records.into_iter().filter(|r| matches(*r, query)).collect()
}

/// Parse a raw query string into free text and facets.
///
/// Tokens of the form `name:value` become facets; everything else is
/// joined back into the free-text part.
///
/// # Examples
///
/// ```
/// use trackbook::view::parse_query;
///
/// let query = parse_query("status:done category:Tools drill bits");
/// assert_eq!(query.text, "drill bits");
/// assert_eq!(query.facets.get("status").map(String::as_str), Some("done"));
/// ```
pub fn parse_query(raw: &str) -> Query {
    let mut query = Query::default();
    let mut remaining = Vec::new();

    for token in raw.split_whitespace() {
        match token.split_once(':') {
            Some((name, value)) if !name.is_empty() && !value.is_empty() => {
                query.facets.insert(name.to_lowercase(), value.to_string());
            }
            _ => remaining.push(token),
        }
    }

    query.text = remaining.join(" ");
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Card {
        title: &'static str,
        owner: &'static str,
        status: &'static str,
        lane: Option<&'static str>,
    }

    impl Filterable for Card {
        const FACETS: &'static [&'static str] = &["status", "lane"];

        fn search_fields(&self) -> Vec<&str> {
            vec![self.title, self.owner]
        }

        fn facet(&self, name: &str) -> Option<String> {
            match name {
                "status" => Some(self.status.to_string()),
                "lane" => self.lane.map(str::to_string),
                _ => None,
            }
        }
    }

    fn cards() -> Vec<Card> {
        vec![
            Card { title: "Fix login", owner: "Ada", status: "todo", lane: Some("web") },
            Card { title: "Write docs", owner: "Grace", status: "done", lane: None },
            Card { title: "LOGIN audit", owner: "Linus", status: "done", lane: Some("web") },
        ]
    }

    #[test]
    fn test_empty_query_keeps_everything() {
        let cards = cards();
        assert_eq!(filter(&cards, &Query::new()).len(), 3);
    }

    #[test]
    fn test_text_is_case_insensitive() {
        let cards = cards();
        let hits = filter(&cards, &Query::new().with_text("login"));
        let titles: Vec<_> = hits.iter().map(|c| c.title).collect();
        assert_eq!(titles, vec!["Fix login", "LOGIN audit"]);
    }

    #[test]
    fn test_text_matches_any_search_field() {
        let cards = cards();
        let hits = filter(&cards, &Query::new().with_text("grace"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Write docs");
    }

    #[test]
    fn test_all_predicates_must_match() {
        let cards = cards();
        let query = Query::new().with_text("login").with_facet("status", "done");
        let hits = filter(&cards, &query);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "LOGIN audit");
    }

    #[test]
    fn test_empty_facet_is_inactive() {
        let cards = cards();
        let query = Query::new().with_facet("status", "");
        assert!(query.is_empty());
        assert_eq!(filter(&cards, &query).len(), 3);
    }

    #[test]
    fn test_unset_facet_does_not_match() {
        let cards = cards();
        let hits = filter(&cards, &Query::new().with_facet("lane", "web"));
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_facet_is_exact() {
        let cards = cards();
        assert!(filter(&cards, &Query::new().with_facet("status", "Done")).is_empty());
    }

    #[test]
    fn test_parse_query_no_facets() {
        let query = parse_query("hello world");
        assert_eq!(query.text, "hello world");
        assert!(query.facets.is_empty());
    }

    #[test]
    fn test_parse_query_combined() {
        let query = parse_query("status:todo lane:web fix login");
        assert_eq!(query.text, "fix login");
        assert_eq!(query.facets.get("status").unwrap(), "todo");
        assert_eq!(query.facets.get("lane").unwrap(), "web");
    }

    #[test]
    fn test_parse_query_keeps_value_colons() {
        let query = parse_query("time:10:30");
        assert_eq!(query.facets.get("time").unwrap(), "10:30");
    }

    #[test]
    fn test_parse_query_bare_colon_is_text() {
        let query = parse_query("ratio: :x");
        assert_eq!(query.text, "ratio: :x");
    }
}
