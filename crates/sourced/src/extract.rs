use serde_json::Value;
use serde_json_path::JsonPath;
use sourced_logging::sourced_warn;

use crate::paginate::{NextPage, PageTransform};
use crate::{AcquireError, ConfigError, NotFoundError};

/// Query evaluation over an in-memory document.
pub trait Extractor: Send + Sync {
    type Value;

    /// Every match in document order; empty when nothing matches.
    fn find_all(&self, value: &Self::Value) -> Vec<Self::Value>;

    /// The first match in document order.
    fn find_one(&self, value: &Self::Value) -> Result<Self::Value, NotFoundError>;
}

/// A compiled JSONPath expression.
///
/// The leading `$` may be left out: `[*].title` and `data[*].name` are read as
/// `$[*].title` and `$.data[*].name`.
#[derive(Debug, Clone)]
pub struct JsonQuery {
    source: String,
    path: JsonPath,
}

impl JsonQuery {
    pub fn parse(query: &str) -> Result<Self, ConfigError> {
        let normalized = normalize_query(query);
        let path = JsonPath::parse(&normalized).map_err(|err| ConfigError::InvalidQuery {
            query: query.to_string(),
            message: err.to_string(),
        })?;
        Ok(Self {
            source: query.to_string(),
            path,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn normalize_query(query: &str) -> String {
    let query = query.trim();
    if query.starts_with('$') {
        query.to_string()
    } else if query.starts_with('[') || query.starts_with('.') {
        format!("${query}")
    } else {
        format!("$.{query}")
    }
}

impl Extractor for JsonQuery {
    type Value = Value;

    fn find_all(&self, value: &Value) -> Vec<Value> {
        self.path.query(value).all().into_iter().cloned().collect()
    }

    fn find_one(&self, value: &Value) -> Result<Value, NotFoundError> {
        self.path
            .query(value)
            .first()
            .cloned()
            .ok_or_else(|| NotFoundError {
                query: self.source.clone(),
            })
    }
}

/// Post-fetch transform applied to each decoded page before merging.
#[derive(Debug, Clone)]
pub enum Extraction<E> {
    /// Replace the page with the list of all matches.
    FindAll(E),
    /// Replace the page with its first match; zero matches is an error.
    FindOne(E),
}

impl<E> PageTransform<E::Value> for Extraction<E>
where
    E: Extractor,
    E::Value: From<Vec<E::Value>>,
{
    fn apply(&self, page: E::Value) -> Result<E::Value, AcquireError> {
        match self {
            Extraction::FindAll(extractor) => Ok(E::Value::from(extractor.find_all(&page))),
            Extraction::FindOne(extractor) => Ok(extractor.find_one(&page)?),
        }
    }
}

/// Resolves the next page URL as the first match of a query.
///
/// No match and `null` both end pagination.
#[derive(Debug, Clone)]
pub struct QueryCursor {
    query: JsonQuery,
}

impl QueryCursor {
    pub fn new(query: JsonQuery) -> Self {
        Self { query }
    }
}

impl NextPage<Value> for QueryCursor {
    fn next_url(&self, page: &Value) -> Option<String> {
        match self.query.find_one(page) {
            Ok(Value::String(url)) if !url.is_empty() => Some(url),
            Ok(Value::Null) | Ok(Value::String(_)) | Err(_) => None,
            Ok(other) => {
                sourced_warn!(
                    "next page query {:?} matched a non-string value: {}",
                    self.query.as_str(),
                    other
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn find_all_projects_field_from_every_element() {
        let query = JsonQuery::parse("[*].title").unwrap();
        let doc = json!([{"title": "a"}, {"title": "b"}]);
        assert_eq!(query.find_all(&doc), vec![json!("a"), json!("b")]);
    }

    #[test]
    fn find_all_never_fails_on_zero_matches() {
        let query = JsonQuery::parse("[*].missing").unwrap();
        assert!(query.find_all(&json!([{"title": "a"}])).is_empty());
    }

    #[test]
    fn find_one_returns_first_match_in_document_order() {
        let query = JsonQuery::parse("data[*].id").unwrap();
        let doc = json!({"data": [{"id": 3}, {"id": 1}]});
        assert_eq!(query.find_one(&doc).unwrap(), json!(3));
    }

    #[test]
    fn find_one_without_match_is_not_found() {
        let query = JsonQuery::parse("nothing.here").unwrap();
        let err = query.find_one(&json!({"a": 1})).unwrap_err();
        assert_eq!(err.query, "nothing.here");
    }

    #[test]
    fn explicit_root_is_kept() {
        let query = JsonQuery::parse("$.a").unwrap();
        assert_eq!(query.find_one(&json!({"a": 1})).unwrap(), json!(1));
    }

    #[test]
    fn malformed_query_is_config_error() {
        let err = JsonQuery::parse("[*.").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidQuery { .. }));
    }

    #[test]
    fn extraction_find_all_wraps_matches_in_array() {
        let extraction = Extraction::FindAll(JsonQuery::parse("[*].name").unwrap());
        let page = json!([{"name": "x"}, {"name": "y"}]);
        assert_eq!(extraction.apply(page).unwrap(), json!(["x", "y"]));
    }

    #[test]
    fn extraction_find_one_propagates_not_found() {
        let extraction = Extraction::FindOne(JsonQuery::parse("absent").unwrap());
        let err = extraction.apply(json!({})).unwrap_err();
        assert!(matches!(err, AcquireError::NotFound(_)));
    }

    #[test]
    fn cursor_follows_string_and_stops_on_null_or_absence() {
        let cursor = QueryCursor::new(JsonQuery::parse("pages.next_url").unwrap());
        assert_eq!(
            cursor.next_url(&json!({"pages": {"next_url": "https://x/2"}})),
            Some("https://x/2".to_string())
        );
        assert_eq!(cursor.next_url(&json!({"pages": {"next_url": null}})), None);
        assert_eq!(cursor.next_url(&json!({})), None);
        assert_eq!(cursor.next_url(&json!({"pages": {"next_url": 7}})), None);
    }
}
