//! Per-request input for a datatable
//!
//! DataTables sends its state as bracketed query-string keys
//! (`columns[0][data]=name`, `search[value]=ana`, `order[0][dir]=asc`).
//! [`DatatableRequest`] folds those keys into a nested JSON value and reads
//! fields back through dot paths (`columns.0.data`, `search.value`).
//!
//! String inputs are trimmed and empty strings become `null`, so a blank
//! search box does not count as a search.
//!
//! # Example
//!
//! ```rust
//! use acton_datatable::request::DatatableRequest;
//!
//! let request = DatatableRequest::from_pairs([
//!     ("draw", "3"),
//!     ("search[value]", " ana "),
//!     ("columns[0][data]", "name"),
//!     ("columns[0][searchable]", "true"),
//! ]);
//!
//! assert!(request.is_search_request());
//! assert_eq!(request.input_str("search.value").as_deref(), Some("ana"));
//! assert_eq!(request.input_i64("draw"), Some(3));
//! ```

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Query},
    http::{request::Parts, Uri},
};
use serde_json::{Map, Value};

/// One entry of the `columns` input
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// `columns[i][data]`
    pub data: Option<String>,
    /// `columns[i][name]`
    pub name: Option<String>,
    /// `columns[i][searchable]`
    pub searchable: Option<String>,
}

impl ColumnDescriptor {
    fn from_value(value: &Value) -> Self {
        Self {
            data: value.get("data").and_then(scalar_to_string),
            name: value.get("name").and_then(scalar_to_string),
            searchable: value
                .get("searchable")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }

    /// The column this descriptor refers to: `data`, falling back to `name`
    pub fn identifier(&self) -> Option<&str> {
        self.data.as_deref().or(self.name.as_deref())
    }

    /// Only the string `"true"` marks a column searchable; a JSON `true` does not
    pub fn is_searchable(&self) -> bool {
        self.searchable.as_deref() == Some("true")
    }
}

/// Normalized request input plus the search classification
#[derive(Debug, Clone)]
pub struct DatatableRequest {
    input: Value,
    search_request: bool,
}

impl Default for DatatableRequest {
    fn default() -> Self {
        Self::from_json(Value::Object(Map::new()))
    }
}

impl DatatableRequest {
    /// Build from decoded key/value pairs with bracketed keys
    ///
    /// Later duplicates overwrite earlier ones. An empty bracket (`ids[]`)
    /// appends at the next free index.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut root = Map::new();
        for (key, value) in pairs {
            let segments = parse_key(key.as_ref());
            insert_path(&mut root, &segments, normalize_str(value.as_ref()));
        }
        Self::from_normalized(Value::Object(root))
    }

    /// Build from a raw (still percent-encoded) query string
    pub fn from_query_str(query: &str) -> Self {
        let query = query.trim_start_matches('?');
        let uri = format!("/?{}", encode_unsafe(query))
            .parse::<Uri>()
            .ok();
        let pairs = uri
            .as_ref()
            .and_then(|uri| Query::<Vec<(String, String)>>::try_from_uri(uri).ok())
            .map(|Query(pairs)| pairs)
            .unwrap_or_default();
        Self::from_pairs(pairs)
    }

    /// Build from a JSON document shaped like the DataTables payload
    pub fn from_json(value: Value) -> Self {
        Self::from_normalized(normalize(value))
    }

    fn from_normalized(input: Value) -> Self {
        let search_request = lookup(&input, "search.value").is_some();
        Self {
            input,
            search_request,
        }
    }

    /// Whether the request carries a non-empty search term
    pub fn is_search_request(&self) -> bool {
        self.search_request
    }

    /// Raw value at a dot path; `null` reads as absent
    pub fn input(&self, path: &str) -> Option<&Value> {
        lookup(&self.input, path)
    }

    /// Scalar at a dot path rendered as a string
    pub fn input_str(&self, path: &str) -> Option<String> {
        self.input(path).and_then(scalar_to_string)
    }

    /// Integer at a dot path
    ///
    /// Accepts JSON integers, integral floats and strings holding an integer.
    /// Anything else reads as absent.
    pub fn input_i64(&self, path: &str) -> Option<i64> {
        match self.input(path)? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// All column descriptors in request order
    pub fn column_descriptors(&self) -> Vec<ColumnDescriptor> {
        match self.input("columns") {
            Some(Value::Array(items)) => items.iter().map(ColumnDescriptor::from_value).collect(),
            Some(Value::Object(items)) => {
                items.values().map(ColumnDescriptor::from_value).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Descriptor at `columns.{index}`, by array position or object key
    pub fn column_descriptor(&self, index: usize) -> Option<ColumnDescriptor> {
        self.input(&format!("columns.{index}"))
            .map(ColumnDescriptor::from_value)
    }

    /// The whole normalized input
    pub fn as_value(&self) -> &Value {
        &self.input
    }
}

impl<S> FromRequestParts<S> for DatatableRequest
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // A malformed query string is treated as an empty one
        let pairs = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map(|Query(pairs)| pairs)
            .unwrap_or_default();
        Ok(Self::from_pairs(pairs))
    }
}

fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    (!current.is_null()).then_some(current)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn normalize_str(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Value::Null
    } else {
        Value::String(trimmed.to_string())
    }
}

fn normalize(value: Value) -> Value {
    match value {
        Value::String(s) => normalize_str(&s),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, normalize(v))).collect()),
        other => other,
    }
}

/// Split `columns[0][data]` into `["columns", "0", "data"]`
///
/// Keys without a well-formed bracket suffix are taken literally.
fn parse_key(key: &str) -> Vec<String> {
    let Some(open) = key.find('[') else {
        return vec![key.to_string()];
    };
    if open == 0 {
        return vec![key.to_string()];
    }

    let mut segments = vec![key[..open].to_string()];
    let mut rest = &key[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(close) = stripped.find(']') else {
            return vec![key.to_string()];
        };
        segments.push(stripped[..close].to_string());
        rest = &stripped[close + 1..];
    }
    if !rest.is_empty() {
        return vec![key.to_string()];
    }
    segments
}

fn insert_path(map: &mut Map<String, Value>, segments: &[String], value: Value) {
    let Some((head, tail)) = segments.split_first() else {
        return;
    };
    let key = if head.is_empty() {
        map.len().to_string()
    } else {
        head.clone()
    };

    if tail.is_empty() {
        map.insert(key, value);
        return;
    }

    let child = map
        .entry(key)
        .or_insert_with(|| Value::Object(Map::new()));
    if !child.is_object() {
        *child = Value::Object(Map::new());
    }
    if let Value::Object(child) = child {
        insert_path(child, tail, value);
    }
}

/// Percent-encode bytes the URI parser rejects, leaving existing escapes intact
fn encode_unsafe(query: &str) -> String {
    const SAFE: &str = "-._~!$&'()*+,;=:@/?%";
    let mut out = String::with_capacity(query.len());
    for ch in query.chars() {
        if ch.is_ascii_alphanumeric() || SAFE.contains(ch) {
            out.push(ch);
        } else {
            let mut buf = [0u8; 4];
            for byte in ch.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use serde_json::json;

    #[test]
    fn test_bracket_keys_become_nested_objects() {
        let request = DatatableRequest::from_pairs([
            ("columns[0][data]", "id"),
            ("columns[1][name]", "email"),
            ("order[0][column]", "1"),
            ("order[0][dir]", "asc"),
        ]);

        assert_eq!(request.input_str("columns.0.data").as_deref(), Some("id"));
        assert_eq!(request.input_str("columns.1.name").as_deref(), Some("email"));
        assert_eq!(request.input_i64("order.0.column"), Some(1));
        assert_eq!(request.input_str("order.0.dir").as_deref(), Some("asc"));
    }

    #[test]
    fn test_empty_brackets_append() {
        let request = DatatableRequest::from_pairs([("ids[]", "4"), ("ids[]", "9")]);
        assert_eq!(request.input_str("ids.0").as_deref(), Some("4"));
        assert_eq!(request.input_str("ids.1").as_deref(), Some("9"));
    }

    #[test]
    fn test_malformed_keys_are_literal() {
        let request = DatatableRequest::from_pairs([("broken[key", "1"), ("x]y", "2")]);
        assert_eq!(request.input_str("broken[key").as_deref(), Some("1"));
        assert_eq!(request.input_str("x]y").as_deref(), Some("2"));
    }

    #[test]
    fn test_blank_search_is_not_a_search() {
        let request = DatatableRequest::from_pairs([("search[value]", "   ")]);
        assert!(!request.is_search_request());
        assert!(request.input("search.value").is_none());

        let request = DatatableRequest::from_pairs([("search[value]", "ana")]);
        assert!(request.is_search_request());
    }

    #[test]
    fn test_from_query_str_decodes_and_parses() {
        let request = DatatableRequest::from_query_str(
            "?draw=7&start=10&length=5&search%5Bvalue%5D=j%C3%BCrgen&columns%5B0%5D%5Bdata%5D=name",
        );
        assert_eq!(request.input_i64("draw"), Some(7));
        assert_eq!(request.input_i64("start"), Some(10));
        assert_eq!(request.input_str("search.value").as_deref(), Some("jürgen"));
        assert_eq!(request.input_str("columns.0.data").as_deref(), Some("name"));
    }

    #[test]
    fn test_from_query_str_accepts_raw_brackets() {
        let request = DatatableRequest::from_query_str("order[0][dir]=desc&search[value]=a b");
        assert_eq!(request.input_str("order.0.dir").as_deref(), Some("desc"));
        assert_eq!(request.input_str("search.value").as_deref(), Some("a b"));
    }

    #[test]
    fn test_from_json_normalizes_strings() {
        let request = DatatableRequest::from_json(json!({
            "draw": 2,
            "search": { "value": "" },
            "columns": [
                { "data": " name ", "searchable": true },
                { "data": null, "name": "email", "searchable": "false" }
            ]
        }));

        assert!(!request.is_search_request());
        let columns = request.column_descriptors();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].identifier(), Some("name"));
        assert!(!columns[0].is_searchable());
        assert_eq!(columns[1].identifier(), Some("email"));
        assert!(!columns[1].is_searchable());
    }

    #[test]
    fn test_input_i64_rejects_non_numeric() {
        let request = DatatableRequest::from_json(json!({
            "start": "ten",
            "length": 2.5,
            "draw": 4.0
        }));
        assert_eq!(request.input_i64("start"), None);
        assert_eq!(request.input_i64("length"), None);
        assert_eq!(request.input_i64("draw"), Some(4));
    }

    #[test]
    fn test_column_descriptor_by_index() {
        let request = DatatableRequest::from_pairs([
            ("columns[0][data]", "id"),
            ("columns[1][data]", "name"),
        ]);
        assert_eq!(
            request.column_descriptor(1).and_then(|c| c.data),
            Some("name".to_string())
        );
        assert!(request.column_descriptor(5).is_none());
    }

    #[tokio::test]
    async fn test_extractor_reads_query_string() {
        let request = Request::builder()
            .uri("/datatables/users?draw=5&search%5Bvalue%5D=ana")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        let extracted = DatatableRequest::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(extracted.input_i64("draw"), Some(5));
        assert!(extracted.is_search_request());
    }
}
