//! Query-string construction for list and search endpoints.
//!
//! Lists are joined with commas, booleans become `true`/`false` and dates are
//! written as ISO-8601 in UTC, with as many fractional digits as the instant
//! needs. Absent values are never serialized.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};

/// A single query parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<String>),
    Date(DateTime<Utc>),
}

impl QueryValue {
    /// Wire representation, or `None` when the value should be omitted.
    pub fn encode(&self) -> Option<String> {
        match self {
            QueryValue::Str(s) => Some(s.clone()),
            QueryValue::Int(i) => Some(i.to_string()),
            QueryValue::Float(f) => Some(f.to_string()),
            QueryValue::Bool(b) => Some(b.to_string()),
            QueryValue::List(items) if items.is_empty() => None,
            QueryValue::List(items) => Some(items.join(",")),
            QueryValue::Date(d) => Some(d.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(v: &str) -> Self {
        QueryValue::Str(v.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(v: String) -> Self {
        QueryValue::Str(v)
    }
}

impl From<bool> for QueryValue {
    fn from(v: bool) -> Self {
        QueryValue::Bool(v)
    }
}

impl From<i64> for QueryValue {
    fn from(v: i64) -> Self {
        QueryValue::Int(v)
    }
}

impl From<u32> for QueryValue {
    fn from(v: u32) -> Self {
        QueryValue::Int(i64::from(v))
    }
}

impl From<f64> for QueryValue {
    fn from(v: f64) -> Self {
        QueryValue::Float(v)
    }
}

impl From<DateTime<Utc>> for QueryValue {
    fn from(v: DateTime<Utc>) -> Self {
        QueryValue::Date(v)
    }
}

impl<S: Into<String>> From<Vec<S>> for QueryValue {
    fn from(v: Vec<S>) -> Self {
        QueryValue::List(v.into_iter().map(Into::into).collect())
    }
}

/// Accumulated query parameters, keyed by wire name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    values: BTreeMap<String, QueryValue>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Set a parameter if `value` is present; `None` removes nothing and adds nothing.
    pub fn set_opt<V: Into<QueryValue>>(
        &mut self,
        key: impl Into<String>,
        value: Option<V>,
    ) -> &mut Self {
        if let Some(v) = value {
            self.set(key, v);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<QueryValue> {
        self.values.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Encoded `(name, value)` pairs, skipping values that encode to nothing.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.values
            .iter()
            .filter_map(|(k, v)| v.encode().map(|e| (k.clone(), e)))
            .collect()
    }

    /// Percent-encoded `a=1&b=2` form.
    pub fn to_query_string(&self) -> String {
        self.to_pairs()
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Parse a query string back into raw string values.
    ///
    /// Use [`ParsedQuery`]'s typed accessors to recover lists, booleans and dates.
    pub fn parse(query: &str) -> ParsedQuery {
        let values = query
            .trim_start_matches('?')
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                (decode_component(k), decode_component(v))
            })
            .collect();
        ParsedQuery { values }
    }
}

fn decode_component(s: &str) -> String {
    let s = s.replace('+', " ");
    urlencoding::decode(&s)
        .map(|c| c.into_owned())
        .unwrap_or(s)
}

/// A decoded query string.
#[derive(Debug, Clone, Default)]
pub struct ParsedQuery {
    values: BTreeMap<String, String>,
}

impl ParsedQuery {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn parse_int(&self, key: &str) -> Option<i64> {
        self.get(key)?.parse().ok()
    }

    pub fn parse_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }

    pub fn parse_list(&self, key: &str) -> Option<Vec<String>> {
        Some(self.get(key)?.split(',').map(str::to_string).collect())
    }

    pub fn parse_date(&self, key: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(self.get(key)?)
            .ok()
            .map(|d| d.with_timezone(&Utc))
    }
}
