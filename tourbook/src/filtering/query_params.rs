//! Decoding of raw query strings into [`QueryParams`].
//!
//! Supports the bracket syntax used by the list endpoints:
//!
//! ```text
//! ?price=500                 -> {price: "500"}
//! ?duration[gte]=5           -> {duration: {gte: "5"}}
//! ?difficulty=easy&difficulty=medium -> {difficulty: ["easy", "medium"]}
//! ?difficulty[]=easy         -> {difficulty: ["easy"]}
//! ```

use std::collections::BTreeMap;

use super::error::QueryError;

/// Reserved keys consumed by the query builder itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKey {
    Page,
    Sort,
    Limit,
    Fields,
}

impl ControlKey {
    pub const ALL: [Self; 4] = [Self::Page, Self::Sort, Self::Limit, Self::Fields];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Sort => "sort",
            Self::Limit => "limit",
            Self::Fields => "fields",
        }
    }

    #[must_use]
    pub fn is_control(key: &str) -> bool {
        Self::ALL.iter().any(|control| control.as_str() == key)
    }
}

/// A decoded query-parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Single(String),
    /// A key repeated in the query string, in order of appearance.
    Many(Vec<String>),
    /// Bracketed sub-keys, e.g. `duration[gte]=5`.
    Nested(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    /// Last scalar value, which is what control keys use when repeated.
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value),
            Self::Many(values) => values.last().map(String::as_str),
            Self::Nested(_) => None,
        }
    }
}

/// String-keyed query parameters, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    values: BTreeMap<String, ParamValue>,
}

impl QueryParams {
    /// Decode a raw (still percent-encoded) query string.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Malformed`] when the same key is used both as a
    /// scalar and with bracketed sub-keys (`a=1&a[gte]=2`).
    pub fn parse(raw: &str) -> Result<Self, QueryError> {
        Self::from_pairs(url::form_urlencoded::parse(raw.as_bytes()))
    }

    /// Build from already decoded `(key, value)` pairs.
    ///
    /// # Errors
    ///
    /// Same as [`QueryParams::parse`].
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let key = key.as_ref();
            if key.is_empty() {
                continue;
            }
            let segments = split_key(key);
            insert(&mut params.values, key, &segments, value.into())?;
        }
        Ok(params)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    /// Value of a control key; the last occurrence wins when repeated.
    #[must_use]
    pub fn control(&self, key: ControlKey) -> Option<&str> {
        self.values.get(key.as_str()).and_then(ParamValue::last)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Replace a key with a single value. Used by alias routes that preset
    /// sorting, limits and projections.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values
            .insert(key.to_string(), ParamValue::Single(value.into()));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Split `a[b][c]` into `["a", "b", "c"]`. Keys with unbalanced brackets are
/// kept whole.
fn split_key(key: &str) -> Vec<&str> {
    let Some(open) = key.find('[') else {
        return vec![key];
    };
    if open == 0 {
        return vec![key];
    }

    let mut segments = vec![&key[..open]];
    let mut rest = &key[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(close) = stripped.find(']') else {
            return vec![key];
        };
        segments.push(&stripped[..close]);
        rest = &stripped[close + 1..];
    }
    if !rest.is_empty() {
        return vec![key];
    }
    segments
}

fn insert(
    map: &mut BTreeMap<String, ParamValue>,
    full_key: &str,
    segments: &[&str],
    value: String,
) -> Result<(), QueryError> {
    let Some((head, tail)) = segments.split_first() else {
        return Ok(());
    };

    // `a[]=x` appends to a list
    let is_leaf = tail.is_empty() || tail == [""];
    if is_leaf {
        let as_list = !tail.is_empty();
        match map.get_mut(*head) {
            None => {
                let fresh = if as_list {
                    ParamValue::Many(vec![value])
                } else {
                    ParamValue::Single(value)
                };
                map.insert((*head).to_string(), fresh);
            }
            Some(ParamValue::Single(previous)) => {
                let previous = std::mem::take(previous);
                map.insert(
                    (*head).to_string(),
                    ParamValue::Many(vec![previous, value]),
                );
            }
            Some(ParamValue::Many(values)) => values.push(value),
            Some(ParamValue::Nested(_)) => {
                return Err(QueryError::Malformed(full_key.to_string()));
            }
        }
        return Ok(());
    }

    let entry = map
        .entry((*head).to_string())
        .or_insert_with(|| ParamValue::Nested(BTreeMap::new()));
    match entry {
        ParamValue::Nested(children) => insert(children, full_key, tail, value),
        ParamValue::Single(_) | ParamValue::Many(_) => {
            Err(QueryError::Malformed(full_key.to_string()))
        }
    }
}
