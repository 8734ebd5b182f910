//! Per-resource allow-list of public fields.
//!
//! The query builder only accepts field names that appear in a resource's
//! [`FieldCatalog`]; anything else is rejected before it reaches storage.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use super::error::QueryError;

/// Identity field, always kept by projections.
pub const IDENTITY_FIELD: &str = "id";
/// Creation timestamp, the default sort key.
pub const CREATED_AT_FIELD: &str = "createdAt";
/// Internal document version, hidden unless explicitly selected.
pub const VERSION_FIELD: &str = "__v";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Boolean,
    DateTime,
    Uuid,
}

/// A typed filter operand.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    Uuid(Uuid),
}

impl FieldKind {
    /// Coerce a raw query-string value into this kind.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidValue`] when `raw` does not parse.
    pub fn coerce(self, field: &str, raw: &str) -> Result<FilterValue, QueryError> {
        let trimmed = raw.trim();
        let invalid = || QueryError::invalid_value(field, raw);
        match self {
            Self::Text => Ok(FilterValue::Text(trimmed.to_string())),
            Self::Integer => trimmed
                .parse::<i64>()
                .map(FilterValue::Integer)
                .map_err(|_| invalid()),
            Self::Float => trimmed
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .map(FilterValue::Float)
                .ok_or_else(invalid),
            Self::Boolean => match trimmed {
                "true" => Ok(FilterValue::Boolean(true)),
                "false" => Ok(FilterValue::Boolean(false)),
                _ => Err(invalid()),
            },
            Self::DateTime => parse_datetime(trimmed)
                .map(FilterValue::DateTime)
                .ok_or_else(invalid),
            Self::Uuid => Uuid::parse_str(trimmed)
                .map(FilterValue::Uuid)
                .map_err(|_| invalid()),
        }
    }
}

/// RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Some(datetime.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// One public field of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub filterable: bool,
    pub sortable: bool,
    pub selectable: bool,
}

impl FieldSpec {
    /// A selectable field that can neither be filtered nor sorted on.
    #[must_use]
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            filterable: false,
            sortable: false,
            selectable: true,
        }
    }

    #[must_use]
    pub const fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    #[must_use]
    pub const fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }
}

/// The allow-list consulted by every builder stage.
///
/// `id`, `createdAt` and `__v` are present in every catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCatalog {
    fields: Vec<FieldSpec>,
}

impl FieldCatalog {
    #[must_use]
    pub fn new(fields: impl IntoIterator<Item = FieldSpec>) -> Self {
        let mut all = vec![
            FieldSpec::new(IDENTITY_FIELD, FieldKind::Uuid)
                .filterable()
                .sortable(),
            FieldSpec::new(CREATED_AT_FIELD, FieldKind::DateTime)
                .filterable()
                .sortable(),
            FieldSpec::new(VERSION_FIELD, FieldKind::Integer),
        ];
        for field in fields {
            match all.iter_mut().find(|known| known.name == field.name) {
                Some(known) => *known = field,
                None => all.push(field),
            }
        }
        Self { fields: all }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Look up a field or fail with [`QueryError::UnknownField`].
    ///
    /// # Errors
    ///
    /// Returns an error when `name` is not in the catalog.
    pub fn require(&self, name: &str) -> Result<&FieldSpec, QueryError> {
        self.get(name)
            .ok_or_else(|| QueryError::UnknownField(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_fields_are_present() {
        let catalog = FieldCatalog::new([]);
        assert!(catalog.get(IDENTITY_FIELD).is_some_and(|f| f.sortable));
        assert!(catalog.get(CREATED_AT_FIELD).is_some_and(|f| f.filterable));
        assert!(catalog.get(VERSION_FIELD).is_some_and(|f| !f.filterable));
    }

    #[test]
    fn test_coerce_integer() {
        assert_eq!(
            FieldKind::Integer.coerce("duration", " 5 "),
            Ok(FilterValue::Integer(5))
        );
        assert_eq!(
            FieldKind::Integer.coerce("duration", "five"),
            Err(QueryError::invalid_value("duration", "five"))
        );
    }

    #[test]
    fn test_coerce_float_rejects_nan() {
        assert!(FieldKind::Float.coerce("price", "NaN").is_err());
        assert_eq!(
            FieldKind::Float.coerce("price", "497.5"),
            Ok(FilterValue::Float(497.5))
        );
    }

    #[test]
    fn test_coerce_plain_date() {
        let Ok(FilterValue::DateTime(value)) = FieldKind::DateTime.coerce("createdAt", "2021-03-01")
        else {
            panic!("expected a date-time");
        };
        assert_eq!(value.to_rfc3339(), "2021-03-01T00:00:00+00:00");
    }

    #[test]
    fn test_coerce_boolean() {
        assert_eq!(
            FieldKind::Boolean.coerce("secretTour", "true"),
            Ok(FilterValue::Boolean(true))
        );
        assert!(FieldKind::Boolean.coerce("secretTour", "yes").is_err());
    }
}
