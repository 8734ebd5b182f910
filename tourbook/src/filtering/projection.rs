use serde_json::{Map, Value};

use super::catalog::{FieldCatalog, IDENTITY_FIELD, VERSION_FIELD};
use super::error::QueryError;
use super::query_params::{ControlKey, QueryParams};

/// Which fields a response document keeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Only these fields. Always contains the identity field.
    Include(Vec<&'static str>),
    /// Everything except these fields.
    Exclude(Vec<&'static str>),
}

impl Default for Projection {
    fn default() -> Self {
        Self::Exclude(vec![VERSION_FIELD])
    }
}

impl Projection {
    /// The field-selection stage.
    ///
    /// # Errors
    ///
    /// Unknown or unselectable fields, and a list mixing `a` with `-b`.
    pub fn parse(params: &QueryParams, catalog: &FieldCatalog) -> Result<Self, QueryError> {
        let Some(raw) = params.control(ControlKey::Fields) else {
            return Ok(Self::default());
        };

        let mut included = Vec::new();
        let mut excluded = Vec::new();
        for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (name, bucket) = match token.strip_prefix('-') {
                Some(name) => (name, &mut excluded),
                None => (token, &mut included),
            };
            let spec = catalog.require(name)?;
            if !spec.selectable {
                return Err(QueryError::NotSelectable(name.to_string()));
            }
            if !bucket.contains(&spec.name) {
                bucket.push(spec.name);
            }
        }

        match (included.is_empty(), excluded.is_empty()) {
            (true, true) => Ok(Self::default()),
            (false, true) => {
                if !included.contains(&IDENTITY_FIELD) {
                    included.insert(0, IDENTITY_FIELD);
                }
                Ok(Self::Include(included))
            }
            (true, false) => Ok(Self::Exclude(excluded)),
            (false, false) => Err(QueryError::MixedProjection),
        }
    }

    #[must_use]
    pub fn includes(&self, field: &str) -> bool {
        match self {
            Self::Include(fields) => fields.contains(&field),
            Self::Exclude(fields) => !fields.contains(&field),
        }
    }

    /// Drop the keys of a serialized document that are not selected.
    pub fn apply(&self, document: &mut Map<String, Value>) {
        document.retain(|key, _| self.includes(key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filtering::catalog::{FieldKind, FieldSpec};
    use serde_json::json;

    fn catalog() -> FieldCatalog {
        FieldCatalog::new([
            FieldSpec::new("name", FieldKind::Text),
            FieldSpec::new("duration", FieldKind::Integer),
            FieldSpec::new("price", FieldKind::Float),
        ])
    }

    fn projection(raw: &str) -> Result<Projection, QueryError> {
        Projection::parse(&QueryParams::parse(raw).unwrap(), &catalog())
    }

    fn document() -> Map<String, Value> {
        let value = json!({"id": "1", "name": "The Forest Hiker", "duration": 5, "price": 397.0, "__v": 0});
        let Value::Object(map) = value else {
            unreachable!()
        };
        map
    }

    #[test]
    fn test_default_hides_version() {
        let mut doc = document();
        projection("").unwrap().apply(&mut doc);
        assert!(!doc.contains_key("__v"));
        assert!(doc.contains_key("name"));
    }

    #[test]
    fn test_inclusion_keeps_identity() {
        let mut doc = document();
        projection("fields=name,duration").unwrap().apply(&mut doc);
        let mut keys: Vec<_> = doc.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["duration", "id", "name"]);
    }

    #[test]
    fn test_exclusion_mode() {
        let mut doc = document();
        projection("fields=-price").unwrap().apply(&mut doc);
        assert!(!doc.contains_key("price"));
        assert!(doc.contains_key("__v"));
    }

    #[test]
    fn test_mixed_projection_rejected() {
        assert_eq!(projection("fields=name,-price"), Err(QueryError::MixedProjection));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert_eq!(
            projection("fields=password"),
            Err(QueryError::UnknownField("password".into()))
        );
    }
}
