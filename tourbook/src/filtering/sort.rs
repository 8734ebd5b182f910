use sea_orm::sea_query::Order;

use super::catalog::{CREATED_AT_FIELD, FieldCatalog, IDENTITY_FIELD};
use super::error::QueryError;
use super::query_params::{ControlKey, QueryParams};

// Shared limits
const MAX_SORT_KEYS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub const fn order(self) -> Order {
        match self {
            Self::Asc => Order::Asc,
            Self::Desc => Order::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: &'static str,
    pub direction: SortDirection,
}

impl SortKey {
    #[must_use]
    pub const fn asc(field: &'static str) -> Self {
        Self {
            field,
            direction: SortDirection::Asc,
        }
    }

    #[must_use]
    pub const fn desc(field: &'static str) -> Self {
        Self {
            field,
            direction: SortDirection::Desc,
        }
    }
}

/// The sort stage.
///
/// `sort=price,-ratingsAverage` becomes `[price asc, ratingsAverage desc]`,
/// most significant first. Without a `sort` key the newest documents come
/// first. The identity field always closes the list as an ascending
/// tie-breaker so that equal keys keep a stable order between pages.
///
/// # Errors
///
/// Unknown fields and fields that are not sortable are rejected.
pub fn parse_sort(params: &QueryParams, catalog: &FieldCatalog) -> Result<Vec<SortKey>, QueryError> {
    let mut keys: Vec<SortKey> = Vec::new();

    if let Some(raw) = params.control(ControlKey::Sort) {
        for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (name, direction) = match token.strip_prefix('-') {
                Some(name) => (name, SortDirection::Desc),
                None => (token.strip_prefix('+').unwrap_or(token), SortDirection::Asc),
            };
            let spec = catalog.require(name)?;
            if !spec.sortable {
                return Err(QueryError::NotSortable(name.to_string()));
            }
            // First mention of a field decides its direction
            if keys.iter().any(|key| key.field == spec.name) {
                continue;
            }
            keys.push(SortKey {
                field: spec.name,
                direction,
            });
            if keys.len() > MAX_SORT_KEYS {
                return Err(QueryError::Malformed(ControlKey::Sort.as_str().to_string()));
            }
        }
    }

    if keys.is_empty() {
        keys.push(SortKey::desc(CREATED_AT_FIELD));
    }
    if !keys.iter().any(|key| key.field == IDENTITY_FIELD) {
        keys.push(SortKey::asc(IDENTITY_FIELD));
    }

    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filtering::catalog::{FieldKind, FieldSpec};

    fn catalog() -> FieldCatalog {
        FieldCatalog::new([
            FieldSpec::new("price", FieldKind::Float).filterable().sortable(),
            FieldSpec::new("ratingsAverage", FieldKind::Float).sortable(),
            FieldSpec::new("summary", FieldKind::Text),
        ])
    }

    fn sort(raw: &str) -> Result<Vec<SortKey>, QueryError> {
        parse_sort(&QueryParams::parse(raw).unwrap(), &catalog())
    }

    #[test]
    fn test_default_sort_newest_first() {
        assert_eq!(
            sort("").unwrap(),
            vec![SortKey::desc(CREATED_AT_FIELD), SortKey::asc(IDENTITY_FIELD)]
        );
    }

    #[test]
    fn test_multi_key_sort_in_order() {
        assert_eq!(
            sort("sort=price,-ratingsAverage").unwrap(),
            vec![
                SortKey::asc("price"),
                SortKey::desc("ratingsAverage"),
                SortKey::asc(IDENTITY_FIELD)
            ]
        );
    }

    #[test]
    fn test_explicit_identity_not_duplicated() {
        assert_eq!(sort("sort=-id").unwrap(), vec![SortKey::desc(IDENTITY_FIELD)]);
    }

    #[test]
    fn test_repeated_field_keeps_first_direction() {
        assert_eq!(
            sort("sort=price,-price").unwrap(),
            vec![SortKey::asc("price"), SortKey::asc(IDENTITY_FIELD)]
        );
    }

    #[test]
    fn test_blank_sort_falls_back_to_default() {
        assert_eq!(sort("sort=,").unwrap()[0], SortKey::desc(CREATED_AT_FIELD));
    }

    #[test]
    fn test_unsortable_field_rejected() {
        assert_eq!(
            sort("sort=summary"),
            Err(QueryError::NotSortable("summary".into()))
        );
        assert_eq!(
            sort("sort=-password"),
            Err(QueryError::UnknownField("password".into()))
        );
    }

    #[test]
    fn test_direction_to_order() {
        assert_eq!(SortDirection::Asc.order(), Order::Asc);
        assert_eq!(SortDirection::Desc.order(), Order::Desc);
    }
}
