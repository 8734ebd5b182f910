use super::catalog::{FieldCatalog, FieldSpec, FilterValue};
use super::error::QueryError;
use super::query_params::{ControlKey, ParamValue, QueryParams};

// Basic safety limits
const MAX_FIELD_VALUE_LENGTH: usize = 10_000;
const MAX_IN_VALUES: usize = 100;

/// Comparison operators accepted in filter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    /// Plain `field=value`
    Eq,
    /// `field[gt]=value`
    Gt,
    /// `field[gte]=value`
    Gte,
    /// `field[lt]=value`
    Lt,
    /// `field[lte]=value`
    Lte,
}

impl ComparisonOp {
    /// Parse a bracketed comparator token.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare(ComparisonOp, FilterValue),
    /// Repeated key, matches any of the values.
    In(Vec<FilterValue>),
    /// A bracketed token that is not a known comparator. Handed to storage
    /// unchanged, where it matches nothing.
    Unsupported { token: String, value: String },
}

/// A predicate on one catalogued field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: &'static str,
    pub predicate: Predicate,
}

/// The filter stage: every non-control key becomes one or more predicates.
///
/// # Errors
///
/// Unknown or non-filterable fields, values that do not coerce to the field
/// kind and nesting deeper than one comparator level are rejected.
pub fn parse_filters(
    params: &QueryParams,
    catalog: &FieldCatalog,
) -> Result<Vec<FieldFilter>, QueryError> {
    let mut filters = Vec::new();

    for (key, value) in params.iter() {
        if ControlKey::is_control(key) {
            continue;
        }

        let spec = catalog.require(key)?;
        if !spec.filterable {
            return Err(QueryError::NotFilterable(key.to_string()));
        }

        match value {
            ParamValue::Single(raw) => {
                filters.push(FieldFilter {
                    field: spec.name,
                    predicate: Predicate::Compare(ComparisonOp::Eq, coerce(spec, raw)?),
                });
            }
            ParamValue::Many(raws) => {
                if raws.len() > MAX_IN_VALUES {
                    return Err(QueryError::Malformed(key.to_string()));
                }
                let values = raws
                    .iter()
                    .map(|raw| coerce(spec, raw))
                    .collect::<Result<Vec<_>, _>>()?;
                filters.push(FieldFilter {
                    field: spec.name,
                    predicate: Predicate::In(values),
                });
            }
            ParamValue::Nested(operators) => {
                for (token, operand) in operators {
                    let ParamValue::Single(raw) = operand else {
                        return Err(QueryError::Malformed(format!("{key}[{token}]")));
                    };
                    let predicate = match ComparisonOp::from_token(token) {
                        Some(op) => Predicate::Compare(op, coerce(spec, raw)?),
                        None => Predicate::Unsupported {
                            token: token.clone(),
                            value: raw.clone(),
                        },
                    };
                    filters.push(FieldFilter {
                        field: spec.name,
                        predicate,
                    });
                }
            }
        }
    }

    Ok(filters)
}

fn coerce(spec: &FieldSpec, raw: &str) -> Result<FilterValue, QueryError> {
    if raw.len() > MAX_FIELD_VALUE_LENGTH {
        return Err(QueryError::invalid_value(spec.name, "<too long>"));
    }
    spec.kind.coerce(spec.name, raw)
}
