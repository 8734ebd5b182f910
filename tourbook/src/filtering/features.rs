use super::catalog::{CREATED_AT_FIELD, FieldCatalog, IDENTITY_FIELD};
use super::conditions::{FieldFilter, parse_filters};
use super::error::QueryError;
use super::pagination::Pagination;
use super::projection::Projection;
use super::query_params::QueryParams;
use super::sort::{SortKey, parse_sort};

/// A fully built list query. Plain data, executed once by the CRUD layer.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    pub filters: Vec<FieldFilter>,
    pub sort: Vec<SortKey>,
    pub projection: Projection,
    pub pagination: Pagination,
}

impl Default for QueryDescriptor {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort: vec![SortKey::desc(CREATED_AT_FIELD), SortKey::asc(IDENTITY_FIELD)],
            projection: Projection::default(),
            pagination: Pagination::default(),
        }
    }
}

/// Builder that turns list-endpoint query parameters into a
/// [`QueryDescriptor`].
///
/// Each stage consumes the builder and hands back a new one, so stages cannot
/// be applied twice or out of sight of the caller:
///
/// ```rust,ignore
/// let query = ApiFeatures::new(&params, &catalog)
///     .filter()?
///     .sort()?
///     .limit_fields()?
///     .paginate()
///     .into_query();
/// ```
#[derive(Debug, Clone)]
pub struct ApiFeatures<'a> {
    params: &'a QueryParams,
    catalog: &'a FieldCatalog,
    query: QueryDescriptor,
}

impl<'a> ApiFeatures<'a> {
    #[must_use]
    pub fn new(params: &'a QueryParams, catalog: &'a FieldCatalog) -> Self {
        Self {
            params,
            catalog,
            query: QueryDescriptor::default(),
        }
    }

    /// # Errors
    ///
    /// See [`parse_filters`].
    pub fn filter(mut self) -> Result<Self, QueryError> {
        self.query.filters = parse_filters(self.params, self.catalog)?;
        Ok(self)
    }

    /// # Errors
    ///
    /// See [`parse_sort`].
    pub fn sort(mut self) -> Result<Self, QueryError> {
        self.query.sort = parse_sort(self.params, self.catalog)?;
        Ok(self)
    }

    /// # Errors
    ///
    /// See [`Projection::parse`].
    pub fn limit_fields(mut self) -> Result<Self, QueryError> {
        self.query.projection = Projection::parse(self.params, self.catalog)?;
        Ok(self)
    }

    #[must_use]
    pub fn paginate(mut self) -> Self {
        self.query.pagination = Pagination::from_params(self.params);
        self
    }

    #[must_use]
    pub fn into_query(self) -> QueryDescriptor {
        self.query
    }
}

/// Run every stage in the fixed order.
///
/// # Errors
///
/// Returns the first [`QueryError`] raised by a stage.
pub fn build_query(
    params: &QueryParams,
    catalog: &FieldCatalog,
) -> Result<QueryDescriptor, QueryError> {
    Ok(ApiFeatures::new(params, catalog)
        .filter()?
        .sort()?
        .limit_fields()?
        .paginate()
        .into_query())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filtering::catalog::{FieldKind, FieldSpec, FilterValue};
    use crate::filtering::conditions::{ComparisonOp, Predicate};

    fn catalog() -> FieldCatalog {
        FieldCatalog::new([
            FieldSpec::new("name", FieldKind::Text).filterable().sortable(),
            FieldSpec::new("duration", FieldKind::Integer).filterable().sortable(),
            FieldSpec::new("difficulty", FieldKind::Text).filterable(),
            FieldSpec::new("price", FieldKind::Float).filterable().sortable(),
        ])
    }

    fn build(raw: &str) -> Result<QueryDescriptor, QueryError> {
        build_query(&QueryParams::parse(raw).unwrap(), &catalog())
    }

    #[test]
    fn test_empty_params_give_defaults() {
        assert_eq!(build("").unwrap(), QueryDescriptor::default());
    }

    #[test]
    fn test_full_pipeline() {
        let query = build("duration[gte]=5&difficulty=easy&sort=price&fields=name&page=2&limit=3")
            .unwrap();

        assert_eq!(query.filters.len(), 2);
        assert!(query.filters.contains(&FieldFilter {
            field: "difficulty",
            predicate: Predicate::Compare(ComparisonOp::Eq, FilterValue::Text("easy".into())),
        }));
        assert_eq!(query.sort[0], SortKey::asc("price"));
        assert_eq!(query.projection, Projection::Include(vec!["id", "name"]));
        assert_eq!(query.pagination, Pagination { page: 2, limit: 3 });
        assert_eq!(query.pagination.skip(), 3);
    }

    #[test]
    fn test_building_is_idempotent() {
        let raw = "price[lt]=1000&sort=-price&fields=-name";
        assert_eq!(build(raw).unwrap(), build(raw).unwrap());
    }

    #[test]
    fn test_stage_error_short_circuits() {
        assert_eq!(
            build("sort=price&fields=name,-duration"),
            Err(QueryError::MixedProjection)
        );
    }

    #[test]
    fn test_stages_can_run_individually() {
        let params = QueryParams::parse("page=4&duration=7").unwrap();
        let catalog = catalog();
        let query = ApiFeatures::new(&params, &catalog).paginate().into_query();
        assert!(query.filters.is_empty());
        assert_eq!(query.pagination.page, 4);
    }
}
