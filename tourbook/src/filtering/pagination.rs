use super::query_params::{ControlKey, QueryParams};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;
/// Maximum page size to prevent resource exhaustion
pub const MAX_LIMIT: u64 = 1000;
/// Largest offset the database drivers accept
pub const MAX_SKIP: u64 = i64::MAX.unsigned_abs();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Pagination {
    /// The pagination stage. Never fails: missing, non-numeric or
    /// non-positive values fall back to the defaults.
    #[must_use]
    pub fn from_params(params: &QueryParams) -> Self {
        let page = positive(params.control(ControlKey::Page)).unwrap_or(DEFAULT_PAGE);
        let limit = positive(params.control(ControlKey::Limit))
            .unwrap_or(DEFAULT_LIMIT)
            .min(MAX_LIMIT);
        Self { page, limit }
    }

    /// Number of documents skipped before this page, capped at [`MAX_SKIP`].
    #[must_use]
    pub const fn skip(&self) -> u64 {
        let skip = self.page.saturating_sub(1).saturating_mul(self.limit);
        if skip > MAX_SKIP { MAX_SKIP } else { skip }
    }
}

fn positive(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
}
