//! Catalog queries: search, sort and paginate the security universe.

use std::sync::Arc;

use thiserror::Error;

use crate::application::pagination::{PageInfo, PageRequest};
use crate::application::repos::{RepoError, SecuritiesRepo, SecurityQueryFilter, SecuritySort};
use crate::domain::securities::{SecurityColumn, SecurityRecord, SortOrder};

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Raw catalog query as it arrives from the client.
#[derive(Debug, Clone, Default)]
pub struct SecurityListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug)]
pub struct SecurityPage {
    pub securities: Vec<SecurityRecord>,
    pub pagination: PageInfo,
}

#[derive(Clone)]
pub struct SecurityService {
    repo: Arc<dyn SecuritiesRepo>,
}

impl SecurityService {
    pub fn new(repo: Arc<dyn SecuritiesRepo>) -> Self {
        Self { repo }
    }

    /// List a page of the catalog. Unknown sort columns fall back to
    /// ISIN; page and limit clamp instead of erroring, matching the
    /// tolerant query contract of the catalog browser.
    pub async fn list(&self, query: SecurityListQuery) -> Result<SecurityPage, SecurityError> {
        let page = PageRequest::from_query(query.page, query.limit);
        let sort = SecuritySort {
            column: query
                .sort_by
                .as_deref()
                .and_then(SecurityColumn::parse)
                .unwrap_or(SecurityColumn::Isin),
            order: SortOrder::parse(query.sort_order.as_deref()),
        };
        let filter = SecurityQueryFilter {
            search: query
                .search
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty()),
        };

        let (securities, total_count) = futures::try_join!(
            self.repo.list_securities(&filter, sort, page),
            self.repo.count_securities(&filter),
        )?;

        Ok(SecurityPage {
            securities,
            pagination: PageInfo::compute(page, total_count),
        })
    }
}
