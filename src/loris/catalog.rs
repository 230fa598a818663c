//! Catalog enumeration: every course code offered in a term.

use crate::loris::client::Transport;
use crate::loris::errors::LorisApiError;
use crate::loris::models::{CatalogResponse, CourseCode, Term};
use crate::loris::reset::ResetProtocol;
use crate::loris::retry::or_empty;
use crate::utils::page_count;
use std::sync::Arc;
use tracing::{debug, trace};
use url::Url;

/// Page size of the total-count probe.
pub const PROBE_PAGE_SIZE: u32 = 10;

/// Sort order sent with every catalog and section search. Must not vary
/// between pages or items can shift across page boundaries.
pub(crate) const SORT_COLUMN: &str = "subjectDescription";
pub(crate) const SORT_DIRECTION: &str = "asc";

/// Offsets to request for a catalog of `total_count` entries.
///
/// Walks `0, size, 2*size, ...` while `offset <= ceil(total/size) * size`,
/// so the last offset always lands one page past the data. That trailing
/// page comes back empty.
///
/// Returns `None` when the trailing offset does not fit in a `u32`, which
/// only happens for a nonsensical `totalCount`.
pub fn page_offsets(total_count: u32, page_size: u32) -> Option<Vec<u32>> {
    let page_size = page_size.max(1);
    let pages = page_count(total_count, page_size);
    pages.checked_mul(page_size)?;
    Some((0..=pages).map(|page| page * page_size).collect())
}

pub struct CatalogPager {
    transport: Arc<dyn Transport>,
    url: Url,
    reset: Arc<ResetProtocol>,
}

impl CatalogPager {
    pub fn new(transport: Arc<dyn Transport>, url: Url, reset: Arc<ResetProtocol>) -> Self {
        Self {
            transport,
            url,
            reset,
        }
    }

    async fn search(
        &self,
        term: &Term,
        offset: u32,
        size: u32,
    ) -> Result<CatalogResponse, LorisApiError> {
        let form = [
            ("txt_term", term.to_string()),
            ("pageOffset", offset.to_string()),
            ("pageMaxSize", size.to_string()),
            ("sortColumn", SORT_COLUMN.to_string()),
            ("sortDirection", SORT_DIRECTION.to_string()),
        ];
        let response = self.transport.post_form(&self.url, &form).await?;
        response.json::<CatalogResponse>()
    }

    /// Number of catalog entries the portal reports for `term`.
    ///
    /// Any failure, or a response without a count, yields
    /// [`LorisApiError::TotalCountUnavailable`]: the term cannot be paged.
    pub async fn total_count(&self, term: &Term) -> Result<u32, LorisApiError> {
        let response = self
            .reset
            .with_reset("catalog count", || self.search(term, 0, PROBE_PAGE_SIZE))
            .await
            .map_err(|e| LorisApiError::TotalCountUnavailable {
                term: term.to_string(),
                source: Some(Box::new(e)),
            })?;

        let total = response
            .total_count
            .ok_or_else(|| LorisApiError::TotalCountUnavailable {
                term: term.to_string(),
                source: None,
            })?;
        debug!(term = %term, total, "catalog size");
        Ok(total)
    }

    /// Course codes on one catalog page, in upstream order.
    ///
    /// A malformed page or unexpected status yields an empty page; see
    /// [`CatalogPager::try_page`] for the failure itself.
    pub async fn page(
        &self,
        term: &Term,
        offset: u32,
        size: u32,
    ) -> Result<Vec<CourseCode>, LorisApiError> {
        or_empty("catalog page", self.try_page(term, offset, size).await)
    }

    /// Like [`CatalogPager::page`], but every failure is returned.
    pub async fn try_page(
        &self,
        term: &Term,
        offset: u32,
        size: u32,
    ) -> Result<Vec<CourseCode>, LorisApiError> {
        let codes = self
            .reset
            .with_reset("catalog page", || async {
                let response = self.search(term, offset, size).await?;
                Ok(response
                    .data
                    .unwrap_or_default()
                    .iter()
                    .map(|entry| entry.course_code())
                    .collect::<Vec<_>>())
            })
            .await?;

        trace!(term = %term, offset, count = codes.len(), "catalog page fetched");
        Ok(codes)
    }
}
