//! Section lookup: the CRNs scheduled for one course code.

use crate::loris::catalog::{SORT_COLUMN, SORT_DIRECTION};
use crate::loris::client::Transport;
use crate::loris::errors::LorisApiError;
use crate::loris::models::{CourseCode, Crn, SectionSearchResponse, Term};
use crate::loris::reset::ResetProtocol;
use crate::loris::retry::or_empty;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{trace, warn};
use url::Url;

/// Sections requested per course. Sections are never paged, so a course
/// with more than this many sections in one term is truncated.
pub const SECTION_PAGE_SIZE: u32 = 500;

pub struct CrnFetcher {
    transport: Arc<dyn Transport>,
    url: Url,
    reset: Arc<ResetProtocol>,
}

impl CrnFetcher {
    pub fn new(transport: Arc<dyn Transport>, url: Url, reset: Arc<ResetProtocol>) -> Self {
        Self {
            transport,
            url,
            reset,
        }
    }

    async fn search(
        &self,
        course_code: &CourseCode,
        term: &Term,
    ) -> Result<Vec<Crn>, LorisApiError> {
        let form = [
            ("txt_subjectcoursecombo", course_code.to_string()),
            ("txt_term", term.to_string()),
            ("pageOffset", "0".to_string()),
            ("pageMaxSize", SECTION_PAGE_SIZE.to_string()),
            ("sortColumn", SORT_COLUMN.to_string()),
            ("sortDirection", SORT_DIRECTION.to_string()),
        ];
        let response = self.transport.post_form(&self.url, &form).await?;
        let sections = response.json::<SectionSearchResponse>()?;

        let mut seen = HashSet::new();
        Ok(sections
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|entry| entry.course_reference_number)
            .filter(|crn| seen.insert(crn.clone()))
            .collect())
    }

    /// CRNs for `course_code` in `term`. An unmatched course, a malformed
    /// response or an unexpected status yields an empty list.
    pub async fn crns(
        &self,
        course_code: &CourseCode,
        term: &Term,
    ) -> Result<Vec<Crn>, LorisApiError> {
        or_empty("section search", self.try_crns(course_code, term).await)
    }

    /// Like [`CrnFetcher::crns`], but every failure is returned.
    pub async fn try_crns(
        &self,
        course_code: &CourseCode,
        term: &Term,
    ) -> Result<Vec<Crn>, LorisApiError> {
        let crns = self
            .reset
            .with_reset("section search", || self.search(course_code, term))
            .await?;

        if crns.len() as u32 >= SECTION_PAGE_SIZE {
            warn!(
                course_code = %course_code,
                term = %term,
                count = crns.len(),
                "section search hit the page size; some sections may be missing"
            );
        }
        trace!(course_code = %course_code, term = %term, count = crns.len(), "sections fetched");
        Ok(crns)
    }
}
