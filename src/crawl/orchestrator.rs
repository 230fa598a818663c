use crate::crawl::report::{CrawlError, CrawlReport, FailedUnit};
use crate::crawl::{RecordSink, SectionRecord};
use crate::loris::catalog::page_offsets;
use crate::loris::{LorisApi, LorisApiError};
use crate::loris::models::{CourseCode, Term};
use futures::{StreamExt, future, stream};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

/// Outcome of one unit of work that the crawl can keep going after.
enum Flow {
    Continue,
    Cancelled,
}

/// Runs the full pipeline for one or more terms over a single session.
///
/// Course codes and catalog pages are walked in order. Instructor lookups
/// for the CRNs of one course run concurrently, up to
/// `instructor_concurrency`, but records are emitted in CRN order.
///
/// A unit whose lookup fails yields nothing, as if it were empty, and is
/// listed in the report's `failed` units.
pub struct CrawlOrchestrator {
    api: LorisApi,
    sink: Arc<dyn RecordSink>,
    page_size: u32,
    instructor_concurrency: usize,
    cancel: CancellationToken,
}

impl CrawlOrchestrator {
    pub fn new(
        api: LorisApi,
        sink: Arc<dyn RecordSink>,
        page_size: u32,
        instructor_concurrency: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            api,
            sink,
            page_size: page_size.max(1),
            instructor_concurrency: instructor_concurrency.max(1),
            cancel,
        }
    }

    /// Crawl each term in turn, stopping early on cancellation or when the
    /// session is no longer accepted.
    pub async fn crawl_terms(&self, terms: &[Term]) -> Vec<CrawlReport> {
        let mut reports = Vec::with_capacity(terms.len());
        for term in terms {
            if self.cancel.is_cancelled() {
                break;
            }
            let report = self.crawl_term(term).await;
            report.log();
            let stop = report.is_session_fatal() || report.cancelled;
            reports.push(report);
            if stop {
                if reports.len() < terms.len() {
                    warn!(
                        remaining = terms.len() - reports.len(),
                        "Skipping remaining terms"
                    );
                }
                break;
            }
        }
        reports
    }

    /// Crawl one term. Never fails outright: whatever stopped the crawl is
    /// recorded in the report next to the work already done.
    pub async fn crawl_term(&self, term: &Term) -> CrawlReport {
        let start = Instant::now();
        let mut report = CrawlReport::new(term.clone());

        let result = self
            .run_term(term, &mut report)
            .instrument(info_span!("crawl_term", term = %term))
            .await;

        match result {
            Ok(Flow::Continue) => {}
            Ok(Flow::Cancelled) => report.cancelled = true,
            Err(e) => report.terminal_error = Some(e),
        }

        // Partial output is kept whatever stopped the term.
        if let Err(e) = self.sink.flush().await {
            match report.terminal_error {
                Some(_) => error!(term = %term, error = ?e, "Failed to flush records"),
                None => report.terminal_error = Some(CrawlError::Sink(e)),
            }
        }
        report.duration = start.elapsed();
        report
    }

    async fn run_term(&self, term: &Term, report: &mut CrawlReport) -> Result<Flow, CrawlError> {
        let total = self.api.catalog.total_count(term).await?;
        report.total_count = Some(total);

        let offsets = page_offsets(total, self.page_size).ok_or_else(|| {
            warn!(total, page_size = self.page_size, "Catalog size out of range");
            LorisApiError::TotalCountUnavailable {
                term: term.to_string(),
                source: None,
            }
        })?;
        info!(total, pages = offsets.len(), "Crawling catalog");

        // Page boundaries can shift if the catalog changes mid-crawl.
        let mut seen = HashSet::new();

        for offset in offsets {
            if self.cancel.is_cancelled() {
                return Ok(Flow::Cancelled);
            }

            let codes = match self.api.catalog.try_page(term, offset, self.page_size).await {
                Ok(codes) => codes,
                Err(e) if e.is_session_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!(offset, error = ?e, "Catalog page failed, continuing");
                    report.failed.push(FailedUnit::Page { offset });
                    continue;
                }
            };
            report.pages_fetched += 1;

            for code in codes {
                if !seen.insert(code.clone()) {
                    trace!(course_code = %code, "already crawled");
                    continue;
                }
                if let Flow::Cancelled = self.crawl_course(term, &code, report).await? {
                    return Ok(Flow::Cancelled);
                }
            }
        }

        Ok(Flow::Continue)
    }

    async fn crawl_course(
        &self,
        term: &Term,
        code: &CourseCode,
        report: &mut CrawlReport,
    ) -> Result<Flow, CrawlError> {
        if self.cancel.is_cancelled() {
            return Ok(Flow::Cancelled);
        }

        let crns = match self.api.sections.try_crns(code, term).await {
            Ok(crns) => crns,
            Err(e) if e.is_session_fatal() => return Err(e.into()),
            Err(e) => {
                warn!(course_code = %code, error = ?e, "Section lookup failed, continuing");
                report.failed.push(FailedUnit::CourseCode(code.clone()));
                return Ok(Flow::Continue);
            }
        };
        report.course_codes += 1;

        if crns.is_empty() {
            debug!(course_code = %code, "No sections, skipping");
            report.skipped_course_codes += 1;
            return Ok(Flow::Continue);
        }

        let api = &self.api;
        let cancel = &self.cancel;
        let mut lookups = stream::iter(crns)
            .take_while(move |_| future::ready(!cancel.is_cancelled()))
            .map(move |crn| async move {
                let result = api.faculty.try_instructors(term, &crn).await;
                (crn, result)
            })
            .buffered(self.instructor_concurrency);

        while let Some((crn, result)) = lookups.next().await {
            if self.cancel.is_cancelled() {
                return Ok(Flow::Cancelled);
            }
            report.crns += 1;
            let instructors = match result {
                Ok(instructors) => instructors,
                Err(e) if e.is_session_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!(
                        course_code = %code,
                        crn = %crn,
                        error = ?e,
                        "Instructor lookup failed, continuing"
                    );
                    report.failed.push(FailedUnit::Crn {
                        course_code: code.clone(),
                        crn,
                    });
                    continue;
                }
            };

            let record = SectionRecord {
                term: term.clone(),
                course_code: code.clone(),
                crn,
                instructors,
            };
            self.sink.emit(record).await.map_err(CrawlError::Sink)?;
            report.records += 1;
        }

        if self.cancel.is_cancelled() {
            return Ok(Flow::Cancelled);
        }
        Ok(Flow::Continue)
    }
}
