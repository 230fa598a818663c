use crate::loris::errors::LorisApiError;
use crate::loris::models::{CourseCode, Crn, Term};
use crate::utils::fmt_duration;
use num_format::{Locale, ToFormattedString};
use std::fmt;
use std::time::Duration;
use tracing::{error, info, warn};

/// Why a term's crawl stopped early.
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error(transparent)]
    Api(#[from] LorisApiError),
    #[error("record sink rejected a record")]
    Sink(#[source] anyhow::Error),
}

impl CrawlError {
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, CrawlError::Api(e) if e.is_session_fatal())
    }
}

/// A unit of work that failed without stopping the crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailedUnit {
    Page { offset: u32 },
    CourseCode(CourseCode),
    Crn { course_code: CourseCode, crn: Crn },
}

impl fmt::Display for FailedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailedUnit::Page { offset } => write!(f, "catalog page at offset {offset}"),
            FailedUnit::CourseCode(code) => write!(f, "sections of {code}"),
            FailedUnit::Crn { course_code, crn } => write!(f, "instructors of {course_code}/{crn}"),
        }
    }
}

/// What one term's crawl got through before finishing or stopping.
#[derive(Debug)]
pub struct CrawlReport {
    pub term: Term,
    pub total_count: Option<u32>,
    pub pages_fetched: u32,
    pub course_codes: u32,
    /// Course codes with no sections; produce no records.
    pub skipped_course_codes: u32,
    pub crns: u32,
    pub records: u32,
    pub failed: Vec<FailedUnit>,
    pub terminal_error: Option<CrawlError>,
    pub cancelled: bool,
    pub duration: Duration,
}

impl CrawlReport {
    pub(crate) fn new(term: Term) -> Self {
        Self {
            term,
            total_count: None,
            pages_fetched: 0,
            course_codes: 0,
            skipped_course_codes: 0,
            crns: 0,
            records: 0,
            failed: Vec::new(),
            terminal_error: None,
            cancelled: false,
            duration: Duration::ZERO,
        }
    }

    /// True when every planned unit ran and none failed.
    pub fn is_complete(&self) -> bool {
        self.terminal_error.is_none() && !self.cancelled && self.failed.is_empty()
    }

    pub fn is_session_fatal(&self) -> bool {
        self.terminal_error
            .as_ref()
            .is_some_and(CrawlError::is_session_fatal)
    }

    pub fn log(&self) {
        let fmt_count = |n: u32| n.to_formatted_string(&Locale::en);
        let term = self.term.as_str();
        let duration = fmt_duration(self.duration);

        match &self.terminal_error {
            Some(e) => error!(
                term,
                course_codes = fmt_count(self.course_codes),
                crns = fmt_count(self.crns),
                records = fmt_count(self.records),
                failed = self.failed.len(),
                duration,
                error = ?e,
                "Crawl stopped early"
            ),
            None if self.cancelled => warn!(
                term,
                course_codes = fmt_count(self.course_codes),
                crns = fmt_count(self.crns),
                records = fmt_count(self.records),
                duration,
                "Crawl cancelled"
            ),
            None => info!(
                term,
                total_count = self.total_count.map(fmt_count),
                pages = self.pages_fetched,
                course_codes = fmt_count(self.course_codes),
                skipped = fmt_count(self.skipped_course_codes),
                crns = fmt_count(self.crns),
                records = fmt_count(self.records),
                failed = self.failed.len(),
                duration,
                "Crawl finished"
            ),
        }

        for unit in &self.failed {
            warn!(term, unit = %unit, "unit of work failed");
        }
    }
}
