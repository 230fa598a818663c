//! The crawl pipeline: catalog → course codes → CRNs → instructors → records.

mod orchestrator;
mod report;

pub use orchestrator::CrawlOrchestrator;
pub use report::{CrawlError, CrawlReport, FailedUnit};

use crate::loris::models::{CourseCode, Crn, Instructor, Term};
use async_trait::async_trait;
use serde::Serialize;

/// One section with the instructors teaching it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRecord {
    pub term: Term,
    pub course_code: CourseCode,
    pub crn: Crn,
    pub instructors: Vec<Instructor>,
}

/// Where crawled records go. Storage layout is the sink's concern.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn emit(&self, record: SectionRecord) -> anyhow::Result<()>;

    /// Called after each term. Buffered sinks persist here.
    async fn flush(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
