//! LORIS registration portal client.
//!
//! Every query-bearing search is paired with a form reset under a
//! session-wide lock; see [`reset`] for why.

pub mod catalog;
pub mod client;
pub mod endpoints;
pub mod errors;
pub mod faculty;
pub mod json;
pub mod middleware;
pub mod models;
pub mod reset;
pub mod retry;
pub mod sections;
pub mod session;

pub use catalog::CatalogPager;
pub use client::{SessionClient, Transport};
pub use endpoints::Endpoints;
pub use errors::LorisApiError;
pub use faculty::InstructorFetcher;
pub use models::{CourseCode, Crn, Instructor, Term};
pub use reset::{ResetMode, ResetProtocol};
pub use retry::RetryPolicy;
pub use sections::CrnFetcher;
pub use session::{Session, SessionProvider};

use std::sync::Arc;

/// The portal's fetchers, wired to one transport and one reset lock.
pub struct LorisApi {
    pub catalog: CatalogPager,
    pub sections: CrnFetcher,
    pub faculty: InstructorFetcher,
}

impl LorisApi {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: Endpoints,
        retry: RetryPolicy,
        reset_mode: ResetMode,
    ) -> Self {
        let reset = Arc::new(ResetProtocol::new(
            transport.clone(),
            endpoints.reset,
            retry.clone(),
            reset_mode,
        ));
        Self {
            catalog: CatalogPager::new(transport.clone(), endpoints.catalog, reset.clone()),
            sections: CrnFetcher::new(transport.clone(), endpoints.sections, reset),
            faculty: InstructorFetcher::new(transport, endpoints.faculty_meeting_times, retry),
        }
    }
}
