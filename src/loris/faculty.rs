//! Instructor lookup for a single section.
//!
//! The faculty/meeting-times payload is nested four levels deep and the
//! portal leaves out any level of it for sections without an assigned
//! instructor (TBA sections, independent studies, cancelled sections).
//! Decoding is a single step that either yields the faculty list or names
//! the level that was missing.

use crate::loris::client::{RawResponse, Transport};
use crate::loris::errors::LorisApiError;
use crate::loris::models::{Crn, FacultyMeetingTimesResponse, Instructor, Term};
use crate::loris::retry::{RetryPolicy, or_empty};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::trace;
use url::Url;

/// A level of the faculty payload the portal is allowed to omit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Absence {
    /// Empty response body.
    Response,
    /// Body is JSON `null`.
    Payload,
    /// `fmt` is missing, `null` or empty.
    MeetingTime,
    /// `fmt[0].faculty` is missing or `null`.
    Faculty,
}

impl fmt::Display for Absence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Absence::Response => "response",
            Absence::Payload => "payload",
            Absence::MeetingTime => "meeting time",
            Absence::Faculty => "faculty list",
        })
    }
}

/// Outcome of decoding a faculty/meeting-times response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacultyLookup {
    Found(Vec<Instructor>),
    Absent(Absence),
}

impl FacultyLookup {
    pub fn into_instructors(self) -> Vec<Instructor> {
        match self {
            FacultyLookup::Found(instructors) => instructors,
            FacultyLookup::Absent(_) => Vec::new(),
        }
    }
}

/// Decode a faculty response, tolerating each documented absence.
///
/// Only the first meeting-time entry is read; the portal repeats the same
/// faculty list on every entry. Instructors are unique by display name
/// within the section, first occurrence wins.
pub fn decode_faculty(response: &RawResponse) -> Result<FacultyLookup, LorisApiError> {
    if response.is_success() && response.body.trim().is_empty() {
        return Ok(FacultyLookup::Absent(Absence::Response));
    }

    let Some(payload) = response.json::<Option<FacultyMeetingTimesResponse>>()? else {
        return Ok(FacultyLookup::Absent(Absence::Payload));
    };
    let Some(first) = payload.fmt.and_then(|entries| entries.into_iter().next()) else {
        return Ok(FacultyLookup::Absent(Absence::MeetingTime));
    };
    let Some(faculty) = first.faculty else {
        return Ok(FacultyLookup::Absent(Absence::Faculty));
    };

    let mut seen = HashSet::new();
    let instructors = faculty
        .into_iter()
        .map(Instructor::from)
        .filter(|instructor| seen.insert(instructor.display_name.clone()))
        .collect();
    Ok(FacultyLookup::Found(instructors))
}

pub struct InstructorFetcher {
    transport: Arc<dyn Transport>,
    url: Url,
    retry: RetryPolicy,
}

impl InstructorFetcher {
    pub fn new(transport: Arc<dyn Transport>, url: Url, retry: RetryPolicy) -> Self {
        Self {
            transport,
            url,
            retry,
        }
    }

    /// Instructors teaching `crn` in `term`.
    ///
    /// This endpoint is a plain lookup against no form state, so it is not
    /// paired with a reset.
    pub async fn instructors(
        &self,
        term: &Term,
        crn: &Crn,
    ) -> Result<Vec<Instructor>, LorisApiError> {
        or_empty("faculty lookup", self.try_instructors(term, crn).await)
    }

    /// Like [`InstructorFetcher::instructors`], but every failure is returned.
    /// Documented absences are still an empty list.
    pub async fn try_instructors(
        &self,
        term: &Term,
        crn: &Crn,
    ) -> Result<Vec<Instructor>, LorisApiError> {
        let query = [
            ("term", term.to_string()),
            ("courseReferenceNumber", crn.to_string()),
        ];
        let query = &query;
        let this = self;

        let lookup = self
            .retry
            .run("faculty lookup", move || async move {
                let response = this.transport.get_query(&this.url, query).await?;
                decode_faculty(&response)
            })
            .await?;

        if let FacultyLookup::Absent(absence) = &lookup {
            trace!(term = %term, crn = %crn, %absence, "no faculty listed");
        }
        Ok(lookup.into_instructors())
    }
}
