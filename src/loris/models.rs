//! Domain identifiers and the wire shapes of LORIS responses.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// An academic term code, e.g. `202309`. Opaque: never parsed, only passed through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Term(String);

impl Term {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Department code concatenated with course number, e.g. `BU` + `121` → `BU121`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseCode(String);

impl CourseCode {
    pub fn from_parts(department_code: &str, course_number: &str) -> Self {
        Self(format!("{}{}", department_code.trim(), course_number.trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CourseCode {
    fn from(code: &str) -> Self {
        Self(code.to_owned())
    }
}

impl fmt::Display for CourseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Course reference number: one scheduled section, unique within a term.
///
/// The portal serializes it as a string on some endpoints and a number on
/// others; both deserialize to the same textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Crn(String);

impl Crn {
    pub fn new(crn: impl Into<String>) -> Self {
        Self(crn.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Crn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Ok(Crn(s.trim().to_owned())),
            Raw::Number(n) => Ok(Crn(n.to_string())),
        }
    }
}

impl fmt::Display for Crn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An instructor teaching one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instructor {
    pub display_name: String,
    pub email_address: Option<String>,
}

/// Response of the catalog (course search results) endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogResponse {
    /// `null` when the search matched nothing.
    #[serde(default)]
    pub data: Option<Vec<CatalogEntry>>,
    #[serde(default)]
    pub total_count: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub department_code: String,
    pub course_number: String,
}

impl CatalogEntry {
    pub fn course_code(&self) -> CourseCode {
        CourseCode::from_parts(&self.department_code, &self.course_number)
    }
}

/// Response of the section search (course details) endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSearchResponse {
    #[serde(default)]
    pub data: Option<Vec<SectionEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionEntry {
    pub course_reference_number: Crn,
}

/// Response of the faculty/meeting-times endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct FacultyMeetingTimesResponse {
    #[serde(default)]
    pub fmt: Option<Vec<MeetingTimeEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeetingTimeEntry {
    #[serde(default)]
    pub faculty: Option<Vec<FacultyEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacultyEntry {
    pub display_name: String,
    #[serde(default)]
    pub email_address: Option<String>,
}

impl From<FacultyEntry> for Instructor {
    fn from(entry: FacultyEntry) -> Self {
        Instructor {
            display_name: entry.display_name,
            email_address: entry.email_address.filter(|e| !e.trim().is_empty()),
        }
    }
}
