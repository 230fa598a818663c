//! Portal endpoint URLs.

use anyhow::{Context, Result};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://loris.wlu.ca/register/ssb/";

/// Endpoint URLs resolved against a single base, so tests can point the
/// whole set at a mock server.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub reset: Url,
    pub catalog: Url,
    pub sections: Url,
    pub faculty_meeting_times: Url,
}

impl Endpoints {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base =
            Url::parse(base_url).with_context(|| format!("invalid base URL {base_url}"))?;
        // Without a trailing slash `join` would replace the last path segment.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let join = |path: &str| {
            base.join(path)
                .with_context(|| format!("failed to join {path} onto {base}"))
        };

        Ok(Self {
            reset: join("courseSearch/resetDataForm")?,
            catalog: join("courseSearchResults/courseSearchResults/")?,
            sections: join("searchResults/searchResults/")?,
            faculty_meeting_times: join("searchResults/getFacultyMeetingTimes")?,
        })
    }
}
