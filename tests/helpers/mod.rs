//! Scripted in-process portal for driving the crawler without a network.
//!
//! Every query-bearing POST must be immediately preceded by a reset; one
//! that isn't is answered with a 500 and recorded as a violation. Each
//! request yields to the scheduler before it is answered, so concurrent
//! callers can interleave the way they would over a real connection.

#![allow(dead_code)]

use async_trait::async_trait;
use loris::crawl::{RecordSink, SectionRecord};
use loris::loris::client::{Params, RawResponse, Transport, TransportError};
use loris::loris::{Endpoints, LorisApi, ResetMode, RetryPolicy};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub const BASE_URL: &str = "http://portal.test/ssb/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Reset,
    Catalog,
    Sections,
    Faculty,
}

impl Endpoint {
    fn from_url(url: &Url) -> Self {
        let path = url.path();
        if path.ends_with("courseSearch/resetDataForm") {
            Endpoint::Reset
        } else if path.ends_with("courseSearchResults/courseSearchResults/") {
            Endpoint::Catalog
        } else if path.ends_with("searchResults/searchResults/") {
            Endpoint::Sections
        } else if path.ends_with("searchResults/getFacultyMeetingTimes") {
            Endpoint::Faculty
        } else {
            panic!("unexpected request to {url}")
        }
    }
}

/// A request as the portal saw it.
#[derive(Debug, Clone)]
pub struct Seen {
    pub endpoint: Endpoint,
    pub params: HashMap<String, String>,
}

struct Override {
    endpoint: Endpoint,
    /// Only requests carrying this parameter value match.
    param: Option<(String, String)>,
    status: u16,
    body: String,
}

impl Override {
    fn matches(&self, seen: &Seen) -> bool {
        self.endpoint == seen.endpoint
            && self
                .param
                .as_ref()
                .is_none_or(|(name, value)| seen.params.get(name) == Some(value))
    }
}

#[derive(Default)]
struct State {
    /// Course codes per term, as (department, number).
    catalogs: HashMap<String, Vec<(String, String)>>,
    sections: HashMap<String, Vec<String>>,
    faculty: HashMap<String, String>,
    /// Raw answers that replace the scripted one, first match wins.
    overrides: Vec<Override>,
    /// Remaining connection resets to inject per endpoint.
    faults: HashMap<Endpoint, u32>,
    reset_pending: bool,
    violations: Vec<Seen>,
    log: Vec<Seen>,
}

#[derive(Default)]
pub struct FakePortal {
    state: Mutex<State>,
}

impl FakePortal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_catalog(self: &Arc<Self>, term: &str, codes: &[&str]) -> Arc<Self> {
        let entries = codes
            .iter()
            .map(|code| {
                let split = code.find(|c: char| c.is_ascii_digit()).unwrap_or(code.len());
                (code[..split].to_string(), code[split..].to_string())
            })
            .collect();
        self.state.lock().unwrap().catalogs.insert(term.into(), entries);
        self.clone()
    }

    pub fn with_sections(self: &Arc<Self>, course_code: &str, crns: &[&str]) -> Arc<Self> {
        self.state
            .lock()
            .unwrap()
            .sections
            .insert(course_code.into(), crns.iter().map(|c| c.to_string()).collect());
        self.clone()
    }

    pub fn with_faculty(self: &Arc<Self>, crn: &str, body: Value) -> Arc<Self> {
        self.with_faculty_body(crn, &body.to_string())
    }

    pub fn with_faculty_body(self: &Arc<Self>, crn: &str, body: &str) -> Arc<Self> {
        self.state
            .lock()
            .unwrap()
            .faculty
            .insert(crn.into(), body.into());
        self.clone()
    }

    /// Answer every call to `endpoint` with this status and body instead.
    pub fn respond(self: &Arc<Self>, endpoint: Endpoint, status: u16, body: &str) -> Arc<Self> {
        self.push_override(endpoint, None, status, body)
    }

    /// Like [`FakePortal::respond`], for calls whose `name` parameter is `value`.
    pub fn respond_matching(
        self: &Arc<Self>,
        endpoint: Endpoint,
        (name, value): (&str, &str),
        status: u16,
        body: &str,
    ) -> Arc<Self> {
        self.push_override(endpoint, Some((name.into(), value.into())), status, body)
    }

    fn push_override(
        self: &Arc<Self>,
        endpoint: Endpoint,
        param: Option<(String, String)>,
        status: u16,
        body: &str,
    ) -> Arc<Self> {
        self.state.lock().unwrap().overrides.push(Override {
            endpoint,
            param,
            status,
            body: body.into(),
        });
        self.clone()
    }

    /// Drop the connection on the next `count` calls to `endpoint`.
    pub fn drop_connections(self: &Arc<Self>, endpoint: Endpoint, count: u32) -> Arc<Self> {
        self.state.lock().unwrap().faults.insert(endpoint, count);
        self.clone()
    }

    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.state
            .lock()
            .unwrap()
            .log
            .iter()
            .filter(|seen| seen.endpoint == endpoint)
            .count()
    }

    pub fn requests(&self, endpoint: Endpoint) -> Vec<Seen> {
        self.state
            .lock()
            .unwrap()
            .log
            .iter()
            .filter(|seen| seen.endpoint == endpoint)
            .cloned()
            .collect()
    }

    /// Endpoints in the order their requests arrived.
    pub fn sequence(&self) -> Vec<Endpoint> {
        self.state
            .lock()
            .unwrap()
            .log
            .iter()
            .map(|seen| seen.endpoint)
            .collect()
    }

    pub fn violations(&self) -> Vec<Seen> {
        self.state.lock().unwrap().violations.clone()
    }

    fn answer(&self, url: &Url, params: &Params) -> Result<RawResponse, TransportError> {
        let endpoint = Endpoint::from_url(url);
        let seen = Seen {
            endpoint,
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        };

        let mut state = self.state.lock().unwrap();
        state.log.push(seen.clone());

        match endpoint {
            Endpoint::Reset => state.reset_pending = true,
            Endpoint::Catalog | Endpoint::Sections => {
                if !std::mem::take(&mut state.reset_pending) {
                    state.violations.push(seen.clone());
                    return Ok(response(url, 500, "query issued without a preceding reset"));
                }
            }
            Endpoint::Faculty => {}
        }

        if let Some(remaining) = state.faults.get_mut(&endpoint)
            && *remaining > 0
        {
            *remaining -= 1;
            // The reset never reached the server.
            if endpoint == Endpoint::Reset {
                state.reset_pending = false;
            }
            return Err(TransportError::ConnectionReset(anyhow::anyhow!(
                "connection reset by peer"
            )));
        }

        if let Some(answer) = state.overrides.iter().find(|o| o.matches(&seen)) {
            return Ok(response(url, answer.status, &answer.body));
        }

        let param = |name: &str| seen.params.get(name).cloned().unwrap_or_default();
        let body = match endpoint {
            Endpoint::Reset => String::new(),
            Endpoint::Catalog => {
                let Some(entries) = state.catalogs.get(&param("txt_term")) else {
                    return Ok(response(url, 200, r#"{"success":false,"data":null}"#));
                };
                let offset: usize = param("pageOffset").parse().unwrap();
                let size: usize = param("pageMaxSize").parse().unwrap();
                let page: Vec<Value> = entries
                    .iter()
                    .skip(offset)
                    .take(size)
                    .map(|(dept, num)| {
                        json!({
                            "departmentCode": dept,
                            "courseNumber": num,
                            "subjectDescription": dept,
                        })
                    })
                    .collect();
                json!({
                    "success": true,
                    "totalCount": entries.len(),
                    "pageOffset": offset,
                    "pageMaxSize": size,
                    "data": if page.is_empty() { Value::Null } else { Value::Array(page) },
                })
                .to_string()
            }
            Endpoint::Sections => {
                let crns = state
                    .sections
                    .get(&param("txt_subjectcoursecombo"))
                    .cloned()
                    .unwrap_or_default();
                let data: Vec<Value> = crns
                    .iter()
                    .map(|crn| json!({"courseReferenceNumber": crn, "term": param("txt_term")}))
                    .collect();
                json!({"success": true, "totalCount": data.len(), "data": data}).to_string()
            }
            Endpoint::Faculty => state
                .faculty
                .get(&param("courseReferenceNumber"))
                .cloned()
                .unwrap_or_else(|| r#"{"fmt":[]}"#.to_string()),
        };
        Ok(response(url, 200, &body))
    }
}

fn response(url: &Url, status: u16, body: &str) -> RawResponse {
    RawResponse {
        status,
        url: url.to_string(),
        body: body.to_string(),
    }
}

#[async_trait]
impl Transport for FakePortal {
    async fn post_form(&self, url: &Url, form: &Params) -> Result<RawResponse, TransportError> {
        tokio::task::yield_now().await;
        self.answer(url, form)
    }

    async fn get_query(&self, url: &Url, query: &Params) -> Result<RawResponse, TransportError> {
        tokio::task::yield_now().await;
        self.answer(url, query)
    }
}

pub fn instant_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new(max_retries, Duration::ZERO, Duration::ZERO)
}

pub fn api(portal: &Arc<FakePortal>, max_retries: u32) -> LorisApi {
    LorisApi::new(
        portal.clone(),
        Endpoints::new(BASE_URL).unwrap(),
        instant_retry(max_retries),
        ResetMode::Strict,
    )
}

/// Collects every emitted record.
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<SectionRecord>>,
}

impl RecordingSink {
    pub fn records(&self) -> Vec<SectionRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSink for RecordingSink {
    async fn emit(&self, record: SectionRecord) -> anyhow::Result<()> {
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

pub fn jane_doe() -> Value {
    json!({"fmt": [{"faculty": [{"displayName": "Jane Doe", "emailAddress": "jdoe@x.edu"}]}]})
}
