//! HTTP-level tests: the real client against a mock portal.

use loris::config::RateLimitingConfig;
use loris::crawl::CrawlOrchestrator;
use loris::loris::client::{RawResponse, SessionClient, Transport};
use loris::loris::{Endpoints, LorisApi, ResetMode, RetryPolicy, Session, Term};
use loris::store::{CatalogWriter, JsonFileStore, Store};
use serde_json::json;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COOKIES: &str = "JSESSIONID=A1B2C3; BIGipServer=pool_443; _ga=GA1.2.3; _gid=GA1.2.4; lang=en";

fn client() -> SessionClient {
    let session = Session::from_cookie_header(COOKIES).unwrap();
    let rate_limiting = RateLimitingConfig {
        requests_per_second: NonZeroU32::new(1000).unwrap(),
        burst: NonZeroU32::new(1000).unwrap(),
    };
    SessionClient::new_with_config(session, &rate_limiting, Duration::from_secs(5)).unwrap()
}

fn endpoints(server: &MockServer) -> Endpoints {
    Endpoints::new(&format!("{}/register/ssb", server.uri())).unwrap()
}

#[tokio::test]
async fn test_post_sends_cookies_and_form_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/register/ssb/courseSearch/resetDataForm"))
        .and(header("cookie", COOKIES))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("resetCourses=false&resetSections=true"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let response: RawResponse = client()
        .post_form(
            &endpoints(&server).reset,
            &[
                ("resetCourses", "false".to_string()),
                ("resetSections", "true".to_string()),
            ],
        )
        .await
        .unwrap();

    assert!(response.is_success());
}

#[tokio::test]
async fn test_get_sends_cookies_and_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/register/ssb/searchResults/getFacultyMeetingTimes"))
        .and(header("cookie", COOKIES))
        .and(header("x-requested-with", "XMLHttpRequest"))
        .and(query_param("term", "202309"))
        .and(query_param("courseReferenceNumber", "10001"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"fmt":[]}"#))
        .expect(1)
        .mount(&server)
        .await;

    let response = client()
        .get_query(
            &endpoints(&server).faculty_meeting_times,
            &[
                ("term", "202309".to_string()),
                ("courseReferenceNumber", "10001".to_string()),
            ],
        )
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, r#"{"fmt":[]}"#);
}

#[tokio::test]
async fn test_error_status_is_returned_not_raised() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let response = client()
        .post_form(&endpoints(&server).catalog, &[("txt_term", "202309".to_string())])
        .await
        .unwrap();

    assert_eq!(response.status, 403);
}

async fn mount_portal(server: &MockServer) {
    let post = |route: &str| {
        Mock::given(method("POST"))
            .and(path(format!("/register/ssb/{route}")))
            .and(header("cookie", COOKIES))
    };

    post("courseSearch/resetDataForm")
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;

    post("courseSearchResults/courseSearchResults/")
        .and(body_string_contains("pageMaxSize=10&"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "totalCount": 2,
            "data": [
                {"departmentCode": "BU", "courseNumber": "121"},
                {"departmentCode": "CP", "courseNumber": "100"}
            ]
        })))
        .expect(1)
        .mount(server)
        .await;
    post("courseSearchResults/courseSearchResults/")
        .and(body_string_contains(
            "pageOffset=0&pageMaxSize=500&sortColumn=subjectDescription&sortDirection=asc",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "totalCount": 2,
            "data": [
                {"departmentCode": "BU", "courseNumber": "121"},
                {"departmentCode": "CP", "courseNumber": "100"}
            ]
        })))
        .expect(1)
        .mount(server)
        .await;
    post("courseSearchResults/courseSearchResults/")
        .and(body_string_contains("pageOffset=500&pageMaxSize=500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "totalCount": 2,
            "data": null
        })))
        .expect(1)
        .mount(server)
        .await;

    post("searchResults/searchResults/")
        .and(body_string_contains("txt_subjectcoursecombo=BU121&txt_term=202309"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [{"courseReferenceNumber": "10001"}, {"courseReferenceNumber": 10002}]
        })))
        .mount(server)
        .await;
    post("searchResults/searchResults/")
        .and(body_string_contains("txt_subjectcoursecombo=CP100&"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": []})),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/register/ssb/searchResults/getFacultyMeetingTimes"))
        .and(query_param("courseReferenceNumber", "10001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "fmt": [{"faculty": [{"displayName": "Doe, Jane", "emailAddress": "jdoe@x.edu"}]}]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/register/ssb/searchResults/getFacultyMeetingTimes"))
        .and(query_param("courseReferenceNumber", "10002"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"fmt": [{"faculty": []}]})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_crawl_over_http_into_file_store() {
    let server = MockServer::start().await;
    mount_portal(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("loris.json");
    let writer = Arc::new(CatalogWriter::new(JsonFileStore::open(&output).await.unwrap()));

    let api = LorisApi::new(
        Arc::new(client()),
        endpoints(&server),
        RetryPolicy::new(1, Duration::ZERO, Duration::ZERO),
        ResetMode::Strict,
    );
    let orchestrator =
        CrawlOrchestrator::new(api, writer.clone(), 500, 2, CancellationToken::new());

    let reports = orchestrator.crawl_terms(&[Term::new("202309")]).await;
    assert!(reports[0].is_complete(), "{:?}", reports[0]);
    assert_eq!(reports[0].records, 2);

    let written: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&output).unwrap()).unwrap();
    assert_eq!(
        written,
        json!({
            "courses": {"BU121": {"202309": ["10001", "10002"]}},
            "instructors": {"Doe, Jane": {"email": "jdoe@x.edu", "202309": ["10001"]}}
        })
    );

    // Reopening picks up what was flushed.
    let reopened = JsonFileStore::open(&output).await.unwrap();
    assert_eq!(
        reopened.read("instructors/Doe, Jane/email").await.unwrap(),
        Some(json!("jdoe@x.edu"))
    );
}
