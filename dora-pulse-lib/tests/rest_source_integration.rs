//! Integration tests for the resource-oriented source using wiremock

use chrono::{DateTime, Utc};
use core::time::Duration;
use dora_pulse_lib::facts::{
    Credentials, DeliverySource, EnvironmentFilter, FetchClient, FetchError, MatchMode, PageLimits, RestSource, RetryPolicy,
};
use dora_pulse_lib::model::{DeploymentStatus, PrState, Repository};
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn source(server: &MockServer, max_pages: u32) -> RestSource {
    let policy = RetryPolicy {
        max_retries: 1,
        initial_backoff: Duration::from_millis(5),
        request_timeout: Duration::from_secs(5),
    };
    let client = FetchClient::new(Credentials::from_token("test-token-value"), policy).unwrap();
    let limits = PageLimits { page_size: 2, max_pages };

    RestSource::new(client, &Url::parse(&server.uri()).unwrap(), limits)
}

fn repo() -> Repository {
    Repository::parse("acme/widgets").unwrap()
}

fn since() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap().to_utc()
}

fn pr(number: u64) -> Value {
    json!({
        "number": number,
        "state": "closed",
        "title": format!("Change {number}"),
        "created_at": "2024-01-02T10:00:00Z",
        "merged_at": "2024-01-03T10:00:00Z",
        "base": { "ref": "main" },
        "head": { "ref": format!("feature-{number}") },
        "labels": [{ "name": "backend" }]
    })
}

async fn mount_page(server: &MockServer, route: &str, page: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(query_param("page", page))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_pages_until_empty_page() {
    let server = MockServer::start().await;
    let route = "/repos/acme/widgets/pulls";

    mount_page(&server, route, "1", json!([pr(1), pr(2)])).await;
    mount_page(&server, route, "2", json!([pr(3)])).await;
    mount_page(&server, route, "3", json!([])).await;

    let listing = source(&server, 10).pull_requests(&repo()).await.unwrap();

    assert_eq!(listing.pages, 3);
    assert!(!listing.incomplete);
    let numbers: Vec<_> = listing.items.iter().map(|p| p.number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(listing.items[0].state, PrState::Closed);
    assert_eq!(listing.items[0].base_branch, "main");
    assert_eq!(listing.items[0].labels, vec!["backend".to_string()]);
}

#[tokio::test]
async fn test_stops_at_page_cap() {
    let server = MockServer::start().await;
    let route = "/repos/acme/widgets/pulls";

    mount_page(&server, route, "1", json!([pr(1), pr(2)])).await;
    mount_page(&server, route, "2", json!([pr(3), pr(4)])).await;

    let listing = source(&server, 2).pull_requests(&repo()).await.unwrap();

    assert_eq!(listing.pages, 2);
    assert_eq!(listing.items.len(), 4);
    assert!(!listing.incomplete);
}

#[tokio::test]
async fn test_stops_when_link_header_has_no_next() {
    let server = MockServer::start().await;
    let last = format!("<{}/repos/acme/widgets/pulls?page=1>; rel=\"first\"", server.uri());

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/pulls"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([pr(1)])).insert_header("link", last.as_str()))
        .expect(1)
        .mount(&server)
        .await;

    let listing = source(&server, 10).pull_requests(&repo()).await.unwrap();
    assert_eq!(listing.pages, 1);
    assert_eq!(listing.items.len(), 1);
}

#[tokio::test]
async fn test_later_page_failure_yields_partial_listing() {
    let server = MockServer::start().await;
    let route = "/repos/acme/widgets/pulls";

    mount_page(&server, route, "1", json!([pr(1), pr(2)])).await;
    Mock::given(method("GET"))
        .and(path(route))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let listing = source(&server, 10).pull_requests(&repo()).await.unwrap();

    assert!(listing.incomplete);
    assert_eq!(listing.items.len(), 2);
}

#[tokio::test]
async fn test_first_page_failure_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/pulls"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = source(&server, 10).pull_requests(&repo()).await.unwrap_err();
    assert!(matches!(err, FetchError::Permanent { status: 404, .. }));
}

#[tokio::test]
async fn test_missing_required_field_is_malformed() {
    let server = MockServer::start().await;
    let route = "/repos/acme/widgets/pulls";

    mount_page(&server, route, "1", json!([{ "number": 9, "state": "open" }])).await;

    let err = source(&server, 10).pull_requests(&repo()).await.unwrap_err();
    assert!(err.to_string().contains("created_at"), "{err}");
}

#[tokio::test]
async fn test_issues_skip_pull_requests() {
    let server = MockServer::start().await;
    let route = "/repos/acme/widgets/issues";

    mount_page(
        &server,
        route,
        "1",
        json!([
            { "number": 5, "title": "Crash", "created_at": "2024-01-05T00:00:00Z", "labels": [{ "name": "incident" }] },
            { "number": 6, "title": "A PR", "created_at": "2024-01-05T00:00:00Z", "pull_request": { "url": "x" } }
        ]),
    )
    .await;
    mount_page(&server, route, "2", json!([])).await;

    let listing = source(&server, 10).issues(&repo(), &[], since()).await.unwrap();

    assert_eq!(listing.items.len(), 1);
    assert_eq!(listing.items[0].number, 5);
    assert_eq!(listing.items[0].labels, vec!["incident".to_string()]);
}

#[tokio::test]
async fn test_deployments_carry_latest_status() {
    let server = MockServer::start().await;
    let route = "/repos/acme/widgets/deployments";

    Mock::given(method("GET"))
        .and(path(route))
        .and(query_param("environment", "production"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 7, "environment": "production", "created_at": "2024-01-04T00:00:00Z", "updated_at": "2024-01-04T00:10:00Z" },
            { "id": 8, "environment": "production", "created_at": "2024-01-05T00:00:00Z", "updated_at": "2024-01-05T00:10:00Z" }
        ])))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, route, "2", json!([])).await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/deployments/7/statuses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "state": "success" }])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/deployments/8/statuses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let filter = EnvironmentFilter::new(Some("production".to_string()), MatchMode::Exact);
    let listing = source(&server, 10).deployments(&repo(), &filter, since()).await.unwrap();

    assert!(!listing.incomplete);
    let statuses: Vec<_> = listing.items.iter().map(|d| d.status).collect();
    assert_eq!(statuses, vec![DeploymentStatus::Success, DeploymentStatus::Pending]);
}

#[tokio::test]
async fn test_failed_status_lookup_marks_listing_incomplete() {
    let server = MockServer::start().await;
    let route = "/repos/acme/widgets/deployments";

    mount_page(
        &server,
        route,
        "1",
        json!([
            { "id": 1, "environment": "production", "created_at": "2024-01-04T00:00:00Z" },
            { "id": 2, "environment": "production", "created_at": "2024-01-05T00:00:00Z" },
            { "id": 3, "environment": "production", "created_at": "2019-06-01T00:00:00Z" }
        ]),
    )
    .await;
    mount_page(&server, route, "2", json!([])).await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/deployments/1/statuses"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/deployments/2/statuses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "state": "success" }])))
        .expect(1)
        .mount(&server)
        .await;

    // Created before the period, so its status is never looked up.
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/deployments/3/statuses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "state": "success" }])))
        .expect(0)
        .mount(&server)
        .await;

    let filter = EnvironmentFilter::new(Some("production".to_string()), MatchMode::Exact);
    let listing = source(&server, 10).deployments(&repo(), &filter, since()).await.unwrap();

    assert!(listing.incomplete);
    let statuses: Vec<_> = listing.items.iter().map(|d| d.status).collect();
    assert_eq!(statuses, vec![DeploymentStatus::Pending, DeploymentStatus::Success]);
}

#[tokio::test]
async fn test_partial_environment_match_filters_client_side() {
    let server = MockServer::start().await;
    let route = "/repos/acme/widgets/deployments";

    mount_page(
        &server,
        route,
        "1",
        json!([
            { "environment": "production-eu", "created_at": "2024-01-04T00:00:00Z" },
            { "environment": "staging", "created_at": "2024-01-04T00:00:00Z" }
        ]),
    )
    .await;
    mount_page(&server, route, "2", json!([])).await;

    let filter = EnvironmentFilter::new(Some("prod".to_string()), MatchMode::Partial);
    let listing = source(&server, 10).deployments(&repo(), &filter, since()).await.unwrap();

    assert_eq!(listing.items.len(), 1);
    assert_eq!(listing.items[0].environment, "production-eu");
    assert_eq!(listing.items[0].status, DeploymentStatus::Pending);
}

#[tokio::test]
async fn test_workflow_runs_map_to_deployments() {
    let server = MockServer::start().await;
    let route = "/repos/acme/widgets/actions/runs";

    mount_page(
        &server,
        route,
        "1",
        json!({ "total_count": 2, "workflow_runs": [
            { "name": "deploy", "status": "completed", "conclusion": "failure", "created_at": "2024-01-04T00:00:00Z", "updated_at": "2024-01-04T00:05:00Z" },
            { "name": "deploy", "status": "in_progress", "created_at": "2024-01-05T00:00:00Z" }
        ]}),
    )
    .await;
    mount_page(&server, route, "2", json!({ "total_count": 2, "workflow_runs": [] })).await;

    let listing = source(&server, 10).workflow_runs(&repo(), since()).await.unwrap();

    let statuses: Vec<_> = listing.items.iter().map(|d| d.status).collect();
    assert_eq!(statuses, vec![DeploymentStatus::Failure, DeploymentStatus::Pending]);
}

#[tokio::test]
async fn test_truncated_review_listing_marks_detail_incomplete() {
    let server = MockServer::start().await;
    let reviews = "/repos/acme/widgets/pulls/9/reviews";

    mount_page(
        &server,
        reviews,
        "1",
        json!([
            { "state": "COMMENTED", "submitted_at": "2024-01-03T09:00:00Z" },
            { "state": "APPROVED", "submitted_at": "2024-01-03T10:00:00Z" }
        ]),
    )
    .await;

    Mock::given(method("GET"))
        .and(path(reviews))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    mount_page(&server, "/repos/acme/widgets/pulls/9/commits", "1", json!([])).await;
    mount_page(&server, "/repos/acme/widgets/issues/9/timeline", "1", json!([])).await;

    let detail = source(&server, 10).pull_request_detail(&repo(), 9).await.unwrap();

    assert_eq!(detail.reviews.len(), 2);
    assert!(detail.incomplete);
}
