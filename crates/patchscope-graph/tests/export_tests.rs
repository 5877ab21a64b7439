//! Export-job protocol tests: create, poll, download, parse, and the
//! failure/timeout paths.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::json;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use patchscope_core::SessionState;
use patchscope_graph::{
    run_export_job_with, Backoff, ExportJobSpec, Gateway, GatewayConfig, GraphError,
};

struct SequencedResponder {
    responses: Vec<ResponseTemplate>,
    hits: Arc<AtomicU32>,
}

impl Respond for SequencedResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let idx = self.hits.fetch_add(1, Ordering::SeqCst) as usize;
        self.responses
            .get(idx)
            .unwrap_or_else(|| self.responses.last().unwrap())
            .clone()
    }
}

fn report_archive(csv: &str) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    let mut header = tar::Header::new_gnu();
    header.set_size(csv.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "DeviceReport.csv", csv.as_bytes())
        .unwrap();
    builder.into_inner().unwrap().finish().unwrap()
}

fn fast_gateway(server: &MockServer) -> Gateway {
    let session = Arc::new(SessionState::new());
    session.connect("tenant-test", &["Reports.Read.All"]);
    let mut config = GatewayConfig::new(server.uri(), "test-token");
    config.backoff = Backoff::new(Duration::from_millis(1), 2.0, Duration::from_millis(8));
    Gateway::new(config, session).unwrap()
}

fn fast_poll() -> Backoff {
    Backoff::new(Duration::from_millis(2), 1.5, Duration::from_millis(8))
}

#[tokio::test]
async fn test_export_job_completes_and_parses_table() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/deviceManagement/reports/exportJobs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "job-1",
            "status": "notStarted",
            "requestDateTime": "2024-03-01T09:30:00Z"
        })))
        .mount(&server)
        .await;

    let poll_hits = Arc::new(AtomicU32::new(0));
    Mock::given(method("GET"))
        .and(path_regex(r"^/deviceManagement/reports/exportJobs.+"))
        .respond_with(SequencedResponder {
            responses: vec![
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "job-1", "status": "inProgress"})),
                ResponseTemplate::new(200).set_body_json(json!({
                    "id": "job-1",
                    "status": "completed",
                    "url": format!("{}/download/job-1.tar.gz", server.uri())
                })),
            ],
            hits: poll_hits.clone(),
        })
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/download/job-1.tar.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(report_archive(
            "DeviceName,UpdateRing\nPC001,Broad\nPC002,Pilot\n",
        )))
        .mount(&server)
        .await;

    let gateway = fast_gateway(&server);
    let spec = ExportJobSpec::new("Devices").with_filter("DeviceId eq 'd-1'");
    let table = run_export_job_with(&gateway, &spec, Duration::from_secs(5), fast_poll())
        .await
        .unwrap();

    assert_eq!(table.columns, vec!["DeviceName", "UpdateRing"]);
    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.cell(0, "UpdateRing"), Some("Broad"));
    assert_eq!(poll_hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_export_job_failed_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/deviceManagement/reports/exportJobs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "job-2",
            "status": "notStarted"
        })))
        .mount(&server)
        .await;

    let poll_hits = Arc::new(AtomicU32::new(0));
    Mock::given(method("GET"))
        .and(path_regex(r"^/deviceManagement/reports/exportJobs.+"))
        .respond_with(SequencedResponder {
            responses: vec![ResponseTemplate::new(200).set_body_json(json!({
                "id": "job-2",
                "status": "failed",
                "statusDetail": "report generation faulted"
            }))],
            hits: poll_hits.clone(),
        })
        .mount(&server)
        .await;

    let gateway = fast_gateway(&server);
    let spec = ExportJobSpec::new("Devices");
    let err = run_export_job_with(&gateway, &spec, Duration::from_secs(5), fast_poll())
        .await
        .unwrap_err();

    match err {
        GraphError::JobFailed { message } => {
            assert_eq!(message, "report generation faulted");
        }
        other => panic!("expected JobFailed, got: {other:?}"),
    }
    // A failed job is terminal: one status read, no further polls.
    assert_eq!(poll_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_export_job_timeout_abandons_job() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/deviceManagement/reports/exportJobs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "job-3",
            "status": "notStarted"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/deviceManagement/reports/exportJobs.+"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": "job-3", "status": "inProgress"})),
        )
        .mount(&server)
        .await;

    let gateway = fast_gateway(&server);
    let spec = ExportJobSpec::new("Devices");
    let err = run_export_job_with(&gateway, &spec, Duration::from_millis(30), fast_poll())
        .await
        .unwrap_err();

    assert!(matches!(err, GraphError::JobTimeout { .. }));
    assert!(err.is_job_timeout());

    // Abandoned means no remote cancellation was attempted.
    let deletes = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "DELETE")
        .count();
    assert_eq!(deletes, 0);
}
