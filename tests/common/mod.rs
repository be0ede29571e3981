#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};

use gitguardian_extension::error::{Result, ExtensionError};
use gitguardian_extension::pipeline::ScanPipeline;
use gitguardian_extension::proxy::ProxyServer;
use gitguardian_extension::scan::{PolicyBreak, RawMatch, ScanDocument, ScanResult, SecretScanner};

/// A request received by the fake runtime API.
#[derive(Debug, Clone)]
pub struct Posted {
    pub path: String,
    pub headers: HeaderMap,
    pub body: String,
}

pub type PostLog = Arc<Mutex<Vec<Posted>>>;

pub const NEXT_EVENT: &str = r#"{"source":"aws.events","detail":{"id":7}}"#;

/// Start a fake Lambda runtime API and return its `host:port` and the post log.
pub async fn fake_runtime_api() -> (String, PostLog) {
    let log: PostLog = Arc::new(Mutex::new(Vec::new()));

    let app = Router::new()
        .route(
            "/2018-06-01/runtime/invocation/next",
            get(|| async {
                (
                    StatusCode::OK,
                    [
                        ("lambda-runtime-aws-request-id", "req-1"),
                        ("lambda-runtime-deadline-ms", "1700000000000"),
                        ("content-type", "application/json"),
                    ],
                    NEXT_EVENT,
                )
            }),
        )
        .route(
            "/2018-06-01/runtime/invocation/{id}/response",
            post(
                |State(log): State<PostLog>,
                 Path(id): Path<String>,
                 headers: HeaderMap,
                 body: String| async move {
                    log.lock().unwrap().push(Posted {
                        path: format!("invocation/{}/response", id),
                        headers,
                        body,
                    });
                    (StatusCode::ACCEPTED, axum::Json(serde_json::json!({"status": "OK"})))
                },
            ),
        )
        .route(
            "/2018-06-01/runtime/init/error",
            post(
                |State(log): State<PostLog>, headers: HeaderMap, body: String| async move {
                    log.lock().unwrap().push(Posted {
                        path: "init/error".to_string(),
                        headers,
                        body,
                    });
                    (StatusCode::ACCEPTED, axum::Json(serde_json::json!({"status": "OK"})))
                },
            ),
        )
        .route(
            "/2018-06-01/runtime/invocation/{id}/error",
            post(
                |State(log): State<PostLog>,
                 Path(id): Path<String>,
                 headers: HeaderMap,
                 body: String| async move {
                    log.lock().unwrap().push(Posted {
                        path: format!("invocation/{}/error", id),
                        headers,
                        body,
                    });
                    if id == "unknown" {
                        (
                            StatusCode::BAD_REQUEST,
                            axum::Json(serde_json::json!({
                                "errorMessage": "Invalid request ID",
                                "errorType": "InvalidRequestID"
                            })),
                        )
                            .into_response()
                    } else {
                        (StatusCode::ACCEPTED, axum::Json(serde_json::json!({"status": "OK"})))
                            .into_response()
                    }
                },
            ),
        )
        .with_state(log.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr.to_string(), log)
}

/// Start the proxy against `runtime_endpoint` with the given scanner.
pub async fn start_proxy(runtime_endpoint: &str, scanner: Arc<dyn SecretScanner>) -> SocketAddr {
    let pipeline = Arc::new(ScanPipeline::new(scanner));
    let server = ProxyServer::new(
        "127.0.0.1:0".to_string(),
        format!("http://{}/2018-06-01/runtime", runtime_endpoint),
        pipeline,
    );
    server.start().await.unwrap()
}

/// Reports every occurrence of each needle in character indices, the way the
/// multiscan API would.
pub struct NeedleScanner {
    needles: Vec<(String, String)>,
    pub calls: Arc<Mutex<Vec<Vec<ScanDocument>>>>,
}

impl NeedleScanner {
    /// `needles` are `(secret text, detector type)` pairs.
    pub fn new(needles: &[(&str, &str)]) -> Self {
        Self {
            needles: needles
                .iter()
                .map(|(n, t)| (n.to_string(), t.to_string()))
                .collect(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait::async_trait]
impl SecretScanner for NeedleScanner {
    async fn scan(&self, documents: &[ScanDocument]) -> Result<Vec<ScanResult>> {
        self.calls.lock().unwrap().push(documents.to_vec());
        Ok(documents
            .iter()
            .map(|doc| {
                let policy_breaks: Vec<PolicyBreak> = self
                    .needles
                    .iter()
                    .filter_map(|(needle, kind)| {
                        let matches: Vec<RawMatch> = doc
                            .content
                            .match_indices(needle.as_str())
                            .map(|(i, m)| {
                                let start = doc.content[..i].chars().count();
                                RawMatch {
                                    match_type: Some("apikey".to_string()),
                                    matched: Some(m.to_string()),
                                    index_start: Some(start),
                                    index_end: Some(start + m.chars().count() - 1),
                                    ..RawMatch::default()
                                }
                            })
                            .collect();
                        (!matches.is_empty()).then(|| PolicyBreak {
                            break_type: kind.clone(),
                            policy: "Secrets detection".to_string(),
                            matches,
                        })
                    })
                    .collect();
                ScanResult {
                    policy_break_count: policy_breaks.len(),
                    policies: vec!["Secrets detection".to_string()],
                    policy_breaks,
                }
            })
            .collect())
    }

    fn name(&self) -> &str {
        "needle"
    }
}

/// Always fails like an unreachable scanning service.
pub struct FailingScanner;

#[async_trait::async_trait]
impl SecretScanner for FailingScanner {
    async fn scan(&self, _documents: &[ScanDocument]) -> Result<Vec<ScanResult>> {
        Err(ExtensionError::ScanService {
            status: Some(503),
            body: "service unavailable".to_string(),
        })
    }

    fn name(&self) -> &str {
        "failing"
    }
}
