use axum::{
    body::{Body, Bytes},
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use crate::server::AppState;
use crate::query::{EmailEntry, LeakReport, LeakService, LeakStream};
use crate::storage::{DbStats, LeakStore, SqliteStore};
use crate::{Error, ErrorKind, QueryKey};

/// Reports buffered between the resolver thread and the HTTP body
const STREAM_BUFFER: usize = 4;

#[derive(Debug, Deserialize, Default)]
pub struct StreamParams {
    /// Emit newline-delimited JSON, one leak per line
    pub stream: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
pub struct DomainParams {
    pub domain: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaksResponse {
    pub leaks: Vec<LeakReport>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(e: &Error) -> ApiError {
    let status = match e.kind() {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if e.is_client_fault() {
        tracing::debug!("Rejected query: {}", e);
    } else {
        tracing::error!("Query failed: {}", e);
    }
    (status, Json(ErrorResponse { error: e.to_string(), kind: e.kind() }))
}

fn join_error(e: tokio::task::JoinError) -> ApiError {
    tracing::error!("Resolver task failed: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: "resolver task failed".to_string(), kind: ErrorKind::Storage }),
    )
}

/// Query-string rejections are validation errors like any other bad input
fn query_params<T>(params: Result<Query<T>, QueryRejection>) -> crate::Result<T> {
    params
        .map(|Query(params)| params)
        .map_err(|rejection| Error::InvalidInput(rejection.body_text()))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<DbStats>, ApiError> {
    let database = state.settings.database.clone();
    let stats = tokio::task::spawn_blocking(move || SqliteStore::open(&database)?.stats())
        .await
        .map_err(join_error)?
        .map_err(|e| api_error(&e))?;
    Ok(Json(stats))
}

pub async fn list_leaks(
    State(state): State<Arc<AppState>>,
    params: Result<Query<StreamParams>, QueryRejection>,
) -> Response {
    respond(state, Ok(QueryKey::All), query_params(params)).await
}

pub async fn get_leaks_by_email(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    params: Result<Query<StreamParams>, QueryRejection>,
) -> Response {
    respond(state, QueryKey::email_address(&address), query_params(params)).await
}

pub async fn get_leaks_by_email_id(
    State(state): State<Arc<AppState>>,
    Path(email_id): Path<String>,
    params: Result<Query<StreamParams>, QueryRejection>,
) -> Response {
    respond(state, QueryKey::email_id(&email_id), query_params(params)).await
}

pub async fn get_leaks_by_domain(
    State(state): State<Arc<AppState>>,
    Path(domain): Path<String>,
    params: Result<Query<StreamParams>, QueryRejection>,
) -> Response {
    respond(state, QueryKey::domain(&domain), query_params(params)).await
}

pub async fn get_leak(
    State(state): State<Arc<AppState>>,
    Path(leak_id): Path<String>,
) -> Result<Json<LeakReport>, ApiError> {
    let key = QueryKey::leak(&leak_id).map_err(|e| api_error(&e))?;
    let report = single_report(&state, key).await?;
    Ok(Json(report))
}

pub async fn get_leak_emails(
    State(state): State<Arc<AppState>>,
    Path(leak_id): Path<String>,
    params: Result<Query<DomainParams>, QueryRejection>,
) -> Result<Json<Vec<EmailEntry>>, ApiError> {
    let key = query_params(params)
        .and_then(|params| QueryKey::domain_and_leak(params.domain.as_deref().unwrap_or_default(), &leak_id))
        .map_err(|e| api_error(&e))?;
    let report = single_report(&state, key).await?;
    Ok(Json(report.emails))
}

async fn single_report(state: &AppState, key: QueryKey) -> Result<LeakReport, ApiError> {
    let reports = buffered(state.settings.database.clone(), key).await?;
    reports.into_iter().next().ok_or_else(|| {
        api_error(&Error::Integrity("single-leak query produced no report".to_string()))
    })
}

async fn respond(
    state: Arc<AppState>,
    key: crate::Result<QueryKey>,
    params: crate::Result<StreamParams>,
) -> Response {
    let (key, params) = match key.and_then(|key| Ok((key, params?))) {
        Ok(parts) => parts,
        Err(e) => return api_error(&e).into_response(),
    };
    let database = state.settings.database.clone();

    if params.stream.unwrap_or(false) {
        streamed(database, key).await
    } else {
        match buffered(database, key).await {
            Ok(leaks) => Json(LeaksResponse { leaks }).into_response(),
            Err(e) => e.into_response(),
        }
    }
}

async fn buffered(database: PathBuf, key: QueryKey) -> Result<Vec<LeakReport>, ApiError> {
    tokio::task::spawn_blocking(move || {
        let store = SqliteStore::open(&database)?;
        LeakService::new(store).query(&key)?.collect_all()
    })
    .await
    .map_err(join_error)?
    .map_err(|e| api_error(&e))
}

/// NDJSON response fed by a resolver running on the blocking pool.
///
/// Errors that decide the whole answer arrive before the headers and get a
/// real status code; a failure mid-stream becomes a final error line.
async fn streamed(database: PathBuf, key: QueryKey) -> Response {
    let (ready_tx, ready_rx) = oneshot::channel();
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);

    tokio::task::spawn_blocking(move || produce(database, key, ready_tx, tx));

    match ready_rx.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return api_error(&e).into_response(),
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse { error: "resolver task failed".to_string(), kind: ErrorKind::Storage }),
            )
                .into_response();
        }
    }

    let lines = futures::stream::unfold(rx, |mut rx| async move {
        let item = rx.recv().await?;
        let line = match item {
            Ok(report) => ndjson_line(&report),
            Err(e) => {
                tracing::error!("Stream aborted: {}", e);
                ndjson_line(&ErrorResponse { error: e.to_string(), kind: e.kind() })
            }
        };
        Some((Ok::<_, Infallible>(line), rx))
    });

    ([(header::CONTENT_TYPE, "application/x-ndjson")], Body::from_stream(lines)).into_response()
}

fn produce(
    database: PathBuf,
    key: QueryKey,
    ready: oneshot::Sender<crate::Result<()>>,
    tx: mpsc::Sender<crate::Result<LeakReport>>,
) {
    let opened = SqliteStore::open(&database).and_then(|store| LeakService::new(store).query(&key));
    let stream = match opened {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        return;
    }

    let remaining = pump(stream, &tx);
    if remaining > 0 {
        tracing::debug!(%key, remaining, "Client went away, stream stopped");
    }
}

/// Send reports until the stream ends or the receiver is dropped.
///
/// Returns how many leaks were never hydrated.
fn pump<S: LeakStore>(mut stream: LeakStream<S>, tx: &mpsc::Sender<crate::Result<LeakReport>>) -> usize {
    // stop before the next hydration once the client is gone
    while !tx.is_closed() {
        let Some(item) = stream.next() else { break };
        if tx.blocking_send(item).is_err() {
            break;
        }
    }
    stream.remaining()
}

fn ndjson_line<T: Serialize>(value: &T) -> Bytes {
    let mut line = serde_json::to_vec(value).unwrap_or_else(|e| {
        serde_json::json!({"error": e.to_string(), "kind": ErrorKind::Storage}).to_string().into_bytes()
    });
    line.push(b'\n');
    Bytes::from(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use tower::ServiceExt;
    use crate::config::Settings;
    use crate::server::build_router;
    use crate::storage::fixtures::{Scenario, Seed, scenario};

    fn stream_of_leaks(count: usize) -> LeakStream<SqliteStore> {
        let store = SqliteStore::open_in_memory().unwrap();
        {
            let seed = Seed::new(&store);
            for i in 0..count {
                seed.leak(&format!("leak-{}", i));
            }
        }
        LeakService::new(store).query(&QueryKey::All).unwrap()
    }

    fn app_with_scenario() -> (tempfile::TempDir, axum::Router, Scenario) {
        let dir = tempfile::tempdir().unwrap();
        let database = dir.path().join("leaks.db");
        let s = {
            let store = SqliteStore::create_at(&database).unwrap();
            scenario(&Seed::new(&store))
        };

        let settings = Settings { database, host: "127.0.0.1".into(), port: 0 };
        let app = build_router(Arc::new(AppState { settings }));
        (dir, app, s)
    }

    async fn get(app: axum::Router, uri: &str) -> (StatusCode, Bytes) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body)
    }

    #[tokio::test]
    async fn test_health() {
        let (_dir, app, _) = app_with_scenario();
        let (status, _) = get(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_list_leaks_buffered() {
        let (_dir, app, _) = app_with_scenario();
        let (status, body) = get(app, "/v1/leaks").await;
        assert_eq!(status, StatusCode::OK);

        let response: LeaksResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(response.leaks.len(), 2);
        let total: u64 = response.leaks.iter().map(|l| l.email_count).sum();
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn test_list_leaks_streamed_matches_buffered() {
        let (_dir, app, _) = app_with_scenario();
        let (_, buffered) = get(app.clone(), "/v1/leaks").await;
        let (status, streamed) = get(app, "/v1/leaks?stream=true").await;
        assert_eq!(status, StatusCode::OK);

        let buffered: LeaksResponse = serde_json::from_slice(&buffered).unwrap();
        let lines: Vec<LeakReport> = std::str::from_utf8(&streamed)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines, buffered.leaks);
    }

    #[tokio::test]
    async fn test_leaks_by_domain_dedups() {
        let (_dir, app, _) = app_with_scenario();
        let (status, body) = get(app, "/v1/domain/x.com/leaks").await;
        assert_eq!(status, StatusCode::OK);

        let response: LeaksResponse = serde_json::from_slice(&body).unwrap();
        let mut names: Vec<_> = response.leaks.iter().map(|l| l.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["L1", "L2"]);
    }

    #[tokio::test]
    async fn test_unknown_domain_is_empty() {
        let (_dir, app, _) = app_with_scenario();
        let (status, body) = get(app, "/v1/domain/none.example/leaks").await;
        assert_eq!(status, StatusCode::OK);
        let response: LeaksResponse = serde_json::from_slice(&body).unwrap();
        assert!(response.leaks.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_email_is_404() {
        let (_dir, app, _) = app_with_scenario();
        let (status, body) = get(app.clone(), "/v1/email/ghost@x.com/leaks").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.kind, ErrorKind::NotFound);

        let (status, _) = get(app, "/v1/email/ghost@x.com/leaks?stream=true").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_id_is_400() {
        let (_dir, app, _) = app_with_scenario();
        let (status, body) = get(app, "/v1/leaks/not-an-id").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_get_leak_and_emails() {
        let (_dir, app, s) = app_with_scenario();

        let (status, body) = get(app.clone(), &format!("/v1/leaks/{}", s.l1)).await;
        assert_eq!(status, StatusCode::OK);
        let report: LeakReport = serde_json::from_slice(&body).unwrap();
        assert_eq!(report.id, s.l1);
        assert_eq!(report.email_count, 2);

        let (status, body) = get(app, &format!("/v1/leaks/{}/emails?domain=x.com", s.l2)).await;
        assert_eq!(status, StatusCode::OK);
        let emails: Vec<EmailEntry> = serde_json::from_slice(&body).unwrap();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].email, "e1@x.com");
    }

    #[tokio::test]
    async fn test_leaks_by_email_id() {
        let (_dir, app, s) = app_with_scenario();
        let (status, body) = get(app, &format!("/v1/emails/{}/leaks", s.e2)).await;
        assert_eq!(status, StatusCode::OK);
        let response: LeaksResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(response.leaks.len(), 1);
        assert_eq!(response.leaks[0].id, s.l1);
    }

    #[tokio::test]
    async fn test_missing_database_is_500() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            database: dir.path().join("missing.db"),
            host: "127.0.0.1".into(),
            port: 0,
        };
        let app = build_router(Arc::new(AppState { settings }));

        let (status, body) = get(app, "/v1/leaks").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.kind, ErrorKind::Storage);
    }

    #[tokio::test]
    async fn test_missing_domain_param_is_validation_error() {
        let (_dir, app, s) = app_with_scenario();
        let (status, body) = get(app, &format!("/v1/leaks/{}/emails", s.l1)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.kind, ErrorKind::Validation);
        assert!(error.error.contains("domain"));
    }

    #[tokio::test]
    async fn test_bad_stream_param_is_validation_error() {
        let (_dir, app, _) = app_with_scenario();
        for uri in ["/v1/leaks?stream=yes", "/v1/domain/x.com/leaks?stream=1"] {
            let (status, body) = get(app.clone(), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
            assert_eq!(error.kind, ErrorKind::Validation);
        }
    }

    #[tokio::test]
    async fn test_padded_address_is_validation_error() {
        let (_dir, app, _) = app_with_scenario();
        let (status, body) = get(app, "/v1/email/%20e1@x.com/leaks").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.kind, ErrorKind::Validation);
    }

    #[test]
    fn test_pump_hydrates_nothing_once_receiver_is_gone() {
        let stream = stream_of_leaks(3);
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        drop(rx);

        assert_eq!(pump(stream, &tx), 3);
    }

    #[test]
    fn test_pump_stops_after_disconnect() {
        let total = STREAM_BUFFER * 4;
        let stream = stream_of_leaks(total);
        let (tx, mut rx) = mpsc::channel(STREAM_BUFFER);

        let producer = std::thread::spawn(move || pump(stream, &tx));
        rx.blocking_recv().unwrap().unwrap();
        drop(rx);

        // one received, a full buffer, and one blocked in send at most
        let remaining = producer.join().unwrap();
        assert!(remaining >= total - (STREAM_BUFFER + 2), "remaining {}", remaining);
    }

    #[test]
    fn test_pump_drains_connected_receiver() {
        let stream = stream_of_leaks(STREAM_BUFFER * 2);
        let (tx, mut rx) = mpsc::channel(STREAM_BUFFER);

        let producer = std::thread::spawn(move || pump(stream, &tx));
        let mut received = 0;
        while let Some(item) = rx.blocking_recv() {
            item.unwrap();
            received += 1;
        }

        assert_eq!(producer.join().unwrap(), 0);
        assert_eq!(received, STREAM_BUFFER * 2);
    }
}
