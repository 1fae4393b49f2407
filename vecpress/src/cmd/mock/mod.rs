use std::{convert::Infallible, sync::Arc, time::Duration};

use rama::{
    Layer as _, Service,
    error::{ErrorContext as _, OpaqueError},
    graceful::ShutdownGuard,
    http::{
        Request, Response,
        layer::trace::TraceLayer,
        server::HttpServer,
        service::web::{
            Router,
            extract::{Json, State},
            response::IntoResponse,
        },
    },
    layer::TimeoutLayer,
    net::socket::Interface,
    rt::Executor,
    tcp::server::TcpListener,
    telemetry::tracing,
};

use clap::Args;
use serde::Deserialize;
use serde_json::json;

use crate::config::{RequestKind, ServerConfig};

/// Upper bound of hits returned for a single request.
const MAX_HITS: usize = 100;

#[derive(Debug, Clone, Args)]
/// run a mock vector search server
pub struct MockCommand {
    #[clap(flatten)]
    config: ServerConfig,

    /// network interface to bind to
    #[arg(
        long,
        short = 'b',
        value_name = "INTERFACE",
        default_value = "127.0.0.1:0"
    )]
    pub bind: Interface,
}

pub async fn exec(guard: ShutdownGuard, args: MockCommand) -> Result<(), OpaqueError> {
    let state = MockSearchState::try_new(args.config)?;

    let exec = Executor::graceful(guard);
    let tcp_listener = TcpListener::bind(args.bind.clone(), exec.clone())
        .await
        .map_err(OpaqueError::from_boxed)
        .context("bind mock vector search http server")?;

    let http_svc = TraceLayer::new_for_http().into_layer(web_svc(state));
    let http_server = HttpServer::auto(exec).service(Arc::new(http_svc));
    let tcp_svc = TimeoutLayer::new(Duration::from_secs(60)).into_layer(http_server);

    let server_addr = tcp_listener
        .local_addr()
        .context("get bound address for mock vector search server")?;
    tracing::info!("mock vector search server listening on: {server_addr}");

    tcp_listener.serve(tcp_svc).await;

    Ok(())
}

pub(crate) fn web_svc(
    state: MockSearchState,
) -> impl Service<Request, Output = Response, Error = Infallible> {
    Router::new_with_state(state)
        .with_post(RequestKind::Search.default_path(), search)
        .with_post(RequestKind::Query.default_path(), query)
}

#[derive(Debug, Clone)]
pub(crate) struct MockSearchState {
    base_latency: f64,
    jitter: f64,
    error_rate: f32,
}

impl MockSearchState {
    pub(crate) fn try_new(cfg: ServerConfig) -> Result<Self, OpaqueError> {
        if !(0.0..=1.0).contains(&cfg.error_rate) {
            return Err(OpaqueError::from_display("error_rate must be within [0, 1]"));
        }

        Ok(Self {
            base_latency: cfg.base_latency.max(0.0),
            jitter: cfg.jitter.max(0.0),
            error_rate: cfg.error_rate,
        })
    }

    fn compute_delay(&self) -> Duration {
        if self.jitter == 0.0 {
            return Duration::from_secs_f64(self.base_latency);
        }

        let span = self.jitter * 2.0;
        let u: f64 = rand::random();
        let delta = (u * span) - self.jitter;

        Duration::from_secs_f64((self.base_latency + delta).max(0.0))
    }

    fn pick_failure(&self) -> bool {
        self.error_rate > 0.0 && rand::random::<f32>() < self.error_rate
    }

    async fn respond(&self, limit: Option<usize>) -> Response {
        let delay = self.compute_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.pick_failure() {
            return Json(json!({
                "code": 500,
                "message": "mock failure",
            }))
            .into_response();
        }

        let hits: Vec<_> = (0..limit.unwrap_or(MAX_HITS).min(MAX_HITS))
            .map(|id| {
                json!({
                    "id": id,
                    "distance": rand::random::<f32>(),
                })
            })
            .collect();
        Json(json!({
            "code": 200,
            "data": hits,
        }))
        .into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MockRequest {
    collection_name: String,
    #[serde(default)]
    vector: Option<Vec<f32>>,
    #[serde(default)]
    filter: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

fn invalid_parameter(message: &str) -> Response {
    Json(json!({
        "code": 1100,
        "message": message,
    }))
    .into_response()
}

async fn search(
    State(state): State<MockSearchState>,
    Json(req): Json<MockRequest>,
) -> impl IntoResponse {
    if req.collection_name.is_empty() {
        return invalid_parameter("missing collectionName");
    }
    if req.vector.as_ref().is_none_or(Vec::is_empty) {
        return invalid_parameter("missing vector");
    }
    state.respond(req.limit).await
}

async fn query(
    State(state): State<MockSearchState>,
    Json(req): Json<MockRequest>,
) -> impl IntoResponse {
    if req.collection_name.is_empty() {
        return invalid_parameter("missing collectionName");
    }
    if req.filter.as_deref().is_none_or(str::is_empty) {
        return invalid_parameter("missing filter");
    }
    state.respond(req.limit).await
}

#[cfg(test)]
mod tests {
    use rama::http::{Body, BodyExtractExt as _, StatusCode};

    use super::*;

    fn state(error_rate: f32) -> MockSearchState {
        MockSearchState::try_new(ServerConfig {
            base_latency: 0.,
            jitter: 0.,
            error_rate,
        })
        .unwrap()
    }

    async fn post(state: MockSearchState, path: &str, body: serde_json::Value) -> serde_json::Value {
        let resp = web_svc(state)
            .serve(
                Request::builder()
                    .method("POST")
                    .uri(format!("http://vecpress.internal{path}"))
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(StatusCode::OK, resp.status());
        serde_json::from_str(&resp.try_into_string().await.unwrap()).unwrap()
    }

    #[test]
    fn test_invalid_error_rate() {
        assert!(
            MockSearchState::try_new(ServerConfig {
                error_rate: 1.5,
                ..Default::default()
            })
            .is_err()
        );
    }

    #[test]
    fn test_compute_delay() {
        let fixed = MockSearchState::try_new(ServerConfig {
            base_latency: 0.25,
            jitter: 0.,
            error_rate: 0.,
        })
        .unwrap();
        assert_eq!(Duration::from_millis(250), fixed.compute_delay());

        let jittered = MockSearchState::try_new(ServerConfig {
            base_latency: 0.01,
            jitter: 0.05,
            error_rate: 0.,
        })
        .unwrap();
        for _ in 0..100 {
            assert!(jittered.compute_delay() <= Duration::from_millis(60));
        }
    }

    #[tokio::test]
    async fn test_search_hits() {
        let reply = post(
            state(0.),
            "/v1/vector/search",
            json!({"collectionName": "books", "vector": [0.1, 0.2], "limit": 3}),
        )
        .await;
        assert_eq!(200, reply["code"]);
        assert_eq!(3, reply["data"].as_array().unwrap().len());
    }

    #[tokio::test]
    async fn test_search_requires_vector() {
        let reply = post(
            state(0.),
            "/v1/vector/search",
            json!({"collectionName": "books", "limit": 3}),
        )
        .await;
        assert_eq!(1100, reply["code"]);
    }

    #[tokio::test]
    async fn test_query_requires_filter() {
        let reply = post(
            state(0.),
            "/v1/vector/query",
            json!({"collectionName": "books", "limit": 3}),
        )
        .await;
        assert_eq!(1100, reply["code"]);

        let reply = post(
            state(0.),
            "/v1/vector/query",
            json!({"collectionName": "books", "filter": "id > 1"}),
        )
        .await;
        assert_eq!(200, reply["code"]);
        assert_eq!(MAX_HITS, reply["data"].as_array().unwrap().len());
    }

    #[tokio::test]
    async fn test_failure_rate() {
        let reply = post(
            state(1.),
            "/v1/vector/search",
            json!({"collectionName": "books", "vector": [0.1], "limit": 3}),
        )
        .await;
        assert_eq!(500, reply["code"]);
    }
}
