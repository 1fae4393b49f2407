use std::time::Duration;

use rama::{
    error::{ErrorContext as _, OpaqueError},
    http::{BodyExtractExt as _, Request, Response, Uri, service::client::HttpClientExt as _},
    service::BoxService,
    telemetry::tracing,
};

use secrecy::{ExposeSecret as _, SecretBox};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use vecpress_lib::Work;

use crate::config::{RequestKind, TargetConfig};

/// Amount of random query vectors generated up front.
const TEST_VECTOR_COUNT: usize = 1000;

/// Issues a single search (or query) request per unit of work.
pub struct SearchWorker {
    client: BoxService<Request, Response, OpaqueError>,
    uri: Uri,
    kind: RequestKind,
    collection: String,
    top_k: usize,
    filter: Option<String>,
    bearer: Option<SecretBox<String>>,
    vectors: Vec<Vec<f32>>,
}

impl std::fmt::Debug for SearchWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchWorker")
            .field("uri", &self.uri)
            .field("kind", &self.kind)
            .field("collection", &self.collection)
            .field("top_k", &self.top_k)
            .field("filter", &self.filter)
            .field("bearer", &self.bearer.as_ref().map(|_| "[REDACTED]"))
            .field("vectors", &self.vectors.len())
            .finish()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchBody<'a> {
    collection_name: &'a str,
    vector: &'a [f32],
    limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryBody<'a> {
    collection_name: &'a str,
    filter: &'a str,
    limit: usize,
}

/// Status envelope of a vector search reply, the payload is ignored.
#[derive(Debug, Default, Deserialize)]
struct SearchReply {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

impl SearchWorker {
    pub fn try_new(
        client: BoxService<Request, Response, OpaqueError>,
        address: &str,
        cfg: &TargetConfig,
    ) -> Result<Self, OpaqueError> {
        if cfg.dim == 0 {
            return Err(OpaqueError::from_display("invalid dim: 0"));
        }
        if cfg.kind == RequestKind::Query && cfg.filter.is_none() {
            return Err(OpaqueError::from_display("query requests require a filter"));
        }

        let uri: Uri = format!("{}{}", address.trim_end_matches('/'), cfg.restful_path())
            .parse()
            .context("parse vector search uri")?;

        Ok(Self {
            client,
            uri,
            kind: cfg.kind,
            collection: cfg.collection.clone(),
            top_k: cfg.top_k,
            filter: cfg.filter.clone(),
            bearer: cfg.credential(),
            vectors: random_test_vectors(TEST_VECTOR_COUNT, cfg.dim),
        })
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    async fn send(&self) -> Result<(), OpaqueError> {
        let mut builder = self.client.post(self.uri.clone());
        if let Some(bearer) = &self.bearer {
            builder = builder.header("Authorization", format!("Bearer {}", bearer.expose_secret()));
        }

        let builder = match self.kind {
            RequestKind::Search => builder.json(&SearchBody {
                collection_name: &self.collection,
                vector: self.random_vector(),
                limit: self.top_k,
                filter: self.filter.as_deref(),
            }),
            RequestKind::Query => builder.json(&QueryBody {
                collection_name: &self.collection,
                filter: self.filter.as_deref().unwrap_or_default(),
                limit: self.top_k,
            }),
        };

        let resp = builder.send().await.context("send vector search request")?;
        let status = resp.status();
        if !status.is_success() {
            return Err(OpaqueError::from_display(format!(
                "unexpected http status: {status}"
            )));
        }

        let body = resp
            .try_into_string()
            .await
            .context("collect vector search response payload")?;

        check_reply(&body)
    }

    fn random_vector(&self) -> &[f32] {
        &self.vectors[rand::random_range(0..self.vectors.len())]
    }
}

impl Work for SearchWorker {
    async fn run(&self) -> Result<Duration, OpaqueError> {
        let start = Instant::now();
        self.send().await?;
        let elapsed = start.elapsed();
        tracing::trace!(?elapsed, kind = ?self.kind, "vector search request done");
        Ok(elapsed)
    }
}

/// Fails for a reply carrying an error code,
/// non json payloads are accepted as is.
fn check_reply(body: &str) -> Result<(), OpaqueError> {
    let reply: SearchReply = serde_json::from_str(body).unwrap_or_default();
    match reply.code {
        None | Some(0) | Some(200) => Ok(()),
        Some(code) => Err(OpaqueError::from_display(format!(
            "vector search failed with code {code}: {}",
            reply.message.as_deref().unwrap_or("no message"),
        ))),
    }
}

fn random_test_vectors(count: usize, dim: usize) -> Vec<Vec<f32>> {
    (0..count)
        .map(|_| (0..dim).map(|_| rand::random::<f32>()).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use rama::{Layer as _, Service as _, layer::MapErrLayer};

    use super::*;
    use crate::{cmd::mock::MockSearchState, config::ServerConfig};

    #[derive(Debug, Parser)]
    struct Cli {
        #[clap(flatten)]
        target: TargetConfig,
    }

    fn target(args: &[&str]) -> TargetConfig {
        Cli::try_parse_from(std::iter::once("vecpress").chain(args.iter().copied()))
            .unwrap()
            .target
    }

    fn mock_client(error_rate: f32) -> BoxService<Request, Response, OpaqueError> {
        let state = MockSearchState::try_new(ServerConfig {
            base_latency: 0.,
            jitter: 0.,
            error_rate,
        })
        .unwrap();
        MapErrLayer::new(OpaqueError::from_std)
            .into_layer(crate::cmd::mock::web_svc(state))
            .boxed()
    }

    #[test]
    fn test_random_test_vectors() {
        let vectors = random_test_vectors(10, 4);
        assert_eq!(10, vectors.len());
        assert!(vectors.iter().all(|v| v.len() == 4));
        assert!(vectors.iter().flatten().all(|f| (0.0..1.0).contains(f)));
    }

    #[test]
    fn test_try_new() {
        let worker = SearchWorker::try_new(
            mock_client(0.),
            "http://127.0.0.1:19530/",
            &target(&["-c", "books", "--dim", "8", "--token", "secret"]),
        )
        .unwrap();
        assert_eq!("http://127.0.0.1:19530/v1/vector/search", worker.uri().to_string());
        assert_eq!(TEST_VECTOR_COUNT, worker.vectors.len());
        assert!(!format!("{worker:?}").contains("secret"));

        assert!(
            SearchWorker::try_new(
                mock_client(0.),
                "http://127.0.0.1:19530",
                &target(&["-c", "books", "--dim", "0"]),
            )
            .is_err()
        );
        assert!(
            SearchWorker::try_new(
                mock_client(0.),
                "http://127.0.0.1:19530",
                &target(&["-c", "books", "--kind", "query"]),
            )
            .is_err()
        );
    }

    #[test]
    fn test_search_body() {
        let vector = [0.5, 0.25];
        let body = serde_json::to_value(SearchBody {
            collection_name: "books",
            vector: &vector,
            limit: 10,
            filter: None,
        })
        .unwrap();
        assert_eq!(
            serde_json::json!({
                "collectionName": "books",
                "vector": [0.5, 0.25],
                "limit": 10,
            }),
            body
        );

        let body = serde_json::to_value(QueryBody {
            collection_name: "books",
            filter: "id > 0",
            limit: 5,
        })
        .unwrap();
        assert_eq!(
            serde_json::json!({
                "collectionName": "books",
                "filter": "id > 0",
                "limit": 5,
            }),
            body
        );
    }

    #[tokio::test]
    async fn test_search_against_mock() {
        let worker = SearchWorker::try_new(
            mock_client(0.),
            "http://vecpress.internal",
            &target(&["-c", "books", "--dim", "16", "--top-k", "3"]),
        )
        .unwrap();
        assert!(worker.run().await.is_ok());
    }

    #[tokio::test]
    async fn test_query_against_mock() {
        let worker = SearchWorker::try_new(
            mock_client(0.),
            "http://vecpress.internal",
            &target(&["-c", "books", "--kind", "query", "--filter", "id in [1, 2]"]),
        )
        .unwrap();
        assert!(worker.run().await.is_ok());
    }

    #[tokio::test]
    async fn test_error_code_is_failure() {
        let worker = SearchWorker::try_new(
            mock_client(1.),
            "http://vecpress.internal",
            &target(&["-c", "books", "--dim", "4"]),
        )
        .unwrap();
        let err = worker.run().await.unwrap_err();
        assert!(err.to_string().contains("500"), "{err}");
    }

    #[tokio::test]
    async fn test_unknown_path_is_failure() {
        let worker = SearchWorker::try_new(
            mock_client(0.),
            "http://vecpress.internal",
            &target(&["-c", "books", "--dim", "4", "--restful-path", "/v9/nope"]),
        )
        .unwrap();
        assert!(worker.run().await.is_err());
    }

    #[test]
    fn test_check_reply() {
        for (payload, ok) in [
            (r#"{"code":0,"data":[]}"#, true),
            (r#"{"code":200,"data":[]}"#, true),
            (r#"{"data":[]}"#, true),
            ("not json", true),
            (r#"{"code":1100,"message":"invalid parameter"}"#, false),
        ] {
            assert_eq!(ok, check_reply(payload).is_ok(), "{payload}");
        }

        let err = check_reply(r#"{"code":1100,"message":"invalid parameter"}"#).unwrap_err();
        assert!(err.to_string().contains("invalid parameter"), "{err}");
    }
}
