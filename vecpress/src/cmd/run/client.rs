use std::time::Duration;

use rama::{
    Layer as _, Service as _,
    error::OpaqueError,
    http::{
        Body, Request, Response,
        client::EasyHttpWebClient,
        layer::{
            decompression::DecompressionLayer, map_request_body::MapRequestBodyLayer,
            map_response_body::MapResponseBodyLayer, timeout::TimeoutLayer,
        },
    },
    layer::MapErrLayer,
    service::BoxService,
};

/// HTTP(S) client used to press the target.
///
/// Failed requests are never retried.
pub fn http_client(timeout: Duration) -> BoxService<Request, Response, OpaqueError> {
    let inner_https_client = EasyHttpWebClient::default();
    (
        MapResponseBodyLayer::new(Body::new),
        DecompressionLayer::new(),
        MapErrLayer::new(OpaqueError::from_std),
        TimeoutLayer::new(timeout),
        MapRequestBodyLayer::new(Body::new),
    )
        .into_layer(inner_https_client)
        .boxed()
}
