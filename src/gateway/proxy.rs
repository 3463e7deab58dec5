//! Request relay from the gateway to an upstream service.

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName},
    response::Response,
};

use crate::error::ApiError;
use crate::gateway::GatewayState;

/// Headers that describe one connection and never cross the proxy
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

fn forwarded_request_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        // Host belongs to the upstream URL; the body is re-framed by the client
        if is_hop_by_hop(name)
            || name == header::HOST
            || name == header::CONTENT_LENGTH
            || name == header::ACCEPT_ENCODING
        {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

/// Fallback handler: relay the request to the service owning its path
pub async fn forward(State(state): State<GatewayState>, request: Request) -> Result<Response, ApiError> {
    let path = request.uri().path().to_string();
    let upstream = state.routes.resolve(&path).ok_or_else(|| {
        tracing::debug!("No route for {}", path);
        ApiError::not_found(format!("No route for {}", path))
    })?;

    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.clone());
    let url = format!("{}{}", upstream.base_url, path_and_query);

    let (parts, body) = request.into_parts();
    let body = to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|_| ApiError::payload_too_large("Request body is too large"))?;

    tracing::debug!("{} {} -> {}", parts.method, path, upstream.service);
    let upstream_response = state
        .http
        .request(parts.method.clone(), &url)
        .headers(forwarded_request_headers(&parts.headers))
        .body(body)
        .send()
        .await
        .map_err(|e| {
            tracing::error!("{} {} failed at {}: {}", parts.method, path, upstream.service, e);
            ApiError::bad_gateway(format!("The {} service is unavailable", upstream.service))
        })?;

    let status = upstream_response.status();
    let headers = upstream_response.headers().clone();
    let bytes = upstream_response.bytes().await.map_err(|e| {
        tracing::error!("Reading {} response for {} failed: {}", upstream.service, path, e);
        ApiError::bad_gateway(format!("The {} service is unavailable", upstream.service))
    })?;

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    for (name, value) in &headers {
        if is_hop_by_hop(name) || name == header::CONTENT_LENGTH {
            continue;
        }
        response.headers_mut().append(name.clone(), value.clone());
    }
    Ok(response)
}
