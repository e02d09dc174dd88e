use crate::tracing::RequestId;
use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

/// Header name for the request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Propagates `x-request-id` (or a fresh UUID) into extensions, the task-local
/// scope used by response envelopes, and the response headers.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let header_value = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .and_then(|v| HeaderValue::from_str(v).ok().map(|hv| (v.to_string(), hv)));

    let (request_id, header) = match header_value {
        Some((raw, hv)) => (RequestId::new(raw), hv),
        None => {
            let rid = RequestId::default();
            // UUIDs are always valid header values
            let hv = HeaderValue::from_str(rid.as_str())
                .unwrap_or_else(|_| HeaderValue::from_static("invalid"));
            (rid, hv)
        }
    };

    request
        .headers_mut()
        .insert(HeaderName::from_static(REQUEST_ID_HEADER), header.clone());
    request.extensions_mut().insert(request_id.clone());

    let mut response =
        crate::tracing::scope_request_id(request_id, async move { next.run(request).await }).await;

    response
        .headers_mut()
        .insert(HeaderName::from_static(REQUEST_ID_HEADER), header);

    response
}
