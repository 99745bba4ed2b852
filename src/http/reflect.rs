//! Stateless reflector handlers: header/IP dump and body echo.

use std::fmt::Write;
use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, Request},
    http::{request::Parts, HeaderMap},
};
use futures_util::TryStreamExt;

use crate::http::request::RequestIdExt;
use crate::net::client_addr::{resolve, InboundRequest};
use crate::observability::metrics;

/// `GET /` and `GET /hello`: dump request headers and the caller's IP.
///
/// Always answers `200 OK`; an undeterminable IP renders as an empty value.
pub async fn hello_handler(request: Request) -> String {
    let (mut parts, _body) = request.into_parts();
    let peer = peer_addr(&mut parts).await;
    let inbound = InboundRequest::new(&parts.headers, peer.as_deref());

    let ip = match resolve(&inbound) {
        Ok(resolution) => {
            metrics::record_resolution(resolution.step.as_str());
            tracing::debug!(
                request_id = %parts.headers.request_id(),
                ip = %resolution.address,
                source = resolution.step.as_str(),
                "Client IP resolved"
            );
            resolution.address.into_string()
        }
        Err(e) => {
            metrics::record_resolution("none");
            tracing::debug!(request_id = %parts.headers.request_id(), error = %e, "Client IP unresolved");
            String::new()
        }
    };

    metrics::record_reflect();
    render_reflection(&parts.headers, &ip)
}

/// `POST /echo`: stream the request body straight back.
pub async fn echo_handler(body: Body) -> Body {
    metrics::record_body_echo();
    Body::from_stream(
        body.into_data_stream()
            .inspect_ok(|chunk| metrics::record_body_bytes(chunk.len() as u64)),
    )
}

/// One `name:value` line per header value, then `ip: <ip>`.
pub fn render_reflection(headers: &HeaderMap, ip: &str) -> String {
    let mut out = String::new();
    for (name, value) in headers {
        let _ = writeln!(out, "{}:{}", name, String::from_utf8_lossy(value.as_bytes()));
    }
    let _ = writeln!(out, "ip: {ip}");
    out
}

async fn peer_addr(parts: &mut Parts) -> Option<String> {
    ConnectInfo::<SocketAddr>::from_request_parts(parts, &())
        .await
        .ok()
        .map(|ConnectInfo(addr)| addr.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Bytes};
    use axum::http::HeaderValue;
    use futures_util::stream;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn renders_headers_then_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("accept", HeaderValue::from_static("*/*"));
        headers.append("x-tag", HeaderValue::from_static("a"));
        headers.append("x-tag", HeaderValue::from_static("b"));

        assert_eq!(
            render_reflection(&headers, "192.0.2.1"),
            "accept:*/*\nx-tag:a\nx-tag:b\nip: 192.0.2.1\n"
        );
    }

    #[test]
    fn empty_ip_line() {
        assert_eq!(render_reflection(&HeaderMap::new(), ""), "ip: \n");
    }

    #[tokio::test]
    async fn echo_counts_every_chunk() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let _guard = ::metrics::set_default_local_recorder(&recorder);

        let chunks = vec![
            Ok::<_, std::io::Error>(Bytes::from_static(b"abc")),
            Ok(Bytes::from_static(b"defgh")),
        ];
        let echoed = echo_handler(Body::from_stream(stream::iter(chunks))).await;
        let bytes = to_bytes(echoed, usize::MAX).await.unwrap();

        assert_eq!(bytes.as_ref(), b"abcdefgh");
        let rendered = handle.render();
        assert!(rendered.contains("echo_body_requests_total 1\n"), "{rendered}");
        assert!(rendered.contains("echo_body_bytes_total 8\n"), "{rendered}");
    }
}
