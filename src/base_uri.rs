//! Derives the `base_uri` returned by `CREATE_CONSUMER` (§4.3) from a request's forwarding
//! headers. Pure function of header values and the request's own URI; no session or registry
//! state involved, which keeps the priority-order and port-default logic exhaustively unit
//! testable against the §8 table without standing up an HTTP server.

use axum::http::{HeaderMap, Uri};

use crate::error::BridgeError;

/// Scheme and authority a consumer-creation response should use, resolved from forwarding
/// headers or the request's own URI.
struct Origin {
    scheme: String,
    authority: String,
}

/// Builds the full `base_uri` for a newly created consumer instance.
///
/// `request_path` is the path of the CREATE_CONSUMER request itself (e.g.
/// `/consumers/my-group`); the returned URI appends `instances/<name>` to it, after applying any
/// `X-Forwarded-Path` override.
pub fn derive_base_uri(
    headers: &HeaderMap,
    request_uri: &Uri,
    request_path: &str,
    name: &str,
) -> Result<String, BridgeError> {
    let origin = resolve_origin(headers, request_uri)?;
    let path = resolve_path(headers, request_path);

    let path = path.trim_end_matches('/');
    Ok(format!(
        "{}://{}{}/instances/{}",
        origin.scheme, origin.authority, path, name
    ))
}

fn resolve_origin(headers: &HeaderMap, request_uri: &Uri) -> Result<Origin, BridgeError> {
    if let Some(forwarded) = headers.get("forwarded").and_then(|v| v.to_str().ok()) {
        if let Some(origin) = parse_forwarded(forwarded)? {
            return Ok(origin);
        }
    }

    let host = headers
        .get("x-forwarded-host")
        .and_then(|v| v.to_str().ok());
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok());

    if let (Some(host), Some(proto)) = (host, proto) {
        return Ok(Origin {
            scheme: proto.to_string(),
            authority: with_default_port(host, proto)?,
        });
    }

    let scheme = request_uri
        .scheme_str()
        .unwrap_or("http")
        .to_string();
    let authority = request_uri
        .authority()
        .map(|a| a.to_string())
        .unwrap_or_default();

    Ok(Origin { scheme, authority })
}

/// Parses the first `Forwarded` header for `host=`/`proto=` tokens, case-insensitively. Returns
/// `Ok(None)` when either token is absent so the caller falls through to `X-Forwarded-*`.
fn parse_forwarded(value: &str) -> Result<Option<Origin>, BridgeError> {
    let first = value.split(',').next().unwrap_or(value);

    let mut host = None;
    let mut proto = None;

    for pair in first.split(';') {
        let pair = pair.trim();
        let Some((key, val)) = pair.split_once('=') else {
            continue;
        };
        let val = val.trim().trim_matches('"');
        match key.trim().to_ascii_lowercase().as_str() {
            "host" => host = Some(val.to_string()),
            "proto" => proto = Some(val.to_string()),
            _ => {}
        }
    }

    match (host, proto) {
        (Some(host), Some(proto)) => Ok(Some(Origin {
            authority: with_default_port(&host, &proto)?,
            scheme: proto,
        })),
        _ => Ok(None),
    }
}

fn with_default_port(host: &str, proto: &str) -> Result<String, BridgeError> {
    if host.contains(':') {
        return Ok(host.to_string());
    }

    let port = match proto {
        "http" => 80,
        "https" => 443,
        other => {
            return Err(BridgeError::internal(format!(
                "{other} is not a valid schema/proto."
            )))
        }
    };

    Ok(format!("{host}:{port}"))
}

fn resolve_path(headers: &HeaderMap, request_path: &str) -> String {
    headers
        .get("x-forwarded-path")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| request_path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn no_forwarding_uses_request_uri() {
        let headers = HeaderMap::new();
        let result = derive_base_uri(
            &headers,
            &uri("http://localhost:8080/consumers/my-group"),
            "/consumers/my-group",
            "my-consumer",
        )
        .unwrap();
        assert_eq!(
            result,
            "http://localhost:8080/consumers/my-group/instances/my-consumer"
        );
    }

    #[test]
    fn forwarded_header_only() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "forwarded",
            HeaderValue::from_static("host=my-api-gateway-host:443;proto=https"),
        );
        let result = derive_base_uri(
            &headers,
            &uri("http://localhost/consumers/my-group"),
            "/consumers/my-group",
            "my-kafka-consumer",
        )
        .unwrap();
        assert_eq!(
            result,
            "https://my-api-gateway-host:443/consumers/my-group/instances/my-kafka-consumer"
        );
    }

    #[test]
    fn x_forwarded_host_and_proto_only() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-host", HeaderValue::from_static("gw:9000"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        let result = derive_base_uri(
            &headers,
            &uri("http://localhost/consumers/g"),
            "/consumers/g",
            "n",
        )
        .unwrap();
        assert_eq!(result, "https://gw:9000/consumers/g/instances/n");
    }

    #[test]
    fn forwarded_wins_over_x_forwarded_when_both_present() {
        let mut headers = HeaderMap::new();
        headers.insert("forwarded", HeaderValue::from_static("host=a;proto=https"));
        headers.insert("x-forwarded-host", HeaderValue::from_static("b"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));
        let result = derive_base_uri(
            &headers,
            &uri("http://localhost/consumers/g"),
            "/consumers/g",
            "n",
        )
        .unwrap();
        assert!(result.starts_with("https://a:443/"));
    }

    #[test]
    fn only_first_forwarded_header_is_honoured() {
        let mut headers = HeaderMap::new();
        headers.append("forwarded", HeaderValue::from_static("host=first;proto=https"));
        headers.append("forwarded", HeaderValue::from_static("host=second;proto=http"));
        // HeaderMap::get returns the first-inserted value for a repeated header, matching the
        // "only the first is honoured" requirement.
        let result = derive_base_uri(
            &headers,
            &uri("http://localhost/consumers/g"),
            "/consumers/g",
            "n",
        )
        .unwrap();
        assert!(result.starts_with("https://first:443/"));
    }

    #[test]
    fn x_forwarded_path_overrides_request_path() {
        let mut headers = HeaderMap::new();
        headers.insert("forwarded", HeaderValue::from_static("host=gw;proto=https"));
        headers.insert(
            "x-forwarded-path",
            HeaderValue::from_static("/gateway/kafka-bridge/consumers/g"),
        );
        let result = derive_base_uri(
            &headers,
            &uri("http://localhost/consumers/g"),
            "/consumers/g",
            "n",
        )
        .unwrap();
        assert_eq!(
            result,
            "https://gw:443/gateway/kafka-bridge/consumers/g/instances/n"
        );
    }

    #[test]
    fn http_without_port_defaults_to_80() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-host", HeaderValue::from_static("gw"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));
        let result = derive_base_uri(
            &headers,
            &uri("http://localhost/consumers/g"),
            "/consumers/g",
            "n",
        )
        .unwrap();
        assert!(result.starts_with("http://gw:80/"));
    }

    #[test]
    fn https_without_port_defaults_to_443() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-host", HeaderValue::from_static("gw"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        let result = derive_base_uri(
            &headers,
            &uri("http://localhost/consumers/g"),
            "/consumers/g",
            "n",
        )
        .unwrap();
        assert!(result.starts_with("https://gw:443/"));
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert("forwarded", HeaderValue::from_static("host=h;proto=mqtt"));
        let err = derive_base_uri(
            &headers,
            &uri("http://localhost/consumers/g"),
            "/consumers/g",
            "n",
        )
        .unwrap_err();
        match err {
            BridgeError::Internal(message) => {
                assert_eq!(message, "mqtt is not a valid schema/proto.")
            }
            other => panic!("expected Internal, got {other:?}"),
        }
    }
}
