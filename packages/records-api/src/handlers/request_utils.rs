//! Request utilities for HTTP endpoints.

use std::fmt::Display;

use http_body_util::BodyExt;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, CONTENT_TYPE, HOST};
use hyper::{Request, Response, StatusCode};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time;

use crate::router::{AppState, RouterError};
use records_core::config::StoreConfig;
use records_core::{Database, DbError, ValidationErrors};

/// Type alias for matchit parameters with explicit lifetimes
pub type MatchitParams<'a, 'b> = matchit::Params<'a, 'b>;

/// Characters escaped in generated pagination links.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Helper function to read request body with timeout
pub async fn read_request_body_with_timeout<B>(
    req: Request<B>,
    timeout_ms: u64,
) -> Result<Bytes, RouterError>
where
    B: Body,
    B::Error: Display,
{
    let timeout_duration = time::Duration::from_millis(timeout_ms);
    let body = time::timeout(timeout_duration, req.into_body().collect())
        .await
        .map_err(|_| RouterError::Timeout)?
        .map_err(|e| RouterError::InternalError(format!("Failed to read request body: {}", e)))?;
    Ok(body.to_bytes())
}

/// Parses a JSON request body. An empty body is read as `{}` so that missing
/// fields are reported by validation instead of as a parse failure.
///
/// A well-formed body that is not a JSON object is a validation failure on
/// `non_field_errors`.
pub fn parse_json_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, RouterError> {
    let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        body
    };
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| RouterError::BadRequest(format!("Failed to parse request: {}", e)))?;
    if !value.is_object() {
        let got = match value {
            serde_json::Value::Array(_) => "list",
            serde_json::Value::String(_) => "str",
            serde_json::Value::Number(_) => "number",
            serde_json::Value::Bool(_) => "bool",
            _ => "null",
        };
        return Err(RouterError::Validation {
            message: "Validation failed".to_string(),
            errors: ValidationErrors::single(
                "non_field_errors",
                format!("Invalid data. Expected a dictionary, but got {}.", got),
            ),
        });
    }
    serde_json::from_value(value)
        .map_err(|e| RouterError::BadRequest(format!("Failed to parse request: {}", e)))
}

/// Absolute URL of `path` on the host the request was addressed to.
///
/// The authority comes from an absolute-form request URI or the `Host`
/// header; without either the bare path is returned.
pub fn request_url<B>(req: &Request<B>, path: &str) -> String {
    let host = req.uri().authority().map(|a| a.as_str()).or_else(|| {
        req.headers()
            .get(HOST)
            .and_then(|value| value.to_str().ok())
            .filter(|host| !host.is_empty())
    });
    match host {
        Some(host) => format!(
            "{}://{}{}",
            req.uri().scheme_str().unwrap_or("http"),
            host,
            path
        ),
        None => path.to_string(),
    }
}

/// Parses the numeric `id` path parameter.
pub fn parse_id_param(params: &MatchitParams<'_, '_>) -> Result<u64, RouterError> {
    let raw = params
        .get("id")
        .ok_or_else(|| RouterError::BadRequest("Missing id".to_string()))?;
    raw.parse()
        .map_err(|e| RouterError::BadRequest(format!("Invalid id '{}': {}", raw, e)))
}

/// Runs a store operation on the blocking pool.
///
/// Mutations hold the store's write lock while the snapshot is written, so
/// they stay off the async workers.
pub async fn with_store<F, T>(state: &AppState, operation: F) -> Result<T, RouterError>
where
    F: FnOnce(&Database) -> Result<T, DbError> + Send + 'static,
    T: Send + 'static,
{
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || operation(&db))
        .await
        .map_err(|e| RouterError::InternalError(format!("Store task failed: {}", e)))?
        .map_err(map_db_error_to_router_error)
}

/// Map DbError to appropriate RouterError
pub fn map_db_error_to_router_error(e: DbError) -> RouterError {
    match e {
        DbError::Validation(errors) => RouterError::Validation {
            message: "Validation failed".to_string(),
            errors,
        },
        DbError::Constraint(errors) => RouterError::Validation {
            message: "Constraint violated".to_string(),
            errors,
        },
        DbError::RecordNotFound { .. } | DbError::PlaybookNotFound { .. } => {
            RouterError::NotFound(e.to_string())
        }
        _ => RouterError::InternalError(format!("Store error: {}", e)),
    }
}

/// Paging and filter parameters of a list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    /// Page size, already capped at the configured maximum
    pub limit: usize,
    /// Rows to skip
    pub offset: usize,
    /// Remaining query pairs, decoded, in request order
    pub filters: Vec<(String, String)>,
}

fn decode_component(raw: &str) -> String {
    percent_decode_str(&raw.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

/// Parse query parameters from URL query string.
pub fn parse_list_params(
    query_str: Option<&str>,
    config: &StoreConfig,
) -> Result<ListParams, RouterError> {
    let mut params = ListParams {
        limit: config.default_page_size,
        offset: 0,
        filters: Vec::new(),
    };

    let Some(query_str) = query_str else {
        return Ok(params);
    };

    for pair in query_str.split('&').filter(|p| !p.is_empty()) {
        let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(raw_key);
        let value = decode_component(raw_value);

        match key.as_str() {
            "limit" => {
                let limit: usize = value.parse().map_err(|e| {
                    RouterError::BadRequest(format!("Invalid limit value '{}': {}", value, e))
                })?;
                if limit == 0 {
                    return Err(RouterError::BadRequest(
                        "Invalid limit value '0': must be positive".to_string(),
                    ));
                }
                params.limit = limit.min(config.max_page_size);
            }
            "offset" => {
                params.offset = value.parse().map_err(|e| {
                    RouterError::BadRequest(format!("Invalid offset value '{}': {}", value, e))
                })?;
            }
            "" => {}
            _ => params.filters.push((key, value)),
        }
    }

    Ok(params)
}

fn page_url(path: &str, params: &ListParams, offset: usize) -> String {
    let mut url = format!("{}?limit={}", path, params.limit);
    if offset > 0 {
        url.push_str(&format!("&offset={}", offset));
    }
    for (key, value) in &params.filters {
        url.push_str(&format!(
            "&{}={}",
            utf8_percent_encode(key, QUERY_VALUE),
            utf8_percent_encode(value, QUERY_VALUE)
        ));
    }
    url
}

/// Builds the `next` and `previous` links for a page of `count` total rows.
/// `base` is the collection URL, usually from [`request_url`].
pub fn page_links(
    base: &str,
    params: &ListParams,
    count: usize,
) -> (Option<String>, Option<String>) {
    let next_offset = params.offset.saturating_add(params.limit);
    let next = (next_offset < count).then(|| page_url(base, params, next_offset));
    let previous = (params.offset > 0)
        .then(|| page_url(base, params, params.offset.saturating_sub(params.limit)));
    (next, previous)
}

/// Serializes `body` into a JSON response
pub fn json_response<T: Serialize>(
    status: StatusCode,
    body: &T,
) -> Result<Response<Bytes>, RouterError> {
    let json = serde_json::to_vec(body)
        .map_err(|e| RouterError::InternalError(format!("Failed to serialize response: {}", e)))?;
    let mut response = Response::new(Bytes::from(json));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}

/// Helper to build empty HTTP response (for 204 No Content)
pub fn empty_response(status: StatusCode) -> Response<Bytes> {
    let mut response = Response::new(Bytes::new());
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_params() {
        let config = StoreConfig::default();

        // Test empty query
        let params = parse_list_params(None, &config).unwrap();
        assert_eq!(params.limit, config.default_page_size);
        assert_eq!(params.offset, 0);
        assert!(params.filters.is_empty());

        // Test limit and offset
        let params = parse_list_params(Some("limit=10&offset=5"), &config).unwrap();
        assert_eq!(params.limit, 10);
        assert_eq!(params.offset, 5);

        // Test filters keep request order and are decoded
        let params =
            parse_list_params(Some("key=hello%20world&playbook=3&order=-id"), &config).unwrap();
        assert_eq!(
            params.filters,
            vec![
                ("key".to_string(), "hello world".to_string()),
                ("playbook".to_string(), "3".to_string()),
                ("order".to_string(), "-id".to_string()),
            ]
        );

        // Test limit is capped
        let params = parse_list_params(Some("limit=999999"), &config).unwrap();
        assert_eq!(params.limit, config.max_page_size);

        // Test invalid limit and offset
        assert!(parse_list_params(Some("limit=abc"), &config).is_err());
        assert!(parse_list_params(Some("limit=0"), &config).is_err());
        assert!(parse_list_params(Some("offset=xyz"), &config).is_err());
    }

    #[test]
    fn test_page_links() {
        let params = ListParams {
            limit: 2,
            offset: 2,
            filters: vec![("key".to_string(), "a b".to_string())],
        };
        let (next, previous) = page_links("/api/v1/records", &params, 5);
        assert_eq!(
            next.as_deref(),
            Some("/api/v1/records?limit=2&offset=4&key=a%20b")
        );
        assert_eq!(previous.as_deref(), Some("/api/v1/records?limit=2&key=a%20b"));

        let params = ListParams {
            limit: 10,
            offset: 0,
            filters: Vec::new(),
        };
        assert_eq!(page_links("/api/v1/records", &params, 3), (None, None));
    }

    #[test]
    fn test_parse_json_body() {
        #[derive(serde::Deserialize)]
        struct Payload {
            key: Option<String>,
        }

        let payload: Payload = parse_json_body(b"  ").unwrap();
        assert!(payload.key.is_none());
        let payload: Payload = parse_json_body(br#"{"key": "k"}"#).unwrap();
        assert_eq!(payload.key.as_deref(), Some("k"));
        assert!(matches!(
            parse_json_body::<Payload>(b"{not json"),
            Err(RouterError::BadRequest(_))
        ));

        match parse_json_body::<Payload>(b"[1, 2]") {
            Err(RouterError::Validation { errors, .. }) => assert_eq!(
                errors.get("non_field_errors").unwrap(),
                ["Invalid data. Expected a dictionary, but got list.".to_string()]
            ),
            other => panic!("expected Validation, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_request_url() {
        let req = Request::builder()
            .uri("/api/v1/records?limit=2")
            .header(HOST, "records.example:8000")
            .body(())
            .unwrap();
        assert_eq!(
            request_url(&req, "/api/v1/records"),
            "http://records.example:8000/api/v1/records"
        );

        let req = Request::builder()
            .uri("https://proxy.example/api/v1/records")
            .body(())
            .unwrap();
        assert_eq!(
            request_url(&req, "/api/v1/records"),
            "https://proxy.example/api/v1/records"
        );

        let req = Request::builder().uri("/api/v1/records").body(()).unwrap();
        assert_eq!(request_url(&req, "/api/v1/records"), "/api/v1/records");
    }

    #[test]
    fn test_map_db_error_to_router_error() {
        assert!(matches!(
            map_db_error_to_router_error(DbError::RecordNotFound { id: 1 }),
            RouterError::NotFound(_)
        ));
        assert!(matches!(
            map_db_error_to_router_error(DbError::PlaybookNotFound { id: 1 }),
            RouterError::NotFound(_)
        ));
        assert!(matches!(
            map_db_error_to_router_error(DbError::Validation(ValidationErrors::single("key", "x"))),
            RouterError::Validation { .. }
        ));
        assert!(matches!(
            map_db_error_to_router_error(DbError::Constraint(ValidationErrors::single(
                "playbook", "x"
            ))),
            RouterError::Validation { .. }
        ));

        for error in [
            DbError::LockPoisoned,
            DbError::SerializationError("test".to_string()),
            DbError::IoError("test".to_string()),
            DbError::DataCorruption("test".to_string()),
        ] {
            let router_error = map_db_error_to_router_error(error);
            match router_error {
                RouterError::InternalError(_) => {
                    assert!(router_error.to_string().contains("Store error"));
                }
                other => panic!("Expected InternalError, got {:?}", other),
            }
        }
    }
}
