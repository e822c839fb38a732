//! Matchit routing configuration.

use std::fmt::Display;
use std::sync::Arc;

use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use matchit::Router as MatchitRouter;

use crate::handlers;
use crate::handlers::request_utils::MatchitParams;
use records_core::config::StoreConfig;
use records_core::{Database, ValidationErrors};

/// Collection path of the record resource.
pub const RECORDS_PATH: &str = "/api/v1/records";
/// Collection path of the playbook resource.
pub const PLAYBOOKS_PATH: &str = "/api/v1/playbooks";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Record and playbook store
    pub db: Arc<Database>,
    /// Store and request configuration
    pub config: Arc<StoreConfig>,
}

/// HTTP request router.
pub struct Router {
    inner: MatchitRouter<RouteHandler>,
    state: AppState,
}

impl Router {
    /// Creates a router serving the record and playbook resources.
    pub fn new(db: Arc<Database>, config: Arc<StoreConfig>) -> Result<Self, matchit::InsertError> {
        let mut router = MatchitRouter::new();

        router.insert(RECORDS_PATH, RouteHandler::Record)?;
        router.insert(format!("{}/{{id}}", RECORDS_PATH), RouteHandler::Record)?;

        router.insert(PLAYBOOKS_PATH, RouteHandler::Playbook)?;
        router.insert(format!("{}/{{id}}", PLAYBOOKS_PATH), RouteHandler::Playbook)?;

        Ok(Self {
            inner: router,
            state: AppState { db, config },
        })
    }

    /// Returns the state handed to every handler.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Routes a request to its handler and renders any error as a JSON
    /// error response.
    pub async fn route<B>(&self, req: Request<B>) -> Response<Bytes>
    where
        B: Body,
        B::Error: Display,
    {
        let method = req.method().clone();
        let path = normalize_path(req.uri().path()).to_string();

        let result = match self.inner.at(&path) {
            Ok(matched) => {
                matched
                    .value
                    .handle(req, matched.params, self.state.clone())
                    .await
            }
            Err(_) => Err(RouterError::NotFound(format!("No route found for {}", path))),
        };

        match result {
            Ok(response) => {
                tracing::debug!(%method, %path, status = response.status().as_u16(), "Handled request");
                response
            }
            Err(err) => {
                let status = err.status();
                if status.is_server_error() {
                    tracing::error!(%method, %path, status = status.as_u16(), "{}", err);
                } else {
                    tracing::warn!(%method, %path, status = status.as_u16(), "{}", err);
                }
                err.into()
            }
        }
    }
}

/// Strips trailing slashes so `/api/v1/records/` matches `/api/v1/records`.
fn normalize_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// Resource a route belongs to.
enum RouteHandler {
    Record,
    Playbook,
}

impl RouteHandler {
    /// Handles a request with the given route parameters.
    async fn handle<B>(
        &self,
        req: Request<B>,
        params: MatchitParams<'_, '_>,
        state: AppState,
    ) -> Result<Response<Bytes>, RouterError>
    where
        B: Body,
        B::Error: Display,
    {
        let method = req.method().clone();
        let has_id_param = params.get("id").is_some();
        match self {
            RouteHandler::Record => {
                if method == Method::GET && !has_id_param {
                    handlers::list_records(req, params, state).await
                } else if method == Method::POST && !has_id_param {
                    handlers::create_record(req, params, state).await
                } else if method == Method::GET && has_id_param {
                    handlers::read_record(req, params, state).await
                } else if method == Method::PATCH && has_id_param {
                    handlers::partial_update_record(req, params, state).await
                } else if method == Method::DELETE && has_id_param {
                    handlers::delete_record(req, params, state).await
                } else {
                    Err(RouterError::MethodNotAllowed)
                }
            }
            RouteHandler::Playbook => {
                if method == Method::GET && !has_id_param {
                    handlers::list_playbooks(req, params, state).await
                } else if method == Method::POST && !has_id_param {
                    handlers::create_playbook(req, params, state).await
                } else if method == Method::GET && has_id_param {
                    handlers::read_playbook(req, params, state).await
                } else {
                    Err(RouterError::MethodNotAllowed)
                }
            }
        }
    }
}

/// Router error type.
#[derive(Debug)]
pub enum RouterError {
    MethodNotAllowed,
    InternalError(String),
    Timeout,
    BadRequest(String),
    NotFound(String),
    /// Payload rejected with per-field messages
    Validation {
        message: String,
        errors: ValidationErrors,
    },
}

impl RouterError {
    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            RouterError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RouterError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RouterError::Timeout => StatusCode::REQUEST_TIMEOUT,
            RouterError::BadRequest(_) | RouterError::Validation { .. } => StatusCode::BAD_REQUEST,
            RouterError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl std::fmt::Display for RouterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouterError::MethodNotAllowed => write!(f, "Method Not Allowed"),
            RouterError::InternalError(msg) => write!(f, "Internal Error: {}", msg),
            RouterError::Timeout => write!(f, "Request Timeout"),
            RouterError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            RouterError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            RouterError::Validation { message, errors } => write!(f, "{}: {}", message, errors),
        }
    }
}

impl std::error::Error for RouterError {}

impl From<RouterError> for Response<Bytes> {
    fn from(err: RouterError) -> Self {
        let status = err.status();
        let (message, details) = match err {
            RouterError::MethodNotAllowed => ("Method Not Allowed".to_string(), None),
            RouterError::Timeout => ("Request Timeout".to_string(), None),
            RouterError::InternalError(msg)
            | RouterError::BadRequest(msg)
            | RouterError::NotFound(msg) => (msg, None),
            RouterError::Validation { message, errors } => {
                (message, serde_json::to_value(&errors).ok())
            }
        };

        let error_response = handlers::error_response(status.as_u16(), message, details);
        let body = serde_json::to_vec(&error_response).unwrap_or_else(|e| {
            format!(
                "{{\"success\":false,\"error\":{{\"code\":\"500\",\"message\":\"Failed to serialize error: {}\"}}}}",
                e
            )
            .into_bytes()
        });

        let mut response = Response::new(Bytes::from(body));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }
}
