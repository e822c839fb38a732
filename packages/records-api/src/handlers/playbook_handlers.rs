//! Playbook resource handlers.
//!
//! Playbooks are the parents records point at; only create, list and read
//! are exposed.

use std::fmt::Display;

use hyper::body::{Body, Bytes};
use hyper::{Request, Response, StatusCode};
use serde_json::Value;

use crate::router::{AppState, RouterError, PLAYBOOKS_PATH};
use records_core::serializer::{self, PlaybookPayload};

use super::request_utils::{
    json_response, page_links, parse_id_param, parse_json_body, parse_list_params,
    read_request_body_with_timeout, request_url, with_store, MatchitParams,
};
use super::response::ListResponse;

/// Lists playbooks in id order.
///
/// # Endpoint
/// `GET /api/v1/playbooks`
pub async fn list_playbooks<B>(
    req: Request<B>,
    _params: MatchitParams<'_, '_>,
    state: AppState,
) -> Result<Response<Bytes>, RouterError>
where
    B: Body,
    B::Error: Display,
{
    let params = parse_list_params(req.uri().query(), &state.config)?;
    let (limit, offset) = (params.limit, params.offset);

    let page = with_store(&state, move |db| db.list_playbooks(Some(limit), offset)).await?;

    let base = request_url(&req, PLAYBOOKS_PATH);
    let (next, previous) = page_links(&base, &params, page.count);
    let body = ListResponse {
        count: page.count,
        next,
        previous,
        results: page
            .items
            .iter()
            .map(serializer::render_playbook)
            .collect::<Vec<Value>>(),
    };
    json_response(StatusCode::OK, &body)
}

/// Creates a playbook.
///
/// # Endpoint
/// `POST /api/v1/playbooks`
///
/// # Request Body
/// ```json
/// {"name": "deploy", "path": "/srv/playbooks/deploy.yml"}
/// ```
///
/// # Response
/// - **201 Created**: Returns the created playbook
pub async fn create_playbook<B>(
    req: Request<B>,
    _params: MatchitParams<'_, '_>,
    state: AppState,
) -> Result<Response<Bytes>, RouterError>
where
    B: Body,
    B::Error: Display,
{
    let body_bytes = read_request_body_with_timeout(req, state.config.request_timeout_ms).await?;
    let payload: PlaybookPayload = parse_json_body(&body_bytes)?;

    let playbook = with_store(&state, move |db| serializer::create_playbook(db, payload)).await?;
    tracing::info!(id = playbook.id, "Playbook created");

    json_response(StatusCode::CREATED, &serializer::render_playbook(&playbook))
}

/// Reads a playbook.
///
/// # Endpoint
/// `GET /api/v1/playbooks/{id}`
pub async fn read_playbook<B>(
    _req: Request<B>,
    params: MatchitParams<'_, '_>,
    state: AppState,
) -> Result<Response<Bytes>, RouterError>
where
    B: Body,
    B::Error: Display,
{
    let id = parse_id_param(&params)?;
    let playbook = with_store(&state, move |db| db.get_playbook(id)).await?;
    json_response(StatusCode::OK, &serializer::render_playbook(&playbook))
}
