//! Record resource handlers.

use std::fmt::Display;

use hyper::body::{Body, Bytes};
use hyper::{Request, Response, StatusCode};
use serde_json::Value;

use crate::router::{AppState, RouterError, RECORDS_PATH};
use records_core::query::{RecordOrder, RecordQuery};
use records_core::serializer::{self, RecordPatch, RecordPayload};
use records_core::RecordType;

use super::request_utils::{
    empty_response, json_response, page_links, parse_id_param, parse_json_body,
    parse_list_params, read_request_body_with_timeout, request_url, with_store, ListParams,
    MatchitParams,
};
use super::response::ListResponse;

/// Builds the store query for the filters a record listing understands.
/// Unknown parameters are ignored.
fn record_query(params: &ListParams) -> Result<RecordQuery, RouterError> {
    let mut query = RecordQuery {
        limit: Some(params.limit),
        offset: params.offset,
        ..Default::default()
    };
    for (name, value) in &params.filters {
        match name.as_str() {
            "playbook" => {
                query.playbook = Some(value.parse::<u64>().map_err(|e| {
                    RouterError::BadRequest(format!("Invalid playbook filter '{}': {}", value, e))
                })?);
            }
            "key" => query.key = Some(value.clone()),
            "type" => {
                query.record_type = Some(value.parse::<RecordType>().map_err(|e| {
                    RouterError::BadRequest(format!("Invalid type filter: {}", e))
                })?);
            }
            "order" => {
                query.order = value
                    .parse::<RecordOrder>()
                    .map_err(RouterError::BadRequest)?;
            }
            _ => {}
        }
    }
    Ok(query)
}

/// Lists records.
///
/// # Endpoint
/// `GET /api/v1/records`
///
/// # Query Parameters
/// - `limit`, `offset`: paging
/// - `playbook`, `key`, `type`: equality filters
/// - `order`: one of `id`, `-id`, `key`, `-key`
///
/// # Response
/// - **200 OK**
/// ```json
/// {
///   "count": 1,
///   "next": null,
///   "previous": null,
///   "results": [
///     {"id": 1, "key": "version", "value": "1.2", "type": "text", "playbook": 1}
///   ]
/// }
/// ```
///
/// # Errors
/// - **400 Bad Request**: Malformed paging value or filter
///
/// # Example
/// ```bash
/// curl "http://localhost:8000/api/v1/records?playbook=1&limit=10"
/// ```
pub async fn list_records<B>(
    req: Request<B>,
    _params: MatchitParams<'_, '_>,
    state: AppState,
) -> Result<Response<Bytes>, RouterError>
where
    B: Body,
    B::Error: Display,
{
    let params = parse_list_params(req.uri().query(), &state.config)?;
    let query = record_query(&params)?;

    let page = with_store(&state, move |db| db.list_records(&query)).await?;

    let base = request_url(&req, RECORDS_PATH);
    let (next, previous) = page_links(&base, &params, page.count);
    let body = ListResponse {
        count: page.count,
        next,
        previous,
        results: page.items.iter().map(serializer::render).collect::<Vec<Value>>(),
    };
    json_response(StatusCode::OK, &body)
}

/// Creates a record.
///
/// # Endpoint
/// `POST /api/v1/records`
///
/// # Request Body
/// ```json
/// {"key": "version", "value": "1.2", "type": "text", "playbook": 1}
/// ```
///
/// `value` defaults to `""` and `type` to `"text"`.
///
/// # Response
/// - **201 Created**: Returns the created record
///
/// # Errors
/// - **400 Bad Request**: Malformed JSON, unknown field, failed validation or
///   a `playbook` that does not exist. Validation errors carry per-field
///   messages in `error.details`.
///
/// # Example
/// ```bash
/// curl -X POST http://localhost:8000/api/v1/records \
///   -H "Content-Type: application/json" \
///   -d '{"key": "version", "value": "1.2", "type": "text", "playbook": 1}'
/// ```
pub async fn create_record<B>(
    req: Request<B>,
    _params: MatchitParams<'_, '_>,
    state: AppState,
) -> Result<Response<Bytes>, RouterError>
where
    B: Body,
    B::Error: Display,
{
    let body_bytes = read_request_body_with_timeout(req, state.config.request_timeout_ms).await?;
    let payload: RecordPayload = parse_json_body(&body_bytes)?;

    let record = with_store(&state, move |db| serializer::create(db, payload)).await?;
    tracing::info!(id = record.id, playbook = record.playbook, "Record created");

    json_response(StatusCode::CREATED, &serializer::render(&record))
}

/// Reads a record.
///
/// # Endpoint
/// `GET /api/v1/records/{id}`
///
/// # Errors
/// - **400 Bad Request**: Non-numeric id
/// - **404 Not Found**: Record not found
pub async fn read_record<B>(
    _req: Request<B>,
    params: MatchitParams<'_, '_>,
    state: AppState,
) -> Result<Response<Bytes>, RouterError>
where
    B: Body,
    B::Error: Display,
{
    let id = parse_id_param(&params)?;
    let record = with_store(&state, move |db| db.get_record(id)).await?;
    json_response(StatusCode::OK, &serializer::render(&record))
}

/// Partially updates a record.
///
/// # Endpoint
/// `PATCH /api/v1/records/{id}`
///
/// # Request Body
/// Any subset of `key`, `value`, `type`, `playbook`:
/// ```json
/// {"key": "update"}
/// ```
///
/// # Response
/// - **200 OK**: Returns the updated record
///
/// # Errors
/// - **400 Bad Request**: Non-numeric id, malformed JSON or failed validation
/// - **404 Not Found**: Record not found
///
/// # Notes
/// - Only specified fields are updated
/// - Fields not in the body remain unchanged
pub async fn partial_update_record<B>(
    req: Request<B>,
    params: MatchitParams<'_, '_>,
    state: AppState,
) -> Result<Response<Bytes>, RouterError>
where
    B: Body,
    B::Error: Display,
{
    let id = parse_id_param(&params)?;
    let body_bytes = read_request_body_with_timeout(req, state.config.request_timeout_ms).await?;
    let patch: RecordPatch = parse_json_body(&body_bytes)?;

    let record = with_store(&state, move |db| serializer::update(db, id, patch)).await?;
    tracing::info!(id = record.id, "Record updated");

    json_response(StatusCode::OK, &serializer::render(&record))
}

/// Deletes a record.
///
/// # Endpoint
/// `DELETE /api/v1/records/{id}`
///
/// # Response
/// - **204 No Content**: Record removed
///
/// # Errors
/// - **400 Bad Request**: Non-numeric id
/// - **404 Not Found**: Record not found
///
/// # Example
/// ```bash
/// curl -X DELETE http://localhost:8000/api/v1/records/1
/// ```
pub async fn delete_record<B>(
    _req: Request<B>,
    params: MatchitParams<'_, '_>,
    state: AppState,
) -> Result<Response<Bytes>, RouterError>
where
    B: Body,
    B::Error: Display,
{
    let id = parse_id_param(&params)?;
    with_store(&state, move |db| db.delete_record(id)).await?;
    tracing::info!(id, "Record deleted");

    Ok(empty_response(StatusCode::NO_CONTENT))
}
