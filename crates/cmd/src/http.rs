// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Retrieval endpoint: `GET|POST /api/records`
//!
//! Both methods take the id from the `id` query parameter, or from the `id`
//! field of a JSON body when the query has none. Backend failures are
//! logged; clients only see a fixed message.

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use diagnostics::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tiering::{Locator, LookupError};

pub const RECORDS_PATH: &str = "/api/records";

/// Response header naming the tier that served the record
pub const TIER_HEADER: &str = "x-record-tier";

#[derive(Clone)]
struct AppState {
    locator: Arc<Locator>,
}

#[derive(Debug, Default, Deserialize)]
struct IdQuery {
    id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
}

#[derive(Debug)]
enum ApiError {
    MissingId,
    Lookup(LookupError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::MissingId => (StatusCode::BAD_REQUEST, "Missing 'id' parameter"),
            ApiError::Lookup(LookupError::BadRequest(_)) => {
                (StatusCode::BAD_REQUEST, "Invalid 'id' parameter")
            }
            ApiError::Lookup(LookupError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "Record not found")
            }
            ApiError::Lookup(LookupError::UpstreamUnavailable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "Internal database error")
            }
            ApiError::Lookup(LookupError::Internal(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

pub fn router(locator: Arc<Locator>) -> Router {
    Router::new()
        .route(RECORDS_PATH, get(find_record).post(find_record))
        .with_state(AppState { locator })
}

async fn find_record(
    State(state): State<AppState>,
    query: Result<Query<IdQuery>, QueryRejection>,
    body: Bytes,
) -> Response {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            debug!("unreadable query string: {error}", error: rejection.body_text());
            return ApiError::MissingId.into_response();
        }
    };
    let id = query.id.filter(|id| !id.is_empty()).or_else(|| body_id(&body));
    respond(&state, id).await
}

/// `id` from a JSON object body; anything unparseable counts as absent
fn body_id(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value.get("id")?.as_str().map(str::to_string)
}

async fn respond(state: &AppState, id: Option<String>) -> Response {
    let Some(id) = id.filter(|id| !id.is_empty()) else {
        return ApiError::MissingId.into_response();
    };
    match state.locator.locate(&id).await {
        Ok(located) => {
            debug!("served {id} from {tier}", id: id.as_str(), tier: located.tier.to_string());
            ([(TIER_HEADER, located.tier.to_string())], Json(located.record)).into_response()
        }
        Err(e) => {
            match &e {
                LookupError::NotFound(_) | LookupError::BadRequest(_) => {
                    debug!(
                        "lookup of {id} rejected: {error}",
                        id: id.as_str(),
                        error: e.to_string()
                    );
                }
                LookupError::UpstreamUnavailable(_) | LookupError::Internal(_) => {
                    error!("lookup of {id} failed: {error}", id: id.as_str(), error: e.to_string());
                }
            }
            ApiError::Lookup(e).into_response()
        }
    }
}
