// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Request correlation and request/response logging.

use crate::base::RequestId;
use crate::http::dto::ApiError;
use axum::Json;
use axum::body::{Body, to_bytes};
use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

/// Response header carrying the request's correlation id.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Largest request body accepted and logged.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Tags the request with a fresh [`RequestId`] and logs both directions.
///
/// Handlers read the id back through `Extension<RequestId>`.
pub async fn request_context(mut request: Request, next: Next) -> Response {
    let request_id = RequestId::generate();
    request.extensions_mut().insert(request_id);

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(%request_id, error = %err, "failed to read request body");
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiError {
                    message: "invalid request body".to_string(),
                }),
            )
                .into_response();
        }
    };

    tracing::info!(
        %request_id,
        method = %parts.method,
        uri = %parts.uri,
        body = %String::from_utf8_lossy(&bytes),
        "request"
    );

    let response = next.run(Request::from_parts(parts, Body::from(bytes))).await;

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(%request_id, error = %err, "failed to read response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    tracing::info!(
        %request_id,
        status = parts.status.as_u16(),
        body = %String::from_utf8_lossy(&bytes),
        "response"
    );

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        parts.headers.insert(REQUEST_ID_HEADER, value);
    }
    Response::from_parts(parts, Body::from(bytes))
}
