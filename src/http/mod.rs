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

//! HTTP boundary.
//!
//! ## Endpoints
//!
//! - `POST /balance` - Credit a user's balance
//! - `GET /balance/{userId}` - Read a user's balance
//! - `POST /transaction` - Reserve, confirm, or cancel funds for an order
//! - `GET /transaction` - Page through a user's transaction history
//! - `POST /report` - Generate a monthly per-service report
//! - `GET /report/{reportId}` - Download a generated report
//! - `GET /swagger` - Interactive API docs, backed by `/api-docs/openapi.json`
//!
//! Every handler follows the same path: parse, validate, call a service,
//! map the result. Client mistakes become 400, a missing balance or report
//! becomes 404, and everything else becomes a generic 500 whose cause is only
//! logged.

pub mod docs;
pub mod dto;
pub mod middleware;

use crate::base::{RequestId, UserId};
use crate::config::Config;
use crate::error::{ServiceError, UnsupportedValue};
use crate::report::{ReportPeriod, ReportService};
use crate::service::{BalanceService, TransactionService};
use crate::store::Store;
use crate::transaction::{Credit, HistoryQuery, TransactionRequest};
use crate::validation::{Validate, ValidationError, validate};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use dto::{
    ApiError, BalanceResponse, CreateReportRequest, CreateReportResponse, GetTransactionsRequest,
    IncreaseBalanceRequest, SaveTransactionRequest, SaveTransactionResponse, TransactionView,
    TransactionsResponse,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// === Application State ===

/// Services shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub balances: BalanceService,
    pub transactions: TransactionService,
    pub reports: ReportService,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: &Config) -> Self {
        let timeout = config.store_timeout();
        Self {
            balances: BalanceService::new(Arc::clone(&store), timeout),
            transactions: TransactionService::new(Arc::clone(&store), timeout),
            reports: ReportService::new(
                store,
                timeout,
                config.report_dir.clone(),
                config.public_url.clone(),
            ),
        }
    }
}

// === Error Handling ===

/// Wrapper for converting [`ServiceError`] into HTTP responses.
#[derive(Debug)]
pub struct AppError(ServiceError);

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::BalanceNotFound | ServiceError::ReportNotFound => StatusCode::NOT_FOUND,
            ServiceError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(ApiError {
                message: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError(ServiceError::Validation(message.into()))
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|_| bad_request("invalid request body"))
}

/// Validates `payload`; rule/field mismatches are logged and hidden.
fn check<T: Validate>(request_id: RequestId, payload: &T) -> Result<(), AppError> {
    validate(payload).map_err(|err| match err {
        ValidationError::Field(message) => bad_request(message),
        ValidationError::Misconfigured { .. } => {
            tracing::error!(%request_id, error = %err, "validation rules misconfigured");
            AppError(ServiceError::Internal)
        }
    })
}

/// A validated payload that still fails conversion is our bug, not the client's.
fn conversion_failure(request_id: RequestId, err: UnsupportedValue) -> AppError {
    tracing::error!(%request_id, error = %err, "validated request failed conversion");
    AppError(ServiceError::Internal)
}

fn parse_path_id<T: std::str::FromStr>(value: &str, name: &str) -> Result<T, AppError> {
    // Only the canonical hyphenated form is accepted, as in body fields.
    if value.len() != 36 {
        return Err(bad_request(format!("parameter {name} should be uuid")));
    }
    value
        .parse()
        .map_err(|_| bad_request(format!("parameter {name} should be uuid")))
}

fn parse_int_param(params: &HashMap<String, String>, name: &str) -> Result<Option<i64>, AppError> {
    params
        .get(name)
        .map(|value| {
            value
                .parse()
                .map_err(|_| bad_request(format!("parameter {name} should be integer")))
        })
        .transpose()
}

// === Handlers ===

/// POST /balance - Credit a user's balance.
#[utoipa::path(
    post,
    path = "/balance",
    tag = "balance",
    request_body = IncreaseBalanceRequest,
    responses(
        (status = 200, description = "Balance credited"),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 500, description = "Internal error", body = ApiError),
    )
)]
async fn increase_balance(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let request: IncreaseBalanceRequest = parse_body(&body)?;
    check(request_id, &request)?;

    let credit = Credit::try_from(request).map_err(|err| conversion_failure(request_id, err))?;
    state.balances.credit(request_id, credit).await?;
    Ok(StatusCode::OK)
}

/// GET /balance/{userId} - Read a user's balance.
#[utoipa::path(
    get,
    path = "/balance/{userId}",
    tag = "balance",
    params(("userId" = String, Path, description = "User id (uuid)")),
    responses(
        (status = 200, description = "Current balance", body = BalanceResponse),
        (status = 400, description = "Invalid user id", body = ApiError),
        (status = 404, description = "Balance not found", body = ApiError),
        (status = 500, description = "Internal error", body = ApiError),
    )
)]
async fn get_balance(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(user_id): Path<String>,
) -> Result<Json<BalanceResponse>, AppError> {
    let user_id: UserId = parse_path_id(&user_id, "userId")?;
    let balance = state.balances.balance(request_id, user_id).await?;
    Ok(Json(BalanceResponse { balance }))
}

/// POST /transaction - Reserve, confirm, or cancel funds.
///
/// Business rejections are not errors: they come back as 200 with a status
/// code describing the outcome.
#[utoipa::path(
    post,
    path = "/transaction",
    tag = "transaction",
    request_body = SaveTransactionRequest,
    responses(
        (status = 200, description = "Outcome status code", body = SaveTransactionResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 500, description = "Internal error", body = ApiError),
    )
)]
async fn save_transaction(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: Bytes,
) -> Result<Json<SaveTransactionResponse>, AppError> {
    let request: SaveTransactionRequest = parse_body(&body)?;
    check(request_id, &request)?;

    let request =
        TransactionRequest::try_from(request).map_err(|err| conversion_failure(request_id, err))?;
    let status = state.transactions.save(request_id, request).await?;
    Ok(Json(SaveTransactionResponse {
        status: status.code(),
    }))
}

/// GET /transaction - Page through a user's history.
#[utoipa::path(
    get,
    path = "/transaction",
    tag = "transaction",
    params(
        ("userId" = String, Query, description = "User id (uuid)"),
        ("page" = i64, Query, description = "1-based page number"),
        ("itemsPerPage" = Option<i64>, Query, description = "Page size, 10 by default"),
        ("sortBy" = Option<String>, Query, description = "`sum` or `date` (default)"),
        ("sortType" = Option<String>, Query, description = "`asc` or `desc` (default)"),
    ),
    responses(
        (status = 200, description = "One page of history", body = TransactionsResponse),
        (status = 400, description = "Invalid parameters", body = ApiError),
        (status = 500, description = "Internal error", body = ApiError),
    )
)]
async fn list_transactions(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<TransactionsResponse>, AppError> {
    let request = GetTransactionsRequest {
        user_id: params.get("userId").cloned(),
        page: parse_int_param(&params, "page")?,
        items_per_page: parse_int_param(&params, "itemsPerPage")?,
        sort_by: params.get("sortBy").cloned(),
        sort_type: params.get("sortType").cloned(),
    };
    check(request_id, &request)?;

    let query = HistoryQuery::try_from(request).map_err(|err| conversion_failure(request_id, err))?;
    let entries = state.transactions.history(request_id, query).await?;
    Ok(Json(TransactionsResponse {
        transactions: entries.into_iter().map(TransactionView::from).collect(),
    }))
}

/// POST /report - Generate a monthly report and return its URL.
#[utoipa::path(
    post,
    path = "/report",
    tag = "report",
    request_body = CreateReportRequest,
    responses(
        (status = 200, description = "Report written", body = CreateReportResponse),
        (status = 400, description = "Invalid period", body = ApiError),
        (status = 500, description = "Internal error", body = ApiError),
    )
)]
async fn create_report(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: Bytes,
) -> Result<Json<CreateReportResponse>, AppError> {
    let request: CreateReportRequest = parse_body(&body)?;
    check(request_id, &request)?;

    let period = request
        .year
        .zip(request.month)
        .and_then(|(year, month)| {
            ReportPeriod::month(i32::try_from(year).ok()?, u32::try_from(month).ok()?)
        })
        .ok_or_else(|| {
            conversion_failure(
                request_id,
                UnsupportedValue::new("report period", format!("{request:?}")),
            )
        })?;

    let url = state.reports.create(request_id, period).await?;
    Ok(Json(CreateReportResponse { url }))
}

/// GET /report/{reportId} - Download a generated report.
#[utoipa::path(
    get,
    path = "/report/{reportId}",
    tag = "report",
    params(("reportId" = String, Path, description = "Report id (uuid) from the report URL")),
    responses(
        (status = 200, description = "`serviceId;total` lines", body = String, content_type = "text/csv"),
        (status = 400, description = "Invalid report id", body = ApiError),
        (status = 404, description = "Report not found", body = ApiError),
        (status = 500, description = "Internal error", body = ApiError),
    )
)]
async fn download_report(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(report_id): Path<String>,
) -> Result<Response, AppError> {
    let report_id: RequestId = parse_path_id(&report_id, "reportId")?;
    let body = state.reports.fetch(request_id, report_id).await?;
    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], body).into_response())
}

// === Router ===

/// Path the OpenAPI document is served at.
pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/balance", post(increase_balance))
        .route("/balance/{userId}", get(get_balance))
        .route("/transaction", post(save_transaction).get(list_transactions))
        .route("/report", post(create_report))
        .route("/report/{reportId}", get(download_report))
        .layer(axum::middleware::from_fn(middleware::request_context))
        // Added after the logging layer so static assets are not logged.
        .merge(SwaggerUi::new("/swagger").url(OPENAPI_PATH, docs::ApiDoc::openapi()))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{Field, Rule};
    use axum::body::to_bytes;

    const MIN_ON_TEXT: &[Rule] = &[Rule::Min(1)];
    const REQUIRED_TEXT: &[Rule] = &[Rule::Required];

    /// A payload whose rule cannot apply to its value kind.
    struct Mislabelled(Option<String>);

    impl Validate for Mislabelled {
        fn fields(&self) -> Vec<Field<'_>> {
            vec![Field::new("name", self.0.as_ref(), MIN_ON_TEXT)]
        }
    }

    struct Named(Option<String>);

    impl Validate for Named {
        fn fields(&self) -> Vec<Field<'_>> {
            vec![Field::new("name", self.0.as_ref(), REQUIRED_TEXT)]
        }
    }

    #[tokio::test]
    async fn misconfigured_rule_is_internal_error() {
        let AppError(err) = check(RequestId::generate(), &Mislabelled(Some("x".into())))
            .unwrap_err();
        assert_eq!(err, ServiceError::Internal);

        let response = AppError(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ApiError = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.message, "internal server error");
    }

    #[test]
    fn field_violation_is_bad_request() {
        let AppError(err) = check(RequestId::generate(), &Named(None)).unwrap_err();
        assert_eq!(err, ServiceError::Validation("field name missing".into()));
        assert_eq!(AppError(err).into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn path_ids_must_be_hyphenated() {
        let result: Result<UserId, _> = parse_path_id("c806ce227ea34402b9799959746bb956", "userId");
        let AppError(err) = result.unwrap_err();
        assert_eq!(
            err,
            ServiceError::Validation("parameter userId should be uuid".into())
        );
    }
}
