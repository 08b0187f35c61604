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

//! OpenAPI description of the HTTP surface, served through Swagger UI.

use super::dto::{
    ApiError, BalanceResponse, CreateReportRequest, CreateReportResponse, IncreaseBalanceRequest,
    SaveTransactionRequest, SaveTransactionResponse, TransactionView, TransactionsResponse,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Balance Service",
        description = "User balances, fund reservations and monthly per-service reports."
    ),
    paths(
        super::increase_balance,
        super::get_balance,
        super::save_transaction,
        super::list_transactions,
        super::create_report,
        super::download_report,
    ),
    components(schemas(
        ApiError,
        IncreaseBalanceRequest,
        BalanceResponse,
        SaveTransactionRequest,
        SaveTransactionResponse,
        TransactionView,
        TransactionsResponse,
        CreateReportRequest,
        CreateReportResponse,
    )),
    tags(
        (name = "balance", description = "Crediting and reading balances"),
        (name = "transaction", description = "Reservations and their history"),
        (name = "report", description = "Monthly accounting reports"),
    )
)]
pub struct ApiDoc;
