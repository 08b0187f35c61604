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

//! Request and response bodies.
//!
//! Request DTOs keep every field optional so that a missing field surfaces as
//! a validation message rather than a parse failure. Conversions into domain
//! types assume validation has already passed; a failure there is reported
//! as [`UnsupportedValue`] and treated as an internal error.

use crate::base::{OrderId, ServiceId, UserId};
use crate::error::UnsupportedValue;
use crate::transaction::{
    Credit, HistoryQuery, LedgerEntry, SortDirection, SortField, TransactionRequest,
    TransactionType,
};
use crate::validation::{Field, Rule, Validate};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

const UUID_REQUIRED: &[Rule] = &[Rule::Required, Rule::Uuid];
const POSITIVE_SUM: &[Rule] = &[Rule::Required, Rule::Gt(0)];
const TRANSACTION_TYPE: &[Rule] = &[Rule::Required, Rule::OneOf(&["1", "2", "3"])];
const PAGE: &[Rule] = &[Rule::Required, Rule::Min(1)];
const ITEMS_PER_PAGE: &[Rule] = &[Rule::Min(1)];
const SORT_BY: &[Rule] = &[Rule::OneOf(&SortField::NAMES)];
const SORT_TYPE: &[Rule] = &[Rule::OneOf(&SortDirection::NAMES)];
const YEAR: &[Rule] = &[Rule::Required, Rule::Min(2022), Rule::Max(2100)];
const MONTH: &[Rule] = &[
    Rule::Required,
    Rule::OneOf(&["1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12"]),
];

/// Parses a JSON number through its text so `53.68` stays exactly `53.68`.
fn deserialize_amount<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(number) = Option::<serde_json::Number>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map(Some)
        .map_err(D::Error::custom)
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, UnsupportedValue> {
    value.ok_or_else(|| UnsupportedValue::new("missing field", field))
}

fn parse_id<T: FromStr>(value: Option<&String>, field: &'static str) -> Result<T, UnsupportedValue> {
    let value = required(value, field)?;
    value
        .parse()
        .map_err(|_| UnsupportedValue::new("identifier", value))
}

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ApiError {
    #[schema(example = "field sum should be > 0")]
    pub message: String,
}

// === Balance ===

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IncreaseBalanceRequest {
    #[schema(format = Uuid, required = true)]
    pub user_id: Option<String>,
    /// Amount to credit, greater than zero.
    #[serde(default, deserialize_with = "deserialize_amount")]
    #[schema(required = true, example = 53.68)]
    pub sum: Option<Decimal>,
    pub comment: Option<String>,
}

impl Validate for IncreaseBalanceRequest {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::new("userId", self.user_id.as_ref(), UUID_REQUIRED),
            Field::new("sum", self.sum, POSITIVE_SUM),
        ]
    }
}

impl TryFrom<IncreaseBalanceRequest> for Credit {
    type Error = UnsupportedValue;

    fn try_from(request: IncreaseBalanceRequest) -> Result<Self, Self::Error> {
        Ok(Credit {
            user_id: parse_id(request.user_id.as_ref(), "userId")?,
            amount: required(request.sum, "sum")?,
            comment: request.comment,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct BalanceResponse {
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
}

// === Transactions ===

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveTransactionRequest {
    #[schema(format = Uuid, required = true)]
    pub user_id: Option<String>,
    #[schema(format = Uuid, required = true)]
    pub order_id: Option<String>,
    #[schema(format = Uuid, required = true)]
    pub service_id: Option<String>,
    /// Amount to reserve, greater than zero. Confirm and cancel move the
    /// reserved amount.
    #[serde(default, deserialize_with = "deserialize_amount")]
    #[schema(required = true, example = 345)]
    pub sum: Option<Decimal>,
    /// 1 reserve, 2 confirm, 3 cancel.
    #[schema(required = true, minimum = 1, maximum = 3)]
    pub transaction_type: Option<i64>,
    pub comment: Option<String>,
}

impl Validate for SaveTransactionRequest {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::new("userId", self.user_id.as_ref(), UUID_REQUIRED),
            Field::new("orderId", self.order_id.as_ref(), UUID_REQUIRED),
            Field::new("serviceId", self.service_id.as_ref(), UUID_REQUIRED),
            Field::new("sum", self.sum, POSITIVE_SUM),
            Field::new("transactionType", self.transaction_type, TRANSACTION_TYPE),
        ]
    }
}

impl TryFrom<SaveTransactionRequest> for TransactionRequest {
    type Error = UnsupportedValue;

    fn try_from(request: SaveTransactionRequest) -> Result<Self, Self::Error> {
        Ok(TransactionRequest {
            order_id: parse_id::<OrderId>(request.order_id.as_ref(), "orderId")?,
            user_id: parse_id::<UserId>(request.user_id.as_ref(), "userId")?,
            service_id: parse_id::<ServiceId>(request.service_id.as_ref(), "serviceId")?,
            amount: required(request.sum, "sum")?,
            transaction_type: TransactionType::from_code(required(
                request.transaction_type,
                "transactionType",
            )?)?,
            comment: request.comment,
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct SaveTransactionResponse {
    /// Outcome of the request:
    /// - 1: applied (reservation created, or confirm/cancel done)
    /// - 2: reserve refused, a transaction already exists for this order and service
    /// - 3: reserve refused, insufficient balance
    /// - 4: confirm refused, no such transaction
    /// - 5: confirm refused, already confirmed
    /// - 6: confirm refused, transaction was cancelled
    /// - 7: cancel refused, no such transaction
    /// - 8: cancel refused, already cancelled
    /// - 9: cancel refused, transaction was confirmed
    /// - 10: user has no balance
    #[schema(minimum = 1, maximum = 10)]
    pub status: u8,
}

/// Query parameters of `GET /transaction`, after integer parsing.
#[derive(Debug, Clone, Default)]
pub struct GetTransactionsRequest {
    pub user_id: Option<String>,
    pub page: Option<i64>,
    pub items_per_page: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_type: Option<String>,
}

impl Validate for GetTransactionsRequest {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::new("userId", self.user_id.as_ref(), UUID_REQUIRED),
            Field::new("page", self.page, PAGE),
            Field::new("itemsPerPage", self.items_per_page, ITEMS_PER_PAGE),
            Field::new("sortBy", self.sort_by.as_ref(), SORT_BY),
            Field::new("sortType", self.sort_type.as_ref(), SORT_TYPE),
        ]
    }
}

impl TryFrom<GetTransactionsRequest> for HistoryQuery {
    type Error = UnsupportedValue;

    fn try_from(request: GetTransactionsRequest) -> Result<Self, Self::Error> {
        let to_usize =
            |value: i64| usize::try_from(value).map_err(|_| UnsupportedValue::new("count", value));

        let page = to_usize(required(request.page, "page")?)?;
        let page_size = match request.items_per_page {
            Some(value) => to_usize(value)?,
            None => HistoryQuery::DEFAULT_PAGE_SIZE,
        };
        let sort_by = match request.sort_by.as_deref() {
            Some(name) => name.parse()?,
            None => SortField::default(),
        };
        let direction = match request.sort_type.as_deref() {
            Some(name) => name.parse()?,
            None => SortDirection::default(),
        };

        Ok(HistoryQuery::page(
            parse_id(request.user_id.as_ref(), "userId")?,
            page,
            page_size,
            sort_by,
            direction,
        ))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct TransactionView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<ServiceId>,
    #[serde(with = "rust_decimal::serde::float")]
    pub sum: Decimal,
    /// `deposit`, `reserved`, `confirmed` or `cancelled`.
    pub transaction_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub date: DateTime<Utc>,
}

impl From<LedgerEntry> for TransactionView {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            order_id: entry.order_id,
            service_id: entry.service_id,
            sum: entry.amount,
            transaction_type: entry.kind.label().to_string(),
            comment: entry.comment,
            date: entry.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct TransactionsResponse {
    pub transactions: Vec<TransactionView>,
}

// === Reports ===

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateReportRequest {
    #[schema(required = true, minimum = 2022, maximum = 2100)]
    pub year: Option<i64>,
    #[schema(required = true, minimum = 1, maximum = 12)]
    pub month: Option<i64>,
}

impl Validate for CreateReportRequest {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::new("year", self.year, YEAR),
            Field::new("month", self.month, MONTH),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct CreateReportResponse {
    /// Link the CSV report is served at.
    pub url: String,
}
