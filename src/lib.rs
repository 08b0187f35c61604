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

//! # Balance Service
//!
//! This library provides a balance microservice: per-user balances, fund
//! reservations tied to an (order, service) pair, their confirmation or
//! cancellation, paged transaction history, and monthly per-service reports.
//!
//! ## Core Components
//!
//! - [`Store`]: Storage collaborator owning all durable state, with an
//!   in-memory implementation [`MemoryStore`]
//! - [`Account`]: One user's balance and the reservation state machine
//! - [`TransactionStatus`]: Outcome codes of reserve/confirm/cancel attempts
//! - [`BalanceService`], [`TransactionService`], [`ReportService`]: Store calls
//!   under a deadline, with failures logged and hidden
//! - [`http::router`]: The axum HTTP surface
//!
//! ## Example
//!
//! ```
//! use balance_service::{
//!     Credit, MemoryStore, OrderId, ServiceId, Store, TransactionRequest, TransactionStatus,
//!     TransactionType, UserId,
//! };
//! use rust_decimal_macros::dec;
//! use uuid::Uuid;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let store = MemoryStore::new();
//! let user_id = UserId(Uuid::new_v4());
//! store
//!     .credit(&Credit { user_id, amount: dec!(100.00), comment: None })
//!     .await
//!     .unwrap();
//!
//! // Reserve funds for an order
//! let reserve = TransactionRequest {
//!     order_id: OrderId(Uuid::new_v4()),
//!     user_id,
//!     service_id: ServiceId(Uuid::new_v4()),
//!     amount: dec!(40.00),
//!     transaction_type: TransactionType::Reserve,
//!     comment: None,
//! };
//! assert_eq!(store.save_transaction(&reserve).await.unwrap(), TransactionStatus::Applied);
//! assert_eq!(store.balance(user_id).await.unwrap(), Some(dec!(60.00)));
//! # });
//! ```
//!
//! ## Thread Safety
//!
//! [`MemoryStore`] keeps accounts in a concurrent map, each behind its own
//! lock, so requests for different users proceed in parallel while every
//! transition on one user is serialised.

pub mod account;
mod base;
pub mod config;
pub mod error;
pub mod http;
pub mod report;
pub mod service;
pub mod store;
mod transaction;
pub mod validation;

pub use account::Account;
pub use base::{OrderId, RequestId, ServiceId, UserId};
pub use config::Config;
pub use error::{AmountOverflow, ServiceError, StoreError, UnsupportedValue};
pub use report::{ReportPeriod, ReportRow, ReportService};
pub use service::{BalanceService, TransactionService};
pub use store::{Clock, MemoryStore, Store};
pub use transaction::{
    Credit, EntryKind, HistoryQuery, LedgerEntry, ReservationState, SortDirection, SortField,
    TransactionRequest, TransactionStatus, TransactionType,
};
