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

//! Balance and transaction services.
//!
//! Services sit between the HTTP boundary and the [`Store`]. They hold no
//! state of their own: each call is one store round trip under a deadline,
//! and every storage failure is logged with the request's correlation id and
//! collapsed into [`ServiceError::Internal`]. Nothing is retried.

use crate::base::{RequestId, UserId};
use crate::error::{ServiceError, StoreError};
use crate::store::Store;
use crate::transaction::{Credit, HistoryQuery, LedgerEntry, TransactionRequest, TransactionStatus};
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Runs one store call under `timeout`, logging and hiding any failure.
pub(crate) async fn guarded<T, F>(
    request_id: RequestId,
    operation: &'static str,
    timeout: Duration,
    call: F,
) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    let result = tokio::time::timeout(timeout, call)
        .await
        .unwrap_or(Err(StoreError::Timeout));

    result.map_err(|err| {
        tracing::error!(%request_id, operation, error = %err, "store call failed");
        ServiceError::Internal
    })
}

#[derive(Clone)]
pub struct BalanceService {
    store: Arc<dyn Store>,
    timeout: Duration,
}

impl BalanceService {
    pub fn new(store: Arc<dyn Store>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Unconditionally credits the user, creating the balance if absent.
    pub async fn credit(&self, request_id: RequestId, credit: Credit) -> Result<(), ServiceError> {
        guarded(request_id, "credit", self.timeout, self.store.credit(&credit)).await
    }

    /// # Errors
    ///
    /// - [`ServiceError::BalanceNotFound`] - the user was never credited.
    /// - [`ServiceError::Internal`] - the store failed or timed out.
    pub async fn balance(
        &self,
        request_id: RequestId,
        user_id: UserId,
    ) -> Result<Decimal, ServiceError> {
        guarded(request_id, "balance", self.timeout, self.store.balance(user_id))
            .await?
            .ok_or(ServiceError::BalanceNotFound)
    }
}

#[derive(Clone)]
pub struct TransactionService {
    store: Arc<dyn Store>,
    timeout: Duration,
}

impl TransactionService {
    pub fn new(store: Arc<dyn Store>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Applies a reserve/confirm/cancel step and passes its status through.
    pub async fn save(
        &self,
        request_id: RequestId,
        request: TransactionRequest,
    ) -> Result<TransactionStatus, ServiceError> {
        let status = guarded(
            request_id,
            "save_transaction",
            self.timeout,
            self.store.save_transaction(&request),
        )
        .await?;

        tracing::debug!(
            %request_id,
            order_id = %request.order_id,
            service_id = %request.service_id,
            transaction_type = request.transaction_type.code(),
            status = status.code(),
            "transaction processed"
        );
        Ok(status)
    }

    pub async fn history(
        &self,
        request_id: RequestId,
        query: HistoryQuery,
    ) -> Result<Vec<LedgerEntry>, ServiceError> {
        guarded(request_id, "transactions", self.timeout, self.store.transactions(&query)).await
    }
}
