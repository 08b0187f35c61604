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

//! Storage collaborator.
//!
//! The [`Store`] trait is the only owner of durable state. Services never
//! cache balances or transactions between calls; they invoke a store
//! operation and map its result.
//!
//! # Atomicity
//!
//! [`Store::save_transaction`] must execute the whole reserve/confirm/cancel
//! step atomically for its (order, user, service) key. [`MemoryStore`] takes
//! the user's account lock for the duration of the step, which serialises
//! every transition of that user, and therefore every transition on a key.

use crate::account::Account;
use crate::base::{ServiceId, UserId};
use crate::error::StoreError;
use crate::report::{ReportPeriod, ReportRow};
use crate::transaction::{Credit, HistoryQuery, LedgerEntry, TransactionRequest, TransactionStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Source of timestamps for ledger rows.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Increases the user's balance, creating it if absent.
    async fn credit(&self, credit: &Credit) -> Result<(), StoreError>;

    /// Returns `None` if the user has never been credited.
    async fn balance(&self, user_id: UserId) -> Result<Option<Decimal>, StoreError>;

    /// Atomically applies one reserve/confirm/cancel step.
    async fn save_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<TransactionStatus, StoreError>;

    /// Returns one sorted page of the user's history.
    async fn transactions(&self, query: &HistoryQuery) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Sums confirmed amounts per service within `period`, ordered by service.
    async fn report_rows(&self, period: &ReportPeriod) -> Result<Vec<ReportRow>, StoreError>;
}

/// In-process store backed by a concurrent map of accounts.
///
/// # Invariants
///
/// - An account exists exactly when the user has been credited at least once.
/// - Balances never go negative.
/// - Each (order, user, service) key has at most one reservation row.
pub struct MemoryStore {
    /// Accounts indexed by user ID.
    accounts: DashMap<UserId, Account>,
    clock: Clock,
}

impl MemoryStore {
    /// Creates an empty store stamping rows with the wall clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(Utc::now))
    }

    /// Creates an empty store stamping rows with `clock`.
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            accounts: DashMap::new(),
            clock,
        }
    }

    /// Retrieves an account by user ID.
    pub fn get_account(
        &self,
        user_id: &UserId,
    ) -> Option<dashmap::mapref::one::Ref<'_, UserId, Account>> {
        self.accounts.get(user_id)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn credit(&self, credit: &Credit) -> Result<(), StoreError> {
        let at = self.now();
        let account = self
            .accounts
            .entry(credit.user_id)
            .or_insert_with(|| Account::new(credit.user_id));
        account.credit(credit.amount, credit.comment.clone(), at)?;
        Ok(())
    }

    async fn balance(&self, user_id: UserId) -> Result<Option<Decimal>, StoreError> {
        Ok(self.accounts.get(&user_id).map(|account| account.balance()))
    }

    async fn save_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<TransactionStatus, StoreError> {
        let at = self.now();
        let Some(account) = self.accounts.get(&request.user_id) else {
            return Ok(TransactionStatus::BalanceNotFound);
        };
        Ok(account.apply(request, at)?)
    }

    async fn transactions(&self, query: &HistoryQuery) -> Result<Vec<LedgerEntry>, StoreError> {
        let entries = self
            .accounts
            .get(&query.user_id)
            .map(|account| account.entries())
            .unwrap_or_default();
        Ok(query.apply(entries))
    }

    async fn report_rows(&self, period: &ReportPeriod) -> Result<Vec<ReportRow>, StoreError> {
        let mut totals: BTreeMap<ServiceId, Decimal> = BTreeMap::new();
        for account in self.accounts.iter() {
            account.value().collect_confirmed(period, &mut totals)?;
        }
        Ok(totals
            .into_iter()
            .map(|(service_id, total)| ReportRow { service_id, total })
            .collect())
    }
}
