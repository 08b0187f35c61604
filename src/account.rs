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

//! Per-user balance and the reservation state machine.
//!
//! # Example
//!
//! ```
//! use balance_service::{Account, UserId};
//! use chrono::Utc;
//! use rust_decimal_macros::dec;
//! use uuid::Uuid;
//!
//! let account = Account::new(UserId(Uuid::new_v4()));
//! account.credit(dec!(10.50), None, Utc::now()).unwrap();
//! assert_eq!(account.balance(), dec!(10.50));
//! ```

use crate::base::{OrderId, ServiceId, UserId};
use crate::error::AmountOverflow;
use crate::report::ReportPeriod;
use crate::transaction::{
    EntryKind, LedgerEntry, ReservationState, TransactionRequest, TransactionStatus,
    TransactionType,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

/// A reservation held against the balance.
///
//  (absent) ──reserve──► Reserved ──confirm──► Confirmed
//                            │
//                            └──cancel───► Cancelled (amount returned)
#[derive(Debug, Clone)]
struct ReservationRecord {
    amount: Decimal,
    state: ReservationState,
    comment: Option<String>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct DepositRecord {
    amount: Decimal,
    comment: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug)]
struct AccountData {
    user_id: UserId,
    /// Spendable balance. Reserved amounts are already subtracted.
    balance: Decimal,
    /// Sum of amounts in the `Reserved` state.
    held: Decimal,
    reservations: HashMap<(OrderId, ServiceId), ReservationRecord>,
    deposits: Vec<DepositRecord>,
}

impl AccountData {
    fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            balance: Decimal::ZERO,
            held: Decimal::ZERO,
            reservations: HashMap::new(),
            deposits: Vec::new(),
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.balance >= Decimal::ZERO,
            "Invariant violated: balance went negative: {}",
            self.balance
        );
        debug_assert!(
            self.held >= Decimal::ZERO,
            "Invariant violated: held amount went negative: {}",
            self.held
        );
    }

    fn reserve(
        &mut self,
        key: (OrderId, ServiceId),
        amount: Decimal,
        comment: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<TransactionStatus, AmountOverflow> {
        // Rows are unique per key, so a finalized reservation also blocks a new one.
        if self.reservations.contains_key(&key) {
            return Ok(TransactionStatus::AlreadyReserved);
        }
        if self.balance < amount {
            return Ok(TransactionStatus::InsufficientFunds);
        }

        let held = self.held.checked_add(amount).ok_or(AmountOverflow)?;
        let balance = self.balance.checked_sub(amount).ok_or(AmountOverflow)?;
        self.balance = balance;
        self.held = held;
        self.reservations.insert(
            key,
            ReservationRecord {
                amount,
                state: ReservationState::Reserved,
                comment,
                updated_at: at,
            },
        );
        self.assert_invariants();
        Ok(TransactionStatus::Applied)
    }

    fn confirm(
        &mut self,
        key: (OrderId, ServiceId),
        comment: Option<String>,
        at: DateTime<Utc>,
    ) -> TransactionStatus {
        let Some(record) = self.reservations.get_mut(&key) else {
            return TransactionStatus::ConfirmNotFound;
        };

        match record.state {
            ReservationState::Confirmed => TransactionStatus::AlreadyConfirmed,
            ReservationState::Cancelled => TransactionStatus::ConfirmOfCancelled,
            ReservationState::Reserved => {
                record.state = ReservationState::Confirmed;
                record.updated_at = at;
                if comment.is_some() {
                    record.comment = comment;
                }
                self.held -= record.amount;
                self.assert_invariants();
                TransactionStatus::Applied
            }
        }
    }

    fn cancel(
        &mut self,
        key: (OrderId, ServiceId),
        comment: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<TransactionStatus, AmountOverflow> {
        let Some(record) = self.reservations.get_mut(&key) else {
            return Ok(TransactionStatus::CancelNotFound);
        };

        match record.state {
            ReservationState::Cancelled => Ok(TransactionStatus::AlreadyCancelled),
            ReservationState::Confirmed => Ok(TransactionStatus::CancelOfConfirmed),
            ReservationState::Reserved => {
                let amount = record.amount;
                let balance = self.balance.checked_add(amount).ok_or(AmountOverflow)?;
                let held = self.held.checked_sub(amount).ok_or(AmountOverflow)?;

                record.state = ReservationState::Cancelled;
                record.updated_at = at;
                if comment.is_some() {
                    record.comment = comment;
                }
                self.held = held;
                self.balance = balance;
                self.assert_invariants();
                Ok(TransactionStatus::Applied)
            }
        }
    }
}

/// One user's balance together with every deposit and reservation made
/// against it.
///
/// All mutation goes through a single lock, so each call is atomic with
/// respect to every other call on the same account.
#[derive(Debug)]
pub struct Account {
    inner: Mutex<AccountData>,
}

impl Account {
    pub fn new(user_id: UserId) -> Self {
        Self {
            inner: Mutex::new(AccountData::new(user_id)),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.inner.lock().user_id
    }

    /// Spendable balance, after subtracting active reservations.
    pub fn balance(&self) -> Decimal {
        self.inner.lock().balance
    }

    /// Total of reservations that are neither confirmed nor cancelled.
    pub fn held(&self) -> Decimal {
        self.inner.lock().held
    }

    /// Adds `amount` to the balance and records a deposit entry.
    ///
    /// Fails without side effects if balance plus held funds would no longer
    /// be representable, so a later cancel can always return its reservation.
    pub fn credit(
        &self,
        amount: Decimal,
        comment: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), AmountOverflow> {
        let mut data = self.inner.lock();
        data.balance
            .checked_add(data.held)
            .and_then(|funds| funds.checked_add(amount))
            .ok_or(AmountOverflow)?;

        data.balance += amount;
        data.deposits.push(DepositRecord {
            amount,
            comment,
            created_at: at,
        });
        data.assert_invariants();
        Ok(())
    }

    /// Runs one reserve/confirm/cancel step and reports its outcome.
    ///
    /// Rejections and overflows leave the account unchanged.
    pub fn apply(
        &self,
        request: &TransactionRequest,
        at: DateTime<Utc>,
    ) -> Result<TransactionStatus, AmountOverflow> {
        let mut data = self.inner.lock();
        debug_assert_eq!(data.user_id, request.user_id);

        let key = (request.order_id, request.service_id);
        let comment = request.comment.clone();

        match request.transaction_type {
            TransactionType::Reserve => data.reserve(key, request.amount, comment, at),
            TransactionType::Confirm => Ok(data.confirm(key, comment, at)),
            TransactionType::Cancel => data.cancel(key, comment, at),
        }
    }

    /// Snapshot of all deposits and reservations, unordered.
    pub fn entries(&self) -> Vec<LedgerEntry> {
        let data = self.inner.lock();

        let deposits = data.deposits.iter().map(|deposit| LedgerEntry {
            order_id: None,
            service_id: None,
            amount: deposit.amount,
            kind: EntryKind::Deposit,
            comment: deposit.comment.clone(),
            updated_at: deposit.created_at,
        });

        let reservations = data
            .reservations
            .iter()
            .map(|((order_id, service_id), record)| LedgerEntry {
                order_id: Some(*order_id),
                service_id: Some(*service_id),
                amount: record.amount,
                kind: record.state.into(),
                comment: record.comment.clone(),
                updated_at: record.updated_at,
            });

        deposits.chain(reservations).collect()
    }

    /// Adds this account's confirmed amounts within `period` to `totals`,
    /// per service.
    ///
    /// Totals span every account, so they can overflow even when each
    /// balance fits.
    pub fn collect_confirmed(
        &self,
        period: &ReportPeriod,
        totals: &mut BTreeMap<ServiceId, Decimal>,
    ) -> Result<(), AmountOverflow> {
        let data = self.inner.lock();
        for ((_, service_id), record) in &data.reservations {
            if record.state == ReservationState::Confirmed && period.contains(record.updated_at) {
                let total = totals.entry(*service_id).or_insert(Decimal::ZERO);
                *total = total.checked_add(record.amount).ok_or(AmountOverflow)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn key() -> (OrderId, ServiceId) {
        (OrderId(Uuid::new_v4()), ServiceId(Uuid::new_v4()))
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 11, 5, 10, 0, 0).unwrap()
    }

    // === AccountData Internal Tests ===

    #[test]
    fn account_data_reserve_moves_funds_to_held() {
        let mut data = AccountData::new(UserId(Uuid::new_v4()));
        data.balance = dec!(100.00);
        let status = data.reserve(key(), dec!(30.00), None, now()).unwrap();
        assert_eq!(status, TransactionStatus::Applied);
        assert_eq!(data.balance, dec!(70.00));
        assert_eq!(data.held, dec!(30.00));
    }

    #[test]
    fn account_data_reserve_exact_balance() {
        let mut data = AccountData::new(UserId(Uuid::new_v4()));
        data.balance = dec!(30.00);
        assert!(data.reserve(key(), dec!(30.00), None, now()).unwrap().is_applied());
        assert_eq!(data.balance, Decimal::ZERO);
    }

    #[test]
    fn account_data_confirm_clears_held() {
        let mut data = AccountData::new(UserId(Uuid::new_v4()));
        data.balance = dec!(100.00);
        let key = key();
        data.reserve(key, dec!(30.00), None, now()).unwrap();
        assert!(data.confirm(key, None, now()).is_applied());
        assert_eq!(data.balance, dec!(70.00));
        assert_eq!(data.held, Decimal::ZERO);
    }

    #[test]
    fn account_data_cancel_returns_funds() {
        let mut data = AccountData::new(UserId(Uuid::new_v4()));
        data.balance = dec!(100.00);
        let key = key();
        data.reserve(key, dec!(30.00), None, now()).unwrap();
        assert!(data.cancel(key, None, now()).unwrap().is_applied());
        assert_eq!(data.balance, dec!(100.00));
        assert_eq!(data.held, Decimal::ZERO);
    }

    #[test]
    fn reserve_on_finalized_key_is_rejected() {
        let mut data = AccountData::new(UserId(Uuid::new_v4()));
        data.balance = dec!(100.00);
        let key = key();
        data.reserve(key, dec!(30.00), None, now()).unwrap();
        data.cancel(key, None, now()).unwrap();

        let status = data.reserve(key, dec!(30.00), None, now()).unwrap();
        assert_eq!(status, TransactionStatus::AlreadyReserved);
        assert_eq!(data.balance, dec!(100.00));
    }

    #[test]
    fn confirm_keeps_comment_when_none_given() {
        let mut data = AccountData::new(UserId(Uuid::new_v4()));
        data.balance = dec!(10);
        let key = key();
        data.reserve(key, dec!(10), Some("order #1".into()), now()).unwrap();
        data.confirm(key, None, now());
        assert_eq!(data.reservations[&key].comment.as_deref(), Some("order #1"));
    }

    // === Account Tests ===

    #[test]
    fn entries_include_deposits_and_reservations() {
        let user_id = UserId(Uuid::new_v4());
        let account = Account::new(user_id);
        account.credit(dec!(50), Some("top up".into()), now()).unwrap();

        let (order_id, service_id) = key();
        let request = TransactionRequest {
            order_id,
            user_id,
            service_id,
            amount: dec!(20),
            transaction_type: TransactionType::Reserve,
            comment: None,
        };
        assert!(account.apply(&request, now()).unwrap().is_applied());

        let entries = account.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.kind == EntryKind::Deposit
            && e.order_id.is_none()
            && e.comment.as_deref() == Some("top up")));
        assert!(entries.iter().any(|e| e.kind == EntryKind::Reserved
            && e.order_id == Some(order_id)
            && e.service_id == Some(service_id)));
        assert_eq!(account.balance(), dec!(30));
        assert_eq!(account.held(), dec!(20));
    }

    #[test]
    fn collect_confirmed_skips_other_states_and_periods() {
        let user_id = UserId(Uuid::new_v4());
        let account = Account::new(user_id);
        account.credit(dec!(100), None, now()).unwrap();
        let service_id = ServiceId(Uuid::new_v4());

        let make = |ty: TransactionType, order: OrderId, at: DateTime<Utc>| {
            let request = TransactionRequest {
                order_id: order,
                user_id,
                service_id,
                amount: dec!(10),
                transaction_type: ty,
                comment: None,
            };
            account.apply(&request, at).unwrap()
        };

        let confirmed = OrderId(Uuid::new_v4());
        let reserved = OrderId(Uuid::new_v4());
        let late = OrderId(Uuid::new_v4());
        make(TransactionType::Reserve, confirmed, now());
        make(TransactionType::Confirm, confirmed, now());
        make(TransactionType::Reserve, reserved, now());
        make(TransactionType::Reserve, late, now());
        make(
            TransactionType::Confirm,
            late,
            Utc.with_ymd_and_hms(2022, 12, 1, 0, 0, 0).unwrap(),
        );

        let mut totals = BTreeMap::new();
        account
            .collect_confirmed(&ReportPeriod::month(2022, 11).unwrap(), &mut totals)
            .unwrap();
        assert_eq!(totals.get(&service_id), Some(&dec!(10)));
    }

    // === Overflow Tests ===

    #[test]
    fn credit_past_decimal_range_is_rejected() {
        let account = Account::new(UserId(Uuid::new_v4()));
        account.credit(Decimal::MAX, None, now()).unwrap();
        assert_eq!(account.credit(dec!(1), None, now()), Err(AmountOverflow));
        assert_eq!(account.balance(), Decimal::MAX);
        assert_eq!(account.entries().len(), 1);
    }

    #[test]
    fn credit_counts_held_funds() {
        let user_id = UserId(Uuid::new_v4());
        let account = Account::new(user_id);
        account.credit(Decimal::MAX, None, now()).unwrap();
        let (order_id, service_id) = key();
        let reserve = TransactionRequest {
            order_id,
            user_id,
            service_id,
            amount: dec!(100),
            transaction_type: TransactionType::Reserve,
            comment: None,
        };
        assert!(account.apply(&reserve, now()).unwrap().is_applied());

        // Balance alone would fit, but the reservation could then never be cancelled.
        assert_eq!(account.credit(dec!(50), None, now()), Err(AmountOverflow));

        let cancel = TransactionRequest {
            transaction_type: TransactionType::Cancel,
            ..reserve
        };
        assert!(account.apply(&cancel, now()).unwrap().is_applied());
        assert_eq!(account.balance(), Decimal::MAX);
    }

    #[test]
    fn collect_confirmed_reports_overflow() {
        let service_id = ServiceId(Uuid::new_v4());
        let mut totals = BTreeMap::from([(service_id, Decimal::MAX)]);

        let user_id = UserId(Uuid::new_v4());
        let account = Account::new(user_id);
        account.credit(dec!(10), None, now()).unwrap();
        let order_id = OrderId(Uuid::new_v4());
        for ty in [TransactionType::Reserve, TransactionType::Confirm] {
            let request = TransactionRequest {
                order_id,
                user_id,
                service_id,
                amount: dec!(10),
                transaction_type: ty,
                comment: None,
            };
            assert!(account.apply(&request, now()).unwrap().is_applied());
        }

        let period = ReportPeriod::month(2022, 11).unwrap();
        assert_eq!(account.collect_confirmed(&period, &mut totals), Err(AmountOverflow));
    }
}
