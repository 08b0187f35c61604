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

//! Transaction model.
//!
//! Every reservation is identified by its (order, user, service) triple and
//! follows a terminal state machine:
//! - absent → [`Reserved`](ReservationState::Reserved) (via reserve)
//! - [`Reserved`](ReservationState::Reserved) → [`Confirmed`](ReservationState::Confirmed)
//!   (via confirm) or [`Cancelled`](ReservationState::Cancelled) (via cancel)
//!
//! Any other combination is rejected with a [`TransactionStatus`] code and
//! leaves the ledger untouched.

use crate::base::{OrderId, ServiceId, UserId};
use crate::error::UnsupportedValue;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Requested operation on a reservation, as sent by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionType {
    Reserve,
    Confirm,
    Cancel,
}

impl TransactionType {
    pub const CODES: [i64; 3] = [1, 2, 3];

    pub fn from_code(code: i64) -> Result<Self, UnsupportedValue> {
        match code {
            1 => Ok(Self::Reserve),
            2 => Ok(Self::Confirm),
            3 => Ok(Self::Cancel),
            other => Err(UnsupportedValue::new("transaction type", other)),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Reserve => 1,
            Self::Confirm => 2,
            Self::Cancel => 3,
        }
    }
}

/// Outcome of a reserve/confirm/cancel attempt.
///
/// These are not errors: every variant is reported to the caller as a
/// successful response carrying [`code`](Self::code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
    /// Reservation created, or confirm/cancel applied.
    Applied,
    /// Reserve on a key that already has a transaction.
    AlreadyReserved,
    /// Reserve exceeding the current balance.
    InsufficientFunds,
    ConfirmNotFound,
    AlreadyConfirmed,
    ConfirmOfCancelled,
    CancelNotFound,
    AlreadyCancelled,
    CancelOfConfirmed,
    /// The user has never been credited.
    BalanceNotFound,
}

impl TransactionStatus {
    pub fn code(&self) -> u8 {
        match self {
            Self::Applied => 1,
            Self::AlreadyReserved => 2,
            Self::InsufficientFunds => 3,
            Self::ConfirmNotFound => 4,
            Self::AlreadyConfirmed => 5,
            Self::ConfirmOfCancelled => 6,
            Self::CancelNotFound => 7,
            Self::AlreadyCancelled => 8,
            Self::CancelOfConfirmed => 9,
            Self::BalanceNotFound => 10,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Lifecycle state of a stored reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservationState {
    Reserved,
    Confirmed,
    Cancelled,
}

/// Kind of a ledger entry, as shown in the transaction history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Deposit,
    Reserved,
    Confirmed,
    Cancelled,
}

impl EntryKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Reserved => "reserved",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<ReservationState> for EntryKind {
    fn from(state: ReservationState) -> Self {
        match state {
            ReservationState::Reserved => Self::Reserved,
            ReservationState::Confirmed => Self::Confirmed,
            ReservationState::Cancelled => Self::Cancelled,
        }
    }
}

/// An unconditional credit to a user's balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credit {
    pub user_id: UserId,
    pub amount: Decimal,
    pub comment: Option<String>,
}

/// A reserve, confirm, or cancel request for one (order, user, service) key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub service_id: ServiceId,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub comment: Option<String>,
}

/// One row of a user's transaction history.
///
/// Deposits carry no order or service id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub order_id: Option<OrderId>,
    pub service_id: Option<ServiceId>,
    pub amount: Decimal,
    pub kind: EntryKind,
    pub comment: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    Sum,
    #[default]
    Date,
}

impl SortField {
    pub const NAMES: [&'static str; 2] = ["sum", "date"];
}

impl FromStr for SortField {
    type Err = UnsupportedValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sum" => Ok(Self::Sum),
            "date" => Ok(Self::Date),
            other => Err(UnsupportedValue::new("sort field", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub const NAMES: [&'static str; 2] = ["asc", "desc"];
}

impl FromStr for SortDirection {
    type Err = UnsupportedValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(UnsupportedValue::new("sort direction", other)),
        }
    }
}

/// A page of one user's transaction history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub user_id: UserId,
    pub offset: usize,
    pub limit: usize,
    pub sort_by: SortField,
    pub direction: SortDirection,
}

impl HistoryQuery {
    pub const DEFAULT_PAGE_SIZE: usize = 10;

    /// Builds a query from a 1-based page number.
    ///
    /// A `page` of zero is treated as the first page.
    pub fn page(
        user_id: UserId,
        page: usize,
        page_size: usize,
        sort_by: SortField,
        direction: SortDirection,
    ) -> Self {
        Self {
            user_id,
            offset: page.saturating_sub(1).saturating_mul(page_size),
            limit: page_size,
            sort_by,
            direction,
        }
    }

    /// Orders `entries` in place and returns the requested window.
    pub fn apply(&self, mut entries: Vec<LedgerEntry>) -> Vec<LedgerEntry> {
        entries.sort_by(|a, b| {
            let ordering = match self.sort_by {
                SortField::Sum => a.amount.cmp(&b.amount),
                SortField::Date => a.updated_at.cmp(&b.updated_at),
            };
            match self.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });

        entries
            .into_iter()
            .skip(self.offset)
            .take(self.limit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn entry(amount: Decimal, minute: u32) -> LedgerEntry {
        LedgerEntry {
            order_id: None,
            service_id: None,
            amount,
            kind: EntryKind::Deposit,
            comment: None,
            updated_at: Utc.with_ymd_and_hms(2022, 11, 1, 12, minute, 0).unwrap(),
        }
    }

    #[test]
    fn status_codes_match_protocol() {
        let codes: Vec<u8> = [
            TransactionStatus::Applied,
            TransactionStatus::AlreadyReserved,
            TransactionStatus::InsufficientFunds,
            TransactionStatus::ConfirmNotFound,
            TransactionStatus::AlreadyConfirmed,
            TransactionStatus::ConfirmOfCancelled,
            TransactionStatus::CancelNotFound,
            TransactionStatus::AlreadyCancelled,
            TransactionStatus::CancelOfConfirmed,
            TransactionStatus::BalanceNotFound,
        ]
        .iter()
        .map(TransactionStatus::code)
        .collect();
        assert_eq!(codes, (1..=10).collect::<Vec<u8>>());
    }

    #[test]
    fn transaction_type_codes() {
        for code in TransactionType::CODES {
            assert_eq!(TransactionType::from_code(code).unwrap().code(), code);
        }
        assert!(TransactionType::from_code(4).is_err());
    }

    #[test]
    fn sort_parsing() {
        assert_eq!("sum".parse::<SortField>().unwrap(), SortField::Sum);
        assert_eq!("asc".parse::<SortDirection>().unwrap(), SortDirection::Asc);
        assert!("name".parse::<SortField>().is_err());
        assert_eq!(SortField::default(), SortField::Date);
        assert_eq!(SortDirection::default(), SortDirection::Desc);
    }

    #[test]
    fn page_to_offset() {
        let user = UserId(Uuid::nil());
        let query = HistoryQuery::page(user, 3, 10, SortField::Date, SortDirection::Desc);
        assert_eq!(query.offset, 20);
        assert_eq!(query.limit, 10);
    }

    #[test]
    fn apply_sorts_then_pages() {
        let user = UserId(Uuid::nil());
        let entries = vec![entry(dec!(5), 1), entry(dec!(1), 2), entry(dec!(3), 3)];

        let by_date = HistoryQuery::page(user, 1, 2, SortField::Date, SortDirection::Desc);
        let page = by_date.apply(entries.clone());
        assert_eq!(
            page.iter().map(|e| e.amount).collect::<Vec<_>>(),
            vec![dec!(3), dec!(1)]
        );

        let by_sum = HistoryQuery::page(user, 2, 2, SortField::Sum, SortDirection::Asc);
        let page = by_sum.apply(entries);
        assert_eq!(page.iter().map(|e| e.amount).collect::<Vec<_>>(), vec![dec!(5)]);
    }

    #[test]
    fn entry_labels() {
        assert_eq!(EntryKind::from(ReservationState::Confirmed).label(), "confirmed");
        assert_eq!(EntryKind::Deposit.label(), "deposit");
    }
}
