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

//! Property-based tests for the reservation state machine.
//!
//! These tests verify invariants that should hold for any sequence of
//! reserve, confirm, and cancel requests against one account.

use balance_service::{
    Account, OrderId, ServiceId, TransactionRequest, TransactionStatus, TransactionType, UserId,
};
use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

// =============================================================================
// Arbitrary Strategies
// =============================================================================

/// Generate a positive amount (0.0001 to 1000 with 4 decimal places).
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..=10_000_000i64).prop_map(|units| Decimal::new(units, 4))
}

fn arb_type() -> impl Strategy<Value = TransactionType> {
    prop_oneof![
        Just(TransactionType::Reserve),
        Just(TransactionType::Confirm),
        Just(TransactionType::Cancel),
    ]
}

/// A step: which of a few fixed keys, what type, what amount.
fn arb_step() -> impl Strategy<Value = (usize, TransactionType, Decimal)> {
    (0usize..4, arb_type(), arb_amount())
}

struct Fixture {
    user_id: UserId,
    keys: Vec<(OrderId, ServiceId)>,
    account: Account,
}

impl Fixture {
    fn new(initial: Decimal) -> Self {
        let user_id = UserId(Uuid::new_v4());
        let account = Account::new(user_id);
        account.credit(initial, None, Utc::now()).unwrap();
        Self {
            user_id,
            keys: (0..4)
                .map(|_| (OrderId(Uuid::new_v4()), ServiceId(Uuid::new_v4())))
                .collect(),
            account,
        }
    }

    fn send(&self, key: usize, ty: TransactionType, amount: Decimal) -> TransactionStatus {
        let (order_id, service_id) = self.keys[key];
        self.account.apply(
            &TransactionRequest {
                order_id,
                user_id: self.user_id,
                service_id,
                amount,
                transaction_type: ty,
                comment: None,
            },
            Utc::now(),
        )
        .unwrap()
    }
}

// =============================================================================
// Balance Invariants
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Reserve followed by cancel restores the balance exactly.
    #[test]
    fn reserve_cancel_round_trip(
        initial in arb_amount(),
        amount in arb_amount(),
    ) {
        let fixture = Fixture::new(initial);
        let status = fixture.send(0, TransactionType::Reserve, amount);

        if amount <= initial {
            prop_assert_eq!(status, TransactionStatus::Applied);
            prop_assert_eq!(fixture.account.balance(), initial - amount);
            prop_assert_eq!(fixture.send(0, TransactionType::Cancel, amount), TransactionStatus::Applied);
        } else {
            prop_assert_eq!(status, TransactionStatus::InsufficientFunds);
        }

        prop_assert_eq!(fixture.account.balance(), initial);
        prop_assert_eq!(fixture.account.held(), Decimal::ZERO);
    }

    /// Balance and held amount never go negative.
    #[test]
    fn balance_never_negative(
        initial in arb_amount(),
        steps in prop::collection::vec(arb_step(), 0..40),
    ) {
        let fixture = Fixture::new(initial);
        for (key, ty, amount) in steps {
            fixture.send(key, ty, amount);
            prop_assert!(fixture.account.balance() >= Decimal::ZERO);
            prop_assert!(fixture.account.held() >= Decimal::ZERO);
        }
    }

    /// Every unit credited is either spendable, held, or confirmed.
    #[test]
    fn funds_are_conserved(
        initial in arb_amount(),
        steps in prop::collection::vec(arb_step(), 0..40),
    ) {
        let fixture = Fixture::new(initial);
        let mut confirmed = Decimal::ZERO;
        let mut reserved = [None::<Decimal>; 4];

        for (key, ty, amount) in steps {
            let status = fixture.send(key, ty, amount);
            if status.is_applied() {
                match ty {
                    TransactionType::Reserve => reserved[key] = Some(amount),
                    TransactionType::Confirm => confirmed += reserved[key].unwrap(),
                    TransactionType::Cancel => {}
                }
            }
        }

        prop_assert_eq!(
            fixture.account.balance() + fixture.account.held() + confirmed,
            initial
        );
    }
}

// =============================================================================
// Protocol Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Only a `Reserved` row accepts confirm or cancel; afterwards both are rejected.
    #[test]
    fn finalized_rows_are_terminal(
        amount in arb_amount(),
        finalize in prop_oneof![Just(TransactionType::Confirm), Just(TransactionType::Cancel)],
        follow_up in arb_type(),
    ) {
        let fixture = Fixture::new(amount);
        prop_assert!(fixture.send(0, TransactionType::Reserve, amount).is_applied());
        prop_assert!(fixture.send(0, finalize, amount).is_applied());

        let balance = fixture.account.balance();
        let status = fixture.send(0, follow_up, amount);

        let expected = match (finalize, follow_up) {
            (_, TransactionType::Reserve) => TransactionStatus::AlreadyReserved,
            (TransactionType::Confirm, TransactionType::Confirm) => TransactionStatus::AlreadyConfirmed,
            (TransactionType::Confirm, TransactionType::Cancel) => TransactionStatus::CancelOfConfirmed,
            (TransactionType::Cancel, TransactionType::Confirm) => TransactionStatus::ConfirmOfCancelled,
            (TransactionType::Cancel, TransactionType::Cancel) => TransactionStatus::AlreadyCancelled,
            (TransactionType::Reserve, _) => unreachable!(),
        };
        prop_assert_eq!(status, expected);
        prop_assert_eq!(fixture.account.balance(), balance);
    }

    /// Confirm or cancel on a key that was never reserved changes nothing.
    #[test]
    fn absent_keys_are_rejected(
        initial in arb_amount(),
        amount in arb_amount(),
    ) {
        let fixture = Fixture::new(initial);
        prop_assert_eq!(fixture.send(1, TransactionType::Confirm, amount), TransactionStatus::ConfirmNotFound);
        prop_assert_eq!(fixture.send(1, TransactionType::Cancel, amount), TransactionStatus::CancelNotFound);
        prop_assert_eq!(fixture.account.balance(), initial);
        prop_assert!(fixture.account.entries().len() == 1);
    }
}
