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

//! Error types for the balance service.

use std::fmt;
use thiserror::Error;

/// Failures of the storage collaborator.
///
/// The message is for server-side logs only and never reaches a client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend rejected or failed the operation.
    #[error("storage backend failure: {0}")]
    Backend(String),

    /// The operation did not complete within the configured deadline.
    #[error("storage call timed out")]
    Timeout,
}

/// Errors surfaced to the HTTP boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Client-correctable request problem, carrying a field message.
    #[error("{0}")]
    Validation(String),

    /// No balance row exists for the user.
    #[error("balance not found")]
    BalanceNotFound,

    /// No generated report exists under the requested id.
    #[error("report not found")]
    ReportNotFound,

    /// Anything else. Details are logged, not returned.
    #[error("internal server error")]
    Internal,
}

/// A balance or report total left the range `Decimal` can represent.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("amount out of decimal range")]
pub struct AmountOverflow;

impl From<AmountOverflow> for StoreError {
    fn from(err: AmountOverflow) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// A string or code that does not name any known variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported {kind}: {value}")]
pub struct UnsupportedValue {
    pub kind: &'static str,
    pub value: String,
}

impl UnsupportedValue {
    pub fn new(kind: &'static str, value: impl fmt::Display) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        assert_eq!(ServiceError::BalanceNotFound.to_string(), "balance not found");
        assert_eq!(ServiceError::ReportNotFound.to_string(), "report not found");
        assert_eq!(ServiceError::Internal.to_string(), "internal server error");
        assert_eq!(
            ServiceError::Validation("field sum missing".into()).to_string(),
            "field sum missing"
        );
        assert_eq!(StoreError::Timeout.to_string(), "storage call timed out");
        assert_eq!(
            UnsupportedValue::new("sort field", "name").to_string(),
            "unsupported sort field: name"
        );
    }

    #[test]
    fn errors_are_cloneable() {
        let error = StoreError::Backend("connection reset".into());
        let cloned = error.clone();
        assert_eq!(error, cloned);
    }
}
