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

//! Declarative request validation.
//!
//! A payload lists its fields in declaration order, each with a [`Value`] and
//! a set of [`Rule`]s. [`validate`] walks them in order and stops at the first
//! violation, returning a message meant for the client.
//!
//! A rule attached to a value kind it cannot judge (a bound on a string, a
//! uuid check on a number) is a programming error, reported as
//! [`ValidationError::Misconfigured`] so it never reaches a client as a
//! field message.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// A single field constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// The field must be present.
    Required,
    /// Hyphenated UUID string.
    Uuid,
    /// Decimal strictly greater than the bound.
    Gt(i64),
    /// Integer greater than or equal to the bound.
    Min(i64),
    /// Integer less than or equal to the bound.
    Max(i64),
    /// String or integer equal to one of the listed values.
    OneOf(&'static [&'static str]),
}

/// A field value as seen by the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value<'a> {
    Missing,
    Str(&'a str),
    Decimal(Decimal),
    Int(i64),
}

impl<'a> From<Option<&'a String>> for Value<'a> {
    fn from(value: Option<&'a String>) -> Self {
        value.map_or(Value::Missing, |s| Value::Str(s))
    }
}

impl From<Option<Decimal>> for Value<'_> {
    fn from(value: Option<Decimal>) -> Self {
        value.map_or(Value::Missing, Value::Decimal)
    }
}

impl From<Option<i64>> for Value<'_> {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Value::Missing, Value::Int)
    }
}

#[derive(Debug, Clone)]
pub struct Field<'a> {
    pub name: &'static str,
    pub value: Value<'a>,
    pub rules: &'static [Rule],
}

impl<'a> Field<'a> {
    pub fn new(name: &'static str, value: impl Into<Value<'a>>, rules: &'static [Rule]) -> Self {
        Self {
            name,
            value: value.into(),
            rules,
        }
    }
}

/// Payloads that describe their own constraints.
pub trait Validate {
    /// Fields in declaration order.
    fn fields(&self) -> Vec<Field<'_>>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The payload violates a constraint.
    #[error("{0}")]
    Field(String),

    /// A rule was declared on a value kind it cannot check.
    #[error("rule {rule:?} cannot check field {field}")]
    Misconfigured { field: &'static str, rule: Rule },
}

/// Checks `target` and reports the first violated constraint.
pub fn validate<T: Validate + ?Sized>(target: &T) -> Result<(), ValidationError> {
    target.fields().iter().try_for_each(check)
}

fn check(field: &Field<'_>) -> Result<(), ValidationError> {
    let name = field.name;

    if field.value == Value::Missing {
        // Optional fields are only checked when present.
        return if field.rules.contains(&Rule::Required) {
            Err(ValidationError::Field(format!("field {name} missing")))
        } else {
            Ok(())
        };
    }

    for rule in field.rules {
        let satisfied = match (rule, &field.value) {
            (Rule::Required, _) => true,
            (Rule::Uuid, Value::Str(s)) => s.len() == 36 && Uuid::try_parse(s).is_ok(),
            (Rule::Gt(bound), Value::Decimal(d)) => *d > Decimal::from(*bound),
            (Rule::Min(bound), Value::Int(v)) => v >= bound,
            (Rule::Max(bound), Value::Int(v)) => v <= bound,
            (Rule::OneOf(options), Value::Str(s)) => options.iter().any(|o| o == s),
            (Rule::OneOf(options), Value::Int(v)) => {
                let text = v.to_string();
                options.iter().any(|o| *o == text)
            }
            (rule, _) => {
                return Err(ValidationError::Misconfigured {
                    field: name,
                    rule: *rule,
                });
            }
        };

        if !satisfied {
            return Err(ValidationError::Field(message(name, rule)));
        }
    }

    Ok(())
}

fn message(name: &str, rule: &Rule) -> String {
    match rule {
        Rule::Required => format!("field {name} missing"),
        Rule::Uuid => format!("field {name} should be uuid"),
        Rule::Gt(bound) => format!("field {name} should be > {bound}"),
        Rule::Min(bound) => format!("field {name} should be >= {bound}"),
        Rule::Max(bound) => format!("field {name} should be <= {bound}"),
        Rule::OneOf(options) => format!("field {name} should be in [{}]", options.join(" ")),
    }
}
