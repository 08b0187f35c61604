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

//! Monthly accounting reports.
//!
//! A report sums every confirmed reservation whose last update falls within
//! a calendar month, grouped by service, and writes it as a `;`-separated
//! file named after the request that asked for it.
//!
//! ```csv
//! 15aa9f91-c8f7-40e4-9108-d45891c10444;345.000000
//! 6c87959d-aa88-4f51-932b-ff70563ad87a;12.500000
//! ```

use crate::base::{RequestId, ServiceId};
use crate::error::ServiceError;
use crate::service::guarded;
use crate::store::Store;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use csv::{Terminator, WriterBuilder};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Digits after the decimal point in report totals.
const TOTAL_PRECISION: usize = 6;

/// Half-open UTC interval `[from, to)` covering one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportPeriod {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl ReportPeriod {
    /// Returns `None` if `month` is not in `1..=12` or the year is out of
    /// chrono's range.
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };

        Some(Self {
            from: Utc.from_utc_datetime(&first.and_hms_opt(0, 0, 0)?),
            to: Utc.from_utc_datetime(&next.and_hms_opt(0, 0, 0)?),
        })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from <= at && at < self.to
    }
}

/// Confirmed total for one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub service_id: ServiceId,
    pub total: Decimal,
}

/// Renders rows as `service;total` lines with six decimal places.
pub fn render_csv(rows: &[ReportRow]) -> Result<Vec<u8>, csv::Error> {
    let mut wtr = WriterBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for row in rows {
        wtr.write_record([
            row.service_id.to_string(),
            format!("{:.prec$}", row.total, prec = TOTAL_PRECISION),
        ])?;
    }

    wtr.into_inner().map_err(|err| err.into_error().into())
}

/// Generates report files and serves them back.
#[derive(Clone)]
pub struct ReportService {
    store: Arc<dyn Store>,
    timeout: Duration,
    dir: PathBuf,
    public_url: String,
}

impl ReportService {
    pub fn new(
        store: Arc<dyn Store>,
        timeout: Duration,
        dir: impl Into<PathBuf>,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            timeout,
            dir: dir.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Writes the report for `period` and returns the URL it is served at.
    ///
    /// The file is written in place. A failed write may leave a truncated
    /// file behind.
    pub async fn create(
        &self,
        request_id: RequestId,
        period: ReportPeriod,
    ) -> Result<String, ServiceError> {
        let rows = guarded(
            request_id,
            "report_rows",
            self.timeout,
            self.store.report_rows(&period),
        )
        .await?;

        let body = render_csv(&rows).map_err(|err| {
            tracing::error!(%request_id, error = %err, "failed to render report");
            ServiceError::Internal
        })?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|err| io_failure(request_id, "create report directory", err))?;
        tokio::fs::write(self.path(request_id), body)
            .await
            .map_err(|err| io_failure(request_id, "write report", err))?;

        tracing::info!(%request_id, rows = rows.len(), from = %period.from, "report written");
        Ok(format!("{}/report/{}", self.public_url, request_id))
    }

    /// Reads back a report written by [`create`](Self::create).
    pub async fn fetch(
        &self,
        request_id: RequestId,
        report_id: RequestId,
    ) -> Result<Vec<u8>, ServiceError> {
        match tokio::fs::read(self.path(report_id)).await {
            Ok(body) => Ok(body),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(ServiceError::ReportNotFound)
            }
            Err(err) => Err(io_failure(request_id, "read report", err)),
        }
    }

    fn path(&self, report_id: RequestId) -> PathBuf {
        self.dir.join(format!("{report_id}.csv"))
    }
}

fn io_failure(request_id: RequestId, action: &str, err: std::io::Error) -> ServiceError {
    tracing::error!(%request_id, error = %err, "failed to {action}");
    ServiceError::Internal
}
