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

//! Service configuration from command-line flags and environment variables.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Balance Service - user balances, fund reservations, and monthly reports
///
/// Every flag can also be set through the environment variable shown next to it.
#[derive(Parser, Debug, Clone)]
#[command(name = "balance-service")]
#[command(about = "A balance service with reservations and monthly reports", long_about = None)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "BALANCE_LISTEN", default_value = "127.0.0.1:8000")]
    pub listen: SocketAddr,

    /// Base URL prepended to generated report links
    #[arg(long, env = "BALANCE_PUBLIC_URL", default_value = "http://localhost:8000")]
    pub public_url: String,

    /// Directory generated reports are written to
    #[arg(long, env = "BALANCE_REPORT_DIR", default_value = "static/file")]
    pub report_dir: PathBuf,

    /// Deadline for a single storage call, in milliseconds
    #[arg(long, env = "BALANCE_STORE_TIMEOUT_MS", default_value_t = 5000)]
    pub store_timeout_ms: u64,

    /// Log filter directives, e.g. `info` or `balance_service=debug`
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_filter: String,
}

impl Config {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}
