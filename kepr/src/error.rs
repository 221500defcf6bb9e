/* error.rs
 *
 * Copyright 2025 noobping
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 *
 * SPDX-License-Identifier: GPL-3.0
 */

use thiserror::Error;

/// Errors raised while loading or consulting the local configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("not authenticated: run `kepr init` first")]
    NotAuthenticated,
    #[error("no identity configured for this repository")]
    IdentityNotConfigured,
    #[error("GitHub account email does not match the configured identity")]
    EmailMismatch,
    #[error("no fingerprint configured for this identity")]
    FingerprintMissing,
}

/// Transport (Git) and Hoster (GitHub) failures are surfaced verbatim with
/// a phase prefix via `anyhow::Context`, per spec.md §7, rather than a
/// dedicated enum — there is nothing to match on beyond the message.
pub fn transport_context(phase: &str) -> String {
    format!("failed to {phase}")
}
