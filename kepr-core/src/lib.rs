/* lib.rs
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

//! The encrypted secret store and access-control/rekey engine: the
//! on-disk layout, the crypto adapter, the access scanner, the pending
//! request record, and the workflow runtime the six user-level workflows
//! are built from. The CLI, Git transport, GitHub hosting and config
//! persistence are external collaborators implemented by the `kepr`
//! binary against the trait objects this crate defines.

pub mod config_home;
pub mod console;
pub mod crypto;
pub mod error;
pub mod hoster;
pub mod identity;
pub mod metadata;
pub mod path;
pub mod recipients;
pub mod request;
pub mod store;
pub mod transport;
pub mod workflow;
pub mod workflows;

pub use console::Console;
pub use crypto::{CryptoAdapter, GpgmeAdapter, PublicKeyInfo};
pub use hoster::Hoster;
pub use identity::Identity;
pub use metadata::{EntryKind, Metadata};
pub use request::PendingRequest;
pub use store::{ListEntry, Secret, Store};
pub use transport::Transport;
pub use workflow::{CancellationToken, RetryPolicy, Step, Trigger, Workflow};
