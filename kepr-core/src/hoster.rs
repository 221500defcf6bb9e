/* hoster.rs
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

//! The GitHub hosting boundary: OAuth, repository lookup/creation, identity.
//! Concrete reqwest-backed implementation lives in the `kepr` binary crate.

pub trait Hoster {
    /// Device-code flow: prints/returns a user code, polls until the user
    /// authorizes in a browser.
    fn authenticate_device_code(&self, client_id: &str) -> anyhow::Result<String>;
    /// PKCE flow with a local loopback callback on an ephemeral port,
    /// bounded by a 2-minute inactivity ceiling.
    fn authenticate_pkce(&self, client_id: &str) -> anyhow::Result<String>;
    fn get_user_identity(&self, token: &str) -> anyhow::Result<(String, String)>;
    fn get_current_user_login(&self, token: &str) -> anyhow::Result<String>;
    fn check_repo_exists(&self, token: &str, owner: &str, name: &str) -> anyhow::Result<bool>;
    fn create_repo(&self, token: &str, name: &str, private: bool) -> anyhow::Result<()>;
    fn get_clone_url(&self, token: &str, owner: &str, name: &str) -> anyhow::Result<String>;
}
