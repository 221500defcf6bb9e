/* transport.rs
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

//! The Git transport boundary: commit/push/pull/branch/clone over the store
//! directory. Concrete git2-backed implementation lives in the `kepr`
//! binary crate; the core only depends on this trait.

use std::path::Path;

pub trait Transport {
    fn init(&self, dir: &Path) -> anyhow::Result<()>;
    /// No-op if the worktree is clean.
    fn commit(&self, dir: &Path, message: &str, author_name: &str, author_email: &str) -> anyhow::Result<()>;
    fn configure_remote(&self, dir: &Path, name: &str, url: &str) -> anyhow::Result<()>;
    fn push(&self, dir: &Path, remote: &str, branch: &str) -> anyhow::Result<()>;
    fn pull(&self, dir: &Path, remote: &str, branch: &str, silent: bool) -> anyhow::Result<()>;
    fn create_branch(&self, dir: &Path, name: &str) -> anyhow::Result<()>;
    fn delete_remote_branch(&self, dir: &Path, remote: &str, name: &str) -> anyhow::Result<()>;
    fn clone(&self, url: &str, dir: &Path) -> anyhow::Result<()>;
    /// Fetch every remote branch matching `glob` (e.g. `"access-request/*"`)
    /// and merge each into the current branch, so files it carries become
    /// visible in the working tree. No-op if nothing matches.
    fn fetch_and_merge_matching(&self, dir: &Path, remote: &str, glob: &str) -> anyhow::Result<()>;
}
