/* metadata.rs
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

//! `{path, type, original_file?}` records attached to every store entry.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Dir,
    Password,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// For secrets: the final path segment. For directories: the full
    /// logical path from the store root.
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_file: Option<String>,
}

impl Metadata {
    pub fn dir(path: impl Into<String>) -> Self {
        Metadata {
            path: path.into(),
            kind: EntryKind::Dir,
            original_file: None,
        }
    }

    pub fn password(name: impl Into<String>) -> Self {
        Metadata {
            path: name.into(),
            kind: EntryKind::Password,
            original_file: None,
        }
    }

    pub fn file(name: impl Into<String>, original_file: impl Into<String>) -> Self {
        Metadata {
            path: name.into(),
            kind: EntryKind::File,
            original_file: Some(original_file.into()),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Deserialize, returning `None` instead of an error for a `type` value
    /// outside `{dir, password, file}` (spec.md §4.2: skip, don't fail).
    pub fn from_json_lenient(data: &[u8]) -> Option<Self> {
        serde_json::from_slice(data).ok()
    }
}
