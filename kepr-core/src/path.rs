/* path.rs
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

//! Parse and normalize the logical paths used to name secrets and
//! directories inside a [`crate::store::Store`].

use crate::error::PathError;

/// Split a user-supplied path into non-empty, validated segments.
///
/// Fails with [`PathError::EmptyPath`], [`PathError::AbsolutePath`],
/// [`PathError::TrailingSlash`], [`PathError::RelativePath`] (on a `..`
/// segment) or [`PathError::InvalidPath`] (on an embedded NUL byte).
/// Empty intermediate segments produced by accidental `//` are collapsed.
pub fn normalize(s: &str) -> Result<Vec<String>, PathError> {
    if s.is_empty() {
        return Err(PathError::EmptyPath);
    }
    if s.contains('\0') {
        return Err(PathError::InvalidPath);
    }
    if s.starts_with('/') {
        return Err(PathError::AbsolutePath);
    }
    if s.ends_with('/') {
        return Err(PathError::TrailingSlash);
    }

    let segments: Vec<String> = s
        .split('/')
        .filter(|seg| !seg.is_empty())
        .map(|seg| seg.to_string())
        .collect();

    if segments.iter().any(|seg| seg == "..") {
        return Err(PathError::RelativePath);
    }
    if segments.is_empty() {
        return Err(PathError::EmptyPath);
    }

    Ok(segments)
}

/// Split segments into `(parent_segments, last_segment)`.
///
/// Returns `None` if `segments` is empty.
pub fn split(segments: &[String]) -> Option<(&[String], &str)> {
    let (last, parents) = segments.split_last()?;
    Some((parents, last.as_str()))
}

/// Join segments back into the canonical `a/b/c` form.
pub fn join(segments: &[String]) -> String {
    segments.join("/")
}
