/* request.rs
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

//! Pending access requests under `requests/<uuid>.json.gpg`, encrypted to
//! the root recipients.

use crate::crypto::CryptoAdapter;
use crate::error::RequestError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use uuid::Uuid;

pub const REQUESTS_DIR: &str = "requests";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub uuid: String,
    pub fingerprint: String,
    pub path: String,
    pub public_key_armor: String,
    pub timestamp_rfc3339: String,
}

impl PendingRequest {
    pub fn new(fingerprint: impl Into<String>, path: impl Into<String>, public_key_armor: impl Into<String>) -> Self {
        PendingRequest {
            uuid: generate_uuid(),
            fingerprint: fingerprint.into(),
            path: path.into(),
            public_key_armor: public_key_armor.into(),
            timestamp_rfc3339: Utc::now().to_rfc3339(),
        }
    }

    fn file_name(&self) -> String {
        format!("{}.json.gpg", self.uuid)
    }
}

/// A version-4 UUID from cryptographic randomness, rendered canonically.
pub fn generate_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// Write a request blob, encrypted to `root_recipients`.
pub fn save(
    store_root: &Path,
    req: &PendingRequest,
    crypto: &dyn CryptoAdapter,
    root_recipients: &[String],
) -> Result<(), RequestError> {
    let dir = store_root.join(REQUESTS_DIR);
    fs::create_dir_all(&dir).map_err(crate::error::StoreError::from)?;
    let json = serde_json::to_vec(req).map_err(crate::error::StoreError::from)?;
    let cipher = crypto
        .encrypt(&json, root_recipients)
        .map_err(crate::error::StoreError::from)?;
    let path = dir.join(req.file_name());
    fs::write(&path, &cipher).map_err(crate::error::StoreError::from)?;
    Ok(())
}

/// Remove a request blob after it is approved.
pub fn remove(store_root: &Path, uuid: &str) -> Result<(), RequestError> {
    let path = store_root.join(REQUESTS_DIR).join(format!("{uuid}.json.gpg"));
    if path.is_file() {
        fs::remove_file(path).map_err(crate::error::StoreError::from)?;
    }
    Ok(())
}

/// Enumerate `requests/*.json.gpg`, decrypting each. Entries whose name
/// lacks the `.json.gpg` suffix are silently dropped, as are blobs that
/// fail to decrypt or deserialize (an eventual-consistency artifact of a
/// half-applied rekey, not a fatal condition).
pub fn list_pending(store_root: &Path, crypto: &dyn CryptoAdapter) -> Result<Vec<PendingRequest>, RequestError> {
    let dir = store_root.join(REQUESTS_DIR);
    let Ok(entries) = fs::read_dir(&dir) else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if !name.ends_with(".json.gpg") {
            continue;
        }
        let Ok(cipher) = fs::read(&path) else {
            continue;
        };
        let Ok(plain) = crypto.decrypt(&cipher, None) else {
            continue;
        };
        if let Ok(req) = serde_json::from_slice::<PendingRequest>(&plain) {
            out.push(req);
        }
    }
    Ok(out)
}

/// Find the one pending request whose UUID starts with `prefix`.
pub fn find_by_prefix(pending: &[PendingRequest], prefix: &str) -> Result<PendingRequest, RequestError> {
    let matches: Vec<&PendingRequest> = pending.iter().filter(|r| r.uuid.starts_with(prefix)).collect();
    match matches.len() {
        0 => Err(RequestError::NotFound(prefix.to_string())),
        1 => Ok(matches[0].clone()),
        n => Err(RequestError::Ambiguous(prefix.to_string(), n)),
    }
}

#[allow(dead_code)]
fn parse_timestamp(req: &PendingRequest) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&req.timestamp_rfc3339)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_by_prefix_requires_exactly_one_match() {
        let pending = vec![
            PendingRequest::new("AAAA1111", "aws", "armor-a"),
            PendingRequest::new("BBBB2222", "aws", "armor-b"),
        ];
        assert!(matches!(
            find_by_prefix(&pending, "zzzz"),
            Err(RequestError::NotFound(_))
        ));
        let found = find_by_prefix(&pending, &pending[0].uuid[..4]).unwrap();
        assert_eq!(found.fingerprint, "AAAA1111");
    }

    #[test]
    fn find_by_prefix_rejects_ambiguous_matches() {
        let mut a = PendingRequest::new("AAAA", "aws", "x");
        let mut b = PendingRequest::new("BBBB", "aws", "y");
        a.uuid = "deadbeef-0000-0000-0000-000000000000".to_string();
        b.uuid = "deadbeef-1111-1111-1111-111111111111".to_string();
        let pending = vec![a, b];
        assert!(matches!(
            find_by_prefix(&pending, "deadbeef"),
            Err(RequestError::Ambiguous(_, 2))
        ));
    }

    #[test]
    fn generate_uuid_is_v4_and_unique() {
        let a = generate_uuid();
        let b = generate_uuid();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }
}
