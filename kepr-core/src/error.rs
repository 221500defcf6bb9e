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

/// Errors raised while normalizing or splitting a logical path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path must not be empty")]
    EmptyPath,
    #[error("path must be relative, not start with '/'")]
    AbsolutePath,
    #[error("path must not end with '/'")]
    TrailingSlash,
    #[error("path must not contain '..' segments")]
    RelativePath,
    #[error("path contains an invalid byte (NUL)")]
    InvalidPath,
}

/// Errors raised by `.gpg.id` reads/writes.
#[derive(Error, Debug)]
pub enum RecipientError {
    #[error("recipient list is empty")]
    NoRecipients,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised by the crypto adapter.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("encryption failed: {0}")]
    Encrypt(String),
    #[error("decryption failed: {0}")]
    Decrypt(String),
    #[error("incorrect PIN")]
    BadPin,
    #[error("key generation failed: {0}")]
    KeyGen(String),
    #[error("failed to import public key")]
    ImportFailed,
    #[error("exported public key was empty")]
    ExportEmpty,
    #[error("failed to export secret key backup: {0}")]
    BackupFailed(String),
}

/// Errors raised by `Store` operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store is already initialized")]
    AlreadyInitialized,
    #[error("store is not initialized")]
    StoreNotInitialized,
    #[error("a secret already exists at this path")]
    SecretAlreadyExists,
    #[error("no secret found at this path")]
    SecretNotFound,
    #[error("no directory found at this path")]
    DirectoryNotFound,
    #[error("plaintext exceeds the 1 MiB limit")]
    FileTooLarge,
    #[error("the configured GPG client is unusable: {0}")]
    InvalidGpgClient(String),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Recipient(#[from] RecipientError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Errors raised while managing pending access requests.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("no pending request matches prefix `{0}`")]
    NotFound(String),
    #[error("{1} pending requests match prefix `{0}`, expected exactly one")]
    Ambiguous(String, usize),
    #[error("fingerprint {0} already has access")]
    AlreadyHasAccess(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised by the workflow runtime.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("workflow cancelled")]
    Cancelled,
    #[error("failed after {0} attempts: {1}")]
    MaxAttemptsExceeded(u32, String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Request(#[from] RequestError),
    /// Any other failure surfaced by a step (config, transport, hoster —
    /// those live in the binary crate and cross this boundary as strings).
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for WorkflowError {
    fn from(e: anyhow::Error) -> Self {
        WorkflowError::Other(e.to_string())
    }
}
