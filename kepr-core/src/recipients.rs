/* recipients.rs
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

//! Read/write a directory's `.gpg.id` recipient list.

use crate::error::RecipientError;
use std::fs;
use std::io::Write;
use std::path::Path;

pub const GPG_ID_FILE: &str = ".gpg.id";

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(mode);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

/// Read `dir/.gpg.id`: split on `\n`, trim, drop empty lines.
///
/// Fails with [`RecipientError::NoRecipients`] if the result is empty.
pub fn read(dir: &Path) -> Result<Vec<String>, RecipientError> {
    let content = fs::read_to_string(dir.join(GPG_ID_FILE))?;
    let recipients: Vec<String> = content
        .split('\n')
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();
    if recipients.is_empty() {
        return Err(RecipientError::NoRecipients);
    }
    Ok(recipients)
}

/// Write `dir/.gpg.id`: newline-joined, trailing newline, mode 0600.
///
/// Fails with [`RecipientError::NoRecipients`] if `recipients` is empty.
/// Written atomically via a sibling temp file + rename.
pub fn write(dir: &Path, recipients: &[String]) -> Result<(), RecipientError> {
    if recipients.is_empty() {
        return Err(RecipientError::NoRecipients);
    }
    let mut content = recipients.join("\n");
    content.push('\n');

    let dest = dir.join(GPG_ID_FILE);
    let tmp = dir.join(format!(".gpg.id.{}.tmp", std::process::id()));
    {
        let mut f = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)?;
        f.write_all(content.as_bytes())?;
        f.sync_all()?;
    }
    set_mode(&tmp, 0o600)?;
    fs::rename(&tmp, &dest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_and_trims_trailing_blanks() {
        let dir = tempdir().unwrap();
        let recipients = vec!["AAAA".to_string(), "BBBB".to_string()];
        write(dir.path(), &recipients).unwrap();
        assert_eq!(read(dir.path()).unwrap(), recipients);
    }

    #[test]
    fn write_rejects_empty_list() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            write(dir.path(), &[]),
            Err(RecipientError::NoRecipients)
        ));
    }

    #[test]
    fn read_rejects_file_with_only_blank_lines() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(GPG_ID_FILE), "\n\n  \n").unwrap();
        assert!(matches!(
            read(dir.path()),
            Err(RecipientError::NoRecipients)
        ));
    }
}
