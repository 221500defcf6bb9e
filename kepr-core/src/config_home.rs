/* config_home.rs
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

//! Resolve `<CONFIG_HOME>/kepr`, honouring the `KEPR_HOME` override.

use anyhow::{anyhow, Result};
use directories::BaseDirs;
use std::env;
use std::path::PathBuf;

pub const KEPR_HOME_ENV: &str = "KEPR_HOME";

/// The root directory: `config.json`, `gpg/`, and per-repo store dirs live
/// directly under it.
pub fn discover_config_home() -> Result<PathBuf> {
    if let Ok(dir) = env::var(KEPR_HOME_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let base = BaseDirs::new().ok_or_else(|| anyhow!("could not determine the OS config directory"))?;
    Ok(base.config_dir().join("kepr"))
}

pub fn gpg_home(config_home: &PathBuf) -> PathBuf {
    config_home.join("gpg")
}

/// Where `init`'s offline backup-master step writes the exported secret
/// key material. Deliberately a sibling of `gpg/`, not a subdirectory of
/// it: the whole point of an offline backup is that it survives the loss
/// or corruption of the live `GNUPGHOME`.
pub fn backup_dir(config_home: &PathBuf) -> PathBuf {
    config_home.join("backup")
}

pub fn repo_store_dir(config_home: &PathBuf, owner: &str, repo: &str) -> PathBuf {
    config_home.join(owner).join(repo)
}

pub fn config_file(config_home: &PathBuf) -> PathBuf {
    config_home.join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_wins() {
        env::set_var(KEPR_HOME_ENV, "/tmp/kepr-test-home");
        let home = discover_config_home().unwrap();
        assert_eq!(home, PathBuf::from("/tmp/kepr-test-home"));
        env::remove_var(KEPR_HOME_ENV);
    }

    #[test]
    fn layout_helpers_compose_under_home() {
        let home = PathBuf::from("/tmp/kepr-test-home-2");
        assert_eq!(gpg_home(&home), home.join("gpg"));
        assert_eq!(config_file(&home), home.join("config.json"));
        assert_eq!(repo_store_dir(&home, "alice", "secrets"), home.join("alice").join("secrets"));
    }
}
