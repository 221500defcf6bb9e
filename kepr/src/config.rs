/* config.rs
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

//! `config.json` (version 2), with mandatory migration from the flat v1
//! schema. Adapted from `passwordstore::preferences`'s GSettings-backed
//! persistence to plain JSON, per the spec's literal schema.

use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;

pub const CURRENT_VERSION: u32 = 2;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yubikey_serial: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yubikey_admin_pin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yubikey_user_pin: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoConfig {
    pub fingerprint: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_repo: Option<String>,
    #[serde(default)]
    pub identities: HashMap<String, IdentityConfig>,
    #[serde(default)]
    pub repos: HashMap<String, RepoConfig>,
}

/// The flat v1 schema, kept only to decode and migrate a legacy file.
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigV1 {
    github_token: Option<String>,
    github_repo: Option<String>,
    user_name: Option<String>,
    user_email: Option<String>,
    user_fingerprint: Option<String>,
    yubikey_serial: Option<String>,
    yubikey_admin_pin: Option<String>,
    yubikey_user_pin: Option<String>,
}

impl Config {
    pub fn identity_for_repo(&self, owner_repo: &str) -> Option<(&str, &IdentityConfig)> {
        let repo = self.repos.get(owner_repo)?;
        let identity = self.identities.get(&repo.fingerprint)?;
        Some((repo.fingerprint.as_str(), identity))
    }

    pub fn set_default_repo(&mut self, owner_repo: &str) {
        self.default_repo = Some(owner_repo.to_string());
    }

    pub fn set_identity(&mut self, fingerprint: &str, identity: IdentityConfig) {
        self.identities.insert(fingerprint.to_string(), identity);
    }

    pub fn set_repo(&mut self, owner_repo: &str, fingerprint: &str) {
        self.repos.insert(
            owner_repo.to_string(),
            RepoConfig { fingerprint: fingerprint.to_string() },
        );
    }
}

/// Load `config_home/config.json`, migrating a legacy v1 file in place if
/// found. Returns a fresh default `Config` (version 2, empty) if no file
/// exists yet.
pub fn load(config_home: &Path) -> Result<Config> {
    let path = kepr_core::config_home::config_file(&config_home.to_path_buf());
    if !path.is_file() {
        return Ok(Config { version: CURRENT_VERSION, ..Default::default() });
    }
    let raw = fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;

    if let Ok(current) = serde_json::from_slice::<Config>(&raw) {
        if current.version >= CURRENT_VERSION {
            return Ok(current);
        }
    }

    let legacy: ConfigV1 = serde_json::from_slice(&raw).map_err(|_| ConfigError::IdentityNotConfigured)?;
    let mut migrated = Config { version: CURRENT_VERSION, ..Default::default() };
    migrated.github_token = legacy.github_token;

    if let (Some(fingerprint), Some(name), Some(email)) =
        (legacy.user_fingerprint.clone(), legacy.user_name, legacy.user_email)
    {
        migrated.identities.insert(
            fingerprint.clone(),
            IdentityConfig {
                name,
                email,
                yubikey_serial: legacy.yubikey_serial,
                yubikey_admin_pin: legacy.yubikey_admin_pin,
                yubikey_user_pin: legacy.yubikey_user_pin,
            },
        );
        if let Some(owner_repo) = legacy.github_repo.clone() {
            migrated.repos.insert(owner_repo.clone(), RepoConfig { fingerprint });
            migrated.default_repo = Some(owner_repo);
        }
    }

    if let Some(owner_repo) = &migrated.default_repo {
        let legacy_dir = config_home.join("secrets");
        if legacy_dir.is_dir() {
            if let Some((owner, repo)) = owner_repo.split_once('/') {
                let dest = config_home.join(owner).join(repo);
                if !dest.exists() {
                    fs::create_dir_all(config_home.join(owner))?;
                    fs::rename(&legacy_dir, &dest)
                        .with_context(|| format!("failed to migrate {} to {}", legacy_dir.display(), dest.display()))?;
                }
            }
        }
    }

    save(config_home, &migrated)?;
    Ok(migrated)
}

/// Atomic whole-file write, mode `0600`.
pub fn save(config_home: &Path, config: &Config) -> Result<()> {
    fs::create_dir_all(config_home)?;
    let path = kepr_core::config_home::config_file(&config_home.to_path_buf());
    let tmp = config_home.join(format!(".config.json.{}.tmp", std::process::id()));
    let body = serde_json::to_vec_pretty(config)?;
    {
        let mut f = fs::OpenOptions::new().write(true).create(true).truncate(true).open(&tmp)?;
        f.write_all(&body)?;
        f.sync_all()?;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
    }
    fs::rename(&tmp, &path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_fresh_v2_config() {
        let dir = tempdir().unwrap();
        let config = load(dir.path()).unwrap();
        assert_eq!(config.version, CURRENT_VERSION);
        assert!(config.identities.is_empty());
    }

    #[test]
    fn round_trips_through_save_and_load() {
        let dir = tempdir().unwrap();
        let mut config = Config { version: CURRENT_VERSION, ..Default::default() };
        config.set_identity("FINGERPRINT", IdentityConfig { name: "Alice".into(), email: "alice@example.com".into(), ..Default::default() });
        config.set_repo("alice/secrets", "FINGERPRINT");
        config.set_default_repo("alice/secrets");
        save(dir.path(), &config).unwrap();

        let loaded = load(dir.path()).unwrap();
        assert_eq!(loaded.default_repo.as_deref(), Some("alice/secrets"));
        let (fp, identity) = loaded.identity_for_repo("alice/secrets").unwrap();
        assert_eq!(fp, "FINGERPRINT");
        assert_eq!(identity.email, "alice@example.com");
    }

    #[test]
    fn migrates_legacy_v1_schema() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("secrets")).unwrap();
        let legacy = serde_json::json!({
            "github_token": "ghp_legacy",
            "github_repo": "alice/secrets",
            "user_name": "Alice",
            "user_email": "alice@example.com",
            "user_fingerprint": "FINGERPRINT",
        });
        fs::write(dir.path().join("config.json"), serde_json::to_vec(&legacy).unwrap()).unwrap();

        let migrated = load(dir.path()).unwrap();
        assert_eq!(migrated.version, CURRENT_VERSION);
        assert_eq!(migrated.github_token.as_deref(), Some("ghp_legacy"));
        assert!(dir.path().join("alice").join("secrets").is_dir());
        assert!(!dir.path().join("secrets").exists());
    }
}
