/* crypto.rs
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

//! A façade over an OpenPGP engine. [`GpgmeAdapter`] wraps `gpgme` the way
//! `passcore::store::PassStore` used to, but as a narrow, swappable trait
//! rather than methods baked directly into the store.

use crate::error::CryptoError;
use gpgme::{Context as GpgContext, DecryptFlags, KeyListMode, PassphraseRequest, PinentryMode, Protocol};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::cell::RefCell;
use std::io::Write;
use std::path::{Path, PathBuf};

/// A public key discovered via [`CryptoAdapter::list_public_keys`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyInfo {
    pub fingerprint: String,
    pub uid: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// The sentinel PIN value that disables loopback-PIN decryption in favor
/// of interactive pinentry on the controlling terminal.
pub const MANUAL_PIN: &str = "manual";

pub trait CryptoAdapter {
    fn encrypt(&self, plaintext: &[u8], recipients: &[String]) -> Result<Vec<u8>, CryptoError>;
    fn decrypt(&self, ciphertext: &[u8], pin: Option<&SecretString>) -> Result<Vec<u8>, CryptoError>;
    fn list_public_keys(&self) -> Result<Vec<PublicKeyInfo>, CryptoError>;
    fn import_public_key(&self, armored: &[u8]) -> Result<(), CryptoError>;
    fn export_public_key(&self, fingerprint: &str) -> Result<Vec<u8>, CryptoError>;
    /// Export the armored secret key for offline, out-of-band storage
    /// (spec.md §4.8's Init "offline backup master" step). The caller is
    /// responsible for writing the result somewhere other than the live
    /// `GNUPGHOME`.
    fn export_secret_key_backup(&self, fingerprint: &str) -> Result<Vec<u8>, CryptoError>;
    fn generate_keypair(&self, name: &str, email: &str) -> Result<String, CryptoError>;
}

/// GPGME-backed [`CryptoAdapter`]. Owns a dedicated `GNUPGHOME` so no two
/// invocations of `kepr` ever share agent state (spec.md §4.4).
pub struct GpgmeAdapter {
    gpg: RefCell<GpgContext>,
    #[allow(dead_code)]
    home: PathBuf,
}

impl GpgmeAdapter {
    pub fn new(home: &Path) -> Result<Self, CryptoError> {
        std::fs::create_dir_all(home).map_err(|e| CryptoError::KeyGen(e.to_string()))?;
        let mut gpg = GpgContext::from_protocol(Protocol::OpenPgp)
            .map_err(|e| CryptoError::KeyGen(format!("failed to create GPG context: {e}")))?;
        gpg.set_engine_home_dir(home.to_string_lossy().into_owned())
            .map_err(|e| CryptoError::KeyGen(format!("failed to set GNUPGHOME: {e}")))?;
        gpg.set_armor(true);
        Ok(GpgmeAdapter {
            gpg: RefCell::new(gpg),
            home: home.to_path_buf(),
        })
    }
}

impl CryptoAdapter for GpgmeAdapter {
    fn encrypt(&self, plaintext: &[u8], recipients: &[String]) -> Result<Vec<u8>, CryptoError> {
        let mut gpg = self.gpg.borrow_mut();
        gpg.set_key_list_mode(KeyListMode::LOCAL | KeyListMode::SIGS)
            .map_err(|e| CryptoError::Encrypt(e.to_string()))?;
        let keys: Vec<_> = recipients
            .iter()
            .map(|r| gpg.get_key(r))
            .collect::<Result<_, _>>()
            .map_err(|e| CryptoError::Encrypt(format!("unknown recipient key: {e}")))?;
        if keys.is_empty() {
            return Err(CryptoError::Encrypt("no recipients found for encryption".into()));
        }
        let mut cipher = Vec::new();
        gpg.encrypt(&keys, plaintext, &mut cipher)
            .map_err(|e| CryptoError::Encrypt(e.to_string()))?;
        Ok(cipher)
    }

    fn decrypt(&self, ciphertext: &[u8], pin: Option<&SecretString>) -> Result<Vec<u8>, CryptoError> {
        let mut gpg = self.gpg.borrow_mut();
        let mut plain = Vec::new();

        let manual = pin
            .map(|p| p.expose_secret() == MANUAL_PIN)
            .unwrap_or(true);

        if manual {
            // Delegate to interactive pinentry on the controlling terminal.
            gpg.decrypt_with_flags(ciphertext, &mut plain, DecryptFlags::empty())
                .map_err(map_decrypt_err)?;
        } else {
            let secret = pin.unwrap().expose_secret().to_owned();
            gpg.set_pinentry_mode(PinentryMode::Loopback)
                .map_err(|e| CryptoError::Decrypt(e.to_string()))?;
            gpg.with_passphrase_provider(
                move |_req: PassphraseRequest, out: &mut dyn Write| {
                    writeln!(out, "{secret}")?;
                    Ok(())
                },
                |ctx| ctx.decrypt_with_flags(ciphertext, &mut plain, DecryptFlags::empty()),
            )
            .map_err(map_decrypt_err)?;
        }

        Ok(plain)
    }

    fn list_public_keys(&self) -> Result<Vec<PublicKeyInfo>, CryptoError> {
        let mut gpg = self.gpg.borrow_mut();
        let uid_re = Regex::new(r"^(.*?)\s*<([^>]+)>\s*$").expect("valid regex");
        let mut out = Vec::new();
        let keys = gpg
            .keys()
            .map_err(|e| CryptoError::KeyGen(format!("failed to list keys: {e}")))?;
        for key in keys.flatten() {
            let Some(fingerprint) = key.fingerprint().ok().map(|s| s.to_string()) else {
                continue;
            };
            for uid in key.user_ids() {
                let raw = uid.id().unwrap_or_default().to_string();
                let (name, email) = match uid_re.captures(&raw) {
                    Some(caps) => (
                        Some(caps[1].to_string()).filter(|s| !s.is_empty()),
                        Some(caps[2].to_string()),
                    ),
                    None => (None, None),
                };
                out.push(PublicKeyInfo {
                    fingerprint: fingerprint.clone(),
                    uid: raw,
                    name,
                    email,
                });
            }
        }
        Ok(out)
    }

    fn import_public_key(&self, armored: &[u8]) -> Result<(), CryptoError> {
        let mut gpg = self.gpg.borrow_mut();
        let mut data = gpgme::Data::from_bytes(armored).map_err(|_| CryptoError::ImportFailed)?;
        gpg.import(&mut data).map_err(|_| CryptoError::ImportFailed)?;
        Ok(())
    }

    fn export_public_key(&self, fingerprint: &str) -> Result<Vec<u8>, CryptoError> {
        let mut gpg = self.gpg.borrow_mut();
        let mut out = Vec::new();
        gpg.export(
            Some(fingerprint),
            gpgme::ExportMode::empty(),
            &mut out,
        )
        .map_err(|_| CryptoError::ExportEmpty)?;
        if out.is_empty() {
            return Err(CryptoError::ExportEmpty);
        }
        Ok(out)
    }

    fn export_secret_key_backup(&self, fingerprint: &str) -> Result<Vec<u8>, CryptoError> {
        let mut gpg = self.gpg.borrow_mut();
        let mut out = Vec::new();
        gpg.export(Some(fingerprint), gpgme::ExportMode::SECRET, &mut out)
            .map_err(|e| CryptoError::BackupFailed(e.to_string()))?;
        if out.is_empty() {
            return Err(CryptoError::BackupFailed("gpg returned no secret key material".to_string()));
        }
        Ok(out)
    }

    fn generate_keypair(&self, name: &str, email: &str) -> Result<String, CryptoError> {
        let mut gpg = self.gpg.borrow_mut();

        // 1. Cert-only EdDSA (ed25519) primary, no expiration.
        let primary_params = format!(
            "<GnupgKeyParms format=\"internal\">
Key-Type: eddsa
Key-Curve: ed25519
Key-Usage: cert
Name-Real: {name}
Name-Email: {email}
Expire-Date: 0
%no-protection
%commit
</GnupgKeyParms>"
        );
        let result = gpg
            .generate_key(primary_params, None::<Vec<u8>>, None::<Vec<u8>>)
            .map_err(|e| CryptoError::KeyGen(format!("primary key generation failed: {e}")))?;
        let fingerprint = result
            .fingerprint()
            .map_err(|_| CryptoError::KeyGen("generated key has no fingerprint".into()))?
            .to_string();

        // 2. cv25519 encryption-only subkey, loopback pinentry, empty passphrase.
        gpg.set_pinentry_mode(PinentryMode::Loopback)
            .map_err(|e| CryptoError::KeyGen(e.to_string()))?;
        let subkey_params = format!(
            "<GnupgKeyParms format=\"internal\">
Key-Type: ecdh
Key-Curve: cv25519
Key-Usage: encrypt
Name-Real: {name}
Name-Email: {email}
Expire-Date: 0
%no-protection
%commit
</GnupgKeyParms>"
        );
        gpg.with_passphrase_provider(
            |_req: PassphraseRequest, out: &mut dyn Write| {
                writeln!(out)?;
                Ok(())
            },
            |ctx| ctx.generate_key(subkey_params, None::<Vec<u8>>, None::<Vec<u8>>),
        )
        .map_err(|e| CryptoError::KeyGen(format!("subkey generation failed: {e}")))?;

        Ok(fingerprint)
    }
}

fn map_decrypt_err(e: gpgme::Error) -> CryptoError {
    let msg = e.to_string();
    if msg.to_lowercase().contains("bad passphrase") || msg.to_lowercase().contains("bad pin") {
        CryptoError::BadPin
    } else {
        CryptoError::Decrypt(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_sentinel_is_manual() {
        assert_eq!(MANUAL_PIN, "manual");
    }
}
