/* yubikey.rs
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

//! Optional OpenPGP smart-card (YubiKey) provisioning, gated behind the
//! `smartcard` feature. `generate_keypair` in `kepr-core` always mints a
//! software key; this module lets Init move the freshly-minted subkeys
//! onto a card instead when one is present and the user opts in.

use secrecy::SecretString;

/// A PIN was rejected by the card. Init special-cases this per the wrong-PIN
/// recovery rule: the bad PIN is never retried automatically.
#[derive(Debug, thiserror::Error)]
#[error("smart card rejected the PIN")]
pub struct BadPin;

pub trait YubikeyProvisioner {
    /// Returns the card's serial number if exactly one reader has a card
    /// present, `None` if no card is present.
    fn probe(&self) -> anyhow::Result<Option<String>>;

    /// Verifies the user PIN without generating anything, so callers can
    /// confirm a remembered PIN is still correct before using it silently.
    fn verify_user_pin(&self, serial: &str, pin: &SecretString) -> Result<(), BadPin>;

    /// Generates signing, encryption and authentication subkeys directly on
    /// the card and returns the resulting OpenPGP fingerprint.
    fn generate_on_card(
        &self,
        serial: &str,
        name: &str,
        email: &str,
        admin_pin: &SecretString,
        user_pin: &SecretString,
    ) -> anyhow::Result<String>;
}

#[cfg(feature = "smartcard")]
mod card {
    use super::{BadPin, YubikeyProvisioner};
    use anyhow::{anyhow, Context, Result};
    use card_backend_pcsc::PcscBackend;
    use openpgp_card::{Card, OpenPgp};
    use secrecy::{ExposeSecret, SecretString};

    pub struct OpenPgpCardProvisioner;

    impl OpenPgpCardProvisioner {
        fn open(&self) -> Result<Option<Card>> {
            let mut backends = PcscBackend::cards(None).context("failed to enumerate smart-card readers")?;
            match backends.next() {
                Some(backend) => {
                    let backend = backend.context("failed to open smart-card reader")?;
                    Ok(Some(Card::new(backend)))
                }
                None => Ok(None),
            }
        }
    }

    impl YubikeyProvisioner for OpenPgpCardProvisioner {
        fn probe(&self) -> Result<Option<String>> {
            let Some(mut card) = self.open()? else { return Ok(None) };
            let mut tx = card.transaction().context("failed to open card transaction")?;
            let app = OpenPgp::new(&mut tx);
            let aid = app.application_identifier().context("failed to read card identifier")?;
            let serial = aid.serial_number().iter().map(|b| format!("{b:02x}")).collect::<String>();
            Ok(Some(serial))
        }

        fn verify_user_pin(&self, _serial: &str, pin: &SecretString) -> Result<(), BadPin> {
            let mut card = self.open().map_err(|_| BadPin)?.ok_or(BadPin)?;
            let mut tx = card.transaction().map_err(|_| BadPin)?;
            let mut app = OpenPgp::new(&mut tx);
            app.verify_pw1_user(pin.expose_secret().as_bytes()).map_err(|_| BadPin)
        }

        fn generate_on_card(
            &self,
            _serial: &str,
            name: &str,
            email: &str,
            admin_pin: &SecretString,
            user_pin: &SecretString,
        ) -> Result<String> {
            let mut card = self.open()?.ok_or_else(|| anyhow!("no smart card present"))?;
            let mut tx = card.transaction().context("failed to open card transaction")?;
            let mut app = OpenPgp::new(&mut tx);
            app.verify_pw3_admin(admin_pin.expose_secret().as_bytes())
                .context("admin PIN rejected by card")?;
            app.verify_pw1_user(user_pin.expose_secret().as_bytes())
                .context("user PIN rejected by card")?;
            let fingerprint = app
                .generate_key_pair(name, email)
                .context("on-card key generation failed")?;
            Ok(fingerprint)
        }
    }
}

#[cfg(feature = "smartcard")]
pub use card::OpenPgpCardProvisioner;

/// Built when the `smartcard` feature is disabled: reports no card ever
/// present so Init silently falls back to a software key.
#[cfg(not(feature = "smartcard"))]
pub struct OpenPgpCardProvisioner;

#[cfg(not(feature = "smartcard"))]
impl YubikeyProvisioner for OpenPgpCardProvisioner {
    fn probe(&self) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    fn verify_user_pin(&self, _serial: &str, _pin: &SecretString) -> Result<(), BadPin> {
        Err(BadPin)
    }

    fn generate_on_card(
        &self,
        _serial: &str,
        _name: &str,
        _email: &str,
        _admin_pin: &SecretString,
        _user_pin: &SecretString,
    ) -> anyhow::Result<String> {
        anyhow::bail!("this build of kepr was compiled without smart-card support")
    }
}

/// Resolves a remembered user PIN, special-casing the `"manual"` sentinel
/// that means "never store this PIN, always prompt."
pub fn stored_pin(raw: &Option<String>) -> Option<SecretString> {
    match raw.as_deref() {
        None | Some("manual") => None,
        Some(pin) => Some(SecretString::from(pin.to_string())),
    }
}
