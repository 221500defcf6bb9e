/* workflows/init.rs
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

//! authenticate → check-remote-does-not-exist → create-remote (retry) →
//! save-config → fetch-user-info → setup GPG (generate key, offline
//! backup master) → init store → commit → configure remote → push
//! (retry).
//!
//! `Init` has no meaningful prologue (there is no identity yet), so it does
//! not call [`crate::workflows::prologue_steps`].
//!
//! **[SUPPLEMENT]** if `existing_fingerprint` names a fingerprint already
//! configured for this identity, key generation is skipped and the
//! existing key is reused, so re-running `init` for a second repository
//! under the same identity does not mint a fresh key. The offline backup
//! step is skipped along with it: the master key was already backed up
//! the first time this fingerprint was generated, and re-exporting it on
//! every subsequent `init` would just scatter copies of the secret key
//! across the operator's disk.

use crate::store::Store;
use crate::workflow::{step, step_with_retry, RetryPolicy, Workflow, WorkflowError};
use crate::workflows::Collaborators;
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

#[cfg(unix)]
fn set_mode_600(path: &std::path::Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_mode_600(_path: &std::path::Path) -> std::io::Result<()> {
    Ok(())
}

pub struct InitParams {
    pub use_pkce: bool,
    pub client_id: String,
    pub owner: String,
    pub repo: String,
    pub name: String,
    pub email: String,
    pub existing_fingerprint: Option<String>,
    /// Where the offline backup-master step writes the exported secret key
    /// for a freshly generated identity. Ignored when `existing_fingerprint`
    /// is `Some`.
    pub backup_dir: PathBuf,
    pub store_root: PathBuf,
    pub author_name: String,
    pub author_email: String,
    pub on_token: Box<dyn FnMut(&str) -> Result<(), WorkflowError>>,
    pub on_fingerprint: Box<dyn FnMut(&str) -> Result<(), WorkflowError>>,
}

pub struct InitOutput {
    pub fingerprint: Rc<RefCell<Option<String>>>,
    pub token: Rc<RefCell<Option<String>>>,
}

pub fn build(collaborators: &Collaborators, params: InitParams) -> (Workflow, InitOutput) {
    let InitParams {
        use_pkce,
        client_id,
        owner,
        repo,
        name,
        email,
        existing_fingerprint,
        backup_dir,
        store_root,
        author_name,
        author_email,
        mut on_token,
        mut on_fingerprint,
    } = params;

    let token_slot: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
    let fingerprint_slot: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));

    let mut triggers = Vec::new();

    {
        let hoster = collaborators.hoster.clone();
        let token_slot = token_slot.clone();
        triggers.push(step("authenticate", move |_tok| {
            let token = if use_pkce {
                hoster.authenticate_pkce(&client_id)
            } else {
                hoster.authenticate_device_code(&client_id)
            }
            .map_err(|e| WorkflowError::Other(format!("authentication failed: {e}")))?;
            *token_slot.borrow_mut() = Some(token);
            Ok(())
        }));
    }

    {
        let hoster = collaborators.hoster.clone();
        let token_slot = token_slot.clone();
        let owner = owner.clone();
        let repo = repo.clone();
        triggers.push(step("check-remote-does-not-exist", move |_tok| {
            let token = token_slot.borrow().clone().expect("authenticated in prior step");
            let exists = hoster
                .check_repo_exists(&token, &owner, &repo)
                .map_err(|e| WorkflowError::Other(format!("failed to check remote: {e}")))?;
            if exists {
                Err(WorkflowError::Other(format!("remote {owner}/{repo} already exists")))
            } else {
                Ok(())
            }
        }));
    }

    {
        let hoster = collaborators.hoster.clone();
        let token_slot = token_slot.clone();
        let repo = repo.clone();
        triggers.push(step_with_retry(
            "create-remote",
            move |_tok| {
                let token = token_slot.borrow().clone().expect("authenticated in prior step");
                hoster
                    .create_repo(&token, &repo, true)
                    .map_err(|e| WorkflowError::Other(format!("failed to create remote: {e}")))
            },
            RetryPolicy::new(3, |_, _| Ok(true)),
        ));
    }

    {
        let token_slot = token_slot.clone();
        triggers.push(step("save-config", move |_tok| {
            let token = token_slot.borrow().clone().expect("authenticated in prior step");
            on_token(&token)
        }));
    }

    {
        let hoster = collaborators.hoster.clone();
        let token_slot = token_slot.clone();
        let expected_email = email.clone();
        triggers.push(step("fetch-user-info", move |_tok| {
            let token = token_slot.borrow().clone().expect("authenticated in prior step");
            let (_name, reported_email) = hoster
                .get_user_identity(&token)
                .map_err(|e| WorkflowError::Other(format!("failed to fetch user info: {e}")))?;
            if reported_email != expected_email {
                return Err(WorkflowError::Other(format!(
                    "GitHub account email {reported_email} does not match {expected_email}"
                )));
            }
            Ok(())
        }));
    }

    let freshly_generated = existing_fingerprint.is_none();

    {
        let crypto = collaborators.crypto.clone();
        let fingerprint_slot = fingerprint_slot.clone();
        triggers.push(step("setup-gpg", move |_tok| {
            let fingerprint = match &existing_fingerprint {
                Some(fp) => fp.clone(),
                None => crypto
                    .generate_keypair(&name, &email)
                    .map_err(|e| WorkflowError::Other(format!("key generation failed: {e}")))?,
            };
            on_fingerprint(&fingerprint)?;
            *fingerprint_slot.borrow_mut() = Some(fingerprint);
            Ok(())
        }));
    }

    if freshly_generated {
        let crypto = collaborators.crypto.clone();
        let fingerprint_slot = fingerprint_slot.clone();
        let backup_dir = backup_dir.clone();
        triggers.push(step("backup-master-key", move |_tok| {
            let fingerprint = fingerprint_slot.borrow().clone().expect("set in prior step");
            let armor = crypto
                .export_secret_key_backup(&fingerprint)
                .map_err(|e| WorkflowError::Other(format!("offline backup of master key failed: {e}")))?;
            fs::create_dir_all(&backup_dir).map_err(crate::error::StoreError::from)?;
            let backup_path = backup_dir.join(format!("{fingerprint}.asc"));
            fs::write(&backup_path, &armor).map_err(crate::error::StoreError::from)?;
            set_mode_600(&backup_path).map_err(crate::error::StoreError::from)?;
            Ok(())
        }));
    }

    {
        let crypto = collaborators.crypto.clone();
        let store_root = store_root.clone();
        let fingerprint_slot = fingerprint_slot.clone();
        triggers.push(step("init-store", move |_tok| {
            let fingerprint = fingerprint_slot.borrow().clone().expect("set in prior step");
            let store = Store::open(&store_root, crypto.clone(), "");
            store.init(&[fingerprint]).map_err(WorkflowError::from)
        }));
    }

    {
        let transport = collaborators.transport.clone();
        let store_root = store_root.clone();
        triggers.push(step("commit", move |_tok| {
            transport
                .commit(&store_root, "kepr: init", &author_name, &author_email)
                .map_err(WorkflowError::from)
        }));
    }

    {
        let hoster = collaborators.hoster.clone();
        let transport = collaborators.transport.clone();
        let token_slot = token_slot.clone();
        let store_root = store_root.clone();
        let owner = owner.clone();
        let repo = repo.clone();
        triggers.push(step("configure-remote", move |_tok| {
            let token = token_slot.borrow().clone().expect("authenticated in prior step");
            let url = hoster
                .get_clone_url(&token, &owner, &repo)
                .map_err(|e| WorkflowError::Other(format!("failed to resolve clone url: {e}")))?;
            transport.configure_remote(&store_root, "origin", &url).map_err(WorkflowError::from)
        }));
    }

    {
        let transport = collaborators.transport.clone();
        let store_root = store_root.clone();
        triggers.push(step_with_retry(
            "push",
            move |_tok| transport.push(&store_root, "origin", "main").map_err(WorkflowError::from),
            RetryPolicy::new(3, |_, _| Ok(true)),
        ));
    }

    (
        Workflow::new(triggers),
        InitOutput { fingerprint: fingerprint_slot, token: token_slot },
    )
}
