/* workflows/approve.rs
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

//! validate → pull → fetch open request branches → locate request by UUID
//! prefix → import requester's public key → compute target directory →
//! append requester fingerprint → `Rekey` the subtree → export requester's
//! public key to `keys/<fp>.key` → remove the request blob → commit & push
//! (retry) → delete remote branch (best-effort; warn on failure).

use crate::recipients;
use crate::request as request_record;
use crate::store::Store;
use crate::workflow::{step, step_with_retry, RetryPolicy, Workflow, WorkflowError};
use crate::workflows::{prologue_steps, Collaborators, PrologueInput};
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

#[cfg(unix)]
fn set_mode_644(path: &std::path::Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_mode_644(_path: &std::path::Path) -> std::io::Result<()> {
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn build(
    collaborators: &Collaborators,
    prologue: PrologueInput,
    store_root: PathBuf,
    uuid_prefix: String,
    author_name: String,
    author_email: String,
    remote: String,
) -> (Workflow, Rc<RefCell<Option<String>>>) {
    let fingerprint = prologue
        .identity
        .as_ref()
        .map(|i| i.fingerprint.clone())
        .unwrap_or_default();

    let mut triggers = prologue_steps(collaborators, prologue);

    {
        let transport = collaborators.transport.clone();
        let store_root = store_root.clone();
        let remote = remote.clone();
        triggers.push(step("pull", move |_tok| {
            transport.pull(&store_root, &remote, "main", false).map_err(WorkflowError::from)
        }));
    }

    {
        let transport = collaborators.transport.clone();
        let store_root = store_root.clone();
        let remote = remote.clone();
        triggers.push(step("fetch-request-branches", move |_tok| {
            transport
                .fetch_and_merge_matching(&store_root, &remote, "access-request/*")
                .map_err(WorkflowError::from)
        }));
    }

    let matched: Rc<RefCell<Option<request_record::PendingRequest>>> = Rc::new(RefCell::new(None));
    let warning: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));

    {
        let crypto = collaborators.crypto.clone();
        let store_root = store_root.clone();
        let uuid_prefix = uuid_prefix.clone();
        let matched = matched.clone();
        triggers.push(step("locate-pending-request", move |_tok| {
            let pending = request_record::list_pending(&store_root, crypto.as_ref()).map_err(WorkflowError::from)?;
            let found = request_record::find_by_prefix(&pending, &uuid_prefix).map_err(WorkflowError::from)?;
            *matched.borrow_mut() = Some(found);
            Ok(())
        }));
    }

    {
        let crypto = collaborators.crypto.clone();
        let matched = matched.clone();
        triggers.push(step("import-requester-public-key", move |_tok| {
            let req = matched.borrow().clone().expect("located in prior step");
            crypto
                .import_public_key(req.public_key_armor.as_bytes())
                .map_err(|e| WorkflowError::Other(format!("failed to import requester key: {e}")))
        }));
    }

    {
        let crypto = collaborators.crypto.clone();
        let store_root = store_root.clone();
        let matched = matched.clone();
        let fingerprint = fingerprint.clone();
        triggers.push(step("rekey-subtree", move |_tok| {
            let req = matched.borrow().clone().expect("located in prior step");
            let store = Store::open(&store_root, crypto.clone(), &fingerprint);
            let dir = store.find_dir_path(&req.path, None).map_err(WorkflowError::from)?;
            let mut current = recipients::read(&dir).map_err(crate::error::StoreError::from)?;
            if !current.iter().any(|r| r == &req.fingerprint) {
                current.push(req.fingerprint.clone());
            }
            store.rekey(&dir, &current, &req.path, None).map_err(WorkflowError::from)
        }));
    }

    {
        let crypto = collaborators.crypto.clone();
        let store_root = store_root.clone();
        let matched = matched.clone();
        triggers.push(step("export-requester-key", move |_tok| {
            let req = matched.borrow().clone().expect("located in prior step");
            let armor = crypto
                .export_public_key(&req.fingerprint)
                .map_err(|e| WorkflowError::Other(format!("failed to export requester key: {e}")))?;
            let keys_dir = store_root.join("keys");
            fs::create_dir_all(&keys_dir).map_err(crate::error::StoreError::from)?;
            let key_path = keys_dir.join(format!("{}.key", req.fingerprint));
            fs::write(&key_path, &armor).map_err(crate::error::StoreError::from)?;
            set_mode_644(&key_path).map_err(crate::error::StoreError::from)?;
            Ok(())
        }));
    }

    {
        let store_root = store_root.clone();
        let matched = matched.clone();
        triggers.push(step("remove-request-blob", move |_tok| {
            let req = matched.borrow().clone().expect("located in prior step");
            request_record::remove(&store_root, &req.uuid).map_err(WorkflowError::from)
        }));
    }

    {
        let transport = collaborators.transport.clone();
        let store_root = store_root.clone();
        triggers.push(step("commit", move |_tok| {
            transport
                .commit(&store_root, "kepr: approve access request", &author_name, &author_email)
                .map_err(WorkflowError::from)
        }));
    }

    {
        let transport = collaborators.transport.clone();
        let store_root = store_root.clone();
        let remote = remote.clone();
        triggers.push(step_with_retry(
            "push",
            move |_tok| transport.push(&store_root, &remote, "main").map_err(WorkflowError::from),
            RetryPolicy::new(3, |_, _| Ok(true)),
        ));
    }

    {
        let transport = collaborators.transport.clone();
        let store_root = store_root.clone();
        let matched = matched.clone();
        let warning = warning.clone();
        triggers.push(step("delete-remote-branch", move |_tok| {
            let req = matched.borrow().clone().expect("located in prior step");
            let branch = format!("access-request/{}", req.uuid);
            if let Err(e) = transport.delete_remote_branch(&store_root, &remote, &branch) {
                *warning.borrow_mut() = Some(format!("failed to delete remote branch {branch}: {e}"));
            }
            Ok(())
        }));
    }

    (Workflow::new(triggers), warning)
}
