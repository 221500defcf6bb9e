/* workflows/request.rs
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

//! validate → pull → scan store (fail if fingerprint already present) →
//! import root public key(s) from `keys/` → generate UUID → create branch
//! `access-request/<uuid>` → export requester's public key → assemble JSON
//! → encrypt to root recipients → write `requests/<uuid>.json.gpg` →
//! commit → push branch (retry).

use crate::recipients;
use crate::request as request_record;
use crate::store::scan_fingerprint;
use crate::workflow::{step, step_with_retry, RetryPolicy, Workflow, WorkflowError};
use crate::workflows::{prologue_steps, Collaborators, PrologueInput};
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

#[allow(clippy::too_many_arguments)]
pub fn build(
    collaborators: &Collaborators,
    prologue: PrologueInput,
    store_root: PathBuf,
    fingerprint: String,
    logical_path: String,
    author_name: String,
    author_email: String,
    remote: String,
) -> (Workflow, Rc<RefCell<Option<String>>>) {
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
        let store_root = store_root.clone();
        let fingerprint = fingerprint.clone();
        triggers.push(step("scan-store", move |_tok| {
            if scan_fingerprint(&store_root, &fingerprint) {
                Err(WorkflowError::Request(crate::error::RequestError::AlreadyHasAccess(fingerprint.clone())))
            } else {
                Ok(())
            }
        }));
    }

    {
        let crypto = collaborators.crypto.clone();
        let store_root = store_root.clone();
        triggers.push(step("import-root-public-keys", move |_tok| {
            let keys_dir = store_root.join("keys");
            let Ok(entries) = fs::read_dir(&keys_dir) else {
                return Ok(());
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("key") {
                    if let Ok(armored) = fs::read(&path) {
                        let _ = crypto.import_public_key(&armored);
                    }
                }
            }
            Ok(())
        }));
    }

    let uuid_slot: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));

    {
        let uuid_slot = uuid_slot.clone();
        triggers.push(step("generate-uuid", move |_tok| {
            *uuid_slot.borrow_mut() = Some(request_record::generate_uuid());
            Ok(())
        }));
    }

    {
        let transport = collaborators.transport.clone();
        let store_root = store_root.clone();
        let uuid_slot = uuid_slot.clone();
        triggers.push(step("create-branch", move |_tok| {
            let uuid = uuid_slot.borrow().clone().expect("uuid generated in prior step");
            transport
                .create_branch(&store_root, &format!("access-request/{uuid}"))
                .map_err(WorkflowError::from)
        }));
    }

    {
        let crypto = collaborators.crypto.clone();
        let store_root = store_root.clone();
        let fingerprint = fingerprint.clone();
        let logical_path = logical_path.clone();
        let uuid_slot = uuid_slot.clone();
        triggers.push(step("assemble-and-write-request", move |_tok| {
            let armor = crypto
                .export_public_key(&fingerprint)
                .map_err(|e| WorkflowError::Other(format!("failed to export public key: {e}")))?;
            let root_recipients = recipients::read(&store_root).map_err(crate::error::StoreError::from)?;
            let mut req = request_record::PendingRequest::new(
                fingerprint.clone(),
                logical_path.clone(),
                String::from_utf8_lossy(&armor).into_owned(),
            );
            if let Some(uuid) = uuid_slot.borrow().clone() {
                req.uuid = uuid;
            }
            request_record::save(&store_root, &req, crypto.as_ref(), &root_recipients).map_err(WorkflowError::from)?;
            Ok(())
        }));
    }

    {
        let transport = collaborators.transport.clone();
        let store_root = store_root.clone();
        triggers.push(step("commit", move |_tok| {
            transport
                .commit(&store_root, "kepr: request access", &author_name, &author_email)
                .map_err(WorkflowError::from)
        }));
    }

    {
        let transport = collaborators.transport.clone();
        let store_root = store_root.clone();
        let uuid_slot = uuid_slot.clone();
        triggers.push(step_with_retry(
            "push-branch",
            move |_tok| {
                let uuid = uuid_slot.borrow().clone().expect("uuid generated in prior step");
                transport
                    .push(&store_root, &remote, &format!("access-request/{uuid}"))
                    .map_err(WorkflowError::from)
            },
            RetryPolicy::new(3, |_, _| Ok(true)),
        ));
    }

    (Workflow::new(triggers), uuid_slot)
}
