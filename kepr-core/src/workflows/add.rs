/* workflows/add.rs
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

//! prologue → validate GPG → validate fingerprint → derive secrets path →
//! open store → `Add` → commit → push (retry).

use crate::metadata::EntryKind;
use crate::store::Store;
use crate::workflow::{step, step_with_retry, RetryPolicy, Workflow, WorkflowError};
use crate::workflows::{prologue_steps, Collaborators, PrologueInput};
use secrecy::SecretString;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

#[allow(clippy::too_many_arguments)]
pub fn build(
    collaborators: &Collaborators,
    prologue: PrologueInput,
    store_root: PathBuf,
    logical_path: String,
    plaintext: Vec<u8>,
    kind: EntryKind,
    original_file: Option<String>,
    pin: Option<SecretString>,
    author_name: String,
    author_email: String,
    remote: String,
    branch: String,
) -> (Workflow, Rc<RefCell<Option<String>>>) {
    let fingerprint = prologue
        .identity
        .as_ref()
        .map(|i| i.fingerprint.clone())
        .unwrap_or_default();

    let mut triggers = prologue_steps(collaborators, prologue);

    let crypto = collaborators.crypto.clone();
    triggers.push(step("validate-gpg", move |_tok| {
        crypto
            .list_public_keys()
            .map(|_| ())
            .map_err(|e| WorkflowError::Other(format!("GPG engine unusable: {e}")))
    }));

    let fp_check = fingerprint.clone();
    triggers.push(step("validate-fingerprint", move |_tok| {
        if fp_check.is_empty() {
            Err(WorkflowError::Other("no fingerprint configured for this identity".into()))
        } else {
            Ok(())
        }
    }));

    let created_uuid: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));

    {
        let crypto = collaborators.crypto.clone();
        let store_root = store_root.clone();
        let logical_path = logical_path.clone();
        let plaintext = plaintext.clone();
        let original_file = original_file.clone();
        let pin = pin.clone();
        let created_uuid = created_uuid.clone();
        let fingerprint = fingerprint.clone();
        triggers.push(step("open-store-and-add", move |_tok| {
            let store = Store::open(&store_root, crypto.clone(), &fingerprint);
            let uuid = store
                .add(&logical_path, &plaintext, kind, original_file.as_deref(), pin.as_ref())
                .map_err(WorkflowError::from)?;
            *created_uuid.borrow_mut() = Some(uuid);
            Ok(())
        }));
    }

    {
        let transport = collaborators.transport.clone();
        let store_root = store_root.clone();
        let logical_path = logical_path.clone();
        triggers.push(step("commit", move |_tok| {
            transport
                .commit(&store_root, &format!("kepr: add {logical_path}"), &author_name, &author_email)
                .map_err(WorkflowError::from)
        }));
    }

    {
        let transport = collaborators.transport.clone();
        let store_root = store_root.clone();
        triggers.push(step_with_retry(
            "push",
            move |_tok| transport.push(&store_root, &remote, &branch).map_err(WorkflowError::from),
            RetryPolicy::new(3, |_, _| Ok(true)),
        ));
    }

    (Workflow::new(triggers), created_uuid)
}
