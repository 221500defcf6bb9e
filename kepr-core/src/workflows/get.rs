/* workflows/get.rs
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

//! prologue → derive secrets path → pull (silent) → validate GPG →
//! validate fingerprint → open store → `Get` → hand the plaintext to the
//! caller (stdout or an output file is a `kepr`-binary concern).

use crate::store::{Secret, Store};
use crate::workflow::{step, Workflow, WorkflowError};
use crate::workflows::{prologue_steps, Collaborators, PrologueInput};
use secrecy::SecretString;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

pub fn build(
    collaborators: &Collaborators,
    prologue: PrologueInput,
    store_root: PathBuf,
    logical_path: String,
    pin: Option<SecretString>,
    remote: String,
    branch: String,
) -> (Workflow, Rc<RefCell<Option<Secret>>>) {
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
        let branch = branch.clone();
        triggers.push(step("pull", move |_tok| {
            transport.pull(&store_root, &remote, &branch, true).map_err(WorkflowError::from)
        }));
    }

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

    let result: Rc<RefCell<Option<Secret>>> = Rc::new(RefCell::new(None));

    {
        let crypto = collaborators.crypto.clone();
        let store_root = store_root.clone();
        let result = result.clone();
        let fingerprint = fingerprint.clone();
        triggers.push(step("open-store-and-get", move |_tok| {
            let store = Store::open(&store_root, crypto.clone(), &fingerprint);
            let secret = store.get(&logical_path, pin.as_ref()).map_err(WorkflowError::from)?;
            *result.borrow_mut() = Some(secret);
            Ok(())
        }));
    }

    (Workflow::new(triggers), result)
}
