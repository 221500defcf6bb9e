/* workflows/list.rs
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

//! prologue → derive secrets path → pull → validate GPG → open store →
//! `List` → hand entries to the caller for printing.

use crate::store::{ListEntry, Store};
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
) -> (Workflow, Rc<RefCell<Vec<ListEntry>>>) {
    let fingerprint = prologue
        .identity
        .as_ref()
        .map(|i| i.fingerprint.clone())
        .unwrap_or_default();

    let mut triggers = prologue_steps(collaborators, prologue);

    {
        let transport = collaborators.transport.clone();
        let store_root = store_root.clone();
        triggers.push(step("pull", move |_tok| {
            transport.pull(&store_root, &remote, &branch, false).map_err(WorkflowError::from)
        }));
    }

    let crypto = collaborators.crypto.clone();
    triggers.push(step("validate-gpg", move |_tok| {
        crypto
            .list_public_keys()
            .map(|_| ())
            .map_err(|e| WorkflowError::Other(format!("GPG engine unusable: {e}")))
    }));

    let result: Rc<RefCell<Vec<ListEntry>>> = Rc::new(RefCell::new(Vec::new()));

    {
        let crypto = collaborators.crypto.clone();
        let store_root = store_root.clone();
        let result = result.clone();
        let fingerprint = fingerprint.clone();
        triggers.push(step("open-store-and-list", move |_tok| {
            let store = Store::open(&store_root, crypto.clone(), &fingerprint);
            let entries = store.list(&logical_path, pin.as_ref()).map_err(WorkflowError::from)?;
            *result.borrow_mut() = entries;
            Ok(())
        }));
    }

    (Workflow::new(triggers), result)
}
