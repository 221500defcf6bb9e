/* workflows/mod.rs
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

//! The six user-level workflows, each a `Workflow` built from `Step`s that
//! call into `Store`, `CryptoAdapter`, and the `Transport`/`Hoster`/
//! `Console` trait objects supplied by the `kepr` binary.

pub mod add;
pub mod approve;
pub mod get;
pub mod init;
pub mod list;
pub mod request;

use crate::console::Console;
use crate::crypto::CryptoAdapter;
use crate::hoster::Hoster;
use crate::identity::Identity;
use crate::transport::Transport;
use crate::workflow::{step, Trigger, WorkflowError};
use std::rc::Rc;

/// The external collaborators every workflow is built against.
#[derive(Clone)]
pub struct Collaborators {
    pub transport: Rc<dyn Transport>,
    pub hoster: Rc<dyn Hoster>,
    pub console: Rc<dyn Console>,
    pub crypto: Rc<dyn CryptoAdapter>,
}

/// What the shared prologue needs from the caller: the already-loaded
/// token and identity (or their absence), and the hoster-reported email
/// to cross-check against the stored one.
pub struct PrologueInput {
    pub token: Option<String>,
    pub config_dir_exists: bool,
    pub identity: Option<Identity>,
}

/// `validate token → validate config dir → validate user identity →
/// validate GitHub identity`. Appended to the front of every workflow's
/// trigger list.
pub fn prologue_steps(collaborators: &Collaborators, input: PrologueInput) -> Vec<Trigger> {
    let hoster = collaborators.hoster.clone();
    vec![
        step("validate-token", {
            let token = input.token.clone();
            move |_tok| {
                if token.as_deref().unwrap_or("").is_empty() {
                    Err(WorkflowError::Other("not authenticated: run `kepr init` first".into()))
                } else {
                    Ok(())
                }
            }
        }),
        step("validate-config-dir", move |_tok| {
            if input.config_dir_exists {
                Ok(())
            } else {
                Err(WorkflowError::Other("config directory missing: run `kepr init` first".into()))
            }
        }),
        step("validate-user-identity", {
            let identity = input.identity.clone();
            move |_tok| {
                if identity.is_some() {
                    Ok(())
                } else {
                    Err(WorkflowError::Other("no identity configured for this repo".into()))
                }
            }
        }),
        step("validate-github-identity", {
            let identity = input.identity.clone();
            let hoster = hoster.clone();
            let token = input.token.clone();
            move |_tok| {
                let Some(identity) = identity.clone() else {
                    return Err(WorkflowError::Other("no identity configured for this repo".into()));
                };
                let Some(token) = token.clone() else {
                    return Err(WorkflowError::Other("not authenticated".into()));
                };
                let (_name, email) = hoster
                    .get_user_identity(&token)
                    .map_err(|e| WorkflowError::Other(format!("failed to fetch GitHub identity: {e}")))?;
                if email != identity.email {
                    return Err(WorkflowError::Other(format!(
                        "GitHub account email {email} does not match configured identity email {}",
                        identity.email
                    )));
                }
                Ok(())
            }
        }),
    ]
}
