/* cli.rs
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

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "kepr")]
#[command(about = "A distributed, GPG-encrypted Git-backed secret store", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the default repository for this invocation (owner/repo)
    #[arg(short = 'r', long = "repo", global = true)]
    pub repo: Option<String>,

    /// Enable debug logging
    #[arg(short = 'd', long = "debug", global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new store backed by a fresh or existing GitHub repository
    Init {
        /// owner/repo of the remote to create
        owner_repo: String,

        /// Skip the interactive browser flow and use the device-code flow
        #[arg(long)]
        headless: bool,
    },

    /// Add a secret
    Add {
        /// Logical path of the new entry
        path: String,

        /// File to encrypt; if omitted, the password is read interactively
        file: Option<PathBuf>,
    },

    /// Decrypt and print a secret
    Get {
        /// Logical path of the entry
        path: String,

        /// Write the decrypted plaintext to this file instead of stdout
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },

    /// List entries under a path
    #[command(alias = "ls")]
    List {
        /// Logical path to list; defaults to the store root
        path: Option<String>,
    },

    /// Request access to a path
    Request {
        /// Logical path to request access to
        path: String,
    },

    /// Approve a pending access request
    Approve {
        /// UUID prefix of the pending request
        uuid_prefix: String,
    },

    /// Switch the default repository
    Use {
        /// owner/repo to make the default
        owner_repo: String,
    },
}
