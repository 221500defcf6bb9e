/* console.rs
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

//! The interactive console boundary: prompts and confirmations. Under
//! `KEPR_CI`, the binary's implementation auto-confirms instead of reading
//! a TTY.

use secrecy::SecretString;

pub trait Console {
    fn confirm(&self, prompt: &str, default: bool) -> anyhow::Result<bool>;
    fn prompt_line(&self, prompt: &str) -> anyhow::Result<String>;
    fn prompt_secret(&self, prompt: &str) -> anyhow::Result<SecretString>;
    fn print_line(&self, message: &str);
    fn print_warning(&self, message: &str);
}
