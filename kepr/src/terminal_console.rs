/* terminal_console.rs
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

//! A stdin/stdout [`Console`]. Under `KEPR_CI`, prompts auto-confirm and
//! secrets are read from stdin instead of a TTY, so scripted runs never
//! block on interactive input.

use anyhow::{Context, Result};
use kepr_core::Console;
use secrecy::SecretString;
use std::env;
use std::io::{self, BufRead, Write};

pub struct TerminalConsole {
    ci: bool,
}

impl TerminalConsole {
    pub fn new() -> Self {
        TerminalConsole { ci: env::var("KEPR_CI").is_ok() }
    }
}

impl Default for TerminalConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for TerminalConsole {
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.ci {
            return Ok(default);
        }
        let hint = if default { "Y/n" } else { "y/N" };
        print!("{prompt} [{hint}] ");
        io::stdout().flush().ok();
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).context("failed to read confirmation")?;
        let answer = line.trim().to_lowercase();
        Ok(match answer.as_str() {
            "" => default,
            "y" | "yes" => true,
            "n" | "no" => false,
            _ => default,
        })
    }

    fn prompt_line(&self, prompt: &str) -> Result<String> {
        if self.ci {
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line).context("failed to read from stdin")?;
            return Ok(line.trim().to_string());
        }
        print!("{prompt}: ");
        io::stdout().flush().ok();
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).context("failed to read input")?;
        Ok(line.trim().to_string())
    }

    fn prompt_secret(&self, prompt: &str) -> Result<SecretString> {
        if self.ci {
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line).context("failed to read secret from stdin")?;
            return Ok(SecretString::from(line.trim().to_string()));
        }
        let value = rpassword::prompt_password(format!("{prompt}: ")).context("failed to read secret")?;
        Ok(SecretString::from(value))
    }

    fn print_line(&self, message: &str) {
        println!("{message}");
    }

    fn print_warning(&self, message: &str) {
        eprintln!("warning: {message}");
    }
}
