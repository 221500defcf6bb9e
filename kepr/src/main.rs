/* main.rs
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

mod cli;
mod config;
mod error;
mod git_transport;
mod github_hoster;
mod terminal_console;
mod yubikey;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use config::IdentityConfig;
use error::ConfigError;
use git_transport::GitTransport;
use github_hoster::GithubHoster;
use kepr_core::workflows::{self, Collaborators, PrologueInput};
use kepr_core::{CancellationToken, Console, GpgmeAdapter, Identity};
use secrecy::ExposeSecret;
use std::fs;
use std::io::{Read, Write};
use std::rc::Rc;
use terminal_console::TerminalConsole;
use yubikey::{OpenPgpCardProvisioner, YubikeyProvisioner};

const GITHUB_OAUTH_CLIENT_ID: &str = "Iv1.kepr-cli";

fn main() {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_home = kepr_core::config_home::discover_config_home()?;
    let mut cfg = config::load(&config_home)?;

    match cli.command {
        Commands::Init { owner_repo, headless } => cmd_init(&config_home, &mut cfg, &owner_repo, headless),
        Commands::Use { owner_repo } => cmd_use(&config_home, &mut cfg, &owner_repo),
        Commands::Add { path, file } => cmd_add(&config_home, &cfg, cli.repo.as_deref(), &path, file),
        Commands::Get { path, output } => cmd_get(&config_home, &cfg, cli.repo.as_deref(), &path, output),
        Commands::List { path } => cmd_list(&config_home, &cfg, cli.repo.as_deref(), path.as_deref()),
        Commands::Request { path } => cmd_request(&config_home, &cfg, cli.repo.as_deref(), &path),
        Commands::Approve { uuid_prefix } => cmd_approve(&config_home, &cfg, cli.repo.as_deref(), &uuid_prefix),
    }
}

/// Resolve which `owner/repo` an invocation targets: the `-r` override, or
/// the configured default.
fn resolve_repo<'a>(cfg: &'a config::Config, override_repo: Option<&'a str>) -> Result<&'a str> {
    override_repo
        .or(cfg.default_repo.as_deref())
        .ok_or_else(|| anyhow!(ConfigError::NotAuthenticated))
}

fn build_collaborators(gpg_home: &std::path::Path) -> Result<Collaborators> {
    let crypto = Rc::new(GpgmeAdapter::new(gpg_home).context("failed to initialize GPG engine")?);
    Ok(Collaborators {
        transport: Rc::new(GitTransport::new()),
        hoster: Rc::new(GithubHoster::new()?),
        console: Rc::new(TerminalConsole::new()),
        crypto,
    })
}

fn prologue_input(cfg: &config::Config, owner_repo: &str) -> PrologueInput {
    let identity = cfg.identity_for_repo(owner_repo).map(|(fp, id)| Identity {
        fingerprint: fp.to_string(),
        name: id.name.clone(),
        email: id.email.clone(),
    });
    PrologueInput {
        token: cfg.github_token.clone(),
        config_dir_exists: true,
        identity,
    }
}

fn cmd_init(config_home: &std::path::Path, cfg: &mut config::Config, owner_repo: &str, headless: bool) -> Result<()> {
    let (owner, repo) = owner_repo
        .split_once('/')
        .ok_or_else(|| anyhow!("expected <owner>/<repo>, got `{owner_repo}`"))?;

    let gpg_home = kepr_core::config_home::gpg_home(&config_home.to_path_buf());
    let store_root = kepr_core::config_home::repo_store_dir(&config_home.to_path_buf(), owner, repo);
    let collaborators = build_collaborators(&gpg_home)?;

    let console = TerminalConsole::new();
    let name = console.prompt_line("Your name")?;
    let email = console.prompt_line("Your email")?;

    let mut existing_fingerprint = cfg
        .identities
        .iter()
        .find(|(_, id)| id.email == email)
        .map(|(fp, _)| fp.clone());

    let provisioner = OpenPgpCardProvisioner;
    let mut yubikey_serial = None;
    let mut yubikey_admin_pin = None;
    let mut yubikey_user_pin = None;

    match &existing_fingerprint {
        None => {
            if let Some(serial) = provisioner.probe().unwrap_or(None) {
                if console.confirm(&format!("YubiKey {serial} detected; provision OpenPGP keys on the card?"), false)? {
                    let admin_pin = console.prompt_secret("Admin PIN")?;
                    let user_pin = console.prompt_secret("User PIN")?;
                    let fingerprint = provisioner
                        .generate_on_card(&serial, &name, &email, &admin_pin, &user_pin)
                        .context("failed to provision OpenPGP smart card")?;
                    existing_fingerprint = Some(fingerprint);
                    yubikey_serial = Some(serial);
                    yubikey_admin_pin = Some(admin_pin.expose_secret().to_string());
                    yubikey_user_pin = Some(user_pin.expose_secret().to_string());
                }
            }
        }
        Some(fp) => {
            if let Some(existing_identity) = cfg.identities.get(fp) {
                if let Some(serial) = &existing_identity.yubikey_serial {
                    yubikey_serial = Some(serial.clone());
                    yubikey_admin_pin = existing_identity.yubikey_admin_pin.clone();
                    yubikey_user_pin = match yubikey::stored_pin(&existing_identity.yubikey_user_pin) {
                        Some(pin) if provisioner.verify_user_pin(serial, &pin).is_ok() => {
                            existing_identity.yubikey_user_pin.clone()
                        }
                        Some(_) => Some("manual".to_string()),
                        None => existing_identity.yubikey_user_pin.clone(),
                    };
                }
            }
        }
    }

    let config_home_owned = config_home.to_path_buf();
    let config_home_for_token = config_home_owned.clone();
    let mut cfg_for_token = cfg.clone();
    let on_token: Box<dyn FnMut(&str) -> Result<(), kepr_core::error::WorkflowError>> = Box::new(move |token| {
        cfg_for_token.github_token = Some(token.to_string());
        config::save(&config_home_for_token, &cfg_for_token)
            .map_err(|e| kepr_core::error::WorkflowError::Other(e.to_string()))?;
        Ok(())
    });

    let name_for_fp = name.clone();
    let email_for_fp = email.clone();
    let config_home_for_fp = config_home_owned.clone();
    let owner_owned = owner.to_string();
    let repo_owned = repo.to_string();
    let on_fingerprint: Box<dyn FnMut(&str) -> Result<(), kepr_core::error::WorkflowError>> = Box::new(move |fp| {
        let mut latest = config::load(&config_home_for_fp)
            .map_err(|e| kepr_core::error::WorkflowError::Other(e.to_string()))?;
        latest.set_identity(
            fp,
            IdentityConfig {
                name: name_for_fp.clone(),
                email: email_for_fp.clone(),
                yubikey_serial: yubikey_serial.clone(),
                yubikey_admin_pin: yubikey_admin_pin.clone(),
                yubikey_user_pin: yubikey_user_pin.clone(),
            },
        );
        latest.set_repo(&format!("{owner_owned}/{repo_owned}"), fp);
        latest.set_default_repo(&format!("{owner_owned}/{repo_owned}"));
        config::save(&config_home_for_fp, &latest).map_err(|e| kepr_core::error::WorkflowError::Other(e.to_string()))?;
        Ok(())
    });

    let freshly_generated = existing_fingerprint.is_none();
    let backup_dir = kepr_core::config_home::backup_dir(&config_home.to_path_buf());
    let params = workflows::init::InitParams {
        use_pkce: !headless,
        client_id: GITHUB_OAUTH_CLIENT_ID.to_string(),
        owner: owner.to_string(),
        repo: repo.to_string(),
        name: name.clone(),
        email: email.clone(),
        existing_fingerprint,
        backup_dir: backup_dir.clone(),
        store_root,
        author_name: name,
        author_email: email,
        on_token,
        on_fingerprint,
    };

    let (mut workflow, _output) = workflows::init::build(&collaborators, params);
    workflow.run(&CancellationToken::new()).map_err(|e| anyhow!(e.to_string()))?;

    *cfg = config::load(config_home)?;
    console.print_line(&format!("Initialized kepr store for {owner}/{repo}"));
    if freshly_generated {
        console.print_line(&format!(
            "Master key backed up to {}; move it to offline, operator-held storage.",
            backup_dir.display()
        ));
    }
    Ok(())
}

fn cmd_use(config_home: &std::path::Path, cfg: &mut config::Config, owner_repo: &str) -> Result<()> {
    if !cfg.repos.contains_key(owner_repo) {
        bail!("no store configured for {owner_repo}; run `kepr init {owner_repo}` first");
    }
    cfg.set_default_repo(owner_repo);
    config::save(config_home, cfg)
}

fn cmd_add(
    config_home: &std::path::Path,
    cfg: &config::Config,
    repo_override: Option<&str>,
    path: &str,
    file: Option<std::path::PathBuf>,
) -> Result<()> {
    let owner_repo = resolve_repo(cfg, repo_override)?;
    let (owner, repo) = owner_repo.split_once('/').ok_or_else(|| anyhow!("malformed default_repo"))?;
    let (_fingerprint, identity) = cfg
        .identity_for_repo(owner_repo)
        .ok_or(ConfigError::IdentityNotConfigured)?;

    let gpg_home = kepr_core::config_home::gpg_home(&config_home.to_path_buf());
    let store_root = kepr_core::config_home::repo_store_dir(&config_home.to_path_buf(), owner, repo);
    let collaborators = build_collaborators(&gpg_home)?;
    let prologue = prologue_input(cfg, owner_repo);

    let (plaintext, kind, original_file) = match &file {
        Some(path) => {
            let mut data = Vec::new();
            fs::File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?
                .read_to_end(&mut data)?;
            (data, kepr_core::EntryKind::File, path.file_name().map(|n| n.to_string_lossy().into_owned()))
        }
        None => {
            let console = TerminalConsole::new();
            let secret = console.prompt_secret("Password")?;
            (secret.expose_secret().as_bytes().to_vec(), kepr_core::EntryKind::Password, None)
        }
    };

    let pin = pin_for_identity(identity);
    let (mut workflow, result) = workflows::add::build(
        &collaborators,
        prologue,
        store_root,
        path.to_string(),
        plaintext,
        kind,
        original_file,
        pin,
        identity.name.clone(),
        identity.email.clone(),
        "origin".to_string(),
        "main".to_string(),
    );
    workflow.run(&CancellationToken::new()).map_err(|e| anyhow!(e.to_string()))?;
    if let Some(uuid) = result.borrow().clone() {
        println!("added {path} ({uuid})");
    }
    Ok(())
}

fn cmd_get(
    config_home: &std::path::Path,
    cfg: &config::Config,
    repo_override: Option<&str>,
    path: &str,
    output: Option<std::path::PathBuf>,
) -> Result<()> {
    let owner_repo = resolve_repo(cfg, repo_override)?;
    let (owner, repo) = owner_repo.split_once('/').ok_or_else(|| anyhow!("malformed default_repo"))?;
    let (_fingerprint, identity) = cfg
        .identity_for_repo(owner_repo)
        .ok_or(ConfigError::IdentityNotConfigured)?;

    let gpg_home = kepr_core::config_home::gpg_home(&config_home.to_path_buf());
    let store_root = kepr_core::config_home::repo_store_dir(&config_home.to_path_buf(), owner, repo);
    let collaborators = build_collaborators(&gpg_home)?;
    let prologue = prologue_input(cfg, owner_repo);
    let pin = pin_for_identity(identity);

    let (mut workflow, result) = workflows::get::build(
        &collaborators,
        prologue,
        store_root,
        path.to_string(),
        pin,
        "origin".to_string(),
        "main".to_string(),
    );
    workflow.run(&CancellationToken::new()).map_err(|e| anyhow!(e.to_string()))?;

    let secret = result.borrow_mut().take().ok_or_else(|| anyhow!("no secret returned"))?;
    match output {
        Some(dest) => {
            fs::write(&dest, &secret.plaintext).with_context(|| format!("failed to write {}", dest.display()))?;
        }
        None => {
            std::io::stdout().write_all(&secret.plaintext)?;
            if secret.metadata.kind == kepr_core::EntryKind::Password {
                println!();
            }
        }
    }
    Ok(())
}

fn cmd_list(
    config_home: &std::path::Path,
    cfg: &config::Config,
    repo_override: Option<&str>,
    path: Option<&str>,
) -> Result<()> {
    let owner_repo = resolve_repo(cfg, repo_override)?;
    let (owner, repo) = owner_repo.split_once('/').ok_or_else(|| anyhow!("malformed default_repo"))?;
    let (_fingerprint, identity) = cfg
        .identity_for_repo(owner_repo)
        .ok_or(ConfigError::IdentityNotConfigured)?;

    let gpg_home = kepr_core::config_home::gpg_home(&config_home.to_path_buf());
    let store_root = kepr_core::config_home::repo_store_dir(&config_home.to_path_buf(), owner, repo);
    let collaborators = build_collaborators(&gpg_home)?;
    let prologue = prologue_input(cfg, owner_repo);
    let pin = pin_for_identity(identity);

    let (mut workflow, result) = workflows::list::build(
        &collaborators,
        prologue,
        store_root,
        path.unwrap_or("").to_string(),
        pin,
        "origin".to_string(),
        "main".to_string(),
    );
    workflow.run(&CancellationToken::new()).map_err(|e| anyhow!(e.to_string()))?;

    for entry in result.borrow().iter() {
        let marker = match entry.kind {
            kepr_core::EntryKind::Dir => "/",
            _ => "",
        };
        println!("{}{marker}", entry.name);
    }
    Ok(())
}

fn cmd_request(
    config_home: &std::path::Path,
    cfg: &config::Config,
    repo_override: Option<&str>,
    path: &str,
) -> Result<()> {
    let owner_repo = resolve_repo(cfg, repo_override)?;
    let (owner, repo) = owner_repo.split_once('/').ok_or_else(|| anyhow!("malformed default_repo"))?;
    let (fingerprint, identity) = cfg
        .identity_for_repo(owner_repo)
        .ok_or(ConfigError::IdentityNotConfigured)?;

    let gpg_home = kepr_core::config_home::gpg_home(&config_home.to_path_buf());
    let store_root = kepr_core::config_home::repo_store_dir(&config_home.to_path_buf(), owner, repo);
    let collaborators = build_collaborators(&gpg_home)?;
    let prologue = prologue_input(cfg, owner_repo);

    let (mut workflow, result) = workflows::request::build(
        &collaborators,
        prologue,
        store_root,
        fingerprint.to_string(),
        path.to_string(),
        identity.name.clone(),
        identity.email.clone(),
        "origin".to_string(),
    );
    workflow.run(&CancellationToken::new()).map_err(|e| anyhow!(e.to_string()))?;

    if let Some(uuid) = result.borrow().clone() {
        println!("requested access to {path} ({uuid})");
    }
    Ok(())
}

fn cmd_approve(
    config_home: &std::path::Path,
    cfg: &config::Config,
    repo_override: Option<&str>,
    uuid_prefix: &str,
) -> Result<()> {
    let owner_repo = resolve_repo(cfg, repo_override)?;
    let (owner, repo) = owner_repo.split_once('/').ok_or_else(|| anyhow!("malformed default_repo"))?;
    let (_fingerprint, identity) = cfg
        .identity_for_repo(owner_repo)
        .ok_or(ConfigError::IdentityNotConfigured)?;

    let gpg_home = kepr_core::config_home::gpg_home(&config_home.to_path_buf());
    let store_root = kepr_core::config_home::repo_store_dir(&config_home.to_path_buf(), owner, repo);
    let collaborators = build_collaborators(&gpg_home)?;
    let prologue = prologue_input(cfg, owner_repo);

    let (mut workflow, warning) = workflows::approve::build(
        &collaborators,
        prologue,
        store_root,
        uuid_prefix.to_string(),
        identity.name.clone(),
        identity.email.clone(),
        "origin".to_string(),
    );
    workflow.run(&CancellationToken::new()).map_err(|e| anyhow!(e.to_string()))?;

    if let Some(msg) = warning.borrow().clone() {
        eprintln!("warning: {msg}");
    }
    println!("approved {uuid_prefix}");
    Ok(())
}

fn pin_for_identity(identity: &IdentityConfig) -> Option<secrecy::SecretString> {
    yubikey::stored_pin(&identity.yubikey_user_pin)
}
