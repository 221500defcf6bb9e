/* tests/scenarios.rs
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

//! End-to-end coverage driving the six `kepr_core::workflows` builders
//! through in-memory `Transport`/`Hoster`/`Console`/`CryptoAdapter`
//! doubles, instead of exercising `Store` directly as the unit tests in
//! `store.rs` do.

use kepr_core::error::CryptoError;
use kepr_core::identity::Identity;
use kepr_core::metadata::EntryKind;
use kepr_core::store::Store;
use kepr_core::workflows::{init, Collaborators, PrologueInput};
use kepr_core::{console::Console, crypto::CryptoAdapter, hoster::Hoster, transport::Transport};
use kepr_core::crypto::PublicKeyInfo;
use secrecy::SecretString;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use tempfile::tempdir;

/// A crypto double that, unlike `store.rs`'s fixture, actually enforces
/// recipient membership on decrypt: each instance models one identity's
/// own `GNUPGHOME`, and can only decrypt ciphertext addressed to it.
/// `export_public_key`/`import_public_key` model a keyring that starts
/// out knowing only its own fingerprint and grows as keys are imported.
struct FakeCrypto {
    fingerprint: String,
    known: RefCell<HashSet<String>>,
}

impl FakeCrypto {
    fn new(fingerprint: impl Into<String>) -> Rc<Self> {
        let fingerprint = fingerprint.into();
        let known = RefCell::new(HashSet::from([fingerprint.clone()]));
        Rc::new(FakeCrypto { fingerprint, known })
    }
}

impl CryptoAdapter for FakeCrypto {
    fn encrypt(&self, plaintext: &[u8], recipients: &[String]) -> Result<Vec<u8>, CryptoError> {
        let known = self.known.borrow();
        for r in recipients {
            if !known.contains(r) {
                return Err(CryptoError::Encrypt(format!("unknown recipient key: {r}")));
            }
        }
        let mut out = serde_json::to_vec(recipients).unwrap();
        out.push(0);
        out.extend_from_slice(plaintext);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8], _pin: Option<&SecretString>) -> Result<Vec<u8>, CryptoError> {
        let sep = ciphertext
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| CryptoError::Decrypt("malformed fixture payload".into()))?;
        let recipients: Vec<String> = serde_json::from_slice(&ciphertext[..sep])
            .map_err(|e| CryptoError::Decrypt(e.to_string()))?;
        if !recipients.iter().any(|r| r == &self.fingerprint) {
            return Err(CryptoError::Decrypt("not a recipient".into()));
        }
        Ok(ciphertext[sep + 1..].to_vec())
    }

    fn list_public_keys(&self) -> Result<Vec<PublicKeyInfo>, CryptoError> {
        Ok(Vec::new())
    }

    fn import_public_key(&self, armored: &[u8]) -> Result<(), CryptoError> {
        let text = String::from_utf8_lossy(armored);
        match text.strip_prefix("FAKE-KEY:") {
            Some(fp) => {
                self.known.borrow_mut().insert(fp.trim().to_string());
                Ok(())
            }
            None => Err(CryptoError::ImportFailed),
        }
    }

    fn export_public_key(&self, fingerprint: &str) -> Result<Vec<u8>, CryptoError> {
        if !self.known.borrow().contains(fingerprint) {
            return Err(CryptoError::ExportEmpty);
        }
        Ok(format!("FAKE-KEY:{fingerprint}").into_bytes())
    }

    fn export_secret_key_backup(&self, fingerprint: &str) -> Result<Vec<u8>, CryptoError> {
        if !self.known.borrow().contains(fingerprint) {
            return Err(CryptoError::BackupFailed("unknown fingerprint".to_string()));
        }
        Ok(format!("FAKE-SECRET-KEY:{fingerprint}").into_bytes())
    }

    fn generate_keypair(&self, _name: &str, _email: &str) -> Result<String, CryptoError> {
        Ok(self.fingerprint.clone())
    }
}

struct NoopTransport;

impl Transport for NoopTransport {
    fn init(&self, _dir: &std::path::Path) -> anyhow::Result<()> {
        Ok(())
    }
    fn commit(&self, _dir: &std::path::Path, _message: &str, _author_name: &str, _author_email: &str) -> anyhow::Result<()> {
        Ok(())
    }
    fn configure_remote(&self, _dir: &std::path::Path, _name: &str, _url: &str) -> anyhow::Result<()> {
        Ok(())
    }
    fn push(&self, _dir: &std::path::Path, _remote: &str, _branch: &str) -> anyhow::Result<()> {
        Ok(())
    }
    fn pull(&self, _dir: &std::path::Path, _remote: &str, _branch: &str, _silent: bool) -> anyhow::Result<()> {
        Ok(())
    }
    fn create_branch(&self, _dir: &std::path::Path, _name: &str) -> anyhow::Result<()> {
        Ok(())
    }
    fn delete_remote_branch(&self, _dir: &std::path::Path, _remote: &str, _name: &str) -> anyhow::Result<()> {
        Ok(())
    }
    fn clone(&self, _url: &str, _dir: &std::path::Path) -> anyhow::Result<()> {
        Ok(())
    }
    fn fetch_and_merge_matching(&self, _dir: &std::path::Path, _remote: &str, _glob: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A transport whose `push` fails a fixed number of times before
/// succeeding, for exercising `RetryPolicy` through a real workflow.
struct FlakyPushTransport {
    failures_remaining: RefCell<u32>,
}

impl Transport for FlakyPushTransport {
    fn init(&self, _dir: &std::path::Path) -> anyhow::Result<()> {
        Ok(())
    }
    fn commit(&self, _dir: &std::path::Path, _message: &str, _author_name: &str, _author_email: &str) -> anyhow::Result<()> {
        Ok(())
    }
    fn configure_remote(&self, _dir: &std::path::Path, _name: &str, _url: &str) -> anyhow::Result<()> {
        Ok(())
    }
    fn push(&self, _dir: &std::path::Path, _remote: &str, _branch: &str) -> anyhow::Result<()> {
        let mut remaining = self.failures_remaining.borrow_mut();
        if *remaining > 0 {
            *remaining -= 1;
            anyhow::bail!("transient push rejection")
        }
        Ok(())
    }
    fn pull(&self, _dir: &std::path::Path, _remote: &str, _branch: &str, _silent: bool) -> anyhow::Result<()> {
        Ok(())
    }
    fn create_branch(&self, _dir: &std::path::Path, _name: &str) -> anyhow::Result<()> {
        Ok(())
    }
    fn delete_remote_branch(&self, _dir: &std::path::Path, _remote: &str, _name: &str) -> anyhow::Result<()> {
        Ok(())
    }
    fn clone(&self, _url: &str, _dir: &std::path::Path) -> anyhow::Result<()> {
        Ok(())
    }
    fn fetch_and_merge_matching(&self, _dir: &std::path::Path, _remote: &str, _glob: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

struct FakeHoster {
    name: String,
    email: String,
    repo_exists: std::cell::Cell<bool>,
}

impl FakeHoster {
    fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        FakeHoster { name: name.into(), email: email.into(), repo_exists: std::cell::Cell::new(false) }
    }
}

impl Hoster for FakeHoster {
    fn authenticate_device_code(&self, _client_id: &str) -> anyhow::Result<String> {
        Ok("fake-token".to_string())
    }
    fn authenticate_pkce(&self, _client_id: &str) -> anyhow::Result<String> {
        Ok("fake-token".to_string())
    }
    fn get_user_identity(&self, _token: &str) -> anyhow::Result<(String, String)> {
        Ok((self.name.clone(), self.email.clone()))
    }
    fn get_current_user_login(&self, _token: &str) -> anyhow::Result<String> {
        Ok(self.name.clone())
    }
    fn check_repo_exists(&self, _token: &str, _owner: &str, _name: &str) -> anyhow::Result<bool> {
        Ok(self.repo_exists.get())
    }
    fn create_repo(&self, _token: &str, _name: &str, _private: bool) -> anyhow::Result<()> {
        self.repo_exists.set(true);
        Ok(())
    }
    fn get_clone_url(&self, _token: &str, owner: &str, name: &str) -> anyhow::Result<String> {
        Ok(format!("https://fake.example/{owner}/{name}.git"))
    }
}

struct NoopConsole;

impl Console for NoopConsole {
    fn confirm(&self, _prompt: &str, default: bool) -> anyhow::Result<bool> {
        Ok(default)
    }
    fn prompt_line(&self, _prompt: &str) -> anyhow::Result<String> {
        Ok(String::new())
    }
    fn prompt_secret(&self, _prompt: &str) -> anyhow::Result<SecretString> {
        Ok(SecretString::from(String::new()))
    }
    fn print_line(&self, _message: &str) {}
    fn print_warning(&self, _message: &str) {}
}

fn collaborators_for(crypto: Rc<dyn CryptoAdapter>, hoster: Rc<dyn Hoster>, transport: Rc<dyn Transport>) -> Collaborators {
    Collaborators { transport, hoster, console: Rc::new(NoopConsole), crypto }
}

fn prologue_for(identity: &Identity) -> PrologueInput {
    PrologueInput {
        token: Some("fake-token".to_string()),
        config_dir_exists: true,
        identity: Some(identity.clone()),
    }
}

#[test]
fn init_then_add_then_get_round_trips() {
    let dir = tempdir().unwrap();
    let store_root = dir.path().join("secrets");

    let crypto: Rc<dyn CryptoAdapter> = FakeCrypto::new("OWNERFP");
    let hoster: Rc<dyn Hoster> = Rc::new(FakeHoster::new("Alice", "alice@example.com"));
    let collaborators = collaborators_for(crypto.clone(), hoster, Rc::new(NoopTransport));

    let params = init::InitParams {
        use_pkce: false,
        client_id: "test-client".to_string(),
        owner: "alice".to_string(),
        repo: "secrets".to_string(),
        name: "Alice".to_string(),
        email: "alice@example.com".to_string(),
        existing_fingerprint: None,
        backup_dir: dir.path().join("backup"),
        store_root: store_root.clone(),
        author_name: "Alice".to_string(),
        author_email: "alice@example.com".to_string(),
        on_token: Box::new(|_token| Ok(())),
        on_fingerprint: Box::new(|_fp| Ok(())),
    };
    let (mut workflow, output) = init::build(&collaborators, params);
    workflow.run(&kepr_core::CancellationToken::new()).unwrap();
    let fingerprint = output.fingerprint.borrow().clone().unwrap();
    assert_eq!(fingerprint, "OWNERFP");
    assert!(store_root.join(".gpg.id").is_file());
    assert!(
        dir.path().join("backup").join(format!("{fingerprint}.asc")).is_file(),
        "a freshly generated identity must get its master key backed up offline"
    );

    let identity = Identity { fingerprint: fingerprint.clone(), name: "Alice".to_string(), email: "alice@example.com".to_string() };

    let (mut add_wf, add_uuid) = kepr_core::workflows::add::build(
        &collaborators,
        prologue_for(&identity),
        store_root.clone(),
        "aws/prod/db".to_string(),
        b"hunter2".to_vec(),
        EntryKind::Password,
        None,
        None,
        "Alice".to_string(),
        "alice@example.com".to_string(),
        "origin".to_string(),
        "main".to_string(),
    );
    add_wf.run(&kepr_core::CancellationToken::new()).unwrap();
    assert!(add_uuid.borrow().is_some());

    let (mut get_wf, secret) = kepr_core::workflows::get::build(
        &collaborators,
        prologue_for(&identity),
        store_root,
        "aws/prod/db".to_string(),
        None,
        "origin".to_string(),
        "main".to_string(),
    );
    get_wf.run(&kepr_core::CancellationToken::new()).unwrap();
    assert_eq!(secret.borrow().as_ref().unwrap().plaintext, b"hunter2");
}

#[test]
fn add_and_get_file_round_trips_with_original_name() {
    let dir = tempdir().unwrap();
    let store_root = dir.path().to_path_buf();
    let crypto: Rc<dyn CryptoAdapter> = FakeCrypto::new("OWNERFP");
    let store = Store::open(&store_root, crypto.clone(), "");
    store.init(&["OWNERFP".to_string()]).unwrap();

    let hoster: Rc<dyn Hoster> = Rc::new(FakeHoster::new("Alice", "alice@example.com"));
    let collaborators = collaborators_for(crypto, hoster, Rc::new(NoopTransport));
    let identity = Identity { fingerprint: "OWNERFP".to_string(), name: "Alice".to_string(), email: "alice@example.com".to_string() };

    let (mut add_wf, _) = kepr_core::workflows::add::build(
        &collaborators,
        prologue_for(&identity),
        store_root.clone(),
        "ssh/bastion/main.pem".to_string(),
        b"PEM-BYTES".to_vec(),
        EntryKind::File,
        Some("bastion_key.pem".to_string()),
        None,
        "Alice".to_string(),
        "alice@example.com".to_string(),
        "origin".to_string(),
        "main".to_string(),
    );
    add_wf.run(&kepr_core::CancellationToken::new()).unwrap();

    let (mut get_wf, secret) = kepr_core::workflows::get::build(
        &collaborators,
        prologue_for(&identity),
        store_root,
        "ssh/bastion/main.pem".to_string(),
        None,
        "origin".to_string(),
        "main".to_string(),
    );
    get_wf.run(&kepr_core::CancellationToken::new()).unwrap();
    let secret = secret.borrow().clone().unwrap();
    assert_eq!(secret.plaintext, b"PEM-BYTES");
    assert_eq!(secret.metadata.original_file.as_deref(), Some("bastion_key.pem"));
}

#[test]
fn list_workflow_reports_sorted_hierarchy() {
    let dir = tempdir().unwrap();
    let store_root = dir.path().to_path_buf();
    let crypto: Rc<dyn CryptoAdapter> = FakeCrypto::new("OWNERFP");
    let store = Store::open(&store_root, crypto.clone(), "");
    store.init(&["OWNERFP".to_string()]).unwrap();
    store.add("zebra/one", b"z", EntryKind::Password, None, None).unwrap();
    store.add("aws/prod/db", b"a", EntryKind::Password, None, None).unwrap();

    let hoster: Rc<dyn Hoster> = Rc::new(FakeHoster::new("Alice", "alice@example.com"));
    let collaborators = collaborators_for(crypto, hoster, Rc::new(NoopTransport));
    let identity = Identity { fingerprint: "OWNERFP".to_string(), name: "Alice".to_string(), email: "alice@example.com".to_string() };

    let (mut list_wf, entries) = kepr_core::workflows::list::build(
        &collaborators,
        prologue_for(&identity),
        store_root,
        String::new(),
        None,
        "origin".to_string(),
        "main".to_string(),
    );
    list_wf.run(&kepr_core::CancellationToken::new()).unwrap();
    let names: Vec<String> = entries.borrow().iter().map(|e| e.name.clone()).collect();
    assert_eq!(names, vec!["aws".to_string(), "zebra".to_string()]);
}

#[test]
fn list_workflow_hides_directories_the_caller_cannot_decrypt() {
    let dir = tempdir().unwrap();
    let store_root = dir.path().to_path_buf();
    let owner_crypto: Rc<dyn CryptoAdapter> = FakeCrypto::new("OWNERFP");
    let owner_store = Store::open(&store_root, owner_crypto.clone(), "OWNERFP");
    owner_store.init(&["OWNERFP".to_string()]).unwrap();
    owner_store.add("aws/prod/db", b"v", EntryKind::Password, None, None).unwrap();
    owner_store.add("public/notes", b"v", EntryKind::Password, None, None).unwrap();

    // Rekey the "aws" subtree away from the owner: only BOBFP can see it now.
    let aws_dir = owner_store.find_dir_path("aws", None).unwrap();
    owner_store.rekey(&aws_dir, &["BOBFP".to_string()], "aws", None).unwrap();

    let hoster: Rc<dyn Hoster> = Rc::new(FakeHoster::new("Alice", "alice@example.com"));
    let collaborators = collaborators_for(owner_crypto, hoster, Rc::new(NoopTransport));
    let owner_identity = Identity { fingerprint: "OWNERFP".to_string(), name: "Alice".to_string(), email: "alice@example.com".to_string() };

    let (mut list_wf, entries) = kepr_core::workflows::list::build(
        &collaborators,
        prologue_for(&owner_identity),
        store_root,
        String::new(),
        None,
        "origin".to_string(),
        "main".to_string(),
    );
    list_wf.run(&kepr_core::CancellationToken::new()).unwrap();
    let names: Vec<String> = entries.borrow().iter().map(|e| e.name.clone()).collect();
    assert_eq!(names, vec!["public".to_string()], "owner lost access to aws/ after rekey; it must not be listed");
}

#[test]
fn request_then_approve_grants_bob_access_to_owners_subtree() {
    let dir = tempdir().unwrap();
    let store_root = dir.path().to_path_buf();

    let owner_crypto = FakeCrypto::new("OWNERFP");
    let owner_store = Store::open(&store_root, owner_crypto.clone(), "OWNERFP");
    owner_store.init(&["OWNERFP".to_string()]).unwrap();
    owner_store.add("aws/prod/db", b"hunter2", EntryKind::Password, None, None).unwrap();

    let owner_hoster: Rc<dyn Hoster> = Rc::new(FakeHoster::new("Alice", "alice@example.com"));
    let owner_collaborators = collaborators_for(owner_crypto.clone(), owner_hoster, Rc::new(NoopTransport));
    let owner_identity = Identity { fingerprint: "OWNERFP".to_string(), name: "Alice".to_string(), email: "alice@example.com".to_string() };

    let bob_crypto = FakeCrypto::new("BOBFP");
    let bob_hoster: Rc<dyn Hoster> = Rc::new(FakeHoster::new("Bob", "bob@example.com"));
    let bob_collaborators = collaborators_for(bob_crypto.clone(), bob_hoster, Rc::new(NoopTransport));
    let bob_identity = Identity { fingerprint: "BOBFP".to_string(), name: "Bob".to_string(), email: "bob@example.com".to_string() };

    // Bob cannot read the secret yet.
    let bob_store = Store::open(&store_root, bob_crypto.clone(), "BOBFP");
    assert!(bob_store.get("aws/prod/db", None).is_err());

    // Bob already has the owner's public key (distributed out of band, the
    // way a real OpenPGP keyring would), mirroring the `keys/` layout that
    // `approve` later writes requester keys into.
    let keys_dir = store_root.join("keys");
    std::fs::create_dir_all(&keys_dir).unwrap();
    std::fs::write(keys_dir.join("OWNERFP.key"), b"FAKE-KEY:OWNERFP").unwrap();

    let (mut request_wf, uuid_slot) = kepr_core::workflows::request::build(
        &bob_collaborators,
        prologue_for(&bob_identity),
        store_root.clone(),
        "BOBFP".to_string(),
        "aws".to_string(),
        "Bob".to_string(),
        "bob@example.com".to_string(),
        "origin".to_string(),
    );
    request_wf.run(&kepr_core::CancellationToken::new()).unwrap();
    let uuid = uuid_slot.borrow().clone().unwrap();
    assert!(store_root.join("requests").join(format!("{uuid}.json.gpg")).is_file());

    let (mut approve_wf, warning) = kepr_core::workflows::approve::build(
        &owner_collaborators,
        prologue_for(&owner_identity),
        store_root.clone(),
        uuid[..8].to_string(),
        "Alice".to_string(),
        "alice@example.com".to_string(),
        "origin".to_string(),
    );
    approve_wf.run(&kepr_core::CancellationToken::new()).unwrap();
    assert!(warning.borrow().is_none());

    assert!(!store_root.join("requests").join(format!("{uuid}.json.gpg")).is_file());
    assert!(store_root.join("keys").join("BOBFP.key").is_file());

    let bob_store = Store::open(&store_root, bob_crypto, "BOBFP");
    let secret = bob_store.get("aws/prod/db", None).unwrap();
    assert_eq!(secret.plaintext, b"hunter2");

    // Owner retains access too: rekey appends rather than replaces.
    let owner_store = Store::open(&store_root, owner_crypto, "OWNERFP");
    assert_eq!(owner_store.get("aws/prod/db", None).unwrap().plaintext, b"hunter2");
}

#[test]
fn add_workflow_push_retries_past_transient_rejections() {
    let dir = tempdir().unwrap();
    let store_root = dir.path().to_path_buf();
    let crypto: Rc<dyn CryptoAdapter> = FakeCrypto::new("OWNERFP");
    let store = Store::open(&store_root, crypto.clone(), "");
    store.init(&["OWNERFP".to_string()]).unwrap();

    let hoster: Rc<dyn Hoster> = Rc::new(FakeHoster::new("Alice", "alice@example.com"));
    let transport: Rc<dyn Transport> = Rc::new(FlakyPushTransport { failures_remaining: RefCell::new(2) });
    let collaborators = collaborators_for(crypto, hoster, transport);
    let identity = Identity { fingerprint: "OWNERFP".to_string(), name: "Alice".to_string(), email: "alice@example.com".to_string() };

    let (mut add_wf, created) = kepr_core::workflows::add::build(
        &collaborators,
        prologue_for(&identity),
        store_root,
        "aws/prod/db".to_string(),
        b"hunter2".to_vec(),
        EntryKind::Password,
        None,
        None,
        "Alice".to_string(),
        "alice@example.com".to_string(),
        "origin".to_string(),
        "main".to_string(),
    );
    add_wf.run(&kepr_core::CancellationToken::new()).unwrap();
    assert!(created.borrow().is_some());
}

#[test]
fn prologue_rejects_mismatched_github_email() {
    let dir = tempdir().unwrap();
    let store_root = dir.path().to_path_buf();
    let crypto: Rc<dyn CryptoAdapter> = FakeCrypto::new("OWNERFP");
    let store = Store::open(&store_root, crypto.clone(), "");
    store.init(&["OWNERFP".to_string()]).unwrap();

    // FakeHoster reports a different email than the configured identity.
    let hoster: Rc<dyn Hoster> = Rc::new(FakeHoster::new("Alice", "someone-else@example.com"));
    let collaborators = collaborators_for(crypto, hoster, Rc::new(NoopTransport));
    let identity = Identity { fingerprint: "OWNERFP".to_string(), name: "Alice".to_string(), email: "alice@example.com".to_string() };

    let (mut add_wf, _) = kepr_core::workflows::add::build(
        &collaborators,
        prologue_for(&identity),
        store_root,
        "aws/prod/db".to_string(),
        b"hunter2".to_vec(),
        EntryKind::Password,
        None,
        None,
        "Alice".to_string(),
        "alice@example.com".to_string(),
        "origin".to_string(),
        "main".to_string(),
    );
    let err = add_wf.run(&kepr_core::CancellationToken::new()).unwrap_err();
    assert!(err.to_string().contains("does not match"));
}
