/* git_transport.rs
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

//! A `git2`-backed [`Transport`], generalizing `passcore::store::PassStore`'s
//! fetch/pull/commit/push helpers into the narrow external-collaborator
//! contract the core defines, plus branch creation/deletion for the
//! access-request protocol.

use anyhow::{anyhow, Context, Result};
use git2::{
    build::CheckoutBuilder, Cred, CredentialType, FetchOptions, MergeOptions, PushOptions,
    Remote, RemoteCallbacks, Repository,
};
use kepr_core::Transport;
use log::info;
use std::path::Path;

pub struct GitTransport;

impl GitTransport {
    pub fn new() -> Self {
        GitTransport
    }

    fn make_callbacks() -> RemoteCallbacks<'static> {
        let mut cb = RemoteCallbacks::new();
        cb.credentials(|_url, username_from_url, allowed| {
            let user = username_from_url.unwrap_or("git");
            if allowed.contains(CredentialType::SSH_KEY) {
                return Cred::ssh_key_from_agent(user);
            }
            if allowed.contains(CredentialType::USERNAME) {
                return Cred::username(user);
            }
            Err(git2::Error::from_str("no supported authentication method"))
        });
        cb
    }

    fn open(dir: &Path) -> Result<Repository> {
        Repository::open(dir).with_context(|| format!("failed to open repository at {}", dir.display()))
    }

    fn find_remote<'repo>(repo: &'repo Repository, name: &str) -> Result<Remote<'repo>> {
        repo.find_remote(name).with_context(|| format!("remote '{name}' not found"))
    }
}

impl Default for GitTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for GitTransport {
    fn init(&self, dir: &Path) -> Result<()> {
        Repository::init(dir).with_context(|| format!("failed to init repository at {}", dir.display()))?;
        Ok(())
    }

    fn commit(&self, dir: &Path, message: &str, author_name: &str, author_email: &str) -> Result<()> {
        let repo = Self::open(dir)?;
        let mut idx = repo.index().context("failed to open index")?;
        idx.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .context("failed to stage changes")?;
        idx.write().context("failed to write index")?;
        let tree_oid = idx.write_tree().context("failed to write tree")?;
        let tree = repo.find_tree(tree_oid).context("failed to load tree")?;

        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        if let Some(parent_commit) = &parent {
            if parent_commit.tree_id() == tree_oid {
                return Ok(());
            }
        }

        let sig = git2::Signature::now(author_name, author_email).context("failed to build commit signature")?;
        let parents: Vec<_> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .context("failed to commit")?;
        Ok(())
    }

    fn configure_remote(&self, dir: &Path, name: &str, url: &str) -> Result<()> {
        let repo = Self::open(dir)?;
        if repo.find_remote(name).is_ok() {
            repo.remote_set_url(name, url).context("failed to update remote url")?;
        } else {
            repo.remote(name, url).context("failed to add remote")?;
        }
        Ok(())
    }

    fn push(&self, dir: &Path, remote: &str, branch: &str) -> Result<()> {
        let repo = Self::open(dir)?;
        let mut po = PushOptions::new();
        po.remote_callbacks(Self::make_callbacks());
        let mut remote_handle = Self::find_remote(&repo, remote)?;
        let spec = format!("refs/heads/{branch}:refs/heads/{branch}");
        remote_handle.push(&[spec.as_str()], Some(&mut po)).context("failed to push")?;
        Ok(())
    }

    fn pull(&self, dir: &Path, remote: &str, branch: &str, silent: bool) -> Result<()> {
        let repo = Self::open(dir)?;
        let mut fo = FetchOptions::new();
        fo.remote_callbacks(Self::make_callbacks());

        let mut remote_handle = Self::find_remote(&repo, remote)?;
        remote_handle.fetch(&[branch], Some(&mut fo), None).context("failed to fetch")?;

        let upstream_refname = format!("refs/remotes/{remote}/{branch}");
        let Ok(fetch_ref) = repo.find_reference(&upstream_refname) else {
            return Ok(());
        };
        let annotated = repo.reference_to_annotated_commit(&fetch_ref).context("failed to read fetched commit")?;

        let (analysis, _) = repo.merge_analysis(&[&annotated]).context("failed to analyze merge")?;
        if analysis.is_up_to_date() {
            if !silent {
                info!("{remote}/{branch} already up-to-date");
            }
            return Ok(());
        }

        let head_ref = repo.head().context("failed to read HEAD")?;
        let head_name = head_ref.name().ok_or_else(|| anyhow!("detached HEAD"))?.to_string();

        if analysis.is_fast_forward() {
            let mut head_ref_mut = repo.find_reference(&head_name)?;
            head_ref_mut.set_target(annotated.id(), "kepr: fast-forward pull")?;
            repo.set_head(&head_name)?;
            repo.checkout_head(Some(CheckoutBuilder::default().force())).context("failed to checkout after fast-forward")?;
            return Ok(());
        }

        let mut merge_opts = MergeOptions::new();
        repo.merge(&[&annotated], Some(&mut merge_opts), None).context("failed to merge")?;
        let mut idx = repo.index()?;
        if idx.has_conflicts() {
            return Err(anyhow!("merge conflicts detected while pulling {remote}/{branch}"));
        }
        let tree_oid = idx.write_tree()?;
        let tree = repo.find_tree(tree_oid)?;
        let sig = repo.signature().context("failed to build merge commit signature")?;
        let local_commit = repo.find_commit(head_ref.target().ok_or_else(|| anyhow!("detached HEAD"))?)?;
        let upstream_commit = repo.find_commit(annotated.id())?;
        repo.commit(
            Some("HEAD"),
            &sig,
            &sig,
            &format!("Merge {remote}/{branch} into {head_name}"),
            &tree,
            &[&local_commit, &upstream_commit],
        )
        .context("failed to commit merge")?;
        repo.checkout_head(Some(CheckoutBuilder::default().force()))?;
        repo.cleanup_state()?;
        Ok(())
    }

    fn create_branch(&self, dir: &Path, name: &str) -> Result<()> {
        let repo = Self::open(dir)?;
        let head = repo.head().context("failed to read HEAD")?;
        let commit = head.peel_to_commit().context("failed to resolve HEAD commit")?;
        repo.branch(name, &commit, false).with_context(|| format!("failed to create branch {name}"))?;
        repo.set_head(&format!("refs/heads/{name}"))
            .with_context(|| format!("failed to move HEAD to {name}"))?;
        repo.checkout_head(Some(CheckoutBuilder::default().force()))
            .with_context(|| format!("failed to checkout {name}"))?;
        Ok(())
    }

    fn delete_remote_branch(&self, dir: &Path, remote: &str, name: &str) -> Result<()> {
        let repo = Self::open(dir)?;
        let mut po = PushOptions::new();
        po.remote_callbacks(Self::make_callbacks());
        let mut remote_handle = Self::find_remote(&repo, remote)?;
        let spec = format!(":refs/heads/{name}");
        remote_handle.push(&[spec.as_str()], Some(&mut po)).with_context(|| format!("failed to delete remote branch {name}"))?;
        Ok(())
    }

    fn clone(&self, url: &str, dir: &Path) -> Result<()> {
        let mut fo = FetchOptions::new();
        fo.remote_callbacks(Self::make_callbacks());
        let mut builder = git2::build::RepoBuilder::new();
        builder.fetch_options(fo);
        builder.clone(url, dir).with_context(|| format!("failed to clone {url}"))?;
        Ok(())
    }

    fn fetch_and_merge_matching(&self, dir: &Path, remote: &str, glob: &str) -> Result<()> {
        let repo = Self::open(dir)?;
        let mut fo = FetchOptions::new();
        fo.remote_callbacks(Self::make_callbacks());
        let mut remote_handle = Self::find_remote(&repo, remote)?;
        let refspec = format!("refs/heads/{glob}:refs/remotes/{remote}/{glob}");
        if remote_handle.fetch(&[refspec.as_str()], Some(&mut fo), None).is_err() {
            // Nothing matched the glob on the remote; not an error.
            return Ok(());
        }

        let tracking_glob = format!("refs/remotes/{remote}/{glob}");
        let matches: Vec<String> = repo
            .references_glob(&tracking_glob)
            .context("failed to list fetched request branches")?
            .filter_map(|r| r.ok().and_then(|r| r.name().map(str::to_string)))
            .collect();

        for refname in matches {
            let fetch_ref = repo.find_reference(&refname)?;
            let annotated = repo.reference_to_annotated_commit(&fetch_ref).context("failed to read fetched commit")?;
            let (analysis, _) = repo.merge_analysis(&[&annotated]).context("failed to analyze merge")?;
            if analysis.is_up_to_date() {
                continue;
            }

            let head_ref = repo.head().context("failed to read HEAD")?;
            let head_name = head_ref.name().ok_or_else(|| anyhow!("detached HEAD"))?.to_string();

            if analysis.is_fast_forward() {
                let mut head_ref_mut = repo.find_reference(&head_name)?;
                head_ref_mut.set_target(annotated.id(), "kepr: fast-forward merge request branch")?;
                repo.set_head(&head_name)?;
                repo.checkout_head(Some(CheckoutBuilder::default().force()))
                    .context("failed to checkout after fast-forward")?;
                continue;
            }

            let mut merge_opts = MergeOptions::new();
            repo.merge(&[&annotated], Some(&mut merge_opts), None).context("failed to merge")?;
            let mut idx = repo.index()?;
            if idx.has_conflicts() {
                // A conflicting request branch shouldn't block approving others; skip it.
                repo.cleanup_state()?;
                continue;
            }
            let tree_oid = idx.write_tree()?;
            let tree = repo.find_tree(tree_oid)?;
            let sig = repo.signature().context("failed to build merge commit signature")?;
            let local_commit = repo.find_commit(head_ref.target().ok_or_else(|| anyhow!("detached HEAD"))?)?;
            let upstream_commit = repo.find_commit(annotated.id())?;
            repo.commit(
                Some("HEAD"),
                &sig,
                &sig,
                &format!("Merge {refname} into {head_name}"),
                &tree,
                &[&local_commit, &upstream_commit],
            )
            .context("failed to commit merge")?;
            repo.checkout_head(Some(CheckoutBuilder::default().force()))?;
            repo.cleanup_state()?;
        }
        Ok(())
    }
}
