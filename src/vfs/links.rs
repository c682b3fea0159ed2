//! Links as relationship triggers
//!
//! Creating a link under a relationship directory attaches two remote
//! resources; removing it detaches them. The remote call always happens
//! first and the tree only changes when it succeeds.

use super::directories::DirRole;
use super::leaves::Leaf;
use super::node::{Node, NodeKind};
use super::resolver::resolve;
use crate::error::{FsError, FsResult};
use log::{debug, info};
use std::sync::Arc;

pub const DEFAULT_VERSION_LINK: &str = "default";

enum Relationship<'a> {
    /// `things/<thing>/principals/<link>` → certificate directory
    ThingPrincipal { thing: &'a str },
    /// `certificates/<cert>/policies/<link>` → policy directory
    CertificatePolicy { certificate_arn: &'a str },
    /// `policies/<policy>/versions/default` → sibling version document
    DefaultVersion { policy: &'a str },
}

impl<'a> Relationship<'a> {
    fn of(role: &'a DirRole) -> Option<Self> {
        match role {
            DirRole::Principals { thing } => Some(Relationship::ThingPrincipal { thing }),
            DirRole::CertificatePolicies { certificate_arn } => {
                Some(Relationship::CertificatePolicy { certificate_arn })
            }
            DirRole::PolicyVersions { policy } => Some(Relationship::DefaultVersion { policy }),
            _ => None,
        }
    }

    fn establish(&self, dir: &Arc<Node>, name: &str, source: &Arc<Node>) -> FsResult<()> {
        let remote = &dir.context().remote;
        let catalog = remote.catalog();
        match self {
            Relationship::ThingPrincipal { thing } => {
                let arn = certificate_arn(source)?;
                remote.call(
                    "AttachThingPrincipal",
                    catalog.attach_thing_principal(thing, arn),
                )?;
                info!("Attached {} to thing {}", arn, thing);
            }
            Relationship::CertificatePolicy { certificate_arn } => {
                let policy = policy_name(source)?;
                remote.call("AttachPolicy", catalog.attach_policy(certificate_arn, policy))?;
                info!("Attached policy {} to {}", policy, certificate_arn);
            }
            Relationship::DefaultVersion { policy } => {
                let is_sibling = source.parent().is_some_and(|parent| Arc::ptr_eq(&parent, dir));
                let version = match source.as_leaf() {
                    Some(Leaf::Document(document)) => document.policy_version(),
                    _ => None,
                };
                let version = match version {
                    Some(version) if is_sibling && name == DEFAULT_VERSION_LINK => version,
                    _ => return Err(FsError::NoSuchDevice),
                };
                remote.call(
                    "SetDefaultPolicyVersion",
                    catalog.set_default_policy_version(policy, version),
                )?;
                info!("Policy {} now defaults to version {}", policy, version);
            }
        }
        Ok(())
    }

    fn remove(&self, link: &Arc<Node>) -> FsResult<()> {
        let remote = &link.context().remote;
        let catalog = remote.catalog();
        match self {
            Relationship::ThingPrincipal { thing } => {
                let source = link.link_source().ok_or(FsError::NoSuchDevice)?;
                let arn = certificate_arn(&source)?;
                remote.call(
                    "DetachThingPrincipal",
                    catalog.detach_thing_principal(thing, arn),
                )?;
                info!("Detached {} from thing {}", arn, thing);
            }
            Relationship::CertificatePolicy { certificate_arn } => {
                let source = link.link_source().ok_or(FsError::NoSuchDevice)?;
                let policy = policy_name(&source)?;
                remote.call("DetachPolicy", catalog.detach_policy(certificate_arn, policy))?;
                info!("Detached policy {} from {}", policy, certificate_arn);
            }
            // Dropping the default marker has no remote counterpart.
            Relationship::DefaultVersion { .. } => {}
        }
        Ok(())
    }
}

fn certificate_arn(node: &Node) -> FsResult<&str> {
    match node.role() {
        Some(DirRole::Certificate { summary, .. }) => Ok(&summary.arn),
        _ => Err(FsError::NoSuchDevice),
    }
}

fn policy_name(node: &Node) -> FsResult<&str> {
    match node.role() {
        Some(DirRole::Policy { name, .. }) => Ok(name),
        _ => Err(FsError::NoSuchDevice),
    }
}

/// Create link `name` in `dir` pointing at `target`.
pub(crate) fn establish(dir: &Arc<Node>, role: &DirRole, name: &str, target: &str) -> FsResult<()> {
    let Some(relationship) = Relationship::of(role) else {
        debug!("symlink '{}' under {} is a no-op", name, dir.absolute_path());
        return Ok(());
    };
    let source = match resolve(dir, target, true) {
        Ok(source) => source,
        Err(FsError::NotFound) => return Err(FsError::NoSuchDevice),
        Err(err) => return Err(err),
    };
    relationship.establish(dir, name, &source)?;
    dir.add_child(dir.lineage().node(name, NodeKind::link(&source)));
    Ok(())
}

/// Undo the relationship behind `link` before it is detached from `dir`.
pub(crate) fn dissolve(dir: &Arc<Node>, role: &DirRole, link: &Arc<Node>) -> FsResult<()> {
    match Relationship::of(role) {
        Some(relationship) => relationship.remove(link),
        None => {
            debug!("unlink of {} under {} is local", link.name(), dir.absolute_path());
            Ok(())
        }
    }
}

/// Path of a link's source relative to the directory holding the link,
/// going up to their nearest common ancestor and back down.
pub fn readlink(link: &Node) -> FsResult<String> {
    let source = link.link_source().ok_or(FsError::NotFound)?;
    let Some(mut ancestor) = link.parent() else {
        return Ok(source.absolute_path());
    };

    let mut source_chain = vec![source.clone()];
    let mut next = source.parent();
    while let Some(parent) = next {
        next = parent.parent();
        source_chain.push(parent);
    }

    let mut ups = 0;
    let common = loop {
        if let Some(index) = source_chain
            .iter()
            .position(|node| Arc::ptr_eq(node, &ancestor))
        {
            break index;
        }
        match ancestor.parent() {
            Some(parent) => {
                ancestor = parent;
                ups += 1;
            }
            None => return Ok(source.absolute_path()),
        }
    };

    let downs: Vec<&str> = source_chain[..common]
        .iter()
        .rev()
        .map(|node| node.name())
        .collect();
    if ups == 0 && downs.is_empty() {
        return Ok(".".to_string());
    }
    Ok(format!("{}{}", "../".repeat(ups), downs.join("/")))
}
