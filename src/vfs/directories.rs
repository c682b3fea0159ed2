//! Directory variants and how each one lists, creates and deletes the
//! remote resources it stands for

use super::leaves::{DocumentSource, Leaf};
use super::links::DEFAULT_VERSION_LINK;
use super::node::{Lineage, Node, NodeKind, reconcile_children};
use super::resolver::resolve;
use super::tree::TreeContext;
use crate::catalog::{
    CertificateStatus, CertificateSummary, NewCertificate, RuleAction, TopicRuleSummary,
    collect_pages,
};
use crate::error::{FsError, FsResult};
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

pub const ENDPOINT: &str = "endpoint";
pub const THINGS: &str = "things";
pub const POLICIES: &str = "policies";
pub const CERTIFICATES: &str = "certificates";
pub const RULES: &str = "rules";
pub const TOPICS: &str = "topics";
pub const MESSAGES: &str = "messages";
pub const PUBLISH: &str = "publish";
pub const VERSIONS: &str = "versions";

/// Document given to policies created with `mkdir`.
pub const DEFAULT_POLICY_DOCUMENT: &str = r#"{"Version":"2012-10-17","Statement":[{"Action":["iot:*"],"Resource":["*"],"Effect":"Allow"}]}"#;

const MAX_ACTIONS_PER_KIND: usize = 128;
const CERTIFICATE_PREFIX_LEN: usize = 10;

pub enum DirRole {
    Root,
    Things,
    Thing {
        name: String,
    },
    Principals {
        thing: String,
    },
    Policies,
    Policy {
        name: String,
        arn: Option<String>,
    },
    PolicyVersions {
        policy: String,
    },
    /// Certificates created with `mkdir` keep the name they were created
    /// under; `aliases` maps certificate id to that name.
    Certificates {
        aliases: Mutex<HashMap<String, String>>,
    },
    Certificate {
        summary: CertificateSummary,
        keys: Option<NewCertificate>,
    },
    CertificatePolicies {
        certificate_arn: String,
    },
    Rules,
    Rule {
        summary: TopicRuleSummary,
    },
    RuleActions {
        actions: Vec<RuleAction>,
    },
    Action {
        action: RuleAction,
    },
    Topics,
    Topic {
        topic: String,
    },
    Messages {
        topic: String,
        next_seq: AtomicU64,
    },
}

/// Outcome of listing a directory's remote counterpart.
pub(crate) enum Listing {
    /// Children are produced locally; only mark the directory initialized.
    Keep,
    Children(Vec<Arc<Node>>),
    /// Policy versions plus the id the `default` link should point at.
    Versions {
        children: Vec<Arc<Node>>,
        default_version: Option<String>,
    },
}

impl Listing {
    pub(crate) fn merge_into(self, dir: &Arc<Node>, children: &mut HashMap<String, Arc<Node>>) {
        match self {
            Listing::Keep => {}
            Listing::Children(nodes) => reconcile_children(children, nodes),
            Listing::Versions {
                children: nodes,
                default_version,
            } => {
                let previous = children.remove(DEFAULT_VERSION_LINK);
                reconcile_children(children, nodes);
                let Some(target) = default_version.and_then(|id| children.get(&id).cloned())
                else {
                    return;
                };
                let link = match previous {
                    Some(link)
                        if link
                            .link_source()
                            .is_some_and(|source| Arc::ptr_eq(&source, &target)) =>
                    {
                        link
                    }
                    _ => dir.lineage().node(DEFAULT_VERSION_LINK, NodeKind::link(&target)),
                };
                children.insert(DEFAULT_VERSION_LINK.to_string(), link);
            }
        }
    }
}

pub fn sanitize_topic(topic: &str) -> String {
    topic.replace('/', "_")
}

fn info_leaf(lineage: &Lineage, name: &str, text: &str) -> Arc<Node> {
    lineage.node(name, NodeKind::Leaf(Leaf::info(text)))
}

fn document(lineage: &Lineage, name: &str, source: DocumentSource) -> Arc<Node> {
    lineage.node(name, NodeKind::Leaf(Leaf::document(source)))
}

fn thing_dir(lineage: &Lineage, name: String) -> Arc<Node> {
    lineage.node(name.clone(), NodeKind::directory(DirRole::Thing { name }, None))
}

fn policy_dir(lineage: &Lineage, name: String, arn: Option<String>) -> Arc<Node> {
    lineage.node(
        name.clone(),
        NodeKind::directory(DirRole::Policy { name, arn }, None),
    )
}

fn certificate_dir(
    lineage: &Lineage,
    name: String,
    summary: CertificateSummary,
    keys: Option<NewCertificate>,
) -> Arc<Node> {
    let created = summary.created;
    lineage.node_created(
        name,
        NodeKind::directory(DirRole::Certificate { summary, keys }, None),
        created,
    )
}

/// `kind`, `kind-2`, … in order of appearance, at most 128 per kind.
fn action_names(actions: &[RuleAction]) -> Vec<Option<String>> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    actions
        .iter()
        .map(|action| {
            let count = seen.entry(action.kind.as_str()).or_insert(0);
            *count += 1;
            match *count {
                1 => Some(action.kind.clone()),
                n if n <= MAX_ACTIONS_PER_KIND => Some(format!("{}-{}", action.kind, n)),
                _ => None,
            }
        })
        .collect()
}

fn root_children(lineage: &Lineage, ctx: &TreeContext) -> Vec<Arc<Node>> {
    let ttl = ctx.options.collection_ttl;
    vec![
        document(lineage, ENDPOINT, DocumentSource::Endpoint),
        lineage.node(THINGS, NodeKind::directory(DirRole::Things, ttl)),
        lineage.node(POLICIES, NodeKind::directory(DirRole::Policies, ttl)),
        lineage.node(
            CERTIFICATES,
            NodeKind::directory(
                DirRole::Certificates {
                    aliases: Mutex::new(HashMap::new()),
                },
                ttl,
            ),
        ),
        lineage.node(RULES, NodeKind::directory(DirRole::Rules, ttl)),
        lineage.node(TOPICS, NodeKind::directory(DirRole::Topics, None)),
    ]
}

/// Build the children `dir` should have now.
///
/// Runs with `dir` locked: it must not touch `dir`'s own children.
pub(crate) fn fetch(dir: &Arc<Node>, role: &DirRole) -> FsResult<Listing> {
    let lineage = dir.lineage();
    let ctx = dir.context().clone();
    let remote = &ctx.remote;
    let catalog = remote.catalog();

    let children = match role {
        DirRole::Root => root_children(&lineage, &ctx),

        DirRole::Things => {
            let things = remote.call(
                "ListThings",
                collect_pages(|token| catalog.list_things(token)),
            )?;
            things
                .into_iter()
                .map(|thing| thing_dir(&lineage, thing.name))
                .collect()
        }

        DirRole::Thing { name } => vec![
            document(
                &lineage,
                "state",
                DocumentSource::ThingShadow {
                    thing: name.clone(),
                },
            ),
            lineage.node(
                "principals",
                NodeKind::directory(
                    DirRole::Principals {
                        thing: name.clone(),
                    },
                    None,
                ),
            ),
        ],

        DirRole::Principals { thing } => {
            let principals = remote.call(
                "ListThingPrincipals",
                collect_pages(|token| catalog.list_thing_principals(thing, token)),
            )?;
            let certificates = resolve(dir, &format!("/{}", CERTIFICATES), true)?.entries()?;
            principals
                .iter()
                .filter_map(|principal| {
                    let id = principal.rsplit('/').next().unwrap_or(principal);
                    let certificate = certificates.iter().find(|node| {
                        matches!(node.role(), Some(DirRole::Certificate { summary, .. }) if summary.id == id)
                    });
                    if certificate.is_none() {
                        debug!("Principal {} of {} is not a listed certificate", principal, thing);
                    }
                    certificate.map(|source| lineage.node(id, NodeKind::link(source)))
                })
                .collect()
        }

        DirRole::Policies => {
            let policies = remote.call(
                "ListPolicies",
                collect_pages(|token| catalog.list_policies(token)),
            )?;
            policies
                .into_iter()
                .map(|policy| policy_dir(&lineage, policy.name, policy.arn))
                .collect()
        }

        DirRole::Policy { name, arn } => {
            let mut children = Vec::new();
            if let Some(arn) = arn {
                children.push(info_leaf(&lineage, "arn", arn));
            }
            children.push(document(
                &lineage,
                "document",
                DocumentSource::PolicyDefault {
                    policy: name.clone(),
                },
            ));
            children.push(lineage.node(
                VERSIONS,
                NodeKind::directory(
                    DirRole::PolicyVersions {
                        policy: name.clone(),
                    },
                    None,
                ),
            ));
            children
        }

        DirRole::PolicyVersions { policy } => {
            let versions =
                remote.call("ListPolicyVersions", catalog.list_policy_versions(policy))?;
            let default_version = versions
                .iter()
                .find(|version| version.is_default)
                .map(|version| version.version_id.clone());
            let children = versions
                .into_iter()
                .map(|version| {
                    let source = DocumentSource::PolicyVersion {
                        policy: policy.clone(),
                        version: version.version_id.clone(),
                    };
                    lineage.node_created(
                        version.version_id,
                        NodeKind::Leaf(Leaf::document(source)),
                        version.created,
                    )
                })
                .collect();
            return Ok(Listing::Versions {
                children,
                default_version,
            });
        }

        DirRole::Certificates { aliases } => {
            let certificates = remote.call(
                "ListCertificates",
                collect_pages(|token| catalog.list_certificates(token)),
            )?;
            let aliases = aliases.lock();
            certificates
                .into_iter()
                .map(|summary| {
                    let name = aliases.get(&summary.id).unwrap_or(&summary.id).clone();
                    certificate_dir(&lineage, name, summary, None)
                })
                .collect()
        }

        DirRole::Certificate { summary, keys } => {
            let mut children = vec![
                info_leaf(&lineage, "id", &summary.id),
                info_leaf(&lineage, "arn", &summary.arn),
                info_leaf(&lineage, "status", summary.status.as_str()),
                lineage.node(
                    POLICIES,
                    NodeKind::directory(
                        DirRole::CertificatePolicies {
                            certificate_arn: summary.arn.clone(),
                        },
                        None,
                    ),
                ),
            ];
            if let Some(keys) = keys {
                let prefix: String = summary.id.chars().take(CERTIFICATE_PREFIX_LEN).collect();
                let files = [
                    ("certificate.pem.crt", &keys.certificate_pem),
                    ("private.pem.key", &keys.private_key),
                    ("public.pem.key", &keys.public_key),
                ];
                for (suffix, content) in files {
                    if let Some(content) = content {
                        children.push(info_leaf(&lineage, &format!("{}-{}", prefix, suffix), content));
                    }
                }
            }
            children
        }

        DirRole::CertificatePolicies { certificate_arn } => {
            let names = remote.call(
                "ListAttachedPolicies",
                collect_pages(|token| catalog.list_principal_policies(certificate_arn, token)),
            )?;
            let policies = resolve(dir, &format!("/{}", POLICIES), true)?;
            let mut children = Vec::new();
            for name in names {
                match policies.child(&name)? {
                    Some(source) => children.push(lineage.node(name, NodeKind::link(&source))),
                    None => debug!("Attached policy {} is not listed", name),
                }
            }
            children
        }

        DirRole::Rules => {
            let rules = remote.call(
                "ListTopicRules",
                collect_pages(|token| catalog.list_topic_rules(token)),
            )?;
            rules
                .into_iter()
                .map(|summary| {
                    let created = summary.created;
                    lineage.node_created(
                        summary.name.clone(),
                        NodeKind::directory(DirRole::Rule { summary }, None),
                        created,
                    )
                })
                .collect()
        }

        DirRole::Rule { summary } => {
            let detail = remote.call("GetTopicRule", catalog.get_topic_rule(&summary.name))?;
            let mut children = Vec::new();
            if let Some(arn) = &summary.arn {
                children.push(info_leaf(&lineage, "arn", arn));
            }
            let status = if summary.disabled { "INACTIVE" } else { "ACTIVE" };
            children.push(info_leaf(&lineage, "status", status));
            if let Some(pattern) = &summary.topic_pattern {
                children.push(info_leaf(&lineage, "rule-pattern", pattern));
            }
            children.push(info_leaf(&lineage, "sql", &detail.sql));
            children.push(lineage.node(
                "actions",
                NodeKind::directory(
                    DirRole::RuleActions {
                        actions: detail.actions,
                    },
                    None,
                ),
            ));
            children
        }

        DirRole::RuleActions { actions } => action_names(actions)
            .into_iter()
            .zip(actions)
            .filter_map(|(name, action)| {
                let name = name?;
                Some(lineage.node(
                    name,
                    NodeKind::directory(
                        DirRole::Action {
                            action: action.clone(),
                        },
                        None,
                    ),
                ))
            })
            .collect(),

        DirRole::Action { action } => action
            .fields
            .iter()
            .map(|(field, value)| info_leaf(&lineage, field, value))
            .collect(),

        DirRole::Topics => ctx
            .options
            .topics
            .iter()
            .map(|topic| {
                lineage.node(
                    sanitize_topic(topic),
                    NodeKind::directory(
                        DirRole::Topic {
                            topic: topic.clone(),
                        },
                        None,
                    ),
                )
            })
            .collect(),

        DirRole::Topic { topic } => vec![
            lineage.node(PUBLISH, NodeKind::Leaf(Leaf::publish(topic.clone()))),
            lineage.node(
                MESSAGES,
                NodeKind::directory(
                    DirRole::Messages {
                        topic: topic.clone(),
                        next_seq: AtomicU64::new(0),
                    },
                    None,
                ),
            ),
        ],

        DirRole::Messages { .. } => return Ok(Listing::Keep),
    };
    Ok(Listing::Children(children))
}

/// Create the remote resource a new directory under `dir` stands for.
/// Directories without a remote counterpart ignore the request.
pub(crate) fn mkdir(dir: &Arc<Node>, role: &DirRole, name: &str) -> FsResult<()> {
    let ctx = dir.context().clone();
    let remote = &ctx.remote;
    let catalog = remote.catalog();
    let lineage = dir.lineage();

    match role {
        DirRole::Things => {
            let thing = remote.call("CreateThing", catalog.create_thing(name))?;
            info!("Created thing {}", thing.name);
            dir.add_child(thing_dir(&lineage, thing.name));
        }
        DirRole::Policies => {
            let policy = remote.call(
                "CreatePolicy",
                catalog.create_policy(name, DEFAULT_POLICY_DOCUMENT),
            )?;
            info!("Created policy {}", policy.name);
            dir.add_child(policy_dir(&lineage, policy.name, policy.arn));
        }
        DirRole::Certificates { aliases } => {
            let keys = remote.call(
                "CreateKeysAndCertificate",
                catalog.create_keys_and_certificate(true),
            )?;
            info!("Created certificate {} as {}", keys.id, name);
            aliases.lock().insert(keys.id.clone(), name.to_string());
            let summary = CertificateSummary {
                id: keys.id.clone(),
                arn: keys.arn.clone(),
                status: CertificateStatus::Active,
                created: Some(SystemTime::now()),
            };
            dir.add_child(certificate_dir(&lineage, name.to_string(), summary, Some(keys)));
        }
        _ => debug!("mkdir '{}' under {} is a no-op", name, dir.absolute_path()),
    }
    Ok(())
}

/// Delete the remote resource behind an (already empty) directory.
pub(crate) fn remove_remote(node: &Arc<Node>, role: &DirRole) -> FsResult<()> {
    let ctx = node.context().clone();
    let remote = &ctx.remote;
    let catalog = remote.catalog();

    match role {
        DirRole::Thing { name } => remote.call("DeleteThing", catalog.delete_thing(name)),
        DirRole::Policy { name, .. } => remote.call("DeletePolicy", catalog.delete_policy(name)),
        DirRole::Certificate { summary, .. } => {
            remote.call(
                "UpdateCertificate",
                catalog.update_certificate_status(&summary.id, CertificateStatus::Inactive),
            )?;
            remote.call("DeleteCertificate", catalog.delete_certificate(&summary.id))?;
            let parent = node.parent();
            if let Some(DirRole::Certificates { aliases }) = parent.as_deref().and_then(Node::role) {
                aliases.lock().remove(&summary.id);
            }
            Ok(())
        }
        DirRole::Rule { summary } => {
            remote.call("DeleteTopicRule", catalog.delete_topic_rule(&summary.name))
        }
        _ => Ok(()),
    }
}

/// Append an inbound message to a `messages` directory, evicting the oldest
/// entries beyond the configured retention.
pub fn push_message(messages: &Arc<Node>, payload: &[u8]) -> FsResult<()> {
    let Some(DirRole::Messages { topic, next_seq }) = messages.role() else {
        return Err(FsError::NotADirectory);
    };
    let Some(dir) = messages.as_directory() else {
        return Err(FsError::NotADirectory);
    };
    let seq = next_seq.fetch_add(1, Ordering::SeqCst) + 1;
    let name = format!("{:06}", seq);
    let node = messages
        .lineage()
        .node(name.clone(), NodeKind::Leaf(Leaf::message(payload.to_vec())));

    let retained = messages.context().options.messages_retained;
    let mut state = dir.state();
    state.children.insert(name.clone(), node);
    while retained > 0 && state.children.len() > retained {
        let oldest = state
            .children
            .keys()
            .min_by_key(|key| key.parse::<u64>().unwrap_or(0))
            .cloned();
        match oldest {
            Some(oldest) => {
                state.children.remove(&oldest);
            }
            None => break,
        }
    }
    debug!("Stored message {} on '{}' ({} bytes)", name, topic, payload.len());
    Ok(())
}
