//! Resource catalog collaborator
//!
//! The virtual tree only talks to the remote catalog through [`IotCatalog`].
//! Every operation has a default body reporting [`RemoteError::Unsupported`]
//! so partial backends (and test doubles) only implement what they serve.

pub mod aws_client;
pub mod models;

use crate::error::RemoteError;
use async_trait::async_trait;
use std::future::Future;

pub use models::{
    CertificateStatus, CertificateSummary, NewCertificate, Page, PolicySummary,
    PolicyVersionSummary, RuleAction, ThingSummary, TopicRuleDetail, TopicRuleSummary,
};

/// Page size requested from paginated listings.
pub const PAGE_SIZE: usize = 50;

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Interface of the remote resource catalog
#[async_trait]
pub trait IotCatalog: Send + Sync {
    // Endpoint
    async fn describe_endpoint(&self) -> RemoteResult<String> {
        Err(RemoteError::Unsupported("describe_endpoint"))
    }

    // Things
    async fn list_things(&self, _next_token: Option<String>) -> RemoteResult<Page<ThingSummary>> {
        Err(RemoteError::Unsupported("list_things"))
    }
    async fn create_thing(&self, _name: &str) -> RemoteResult<ThingSummary> {
        Err(RemoteError::Unsupported("create_thing"))
    }
    async fn delete_thing(&self, _name: &str) -> RemoteResult<()> {
        Err(RemoteError::Unsupported("delete_thing"))
    }
    async fn list_thing_principals(
        &self,
        _thing: &str,
        _next_token: Option<String>,
    ) -> RemoteResult<Page<String>> {
        Err(RemoteError::Unsupported("list_thing_principals"))
    }
    async fn attach_thing_principal(&self, _thing: &str, _principal: &str) -> RemoteResult<()> {
        Err(RemoteError::Unsupported("attach_thing_principal"))
    }
    async fn detach_thing_principal(&self, _thing: &str, _principal: &str) -> RemoteResult<()> {
        Err(RemoteError::Unsupported("detach_thing_principal"))
    }
    /// Current shadow document, `None` when the thing has no shadow yet.
    async fn get_thing_shadow(&self, _thing: &str) -> RemoteResult<Option<Vec<u8>>> {
        Err(RemoteError::Unsupported("get_thing_shadow"))
    }
    async fn update_thing_shadow(&self, _thing: &str, _document: &[u8]) -> RemoteResult<()> {
        Err(RemoteError::Unsupported("update_thing_shadow"))
    }

    // Certificates
    async fn list_certificates(
        &self,
        _next_token: Option<String>,
    ) -> RemoteResult<Page<CertificateSummary>> {
        Err(RemoteError::Unsupported("list_certificates"))
    }
    async fn create_keys_and_certificate(&self, _active: bool) -> RemoteResult<NewCertificate> {
        Err(RemoteError::Unsupported("create_keys_and_certificate"))
    }
    async fn update_certificate_status(
        &self,
        _certificate_id: &str,
        _status: CertificateStatus,
    ) -> RemoteResult<()> {
        Err(RemoteError::Unsupported("update_certificate_status"))
    }
    async fn delete_certificate(&self, _certificate_id: &str) -> RemoteResult<()> {
        Err(RemoteError::Unsupported("delete_certificate"))
    }
    async fn list_principal_policies(
        &self,
        _principal: &str,
        _next_token: Option<String>,
    ) -> RemoteResult<Page<String>> {
        Err(RemoteError::Unsupported("list_principal_policies"))
    }
    async fn attach_policy(&self, _principal: &str, _policy: &str) -> RemoteResult<()> {
        Err(RemoteError::Unsupported("attach_policy"))
    }
    async fn detach_policy(&self, _principal: &str, _policy: &str) -> RemoteResult<()> {
        Err(RemoteError::Unsupported("detach_policy"))
    }

    // Policies
    async fn list_policies(&self, _next_token: Option<String>) -> RemoteResult<Page<PolicySummary>> {
        Err(RemoteError::Unsupported("list_policies"))
    }
    async fn create_policy(&self, _name: &str, _document: &str) -> RemoteResult<PolicySummary> {
        Err(RemoteError::Unsupported("create_policy"))
    }
    async fn delete_policy(&self, _name: &str) -> RemoteResult<()> {
        Err(RemoteError::Unsupported("delete_policy"))
    }
    /// Policy document of `version`, or of the default version when `None`.
    async fn get_policy_document(&self, _name: &str, _version: Option<&str>) -> RemoteResult<String> {
        Err(RemoteError::Unsupported("get_policy_document"))
    }
    async fn list_policy_versions(&self, _name: &str) -> RemoteResult<Vec<PolicyVersionSummary>> {
        Err(RemoteError::Unsupported("list_policy_versions"))
    }
    async fn create_policy_version(
        &self,
        _name: &str,
        _document: &str,
        _set_as_default: bool,
    ) -> RemoteResult<String> {
        Err(RemoteError::Unsupported("create_policy_version"))
    }
    async fn set_default_policy_version(&self, _name: &str, _version: &str) -> RemoteResult<()> {
        Err(RemoteError::Unsupported("set_default_policy_version"))
    }
    async fn delete_policy_version(&self, _name: &str, _version: &str) -> RemoteResult<()> {
        Err(RemoteError::Unsupported("delete_policy_version"))
    }

    // Topic rules
    async fn list_topic_rules(
        &self,
        _next_token: Option<String>,
    ) -> RemoteResult<Page<TopicRuleSummary>> {
        Err(RemoteError::Unsupported("list_topic_rules"))
    }
    async fn get_topic_rule(&self, _name: &str) -> RemoteResult<TopicRuleDetail> {
        Err(RemoteError::Unsupported("get_topic_rule"))
    }
    async fn delete_topic_rule(&self, _name: &str) -> RemoteResult<()> {
        Err(RemoteError::Unsupported("delete_topic_rule"))
    }
}

/// Drain a paginated listing.
///
/// Stops when the continuation token is absent or a page comes back shorter
/// than [`PAGE_SIZE`].
pub async fn collect_pages<T, F, Fut>(mut fetch: F) -> RemoteResult<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = RemoteResult<Page<T>>>,
{
    let mut items = Vec::new();
    let mut token = None;
    loop {
        let page = fetch(token.take()).await?;
        let short_page = page.items.len() < PAGE_SIZE;
        items.extend(page.items);
        match page.next_token {
            Some(next) if !short_page => token = Some(next),
            _ => break,
        }
    }
    Ok(items)
}
