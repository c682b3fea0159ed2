//! Plain data exchanged with the resource catalog

use std::time::SystemTime;

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThingSummary {
    pub name: String,
    pub arn: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateStatus {
    Active,
    Inactive,
    Other,
}

impl CertificateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateStatus::Active => "ACTIVE",
            CertificateStatus::Inactive => "INACTIVE",
            CertificateStatus::Other => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CertificateSummary {
    pub id: String,
    pub arn: String,
    pub status: CertificateStatus,
    pub created: Option<SystemTime>,
}

/// Result of creating a certificate together with its key pair.
///
/// The private key is only ever returned by this call.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCertificate {
    pub id: String,
    pub arn: String,
    pub certificate_pem: Option<String>,
    pub public_key: Option<String>,
    pub private_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicySummary {
    pub name: String,
    pub arn: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyVersionSummary {
    pub version_id: String,
    pub is_default: bool,
    pub created: Option<SystemTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicRuleSummary {
    pub name: String,
    pub arn: Option<String>,
    pub topic_pattern: Option<String>,
    pub disabled: bool,
    pub created: Option<SystemTime>,
}

/// A rule action flattened into its kind and displayable fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleAction {
    pub kind: String,
    pub fields: Vec<(String, String)>,
}

impl RuleAction {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.push((name.to_string(), value.into()));
        self
    }

    pub fn optional_field(self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.field(name, value),
            None => self,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TopicRuleDetail {
    pub sql: String,
    pub actions: Vec<RuleAction>,
}
