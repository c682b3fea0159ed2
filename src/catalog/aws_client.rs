//! Catalog backed by the AWS IoT control plane and device data plane

use super::{
    CertificateStatus, CertificateSummary, IotCatalog, NewCertificate, PAGE_SIZE, Page,
    PolicySummary, PolicyVersionSummary, RemoteResult, RuleAction, ThingSummary, TopicRuleDetail,
    TopicRuleSummary,
};
use crate::error::RemoteError;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_iot::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_iot::primitives::DateTime;
use aws_sdk_iot::types::{Action, CertificateStatus as SdkCertificateStatus};
use aws_sdk_iotdataplane::primitives::Blob;
use log::{debug, info};
use std::time::SystemTime;

const DATA_ENDPOINT_TYPE: &str = "iot:Data-ATS";

/// AWS IoT client pair: control plane for the catalog, data plane for
/// shadows and messages.
#[derive(Clone)]
pub struct AwsIotCatalog {
    iot: aws_sdk_iot::Client,
    data: aws_sdk_iotdataplane::Client,
    endpoint: String,
}

impl AwsIotCatalog {
    /// Load credentials from the default provider chain and resolve the
    /// account's data endpoint.
    pub async fn connect(region: Option<String>) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let sdk_config = loader.load().await;
        Self::from_sdk_config(&sdk_config).await
    }

    pub async fn from_sdk_config(sdk_config: &SdkConfig) -> Result<Self> {
        let iot = aws_sdk_iot::Client::new(sdk_config);
        let endpoint = iot
            .describe_endpoint()
            .endpoint_type(DATA_ENDPOINT_TYPE)
            .send()
            .await
            .map_err(|e| anyhow!("{}", DisplayErrorContext(&e)))
            .context("Failed to describe IoT data endpoint")?
            .endpoint_address()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("IoT endpoint response carried no address"))?;
        info!("Using IoT data endpoint {}", endpoint);

        let data_config = aws_sdk_iotdataplane::config::Builder::from(sdk_config)
            .endpoint_url(format!("https://{}", endpoint))
            .build();
        let data = aws_sdk_iotdataplane::Client::from_conf(data_config);

        Ok(Self {
            iot,
            data,
            endpoint,
        })
    }

    /// Data plane client, shared with the message transport.
    pub fn data_client(&self) -> aws_sdk_iotdataplane::Client {
        self.data.clone()
    }
}

/// Map an SDK failure onto the catalog error taxonomy by its error code.
pub fn classify<E, R>(err: SdkError<E, R>) -> RemoteError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(&err).to_string();
    debug!("AWS IoT call failed: {}", message);
    match err.code() {
        Some("ResourceNotFoundException") => RemoteError::NotFound(message),
        Some(
            "UnauthorizedException" | "AccessDeniedException" | "ForbiddenException"
            | "UnrecognizedClientException",
        ) => RemoteError::Unauthorized(message),
        Some("InvalidRequestException" | "MalformedPolicyException" | "SqlParseException") => {
            RemoteError::InvalidRequest(message)
        }
        Some(
            "DeleteConflictException" | "ConflictException" | "CertificateStateException"
            | "VersionsLimitExceededException" | "VersionConflictException",
        ) => RemoteError::Conflict(message),
        Some("ResourceAlreadyExistsException") => RemoteError::AlreadyExists(message),
        Some("ThrottlingException" | "LimitExceededException") => RemoteError::Throttled(message),
        _ => RemoteError::Service(message),
    }
}

/// Bridges SDK accessors that are optional in one model and required in another.
pub(crate) trait IntoOption<T> {
    fn into_option(self) -> Option<T>;
}

impl IntoOption<String> for &str {
    fn into_option(self) -> Option<String> {
        Some(self.to_string())
    }
}

impl IntoOption<String> for Option<&str> {
    fn into_option(self) -> Option<String> {
        self.map(str::to_string)
    }
}

impl IntoOption<bool> for bool {
    fn into_option(self) -> Option<bool> {
        Some(self)
    }
}

impl IntoOption<bool> for Option<bool> {
    fn into_option(self) -> Option<bool> {
        self
    }
}

impl IntoOption<i64> for i64 {
    fn into_option(self) -> Option<i64> {
        Some(self)
    }
}

impl IntoOption<i64> for Option<i64> {
    fn into_option(self) -> Option<i64> {
        self
    }
}

fn system_time(date: Option<&DateTime>) -> Option<SystemTime> {
    date.and_then(|date| SystemTime::try_from(*date).ok())
}

fn missing(what: &str) -> RemoteError {
    RemoteError::Service(format!("response is missing {}", what))
}

struct ActionFields(RuleAction);

impl ActionFields {
    fn new(kind: &str) -> Self {
        Self(RuleAction::new(kind))
    }

    fn put(self, name: &str, value: impl IntoOption<String>) -> Self {
        Self(self.0.optional_field(name, value.into_option().as_deref()))
    }
}

/// Flatten each populated action variant into a named field list.
fn flatten_action(action: &Action) -> Vec<RuleAction> {
    let mut flattened = Vec::new();
    if let Some(a) = action.s3() {
        flattened.push(
            ActionFields::new("s3")
                .put("bucket-name", a.bucket_name())
                .put("key", a.key())
                .put("role-arn", a.role_arn()),
        );
    }
    if let Some(a) = action.dynamo_db() {
        flattened.push(
            ActionFields::new("dynamodb")
                .put("table-name", a.table_name())
                .put("role-arn", a.role_arn())
                .put("hash-key-field", a.hash_key_field())
                .put("hash-key-value", a.hash_key_value())
                .put("range-key-field", a.range_key_field())
                .put("range-key-value", a.range_key_value())
                .put("payload-field", a.payload_field()),
        );
    }
    if let Some(a) = action.kinesis() {
        flattened.push(
            ActionFields::new("kinesis")
                .put("stream-name", a.stream_name())
                .put("role-arn", a.role_arn())
                .put("partition-key", a.partition_key()),
        );
    }
    if let Some(a) = action.lambda() {
        flattened.push(ActionFields::new("lambda").put("function-arn", a.function_arn()));
    }
    if let Some(a) = action.sns() {
        flattened.push(
            ActionFields::new("sns")
                .put("target-arn", a.target_arn())
                .put("role-arn", a.role_arn()),
        );
    }
    if let Some(a) = action.sqs() {
        flattened.push(
            ActionFields::new("sqs")
                .put("queue-url", a.queue_url())
                .put("role-arn", a.role_arn()),
        );
    }
    if let Some(a) = action.republish() {
        flattened.push(
            ActionFields::new("republish")
                .put("topic", a.topic())
                .put("role-arn", a.role_arn()),
        );
    }
    if let Some(a) = action.firehose() {
        flattened.push(
            ActionFields::new("firehose")
                .put("delivery-stream-name", a.delivery_stream_name())
                .put("role-arn", a.role_arn())
                .put("separator", a.separator()),
        );
    }
    if let Some(a) = action.cloudwatch_metric() {
        flattened.push(
            ActionFields::new("cloudwatch-metric")
                .put("metric-namespace", a.metric_namespace())
                .put("metric-name", a.metric_name())
                .put("metric-value", a.metric_value())
                .put("metric-unit", a.metric_unit())
                .put("role-arn", a.role_arn()),
        );
    }
    if let Some(a) = action.cloudwatch_alarm() {
        flattened.push(
            ActionFields::new("cloudwatch-alarm")
                .put("alarm-name", a.alarm_name())
                .put("state-value", a.state_value())
                .put("state-reason", a.state_reason())
                .put("role-arn", a.role_arn()),
        );
    }
    if let Some(a) = action.elasticsearch() {
        flattened.push(
            ActionFields::new("elasticsearch")
                .put("endpoint", a.endpoint())
                .put("index", a.index())
                .put("type", a.r#type())
                .put("id", a.id())
                .put("role-arn", a.role_arn()),
        );
    }
    flattened.into_iter().map(|fields| fields.0).collect()
}

#[async_trait]
impl IotCatalog for AwsIotCatalog {
    async fn describe_endpoint(&self) -> RemoteResult<String> {
        Ok(self.endpoint.clone())
    }

    async fn list_things(&self, next_token: Option<String>) -> RemoteResult<Page<ThingSummary>> {
        let output = self
            .iot
            .list_things()
            .max_results(PAGE_SIZE as i32)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(classify)?;
        let items = output
            .things()
            .iter()
            .filter_map(|thing| {
                Some(ThingSummary {
                    name: thing.thing_name()?.to_string(),
                    arn: thing.thing_arn().map(str::to_string),
                })
            })
            .collect();
        Ok(Page {
            items,
            next_token: output.next_token().map(str::to_string),
        })
    }

    async fn create_thing(&self, name: &str) -> RemoteResult<ThingSummary> {
        let output = self
            .iot
            .create_thing()
            .thing_name(name)
            .send()
            .await
            .map_err(classify)?;
        Ok(ThingSummary {
            name: output.thing_name().unwrap_or(name).to_string(),
            arn: output.thing_arn().map(str::to_string),
        })
    }

    async fn delete_thing(&self, name: &str) -> RemoteResult<()> {
        self.iot
            .delete_thing()
            .thing_name(name)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn list_thing_principals(
        &self,
        thing: &str,
        next_token: Option<String>,
    ) -> RemoteResult<Page<String>> {
        let output = self
            .iot
            .list_thing_principals()
            .thing_name(thing)
            .max_results(PAGE_SIZE as i32)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(classify)?;
        Ok(Page {
            items: output.principals().to_vec(),
            next_token: output.next_token().map(str::to_string),
        })
    }

    async fn attach_thing_principal(&self, thing: &str, principal: &str) -> RemoteResult<()> {
        self.iot
            .attach_thing_principal()
            .thing_name(thing)
            .principal(principal)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn detach_thing_principal(&self, thing: &str, principal: &str) -> RemoteResult<()> {
        self.iot
            .detach_thing_principal()
            .thing_name(thing)
            .principal(principal)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn get_thing_shadow(&self, thing: &str) -> RemoteResult<Option<Vec<u8>>> {
        match self.data.get_thing_shadow().thing_name(thing).send().await {
            Ok(output) => Ok(output.payload().map(|blob| blob.as_ref().to_vec())),
            Err(err) => match classify(err) {
                RemoteError::NotFound(_) => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn update_thing_shadow(&self, thing: &str, document: &[u8]) -> RemoteResult<()> {
        self.data
            .update_thing_shadow()
            .thing_name(thing)
            .payload(Blob::new(document.to_vec()))
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn list_certificates(
        &self,
        next_token: Option<String>,
    ) -> RemoteResult<Page<CertificateSummary>> {
        let output = self
            .iot
            .list_certificates()
            .page_size(PAGE_SIZE as i32)
            .set_marker(next_token)
            .send()
            .await
            .map_err(classify)?;
        let items = output
            .certificates()
            .iter()
            .filter_map(|cert| {
                let status = match cert.status() {
                    Some(SdkCertificateStatus::Active) => CertificateStatus::Active,
                    Some(SdkCertificateStatus::Inactive) => CertificateStatus::Inactive,
                    _ => CertificateStatus::Other,
                };
                Some(CertificateSummary {
                    id: cert.certificate_id()?.to_string(),
                    arn: cert.certificate_arn()?.to_string(),
                    status,
                    created: system_time(cert.creation_date()),
                })
            })
            .collect();
        Ok(Page {
            items,
            next_token: output.next_marker().map(str::to_string),
        })
    }

    async fn create_keys_and_certificate(&self, active: bool) -> RemoteResult<NewCertificate> {
        let output = self
            .iot
            .create_keys_and_certificate()
            .set_as_active(active)
            .send()
            .await
            .map_err(classify)?;
        let key_pair = output.key_pair();
        Ok(NewCertificate {
            id: output
                .certificate_id()
                .ok_or_else(|| missing("certificate id"))?
                .to_string(),
            arn: output
                .certificate_arn()
                .ok_or_else(|| missing("certificate arn"))?
                .to_string(),
            certificate_pem: output.certificate_pem().map(str::to_string),
            public_key: key_pair.and_then(|k| k.public_key()).map(str::to_string),
            private_key: key_pair.and_then(|k| k.private_key()).map(str::to_string),
        })
    }

    async fn update_certificate_status(
        &self,
        certificate_id: &str,
        status: CertificateStatus,
    ) -> RemoteResult<()> {
        let new_status = match status {
            CertificateStatus::Active => SdkCertificateStatus::Active,
            CertificateStatus::Inactive => SdkCertificateStatus::Inactive,
            CertificateStatus::Other => {
                return Err(RemoteError::InvalidRequest(
                    "certificate status must be ACTIVE or INACTIVE".to_string(),
                ));
            }
        };
        self.iot
            .update_certificate()
            .certificate_id(certificate_id)
            .new_status(new_status)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_certificate(&self, certificate_id: &str) -> RemoteResult<()> {
        self.iot
            .delete_certificate()
            .certificate_id(certificate_id)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn list_principal_policies(
        &self,
        principal: &str,
        next_token: Option<String>,
    ) -> RemoteResult<Page<String>> {
        let output = self
            .iot
            .list_attached_policies()
            .target(principal)
            .page_size(PAGE_SIZE as i32)
            .set_marker(next_token)
            .send()
            .await
            .map_err(classify)?;
        Ok(Page {
            items: output
                .policies()
                .iter()
                .filter_map(|p| p.policy_name().map(str::to_string))
                .collect(),
            next_token: output.next_marker().map(str::to_string),
        })
    }

    async fn attach_policy(&self, principal: &str, policy: &str) -> RemoteResult<()> {
        self.iot
            .attach_policy()
            .policy_name(policy)
            .target(principal)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn detach_policy(&self, principal: &str, policy: &str) -> RemoteResult<()> {
        self.iot
            .detach_policy()
            .policy_name(policy)
            .target(principal)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn list_policies(&self, next_token: Option<String>) -> RemoteResult<Page<PolicySummary>> {
        let output = self
            .iot
            .list_policies()
            .page_size(PAGE_SIZE as i32)
            .set_marker(next_token)
            .send()
            .await
            .map_err(classify)?;
        let items = output
            .policies()
            .iter()
            .filter_map(|p| {
                Some(PolicySummary {
                    name: p.policy_name()?.to_string(),
                    arn: p.policy_arn().map(str::to_string),
                })
            })
            .collect();
        Ok(Page {
            items,
            next_token: output.next_marker().map(str::to_string),
        })
    }

    async fn create_policy(&self, name: &str, document: &str) -> RemoteResult<PolicySummary> {
        let output = self
            .iot
            .create_policy()
            .policy_name(name)
            .policy_document(document)
            .send()
            .await
            .map_err(classify)?;
        Ok(PolicySummary {
            name: output.policy_name().unwrap_or(name).to_string(),
            arn: output.policy_arn().map(str::to_string),
        })
    }

    async fn delete_policy(&self, name: &str) -> RemoteResult<()> {
        self.iot
            .delete_policy()
            .policy_name(name)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn get_policy_document(&self, name: &str, version: Option<&str>) -> RemoteResult<String> {
        let document = match version {
            Some(version) => self
                .iot
                .get_policy_version()
                .policy_name(name)
                .policy_version_id(version)
                .send()
                .await
                .map_err(classify)?
                .policy_document()
                .map(str::to_string),
            None => self
                .iot
                .get_policy()
                .policy_name(name)
                .send()
                .await
                .map_err(classify)?
                .policy_document()
                .map(str::to_string),
        };
        document.ok_or_else(|| missing("policy document"))
    }

    async fn list_policy_versions(&self, name: &str) -> RemoteResult<Vec<PolicyVersionSummary>> {
        let output = self
            .iot
            .list_policy_versions()
            .policy_name(name)
            .send()
            .await
            .map_err(classify)?;
        Ok(output
            .policy_versions()
            .iter()
            .filter_map(|v| {
                Some(PolicyVersionSummary {
                    version_id: v.version_id()?.to_string(),
                    is_default: v.is_default_version().into_option().unwrap_or(false),
                    created: system_time(v.create_date()),
                })
            })
            .collect())
    }

    async fn create_policy_version(
        &self,
        name: &str,
        document: &str,
        set_as_default: bool,
    ) -> RemoteResult<String> {
        let output = self
            .iot
            .create_policy_version()
            .policy_name(name)
            .policy_document(document)
            .set_as_default(set_as_default)
            .send()
            .await
            .map_err(classify)?;
        output
            .policy_version_id()
            .map(str::to_string)
            .ok_or_else(|| missing("policy version id"))
    }

    async fn set_default_policy_version(&self, name: &str, version: &str) -> RemoteResult<()> {
        self.iot
            .set_default_policy_version()
            .policy_name(name)
            .policy_version_id(version)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_policy_version(&self, name: &str, version: &str) -> RemoteResult<()> {
        self.iot
            .delete_policy_version()
            .policy_name(name)
            .policy_version_id(version)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn list_topic_rules(
        &self,
        next_token: Option<String>,
    ) -> RemoteResult<Page<TopicRuleSummary>> {
        let output = self
            .iot
            .list_topic_rules()
            .max_results(PAGE_SIZE as i32)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(classify)?;
        let items = output
            .rules()
            .iter()
            .filter_map(|rule| {
                Some(TopicRuleSummary {
                    name: rule.rule_name()?.to_string(),
                    arn: rule.rule_arn().map(str::to_string),
                    topic_pattern: rule.topic_pattern().map(str::to_string),
                    disabled: rule.rule_disabled().into_option().unwrap_or(false),
                    created: system_time(rule.created_at()),
                })
            })
            .collect();
        Ok(Page {
            items,
            next_token: output.next_token().map(str::to_string),
        })
    }

    async fn get_topic_rule(&self, name: &str) -> RemoteResult<TopicRuleDetail> {
        let output = self
            .iot
            .get_topic_rule()
            .rule_name(name)
            .send()
            .await
            .map_err(classify)?;
        let rule = output.rule().ok_or_else(|| missing("topic rule"))?;
        Ok(TopicRuleDetail {
            sql: rule.sql().into_option().unwrap_or_default(),
            actions: rule.actions().iter().flat_map(flatten_action).collect(),
        })
    }

    async fn delete_topic_rule(&self, name: &str) -> RemoteResult<()> {
        self.iot
            .delete_topic_rule()
            .rule_name(name)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }
}
