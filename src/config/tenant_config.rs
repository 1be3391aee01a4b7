use crate::config::loader::ResolvedConfig;
use crate::core::naming::ResourceNames;
use crate::domain::model::RemovalPolicy;
use crate::utils::error::{Result, StackError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Environments in which data-destroying removal settings are refused.
pub const PROTECTED_ENVIRONMENTS: [&str; 2] = ["prod", "production"];

/// Longest allowed `<tenantId>-<environment>` prefix; keeps every derived bucket name under 63 chars.
pub const MAX_PREFIX_LEN: usize = 40;

/// Paths every deployment target must define after merging.
const REQUIRED_FIELDS: [&str; 4] = [
    "/environment",
    "/aws/region",
    "/aws/accountId",
    "/services/api/image/tag",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TenantConfig {
    pub tenant_id: String,
    pub environment: String,
    pub aws: AwsConfig,
    pub services: ServicesConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub frontend: FrontendConfig,
    #[serde(default)]
    pub data_protection: DataProtectionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AwsConfig {
    pub region: String,
    #[serde(deserialize_with = "string_or_number")]
    pub account_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServicesConfig {
    pub api: ApiServiceConfig,
    pub batch: Option<BatchServiceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageConfig {
    pub tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiServiceConfig {
    pub image: ImageConfig,
    pub bedrock_model_id: Option<String>,
    pub cpu: Option<u32>,
    pub memory: Option<u32>,
    pub container_port: Option<u16>,
    pub desired_count: Option<u32>,
    pub callback_path: Option<String>,
    pub extra_callback_urls: Option<Vec<String>>,
    pub federated_credentials: Option<bool>,
    /// ACM certificate for an HTTPS listener; without one the load balancer serves plain HTTP.
    pub certificate_arn: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchServiceConfig {
    pub image: ImageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    pub name: Option<String>,
    pub username: Option<String>,
    pub engine_version: Option<String>,
    pub instance_class: Option<String>,
    pub readers: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub nat_gateways: Option<u32>,
    pub s3_prefix_list_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FrontendConfig {
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RemovalSetting {
    #[default]
    Retain,
    Destroy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DataProtectionConfig {
    pub removal_policy: Option<RemovalSetting>,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        // YAML reads an unquoted account id as an integer and drops leading zeros.
        Raw::Number(n) => format!("{:012}", n),
    })
}

impl TenantConfig {
    /// Builds the typed configuration from a merged document.
    ///
    /// A missing `tenantId` falls back to the lower-cased target identifier.
    pub fn from_resolved(resolved: &ResolvedConfig) -> Result<Self> {
        let mut document = resolved.document.clone();
        if !document.contains_key("tenantId") {
            document.insert(
                "tenantId".to_string(),
                Value::String(resolved.target.to_lowercase()),
            );
        }
        let document = Value::Object(document);

        for pointer in REQUIRED_FIELDS {
            if document.pointer(pointer).map_or(true, Value::is_null) {
                return Err(StackError::MissingConfigError {
                    field: pointer.trim_start_matches('/').replace('/', "."),
                });
            }
        }

        serde_json::from_value(document).map_err(|e| StackError::InvalidConfigValueError {
            field: "config".to_string(),
            value: resolved.target.clone(),
            reason: e.to_string(),
        })
    }

    pub fn names(&self) -> ResourceNames<'_> {
        ResourceNames::new(&self.tenant_id, &self.environment, &self.aws.account_id)
    }

    /// Required only by tenant stacks.
    pub fn bedrock_model_id(&self) -> Result<&str> {
        validation::validate_required_field(
            "services.api.bedrockModelId",
            &self.services.api.bedrock_model_id,
        )
        .map(String::as_str)
    }

    pub fn is_protected_environment(&self) -> bool {
        PROTECTED_ENVIRONMENTS.contains(&self.environment.as_str())
    }

    pub fn removal_policy(&self) -> RemovalPolicy {
        match self.data_protection.removal_policy.unwrap_or_default() {
            RemovalSetting::Retain => RemovalPolicy::Retain,
            RemovalSetting::Destroy => RemovalPolicy::Delete,
        }
    }

    pub fn frontend_enabled(&self) -> bool {
        self.frontend.enabled.unwrap_or(false)
    }

    pub fn nat_gateways(&self) -> u32 {
        self.network.nat_gateways.unwrap_or(1)
    }
}

impl ApiServiceConfig {
    pub fn cpu(&self) -> u32 {
        self.cpu.unwrap_or(256)
    }

    pub fn memory(&self) -> u32 {
        self.memory.unwrap_or(512)
    }

    pub fn container_port(&self) -> u16 {
        self.container_port.unwrap_or(8080)
    }

    pub fn desired_count(&self) -> u32 {
        self.desired_count.unwrap_or(1)
    }

    pub fn callback_path(&self) -> &str {
        self.callback_path
            .as_deref()
            .unwrap_or("/api/v1/auth/callback")
    }

    pub fn extra_callback_urls(&self) -> &[String] {
        self.extra_callback_urls.as_deref().unwrap_or(&[])
    }

    pub fn federated_credentials(&self) -> bool {
        self.federated_credentials.unwrap_or(false)
    }

    pub fn certificate_arn(&self) -> Option<&str> {
        self.certificate_arn.as_deref()
    }
}

impl DatabaseConfig {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("app")
    }

    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or("app_admin")
    }

    pub fn engine_version(&self) -> &str {
        self.engine_version.as_deref().unwrap_or("15.4")
    }

    pub fn instance_class(&self) -> &str {
        self.instance_class.as_deref().unwrap_or("db.t3.medium")
    }

    pub fn readers(&self) -> u32 {
        self.readers.unwrap_or(1)
    }
}

impl Validate for TenantConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_dns_label("tenantId", &self.tenant_id)?;
        validation::validate_dns_label("environment", &self.environment)?;
        let names = self.names();
        validation::validate_max_length("tenantId+environment", &names.prefix(), MAX_PREFIX_LEN)?;

        validation::validate_aws_region("aws.region", &self.aws.region)?;
        validation::validate_account_id("aws.accountId", &self.aws.account_id)?;

        validation::validate_non_empty_string("services.api.image.tag", &self.services.api.image.tag)?;
        if let Some(batch) = &self.services.batch {
            validation::validate_non_empty_string("services.batch.image.tag", &batch.image.tag)?;
        }
        if let Some(model) = &self.services.api.bedrock_model_id {
            validation::validate_non_empty_string("services.api.bedrockModelId", model)?;
        }

        let api = &self.services.api;
        validation::validate_range("services.api.cpu", api.cpu(), 256, 16384)?;
        validation::validate_range("services.api.memory", api.memory(), 512, 122_880)?;
        validation::validate_range("services.api.containerPort", api.container_port(), 1, u16::MAX)?;
        validation::validate_range("services.api.desiredCount", api.desired_count(), 0, 100)?;
        validation::validate_url_path("services.api.callbackPath", api.callback_path())?;
        for url in api.extra_callback_urls() {
            validation::validate_url("services.api.extraCallbackUrls", url)?;
        }
        if let Some(arn) = api.certificate_arn() {
            if !arn.starts_with("arn:") || !arn.contains(":acm:") {
                return Err(StackError::InvalidConfigValueError {
                    field: "services.api.certificateArn".to_string(),
                    value: arn.to_string(),
                    reason: "Expected an ACM certificate ARN".to_string(),
                });
            }
        } else if self.is_protected_environment() {
            tracing::warn!(
                "⚠️ {} has no services.api.certificateArn; the hosted sign-in will refuse a plain HTTP callback",
                names.prefix()
            );
        }

        validation::validate_non_empty_string("database.name", self.database.name())?;
        validation::validate_non_empty_string("database.username", self.database.username())?;
        validation::validate_range("database.readers", self.database.readers(), 1, 15)?;

        validation::validate_range("network.natGateways", self.nat_gateways(), 0, 2)?;
        if let Some(id) = &self.network.s3_prefix_list_id {
            if !id.starts_with("pl-") {
                return Err(StackError::InvalidConfigValueError {
                    field: "network.s3PrefixListId".to_string(),
                    value: id.clone(),
                    reason: "Prefix list ids start with 'pl-'".to_string(),
                });
            }
        }

        for bucket in names.bucket_names() {
            validation::validate_s3_bucket_name("bucket name", &bucket)?;
        }

        if self.is_protected_environment() && self.removal_policy() == RemovalPolicy::Delete {
            return Err(StackError::InvalidConfigValueError {
                field: "dataProtection".to_string(),
                value: self.environment.clone(),
                reason: "A destroy removal policy is not allowed in a protected environment".to_string(),
            });
        }

        tracing::debug!("✅ Configuration for {} passed validation", names.prefix());
        Ok(())
    }
}
