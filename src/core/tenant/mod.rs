//! Per-tenant stack: network, identity, database, compute and storage bound to
//! the shared platform through imported exports.

mod compute;
mod database;
mod identity;
mod network;
mod storage;

use crate::config::TenantConfig;
use crate::core::constructs::encryption_key;
use crate::core::exports::ExportNamespace;
use crate::core::target::{Target, SHARE_SERVICE_TARGET};
use crate::domain::model::intrinsic::{get_att, reference, sub};
use crate::domain::model::Output;
use crate::domain::ports::{GraphSink, StackBuilder};
use crate::utils::error::{Result, StackError};

pub use compute::{
    ENVIRONMENT_VARIABLES, HEALTH_CHECK_INTERVAL_SECONDS, HEALTH_CHECK_PATH, LISTENER_PORT,
    SECRET_VARIABLES, TLS_LISTENER_PORT,
};
pub use network::{GATEWAY_ENDPOINT, INTERFACE_ENDPOINTS};

pub const TENANT_KEY: &str = "TenantKey";
pub const VPC: &str = "Vpc";
pub const DATA_BUCKET: &str = "DataBucket";
pub const INGEST_QUEUE: &str = "IngestQueue";
pub const SCAN_RESULT_RULE: &str = "MalwareScanResultRule";
pub const USER_POOL: &str = "UserPool";
pub const USER_POOL_DOMAIN: &str = "UserPoolDomain";
pub const USER_POOL_CLIENT: &str = "UserPoolClient";
pub const OAUTH_CLIENT_SECRET: &str = "OAuthClientSecret";
pub const DATABASE: &str = "Database";
pub const LOAD_BALANCER: &str = "LoadBalancer";
pub const SERVICE: &str = "ApiService";
pub const TASK_DEFINITION: &str = "ApiTaskDefinition";
pub const TASK_ROLE: &str = "ApiTaskRole";
pub const FRONTEND_DISTRIBUTION: &str = "FrontendDistribution";

pub const LOAD_BALANCER_SG: &str = "LoadBalancerSecurityGroup";
pub const SERVICE_SG: &str = "ServiceSecurityGroup";
pub const ENDPOINT_SG: &str = "EndpointSecurityGroup";
pub const DATABASE_SG: &str = "DatabaseSecurityGroup";

pub const AZ_COUNT: usize = 2;

/// Values resolved outside the builder, before construction starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookups {
    pub s3_prefix_list_id: String,
}

/// Tenants may not take the shared platform's identifier, neither as the
/// requested target (`Share-Service` normalizes to it) nor as `tenantId`.
pub fn ensure_tenant_id(tenant_id: &str, config: &TenantConfig) -> Result<()> {
    for (field, value) in [("target", tenant_id), ("tenantId", config.tenant_id.as_str())] {
        if value == SHARE_SERVICE_TARGET {
            return Err(StackError::InvalidConfigValueError {
                field: field.to_string(),
                value: value.to_string(),
                reason: format!(
                    "`{}` is reserved for the shared platform and cannot be a tenant",
                    SHARE_SERVICE_TARGET
                ),
            });
        }
    }
    Ok(())
}

pub struct TenantStackBuilder<'a> {
    target_id: String,
    config: &'a TenantConfig,
    shared: ExportNamespace,
    lookups: Lookups,
}

impl<'a> TenantStackBuilder<'a> {
    /// `tenant_id` is the normalized target identifier; it names the stack.
    pub fn new(tenant_id: &str, config: &'a TenantConfig, lookups: Lookups) -> Result<Self> {
        ensure_tenant_id(tenant_id, config)?;
        // Tenant stacks cannot be built without a model to authorize.
        config.bedrock_model_id()?;
        Ok(Self {
            target_id: tenant_id.to_string(),
            config,
            shared: ExportNamespace::shared_platform(&config.environment, &config.aws.region),
            lookups,
        })
    }

    pub fn shared_exports(&self) -> &ExportNamespace {
        &self.shared
    }

    fn tenant_id(&self) -> &str {
        &self.config.tenant_id
    }

    fn listener_port(&self) -> u16 {
        match self.config.services.api.certificate_arn() {
            Some(_) => TLS_LISTENER_PORT,
            None => LISTENER_PORT,
        }
    }

    /// `<scheme>://<alb-dns><callbackPath>`, the OAuth redirect handled by the API service.
    fn redirect_url(&self) -> serde_json::Value {
        let scheme = match self.config.services.api.certificate_arn() {
            Some(_) => "https",
            None => "http",
        };
        sub(&format!(
            "{}://${{{}.DNSName}}{}",
            scheme,
            LOAD_BALANCER,
            self.config.services.api.callback_path()
        ))
    }

    fn auth_domain(&self) -> serde_json::Value {
        sub(&format!(
            "${{{}}}.auth.${{AWS::Region}}.amazoncognito.com",
            USER_POOL_DOMAIN
        ))
    }

    fn frontend_origin(&self) -> serde_json::Value {
        sub(&format!("https://${{{}.DomainName}}", FRONTEND_DISTRIBUTION))
    }

    fn declare_outputs(&self, sink: &mut dyn GraphSink) -> Result<()> {
        sink.add_output(
            "UserPoolId",
            Output::new(reference(USER_POOL)).described("Cognito user pool id"),
        )?;
        sink.add_output(
            "AuthDomain",
            Output::new(self.auth_domain()).described("Hosted sign-in domain"),
        )?;
        sink.add_output(
            "LoadBalancerDnsName",
            Output::new(get_att(LOAD_BALANCER, "DNSName")).described("Public API endpoint"),
        )?;
        sink.add_output(
            "DataBucketName",
            Output::new(reference(DATA_BUCKET)).described("Tenant data bucket"),
        )?;
        if self.config.frontend_enabled() {
            sink.add_output(
                "FrontendUrl",
                Output::new(self.frontend_origin()).described("Frontend distribution URL"),
            )?;
        }
        Ok(())
    }
}

impl StackBuilder for TenantStackBuilder<'_> {
    fn stack_name(&self) -> String {
        Target::Tenant(self.target_id.clone()).stack_name()
    }

    fn description(&self) -> String {
        format!(
            "Tenant {} ({}) in {}",
            self.config.tenant_id, self.config.environment, self.config.aws.region
        )
    }

    fn build(&self, sink: &mut dyn GraphSink) -> Result<()> {
        let names = self.config.names();

        encryption_key(
            sink,
            TENANT_KEY,
            &names.key_alias("key"),
            &format!("Encryption key for tenant {}", self.tenant_id()),
            self.config.removal_policy(),
        )?;

        network::declare(self, sink)?;
        storage::declare(self, sink)?;
        identity::declare(self, sink)?;
        database::declare(self, sink)?;
        compute::declare(self, sink)?;
        network::declare_reachability(self, sink)?;
        self.declare_outputs(sink)?;

        tracing::info!("🏗️ Declared tenant stack for {}", names.prefix());
        Ok(())
    }
}
