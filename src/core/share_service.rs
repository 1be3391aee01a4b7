use crate::config::TenantConfig;
use crate::core::constructs::{encryption_key, BucketSpec};
use crate::core::exports::{ExportKey, ExportNamespace};
use crate::core::policies::{allow, assume_role_policy, objects_in, policy_document};
use crate::core::target::{Target, SHARE_SERVICE_TARGET};
use crate::domain::model::intrinsic::{get_att, reference, sub};
use crate::domain::model::{Output, Resource};
use crate::domain::ports::{GraphSink, StackBuilder};
use crate::utils::error::{Result, StackError};
use serde_json::json;

pub const SHARED_KEY: &str = "SharedKey";
pub const INGEST_BUCKET: &str = "IngestBucket";
pub const MALWARE_SCAN_ROLE: &str = "MalwareScanRole";
pub const MALWARE_SCAN_PLAN: &str = "MalwareScanPlan";

/// Registry declared by the shared platform, with the export keys it publishes under.
struct Registry {
    logical_id: &'static str,
    suffix: &'static str,
    arn: ExportKey,
    name: ExportKey,
    uri: ExportKey,
}

const API_REGISTRY: Registry = Registry {
    logical_id: "ApiRepository",
    suffix: "api",
    arn: ExportKey::ApiRepositoryArn,
    name: ExportKey::ApiRepositoryName,
    uri: ExportKey::ApiRepositoryUri,
};

const BATCH_REGISTRY: Registry = Registry {
    logical_id: "BatchRepository",
    suffix: "batch",
    arn: ExportKey::BatchRepositoryArn,
    name: ExportKey::BatchRepositoryName,
    uri: ExportKey::BatchRepositoryUri,
};

/// Tenant-independent resources, built once per environment and region.
pub struct ShareServiceStackBuilder<'a> {
    config: &'a TenantConfig,
    exports: ExportNamespace,
}

impl<'a> ShareServiceStackBuilder<'a> {
    pub fn new(config: &'a TenantConfig) -> Result<Self> {
        if config.tenant_id != SHARE_SERVICE_TARGET {
            return Err(StackError::InvalidConfigValueError {
                field: "tenantId".to_string(),
                value: config.tenant_id.clone(),
                reason: format!(
                    "The shared platform publishes exports under `{}`",
                    SHARE_SERVICE_TARGET
                ),
            });
        }
        Ok(Self {
            config,
            exports: ExportNamespace::shared_platform(&config.environment, &config.aws.region),
        })
    }

    fn export(
        &self,
        sink: &mut dyn GraphSink,
        key: ExportKey,
        value: serde_json::Value,
        description: &str,
    ) -> Result<()> {
        sink.add_output(
            key.as_str(),
            Output::new(value)
                .described(description)
                .exported_as(self.exports.name(key)),
        )
    }

    fn declare_registry(&self, sink: &mut dyn GraphSink, registry: &Registry) -> Result<()> {
        let names = self.config.names();
        sink.add_resource(
            registry.logical_id,
            Resource::new(
                "AWS::ECR::Repository",
                json!({
                    "RepositoryName": names.name(registry.suffix),
                    "ImageTagMutability": "MUTABLE",
                    "ImageScanningConfiguration": { "ScanOnPush": true },
                    "EncryptionConfiguration": {
                        "EncryptionType": "KMS",
                        "KmsKey": get_att(SHARED_KEY, "Arn"),
                    },
                }),
            )
            .with_removal_policy(self.config.removal_policy()),
        )?;

        self.export(
            sink,
            registry.arn,
            get_att(registry.logical_id, "Arn"),
            "Container registry ARN",
        )?;
        self.export(
            sink,
            registry.name,
            reference(registry.logical_id),
            "Container registry name",
        )?;
        self.export(
            sink,
            registry.uri,
            get_att(registry.logical_id, "RepositoryUri"),
            "Container registry URI",
        )
    }

    fn declare_malware_scanning(&self, sink: &mut dyn GraphSink) -> Result<()> {
        let bucket_arn = get_att(INGEST_BUCKET, "Arn");
        let key_arn = get_att(SHARED_KEY, "Arn");
        let managed_rule = sub(
            "arn:${AWS::Partition}:events:${AWS::Region}:${AWS::AccountId}:rule/DO-NOT-DELETE-AmazonGuardDutyMalwareProtectionS3*",
        );

        sink.add_resource(
            MALWARE_SCAN_ROLE,
            Resource::new(
                "AWS::IAM::Role",
                json!({
                    "AssumeRolePolicyDocument":
                        assume_role_policy("malware-protection-plan.guardduty.amazonaws.com"),
                    "Policies": [{
                        "PolicyName": "malware-scan",
                        "PolicyDocument": policy_document(vec![
                            allow(
                                &["events:PutRule", "events:DeleteRule", "events:PutTargets",
                                  "events:RemoveTargets", "events:DescribeRule"],
                                vec![managed_rule],
                            ),
                            allow(
                                &["s3:PutBucketNotification", "s3:GetBucketNotification",
                                  "s3:ListBucket"],
                                vec![bucket_arn.clone()],
                            ),
                            allow(
                                &["s3:GetObject", "s3:GetObjectVersion", "s3:GetObjectTagging",
                                  "s3:GetObjectVersionTagging", "s3:PutObjectTagging",
                                  "s3:PutObjectVersionTagging"],
                                vec![objects_in(bucket_arn)],
                            ),
                            allow(
                                &["kms:Decrypt", "kms:GenerateDataKey", "kms:CreateGrant"],
                                vec![key_arn],
                            ),
                        ]),
                    }],
                }),
            ),
        )?;

        sink.add_resource(
            MALWARE_SCAN_PLAN,
            Resource::new(
                "AWS::GuardDuty::MalwareProtectionPlan",
                json!({
                    "Role": get_att(MALWARE_SCAN_ROLE, "Arn"),
                    "ProtectedResource": {
                        "S3Bucket": { "BucketName": reference(INGEST_BUCKET) },
                    },
                    "Actions": { "Tagging": { "Status": "ENABLED" } },
                }),
            )
            .depends_on(MALWARE_SCAN_ROLE)
            .depends_on(&format!("{}Policy", INGEST_BUCKET)),
        )
    }
}

impl StackBuilder for ShareServiceStackBuilder<'_> {
    fn stack_name(&self) -> String {
        Target::SharedPlatform.stack_name()
    }

    fn description(&self) -> String {
        format!(
            "Shared platform resources for {} in {}",
            self.config.environment, self.config.aws.region
        )
    }

    fn build(&self, sink: &mut dyn GraphSink) -> Result<()> {
        let names = self.config.names();
        let removal = self.config.removal_policy();

        encryption_key(
            sink,
            SHARED_KEY,
            &names.key_alias("shared-key"),
            "Shared platform encryption key",
            removal,
        )?;
        self.export(
            sink,
            ExportKey::KmsKeyArn,
            get_att(SHARED_KEY, "Arn"),
            "Shared encryption key ARN",
        )?;

        self.declare_registry(sink, &API_REGISTRY)?;
        if self.config.services.batch.is_some() {
            self.declare_registry(sink, &BATCH_REGISTRY)?;
        }

        BucketSpec::new(INGEST_BUCKET, names.bucket("ingest"), removal)
            .encrypted_with(get_att(SHARED_KEY, "Arn"))
            .declare(sink)?;
        self.export(
            sink,
            ExportKey::IngestBucketArn,
            get_att(INGEST_BUCKET, "Arn"),
            "Shared ingest bucket ARN",
        )?;

        self.declare_malware_scanning(sink)?;

        tracing::info!(
            "🏗️ Declared shared platform for {} ({} registries)",
            names.prefix(),
            if self.config.services.batch.is_some() { 2 } else { 1 }
        );
        Ok(())
    }
}
