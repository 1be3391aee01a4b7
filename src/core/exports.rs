//! Names under which the shared-platform stack publishes values for tenant stacks.
//!
//! Producer and consumer both build names through [`ExportNamespace::shared_platform`],
//! so the two sides cannot drift apart. The scheme is `tenantId + environment + region`;
//! stacks synthesized under an older scheme (tenant id only) will not resolve against
//! these names and must be re-synthesized together.

use crate::core::target::SHARE_SERVICE_TARGET;
use serde_json::Value;
use std::fmt;

/// Separator between name components. Validated components never contain it.
pub const EXPORT_SEPARATOR: char = ':';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExportKey {
    KmsKeyArn,
    ApiRepositoryArn,
    ApiRepositoryName,
    ApiRepositoryUri,
    BatchRepositoryArn,
    BatchRepositoryName,
    BatchRepositoryUri,
    IngestBucketArn,
}

impl ExportKey {
    pub const ALL: [ExportKey; 8] = [
        ExportKey::KmsKeyArn,
        ExportKey::ApiRepositoryArn,
        ExportKey::ApiRepositoryName,
        ExportKey::ApiRepositoryUri,
        ExportKey::BatchRepositoryArn,
        ExportKey::BatchRepositoryName,
        ExportKey::BatchRepositoryUri,
        ExportKey::IngestBucketArn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKey::KmsKeyArn => "KmsKeyArn",
            ExportKey::ApiRepositoryArn => "ApiRepositoryArn",
            ExportKey::ApiRepositoryName => "ApiRepositoryName",
            ExportKey::ApiRepositoryUri => "ApiRepositoryUri",
            ExportKey::BatchRepositoryArn => "BatchRepositoryArn",
            ExportKey::BatchRepositoryName => "BatchRepositoryName",
            ExportKey::BatchRepositoryUri => "BatchRepositoryUri",
            ExportKey::IngestBucketArn => "IngestBucketArn",
        }
    }
}

impl fmt::Display for ExportKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExportNamespace {
    tenant_id: String,
    environment: String,
    region: String,
}

impl ExportNamespace {
    pub fn new(tenant_id: &str, environment: &str, region: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            environment: environment.to_string(),
            region: region.to_string(),
        }
    }

    /// Namespace of the shared-platform stack deployed to `environment` in `region`.
    pub fn shared_platform(environment: &str, region: &str) -> Self {
        Self::new(SHARE_SERVICE_TARGET, environment, region)
    }

    pub fn name(&self, key: ExportKey) -> String {
        [
            self.tenant_id.as_str(),
            self.environment.as_str(),
            self.region.as_str(),
            key.as_str(),
        ]
        .join(&EXPORT_SEPARATOR.to_string())
    }

    /// `Fn::ImportValue` of the given key.
    pub fn import(&self, key: ExportKey) -> Value {
        crate::domain::model::intrinsic::import_value(&self.name(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composition_is_stable() {
        let ns = ExportNamespace::shared_platform("prod", "us-east-1");
        assert_eq!(
            ns.name(ExportKey::KmsKeyArn),
            "share-service:prod:us-east-1:KmsKeyArn"
        );
        assert_eq!(
            ns.name(ExportKey::KmsKeyArn),
            ExportNamespace::shared_platform("prod", "us-east-1").name(ExportKey::KmsKeyArn)
        );
    }

    #[test]
    fn hyphenated_components_do_not_collide() {
        let a = ExportNamespace::new("a-b", "c", "us-east-1");
        let b = ExportNamespace::new("a", "b-c", "us-east-1");
        assert_ne!(a.name(ExportKey::IngestBucketArn), b.name(ExportKey::IngestBucketArn));
    }
}
