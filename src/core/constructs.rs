//! Resource groups both stacks declare the same way.

use crate::core::policies::{encryption_key_policy, policy_document, ssl_only_statement};
use crate::domain::model::intrinsic::reference;
use crate::domain::model::{RemovalPolicy, Resource};
use crate::domain::ports::GraphSink;
use crate::utils::error::Result;
use serde_json::{json, Value};

/// Customer-managed key with rotation and an alias (`<logical_id>Alias`).
pub fn encryption_key(
    sink: &mut dyn GraphSink,
    logical_id: &str,
    alias: &str,
    description: &str,
    removal: RemovalPolicy,
) -> Result<()> {
    sink.add_resource(
        logical_id,
        Resource::new(
            "AWS::KMS::Key",
            json!({
                "Description": description,
                "EnableKeyRotation": true,
                "KeyPolicy": encryption_key_policy(),
            }),
        )
        .with_removal_policy(removal),
    )?;
    sink.add_resource(
        &format!("{}Alias", logical_id),
        Resource::new(
            "AWS::KMS::Alias",
            json!({
                "AliasName": alias,
                "TargetKeyId": reference(logical_id),
            }),
        ),
    )
}

/// A private bucket that refuses plain-HTTP access.
///
/// Buckets encrypt with the given KMS key, or with S3-managed keys when none
/// is set. The bucket policy (`<logical_id>Policy`) carries the TLS-only deny
/// plus any extra statements.
#[derive(Debug, Clone)]
pub struct BucketSpec<'a> {
    logical_id: &'a str,
    bucket_name: String,
    removal: RemovalPolicy,
    key_arn: Option<Value>,
    extra_statements: Vec<Value>,
    cors_origins: Vec<Value>,
}

impl<'a> BucketSpec<'a> {
    pub fn new(logical_id: &'a str, bucket_name: String, removal: RemovalPolicy) -> Self {
        Self {
            logical_id,
            bucket_name,
            removal,
            key_arn: None,
            extra_statements: Vec::new(),
            cors_origins: Vec::new(),
        }
    }

    pub fn encrypted_with(mut self, key_arn: Value) -> Self {
        self.key_arn = Some(key_arn);
        self
    }

    pub fn with_statement(mut self, statement: Value) -> Self {
        self.extra_statements.push(statement);
        self
    }

    pub fn with_cors_origin(mut self, origin: Value) -> Self {
        self.cors_origins.push(origin);
        self
    }

    pub fn declare(self, sink: &mut dyn GraphSink) -> Result<()> {
        let encryption = match self.key_arn {
            Some(key_arn) => json!({
                "ServerSideEncryptionByDefault": {
                    "SSEAlgorithm": "aws:kms",
                    "KMSMasterKeyID": key_arn,
                },
                "BucketKeyEnabled": true,
            }),
            None => json!({
                "ServerSideEncryptionByDefault": { "SSEAlgorithm": "AES256" },
            }),
        };

        let mut bucket = Resource::new(
            "AWS::S3::Bucket",
            json!({
                "BucketName": self.bucket_name,
                "BucketEncryption": { "ServerSideEncryptionConfiguration": [encryption] },
                "PublicAccessBlockConfiguration": {
                    "BlockPublicAcls": true,
                    "BlockPublicPolicy": true,
                    "IgnorePublicAcls": true,
                    "RestrictPublicBuckets": true,
                },
                "OwnershipControls": {
                    "Rules": [{ "ObjectOwnership": "BucketOwnerEnforced" }],
                },
                "VersioningConfiguration": { "Status": "Enabled" },
            }),
        )
        .with_removal_policy(self.removal);

        if !self.cors_origins.is_empty() {
            bucket.properties.insert(
                "CorsConfiguration".to_string(),
                json!({
                    "CorsRules": [{
                        "AllowedMethods": ["GET", "PUT", "POST", "DELETE"],
                        "AllowedOrigins": self.cors_origins,
                        "AllowedHeaders": ["*"],
                    }],
                }),
            );
        }
        sink.add_resource(self.logical_id, bucket)?;

        let mut statements = vec![ssl_only_statement(self.logical_id)];
        statements.extend(self.extra_statements);
        sink.add_resource(
            &format!("{}Policy", self.logical_id),
            Resource::new(
                "AWS::S3::BucketPolicy",
                json!({
                    "Bucket": reference(self.logical_id),
                    "PolicyDocument": policy_document(statements),
                }),
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::StackTemplate;

    #[test]
    fn private_bucket_blocks_public_access() {
        let mut t = StackTemplate::new("s", "test");
        BucketSpec::new("Data", "a-b-111111111111-data".into(), RemovalPolicy::Retain)
            .encrypted_with(json!("arn"))
            .declare(&mut t)
            .unwrap();
        let bucket = t.resource("Data").unwrap();
        let block = &bucket.properties["PublicAccessBlockConfiguration"];
        assert_eq!(block["BlockPublicPolicy"], true);
        assert_eq!(bucket.deletion_policy, Some(RemovalPolicy::Retain));
        assert!(t.resource("DataPolicy").is_some());
        assert!(bucket.property("CorsConfiguration").is_none());
        let sse = &bucket.properties["BucketEncryption"]["ServerSideEncryptionConfiguration"][0];
        assert_eq!(sse["ServerSideEncryptionByDefault"]["SSEAlgorithm"], "aws:kms");
    }

    #[test]
    fn unencrypted_spec_falls_back_to_s3_managed_keys() {
        let mut t = StackTemplate::new("s", "test");
        BucketSpec::new("Site", "a-b-111111111111-frontend".into(), RemovalPolicy::Delete)
            .with_cors_origin(json!("https://example.com"))
            .declare(&mut t)
            .unwrap();
        let bucket = t.resource("Site").unwrap();
        let sse = &bucket.properties["BucketEncryption"]["ServerSideEncryptionConfiguration"][0];
        assert_eq!(sse["ServerSideEncryptionByDefault"]["SSEAlgorithm"], "AES256");
        assert!(bucket.property("CorsConfiguration").is_some());
    }

    #[test]
    fn key_has_rotation_and_alias() {
        let mut t = StackTemplate::new("s", "test");
        encryption_key(&mut t, "Key", "alias/x", "d", RemovalPolicy::Delete).unwrap();
        assert_eq!(t.resource("Key").unwrap().properties["EnableKeyRotation"], true);
        assert_eq!(t.resource("KeyAlias").unwrap().properties["AliasName"], "alias/x");
    }
}
