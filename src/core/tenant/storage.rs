use super::{
    TenantStackBuilder, DATA_BUCKET, FRONTEND_DISTRIBUTION, INGEST_QUEUE, SCAN_RESULT_RULE,
    TENANT_KEY,
};
use crate::core::constructs::BucketSpec;
use crate::core::exports::ExportKey;
use crate::core::policies::{objects_in, policy_document};
use crate::domain::model::intrinsic::{bucket_name_from_arn, get_att, reference, sub};
use crate::domain::model::Resource;
use crate::domain::ports::GraphSink;
use crate::utils::error::Result;
use serde_json::{json, Value};

pub const FRONTEND_BUCKET: &str = "FrontendBucket";
pub const FRONTEND_OAC: &str = "FrontendOriginAccessControl";
pub const SCAN_RESULT_DETAIL_TYPE: &str = "GuardDuty Malware Protection Object Scan Result";

/// AWS managed `CachingOptimized` cache policy.
const CACHING_OPTIMIZED_POLICY: &str = "658327ea-f89d-4fab-a63d-7e88639e58f6";

/// Event pattern matching scan results for objects under `<tenantId>/` in the shared bucket.
pub fn scan_result_pattern(shared_bucket_name: Value, tenant_id: &str) -> Value {
    json!({
        "source": ["aws.guardduty"],
        "detail-type": [SCAN_RESULT_DETAIL_TYPE],
        "detail": {
            "s3ObjectDetails": {
                "bucketName": [shared_bucket_name],
                "objectKey": [{ "prefix": format!("{}/", tenant_id) }],
            },
        },
    })
}

pub(super) fn declare(builder: &TenantStackBuilder<'_>, sink: &mut dyn GraphSink) -> Result<()> {
    let config = builder.config;
    let names = config.names();
    let removal = config.removal_policy();

    let mut data_bucket = BucketSpec::new(DATA_BUCKET, names.bucket("data"), removal)
        .encrypted_with(get_att(TENANT_KEY, "Arn"));
    if config.frontend_enabled() {
        data_bucket = data_bucket.with_cors_origin(builder.frontend_origin());
    }
    data_bucket.declare(sink)?;

    if config.frontend_enabled() {
        declare_frontend(builder, sink)?;
    }

    declare_scan_result_routing(builder, sink)
}

/// Static site bucket served through CloudFront with origin access control.
fn declare_frontend(builder: &TenantStackBuilder<'_>, sink: &mut dyn GraphSink) -> Result<()> {
    let names = builder.config.names();

    // S3-managed encryption: the distribution cannot use the tenant key.
    BucketSpec::new(FRONTEND_BUCKET, names.bucket("frontend"), builder.config.removal_policy())
        .with_statement(json!({
            "Sid": "AllowCloudFrontRead",
            "Effect": "Allow",
            "Principal": { "Service": "cloudfront.amazonaws.com" },
            "Action": "s3:GetObject",
            "Resource": objects_in(get_att(FRONTEND_BUCKET, "Arn")),
            "Condition": {
                "StringEquals": {
                    "AWS:SourceArn": sub(&format!(
                        "arn:${{AWS::Partition}}:cloudfront::${{AWS::AccountId}}:distribution/${{{}}}",
                        FRONTEND_DISTRIBUTION
                    )),
                },
            },
        }))
        .declare(sink)?;

    sink.add_resource(
        FRONTEND_OAC,
        Resource::new(
            "AWS::CloudFront::OriginAccessControl",
            json!({
                "OriginAccessControlConfig": {
                    "Name": names.name("frontend-oac"),
                    "OriginAccessControlOriginType": "s3",
                    "SigningBehavior": "always",
                    "SigningProtocol": "sigv4",
                },
            }),
        ),
    )?;

    sink.add_resource(
        FRONTEND_DISTRIBUTION,
        Resource::new(
            "AWS::CloudFront::Distribution",
            json!({
                "DistributionConfig": {
                    "Enabled": true,
                    "Comment": format!("created-for-{}-frontend", builder.tenant_id()),
                    "DefaultRootObject": "index.html",
                    "Origins": [{
                        "Id": "frontend-origin",
                        "DomainName": get_att(FRONTEND_BUCKET, "RegionalDomainName"),
                        "S3OriginConfig": { "OriginAccessIdentity": "" },
                        "OriginAccessControlId": get_att(FRONTEND_OAC, "Id"),
                    }],
                    "DefaultCacheBehavior": {
                        "TargetOriginId": "frontend-origin",
                        "ViewerProtocolPolicy": "redirect-to-https",
                        "CachePolicyId": CACHING_OPTIMIZED_POLICY,
                        "AllowedMethods": ["GET", "HEAD"],
                    },
                },
            }),
        ),
    )
}

/// Routes malware-scan results for this tenant's uploads to a tenant-owned queue.
fn declare_scan_result_routing(
    builder: &TenantStackBuilder<'_>,
    sink: &mut dyn GraphSink,
) -> Result<()> {
    let names = builder.config.names();
    let shared_bucket_name =
        bucket_name_from_arn(builder.shared.import(ExportKey::IngestBucketArn));

    sink.add_resource(
        INGEST_QUEUE,
        Resource::new(
            "AWS::SQS::Queue",
            json!({
                "QueueName": names.name("ingest-scan-results"),
                "KmsMasterKeyId": get_att(TENANT_KEY, "Arn"),
                "MessageRetentionPeriod": 345600,
            }),
        )
        .with_removal_policy(builder.config.removal_policy()),
    )?;

    sink.add_resource(
        SCAN_RESULT_RULE,
        Resource::new(
            "AWS::Events::Rule",
            json!({
                "Description": format!("Malware scan results for {} uploads", builder.tenant_id()),
                "State": "ENABLED",
                "EventPattern": scan_result_pattern(shared_bucket_name, builder.tenant_id()),
                "Targets": [{ "Id": "ingest-queue", "Arn": get_att(INGEST_QUEUE, "Arn") }],
            }),
        ),
    )?;

    sink.add_resource(
        &format!("{}Policy", INGEST_QUEUE),
        Resource::new(
            "AWS::SQS::QueuePolicy",
            json!({
                "Queues": [reference(INGEST_QUEUE)],
                "PolicyDocument": policy_document(vec![json!({
                    "Effect": "Allow",
                    "Principal": { "Service": "events.amazonaws.com" },
                    "Action": "sqs:SendMessage",
                    "Resource": get_att(INGEST_QUEUE, "Arn"),
                    "Condition": { "ArnEquals": { "aws:SourceArn": get_att(SCAN_RESULT_RULE, "Arn") } },
                })]),
            }),
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_filters_by_bucket_and_tenant_prefix() {
        let pattern = scan_result_pattern(json!("shared-ingest"), "cust-001");
        assert_eq!(pattern["source"][0], "aws.guardduty");
        assert_eq!(pattern["detail"]["s3ObjectDetails"]["bucketName"][0], "shared-ingest");
        assert_eq!(
            pattern["detail"]["s3ObjectDetails"]["objectKey"][0]["prefix"],
            "cust-001/"
        );
    }
}
