//! IAM policy documents shared by both stack builders.

use crate::domain::model::intrinsic::{get_att, join, sub};
use serde_json::{json, Value};

/// Service principals allowed to use a stack's encryption key.
pub const KEY_USER_SERVICES: [&str; 7] = [
    "s3.amazonaws.com",
    "ecr.amazonaws.com",
    "ecs.amazonaws.com",
    "logs.${AWS::Region}.amazonaws.com",
    "sqs.amazonaws.com",
    "events.amazonaws.com",
    "rds.amazonaws.com",
];

pub const KEY_USER_ACTIONS: [&str; 5] = [
    "kms:Encrypt",
    "kms:Decrypt",
    "kms:ReEncrypt*",
    "kms:GenerateDataKey*",
    "kms:DescribeKey",
];

pub fn policy_document(statements: Vec<Value>) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": statements,
    })
}

pub fn allow(actions: &[&str], resources: Vec<Value>) -> Value {
    json!({
        "Effect": "Allow",
        "Action": actions,
        "Resource": resources,
    })
}

pub fn account_root() -> Value {
    sub("arn:${AWS::Partition}:iam::${AWS::AccountId}:root")
}

/// Root gets full use; the listed services get encrypt/decrypt/describe.
pub fn encryption_key_policy() -> Value {
    let services: Vec<Value> = KEY_USER_SERVICES
        .iter()
        .map(|s| if s.contains("${") { sub(s) } else { json!(s) })
        .collect();

    policy_document(vec![
        json!({
            "Sid": "EnableRootAccountAccess",
            "Effect": "Allow",
            "Principal": { "AWS": account_root() },
            "Action": "kms:*",
            "Resource": "*",
        }),
        json!({
            "Sid": "AllowServicePrincipalUse",
            "Effect": "Allow",
            "Principal": { "Service": services },
            "Action": KEY_USER_ACTIONS,
            "Resource": "*",
        }),
    ])
}

/// Denies every request to the bucket that is not made over TLS.
pub fn ssl_only_statement(bucket_logical_id: &str) -> Value {
    let bucket_arn = get_att(bucket_logical_id, "Arn");
    json!({
        "Sid": "DenyInsecureTransport",
        "Effect": "Deny",
        "Principal": { "AWS": "*" },
        "Action": "s3:*",
        "Resource": [bucket_arn.clone(), join("", vec![bucket_arn, json!("/*")])],
        "Condition": { "Bool": { "aws:SecureTransport": "false" } },
    })
}

pub fn assume_role_policy(service: &str) -> Value {
    policy_document(vec![json!({
        "Effect": "Allow",
        "Principal": { "Service": service },
        "Action": "sts:AssumeRole",
    })])
}

/// `<bucket-arn>/*`
pub fn objects_in(bucket_arn: Value) -> Value {
    join("", vec![bucket_arn, json!("/*")])
}
