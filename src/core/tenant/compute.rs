use super::identity::{CLIENT_ID_KEY, CLIENT_SECRET_KEY};
use super::network::{private_subnet_ids, public_subnet_ids, security_group, PUBLIC_DEFAULT_ROUTE};
use super::{
    TenantStackBuilder, DATA_BUCKET, DATABASE, INGEST_QUEUE, LOAD_BALANCER, LOAD_BALANCER_SG,
    OAUTH_CLIENT_SECRET, SERVICE, SERVICE_SG, TASK_DEFINITION, TASK_ROLE, TENANT_KEY, USER_POOL,
    VPC,
};
use crate::core::exports::ExportKey;
use crate::core::policies::{allow, assume_role_policy, objects_in, policy_document};
use crate::domain::model::intrinsic::{bucket_name_from_arn, get_att, join, reference, sub};
use crate::domain::model::Resource;
use crate::domain::ports::GraphSink;
use crate::utils::error::Result;
use serde_json::{json, Value};

/// Health endpoint the API container must serve.
pub const HEALTH_CHECK_PATH: &str = "/api/v1/health";
pub const HEALTH_CHECK_INTERVAL_SECONDS: u32 = 30;
pub const LISTENER_PORT: u16 = 80;
pub const TLS_LISTENER_PORT: u16 = 443;
pub const CONTAINER_NAME: &str = "api";

pub const CLUSTER: &str = "Cluster";
pub const LOG_GROUP: &str = "ApiLogGroup";
pub const EXECUTION_ROLE: &str = "ApiExecutionRole";
pub const TARGET_GROUP: &str = "ApiTargetGroup";
pub const LISTENER: &str = "Listener";

/// Plain environment variables handed to the API container.
pub const ENVIRONMENT_VARIABLES: [&str; 14] = [
    "AWS_REGION",
    "COGNITO_USER_POOL_ID",
    "COGNITO_DOMAIN",
    "COGNITO_REDIRECT_URL",
    "BEDROCK_MODEL_ID",
    "S3_SHARE_SERVICE_INGEST_BUCKET_NAME",
    "S3_TENANT_DATA_BUCKET_NAME",
    "SQS_TENANT_INGEST_S3_QUEUE_URL",
    "KMS_TENANT_KEY_ARN",
    "TENANT_ID",
    "DB_HOST",
    "DB_PORT",
    "DB_NAME",
    "DB_USER",
];

/// Variables injected from Secrets Manager.
pub const SECRET_VARIABLES: [&str; 3] = ["DB_PASSWORD", "COGNITO_CLIENT_ID", "COGNITO_CLIENT_SECRET"];

fn db_secret_arn() -> Value {
    get_att(DATABASE, "MasterUserSecret.SecretArn")
}

/// `<secret-arn>:<json-key>::` selects one key of a JSON secret.
fn secret_key(secret_arn: Value, key: &str) -> Value {
    join("", vec![secret_arn, json!(format!(":{}::", key))])
}

fn name_value(name: &str, value: Value) -> Value {
    json!({ "Name": name, "Value": value })
}

fn model_arn(model_id: &str) -> Value {
    sub(&format!(
        "arn:${{AWS::Partition}}:bedrock:${{AWS::Region}}::foundation-model/{}",
        model_id
    ))
}

fn container_environment(builder: &TenantStackBuilder<'_>, model_id: &str) -> Vec<Value> {
    let shared_bucket = bucket_name_from_arn(builder.shared.import(ExportKey::IngestBucketArn));
    let values = [
        reference("AWS::Region"),
        reference(USER_POOL),
        builder.auth_domain(),
        builder.redirect_url(),
        json!(model_id),
        shared_bucket,
        reference(DATA_BUCKET),
        reference(INGEST_QUEUE),
        get_att(TENANT_KEY, "Arn"),
        json!(builder.tenant_id()),
        get_att(DATABASE, "Endpoint.Address"),
        get_att(DATABASE, "Endpoint.Port"),
        json!(builder.config.database.name()),
        json!(builder.config.database.username()),
    ];
    ENVIRONMENT_VARIABLES
        .iter()
        .zip(values)
        .map(|(name, value)| name_value(name, value))
        .collect()
}

fn container_secrets() -> Vec<Value> {
    let sources = [
        secret_key(db_secret_arn(), "password"),
        secret_key(reference(OAUTH_CLIENT_SECRET), CLIENT_ID_KEY),
        secret_key(reference(OAUTH_CLIENT_SECRET), CLIENT_SECRET_KEY),
    ];
    SECRET_VARIABLES
        .iter()
        .zip(sources)
        .map(|(name, source)| json!({ "Name": name, "ValueFrom": source }))
        .collect()
}

/// Least-privilege statements for the running task.
fn task_statements(builder: &TenantStackBuilder<'_>, model_id: &str) -> Vec<Value> {
    let data_bucket = get_att(DATA_BUCKET, "Arn");
    let shared_bucket = builder.shared.import(ExportKey::IngestBucketArn);

    let mut statements = vec![
        allow(
            &["s3:GetObject", "s3:PutObject", "s3:DeleteObject"],
            vec![objects_in(data_bucket.clone()), objects_in(shared_bucket.clone())],
        ),
        allow(&["s3:ListBucket"], vec![data_bucket, shared_bucket]),
        allow(
            &["kms:Decrypt", "kms:DescribeKey", "kms:GenerateDataKey", "kms:CreateGrant"],
            vec![
                get_att(TENANT_KEY, "Arn"),
                builder.shared.import(ExportKey::KmsKeyArn),
            ],
        ),
        allow(
            &["bedrock:InvokeModel", "bedrock:InvokeModelWithResponseStream"],
            vec![model_arn(model_id)],
        ),
        allow(
            &[
                "sqs:ReceiveMessage",
                "sqs:DeleteMessage",
                "sqs:ChangeMessageVisibility",
                "sqs:GetQueueAttributes",
            ],
            vec![get_att(INGEST_QUEUE, "Arn")],
        ),
    ];

    if builder.config.services.api.federated_credentials() {
        statements.push(allow(
            &["sts:GetFederationToken"],
            vec![sub(&format!(
                "arn:${{AWS::Partition}}:sts::${{AWS::AccountId}}:federated-user/{}-*",
                builder.tenant_id()
            ))],
        ));
    }
    statements
}

pub(super) fn declare(builder: &TenantStackBuilder<'_>, sink: &mut dyn GraphSink) -> Result<()> {
    let config = builder.config;
    let names = config.names();
    let api = &config.services.api;
    let model_id = config.bedrock_model_id()?;
    let port = api.container_port();
    let listener_port = builder.listener_port();

    security_group(sink, LOAD_BALANCER_SG, "Public load balancer")?;
    security_group(sink, SERVICE_SG, "API service tasks")?;
    sink.add_resource(
        "LoadBalancerHttpIngress",
        Resource::new(
            "AWS::EC2::SecurityGroupIngress",
            json!({
                "GroupId": get_att(LOAD_BALANCER_SG, "GroupId"),
                "CidrIp": "0.0.0.0/0",
                "IpProtocol": "tcp",
                "FromPort": listener_port,
                "ToPort": listener_port,
                "Description": "Public listener",
            }),
        ),
    )?;

    sink.add_resource(
        CLUSTER,
        Resource::new(
            "AWS::ECS::Cluster",
            json!({
                "ClusterName": names.name("cluster"),
                "ClusterSettings": [{ "Name": "containerInsights", "Value": "enabled" }],
            }),
        ),
    )?;

    sink.add_resource(
        LOG_GROUP,
        Resource::new(
            "AWS::Logs::LogGroup",
            json!({
                "LogGroupName": format!("/ecs/{}", names.name("api")),
                "RetentionInDays": 30,
                "KmsKeyId": get_att(TENANT_KEY, "Arn"),
            }),
        )
        .with_removal_policy(config.removal_policy()),
    )?;

    sink.add_resource(
        EXECUTION_ROLE,
        Resource::new(
            "AWS::IAM::Role",
            json!({
                "AssumeRolePolicyDocument": assume_role_policy("ecs-tasks.amazonaws.com"),
                "ManagedPolicyArns": [sub(
                    "arn:${AWS::Partition}:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy"
                )],
                "Policies": [{
                    "PolicyName": "pull-and-secrets",
                    "PolicyDocument": policy_document(vec![
                        allow(
                            &["secretsmanager:GetSecretValue"],
                            vec![db_secret_arn(), reference(OAUTH_CLIENT_SECRET)],
                        ),
                        allow(
                            &["kms:Decrypt"],
                            vec![
                                get_att(TENANT_KEY, "Arn"),
                                builder.shared.import(ExportKey::KmsKeyArn),
                            ],
                        ),
                        allow(
                            &["ecr:BatchCheckLayerAvailability", "ecr:BatchGetImage",
                              "ecr:GetDownloadUrlForLayer"],
                            vec![builder.shared.import(ExportKey::ApiRepositoryArn)],
                        ),
                    ]),
                }],
            }),
        ),
    )?;

    sink.add_resource(
        TASK_ROLE,
        Resource::new(
            "AWS::IAM::Role",
            json!({
                "AssumeRolePolicyDocument": assume_role_policy("ecs-tasks.amazonaws.com"),
                "Policies": [{
                    "PolicyName": "api-task",
                    "PolicyDocument": policy_document(task_statements(builder, model_id)),
                }],
            }),
        ),
    )?;

    // Registry host from the tenant's own account and region; only the repository name is imported.
    let image = join(
        "",
        vec![
            sub("${AWS::AccountId}.dkr.ecr.${AWS::Region}.${AWS::URLSuffix}/"),
            builder.shared.import(ExportKey::ApiRepositoryName),
            json!(":"),
            json!(api.image.tag),
        ],
    );

    sink.add_resource(
        TASK_DEFINITION,
        Resource::new(
            "AWS::ECS::TaskDefinition",
            json!({
                "Family": names.name("api"),
                "Cpu": api.cpu().to_string(),
                "Memory": api.memory().to_string(),
                "NetworkMode": "awsvpc",
                "RequiresCompatibilities": ["FARGATE"],
                "ExecutionRoleArn": get_att(EXECUTION_ROLE, "Arn"),
                "TaskRoleArn": get_att(TASK_ROLE, "Arn"),
                "ContainerDefinitions": [{
                    "Name": CONTAINER_NAME,
                    "Image": image,
                    "Essential": true,
                    "PortMappings": [{ "ContainerPort": port, "Protocol": "tcp" }],
                    "Environment": container_environment(builder, model_id),
                    "Secrets": container_secrets(),
                    "LogConfiguration": {
                        "LogDriver": "awslogs",
                        "Options": {
                            "awslogs-group": reference(LOG_GROUP),
                            "awslogs-region": reference("AWS::Region"),
                            "awslogs-stream-prefix": "api-task-logs",
                        },
                    },
                }],
            }),
        ),
    )?;

    sink.add_resource(
        LOAD_BALANCER,
        Resource::new(
            "AWS::ElasticLoadBalancingV2::LoadBalancer",
            json!({
                "Type": "application",
                "Scheme": "internet-facing",
                "Subnets": public_subnet_ids(),
                "SecurityGroups": [get_att(LOAD_BALANCER_SG, "GroupId")],
            }),
        )
        .depends_on(PUBLIC_DEFAULT_ROUTE),
    )?;

    sink.add_resource(
        TARGET_GROUP,
        Resource::new(
            "AWS::ElasticLoadBalancingV2::TargetGroup",
            json!({
                "VpcId": reference(VPC),
                "Port": port,
                "Protocol": "HTTP",
                "TargetType": "ip",
                "HealthCheckPath": HEALTH_CHECK_PATH,
                "HealthCheckIntervalSeconds": HEALTH_CHECK_INTERVAL_SECONDS,
            }),
        ),
    )?;

    let mut listener = json!({
        "LoadBalancerArn": reference(LOAD_BALANCER),
        "Port": listener_port,
        "Protocol": "HTTP",
        "DefaultActions": [{ "Type": "forward", "TargetGroupArn": reference(TARGET_GROUP) }],
    });
    if let Some(certificate_arn) = api.certificate_arn() {
        listener["Protocol"] = json!("HTTPS");
        listener["Certificates"] = json!([{ "CertificateArn": certificate_arn }]);
        listener["SslPolicy"] = json!("ELBSecurityPolicy-TLS13-1-2-2021-06");
    }
    sink.add_resource(
        LISTENER,
        Resource::new("AWS::ElasticLoadBalancingV2::Listener", listener),
    )?;

    sink.add_resource(
        SERVICE,
        Resource::new(
            "AWS::ECS::Service",
            json!({
                "Cluster": reference(CLUSTER),
                "TaskDefinition": reference(TASK_DEFINITION),
                "LaunchType": "FARGATE",
                "DesiredCount": api.desired_count(),
                "HealthCheckGracePeriodSeconds": 60,
                "NetworkConfiguration": {
                    "AwsvpcConfiguration": {
                        "AssignPublicIp": "DISABLED",
                        "Subnets": private_subnet_ids(),
                        "SecurityGroups": [get_att(SERVICE_SG, "GroupId")],
                    },
                },
                "LoadBalancers": [{
                    "ContainerName": CONTAINER_NAME,
                    "ContainerPort": port,
                    "TargetGroupArn": reference(TARGET_GROUP),
                }],
            }),
        )
        .depends_on(LISTENER),
    )?;

    tracing::debug!("API service listens on {} behind port {}", port, listener_port);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_key_selects_json_field() {
        let v = secret_key(json!("arn:secret"), "password");
        assert_eq!(v["Fn::Join"][1][1], ":password::");
    }

    #[test]
    fn secrets_are_not_plain_environment() {
        for name in SECRET_VARIABLES {
            assert!(!ENVIRONMENT_VARIABLES.contains(&name));
        }
    }
}
