use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;
use tenant_stacks::config::lookups::{s3_prefix_list_name, StaticPrefixLists};
use tenant_stacks::core::tenant::{
    HEALTH_CHECK_INTERVAL_SECONDS, HEALTH_CHECK_PATH, ENVIRONMENT_VARIABLES, SECRET_VARIABLES,
};
use tenant_stacks::domain::model::StackTemplate;
use tenant_stacks::{
    ConfigLoader, ExportKey, ExportNamespace, LocalStorage, StackError, StackManifest,
    Synthesizer, Target,
};

const MODEL_ID: &str = "anthropic.claude-3-haiku-20240307-v1:0";

const COMMON: &str = r#"
environment: staging
aws:
  region: us-east-1
  accountId: "111111111111"
services:
  api:
    image:
      tag: v2
    bedrockModelId: "anthropic.claude-3-haiku-20240307-v1:0"
"#;

const CUST_001: &str = r#"
tenantId: cust-001
frontend:
  enabled: true
"#;

fn workspace(files: &[(&str, &str)]) -> (TempDir, TempDir) {
    let config = TempDir::new().unwrap();
    for (name, content) in files {
        fs::write(config.path().join(name), content).unwrap();
    }
    (config, TempDir::new().unwrap())
}

fn resolver() -> StaticPrefixLists {
    StaticPrefixLists::new().with_entry(s3_prefix_list_name("us-east-1"), "pl-63a5400a")
}

async fn render(config_dir: &TempDir, out: &TempDir, target: &str) -> tenant_stacks::Result<StackTemplate> {
    let resolved = ConfigLoader::new(config_dir.path()).resolve(target)?;
    let synth = Synthesizer::new(LocalStorage::new(out.path()));
    Ok(synth.render(&resolved, &resolver()).await?.template)
}

fn properties<'a>(template: &'a StackTemplate, logical_id: &str) -> &'a serde_json::Map<String, Value> {
    &template
        .resource(logical_id)
        .unwrap_or_else(|| panic!("missing resource {logical_id}"))
        .properties
}

#[test]
fn test_dispatch_is_exact_equality() {
    assert_eq!(Target::classify("share-service"), Target::SharedPlatform);
    for other in ["Share-Service", "share-service-2", "cust-001", ""] {
        assert!(!Target::classify(other).is_shared_platform(), "{other}");
    }
}

#[test]
fn test_export_names_are_injective_across_triples() {
    let triples = [
        ("share-service", "prod", "us-east-1"),
        ("share-service", "prod", "eu-west-1"),
        ("share-service", "staging", "us-east-1"),
        ("share-service-prod", "us", "east-1"),
        ("cust-001", "prod", "us-east-1"),
    ];
    let mut seen = std::collections::HashSet::new();
    for (tenant, env, region) in triples {
        let ns = ExportNamespace::new(tenant, env, region);
        for key in ExportKey::ALL {
            assert_eq!(ns.name(key), ExportNamespace::new(tenant, env, region).name(key));
            assert!(seen.insert(ns.name(key)), "collision on {}", ns.name(key));
        }
    }
}

#[tokio::test]
async fn test_shared_platform_stack_publishes_exports() {
    let (config, out) = workspace(&[("common.yaml", COMMON)]);
    let template = render(&config, &out, "share-service").await.unwrap();

    assert_eq!(template.stack_name, "share-service-stack");
    assert_eq!(template.resources_of_type("AWS::KMS::Key").count(), 1);
    assert_eq!(template.resources_of_type("AWS::ECR::Repository").count(), 1);
    assert_eq!(
        template
            .resources_of_type("AWS::GuardDuty::MalwareProtectionPlan")
            .count(),
        1
    );

    let ns = ExportNamespace::shared_platform("staging", "us-east-1");
    let exports = template.exports();
    for key in [
        ExportKey::KmsKeyArn,
        ExportKey::ApiRepositoryArn,
        ExportKey::ApiRepositoryName,
        ExportKey::ApiRepositoryUri,
        ExportKey::IngestBucketArn,
    ] {
        assert!(exports.contains(&ns.name(key)), "missing export {key}");
    }
    assert!(!exports.contains(&ns.name(ExportKey::BatchRepositoryUri)));
}

#[tokio::test]
async fn test_shared_stack_name_is_per_account_and_region() {
    let prod = COMMON.replace("environment: staging", "environment: prod");
    let (staging_config, out) = workspace(&[("common.yaml", COMMON)]);
    let (prod_config, _) = workspace(&[("common.yaml", prod.as_str())]);

    let staging = render(&staging_config, &out, "share-service").await.unwrap();
    let prod = render(&prod_config, &out, "share-service").await.unwrap();

    // Same stack name, so environments need separate accounts or regions.
    assert_eq!(staging.stack_name, prod.stack_name);
    assert!(staging.exports().is_disjoint(&prod.exports()));
}

#[tokio::test]
async fn test_tenant_imports_resolve_against_shared_exports() {
    let (config, out) = workspace(&[("common.yaml", COMMON), ("cust-001.yaml", CUST_001)]);
    let shared = render(&config, &out, "share-service").await.unwrap();
    let tenant = render(&config, &out, "cust-001").await.unwrap();

    let imports = tenant.imports();
    assert!(!imports.is_empty());
    assert!(
        imports.is_subset(&shared.exports()),
        "unresolved imports: {:?}",
        imports.difference(&shared.exports()).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_tenant_stack_shape() {
    let (config, out) = workspace(&[("common.yaml", COMMON), ("cust-001.yaml", CUST_001)]);
    let template = render(&config, &out, "cust-001").await.unwrap();

    assert_eq!(template.stack_name, "cust-001-tenant-stack");

    // The image is addressed in the tenant's own registry by repository name.
    let ns = ExportNamespace::shared_platform("staging", "us-east-1");
    let imports = template.imports();
    assert!(imports.contains(&ns.name(ExportKey::ApiRepositoryName)));
    assert!(imports.contains(&ns.name(ExportKey::ApiRepositoryArn)));
    assert!(!imports.contains(&ns.name(ExportKey::ApiRepositoryUri)));
    let image = properties(&template, "ApiTaskDefinition")["ContainerDefinitions"][0]["Image"].to_string();
    assert!(image.contains("${AWS::AccountId}.dkr.ecr.${AWS::Region}"), "{image}");

    let docker = template.resource("EcrDockerEndpoint").unwrap();
    assert_eq!(docker.depends_on, vec!["S3GatewayEndpoint".to_string()]);

    let target_group = properties(&template, "ApiTargetGroup");
    assert_eq!(target_group["HealthCheckPath"], json!(HEALTH_CHECK_PATH));
    assert_eq!(
        target_group["HealthCheckIntervalSeconds"],
        json!(HEALTH_CHECK_INTERVAL_SECONDS)
    );

    let container = &properties(&template, "ApiTaskDefinition")["ContainerDefinitions"][0];
    let env_names: Vec<&str> = container["Environment"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["Name"].as_str().unwrap())
        .collect();
    assert_eq!(env_names, ENVIRONMENT_VARIABLES.to_vec());
    let secret_names: Vec<&str> = container["Secrets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["Name"].as_str().unwrap())
        .collect();
    assert_eq!(secret_names, SECRET_VARIABLES.to_vec());

    let service = properties(&template, "ApiService");
    assert_eq!(
        service["NetworkConfiguration"]["AwsvpcConfiguration"]["AssignPublicIp"],
        json!("DISABLED")
    );

    assert!(template.resource("FrontendDistribution").is_some());
    assert!(template.outputs.contains_key("FrontendUrl"));
}

#[tokio::test]
async fn test_bedrock_access_is_scoped_to_the_configured_model() {
    let (config, out) = workspace(&[("common.yaml", COMMON), ("cust-001.yaml", CUST_001)]);
    let template = render(&config, &out, "cust-001").await.unwrap();

    let statements = properties(&template, "ApiTaskRole")["Policies"][0]["PolicyDocument"]
        ["Statement"]
        .as_array()
        .unwrap()
        .clone();
    let bedrock = statements
        .iter()
        .find(|s| s["Action"].to_string().contains("bedrock:InvokeModel"))
        .unwrap();
    let resource = bedrock["Resource"].to_string();
    assert!(resource.contains(MODEL_ID), "{resource}");
    assert!(!resource.contains('*'), "{resource}");
}

#[tokio::test]
async fn test_tenant_without_model_is_rejected() {
    let common = COMMON.replace(
        "    bedrockModelId: \"anthropic.claude-3-haiku-20240307-v1:0\"\n",
        "",
    );
    let (config, out) = workspace(&[("common.yaml", common.as_str()), ("cust-001.yaml", CUST_001)]);
    let result = render(&config, &out, "cust-001").await;
    assert!(matches!(
        result,
        Err(StackError::MissingConfigError { ref field }) if field == "services.api.bedrockModelId"
    ));
}

#[tokio::test]
async fn test_destroy_is_refused_in_production() {
    let tenant = r#"
tenantId: cust-001
environment: prod
dataProtection:
  removalPolicy: destroy
"#;
    let (config, out) = workspace(&[("common.yaml", COMMON), ("cust-001.yaml", tenant)]);
    let result = render(&config, &out, "cust-001").await;
    assert!(matches!(
        result,
        Err(StackError::InvalidConfigValueError { .. })
    ));
}

#[tokio::test]
async fn test_destroy_applies_outside_production() {
    let tenant = r#"
tenantId: cust-001
dataProtection:
  removalPolicy: destroy
"#;
    let (config, out) = workspace(&[("common.yaml", COMMON), ("cust-001.yaml", tenant)]);
    let template = render(&config, &out, "cust-001").await.unwrap();

    let bucket = template.resource("DataBucket").unwrap();
    assert_eq!(
        serde_json::to_value(bucket).unwrap()["DeletionPolicy"],
        json!("Delete")
    );
}

#[tokio::test]
async fn test_unresolvable_prefix_list_fails_synthesis() {
    let (config, out) = workspace(&[("common.yaml", COMMON), ("cust-001.yaml", CUST_001)]);
    let resolved = ConfigLoader::new(config.path()).resolve("cust-001").unwrap();
    let synth = Synthesizer::new(LocalStorage::new(out.path()));

    let result = synth.render(&resolved, &StaticPrefixLists::new()).await;
    assert!(matches!(result, Err(StackError::LookupError { .. })));
}

#[tokio::test]
async fn test_pinned_prefix_list_skips_the_resolver() {
    let tenant = r#"
tenantId: cust-001
network:
  s3PrefixListId: pl-0123456789abcdef0
"#;
    let (config, out) = workspace(&[("common.yaml", COMMON), ("cust-001.yaml", tenant)]);
    let resolved = ConfigLoader::new(config.path()).resolve("cust-001").unwrap();
    let synth = Synthesizer::new(LocalStorage::new(out.path()));

    let output = synth.render(&resolved, &StaticPrefixLists::new()).await.unwrap();
    assert!(output
        .template
        .to_json_pretty()
        .unwrap()
        .contains("pl-0123456789abcdef0"));
}

#[tokio::test]
async fn test_synth_writes_template_and_manifest() {
    let (config, out) = workspace(&[("common.yaml", COMMON), ("cust-001.yaml", CUST_001)]);
    let resolved = ConfigLoader::new(config.path()).resolve("cust-001").unwrap();
    let synth = Synthesizer::new(LocalStorage::new(out.path()));

    let output = synth.synth(&resolved, &resolver()).await.unwrap();

    let template_path = out.path().join("cust-001-tenant-stack.template.json");
    assert!(template_path.exists());
    let written: Value = serde_json::from_str(&fs::read_to_string(&template_path).unwrap()).unwrap();
    assert_eq!(written["AWSTemplateFormatVersion"], json!("2010-09-09"));
    assert!(written["Resources"]["ApiService"].is_object());

    let manifest: StackManifest =
        serde_json::from_str(
            &fs::read_to_string(out.path().join("cust-001-tenant-stack.manifest.json")).unwrap(),
        )
        .unwrap();
    assert_eq!(manifest, output.manifest);
    assert_eq!(manifest.account, "111111111111");
    assert_eq!(manifest.depends_on_stacks, vec!["share-service-stack".to_string()]);
    assert_eq!(manifest.imports, output.template.imports());
}

#[tokio::test]
async fn test_certificate_switches_listener_to_https() {
    let tenant = r#"
tenantId: cust-001
services:
  api:
    image:
      tag: v2
    bedrockModelId: "anthropic.claude-3-haiku-20240307-v1:0"
    certificateArn: "arn:aws:acm:us-east-1:111111111111:certificate/abc"
"#;
    let (config, out) = workspace(&[("common.yaml", COMMON), ("cust-001.yaml", tenant)]);
    let template = render(&config, &out, "cust-001").await.unwrap();

    let listener = properties(&template, "Listener");
    assert_eq!(listener["Protocol"], json!("HTTPS"));
    assert_eq!(listener["Port"], json!(443));

    let callbacks = properties(&template, "UserPoolClient")["CallbackURLs"].to_string();
    assert!(callbacks.contains("https://${LoadBalancer.DNSName}/api/v1/auth/callback"));
}

#[tokio::test]
async fn test_tenant_stack_name_ignores_target_case() {
    let (config, out) = workspace(&[("common.yaml", COMMON), ("cust-001.yaml", CUST_001)]);
    let upper = render(&config, &out, "Cust-001").await.unwrap();
    let lower = render(&config, &out, "cust-001").await.unwrap();

    assert_eq!(upper.stack_name, "cust-001-tenant-stack");
    assert_eq!(upper.stack_name, lower.stack_name);
    assert_eq!(upper.exports(), lower.exports());
}

#[tokio::test]
async fn test_shared_platform_id_cannot_be_a_tenant() {
    let (config, out) = workspace(&[
        ("common.yaml", COMMON),
        ("share-service.yaml", "tenantId: share-service\n"),
    ]);
    let result = render(&config, &out, "Share-Service").await;
    assert!(matches!(
        result,
        Err(StackError::InvalidConfigValueError { ref field, .. }) if field == "target"
    ));
}

#[tokio::test]
async fn test_resynth_warns_about_dropped_exports() {
    let api_only = r#"
services:
  api:
    image:
      tag: v2
"#;
    let with_batch = format!("{api_only}  batch:\n    image:\n      tag: v1\n");
    let (config, out) = workspace(&[("common.yaml", COMMON), ("share-service.yaml", with_batch.as_str())]);
    let loader = ConfigLoader::new(config.path());
    let synth = Synthesizer::new(LocalStorage::new(out.path()));

    let first = synth
        .synth(&loader.resolve("share-service").unwrap(), &resolver())
        .await
        .unwrap();
    let batch_export =
        ExportNamespace::shared_platform("staging", "us-east-1").name(ExportKey::BatchRepositoryUri);
    assert!(first.manifest.exports.contains(&batch_export));
    assert!(first.manifest.warnings.is_empty());

    fs::write(config.path().join("share-service.yaml"), api_only).unwrap();
    let second = synth
        .synth(&loader.resolve("share-service").unwrap(), &resolver())
        .await
        .unwrap();

    assert!(!second.manifest.exports.contains(&batch_export));
    assert!(
        second.manifest.warnings.iter().any(|w| w.contains(&batch_export)),
        "{:?}",
        second.manifest.warnings
    );
}
