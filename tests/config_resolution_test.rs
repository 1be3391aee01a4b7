use serde_json::json;
use std::fs;
use tempfile::TempDir;
use tenant_stacks::{ConfigLoader, ConfigWarning, StackError};

const COMMON: &str = r#"
environment: dev
aws:
  region: us-east-1
  accountId: "222222222222"
services:
  api:
    image:
      tag: latest
network:
  natGateways: 1
"#;

const CUST_001: &str = r#"
tenantId: cust-001
environment: prod
aws:
  accountId: "111111111111"
services:
  api:
    image:
      tag: v2
    bedrockModelId: "anthropic.claude-3-haiku-20240307-v1:0"
"#;

fn config_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, content) in files {
        fs::write(dir.path().join(name), content).unwrap();
    }
    dir
}

#[test]
fn test_tenant_keys_replace_common_keys_wholesale() {
    let dir = config_dir(&[("common.yaml", COMMON), ("cust-001.yaml", CUST_001)]);
    let resolved = ConfigLoader::new(dir.path()).resolve("cust-001").unwrap();

    assert!(resolved.warnings.is_empty());
    assert_eq!(resolved.sources.len(), 2);

    // Untouched common keys survive.
    assert_eq!(resolved.document["network"], json!({ "natGateways": 1 }));
    // Tenant keys win, including whole nested objects.
    assert_eq!(resolved.document["environment"], json!("prod"));
    assert_eq!(resolved.document["aws"], json!({ "accountId": "111111111111" }));
    // Keys present in neither document are absent.
    assert!(resolved.document.get("database").is_none());
    assert_eq!(resolved.document.len(), 5);
}

#[test]
fn test_region_is_lost_when_tenant_overrides_aws() {
    let common = r#"
aws:
  region: us-east-1
services:
  api:
    image:
      tag: latest
"#;
    let dir = config_dir(&[("common.yaml", common), ("cust-001.yaml", CUST_001)]);
    let resolved = ConfigLoader::new(dir.path()).resolve("cust-001").unwrap();

    assert!(resolved.get("aws.region").is_none());
    assert_eq!(resolved.get("aws.accountId"), Some(&json!("111111111111")));
    assert_eq!(resolved.get("services.api.image.tag"), Some(&json!("v2")));

    // The typed view refuses to guess the missing region.
    match resolved.into_tenant_config() {
        Err(StackError::MissingConfigError { field }) => assert_eq!(field, "aws.region"),
        other => panic!("expected MissingConfigError, got {:?}", other),
    }
}

#[test]
fn test_missing_common_document_is_a_warning() {
    let dir = config_dir(&[("cust-001.yaml", CUST_001)]);
    let resolved = ConfigLoader::new(dir.path()).resolve("cust-001").unwrap();

    let tenant_only: serde_json::Value = serde_yaml::from_str(CUST_001).unwrap();
    assert_eq!(serde_json::Value::Object(resolved.document.clone()), tenant_only);
    assert_eq!(resolved.warnings.len(), 1);
    assert!(matches!(
        resolved.warnings[0],
        ConfigWarning::CommonConfigMissing { .. }
    ));
}

#[test]
fn test_missing_tenant_document_fails() {
    let dir = config_dir(&[("common.yaml", COMMON)]);
    let result = ConfigLoader::new(dir.path()).resolve("cust-404");

    match result {
        Err(StackError::ConfigNotFoundError { target, path }) => {
            assert_eq!(target, "cust-404");
            assert!(path.ends_with("cust-404.yaml"));
        }
        other => panic!("expected ConfigNotFoundError, got {:?}", other),
    }
}

#[test]
fn test_missing_shared_platform_document_falls_back_to_common() {
    let dir = config_dir(&[("common.yaml", COMMON)]);
    let resolved = ConfigLoader::new(dir.path()).resolve("share-service").unwrap();

    assert_eq!(resolved.document["environment"], json!("dev"));
    assert!(matches!(
        resolved.warnings.as_slice(),
        [ConfigWarning::TargetConfigMissing { .. }]
    ));
}

#[test]
fn test_target_lookup_is_case_insensitive() {
    let dir = config_dir(&[("common.yaml", COMMON), ("cust-001.yaml", CUST_001)]);
    let loader = ConfigLoader::new(dir.path());

    let upper = loader.resolve("Cust-001").unwrap();
    let lower = loader.resolve("cust-001").unwrap();

    assert_eq!(upper, lower);
    assert_eq!(upper.target, "cust-001");
}

#[test]
fn test_yml_and_toml_documents_are_found() {
    let toml_doc = r#"
tenantId = "cust-002"
environment = "staging"

[aws]
region = "eu-west-1"
accountId = "333333333333"
"#;
    let dir = config_dir(&[("common.yml", COMMON), ("cust-002.toml", toml_doc)]);
    let resolved = ConfigLoader::new(dir.path()).resolve("cust-002").unwrap();

    assert_eq!(resolved.get("aws.region"), Some(&json!("eu-west-1")));
    assert_eq!(resolved.get("services.api.image.tag"), Some(&json!("latest")));
}

#[test]
fn test_tenant_id_defaults_to_lowercased_target() {
    let doc = r#"
environment: dev
aws:
  region: us-east-1
  accountId: 111111111111
services:
  api:
    image:
      tag: v1
"#;
    let dir = config_dir(&[("cust-003.yaml", doc)]);
    let config = ConfigLoader::new(dir.path())
        .resolve("CUST-003")
        .unwrap()
        .into_tenant_config()
        .unwrap();

    assert_eq!(config.tenant_id, "cust-003");
    assert_eq!(config.aws.account_id, "111111111111");
}

#[test]
fn test_malformed_yaml_is_a_parse_error() {
    let dir = config_dir(&[("cust-001.yaml", "aws: [unterminated")]);
    let result = ConfigLoader::new(dir.path()).resolve("cust-001");
    assert!(matches!(result, Err(StackError::ConfigParseError { .. })));
}
