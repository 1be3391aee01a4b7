use crate::config::tenant_config::TenantConfig;
use crate::core::target::Target;
use crate::utils::error::{Result, StackError};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};

/// Extensions tried for every config document, in order.
pub const CONFIG_EXTENSIONS: [&str; 3] = ["yaml", "yml", "toml"];

pub const COMMON_DOCUMENT: &str = "common";

/// Non-fatal conditions found while resolving configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    CommonConfigMissing { path: PathBuf },
    TargetConfigMissing { target: String, path: PathBuf },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::CommonConfigMissing { path } => {
                write!(f, "common config not found at {}", path.display())
            }
            ConfigWarning::TargetConfigMissing { target, path } => write!(
                f,
                "no config for shared-platform target {} at {}, using common config only",
                target,
                path.display()
            ),
        }
    }
}

/// The merged, still untyped configuration for one target.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    /// Lower-cased target identifier, as used for the file name.
    pub target: String,
    /// Dispatch decision, taken on the identifier exactly as requested.
    pub kind: Target,
    pub document: Map<String, Value>,
    pub warnings: Vec<ConfigWarning>,
    pub sources: Vec<PathBuf>,
}

impl ResolvedConfig {
    /// Looks up a nested value by dotted path, e.g. `services.api.image.tag`.
    pub fn get(&self, dotted_path: &str) -> Option<&Value> {
        let mut parts = dotted_path.split('.');
        let first = self.document.get(parts.next()?)?;
        parts.try_fold(first, |value, key| value.get(key))
    }

    pub fn into_tenant_config(self) -> Result<TenantConfig> {
        TenantConfig::from_resolved(&self)
    }
}

/// Top-level keys of `overlay` replace those of `base` wholesale.
pub fn shallow_merge(base: Map<String, Value>, overlay: Map<String, Value>) -> Map<String, Value> {
    let mut merged = base;
    for (key, value) in overlay {
        merged.insert(key, value);
    }
    merged
}

/// Parses one config document; the format follows the file extension.
pub fn parse_document(path: &Path, content: &str) -> Result<Map<String, Value>> {
    if content.trim().is_empty() {
        return Ok(Map::new());
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let value: Value = match extension.as_str() {
        "toml" => toml::from_str(content).map_err(|e| StackError::ConfigParseError {
            path: path.to_path_buf(),
            message: format!("TOML parsing error: {}", e),
        })?,
        _ => serde_yaml::from_str(content).map_err(|e| StackError::ConfigParseError {
            path: path.to_path_buf(),
            message: format!("YAML parsing error: {}", e),
        })?,
    };

    match value {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map),
        other => Err(StackError::ConfigParseError {
            path: path.to_path_buf(),
            message: format!(
                "expected a mapping at the top level, found {}",
                value_kind(&other)
            ),
        }),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

/// Reads `common.<ext>` and `<target>.<ext>` from a config directory.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new<P: Into<PathBuf>>(config_dir: P) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Resolves the merged configuration for a target identifier.
    ///
    /// The identifier is lower-cased to build the file name, so `Cust-001`
    /// and `cust-001` read the same document.
    pub fn resolve(&self, target_id: &str) -> Result<ResolvedConfig> {
        let target_id = target_id.trim();
        if target_id.is_empty() {
            return Err(StackError::MissingTargetError);
        }
        if target_id.contains(['/', '\\']) || target_id.starts_with('.') {
            return Err(StackError::InvalidConfigValueError {
                field: "tenantId".to_string(),
                value: target_id.to_string(),
                reason: "Target identifiers cannot contain path separators".to_string(),
            });
        }

        let file_stem = target_id.to_lowercase();
        let kind = Target::normalized(target_id);
        let mut warnings = Vec::new();
        let mut sources = Vec::new();

        let base = match self.find_document(COMMON_DOCUMENT) {
            Some(path) => {
                let layer = self.read_layer(&path)?;
                sources.push(path);
                layer
            }
            None => {
                let warning = ConfigWarning::CommonConfigMissing {
                    path: self.default_path(COMMON_DOCUMENT),
                };
                tracing::warn!("⚠️ {}", warning);
                warnings.push(warning);
                Map::new()
            }
        };

        let overlay = match self.find_document(&file_stem) {
            Some(path) => {
                let layer = self.read_layer(&path)?;
                sources.push(path);
                layer
            }
            None if kind.is_shared_platform() => {
                let warning = ConfigWarning::TargetConfigMissing {
                    target: file_stem.clone(),
                    path: self.default_path(&file_stem),
                };
                tracing::warn!("⚠️ {}", warning);
                warnings.push(warning);
                Map::new()
            }
            None => {
                return Err(StackError::ConfigNotFoundError {
                    target: file_stem.clone(),
                    path: self.default_path(&file_stem),
                })
            }
        };

        tracing::debug!(
            "Merging {} common key(s) with {} target key(s) for {}",
            base.len(),
            overlay.len(),
            file_stem
        );

        Ok(ResolvedConfig {
            target: file_stem,
            kind,
            document: shallow_merge(base, overlay),
            warnings,
            sources,
        })
    }

    fn find_document(&self, stem: &str) -> Option<PathBuf> {
        CONFIG_EXTENSIONS
            .iter()
            .map(|ext| self.config_dir.join(format!("{}.{}", stem, ext)))
            .find(|path| path.is_file())
    }

    fn default_path(&self, stem: &str) -> PathBuf {
        self.config_dir.join(format!("{}.{}", stem, CONFIG_EXTENSIONS[0]))
    }

    fn read_layer(&self, path: &Path) -> Result<Map<String, Value>> {
        let content = std::fs::read_to_string(path)?;
        tracing::debug!("Read config layer {}", path.display());
        parse_document(path, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_shallow_merge_replaces_nested_objects_wholesale() {
        let base = map(json!({ "aws": { "region": "us-east-1" }, "environment": "stage" }));
        let overlay = map(json!({ "aws": { "accountId": "111111111111" } }));
        let merged = shallow_merge(base, overlay);
        assert_eq!(merged["aws"], json!({ "accountId": "111111111111" }));
        assert_eq!(merged["environment"], "stage");
    }

    #[test]
    fn test_parse_empty_and_null_documents() {
        assert!(parse_document(Path::new("a.yaml"), "").unwrap().is_empty());
        assert!(parse_document(Path::new("a.yaml"), "~\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_non_mapping() {
        let err = parse_document(Path::new("a.yaml"), "- a\n- b\n").unwrap_err();
        assert!(err.to_string().contains("sequence"));
    }

    #[test]
    fn test_parse_toml_document() {
        let doc = parse_document(
            Path::new("cust-001.toml"),
            "tenantId = \"cust-001\"\n[aws]\nregion = \"us-east-1\"\n",
        )
        .unwrap();
        assert_eq!(doc["aws"]["region"], "us-east-1");
    }

    #[test]
    fn test_empty_target_is_missing() {
        let loader = ConfigLoader::new("does-not-exist");
        assert!(matches!(
            loader.resolve("  "),
            Err(StackError::MissingTargetError)
        ));
    }

    #[test]
    fn test_path_like_target_is_rejected() {
        let loader = ConfigLoader::new("does-not-exist");
        assert!(loader.resolve("../secrets").is_err());
    }

    #[test]
    fn test_dotted_get() {
        let resolved = ResolvedConfig {
            target: "t".into(),
            kind: Target::Tenant("t".into()),
            document: map(json!({ "services": { "api": { "image": { "tag": "v2" } } } })),
            warnings: vec![],
            sources: vec![],
        };
        assert_eq!(resolved.get("services.api.image.tag"), Some(&json!("v2")));
        assert_eq!(resolved.get("aws.region"), None);
    }
}
