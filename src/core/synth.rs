use crate::config::lookups::s3_prefix_list_name;
use crate::config::{ResolvedConfig, TenantConfig};
use crate::core::share_service::ShareServiceStackBuilder;
use crate::core::target::Target;
use crate::core::tenant::{ensure_tenant_id, Lookups, TenantStackBuilder};
use crate::domain::model::StackTemplate;
use crate::domain::ports::{PrefixListResolver, StackBuilder, Storage};
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub fn template_file(stack_name: &str) -> String {
    format!("{}.template.json", stack_name)
}

/// One manifest per stack, so a shared output directory keeps every stack's history.
pub fn manifest_file(stack_name: &str) -> String {
    format!("{}.manifest.json", stack_name)
}

/// What an operator (or the provisioning engine) needs to apply a synthesized stack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StackManifest {
    pub stack_name: String,
    pub account: String,
    pub region: String,
    pub template_file: String,
    pub exports: BTreeSet<String>,
    pub imports: BTreeSet<String>,
    /// Stacks that must be applied first because they publish our imports.
    pub depends_on_stacks: Vec<String>,
    pub warnings: Vec<String>,
    pub synthesized_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SynthOutput {
    pub template: StackTemplate,
    pub manifest: StackManifest,
}

/// Builds the template for a target. Pure: no I/O, no ambient state.
pub fn build_template(
    target: &Target,
    config: &TenantConfig,
    lookups: Option<Lookups>,
) -> Result<StackTemplate> {
    match target {
        Target::SharedPlatform => {
            let builder = ShareServiceStackBuilder::new(config)?;
            emit(&builder)
        }
        Target::Tenant(tenant_id) => {
            let lookups = lookups.ok_or_else(|| crate::StackError::LookupError {
                name: s3_prefix_list_name(&config.aws.region),
                message: "tenant stacks need the S3 prefix list id".to_string(),
            })?;
            let builder = TenantStackBuilder::new(tenant_id, config, lookups)?;
            emit(&builder)
        }
    }
}

fn emit(builder: &dyn StackBuilder) -> Result<StackTemplate> {
    let mut template = StackTemplate::new(&builder.stack_name(), &builder.description());
    builder.build(&mut template)?;
    tracing::debug!(
        "Stack {} has {} resources and {} outputs",
        template.stack_name,
        template.resources.len(),
        template.outputs.len()
    );
    Ok(template)
}

/// Resolves lookups, builds the stack for a target and writes it out.
pub struct Synthesizer<S: Storage> {
    storage: S,
}

impl<S: Storage> Synthesizer<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Validates configuration, resolves lookups and builds; writes nothing.
    pub async fn render(
        &self,
        resolved: &ResolvedConfig,
        resolver: &dyn PrefixListResolver,
    ) -> Result<SynthOutput> {
        let config = TenantConfig::from_resolved(resolved)?;
        config.validate()?;

        let target = &resolved.kind;
        let lookups = match target {
            Target::SharedPlatform => None,
            Target::Tenant(tenant_id) => {
                ensure_tenant_id(tenant_id, &config)?;
                Some(resolve_lookups(&config, resolver).await?)
            }
        };

        let template = build_template(target, &config, lookups)?;
        let depends_on_stacks = match target {
            Target::SharedPlatform => vec![],
            Target::Tenant(_) => vec![Target::SharedPlatform.stack_name()],
        };

        let manifest = StackManifest {
            stack_name: template.stack_name.clone(),
            account: config.aws.account_id.clone(),
            region: config.aws.region.clone(),
            template_file: template_file(&template.stack_name),
            exports: template.exports(),
            imports: template.imports(),
            depends_on_stacks,
            warnings: resolved.warnings.iter().map(|w| w.to_string()).collect(),
            synthesized_at: Utc::now(),
        };

        Ok(SynthOutput { template, manifest })
    }

    /// Renders and writes `<stack>.template.json` plus `<stack>.manifest.json`.
    ///
    /// Exports published by the previous run of the same stack but missing now
    /// are reported as manifest warnings: CloudFormation refuses the update
    /// while another stack still imports them.
    pub async fn synth(
        &self,
        resolved: &ResolvedConfig,
        resolver: &dyn PrefixListResolver,
    ) -> Result<SynthOutput> {
        let mut output = self.render(resolved, resolver).await?;

        if let Some(previous) = self.previous_manifest(&output.manifest.stack_name).await {
            for name in previous.exports.difference(&output.manifest.exports) {
                let warning = format!(
                    "export {} was published by the previous synthesis and is now dropped",
                    name
                );
                tracing::warn!("⚠️ {}", warning);
                output.manifest.warnings.push(warning);
            }
        }

        self.storage
            .write_file(
                &output.manifest.template_file,
                output.template.to_json_pretty()?.as_bytes(),
            )
            .await?;
        self.storage
            .write_file(
                &manifest_file(&output.manifest.stack_name),
                serde_json::to_string_pretty(&output.manifest)?.as_bytes(),
            )
            .await?;

        tracing::info!(
            "📦 Wrote {} ({} resources, {} exports, {} imports)",
            output.manifest.template_file,
            output.template.resources.len(),
            output.manifest.exports.len(),
            output.manifest.imports.len()
        );
        Ok(output)
    }

    async fn previous_manifest(&self, stack_name: &str) -> Option<StackManifest> {
        let path = manifest_file(stack_name);
        let bytes = match self.storage.read_file(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!("No previous manifest at {}: {}", path, e);
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                tracing::warn!("⚠️ Ignoring unreadable {}: {}", path, e);
                None
            }
        }
    }
}

/// A pinned id in config wins over the resolver; resolver failures propagate.
async fn resolve_lookups(
    config: &TenantConfig,
    resolver: &dyn PrefixListResolver,
) -> Result<Lookups> {
    let s3_prefix_list_id = match &config.network.s3_prefix_list_id {
        Some(id) => id.clone(),
        None => {
            let name = s3_prefix_list_name(&config.aws.region);
            tracing::info!("🔎 Looking up prefix list {}", name);
            resolver.resolve(&name).await?
        }
    };
    Ok(Lookups { s3_prefix_list_id })
}
