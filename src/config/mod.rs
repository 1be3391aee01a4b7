pub mod cli;
pub mod loader;
pub mod lookups;
pub mod tenant_config;

pub use loader::{ConfigLoader, ConfigWarning, ResolvedConfig};
pub use tenant_config::TenantConfig;

#[cfg(feature = "cli")]
use clap::Parser;

/// Context key carrying the deployment target, as in `-c tenantId=cust-001`.
pub const TARGET_CONTEXT_KEY: &str = "tenantId";

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "tenant-stacks")]
#[command(about = "Synthesize the shared-platform stack or a tenant stack from layered config")]
pub struct CliConfig {
    /// Context values as key=value, e.g. -c tenantId=cust-001
    #[arg(short = 'c', long = "context", value_parser = parse_context_entry)]
    pub context: Vec<(String, String)>,

    #[arg(long, default_value = "config")]
    pub config_dir: String,

    #[arg(short, long, default_value = "cdk.out")]
    pub output_dir: String,

    /// Print the template instead of writing it
    #[arg(long)]
    pub dry_run: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub log_json: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// The last value given for `key` wins.
    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn target_id(&self) -> crate::Result<&str> {
        match self.context_value(TARGET_CONTEXT_KEY) {
            Some(id) if !id.trim().is_empty() => Ok(id.trim()),
            _ => Err(crate::StackError::MissingTargetError),
        }
    }
}

#[cfg(feature = "cli")]
fn parse_context_entry(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{}`", raw))?;
    if key.is_empty() {
        return Err(format!("empty context key in `{}`", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_context_parsing() {
        let cli = CliConfig::parse_from(["tenant-stacks", "-c", "tenantId=Cust-001", "--dry-run"]);
        assert_eq!(cli.target_id().unwrap(), "Cust-001");
        assert!(cli.dry_run);
        assert_eq!(cli.config_dir, "config");
    }

    #[test]
    fn test_missing_target() {
        let cli = CliConfig::parse_from(["tenant-stacks", "-c", "other=x"]);
        assert!(matches!(
            cli.target_id(),
            Err(crate::StackError::MissingTargetError)
        ));
        let cli = CliConfig::parse_from(["tenant-stacks", "-c", "tenantId="]);
        assert!(cli.target_id().is_err());
    }

    #[test]
    fn test_malformed_context_is_rejected() {
        assert!(CliConfig::try_parse_from(["tenant-stacks", "-c", "tenantId"]).is_err());
    }
}
