use crate::domain::ports::PrefixListResolver;
use crate::utils::error::{Result, StackError};
use async_trait::async_trait;
use std::collections::HashMap;

/// Name of the provider-managed prefix list for the S3 gateway endpoint.
pub fn s3_prefix_list_name(region: &str) -> String {
    format!("com.amazonaws.{}.s3", region)
}

const NO_LOOKUP_AVAILABLE: &str = "no prefix list id configured and no AWS lookup available";

/// Serves prefix-list ids that were pinned in configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticPrefixLists {
    entries: HashMap<String, String>,
}

impl StaticPrefixLists {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, name: impl Into<String>, id: impl Into<String>) -> Self {
        self.entries.insert(name.into(), id.into());
        self
    }
}

#[async_trait]
impl PrefixListResolver for StaticPrefixLists {
    async fn resolve(&self, name: &str) -> Result<String> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| StackError::LookupError {
                name: name.to_string(),
                message: NO_LOOKUP_AVAILABLE.to_string(),
            })
    }
}

/// Tries each resolver in turn; the last failure is returned when none succeeds.
pub struct ChainedResolver {
    resolvers: Vec<Box<dyn PrefixListResolver>>,
}

impl ChainedResolver {
    pub fn new(resolvers: Vec<Box<dyn PrefixListResolver>>) -> Self {
        Self { resolvers }
    }
}

#[async_trait]
impl PrefixListResolver for ChainedResolver {
    async fn resolve(&self, name: &str) -> Result<String> {
        let mut last_error = StackError::LookupError {
            name: name.to_string(),
            message: NO_LOOKUP_AVAILABLE.to_string(),
        };
        for resolver in &self.resolvers {
            match resolver.resolve(name).await {
                Ok(id) => return Ok(id),
                Err(e) => {
                    tracing::debug!("Prefix list resolver failed for {}: {}", name, e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}

#[cfg(feature = "aws")]
pub use ec2::Ec2PrefixListResolver;

#[cfg(feature = "aws")]
mod ec2 {
    use super::*;
    use aws_config::BehaviorVersion;
    use aws_sdk_ec2::config::Region;
    use aws_sdk_ec2::types::Filter;
    use aws_sdk_ec2::Client as Ec2Client;

    /// Looks prefix lists up with `DescribeManagedPrefixLists`.
    pub struct Ec2PrefixListResolver {
        client: Ec2Client,
    }

    impl Ec2PrefixListResolver {
        pub fn new(client: Ec2Client) -> Self {
            Self { client }
        }

        pub async fn for_region(region: &str) -> Self {
            let config = aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(region.to_string()))
                .load()
                .await;
            Self::new(Ec2Client::new(&config))
        }
    }

    #[async_trait]
    impl PrefixListResolver for Ec2PrefixListResolver {
        async fn resolve(&self, name: &str) -> Result<String> {
            let output = self
                .client
                .describe_managed_prefix_lists()
                .filters(
                    Filter::builder()
                        .name("prefix-list-name")
                        .values(name)
                        .build(),
                )
                .send()
                .await
                .map_err(|e| StackError::LookupError {
                    name: name.to_string(),
                    message: aws_sdk_ec2::error::DisplayErrorContext(&e).to_string(),
                })?;

            output
                .prefix_lists()
                .iter()
                .find_map(|list| list.prefix_list_id().map(str::to_string))
                .ok_or_else(|| StackError::LookupError {
                    name: name.to_string(),
                    message: "no managed prefix list with that name in this region".to_string(),
                })
        }
    }
}
