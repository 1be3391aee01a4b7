use crate::domain::model::{Output, Resource};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Receives resource declarations from a stack builder.
pub trait GraphSink {
    fn add_resource(&mut self, logical_id: &str, resource: Resource) -> Result<()>;
    fn add_output(&mut self, logical_id: &str, output: Output) -> Result<()>;
}

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Resolves a provider-managed prefix list (e.g. `com.amazonaws.us-east-1.s3`) to its id.
#[async_trait]
pub trait PrefixListResolver: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<String>;
}

/// Emits the declarations of one stack into a sink.
pub trait StackBuilder {
    fn stack_name(&self) -> String;
    fn description(&self) -> String;
    fn build(&self, sink: &mut dyn GraphSink) -> Result<()>;
}
