pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::cli::LocalStorage;
pub use config::{ConfigLoader, ConfigWarning, ResolvedConfig, TenantConfig};
pub use core::exports::{ExportKey, ExportNamespace};
pub use core::synth::{build_template, StackManifest, SynthOutput, Synthesizer};
pub use core::target::{Target, SHARE_SERVICE_TARGET};
pub use utils::error::{Result, StackError};
