pub mod constructs;
pub mod exports;
pub mod naming;
pub mod policies;
pub mod share_service;
pub mod synth;
pub mod target;
pub mod tenant;

pub use crate::domain::model::{Output, Resource, StackTemplate};
pub use crate::domain::ports::{GraphSink, PrefixListResolver, StackBuilder, Storage};
pub use crate::utils::error::Result;
