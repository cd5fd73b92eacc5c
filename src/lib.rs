#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod core;
pub mod document;
mod engine;
mod error;
pub mod loader;
mod manifest;
pub mod transport;
mod utils;

pub use crate::core::ImportMap;
pub use crate::engine::{
    AssetExecution, Assets, Diagnostics, DuplicatePolicy, Loader, LoaderBuilder, Progress, Status,
};
pub use crate::error::*;
pub use crate::loader::{Dispatcher, LoadAdapter, LoadContext, Outcome, Resource};
pub use crate::manifest::{AssetKind, AssetRequest, Manifest};
#[cfg(feature = "logging")]
pub use crate::utils::init_logging;
