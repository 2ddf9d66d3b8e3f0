pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::Cli;

pub use adapters::{CsvAuditSink, ExchangeTokenProvider, FileCache, StaticTokenProvider};
pub use config::{CanvasConfig, CrosslistPolicy};
pub use core::{CanvasClient, CrosslistService, OperationContext};
pub use utils::error::{CanvasError, Result};
