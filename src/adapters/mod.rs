pub mod audit;
pub mod cache;
pub mod token;

pub use audit::CsvAuditSink;
pub use cache::FileCache;
pub use token::{ExchangeTokenProvider, StaticTokenProvider};
