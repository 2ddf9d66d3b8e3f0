use crate::domain::model::CrosslistAuditRecord;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Pluggable credential source. Static tokens and exchange-based providers
/// are interchangeable behind this one method.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String>;
}

/// Key→value store with expiry. Expired entries are treated as absent on
/// read; there is no background sweep.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value, ttl_secs: i64) -> Result<()>;
}

/// Receives one structured record per attempted operation. Append-only.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: &CrosslistAuditRecord) -> Result<()>;
}
