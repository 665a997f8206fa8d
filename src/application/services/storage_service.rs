use async_trait::async_trait;

use crate::{domain::models::file::FileInfo, services::StorageError};

/// Contract shared by every storage backend.
///
/// Identifiers are opaque strings chosen by the backend at save time.
#[async_trait]
pub trait StorageService: Send + Sync {
    async fn save(&self, name: &str, content: Vec<u8>) -> Result<String, StorageError>;
    async fn get(&self, id: &str) -> Result<Vec<u8>, StorageError>;
    async fn delete(&self, id: &str) -> Result<(), StorageError>;
    async fn info(&self, id: &str) -> Result<FileInfo, StorageError>;
    /// Point-in-time snapshot, in backend enumeration order.
    async fn list(&self) -> Result<Vec<FileInfo>, StorageError>;
    /// Liveness check used by the health endpoint.
    async fn ping(&self) -> Result<(), StorageError>;
}
