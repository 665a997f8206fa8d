mod error;
mod local_storage;
mod mongo_storage;
mod router;
mod scope;
mod supervisor;

pub use error::StorageError;
pub use local_storage::LocalStorageService;
pub use mongo_storage::MongoConnector;
pub use router::{StorageBackend, StorageRouter};
pub use scope::OperationScope;
pub use supervisor::{ConnectionSupervisor, RetryPolicy};

use tracing::info;

use crate::domain::config::StorageConfig;

/// Builds the configured backend. For remote storage this blocks until the
/// supervisor has a live connection or gives up.
pub async fn create_storage_router(config: &StorageConfig) -> Result<StorageRouter, StorageError> {
    let backend = match config {
        StorageConfig::Local(local) => {
            StorageBackend::Local(LocalStorageService::new(local.clone()).await?)
        }
        StorageConfig::Remote(remote) => {
            remote.validate()?;

            info!(
                addr = %remote.host(),
                db = %remote.database,
                "Connecting to MongoDB"
            );

            let supervisor = ConnectionSupervisor::new(
                MongoConnector::new(remote.clone()),
                RetryPolicy::from(remote),
            );
            StorageBackend::Remote(supervisor.establish().await?)
        }
    };

    info!(driver = %backend.driver(), "Storage backend ready");
    Ok(StorageRouter::new(backend))
}
