use std::{sync::Arc, time::Duration};

use crate::{
    application::services::StorageService,
    domain::{config::Driver, models::file::FileInfo},
    services::{
        error::StorageError, local_storage::LocalStorageService,
        mongo_storage::MongoStorageService, scope::OperationScope,
    },
};

/// The backend chosen at startup.
pub enum StorageBackend {
    Local(LocalStorageService),
    Remote(MongoStorageService),
}

impl StorageBackend {
    pub fn driver(&self) -> Driver {
        match self {
            StorageBackend::Local(_) => Driver::Local,
            StorageBackend::Remote(_) => Driver::Remote,
        }
    }

    fn service(&self) -> &dyn StorageService {
        match self {
            StorageBackend::Local(service) => service,
            StorageBackend::Remote(service) => service,
        }
    }
}

/// Uniform entry point to the selected backend. Every call runs inside an
/// [`OperationScope`].
#[derive(Clone)]
pub struct StorageRouter {
    backend: Arc<StorageBackend>,
}

impl StorageRouter {
    pub fn new(backend: StorageBackend) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn driver(&self) -> Driver {
        self.backend.driver()
    }

    pub async fn save(
        &self,
        scope: &OperationScope,
        name: &str,
        content: Vec<u8>,
    ) -> Result<String, StorageError> {
        scope
            .run("save", self.backend.service().save(name, content))
            .await
    }

    pub async fn get(&self, scope: &OperationScope, id: &str) -> Result<Vec<u8>, StorageError> {
        scope.run("get", self.backend.service().get(id)).await
    }

    pub async fn delete(&self, scope: &OperationScope, id: &str) -> Result<(), StorageError> {
        scope.run("delete", self.backend.service().delete(id)).await
    }

    pub async fn info(&self, scope: &OperationScope, id: &str) -> Result<FileInfo, StorageError> {
        scope.run("info", self.backend.service().info(id)).await
    }

    pub async fn list(&self, scope: &OperationScope) -> Result<Vec<FileInfo>, StorageError> {
        scope.run("list", self.backend.service().list()).await
    }

    pub async fn ping(&self, scope: &OperationScope) -> Result<(), StorageError> {
        scope.run("ping", self.backend.service().ping()).await
    }

    /// Releases the remote connection; nothing to release for local storage.
    pub async fn close(&self, timeout: Duration) -> Result<(), StorageError> {
        match self.backend.as_ref() {
            StorageBackend::Remote(service) => service.close(timeout).await,
            StorageBackend::Local(_) => Ok(()),
        }
    }
}
