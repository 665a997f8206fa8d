use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    application::error::ApplicationError,
    domain::{
        config::FileLimits,
        models::file::{FileData, FileInfo},
    },
    services::{OperationScope, StorageRouter},
};

/// Upload/download façade over the storage router.
pub struct FileService {
    storage: StorageRouter,
    limits: FileLimits,
}

impl FileService {
    pub fn new(storage: StorageRouter, limits: FileLimits) -> Self {
        Self { storage, limits }
    }

    /// Stores the content under `<uuid><ext>` and returns the backend id.
    pub async fn upload(
        &self,
        scope: &OperationScope,
        file_data: FileData,
    ) -> Result<String, ApplicationError> {
        let size = file_data.size();
        if !self.limits.allows(size) {
            warn!(size, max = self.limits.max_file_size, "upload exceeds maximum file size");
            return Err(ApplicationError::PayloadTooLarge {
                max: self.limits.max_file_size,
            });
        }

        let stored_name = format!("{}{}", Uuid::new_v4(), file_data.extension());
        let id = self
            .storage
            .save(scope, &stored_name, file_data.content)
            .await?;

        info!(id = %id, size, "file uploaded");
        Ok(id)
    }

    pub async fn download(
        &self,
        scope: &OperationScope,
        id: &str,
    ) -> Result<Vec<u8>, ApplicationError> {
        let content = self.storage.get(scope, id).await?;
        info!(id = %id, "file downloaded");
        Ok(content)
    }

    pub async fn delete_file(&self, scope: &OperationScope, id: &str) -> Result<(), ApplicationError> {
        self.storage.delete(scope, id).await?;
        warn!(id = %id, "file deleted");
        Ok(())
    }

    pub async fn get_file_info(
        &self,
        scope: &OperationScope,
        id: &str,
    ) -> Result<FileInfo, ApplicationError> {
        let info = self.storage.info(scope, id).await?;
        info!(id = %id, "file info retrieved");
        Ok(info)
    }

    pub async fn list_files(&self, scope: &OperationScope) -> Result<Vec<FileInfo>, ApplicationError> {
        let files = self.storage.list(scope).await?;
        info!(total = files.len(), "files list retrieved");
        Ok(files)
    }

    pub fn batch_size(&self) -> u32 {
        self.limits.batch_size
    }

    pub fn max_file_size(&self) -> u64 {
        self.limits.max_file_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::config::LocalStoreConfig,
        services::{LocalStorageService, StorageBackend},
    };
    use tempfile::TempDir;

    async fn service(temp_dir: &TempDir, max_file_size: u64) -> FileService {
        let local = LocalStorageService::new(LocalStoreConfig {
            root_path: temp_dir.path().to_path_buf(),
        })
        .await
        .unwrap();

        FileService::new(
            StorageRouter::new(StorageBackend::Local(local)),
            FileLimits {
                batch_size: 1024,
                max_file_size,
            },
        )
    }

    #[tokio::test]
    async fn test_upload_stores_generated_name_with_extension() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir, 1024).await;
        let scope = OperationScope::unbounded();

        let id = service
            .upload(&scope, FileData::new(vec![1, 2, 3], "photo.png".to_string()))
            .await
            .unwrap();

        let info = service.get_file_info(&scope, &id).await.unwrap();
        assert_ne!(info.name, "photo.png");
        assert!(info.name.ends_with(".png"));
        assert!(Uuid::try_parse(info.name.trim_end_matches(".png")).is_ok());
        assert_eq!(service.download(&scope, &id).await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_upload_over_limit_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir, 4).await;
        let scope = OperationScope::unbounded();

        let err = service
            .upload(&scope, FileData::new(vec![0; 5], "big.bin".to_string()))
            .await
            .unwrap_err();

        assert!(matches!(err, ApplicationError::PayloadTooLarge { max: 4 }));
        assert!(service.list_files(&scope).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_upload_is_invalid_input() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir, 4).await;
        let scope = OperationScope::unbounded();

        let err = service
            .upload(&scope, FileData::new(Vec::new(), "empty.txt".to_string()))
            .await
            .unwrap_err();

        assert!(matches!(err, ApplicationError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_delete_then_download_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir, 1024).await;
        let scope = OperationScope::unbounded();

        let id = service
            .upload(&scope, FileData::new(b"bye".to_vec(), "gone.txt".to_string()))
            .await
            .unwrap();
        service.delete_file(&scope, &id).await.unwrap();

        assert!(matches!(
            service.download(&scope, &id).await,
            Err(ApplicationError::NotFound(_))
        ));
        assert!(matches!(
            service.delete_file(&scope, &id).await,
            Err(ApplicationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_settings_come_from_limits() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir, 2048).await;

        assert_eq!(service.batch_size(), 1024);
        assert_eq!(service.max_file_size(), 2048);
    }
}
