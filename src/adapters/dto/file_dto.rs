use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{config::FileLimits, models::file::FileInfo};

#[derive(Debug, Serialize)]
pub struct UploadFileResponse {
    #[serde(rename = "fileId")]
    pub file_id: String,
}

#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub id: String,
    pub filename: String,
    pub size: u64,
    #[serde(rename = "uploadedAt", skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl From<FileInfo> for FileResponse {
    fn from(info: FileInfo) -> Self {
        Self {
            id: info.id,
            filename: info.name,
            size: info.size,
            uploaded_at: info.uploaded_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub total: usize,
    pub files: Vec<FileResponse>,
}

impl From<Vec<FileInfo>> for FileListResponse {
    fn from(files: Vec<FileInfo>) -> Self {
        Self {
            total: files.len(),
            files: files.into_iter().map(FileResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    #[serde(rename = "batchSize")]
    pub batch_size: u32,
    #[serde(rename = "maxFileSize")]
    pub max_file_size: u64,
}

impl From<FileLimits> for SettingsResponse {
    fn from(limits: FileLimits) -> Self {
        Self {
            batch_size: limits.batch_size,
            max_file_size: limits.max_file_size,
        }
    }
}
