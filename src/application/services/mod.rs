mod file_service;
mod storage_service;

pub use file_service::FileService;
pub use storage_service::StorageService;
