//! GridFS storage backend.
//!
//! Files live in one bucket: content split into fixed-size chunks in
//! `<bucket>.chunks` and one record per file in `<bucket>.files`. Ids are
//! the record's ObjectId rendered as 24 hex characters.

use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson};
use futures_util::{
    io::{AsyncReadExt, AsyncWriteExt},
    TryStreamExt,
};
use mongodb::{
    error::{Error as MongoError, ErrorKind, GridFsErrorKind},
    gridfs::GridFsBucket,
    options::{ClientOptions, GridFsBucketOptions},
    Client, Collection, Database,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{
    application::services::StorageService,
    domain::{config::RemoteStoreConfig, models::file::FileInfo},
    services::{error::StorageError, supervisor::Connector},
};

const APP_NAME: &str = "file-svc";

/// Fields read from a document in `<bucket>.files`. `chunkSize` is ignored.
#[derive(Debug, Deserialize)]
struct StoredFile {
    #[serde(rename = "_id")]
    id: Bson,
    #[serde(default)]
    filename: Option<String>,
    length: i64,
    #[serde(rename = "uploadDate", default)]
    upload_date: Option<bson::DateTime>,
}

/// `size` is the stored byte length, never the configured chunk size.
impl From<StoredFile> for FileInfo {
    fn from(file: StoredFile) -> Self {
        Self {
            id: render_id(&file.id),
            name: file.filename.unwrap_or_default(),
            size: file.length.max(0) as u64,
            uploaded_at: file.upload_date.map(|d| d.to_chrono()),
        }
    }
}

fn render_id(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_id(op: &'static str, id: &str) -> Result<ObjectId, StorageError> {
    ObjectId::parse_str(id)
        .map_err(|_| StorageError::invalid_input(op, format!("malformed file id '{}'", id)))
}

fn is_file_not_found(error: &MongoError) -> bool {
    matches!(
        *error.kind,
        ErrorKind::GridFs(GridFsErrorKind::FileNotFound { .. })
    )
}

/// Error from a GridFS call addressed by id: a missing file is `NotFound`,
/// anything else goes through `other`.
fn lookup_error(
    op: &'static str,
    id: &str,
    error: MongoError,
    other: fn(&'static str, MongoError) -> StorageError,
) -> StorageError {
    if is_file_not_found(&error) {
        StorageError::not_found(op, id)
    } else {
        other(op, error)
    }
}

pub struct MongoStorageService {
    client: Client,
    database: Database,
    bucket: GridFsBucket,
    files: Collection<StoredFile>,
    closed: AtomicBool,
}

impl MongoStorageService {
    pub fn from_client(client: Client, config: &RemoteStoreConfig) -> Self {
        let database = client.database(&config.database);
        let bucket = database.gridfs_bucket(
            GridFsBucketOptions::builder()
                .bucket_name(config.bucket.clone())
                .chunk_size_bytes(config.chunk_size)
                .build(),
        );
        let files = database.collection::<StoredFile>(&format!("{}.files", config.bucket));

        Self {
            client,
            database,
            bucket,
            files,
            closed: AtomicBool::new(false),
        }
    }

    /// Releases the connection pool. Later calls are no-ops.
    pub async fn close(&self, timeout: Duration) -> Result<(), StorageError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("MongoDB client already closed");
            return Ok(());
        }

        let client = self.client.clone();
        match tokio::time::timeout(timeout, async move { client.shutdown().await }).await {
            Ok(()) => {
                info!("Disconnected from MongoDB");
                Ok(())
            }
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "MongoDB shutdown timed out");
                Err(StorageError::DeadlineExceeded { op: "close" })
            }
        }
    }
}

#[async_trait]
impl StorageService for MongoStorageService {
    async fn save(&self, name: &str, content: Vec<u8>) -> Result<String, StorageError> {
        if content.is_empty() {
            return Err(StorageError::invalid_input("save", "empty content"));
        }
        if name.is_empty() {
            return Err(StorageError::invalid_input("save", "empty filename"));
        }

        let mut upload = self
            .bucket
            .open_upload_stream(name)
            .await
            .map_err(|e| StorageError::write_failure("save", e))?;

        let id = match upload.id().as_object_id() {
            Some(oid) => oid.to_hex(),
            None => {
                let _ = upload.abort().await;
                return Err(StorageError::write_failure("save", "invalid file id"));
            }
        };

        // A dropped stream that was never closed aborts itself in the
        // background, so a cancelled save leaves no readable file either.
        if let Err(e) = upload.write_all(&content).await {
            if let Err(abort_err) = upload.abort().await {
                warn!(id = %id, error = %abort_err, "Failed to abort GridFS upload");
            }
            return Err(StorageError::write_failure("save", e));
        }

        upload
            .close()
            .await
            .map_err(|e| StorageError::write_failure("save", e))?;

        debug!(id = %id, size = content.len(), "Saved file to GridFS");
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Vec<u8>, StorageError> {
        let oid = parse_id("get", id)?;

        let mut download = self
            .bucket
            .open_download_stream(Bson::ObjectId(oid))
            .await
            .map_err(|e| lookup_error("get", id, e, StorageError::read_failure))?;

        let mut buf = Vec::new();
        download
            .read_to_end(&mut buf)
            .await
            .map_err(|e| StorageError::read_failure("get", e))?;

        Ok(buf)
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let oid = parse_id("delete", id)?;

        self.bucket
            .delete(Bson::ObjectId(oid))
            .await
            .map_err(|e| lookup_error("delete", id, e, StorageError::write_failure))?;

        debug!(id = %id, "Deleted file from GridFS");
        Ok(())
    }

    async fn info(&self, id: &str) -> Result<FileInfo, StorageError> {
        let oid = parse_id("info", id)?;

        self.files
            .find_one(doc! { "_id": oid })
            .await
            .map_err(|e| StorageError::read_failure("info", e))?
            .map(FileInfo::from)
            .ok_or_else(|| StorageError::not_found("info", id))
    }

    async fn list(&self) -> Result<Vec<FileInfo>, StorageError> {
        let cursor = self
            .files
            .find(doc! {})
            .await
            .map_err(|e| StorageError::read_failure("list", e))?;

        let files: Vec<StoredFile> = cursor
            .try_collect()
            .await
            .map_err(|e| StorageError::read_failure("list", e))?;

        Ok(files.into_iter().map(FileInfo::from).collect())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StorageError::PingFailure(e.to_string()))?;
        Ok(())
    }
}

/// Builds a client from the configured URI and pings the database.
pub struct MongoConnector {
    config: RemoteStoreConfig,
}

impl MongoConnector {
    pub fn new(config: RemoteStoreConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for MongoConnector {
    type Handle = MongoStorageService;

    async fn connect(&self) -> Result<MongoStorageService, StorageError> {
        let mut options = ClientOptions::parse(&self.config.uri)
            .await
            .map_err(|e| match *e.kind {
                ErrorKind::InvalidArgument { .. } => {
                    StorageError::InvalidConfig(format!("failed to parse mongo uri: {}", e))
                }
                _ => StorageError::ConnectFailure(e.to_string()),
            })?;

        options.app_name = Some(APP_NAME.to_string());
        options.connect_timeout = Some(self.config.attempt_timeout);
        options.server_selection_timeout = Some(self.config.attempt_timeout);

        let client = Client::with_options(options)
            .map_err(|e| StorageError::ConnectFailure(e.to_string()))?;

        client
            .database(&self.config.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StorageError::PingFailure(e.to_string()))?;

        info!(
            addr = %self.config.host(),
            db = %self.config.database,
            bucket = %self.config.bucket,
            "Connected to MongoDB"
        );

        Ok(MongoStorageService::from_client(client, &self.config))
    }
}
