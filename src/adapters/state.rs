use axum::extract::FromRef;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

use crate::{
    application::services::FileService,
    services::{OperationScope, StorageRouter},
};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub file_service: Arc<FileService>,
    pub storage: StorageRouter,
    pub request_timeout: Duration,
    /// Fired when in-flight operations must stop.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Scope for one request: the configured timeout plus the shutdown signal.
    pub fn scope(&self) -> OperationScope {
        OperationScope::new(self.request_timeout, self.shutdown.child_token())
    }
}
