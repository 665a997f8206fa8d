use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{info, warn};

use crate::{
    adapters::{
        dto::file_dto::{FileListResponse, FileResponse, SettingsResponse, UploadFileResponse},
        state::AppState,
    },
    application::error::ApplicationError,
    domain::{config::FileLimits, models::file::FileData},
};

pub struct FileController;

impl FileController {
    /// POST /api/v1/files
    /// Multipart fields: `file` (required), `filename` (optional when the
    /// file part carries its own name)
    pub async fn upload_file(
        State(app_state): State<AppState>,
        mut multipart: Multipart,
    ) -> Result<(StatusCode, Json<UploadFileResponse>), ApplicationError> {
        let max_file_size = app_state.file_service.max_file_size();
        let mut file_bytes: Option<Vec<u8>> = None;
        let mut part_filename: Option<String> = None;
        let mut filename: Option<String> = None;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e, max_file_size))?
        {
            let name = field.name().unwrap_or("").to_string();

            match name.as_str() {
                "file" => {
                    part_filename = field.file_name().map(|s| s.to_string());
                    file_bytes = Some(
                        field
                            .bytes()
                            .await
                            .map_err(|e| multipart_error(e, max_file_size))?
                            .to_vec(),
                    );
                }
                "filename" => {
                    filename = Some(field.text().await.map_err(|e| {
                        warn!("Invalid filename field: {}", e);
                        ApplicationError::BadRequest("Invalid filename field".to_string())
                    })?);
                }
                _ => {}
            }
        }

        let file_bytes = file_bytes.ok_or_else(|| {
            warn!("Missing required 'file' field in upload");
            ApplicationError::BadRequest("Missing required field 'file'".to_string())
        })?;
        let filename = filename
            .filter(|f| !f.trim().is_empty())
            .or(part_filename)
            .ok_or_else(|| {
                warn!("Upload without a filename");
                ApplicationError::BadRequest("Missing required field 'filename'".to_string())
            })?;

        info!(filename = %filename, size = file_bytes.len(), "Upload received");

        let scope = app_state.scope();
        let file_id = app_state
            .file_service
            .upload(&scope, FileData::new(file_bytes, filename))
            .await?;

        Ok((StatusCode::CREATED, Json(UploadFileResponse { file_id })))
    }

    /// GET /api/v1/files
    pub async fn list_files(
        State(app_state): State<AppState>,
    ) -> Result<Json<FileListResponse>, ApplicationError> {
        let scope = app_state.scope();
        let files = app_state.file_service.list_files(&scope).await?;
        Ok(Json(FileListResponse::from(files)))
    }

    /// GET /api/v1/files/{file_id}
    pub async fn get_file_info(
        State(app_state): State<AppState>,
        Path(file_id): Path<String>,
    ) -> Result<Json<FileResponse>, ApplicationError> {
        let scope = app_state.scope();
        let info = app_state
            .file_service
            .get_file_info(&scope, &file_id)
            .await?;
        Ok(Json(FileResponse::from(info)))
    }

    /// GET /api/v1/files/{file_id}/content
    pub async fn download_file(
        State(app_state): State<AppState>,
        Path(file_id): Path<String>,
    ) -> Result<Response, ApplicationError> {
        let scope = app_state.scope();
        let file_bytes = app_state.file_service.download(&scope, &file_id).await?;

        Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/octet-stream")],
            file_bytes,
        )
            .into_response())
    }

    /// DELETE /api/v1/files/{file_id}
    pub async fn delete_file(
        State(app_state): State<AppState>,
        Path(file_id): Path<String>,
    ) -> Result<StatusCode, ApplicationError> {
        let scope = app_state.scope();
        app_state.file_service.delete_file(&scope, &file_id).await?;
        Ok(StatusCode::NO_CONTENT)
    }

    /// GET /api/v1/settings
    pub async fn get_settings(State(app_state): State<AppState>) -> Json<SettingsResponse> {
        Json(SettingsResponse::from(FileLimits {
            batch_size: app_state.file_service.batch_size(),
            max_file_size: app_state.file_service.max_file_size(),
        }))
    }
}

fn multipart_error(error: MultipartError, max_file_size: u64) -> ApplicationError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApplicationError::PayloadTooLarge { max: max_file_size };
    }
    warn!("Invalid multipart data: {}", error);
    ApplicationError::BadRequest("Invalid request format".to_string())
}
