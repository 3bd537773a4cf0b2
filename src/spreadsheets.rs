//! `/api/spreadsheets`: upload, list, fetch and delete spreadsheet files.

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State, multipart::MultipartRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::types::Json as SqlJson;
use uuid::Uuid;

use crate::app::SharedState;
use crate::error::{ApiError, ApiResult, ResultExt};
use crate::login::AuthUser;
use crate::models::{ProcessingStatus, Spreadsheet, SpreadsheetSummary};
use crate::response::{ApiResponse, PageQuery, Paginated};

/// MIME types accepted by the upload endpoint.
pub const ALLOWED_MIME_TYPES: [&str; 3] = [
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-excel",
    "text/csv",
];

const UPLOAD_FIELD: &str = "file";

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/upload", post(upload))
        .route("/", get(list))
        .route("/:id", delete(remove).get(get_one))
}

/// Fetch a spreadsheet only if `user_id` owns it.
pub async fn find_owned(pool: &SqlitePool, id: &str, user_id: &str) -> sqlx::Result<Option<Spreadsheet>> {
    sqlx::query_as::<_, Spreadsheet>("SELECT * FROM spreadsheets WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

struct UploadedFile {
    original_name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

/// Pull the `file` part out of the form, enforcing type and size limits.
async fn read_upload(mut multipart: Multipart, max_bytes: usize) -> ApiResult<Option<UploadedFile>> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(e) => return Err(multipart_error(e)),
        };
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let mime_type = field.content_type().unwrap_or_default().to_string();
        if !ALLOWED_MIME_TYPES.contains(&mime_type.as_str()) {
            return Err(ApiError::bad_request(
                "Invalid file type. Only Excel and CSV files are allowed.",
            ));
        }
        let original_name = field.file_name().unwrap_or(UPLOAD_FIELD).to_string();

        let bytes = field.bytes().await.map_err(multipart_error)?;
        if bytes.len() > max_bytes {
            return Err(ApiError::bad_request("File too large"));
        }

        return Ok(Some(UploadedFile {
            original_name,
            mime_type,
            bytes: bytes.to_vec(),
        }));
    }
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::bad_request("File too large")
    } else {
        ApiError::bad_request(format!("Malformed upload: {}", e.body_text()))
    }
}

async fn upload(
    State(state): State<SharedState>,
    auth: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<impl IntoResponse> {
    let Ok(multipart) = multipart else {
        return Err(ApiError::bad_request("No file uploaded"));
    };
    let Some(file) = read_upload(multipart, state.config.max_upload_bytes).await? else {
        return Err(ApiError::bad_request("No file uploaded"));
    };

    const CONTEXT: &str = "File upload failed";
    let stored = state
        .uploads
        .save(&file.original_name, &file.bytes)
        .await
        .context_500(CONTEXT)?;

    let now = Utc::now();
    let inserted = sqlx::query_as::<_, Spreadsheet>(
        r#"
        INSERT INTO spreadsheets
            (id, user_id, original_name, file_name, file_path, file_size, mime_type,
             checksum, sheet_names, has_headers, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(auth.id())
    .bind(&file.original_name)
    .bind(&stored.file_name)
    .bind(&stored.file_path)
    .bind(stored.file_size)
    .bind(&file.mime_type)
    .bind(&stored.checksum)
    .bind(SqlJson(Vec::<String>::new()))
    .bind(ProcessingStatus::Pending)
    .bind(now)
    .bind(now)
    .fetch_one(&state.pool)
    .await;

    let spreadsheet = match inserted {
        Ok(spreadsheet) => spreadsheet,
        Err(e) => {
            // Don't leave an orphaned file behind.
            if let Err(io) = state.uploads.remove(&stored.file_path).await {
                log::warn!("Could not remove {}: {}", stored.file_path, io);
            }
            return Err(ApiError::internal(CONTEXT, e));
        }
    };

    log::info!(
        "Stored upload {} ({} bytes) for user {}",
        spreadsheet.id,
        spreadsheet.file_size,
        spreadsheet.user_id
    );
    let body = ApiResponse::ok(spreadsheet).with_message("File uploaded successfully");
    Ok((StatusCode::CREATED, Json(body)))
}

async fn list(
    State(state): State<SharedState>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Paginated<SpreadsheetSummary>>> {
    const CONTEXT: &str = "Failed to get spreadsheets";
    let params = query.params();

    let rows = sqlx::query_as::<_, SpreadsheetSummary>(
        r#"
        SELECT id, original_name, file_name, file_size, mime_type, total_rows, total_columns,
               sheet_names, has_headers, status, created_at, updated_at
        FROM spreadsheets
        WHERE user_id = ?
        ORDER BY created_at DESC, rowid DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(auth.id())
    .bind(params.limit)
    .bind(params.offset())
    .fetch_all(&state.pool)
    .await
    .context_500(CONTEXT)?;

    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM spreadsheets WHERE user_id = ?")
        .bind(auth.id())
        .fetch_one(&state.pool)
        .await
        .context_500(CONTEXT)?;

    Ok(Json(Paginated::new(rows, params, total)))
}

async fn get_one(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<Spreadsheet>>> {
    let spreadsheet = find_owned(&state.pool, &id, auth.id())
        .await
        .context_500("Failed to get spreadsheet")?
        .ok_or_else(|| ApiError::not_found("Spreadsheet not found"))?;
    Ok(Json(ApiResponse::ok(spreadsheet)))
}

async fn remove(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<()>>> {
    const CONTEXT: &str = "Failed to delete spreadsheet";
    let spreadsheet = find_owned(&state.pool, &id, auth.id())
        .await
        .context_500(CONTEXT)?
        .ok_or_else(|| ApiError::not_found("Spreadsheet not found"))?;

    state
        .uploads
        .remove(&spreadsheet.file_path)
        .await
        .context_500(CONTEXT)?;

    sqlx::query("DELETE FROM spreadsheets WHERE id = ?")
        .bind(&spreadsheet.id)
        .execute(&state.pool)
        .await
        .context_500(CONTEXT)?;

    Ok(Json(ApiResponse::message("Spreadsheet deleted successfully")))
}
