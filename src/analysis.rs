//! `/api/analysis`: analysis records over an uploaded spreadsheet.
//!
//! Creating an analysis only stores the request. The record stays `PENDING`
//! and its computed fields (`kpis`, `trends`, `anomalies`, `insights`,
//! `statistics`) stay empty until a processing stage fills them in.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use serde::{Deserialize, Deserializer};
use sqlx::types::Json as SqlJson;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::app::SharedState;
use crate::error::{ApiError, ApiResult, JsonBody, ResultExt};
use crate::login::AuthUser;
use crate::models::{Analysis, AnalysisWithSheet, PeriodType, ProcessingStatus, SheetDetail, SheetSize};
use crate::response::{ApiResponse, PageQuery, Paginated};
use crate::spreadsheets;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnalysisRequest {
    pub spreadsheet_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub selected_columns: Vec<String>,
    pub date_column: Option<String>,
    pub period_type: Option<PeriodType>,
}

/// Partial update; absent fields keep their stored value.
///
/// `description` and `dateColumn` distinguish absent (`None`) from an explicit
/// `null` (`Some(None)`), which clears the column.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAnalysisRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    pub selected_columns: Option<Vec<String>>,
    #[serde(default, deserialize_with = "present")]
    pub date_column: Option<Option<String>>,
    pub period_type: Option<PeriodType>,
}

/// Wrap any value that appears in the body, `null` included, in `Some`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl UpdateAnalysisRequest {
    fn apply(self, analysis: &mut Analysis) -> ApiResult<()> {
        if let Some(name) = self.name {
            if name.trim().is_empty() {
                return Err(ApiError::bad_request("Analysis name is required"));
            }
            analysis.name = name;
        }
        if let Some(description) = self.description {
            analysis.description = description;
        }
        if let Some(columns) = self.selected_columns {
            analysis.selected_columns = SqlJson(columns);
        }
        if let Some(date_column) = self.date_column {
            analysis.date_column = date_column;
        }
        if let Some(period_type) = self.period_type {
            analysis.period_type = Some(period_type);
        }
        Ok(())
    }
}

#[derive(FromRow)]
struct AnalysisListRow {
    #[sqlx(flatten)]
    analysis: Analysis,
    sheet_original_name: String,
    sheet_file_size: i64,
}

#[derive(FromRow)]
struct AnalysisDetailRow {
    #[sqlx(flatten)]
    analysis: Analysis,
    sheet_original_name: String,
    sheet_file_name: String,
    sheet_file_size: i64,
    sheet_total_rows: Option<i64>,
    sheet_total_columns: Option<i64>,
}

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(get_one).put(update).delete(remove))
}

/// Fetch an analysis only if `user_id` owns it.
pub async fn find_owned(pool: &SqlitePool, id: &str, user_id: &str) -> sqlx::Result<Option<Analysis>> {
    sqlx::query_as::<_, Analysis>("SELECT * FROM analyses WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

async fn create(
    State(state): State<SharedState>,
    auth: AuthUser,
    JsonBody(req): JsonBody<CreateAnalysisRequest>,
) -> ApiResult<impl IntoResponse> {
    const CONTEXT: &str = "Failed to create analysis";
    let pool = &state.pool;

    let spreadsheet = match req.spreadsheet_id.as_deref() {
        Some(id) => spreadsheets::find_owned(pool, id, auth.id())
            .await
            .context_500(CONTEXT)?,
        None => None,
    };
    let Some(spreadsheet) = spreadsheet else {
        return Err(ApiError::not_found("Spreadsheet not found"));
    };

    let Some(name) = req.name.filter(|n| !n.trim().is_empty()) else {
        return Err(ApiError::bad_request("Analysis name is required"));
    };

    let now = Utc::now();
    let analysis = sqlx::query_as::<_, Analysis>(
        r#"
        INSERT INTO analyses
            (id, user_id, spreadsheet_id, name, description, selected_columns,
             date_column, period_type, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(auth.id())
    .bind(&spreadsheet.id)
    .bind(&name)
    .bind(&req.description)
    .bind(SqlJson(req.selected_columns.clone()))
    .bind(&req.date_column)
    .bind(req.period_type)
    .bind(ProcessingStatus::Pending)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .context_500(CONTEXT)?;

    // TODO: hand the record to the analysis worker once KPI/trend extraction exists.
    log::info!("Queued analysis {} on spreadsheet {}", analysis.id, spreadsheet.id);

    let body = ApiResponse::ok(analysis).with_message("Analysis created successfully");
    Ok((StatusCode::CREATED, Json(body)))
}

async fn list(
    State(state): State<SharedState>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Paginated<AnalysisWithSheet<SheetSize>>>> {
    const CONTEXT: &str = "Failed to get analyses";
    let params = query.params();

    let rows = sqlx::query_as::<_, AnalysisListRow>(
        r#"
        SELECT a.*,
               s.original_name AS sheet_original_name,
               s.file_size     AS sheet_file_size
        FROM analyses a
        JOIN spreadsheets s ON s.id = a.spreadsheet_id
        WHERE a.user_id = ?
        ORDER BY a.created_at DESC, a.rowid DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(auth.id())
    .bind(params.limit)
    .bind(params.offset())
    .fetch_all(&state.pool)
    .await
    .context_500(CONTEXT)?;

    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM analyses WHERE user_id = ?")
        .bind(auth.id())
        .fetch_one(&state.pool)
        .await
        .context_500(CONTEXT)?;

    let data = rows
        .into_iter()
        .map(|row| AnalysisWithSheet {
            analysis: row.analysis,
            spreadsheet: SheetSize {
                original_name: row.sheet_original_name,
                file_size: row.sheet_file_size,
            },
        })
        .collect();

    Ok(Json(Paginated::new(data, params, total)))
}

async fn get_one(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<AnalysisWithSheet<SheetDetail>>>> {
    let row = sqlx::query_as::<_, AnalysisDetailRow>(
        r#"
        SELECT a.*,
               s.original_name AS sheet_original_name,
               s.file_name     AS sheet_file_name,
               s.file_size     AS sheet_file_size,
               s.total_rows    AS sheet_total_rows,
               s.total_columns AS sheet_total_columns
        FROM analyses a
        JOIN spreadsheets s ON s.id = a.spreadsheet_id
        WHERE a.id = ? AND a.user_id = ?
        "#,
    )
    .bind(&id)
    .bind(auth.id())
    .fetch_optional(&state.pool)
    .await
    .context_500("Failed to get analysis")?
    .ok_or_else(|| ApiError::not_found("Analysis not found"))?;

    Ok(Json(ApiResponse::ok(AnalysisWithSheet {
        analysis: row.analysis,
        spreadsheet: SheetDetail {
            original_name: row.sheet_original_name,
            file_name: row.sheet_file_name,
            file_size: row.sheet_file_size,
            total_rows: row.sheet_total_rows,
            total_columns: row.sheet_total_columns,
        },
    })))
}

async fn update(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateAnalysisRequest>,
) -> ApiResult<Json<ApiResponse<Analysis>>> {
    const CONTEXT: &str = "Failed to update analysis";
    let mut analysis = find_owned(&state.pool, &id, auth.id())
        .await
        .context_500(CONTEXT)?
        .ok_or_else(|| ApiError::not_found("Analysis not found"))?;

    req.apply(&mut analysis)?;

    let updated = sqlx::query_as::<_, Analysis>(
        r#"
        UPDATE analyses
        SET name = ?, description = ?, selected_columns = ?, date_column = ?,
            period_type = ?, updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(&analysis.name)
    .bind(&analysis.description)
    .bind(&analysis.selected_columns)
    .bind(&analysis.date_column)
    .bind(analysis.period_type)
    .bind(Utc::now())
    .bind(&analysis.id)
    .fetch_one(&state.pool)
    .await
    .context_500(CONTEXT)?;

    Ok(Json(
        ApiResponse::ok(updated).with_message("Analysis updated successfully"),
    ))
}

async fn remove(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<()>>> {
    const CONTEXT: &str = "Failed to delete analysis";
    let analysis = find_owned(&state.pool, &id, auth.id())
        .await
        .context_500(CONTEXT)?
        .ok_or_else(|| ApiError::not_found("Analysis not found"))?;

    sqlx::query("DELETE FROM analyses WHERE id = ?")
        .bind(&analysis.id)
        .execute(&state.pool)
        .await
        .context_500(CONTEXT)?;

    Ok(Json(ApiResponse::message("Analysis deleted successfully")))
}
