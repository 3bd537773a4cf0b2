//! `/api/reports`: executive report records and their export requests.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::analysis;
use crate::app::SharedState;
use crate::error::{ApiError, ApiResult, JsonBody, ResultExt};
use crate::login::AuthUser;
use crate::models::{
    Analysis, AnalysisWithSheet, ExportFormat, ProcessingStatus, Report, ReportExport,
    ReportTemplate, SheetFile, SheetName,
};
use crate::response::{ApiResponse, PageQuery, Paginated};
use crate::spreadsheets;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportRequest {
    pub analysis_id: Option<String>,
    pub spreadsheet_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub template: Option<ReportTemplate>,
    pub include_charts: Option<bool>,
    pub include_insights: Option<bool>,
    pub include_kpis: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub format: Option<String>,
}

/// Analysis name plus its spreadsheet's name, as shown in report listings.
#[derive(Debug, Serialize)]
pub struct AnalysisLabel {
    pub name: String,
    pub spreadsheet: SheetName,
}

#[derive(Debug, Serialize)]
pub struct ReportListItem {
    #[serde(flatten)]
    pub report: Report,
    pub analysis: Option<AnalysisLabel>,
    pub spreadsheet: Option<SheetName>,
}

#[derive(Debug, Serialize)]
pub struct ReportDetail {
    #[serde(flatten)]
    pub report: Report,
    pub analysis: Option<AnalysisWithSheet<SheetFile>>,
    pub spreadsheet: Option<SheetFile>,
    pub exports: Vec<ReportExport>,
}

#[derive(FromRow)]
struct ReportListRow {
    #[sqlx(flatten)]
    report: Report,
    analysis_name: Option<String>,
    analysis_sheet_name: Option<String>,
    sheet_name: Option<String>,
}

impl From<ReportListRow> for ReportListItem {
    fn from(row: ReportListRow) -> Self {
        let analysis = row.analysis_name.map(|name| AnalysisLabel {
            name,
            spreadsheet: SheetName {
                original_name: row.analysis_sheet_name.unwrap_or_default(),
            },
        });
        ReportListItem {
            report: row.report,
            analysis,
            spreadsheet: row.sheet_name.map(|original_name| SheetName { original_name }),
        }
    }
}

#[derive(FromRow)]
struct AnalysisFileRow {
    #[sqlx(flatten)]
    analysis: Analysis,
    sheet_original_name: String,
    sheet_file_name: String,
}

/// `"<title>.<ext>"`, the name an export will be written under.
pub fn export_file_name(title: &str, format: ExportFormat) -> String {
    format!("{}.{}", title, format.extension())
}

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(get_one).delete(remove))
        .route("/:id/export", post(export))
}

/// Fetch a report only if `user_id` owns it.
pub async fn find_owned(pool: &SqlitePool, id: &str, user_id: &str) -> sqlx::Result<Option<Report>> {
    sqlx::query_as::<_, Report>("SELECT * FROM reports WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

async fn create(
    State(state): State<SharedState>,
    auth: AuthUser,
    JsonBody(req): JsonBody<CreateReportRequest>,
) -> ApiResult<impl IntoResponse> {
    const CONTEXT: &str = "Failed to create report";
    let pool = &state.pool;

    if let Some(analysis_id) = req.analysis_id.as_deref() {
        if analysis::find_owned(pool, analysis_id, auth.id())
            .await
            .context_500(CONTEXT)?
            .is_none()
        {
            return Err(ApiError::not_found("Analysis not found"));
        }
    }
    if let Some(spreadsheet_id) = req.spreadsheet_id.as_deref() {
        if spreadsheets::find_owned(pool, spreadsheet_id, auth.id())
            .await
            .context_500(CONTEXT)?
            .is_none()
        {
            return Err(ApiError::not_found("Spreadsheet not found"));
        }
    }

    let Some(title) = req.title.filter(|t| !t.trim().is_empty()) else {
        return Err(ApiError::bad_request("Report title is required"));
    };

    let now = Utc::now();
    let report = sqlx::query_as::<_, Report>(
        r#"
        INSERT INTO reports
            (id, user_id, analysis_id, spreadsheet_id, title, description, template,
             include_charts, include_insights, include_kpis, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(auth.id())
    .bind(&req.analysis_id)
    .bind(&req.spreadsheet_id)
    .bind(&title)
    .bind(&req.description)
    .bind(req.template.unwrap_or_default())
    .bind(req.include_charts != Some(false))
    .bind(req.include_insights != Some(false))
    .bind(req.include_kpis != Some(false))
    .bind(ProcessingStatus::Pending)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .context_500(CONTEXT)?;

    // TODO: hand the record to the report generator once narration is implemented.
    log::info!("Queued report {} for user {}", report.id, report.user_id);

    let body = ApiResponse::ok(report).with_message("Report creation started");
    Ok((StatusCode::CREATED, Json(body)))
}

async fn list(
    State(state): State<SharedState>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Paginated<ReportListItem>>> {
    const CONTEXT: &str = "Failed to get reports";
    let params = query.params();

    let rows = sqlx::query_as::<_, ReportListRow>(
        r#"
        SELECT r.*,
               a.name           AS analysis_name,
               asrc.original_name AS analysis_sheet_name,
               s.original_name  AS sheet_name
        FROM reports r
        LEFT JOIN analyses a        ON a.id = r.analysis_id
        LEFT JOIN spreadsheets asrc ON asrc.id = a.spreadsheet_id
        LEFT JOIN spreadsheets s    ON s.id = r.spreadsheet_id
        WHERE r.user_id = ?
        ORDER BY r.created_at DESC, r.rowid DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(auth.id())
    .bind(params.limit)
    .bind(params.offset())
    .fetch_all(&state.pool)
    .await
    .context_500(CONTEXT)?;

    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reports WHERE user_id = ?")
        .bind(auth.id())
        .fetch_one(&state.pool)
        .await
        .context_500(CONTEXT)?;

    let data = rows.into_iter().map(ReportListItem::from).collect();
    Ok(Json(Paginated::new(data, params, total)))
}

async fn load_detail(pool: &SqlitePool, report: Report) -> sqlx::Result<ReportDetail> {
    let analysis = match report.analysis_id.as_deref() {
        Some(analysis_id) => sqlx::query_as::<_, AnalysisFileRow>(
            r#"
            SELECT a.*,
                   s.original_name AS sheet_original_name,
                   s.file_name     AS sheet_file_name
            FROM analyses a
            JOIN spreadsheets s ON s.id = a.spreadsheet_id
            WHERE a.id = ?
            "#,
        )
        .bind(analysis_id)
        .fetch_optional(pool)
        .await?
        .map(|row| AnalysisWithSheet {
            analysis: row.analysis,
            spreadsheet: SheetFile {
                original_name: row.sheet_original_name,
                file_name: row.sheet_file_name,
            },
        }),
        None => None,
    };

    let spreadsheet = match report.spreadsheet_id.as_deref() {
        Some(spreadsheet_id) => sqlx::query_as::<_, (String, String)>(
            "SELECT original_name, file_name FROM spreadsheets WHERE id = ?",
        )
        .bind(spreadsheet_id)
        .fetch_optional(pool)
        .await?
        .map(|(original_name, file_name)| SheetFile {
            original_name,
            file_name,
        }),
        None => None,
    };

    let exports = sqlx::query_as::<_, ReportExport>(
        "SELECT * FROM report_exports WHERE report_id = ? ORDER BY created_at, rowid",
    )
    .bind(&report.id)
    .fetch_all(pool)
    .await?;

    Ok(ReportDetail {
        report,
        analysis,
        spreadsheet,
        exports,
    })
}

async fn get_one(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<ReportDetail>>> {
    const CONTEXT: &str = "Failed to get report";
    let report = find_owned(&state.pool, &id, auth.id())
        .await
        .context_500(CONTEXT)?
        .ok_or_else(|| ApiError::not_found("Report not found"))?;

    let detail = load_detail(&state.pool, report).await.context_500(CONTEXT)?;
    Ok(Json(ApiResponse::ok(detail)))
}

/// Queue an export. The format is checked before the report is looked up.
async fn export(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<ExportRequest>,
) -> ApiResult<impl IntoResponse> {
    let Some(format) = req.format.as_deref().and_then(ExportFormat::from_name) else {
        return Err(ApiError::bad_request("Invalid export format"));
    };

    const CONTEXT: &str = "Failed to export report";
    let report = find_owned(&state.pool, &id, auth.id())
        .await
        .context_500(CONTEXT)?
        .ok_or_else(|| ApiError::not_found("Report not found"))?;

    let now = Utc::now();
    // file_path and file_size are filled in once the file is rendered.
    let report_export = sqlx::query_as::<_, ReportExport>(
        r#"
        INSERT INTO report_exports
            (id, report_id, format, file_name, file_path, file_size, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, '', 0, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&report.id)
    .bind(format)
    .bind(export_file_name(&report.title, format))
    .bind(ProcessingStatus::Pending)
    .bind(now)
    .bind(now)
    .fetch_one(&state.pool)
    .await
    .context_500(CONTEXT)?;

    let body = ApiResponse::ok(report_export).with_message("Export started");
    Ok((StatusCode::CREATED, Json(body)))
}

async fn remove(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<()>>> {
    const CONTEXT: &str = "Failed to delete report";
    let report = find_owned(&state.pool, &id, auth.id())
        .await
        .context_500(CONTEXT)?
        .ok_or_else(|| ApiError::not_found("Report not found"))?;

    sqlx::query("DELETE FROM reports WHERE id = ?")
        .bind(&report.id)
        .execute(&state.pool)
        .await
        .context_500(CONTEXT)?;

    Ok(Json(ApiResponse::message("Report deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_names_use_lowercase_extension() {
        assert_eq!(export_file_name("Q3 Board Pack", ExportFormat::Pptx), "Q3 Board Pack.pptx");
        assert_eq!(export_file_name("Summary", ExportFormat::Pdf), "Summary.pdf");
    }

    #[test]
    fn include_flags_default_to_true() {
        let req: CreateReportRequest = serde_json::from_value(serde_json::json!({
            "title": "Weekly",
            "includeCharts": false
        }))
        .unwrap();
        assert!(req.include_charts == Some(false));
        assert!(req.include_insights != Some(false));
        assert!(req.include_kpis != Some(false));
        assert_eq!(req.template.unwrap_or_default(), ReportTemplate::Executive);
    }

    #[test]
    fn unknown_template_is_rejected() {
        let parsed = serde_json::from_value::<CreateReportRequest>(serde_json::json!({
            "title": "Weekly",
            "template": "FANCY"
        }));
        assert!(parsed.is_err());
    }
}
