//! Row types for every table, and the trimmed views the API returns.
//!
//! Column names are snake_case in SQLite; the JSON the API emits is camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use sqlx::types::Json;

/// Lifecycle of an uploaded file, an analysis, a report or an export.
///
/// Nothing in this service advances a record past `Pending`; the other states
/// exist for the processing stages that fill in the computed fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeriodType {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportTemplate {
    #[default]
    Executive,
    Detailed,
    Summary,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExportFormat {
    Pdf,
    Pptx,
    Docx,
    Html,
}

impl ExportFormat {
    /// Parse the wire name. Matching is exact: `"pdf"` is rejected.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "PDF" => Some(ExportFormat::Pdf),
            "PPTX" => Some(ExportFormat::Pptx),
            "DOCX" => Some(ExportFormat::Docx),
            "HTML" => Some(ExportFormat::Html),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Pptx => "pptx",
            ExportFormat::Docx => "docx",
            ExportFormat::Html => "html",
        }
    }
}

/// A registered account. The password hash never leaves the server; handlers
/// return [`UserProfile`].
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub email_verified: bool,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub email_verified: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        UserProfile {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            avatar: user.avatar,
            email_verified: user.email_verified,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// A bearer token issued at login or registration.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub token: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Spreadsheet {
    pub id: String,
    pub user_id: String,
    pub original_name: String,
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub checksum: String,
    pub total_rows: Option<i64>,
    pub total_columns: Option<i64>,
    pub sheet_names: Json<Vec<String>>,
    pub has_headers: bool,
    pub status: ProcessingStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing view of a spreadsheet: no owner, storage path or checksum.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetSummary {
    pub id: String,
    pub original_name: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub total_rows: Option<i64>,
    pub total_columns: Option<i64>,
    pub sheet_names: Json<Vec<String>>,
    pub has_headers: bool,
    pub status: ProcessingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub id: String,
    pub user_id: String,
    pub spreadsheet_id: String,
    pub name: String,
    pub description: Option<String>,
    pub selected_columns: Json<Vec<String>>,
    pub date_column: Option<String>,
    pub period_type: Option<PeriodType>,
    pub kpis: Option<Json<Value>>,
    pub trends: Option<Json<Value>>,
    pub anomalies: Option<Json<Value>>,
    pub insights: Option<Json<Value>>,
    pub statistics: Option<Json<Value>>,
    pub status: ProcessingStatus,
    pub processing_time: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub user_id: String,
    pub analysis_id: Option<String>,
    pub spreadsheet_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub template: ReportTemplate,
    pub include_charts: bool,
    pub include_insights: bool,
    pub include_kpis: bool,
    pub executive_summary: Option<String>,
    pub key_insights: Option<Json<Value>>,
    pub recommendations: Option<Json<Value>>,
    pub chart_suggestions: Option<Json<Value>>,
    pub narrative: Option<String>,
    pub word_count: Option<i64>,
    pub page_count: Option<i64>,
    pub status: ProcessingStatus,
    pub generation_time: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReportExport {
    pub id: String,
    pub report_id: String,
    pub format: ExportFormat,
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub status: ProcessingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Spreadsheet fragments embedded in analysis and report responses.

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetName {
    pub original_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetFile {
    pub original_name: String,
    pub file_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetSize {
    pub original_name: String,
    pub file_size: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetDetail {
    pub original_name: String,
    pub file_name: String,
    pub file_size: i64,
    pub total_rows: Option<i64>,
    pub total_columns: Option<i64>,
}

/// An analysis with a slice of its source spreadsheet attached.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisWithSheet<S: Serialize> {
    #[serde(flatten)]
    pub analysis: Analysis,
    pub spreadsheet: S,
}
