/*!
# DataSight API

Backend for a spreadsheet analysis and executive reporting tool, built in Rust.

## Overview

Users register, upload Excel or CSV files, and request analyses and reports over
them. The service records everything in SQLite and keeps uploaded files on disk.
Analyses, reports and exports are created in the `PENDING` state; their computed
content (KPIs, trends, anomalies, narrative) is produced by a later processing
stage and is not part of this crate.

## Architecture

- **HTTP**: axum router, one sub-router per resource under `/api`
- **Auth**: argon2 password hashes, opaque bearer tokens backed by a session table
- **Storage**: sqlx over SQLite for metadata, a flat upload directory for files

## Modules

- **app**: Router assembly, shared state and middleware
- **config**: Command line / environment configuration
- **db**: Connection pool and migrations
- **error**: API error type and its JSON rendering
- **response**: Response envelope and pagination
- **models**: Row types and API views
- **storage**: Upload directory management
- **login**: Accounts, sessions and `/api/auth`
- **spreadsheets**: `/api/spreadsheets`
- **analysis**: `/api/analysis`
- **reports**: `/api/reports`

## REST API Endpoints

Every response uses the `{success, data?, error?, message?}` envelope and every
endpoint except register, login and health needs `Authorization: Bearer <token>`.

- `POST /api/auth/register`, `POST /api/auth/login`, `POST /api/auth/logout`,
  `GET /api/auth/me`, `PUT /api/auth/password`
- `POST /api/spreadsheets/upload`, `GET /api/spreadsheets`,
  `GET|DELETE /api/spreadsheets/{id}`
- `POST|GET /api/analysis`, `GET|PUT|DELETE /api/analysis/{id}`
- `POST|GET /api/reports`, `GET|DELETE /api/reports/{id}`,
  `POST /api/reports/{id}/export`
- `GET /api/health`
*/

pub mod analysis;
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod login;
pub mod models;
pub mod reports;
pub mod response;
pub mod spreadsheets;
pub mod storage;

pub use app::{AppState, SharedState};
pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use models::*;
pub use response::{ApiResponse, Paginated, Pagination};
