mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn create_applies_defaults() {
    let app = TestApp::new().await;
    let token = app.register("exec@example.com").await;

    let (status, body) = app
        .post(
            "/api/reports",
            Some(&token),
            json!({"title": "Q3 overview", "includeKpis": false}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["message"], "Report creation started");

    let report = &body["data"];
    assert_eq!(report["template"], "EXECUTIVE");
    assert_eq!(report["includeCharts"], true);
    assert_eq!(report["includeInsights"], true);
    assert_eq!(report["includeKpis"], false);
    assert_eq!(report["status"], "PENDING");
    assert_eq!(report["analysisId"], json!(null));
    assert_eq!(report["executiveSummary"], json!(null));
}

#[tokio::test]
async fn create_validates_sources_and_title() {
    let app = TestApp::new().await;
    let alice = app.register("alice@example.com").await;
    let bob = app.register("bob@example.com").await;
    let sheet = app.upload_csv(&alice, "sales.csv").await;
    let analysis = app.create_analysis(&alice, &sheet, "Revenue").await;

    let (status, body) = app
        .post(
            "/api/reports",
            Some(&bob),
            json!({"title": "Nope", "analysisId": analysis}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Analysis not found");

    let (status, body) = app
        .post(
            "/api/reports",
            Some(&bob),
            json!({"title": "Nope", "spreadsheetId": sheet}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Spreadsheet not found");

    let (status, body) = app.post("/api/reports", Some(&alice), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Report title is required");

    let (status, _) = app
        .post(
            "/api/reports",
            Some(&alice),
            json!({"title": "T", "template": "POSTER"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_embeds_source_names() {
    let app = TestApp::new().await;
    let token = app.register("exec@example.com").await;
    let sheet = app.upload_csv(&token, "sales.csv").await;
    let analysis = app.create_analysis(&token, &sheet, "Revenue").await;

    app.create_report(&token, json!({"title": "From analysis", "analysisId": analysis}))
        .await;
    app.create_report(&token, json!({"title": "From sheet", "spreadsheetId": sheet}))
        .await;

    let (status, body) = app.get("/api/reports", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 2);

    let data = body["data"].as_array().unwrap();
    assert_eq!(data[0]["title"], "From sheet");
    assert_eq!(data[0]["analysis"], json!(null));
    assert_eq!(data[0]["spreadsheet"], json!({"originalName": "sales.csv"}));

    assert_eq!(data[1]["title"], "From analysis");
    assert_eq!(
        data[1]["analysis"],
        json!({"name": "Revenue", "spreadsheet": {"originalName": "sales.csv"}})
    );
    assert_eq!(data[1]["spreadsheet"], json!(null));
}

#[tokio::test]
async fn detail_includes_analysis_and_exports() {
    let app = TestApp::new().await;
    let token = app.register("exec@example.com").await;
    let sheet = app.upload_csv(&token, "sales.csv").await;
    let analysis = app.create_analysis(&token, &sheet, "Revenue").await;
    let report = app
        .create_report(
            &token,
            json!({"title": "Board pack", "analysisId": analysis, "spreadsheetId": sheet}),
        )
        .await;

    let (status, body) = app
        .post(
            &format!("/api/reports/{report}/export"),
            Some(&token),
            json!({"format": "PPTX"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["message"], "Export started");
    assert_eq!(body["data"]["fileName"], "Board pack.pptx");
    assert_eq!(body["data"]["filePath"], "");
    assert_eq!(body["data"]["fileSize"], 0);
    assert_eq!(body["data"]["status"], "PENDING");

    let (status, body) = app.get(&format!("/api/reports/{report}"), &token).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["analysis"]["id"], analysis);
    assert_eq!(data["analysis"]["spreadsheet"]["originalName"], "sales.csv");
    assert!(data["analysis"]["spreadsheet"]["fileName"].as_str().is_some());
    assert_eq!(data["spreadsheet"]["originalName"], "sales.csv");
    assert_eq!(data["exports"].as_array().unwrap().len(), 1);
    assert_eq!(data["exports"][0]["format"], "PPTX");
}

#[tokio::test]
async fn export_format_is_checked_before_ownership() {
    let app = TestApp::new().await;
    let alice = app.register("alice@example.com").await;
    let bob = app.register("bob@example.com").await;
    let report = app.create_report(&alice, json!({"title": "Mine"})).await;
    let uri = format!("/api/reports/{report}/export");

    let (status, body) = app.post(&uri, Some(&bob), json!({"format": "pdf"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid export format");

    let (status, body) = app.post(&uri, Some(&alice), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid export format");

    let (status, body) = app.post(&uri, Some(&bob), json!({"format": "PDF"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Report not found");
}

#[tokio::test]
async fn delete_report_cascades_exports() {
    let app = TestApp::new().await;
    let token = app.register("exec@example.com").await;
    let report = app.create_report(&token, json!({"title": "Temp"})).await;
    app.post(
        &format!("/api/reports/{report}/export"),
        Some(&token),
        json!({"format": "HTML"}),
    )
    .await;

    let other = app.register("other@example.com").await;
    let (status, _) = app.delete(&format!("/api/reports/{report}"), &other).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.delete(&format!("/api/reports/{report}"), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Report deleted successfully");

    let (remaining,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM report_exports")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn deleting_source_analysis_keeps_report() {
    let app = TestApp::new().await;
    let token = app.register("exec@example.com").await;
    let sheet = app.upload_csv(&token, "sales.csv").await;
    let analysis = app.create_analysis(&token, &sheet, "Revenue").await;
    let report = app
        .create_report(&token, json!({"title": "Keeps", "analysisId": analysis}))
        .await;

    app.delete(&format!("/api/analysis/{analysis}"), &token).await;

    let (status, body) = app.get(&format!("/api/reports/{report}"), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["analysisId"], json!(null));
    assert_eq!(body["data"]["analysis"], json!(null));
}

#[tokio::test]
async fn internal_errors_hide_details_outside_development() {
    let prod = TestApp::new().await;
    let dev = TestApp::with_config(|config| config.app_env = "development".to_string()).await;

    for app in [&prod, &dev] {
        let token = app.register("exec@example.com").await;
        let report = app.create_report(&token, json!({"title": "Broken"})).await;
        sqlx::query("DROP TABLE report_exports")
            .execute(&app.pool)
            .await
            .unwrap();

        let (status, body) = app.get(&format!("/api/reports/{report}"), &token).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Failed to get report");

        if std::ptr::eq(app, &dev) {
            assert!(body["message"].as_str().unwrap().contains("report_exports"));
        } else {
            assert!(body.get("message").is_none());
        }
    }
}
