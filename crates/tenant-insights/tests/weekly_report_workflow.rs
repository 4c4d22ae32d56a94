use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use tenant_insights::config::InsightsConfig;
use tenant_insights::error::AppError;
use tenant_insights::workflows::activity_import::CsvActivityImporter;
use tenant_insights::workflows::insights::{
    insights_router, InMemoryReportStore, ReportError, ReportSelectionController, TemplateNarrator,
    TenantId, WeeklyReportService,
};
use tower::ServiceExt;

const TENANT: &str = "northwind-plumbing";

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/activity")
}

fn service() -> WeeklyReportService<
    InMemoryReportStore,
    tenant_insights::workflows::insights::InMemoryActivitySource,
    TemplateNarrator,
> {
    let source = CsvActivityImporter::from_dir(fixtures_dir()).expect("fixtures import");
    WeeklyReportService::new(
        Arc::new(InMemoryReportStore::new()),
        Arc::new(source),
        Arc::new(TemplateNarrator),
        &InsightsConfig::default(),
    )
}

#[tokio::test]
async fn weekly_report_reflects_imported_activity() {
    let service = service();
    let now = Utc
        .with_ymd_and_hms(2025, 9, 29, 6, 0, 0)
        .single()
        .expect("valid timestamp");

    let report = service
        .generate_report(TENANT, now)
        .await
        .expect("generation succeeds");

    assert_eq!(report.week_start.to_string(), "2025-09-22");
    let data = &report.report;
    assert_eq!(data.key_metrics.revenue_change, Some(25.0));
    assert_eq!(
        data.top_wins.first().map(String::as_str),
        Some("Quote conversion up 33.4 pts to 66.7%")
    );
    assert!(data
        .areas_needing_attention
        .iter()
        .any(|item| item.contains("Had to call twice")));
    assert!(data
        .action_items
        .iter()
        .any(|item| item == "Collect 1 overdue invoice totaling $275.00"));
    assert!(data.top_wins.len() <= 5);
    assert!(data.forecast.contains("$3,125.00"));
}

#[tokio::test]
async fn controller_browses_generated_history() {
    let service = service();
    for day in [22, 29] {
        let now = Utc
            .with_ymd_and_hms(2025, 9, day + 1, 6, 0, 0)
            .single()
            .expect("valid timestamp");
        service.generate_report(TENANT, now).await.expect("generated");
    }

    let mut controller = ReportSelectionController::new(TenantId(TENANT.to_string()));
    controller.refresh(&service).await.expect("refresh");

    assert_eq!(controller.reports().len(), 2);
    let newest = controller.current_report().expect("selected").week_start;
    assert!(controller.navigate_previous());
    let older = controller.current_report().expect("selected").week_start;
    assert!(older < newest);
    assert!(!controller.navigate_previous());
}

#[tokio::test]
async fn http_history_round_trip() {
    let router = insights_router(Arc::new(service()));
    let path = format!("/api/v1/tenants/{TENANT}/insights/reports");

    let response = router
        .clone()
        .oneshot(
            Request::post(&path)
                .header("content-type", "application/json")
                .body(Body::from(r#"{"weekStart":"2025-09-15"}"#))
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = router
        .oneshot(
            Request::get(format!("{path}?limit=5"))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    let reports: serde_json::Value = serde_json::from_slice(&body).expect("json payload");
    assert_eq!(reports[0]["weekStart"], "2025-09-15");
    assert!(reports[0]["report"]["keyMetrics"].get("revenueChange").is_none());
}

#[test]
fn app_error_uses_report_status_codes() {
    use axum::response::IntoResponse;

    let response = AppError::from(ReportError::Upstream("store offline".to_string())).into_response();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
