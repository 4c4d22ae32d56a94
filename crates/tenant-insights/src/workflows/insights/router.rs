use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::activity::ActivitySource;
use super::assembler::NarrativeGenerator;
use super::domain::ReportId;
use super::error::ReportError;
use super::service::WeeklyReportService;
use super::store::ReportStore;
use super::validation::{FieldError, ReportWindowRequest};

type SharedService<S, A, G> = Arc<WeeklyReportService<S, A, G>>;

/// Router builder exposing report generation, history, lookup, and delivery endpoints.
pub fn insights_router<S, A, G>(service: SharedService<S, A, G>) -> Router
where
    S: ReportStore + 'static,
    A: ActivitySource + 'static,
    G: NarrativeGenerator + 'static,
{
    Router::new()
        .route(
            "/api/v1/tenants/:tenant_id/insights/reports",
            post(generate_handler::<S, A, G>).get(list_handler::<S, A, G>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/insights/reports/:report_id",
            get(report_handler::<S, A, G>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/insights/reports/:report_id/sent",
            post(mark_sent_handler::<S, A, G>),
        )
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateBody {
    #[serde(default)]
    week_start: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListQuery {
    limit: Option<usize>,
}

pub(crate) async fn generate_handler<S, A, G>(
    State(service): State<SharedService<S, A, G>>,
    Path(tenant_id): Path<String>,
    body: Bytes,
) -> Response
where
    S: ReportStore + 'static,
    A: ActivitySource + 'static,
    G: NarrativeGenerator + 'static,
{
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        GenerateBody::default()
    } else {
        match serde_json::from_slice::<GenerateBody>(&body) {
            Ok(body) => body,
            Err(err) => {
                let payload = json!({
                    "error": "invalid request body",
                    "fields": [FieldError::new("body", "json", err.to_string())],
                });
                return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response();
            }
        }
    };

    let request = ReportWindowRequest {
        tenant_id,
        week_start: body.week_start,
    };

    // Runs to completion even when the client disconnects mid-request.
    let task =
        tokio::spawn(async move { service.generate_for_week(&request, Utc::now()).await });

    match task.await {
        Ok(Ok(outcome)) => {
            let status = if outcome.created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            (status, axum::Json(outcome.report)).into_response()
        }
        Ok(Err(err)) => error_response(&err),
        Err(join_error) => {
            error!(error = %join_error, "report generation task failed");
            let payload = json!({
                "error": "report generation failed",
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn list_handler<S, A, G>(
    State(service): State<SharedService<S, A, G>>,
    Path(tenant_id): Path<String>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Response
where
    S: ReportStore + 'static,
    A: ActivitySource + 'static,
    G: NarrativeGenerator + 'static,
{
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => {
            return error_response(&ReportError::Validation(vec![FieldError::new(
                "limit",
                "integer",
                format!("limit must be a positive integer: {}", rejection.body_text()),
            )]));
        }
    };
    match service.get_weekly_reports(&tenant_id, query.limit).await {
        Ok(reports) => (StatusCode::OK, axum::Json(reports)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn report_handler<S, A, G>(
    State(service): State<SharedService<S, A, G>>,
    Path((tenant_id, report_id)): Path<(String, String)>,
) -> Response
where
    S: ReportStore + 'static,
    A: ActivitySource + 'static,
    G: NarrativeGenerator + 'static,
{
    let result = match parse_report_id(&report_id) {
        Ok(id) => service.get_report(&tenant_id, &id).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn mark_sent_handler<S, A, G>(
    State(service): State<SharedService<S, A, G>>,
    Path((tenant_id, report_id)): Path<(String, String)>,
) -> Response
where
    S: ReportStore + 'static,
    A: ActivitySource + 'static,
    G: NarrativeGenerator + 'static,
{
    let result = match parse_report_id(&report_id) {
        Ok(id) => service.mark_report_sent(&tenant_id, &id, Utc::now()).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(err) => error_response(&err),
    }
}

fn parse_report_id(value: &str) -> Result<ReportId, ReportError> {
    value.parse().map_err(|_| {
        ReportError::Validation(vec![FieldError::new(
            "reportId",
            "uuid",
            "report id must be a UUID",
        )])
    })
}

/// Maps a pipeline error onto its HTTP status and JSON body.
pub fn error_response(err: &ReportError) -> Response {
    let (status, payload) = match err {
        ReportError::Validation(fields) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({
                "error": err.to_string(),
                "fields": fields,
            }),
        ),
        ReportError::Conflict { .. } => (
            StatusCode::CONFLICT,
            json!({
                "error": err.to_string(),
            }),
        ),
        ReportError::NotFound(_) => (
            StatusCode::NOT_FOUND,
            json!({
                "error": err.to_string(),
            }),
        ),
        ReportError::Upstream(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({
                "error": err.to_string(),
            }),
        ),
    };
    (status, axum::Json(payload)).into_response()
}
