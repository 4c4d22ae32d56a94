use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::config::InsightsConfig;
use crate::workflows::insights::store::StoreError;
use crate::workflows::insights::window::DateRange;
use crate::workflows::insights::{
    insights_router, ActivitySource, AppointmentRecord, AppointmentStatus, GeneratorError,
    InMemoryActivitySource, InMemoryReportStore, InvoiceRecord, InvoiceStatus, JobRecord,
    JobStatus, NarrativeContext, NarrativeGenerator, NpsSubmission, QuoteRecord, QuoteStatus,
    ReportData, ReportId, ReportKeyMetrics, ReportStore, SourceError, TemplateNarrator,
    TenantActivity, TenantId, WeekWindow, WeeklyReport, WeeklyReportService,
};

pub(super) const TENANT: &str = "acme-hvac";

pub(super) fn tenant() -> TenantId {
    TenantId(TENANT.to_string())
}

pub(super) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub(super) fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn week(y: i32, m: u32, d: u32) -> WeekWindow {
    WeekWindow::starting(date(y, m, d)).expect("monday")
}

/// Wednesday after the fixture's report week of 2025-09-22.
pub(super) fn now() -> DateTime<Utc> {
    at(2025, 10, 1, 12)
}

pub(super) fn report_week() -> WeekWindow {
    week(2025, 9, 22)
}

pub(super) fn paid_invoice(id: &str, service: &str, amount: f64, paid: DateTime<Utc>) -> InvoiceRecord {
    InvoiceRecord {
        invoice_id: id.to_string(),
        service: service.to_string(),
        amount,
        status: InvoiceStatus::Paid,
        due_on: Some(paid.date_naive()),
        paid_at: Some(paid),
    }
}

pub(super) fn open_invoice(id: &str, service: &str, amount: f64, due_on: NaiveDate) -> InvoiceRecord {
    InvoiceRecord {
        invoice_id: id.to_string(),
        service: service.to_string(),
        amount,
        status: InvoiceStatus::Sent,
        due_on: Some(due_on),
        paid_at: None,
    }
}

pub(super) fn appointment(id: &str, scheduled: DateTime<Utc>, status: AppointmentStatus) -> AppointmentRecord {
    AppointmentRecord {
        appointment_id: id.to_string(),
        scheduled_at: scheduled,
        status,
    }
}

pub(super) fn quote(id: &str, sent: DateTime<Utc>, status: QuoteStatus) -> QuoteRecord {
    QuoteRecord {
        quote_id: id.to_string(),
        sent_at: Some(sent),
        status,
    }
}

pub(super) fn completed_job(id: &str, completed: DateTime<Utc>) -> JobRecord {
    JobRecord {
        job_id: id.to_string(),
        title: format!("Job {id}"),
        status: JobStatus::Completed,
        due_on: Some(completed.date_naive()),
        completed_at: Some(completed),
    }
}

pub(super) fn open_job(id: &str, title: &str, due_on: NaiveDate) -> JobRecord {
    JobRecord {
        job_id: id.to_string(),
        title: title.to_string(),
        status: JobStatus::Scheduled,
        due_on: Some(due_on),
        completed_at: None,
    }
}

pub(super) fn nps(submitted: DateTime<Utc>, score: u8, comment: Option<&str>) -> NpsSubmission {
    NpsSubmission {
        submitted_at: submitted,
        score,
        comment: comment.map(str::to_string),
    }
}

/// Three weeks of activity: 2025-09-08 ($800), 2025-09-15 ($1,000), and the report week
/// 2025-09-22 ($1,500).
pub(super) fn activity_fixture() -> TenantActivity {
    TenantActivity {
        invoices: vec![
            paid_invoice("inv-100", "Water heater flush", 800.0, at(2025, 9, 10, 15)),
            paid_invoice("inv-201", "Furnace tune-up", 400.0, at(2025, 9, 16, 15)),
            paid_invoice("inv-202", "Duct cleaning", 600.0, at(2025, 9, 18, 15)),
            paid_invoice("inv-301", "Furnace tune-up", 900.0, at(2025, 9, 23, 15)),
            paid_invoice("inv-302", "Duct cleaning", 600.0, at(2025, 9, 25, 15)),
            open_invoice("inv-303", "Thermostat install", 250.0, date(2025, 9, 24)),
        ],
        appointments: vec![
            appointment("apt-201", at(2025, 9, 15, 9), AppointmentStatus::Completed),
            appointment("apt-202", at(2025, 9, 16, 9), AppointmentStatus::Completed),
            appointment("apt-203", at(2025, 9, 17, 9), AppointmentStatus::Completed),
            appointment("apt-204", at(2025, 9, 18, 9), AppointmentStatus::Cancelled),
            appointment("apt-301", at(2025, 9, 22, 9), AppointmentStatus::Completed),
            appointment("apt-302", at(2025, 9, 23, 9), AppointmentStatus::Completed),
            appointment("apt-303", at(2025, 9, 24, 9), AppointmentStatus::Completed),
            appointment("apt-304", at(2025, 9, 25, 9), AppointmentStatus::Completed),
            appointment("apt-305", at(2025, 9, 26, 9), AppointmentStatus::NoShow),
            appointment("apt-306", at(2025, 9, 27, 9), AppointmentStatus::Scheduled),
        ],
        quotes: vec![
            quote("q-201", at(2025, 9, 15, 10), QuoteStatus::Accepted),
            quote("q-202", at(2025, 9, 17, 10), QuoteStatus::Declined),
            quote("q-301", at(2025, 9, 22, 10), QuoteStatus::Accepted),
            quote("q-302", at(2025, 9, 23, 10), QuoteStatus::Accepted),
            quote("q-303", at(2025, 9, 24, 10), QuoteStatus::Expired),
            quote("q-304", at(2025, 9, 26, 10), QuoteStatus::Sent),
        ],
        jobs: vec![
            completed_job("job-201", at(2025, 9, 16, 17)),
            completed_job("job-202", at(2025, 9, 19, 17)),
            completed_job("job-301", at(2025, 9, 22, 17)),
            completed_job("job-302", at(2025, 9, 24, 17)),
            completed_job("job-303", at(2025, 9, 26, 17)),
            open_job("job-304", "Heat pump install", date(2025, 9, 26)),
        ],
        nps: vec![
            nps(at(2025, 9, 16, 12), 8, None),
            nps(at(2025, 9, 19, 12), 9, None),
            nps(at(2025, 9, 23, 12), 10, Some("Fast and friendly")),
            nps(at(2025, 9, 24, 12), 6, Some("Technician arrived late")),
            nps(at(2025, 9, 26, 12), 9, None),
        ],
    }
}

pub(super) fn activity_source() -> InMemoryActivitySource {
    InMemoryActivitySource::new().with_tenant(tenant(), activity_fixture())
}

pub(super) fn insights_config() -> InsightsConfig {
    InsightsConfig::default()
}

pub(super) type MemoryService =
    WeeklyReportService<InMemoryReportStore, InMemoryActivitySource, TemplateNarrator>;

pub(super) fn build_service() -> (MemoryService, Arc<InMemoryReportStore>) {
    let store = Arc::new(InMemoryReportStore::new());
    let service = WeeklyReportService::new(
        store.clone(),
        Arc::new(activity_source()),
        Arc::new(TemplateNarrator),
        &insights_config(),
    );
    (service, store)
}

pub(super) fn service_with<S, A, G>(store: S, source: A, generator: G) -> WeeklyReportService<S, A, G>
where
    S: ReportStore + 'static,
    A: ActivitySource + 'static,
    G: NarrativeGenerator + 'static,
{
    WeeklyReportService::new(
        Arc::new(store),
        Arc::new(source),
        Arc::new(generator),
        &insights_config(),
    )
}

pub(super) fn metrics(revenue: f64, revenue_change: Option<f64>) -> ReportKeyMetrics {
    ReportKeyMetrics {
        revenue,
        revenue_change,
        jobs_completed: 0,
        appointment_completion_rate: 0.0,
        quote_conversion_rate: 0.0,
        nps_score: 0,
    }
}

/// Persisted-looking report for controller tests; no service involved.
pub(super) fn stored_report(week_start: NaiveDate) -> WeeklyReport {
    WeeklyReport::new(
        tenant(),
        WeekWindow::starting(week_start).expect("monday"),
        ReportData {
            key_metrics: metrics(1000.0, None),
            top_wins: Vec::new(),
            areas_needing_attention: Vec::new(),
            action_items: Vec::new(),
            forecast: "Steady week ahead.".to_string(),
        },
        at(2025, 10, 1, 6),
    )
}

/// Finds nothing and rejects every insert as a duplicate, as a store would after losing a race.
pub(super) struct ConflictStore;

#[async_trait]
impl ReportStore for ConflictStore {
    async fn insert(&self, _report: WeeklyReport) -> Result<WeeklyReport, StoreError> {
        Err(StoreError::Conflict)
    }

    async fn find_by_week(
        &self,
        _tenant: &TenantId,
        _week_start: NaiveDate,
    ) -> Result<Option<WeeklyReport>, StoreError> {
        Ok(None)
    }

    async fn fetch(
        &self,
        _tenant: &TenantId,
        _id: &ReportId,
    ) -> Result<Option<WeeklyReport>, StoreError> {
        Ok(None)
    }

    async fn list(
        &self,
        _tenant: &TenantId,
        _limit: usize,
    ) -> Result<Vec<WeeklyReport>, StoreError> {
        Ok(Vec::new())
    }

    async fn mark_sent(
        &self,
        _tenant: &TenantId,
        _id: &ReportId,
        _at: DateTime<Utc>,
    ) -> Result<WeeklyReport, StoreError> {
        Err(StoreError::NotFound)
    }
}

pub(super) struct UnavailableStore;

#[async_trait]
impl ReportStore for UnavailableStore {
    async fn insert(&self, _report: WeeklyReport) -> Result<WeeklyReport, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn find_by_week(
        &self,
        _tenant: &TenantId,
        _week_start: NaiveDate,
    ) -> Result<Option<WeeklyReport>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn fetch(
        &self,
        _tenant: &TenantId,
        _id: &ReportId,
    ) -> Result<Option<WeeklyReport>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn list(
        &self,
        _tenant: &TenantId,
        _limit: usize,
    ) -> Result<Vec<WeeklyReport>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn mark_sent(
        &self,
        _tenant: &TenantId,
        _id: &ReportId,
        _at: DateTime<Utc>,
    ) -> Result<WeeklyReport, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

pub(super) struct UnavailableSource;

#[async_trait]
impl ActivitySource for UnavailableSource {
    async fn invoices(
        &self,
        _tenant: &TenantId,
        _range: DateRange,
    ) -> Result<Vec<InvoiceRecord>, SourceError> {
        Err(SourceError::Unavailable("billing service timed out".to_string()))
    }

    async fn appointments(
        &self,
        _tenant: &TenantId,
        _range: DateRange,
    ) -> Result<Vec<AppointmentRecord>, SourceError> {
        Ok(Vec::new())
    }

    async fn quotes(
        &self,
        _tenant: &TenantId,
        _range: DateRange,
    ) -> Result<Vec<QuoteRecord>, SourceError> {
        Ok(Vec::new())
    }

    async fn jobs(
        &self,
        _tenant: &TenantId,
        _range: DateRange,
    ) -> Result<Vec<JobRecord>, SourceError> {
        Ok(Vec::new())
    }

    async fn nps_submissions(
        &self,
        _tenant: &TenantId,
        _range: DateRange,
    ) -> Result<Vec<NpsSubmission>, SourceError> {
        Ok(Vec::new())
    }

    async fn open_invoices(
        &self,
        _tenant: &TenantId,
        _due_by: NaiveDate,
    ) -> Result<Vec<InvoiceRecord>, SourceError> {
        Err(SourceError::Unavailable("billing service timed out".to_string()))
    }

    async fn open_jobs(
        &self,
        _tenant: &TenantId,
        _due_by: NaiveDate,
    ) -> Result<Vec<JobRecord>, SourceError> {
        Ok(Vec::new())
    }
}

/// Fails the first `failures` calls, then falls back to the template forecast.
#[derive(Default)]
pub(super) struct FlakyNarrator {
    failures: usize,
    calls: AtomicUsize,
}

impl FlakyNarrator {
    pub(super) fn failing(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NarrativeGenerator for FlakyNarrator {
    async fn forecast(&self, context: &NarrativeContext<'_>) -> Result<String, GeneratorError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(GeneratorError::Unavailable("model endpoint returned 502".to_string()));
        }
        TemplateNarrator.forecast(context).await
    }
}

pub(super) struct BlankNarrator;

#[async_trait]
impl NarrativeGenerator for BlankNarrator {
    async fn forecast(&self, _context: &NarrativeContext<'_>) -> Result<String, GeneratorError> {
        Ok("   ".to_string())
    }
}

/// Yields to the scheduler once before answering, so a concurrent request can interleave.
pub(super) struct YieldingNarrator;

#[async_trait]
impl NarrativeGenerator for YieldingNarrator {
    async fn forecast(&self, context: &NarrativeContext<'_>) -> Result<String, GeneratorError> {
        tokio::task::yield_now().await;
        TemplateNarrator.forecast(context).await
    }
}

pub(super) fn router_with_service(service: MemoryService) -> axum::Router {
    insights_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
