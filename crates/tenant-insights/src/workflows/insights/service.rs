use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::activity::ActivitySource;
use super::assembler::{NarrativeGenerator, ReportAssembler};
use super::domain::{ReportId, TenantId, WeeklyReport};
use super::error::ReportError;
use super::metrics::MetricsAggregator;
use super::selection::ReportClient;
use super::store::{ReportStore, StoreError};
use super::validation::{check_tenant, ReportListRequest, ReportWindowRequest};
use super::window::WeekWindow;
use crate::config::InsightsConfig;

/// Result of a generation request. `created` is false when the week already had a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationOutcome {
    pub report: WeeklyReport,
    pub created: bool,
}

type WeekKey = (TenantId, NaiveDate);

/// Service composing aggregation, assembly, and persistence of weekly reports.
pub struct WeeklyReportService<S, A, G> {
    store: Arc<S>,
    source: Arc<A>,
    aggregator: MetricsAggregator,
    assembler: ReportAssembler<G>,
    list_limit: usize,
    in_flight: Mutex<HashSet<WeekKey>>,
}

impl<S, A, G> WeeklyReportService<S, A, G>
where
    S: ReportStore + 'static,
    A: ActivitySource + 'static,
    G: NarrativeGenerator + 'static,
{
    pub fn new(store: Arc<S>, source: Arc<A>, generator: Arc<G>, config: &InsightsConfig) -> Self {
        Self {
            store,
            source,
            aggregator: MetricsAggregator::new(config.nps_method),
            assembler: ReportAssembler::new(generator, config.max_highlights),
            list_limit: config.list_limit,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Generates the report for the last completed week relative to `now`.
    pub async fn generate_report(
        &self,
        tenant_id: &str,
        now: DateTime<Utc>,
    ) -> Result<WeeklyReport, ReportError> {
        let request = ReportWindowRequest::for_tenant(tenant_id);
        self.generate_for_week(&request, now)
            .await
            .map(|outcome| outcome.report)
    }

    /// Idempotent per tenant week: an existing report is returned untouched, and a racing
    /// duplicate for a week already being generated fails with a conflict.
    pub async fn generate_for_week(
        &self,
        request: &ReportWindowRequest,
        now: DateTime<Utc>,
    ) -> Result<GenerationOutcome, ReportError> {
        let (tenant, window) = request.check()?;
        let window = window.unwrap_or_else(|| WeekWindow::last_completed(now.date_naive()));

        let _claim = self.claim(&tenant, window)?;

        if let Some(existing) = self
            .store
            .find_by_week(&tenant, window.start())
            .await
            .map_err(|err| week_error(err, &tenant, window))?
        {
            info!(
                tenant = %tenant,
                week_start = %window.start(),
                report_id = %existing.id,
                "weekly report already exists"
            );
            return Ok(GenerationOutcome {
                report: existing,
                created: false,
            });
        }

        info!(tenant = %tenant, week_start = %window.start(), "generating weekly report");

        let aggregate = self
            .aggregator
            .aggregate(self.source.as_ref(), &tenant, window)
            .await
            .inspect_err(|err| {
                warn!(tenant = %tenant, week_start = %window.start(), error = %err, "activity source failed");
            })?;
        let data = self
            .assembler
            .assemble(&tenant, &aggregate)
            .await
            .inspect_err(|err| {
                warn!(tenant = %tenant, week_start = %window.start(), error = %err, "report assembly failed");
            })?;

        let report = WeeklyReport::new(tenant.clone(), window, data, now);
        let stored = self
            .store
            .insert(report)
            .await
            .map_err(|err| week_error(err, &tenant, window))?;

        info!(
            tenant = %tenant,
            week_start = %window.start(),
            report_id = %stored.id,
            "weekly report persisted"
        );

        Ok(GenerationOutcome {
            report: stored,
            created: true,
        })
    }

    /// Newest first. `limit` falls back to the configured default.
    pub async fn get_weekly_reports(
        &self,
        tenant_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<WeeklyReport>, ReportError> {
        let request = ReportListRequest {
            tenant_id: tenant_id.to_string(),
            limit,
        };
        let tenant = request.check()?;
        self.store
            .list(&tenant, limit.unwrap_or(self.list_limit))
            .await
            .map_err(|err| ReportError::Upstream(err.to_string()))
    }

    pub async fn get_report(
        &self,
        tenant_id: &str,
        report_id: &ReportId,
    ) -> Result<WeeklyReport, ReportError> {
        let tenant = check_tenant(tenant_id)?;
        self.store
            .fetch(&tenant, report_id)
            .await
            .map_err(|err| report_error(err, report_id))?
            .ok_or(ReportError::NotFound(*report_id))
    }

    /// Marks a report delivered. Repeating the call returns the report unchanged.
    pub async fn mark_report_sent(
        &self,
        tenant_id: &str,
        report_id: &ReportId,
        at: DateTime<Utc>,
    ) -> Result<WeeklyReport, ReportError> {
        let tenant = check_tenant(tenant_id)?;
        let report = self
            .store
            .mark_sent(&tenant, report_id, at)
            .await
            .map_err(|err| report_error(err, report_id))?;
        info!(tenant = %tenant, report_id = %report.id, sent_at = ?report.sent_at, "weekly report marked sent");
        Ok(report)
    }

    fn claim(&self, tenant: &TenantId, window: WeekWindow) -> Result<WeekClaim<'_>, ReportError> {
        let key = (tenant.clone(), window.start());
        let mut in_flight = self
            .in_flight
            .lock()
            .map_err(|_| ReportError::Upstream("generation registry lock poisoned".to_string()))?;
        if !in_flight.insert(key.clone()) {
            warn!(tenant = %tenant, week_start = %window.start(), "generation already in flight");
            return Err(ReportError::Conflict {
                tenant: tenant.clone(),
                week_start: window.start(),
            });
        }
        Ok(WeekClaim {
            registry: &self.in_flight,
            key,
        })
    }
}

/// Releases the in-flight claim on drop, including when the generating future is cancelled.
struct WeekClaim<'a> {
    registry: &'a Mutex<HashSet<WeekKey>>,
    key: WeekKey,
}

impl Drop for WeekClaim<'_> {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.registry.lock() {
            in_flight.remove(&self.key);
        }
    }
}

fn week_error(err: StoreError, tenant: &TenantId, window: WeekWindow) -> ReportError {
    match err {
        StoreError::Conflict => ReportError::Conflict {
            tenant: tenant.clone(),
            week_start: window.start(),
        },
        other => ReportError::Upstream(other.to_string()),
    }
}

fn report_error(err: StoreError, report_id: &ReportId) -> ReportError {
    match err {
        StoreError::NotFound => ReportError::NotFound(*report_id),
        other => ReportError::Upstream(other.to_string()),
    }
}

#[async_trait]
impl<S, A, G> ReportClient for WeeklyReportService<S, A, G>
where
    S: ReportStore + 'static,
    A: ActivitySource + 'static,
    G: NarrativeGenerator + 'static,
{
    async fn fetch_reports(
        &self,
        tenant: &TenantId,
        limit: Option<usize>,
    ) -> Result<Vec<WeeklyReport>, ReportError> {
        self.get_weekly_reports(tenant.as_str(), limit).await
    }

    async fn request_generation(&self, tenant: &TenantId) -> Result<WeeklyReport, ReportError> {
        self.generate_report(tenant.as_str(), Utc::now()).await
    }
}
