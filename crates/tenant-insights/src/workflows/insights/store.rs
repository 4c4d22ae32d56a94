use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::domain::{ReportId, TenantId, WeeklyReport};

/// Persistence for weekly reports. At most one report exists per `(tenant, week_start)`.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Rejects a second report for the same tenant week with [`StoreError::Conflict`].
    async fn insert(&self, report: WeeklyReport) -> Result<WeeklyReport, StoreError>;

    async fn find_by_week(
        &self,
        tenant: &TenantId,
        week_start: NaiveDate,
    ) -> Result<Option<WeeklyReport>, StoreError>;

    async fn fetch(
        &self,
        tenant: &TenantId,
        id: &ReportId,
    ) -> Result<Option<WeeklyReport>, StoreError>;

    /// Newest week first, at most `limit` entries.
    async fn list(&self, tenant: &TenantId, limit: usize)
        -> Result<Vec<WeeklyReport>, StoreError>;

    /// Sets the delivery flag. Marking an already sent report leaves `sent_at` untouched.
    async fn mark_sent(
        &self,
        tenant: &TenantId,
        id: &ReportId,
        at: DateTime<Utc>,
    ) -> Result<WeeklyReport, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("report already exists")]
    Conflict,
    #[error("report not found")]
    NotFound,
    #[error("report store unavailable: {0}")]
    Unavailable(String),
}

/// Process-local store keyed by tenant and week start.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReportStore {
    reports: Arc<Mutex<BTreeMap<(TenantId, NaiveDate), WeeklyReport>>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|reports| reports.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(
        &self,
    ) -> Result<MutexGuard<'_, BTreeMap<(TenantId, NaiveDate), WeeklyReport>>, StoreError> {
        self.reports
            .lock()
            .map_err(|_| StoreError::Unavailable("report store lock poisoned".to_string()))
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn insert(&self, report: WeeklyReport) -> Result<WeeklyReport, StoreError> {
        let mut reports = self.lock()?;
        let key = (report.tenant_id.clone(), report.week_start);
        if reports.contains_key(&key) {
            return Err(StoreError::Conflict);
        }
        reports.insert(key, report.clone());
        Ok(report)
    }

    async fn find_by_week(
        &self,
        tenant: &TenantId,
        week_start: NaiveDate,
    ) -> Result<Option<WeeklyReport>, StoreError> {
        let reports = self.lock()?;
        Ok(reports.get(&(tenant.clone(), week_start)).cloned())
    }

    async fn fetch(
        &self,
        tenant: &TenantId,
        id: &ReportId,
    ) -> Result<Option<WeeklyReport>, StoreError> {
        let reports = self.lock()?;
        Ok(reports
            .values()
            .find(|report| &report.tenant_id == tenant && &report.id == id)
            .cloned())
    }

    async fn list(
        &self,
        tenant: &TenantId,
        limit: usize,
    ) -> Result<Vec<WeeklyReport>, StoreError> {
        let reports = self.lock()?;
        Ok(reports
            .iter()
            .rev()
            .filter(|((owner, _), _)| owner == tenant)
            .take(limit)
            .map(|(_, report)| report.clone())
            .collect())
    }

    async fn mark_sent(
        &self,
        tenant: &TenantId,
        id: &ReportId,
        at: DateTime<Utc>,
    ) -> Result<WeeklyReport, StoreError> {
        let mut reports = self.lock()?;
        let report = reports
            .values_mut()
            .find(|report| &report.tenant_id == tenant && &report.id == id)
            .ok_or(StoreError::NotFound)?;
        report.mark_sent(at);
        Ok(report.clone())
    }
}
