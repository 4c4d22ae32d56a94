use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::TenantId;
use super::window::DateRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Void,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub invoice_id: String,
    pub service: String,
    pub amount: f64,
    pub status: InvoiceStatus,
    pub due_on: Option<NaiveDate>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl InvoiceRecord {
    fn touches(&self, range: DateRange) -> bool {
        self.paid_at.is_some_and(|at| range.contains_instant(at))
            || self.due_on.is_some_and(|due| range.contains(due))
    }

    /// Sent but unpaid, and due on or before `due_by`.
    pub fn is_open_by(&self, due_by: NaiveDate) -> bool {
        self.status == InvoiceStatus::Sent && self.due_on.is_some_and(|due| due <= due_by)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentRecord {
    pub appointment_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Accepted,
    Declined,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub quote_id: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub status: QuoteStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub title: String,
    pub status: JobStatus,
    pub due_on: Option<NaiveDate>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    fn touches(&self, range: DateRange) -> bool {
        self.completed_at.is_some_and(|at| range.contains_instant(at))
            || self.due_on.is_some_and(|due| range.contains(due))
    }

    /// Scheduled or in progress, and due on or before `due_by`.
    pub fn is_open_by(&self, due_by: NaiveDate) -> bool {
        matches!(self.status, JobStatus::Scheduled | JobStatus::InProgress)
            && self.due_on.is_some_and(|due| due <= due_by)
    }
}

/// One survey response on the 0-10 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpsSubmission {
    pub submitted_at: DateTime<Utc>,
    pub score: u8,
    pub comment: Option<String>,
}

/// Activity records for one tenant, as returned by an [`ActivitySource`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TenantActivity {
    pub invoices: Vec<InvoiceRecord>,
    pub appointments: Vec<AppointmentRecord>,
    pub quotes: Vec<QuoteRecord>,
    pub jobs: Vec<JobRecord>,
    pub nps: Vec<NpsSubmission>,
}

impl TenantActivity {
    pub fn is_empty(&self) -> bool {
        self.invoices.is_empty()
            && self.appointments.is_empty()
            && self.quotes.is_empty()
            && self.jobs.is_empty()
            && self.nps.is_empty()
    }

    /// Copy restricted to the records whose relevant dates fall inside `range`.
    pub fn within(&self, range: DateRange) -> Self {
        Self {
            invoices: self
                .invoices
                .iter()
                .filter(|invoice| invoice.touches(range))
                .cloned()
                .collect(),
            appointments: self
                .appointments
                .iter()
                .filter(|appointment| range.contains_instant(appointment.scheduled_at))
                .cloned()
                .collect(),
            quotes: self
                .quotes
                .iter()
                .filter(|quote| quote.sent_at.is_some_and(|at| range.contains_instant(at)))
                .cloned()
                .collect(),
            jobs: self
                .jobs
                .iter()
                .filter(|job| job.touches(range))
                .cloned()
                .collect(),
            nps: self
                .nps
                .iter()
                .filter(|submission| range.contains_instant(submission.submitted_at))
                .cloned()
                .collect(),
        }
    }
}

/// Read-only queries over tenant activity, each scoped by tenant and date range.
///
/// Invoices are returned when paid or due inside the range, jobs when completed or due inside
/// it, and the remaining record kinds by their scheduled/sent/submitted timestamp. The two
/// `open_*` queries have no lower bound so items that fell due weeks ago still surface.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    async fn invoices(
        &self,
        tenant: &TenantId,
        range: DateRange,
    ) -> Result<Vec<InvoiceRecord>, SourceError>;

    async fn appointments(
        &self,
        tenant: &TenantId,
        range: DateRange,
    ) -> Result<Vec<AppointmentRecord>, SourceError>;

    async fn quotes(
        &self,
        tenant: &TenantId,
        range: DateRange,
    ) -> Result<Vec<QuoteRecord>, SourceError>;

    async fn jobs(&self, tenant: &TenantId, range: DateRange)
        -> Result<Vec<JobRecord>, SourceError>;

    async fn nps_submissions(
        &self,
        tenant: &TenantId,
        range: DateRange,
    ) -> Result<Vec<NpsSubmission>, SourceError>;

    /// Sent invoices due on or before `due_by`.
    async fn open_invoices(
        &self,
        tenant: &TenantId,
        due_by: NaiveDate,
    ) -> Result<Vec<InvoiceRecord>, SourceError>;

    /// Scheduled or in-progress jobs due on or before `due_by`.
    async fn open_jobs(
        &self,
        tenant: &TenantId,
        due_by: NaiveDate,
    ) -> Result<Vec<JobRecord>, SourceError>;
}

/// Runs the five activity queries concurrently.
pub async fn load_activity<S>(
    source: &S,
    tenant: &TenantId,
    range: DateRange,
) -> Result<TenantActivity, SourceError>
where
    S: ActivitySource + ?Sized,
{
    let (invoices, appointments, quotes, jobs, nps) = tokio::try_join!(
        source.invoices(tenant, range),
        source.appointments(tenant, range),
        source.quotes(tenant, range),
        source.jobs(tenant, range),
        source.nps_submissions(tenant, range),
    )?;

    Ok(TenantActivity {
        invoices,
        appointments,
        quotes,
        jobs,
        nps,
    })
}

/// Open invoices and jobs due on or before `due_by`, however old. Only those two lists are
/// filled.
pub async fn load_open_items<S>(
    source: &S,
    tenant: &TenantId,
    due_by: NaiveDate,
) -> Result<TenantActivity, SourceError>
where
    S: ActivitySource + ?Sized,
{
    let (invoices, jobs) = tokio::try_join!(
        source.open_invoices(tenant, due_by),
        source.open_jobs(tenant, due_by),
    )?;

    Ok(TenantActivity {
        invoices,
        jobs,
        ..TenantActivity::default()
    })
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("activity source unavailable: {0}")]
    Unavailable(String),
    #[error("activity data malformed: {0}")]
    Malformed(String),
}

/// Activity held in memory, keyed by tenant. Backs the CSV importer, the demo, and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryActivitySource {
    tenants: HashMap<TenantId, TenantActivity>,
}

impl InMemoryActivitySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant(mut self, tenant: TenantId, activity: TenantActivity) -> Self {
        self.tenants.insert(tenant, activity);
        self
    }

    pub fn activity_mut(&mut self, tenant: &TenantId) -> &mut TenantActivity {
        self.tenants.entry(tenant.clone()).or_default()
    }

    pub fn tenants(&self) -> impl Iterator<Item = &TenantId> {
        self.tenants.keys()
    }

    fn scoped(&self, tenant: &TenantId, range: DateRange) -> TenantActivity {
        self.tenants
            .get(tenant)
            .map(|activity| activity.within(range))
            .unwrap_or_default()
    }
}

#[async_trait]
impl ActivitySource for InMemoryActivitySource {
    async fn invoices(
        &self,
        tenant: &TenantId,
        range: DateRange,
    ) -> Result<Vec<InvoiceRecord>, SourceError> {
        Ok(self.scoped(tenant, range).invoices)
    }

    async fn appointments(
        &self,
        tenant: &TenantId,
        range: DateRange,
    ) -> Result<Vec<AppointmentRecord>, SourceError> {
        Ok(self.scoped(tenant, range).appointments)
    }

    async fn quotes(
        &self,
        tenant: &TenantId,
        range: DateRange,
    ) -> Result<Vec<QuoteRecord>, SourceError> {
        Ok(self.scoped(tenant, range).quotes)
    }

    async fn jobs(
        &self,
        tenant: &TenantId,
        range: DateRange,
    ) -> Result<Vec<JobRecord>, SourceError> {
        Ok(self.scoped(tenant, range).jobs)
    }

    async fn nps_submissions(
        &self,
        tenant: &TenantId,
        range: DateRange,
    ) -> Result<Vec<NpsSubmission>, SourceError> {
        Ok(self.scoped(tenant, range).nps)
    }

    async fn open_invoices(
        &self,
        tenant: &TenantId,
        due_by: NaiveDate,
    ) -> Result<Vec<InvoiceRecord>, SourceError> {
        Ok(self
            .tenants
            .get(tenant)
            .map(|activity| {
                activity
                    .invoices
                    .iter()
                    .filter(|invoice| invoice.is_open_by(due_by))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn open_jobs(
        &self,
        tenant: &TenantId,
        due_by: NaiveDate,
    ) -> Result<Vec<JobRecord>, SourceError> {
        Ok(self
            .tenants
            .get(tenant)
            .map(|activity| {
                activity
                    .jobs
                    .iter()
                    .filter(|job| job.is_open_by(due_by))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
