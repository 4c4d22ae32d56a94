use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};

use crate::workflows::insights::{
    AppointmentRecord, AppointmentStatus, InMemoryActivitySource, InvoiceRecord, InvoiceStatus,
    JobRecord, JobStatus, NpsSubmission, QuoteRecord, QuoteStatus, TenantId,
};

/// A CSV row that converts into one activity record for its tenant.
pub(crate) trait ActivityRow: serde::de::DeserializeOwned {
    fn apply(self, source: &mut InMemoryActivitySource) -> Result<(), String>;
}

impl ActivityRow for InvoiceRow {
    fn apply(self, source: &mut InMemoryActivitySource) -> Result<(), String> {
        let (tenant, record) = self.into_record()?;
        source.activity_mut(&tenant).invoices.push(record);
        Ok(())
    }
}

impl ActivityRow for AppointmentRow {
    fn apply(self, source: &mut InMemoryActivitySource) -> Result<(), String> {
        let (tenant, record) = self.into_record()?;
        source.activity_mut(&tenant).appointments.push(record);
        Ok(())
    }
}

impl ActivityRow for QuoteRow {
    fn apply(self, source: &mut InMemoryActivitySource) -> Result<(), String> {
        let (tenant, record) = self.into_record()?;
        source.activity_mut(&tenant).quotes.push(record);
        Ok(())
    }
}

impl ActivityRow for JobRow {
    fn apply(self, source: &mut InMemoryActivitySource) -> Result<(), String> {
        let (tenant, record) = self.into_record()?;
        source.activity_mut(&tenant).jobs.push(record);
        Ok(())
    }
}

impl ActivityRow for NpsRow {
    fn apply(self, source: &mut InMemoryActivitySource) -> Result<(), String> {
        let (tenant, record) = self.into_record()?;
        source.activity_mut(&tenant).nps.push(record);
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct InvoiceRow {
    tenant_id: String,
    invoice_id: String,
    service: String,
    amount: f64,
    status: InvoiceStatus,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    due_on: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    paid_at: Option<String>,
}

impl InvoiceRow {
    pub(crate) fn into_record(self) -> Result<(TenantId, InvoiceRecord), String> {
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(format!(
                "invoice {} has invalid amount {}",
                self.invoice_id, self.amount
            ));
        }
        let record = InvoiceRecord {
            due_on: optional_date(self.due_on.as_deref(), "due_on")?,
            paid_at: optional_timestamp(self.paid_at.as_deref(), "paid_at")?,
            invoice_id: self.invoice_id,
            service: self.service,
            amount: self.amount,
            status: self.status,
        };
        Ok((TenantId(self.tenant_id), record))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AppointmentRow {
    tenant_id: String,
    appointment_id: String,
    scheduled_at: String,
    status: AppointmentStatus,
}

impl AppointmentRow {
    pub(crate) fn into_record(self) -> Result<(TenantId, AppointmentRecord), String> {
        let scheduled_at = parse_timestamp(&self.scheduled_at)
            .ok_or_else(|| invalid("scheduled_at", &self.scheduled_at))?;
        let record = AppointmentRecord {
            appointment_id: self.appointment_id,
            scheduled_at,
            status: self.status,
        };
        Ok((TenantId(self.tenant_id), record))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuoteRow {
    tenant_id: String,
    quote_id: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    sent_at: Option<String>,
    status: QuoteStatus,
}

impl QuoteRow {
    pub(crate) fn into_record(self) -> Result<(TenantId, QuoteRecord), String> {
        let record = QuoteRecord {
            sent_at: optional_timestamp(self.sent_at.as_deref(), "sent_at")?,
            quote_id: self.quote_id,
            status: self.status,
        };
        Ok((TenantId(self.tenant_id), record))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct JobRow {
    tenant_id: String,
    job_id: String,
    title: String,
    status: JobStatus,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    due_on: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    completed_at: Option<String>,
}

impl JobRow {
    pub(crate) fn into_record(self) -> Result<(TenantId, JobRecord), String> {
        let record = JobRecord {
            due_on: optional_date(self.due_on.as_deref(), "due_on")?,
            completed_at: optional_timestamp(self.completed_at.as_deref(), "completed_at")?,
            job_id: self.job_id,
            title: self.title,
            status: self.status,
        };
        Ok((TenantId(self.tenant_id), record))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct NpsRow {
    tenant_id: String,
    submitted_at: String,
    score: u8,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    comment: Option<String>,
}

impl NpsRow {
    pub(crate) fn into_record(self) -> Result<(TenantId, NpsSubmission), String> {
        if self.score > 10 {
            return Err(format!("NPS score {} is outside 0-10", self.score));
        }
        let submitted_at = parse_timestamp(&self.submitted_at)
            .ok_or_else(|| invalid("submitted_at", &self.submitted_at))?;
        let record = NpsSubmission {
            submitted_at,
            score: self.score,
            comment: self.comment,
        };
        Ok((TenantId(self.tenant_id), record))
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

/// RFC 3339, or a bare `YYYY-MM-DD` read as midnight UTC.
pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }

    None
}

fn optional_timestamp(value: Option<&str>, column: &str) -> Result<Option<DateTime<Utc>>, String> {
    value
        .map(|raw| parse_timestamp(raw).ok_or_else(|| invalid(column, raw)))
        .transpose()
}

fn optional_date(value: Option<&str>, column: &str) -> Result<Option<NaiveDate>, String> {
    value
        .map(|raw| {
            parse_timestamp(raw)
                .map(|dt| dt.date_naive())
                .ok_or_else(|| invalid(column, raw))
        })
        .transpose()
}

fn invalid(column: &str, value: &str) -> String {
    format!("{column} '{value}' is not an RFC 3339 timestamp or YYYY-MM-DD date")
}
