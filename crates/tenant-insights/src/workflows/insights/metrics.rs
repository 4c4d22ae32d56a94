use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::activity::{
    load_activity, load_open_items, ActivitySource, AppointmentStatus, InvoiceStatus, JobStatus,
    QuoteStatus, SourceError, TenantActivity,
};
use super::domain::{ReportKeyMetrics, TenantId};
use super::window::WeekWindow;

/// How NPS submissions collapse into the weekly score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NpsMethod {
    /// Mean of the raw 0-10 scores, rounded.
    #[default]
    Mean,
    /// Percentage of promoters (9-10) minus percentage of detractors (0-6), rounded.
    NetPromoter,
}

impl FromStr for NpsMethod {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mean" | "average" => Ok(Self::Mean),
            "net_promoter" | "nps" => Ok(Self::NetPromoter),
            other => Err(format!("unknown NPS method '{other}'")),
        }
    }
}

impl fmt::Display for NpsMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mean => f.write_str("mean"),
            Self::NetPromoter => f.write_str("net_promoter"),
        }
    }
}

/// Aggregation result for a report week.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyAggregate {
    pub window: WeekWindow,
    pub current: ReportKeyMetrics,
    /// Metrics for the week before, when the tenant had any activity in it.
    pub previous: Option<ReportKeyMetrics>,
    /// Report-week records plus every open invoice and job due by the week's end, kept for
    /// signal extraction.
    pub activity: TenantActivity,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsAggregator {
    nps_method: NpsMethod,
}

impl MetricsAggregator {
    pub fn new(nps_method: NpsMethod) -> Self {
        Self { nps_method }
    }

    pub fn nps_method(&self) -> NpsMethod {
        self.nps_method
    }

    /// Pulls two weeks of activity and computes the report week's metrics against the week
    /// before it.
    pub async fn aggregate<S>(
        &self,
        source: &S,
        tenant: &TenantId,
        window: WeekWindow,
    ) -> Result<WeeklyAggregate, SourceError>
    where
        S: ActivitySource + ?Sized,
    {
        let (activity, open_items) = tokio::try_join!(
            load_activity(source, tenant, window.with_previous()),
            load_open_items(source, tenant, window.end()),
        )?;
        let previous_window = window.previous();
        let previous_activity = activity.within(previous_window.range());
        let current_activity = activity.within(window.range());

        let previous_revenue = revenue(&previous_activity, previous_window);
        // The baseline week's own change would need a third week of history; it is unused.
        let previous = if previous_activity.is_empty() {
            None
        } else {
            Some(self.key_metrics(&previous_activity, previous_window, None))
        };
        let current = self.key_metrics(&current_activity, window, Some(previous_revenue));

        debug!(
            tenant = %tenant,
            week_start = %window.start(),
            revenue = current.revenue,
            has_baseline = current.has_baseline(),
            "aggregated weekly metrics"
        );

        Ok(WeeklyAggregate {
            window,
            current,
            previous,
            activity: with_open_items(current_activity, open_items),
        })
    }

    /// Pure metric computation over already-fetched records.
    pub fn key_metrics(
        &self,
        activity: &TenantActivity,
        window: WeekWindow,
        previous_revenue: Option<f64>,
    ) -> ReportKeyMetrics {
        let revenue = revenue(activity, window);
        ReportKeyMetrics {
            revenue,
            revenue_change: previous_revenue.and_then(|previous| revenue_change(revenue, previous)),
            jobs_completed: jobs_completed(activity, window),
            appointment_completion_rate: appointment_completion_rate(activity, window),
            quote_conversion_rate: quote_conversion_rate(activity, window),
            nps_score: nps_score(activity, window, self.nps_method),
        }
    }
}

/// Sum of invoices paid inside the window, rounded to cents.
pub fn revenue(activity: &TenantActivity, window: WeekWindow) -> f64 {
    let total: f64 = activity
        .invoices
        .iter()
        .filter(|invoice| invoice.status == InvoiceStatus::Paid)
        .filter(|invoice| invoice.paid_at.is_some_and(|at| window.contains_instant(at)))
        .map(|invoice| invoice.amount.max(0.0))
        .sum();
    round_to(total, 2)
}

/// Week-over-week change in percent, one decimal. `None` without a positive baseline.
pub fn revenue_change(current: f64, previous: f64) -> Option<f64> {
    if !(previous.is_finite() && previous > 0.0) || !current.is_finite() {
        return None;
    }
    Some(round_to((current - previous) / previous * 100.0, 1))
}

pub fn jobs_completed(activity: &TenantActivity, window: WeekWindow) -> u32 {
    let count = activity
        .jobs
        .iter()
        .filter(|job| job.status == JobStatus::Completed)
        .filter(|job| job.completed_at.is_some_and(|at| window.contains_instant(at)))
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Completed share of resolved appointments. 0 when nothing was resolved, meaning "no data".
pub fn appointment_completion_rate(activity: &TenantActivity, window: WeekWindow) -> f64 {
    let mut completed = 0usize;
    let mut resolved = 0usize;
    for appointment in activity
        .appointments
        .iter()
        .filter(|appointment| window.contains_instant(appointment.scheduled_at))
    {
        match appointment.status {
            AppointmentStatus::Completed => {
                completed += 1;
                resolved += 1;
            }
            AppointmentStatus::Cancelled | AppointmentStatus::NoShow => resolved += 1,
            AppointmentStatus::Scheduled => {}
        }
    }
    percentage(completed, resolved)
}

/// Accepted share of decided quotes sent in the window. 0 when nothing was decided.
pub fn quote_conversion_rate(activity: &TenantActivity, window: WeekWindow) -> f64 {
    let mut accepted = 0usize;
    let mut decided = 0usize;
    for quote in activity
        .quotes
        .iter()
        .filter(|quote| quote.sent_at.is_some_and(|at| window.contains_instant(at)))
    {
        match quote.status {
            QuoteStatus::Accepted => {
                accepted += 1;
                decided += 1;
            }
            QuoteStatus::Declined | QuoteStatus::Expired => decided += 1,
            QuoteStatus::Draft | QuoteStatus::Sent => {}
        }
    }
    percentage(accepted, decided)
}

/// Weekly NPS. No submissions yields 0, which is "no responses", not a measured score.
pub fn nps_score(activity: &TenantActivity, window: WeekWindow, method: NpsMethod) -> i32 {
    let scores: Vec<u8> = activity
        .nps
        .iter()
        .filter(|submission| window.contains_instant(submission.submitted_at))
        .map(|submission| submission.score.min(10))
        .collect();

    if scores.is_empty() {
        return 0;
    }

    let count = scores.len() as f64;
    let value = match method {
        NpsMethod::Mean => scores.iter().map(|&score| f64::from(score)).sum::<f64>() / count,
        NpsMethod::NetPromoter => {
            let promoters = scores.iter().filter(|&&score| score >= 9).count() as f64;
            let detractors = scores.iter().filter(|&&score| score <= 6).count() as f64;
            (promoters - detractors) / count * 100.0
        }
    };
    value.round() as i32
}

/// Appends open items the week's own fetch missed. Open invoices are never paid and open jobs
/// never completed, so metrics over the result are unchanged.
fn with_open_items(mut activity: TenantActivity, open_items: TenantActivity) -> TenantActivity {
    for invoice in open_items.invoices {
        if !activity
            .invoices
            .iter()
            .any(|known| known.invoice_id == invoice.invoice_id)
        {
            activity.invoices.push(invoice);
        }
    }
    for job in open_items.jobs {
        if !activity.jobs.iter().any(|known| known.job_id == job.job_id) {
            activity.jobs.push(job);
        }
    }
    activity
}

fn percentage(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    let rate = numerator as f64 / denominator as f64 * 100.0;
    round_to(rate.clamp(0.0, 100.0), 1)
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
