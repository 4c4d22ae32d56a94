use chrono::NaiveDate;
use serde::Serialize;

use super::super::activity::{InvoiceStatus, TenantActivity};
use super::super::domain::ReportKeyMetrics;
use super::super::metrics::round_to;
use super::super::window::WeekWindow;
use super::format_currency;

const NEGATIVE_FEEDBACK_CEILING: u8 = 6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceRevenue {
    pub service: String,
    pub revenue: f64,
    pub invoices: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverdueItem {
    pub reference: String,
    pub label: String,
    pub due_on: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

/// Qualitative signals gathered from the report week's records and the open items due by its
/// end.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivitySignals {
    /// Paid revenue per service, highest first; ties keep first-seen order.
    pub top_services: Vec<ServiceRevenue>,
    /// Comments attached to detractor scores, in submission order.
    pub negative_feedback: Vec<String>,
    pub overdue_invoices: Vec<OverdueItem>,
    pub overdue_jobs: Vec<OverdueItem>,
}

impl ActivitySignals {
    pub fn from_activity(activity: &TenantActivity, window: WeekWindow) -> Self {
        let mut top_services: Vec<ServiceRevenue> = Vec::new();
        for invoice in activity.invoices.iter().filter(|invoice| {
            invoice.status == InvoiceStatus::Paid
                && invoice.paid_at.is_some_and(|at| window.contains_instant(at))
        }) {
            match top_services
                .iter_mut()
                .find(|entry| entry.service == invoice.service)
            {
                Some(entry) => {
                    entry.revenue += invoice.amount.max(0.0);
                    entry.invoices += 1;
                }
                None => top_services.push(ServiceRevenue {
                    service: invoice.service.clone(),
                    revenue: invoice.amount.max(0.0),
                    invoices: 1,
                }),
            }
        }
        for entry in &mut top_services {
            entry.revenue = round_to(entry.revenue, 2);
        }
        top_services.sort_by(|a, b| b.revenue.total_cmp(&a.revenue));

        let negative_feedback = activity
            .nps
            .iter()
            .filter(|submission| window.contains_instant(submission.submitted_at))
            .filter(|submission| submission.score <= NEGATIVE_FEEDBACK_CEILING)
            .filter_map(|submission| submission.comment.as_deref())
            .map(str::trim)
            .filter(|comment| !comment.is_empty())
            .map(str::to_string)
            .collect();

        let overdue_invoices = activity
            .invoices
            .iter()
            .filter(|invoice| invoice.is_open_by(window.end()))
            .filter_map(|invoice| {
                let due_on = invoice.due_on?;
                Some(OverdueItem {
                    reference: invoice.invoice_id.clone(),
                    label: invoice.service.clone(),
                    due_on,
                    amount: Some(invoice.amount),
                })
            })
            .collect();

        let overdue_jobs = activity
            .jobs
            .iter()
            .filter(|job| job.is_open_by(window.end()))
            .filter_map(|job| {
                let due_on = job.due_on?;
                Some(OverdueItem {
                    reference: job.job_id.clone(),
                    label: job.title.clone(),
                    due_on,
                    amount: None,
                })
            })
            .collect();

        Self {
            top_services,
            negative_feedback,
            overdue_invoices,
            overdue_jobs,
        }
    }

    pub fn overdue_invoice_total(&self) -> f64 {
        round_to(
            self.overdue_invoices
                .iter()
                .filter_map(|item| item.amount)
                .sum(),
            2,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MetricKind {
    Revenue,
    JobsCompleted,
    AppointmentCompletion,
    QuoteConversion,
    Nps,
}

impl MetricKind {
    pub(crate) const fn recommendation(self) -> &'static str {
        match self {
            Self::Revenue => "Follow up on open quotes and review pricing to recover revenue",
            Self::JobsCompleted => "Rebalance technician schedules to clear the job backlog",
            Self::AppointmentCompletion => {
                "Send day-before appointment reminders to cut cancellations and no-shows"
            }
            Self::QuoteConversion => "Follow up on outstanding quotes within 48 hours",
            Self::Nps => "Call this week's detractors to close the loop on their experience",
        }
    }
}

/// Week-over-week movement of a single metric.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MetricSignal {
    pub(crate) kind: MetricKind,
    pub(crate) change: f64,
    pub(crate) description: String,
}

/// Metric movements in fixed order: revenue, jobs, appointments, quotes, NPS.
pub(crate) fn metric_signals(
    current: &ReportKeyMetrics,
    previous: Option<&ReportKeyMetrics>,
) -> Vec<MetricSignal> {
    let mut signals = Vec::new();

    if let Some(change) = current.revenue_change.filter(|change| *change != 0.0) {
        signals.push(MetricSignal {
            kind: MetricKind::Revenue,
            change,
            description: format!(
                "Revenue {} {:.1}% week over week to {}",
                direction(change),
                change.abs(),
                format_currency(current.revenue)
            ),
        });
    }

    let Some(previous) = previous else {
        return signals;
    };

    let jobs_delta = f64::from(current.jobs_completed) - f64::from(previous.jobs_completed);
    if jobs_delta != 0.0 {
        signals.push(MetricSignal {
            kind: MetricKind::JobsCompleted,
            change: jobs_delta,
            description: format!(
                "Jobs completed {} from {} to {}",
                direction(jobs_delta),
                previous.jobs_completed,
                current.jobs_completed
            ),
        });
    }

    let appointment_delta = round_to(
        current.appointment_completion_rate - previous.appointment_completion_rate,
        1,
    );
    if appointment_delta != 0.0 {
        signals.push(MetricSignal {
            kind: MetricKind::AppointmentCompletion,
            change: appointment_delta,
            description: format!(
                "Appointment completion {} {:.1} pts to {:.1}%",
                direction(appointment_delta),
                appointment_delta.abs(),
                current.appointment_completion_rate
            ),
        });
    }

    let conversion_delta = round_to(
        current.quote_conversion_rate - previous.quote_conversion_rate,
        1,
    );
    if conversion_delta != 0.0 {
        signals.push(MetricSignal {
            kind: MetricKind::QuoteConversion,
            change: conversion_delta,
            description: format!(
                "Quote conversion {} {:.1} pts to {:.1}%",
                direction(conversion_delta),
                conversion_delta.abs(),
                current.quote_conversion_rate
            ),
        });
    }

    let nps_delta = f64::from(current.nps_score - previous.nps_score);
    if nps_delta != 0.0 {
        signals.push(MetricSignal {
            kind: MetricKind::Nps,
            change: nps_delta,
            description: format!(
                "NPS {} from {} to {}",
                direction(nps_delta),
                previous.nps_score,
                current.nps_score
            ),
        });
    }

    signals
}

/// Orders by absolute change, largest first. The sort is stable, so ties keep insertion order.
///
/// Changes are compared raw on one scale even though their units differ: revenue in percent,
/// jobs as a count delta, completion and conversion in rate points, NPS as a score delta.
pub(crate) fn rank_by_magnitude<'a, I>(signals: I) -> Vec<&'a MetricSignal>
where
    I: IntoIterator<Item = &'a MetricSignal>,
{
    let mut ranked: Vec<&MetricSignal> = signals.into_iter().collect();
    ranked.sort_by(|a, b| b.change.abs().total_cmp(&a.change.abs()));
    ranked
}

fn direction(change: f64) -> &'static str {
    if change > 0.0 {
        "up"
    } else {
        "down"
    }
}
