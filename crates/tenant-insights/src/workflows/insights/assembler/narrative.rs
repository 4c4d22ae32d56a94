use async_trait::async_trait;

use super::super::domain::{ReportKeyMetrics, TenantId};
use super::super::metrics::round_to;
use super::super::window::WeekWindow;
use super::format_currency;
use super::signals::ActivitySignals;

const TREND_THRESHOLD_PCT: f64 = 5.0;
const PROJECTION_CAP_PCT: f64 = 25.0;
const COMPLETION_TARGET_PCT: f64 = 85.0;

/// Inputs handed to a narrative generator for the forecast section.
#[derive(Debug, Clone, Copy)]
pub struct NarrativeContext<'a> {
    pub tenant_id: &'a TenantId,
    pub window: WeekWindow,
    pub metrics: &'a ReportKeyMetrics,
    pub previous: Option<&'a ReportKeyMetrics>,
    pub signals: &'a ActivitySignals,
}

/// External text generator (for example an LLM-backed service) that writes the forecast.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn forecast(&self, context: &NarrativeContext<'_>) -> Result<String, GeneratorError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeneratorError {
    #[error("narrative generator unavailable: {0}")]
    Unavailable(String),
    #[error("narrative generator returned an empty forecast")]
    Empty,
}

/// Deterministic rule-based forecast used when no external generator is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateNarrator;

#[async_trait]
impl NarrativeGenerator for TemplateNarrator {
    async fn forecast(&self, context: &NarrativeContext<'_>) -> Result<String, GeneratorError> {
        Ok(template_forecast(context))
    }
}

pub(crate) fn template_forecast(context: &NarrativeContext<'_>) -> String {
    let metrics = context.metrics;
    let mut sentences = Vec::new();

    match metrics.revenue_change {
        Some(change) => {
            let projected = round_to(
                metrics.revenue
                    * (1.0 + change.clamp(-PROJECTION_CAP_PCT, PROJECTION_CAP_PCT) / 100.0),
                2,
            );
            if change >= TREND_THRESHOLD_PCT {
                sentences.push(format!(
                    "Revenue is trending up {change:.1}% week over week; if bookings hold, next week should land near {}.",
                    format_currency(projected)
                ));
            } else if change <= -TREND_THRESHOLD_PCT {
                sentences.push(format!(
                    "Revenue slipped {:.1}% week over week; without intervention next week is tracking toward {}.",
                    change.abs(),
                    format_currency(projected)
                ));
            } else {
                sentences.push(format!(
                    "Revenue is holding steady around {} per week.",
                    format_currency(metrics.revenue)
                ));
            }
        }
        None if metrics.revenue <= 0.0 => sentences.push(
            "No paid revenue was recorded this week; the forecast will sharpen once invoices are collected."
                .to_string(),
        ),
        None => sentences.push(format!(
            "This is the first week with revenue on record ({}); trends will appear once a second week is reported.",
            format_currency(metrics.revenue)
        )),
    }

    if metrics.appointment_completion_rate > 0.0
        && metrics.appointment_completion_rate < COMPLETION_TARGET_PCT
    {
        sentences.push(format!(
            "Lifting appointment completion from {:.1}% toward {COMPLETION_TARGET_PCT:.0}% is the quickest lever for more completed jobs.",
            metrics.appointment_completion_rate
        ));
    }

    let overdue = context.signals.overdue_invoices.len();
    if overdue > 0 {
        sentences.push(format!(
            "Collecting {} in overdue invoices would add directly to next week's cash.",
            format_currency(context.signals.overdue_invoice_total())
        ));
    }

    sentences.join(" ")
}
