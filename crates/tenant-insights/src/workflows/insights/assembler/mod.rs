mod narrative;
mod signals;

use std::sync::Arc;

use serde::Serialize;

pub use narrative::{GeneratorError, NarrativeContext, NarrativeGenerator, TemplateNarrator};
pub use signals::{ActivitySignals, OverdueItem, ServiceRevenue};

use super::domain::{ReportData, ReportKeyMetrics, TenantId};
use super::metrics::WeeklyAggregate;
use signals::{metric_signals, rank_by_magnitude, MetricKind};

pub const MIN_HIGHLIGHTS: usize = 3;
pub const MAX_HIGHLIGHTS: usize = 5;

/// Ordered string sections of a report, before the forecast is attached.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Highlights {
    pub top_wins: Vec<String>,
    pub areas_needing_attention: Vec<String>,
    pub action_items: Vec<String>,
}

/// Builds [`ReportData`] from aggregated metrics, activity signals, and a narrative generator.
pub struct ReportAssembler<G: ?Sized> {
    generator: Arc<G>,
    max_highlights: usize,
}

impl<G> ReportAssembler<G>
where
    G: NarrativeGenerator + ?Sized,
{
    /// `max_highlights` is clamped to 3..=5.
    pub fn new(generator: Arc<G>, max_highlights: usize) -> Self {
        Self {
            generator,
            max_highlights: max_highlights.clamp(MIN_HIGHLIGHTS, MAX_HIGHLIGHTS),
        }
    }

    pub fn max_highlights(&self) -> usize {
        self.max_highlights
    }

    pub async fn assemble(
        &self,
        tenant_id: &TenantId,
        aggregate: &WeeklyAggregate,
    ) -> Result<ReportData, GeneratorError> {
        let signals = ActivitySignals::from_activity(&aggregate.activity, aggregate.window);
        let highlights =
            self.highlights(&aggregate.current, aggregate.previous.as_ref(), &signals);

        let context = NarrativeContext {
            tenant_id,
            window: aggregate.window,
            metrics: &aggregate.current,
            previous: aggregate.previous.as_ref(),
            signals: &signals,
        };
        let forecast = self.generator.forecast(&context).await?;
        let forecast = forecast.trim();
        if forecast.is_empty() {
            return Err(GeneratorError::Empty);
        }

        Ok(ReportData {
            key_metrics: aggregate.current.clone(),
            top_wins: highlights.top_wins,
            areas_needing_attention: highlights.areas_needing_attention,
            action_items: highlights.action_items,
            forecast: forecast.to_string(),
        })
    }

    /// Deterministic selection of wins, attention areas, and action items.
    pub fn highlights(
        &self,
        current: &ReportKeyMetrics,
        previous: Option<&ReportKeyMetrics>,
        signals: &ActivitySignals,
    ) -> Highlights {
        let limit = self.max_highlights;
        let movements = metric_signals(current, previous);

        let mut top_wins: Vec<String> =
            rank_by_magnitude(movements.iter().filter(|signal| signal.change > 0.0))
                .into_iter()
                .take(limit)
                .map(|signal| signal.description.clone())
                .collect();
        for service in &signals.top_services {
            if top_wins.len() >= limit {
                break;
            }
            top_wins.push(format!(
                "Top service: {} brought in {} across {} invoice{}",
                service.service,
                format_currency(service.revenue),
                service.invoices,
                plural(service.invoices as usize)
            ));
        }

        let declines: Vec<_> =
            rank_by_magnitude(movements.iter().filter(|signal| signal.change < 0.0))
                .into_iter()
                .take(limit)
                .collect();
        let mut areas_needing_attention: Vec<String> = declines
            .iter()
            .map(|signal| signal.description.clone())
            .collect();
        let mut qualitative = Vec::new();
        for comment in &signals.negative_feedback {
            qualitative.push(format!("Customer feedback: \"{comment}\""));
        }
        if !signals.overdue_invoices.is_empty() {
            qualitative.push(format!(
                "{} invoice{} overdue totaling {}",
                signals.overdue_invoices.len(),
                plural(signals.overdue_invoices.len()),
                format_currency(signals.overdue_invoice_total())
            ));
        }
        if !signals.overdue_jobs.is_empty() {
            qualitative.push(format!(
                "{} job{} past due",
                signals.overdue_jobs.len(),
                plural(signals.overdue_jobs.len())
            ));
        }
        for entry in qualitative {
            if areas_needing_attention.len() >= limit {
                break;
            }
            areas_needing_attention.push(entry);
        }

        let mut action_items: Vec<String> = declines
            .iter()
            .map(|signal| signal.kind.recommendation().to_string())
            .collect();
        if !signals.overdue_invoices.is_empty() {
            action_items.push(format!(
                "Collect {} overdue invoice{} totaling {}",
                signals.overdue_invoices.len(),
                plural(signals.overdue_invoices.len()),
                format_currency(signals.overdue_invoice_total())
            ));
        }
        if !signals.overdue_jobs.is_empty() {
            action_items.push(format!(
                "Reschedule {} overdue job{} with the customers affected",
                signals.overdue_jobs.len(),
                plural(signals.overdue_jobs.len())
            ));
        }
        let nps_declined = declines.iter().any(|signal| signal.kind == MetricKind::Nps);
        if !signals.negative_feedback.is_empty() && !nps_declined {
            action_items.push(format!(
                "Respond to {} negative customer comment{}",
                signals.negative_feedback.len(),
                plural(signals.negative_feedback.len())
            ));
        }
        action_items.truncate(limit);

        Highlights {
            top_wins,
            areas_needing_attention,
            action_items,
        }
    }
}

/// `$1,234.50` style formatting for report text.
pub fn format_currency(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{:02}", cents % 100)
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}
