use std::sync::Arc;

use super::common::*;
use crate::workflows::insights::{
    ActivitySignals, GeneratorError, InMemoryActivitySource, MetricsAggregator,
    NarrativeGenerator, ReportAssembler, ReportKeyMetrics, TemplateNarrator, WeeklyAggregate,
};

async fn fixture_aggregate() -> WeeklyAggregate {
    MetricsAggregator::default()
        .aggregate(&activity_source(), &tenant(), report_week())
        .await
        .expect("aggregation succeeds")
}

fn full_metrics(
    revenue_change: Option<f64>,
    jobs: u32,
    appointments: f64,
    quotes: f64,
    nps: i32,
) -> ReportKeyMetrics {
    ReportKeyMetrics {
        revenue: 1000.0,
        revenue_change,
        jobs_completed: jobs,
        appointment_completion_rate: appointments,
        quote_conversion_rate: quotes,
        nps_score: nps,
    }
}

#[tokio::test]
async fn assemble_orders_wins_by_magnitude_and_fills_with_top_services() {
    let assembler = ReportAssembler::new(Arc::new(TemplateNarrator), 5);
    let report = assembler
        .assemble(&tenant(), &fixture_aggregate().await)
        .await
        .expect("assembly succeeds");

    assert_eq!(
        report.top_wins,
        vec![
            "Revenue up 50.0% week over week to $1,500.00",
            "Quote conversion up 16.7 pts to 66.7%",
            "Appointment completion up 5.0 pts to 80.0%",
            "Jobs completed up from 2 to 3",
            "Top service: Furnace tune-up brought in $900.00 across 1 invoice",
        ]
    );
}

#[tokio::test]
async fn assemble_lists_declines_then_qualitative_signals() {
    let assembler = ReportAssembler::new(Arc::new(TemplateNarrator), 5);
    let report = assembler
        .assemble(&tenant(), &fixture_aggregate().await)
        .await
        .expect("assembly succeeds");

    assert_eq!(
        report.areas_needing_attention,
        vec![
            "NPS down from 9 to 8",
            "Customer feedback: \"Technician arrived late\"",
            "1 invoice overdue totaling $250.00",
            "1 job past due",
        ]
    );
    assert_eq!(
        report.action_items,
        vec![
            "Call this week's detractors to close the loop on their experience",
            "Collect 1 overdue invoice totaling $250.00",
            "Reschedule 1 overdue job with the customers affected",
        ]
    );
    assert!(report.forecast.starts_with("Revenue is trending up 50.0%"));
    assert!(report.forecast.contains("$1,875.00"));
}

#[test]
fn highlights_respect_configured_cap() {
    let assembler = ReportAssembler::new(Arc::new(TemplateNarrator), 3);
    let current = full_metrics(Some(20.0), 10, 90.0, 60.0, 9);
    let previous = full_metrics(None, 5, 80.0, 40.0, 8);

    let highlights = assembler.highlights(&current, Some(&previous), &ActivitySignals::default());

    assert_eq!(highlights.top_wins.len(), 3);
    assert_eq!(highlights.top_wins[0], "Revenue up 20.0% week over week to $1,000.00");
    assert_eq!(highlights.top_wins[1], "Quote conversion up 20.0 pts to 60.0%");
    assert!(highlights.areas_needing_attention.is_empty());
    assert!(highlights.action_items.is_empty());
}

#[test]
fn equal_magnitudes_keep_insertion_order() {
    let assembler = ReportAssembler::new(Arc::new(TemplateNarrator), 5);
    let current = full_metrics(Some(-5.0), 5, 75.0, 45.0, 5);
    let previous = full_metrics(None, 10, 80.0, 50.0, 10);

    let highlights = assembler.highlights(&current, Some(&previous), &ActivitySignals::default());

    assert_eq!(
        highlights.areas_needing_attention,
        vec![
            "Revenue down 5.0% week over week to $1,000.00",
            "Jobs completed down from 10 to 5",
            "Appointment completion down 5.0 pts to 75.0%",
            "Quote conversion down 5.0 pts to 45.0%",
            "NPS down from 10 to 5",
        ]
    );
    assert_eq!(highlights.action_items.len(), 5);
    assert!(highlights.top_wins.is_empty());
}

#[test]
fn max_highlights_is_clamped() {
    let low = ReportAssembler::new(Arc::new(TemplateNarrator), 1);
    let high = ReportAssembler::new(Arc::new(TemplateNarrator), 12);
    assert_eq!(low.max_highlights(), 3);
    assert_eq!(high.max_highlights(), 5);
}

#[test]
fn first_report_has_no_metric_signals() {
    let assembler = ReportAssembler::new(Arc::new(TemplateNarrator), 5);
    let highlights =
        assembler.highlights(&metrics(500.0, None), None, &ActivitySignals::default());

    assert!(highlights.top_wins.is_empty());
    assert!(highlights.areas_needing_attention.is_empty());
    assert!(highlights.action_items.is_empty());
}

#[tokio::test]
async fn blank_forecast_is_rejected() {
    let assembler = ReportAssembler::new(Arc::new(BlankNarrator), 5);
    let result = assembler.assemble(&tenant(), &fixture_aggregate().await).await;

    assert_eq!(result, Err(GeneratorError::Empty));
}

#[tokio::test]
async fn generator_failure_propagates() {
    let assembler = ReportAssembler::new(Arc::new(FlakyNarrator::failing(1)), 5);
    let result = assembler.assemble(&tenant(), &fixture_aggregate().await).await;

    assert!(matches!(result, Err(GeneratorError::Unavailable(_))));
}

#[test]
fn signals_collect_detractor_comments_and_overdue_items() {
    let signals = ActivitySignals::from_activity(&activity_fixture(), report_week());

    assert_eq!(signals.negative_feedback, vec!["Technician arrived late"]);
    assert_eq!(signals.overdue_invoices.len(), 1);
    assert_eq!(signals.overdue_invoice_total(), 250.0);
    assert_eq!(signals.overdue_jobs[0].label, "Heat pump install");
    assert_eq!(signals.top_services[0].service, "Furnace tune-up");
    assert_eq!(signals.top_services[1].service, "Duct cleaning");
}

#[tokio::test]
async fn assembler_accepts_a_boxed_generator() {
    let generator: Arc<dyn NarrativeGenerator> = Arc::new(TemplateNarrator);
    let assembler: ReportAssembler<dyn NarrativeGenerator> = ReportAssembler::new(generator, 3);

    let report = assembler
        .assemble(&tenant(), &fixture_aggregate().await)
        .await
        .expect("assembly succeeds");

    assert_eq!(assembler.max_highlights(), 3);
    assert_eq!(report.top_wins.len(), 3);
    assert!(!report.forecast.is_empty());
}

#[tokio::test]
async fn long_overdue_items_show_up_as_attention_areas_and_actions() {
    let mut activity = activity_fixture();
    activity
        .invoices
        .push(open_invoice("inv-88", "Boiler repair", 900.0, date(2025, 9, 1)));
    activity
        .jobs
        .push(open_job("job-88", "Boiler replacement", date(2025, 9, 10)));
    let source = InMemoryActivitySource::new().with_tenant(tenant(), activity);
    let aggregate = MetricsAggregator::default()
        .aggregate(&source, &tenant(), report_week())
        .await
        .expect("aggregation succeeds");

    let report = ReportAssembler::new(Arc::new(TemplateNarrator), 5)
        .assemble(&tenant(), &aggregate)
        .await
        .expect("assembly succeeds");

    assert!(report
        .areas_needing_attention
        .contains(&"2 invoices overdue totaling $1,150.00".to_string()));
    assert!(report
        .areas_needing_attention
        .contains(&"2 jobs past due".to_string()));
    assert!(report
        .action_items
        .contains(&"Reschedule 2 overdue jobs with the customers affected".to_string()));
}
