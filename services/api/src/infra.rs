use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tenant_insights::config::InsightsConfig;
use tenant_insights::error::AppError;
use tenant_insights::workflows::activity_import::CsvActivityImporter;
use tenant_insights::workflows::insights::{
    InMemoryActivitySource, InMemoryReportStore, TemplateNarrator, WeeklyReportService,
};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Report service wired to in-memory persistence and the rule-based forecast.
pub(crate) type InsightsService =
    WeeklyReportService<InMemoryReportStore, InMemoryActivitySource, TemplateNarrator>;

pub(crate) fn insights_service(
    source: InMemoryActivitySource,
    config: &InsightsConfig,
) -> InsightsService {
    WeeklyReportService::new(
        Arc::new(InMemoryReportStore::new()),
        Arc::new(source),
        Arc::new(TemplateNarrator),
        config,
    )
}

/// Loads activity from the configured export directory, or starts empty when none is set.
pub(crate) fn load_activity(config: &InsightsConfig) -> Result<InMemoryActivitySource, AppError> {
    match &config.activity_dir {
        Some(dir) => {
            let source = CsvActivityImporter::from_dir(dir)?;
            info!(
                dir = %dir.display(),
                tenants = source.tenants().count(),
                "loaded activity exports"
            );
            Ok(source)
        }
        None => Ok(InMemoryActivitySource::new()),
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// Reference instant for a report run: midnight UTC of `today`, or now.
pub(crate) fn reference_instant(today: Option<NaiveDate>) -> DateTime<Utc> {
    match today {
        Some(date) => Utc.from_utc_datetime(&date.and_time(NaiveTime::default())),
        None => Utc::now(),
    }
}
