//! Weekly business-insights reports.
//!
//! Tenant activity for a Monday-aligned week is aggregated into key metrics, compared with the
//! week before, turned into highlights and a forecast, and persisted once per tenant and week.
//! The selection controller is the client-side view over the persisted history.

pub mod activity;
pub mod assembler;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod router;
pub mod selection;
pub mod service;
pub mod store;
pub mod validation;
pub mod window;

#[cfg(test)]
mod tests;

pub use activity::{
    ActivitySource, AppointmentRecord, AppointmentStatus, InMemoryActivitySource, InvoiceRecord,
    InvoiceStatus, JobRecord, JobStatus, NpsSubmission, QuoteRecord, QuoteStatus, SourceError,
    TenantActivity,
};
pub use assembler::{
    format_currency, ActivitySignals, GeneratorError, Highlights, NarrativeContext,
    NarrativeGenerator, OverdueItem, ReportAssembler, ServiceRevenue, TemplateNarrator,
};
pub use domain::{ReportData, ReportId, ReportKeyMetrics, TenantId, WeeklyReport};
pub use error::ReportError;
pub use metrics::{MetricsAggregator, NpsMethod, WeeklyAggregate};
pub use router::{error_response, insights_router};
pub use selection::{
    GenerationTicket, LoadedReports, ReportClient, ReportSelectionController, SelectionError,
    SelectionState,
};
pub use service::{GenerationOutcome, WeeklyReportService};
pub use store::{InMemoryReportStore, ReportStore, StoreError};
pub use validation::{FieldError, ReportListRequest, ReportWindowRequest};
pub use window::{DateRange, WeekWindow, WindowError};
