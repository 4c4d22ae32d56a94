use chrono::NaiveDate;

use super::activity::SourceError;
use super::assembler::GeneratorError;
use super::domain::{ReportId, TenantId};
use super::validation::FieldError;

/// Error raised by the weekly report pipeline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReportError {
    #[error("invalid report request: {}", summarize(.0))]
    Validation(Vec<FieldError>),
    #[error("a report for tenant {tenant} week starting {week_start} already exists")]
    Conflict {
        tenant: TenantId,
        week_start: NaiveDate,
    },
    #[error("report {0} not found")]
    NotFound(ReportId),
    #[error("upstream unavailable: {0}")]
    Upstream(String),
}

impl ReportError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream(_))
    }
}

impl From<SourceError> for ReportError {
    fn from(value: SourceError) -> Self {
        Self::Upstream(value.to_string())
    }
}

impl From<GeneratorError> for ReportError {
    fn from(value: GeneratorError) -> Self {
        Self::Upstream(value.to_string())
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|error| format!("{}: {}", error.field, error.message))
        .collect::<Vec<_>>()
        .join("; ")
}
