use std::borrow::Cow;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use super::domain::TenantId;
use super::error::ReportError;
use super::window::{WeekWindow, WindowError};

pub const MAX_LIST_LIMIT: usize = 104;

/// Field-level validation failure reported back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, code: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            code: code.to_string(),
            message: message.into(),
        }
    }
}

fn validate_tenant_slug(value: &str) -> Result<(), ValidationError> {
    let valid = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        let mut err = ValidationError::new("pattern");
        err.message = Some(Cow::from(
            "tenant id may only contain letters, digits, '-' and '_'",
        ));
        return Err(err);
    }
    Ok(())
}

/// Generation request for one tenant. Without `week_start` the last completed week is used.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReportWindowRequest {
    #[validate(
        length(min = 1, max = 64, message = "tenant id must be 1-64 characters"),
        custom(function = "validate_tenant_slug")
    )]
    pub tenant_id: String,
    #[serde(default)]
    pub week_start: Option<NaiveDate>,
}

impl ReportWindowRequest {
    pub fn for_tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            week_start: None,
        }
    }

    pub fn with_week_start(mut self, week_start: NaiveDate) -> Self {
        self.week_start = Some(week_start);
        self
    }

    /// Validates every field and returns all failures together.
    pub fn check(&self) -> Result<(TenantId, Option<WeekWindow>), ReportError> {
        let mut errors = match self.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => field_errors(&errors),
        };

        let window = match self.week_start.map(WeekWindow::starting).transpose() {
            Ok(window) => window,
            Err(err) => {
                let code = match err {
                    WindowError::NotMonday(_) => "not_monday",
                    WindowError::OutOfRange(_) => "range",
                };
                errors.push(FieldError::new("weekStart", code, err.to_string()));
                None
            }
        };

        if errors.is_empty() {
            Ok((TenantId(self.tenant_id.clone()), window))
        } else {
            Err(ReportError::Validation(errors))
        }
    }
}

/// History listing request.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReportListRequest {
    #[validate(
        length(min = 1, max = 64, message = "tenant id must be 1-64 characters"),
        custom(function = "validate_tenant_slug")
    )]
    pub tenant_id: String,
    #[validate(range(min = 1, max = 104, message = "limit must be between 1 and 104"))]
    pub limit: Option<usize>,
}

impl ReportListRequest {
    pub fn check(&self) -> Result<TenantId, ReportError> {
        self.validate()
            .map_err(|errors| ReportError::Validation(field_errors(&errors)))?;
        Ok(TenantId(self.tenant_id.clone()))
    }
}

/// Validates a bare tenant id for operations that take nothing else.
pub fn check_tenant(tenant_id: &str) -> Result<TenantId, ReportError> {
    ReportListRequest {
        tenant_id: tenant_id.to_string(),
        limit: None,
    }
    .check()
}

/// Flattens `validator` output into a stable, camelCase keyed list.
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut flattened: Vec<FieldError> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, failures)| {
            let field = camel_case(field.as_ref());
            failures.iter().map(move |failure| FieldError {
                field: field.clone(),
                code: failure.code.to_string(),
                message: failure
                    .message
                    .as_ref()
                    .map(|message| message.to_string())
                    .unwrap_or_else(|| format!("{field} is invalid")),
            })
        })
        .collect();
    flattened.sort_by(|a, b| a.field.cmp(&b.field).then_with(|| a.code.cmp(&b.code)));
    flattened
}

fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
