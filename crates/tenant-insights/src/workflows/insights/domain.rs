use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::window::WeekWindow;

/// Identifier wrapper for a tenant account. Every query and report is scoped by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for a persisted weekly report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(pub Uuid);

impl ReportId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ReportId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim()).map(Self)
    }
}

/// Headline numbers for one tenant week. Percentages are always on a 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportKeyMetrics {
    pub revenue: f64,
    /// Absent when the previous week has no revenue to compare against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue_change: Option<f64>,
    pub jobs_completed: u32,
    pub appointment_completion_rate: f64,
    pub quote_conversion_rate: f64,
    pub nps_score: i32,
}

impl ReportKeyMetrics {
    pub fn has_baseline(&self) -> bool {
        self.revenue_change.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportData {
    pub key_metrics: ReportKeyMetrics,
    #[serde(default)]
    pub top_wins: Vec<String>,
    #[serde(default)]
    pub areas_needing_attention: Vec<String>,
    #[serde(default)]
    pub action_items: Vec<String>,
    #[serde(default)]
    pub forecast: String,
}

/// Persisted weekly report. Only `sent`/`sent_at` change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyReport {
    pub id: ReportId,
    pub tenant_id: TenantId,
    pub week_start: NaiveDate,
    pub report: ReportData,
    #[serde(default)]
    pub sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl WeeklyReport {
    pub fn new(
        tenant_id: TenantId,
        window: WeekWindow,
        report: ReportData,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ReportId::generate(),
            tenant_id,
            week_start: window.start(),
            report,
            sent: false,
            sent_at: None,
            created_at,
        }
    }

    pub fn window(&self) -> WeekWindow {
        WeekWindow::containing(self.week_start)
    }

    /// Records delivery. Returns `false` when the report was already marked sent.
    pub fn mark_sent(&mut self, at: DateTime<Utc>) -> bool {
        if self.sent {
            return false;
        }
        self.sent = true;
        self.sent_at = Some(at);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_report() -> WeeklyReport {
        let window = WeekWindow::starting(NaiveDate::from_ymd_opt(2025, 9, 22).expect("valid"))
            .expect("monday");
        WeeklyReport::new(
            TenantId("acme-hvac".to_string()),
            window,
            ReportData {
                key_metrics: ReportKeyMetrics {
                    revenue: 1500.0,
                    revenue_change: None,
                    jobs_completed: 4,
                    appointment_completion_rate: 80.0,
                    quote_conversion_rate: 50.0,
                    nps_score: 9,
                },
                top_wins: vec!["Revenue up".to_string()],
                areas_needing_attention: Vec::new(),
                action_items: Vec::new(),
                forecast: "Steady".to_string(),
            },
            Utc.with_ymd_and_hms(2025, 9, 29, 8, 0, 0).single().expect("valid"),
        )
    }

    #[test]
    fn serializes_camel_case_and_omits_missing_baseline() {
        let report = sample_report();
        let json = serde_json::to_value(&report).expect("serializes");

        assert_eq!(json["tenantId"], "acme-hvac");
        assert_eq!(json["weekStart"], "2025-09-22");
        assert_eq!(json["report"]["keyMetrics"]["jobsCompleted"], 4);
        assert!(json["report"]["keyMetrics"].get("revenueChange").is_none());
        assert!(json.get("sentAt").is_none());
        assert_eq!(json["sent"], false);
    }

    #[test]
    fn mark_sent_only_transitions_once() {
        let mut report = sample_report();
        let first = Utc.with_ymd_and_hms(2025, 9, 29, 9, 0, 0).single().expect("valid");
        let second = Utc.with_ymd_and_hms(2025, 9, 30, 9, 0, 0).single().expect("valid");

        assert!(report.mark_sent(first));
        assert!(!report.mark_sent(second));
        assert_eq!(report.sent_at, Some(first));
    }

    #[test]
    fn report_id_parses_uuid_strings() {
        let id = ReportId::generate();
        let parsed: ReportId = id.to_string().parse().expect("uuid parses");
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<ReportId>().is_err());
    }
}
