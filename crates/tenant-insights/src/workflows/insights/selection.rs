//! Client-side selection over a tenant's report history.
//!
//! The controller is a synchronous state machine; [`ReportSelectionController::refresh`] and
//! [`ReportSelectionController::trigger_generation`] drive it against a [`ReportClient`].
//! Generation is split into [`begin_generation`](ReportSelectionController::begin_generation)
//! and [`complete_generation`](ReportSelectionController::complete_generation) so callers that
//! run the request elsewhere can still hand the result back with its ticket.

use async_trait::async_trait;

use super::domain::{ReportId, TenantId, WeeklyReport};
use super::error::ReportError;

/// Remote operations the controller needs.
#[async_trait]
pub trait ReportClient: Send + Sync {
    /// Reports for the tenant, newest week first.
    async fn fetch_reports(
        &self,
        tenant: &TenantId,
        limit: Option<usize>,
    ) -> Result<Vec<WeeklyReport>, ReportError>;

    async fn request_generation(&self, tenant: &TenantId) -> Result<WeeklyReport, ReportError>;
}

/// A loaded, non-empty report list and the index of the selected report.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedReports {
    reports: Vec<WeeklyReport>,
    current: usize,
}

impl LoadedReports {
    fn from_reports(mut reports: Vec<WeeklyReport>, keep: Option<ReportId>) -> Option<Self> {
        if reports.is_empty() {
            return None;
        }
        reports.sort_by(|a, b| b.week_start.cmp(&a.week_start));
        let current = keep
            .and_then(|id| reports.iter().position(|report| report.id == id))
            .unwrap_or(0);
        Some(Self { reports, current })
    }

    fn single(report: WeeklyReport) -> Self {
        Self {
            reports: vec![report],
            current: 0,
        }
    }

    pub fn reports(&self) -> &[WeeklyReport] {
        &self.reports
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> &WeeklyReport {
        &self.reports[self.current]
    }

    fn insert_and_select(&mut self, report: WeeklyReport) {
        if let Some(index) = self.reports.iter().position(|entry| entry.id == report.id) {
            self.current = index;
            return;
        }
        if let Some(index) = self
            .reports
            .iter()
            .position(|entry| entry.week_start == report.week_start)
        {
            self.reports[index] = report;
            self.current = index;
            return;
        }
        let index = self
            .reports
            .iter()
            .position(|entry| entry.week_start < report.week_start)
            .unwrap_or(self.reports.len());
        self.reports.insert(index, report);
        self.current = index;
    }
}

/// Identifies one generation request. Results carrying an outdated ticket are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenerationTicket(u64);

#[derive(Debug, Clone, Default, PartialEq)]
pub enum SelectionState {
    #[default]
    Empty,
    Loaded(LoadedReports),
    /// A generation is in flight; `prior` is what the user keeps browsing meanwhile.
    Generating {
        prior: Option<LoadedReports>,
        ticket: GenerationTicket,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SelectionError {
    #[error("a report generation is already in flight")]
    GenerationInFlight,
    #[error(transparent)]
    Report(#[from] ReportError),
}

pub struct ReportSelectionController {
    tenant: TenantId,
    limit: Option<usize>,
    state: SelectionState,
    last_error: Option<ReportError>,
    needs_reconcile: bool,
    next_ticket: u64,
}

impl ReportSelectionController {
    pub fn new(tenant: TenantId) -> Self {
        Self {
            tenant,
            limit: None,
            state: SelectionState::Empty,
            last_error: None,
            needs_reconcile: false,
            next_ticket: 1,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn is_generating(&self) -> bool {
        matches!(self.state, SelectionState::Generating { .. })
    }

    /// Last fetch or generation failure. Cleared by the next successful fetch or generation.
    pub fn last_error(&self) -> Option<&ReportError> {
        self.last_error.as_ref()
    }

    /// Set when a generation finished after being abandoned; the next fetch clears it.
    pub fn needs_reconcile(&self) -> bool {
        self.needs_reconcile
    }

    pub fn reports(&self) -> &[WeeklyReport] {
        self.loaded().map(LoadedReports::reports).unwrap_or_default()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.loaded().map(LoadedReports::current_index)
    }

    pub fn current_report(&self) -> Option<&WeeklyReport> {
        self.loaded().map(LoadedReports::current)
    }

    /// Applies a successful fetch. A selection that is still listed keeps being selected.
    pub fn apply_fetched(&mut self, reports: Vec<WeeklyReport>) {
        let keep = self.current_report().map(|report| report.id);
        let loaded = LoadedReports::from_reports(reports, keep);
        self.last_error = None;
        self.needs_reconcile = false;

        match &mut self.state {
            SelectionState::Generating { prior, .. } => *prior = loaded,
            state => {
                *state = match loaded {
                    Some(loaded) => SelectionState::Loaded(loaded),
                    None => SelectionState::Empty,
                }
            }
        }
    }

    /// Records a failed fetch. The current list, if any, stays available.
    pub fn apply_fetch_error(&mut self, error: ReportError) {
        self.last_error = Some(error);
    }

    /// Selects the report with `id`. Returns false, changing nothing, when it is not listed.
    pub fn select_report(&mut self, id: &ReportId) -> bool {
        let Some(loaded) = self.loaded_mut() else {
            return false;
        };
        match loaded.reports.iter().position(|report| &report.id == id) {
            Some(index) => {
                loaded.current = index;
                true
            }
            None => false,
        }
    }

    /// Moves to the chronologically earlier report. No-op at the oldest.
    pub fn navigate_previous(&mut self) -> bool {
        match self.loaded_mut() {
            Some(loaded) if loaded.current + 1 < loaded.reports.len() => {
                loaded.current += 1;
                true
            }
            _ => false,
        }
    }

    /// Moves to the chronologically later report. No-op at the newest.
    pub fn navigate_next(&mut self) -> bool {
        match self.loaded_mut() {
            Some(loaded) if loaded.current > 0 => {
                loaded.current -= 1;
                true
            }
            _ => false,
        }
    }

    pub fn begin_generation(&mut self) -> Result<GenerationTicket, SelectionError> {
        let prior = match std::mem::take(&mut self.state) {
            SelectionState::Empty => None,
            SelectionState::Loaded(loaded) => Some(loaded),
            generating @ SelectionState::Generating { .. } => {
                self.state = generating;
                return Err(SelectionError::GenerationInFlight);
            }
        };

        let ticket = GenerationTicket(self.next_ticket);
        self.next_ticket += 1;
        self.state = SelectionState::Generating { prior, ticket };
        Ok(ticket)
    }

    /// Hands back the outcome of the generation identified by `ticket`.
    ///
    /// A failure restores the prior state, records the error, and is returned. A success for a
    /// ticket that is no longer current is not applied to the list; it flags reconciliation.
    pub fn complete_generation(
        &mut self,
        ticket: GenerationTicket,
        result: Result<WeeklyReport, ReportError>,
    ) -> Result<(), SelectionError> {
        let current = matches!(
            self.state,
            SelectionState::Generating { ticket: active, .. } if active == ticket
        );
        if !current {
            if result.is_ok() {
                self.needs_reconcile = true;
            }
            return Ok(());
        }

        let prior = match std::mem::take(&mut self.state) {
            SelectionState::Generating { prior, .. } => prior,
            _ => None,
        };

        match result {
            Ok(report) => {
                let loaded = match prior {
                    Some(mut loaded) => {
                        loaded.insert_and_select(report);
                        loaded
                    }
                    None => LoadedReports::single(report),
                };
                self.state = SelectionState::Loaded(loaded);
                self.last_error = None;
                Ok(())
            }
            Err(error) => {
                self.state = prior.map_or(SelectionState::Empty, SelectionState::Loaded);
                self.last_error = Some(error.clone());
                Err(SelectionError::Report(error))
            }
        }
    }

    /// Gives up on the in-flight generation and returns to the prior state.
    pub fn abandon_generation(&mut self) {
        if !self.is_generating() {
            return;
        }
        if let SelectionState::Generating { prior, .. } = std::mem::take(&mut self.state) {
            self.state = prior.map_or(SelectionState::Empty, SelectionState::Loaded);
        }
    }

    pub async fn refresh<C>(&mut self, client: &C) -> Result<(), SelectionError>
    where
        C: ReportClient + ?Sized,
    {
        match client.fetch_reports(&self.tenant, self.limit).await {
            Ok(reports) => {
                self.apply_fetched(reports);
                Ok(())
            }
            Err(error) => {
                self.apply_fetch_error(error.clone());
                Err(SelectionError::Report(error))
            }
        }
    }

    pub async fn trigger_generation<C>(&mut self, client: &C) -> Result<(), SelectionError>
    where
        C: ReportClient + ?Sized,
    {
        let ticket = self.begin_generation()?;
        let result = client.request_generation(&self.tenant).await;
        self.complete_generation(ticket, result)
    }

    fn loaded(&self) -> Option<&LoadedReports> {
        match &self.state {
            SelectionState::Empty => None,
            SelectionState::Loaded(loaded) => Some(loaded),
            SelectionState::Generating { prior, .. } => prior.as_ref(),
        }
    }

    fn loaded_mut(&mut self) -> Option<&mut LoadedReports> {
        match &mut self.state {
            SelectionState::Empty => None,
            SelectionState::Loaded(loaded) => Some(loaded),
            SelectionState::Generating { prior, .. } => prior.as_mut(),
        }
    }
}
