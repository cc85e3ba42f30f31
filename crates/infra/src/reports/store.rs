//! In-memory report store.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use assessly_core::{DomainError, DomainResult, ReportId};
use assessly_work::{Analysis, AnalysisSink, ReportReader, ReportSnapshot, WorkError};

/// Input for creating a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReport {
    pub company_name: String,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
}

impl NewReport {
    pub fn new(company_name: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            sector: None,
            scores: BTreeMap::new(),
        }
    }

    pub fn with_score(mut self, criterion: impl Into<String>, score: f64) -> Self {
        self.scores.insert(criterion.into(), score);
        self
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }

    fn validate(&self) -> DomainResult<()> {
        if self.company_name.trim().is_empty() {
            return Err(DomainError::validation("company_name must not be empty"));
        }
        for (criterion, score) in &self.scores {
            if !score.is_finite() || !(0.0..=100.0).contains(score) {
                return Err(DomainError::validation(format!(
                    "score for '{criterion}' must be between 0 and 100"
                )));
            }
        }
        Ok(())
    }
}

/// In-memory report store for tests/dev.
///
/// Implements [`ReportReader`] and [`AnalysisSink`] so it can be handed straight to
/// the local workers.
#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    reports: RwLock<HashMap<ReportId, ReportSnapshot>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn create(&self, input: NewReport) -> DomainResult<ReportSnapshot> {
        input.validate()?;

        let report = ReportSnapshot {
            id: ReportId::new(),
            company_name: input.company_name.trim().to_string(),
            sector: input.sector,
            scores: input.scores,
            analysis: None,
            updated_at: Utc::now(),
        };
        self.upsert(report.clone());
        Ok(report)
    }

    /// Insert or replace a report as-is.
    pub fn upsert(&self, report: ReportSnapshot) {
        if let Ok(mut reports) = self.reports.write() {
            reports.insert(report.id, report);
        }
    }

    pub fn remove(&self, id: ReportId) -> bool {
        self.reports
            .write()
            .map(|mut reports| reports.remove(&id).is_some())
            .unwrap_or(false)
    }

    /// All reports, ordered by company name.
    pub fn list(&self) -> Vec<ReportSnapshot> {
        let mut all: Vec<_> = self
            .reports
            .read()
            .map(|reports| reports.values().cloned().collect())
            .unwrap_or_default();
        all.sort_by(|a, b| a.company_name.cmp(&b.company_name).then(a.id.cmp(&b.id)));
        all
    }

    pub fn contains(&self, id: ReportId) -> bool {
        self.reports
            .read()
            .map(|reports| reports.contains_key(&id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.reports.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReportReader for InMemoryReportStore {
    fn get_report(&self, id: ReportId) -> Option<ReportSnapshot> {
        self.reports.read().ok()?.get(&id).cloned()
    }
}

impl AnalysisSink for InMemoryReportStore {
    fn store_analysis(&self, id: ReportId, analysis: Analysis) -> Result<(), WorkError> {
        let mut reports = self
            .reports
            .write()
            .map_err(|_| WorkError::Internal("report store lock poisoned".to_string()))?;
        let report = reports.get_mut(&id).ok_or(WorkError::ReportNotFound(id))?;
        report.analysis = Some(analysis);
        report.updated_at = Utc::now();
        Ok(())
    }
}
