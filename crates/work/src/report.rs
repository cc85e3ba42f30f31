//! Read/write capabilities over report records.
//!
//! Workers never own report storage; callers (infra) hand them implementations of
//! these traits.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use assessly_core::ReportId;

use crate::outcome::WorkError;

/// AI-generated analysis attached to a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub summary: String,
    /// Mean of the considered criteria, 0-100.
    pub overall_score: f64,
    /// Share of requested criteria that had a score, in \[0, 1\].
    pub confidence: f64,
    pub generated_at: DateTime<Utc>,
}

/// Point-in-time view of one company assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSnapshot {
    pub id: ReportId,
    pub company_name: String,
    pub sector: Option<String>,
    /// Criterion name -> score (0-100).
    pub scores: BTreeMap<String, f64>,
    pub analysis: Option<Analysis>,
    pub updated_at: DateTime<Utc>,
}

/// Lookup-by-id capability over stored reports.
pub trait ReportReader: Send + Sync + 'static {
    fn get_report(&self, id: ReportId) -> Option<ReportSnapshot>;
}

/// Write-back capability for regenerated analyses.
pub trait AnalysisSink: Send + Sync + 'static {
    fn store_analysis(&self, id: ReportId, analysis: Analysis) -> Result<(), WorkError>;
}

impl<T: ReportReader + ?Sized> ReportReader for std::sync::Arc<T> {
    fn get_report(&self, id: ReportId) -> Option<ReportSnapshot> {
        (**self).get_report(id)
    }
}

impl<T: AnalysisSink + ?Sized> AnalysisSink for std::sync::Arc<T> {
    fn store_analysis(&self, id: ReportId, analysis: Analysis) -> Result<(), WorkError> {
        (**self).store_analysis(id, analysis)
    }
}
