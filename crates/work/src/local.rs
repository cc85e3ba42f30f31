//! In-process workers for dev/test deployments.
//!
//! Both workers are deterministic: the same report snapshot and task always give the
//! same output, which keeps job-level tests reproducible.

use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use assessly_core::ReportId;

use crate::executor::WorkExecutor;
use crate::outcome::{ProducedArtifact, WorkError, WorkOutput};
use crate::report::{Analysis, AnalysisSink, ReportReader, ReportSnapshot};
use crate::task::{ExportFormat, ExportOptions, RegenerateOptions, ReportType, WorkTask};

/// Regenerates a report's analysis from its criterion scores.
///
/// Model:
/// - Consider the requested criteria (all scored criteria when none are requested).
/// - `overall_score` is the mean of the considered scores.
/// - `confidence` is the share of requested criteria that actually have a score.
/// - The summary names the score band and the strongest/weakest criteria.
#[derive(Debug, Clone)]
pub struct LocalAnalysisWorker<R, S> {
    reader: R,
    sink: S,
    latency: Duration,
}

impl<R: ReportReader, S: AnalysisSink> LocalAnalysisWorker<R, S> {
    pub fn new(reader: R, sink: S) -> Self {
        Self {
            reader,
            sink,
            latency: Duration::ZERO,
        }
    }

    /// Simulated inference latency, applied before any work.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn analyze(
        &self,
        report: &ReportSnapshot,
        options: &RegenerateOptions,
    ) -> Result<Analysis, WorkError> {
        if report.scores.is_empty() {
            return Err(WorkError::InvalidInput(
                "report has no scored criteria to analyze".to_string(),
            ));
        }

        let requested: Vec<&str> = match &options.sections {
            Some(sections) => sections.iter().map(String::as_str).collect(),
            None => report.scores.keys().map(String::as_str).collect(),
        };

        let considered: Vec<(&str, f64)> = requested
            .iter()
            .filter_map(|name| report.scores.get(*name).map(|score| (*name, *score)))
            .collect();

        if considered.is_empty() {
            return Err(WorkError::InvalidInput(
                "none of the requested sections are scored".to_string(),
            ));
        }

        if let Some((name, score)) = considered
            .iter()
            .find(|(_, s)| !(s.is_finite() && (0.0..=100.0).contains(s)))
        {
            return Err(WorkError::InvalidInput(format!(
                "score for '{name}' is out of range: {score}"
            )));
        }

        let overall = considered.iter().map(|(_, s)| s).sum::<f64>() / considered.len() as f64;
        let confidence = considered.len() as f64 / requested.len() as f64;

        // `considered` is non-empty, so both extremes exist.
        let (strongest, weakest) = considered.iter().fold(
            (considered[0], considered[0]),
            |(hi, lo), &(name, score)| {
                let hi = if score > hi.1 { (name, score) } else { hi };
                let lo = if score < lo.1 { (name, score) } else { lo };
                (hi, lo)
            },
        );

        let summary = format!(
            "{} scores {overall:.1}/100 across {} criteria ({}). Strongest: {} ({:.0}); weakest: {} ({:.0}).",
            report.company_name,
            considered.len(),
            score_band(overall),
            strongest.0,
            strongest.1,
            weakest.0,
            weakest.1,
        );

        Ok(Analysis {
            summary,
            overall_score: overall,
            confidence,
            generated_at: Utc::now(),
        })
    }
}

#[async_trait]
impl<R, S> WorkExecutor for LocalAnalysisWorker<R, S>
where
    R: ReportReader,
    S: AnalysisSink,
{
    fn name(&self) -> &'static str {
        "local.analysis"
    }

    async fn execute(&self, report_id: ReportId, task: &WorkTask) -> Result<WorkOutput, WorkError> {
        let WorkTask::Regenerate(options) = task else {
            return Err(WorkError::Unsupported(format!(
                "analysis worker cannot run '{}' tasks",
                task.name()
            )));
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let report = self
            .reader
            .get_report(report_id)
            .ok_or(WorkError::ReportNotFound(report_id))?;

        let analysis = self.analyze(&report, options)?;
        tracing::debug!(
            report_id = %report_id,
            overall = analysis.overall_score,
            confidence = analysis.confidence,
            "analysis regenerated"
        );
        self.sink.store_analysis(report_id, analysis)?;
        Ok(WorkOutput::empty())
    }
}

/// Renders one report into a text-based file.
///
/// PDF and DOCX need a document renderer that is not part of this crate; those
/// formats fail per item with [`WorkError::Unsupported`].
#[derive(Debug, Clone)]
pub struct LocalExportWorker<R> {
    reader: R,
    latency: Duration,
}

impl<R: ReportReader> LocalExportWorker<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl<R: ReportReader> WorkExecutor for LocalExportWorker<R> {
    fn name(&self) -> &'static str {
        "local.export"
    }

    async fn execute(&self, report_id: ReportId, task: &WorkTask) -> Result<WorkOutput, WorkError> {
        let WorkTask::Export(options) = task else {
            return Err(WorkError::Unsupported(format!(
                "export worker cannot run '{}' tasks",
                task.name()
            )));
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let report = self
            .reader
            .get_report(report_id)
            .ok_or(WorkError::ReportNotFound(report_id))?;

        render(&report, options).map(WorkOutput::with_artifact)
    }
}

/// Render a report snapshot into a file artifact.
pub fn render(report: &ReportSnapshot, options: &ExportOptions) -> Result<ProducedArtifact, WorkError> {
    let body = match options.format {
        ExportFormat::Markdown => render_markdown(report, options.report_type),
        ExportFormat::Html => render_html(report, options.report_type),
        ExportFormat::Json => render_json(report, options.report_type)?,
        ExportFormat::Csv => render_csv(report, options.report_type),
        ExportFormat::Pdf | ExportFormat::Docx => {
            return Err(WorkError::Unsupported(format!(
                "{} rendering is not available in the local exporter",
                options.format.as_str()
            )));
        }
    };

    let file_name = format!(
        "{}-{}.{}",
        slug(&report.company_name),
        options.report_type.as_str().replace('_', "-"),
        options.format.extension()
    );

    Ok(ProducedArtifact::new(
        file_name,
        options.format.content_type(),
        body.into_bytes(),
    ))
}

fn headline_score(report: &ReportSnapshot) -> Option<f64> {
    if let Some(analysis) = &report.analysis {
        return Some(analysis.overall_score);
    }
    if report.scores.is_empty() {
        return None;
    }
    Some(report.scores.values().sum::<f64>() / report.scores.len() as f64)
}

fn render_markdown(report: &ReportSnapshot, report_type: ReportType) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}", report.company_name);
    out.push('\n');
    if let Some(sector) = &report.sector {
        let _ = writeln!(out, "*Sector:* {sector}  ");
    }
    match headline_score(report) {
        Some(score) => {
            let _ = writeln!(out, "**Overall score:** {score:.1}/100");
        }
        None => out.push_str("**Overall score:** not scored\n"),
    }
    if let Some(analysis) = &report.analysis {
        out.push('\n');
        let _ = writeln!(out, "{}", analysis.summary);
    }

    if report_type == ReportType::Full && !report.scores.is_empty() {
        out.push_str("\n## Criteria\n\n| Criterion | Score |\n|---|---|\n");
        for (name, score) in &report.scores {
            let _ = writeln!(out, "| {name} | {score:.0} |");
        }
    }
    out
}

fn render_html(report: &ReportSnapshot, report_type: ReportType) -> String {
    let mut out = String::new();
    let title = escape_html(&report.company_name);
    let _ = write!(
        out,
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title></head><body>\n<h1>{title}</h1>\n"
    );
    if let Some(sector) = &report.sector {
        let _ = writeln!(out, "<p class=\"sector\">{}</p>", escape_html(sector));
    }
    match headline_score(report) {
        Some(score) => {
            let _ = writeln!(out, "<p class=\"score\">Overall score: {score:.1}/100</p>");
        }
        None => out.push_str("<p class=\"score\">Overall score: not scored</p>\n"),
    }
    if let Some(analysis) = &report.analysis {
        let _ = writeln!(out, "<p class=\"summary\">{}</p>", escape_html(&analysis.summary));
    }
    if report_type == ReportType::Full && !report.scores.is_empty() {
        out.push_str("<table>\n<tr><th>Criterion</th><th>Score</th></tr>\n");
        for (name, score) in &report.scores {
            let _ = writeln!(out, "<tr><td>{}</td><td>{score:.0}</td></tr>", escape_html(name));
        }
        out.push_str("</table>\n");
    }
    out.push_str("</body></html>\n");
    out
}

fn render_json(report: &ReportSnapshot, report_type: ReportType) -> Result<String, WorkError> {
    let value = match report_type {
        ReportType::Full => json!({
            "id": report.id,
            "company_name": report.company_name,
            "sector": report.sector,
            "overall_score": headline_score(report),
            "scores": report.scores,
            "analysis": report.analysis,
        }),
        ReportType::OnePager => json!({
            "id": report.id,
            "company_name": report.company_name,
            "overall_score": headline_score(report),
            "summary": report.analysis.as_ref().map(|a| a.summary.clone()),
        }),
    };
    serde_json::to_string_pretty(&value).map_err(|e| WorkError::Render(e.to_string()))
}

fn render_csv(report: &ReportSnapshot, report_type: ReportType) -> String {
    let mut out = String::new();
    match report_type {
        ReportType::Full => {
            out.push_str("company,criterion,score\n");
            for (name, score) in &report.scores {
                let _ = writeln!(out, "{},{},{score}", csv_field(&report.company_name), csv_field(name));
            }
        }
        ReportType::OnePager => {
            out.push_str("company,overall_score\n");
            let score = headline_score(report)
                .map(|s| format!("{s:.1}"))
                .unwrap_or_default();
            let _ = writeln!(out, "{},{score}", csv_field(&report.company_name));
        }
    }
    out
}

fn score_band(score: f64) -> &'static str {
    if score >= 75.0 {
        "strong"
    } else if score >= 50.0 {
        "moderate"
    } else {
        "weak"
    }
}

fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "report".to_string()
    } else {
        trimmed.to_string()
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Default)]
    struct TestReports {
        inner: Mutex<HashMap<ReportId, ReportSnapshot>>,
    }

    impl TestReports {
        fn insert(&self, name: &str, scores: &[(&str, f64)]) -> ReportId {
            let id = ReportId::new();
            let scores: BTreeMap<String, f64> =
                scores.iter().map(|(k, v)| (k.to_string(), *v)).collect();
            self.inner.lock().unwrap().insert(
                id,
                ReportSnapshot {
                    id,
                    company_name: name.to_string(),
                    sector: Some("Logistics".to_string()),
                    scores,
                    analysis: None,
                    updated_at: Utc::now(),
                },
            );
            id
        }
    }

    impl ReportReader for TestReports {
        fn get_report(&self, id: ReportId) -> Option<ReportSnapshot> {
            self.inner.lock().unwrap().get(&id).cloned()
        }
    }

    impl AnalysisSink for TestReports {
        fn store_analysis(&self, id: ReportId, analysis: Analysis) -> Result<(), WorkError> {
            let mut map = self.inner.lock().unwrap();
            let report = map.get_mut(&id).ok_or(WorkError::ReportNotFound(id))?;
            report.analysis = Some(analysis);
            Ok(())
        }
    }

    fn regenerate_all() -> WorkTask {
        WorkTask::Regenerate(RegenerateOptions::default())
    }

    #[tokio::test]
    async fn analysis_is_written_back_with_mean_and_extremes() {
        let reports = Arc::new(TestReports::default());
        let id = reports.insert("Acme Freight", &[("governance", 80.0), ("climate", 40.0), ("social", 60.0)]);
        let worker = LocalAnalysisWorker::new(reports.clone(), reports.clone());

        let out = worker.execute(id, &regenerate_all()).await.unwrap();
        assert!(out.artifact.is_none());

        let analysis = reports.get_report(id).unwrap().analysis.unwrap();
        assert!((analysis.overall_score - 60.0).abs() < 1e-9);
        assert!((analysis.confidence - 1.0).abs() < 1e-9);
        assert!(analysis.summary.contains("Strongest: governance (80)"));
        assert!(analysis.summary.contains("weakest: climate (40)"));
        assert!(analysis.summary.contains("moderate"));
    }

    #[tokio::test]
    async fn analysis_confidence_reflects_missing_sections() {
        let reports = Arc::new(TestReports::default());
        let id = reports.insert("Acme", &[("governance", 90.0)]);
        let worker = LocalAnalysisWorker::new(reports.clone(), reports.clone());

        let task = WorkTask::Regenerate(RegenerateOptions {
            sections: Some(vec!["governance".to_string(), "climate".to_string()]),
        });
        worker.execute(id, &task).await.unwrap();

        let analysis = reports.get_report(id).unwrap().analysis.unwrap();
        assert!((analysis.confidence - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn analysis_fails_without_scores() {
        let reports = Arc::new(TestReports::default());
        let id = reports.insert("Empty Co", &[]);
        let worker = LocalAnalysisWorker::new(reports.clone(), reports.clone());

        let err = worker.execute(id, &regenerate_all()).await.unwrap_err();
        assert!(matches!(err, WorkError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn analysis_rejects_out_of_range_scores() {
        let reports = Arc::new(TestReports::default());
        let id = reports.insert("Odd Co", &[("governance", 140.0)]);
        let worker = LocalAnalysisWorker::new(reports.clone(), reports.clone());

        let err = worker.execute(id, &regenerate_all()).await.unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[tokio::test]
    async fn missing_report_is_reported_by_id() {
        let reports = Arc::new(TestReports::default());
        let worker = LocalExportWorker::new(reports);
        let missing = ReportId::new();

        let task = WorkTask::Export(ExportOptions {
            format: ExportFormat::Markdown,
            report_type: ReportType::Full,
        });
        let err = worker.execute(missing, &task).await.unwrap_err();
        assert_eq!(err, WorkError::ReportNotFound(missing));
    }

    #[tokio::test]
    async fn markdown_export_includes_criteria_table_for_full_reports() {
        let reports = Arc::new(TestReports::default());
        let id = reports.insert("Acme Freight & Co", &[("governance", 80.0)]);
        let worker = LocalExportWorker::new(reports);

        let task = WorkTask::Export(ExportOptions {
            format: ExportFormat::Markdown,
            report_type: ReportType::Full,
        });
        let artifact = worker.execute(id, &task).await.unwrap().artifact.unwrap();

        assert_eq!(artifact.file_name, "acme-freight-co-full.md");
        let text = String::from_utf8(artifact.bytes).unwrap();
        assert!(text.starts_with("# Acme Freight & Co"));
        assert!(text.contains("| governance | 80 |"));
    }

    #[tokio::test]
    async fn one_pager_csv_has_single_row() {
        let reports = Arc::new(TestReports::default());
        let id = reports.insert("Acme, Inc", &[("governance", 70.0), ("climate", 50.0)]);
        let worker = LocalExportWorker::new(reports);

        let task = WorkTask::Export(ExportOptions {
            format: ExportFormat::Csv,
            report_type: ReportType::OnePager,
        });
        let artifact = worker.execute(id, &task).await.unwrap().artifact.unwrap();
        let text = String::from_utf8(artifact.bytes).unwrap();
        assert_eq!(text, "company,overall_score\n\"Acme, Inc\",60.0\n");
    }

    #[tokio::test]
    async fn html_export_escapes_company_name() {
        let reports = Arc::new(TestReports::default());
        let id = reports.insert("<Script> Ltd", &[("governance", 70.0)]);
        let worker = LocalExportWorker::new(reports);

        let task = WorkTask::Export(ExportOptions {
            format: ExportFormat::Html,
            report_type: ReportType::OnePager,
        });
        let artifact = worker.execute(id, &task).await.unwrap().artifact.unwrap();
        let text = String::from_utf8(artifact.bytes).unwrap();
        assert!(text.contains("&lt;Script&gt; Ltd"));
        assert!(!text.contains("<table>"));
    }

    #[tokio::test]
    async fn pdf_is_unsupported_locally() {
        let reports = Arc::new(TestReports::default());
        let id = reports.insert("Acme", &[("governance", 70.0)]);
        let worker = LocalExportWorker::new(reports);

        let task = WorkTask::Export(ExportOptions {
            format: ExportFormat::Pdf,
            report_type: ReportType::Full,
        });
        let err = worker.execute(id, &task).await.unwrap_err();
        assert!(matches!(err, WorkError::Unsupported(_)));
    }

    #[tokio::test]
    async fn workers_reject_foreign_tasks() {
        let reports = Arc::new(TestReports::default());
        let id = reports.insert("Acme", &[("governance", 70.0)]);
        let worker = LocalExportWorker::new(reports);

        let err = worker.execute(id, &regenerate_all()).await.unwrap_err();
        assert!(matches!(err, WorkError::Unsupported(_)));
    }

    #[test]
    fn slug_collapses_punctuation() {
        assert_eq!(slug("  Foo -- Bar!! "), "foo-bar");
        assert_eq!(slug("***"), "report");
    }
}
