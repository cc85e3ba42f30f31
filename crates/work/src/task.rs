//! Kind-specific task descriptions handed to a [`crate::WorkExecutor`].

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use assessly_core::DomainError;

/// Target file format of a single exported report.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Markdown,
    Html,
    Json,
    Csv,
    Pdf,
    Docx,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "markdown",
            ExportFormat::Html => "html",
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Docx => "docx",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            other => other.as_str(),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "text/markdown; charset=utf-8",
            ExportFormat::Html => "text/html; charset=utf-8",
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }
}

impl FromStr for ExportFormat {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "html" => Ok(ExportFormat::Html),
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "pdf" => Ok(ExportFormat::Pdf),
            "docx" => Ok(ExportFormat::Docx),
            other => Err(DomainError::validation(format!(
                "unknown export format '{other}' (expected one of: markdown, html, json, csv, pdf, docx)"
            ))),
        }
    }
}

/// Which rendition of a report to export.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    /// Every scored criterion plus the latest analysis.
    Full,
    /// Headline score and summary only.
    OnePager,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Full => "full",
            ReportType::OnePager => "one_pager",
        }
    }
}

impl FromStr for ReportType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "full" => Ok(ReportType::Full),
            "one_pager" | "onepager" => Ok(ReportType::OnePager),
            other => Err(DomainError::validation(format!(
                "unknown report type '{other}' (expected one of: full, one_pager)"
            ))),
        }
    }
}

/// Options for regenerating a report's AI analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegenerateOptions {
    /// Criteria to take into account; `None` means every scored criterion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<String>>,
}

/// Options for rendering one report into a file.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    pub format: ExportFormat,
    pub report_type: ReportType,
}

/// What a worker is asked to do for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum WorkTask {
    Regenerate(RegenerateOptions),
    Export(ExportOptions),
}

impl WorkTask {
    pub fn name(&self) -> &'static str {
        match self {
            WorkTask::Regenerate(_) => "regenerate",
            WorkTask::Export(_) => "export",
        }
    }
}
