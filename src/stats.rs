use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::context::OperatorContext;
use crate::gtfs::FeedTables;

/// Stage at which a conversion failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Fetch,
    Parse,
    AgencyMismatch,
    Write,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Fetch => "fetch_error",
            FailureKind::Parse => "parse_error",
            FailureKind::AgencyMismatch => "agency_mismatch",
            FailureKind::Write => "write_error",
        }
    }
}

/// Outcome of converting one operator's feed; one row of the run report.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ConversionReport {
    pub timestamp: DateTime<Utc>,
    pub operator_id: Option<String>,
    pub operator_name_en: Option<String>,
    pub feed_version: Option<String>,
    pub output_file: Option<String>,

    // feed tables
    pub stops: usize,
    pub translations: usize,

    // output
    pub features: usize,
    pub translated_features: usize,
    pub languages: usize,

    // error tracking
    pub error_type: Option<String>,
    pub error_message: Option<String>,
}

impl ConversionReport {
    pub fn from_tables(tables: &FeedTables) -> Self {
        ConversionReport {
            timestamp: Utc::now(),
            stops: tables.stops.len(),
            translations: tables.translations.len(),
            ..Default::default()
        }
    }

    /// Create an error record with timestamp and error information
    pub fn from_error(kind: FailureKind, error_message: &str) -> Self {
        ConversionReport {
            timestamp: Utc::now(),
            error_type: Some(kind.as_str().to_string()),
            error_message: Some(error_message.to_string()),
            ..Default::default()
        }
    }

    /// Set operator metadata (id and reference-language name)
    pub fn with_operator_info(mut self, operator_id: &str, operator_name_en: &str) -> Self {
        self.operator_id = Some(operator_id.to_string());
        self.operator_name_en = Some(operator_name_en.to_string());
        self
    }

    pub fn with_context(self, ctx: &OperatorContext) -> Self {
        let mut s = self.with_operator_info(&ctx.operator.id, &ctx.operator.name_en);
        s.feed_version = Some(ctx.feed_version.to_string());
        s
    }

    pub fn is_error(&self) -> bool {
        self.error_type.is_some()
    }

    /// Turns a failed row back into an error, for callers that must exit non-zero.
    pub fn ensure_success(&self) -> Result<()> {
        if let Some(kind) = &self.error_type {
            bail!(
                "{kind}: {}",
                self.error_message.as_deref().unwrap_or("conversion failed")
            );
        }
        Ok(())
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn translated_pct(&self) -> f64 {
        Self::pct(self.translated_features, self.features)
    }
}
