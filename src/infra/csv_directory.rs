use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use crate::parser::require_columns;
use crate::services::operator_directory::{Operator, OperatorDirectory};

const COLUMNS: &[&str] = &["operator_id", "operator", "operator:en", "url"];

/// Reads the operator list from a CSV file on disk.
///
/// ```text
/// operator_id,operator,operator:en,url
/// 広島電鉄,広島電鉄,Hiroshima Electric Railway,https://example.com/hiroden.zip
/// ```
pub struct CsvOperatorDirectory {
    path: PathBuf,
}

impl CsvOperatorDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read(&self) -> Result<Vec<Operator>> {
        let shown = self.path.display().to_string();
        let mut rdr = csv::Reader::from_path(&self.path)
            .with_context(|| format!("failed to open operator directory {shown}"))?;

        require_columns(rdr.headers()?, COLUMNS)
            .with_context(|| format!("operator directory {shown}"))?;

        let operators = rdr
            .deserialize()
            .collect::<Result<Vec<Operator>, _>>()
            .with_context(|| format!("malformed row in operator directory {shown}"))?;

        debug!(path = %shown, count = operators.len(), "Operator directory loaded");
        Ok(operators)
    }
}

#[async_trait]
impl OperatorDirectory for CsvOperatorDirectory {
    async fn list_operators(&self) -> Result<Vec<Operator>> {
        self.read()
    }
}
