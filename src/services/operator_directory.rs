//! Trait and types for the directory of transit operators to convert.

use anyhow::Result;
use serde::Deserialize;

/// One transit operator whose feed is converted.
///
/// The identifier must equal the `agency_name` the operator's own feed
/// declares in `agency.txt`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Operator {
    #[serde(rename = "operator_id")]
    pub id: String,
    /// Display name in the primary language.
    #[serde(rename = "operator")]
    pub name: String,
    /// Display name in the reference language; also names the output file.
    #[serde(rename = "operator:en")]
    pub name_en: String,
    /// Location of the GTFS archive (URL or local path).
    pub url: String,
}

impl Operator {
    /// File name of the operator's output document.
    pub fn document_file_name(&self) -> String {
        format!("{}.geojson", self.name_en.replace(' ', "_"))
    }
}

/// Abstraction over where the operator list comes from.
#[async_trait::async_trait]
pub trait OperatorDirectory {
    /// Returns all operators in directory order.
    async fn list_operators(&self) -> Result<Vec<Operator>>;
}

/// Returns the operator whose identifier equals `id` exactly.
pub fn find_operator<'a>(operators: &'a [Operator], id: &str) -> Option<&'a Operator> {
    operators.iter().find(|o| o.id == id)
}
