//! Typed rows of the GTFS tables the converter reads.

use serde::{Deserialize, Deserializer};

/// First row of `agency.txt`.
#[derive(Debug, Clone, Deserialize)]
pub struct AgencyRecord {
    pub agency_name: String,
}

/// A row of `stops.txt` with usable coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStop {
    pub stop_id: String,
    pub stop_name: String,
    pub stop_lat: f64,
    pub stop_lon: f64,
}

/// `stops.txt` as declared; coordinates may be blank for nodes without a position.
#[derive(Debug, Deserialize)]
pub(crate) struct StopRow {
    pub stop_id: String,
    #[serde(default)]
    pub stop_name: String,
    #[serde(deserialize_with = "optional_coordinate")]
    pub stop_lat: Option<f64>,
    #[serde(deserialize_with = "optional_coordinate")]
    pub stop_lon: Option<f64>,
}

impl StopRow {
    pub(crate) fn into_stop(self) -> Option<RawStop> {
        Some(RawStop {
            stop_id: self.stop_id,
            stop_name: self.stop_name,
            stop_lat: self.stop_lat?,
            stop_lon: self.stop_lon?,
        })
    }
}

/// A row of `translations.txt`.
///
/// Accepts both the GTFS-JP layout (`trans_id`, `lang`) and the current GTFS
/// layout (`field_value`, `language`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawTranslation {
    /// Text the translation applies to; matched against stop names.
    #[serde(alias = "field_value", default)]
    pub trans_id: String,
    #[serde(alias = "language")]
    pub lang: String,
    pub translation: String,
    #[serde(default)]
    pub field_name: Option<String>,
}

impl RawTranslation {
    pub fn new(trans_id: &str, lang: &str, translation: &str) -> Self {
        Self {
            trans_id: trans_id.to_string(),
            lang: lang.to_string(),
            translation: translation.to_string(),
            field_name: None,
        }
    }

    /// Whether the row can translate a stop name.
    pub(crate) fn applies_to_stop_names(&self) -> bool {
        if self.trans_id.is_empty() {
            return false;
        }
        match self.field_name.as_deref() {
            None | Some("") | Some("stop_name") => true,
            Some(_) => false,
        }
    }
}

/// First row of `feed_info.txt`.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedInfoRecord {
    #[serde(default)]
    pub feed_version: Option<String>,
}

/// Every table the converter needs from one feed archive.
#[derive(Debug, Clone)]
pub struct FeedTables {
    pub agency: AgencyRecord,
    pub stops: Vec<RawStop>,
    /// Empty when the archive has no `translations.txt`.
    pub translations: Vec<RawTranslation>,
    pub feed_info: Option<FeedInfoRecord>,
}

fn optional_coordinate<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    s.parse::<f64>().map(Some).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_row_without_coordinates_is_dropped() {
        let row = StopRow {
            stop_id: "node_1".to_string(),
            stop_name: String::new(),
            stop_lat: None,
            stop_lon: Some(132.4),
        };
        assert!(row.into_stop().is_none());
    }

    #[test]
    fn test_translation_filtering() {
        assert!(RawTranslation::new("Central", "en", "Central Station").applies_to_stop_names());
        assert!(!RawTranslation::new("", "en", "Orphan").applies_to_stop_names());

        let mut headsign = RawTranslation::new("Central", "en", "For Central");
        headsign.field_name = Some("trip_headsign".to_string());
        assert!(!headsign.applies_to_stop_names());

        headsign.field_name = Some("stop_name".to_string());
        assert!(headsign.applies_to_stop_names());
    }
}
