//! Joins stops to the translations of their names.

use std::collections::HashMap;

use crate::gtfs::{RawStop, RawTranslation};

/// One (stop, language, translated text) triple.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoinedRow<'a> {
    pub stop: &'a RawStop,
    pub translation: &'a RawTranslation,
}

impl<'a> JoinedRow<'a> {
    pub fn language(&self) -> &'a str {
        &self.translation.lang
    }

    pub fn text(&self) -> &'a str {
        &self.translation.translation
    }
}

/// Inner join of `stops` and `translations` on `stop_name == trans_id`.
///
/// The key is the stop's display text, not its identifier: distinct stops
/// that share a name all receive that name's translations. A stop whose name
/// has no translation produces no rows.
///
/// Rows come out in stop order, and for each stop in translation load order.
pub fn join_translations<'a>(
    stops: &'a [RawStop],
    translations: &'a [RawTranslation],
) -> Vec<JoinedRow<'a>> {
    let mut by_key: HashMap<&str, Vec<&RawTranslation>> = HashMap::new();
    for t in translations {
        by_key.entry(t.trans_id.as_str()).or_default().push(t);
    }

    stops
        .iter()
        .flat_map(|stop| {
            by_key
                .get(stop.stop_name.as_str())
                .into_iter()
                .flatten()
                .copied()
                .map(move |translation| JoinedRow { stop, translation })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(id: &str, name: &str) -> RawStop {
        RawStop {
            stop_id: id.to_string(),
            stop_name: name.to_string(),
            stop_lat: 34.1,
            stop_lon: 132.4,
        }
    }

    #[test]
    fn test_shared_name_fans_out() {
        let stops: Vec<_> = (0..3).map(|i| stop(&format!("ST_{i}"), "Central")).collect();
        let translations = vec![
            RawTranslation::new("Central", "en", "Central Station"),
            RawTranslation::new("Central", "ja", "中央駅"),
            RawTranslation::new("Central", "ko", "중앙역"),
            RawTranslation::new("Harbor", "en", "Harbor"),
        ];

        let rows = join_translations(&stops, &translations);
        assert_eq!(rows.len(), 3 * 3);

        for s in &stops {
            let mut langs: Vec<(&str, &str)> = rows
                .iter()
                .filter(|r| r.stop.stop_id == s.stop_id)
                .map(|r| (r.language(), r.text()))
                .collect();
            langs.sort();
            assert_eq!(
                langs,
                vec![("en", "Central Station"), ("ja", "中央駅"), ("ko", "중앙역")]
            );
        }
    }

    #[test]
    fn test_key_is_exact_name_not_id() {
        let stops = vec![stop("Central", "Central "), stop("ST_2", "central")];
        let translations = vec![RawTranslation::new("Central", "en", "Central Station")];

        assert!(join_translations(&stops, &translations).is_empty());
    }

    #[test]
    fn test_no_translations_no_rows() {
        let stops = vec![stop("ST_1", "Central")];
        assert!(join_translations(&stops, &[]).is_empty());
    }

    #[test]
    fn test_rows_follow_translation_load_order() {
        let stops = vec![stop("ST_1", "Central")];
        let translations = vec![
            RawTranslation::new("Central", "en", "First"),
            RawTranslation::new("Central", "en", "Second"),
        ];

        let texts: Vec<_> = join_translations(&stops, &translations)
            .iter()
            .map(|r| r.text())
            .collect();
        assert_eq!(texts, vec!["First", "Second"]);
    }
}
