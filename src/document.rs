//! Assembles and renders the per-operator GeoJSON document.

use anyhow::Result;
use geojson::{Feature, FeatureCollection};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;

/// Wraps `features` into a collection, keeping their order.
pub fn assemble(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Renders the collection as UTF-8 JSON with sorted keys and 4-space indentation.
pub fn to_pretty_json(collection: &FeatureCollection) -> Result<Vec<u8>> {
    // Going through `Value` sorts every object's keys.
    let value = serde_json::to_value(collection)?;

    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geojson::{Geometry, JsonObject, Value};

    fn point(name: &str, lon: f64, lat: f64) -> Feature {
        let mut properties = JsonObject::new();
        properties.insert("name".into(), name.into());
        properties.insert("bus".into(), "yes".into());
        Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Point(vec![lon, lat]))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }

    #[test]
    fn test_assemble_keeps_order_and_duplicates() {
        let features = vec![
            point("b", 132.5, 34.2),
            point("a", 132.4, 34.1),
            point("b", 132.5, 34.2),
        ];
        let collection = assemble(features.clone());

        assert_eq!(collection.features, features);
    }

    #[test]
    fn test_empty_collection() {
        let json = to_pretty_json(&assemble(vec![])).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();

        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"].as_array().map(Vec::len), Some(0));
    }

    #[test]
    fn test_rendering_is_readable_utf8() {
        let json = to_pretty_json(&assemble(vec![point("中央駅", 132.4, 34.1)])).unwrap();
        let text = String::from_utf8(json).unwrap();

        assert!(text.contains("中央駅"));
        assert!(text.contains("\n    \"features\": ["));
        assert!(text.contains("132.4"));
        assert!(text.contains("34.1"));

        let bus = text.find("\"bus\"").unwrap();
        let name = text.find("\"name\"").unwrap();
        assert!(bus < name);
        let features = text.find("\"features\"").unwrap();
        let kind = text.rfind("\"type\": \"FeatureCollection\"").unwrap();
        assert!(features < kind);
    }

    #[test]
    fn test_rendering_is_byte_identical_across_runs() {
        let render = || to_pretty_json(&assemble(vec![point("a", 132.4, 34.1)])).unwrap();
        assert_eq!(render(), render());
    }
}
