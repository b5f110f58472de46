//! Builds one GeoJSON point feature per stop.

use geojson::{Feature, Geometry, JsonObject, JsonValue, Value};
use std::collections::{BTreeMap, HashMap};

use crate::context::OperatorContext;
use crate::gtfs::RawStop;
use crate::localize::JoinedRow;

pub const STOP_ID_KEY: &str = "gtfs:stop_id";
pub const NAME_KEY: &str = "name";

/// Tags marking every feature as a bus platform.
const PLATFORM_TAGS: &[(&str, &str)] = &[
    ("bus", "yes"),
    ("highway", "bus_stop"),
    ("public_transport", "platform"),
];

/// Identity of a logical stop: id, name and exact coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct StopKey<'a> {
    stop_id: &'a str,
    stop_name: &'a str,
    lat_bits: u64,
    lon_bits: u64,
}

impl<'a> StopKey<'a> {
    fn of(stop: &'a RawStop) -> Self {
        Self {
            stop_id: &stop.stop_id,
            stop_name: &stop.stop_name,
            lat_bits: stop.stop_lat.to_bits(),
            lon_bits: stop.stop_lon.to_bits(),
        }
    }
}

/// All joined rows of one logical stop, reduced to one text per language.
#[derive(Debug, Clone)]
pub struct StopGroup<'a> {
    pub stop: &'a RawStop,
    /// Language code to translated name.
    pub names: BTreeMap<&'a str, &'a str>,
}

/// Partitions stops and their joined rows by stop identity.
///
/// Every stop yields a group, translated or not; stops repeated verbatim in
/// the table collapse into one. When a group sees the same language twice,
/// the row that comes later in `rows` wins, which for [`crate::localize::join_translations`]
/// output means the later row of `translations.txt`.
///
/// Groups are returned in first-seen order.
pub fn group_stops<'a>(stops: &'a [RawStop], rows: &[JoinedRow<'a>]) -> Vec<StopGroup<'a>> {
    let mut index: HashMap<StopKey<'a>, usize> = HashMap::new();
    let mut groups: Vec<StopGroup<'a>> = Vec::new();

    let mut slot = |stop: &'a RawStop, groups: &mut Vec<StopGroup<'a>>| -> usize {
        *index.entry(StopKey::of(stop)).or_insert_with(|| {
            groups.push(StopGroup {
                stop,
                names: BTreeMap::new(),
            });
            groups.len() - 1
        })
    };

    for stop in stops {
        slot(stop, &mut groups);
    }

    for row in rows {
        let i = slot(row.stop, &mut groups);
        groups[i].names.insert(row.language(), row.text());
    }

    groups
}

/// Renders one stop group as a point feature.
pub fn build_feature(ctx: &OperatorContext, group: &StopGroup<'_>) -> Feature {
    let stop = group.stop;

    let mut properties = JsonObject::new();
    properties.insert("agency_name".into(), ctx.agency_name().into());
    properties.insert("agency_name:en".into(), ctx.agency_name_en().into());
    for (key, value) in PLATFORM_TAGS {
        properties.insert((*key).into(), (*value).into());
    }
    properties.insert(STOP_ID_KEY.into(), stop.stop_id.replace('_', " ").into());
    properties.insert(NAME_KEY.into(), stop.stop_name.as_str().into());

    for (lang, text) in &group.names {
        properties.insert(format!("name:{lang}"), JsonValue::from(*text));
    }

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Point(vec![stop.stop_lon, stop.stop_lat]))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Groups the joined rows by stop and emits one feature per group.
pub fn build_features(
    ctx: &OperatorContext,
    stops: &[RawStop],
    rows: &[JoinedRow<'_>],
) -> Vec<Feature> {
    group_stops(stops, rows)
        .iter()
        .map(|group| build_feature(ctx, group))
        .collect()
}
