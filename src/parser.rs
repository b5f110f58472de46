//! ZIP archive parser for static GTFS feeds.

use anyhow::{Context, Result, anyhow, bail};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::io::{Cursor, Read, Seek};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::gtfs::{AgencyRecord, FeedInfoRecord, FeedTables, RawTranslation, StopRow};

const AGENCY: &str = "agency.txt";
const STOPS: &str = "stops.txt";
const TRANSLATIONS: &str = "translations.txt";
const FEED_INFO: &str = "feed_info.txt";

const AGENCY_COLUMNS: &[&str] = &["agency_name"];
const STOP_COLUMNS: &[&str] = &["stop_id", "stop_name", "stop_lat", "stop_lon"];
const TRANSLATION_COLUMNS: &[&str] = &["trans_id|field_value", "lang|language", "translation"];

/// Decodes a GTFS ZIP archive into the tables the converter uses.
///
/// # Errors
///
/// Returns an error if the bytes are not a ZIP archive, if `agency.txt` or
/// `stops.txt` is missing, or if a present table lacks an expected column.
/// A missing `translations.txt` or `feed_info.txt` is not an error.
pub fn parse_feed(bytes: Bytes) -> Result<FeedTables> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).context("not a ZIP archive")?;

    let agency = read_table::<_, AgencyRecord>(&mut archive, AGENCY, AGENCY_COLUMNS)?
        .ok_or_else(|| anyhow!("{AGENCY} not found in archive"))?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("{AGENCY} has no rows"))?;

    let stop_rows = read_table::<_, StopRow>(&mut archive, STOPS, STOP_COLUMNS)?
        .ok_or_else(|| anyhow!("{STOPS} not found in archive"))?;
    let declared = stop_rows.len();
    let stops: Vec<_> = stop_rows.into_iter().filter_map(StopRow::into_stop).collect();
    if stops.len() < declared {
        warn!(
            skipped = declared - stops.len(),
            "Stops without coordinates skipped"
        );
    }

    let translations: Vec<RawTranslation> =
        read_table::<_, RawTranslation>(&mut archive, TRANSLATIONS, TRANSLATION_COLUMNS)?
            .unwrap_or_default()
            .into_iter()
            .filter(RawTranslation::applies_to_stop_names)
            .collect();

    // feed_info.txt only feeds the version label, so any problem with it is tolerated.
    let feed_info = match read_table::<_, FeedInfoRecord>(&mut archive, FEED_INFO, &[]) {
        Ok(rows) => rows.and_then(|rows| rows.into_iter().next()),
        Err(e) => {
            warn!(error = %format!("{e:#}"), "Ignoring unreadable {FEED_INFO}");
            None
        }
    };

    debug!(
        agency = %agency.agency_name,
        stops = stops.len(),
        translations = translations.len(),
        "Feed parsed"
    );

    Ok(FeedTables {
        agency,
        stops,
        translations,
        feed_info,
    })
}

/// Checks that every expected column is present in `headers`.
///
/// An entry of the form `"a|b"` is satisfied by either column name.
pub(crate) fn require_columns(headers: &csv::StringRecord, columns: &[&str]) -> Result<()> {
    let missing: Vec<&str> = columns
        .iter()
        .copied()
        .filter(|column| !column.split('|').any(|name| headers.iter().any(|h| h == name)))
        .collect();

    if !missing.is_empty() {
        bail!("missing column(s): {}", missing.join(", "));
    }
    Ok(())
}

/// Reads every row of `name`, or `None` if the archive has no such table.
fn read_table<R, T>(
    archive: &mut ZipArchive<R>,
    name: &str,
    columns: &[&str],
) -> Result<Option<Vec<T>>>
where
    R: Read + Seek,
    T: DeserializeOwned,
{
    let Some(path) = locate(archive, name) else {
        return Ok(None);
    };

    let file = archive
        .by_name(&path)
        .with_context(|| format!("failed to open {path}"))?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(file);

    let headers = rdr
        .headers()
        .with_context(|| format!("failed to read header of {name}"))?
        .clone();
    require_columns(&headers, columns).with_context(|| format!("malformed {name}"))?;

    // Trailing empty fields are often dropped by feed exporters; treat them as empty.
    let mut rows = Vec::new();
    for record in rdr.records() {
        let mut record = record.with_context(|| format!("malformed row in {name}"))?;
        while record.len() < headers.len() {
            record.push_field("");
        }
        let row = record
            .deserialize(Some(&headers))
            .with_context(|| format!("malformed row in {name}"))?;
        rows.push(row);
    }

    Ok(Some(rows))
}

/// Finds `name` at the archive root or inside a single top-level folder.
fn locate<R: Read + Seek>(archive: &ZipArchive<R>, name: &str) -> Option<String> {
    if archive.file_names().any(|path| path == name) {
        return Some(name.to_string());
    }

    let suffix = format!("/{name}");
    archive
        .file_names()
        .filter(|path| path.ends_with(&suffix) && path.matches('/').count() == 1)
        .min()
        .map(str::to_string)
}
