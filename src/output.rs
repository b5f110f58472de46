//! Persistence of generated documents and conversion reports.
//!
//! Documents go to a local directory and optionally to S3; reports are
//! appended to a CSV file.

use anyhow::{Context, Result};
use aws_sdk_s3::primitives::ByteStream;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::stats::ConversionReport;
use csv::WriterBuilder;

/// Writes `contents` to `<dir>/<file_name>`, creating `dir` if needed.
pub fn write_document(dir: &Path, file_name: &str, contents: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;

    let path = dir.join(file_name);
    fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))?;
    debug!(path = %path.display(), bytes = contents.len(), "Document written");
    Ok(path)
}

/// Where a document is stored in S3 and what body is uploaded.
pub fn s3_object(file_name: &str, contents: &[u8], gzip: bool) -> Result<(String, Vec<u8>)> {
    if gzip {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(contents)?;
        Ok((format!("geojson/{file_name}.gz"), encoder.finish()?))
    } else {
        Ok((format!("geojson/{file_name}"), contents.to_vec()))
    }
}

/// Uploads a document to `bucket` under `geojson/`, optionally gzip-compressed.
#[tracing::instrument(skip(client, contents))]
pub async fn upload_document(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    file_name: &str,
    contents: &[u8],
    gzip: bool,
) -> Result<()> {
    let (key, body) = s3_object(file_name, contents, gzip)?;

    let mut req = client
        .put_object()
        .bucket(bucket)
        .key(&key)
        .content_type("application/geo+json")
        .body(ByteStream::from(body));
    if gzip {
        req = req.content_encoding("gzip");
    }
    req.send()
        .await
        .with_context(|| format!("failed to upload s3://{bucket}/{key}"))?;

    info!(key = %key, "Document uploaded");
    Ok(())
}

/// Appends a [`ConversionReport`] as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, report: &ConversionReport) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    writer.serialize(report)?;
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{ConversionReport, FailureKind};
    use flate2::read::GzDecoder;
    use std::env;
    use std::io::Read;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    #[test]
    fn test_write_document_creates_directory() {
        let dir = env::temp_dir().join("gtfs_stop_geojson_test_out").join("nested");
        let _ = fs::remove_dir_all(&dir);

        let path = write_document(&dir, "Geiyo_Bus.geojson", b"{}").unwrap();

        assert_eq!(path, dir.join("Geiyo_Bus.geojson"));
        assert_eq!(fs::read(&path).unwrap(), b"{}");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_s3_object_plain_and_gzip() {
        let (key, body) = s3_object("Geiyo_Bus.geojson", b"{\"a\":1}", false).unwrap();
        assert_eq!(key, "geojson/Geiyo_Bus.geojson");
        assert_eq!(body, b"{\"a\":1}");

        let (key, body) = s3_object("Geiyo_Bus.geojson", b"{\"a\":1}", true).unwrap();
        assert_eq!(key, "geojson/Geiyo_Bus.geojson.gz");
        let mut decoded = String::new();
        GzDecoder::new(&body[..]).read_to_string(&mut decoded).unwrap();
        assert_eq!(decoded, "{\"a\":1}");
    }

    #[test]
    fn test_append_record_writes_header_once() {
        let path = temp_path("gtfs_stop_geojson_test_header.csv");
        let _ = fs::remove_file(&path);

        let report = ConversionReport::default();
        append_record(&path, &report).unwrap();
        append_record(&path, &report).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let header_count = content.lines().filter(|l| l.contains("timestamp")).count();
        assert_eq!(header_count, 1);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_record_mixed_rows() {
        let path = temp_path("gtfs_stop_geojson_test_rows.csv");
        let _ = fs::remove_file(&path);

        append_record(&path, &ConversionReport::default()).unwrap();
        append_record(
            &path,
            &ConversionReport::from_error(FailureKind::Parse, "missing column(s): stop_lon"),
        )
        .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[2].contains("parse_error"));

        fs::remove_file(&path).unwrap();
    }
}
