//! Per-operator driver: load, join, build, assemble, write.

use anyhow::{Result, anyhow};
use bytes::Bytes;
use geojson::FeatureCollection;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::context::{FeedVersion, OperatorContext};
use crate::document::{assemble, to_pretty_json};
use crate::features::build_features;
use crate::fetch::{HttpClient, load_source};
use crate::gtfs::FeedTables;
use crate::localize::join_translations;
use crate::output::{upload_document, write_document};
use crate::parser::parse_feed;
use crate::services::operator_directory::{Operator, find_operator};
use crate::stats::{ConversionReport, FailureKind};

/// S3 destination for generated documents.
#[derive(Clone)]
pub struct S3Target {
    pub client: aws_sdk_s3::Client,
    pub bucket: String,
    pub gzip: bool,
}

/// Where finished documents are written.
#[derive(Clone)]
pub struct OutputSettings {
    pub output_dir: PathBuf,
    pub s3: Option<S3Target>,
}

impl OutputSettings {
    pub fn local(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            s3: None,
        }
    }
}

/// Runs the join, build and assemble stages over one feed's tables.
pub fn convert(ctx: &OperatorContext, tables: &FeedTables) -> FeatureCollection {
    let rows = join_translations(&tables.stops, &tables.translations);
    let features = build_features(ctx, &tables.stops, &rows);
    assemble(features)
}

/// Binds parsed tables to the operator they were fetched for.
pub fn bind_operator(operator: &Operator, tables: &FeedTables) -> Result<OperatorContext> {
    let version = FeedVersion::from_feed_info(tables.feed_info.as_ref());
    OperatorContext::for_feed(operator, &tables.agency, version)
}

/// Binds parsed tables to the directory entry named by the feed's own agency.
pub fn resolve_operator(operators: &[Operator], tables: &FeedTables) -> Result<OperatorContext> {
    let agency = &tables.agency.agency_name;
    let operator = find_operator(operators, agency)
        .ok_or_else(|| anyhow!("agency {agency:?} has no entry in the operator directory"))?;
    bind_operator(operator, tables)
}

/// Converts one operator end to end.
///
/// Never fails: every problem is logged and recorded in the returned report
/// so that the caller can move on to the next operator.
#[tracing::instrument(
    skip_all,
    fields(operator_id = %operator.id, operator = %operator.name_en)
)]
pub async fn process_operator<C: HttpClient>(
    client: &C,
    operator: &Operator,
    settings: &OutputSettings,
) -> ConversionReport {
    let fail = |kind: FailureKind, e: anyhow::Error| {
        error!(error = %format!("{e:#}"), kind = kind.as_str(), "Operator conversion failed");
        ConversionReport::from_error(kind, &format!("{e:#}"))
            .with_operator_info(&operator.id, &operator.name_en)
    };

    let bytes = match load_source(client, &operator.url).await {
        Ok(bytes) => bytes,
        Err(e) => return fail(FailureKind::Fetch, e),
    };

    let tables = match parse(bytes).await {
        Ok(tables) => tables,
        Err(e) => return fail(FailureKind::Parse, e),
    };

    let ctx = match bind_operator(operator, &tables) {
        Ok(ctx) => ctx,
        Err(e) => return fail(FailureKind::AgencyMismatch, e),
    };

    let report = ConversionReport::from_tables(&tables).with_context(&ctx);
    match write(&ctx, &tables, settings, report).await {
        Ok(report) => {
            info!("{} -> {}", operator.url, ctx.operator.document_file_name());
            report
        }
        Err(e) => {
            let mut report = fail(FailureKind::Write, e);
            report.feed_version = Some(ctx.feed_version.to_string());
            report
        }
    }
}

/// Parses an archive off the async runtime's worker threads.
pub async fn parse(bytes: Bytes) -> Result<FeedTables> {
    tokio::task::spawn_blocking(move || parse_feed(bytes)).await?
}

/// Converts, renders and stores one operator's document, filling in the report.
pub async fn write(
    ctx: &OperatorContext,
    tables: &FeedTables,
    settings: &OutputSettings,
    mut report: ConversionReport,
) -> Result<ConversionReport> {
    if matches!(ctx.feed_version, FeedVersion::Undated { .. }) {
        warn!(version = %ctx.feed_version, "Feed has no usable feed_info.txt");
    } else {
        info!(version = %ctx.feed_version, "Feed version");
    }

    let collection = convert(ctx, tables);
    summarize(&collection, &mut report);

    let file_name = ctx.operator.document_file_name();
    let contents = to_pretty_json(&collection)?;
    let path = write_document(&settings.output_dir, &file_name, &contents)?;

    if let Some(s3) = &settings.s3 {
        upload_document(&s3.client, &s3.bucket, &file_name, &contents, s3.gzip).await?;
    }

    info!(
        features = report.features,
        translated_pct = report.translated_pct(),
        languages = report.languages,
        "Document complete"
    );
    report.output_file = Some(path.display().to_string());
    Ok(report)
}

fn summarize(collection: &FeatureCollection, report: &mut ConversionReport) {
    let mut languages = BTreeSet::new();
    let mut translated = 0;

    for feature in &collection.features {
        let mut has_name = false;
        for key in feature.properties.iter().flat_map(|p| p.keys()) {
            if let Some(lang) = key.strip_prefix("name:") {
                languages.insert(lang.to_string());
                has_name = true;
            }
        }
        if has_name {
            translated += 1;
        }
    }

    report.features = collection.features.len();
    report.translated_features = translated;
    report.languages = languages.len();
}
