//! Per-operator state carried through one conversion run.

use anyhow::{Result, bail};
use chrono::Datelike;
use std::fmt;

use crate::gtfs::{AgencyRecord, FeedInfoRecord};
use crate::services::operator_directory::Operator;

/// Version label of a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedVersion {
    /// Token before the first `_` of `feed_info.feed_version`.
    Declared(String),
    /// No usable `feed_info.txt`; stamped with the year of the run.
    Undated { year: i32 },
}

impl FeedVersion {
    pub fn from_feed_info(info: Option<&FeedInfoRecord>) -> Self {
        let token = info
            .and_then(|i| i.feed_version.as_deref())
            .and_then(|v| v.split('_').next())
            .map(str::trim)
            .filter(|t| !t.is_empty());

        match token {
            Some(t) => FeedVersion::Declared(t.to_string()),
            None => FeedVersion::Undated {
                year: chrono::Local::now().year(),
            },
        }
    }
}

impl fmt::Display for FeedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedVersion::Declared(v) => f.write_str(v),
            FeedVersion::Undated { year } => write!(f, "{year}(no date info.)"),
        }
    }
}

/// Everything the pipeline stages need to know about the operator being converted.
#[derive(Debug, Clone)]
pub struct OperatorContext {
    pub operator: Operator,
    pub feed_version: FeedVersion,
}

impl OperatorContext {
    /// Binds a parsed feed to the directory entry it was fetched for.
    ///
    /// # Errors
    ///
    /// Fails when the feed declares a different agency than `operator`, so that
    /// features are never stamped with another operator's names.
    pub fn for_feed(
        operator: &Operator,
        agency: &AgencyRecord,
        feed_version: FeedVersion,
    ) -> Result<Self> {
        if agency.agency_name != operator.id {
            bail!(
                "feed declares agency {:?} but was fetched for operator {:?}",
                agency.agency_name,
                operator.id
            );
        }
        Ok(Self {
            operator: operator.clone(),
            feed_version,
        })
    }

    pub fn agency_name(&self) -> &str {
        &self.operator.name
    }

    pub fn agency_name_en(&self) -> &str {
        &self.operator.name_en
    }
}
