//! Single-pass aggregation of run records into chart and summary data.
//!
//! One forward scan over the fetched documents produces the per-day
//! histogram, the newest/oldest run, the highest version number, and the
//! derived core counts. The result is a plain value recomputed in full on
//! every fetch; nothing here carries state between calls.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::models::RunRecord;

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("malformed record at index {index}: {reason}")]
    MalformedRecord { index: usize, reason: String },
}

/// What to do with a document that fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordPolicy {
    /// Skip the record, log a warning, and count it in `skipped`.
    #[default]
    Tolerant,
    /// Abort the whole aggregation with `MalformedRecord`.
    Strict,
}

/// How stripped version numbers are ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionOrdering {
    /// Plain string comparison: "2.1.0" outranks "10.0.0". This matches the
    /// system this service replaced and stays the default so existing
    /// consumers see identical output.
    #[default]
    Lexicographic,
    /// Dotted-number comparison; unparseable components rank as zero.
    Numeric,
}

impl VersionOrdering {
    fn beats(self, candidate: &str, current: &str) -> bool {
        match self {
            VersionOrdering::Lexicographic => candidate > current,
            VersionOrdering::Numeric => numeric_key(candidate) > numeric_key(current),
        }
    }
}

fn numeric_key(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|part| part.trim().parse().unwrap_or(0))
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateOptions {
    pub policy: RecordPolicy,
    pub version_ordering: VersionOrdering,
}

/// Runs-per-day histogram as parallel label/count arrays.
///
/// Labels appear in first-seen order from the input scan, and position i of
/// `counts` is always the count for position i of `labels`; the chart on the
/// other end pairs the two arrays by index.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DailyHistogram {
    pub labels: Vec<String>,
    pub counts: Vec<u64>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl DailyHistogram {
    fn bump(&mut self, day_key: &str) {
        match self.index.get(day_key) {
            Some(&i) => self.counts[i] += 1,
            None => {
                self.index.insert(day_key.to_string(), self.labels.len());
                self.labels.push(day_key.to_string());
                self.counts.push(1);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn count_for(&self, label: &str) -> Option<u64> {
        self.index.get(label).map(|&i| self.counts[i])
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// The identifying facts the summary cards show for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunFacts {
    pub objid: String,
    pub domain: String,
    #[serde(rename = "coreCount")]
    pub core_count: u64,
    pub globalid: String,
}

impl RunFacts {
    fn of(record: &RunRecord) -> Self {
        Self {
            objid: record.id.clone(),
            domain: record.domain.clone(),
            core_count: record.core_count,
            globalid: record.global_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSummary {
    /// Number of input records, including any skipped as malformed.
    pub total_runs: usize,
    pub newest_version: String,
    /// `total_runs / window_days`; the divisor is the caller-selected window,
    /// not the span the data actually covers.
    pub average_runs_per_day: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_run: Option<RunFacts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_run: Option<RunFacts>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateResult {
    pub histogram: DailyHistogram,
    pub summary: AggregateSummary,
    /// Records dropped under the tolerant policy.
    pub skipped: usize,
}

/// Aggregates one window of raw documents.
///
/// `window_days` is the caller-selected lookback and must be positive; it is
/// deliberately not validated against the dates present in `docs`. Empty
/// input is not an error: the summary degrades to zeros and `None`.
pub fn aggregate(
    docs: &[Value],
    window_days: u32,
    options: AggregateOptions,
) -> Result<AggregateResult, AggregateError> {
    let total_runs = docs.len();
    let mut histogram = DailyHistogram::default();
    let mut newest_version = String::from("0.0.0");
    let mut skipped = 0usize;

    // Newest/oldest scan state, seeded by the first valid record.
    let mut newest: Option<(String, RunFacts)> = None;
    let mut oldest: Option<(String, RunFacts)> = None;

    for (index, doc) in docs.iter().enumerate() {
        let record = match RunRecord::from_doc(doc) {
            Ok(record) => record,
            Err(reason) => match options.policy {
                RecordPolicy::Strict => {
                    return Err(AggregateError::MalformedRecord { index, reason })
                }
                RecordPolicy::Tolerant => {
                    warn!(index, %reason, "skipping malformed run record");
                    skipped += 1;
                    continue;
                }
            },
        };

        histogram.bump(&record.day_key);

        if options
            .version_ordering
            .beats(&record.version, &newest_version)
        {
            newest_version = record.version.clone();
        }

        // Non-strict comparisons on the raw date string: on equal dates the
        // record seen later in the scan takes both slots.
        let replace_newest = match &newest {
            Some((date, _)) => record.run_date >= *date,
            None => true,
        };
        if replace_newest {
            newest = Some((record.run_date.clone(), RunFacts::of(&record)));
        }

        let replace_oldest = match &oldest {
            Some((date, _)) => record.run_date <= *date,
            None => true,
        };
        if replace_oldest {
            oldest = Some((record.run_date.clone(), RunFacts::of(&record)));
        }
    }

    let summary = AggregateSummary {
        total_runs,
        newest_version,
        average_runs_per_day: total_runs as f64 / f64::from(window_days),
        newest_run: newest.map(|(_, facts)| facts),
        oldest_run: oldest.map(|(_, facts)| facts),
    };

    Ok(AggregateResult {
        histogram,
        summary,
        skipped,
    })
}
