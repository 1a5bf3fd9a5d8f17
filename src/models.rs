//! Configuration and the typed run-record schema.
//!
//! The document store is schemaless; every field the dashboard relies on is
//! pulled out of the raw JSON here, with an explicit validation step so a bad
//! document yields a reason instead of a panic downstream.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// Lookback windows the dashboard dropdown offers, in days.
pub const WINDOW_MENU: [u32; 5] = [1, 5, 10, 20, 30];

pub fn window_in_menu(days: u32) -> bool {
    WINDOW_MENU.contains(&days)
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub store_url: String,
    pub port: u16,
    pub default_window_days: u32,
    pub strict_records: bool,
    pub numeric_version_order: bool,
    pub fetch_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let store_url = std::env::var("STORE_URL")
            .unwrap_or_else(|_| "http://localhost:5000".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        let default_window_days = std::env::var("DEFAULT_WINDOW_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|d| window_in_menu(*d))
            .unwrap_or(30);

        let strict_records = std::env::var("STRICT_RECORDS")
            .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON"))
            .unwrap_or(false);

        let numeric_version_order = std::env::var("NUMERIC_VERSION_ORDER")
            .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON"))
            .unwrap_or(false);

        let fetch_timeout_secs = std::env::var("FETCH_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        Ok(Self {
            store_url,
            port,
            default_window_days,
            strict_records,
            numeric_version_order,
            fetch_timeout_secs,
        })
    }
}

/// Paths into the raw document. The store encodes dots inside key names as
/// `[dot]`, so the topology keys must be matched verbatim.
const VERSION_PATH: &str = "/pfmetadata/parflow/build/version";
const TOPOLOGY_DATA_PATH: &str = "/pfmetadata/inputs/configuration/data";
const TOPOLOGY_P: &str = "Process[dot]Topology[dot]P";
const TOPOLOGY_Q: &str = "Process[dot]Topology[dot]Q";
const TOPOLOGY_R: &str = "Process[dot]Topology[dot]R";

/// One validated simulation-run record.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub id: String,
    pub global_id: String,
    /// Raw timestamp as the store sent it; newest/oldest selection compares
    /// these strings directly.
    pub run_date: String,
    /// `run_date` truncated to its calendar day (`YYYY-MM-DD`), in the
    /// record's own timezone representation.
    pub day_key: String,
    pub domain: String,
    /// Version number stripped out of the `v<version>-<hash>` tag.
    pub version: String,
    /// Product of the P, Q, R topology dimensions.
    pub core_count: u64,
}

impl RunRecord {
    /// Validates one raw document. The reason string names the offending
    /// field so tolerant-mode logs stay actionable.
    pub fn from_doc(doc: &Value) -> Result<Self, String> {
        let id = scalar_string(doc.get("_id").ok_or("missing _id")?)
            .ok_or("_id is not a scalar id")?;
        let global_id = scalar_string(doc.get("globalid").ok_or("missing globalid")?)
            .ok_or("globalid is not a scalar id")?;

        let run_date = doc
            .get("run_date")
            .and_then(Value::as_str)
            .ok_or("missing run_date")?
            .to_string();
        let day_key = truncate_day(&run_date)?;

        let domain = doc
            .get("domain")
            .and_then(Value::as_str)
            .ok_or("missing domain")?
            .to_string();

        let tag = doc
            .pointer(VERSION_PATH)
            .and_then(Value::as_str)
            .ok_or("missing pfmetadata.parflow.build.version")?;
        let version = strip_version(tag)?;

        let data = doc
            .pointer(TOPOLOGY_DATA_PATH)
            .and_then(Value::as_object)
            .ok_or("missing pfmetadata.inputs.configuration.data")?;
        let p = topology_dim(data, TOPOLOGY_P)?;
        let q = topology_dim(data, TOPOLOGY_Q)?;
        let r = topology_dim(data, TOPOLOGY_R)?;

        Ok(Self {
            id,
            global_id,
            run_date,
            day_key,
            domain,
            version,
            core_count: p * q * r,
        })
    }
}

/// Extracts the version number from a `v<version>-<hash>` tag: the substring
/// before the first `-`, then after the first `v`.
pub fn strip_version(tag: &str) -> Result<String, String> {
    let head = tag.split('-').next().unwrap_or(tag);
    let (_, version) = head
        .split_once('v')
        .ok_or_else(|| format!("version tag {tag:?} has no 'v' marker"))?;
    if version.is_empty() {
        return Err(format!("version tag {tag:?} has an empty version number"));
    }
    Ok(version.to_string())
}

/// Truncates an ISO-like timestamp to its calendar day, keeping the date in
/// the timestamp's own offset. The store has emitted both RFC 3339 and
/// RFC 2822 shapes over time, so both are accepted.
pub fn truncate_day(run_date: &str) -> Result<String, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(run_date) {
        return Ok(dt.date_naive().format("%Y-%m-%d").to_string());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(run_date) {
        return Ok(dt.date_naive().format("%Y-%m-%d").to_string());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(run_date, format) {
            return Ok(dt.date().format("%Y-%m-%d").to_string());
        }
    }
    if let Ok(day) = NaiveDate::parse_from_str(run_date, "%Y-%m-%d") {
        return Ok(day.format("%Y-%m-%d").to_string());
    }
    Err(format!("unparseable run_date {run_date:?}"))
}

/// Opaque ids arrive as strings, numbers, or Mongo extended-JSON
/// `{"$oid": ...}` wrappers.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("$oid").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn topology_dim(data: &serde_json::Map<String, Value>, key: &str) -> Result<u64, String> {
    let value = data
        .get(key)
        .ok_or_else(|| format!("missing topology key {key:?}"))?;
    positive_int(value).ok_or_else(|| format!("topology key {key:?} is not a positive integer"))
}

/// The store is duck-typed: topology dimensions show up as integers, floats,
/// or numeric strings.
fn positive_int(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_u64() {
                (i > 0).then_some(i)
            } else {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f > 0.0)
                    .map(|f| f as u64)
            }
        }
        Value::String(s) => s.trim().parse::<u64>().ok().filter(|i| *i > 0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_doc() -> Value {
        json!({
            "_id": "6233a7",
            "globalid": "g-6233a7",
            "run_date": "2024-01-02T08:30:00+00:00",
            "domain": "little_washita",
            "pfmetadata": {
                "parflow": { "build": { "version": "v3.10.0-7fe1a2b" } },
                "inputs": { "configuration": { "data": {
                    "Process[dot]Topology[dot]P": 2,
                    "Process[dot]Topology[dot]Q": 3,
                    "Process[dot]Topology[dot]R": 4
                }}}
            }
        })
    }

    #[test]
    fn validates_a_complete_document() {
        let record = RunRecord::from_doc(&sample_doc()).unwrap();
        assert_eq!(record.id, "6233a7");
        assert_eq!(record.global_id, "g-6233a7");
        assert_eq!(record.day_key, "2024-01-02");
        assert_eq!(record.domain, "little_washita");
        assert_eq!(record.version, "3.10.0");
        assert_eq!(record.core_count, 24);
    }

    #[test]
    fn accepts_numeric_string_topology() {
        let mut doc = sample_doc();
        doc["pfmetadata"]["inputs"]["configuration"]["data"] = json!({
            "Process[dot]Topology[dot]P": "2",
            "Process[dot]Topology[dot]Q": "3",
            "Process[dot]Topology[dot]R": "4"
        });
        assert_eq!(RunRecord::from_doc(&doc).unwrap().core_count, 24);
    }

    #[test]
    fn accepts_extended_json_object_id() {
        let mut doc = sample_doc();
        doc["_id"] = json!({ "$oid": "62c1f0ab" });
        assert_eq!(RunRecord::from_doc(&doc).unwrap().id, "62c1f0ab");
    }

    #[test]
    fn rejects_missing_run_date() {
        let mut doc = sample_doc();
        doc.as_object_mut().unwrap().remove("run_date");
        let reason = RunRecord::from_doc(&doc).unwrap_err();
        assert!(reason.contains("run_date"), "{reason}");
    }

    #[test]
    fn rejects_tag_without_v_marker() {
        assert!(strip_version("3.10.0-7fe1a2b").is_err());
        assert_eq!(strip_version("v3.10.0-7fe1a2b").unwrap(), "3.10.0");
        assert_eq!(strip_version("v2.1.0").unwrap(), "2.1.0");
    }

    #[test]
    fn rejects_missing_topology_key() {
        let mut doc = sample_doc();
        doc["pfmetadata"]["inputs"]["configuration"]["data"]
            .as_object_mut()
            .unwrap()
            .remove("Process[dot]Topology[dot]R");
        let reason = RunRecord::from_doc(&doc).unwrap_err();
        assert!(reason.contains("Process[dot]Topology[dot]R"), "{reason}");
    }

    #[test]
    fn truncates_rfc2822_dates_to_their_own_day() {
        assert_eq!(
            truncate_day("Tue, 03 May 2022 16:20:01 GMT").unwrap(),
            "2022-05-03"
        );
    }

    #[test]
    fn truncation_keeps_the_record_offset() {
        // 23:30 at -05:00 is already the next day in UTC; the record's own
        // day wins.
        assert_eq!(
            truncate_day("2024-01-01T23:30:00-05:00").unwrap(),
            "2024-01-01"
        );
    }

    #[test]
    fn rejects_garbage_dates() {
        assert!(truncate_day("yesterday-ish").is_err());
    }
}
