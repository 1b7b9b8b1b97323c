mod counties;

pub use counties::{load_counties, County};

use simd_json::{OwnedValue, StaticNode};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;
use thiserror::Error;

/// Width of a normalized county identifier (state + county FIPS).
pub const FIPS_WIDTH: usize = 5;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },
    #[error("failed to read {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },
    #[error("lookup table is not valid JSON: {0}")]
    Parse(#[from] simd_json::Error),
    #[error("lookup table must be a JSON object keyed by year")]
    NotAnObject,
}

/// A county with a known positive value for one year.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRecord {
    pub key: String,
    pub value: f64,
}

impl ValueRecord {
    pub fn new(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Left-pad an identifier with zeros to five characters.
pub fn normalize_fips(id: &str) -> String {
    format!("{:0>width$}", id, width = FIPS_WIDTH)
}

/// Where the lookup table comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupSource {
    Url(String),
    Path(PathBuf),
}

impl LookupSource {
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            LookupSource::Url(location.to_string())
        } else {
            LookupSource::Path(PathBuf::from(location))
        }
    }

    /// Read the raw bytes. Any failure here is fatal for startup.
    pub fn fetch(&self) -> Result<Vec<u8>, DataError> {
        match self {
            LookupSource::Url(url) => {
                let response = ureq::get(url).call().map_err(|e| DataError::Fetch {
                    url: url.clone(),
                    source: Box::new(e),
                })?;
                let mut bytes = Vec::new();
                response
                    .into_reader()
                    .read_to_end(&mut bytes)
                    .map_err(|e| DataError::Io {
                        location: url.clone(),
                        source: e,
                    })?;
                Ok(bytes)
            }
            LookupSource::Path(path) => std::fs::read(path).map_err(|e| DataError::Io {
                location: path.display().to_string(),
                source: e,
            }),
        }
    }
}

impl std::fmt::Display for LookupSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupSource::Url(url) => f.write_str(url),
            LookupSource::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Per-year county values, already cleaned and normalized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupTable {
    years: BTreeMap<String, Vec<ValueRecord>>,
}

impl LookupTable {
    /// Fetch and parse the lookup table.
    pub fn load(source: &LookupSource) -> Result<Self, DataError> {
        let mut bytes = source.fetch()?;
        let table = Self::from_slice(&mut bytes)?;
        tracing::info!(source = %source, years = table.years.len(), "loaded county lookup table");
        Ok(table)
    }

    /// Parse `{ "<year>": { "<id>": number } }`. simd-json parses in place, so
    /// the buffer is clobbered.
    pub fn from_slice(bytes: &mut [u8]) -> Result<Self, DataError> {
        let root = simd_json::to_owned_value(bytes)?;
        let OwnedValue::Object(years) = root else {
            return Err(DataError::NotAnObject);
        };

        let mut table = LookupTable::default();
        for (year, entries) in years.iter() {
            let records = match entries {
                OwnedValue::Object(entries) => {
                    clean_records(entries.iter().map(|(id, v)| (id.as_str(), as_number(v))))
                }
                _ => {
                    tracing::warn!(year = %year, "year entry is not an object; treating as empty");
                    Vec::new()
                }
            };
            table.years.insert(year.clone(), records);
        }
        Ok(table)
    }

    /// Numeric year keys, ascending.
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.years.keys().filter_map(|k| k.parse().ok()).collect();
        years.sort_unstable();
        years.dedup();
        years
    }

    pub fn latest_year(&self) -> Option<i32> {
        self.years().last().copied()
    }

    /// Records for a year, or an empty slice when the year is unknown.
    pub fn records(&self, year: i32) -> &[ValueRecord] {
        self.years
            .get(&year.to_string())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn as_number(value: &OwnedValue) -> Option<f64> {
    match value {
        OwnedValue::Static(StaticNode::F64(f)) => Some(*f),
        OwnedValue::Static(StaticNode::I64(i)) => Some(*i as f64),
        OwnedValue::Static(StaticNode::U64(u)) => Some(*u as f64),
        _ => None,
    }
}

/// Drop non-numeric, non-finite and non-positive entries, pad ids and order
/// by id. The first entry wins when two raw ids pad to the same key.
fn clean_records<'a>(entries: impl Iterator<Item = (&'a str, Option<f64>)>) -> Vec<ValueRecord> {
    let mut raw: Vec<(&str, f64)> = entries
        .filter_map(|(id, value)| value.map(|v| (id, v)))
        .filter(|(_, v)| v.is_finite() && *v > 0.0)
        .collect();
    raw.sort_by(|a, b| a.0.cmp(b.0));

    let mut cleaned: BTreeMap<String, f64> = BTreeMap::new();
    for (id, value) in raw {
        let key = normalize_fips(id);
        if cleaned.contains_key(&key) {
            tracing::warn!(id, key = %key, "duplicate county id after padding; keeping first");
            continue;
        }
        cleaned.insert(key, value);
    }

    cleaned
        .into_iter()
        .map(|(key, value)| ValueRecord::new(key, value))
        .collect()
}
