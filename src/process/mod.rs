// src/process/mod.rs

use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use std::{collections::BTreeMap, fs::File, io::Read, path::Path};
use tracing::{debug, info};

pub mod bundle;
pub mod population;
pub mod transform;
pub mod utils;

use utils::{country_key, parse_count};

/// Number of leading region-metadata columns (Province/State, Country/Region, Lat, Long).
pub const META_COLUMNS: usize = 4;
/// Column holding the country name.
const COUNTRY_COLUMN: usize = 1;
/// Pseudo-country holding the sum over every country.
pub const TOTAL_KEY: &str = "TOTAL";

/// One value per date on the dataset's date axis.
pub type TimeSeries = Vec<f64>;

/// Per-country series sharing a single date axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    dates: Vec<String>,
    series: BTreeMap<String, TimeSeries>,
}

impl Dataset {
    /// Build a dataset, padding or truncating every series to the date axis.
    pub fn new(dates: Vec<String>, series: BTreeMap<String, TimeSeries>) -> Self {
        let len = dates.len();
        let series = series
            .into_iter()
            .map(|(k, mut s)| {
                s.resize(len, 0.0);
                (k, s)
            })
            .collect();
        Self { dates, series }
    }

    pub fn dates(&self) -> &[String] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Series for an uppercased country key.
    pub fn get(&self, country: &str) -> Option<&TimeSeries> {
        self.series.get(country)
    }

    /// Country keys in sorted order, `TOTAL` included.
    pub fn countries(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TimeSeries)> {
        self.series.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// New dataset with `f(country, series)` applied to every series.
    pub fn map_series<F>(&self, mut f: F) -> Dataset
    where
        F: FnMut(&str, &[f64]) -> TimeSeries,
    {
        let series = self
            .series
            .iter()
            .map(|(k, v)| (k.clone(), f(k, v)))
            .collect();
        Dataset::new(self.dates.clone(), series)
    }
}

/// Parse a time-series CSV file from disk.
pub fn parse_raw(path: impl AsRef<Path>) -> Result<Dataset> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let dataset =
        parse_raw_reader(file).with_context(|| format!("parsing {}", path.display()))?;
    info!(
        file = %path.display(),
        countries = dataset.series.len(),
        dates = dataset.len(),
        "parsed time series"
    );
    Ok(dataset)
}

/// Parse a time-series CSV: rows sharing a country are summed column by
/// column, and a `TOTAL` row is added on top.
pub fn parse_raw_reader<R: Read>(reader: R) -> Result<Dataset> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let dates: Vec<String> = rdr
        .byte_headers()
        .context("reading CSV header")?
        .iter()
        .skip(META_COLUMNS)
        .map(|h| String::from_utf8_lossy(h).trim().to_string())
        .collect();
    if dates.is_empty() {
        return Err(anyhow!(
            "header has no date columns after the first {} metadata columns",
            META_COLUMNS
        ));
    }

    let len = dates.len();
    let mut series: BTreeMap<String, TimeSeries> = BTreeMap::new();
    for (line, record) in rdr.byte_records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                debug!(line = line + 1, error = %e, "skipping unreadable CSV record");
                continue;
            }
        };
        let Some(country) = record.get(COUNTRY_COLUMN) else {
            debug!(line = line + 1, "row without a country column, skipping");
            continue;
        };

        let acc = series
            .entry(country_key(&String::from_utf8_lossy(country)))
            .or_insert_with(|| vec![0.0; len]);
        for (slot, cell) in acc.iter_mut().zip(record.iter().skip(META_COLUMNS)) {
            *slot += parse_count(&String::from_utf8_lossy(cell));
        }
    }

    let mut total = vec![0.0; len];
    for s in series.values() {
        for (t, v) in total.iter_mut().zip(s) {
            *t += v;
        }
    }
    series.insert(TOTAL_KEY.to_string(), total);

    Ok(Dataset::new(dates, series))
}
