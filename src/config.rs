// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use crate::process::bundle::Format;

const CONFIRMED_URL: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_confirmed_global.csv";
const DEATHS_URL: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_deaths_global.csv";
const RECOVERED_URL: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_recovered_global.csv";
const POPULATION_URL: &str =
    "https://raw.githubusercontent.com/datasets/population/master/data/population.csv";

/// Upstream URLs for every feed the tool knows about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeedUrls {
    pub confirmed: String,
    pub deaths: String,
    pub recovered: String,
    pub population: String,
}

impl Default for FeedUrls {
    fn default() -> Self {
        Self {
            confirmed: CONFIRMED_URL.to_string(),
            deaths: DEATHS_URL.to_string(),
            recovered: RECOVERED_URL.to_string(),
            population: POPULATION_URL.to_string(),
        }
    }
}

/// Everything that would otherwise be a process-wide constant.
///
/// Loaded from YAML when `--config` is given; any field missing from the
/// file keeps its built-in default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the downloaded CSVs and the marker file.
    pub cache_dir: PathBuf,
    /// Marker filename, relative to `cache_dir`.
    pub marker_name: String,
    /// Number of columns used by the country listing.
    pub list_columns: usize,
    /// Width of a single listing column, in characters.
    pub list_width: usize,
    /// Label every n-th date on chart x axes.
    pub axis_sparse: usize,
    /// Minimum similarity (0.0..=1.0) accepted by the fuzzy country lookup.
    pub fuzzy_cutoff: f64,
    /// Chart file name, relative to `cache_dir` unless overridden on the CLI.
    pub chart_file: String,
    pub chart_width: u32,
    pub chart_height: u32,
    pub feeds: FeedUrls,
    /// Population-table name → country key used by the case feeds.
    pub population_aliases: BTreeMap<String, String>,
    /// Human readable label per format code.
    pub labels: BTreeMap<Format, String>,
}

impl Default for Config {
    fn default() -> Self {
        let population_aliases = [("United States", "US"), ("World", "TOTAL")]
            .into_iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();
        let labels = Format::ALL
            .iter()
            .map(|f| (*f, f.default_label().to_string()))
            .collect();

        Self {
            cache_dir: PathBuf::from(".covid"),
            marker_name: ".covid.lock".to_string(),
            list_columns: 4,
            list_width: 35,
            axis_sparse: 10,
            fuzzy_cutoff: 0.6,
            chart_file: "chart.svg".to_string(),
            chart_width: 1280,
            chart_height: 960,
            feeds: FeedUrls::default(),
            population_aliases,
            labels,
        }
    }
}

impl Config {
    /// Read a YAML config file, falling back to defaults for absent keys.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn marker_path(&self) -> PathBuf {
        self.cache_dir.join(&self.marker_name)
    }

    pub fn chart_path(&self) -> PathBuf {
        self.cache_dir.join(&self.chart_file)
    }

    /// Label for a format, falling back to the built-in one.
    pub fn label(&self, format: Format) -> &str {
        self.labels
            .get(&format)
            .map(String::as_str)
            .unwrap_or_else(|| format.default_label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_cache_layout() {
        let cfg = Config::default();
        assert_eq!(cfg.marker_path(), PathBuf::from(".covid/.covid.lock"));
        assert_eq!(cfg.label(Format::ConfirmedDaily), "Confirmed (daily)");
        assert_eq!(cfg.population_aliases["United States"], "US");
    }

    #[test]
    fn partial_yaml_keeps_defaults() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        writeln!(tmp, "cache_dir: /tmp/covid-cache")?;
        writeln!(tmp, "axis_sparse: 7")?;
        writeln!(tmp, "labels:")?;
        writeln!(tmp, "  D: Fatalities")?;

        let cfg = Config::load(tmp.path())?;
        assert_eq!(cfg.cache_dir, PathBuf::from("/tmp/covid-cache"));
        assert_eq!(cfg.axis_sparse, 7);
        assert_eq!(cfg.list_columns, 4);
        assert_eq!(cfg.label(Format::Deaths), "Fatalities");
        // labels map was replaced wholesale, built-in label still answers
        assert_eq!(cfg.label(Format::Confirmed), "Confirmed");
        assert_eq!(cfg.feeds, FeedUrls::default());
        Ok(())
    }
}
