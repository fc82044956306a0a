use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, path::Path, str::FromStr};
use tracing::info;

use super::{
    parse_raw,
    population::{parse_population, PopulationTable},
    transform::{difference_dataset, log_rescale_dataset, normalize_dataset},
    Dataset,
};
use crate::{config::Config, fetch::Feed};

/// Which upstream counter a format is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Confirmed,
    Deaths,
    Recovered,
}

impl Kind {
    pub fn feed(self) -> Feed {
        match self {
            Kind::Confirmed => Feed::Confirmed,
            Kind::Deaths => Feed::Deaths,
            Kind::Recovered => Feed::Recovered,
        }
    }
}

/// A format code as accepted by `-f`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Format {
    #[serde(rename = "C")]
    Confirmed,
    #[serde(rename = "D")]
    Deaths,
    #[serde(rename = "R")]
    Recovered,
    #[serde(rename = "CD")]
    ConfirmedDaily,
    #[serde(rename = "DD")]
    DeathsDaily,
    #[serde(rename = "RD")]
    RecoveredDaily,
}

impl Format {
    pub const ALL: [Format; 6] = [
        Format::Confirmed,
        Format::Deaths,
        Format::Recovered,
        Format::ConfirmedDaily,
        Format::DeathsDaily,
        Format::RecoveredDaily,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Format::Confirmed => "C",
            Format::Deaths => "D",
            Format::Recovered => "R",
            Format::ConfirmedDaily => "CD",
            Format::DeathsDaily => "DD",
            Format::RecoveredDaily => "RD",
        }
    }

    pub fn kind(self) -> Kind {
        match self {
            Format::Confirmed | Format::ConfirmedDaily => Kind::Confirmed,
            Format::Deaths | Format::DeathsDaily => Kind::Deaths,
            Format::Recovered | Format::RecoveredDaily => Kind::Recovered,
        }
    }

    pub fn is_daily(self) -> bool {
        matches!(
            self,
            Format::ConfirmedDaily | Format::DeathsDaily | Format::RecoveredDaily
        )
    }

    pub fn default_label(self) -> &'static str {
        match self {
            Format::Confirmed => "Confirmed",
            Format::Deaths => "Deaths",
            Format::Recovered => "Recovered",
            Format::ConfirmedDaily => "Confirmed (daily)",
            Format::DeathsDaily => "Deaths (daily)",
            Format::RecoveredDaily => "Recovered (daily)",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Format {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let code = s.trim().to_uppercase();
        Format::ALL
            .into_iter()
            .find(|f| f.code() == code)
            .ok_or_else(|| anyhow!("unknown format '{}'", s.trim()))
    }
}

/// Switches applied to every cumulative dataset before differencing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    /// Express values as a percentage of the country's population.
    pub percentage: bool,
    /// Replace nonzero values with their natural logarithm.
    pub log_scale: bool,
    /// Load the recovered feed and expose `R`/`RD`.
    pub recovered: bool,
}

/// Every dataset of a run, keyed by format.
#[derive(Debug, Clone)]
pub struct StatisticBundle {
    datasets: BTreeMap<Format, Dataset>,
}

impl StatisticBundle {
    /// Build the bundle from already-parsed cumulative datasets.
    ///
    /// Cumulative series are normalized and log-rescaled first; the daily
    /// formats are then the differences of those transformed series.
    pub fn build(
        cumulative: BTreeMap<Kind, Dataset>,
        population: &PopulationTable,
        options: Options,
        cutoff: f64,
    ) -> Self {
        let mut datasets = BTreeMap::new();
        for (kind, mut ds) in cumulative {
            if options.percentage {
                ds = normalize_dataset(&ds, population, cutoff);
            }
            if options.log_scale {
                ds = log_rescale_dataset(&ds);
            }
            let daily = difference_dataset(&ds);
            let (cum_fmt, daily_fmt) = match kind {
                Kind::Confirmed => (Format::Confirmed, Format::ConfirmedDaily),
                Kind::Deaths => (Format::Deaths, Format::DeathsDaily),
                Kind::Recovered => (Format::Recovered, Format::RecoveredDaily),
            };
            datasets.insert(cum_fmt, ds);
            datasets.insert(daily_fmt, daily);
        }
        Self { datasets }
    }

    pub fn get(&self, format: Format) -> Option<&Dataset> {
        self.datasets.get(&format)
    }

    pub fn formats(&self) -> impl Iterator<Item = Format> + '_ {
        self.datasets.keys().copied()
    }

    /// The confirmed dataset doubles as the reference for dates and country keys.
    pub fn reference(&self) -> Option<&Dataset> {
        self.get(Format::Confirmed)
            .or_else(|| self.datasets.values().next())
    }
}

/// Parse the cached CSVs in `config.cache_dir` and build the bundle.
pub fn load_statistic(config: &Config, options: Options) -> Result<StatisticBundle> {
    let dir: &Path = &config.cache_dir;
    let mut kinds = vec![Kind::Confirmed, Kind::Deaths];
    if options.recovered {
        kinds.push(Kind::Recovered);
    }

    let mut cumulative = BTreeMap::new();
    for kind in kinds {
        let ds = parse_raw(dir.join(kind.feed().file_name()))?;
        cumulative.insert(kind, ds);
    }

    let population = if options.percentage {
        parse_population(
            dir.join(Feed::Population.file_name()),
            &config.population_aliases,
        )?
    } else {
        PopulationTable::default()
    };

    let bundle = StatisticBundle::build(cumulative, &population, options, config.fuzzy_cutoff);
    info!(formats = bundle.datasets.len(), ?options, "statistic bundle ready");
    Ok(bundle)
}
