// src/cli.rs

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::{fmt, io::Write, path::PathBuf};
use tracing::{error, info, warn};

use crate::{
    config::Config,
    fetch::{update_cache, Source, UpdateOutcome},
    process::bundle::{load_statistic, Format, Kind, Options},
    report::{self, chart},
};

const EXAMPLES: &str = "Examples:
    covidplot -l                      # show country names
    covidplot -c 'China,Italy' -f D   # deaths in China and Italy
    covidplot -c 'China,Italy' -f CD  # confirmed per day in China and Italy
    covidplot -c China                # confirmed and deaths in China";

#[derive(Parser, Debug, Clone)]
#[command(name = "covidplot", version, about = "Show Corona statistic", after_help = EXAMPLES)]
pub struct Args {
    /// Show country names
    #[arg(short = 'l')]
    pub list: bool,

    /// Countries, comma separated
    #[arg(short = 'c', value_name = "COUNTRIES")]
    pub countries: Option<String>,

    /// Formats, comma separated: [C]onfirmed, [D]eaths, [R]ecovered, +[D]aily
    #[arg(short = 'f', value_name = "FORMATS", default_value = "C,D")]
    pub formats: String,

    /// All values in population percentage
    #[arg(short = 'p')]
    pub percentage: bool,

    /// Natural-log scale
    #[arg(short = 'n')]
    pub log_scale: bool,

    /// Also download and expose the recovered feed (R, RD)
    #[arg(long)]
    pub recovered: bool,

    /// Cache directory for downloaded CSVs
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// YAML config file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Never touch the network, use cached data only
    #[arg(long, conflicts_with = "force_update")]
    pub offline: bool,

    /// Download even if the cache was refreshed today
    #[arg(long)]
    pub force_update: bool,

    /// Print text only, skip the chart
    #[arg(long)]
    pub no_chart: bool,

    /// Where to write the chart (default: <cache dir>/chart.svg)
    #[arg(long, value_name = "FILE")]
    pub chart_out: Option<PathBuf>,

    /// Print the report as JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// Mistakes in the command line that are reported before any work is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    MissingCountries,
    UnknownFormat(String),
    RecoveredDisabled(Format),
    TooManyFormats(usize),
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageError::MissingCountries => write!(f, "'-c' option isn't set"),
            UsageError::UnknownFormat(code) => write!(
                f,
                "unknown format '{}' (expected C, D, CD, DD, or R, RD with --recovered)",
                code
            ),
            UsageError::RecoveredDisabled(format) => {
                write!(f, "format '{}' needs --recovered", format)
            }
            UsageError::TooManyFormats(n) => write!(
                f,
                "{} formats requested, at most {} can be shown at once",
                n,
                chart::MAX_FORMATS
            ),
        }
    }
}

impl std::error::Error for UsageError {}

impl UsageError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            // -1 as an unsigned exit status
            UsageError::MissingCountries => 255,
            _ => 2,
        }
    }
}

/// Validated request derived from [`Args`].
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub countries: Vec<String>,
    pub formats: Vec<Format>,
    pub options: Options,
}

impl Args {
    pub fn options(&self) -> Options {
        Options {
            percentage: self.percentage,
            log_scale: self.log_scale,
            recovered: self.recovered,
        }
    }

    /// Parse `-c`/`-f`. Countries are only required when not listing.
    pub fn request(&self) -> Result<Request, UsageError> {
        let formats = parse_formats(&self.formats, self.recovered)?;
        let countries = match (&self.countries, self.list) {
            (Some(list), _) => split_list(list),
            (None, true) => Vec::new(),
            (None, false) => return Err(UsageError::MissingCountries),
        };
        if countries.is_empty() && !self.list {
            return Err(UsageError::MissingCountries);
        }
        Ok(Request {
            countries,
            formats,
            options: self.options(),
        })
    }

    /// Built-in config, or the `--config` file, with CLI overrides applied.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = dir.clone();
        }
        Ok(config)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn parse_formats(raw: &str, recovered: bool) -> Result<Vec<Format>, UsageError> {
    let mut formats = Vec::new();
    for code in split_list(raw) {
        let format: Format = code
            .parse()
            .map_err(|_| UsageError::UnknownFormat(code.clone()))?;
        if format.kind() == Kind::Recovered && !recovered {
            return Err(UsageError::RecoveredDisabled(format));
        }
        formats.push(format);
    }
    if formats.is_empty() {
        return Err(UsageError::UnknownFormat(raw.to_string()));
    }
    if formats.len() > chart::MAX_FORMATS {
        return Err(UsageError::TooManyFormats(formats.len()));
    }
    Ok(formats)
}

/// Whole pipeline: validate → update cache → parse → report (→ chart).
pub fn run<S: Source, W: Write>(
    args: &Args,
    source: &S,
    today: NaiveDate,
    out: &mut W,
) -> Result<()> {
    let request = args.request()?;
    let config = args.load_config()?;

    let want_chart = !args.list && !args.no_chart && !args.json;
    if want_chart && !chart::available() {
        warn!("chart support isn't compiled in; showing text output only");
    }

    if args.offline {
        info!("offline, skipping update");
    } else {
        match update_cache(source, &config, args.recovered, args.force_update, today) {
            Ok(UpdateOutcome::UpToDate) => {}
            Ok(UpdateOutcome::Updated { files, bytes }) => info!(files, bytes, "raw data updated"),
            Err(e) => error!("update failed, using cached data if present: {:#}", e),
        }
    }

    let bundle = load_statistic(&config, request.options).with_context(|| {
        format!("no usable data in cache dir {}", config.cache_dir.display())
    })?;

    if args.list {
        return report::write_country_list(out, &bundle, &config, args.recovered);
    }

    if args.json {
        report::write_json(out, &bundle, &config, &request.countries, &request.formats)?;
    } else {
        report::write_text(out, &bundle, &config, &request.countries, &request.formats)?;
    }

    if want_chart && chart::available() {
        let path = args.chart_out.clone().unwrap_or_else(|| config.chart_path());
        if let Err(e) = chart::render_chart(
            &path,
            &bundle,
            &config,
            &request.countries,
            &request.formats,
        ) {
            warn!("chart skipped: {:#}", e);
        }
    }
    Ok(())
}
