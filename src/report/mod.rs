// src/report/mod.rs

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use tracing::warn;

use crate::{
    config::Config,
    process::{
        bundle::{Format, StatisticBundle},
        TOTAL_KEY,
    },
};

pub mod chart;

/// Render a value the way a person reads it: counts without a trailing `.0`.
pub fn format_value(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

fn bracketed<I, T>(items: I) -> String
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let joined = items
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{}]", joined)
}

/// Print the timeline followed by every requested (country, format) series.
///
/// Countries unknown to a dataset are skipped with a warning. Returns the
/// number of series written.
pub fn write_text<W: Write>(
    out: &mut W,
    bundle: &StatisticBundle,
    config: &Config,
    countries: &[String],
    formats: &[Format],
) -> Result<usize> {
    let mut written = 0;
    if let Some(reference) = bundle.reference() {
        writeln!(out, "Timeline:")?;
        writeln!(out, "    {}", bracketed(reference.dates()))?;
        writeln!(out)?;
    }

    for country in countries {
        for &format in formats {
            let Some(series) = bundle.get(format).and_then(|ds| ds.get(country)) else {
                warn!(%country, %format, "no data for country, skipping");
                continue;
            };
            writeln!(out, "Country: {}", country)?;
            writeln!(out, "    Dataset: {}", config.label(format))?;
            writeln!(
                out,
                "        {}",
                bracketed(series.iter().map(|v| format_value(*v)))
            )?;
            written += 1;
        }
        writeln!(out)?;
    }
    out.flush().context("flushing report")?;
    Ok(written)
}

#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub timeline: &'a [String],
    pub series: Vec<JsonSeries<'a>>,
}

#[derive(Debug, Serialize)]
pub struct JsonSeries<'a> {
    pub country: &'a str,
    pub format: Format,
    pub label: &'a str,
    pub values: &'a [f64],
}

/// Same content as [`write_text`], as a single JSON document.
pub fn write_json<W: Write>(
    out: &mut W,
    bundle: &StatisticBundle,
    config: &Config,
    countries: &[String],
    formats: &[Format],
) -> Result<usize> {
    let mut series = Vec::new();
    for country in countries {
        for &format in formats {
            match bundle.get(format).and_then(|ds| ds.get(country)) {
                Some(values) => series.push(JsonSeries {
                    country,
                    format,
                    label: config.label(format),
                    values,
                }),
                None => warn!(%country, %format, "no data for country, skipping"),
            }
        }
    }

    let written = series.len();
    let report = JsonReport {
        timeline: bundle.reference().map(|r| r.dates()).unwrap_or_default(),
        series,
    };
    serde_json::to_writer_pretty(&mut *out, &report).context("serializing JSON report")?;
    writeln!(out)?;
    Ok(written)
}

/// Print the known country keys, column-major, followed by the format legend.
pub fn write_country_list<W: Write>(
    out: &mut W,
    bundle: &StatisticBundle,
    config: &Config,
    recovered: bool,
) -> Result<()> {
    let cols = config.list_columns.max(1);
    let width = config.list_width;
    let rule = 30 * (cols + 1);

    let countries: Vec<&str> = bundle
        .reference()
        .map(|ds| ds.countries().filter(|c| *c != TOTAL_KEY).collect())
        .unwrap_or_default();

    writeln!(out, "{}", "-".repeat(rule))?;
    writeln!(out, "Countries:")?;
    writeln!(out, "{}", "=".repeat(rule))?;
    writeln!(out, "   {} - overall statistic", TOTAL_KEY)?;

    let rows = countries.len() / cols + 1;
    for r in 0..rows {
        let line: String = countries
            .iter()
            .skip(r)
            .step_by(rows)
            .map(|c| format!("{:<width$}", c, width = width))
            .collect();
        if !line.is_empty() {
            writeln!(out, "   {}", line.trim_end())?;
        }
    }

    writeln!(out, "{}", "-".repeat(rule))?;
    writeln!(out, "Formats:")?;
    writeln!(out, "C - confirmed, CD - confirmed daily")?;
    writeln!(out, "D - deaths,    DD - deaths daily")?;
    if recovered {
        writeln!(out, "R - recovered, RD - recovered daily")?;
    }
    writeln!(out, "{}", "-".repeat(rule))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{
        bundle::{Kind, Options},
        parse_raw_reader,
        population::PopulationTable,
    };
    use std::collections::BTreeMap;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,covidplot=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    const CONFIRMED: &str = "Province/State,Country/Region,Lat,Long,1/22/20,1/23/20,1/24/20
Hubei,China,0,0,1,2,3
Beijing,China,0,0,0,1,1
,US,0,0,1,1,5
,Italy,0,0,0,2,2
,Spain,0,0,0,0,1
,France,0,0,1,1,1
";

    fn bundle() -> StatisticBundle {
        let mut cumulative = BTreeMap::new();
        cumulative.insert(Kind::Confirmed, parse_raw_reader(CONFIRMED.as_bytes()).unwrap());
        StatisticBundle::build(
            cumulative,
            &PopulationTable::default(),
            Options::default(),
            0.6,
        )
    }

    #[test]
    fn values_print_without_trailing_zero() {
        assert_eq!(format_value(3.0), "3");
        assert_eq!(format_value(-2.0), "-2");
        assert_eq!(format_value(0.25), "0.25");
    }

    #[test]
    fn text_report_lists_each_country_and_format() -> Result<()> {
        init_test_logging();
        let mut out = Vec::new();
        let written = write_text(
            &mut out,
            &bundle(),
            &Config::default(),
            &["CHINA".to_string(), "ATLANTIS".to_string()],
            &[Format::Confirmed, Format::ConfirmedDaily],
        )?;
        let text = String::from_utf8(out)?;

        assert_eq!(written, 2);
        assert!(text.starts_with("Timeline:\n    [1/22/20, 1/23/20, 1/24/20]\n"));
        assert!(text.contains("Country: CHINA\n    Dataset: Confirmed\n        [1, 3, 4]\n"));
        assert!(text.contains("    Dataset: Confirmed (daily)\n        [0, 2, 1]\n"));
        assert!(!text.contains("ATLANTIS"));
        Ok(())
    }

    #[test]
    fn json_report_carries_labels_and_values() -> Result<()> {
        let mut out = Vec::new();
        write_json(
            &mut out,
            &bundle(),
            &Config::default(),
            &["US".to_string()],
            &[Format::ConfirmedDaily],
        )?;
        let doc: serde_json::Value = serde_json::from_slice(&out)?;

        assert_eq!(doc["timeline"][2], "1/24/20");
        assert_eq!(doc["series"][0]["country"], "US");
        assert_eq!(doc["series"][0]["format"], "CD");
        assert_eq!(doc["series"][0]["label"], "Confirmed (daily)");
        assert_eq!(doc["series"][0]["values"], serde_json::json!([0.0, 0.0, 4.0]));
        Ok(())
    }

    #[test]
    fn country_list_is_column_major() -> Result<()> {
        let config = Config {
            list_columns: 2,
            list_width: 8,
            ..Config::default()
        };
        let mut out = Vec::new();
        write_country_list(&mut out, &bundle(), &config, false)?;
        let text = String::from_utf8(out)?;

        // CHINA FRANCE ITALY SPAIN US → 3 rows, filled top to bottom
        assert!(text.contains("   TOTAL - overall statistic\n"));
        assert!(text.contains("   CHINA   SPAIN\n"));
        assert!(text.contains("   FRANCE  US\n"));
        assert!(text.contains("   ITALY\n"));
        assert!(!text.contains("R - recovered"));
        Ok(())
    }
}
