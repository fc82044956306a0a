//! Series transforms. Each returns a new series/dataset; inputs are never mutated.

use tracing::warn;

use super::{population::MatchResult, population::PopulationTable, Dataset, TimeSeries};

/// First difference: `out[0] = 0`, `out[i] = s[i] - s[i-1]`.
pub fn difference(series: &[f64]) -> TimeSeries {
    let mut out = Vec::with_capacity(series.len());
    if !series.is_empty() {
        out.push(0.0);
    }
    out.extend(series.windows(2).map(|w| w[1] - w[0]));
    out
}

/// Natural log of every nonzero value; zeros pass through.
pub fn log_rescale(series: &[f64]) -> TimeSeries {
    series
        .iter()
        .map(|&v| if v != 0.0 { v.ln() } else { 0.0 })
        .collect()
}

/// Percentage of `population`; `None` yields zeros of the same length.
pub fn normalize(series: &[f64], population: Option<u64>) -> TimeSeries {
    match population {
        Some(p) if p > 0 => series.iter().map(|v| v / p as f64 * 100.0).collect(),
        _ => vec![0.0; series.len()],
    }
}

pub fn difference_dataset(ds: &Dataset) -> Dataset {
    ds.map_series(|_, s| difference(s))
}

pub fn log_rescale_dataset(ds: &Dataset) -> Dataset {
    ds.map_series(|_, s| log_rescale(s))
}

/// Normalize every country against `table`, warning on approximate or
/// missing population entries.
pub fn normalize_dataset(ds: &Dataset, table: &PopulationTable, cutoff: f64) -> Dataset {
    ds.map_series(|country, s| {
        let population = match table.lookup(country, cutoff) {
            MatchResult::Exact(p) => Some(p),
            MatchResult::Fuzzy { value, matched } => {
                warn!(%country, closest = %matched, "population not found, using closest name");
                Some(value)
            }
            MatchResult::NoMatch => {
                warn!(%country, "population not found, series zeroed");
                None
            }
        };
        normalize(s, population)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
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

    #[test]
    fn difference_starts_at_zero() {
        let s = [3.0, 5.0, 5.0, 9.0, 8.0];
        let d = difference(&s);
        assert_eq!(d.len(), s.len());
        assert_eq!(d[0], 0.0);
        for i in 1..s.len() {
            assert_eq!(d[i], s[i] - s[i - 1]);
        }
    }

    #[test]
    fn difference_of_constant_is_zero() {
        assert_eq!(difference(&[7.0; 6]), vec![0.0; 6]);
        assert!(difference(&[]).is_empty());
    }

    #[test]
    fn log_rescale_keeps_zero() {
        let out = log_rescale(&[0.0, 1.0, std::f64::consts::E, 100.0]);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[1], 0.0);
        assert!((out[2] - 1.0).abs() < 1e-12);
        assert_eq!(out[3], 100f64.ln());
    }

    #[test]
    fn normalize_is_a_percentage() {
        assert_eq!(normalize(&[0.0, 50.0, 200.0], Some(1000)), vec![0.0, 5.0, 20.0]);
        assert_eq!(normalize(&[1.0, 2.0], None), vec![0.0, 0.0]);
    }

    fn dataset() -> Dataset {
        let mut series = BTreeMap::new();
        series.insert("ITALY".to_string(), vec![0.0, 10.0, 30.0]);
        series.insert("ATLANTIS".to_string(), vec![1.0, 2.0, 3.0]);
        Dataset::new(vec!["d0".into(), "d1".into(), "d2".into()], series)
    }

    #[test]
    fn country_missing_from_population_is_zeroed() {
        init_test_logging();
        let table = PopulationTable::from_entries([("Italy", 1000)]);
        let out = normalize_dataset(&dataset(), &table, 0.6);
        assert_eq!(out.get("ATLANTIS").unwrap(), &vec![0.0, 0.0, 0.0]);
        assert_eq!(out.get("ITALY").unwrap(), &vec![0.0, 1.0, 3.0]);
    }

    #[test]
    fn daily_series_are_deltas_of_the_normalized_series() {
        init_test_logging();
        let table = PopulationTable::from_entries([("Italy", 1000)]);
        let normalized = normalize_dataset(&dataset(), &table, 0.6);
        let daily = difference_dataset(&normalized);
        assert_eq!(daily.get("ITALY").unwrap(), &vec![0.0, 1.0, 2.0]);
        assert_eq!(daily.dates(), dataset().dates());
    }
}
