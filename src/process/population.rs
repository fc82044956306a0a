use anyhow::{Context, Result};
use csv::ReaderBuilder;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::{
    collections::{BTreeMap, HashMap},
    fs::File,
    io::Read,
    path::Path,
};
use tracing::{debug, info};

use super::utils::clean_str;

static TOKEN_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("token regex should compile"));

#[derive(Debug, Deserialize)]
struct PopulationRow {
    #[serde(rename = "Country Name")]
    name: String,
    #[serde(rename = "Year")]
    year: String,
    #[serde(rename = "Value")]
    value: String,
}

/// Latest known population per uppercased country name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopulationTable {
    entries: BTreeMap<String, u64>,
}

/// Outcome of resolving a country name against a candidate set.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult<T> {
    Exact(T),
    Fuzzy { value: T, matched: String },
    NoMatch,
}

impl<T> MatchResult<T> {
    pub fn value(self) -> Option<T> {
        match self {
            MatchResult::Exact(v) | MatchResult::Fuzzy { value: v, .. } => Some(v),
            MatchResult::NoMatch => None,
        }
    }
}

impl PopulationTable {
    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, u64)>,
        K: AsRef<str>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_uppercase(), v))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.entries.get(name).copied()
    }

    /// Resolve `query` against this table; see [`resolve`].
    pub fn lookup(&self, query: &str, cutoff: f64) -> MatchResult<u64> {
        resolve(query, &self.entries, cutoff)
    }
}

/// Load the population CSV from disk.
pub fn parse_population(
    path: impl AsRef<Path>,
    aliases: &BTreeMap<String, String>,
) -> Result<PopulationTable> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let table = parse_population_reader(file, aliases)
        .with_context(|| format!("parsing {}", path.display()))?;
    info!(file = %path.display(), countries = table.len(), "parsed population table");
    Ok(table)
}

/// Parse `Country Name,Country Code,Year,Value` rows, keeping the most recent
/// year per country after applying `aliases` to the name.
pub fn parse_population_reader<R: Read>(
    reader: R,
    aliases: &BTreeMap<String, String>,
) -> Result<PopulationTable> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    // name → (year, population)
    let mut latest: HashMap<String, (i32, u64)> = HashMap::new();
    for (line, row) in rdr.deserialize::<PopulationRow>().enumerate() {
        let row = match row {
            Ok(r) => r,
            Err(e) => {
                debug!(line = line + 1, error = %e, "skipping population row");
                continue;
            }
        };
        let year = clean_str(&row.year).parse::<i32>();
        let (Ok(year), Some(value)) = (year, parse_population_value(&row.value)) else {
            debug!(line = line + 1, "skipping population row with bad year/value");
            continue;
        };

        let name = clean_str(&row.name);
        let name = aliases.get(&name).cloned().unwrap_or(name).to_uppercase();
        match latest.get(&name) {
            Some((seen, _)) if *seen >= year => {}
            _ => {
                latest.insert(name, (year, value));
            }
        }
    }

    Ok(PopulationTable::from_entries(
        latest.into_iter().map(|(k, (_, v))| (k, v)),
    ))
}

fn parse_population_value(raw: &str) -> Option<u64> {
    let s = clean_str(raw);
    s.parse::<u64>().ok().or_else(|| {
        s.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v.round() as u64)
    })
}

/// Resolve `query` against the keys of `candidates`.
///
/// Exact (case-insensitive) hits win. Otherwise the most similar key scoring
/// at least `cutoff` is returned as a fuzzy match; ties go to the
/// lexicographically first key.
pub fn resolve<T: Clone>(
    query: &str,
    candidates: &BTreeMap<String, T>,
    cutoff: f64,
) -> MatchResult<T> {
    let query = query.trim().to_uppercase();
    if let Some(v) = candidates.get(&query) {
        return MatchResult::Exact(v.clone());
    }

    let mut best: Option<(&String, f64)> = None;
    for name in candidates.keys() {
        let score = similarity(&query, &name.to_uppercase());
        if score >= cutoff && best.map_or(true, |(_, s)| score > s) {
            best = Some((name, score));
        }
    }

    match best {
        Some((name, _)) => MatchResult::Fuzzy {
            value: candidates[name].clone(),
            matched: name.clone(),
        },
        None => MatchResult::NoMatch,
    }
}

/// Normalized edit-distance similarity, also comparing the word-sorted forms
/// so that reordered names ("KOREA, SOUTH" / "SOUTH KOREA") still match.
pub fn similarity(a: &str, b: &str) -> f64 {
    let whole = strsim::normalized_levenshtein(a, b);
    let tokens = strsim::normalized_levenshtein(&sorted_tokens(a), &sorted_tokens(b));
    whole.max(tokens)
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = TOKEN_SPLIT.split(s).filter(|t| !t.is_empty()).collect();
    tokens.sort_unstable();
    tokens.join(" ")
}
