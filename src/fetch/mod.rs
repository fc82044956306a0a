// src/fetch/mod.rs

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::blocking::Client;
use std::{fs, path::Path, time::Instant};
use tracing::{info, instrument};
use url::Url;

use crate::{config::Config, history::UpdateMarker};

/// The fixed upstream resources and their cache filenames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feed {
    Confirmed,
    Deaths,
    Recovered,
    Population,
}

impl Feed {
    pub fn file_name(self) -> &'static str {
        match self {
            Feed::Confirmed => "Confirmed.csv",
            Feed::Deaths => "Deaths.csv",
            Feed::Recovered => "Recovered.csv",
            Feed::Population => "population.csv",
        }
    }

    pub fn url(self, config: &Config) -> &str {
        match self {
            Feed::Confirmed => &config.feeds.confirmed,
            Feed::Deaths => &config.feeds.deaths,
            Feed::Recovered => &config.feeds.recovered,
            Feed::Population => &config.feeds.population,
        }
    }

    /// Feeds downloaded on a refresh; the recovered feed is opt-in.
    pub fn enabled(recovered: bool) -> Vec<Feed> {
        let mut feeds = vec![Feed::Confirmed, Feed::Deaths, Feed::Population];
        if recovered {
            feeds.push(Feed::Recovered);
        }
        feeds
    }
}

/// Something that can GET a URL into memory.
pub trait Source {
    fn get_bytes(&self, url: &Url) -> Result<Vec<u8>>;
}

impl Source for Client {
    fn get_bytes(&self, url: &Url) -> Result<Vec<u8>> {
        let bytes = self
            .get(url.clone())
            .send()
            .with_context(|| format!("GET {} failed", url))?
            .error_for_status()
            .with_context(|| format!("Non-success status {}", url))?
            .bytes()
            .with_context(|| format!("Reading body from {}", url))?;
        Ok(bytes.to_vec())
    }
}

/// What [`update_cache`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Marker already carried today's date.
    UpToDate,
    /// Every feed was downloaded and written.
    Updated { files: usize, bytes: usize },
}

/// Download every enabled feed into memory. Fails on the first error, before
/// anything touches the disk.
pub fn download_all<S: Source>(
    source: &S,
    config: &Config,
    feeds: &[Feed],
) -> Result<Vec<(Feed, Vec<u8>)>> {
    let mut out = Vec::with_capacity(feeds.len());
    for &feed in feeds {
        let url = Url::parse(feed.url(config))
            .with_context(|| format!("parsing feed URL for {:?}", feed))?;
        let start = Instant::now();
        let body = source.get_bytes(&url)?;
        info!(file = feed.file_name(), size = body.len(), elapsed = ?start.elapsed(), "downloaded");
        out.push((feed, body));
    }
    Ok(out)
}

/// Overwrite the cache files with downloaded bodies.
pub fn write_cache(dir: &Path, payloads: &[(Feed, Vec<u8>)]) -> Result<usize> {
    fs::create_dir_all(dir).with_context(|| format!("creating cache dir {}", dir.display()))?;
    let mut total = 0;
    for (feed, body) in payloads {
        let path = dir.join(feed.file_name());
        fs::write(&path, body).with_context(|| format!("writing {}", path.display()))?;
        total += body.len();
    }
    Ok(total)
}

/// Refresh the cache at most once per `today`.
///
/// The marker is rewritten only after every file was written, so a failed
/// run is retried by the next invocation. `force` ignores the marker.
#[instrument(level = "debug", skip(source, config))]
pub fn update_cache<S: Source>(
    source: &S,
    config: &Config,
    recovered: bool,
    force: bool,
    today: NaiveDate,
) -> Result<UpdateOutcome> {
    let marker = UpdateMarker::new(config.marker_path());
    if !force && !marker.is_stale(today) {
        info!(marker = %marker.path().display(), "cache is up to date");
        return Ok(UpdateOutcome::UpToDate);
    }

    info!("Update raw data....");
    let payloads = download_all(source, config, &Feed::enabled(recovered))?;
    let bytes = write_cache(&config.cache_dir, &payloads)?;
    marker.record(today)?;
    info!(files = payloads.len(), bytes, "cache updated");

    Ok(UpdateOutcome::Updated {
        files: payloads.len(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::cell::RefCell;
    use tempfile::tempdir;

    /// Serves a fixed body for every URL, optionally failing on one path.
    struct FakeSource {
        fail_on: Option<&'static str>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeSource {
        fn new(fail_on: Option<&'static str>) -> Self {
            Self {
                fail_on,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Source for FakeSource {
        fn get_bytes(&self, url: &Url) -> Result<Vec<u8>> {
            self.calls.borrow_mut().push(url.to_string());
            if let Some(needle) = self.fail_on {
                if url.path().contains(needle) {
                    bail!("connection reset fetching {}", url);
                }
            }
            Ok(format!("body of {}", url.path()).into_bytes())
        }
    }

    fn config(dir: &Path) -> Config {
        Config {
            cache_dir: dir.to_path_buf(),
            ..Config::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 4, 1).unwrap()
    }

    #[test]
    fn stale_cache_downloads_and_records_marker() -> Result<()> {
        let tmp = tempdir()?;
        let cfg = config(tmp.path());
        let source = FakeSource::new(None);

        let outcome = update_cache(&source, &cfg, false, false, today())?;
        assert!(matches!(outcome, UpdateOutcome::Updated { files: 3, .. }));
        assert!(tmp.path().join("Confirmed.csv").exists());
        assert!(tmp.path().join("Deaths.csv").exists());
        assert!(tmp.path().join("population.csv").exists());
        assert!(!tmp.path().join("Recovered.csv").exists());
        assert_eq!(fs::read_to_string(cfg.marker_path())?, "2020-04-01");
        Ok(())
    }

    #[test]
    fn fresh_marker_skips_download() -> Result<()> {
        let tmp = tempdir()?;
        let cfg = config(tmp.path());
        UpdateMarker::new(cfg.marker_path()).record(today())?;
        let source = FakeSource::new(None);

        let outcome = update_cache(&source, &cfg, true, false, today())?;
        assert_eq!(outcome, UpdateOutcome::UpToDate);
        assert!(source.calls.borrow().is_empty());

        let forced = update_cache(&source, &cfg, true, true, today())?;
        assert!(matches!(forced, UpdateOutcome::Updated { files: 4, .. }));
        assert!(tmp.path().join("Recovered.csv").exists());
        Ok(())
    }

    #[test]
    fn failed_download_leaves_cache_and_marker_untouched() -> Result<()> {
        let tmp = tempdir()?;
        let cfg = config(tmp.path());
        let yesterday = today().pred_opt().unwrap();
        UpdateMarker::new(cfg.marker_path()).record(yesterday)?;
        fs::write(tmp.path().join("Confirmed.csv"), "old confirmed")?;

        let source = FakeSource::new(Some("population"));
        assert!(update_cache(&source, &cfg, false, false, today()).is_err());

        assert_eq!(
            fs::read_to_string(tmp.path().join("Confirmed.csv"))?,
            "old confirmed"
        );
        assert!(!tmp.path().join("Deaths.csv").exists());
        assert_eq!(
            UpdateMarker::new(cfg.marker_path()).last_update(),
            Some(yesterday)
        );
        Ok(())
    }
}
