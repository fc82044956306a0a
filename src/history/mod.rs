// src/history/mod.rs

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Marker file remembering the date of the last successful refresh.
#[derive(Debug, Clone)]
pub struct UpdateMarker {
    path: PathBuf,
}

impl UpdateMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Date stored in the marker; `None` when absent or unreadable.
    pub fn last_update(&self) -> Option<NaiveDate> {
        let text = fs::read_to_string(&self.path).ok()?;
        match NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d") {
            Ok(d) => Some(d),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "ignoring malformed marker");
                None
            }
        }
    }

    /// True unless the marker already records `today`.
    pub fn is_stale(&self, today: NaiveDate) -> bool {
        self.last_update() != Some(today)
    }

    /// Record `day` as the last refresh date.
    pub fn record(&self, day: NaiveDate) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        fs::write(&self.path, day.format("%Y-%m-%d").to_string())
            .with_context(|| format!("writing marker {}", self.path.display()))
    }
}
