// src/report/chart.rs

use anyhow::{bail, Result};
use std::path::Path;

use crate::{
    config::Config,
    process::bundle::{Format, StatisticBundle},
};

/// Most sub-plots a single chart can hold.
pub const MAX_FORMATS: usize = 4;

/// Sub-plot grid `(rows, cols)` for `n` formats.
pub fn grid_for(n: usize) -> Option<(usize, usize)> {
    match n {
        1 => Some((1, 1)),
        2 => Some((2, 1)),
        3 => Some((3, 1)),
        4 => Some((2, 2)),
        _ => None,
    }
}

/// Whether this build can draw charts at all.
pub fn available() -> bool {
    cfg!(feature = "charts")
}

/// Draw one sub-plot per format, one line per country, into an SVG at `path`.
pub fn render_chart(
    path: &Path,
    bundle: &StatisticBundle,
    config: &Config,
    countries: &[String],
    formats: &[Format],
) -> Result<()> {
    let Some(grid) = grid_for(formats.len()) else {
        bail!(
            "cannot chart {} formats at once (1 to {} supported)",
            formats.len(),
            MAX_FORMATS
        );
    };
    imp::render(path, bundle, config, countries, formats, grid)
}

#[cfg(feature = "charts")]
mod imp {
    use anyhow::{anyhow, Context, Result};
    use plotters::prelude::*;
    use std::path::Path;
    use tracing::info;

    use crate::{
        config::Config,
        process::bundle::{Format, StatisticBundle},
    };

    pub fn render(
        path: &Path,
        bundle: &StatisticBundle,
        config: &Config,
        countries: &[String],
        formats: &[Format],
        grid: (usize, usize),
    ) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }

        let root = SVGBackend::new(path, (config.chart_width, config.chart_height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(|e| anyhow!("{e}"))?;
        let areas = root.split_evenly(grid);

        for (area, &format) in areas.iter().zip(formats) {
            draw_subplot(area, bundle, config, countries, format)
                .with_context(|| format!("drawing {} sub-plot", format))?;
        }

        root.present().map_err(|e| anyhow!("{e}"))?;
        info!(file = %path.display(), formats = formats.len(), "chart written");
        Ok(())
    }

    fn draw_subplot(
        area: &DrawingArea<SVGBackend<'_>, plotters::coord::Shift>,
        bundle: &StatisticBundle,
        config: &Config,
        countries: &[String],
        format: Format,
    ) -> Result<()> {
        let label = config.label(format);
        let ds = bundle
            .get(format)
            .ok_or_else(|| anyhow!("format {} not loaded", format))?;
        let dates = ds.dates();
        let lines: Vec<(&String, &Vec<f64>)> = countries
            .iter()
            .filter_map(|c| ds.get(c).map(|s| (c, s)))
            .collect();

        let (mut lo, mut hi) = lines
            .iter()
            .flat_map(|(_, s)| s.iter().copied())
            .filter(|v| v.is_finite())
            .fold((0.0f64, 0.0f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if hi <= lo {
            hi = lo + 1.0;
        }
        let pad = (hi - lo) * 0.05;
        lo -= if lo < 0.0 { pad } else { 0.0 };
        hi += pad;

        let x_max = dates.len().max(2) - 1;
        let sparse = config.axis_sparse.max(1);
        let x_labels = dates.len() / sparse + 1;

        let mut chart = ChartBuilder::on(area)
            .caption(label, ("sans-serif", 18))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(70)
            .build_cartesian_2d(0..x_max, lo..hi)
            .map_err(|e| anyhow!("{e}"))?;

        let label_at = |i: &usize| {
            if i % sparse == 0 {
                dates.get(*i).cloned().unwrap_or_default()
            } else {
                String::new()
            }
        };
        chart
            .configure_mesh()
            .x_labels(x_labels)
            .x_label_formatter(&label_at)
            .x_desc("Date")
            .y_desc("People")
            .draw()
            .map_err(|e| anyhow!("{e}"))?;

        for (idx, (country, series)) in lines.iter().enumerate() {
            let color = Palette99::pick(idx).to_rgba();
            chart
                .draw_series(LineSeries::new(
                    series.iter().copied().enumerate(),
                    color.stroke_width(2),
                ))
                .map_err(|e| anyhow!("{e}"))?
                .label(format!("{}: {}", country, label))
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(|e| anyhow!("{e}"))?;
        Ok(())
    }
}

#[cfg(not(feature = "charts"))]
mod imp {
    use anyhow::{bail, Result};
    use std::path::Path;

    use crate::{
        config::Config,
        process::bundle::{Format, StatisticBundle},
    };

    pub fn render(
        _path: &Path,
        _bundle: &StatisticBundle,
        _config: &Config,
        _countries: &[String],
        _formats: &[Format],
        _grid: (usize, usize),
    ) -> Result<()> {
        bail!("chart support was not compiled in (enable the `charts` feature)")
    }
}
