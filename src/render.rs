use crate::config::{hex_to_rgb, AppConfig};
use crate::dashboard::DashboardView;
use crate::processing::{month_name, TrendPoint};
use crate::types::{ChoroplethMap, PriceRecord, PurchaseRecord};
use anyhow::{Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

pub const PRICE_HISTORY_FILE: &str = "price_history.svg";
pub const CHOROPLETH_FILE: &str = "state_choropleth.svg";
pub const TOP_STATES_FILE: &str = "top_states.svg";
pub const MONTHLY_TREND_FILE: &str = "monthly_trend.svg";

// Number of strips in the choropleth colour bar.
const LEGEND_STEPS: usize = 64;

type Area<'a> = DrawingArea<SVGBackend<'a>, Shift>;

/// Write all four charts for `view` into the configured chart directory.
pub fn render_dashboard(config: &AppConfig, view: &DashboardView) -> Result<Vec<PathBuf>> {
    let dir = &config.output.chart_dir;
    fs::create_dir_all(dir).with_context(|| format!("Failed to create chart directory {:?}", dir))?;

    let charts = [
        (PRICE_HISTORY_FILE, price_history_svg(config, &view.prices, view.price_range_label)?),
        (CHOROPLETH_FILE, choropleth_svg(config, &view.choropleth)?),
        (TOP_STATES_FILE, top_states_svg(config, &view.top_states)?),
        (MONTHLY_TREND_FILE, monthly_trend_svg(config, &view.trend, &view.trend_month)?),
    ];

    let mut written = Vec::with_capacity(charts.len());
    for (file_name, svg) in charts {
        let path = dir.join(file_name);
        write_atomically(dir, &path, &svg).with_context(|| format!("Failed to write chart {:?}", path))?;
        info!("Wrote {:?}", path);
        written.push(path);
    }
    Ok(written)
}

// Readers see either the old chart or the new one, never a partial file.
fn write_atomically(dir: &Path, path: &Path, contents: &str) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.persist(path)?;
    Ok(())
}

pub fn price_history_svg(config: &AppConfig, prices: &[PriceRecord], range_label: &str) -> Result<String> {
    let color = rgb(&config.charts.line_color)?;
    let title = format!("Silver Prices - {}", range_label);

    svg(size(config), |root| {
        let (x0, x1) = axis_range(prices.iter().map(|p| p.index as f64));
        let (y0, y1) = axis_range(prices.iter().map(|p| p.price_inr_per_kg));

        let mut chart = ChartBuilder::on(root)
            .caption(title, ("sans-serif", 24).into_font())
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(80)
            .build_cartesian_2d(x0..x1, y0..y1)?;

        chart
            .configure_mesh()
            .x_desc("Time Period")
            .y_desc("Price (INR/kg)")
            .bold_line_style(&BLACK.mix(0.3))
            .light_line_style(&BLACK.mix(0.05))
            .x_label_formatter(&|v| format!("{:.0}", v))
            .y_label_formatter(&|v| format!("{:.0}", v))
            .draw()?;

        chart.draw_series(LineSeries::new(
            prices.iter().map(|p| (p.index as f64, p.price_inr_per_kg)),
            color.stroke_width(2),
        ))?;
        Ok(())
    })
}

pub fn choropleth_svg(config: &AppConfig, map: &ChoroplethMap) -> Result<String> {
    let low = rgb(&config.map.ramp_low)?;
    let high = rgb(&config.map.ramp_high)?;
    let (lo, hi) = map.value_range();
    let (lo, hi) = if hi > lo { (lo, hi) } else { (lo, lo + 1.0) };

    svg(size(config), |root| {
        let split = (root.dim_in_pixel().0 as f64 * 0.85) as i32;
        let (map_area, legend_area) = root.split_horizontally(split);

        let (x0, x1) = padded(map.bounds.min().x, map.bounds.max().x);
        let (y0, y1) = padded(map.bounds.min().y, map.bounds.max().y);

        let map_area = map_area
            .titled("State-wise Silver Purchases (kg)", ("sans-serif", 24).into_font())?
            .margin(10, 10, 10, 10);
        let (width, height) = map_area.dim_in_pixel();
        let (pad_y, pad_x) = fit_aspect(width, height, map_aspect(x0, x1, y0, y1));
        let map_area = map_area.margin(pad_y, pad_y, pad_x, pad_x);

        // No mesh: axes are suppressed, the plot area is cropped to the bounds.
        let mut chart = ChartBuilder::on(&map_area).build_cartesian_2d(x0..x1, y0..y1)?;

        for augmented in &map.regions {
            let fill = ramp(low, high, (augmented.value - lo) / (hi - lo));
            for polygon in augmented.region.geometry.iter() {
                let exterior: Vec<(f64, f64)> = polygon.exterior().coords().map(|c| (c.x, c.y)).collect();
                chart.draw_series(std::iter::once(Polygon::new(exterior.clone(), fill.filled())))?;
                chart.draw_series(std::iter::once(PathElement::new(exterior, BLACK.stroke_width(1))))?;
                for interior in polygon.interiors() {
                    let ring: Vec<(f64, f64)> = interior.coords().map(|c| (c.x, c.y)).collect();
                    chart.draw_series(std::iter::once(PathElement::new(ring, BLACK.stroke_width(1))))?;
                }
            }
        }

        let mut legend = ChartBuilder::on(&legend_area)
            .margin_top(60)
            .margin_bottom(60)
            .margin_right(10)
            .y_label_area_size(70)
            .build_cartesian_2d(0.0..1.0, lo..hi)?;
        legend
            .configure_mesh()
            .disable_x_mesh()
            .disable_y_mesh()
            .disable_x_axis()
            .y_labels(5)
            .y_label_formatter(&|v| format!("{:.0}", v))
            .draw()?;

        let step = (hi - lo) / LEGEND_STEPS as f64;
        legend.draw_series((0..LEGEND_STEPS).map(|i| {
            let from = lo + step * i as f64;
            let color = ramp(low, high, (i as f64 + 0.5) / LEGEND_STEPS as f64);
            Rectangle::new([(0.0, from), (1.0, from + step)], color.filled())
        }))?;
        Ok(())
    })
}

pub fn top_states_svg(config: &AppConfig, top: &[PurchaseRecord]) -> Result<String> {
    let color = rgb(&config.charts.bar_color)?;
    let title = format!("Top {} States - Silver Purchases", top.len());

    svg(size(config), |root| {
        let slots = top.len().max(1);
        let max = top.iter().map(|r| r.amount).fold(0.0, f64::max);
        let x_max = if max > 0.0 { max * 1.1 } else { 1.0 };
        let labels: Vec<&str> = top.iter().map(|r| r.region_name.as_str()).collect();

        let mut chart = ChartBuilder::on(root)
            .caption(title, ("sans-serif", 24).into_font())
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(140)
            .build_cartesian_2d(0.0..x_max, (0..slots).into_segmented())?;

        chart
            .configure_mesh()
            .disable_y_mesh()
            .x_desc("Silver Purchased (kg)")
            .y_labels(slots)
            .y_label_formatter(&|v| match v {
                SegmentValue::CenterOf(i) => labels.get(*i).map(|s| s.to_string()).unwrap_or_default(),
                _ => String::new(),
            })
            .draw()?;

        // Largest first, drawn from the bottom up.
        chart.draw_series(top.iter().enumerate().map(|(i, record)| {
            let mut bar = Rectangle::new(
                [(0.0, SegmentValue::Exact(i)), (record.amount, SegmentValue::Exact(i + 1))],
                color.filled(),
            );
            bar.set_margin(8, 8, 0, 0);
            bar
        }))?;
        Ok(())
    })
}

pub fn monthly_trend_svg(config: &AppConfig, trend: &[TrendPoint], month: &str) -> Result<String> {
    let color = rgb(&config.charts.trend_color)?;
    let title = format!("{} Silver Price Trends Over Years", month_name(month));

    svg(size(config), |root| {
        let (x0, x1) = axis_range(trend.iter().map(|p| p.year as f64));
        let (y0, y1) = axis_range(trend.iter().map(|p| p.price_inr_per_kg));
        let points: Vec<(f64, f64)> = trend.iter().map(|p| (p.year as f64, p.price_inr_per_kg)).collect();

        let mut chart = ChartBuilder::on(root)
            .caption(title, ("sans-serif", 24).into_font())
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(80)
            .build_cartesian_2d(x0..x1, y0..y1)?;

        chart
            .configure_mesh()
            .x_desc("Year")
            .y_desc("Price (INR/kg)")
            .bold_line_style(&BLACK.mix(0.3))
            .light_line_style(&BLACK.mix(0.05))
            .x_label_formatter(&|v| format!("{:.0}", v))
            .y_label_formatter(&|v| format!("{:.0}", v))
            .draw()?;

        chart.draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))?;
        chart.draw_series(points.iter().map(|&p| Circle::new(p, 4, color.filled())))?;
        Ok(())
    })
}

fn svg<F>(size: (u32, u32), draw: F) -> Result<String>
where
    F: FnOnce(&Area<'_>) -> Result<()>,
{
    let mut buf = String::new();
    {
        let root = SVGBackend::with_string(&mut buf, size).into_drawing_area();
        root.fill(&WHITE)?;
        draw(&root)?;
        root.present()?;
    }
    Ok(buf)
}

fn size(config: &AppConfig) -> (u32, u32) {
    (config.output.width, config.output.height)
}

fn rgb(hex: &str) -> Result<RGBColor> {
    let (r, g, b) = hex_to_rgb(hex)?;
    Ok(RGBColor(r, g, b))
}

/// Linear blend from `low` (t = 0) to `high` (t = 1).
fn ramp(low: RGBColor, high: RGBColor, t: f64) -> RGBColor {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    RGBColor(mix(low.0, high.0), mix(low.1, high.1), mix(low.2, high.2))
}

/// Data extent with 5% headroom; empty or flat series get a unit-wide range.
fn axis_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    if hi <= lo {
        return (lo - 0.5, hi + 0.5);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad, hi + pad)
}

/// Width/height ratio of the map extent. Longitude degrees shrink with the
/// cosine of the mid latitude when the bounds look geographic.
fn map_aspect(x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    let scale = if y0 >= -90.0 && y1 <= 90.0 {
        ((y0 + y1) / 2.0).to_radians().cos()
    } else {
        1.0
    };
    (x1 - x0) * scale / (y1 - y0)
}

/// Vertical and horizontal padding, in pixels per side, that letterboxes a
/// `width` x `height` area down to the ratio `aspect`.
fn fit_aspect(width: u32, height: u32, aspect: f64) -> (u32, u32) {
    if width == 0 || height == 0 || !aspect.is_finite() || aspect <= 0.0 {
        return (0, 0);
    }
    let (w, h) = (width as f64, height as f64);
    if w / h > aspect {
        (0, ((w - h * aspect) / 2.0).floor() as u32)
    } else {
        (((h - w / aspect) / 2.0).floor() as u32, 0)
    }
}

fn padded(lo: f64, hi: f64) -> (f64, f64) {
    if hi > lo {
        (lo, hi)
    } else {
        (lo - 0.5, hi + 0.5)
    }
}
