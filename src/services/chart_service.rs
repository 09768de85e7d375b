use std::path::PathBuf;

use chrono::{DateTime, NaiveTime, Utc};
use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Curve, PriceField, PriceSeries};

/// Visual defaults passed explicitly to every render call
#[derive(Debug, Clone, PartialEq)]
pub struct ChartStyle {
    pub background: RGBColor,
    pub grid: RGBColor,
    pub label: RGBColor,
    pub text: RGBColor,
    pub legend_background: RGBColor,
    pub legend_border: RGBColor,
    /// Series colours, reused cyclically
    pub palette: Vec<RGBColor>,
    pub font_family: String,
    pub caption_size: u32,
    pub label_size: u32,
    pub line_width: u32,
    /// Draw the grid before the series so lines sit on top of it
    pub grid_below_series: bool,
    /// Circle markers on every point of a price chart
    pub markers: bool,
}

impl ChartStyle {
    /// Dark theme: charcoal background, muted grid, gray labels
    pub fn dark() -> Self {
        Self {
            background: RGBColor(0x31, 0x32, 0x33),
            grid: RGBColor(0x47, 0x4A, 0x4A),
            label: RGBColor(0x80, 0x80, 0x80),
            text: RGBColor(0xC9, 0xC9, 0xC9),
            legend_background: RGBColor(0x31, 0x32, 0x33),
            legend_border: RGBColor(0x31, 0x32, 0x33),
            palette: vec![
                RGBColor(0x66, 0x9F, 0xEE),
                RGBColor(0x66, 0xEE, 0x91),
                RGBColor(0x99, 0x88, 0xDD),
                RGBColor(0xEE, 0xCC, 0x55),
                RGBColor(0x88, 0xBB, 0x44),
                RGBColor(0xFF, 0xBB, 0xBB),
            ],
            font_family: "sans-serif".to_string(),
            caption_size: 30,
            label_size: 15,
            line_width: 2,
            grid_below_series: true,
            markers: false,
        }
    }

    pub fn light() -> Self {
        Self {
            background: WHITE,
            grid: RGBColor(0xDD, 0xDD, 0xDD),
            label: BLACK,
            text: BLACK,
            legend_background: WHITE,
            legend_border: BLACK,
            palette: vec![BLUE, RED, GREEN, MAGENTA, CYAN, BLACK],
            markers: true,
            ..Self::dark()
        }
    }

    pub fn series_color(&self, index: usize) -> RGBColor {
        if self.palette.is_empty() {
            return self.text;
        }
        self.palette[index % self.palette.len()]
    }
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self::dark()
    }
}

fn to_utc(date: chrono::NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Padded y range; a flat series still gets a visible band
fn padded_range(min: f64, max: f64) -> (f64, f64) {
    let range = (max - min).max(1e-8);
    let padding = range * 0.1;
    (min - padding, max + padding)
}

fn check_size(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::invalid(format!("Chart size must be positive, got {}x{}", width, height)));
    }
    Ok(())
}

/// Render into a temporary PNG and return its bytes
fn render_png<F>(width: u32, height: u32, draw: F) -> Result<Vec<u8>>
where
    F: FnOnce(&DrawingArea<BitMapBackend<'_>, Shift>) -> std::result::Result<(), String>,
{
    let temp_file: PathBuf = std::env::temp_dir().join(format!("finkit_chart_{}.png", Uuid::new_v4()));

    let drawn = {
        let root = BitMapBackend::new(&temp_file, (width, height)).into_drawing_area();
        draw(&root).and_then(|_| root.present().map_err(|e| format!("Failed to render chart: {}", e)))
    };

    let result = drawn.map_err(Error::Chart).and_then(|_| {
        std::fs::read(&temp_file).map_err(|e| Error::Chart(format!("Failed to read chart file: {}", e)))
    });

    let _ = std::fs::remove_file(&temp_file);
    result
}

/// Line chart of one price column over time, as PNG bytes
pub fn render_price_chart(
    series: &PriceSeries,
    field: PriceField,
    style: &ChartStyle,
    width: u32,
    height: u32,
) -> Result<Vec<u8>> {
    check_size(width, height)?;
    if series.len() < 2 {
        return Err(Error::invalid(
            "Not enough price data to generate chart (minimum 2 points required)",
        ));
    }

    let points: Vec<(DateTime<Utc>, f64)> = series
        .iter()
        .map(|r| (to_utc(r.date), r.value(field)))
        .collect();

    let min_price = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let max_price = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
    let (y_min, y_max) = padded_range(min_price, max_price);
    let y_min = y_min.max(0.0);

    let x_min = points[0].0;
    let x_max = points[points.len() - 1].0;
    let color = style.series_color(0);
    let caption = format!("{} {} ({})", series.symbol(), field.label(), series.interval());

    debug!("Rendering {} chart with {} points", series.symbol(), points.len());

    render_png(width, height, |root| {
        root.fill(&style.background)
            .map_err(|e| format!("Failed to fill canvas: {}", e))?;

        let mut chart = ChartBuilder::on(root)
            .caption(
                &caption,
                (style.font_family.as_str(), style.caption_size).into_font().color(&style.text),
            )
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)
            .map_err(|e| format!("Failed to build chart: {}", e))?;

        let label_font = (style.font_family.as_str(), style.label_size).into_font().color(&style.label);

        if style.grid_below_series {
            chart
                .configure_mesh()
                .bold_line_style(style.grid)
                .light_line_style(TRANSPARENT)
                .axis_style(style.background)
                .label_style(label_font.clone())
                .x_label_formatter(&|d: &DateTime<Utc>| d.format("%Y-%m-%d").to_string())
                .y_desc(field.label())
                .x_desc("Date")
                .draw()
                .map_err(|e| format!("Failed to draw mesh: {}", e))?;
        }

        chart
            .draw_series(LineSeries::new(
                points.iter().copied(),
                color.stroke_width(style.line_width),
            ))
            .map_err(|e| format!("Failed to draw line: {}", e))?;

        if style.markers {
            chart
                .draw_series(points.iter().map(|p| Circle::new(*p, 3, color.filled())))
                .map_err(|e| format!("Failed to draw point: {}", e))?;
        }

        if !style.grid_below_series {
            chart
                .configure_mesh()
                .bold_line_style(style.grid)
                .light_line_style(TRANSPARENT)
                .axis_style(style.background)
                .label_style(label_font)
                .x_label_formatter(&|d: &DateTime<Utc>| d.format("%Y-%m-%d").to_string())
                .y_desc(field.label())
                .x_desc("Date")
                .draw()
                .map_err(|e| format!("Failed to draw mesh: {}", e))?;
        }

        Ok(())
    })
}

/// One chart panel: several labelled curves sharing a numeric x axis
#[derive(Debug, Clone, Copy)]
pub struct CurvePanel<'a> {
    pub title: &'a str,
    pub x_desc: &'a str,
    pub y_desc: &'a str,
    pub curves: &'a [Curve],
}

fn check_panel(panel: &CurvePanel<'_>) -> Result<()> {
    if panel.curves.is_empty() {
        return Err(Error::invalid(format!("No curves to plot in '{}'", panel.title)));
    }
    if let Some(short) = panel.curves.iter().find(|c| c.points.len() < 2) {
        return Err(Error::invalid(format!(
            "Curve '{}' needs at least 2 points",
            short.label
        )));
    }
    Ok(())
}

fn draw_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    panel: &CurvePanel<'_>,
    style: &ChartStyle,
) -> std::result::Result<(), String> {
    let all_points = || panel.curves.iter().flat_map(|c| c.points.iter());
    let x_min = all_points().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let x_max = all_points().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let y_lo = all_points().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let y_hi = all_points().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
    let (y_min, y_max) = padded_range(y_lo, y_hi);
    let x_max = if x_max > x_min { x_max } else { x_min + 1.0 };

    let mut chart = ChartBuilder::on(area)
        .caption(
            panel.title,
            (style.font_family.as_str(), style.caption_size).into_font().color(&style.text),
        )
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(|e| format!("Failed to build chart: {}", e))?;

    chart
        .configure_mesh()
        .bold_line_style(style.grid)
        .light_line_style(TRANSPARENT)
        .axis_style(style.background)
        .label_style((style.font_family.as_str(), style.label_size).into_font().color(&style.label))
        .x_desc(panel.x_desc)
        .y_desc(panel.y_desc)
        .draw()
        .map_err(|e| format!("Failed to draw mesh: {}", e))?;

    for (idx, curve) in panel.curves.iter().enumerate() {
        let color = style.series_color(idx);
        chart
            .draw_series(LineSeries::new(
                curve.points.iter().copied(),
                color.stroke_width(style.line_width),
            ))
            .map_err(|e| format!("Failed to draw curve '{}': {}", curve.label, e))?
            .label(curve.label.clone())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(style.legend_background)
        .border_style(style.legend_border)
        .label_font((style.font_family.as_str(), style.label_size).into_font().color(&style.text))
        .position(SeriesLabelPosition::UpperLeft)
        .draw()
        .map_err(|e| format!("Failed to draw legend: {}", e))?;

    Ok(())
}

/// Several labelled curves sharing one numeric x axis, with a legend
pub fn render_curves(
    title: &str,
    x_desc: &str,
    y_desc: &str,
    curves: &[Curve],
    style: &ChartStyle,
    width: u32,
    height: u32,
) -> Result<Vec<u8>> {
    let panel = CurvePanel {
        title,
        x_desc,
        y_desc,
        curves,
    };
    render_panels(&[panel], style, width, height)
}

/// Panels laid out side by side in one image, left to right
pub fn render_panels(
    panels: &[CurvePanel<'_>],
    style: &ChartStyle,
    width: u32,
    height: u32,
) -> Result<Vec<u8>> {
    check_size(width, height)?;
    if panels.is_empty() {
        return Err(Error::invalid("No panels to plot"));
    }
    for panel in panels {
        check_panel(panel)?;
    }

    debug!("Rendering {} curve panel(s)", panels.len());

    render_png(width, height, |root| {
        root.fill(&style.background)
            .map_err(|e| format!("Failed to fill canvas: {}", e))?;

        let areas = root.split_evenly((1, panels.len()));
        for (area, panel) in areas.iter().zip(panels) {
            draw_panel(area, panel, style)?;
        }

        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::price::record;
    use crate::models::Interval;
    use chrono::NaiveDate;

    fn curve(label: &str, points: &[(f64, f64)]) -> Curve {
        Curve {
            label: label.to_string(),
            points: points.to_vec(),
        }
    }

    #[test]
    fn test_dark_style_palette() {
        let style = ChartStyle::default();
        assert_eq!(style.background, RGBColor(0x31, 0x32, 0x33));
        assert_eq!(style.series_color(0), RGBColor(0x66, 0x9F, 0xEE));
        assert_eq!(style.series_color(6), style.series_color(0));
        assert!(style.grid_below_series);
    }

    #[test]
    fn test_empty_palette_uses_text_color() {
        let style = ChartStyle {
            palette: Vec::new(),
            ..ChartStyle::light()
        };
        assert_eq!(style.series_color(3), BLACK);
    }

    #[test]
    fn test_price_chart_needs_two_points() {
        let series = PriceSeries::new(
            "AAPL",
            Interval::Daily,
            vec![record(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), 185.0)],
        );
        let err = render_price_chart(&series, PriceField::Close, &ChartStyle::dark(), 800, 600)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_zero_size_rejected() {
        let curves = vec![curve("a", &[(0.0, 1.0), (1.0, 2.0)])];
        let err = render_curves("t", "x", "y", &curves, &ChartStyle::dark(), 0, 600).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_curves_validated() {
        let style = ChartStyle::dark();
        assert!(matches!(
            render_curves("t", "x", "y", &[], &style, 800, 600),
            Err(Error::InvalidInput(_))
        ));
        let short = vec![curve("ok", &[(0.0, 1.0), (1.0, 2.0)]), curve("short", &[(0.0, 1.0)])];
        match render_curves("t", "x", "y", &short, &style, 800, 600) {
            Err(Error::InvalidInput(msg)) => assert!(msg.contains("short")),
            other => panic!("unexpected: {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn test_panels_validated_individually() {
        let style = ChartStyle::dark();
        let good = vec![curve("ok", &[(0.0, 1.0), (1.0, 2.0)])];
        let none: Vec<Curve> = Vec::new();
        fn panel<'a>(title: &'a str, curves: &'a [Curve]) -> CurvePanel<'a> {
            CurvePanel {
                title,
                x_desc: "x",
                y_desc: "y",
                curves,
            }
        }

        assert!(matches!(
            render_panels(&[], &style, 800, 600),
            Err(Error::InvalidInput(_))
        ));
        match render_panels(&[panel("left", &good), panel("right", &none)], &style, 800, 600) {
            Err(Error::InvalidInput(msg)) => assert!(msg.contains("right")),
            other => panic!("unexpected: {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn test_two_panels_produce_png_or_backend_error() {
        let left = vec![curve("a", &[(0.0, 1.0), (1.0, 2.0)])];
        let right = vec![curve("b", &[(0.0, 5.0), (1.0, 3.0)])];
        let panels = [
            CurvePanel {
                title: "Monthly",
                x_desc: "x",
                y_desc: "y",
                curves: &left,
            },
            CurvePanel {
                title: "Total",
                x_desc: "x",
                y_desc: "y",
                curves: &right,
            },
        ];

        match render_panels(&panels, &ChartStyle::light(), 640, 240) {
            Ok(bytes) => assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n"),
            Err(err) => assert!(matches!(err, Error::Chart(_))),
        }
    }

    #[test]
    fn test_padded_range_for_flat_series() {
        let (lo, hi) = padded_range(10.0, 10.0);
        assert!(lo < 10.0 && hi > 10.0);
    }

    #[test]
    fn test_price_chart_produces_png_or_backend_error() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let series = PriceSeries::new(
            "AAPL",
            Interval::Daily,
            vec![record(d(2), 185.6), record(d(3), 184.3), record(d(4), 181.9)],
        );

        // Font lookup depends on the host, so a backend failure is acceptable here
        match render_price_chart(&series, PriceField::Close, &ChartStyle::light(), 320, 240) {
            Ok(bytes) => assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n"),
            Err(err) => assert!(matches!(err, Error::Chart(_))),
        }
    }
}
