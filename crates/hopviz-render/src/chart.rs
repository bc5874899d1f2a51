use crate::font::{draw_text, draw_text_up, text_width, GLYPH_HEIGHT};
use crate::raster::{
    draw_disc, draw_line, fill_rect, outline_rect, paint_backdrop, Backdrop, Rect, FRAME, GRID,
    INK, PLOT,
};
use chrono::{DateTime, Local, Utc};
use hopviz_model::TraceTable;
use image::{Rgb, RgbImage};

const MIN_WIDTH: u32 = 200;
const MIN_HEIGHT: u32 = 150;
const MARGIN_LEFT: u32 = 80;
const MARGIN_RIGHT: u32 = 20;
const MARGIN_TOP: u32 = 40;
const MARGIN_BOTTOM: u32 = 50;
const LABEL_SCALE: u32 = 2;
const TITLE_Y: i32 = 14;
const X_CAPTION: &str = "Hop Number";
const Y_CAPTION: &str = "Average Round Trip Time (ms)";
const MAX_HOP_TICKS: u32 = 10;
const RTT_TICKS: f64 = 5.0;
const LINE_THICKNESS: u32 = 2;
const MARKER_RADIUS: i32 = 4;

/// Colour cycle for trace runs.
pub const PALETTE: [Rgb<u8>; 10] = [
    Rgb([31, 119, 180]),
    Rgb([255, 127, 14]),
    Rgb([44, 160, 44]),
    Rgb([214, 39, 40]),
    Rgb([148, 103, 189]),
    Rgb([140, 86, 75]),
    Rgb([227, 119, 194]),
    Rgb([127, 127, 127]),
    Rgb([188, 189, 34]),
    Rgb([23, 190, 207]),
];

#[derive(Debug, Clone)]
pub struct ChartSettings {
    pub width: u32,
    pub height: u32,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 600,
        }
    }
}

/// One line on the chart: average RTT per hop for a single run.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub trace_index: u32,
    pub captured_at: DateTime<Utc>,
    pub points: Vec<(u32, Option<f64>)>,
}

pub fn series_color(position: usize) -> Rgb<u8> {
    PALETTE[position % PALETTE.len()]
}

pub fn chart_series(table: &TraceTable) -> Vec<Series> {
    table
        .runs()
        .into_iter()
        .map(|run| Series {
            trace_index: run.trace_index,
            captured_at: run.captured_at,
            points: run
                .records
                .iter()
                .map(|record| (record.hop.hop_number, record.avg_rtt()))
                .collect(),
        })
        .collect()
}

/// Maps data coordinates into the plot rectangle.
#[derive(Debug, Clone)]
pub(crate) struct Axes {
    plot: Rect,
    hop_min: u32,
    hop_max: u32,
    rtt_max: f64,
    rtt_step: f64,
    hop_ticks: Vec<u32>,
    rtt_ticks: Vec<f64>,
}

impl Axes {
    pub(crate) fn new(series: &[Series], width: u32, height: u32) -> Self {
        let plot = Rect {
            left: MARGIN_LEFT,
            top: MARGIN_TOP,
            right: width - 1 - MARGIN_RIGHT,
            bottom: height - 1 - MARGIN_BOTTOM,
        };

        let hops = series.iter().flat_map(|s| s.points.iter().map(|p| p.0));
        let hop_min = hops.clone().min().unwrap_or(1);
        let hop_max = hops.max().unwrap_or(1).max(hop_min.saturating_add(1));

        let hop_step = (hop_max - hop_min).div_ceil(MAX_HOP_TICKS).max(1);
        let hop_ticks = (hop_min..=hop_max).step_by(hop_step as usize).collect();

        let peak = series
            .iter()
            .flat_map(|s| s.points.iter().filter_map(|p| p.1))
            .fold(0.0_f64, f64::max);
        let headroom = if peak > 0.0 { peak * 1.1 } else { 1.0 };
        let rtt_step = nice_step(headroom / RTT_TICKS);
        let tick_count = (headroom / rtt_step).ceil() as u32;
        let rtt_max = tick_count as f64 * rtt_step;
        let rtt_ticks = (0..=tick_count).map(|i| i as f64 * rtt_step).collect();

        Self {
            plot,
            hop_min,
            hop_max,
            rtt_max,
            rtt_step,
            hop_ticks,
            rtt_ticks,
        }
    }

    pub(crate) fn x(&self, hop: u32) -> f32 {
        let span = self.hop_max - self.hop_min;
        if span == 0 {
            // Only hop u32::MAX is present.
            return self.plot.left as f32 + self.plot.width() as f32 / 2.0;
        }
        let offset = hop.saturating_sub(self.hop_min) as f32;
        self.plot.left as f32 + offset / span as f32 * self.plot.width() as f32
    }

    pub(crate) fn y(&self, rtt: f64) -> f32 {
        let ratio = (rtt / self.rtt_max) as f32;
        self.plot.bottom as f32 - ratio * self.plot.height() as f32
    }
}

/// Rounds a raw tick step up to 1, 2 or 5 times a power of ten.
pub(crate) fn nice_step(raw: f64) -> f64 {
    if !(raw > 0.0) {
        return 1.0;
    }
    let magnitude = 10f64.powf(raw.log10().floor());
    let fraction = raw / magnitude;
    let nice = if fraction <= 1.0 {
        1.0
    } else if fraction <= 2.0 {
        2.0
    } else if fraction <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

/// Draws average RTT by hop number, one line per trace run. Hops where every
/// probe timed out leave a gap instead of dropping to zero. Sizes below
/// 200x150 are raised to that minimum.
pub fn render_chart(table: &TraceTable, settings: &ChartSettings) -> RgbImage {
    let width = settings.width.max(MIN_WIDTH);
    let height = settings.height.max(MIN_HEIGHT);
    let series = chart_series(table);
    let axes = Axes::new(&series, width, height);

    let grid_x: Vec<u32> = axes
        .hop_ticks
        .iter()
        .map(|&hop| axes.x(hop).round() as u32)
        .collect();
    let grid_y: Vec<u32> = axes
        .rtt_ticks
        .iter()
        .map(|&rtt| axes.y(rtt).round() as u32)
        .collect();

    let mut image = RgbImage::new(width, height);
    paint_backdrop(
        &mut image,
        &Backdrop {
            plot: axes.plot,
            grid_x: &grid_x,
            grid_y: &grid_y,
        },
    );
    draw_ticks(&mut image, &axes, &grid_x, &grid_y);
    draw_captions(&mut image, &axes, &table.destination);

    for (position, run) in series.iter().enumerate() {
        draw_series(&mut image, &axes, run, series_color(position));
    }
    draw_legend(&mut image, &axes, &series);

    image
}

fn draw_ticks(image: &mut RgbImage, axes: &Axes, grid_x: &[u32], grid_y: &[u32]) {
    let glyph_h = (GLYPH_HEIGHT * LABEL_SCALE) as i32;
    let plot = axes.plot;

    for (&hop, &px) in axes.hop_ticks.iter().zip(grid_x) {
        let px = px as i32;
        fill_rect(image, px, plot.bottom as i32 + 1, 1, 5, FRAME);
        let label = hop.to_string();
        let w = text_width(&label, LABEL_SCALE) as i32;
        draw_text(image, px - w / 2, plot.bottom as i32 + 10, &label, LABEL_SCALE, INK);
    }

    for (&rtt, &py) in axes.rtt_ticks.iter().zip(grid_y) {
        let py = py as i32;
        fill_rect(image, plot.left as i32 - 5, py, 5, 1, FRAME);
        let label = format_rtt(rtt, axes.rtt_step);
        let w = text_width(&label, LABEL_SCALE) as i32;
        draw_text(
            image,
            plot.left as i32 - 9 - w,
            py - glyph_h / 2,
            &label,
            LABEL_SCALE,
            INK,
        );
    }
}

/// Title above the plot, and a caption along each axis.
fn draw_captions(image: &mut RgbImage, axes: &Axes, destination: &str) {
    let plot = axes.plot;

    let title = format!("Traceroute Analysis for {destination}");
    let w = text_width(&title, LABEL_SCALE) as i32;
    let x = (image.width() as i32 - w) / 2;
    draw_text(image, x.max(0), TITLE_Y, &title, LABEL_SCALE, INK);

    let w = text_width(X_CAPTION, LABEL_SCALE) as i32;
    let center = (plot.left + plot.right) as i32 / 2;
    draw_text(
        image,
        center - w / 2,
        plot.bottom as i32 + 28,
        X_CAPTION,
        LABEL_SCALE,
        INK,
    );

    let h = text_width(Y_CAPTION, LABEL_SCALE) as i32;
    let middle = (plot.top + plot.bottom) as i32 / 2;
    draw_text_up(image, 12, middle + h / 2, Y_CAPTION, LABEL_SCALE, INK);
}

fn format_rtt(value: f64, step: f64) -> String {
    if step >= 1.0 {
        format!("{value:.0}")
    } else if step >= 0.1 {
        format!("{value:.1}")
    } else {
        format!("{value:.2}")
    }
}

fn draw_series(image: &mut RgbImage, axes: &Axes, series: &Series, color: Rgb<u8>) {
    let mut previous: Option<(f32, f32)> = None;
    let mut markers = Vec::new();

    for &(hop, avg) in &series.points {
        match avg {
            Some(rtt) => {
                let point = (axes.x(hop), axes.y(rtt));
                if let Some(from) = previous {
                    draw_line(image, from, point, LINE_THICKNESS, color);
                }
                markers.push(point);
                previous = Some(point);
            }
            None => previous = None,
        }
    }

    for marker in markers {
        draw_disc(image, marker, MARKER_RADIUS, color);
    }
}

fn draw_legend(image: &mut RgbImage, axes: &Axes, series: &[Series]) {
    if series.is_empty() {
        return;
    }

    let labels: Vec<String> = series
        .iter()
        .map(|run| {
            let local = run.captured_at.with_timezone(&Local);
            format!("Trace {} ({})", run.trace_index, local.format("%H:%M:%S"))
        })
        .collect();

    let pad = 6;
    let swatch = 24;
    let row_h = 18;
    let text_w = labels
        .iter()
        .map(|label| text_width(label, LABEL_SCALE))
        .max()
        .unwrap_or(0);
    let box_w = pad * 3 + swatch + text_w + pad;
    let box_h = pad * 2 + row_h * labels.len() as u32;
    let x0 = axes.plot.right as i32 - 8 - box_w as i32;
    let y0 = axes.plot.top as i32 + 8;

    fill_rect(image, x0, y0, box_w, box_h, PLOT);
    outline_rect(image, x0, y0, box_w, box_h, GRID);

    let glyph_h = (GLYPH_HEIGHT * LABEL_SCALE) as i32;
    for (position, label) in labels.iter().enumerate() {
        let color = series_color(position);
        let cy = y0 + pad as i32 + (row_h * position as u32 + row_h / 2) as i32;
        let sx = x0 + pad as i32;
        draw_line(
            image,
            (sx as f32, cy as f32),
            ((sx + swatch as i32) as f32, cy as f32),
            LINE_THICKNESS,
            color,
        );
        draw_disc(image, ((sx + swatch as i32 / 2) as f32, cy as f32), MARKER_RADIUS, color);
        draw_text(
            image,
            sx + (swatch + pad * 2) as i32,
            cy - glyph_h / 2,
            label,
            LABEL_SCALE,
            INK,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hopviz_model::{HopRecord, TraceRecord};

    fn record(trace_index: u32, hop_number: u32, rtt: &[Option<f64>]) -> TraceRecord {
        TraceRecord {
            hop: HopRecord {
                hop_number,
                ip_address: None,
                hostname: None,
                round_trip_times: rtt.to_vec(),
            },
            trace_index,
            captured_at: Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap(),
        }
    }

    fn settings() -> ChartSettings {
        ChartSettings {
            width: 600,
            height: 300,
        }
    }

    #[test]
    fn chart_matches_requested_size() {
        let table = TraceTable::new("example.com", vec![record(1, 1, &[Some(1.0), None, None])]);
        let image = render_chart(&table, &settings());
        assert_eq!(image.dimensions(), (600, 300));
    }

    #[test]
    fn tiny_sizes_are_raised() {
        let table = TraceTable::new("example.com", Vec::new());
        let image = render_chart(
            &table,
            &ChartSettings {
                width: 10,
                height: 10,
            },
        );
        assert_eq!(image.dimensions(), (MIN_WIDTH, MIN_HEIGHT));
    }

    #[test]
    fn markers_use_run_colours() {
        let table = TraceTable::new(
            "example.com",
            vec![
                record(1, 1, &[Some(2.0), Some(4.0), None]),
                record(1, 2, &[Some(10.0), None, None]),
                record(2, 1, &[Some(30.0), None, None]),
                record(2, 2, &[Some(40.0), None, None]),
            ],
        );
        let image = render_chart(&table, &settings());
        let axes = Axes::new(&chart_series(&table), 600, 300);

        let first = (axes.x(1).round() as u32, axes.y(3.0).round() as u32);
        assert_eq!(*image.get_pixel(first.0, first.1), PALETTE[0]);

        let second = (axes.x(1).round() as u32, axes.y(30.0).round() as u32);
        assert_eq!(*image.get_pixel(second.0, second.1), PALETTE[1]);
    }

    #[test]
    fn silent_hop_breaks_the_line() {
        let table = TraceTable::new(
            "example.com",
            vec![
                record(1, 1, &[Some(10.0), None, None]),
                record(1, 2, &[None, None, None]),
                record(1, 3, &[Some(20.0), None, None]),
            ],
        );
        let image = render_chart(&table, &settings());
        let axes = Axes::new(&chart_series(&table), 600, 300);

        let column = axes.x(2).round() as u32;
        let touched = (0..image.height()).any(|y| *image.get_pixel(column, y) == PALETTE[0]);
        assert!(!touched);
    }

    #[test]
    fn axes_cover_the_data() {
        let series = vec![Series {
            trace_index: 1,
            captured_at: Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap(),
            points: vec![(3, Some(12.0)), (9, None), (15, Some(47.0))],
        }];
        let axes = Axes::new(&series, 600, 300);
        assert_eq!(axes.hop_min, 3);
        assert_eq!(axes.hop_max, 15);
        assert!(axes.rtt_max >= 47.0);
        assert_eq!(axes.rtt_ticks.first(), Some(&0.0));
        assert!(axes.x(3) < axes.x(15));
        assert!(axes.y(47.0) < axes.y(12.0));
    }

    #[test]
    fn title_and_captions_are_drawn() {
        let table = TraceTable::new("example.com", vec![record(1, 1, &[Some(1.0), None, None])]);
        let image = render_chart(&table, &settings());
        let inked = |xs: std::ops::Range<u32>, ys: std::ops::Range<u32>| {
            ys.into_iter()
                .any(|y| xs.clone().any(|x| *image.get_pixel(x, y) == INK))
        };

        assert!(inked(0..600, 0..MARGIN_TOP));
        assert!(inked(0..600, 300 - 20..300));
        assert!(inked(0..24, MARGIN_TOP..300 - MARGIN_BOTTOM));
    }

    #[test]
    fn extreme_hop_numbers_do_not_overflow() {
        let table = TraceTable::new(
            "example.com",
            vec![
                record(1, u32::MAX, &[Some(5.0), None, None]),
                record(2, u32::MAX, &[Some(7.0), None, None]),
            ],
        );
        let image = render_chart(&table, &settings());
        assert_eq!(image.dimensions(), (600, 300));

        let axes = Axes::new(&chart_series(&table), 600, 300);
        let x = axes.x(u32::MAX);
        assert!(x.is_finite());
        assert!(x >= axes.plot.left as f32 && x <= axes.plot.right as f32);

        let wide = Axes::new(
            &[Series {
                trace_index: 1,
                captured_at: Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap(),
                points: vec![(1, Some(1.0)), (u32::MAX, Some(2.0))],
            }],
            600,
            300,
        );
        assert!(wide.x(u32::MAX) <= wide.plot.right as f32 + 0.5);
        assert!(wide.hop_ticks.len() <= MAX_HOP_TICKS as usize + 1);
    }

    #[test]
    fn nice_steps() {
        assert_eq!(nice_step(0.0), 1.0);
        assert_eq!(nice_step(3.0), 5.0);
        assert_eq!(nice_step(12.0), 20.0);
        assert!((nice_step(0.07) - 0.1).abs() < 1e-12);
    }
}
