//! RTT charts for collected trace runs.

pub mod chart;
pub mod error;
pub mod font;
pub mod image_out;
pub mod raster;
pub mod report;

pub use chart::{chart_series, render_chart, series_color, ChartSettings, Series, PALETTE};
pub use error::RenderError;
pub use image_out::write_png;
pub use report::{output_file_name, render, render_with};
