use crate::chart::{render_chart, ChartSettings};
use crate::error::RenderError;
use crate::image_out::write_png;
use chrono::{Local, NaiveDateTime};
use hopviz_model::TraceTable;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// `trace_<destination, dots as dashes>_<YYYYMMDD-HHMMSS>.png`
pub fn output_file_name(destination: &str, at: NaiveDateTime) -> String {
    format!(
        "trace_{}_{}.png",
        destination.replace('.', "-"),
        at.format("%Y%m%d-%H%M%S")
    )
}

/// Charts `table` into `output_dir`, creating the directory when needed, and
/// returns the path of the written PNG.
pub fn render(
    table: &TraceTable,
    destination: &str,
    output_dir: &Path,
) -> Result<PathBuf, RenderError> {
    render_with(
        table,
        destination,
        output_dir,
        &ChartSettings::default(),
        Local::now().naive_local(),
    )
}

pub fn render_with(
    table: &TraceTable,
    destination: &str,
    output_dir: &Path,
    settings: &ChartSettings,
    now: NaiveDateTime,
) -> Result<PathBuf, RenderError> {
    fs::create_dir_all(output_dir).map_err(|source| RenderError::CreateDir {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let path = output_dir.join(output_file_name(destination, now));
    let image = render_chart(table, settings);
    write_png(&path, &image).map_err(|source| RenderError::Write {
        path: path.clone(),
        source,
    })?;

    info!("chart for {} saved to {:?}", destination, path);
    Ok(path)
}
