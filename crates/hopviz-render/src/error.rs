use std::path::PathBuf;

/// Errors that stop a chart from being written.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to create output directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write chart {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}
