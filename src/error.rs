use std::path::PathBuf;

/// Errors that reject an operation outright.
///
/// Conditions the annotator recovers from (a channel that failed to load during
/// auto-locate, an annotation drawn without tracking) are reported as
/// [`Notice`](crate::session::Notice) values instead.
#[derive(Debug, thiserror::Error)]
pub enum AnnotatorError {
    #[error("{} is not an image record directory (no file containing `{marker}`)", .path.display())]
    InvalidDirectory { path: PathBuf, marker: String },

    #[error("no channel images found for sample `{0}`")]
    UnknownSample(String),

    #[error("failed to read channel `{channel}`: {source}")]
    ChannelLoad {
        channel: String,
        #[source]
        source: Box<AnnotatorError>,
    },

    #[error("failed to decode raster {}: {source}", .path.display())]
    Raster {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("no raster registered for {}", .0.display())]
    MissingRaster(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = AnnotatorError> = std::result::Result<T, E>;
