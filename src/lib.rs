//! Object localisation and assisted annotation for multi-channel microscopy images.
//!
//! Fluorescence channels are thresholded and split into blobs
//! ([`region_labelling`]), blobs are size-filtered into a per-channel catalog
//! ([`catalog`]), and a [`session::Session`] ties the operator's annotations to
//! the located object being tracked, so that both the annotated region and its
//! surrounding view can be exported as stacked channel volumes ([`extract`]).

pub mod catalog;
mod colors;
pub mod config;
pub mod directory;
pub mod error;
pub mod extract;
pub mod overlay;
pub mod raster;
pub mod rect;
pub mod region_labelling;
pub mod session;
pub mod threshold;

pub use catalog::{Aggregation, Catalog, ChannelFailure, LocatedObject, aggregate};
pub use config::LocateConfig;
pub use directory::{ChannelSet, ImageDirectory};
pub use error::{AnnotatorError, Result};
pub use extract::{ChannelRasters, ExportRecord, extract};
pub use raster::{FileRasterSource, MemoryRasterSource, RasterSource};
pub use rect::{BoundingBox, PixelRect, SceneRect};
pub use region_labelling::detect_blobs;
pub use session::{
    Annotation, AnnotationKind, AnnotationMode, Event, MetaAnnotation, Notice, Outcome, Session,
    SessionState, ViewportCommand,
};
pub use threshold::{ThresholdChoice, ThresholdMap, ThresholdOverrides};
