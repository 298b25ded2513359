//! Assisted annotation: the state an operator builds up while labelling one sample.
//!
//! A [`Session`] owns the channel set, the auto-located catalog, the operator's
//! annotations and the meta-annotations captured while tracking a located
//! object. The host (a GUI, a script) feeds it operator events one at a time
//! and reacts to the returned [`Outcome`]: it shows the [`Notice`]s and moves
//! its view when asked to by a [`ViewportCommand`].
//!
//! Each annotation records which meta-annotation, if any, was captured with it,
//! so deleting annotations can never pair an annotation with the wrong view.

use imageproc::point::Point;
use log::{debug, info, warn};
use num_traits::{Num, ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::catalog::{ChannelFailure, Catalog, LocatedObject, aggregate};
use crate::config::LocateConfig;
use crate::directory::{ChannelSet, ImageDirectory};
use crate::error::{AnnotatorError, Result};
use crate::raster::RasterSource;
use crate::rect::{PixelRect, SceneRect};
use crate::threshold::{ThresholdChoice, ThresholdMap, ThresholdOverrides};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnnotationKind {
    Positive,
    Negative,
}

/// What a press-drag-release on the canvas does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AnnotationMode {
    /// Free pan; strokes are ignored.
    #[default]
    None,
    Positive,
    Negative,
    /// Remove the annotation under the release point.
    Delete,
}

impl AnnotationMode {
    pub fn kind(&self) -> Option<AnnotationKind> {
        match self {
            Self::Positive => Some(AnnotationKind::Positive),
            Self::Negative => Some(AnnotationKind::Negative),
            Self::None | Self::Delete => None,
        }
    }
}

/// An operator-drawn rectangle, in scene coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub kind: AnnotationKind,
    pub rect: PixelRect,
    /// Index into [`Session::meta_annotations`] of the view captured with this
    /// annotation.
    pub meta: Option<usize>,
}

/// The view context at the moment an annotation was drawn while tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaAnnotation {
    pub zoom_level: u32,
    /// Visible region, already mapped to raster pixels.
    pub viewport: PixelRect,
    /// Area of the tracked object's bounding box.
    pub reference_area: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FollowPolicy {
    /// The operator pans and zooms freely.
    #[default]
    FreePan,
    /// The view re-centres on the selected target.
    FollowSelection,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub zoom_level: u32,
    pub bounds: SceneRect,
    pub follow: FollowPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing located yet.
    Idle,
    Browsing,
    Tracking,
}

/// A request for the host to move or release its view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewportCommand {
    CenterOn { x: f64, y: f64 },
    /// Hand pan and zoom back to the operator.
    Release,
}

/// Recoverable conditions the operator should be told about.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    ChannelLoadFailed(ChannelFailure),
    /// The annotation at this index was drawn without tracking and has no
    /// meta-annotation.
    CorrespondenceLost { annotation: usize },
    /// Tracking needs at least one located object.
    SelectionUnavailable,
    TargetOutOfRange { index: usize, available: usize },
}

/// What an event did, beyond mutating the session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Outcome {
    pub notices: Vec<Notice>,
    pub viewport: Option<ViewportCommand>,
    pub removed: Option<Annotation>,
}

impl Outcome {
    fn notice(notice: Notice) -> Self {
        Self {
            notices: vec![notice],
            ..Self::default()
        }
    }

    fn viewport(command: ViewportCommand) -> Self {
        Self {
            viewport: Some(command),
            ..Self::default()
        }
    }
}

/// Operator events that need nothing outside the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    EnableTracking,
    DisableTracking,
    SelectTarget(usize),
    SetMode(AnnotationMode),
    SetViewport { zoom_level: u32, bounds: SceneRect },
    Draw { kind: AnnotationKind, rect: PixelRect },
    Delete { x: f64, y: f64 },
    ClearAll,
}

#[derive(Debug, Clone)]
pub struct Session {
    channels: ChannelSet,
    raster_size: (u32, u32),
    config: LocateConfig,
    overrides: ThresholdOverrides,
    thresholds: ThresholdMap,
    catalog: Option<Catalog>,
    annotations: Vec<Annotation>,
    meta_annotations: Vec<MetaAnnotation>,
    tracking: bool,
    selected: Option<usize>,
    viewport: Viewport,
    mode: AnnotationMode,
}

impl Session {
    /// A fresh session over `channels`, whose rasters are `width` x `height`.
    ///
    /// The view starts fitted to the whole raster.
    pub fn new(channels: ChannelSet, (width, height): (u32, u32), config: LocateConfig) -> Self {
        Self {
            channels,
            raster_size: (width, height),
            config,
            overrides: ThresholdOverrides::new(),
            thresholds: ThresholdMap::new(),
            catalog: None,
            annotations: Vec::new(),
            meta_annotations: Vec::new(),
            tracking: false,
            selected: None,
            viewport: Viewport {
                zoom_level: 0,
                bounds: SceneRect::new(0.0, 0.0, f64::from(width), f64::from(height)),
                follow: FollowPolicy::FreePan,
            },
            mode: AnnotationMode::None,
        }
    }

    /// Starts a session on one sample of a record directory.
    ///
    /// The raster size is taken from the brightfield channel (or the first
    /// channel if there is none).
    pub fn open(
        directory: &ImageDirectory,
        sample: &str,
        source: &impl RasterSource,
        config: LocateConfig,
    ) -> Result<Self> {
        let channels = directory.channels(sample)?;
        let (name, path) = channels
            .display_channel()
            .ok_or_else(|| AnnotatorError::UnknownSample(sample.to_string()))?;
        let raster = source.load(path).map_err(|err| AnnotatorError::ChannelLoad {
            channel: name.to_string(),
            source: Box::new(err),
        })?;
        info!(
            "session on {sample}: {} channels, {}x{}",
            channels.len(),
            raster.width(),
            raster.height()
        );
        Ok(Self::new(channels, raster.dimensions(), config))
    }

    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    pub fn raster_size(&self) -> (u32, u32) {
        self.raster_size
    }

    pub fn config(&self) -> &LocateConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        match (&self.catalog, self.tracking) {
            (None, _) => SessionState::Idle,
            (Some(_), false) => SessionState::Browsing,
            (Some(_), true) => SessionState::Tracking,
        }
    }

    pub fn catalog(&self) -> Option<&Catalog> {
        self.catalog.as_ref()
    }

    /// Thresholds used by the last auto-locate.
    pub fn thresholds(&self) -> &ThresholdMap {
        &self.thresholds
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn meta_annotations(&self) -> &[MetaAnnotation] {
        &self.meta_annotations
    }

    /// The meta-annotation captured with the annotation at `index`.
    pub fn meta_for(&self, index: usize) -> Option<&MetaAnnotation> {
        let meta = self.annotations.get(index)?.meta?;
        self.meta_annotations.get(meta)
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn mode(&self) -> AnnotationMode {
        self.mode
    }

    /// Objects of the tracking channel, in selector order.
    pub fn tracking_targets(&self) -> &[LocatedObject] {
        match &self.catalog {
            Some(catalog) => catalog.channel(&self.config.tracking_channel),
            None => &[],
        }
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_target(&self) -> Option<&LocatedObject> {
        self.tracking_targets().get(self.selected?)
    }

    /// Sets the threshold the next auto-locate uses for `channel`, clamped to
    /// the intensity range.
    pub fn set_threshold(&mut self, channel: impl Into<String>, value: f64) {
        self.overrides.set(channel, ThresholdChoice::fixed(value));
    }

    /// Goes back to the computed default for `channel`.
    pub fn reset_threshold(&mut self, channel: impl Into<String>) {
        self.overrides.set(channel, ThresholdChoice::Computed);
    }

    /// Rebuilds the catalog from the channel rasters.
    ///
    /// This starts over: annotations, meta-annotations and the target selection
    /// are dropped and tracking is switched off.
    pub fn auto_locate(&mut self, source: &impl RasterSource) -> Outcome {
        let aggregation = aggregate(&self.channels, source, &self.overrides, &self.config);

        let mut outcome = Outcome::default();
        if self.tracking {
            outcome.viewport = Some(ViewportCommand::Release);
        }
        outcome.notices = aggregation
            .failures
            .into_iter()
            .map(Notice::ChannelLoadFailed)
            .collect();

        self.catalog = Some(aggregation.catalog);
        self.thresholds = aggregation.thresholds_used;
        self.annotations.clear();
        self.meta_annotations.clear();
        self.selected = None;
        self.tracking = false;
        self.viewport.follow = FollowPolicy::FreePan;

        info!("{} tracking targets", self.tracking_targets().len());
        outcome
    }

    pub fn apply(&mut self, event: Event) -> Outcome {
        match event {
            Event::EnableTracking => self.enable_tracking(),
            Event::DisableTracking => self.disable_tracking(),
            Event::SelectTarget(index) => self.select_target(index),
            Event::SetMode(mode) => {
                self.set_mode(mode);
                Outcome::default()
            }
            Event::SetViewport { zoom_level, bounds } => {
                self.set_viewport(zoom_level, bounds);
                Outcome::default()
            }
            Event::Draw { kind, rect } => self.draw_annotation(kind, rect),
            Event::Delete { x, y } => self.delete_at(Point::new(x, y)),
            Event::ClearAll => {
                self.clear_annotations();
                Outcome::default()
            }
        }
    }

    /// Starts following the selected target, or the first one if none is
    /// selected yet.
    pub fn enable_tracking(&mut self) -> Outcome {
        let available = self.tracking_targets().len();
        if available == 0 {
            warn!("tracking requested but there is no located object to follow");
            return Outcome::notice(Notice::SelectionUnavailable);
        }

        let index = self.selected.filter(|&i| i < available).unwrap_or(0);
        self.selected = Some(index);
        self.tracking = true;
        self.viewport.follow = FollowPolicy::FollowSelection;
        debug!("tracking target {index}");
        Outcome::viewport(self.recenter())
    }

    pub fn disable_tracking(&mut self) -> Outcome {
        if !self.tracking {
            return Outcome::default();
        }
        self.tracking = false;
        self.viewport.follow = FollowPolicy::FreePan;
        Outcome::viewport(ViewportCommand::Release)
    }

    /// Chooses the tracking target. The view only follows while tracking.
    pub fn select_target(&mut self, index: usize) -> Outcome {
        let available = self.tracking_targets().len();
        if index >= available {
            return Outcome::notice(Notice::TargetOutOfRange { index, available });
        }

        self.selected = Some(index);
        if self.tracking {
            Outcome::viewport(self.recenter())
        } else {
            Outcome::default()
        }
    }

    pub fn set_mode(&mut self, mode: AnnotationMode) {
        self.mode = mode;
    }

    /// Records where the host's view is after a pan or zoom.
    pub fn set_viewport(&mut self, zoom_level: u32, bounds: SceneRect) {
        self.viewport.zoom_level = zoom_level;
        self.viewport.bounds = bounds;
    }

    /// A press at `start` and release at `end`, interpreted by the current mode.
    pub fn stroke<T>(&mut self, start: Point<T>, end: Point<T>) -> Outcome
    where
        T: Copy + PartialOrd + Num + ToPrimitive,
    {
        if let Some(kind) = self.mode.kind() {
            return self.draw_annotation(kind, PixelRect::from_corners(start, end));
        }
        match self.mode {
            AnnotationMode::Delete => self.delete_at(end),
            _ => Outcome::default(),
        }
    }

    /// Appends an annotation. While tracking, the current view and the
    /// tracked object's area are captured alongside it.
    ///
    /// Empty rectangles are kept; they extract to empty volumes.
    pub fn draw_annotation(&mut self, kind: AnnotationKind, rect: PixelRect) -> Outcome {
        let index = self.annotations.len();
        let meta = self.capture_meta();
        let meta_index = meta.map(|meta| {
            self.meta_annotations.push(meta);
            self.meta_annotations.len() - 1
        });

        self.annotations.push(Annotation {
            kind,
            rect,
            meta: meta_index,
        });
        debug!("annotation {index}: {kind:?} {rect:?}");

        if meta_index.is_some() {
            Outcome::default()
        } else {
            warn!("annotation {index} drawn without tracking, no view context recorded");
            Outcome::notice(Notice::CorrespondenceLost { annotation: index })
        }
    }

    /// Removes the first annotation whose interior contains `point`, together
    /// with its meta-annotation.
    pub fn delete_at<T: Copy + ToPrimitive>(&mut self, point: Point<T>) -> Outcome {
        let Some(index) = self
            .annotations
            .iter()
            .position(|annotation| annotation.rect.contains(point))
        else {
            return Outcome::default();
        };

        let removed = self.annotations.remove(index);
        if let Some(meta) = removed.meta {
            self.meta_annotations.remove(meta);
            for annotation in &mut self.annotations {
                if let Some(m) = annotation.meta.as_mut()
                    && *m > meta
                {
                    *m -= 1;
                }
            }
        }
        debug!("deleted annotation {index}");

        Outcome {
            removed: Some(removed),
            ..Outcome::default()
        }
    }

    /// Drops all annotations and meta-annotations; the catalog stays.
    pub fn clear_annotations(&mut self) {
        self.annotations.clear();
        self.meta_annotations.clear();
    }

    fn capture_meta(&self) -> Option<MetaAnnotation> {
        if !self.tracking {
            return None;
        }
        let target = self.selected_target()?;
        let (width, height) = self.raster_size;
        Some(MetaAnnotation {
            zoom_level: self.viewport.zoom_level,
            viewport: self.viewport.bounds.to_pixel_rect(width, height),
            reference_area: target.bbox.area(),
        })
    }

    fn recenter(&mut self) -> ViewportCommand {
        let Some((x, y)) = self.selected_target().map(|target| target.bbox.center()) else {
            return ViewportCommand::Release;
        };
        let (x, y) = (f64::from(x), f64::from(y));
        self.viewport.bounds = self.viewport.bounds.centered_on(x, y);
        ViewportCommand::CenterOn { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::MemoryRasterSource;
    use image::{GrayImage, Luma};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn fill(image: &mut GrayImage, rows: std::ops::Range<u32>, cols: std::ops::Range<u32>) {
        for y in rows {
            for x in cols.clone() {
                image.put_pixel(x, y, Luma([220]));
            }
        }
    }

    /// Two dapi targets, one red blob, a blank brightfield.
    fn session() -> (Session, MemoryRasterSource) {
        let mut dapi = GrayImage::new(300, 200);
        fill(&mut dapi, 20..40, 30..70); // 800, centre (50, 30)
        fill(&mut dapi, 100..150, 200..260); // 3000, centre (230, 125)
        let mut red = GrayImage::new(300, 200);
        fill(&mut red, 150..170, 10..30);

        let channels = ChannelSet::new(
            [
                ("Default", "w-Default.tif"),
                ("dapi", "w-dapi.tif"),
                ("red", "w-red.tif"),
            ],
            "Default",
        );
        let source = MemoryRasterSource::new()
            .with("w-Default.tif", GrayImage::new(300, 200))
            .with("w-dapi.tif", dapi)
            .with("w-red.tif", red);
        (Session::new(channels, (300, 200), LocateConfig::default()), source)
    }

    fn located() -> Session {
        let (mut session, source) = session();
        let outcome = session.auto_locate(&source);
        assert!(outcome.notices.is_empty());
        session
    }

    #[test]
    fn test_starts_idle_and_auto_locate_browses() {
        let (mut session, source) = session();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.tracking_targets().is_empty());

        session.auto_locate(&source);
        assert_eq!(session.state(), SessionState::Browsing);
        let labels: Vec<String> = session.tracking_targets().iter().map(LocatedObject::label).collect();
        assert_eq!(labels, vec!["50, 30", "230, 125"]);
        assert_eq!(
            session.thresholds().keys().cloned().collect::<Vec<_>>(),
            vec!["dapi", "red"]
        );
    }

    #[test]
    fn test_enable_tracking_without_targets_is_a_no_op() {
        let (mut session, _) = session();
        let outcome = session.enable_tracking();
        assert_eq!(outcome.notices, vec![Notice::SelectionUnavailable]);
        assert_eq!(outcome.viewport, None);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.viewport().follow, FollowPolicy::FreePan);
    }

    #[test]
    fn test_enable_tracking_follows_first_target() {
        let mut session = located();
        session.set_viewport(2, SceneRect::new(0.0, 0.0, 40.0, 20.0));

        let outcome = session.enable_tracking();
        assert_eq!(session.state(), SessionState::Tracking);
        assert_eq!(session.selected_index(), Some(0));
        assert_eq!(outcome.viewport, Some(ViewportCommand::CenterOn { x: 50.0, y: 30.0 }));
        assert_eq!(session.viewport().follow, FollowPolicy::FollowSelection);
        assert_eq!(session.viewport().bounds, SceneRect::new(30.0, 20.0, 70.0, 40.0));
    }

    #[test]
    fn test_selection_while_browsing_waits_for_tracking() {
        let mut session = located();
        assert_eq!(session.select_target(1), Outcome::default());
        assert_eq!(session.state(), SessionState::Browsing);

        let outcome = session.enable_tracking();
        assert_eq!(outcome.viewport, Some(ViewportCommand::CenterOn { x: 230.0, y: 125.0 }));

        let outcome = session.select_target(0);
        assert_eq!(outcome.viewport, Some(ViewportCommand::CenterOn { x: 50.0, y: 30.0 }));

        let outcome = session.select_target(5);
        assert_eq!(
            outcome.notices,
            vec![Notice::TargetOutOfRange { index: 5, available: 2 }]
        );
        assert_eq!(session.selected_index(), Some(0));
    }

    #[test]
    fn test_disable_tracking_releases_view() {
        let mut session = located();
        session.enable_tracking();
        let outcome = session.disable_tracking();
        assert_eq!(outcome.viewport, Some(ViewportCommand::Release));
        assert_eq!(session.state(), SessionState::Browsing);
        assert_eq!(session.viewport().follow, FollowPolicy::FreePan);
        // Already browsing: nothing to do.
        assert_eq!(session.disable_tracking(), Outcome::default());
    }

    #[test]
    fn test_tracked_and_untracked_annotations() {
        let mut session = located();
        session.set_viewport(3, SceneRect::new(0.0, 0.0, 100.0, 60.0));
        session.enable_tracking();

        let outcome = session.draw_annotation(AnnotationKind::Positive, PixelRect::new(10, 10, 20, 20));
        assert!(outcome.notices.is_empty());
        assert_eq!(session.meta_annotations().len(), 1);
        assert_eq!(
            session.meta_for(0),
            Some(&MetaAnnotation {
                zoom_level: 3,
                viewport: PixelRect::new(0, 0, 100, 60),
                reference_area: 800,
            })
        );

        session.disable_tracking();
        let outcome = session.draw_annotation(AnnotationKind::Negative, PixelRect::new(30, 30, 40, 40));
        assert_eq!(outcome.notices, vec![Notice::CorrespondenceLost { annotation: 1 }]);
        assert_eq!(session.annotations().len(), 2);
        assert_eq!(session.meta_annotations().len(), 1);
        assert_eq!(session.meta_for(1), None);
    }

    #[test]
    fn test_meta_viewport_is_clamped_to_raster() {
        let mut session = located();
        session.set_viewport(1, SceneRect::new(0.0, 0.0, 200.0, 100.0));
        session.select_target(1);
        session.enable_tracking();
        // Centred on (230, 125) the view spills past the right and bottom edges.
        session.draw_annotation(AnnotationKind::Positive, PixelRect::new(210, 110, 250, 140));
        assert_eq!(session.meta_for(0).unwrap().viewport, PixelRect::new(130, 75, 300, 175));
    }

    #[test]
    fn test_delete_keeps_links_consistent() {
        let mut session = located();
        session.enable_tracking();
        session.draw_annotation(AnnotationKind::Positive, PixelRect::new(0, 0, 10, 10));
        session.disable_tracking();
        session.draw_annotation(AnnotationKind::Negative, PixelRect::new(20, 0, 30, 10));
        session.enable_tracking();
        session.set_viewport(4, SceneRect::new(0.0, 0.0, 10.0, 10.0));
        session.draw_annotation(AnnotationKind::Positive, PixelRect::new(40, 0, 50, 10));

        // Untracked annotation in the middle: metas stay put.
        let outcome = session.delete_at(Point::new(25, 5));
        assert_eq!(outcome.removed.map(|a| a.kind), Some(AnnotationKind::Negative));
        assert_eq!(session.annotations().len(), 2);
        assert_eq!(session.meta_annotations().len(), 2);
        assert_eq!(session.meta_for(1).map(|m| m.zoom_level), Some(4));

        // Tracked annotation first: its meta goes, the later link shifts down.
        session.delete_at(Point::new(5, 5));
        assert_eq!(session.annotations().len(), 1);
        assert_eq!(session.meta_annotations().len(), 1);
        assert_eq!(session.annotations()[0].meta, Some(0));
        assert_eq!(session.meta_for(0).map(|m| m.zoom_level), Some(4));

        // A miss removes nothing.
        assert_eq!(session.delete_at(Point::new(100, 100)), Outcome::default());
    }

    #[test]
    fn test_delete_picks_first_match_in_draw_order() {
        let mut session = located();
        session.draw_annotation(AnnotationKind::Positive, PixelRect::new(0, 0, 50, 50));
        session.draw_annotation(AnnotationKind::Negative, PixelRect::new(10, 10, 20, 20));
        let outcome = session.delete_at(Point::new(15.0, 15.0));
        assert_eq!(outcome.removed.map(|a| a.kind), Some(AnnotationKind::Positive));
        assert_eq!(session.annotations()[0].kind, AnnotationKind::Negative);
    }

    #[test]
    fn test_strokes_follow_mode() {
        let mut session = located();

        assert_eq!(session.stroke(Point::new(5, 5), Point::new(9, 9)), Outcome::default());
        assert!(session.annotations().is_empty());

        session.set_mode(AnnotationMode::Negative);
        session.stroke(Point::new(40, 35), Point::new(10, 15));
        assert_eq!(
            session.annotations()[0].rect,
            PixelRect::new(10, 15, 40, 35)
        );
        assert_eq!(session.annotations()[0].kind, AnnotationKind::Negative);

        // Zero-length drag is still recorded.
        session.set_mode(AnnotationMode::Positive);
        session.stroke(Point::new(60, 60), Point::new(60, 60));
        assert!(session.annotations()[1].rect.is_empty());

        session.set_mode(AnnotationMode::Delete);
        session.stroke(Point::new(0, 0), Point::new(20, 20));
        assert_eq!(session.annotations().len(), 1);
    }

    #[test]
    fn test_auto_locate_resets_annotations_and_tracking() {
        let (mut session, source) = session();
        session.auto_locate(&source);
        session.select_target(1);
        session.enable_tracking();
        session.draw_annotation(AnnotationKind::Positive, PixelRect::new(0, 0, 5, 5));

        let outcome = session.auto_locate(&source);
        assert_eq!(outcome.viewport, Some(ViewportCommand::Release));
        assert_eq!(session.state(), SessionState::Browsing);
        assert_eq!(session.selected_index(), None);
        assert!(session.annotations().is_empty());
        assert!(session.meta_annotations().is_empty());
    }

    #[test]
    fn test_clear_keeps_catalog_and_state() {
        let mut session = located();
        session.enable_tracking();
        session.draw_annotation(AnnotationKind::Positive, PixelRect::new(0, 0, 5, 5));
        session.apply(Event::ClearAll);
        assert!(session.annotations().is_empty());
        assert!(session.meta_annotations().is_empty());
        assert_eq!(session.state(), SessionState::Tracking);
        assert_eq!(session.tracking_targets().len(), 2);
    }

    #[test]
    fn test_threshold_edits_feed_next_auto_locate() {
        let (mut session, source) = session();
        session.set_threshold("red", 400.0);
        session.auto_locate(&source);
        assert_eq!(session.thresholds()["red"], 255.0);
        assert!(session.catalog().unwrap().channel("red").is_empty());

        session.reset_threshold("red");
        session.auto_locate(&source);
        assert_eq!(session.thresholds()["red"], 0.0);
        assert_eq!(session.catalog().unwrap().channel("red").len(), 1);
    }

    #[test]
    fn test_failed_channel_is_reported_by_auto_locate() {
        let channels = ChannelSet::new([("dapi", "w-dapi.tif"), ("red", "w-red.tif")], "Default");
        let source = MemoryRasterSource::new().with("w-dapi.tif", GrayImage::new(10, 10));
        let mut session = Session::new(channels, (10, 10), LocateConfig::default());

        let outcome = session.auto_locate(&source);
        assert!(matches!(
            outcome.notices.as_slice(),
            [Notice::ChannelLoadFailed(ChannelFailure { channel, .. })] if channel == "red"
        ));
        assert_eq!(session.state(), SessionState::Browsing);
        assert!(!session.thresholds().contains_key("red"));
    }

    #[test]
    fn test_meta_never_outnumber_annotations() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let (mut session, source) = session();

        for step in 0..2000 {
            if rng.random_range(0..40) == 0 {
                session.auto_locate(&source);
            } else {
                let x = rng.random_range(0..300u32);
                let y = rng.random_range(0..200u32);
                let event = match rng.random_range(0..8) {
                    0 => Event::EnableTracking,
                    1 => Event::DisableTracking,
                    2 => Event::SelectTarget(rng.random_range(0..3)),
                    3 => Event::SetViewport {
                        zoom_level: rng.random_range(0..5),
                        bounds: SceneRect::new(f64::from(x), f64::from(y), f64::from(x) + 80.0, f64::from(y) + 60.0),
                    },
                    4 | 5 => Event::Draw {
                        kind: if rng.random_bool(0.5) {
                            AnnotationKind::Positive
                        } else {
                            AnnotationKind::Negative
                        },
                        rect: PixelRect::from_corners(
                            Point::new(x, y),
                            Point::new(rng.random_range(0..300u32), rng.random_range(0..200u32)),
                        ),
                    },
                    6 => Event::Delete {
                        x: f64::from(x),
                        y: f64::from(y),
                    },
                    _ => Event::ClearAll,
                };
                session.apply(event);
            }

            let metas = session.meta_annotations().len();
            assert!(metas <= session.annotations().len(), "step {step}");
            let mut linked: Vec<usize> = session.annotations().iter().filter_map(|a| a.meta).collect();
            assert_eq!(linked.len(), metas, "step {step}");
            linked.sort_unstable();
            linked.dedup();
            assert_eq!(linked, (0..metas).collect::<Vec<_>>(), "step {step}");
        }
    }
}
