//! Discovery of samples and channels in an image record directory.
//!
//! Channel images are named `{sample}-{channel}{ext}`. The directory must also
//! hold a marker file (the acquisition record) to be accepted.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::config::LocateConfig;
use crate::error::{AnnotatorError, Result};

/// A validated record directory.
#[derive(Debug, Clone)]
pub struct ImageDirectory {
    path: PathBuf,
    file_names: Vec<String>,
    config: LocateConfig,
}

impl ImageDirectory {
    /// Lists `path` and checks that it carries the marker file.
    pub fn open(path: impl AsRef<Path>, config: &LocateConfig) -> Result<Self> {
        let path = path.as_ref();
        let mut file_names = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                file_names.push(name.to_string());
            }
        }
        file_names.sort();

        if !file_names
            .iter()
            .any(|name| name.contains(&config.directory_marker))
        {
            return Err(AnnotatorError::InvalidDirectory {
                path: path.to_path_buf(),
                marker: config.directory_marker.clone(),
            });
        }

        debug!("opened {} ({} files)", path.display(), file_names.len());
        Ok(Self {
            path: path.to_path_buf(),
            file_names,
            config: config.clone(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Distinct sample prefixes, sorted.
    pub fn sample_names(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self
            .file_names
            .iter()
            .filter(|name| {
                !self
                    .config
                    .excluded_name_fragments
                    .iter()
                    .any(|fragment| name.contains(fragment.as_str()))
            })
            .filter_map(|name| name.rsplit_once('-').map(|(sample, _)| sample))
            .collect();
        names.into_iter().map(str::to_string).collect()
    }

    /// Every channel image of `sample`.
    pub fn channels(&self, sample: &str) -> Result<ChannelSet> {
        let mut channels = BTreeMap::new();
        for name in &self.file_names {
            let Some((prefix, tail)) = name.rsplit_once('-') else {
                continue;
            };
            if prefix != sample {
                continue;
            }
            if let Some(channel) = channel_name(tail, &self.config.image_extension) {
                channels.insert(channel.to_string(), self.path.join(name));
            }
        }

        if channels.is_empty() {
            return Err(AnnotatorError::UnknownSample(sample.to_string()));
        }
        Ok(ChannelSet {
            channels,
            reference: self.config.reference_channel.clone(),
        })
    }
}

/// Channel token of a file name tail, i.e. the text before the image extension.
fn channel_name<'a>(tail: &'a str, extension: &str) -> Option<&'a str> {
    let (channel, _) = tail.rsplit_once(extension)?;
    (!channel.is_empty()).then_some(channel)
}

/// The channel images of one sample, ordered by channel name.
///
/// This order is fixed for the life of a session and is the depth order of
/// exported volumes.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSet {
    channels: BTreeMap<String, PathBuf>,
    reference: String,
}

impl ChannelSet {
    pub fn new<S, P>(channels: impl IntoIterator<Item = (S, P)>, reference: impl Into<String>) -> Self
    where
        S: Into<String>,
        P: Into<PathBuf>,
    {
        Self {
            channels: channels
                .into_iter()
                .map(|(name, path)| (name.into(), path.into()))
                .collect(),
            reference: reference.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.channels.keys().cloned().collect()
    }

    pub fn path(&self, channel: &str) -> Option<&Path> {
        self.channels.get(channel).map(PathBuf::as_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.channels
            .iter()
            .map(|(name, path)| (name.as_str(), path.as_path()))
    }

    /// All channels except the brightfield reference.
    pub fn fluorescence(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.iter().filter(move |(name, _)| *name != self.reference)
    }

    /// The brightfield channel, or the first channel when there is none.
    pub fn display_channel(&self) -> Option<(&str, &Path)> {
        self.channels
            .get_key_value(&self.reference)
            .map(|(name, path)| (name.as_str(), path.as_path()))
            .or_else(|| self.iter().next())
    }
}
