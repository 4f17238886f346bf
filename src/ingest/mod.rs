//! Frame ingestion sources.
//!
//! This module provides the frame sources the monitor loop pulls from:
//! - Local video files (feature: ingest-file-ffmpeg)
//! - Synthetic `stub://` streams (tests, dry runs)
//!
//! Sources play in a loop: reaching the end of the stream rewinds to the first
//! frame instead of failing, since the monitor is expected to run indefinitely.
//! Failing to open a source is reported to the caller.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;

use std::path::PathBuf;

use anyhow::Result;

use crate::frame::Frame;

pub use file::{FileConfig, FileSource, FileStats};

/// A looping stream of decoded frames.
pub trait FrameSource: Send {
    /// Open the underlying stream.
    fn connect(&mut self) -> Result<()>;

    /// Next decoded frame; rewinds at end of stream.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Release the underlying stream. Further reads fail.
    fn close(&mut self);

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> FileStats;
}

/// Opens the frame source for a video-source identifier.
pub trait FrameSourceFactory: Send + Sync {
    fn open(&self, source_id: &str) -> Result<Box<dyn FrameSource>>;
}

impl<F> FrameSourceFactory for F
where
    F: Fn(&str) -> Result<Box<dyn FrameSource>> + Send + Sync,
{
    fn open(&self, source_id: &str) -> Result<Box<dyn FrameSource>> {
        self(source_id)
    }
}

/// Maps source ids to media files under a root: `<root>/<id>.mp4`.
///
/// A root of the form `stub://...` maps every id to a synthetic stream `stub://<id>`.
#[derive(Clone, Debug)]
pub struct MediaLibrary {
    pub root: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

impl MediaLibrary {
    pub fn path_for(&self, source_id: &str) -> String {
        if self.root.starts_with("stub://") {
            format!("stub://{}", source_id)
        } else {
            PathBuf::from(&self.root)
                .join(format!("{}.mp4", source_id))
                .to_string_lossy()
                .into_owned()
        }
    }
}

impl FrameSourceFactory for MediaLibrary {
    fn open(&self, source_id: &str) -> Result<Box<dyn FrameSource>> {
        let mut source = FileSource::new(FileConfig {
            path: self.path_for(source_id),
            target_fps: self.target_fps,
            width: self.width,
            height: self.height,
        })?;
        source.connect()?;
        Ok(Box::new(source))
    }
}
