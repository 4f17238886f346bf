//! Local file frame source.
//!
//! This module provides `FileSource` for reading frames from local video files.
//! The file source is responsible for:
//! - Opening a local video file (no network access)
//! - Decoding and scaling frames to the configured processing size
//! - Rewinding to the first frame at end of stream
//! - Releasing the decoder on `close`

use anyhow::{anyhow, Result};

use super::FrameSource;
#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use crate::frame::Frame;

const DEFAULT_SYNTHETIC_FRAMES: u64 = 300;

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Local file path (e.g., "Media/1.mp4") or `stub://<name>[?frames=N]`.
    pub path: String,
    /// Target frame rate (frames per second).
    pub target_fps: u32,
    /// Processing frame width; decoded frames are scaled to it.
    pub width: u32,
    /// Processing frame height.
    pub height: u32,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            target_fps: 10,
            width: 1280,
            height: 720,
        }
    }
}

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
    path: String,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
    Closed(FileStats),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes): '{}'",
                config.path
            ));
        }
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("frame size must be non-zero"));
        }
        let path = config.path.clone();
        if config.path.starts_with("stub://") {
            Ok(Self {
                backend: FileBackend::Synthetic(SyntheticFileSource::new(config)?),
                path,
            })
        } else {
            #[cfg(feature = "ingest-file-ffmpeg")]
            {
                Ok(Self {
                    backend: FileBackend::Ffmpeg(FfmpegFileSource::new(config)?),
                    path,
                })
            }
            #[cfg(not(feature = "ingest-file-ffmpeg"))]
            {
                Err(anyhow!(
                    "cannot open '{}': file ingestion requires the ingest-file-ffmpeg feature",
                    path
                ))
            }
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl FrameSource for FileSource {
    fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.connect(),
            FileBackend::Closed(_) => Err(anyhow!("file source {} is closed", self.path)),
        }
    }

    fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
            FileBackend::Closed(_) => Err(anyhow!("file source {} is closed", self.path)),
        }
    }

    fn close(&mut self) {
        if matches!(self.backend, FileBackend::Closed(_)) {
            return;
        }
        let stats = self.stats();
        log::info!(
            "FileSource: released {} after {} frames",
            self.path,
            stats.frames_captured
        );
        self.backend = FileBackend::Closed(stats);
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            FileBackend::Synthetic(source) => source.is_healthy(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.is_healthy(),
            FileBackend::Closed(_) => false,
        }
    }

    fn stats(&self) -> FileStats {
        match &self.backend {
            FileBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.stats(),
            FileBackend::Closed(stats) => stats.clone(),
        }
    }
}

/// Statistics for a file source.
#[derive(Clone, Debug, Default)]
pub struct FileStats {
    pub frames_captured: u64,
    /// Number of times playback rewound to the start.
    pub loops: u64,
    pub path: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticFileSource {
    config: FileConfig,
    loop_frames: u64,
    position: u64,
    frames_captured: u64,
    loops: u64,
    connected: bool,
}

impl SyntheticFileSource {
    fn new(config: FileConfig) -> Result<Self> {
        let loop_frames = parse_loop_frames(&config.path)?;
        Ok(Self {
            config,
            loop_frames,
            position: 0,
            frames_captured: 0,
            loops: 0,
            connected: false,
        })
    }

    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!("FileSource: connected to {} (synthetic)", self.config.path);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if !self.connected {
            return Err(anyhow!("file source {} not connected", self.config.path));
        }
        if self.position >= self.loop_frames {
            self.position = 0;
            self.loops += 1;
            log::info!(
                "FileSource: end of {} reached, rewinding (loop {})",
                self.config.path,
                self.loops
            );
        }
        self.position += 1;
        self.frames_captured += 1;

        Frame::new(
            self.generate_synthetic_pixels(),
            self.config.width,
            self.config.height,
            self.position,
        )
    }

    fn generate_synthetic_pixels(&self) -> Vec<u8> {
        let pixel_count = (self.config.width as usize) * (self.config.height as usize) * 3;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.position) % 256) as u8;
        }
        pixels
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> FileStats {
        FileStats {
            frames_captured: self.frames_captured,
            loops: self.loops,
            path: self.config.path.clone(),
        }
    }
}

fn parse_loop_frames(path: &str) -> Result<u64> {
    let Some((_, query)) = path.split_once('?') else {
        return Ok(DEFAULT_SYNTHETIC_FRAMES);
    };
    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix("frames=") {
            let frames: u64 = value
                .parse()
                .map_err(|_| anyhow!("invalid synthetic frame count in '{}'", path))?;
            if frames == 0 {
                return Err(anyhow!("synthetic frame count must be > 0"));
            }
            return Ok(frames);
        }
    }
    Ok(DEFAULT_SYNTHETIC_FRAMES)
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}
