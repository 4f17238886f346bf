//! Local file frame source using FFmpeg.
//!
//! Decodes the best video stream of a local file, scales every frame to the
//! configured processing size as RGB24, and seeks back to the start once the
//! decoder has been drained at end of stream.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;
use std::time::{Duration, Instant};

use super::file::{FileConfig, FileStats};
use crate::frame::Frame;

pub(crate) struct FfmpegFileSource {
    config: FileConfig,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    position: u64,
    frames_captured: u64,
    loops: u64,
    last_frame_at: Option<Instant>,
    connected_at: Option<Instant>,
    last_error: Option<String>,
    phase: DecoderPhase,
}

/// Where the decoder is within one pass over the file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DecoderPhase {
    /// Feeding packets.
    Reading,
    /// EOF sent; buffered frames are still coming out.
    Draining,
    /// Nothing left until the next rewind.
    Drained,
}

impl DecoderPhase {
    /// Phase after the decoder had no frame ready. `packet_sent` tells whether
    /// another packet could be fed while reading.
    fn after_empty_receive(self, packet_sent: bool) -> Self {
        match self {
            DecoderPhase::Reading if packet_sent => DecoderPhase::Reading,
            DecoderPhase::Reading => DecoderPhase::Draining,
            DecoderPhase::Draining | DecoderPhase::Drained => DecoderPhase::Drained,
        }
    }
}

impl FfmpegFileSource {
    pub(crate) fn new(config: FileConfig) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&config.path)
            .with_context(|| format!("failed to open video source '{}'", config.path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("'{}' has no video track", config.path))?;
        let stream_index = input_stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            config.width,
            config.height,
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        Ok(Self {
            config,
            input,
            stream_index,
            decoder,
            scaler,
            position: 0,
            frames_captured: 0,
            loops: 0,
            last_frame_at: None,
            connected_at: None,
            last_error: None,
            phase: DecoderPhase::Reading,
        })
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        self.connected_at = Some(Instant::now());
        log::info!("FileSource: connected to {} (ffmpeg)", self.config.path);
        Ok(())
    }

    pub(crate) fn next_frame(&mut self) -> Result<Frame> {
        if let Some(frame) = self.decode_next()? {
            return Ok(frame);
        }
        self.rewind()?;
        match self.decode_next()? {
            Some(frame) => Ok(frame),
            None => {
                self.last_error = Some("file contains no decodable frames".to_string());
                anyhow::bail!("'{}' contains no decodable frames", self.config.path)
            }
        }
    }

    fn decode_next(&mut self) -> Result<Option<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.phase == DecoderPhase::Drained {
                return Ok(None);
            }
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return self.emit(&decoded).map(Some);
            }

            let packet_sent = self.phase == DecoderPhase::Reading && self.feed_packet()?;
            let next = self.phase.after_empty_receive(packet_sent);
            if self.phase == DecoderPhase::Reading && next == DecoderPhase::Draining {
                self.decoder
                    .send_eof()
                    .context("send EOF to ffmpeg decoder")?;
            }
            self.phase = next;
        }
    }

    /// Sends the next packet of the video stream. Returns false when none are left.
    fn feed_packet(&mut self) -> Result<bool> {
        let stream_index = self.stream_index;
        let packet = self
            .input
            .packets()
            .find(|(stream, _)| stream.index() == stream_index)
            .map(|(_, packet)| packet);
        match packet {
            Some(packet) => {
                self.decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn emit(&mut self, decoded: &ffmpeg::frame::Video) -> Result<Frame> {
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(decoded, &mut rgb_frame)
            .context("scale frame to RGB")?;
        let pixels = frame_to_pixels(&rgb_frame)?;

        self.position += 1;
        self.frames_captured += 1;
        self.last_frame_at = Some(Instant::now());
        self.last_error = None;

        Frame::new(pixels, rgb_frame.width(), rgb_frame.height(), self.position)
    }

    fn rewind(&mut self) -> Result<()> {
        self.input
            .seek(0, ..)
            .with_context(|| format!("failed to rewind '{}'", self.config.path))?;
        self.decoder.flush();
        self.phase = DecoderPhase::Reading;
        self.position = 0;
        self.loops += 1;
        log::info!(
            "FileSource: end of {} reached, rewinding (loop {})",
            self.config.path,
            self.loops
        );
        Ok(())
    }

    pub(crate) fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(connected_at) = self.connected_at else {
            return false;
        };
        let Some(last_frame_at) = self.last_frame_at else {
            return connected_at.elapsed() <= Duration::from_secs(5);
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    pub(crate) fn stats(&self) -> FileStats {
        FileStats {
            frames_captured: self.frames_captured,
            loops: self.loops,
            path: self.config.path.clone(),
        }
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            2_000
        } else {
            (1000 / self.config.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<Vec<u8>> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        return Ok(data
            .get(..row_bytes * height as usize)
            .context("ffmpeg frame buffer is too short")?
            .to_vec());
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok(pixels)
}
