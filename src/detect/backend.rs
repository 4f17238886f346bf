use anyhow::Result;

use crate::detect::result::DetectionResult;
use crate::frame::Frame;

/// Object detector backend.
///
/// Treated as a black box: one frame in, boxes with class ids and scores out.
/// Class ids are not validated here; the classifier resolves them.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
