use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{Detection, DetectionResult};
use crate::frame::Frame;

/// Stub backend for testing and dry runs.
///
/// Replays a script of per-frame detection lists, cycling when it runs out.
/// An empty script yields no detections.
#[derive(Clone, Debug, Default)]
pub struct StubBackend {
    script: Vec<Vec<Detection>>,
    cursor: usize,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same detections on every frame.
    pub fn fixed(detections: Vec<Detection>) -> Self {
        Self::scripted(vec![detections])
    }

    pub fn scripted(script: Vec<Vec<Detection>>) -> Self {
        Self { script, cursor: 0 }
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<DetectionResult> {
        if self.script.is_empty() {
            return Ok(DetectionResult::default());
        }
        let detections = self.script[self.cursor % self.script.len()].clone();
        self.cursor = self.cursor.wrapping_add(1);
        Ok(DetectionResult::new(detections))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_backend_cycles_script() {
        let a = Detection::new(0.0, 0.0, 5.0, 5.0, 0.8, 3);
        let b = Detection::new(10.0, 10.0, 15.0, 15.0, 0.7, 4);
        let mut backend = StubBackend::scripted(vec![vec![a], vec![b, a]]);
        let frame = Frame::blank(8, 8, 0);

        assert_eq!(backend.detect(&frame).unwrap().detections, vec![a]);
        assert_eq!(backend.detect(&frame).unwrap().detections, vec![b, a]);
        assert_eq!(backend.detect(&frame).unwrap().detections, vec![a]);

        let mut empty = StubBackend::new();
        assert!(empty.detect(&frame).unwrap().detections.is_empty());
    }
}
