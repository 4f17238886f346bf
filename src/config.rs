use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::ObjectLabel;
use crate::validate_source_id;

const DEFAULT_STORE_ROOT: &str = "object";
const DEFAULT_MEDIA_ROOT: &str = "Media";
const DEFAULT_SOURCES: &[&str] = &["1", "2", "3"];
const DEFAULT_TARGET_FPS: u32 = 10;
const DEFAULT_FRAME_WIDTH: u32 = 1280;
const DEFAULT_FRAME_HEIGHT: u32 = 720;
const DEFAULT_MODEL_INPUT: u32 = 640;
const DEFAULT_HEALTH_LOG_SECS: u64 = 5;

#[derive(Debug, Deserialize, Default)]
struct MonitorConfigFile {
    store: Option<StoreConfigFile>,
    media: Option<MediaConfigFile>,
    detector: Option<DetectorConfigFile>,
    health_log_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct StoreConfigFile {
    root: Option<PathBuf>,
    backend: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct MediaConfigFile {
    root: Option<String>,
    sources: Option<Vec<String>>,
    initial_source: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    model_path: Option<PathBuf>,
    input_size: Option<u32>,
    confidence_threshold: Option<f32>,
    vehicle_labels: Option<Vec<String>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    File,
    Sqlite,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "file" | "json" => Ok(StoreBackend::File),
            "sqlite" => Ok(StoreBackend::Sqlite),
            other => Err(anyhow!(
                "unknown store backend '{}' (expected file or sqlite)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub root: PathBuf,
    pub backend: StoreBackend,
}

#[derive(Debug, Clone)]
pub struct MediaSettings {
    /// Directory holding `<source_id>.mp4`, or `stub://...` for synthetic streams.
    pub root: String,
    /// Rotation used by "next source".
    pub sources: Vec<String>,
    pub initial_source: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub model_path: Option<PathBuf>,
    pub input_size: u32,
    pub confidence_threshold: Option<f32>,
    pub vehicle_labels: Vec<ObjectLabel>,
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub store: StoreSettings,
    pub media: MediaSettings,
    pub detector: DetectorSettings,
    pub health_log_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            store: StoreSettings {
                root: PathBuf::from(DEFAULT_STORE_ROOT),
                backend: StoreBackend::File,
            },
            media: MediaSettings {
                root: DEFAULT_MEDIA_ROOT.to_string(),
                sources: DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect(),
                initial_source: DEFAULT_SOURCES[0].to_string(),
                target_fps: DEFAULT_TARGET_FPS,
                width: DEFAULT_FRAME_WIDTH,
                height: DEFAULT_FRAME_HEIGHT,
            },
            detector: DetectorSettings {
                model_path: None,
                input_size: DEFAULT_MODEL_INPUT,
                confidence_threshold: None,
                vehicle_labels: ObjectLabel::DEFAULT_VEHICLES.to_vec(),
            },
            health_log_interval: Duration::from_secs(DEFAULT_HEALTH_LOG_SECS),
        }
    }
}

impl MonitorConfig {
    /// Defaults, then the file named by `PARKING_CONFIG`, then env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PARKING_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MonitorConfigFile) -> Result<Self> {
        let mut cfg = Self::default();

        if let Some(store) = file.store {
            if let Some(root) = store.root {
                cfg.store.root = root;
            }
            if let Some(backend) = store.backend {
                cfg.store.backend = backend.parse()?;
            }
        }

        if let Some(media) = file.media {
            if let Some(root) = media.root {
                cfg.media.root = root;
            }
            if let Some(sources) = media.sources {
                cfg.media.sources = sources;
            }
            cfg.media.initial_source = media
                .initial_source
                .or_else(|| cfg.media.sources.first().cloned())
                .unwrap_or_else(|| DEFAULT_SOURCES[0].to_string());
            cfg.media.target_fps = media.target_fps.unwrap_or(cfg.media.target_fps);
            cfg.media.width = media.width.unwrap_or(cfg.media.width);
            cfg.media.height = media.height.unwrap_or(cfg.media.height);
        }

        if let Some(detector) = file.detector {
            cfg.detector.model_path = detector.model_path;
            cfg.detector.input_size = detector.input_size.unwrap_or(cfg.detector.input_size);
            cfg.detector.confidence_threshold = detector.confidence_threshold;
            if let Some(labels) = detector.vehicle_labels {
                cfg.detector.vehicle_labels = parse_labels(&labels)?;
            }
        }

        if let Some(secs) = file.health_log_secs {
            cfg.health_log_interval = Duration::from_secs(secs);
        }

        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(root) = std::env::var("PARKING_STORE_ROOT") {
            if !root.trim().is_empty() {
                self.store.root = PathBuf::from(root);
            }
        }
        if let Ok(backend) = std::env::var("PARKING_STORE_BACKEND") {
            if !backend.trim().is_empty() {
                self.store.backend = backend.parse()?;
            }
        }
        if let Ok(root) = std::env::var("PARKING_MEDIA_ROOT") {
            if !root.trim().is_empty() {
                self.media.root = root;
            }
        }
        if let Ok(sources) = std::env::var("PARKING_SOURCES") {
            let parsed = split_csv(&sources);
            if !parsed.is_empty() {
                self.media.sources = parsed;
            }
        }
        if let Ok(source) = std::env::var("PARKING_SOURCE") {
            if !source.trim().is_empty() {
                self.media.initial_source = source.trim().to_string();
            }
        }
        if let Ok(fps) = std::env::var("PARKING_TARGET_FPS") {
            self.media.target_fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("PARKING_TARGET_FPS must be an integer"))?;
        }
        if let Ok(labels) = std::env::var("PARKING_VEHICLE_LABELS") {
            let parsed = split_csv(&labels);
            if !parsed.is_empty() {
                self.detector.vehicle_labels = parse_labels(&parsed)?;
            }
        }
        if let Ok(path) = std::env::var("PARKING_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detector.model_path = Some(PathBuf::from(path));
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.media.sources.is_empty() {
            return Err(anyhow!("at least one video source must be configured"));
        }
        for source in &self.media.sources {
            validate_source_id(source)?;
        }
        validate_source_id(&self.media.initial_source)?;
        if !self.media.sources.contains(&self.media.initial_source) {
            self.media.sources.push(self.media.initial_source.clone());
        }
        if self.media.target_fps == 0 {
            return Err(anyhow!("target_fps must be greater than zero"));
        }
        if self.media.width == 0 || self.media.height == 0 {
            return Err(anyhow!("frame width and height must be greater than zero"));
        }
        if self.detector.input_size == 0 {
            return Err(anyhow!("detector input_size must be greater than zero"));
        }
        if self.detector.vehicle_labels.is_empty() {
            return Err(anyhow!("at least one vehicle label is required"));
        }
        Ok(())
    }

    /// The source after `current` in the rotation, wrapping to the first.
    /// An id outside the rotation maps to the first source.
    pub fn next_source(&self, current: &str) -> &str {
        let sources = &self.media.sources;
        match sources.iter().position(|s| s == current) {
            Some(i) => &sources[(i + 1) % sources.len()],
            None => &sources[0],
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(1000 / self.media.target_fps.max(1) as u64)
    }
}

fn read_config_file(path: &Path) -> Result<MonitorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_labels(names: &[String]) -> Result<Vec<ObjectLabel>> {
    names.iter().map(|name| name.parse()).collect()
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
