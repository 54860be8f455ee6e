use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::ModelKind;
use crate::grouping::{EngineParams, DEFAULT_GROUP_RATIO, DEFAULT_MAX_HEIGHT_DIFF};
use crate::ingest::file::{DEFAULT_STUB_HEIGHT, DEFAULT_STUB_WIDTH};
use crate::ingest::FileConfig;
use crate::throttle::DEFAULT_INTERVAL;

const DEFAULT_SOURCE: &str = "stub://camera";
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_MODEL: ModelKind = ModelKind::YoloV4Tiny;
const DEFAULT_MODELS_DIR: &str = "models";
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.4;
const DEFAULT_NMS_THRESHOLD: f32 = 0.3;
const DEFAULT_INPUT_SIZE: u32 = 416;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DistancingConfigFile {
    source: Option<SourceConfigFile>,
    detector: Option<DetectorConfigFile>,
    engine: Option<EngineConfigFile>,
    throttle: Option<ThrottleConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SourceConfigFile {
    path: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    max_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectorConfigFile {
    backend: Option<String>,
    model: Option<String>,
    models_dir: Option<PathBuf>,
    confidence_threshold: Option<f32>,
    nms_threshold: Option<f32>,
    input_size: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct EngineConfigFile {
    group_ratio: Option<f64>,
    max_height_diff: Option<i32>,
    seed: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ThrottleConfigFile {
    interval: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct DistancingConfig {
    pub source: FileConfig,
    pub detector: DetectorSettings,
    pub engine: EngineParams,
    /// Palette seed. `None` draws a fresh palette per session.
    pub palette_seed: Option<u64>,
    pub throttle_interval: u64,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub model: ModelKind,
    pub models_dir: PathBuf,
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
    pub input_size: u32,
}

impl DetectorSettings {
    pub fn model_path(&self) -> PathBuf {
        self.model.model_path(&self.models_dir)
    }
}

impl DistancingConfig {
    /// Defaults, overlaid by `$DISTANCING_CONFIG` (TOML) and then by environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("DISTANCING_CONFIG")
            .ok()
            .filter(|path| !path.trim().is_empty());
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Like `load`, with an explicit config file in place of `$DISTANCING_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => DistancingConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse and validate a TOML document without consulting the environment.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: DistancingConfigFile =
            toml::from_str(raw).map_err(|e| anyhow!("invalid config: {}", e))?;
        let mut cfg = Self::from_file(file)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: DistancingConfigFile) -> Result<Self> {
        let source_file = file.source.unwrap_or_default();
        let source = FileConfig {
            path: source_file
                .path
                .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            width: source_file.width.unwrap_or(DEFAULT_STUB_WIDTH),
            height: source_file.height.unwrap_or(DEFAULT_STUB_HEIGHT),
            max_frames: source_file.max_frames,
        };

        let detector_file = file.detector.unwrap_or_default();
        let model = match detector_file.model.as_deref() {
            Some(name) => name.parse()?,
            None => DEFAULT_MODEL,
        };
        let detector = DetectorSettings {
            backend: detector_file
                .backend
                .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            model,
            models_dir: detector_file
                .models_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODELS_DIR)),
            confidence_threshold: detector_file
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            nms_threshold: detector_file.nms_threshold.unwrap_or(DEFAULT_NMS_THRESHOLD),
            input_size: detector_file.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
        };

        let engine_file = file.engine.unwrap_or_default();
        let engine = EngineParams {
            group_ratio: engine_file.group_ratio.unwrap_or(DEFAULT_GROUP_RATIO),
            max_height_diff: engine_file
                .max_height_diff
                .unwrap_or(DEFAULT_MAX_HEIGHT_DIFF),
        };

        let throttle_interval = file
            .throttle
            .and_then(|throttle| throttle.interval)
            .unwrap_or(DEFAULT_INTERVAL);

        Ok(Self {
            source,
            detector,
            engine,
            palette_seed: engine_file.seed,
            throttle_interval,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("DISTANCING_SOURCE") {
            if !path.trim().is_empty() {
                self.source.path = path;
            }
        }
        if let Ok(backend) = std::env::var("DISTANCING_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend.trim().to_string();
            }
        }
        if let Ok(model) = std::env::var("DISTANCING_MODEL") {
            if !model.trim().is_empty() {
                self.detector.model = model.trim().parse()?;
            }
        }
        if let Ok(interval) = std::env::var("DISTANCING_THROTTLE_INTERVAL") {
            self.throttle_interval = interval.trim().parse().map_err(|_| {
                anyhow!("DISTANCING_THROTTLE_INTERVAL must be a positive integer")
            })?;
        }
        if let Ok(seed) = std::env::var("DISTANCING_SEED") {
            let seed: u64 = seed
                .trim()
                .parse()
                .map_err(|_| anyhow!("DISTANCING_SEED must be an unsigned integer"))?;
            self.palette_seed = Some(seed);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.source.path.trim().is_empty() {
            return Err(anyhow!("source path must not be empty"));
        }
        if !self.engine.group_ratio.is_finite() || self.engine.group_ratio < 1.0 {
            return Err(anyhow!(
                "engine.group_ratio must be a finite number >= 1.0 (got {})",
                self.engine.group_ratio
            ));
        }
        if self.engine.max_height_diff <= 0 {
            return Err(anyhow!("engine.max_height_diff must be greater than zero"));
        }
        if self.throttle_interval == 0 {
            return Err(anyhow!("throttle.interval must be at least 1"));
        }
        for (name, value) in [
            ("detector.confidence_threshold", self.detector.confidence_threshold),
            ("detector.nms_threshold", self.detector.nms_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(anyhow!("{} must be in (0, 1] (got {})", name, value));
            }
        }
        if self.detector.input_size == 0 {
            return Err(anyhow!("detector.input_size must be greater than zero"));
        }
        self.detector.backend = self.detector.backend.to_lowercase();
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<DistancingConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = DistancingConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.source.path, DEFAULT_SOURCE);
        assert_eq!(cfg.detector.backend, "stub");
        assert_eq!(cfg.detector.model, ModelKind::YoloV4Tiny);
        assert_eq!(cfg.engine, EngineParams::default());
        assert_eq!(cfg.throttle_interval, 4);
        assert!(cfg.palette_seed.is_none());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(DistancingConfig::from_toml_str("[engine]\ngroup_ratio = 0.9").is_err());
        assert!(DistancingConfig::from_toml_str("[engine]\nmax_height_diff = 0").is_err());
        assert!(DistancingConfig::from_toml_str("[throttle]\ninterval = 0").is_err());
        assert!(DistancingConfig::from_toml_str("[detector]\nnms_threshold = 1.5").is_err());
        assert!(DistancingConfig::from_toml_str("[detector]\nmodel = \"yolov9\"").is_err());
        assert!(DistancingConfig::from_toml_str("[source]\npath = \" \"").is_err());
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(DistancingConfig::from_toml_str("[engine]\nratio = 1.2").is_err());
    }

    #[test]
    fn model_path_joins_models_dir() {
        let cfg = DistancingConfig::from_toml_str(
            "[detector]\nmodel = \"yolov3\"\nmodels_dir = \"/opt/models\"",
        )
        .unwrap();
        assert_eq!(cfg.detector.model_path(), PathBuf::from("/opt/models/yolov3.onnx"));
    }
}
