use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::annotate::{AnnotationStyle, DEFAULT_PANEL_ALPHA, DEFAULT_REGION_ALPHA};
use crate::detect::VehicleClass;
use crate::evaluate::{
    ThresholdConfig, DEFAULT_BUS_THRESHOLD, DEFAULT_CAR_THRESHOLD, DEFAULT_OVERALL_THRESHOLD,
    DEFAULT_TRUCK_THRESHOLD,
};
use crate::pipeline::{PipelineSettings, DEFAULT_FRAME_SKIP};
use crate::regions::DEFAULT_REGIONS_PATH;

const DEFAULT_OUTPUT_DIR: &str = "output_result";
const DEFAULT_MODEL_PATH: &str = "yolo11m.onnx";
const DEFAULT_MODEL_INPUT: u32 = 640;
const DEFAULT_CONFIDENCE: f32 = 0.25;

#[derive(Debug, Deserialize, Default)]
struct CongestionConfigFile {
    regions_path: Option<PathBuf>,
    frame_skip: Option<i64>,
    thresholds: Option<ThresholdsFile>,
    annotation: Option<AnnotationFile>,
    output: Option<OutputFile>,
    detector: Option<DetectorFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ThresholdsFile {
    car: Option<i64>,
    truck: Option<i64>,
    bus: Option<i64>,
    /// Counting motorcycles is opt-in.
    motorcycle: Option<i64>,
    overall: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
struct AnnotationFile {
    region_alpha: Option<f32>,
    panel_alpha: Option<f32>,
    font_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputFile {
    dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorFile {
    model_path: Option<PathBuf>,
    input_size: Option<u32>,
    confidence: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct CongestionConfig {
    pub regions_path: PathBuf,
    pub frame_skip: u32,
    pub thresholds: ThresholdConfig,
    pub style: AnnotationStyle,
    pub font_path: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub detector: DetectorSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSettings {
    pub model_path: PathBuf,
    pub input_size: u32,
    pub confidence: f32,
}

impl CongestionConfig {
    /// Load from the file named by `ROI_CONFIG` (if set), then apply `ROI_*` overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ROI_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            frame_skip: self.frame_skip,
            thresholds: self.thresholds.clone(),
        }
    }

    fn from_file(file: CongestionConfigFile) -> Result<Self> {
        let thresholds_file = file.thresholds.unwrap_or_default();
        let mut thresholds = ThresholdConfig::new(
            non_negative("thresholds.car", thresholds_file.car, DEFAULT_CAR_THRESHOLD)?,
            non_negative("thresholds.truck", thresholds_file.truck, DEFAULT_TRUCK_THRESHOLD)?,
            non_negative("thresholds.bus", thresholds_file.bus, DEFAULT_BUS_THRESHOLD)?,
            non_negative(
                "thresholds.overall",
                thresholds_file.overall,
                DEFAULT_OVERALL_THRESHOLD,
            )?,
        );
        if let Some(value) = thresholds_file.motorcycle {
            let value = non_negative("thresholds.motorcycle", Some(value), 0)?;
            thresholds = thresholds.with_class(VehicleClass::Motorcycle, value);
        }

        let frame_skip = match file.frame_skip {
            Some(n) if n < 1 => return Err(anyhow!("frame_skip must be >= 1, got {}", n)),
            Some(n) => u32::try_from(n).map_err(|_| anyhow!("frame_skip is too large: {}", n))?,
            None => DEFAULT_FRAME_SKIP,
        };

        let annotation = file.annotation.unwrap_or_default();
        let style = AnnotationStyle {
            region_alpha: annotation.region_alpha.unwrap_or(DEFAULT_REGION_ALPHA),
            panel_alpha: annotation.panel_alpha.unwrap_or(DEFAULT_PANEL_ALPHA),
        };

        let detector = file.detector.unwrap_or_default();
        Ok(Self {
            regions_path: file
                .regions_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REGIONS_PATH)),
            frame_skip,
            thresholds,
            style,
            font_path: annotation.font_path,
            output_dir: file
                .output
                .and_then(|output| output.dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            detector: DetectorSettings {
                model_path: detector
                    .model_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
                input_size: detector.input_size.unwrap_or(DEFAULT_MODEL_INPUT),
                confidence: detector.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            },
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(path) = env_path("ROI_REGIONS_PATH") {
            self.regions_path = path;
        }
        if let Some(path) = env_path("ROI_OUTPUT_DIR") {
            self.output_dir = path;
        }
        if let Some(path) = env_path("ROI_FONT_PATH") {
            self.font_path = Some(path);
        }
        if let Some(path) = env_path("ROI_MODEL_PATH") {
            self.detector.model_path = path;
        }
        if let Ok(skip) = std::env::var("ROI_FRAME_SKIP") {
            let n: i64 = skip
                .trim()
                .parse()
                .map_err(|_| anyhow!("ROI_FRAME_SKIP must be an integer"))?;
            if n < 1 {
                return Err(anyhow!("ROI_FRAME_SKIP must be >= 1, got {}", n));
            }
            self.frame_skip =
                u32::try_from(n).map_err(|_| anyhow!("ROI_FRAME_SKIP is too large: {}", n))?;
        }

        let mut class_override = |key: &str, class: VehicleClass| -> Result<()> {
            if let Some(value) = env_threshold(key)? {
                self.thresholds = self.thresholds.clone().with_class(class, value);
            }
            Ok(())
        };
        class_override("ROI_CAR_THRESHOLD", VehicleClass::Car)?;
        class_override("ROI_TRUCK_THRESHOLD", VehicleClass::Truck)?;
        class_override("ROI_BUS_THRESHOLD", VehicleClass::Bus)?;

        if let Some(overall) = env_threshold("ROI_OVERALL_THRESHOLD")? {
            self.thresholds = self.thresholds.clone().with_overall(overall);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.frame_skip == 0 {
            return Err(anyhow!("frame_skip must be >= 1"));
        }
        for (name, alpha) in [
            ("annotation.region_alpha", self.style.region_alpha),
            ("annotation.panel_alpha", self.style.panel_alpha),
        ] {
            if !(0.0..=1.0).contains(&alpha) {
                return Err(anyhow!("{} must be within [0, 1], got {}", name, alpha));
            }
        }
        if self.detector.input_size == 0 {
            return Err(anyhow!("detector.input_size must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.detector.confidence) {
            return Err(anyhow!(
                "detector.confidence must be within [0, 1], got {}",
                self.detector.confidence
            ));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<CongestionConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn non_negative(field: &str, value: Option<i64>, default: u32) -> Result<u32> {
    match value {
        None => Ok(default),
        Some(v) if v < 0 => Err(anyhow!("{} must be non-negative, got {}", field, v)),
        Some(v) => u32::try_from(v).map_err(|_| anyhow!("{} is too large: {}", field, v)),
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
}

fn env_threshold(key: &str) -> Result<Option<u32>> {
    let Ok(raw) = std::env::var(key) else {
        return Ok(None);
    };
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| anyhow!("{} must be an integer", key))?;
    non_negative(key, Some(value), 0).map(Some)
}
