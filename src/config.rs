use crate::preset::clamp_scale;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// User-facing scaling options. The engine reads a copy every tick and never writes it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleConfig {
    #[serde(default = "ScaleConfig::default_scale")]
    pub self_scale: f32,
    #[serde(default = "ScaleConfig::default_true")]
    pub self_smoothing: bool,
    #[serde(default)]
    pub others_scaling_enabled: bool,
    #[serde(default = "ScaleConfig::default_scale")]
    pub others_scale: f32,
    #[serde(default = "ScaleConfig::default_true")]
    pub others_smoothing: bool,
    #[serde(default)]
    pub apply_to_all: bool,
    #[serde(default = "ScaleConfig::default_true")]
    pub presets_enabled: bool,
    #[serde(default = "ScaleConfig::default_true")]
    pub gating_enabled: bool,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            self_scale: Self::default_scale(),
            self_smoothing: true,
            others_scaling_enabled: false,
            others_scale: Self::default_scale(),
            others_smoothing: true,
            apply_to_all: false,
            presets_enabled: true,
            gating_enabled: true,
        }
    }
}

impl ScaleConfig {
    const fn default_scale() -> f32 {
        1.0
    }

    const fn default_true() -> bool {
        true
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg: ScaleConfig = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg.sanitized())
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("Config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating config directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json.as_bytes()).with_context(|| format!("Writing config file {}", path.display()))?;
        Ok(())
    }

    /// Clamps both scales into the supported range.
    pub fn sanitized(mut self) -> Self {
        self.self_scale = clamp_scale(self.self_scale);
        self.others_scale = clamp_scale(self.others_scale);
        self
    }

    pub fn apply_overrides(&mut self, overrides: &ScaleConfigOverrides) {
        if let Some(scale) = overrides.self_scale {
            self.self_scale = clamp_scale(scale);
        }
        if let Some(scale) = overrides.others_scale {
            self.others_scale = clamp_scale(scale);
            self.others_scaling_enabled = true;
        }
        if let Some(enabled) = overrides.gating_enabled {
            self.gating_enabled = enabled;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScaleConfigOverrides {
    pub self_scale: Option<f32>,
    pub others_scale: Option<f32>,
    pub gating_enabled: Option<bool>,
}

impl ScaleConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.self_scale.is_none() && self.others_scale.is_none() && self.gating_enabled.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.self_scale.is_some() {
            fields.push("self_scale");
        }
        if self.others_scale.is_some() {
            fields.push("others_scale");
        }
        if self.gating_enabled.is_some() {
            fields.push("gating");
        }
        fields
    }
}

/// Timing and smoothing constants for the interpolation engine and classifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub tick_interval: Duration,
    pub classify_interval: Duration,
    pub smoothing_factor: f32,
    pub snap_epsilon: f32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(16),
            classify_interval: Duration::from_millis(1_000),
            smoothing_factor: 0.1,
            snap_epsilon: 0.001,
        }
    }
}
