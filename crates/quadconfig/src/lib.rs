use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to read configuration at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Which parts of the pipeline run every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantSetting {
    /// Clear with the animated color, then draw the quad with transforms and
    /// the inverse fill color.
    #[default]
    Full,
    /// Only clear with the animated color.
    Clear,
}

/// What linking does when an optional uniform is absent from the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingUniformSetting {
    #[default]
    Skip,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct QuadConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub window: WindowSection,
    #[serde(default)]
    pub render: RenderSection,
    #[serde(default)]
    pub shaders: ShaderSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowSection {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderSection {
    #[serde(deserialize_with = "deserialize_variant")]
    pub variant: VariantSetting,
    pub frame_quantum: f64,
    #[serde(deserialize_with = "deserialize_missing_uniform")]
    pub missing_uniform: MissingUniformSetting,
    pub vsync: bool,
    pub rates: RateSection,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateSection {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ShaderSection {
    #[serde(default)]
    pub vertex: Option<PathBuf>,
    #[serde(default)]
    pub fragment: Option<PathBuf>,
}

fn default_version() -> u32 {
    1
}

impl Default for QuadConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            window: WindowSection::default(),
            render: RenderSection::default(),
            shaders: ShaderSection::default(),
        }
    }
}

impl Default for WindowSection {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "chromaquad".into(),
        }
    }
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            variant: VariantSetting::default(),
            frame_quantum: 0.16,
            missing_uniform: MissingUniformSetting::default(),
            vsync: true,
            rates: RateSection::default(),
        }
    }
}

impl Default for RateSection {
    fn default() -> Self {
        Self {
            red: 0.01,
            green: 0.05,
            blue: 0.03,
        }
    }
}

fn deserialize_variant<'de, D>(deserializer: D) -> Result<VariantSetting, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_variant(&raw).map_err(de::Error::custom)
}

fn deserialize_missing_uniform<'de, D>(deserializer: D) -> Result<MissingUniformSetting, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_missing_uniform(&raw).map_err(de::Error::custom)
}

/// Parses a render variant name, accepting a few common aliases.
pub fn parse_variant(raw: &str) -> Result<VariantSetting, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "full" | "3d" | "quad" => Ok(VariantSetting::Full),
        "clear" | "clear-only" | "simple" => Ok(VariantSetting::Clear),
        other => Err(format!("invalid render variant '{other}'")),
    }
}

/// Parses a missing-uniform policy name.
pub fn parse_missing_uniform(raw: &str) -> Result<MissingUniformSetting, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "skip" | "ignore" => Ok(MissingUniformSetting::Skip),
        "fail" | "error" | "strict" => Ok(MissingUniformSetting::Fail),
        other => Err(format!("invalid missing-uniform policy '{other}'")),
    }
}

impl fmt::Display for VariantSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantSetting::Full => f.write_str("full"),
            VariantSetting::Clear => f.write_str("clear"),
        }
    }
}

impl fmt::Display for MissingUniformSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingUniformSetting::Skip => f.write_str("skip"),
            MissingUniformSetting::Fail => f.write_str("fail"),
        }
    }
}

impl QuadConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: QuadConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads and validates the file at `path`. Relative shader paths are
    /// resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&contents)?;
        if let Some(base) = path.parent() {
            config.shaders.resolve_relative_to(base);
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size must be non-zero (got {}x{})",
                self.window.width, self.window.height
            )));
        }

        let quantum = self.render.frame_quantum;
        if !quantum.is_finite() || quantum <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "render.frame_quantum must be a positive number (got {quantum})"
            )));
        }

        let rates = &self.render.rates;
        for (channel, rate) in [("red", rates.red), ("green", rates.green), ("blue", rates.blue)] {
            if !rate.is_finite() || rate < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "render.rates.{channel} must be >= 0 (got {rate})"
                )));
            }
        }

        for (stage, path) in [("vertex", &self.shaders.vertex), ("fragment", &self.shaders.fragment)] {
            if let Some(path) = path {
                if path.as_os_str().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "shaders.{stage} may not be an empty path"
                    )));
                }
            }
        }

        Ok(())
    }
}

impl ShaderSection {
    fn resolve_relative_to(&mut self, base: &Path) {
        for path in [&mut self.vertex, &mut self.fragment].into_iter().flatten() {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1

[window]
width = 800
height = 600
title = "demo"

[render]
variant = "clear"
frame_quantum = 0.32
missing_uniform = "strict"
vsync = false

[render.rates]
red = 0.02
green = 0.04
blue = 0.06

[shaders]
fragment = "custom.frag"
"#;

    #[test]
    fn parses_sample_config() {
        let config = QuadConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.title, "demo");
        assert_eq!(config.render.variant, VariantSetting::Clear);
        assert_eq!(config.render.missing_uniform, MissingUniformSetting::Fail);
        assert!(!config.render.vsync);
        assert_eq!(config.render.rates.green, 0.04);
        assert_eq!(config.shaders.fragment, Some(PathBuf::from("custom.frag")));
        assert_eq!(config.shaders.vertex, None);
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = QuadConfig::from_toml_str("").expect("parse config");
        assert_eq!(config, QuadConfig::default());
        assert_eq!(config.render.frame_quantum, 0.16);
        assert_eq!(config.render.rates.red, 0.01);
        assert_eq!(config.render.rates.green, 0.05);
        assert_eq!(config.render.rates.blue, 0.03);
        assert_eq!(config.render.variant, VariantSetting::Full);
        assert_eq!(config.render.missing_uniform, MissingUniformSetting::Skip);
    }

    #[test]
    fn rejects_unknown_version() {
        let err = QuadConfig::from_toml_str("version = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_non_positive_quantum() {
        let err = QuadConfig::from_toml_str("[render]\nframe_quantum = 0.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_negative_rate() {
        let err = QuadConfig::from_toml_str("[render.rates]\nblue = -0.5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_variant() {
        let err = QuadConfig::from_toml_str("[render]\nvariant = \"wireframe\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_resolves_shader_paths_next_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chromaquad.toml");
        std::fs::write(&path, "[shaders]\nvertex = \"quad.vert\"\n").unwrap();

        let config = QuadConfig::load(&path).expect("load config");
        assert_eq!(config.shaders.vertex, Some(dir.path().join("quad.vert")));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = QuadConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
