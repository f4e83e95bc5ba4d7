#[cfg(feature = "cli")]
pub mod cli;

use crate::core::cluster::ClusterOptions;
use crate::core::viewport::Viewport;
use crate::utils::error::{AtlasError, Result};
use crate::utils::validation::{validate_positive_number, validate_range, validate_url, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub map: MapConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost:5001/".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub radius: f64,
    pub extent: f64,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub min_points: usize,
    pub tile_size: f64,
    pub initial_latitude: f64,
    pub initial_longitude: f64,
    pub initial_zoom: f64,
    pub width: u32,
    pub height: u32,
}

impl Default for MapConfig {
    fn default() -> Self {
        let cluster = ClusterOptions::default();
        Self {
            radius: cluster.radius,
            extent: cluster.extent,
            min_zoom: cluster.min_zoom,
            max_zoom: cluster.max_zoom,
            min_points: cluster.min_points,
            tile_size: crate::core::viewport::DEFAULT_TILE_SIZE,
            // 莫斯科市中心
            initial_latitude: 55.7558,
            initial_longitude: 37.6173,
            initial_zoom: 10.0,
            width: 1280,
            height: 720,
        }
    }
}

impl MapConfig {
    pub fn cluster_options(&self) -> ClusterOptions {
        ClusterOptions {
            radius: self.radius,
            extent: self.extent,
            min_zoom: self.min_zoom,
            max_zoom: self.max_zoom,
            min_points: self.min_points,
        }
    }

    pub fn initial_viewport(&self) -> Viewport {
        Viewport {
            tile_size: self.tile_size,
            ..Viewport::new(
                self.initial_latitude,
                self.initial_longitude,
                self.initial_zoom,
                self.width,
                self.height,
            )
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "compact" 或 "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(AtlasError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| AtlasError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${BACKEND_URL})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| AtlasError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validate_url("backend.base_url", &self.backend.base_url)?;
        validate_positive_number("backend.timeout_seconds", self.backend.timeout_seconds as usize, 1)?;

        self.map.cluster_options().validate()?;
        validate_range("map.initial_latitude", self.map.initial_latitude, -90.0, 90.0)?;
        validate_range("map.initial_longitude", self.map.initial_longitude, -180.0, 180.0)?;
        validate_range(
            "map.initial_zoom",
            self.map.initial_zoom,
            self.map.min_zoom as f64,
            self.map.max_zoom as f64,
        )?;
        validate_positive_number("map.width", self.map.width as usize, 1)?;
        validate_positive_number("map.height", self.map.height as usize, 1)?;
        if !(self.map.tile_size.is_finite() && self.map.tile_size > 0.0) {
            return Err(AtlasError::InvalidConfigValueError {
                field: "map.tile_size".to_string(),
                value: self.map.tile_size.to_string(),
                reason: "Tile size must be a positive number".to_string(),
            });
        }

        let valid_formats = ["compact", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(AtlasError::InvalidConfigValueError {
                field: "logging.format".to_string(),
                value: self.logging.format.clone(),
                reason: format!(
                    "Unsupported format. Valid formats: {}",
                    valid_formats.join(", ")
                ),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.map.radius, 75.0);
        assert_eq!(config.map.max_zoom, 20);
        assert_eq!(config.backend.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_parse_partial_toml_config() {
        let toml_content = r#"
[backend]
base_url = "http://127.0.0.1:8000/"

[map]
radius = 60.0
initial_zoom = 12.5
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.backend.base_url, "http://127.0.0.1:8000/");
        assert_eq!(config.backend.timeout_seconds, 30);
        assert_eq!(config.map.cluster_options().radius, 60.0);
        assert_eq!(config.map.initial_viewport().zoom, 12.5);
        assert_eq!(config.logging.format, "compact");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("HOUSE_ATLAS_TEST_BACKEND", "https://reviews.example.com/");

        let toml_content = r#"
[backend]
base_url = "${HOUSE_ATLAS_TEST_BACKEND}"
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.backend.base_url, "https://reviews.example.com/");

        std::env::remove_var("HOUSE_ATLAS_TEST_BACKEND");
    }

    #[test]
    fn test_config_validation() {
        let config = AppConfig::from_toml_str(
            r#"
[backend]
base_url = "invalid-url"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        let config = AppConfig::from_toml_str(
            r#"
[map]
max_zoom = 40
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        let config = AppConfig::from_toml_str(
            r#"
[logging]
format = "xml"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let result = AppConfig::from_toml_str("[backend\nbase_url = 1");
        assert!(matches!(
            result,
            Err(AtlasError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[map]\nwidth = 800\nheight = 600\n")
            .unwrap();

        let config = AppConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.map.width, 800);
        assert_eq!(config.map.initial_viewport().height, 600);
    }
}
