use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// Which device backend the locator probes: "mjpeg" or "v4l".
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Number of device indices swept by the locator (0..max_index).
    #[serde(default = "default_max_index")]
    pub max_index: u32,
    /// Network camera stream URLs; sweep index `i` opens `mjpeg_urls[i]`.
    #[serde(default)]
    pub mjpeg_urls: Vec<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Upper bound on a single frame read before the device counts as failed.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplerConfig {
    #[serde(default = "default_radius")]
    pub radius: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_quality")]
    pub quality: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            max_index: default_max_index(),
            mjpeg_urls: Vec::new(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            width: default_width(),
            height: default_height(),
        }
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            radius: default_radius(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            quality: default_quality(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if config.capture.read_timeout_secs == 0 {
            return Err(ConfigError::Parse(
                "capture.read_timeout_secs must be at least 1".into(),
            ));
        }
        if !(1..=100).contains(&config.stream.quality) {
            return Err(ConfigError::Parse(format!(
                "stream.quality must be within 1..=100, got {}",
                config.stream.quality
            )));
        }
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

// Default value functions
fn default_bind() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    5000
}
fn default_backend() -> String {
    "mjpeg".into()
}
fn default_max_index() -> u32 {
    5
}
fn default_connect_timeout() -> u64 {
    5
}
fn default_read_timeout() -> u64 {
    5
}
fn default_width() -> u32 {
    640
}
fn default_height() -> u32 {
    480
}
fn default_radius() -> u32 {
    50
}
fn default_quality() -> u8 {
    80
}
fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.capture.backend, "mjpeg");
        assert_eq!(config.capture.max_index, 5);
        assert_eq!(config.capture.read_timeout_secs, 5);
        assert!(config.capture.mjpeg_urls.is_empty());
        assert_eq!(config.sampler.radius, 50);
        assert_eq!(config.stream.quality, 80);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let config = Config::parse(
            r#"
            [capture]
            mjpeg_urls = ["http://10.0.0.5:8080/stream"]

            [server]
            port = 8081
            "#,
        )
        .unwrap();
        assert_eq!(config.capture.mjpeg_urls.len(), 1);
        assert_eq!(config.capture.max_index, 5);
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.bind, "127.0.0.1");
    }

    #[test]
    fn rejects_out_of_range_quality() {
        let err = Config::parse("[stream]\nquality = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_unbounded_read_timeout() {
        let err = Config::parse("[capture]\nread_timeout_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = Config::load(Path::new("/nonexistent/color-lock.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile(..)));
    }
}
