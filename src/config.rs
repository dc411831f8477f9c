use std::time::Duration;

#[derive(Debug, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub display: DisplayConfig,

    pub output: OutputConfig,

    #[serde(default)]
    pub listener: ListenerConfig,

    #[serde(default)]
    pub state: StateConfig,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Number of displays on the multiplexer.
    pub channels: u8,

    pub max_text_len: usize,

    #[serde(with = "humantime_serde")]
    pub refresh_timeout: Duration,

    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// How long each step of the startup self test stays on the displays.
    #[serde(with = "humantime_serde")]
    pub selftest_pause: Duration,

    /// Lines shown on every display before the self test greets each one.
    pub selftest_banner: Vec<String>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            channels: 4,
            max_text_len: 36,
            refresh_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(100),
            selftest_pause: Duration::from_secs(2),
            selftest_banner: vec![
                "IBIS Server".to_string(),
                concat!("ibisd ", env!("CARGO_PKG_VERSION")).to_string(),
            ],
        }
    }
}

impl From<&DisplayConfig> for crate::scheduler::RefreshSettings {
    fn from(value: &DisplayConfig) -> Self {
        Self {
            refresh_timeout: value.refresh_timeout,
            poll_interval: value.poll_interval,
            max_text_len: value.max_text_len,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OutputConfig {
    /// IBIS bus on a tty, displays selected through DTR/RTS.
    Serial { device: camino::Utf8PathBuf },

    /// Only log what would be sent.
    Log,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    pub host: std::net::IpAddr,
    pub port: u16,

    /// A client has this long to send its request.
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,

    pub max_request_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
            port: 4242,
            read_timeout: Duration::from_secs(5),
            max_request_size: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub path: camino::Utf8PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: camino::Utf8PathBuf::from("ibis.json"),
        }
    }
}

impl Config {
    pub async fn load(path: &camino::Utf8Path) -> Result<Self, ConfigError> {
        let config_str =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::ReadingFile {
                    path: path.to_path_buf(),
                    source,
                })?;

        let config: Self = toml::from_str(&config_str).map_err(ConfigError::ParsingConfig)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let channels = self.display.channels;
        if channels == 0 {
            return Err(ConfigError::NoChannels);
        }

        if matches!(self.output, OutputConfig::Serial { .. }) && channels > 4 {
            return Err(ConfigError::TooManyChannels(channels));
        }

        if self.display.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file from path '{}'", .path)]
    ReadingFile {
        path: camino::Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    ParsingConfig(#[from] toml::de::Error),

    #[error("At least one display channel is required")]
    NoChannels,

    #[error("The serial selector addresses at most 4 displays, {0} configured")]
    TooManyChannels(u8),

    #[error("poll_interval must be greater than zero")]
    ZeroPollInterval,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Config;
    use super::OutputConfig;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [output]
            kind = "log"
            "#,
        )
        .unwrap();
        config.validate().unwrap();

        assert!(matches!(config.output, OutputConfig::Log));
        assert_eq!(config.display.channels, 4);
        assert_eq!(config.display.max_text_len, 36);
        assert_eq!(config.display.refresh_timeout, Duration::from_secs(120));
        assert_eq!(config.display.poll_interval, Duration::from_millis(100));
        assert_eq!(config.display.selftest_banner[0], "IBIS Server");
        assert_eq!(config.listener.port, 4242);
        assert_eq!(config.state.path, "ibis.json");
    }

    #[test]
    fn test_full_config() {
        let config: Config = toml::from_str(
            r#"
            [display]
            channels = 2
            max_text_len = 24
            refresh_timeout = "90s"
            poll_interval = "250ms"
            selftest_pause = "1s"
            selftest_banner = ["Linie 7", "Hauptbahnhof"]

            [output]
            kind = "serial"
            device = "/dev/ttyUSB0"

            [listener]
            host = "127.0.0.1"
            port = 4245
            read_timeout = "2s"
            max_request_size = 4096

            [state]
            path = "/var/lib/ibisd/state.json"
            "#,
        )
        .unwrap();
        config.validate().unwrap();

        assert!(
            matches!(config.output, OutputConfig::Serial { ref device } if device == "/dev/ttyUSB0")
        );
        assert_eq!(config.display.refresh_timeout, Duration::from_secs(90));
        assert_eq!(config.display.selftest_banner, ["Linie 7", "Hauptbahnhof"]);
        assert_eq!(config.listener.read_timeout, Duration::from_secs(2));
        assert_eq!(config.state.path, "/var/lib/ibisd/state.json");
    }

    #[test]
    fn test_serial_selector_limit() {
        let config: Config = toml::from_str(
            r#"
            [display]
            channels = 5

            [output]
            kind = "serial"
            device = "/dev/ttyUSB0"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_output_is_required() {
        assert!(toml::from_str::<Config>("[display]\nchannels = 4\n").is_err());
    }
}
