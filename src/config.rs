//! On-disk configuration at `~/.config/clawlink/config.toml`.
//!
//! Every section and field is optional; anything missing falls back to the
//! defaults below.

use crate::control::{pointer::DEFAULT_STICK_RATIO, JoystickGeometry, Point};
use crate::session::SessionSettings;
use crate::transport::GattProfile;
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn, Level};

const CONFIG_DIR: &str = ".config/clawlink";
const CONFIG_FILE: &str = "config.toml";

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    pub timing: TimingConfig,
    pub joystick: JoystickConfig,
    pub device: DeviceConfig,
    pub gatt: GattProfile,
    pub log: LogConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    pub dispatch_interval_ms: u64,
    pub poll_interval_ms: u64,
    pub channel_debounce_ms: u64,
    pub command_debounce_ms: u64,
    pub zero_resend_budget: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            dispatch_interval_ms: 30, // axis triple cadence
            poll_interval_ms: 1000,   // usability check
            channel_debounce_ms: 40,  // slider coalescing window
            command_debounce_ms: 120, // per button
            zero_resend_budget: 5,    // stop frames after release
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct JoystickConfig {
    pub base_diameter: f32,
    pub stick_ratio: f32,
}

impl Default for JoystickConfig {
    fn default() -> Self {
        Self {
            base_diameter: 200.0,
            stick_ratio: DEFAULT_STICK_RATIO,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    pub address: String,
    /// Axis frames the dry-run device loses, one in every N. 0 loses none.
    pub simulated_axis_loss: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: "3C:0F:02:D1:D3:8A".to_string(),
            simulated_axis_loss: 3,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| eyre!("Failed to parse config file: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects timings the scheduler cannot run with.
    pub fn validate(&self) -> Result<()> {
        let timing = &self.timing;
        for (name, value) in [
            ("dispatch_interval_ms", timing.dispatch_interval_ms),
            ("poll_interval_ms", timing.poll_interval_ms),
            ("channel_debounce_ms", timing.channel_debounce_ms),
            ("command_debounce_ms", timing.command_debounce_ms),
        ] {
            if value == 0 {
                return Err(eyre!("Invalid config: timing.{} must be at least 1", name));
            }
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| eyre!("Failed to serialize config: {}", e))
    }

    pub fn config_path() -> PathBuf {
        let mut path = get_home_dir();
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    /// Reads the config file, falling back to defaults when it does not exist.
    pub async fn load() -> Result<Self> {
        let path = Self::config_path();
        if !tokio::fs::try_exists(&path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
        {
            warn!("Config file {} does not exist, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| eyre!("Failed to read config file: {}", e))?;
        Self::from_toml_str(&content)
    }

    /// Writes a default config file unless one is already present.
    pub async fn ensure_default_config() -> Result<()> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(());
        }

        info!("Creating default configuration at {}", path.display());
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }
        let content = Self::default().to_toml_string()?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| eyre!("Failed to write config file: {}", e))
    }

    pub fn session_settings(&self) -> SessionSettings {
        let radius = self.joystick.base_diameter / 2.0;
        SessionSettings {
            dispatch_interval: Duration::from_millis(self.timing.dispatch_interval_ms),
            poll_interval: Duration::from_millis(self.timing.poll_interval_ms),
            channel_debounce: Duration::from_millis(self.timing.channel_debounce_ms),
            command_debounce: Duration::from_millis(self.timing.command_debounce_ms),
            zero_resend_budget: self.timing.zero_resend_budget,
            geometry: JoystickGeometry {
                center: Point::new(radius, radius),
                base_diameter: self.joystick.base_diameter,
                stick_ratio: self.joystick.stick_ratio,
            },
        }
    }

    /// Configured log level; unknown names fall back to INFO.
    pub fn log_level(&self) -> Level {
        self.log.level.parse().unwrap_or(Level::INFO)
    }
}

fn get_home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    })
}
