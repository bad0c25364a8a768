pub mod pipeline;
pub mod sensor;
pub mod storage;
pub mod transport;
pub mod trigger;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

/// Device type reported to the coordinator during registration.
pub const DEVICE_TYPE: &str = "camera";

/// Global configuration that can be atomically swapped at runtime
pub static CONFIG: once_cell::sync::Lazy<ArcSwap<Config>> =
    once_cell::sync::Lazy::new(|| ArcSwap::from_pointee(Config::default()));

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub device: DeviceConfig,
    pub capture: CaptureConfig,
    pub sensor: SensorConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    pub events: EventConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Name this node is known by inside the sensor network
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Frames captured per second
    pub frame_rate: u32,
    /// Seconds retained on each side of a trigger event
    pub window_secs: u32,
    /// 1-in-N persisted frames forwarded to the live stream
    pub stream_downsample: u32,
}

impl CaptureConfig {
    /// Number of one-second buckets in the time-index ring.
    pub fn ring_size(&self) -> u32 {
        self.window_secs * 2
    }

    pub fn save_queue_depth(&self) -> usize {
        (self.frame_rate * 2) as usize
    }

    pub fn stream_queue_depth(&self) -> usize {
        ((self.frame_rate * 2) / self.stream_downsample.max(1)).max(1) as usize
    }

    /// Frames persisted between two live-stream forwards.
    pub fn forward_every(&self) -> u32 {
        (self.frame_rate / self.stream_downsample.max(1)).max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// V4L2 device path; empty means auto-detect
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub buffer_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the frame-bucket ring on local storage
    pub root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Base URL of the coordinator HTTP endpoint
    pub coordinator: String,
    /// Per-request timeout for frame uploads
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// UDP address the trigger listener binds to
    pub bind: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "camera0".into(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frame_rate: 30,
            window_secs: 30,
            stream_downsample: 15,
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            width: 800,
            height: 600,
            buffer_count: 4,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: "frames".into(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            coordinator: "http://127.0.0.1:8080".into(),
            timeout_ms: 1000,
        }
    }
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8990".into(),
        }
    }
}

impl Config {
    /// Load configuration from `vigil.toml` (optional) and `VIGIL_*`
    /// environment overrides, on top of the built-in defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("vigil").required(false))
            .add_source(config::Environment::with_prefix("VIGIL").separator("__"))
            .build()?
            .try_deserialize()
    }
}
